//! TCP streaming: framed commands in, framed status snapshots out

pub mod tcp_publisher;
pub mod tcp_receiver;
pub mod wire;

pub use tcp_publisher::StatusPublisher;
pub use tcp_receiver::CommandReceiver;
pub use wire::Serializer;
