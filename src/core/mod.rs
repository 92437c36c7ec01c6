//! Core types shared between the wire layer and the device layer

pub mod driver;
pub mod types;
