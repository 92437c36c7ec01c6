//! Device implementations and the actuator controller

pub mod fanled;
pub mod peltier;

pub use fanled::{FanBankState, FanLedBridge, LedColor};
pub use peltier::Bts7960;

use crate::config::{AppConfig, FanLedConfig};
use crate::core::driver::ActuatorDriver;
use crate::core::types::{Command, StatusData};
use crate::error::{Error, Result};
use crate::services::{AirflowService, LightingService, Rounding, ThermoService, VentService};
use crate::servo::ServoBank;
use crate::transport::{Pca9685Bus, SerialTransport};
use crossbeam_channel::Sender;
use std::time::Duration;

/// Actuator controller for the Vayu unit
///
/// Owns every actuator family and dispatches inbound commands: servo vent
/// bank (PCA9685), fan/LED MCU bridge, and the thermoelectric H-bridge.
/// The fan/LED bridge and the Peltier driver are optional so a bench setup
/// with only the servo bank attached still runs; requests for a missing
/// actuator are logged and skipped.
pub struct VayuController {
    unit_id: u32,
    servo: ServoBank,
    fanled: Option<FanLedBridge>,
    peltier: Option<Bts7960>,
    vents: VentService,
    thermo: ThermoService,
    airflow: AirflowService,
    lighting: LightingService,
    status_tx: Sender<StatusData>,
}

impl VayuController {
    /// Assemble a controller from already-opened device handles
    pub fn new(
        servo: ServoBank,
        fanled: Option<FanLedBridge>,
        peltier: Option<Bts7960>,
        config: &AppConfig,
        status_tx: Sender<StatusData>,
    ) -> Result<Self> {
        Ok(Self {
            unit_id: config.unit.id,
            vents: VentService::new(&config.servo.max_angles),
            thermo: ThermoService::new(config.peltier.min_on_duty, Rounding::Floor)?,
            airflow: AirflowService::new(),
            lighting: LightingService::default(),
            servo,
            fanled,
            peltier,
            status_tx,
        })
    }

    fn snapshot(&self) -> StatusData {
        let vents = self.vents.state();
        let airflow = self.airflow.state();

        let mut status = StatusData::new(self.unit_id);
        status.airflow_speed = self.airflow.airflow_speed().to_string();
        status.slot_internal = vents.internal;
        status.slot_external = vents.external;
        status.fan_intake_speed = airflow.small;
        status.fan_main_speed = airflow.large;
        status.energy_temp_total = self.thermo.state().applied_duty;
        status.led_colors = self.lighting.state().colors.map(|c| c.token().to_string());
        status.touch();
        status
    }

    fn publish_status(&self) {
        if self.status_tx.send(self.snapshot()).is_err() {
            log::trace!("Status publisher gone, dropping snapshot");
        }
    }

    fn apply_setpoints(
        &mut self,
        peltier_pwm: Option<i32>,
        internal_servo: Option<Vec<f64>>,
        external_servo: Option<Vec<f64>>,
        small_fan_pwm: Option<Vec<i32>>,
        large_fan_pwm: Option<i32>,
    ) -> Result<()> {
        if let Some(raw) = peltier_pwm {
            let applied = self.thermo.preprocess(raw);
            match &mut self.peltier {
                Some(driver) => {
                    driver.set_duty(applied)?;
                    log::info!("Peltier: raw={} -> applied={}%", raw, applied);
                }
                None => log::warn!("Peltier request ignored: driver unavailable"),
            }
        }

        match (internal_servo, external_servo) {
            (Some(internal), Some(external)) => {
                let internal = self.vents.preprocess_internal(&internal);
                let external = self.vents.preprocess_external(&external);
                self.servo.apply_both(&internal, &external)?;
            }
            (Some(internal), None) => {
                let internal = self.vents.preprocess_internal(&internal);
                self.servo.apply_internal(&internal)?;
            }
            (None, Some(external)) => {
                let external = self.vents.preprocess_external(&external);
                self.servo.apply_external(&external)?;
            }
            (None, None) => {}
        }

        if small_fan_pwm.is_some() || large_fan_pwm.is_some() {
            let small = small_fan_pwm.unwrap_or_default();
            let large = large_fan_pwm.unwrap_or(0);
            let (intake, main) = self.airflow.preprocess(&small, large);
            match &mut self.fanled {
                Some(bridge) => bridge.set_fans(intake, main)?,
                None => log::warn!("Fan request ignored: bridge unavailable"),
            }
        }

        Ok(())
    }
}

impl ActuatorDriver for VayuController {
    fn initialize(&mut self) -> Result<()> {
        // The servo bank sweeps and homes during construction when
        // configured; here the remaining actuators get a known state.
        if let Some(bridge) = &mut self.fanled {
            bridge.set_fans([0; 4], 0)?;
            bridge.set_leds([LedColor::White; 4])?;
        }
        if let Some(driver) = &mut self.peltier {
            driver.set_duty(0)?;
        }
        log::info!("✓ Actuators initialized (unit {})", self.unit_id);
        self.publish_status();
        Ok(())
    }

    fn handle_command(&mut self, cmd: Command) -> Result<()> {
        match cmd {
            Command::SetActuators {
                peltier_pwm,
                internal_servo,
                external_servo,
                small_fan_pwm,
                large_fan_pwm,
            } => {
                self.apply_setpoints(
                    peltier_pwm,
                    internal_servo,
                    external_servo,
                    small_fan_pwm,
                    large_fan_pwm,
                )?;
                self.publish_status();
                Ok(())
            }
            Command::SetComfort { tsv } => {
                let colors = self.lighting.preprocess(&tsv);
                match &mut self.fanled {
                    Some(bridge) => bridge.set_leds(colors)?,
                    None => log::warn!("LED request ignored: bridge unavailable"),
                }
                self.publish_status();
                Ok(())
            }
            Command::HomeChannel { channel } => self.servo.home_channel(channel),
            Command::HomeAll => self.servo.home_all(),
            Command::RecalibrateChannel { channel } => self.servo.recalibrate_channel(channel),
            Command::QueryState => {
                self.publish_status();
                Ok(())
            }
            Command::Shutdown => self.shutdown(),
        }
    }

    fn status(&self) -> StatusData {
        self.snapshot()
    }

    fn shutdown(&mut self) -> Result<()> {
        log::info!("Driving actuators to safe state");
        if let Some(driver) = &mut self.peltier {
            driver.safe_off();
        }
        if let Some(bridge) = &mut self.fanled
            && let Err(e) = bridge.set_fans([0; 4], 0)
        {
            log::warn!("Fan safe-off failed: {}", e);
        }
        Ok(())
    }
}

/// Open all hardware and assemble the controller
pub fn create_controller(
    config: &AppConfig,
    status_tx: Sender<StatusData>,
) -> Result<Box<dyn ActuatorDriver>> {
    let bus = Pca9685Bus::open(
        &config.servo.i2c_bus,
        config.servo.i2c_address,
        config.servo.pwm_freq_hz,
    )?;
    let servo = ServoBank::new(Box::new(bus), &config.servo)?;

    let fanled = match open_fanled(&config.fanled) {
        Ok(bridge) => Some(bridge),
        Err(e) => {
            log::warn!("Fan/LED bridge unavailable: {}", e);
            None
        }
    };

    let peltier = match Bts7960::open(&config.peltier) {
        Ok(driver) => Some(driver),
        Err(e) => {
            log::warn!("Peltier driver unavailable: {}", e);
            None
        }
    };

    let controller = VayuController::new(servo, fanled, peltier, config, status_tx)?;
    Ok(Box::new(controller))
}

fn open_fanled(config: &FanLedConfig) -> Result<FanLedBridge> {
    let port = match &config.port {
        Some(port) => port.clone(),
        None => SerialTransport::auto_find_port()
            .ok_or(Error::ComponentNotAvailable("fan/LED serial port"))?,
    };
    let transport = SerialTransport::open(&port, config.baud_rate)?;
    let mut bridge = FanLedBridge::new(
        Box::new(transport),
        config.swap_blue_green,
        Duration::from_millis(config.timeout_ms),
    );
    bridge.connect()?;
    Ok(bridge)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{MockPulseBus, MockTransport};
    use crossbeam_channel::unbounded;

    fn test_controller() -> (VayuController, MockPulseBus, MockTransport, crossbeam_channel::Receiver<StatusData>) {
        let mut config = AppConfig::vayu_defaults();
        config.servo.settle_ms = 0;
        config.servo.home_on_start = false;

        let bus = MockPulseBus::new();
        let servo = ServoBank::new(Box::new(bus.clone()), &config.servo).unwrap();

        let mock_serial = MockTransport::new();
        let bridge = FanLedBridge::new(
            Box::new(mock_serial.clone()),
            false,
            Duration::from_millis(50),
        );

        let (tx, rx) = unbounded();
        let controller =
            VayuController::new(servo, Some(bridge), None, &config, tx).unwrap();
        (controller, bus, mock_serial, rx)
    }

    #[test]
    fn test_set_actuators_moves_vents_and_publishes() {
        let (mut controller, bus, _serial, rx) = test_controller();

        controller
            .handle_command(Command::SetActuators {
                peltier_pwm: None,
                internal_servo: Some(vec![45.0, 45.0, 44.0, 6.0]),
                external_servo: Some(vec![50.0, 70.0, 80.0, 12.0]),
                small_fan_pwm: None,
                large_fan_pwm: None,
            })
            .unwrap();

        assert!(!bus.writes().is_empty());
        let status = rx.try_recv().unwrap();
        assert_eq!(status.slot_internal, [45.0, 45.0, 44.0, 6.0]);
        assert_eq!(status.slot_external, [50.0, 70.0, 80.0, 12.0]);
    }

    #[test]
    fn test_set_actuators_clamps_through_services() {
        let (mut controller, _bus, _serial, rx) = test_controller();

        controller
            .handle_command(Command::SetActuators {
                peltier_pwm: None,
                internal_servo: Some(vec![65.0, -3.0]),
                external_servo: None,
                small_fan_pwm: None,
                large_fan_pwm: None,
            })
            .unwrap();

        let status = rx.try_recv().unwrap();
        assert_eq!(status.slot_internal, [60.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_fan_command_goes_out_over_serial() {
        let (mut controller, _bus, serial, rx) = test_controller();
        serial.queue_reply(b"ACK:SETF:OK\n");

        controller
            .handle_command(Command::SetActuators {
                peltier_pwm: None,
                internal_servo: None,
                external_servo: None,
                small_fan_pwm: Some(vec![5, 80, 0, 2]),
                large_fan_pwm: Some(90),
            })
            .unwrap();

        assert_eq!(serial.get_written(), b"SETF 5 80 0 2 90\n");
        let status = rx.try_recv().unwrap();
        assert_eq!(status.fan_main_speed, 90);
        assert_eq!(status.airflow_speed, "high");
    }

    #[test]
    fn test_comfort_command_sets_leds() {
        let (mut controller, _bus, serial, _rx) = test_controller();
        serial.queue_reply(b"ACK:SETL:OK\n");

        controller
            .handle_command(Command::SetComfort {
                tsv: vec![1.0, 0.0, -1.2, 2.5],
            })
            .unwrap();

        assert_eq!(serial.get_written(), b"SETL R W B R\n");
    }

    #[test]
    fn test_query_state_publishes_snapshot() {
        let (mut controller, _bus, _serial, rx) = test_controller();
        controller.handle_command(Command::QueryState).unwrap();
        let status = rx.try_recv().unwrap();
        assert_eq!(status.airflow_speed, "off");
        assert_eq!(status.energy_temp_total, 0);
    }

    #[test]
    fn test_home_channel_dispatch() {
        let (mut controller, bus, _serial, _rx) = test_controller();
        controller
            .handle_command(Command::HomeChannel { channel: 2 })
            .unwrap();
        assert_eq!(bus.channel_writes(2), vec![150]);

        assert!(
            controller
                .handle_command(Command::HomeChannel { channel: 9 })
                .is_err()
        );
    }

    #[test]
    fn test_peltier_request_without_driver_is_skipped() {
        let (mut controller, _bus, _serial, rx) = test_controller();
        controller
            .handle_command(Command::SetActuators {
                peltier_pwm: Some(80),
                internal_servo: None,
                external_servo: None,
                small_fan_pwm: None,
                large_fan_pwm: None,
            })
            .unwrap();
        // Mapping still recorded for status even though no driver is present
        let status = rx.try_recv().unwrap();
        assert!(status.energy_temp_total >= 50);
    }
}
