//! Servo engine scenarios over the mock pulse bus
//!
//! End-to-end façade behavior without hardware: bank mapping and inversion,
//! dead-zone detours, validation atomicity, and fault handling. Every
//! expected pulse is computed from the calibration table rather than
//! hard-coded, so the tests survive recalibration of the sample table.
//!
//! Run with: `cargo test --test servo_engine`

use vayu_io::config::ServoConfig;
use vayu_io::servo::{CHANNEL_COUNT, CalibrationTable, ServoBank};
use vayu_io::transport::MockPulseBus;

/// Bench configuration: no settle delay, no startup homing
fn bench_config() -> ServoConfig {
    ServoConfig {
        i2c_bus: "/dev/null".to_string(),
        i2c_address: 0x60,
        pwm_freq_hz: 50,
        home_pulse: 150,
        max_angles: [60.0, 60.0, 60.0, 60.0, 80.0, 80.0, 80.0, 80.0],
        min_move_pulse: 15,
        settle_ms: 0,
        warmup_pulses: vec![155, 160, 165],
        home_on_start: false,
    }
}

fn bench_bank() -> (ServoBank, MockPulseBus, CalibrationTable) {
    let bus = MockPulseBus::new();
    let bank = ServoBank::new(Box::new(bus.clone()), &bench_config()).unwrap();
    (bank, bus, CalibrationTable::factory())
}

#[test]
fn direct_move_from_home() {
    // Channel 0 (max 60°) sits at home; internal input 30° inverts to a 30°
    // target, whose pulse is far enough from home for a single direct write.
    let (bank, bus, table) = bench_bank();
    bank.home_all().unwrap();
    assert_eq!(bank.positions(), [150; CHANNEL_COUNT]);
    bus.clear();

    bank.apply_internal(&[30.0; 4]).unwrap();

    let target = table.pulse_of(30.0);
    assert!(target > 150 && target < table.pulse_of(60.0));
    for channel in 0..4u8 {
        assert_eq!(bus.channel_writes(channel), vec![target]);
        assert_eq!(bank.positions()[channel as usize], target);
    }
}

#[test]
fn repeat_at_max_detours_from_boundary() {
    // A channel already at its maximum pulse asked for the same angle again
    // routes through the dead-zone branch: the sequence starts at a boundary
    // and ends at the target, and the store ends at the target.
    let (bank, bus, table) = bench_bank();
    bank.apply_internal(&[0.0; 4]).unwrap(); // inverted to 60° = channel max
    let max_pulse = table.pulse_of(60.0);
    assert_eq!(bank.positions()[0], max_pulse);
    bus.clear();

    bank.apply_internal(&[0.0; 4]).unwrap();

    for channel in 0..4u8 {
        let writes = bus.channel_writes(channel);
        assert!(writes.len() >= 2);
        assert!(writes[0] == 150 || writes[0] == max_pulse);
        assert_eq!(*writes.last().unwrap(), max_pulse);
        assert_eq!(bank.positions()[channel as usize], max_pulse);
    }
}

#[test]
fn malformed_vector_rejected_before_any_write() {
    let (bank, bus, _table) = bench_bank();

    let result = bank.apply_both(&[10.0; 4], &[10.0, 20.0, 30.0]);
    assert!(result.is_err());
    assert!(bus.writes().is_empty());

    let result = bank.apply_both(&[10.0; 3], &[10.0; 4]);
    assert!(result.is_err());
    assert!(bus.writes().is_empty());
}

#[test]
fn inversion_law() {
    // apply_internal([θ;4]) commands the same pulses as apply_external
    // would for [60−θ;4], for an angle inside every channel's range.
    let (bank, _bus, _table) = bench_bank();

    bank.apply_internal(&[20.0; 4]).unwrap();
    bank.apply_external(&[40.0; 4]).unwrap();

    let positions = bank.positions();
    for i in 0..4 {
        assert_eq!(positions[i], positions[i + 4], "channel {} vs {}", i, i + 4);
    }
}

#[test]
fn idempotent_target() {
    // The same target twice terminates both times and leaves the store at
    // the clamped target pulse.
    let (bank, _bus, table) = bench_bank();
    let target = table.pulse_of(33.3);

    bank.apply_external(&[33.3; 4]).unwrap();
    for channel in 4..8 {
        assert_eq!(bank.positions()[channel], target);
    }

    bank.apply_external(&[33.3; 4]).unwrap();
    for channel in 4..8 {
        assert_eq!(bank.positions()[channel], target);
    }
}

#[test]
fn apply_both_writes_in_channel_order() {
    // Within one exclusive section writes are issued in planner order:
    // internal channels 0-3 first, then external 4-7.
    let (bank, bus, _table) = bench_bank();
    bank.home_all().unwrap();
    bus.clear();

    bank.apply_both(&[30.0; 4], &[30.0; 4]).unwrap();

    let channels: Vec<u8> = bus.writes().iter().map(|(ch, _)| *ch).collect();
    let mut sorted = channels.clone();
    sorted.sort();
    assert_eq!(channels, sorted);
    assert_eq!(channels.first(), Some(&0));
    assert_eq!(channels.last(), Some(&7));
}

#[test]
fn bus_fault_aborts_batch_and_keeps_last_write() {
    let (bank, bus, table) = bench_bank();
    bank.home_all().unwrap();
    bus.clear();

    // Let channels 0 and 1 move, then fail on channel 2's write
    bus.fail_from(2);
    let result = bank.apply_internal(&[30.0; 4]);
    assert!(result.is_err());

    let target = table.pulse_of(30.0);
    let positions = bank.positions();
    assert_eq!(positions[0], target);
    assert_eq!(positions[1], target);
    // The failed channel keeps its pre-fault commanded position
    assert_eq!(positions[2], 150);
    assert_eq!(positions[3], 150);
}

#[test]
fn clamped_request_lands_on_channel_max() {
    let (bank, _bus, table) = bench_bank();

    // 95° exceeds the external channels' 80° limit
    bank.apply_external(&[95.0; 4]).unwrap();
    let max_pulse = table.pulse_of(80.0);
    for channel in 4..8 {
        assert_eq!(bank.positions()[channel], max_pulse);
    }
}
