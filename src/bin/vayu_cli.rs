//! Interactive actuator test harness
//!
//! Drives the Vayu hardware directly through the library API, one actuator
//! at a time, for bench bring-up and calibration checks. The servo bank is
//! required; the fan/LED bridge and the Peltier driver are attached when
//! present and their menu entries report unavailable otherwise.
//!
//! ```sh
//! RUST_LOG=info vayu-cli [config.toml]
//! ```

use std::io::{self, Write};
use std::time::Duration;

use vayu_io::config::AppConfig;
use vayu_io::devices::{Bts7960, FanLedBridge, LedColor};
use vayu_io::servo::ServoBank;
use vayu_io::transport::{Pca9685Bus, SerialTransport};

fn prompt_line(msg: &str) -> Option<String> {
    print!("{}", msg);
    io::stdout().flush().ok()?;
    let mut line = String::new();
    match io::stdin().read_line(&mut line) {
        Ok(0) => None, // EOF
        Ok(_) => Some(line.trim().to_string()),
        Err(_) => None,
    }
}

fn prompt_int(msg: &str, lo: i64, hi: i64) -> Option<i64> {
    loop {
        let line = prompt_line(msg)?;
        match line.parse::<i64>() {
            Ok(v) if (lo..=hi).contains(&v) => return Some(v),
            _ => println!("Enter an integer in {}..={}", lo, hi),
        }
    }
}

fn prompt_f64(msg: &str, lo: f64, hi: f64) -> Option<f64> {
    loop {
        let line = prompt_line(msg)?;
        match line.parse::<f64>() {
            Ok(v) if v >= lo && v <= hi => return Some(v),
            _ => println!("Enter a number in {}..={}", lo, hi),
        }
    }
}

fn prompt_angles4(msg: &str) -> Option<[f64; 4]> {
    loop {
        let line = prompt_line(msg)?;
        let parsed: Vec<f64> = line
            .split_whitespace()
            .filter_map(|tok| tok.parse().ok())
            .collect();
        if parsed.len() == 4 {
            return Some([parsed[0], parsed[1], parsed[2], parsed[3]]);
        }
        println!("Enter exactly 4 angles, e.g.: 45 45 44 6");
    }
}

fn prompt_fans(msg: &str) -> Option<([i32; 4], i32)> {
    loop {
        let line = prompt_line(msg)?;
        let parsed: Vec<i32> = line
            .split_whitespace()
            .filter_map(|tok| tok.parse().ok())
            .collect();
        if parsed.len() == 5 && parsed.iter().all(|v| (0..=100).contains(v)) {
            return Some(([parsed[0], parsed[1], parsed[2], parsed[3]], parsed[4]));
        }
        println!("Enter 5 duties 0..=100, e.g.: 100 80 70 50 100");
    }
}

fn prompt_colors(msg: &str) -> Option<[LedColor; 4]> {
    loop {
        let line = prompt_line(msg)?;
        let parsed: Vec<LedColor> = line
            .split_whitespace()
            .filter_map(|tok| LedColor::from_token(tok).ok())
            .collect();
        if parsed.len() == 4 {
            return Some([parsed[0], parsed[1], parsed[2], parsed[3]]);
        }
        println!("Enter 4 colors from R/G/B/W/OFF, e.g.: R B G W");
    }
}

fn print_menu(fanled: bool, peltier: bool) {
    println!();
    println!("==== Vayu Actuator Test Menu ====");
    println!("  1) home channel");
    println!("  2) home all channels");
    println!("  3) recalibrate channel");
    println!("  4) move channel to angle");
    println!("  5) apply internal bank angles");
    println!("  6) apply external bank angles");
    println!("  7) apply both banks");
    println!(
        "  8) set fans{}",
        if fanled { "" } else { "  (unavailable)" }
    );
    println!(
        "  9) set LEDs{}",
        if fanled { "" } else { "  (unavailable)" }
    );
    println!(
        " 10) set peltier duty{}",
        if peltier { "" } else { "  (unavailable)" }
    );
    println!(" 11) fan controller state");
    println!("  q) quit");
    println!("=================================");
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let config = match std::env::args().nth(1) {
        Some(path) => AppConfig::from_file(&path)?,
        None => AppConfig::vayu_defaults(),
    };

    println!("Opening PCA9685 on {}...", config.servo.i2c_bus);
    let bus = Pca9685Bus::open(
        &config.servo.i2c_bus,
        config.servo.i2c_address,
        config.servo.pwm_freq_hz,
    )?;
    let servo = ServoBank::new(Box::new(bus), &config.servo)?;
    println!("Servo bank ready, positions: {:?}", servo.positions());

    let mut fanled = config
        .fanled
        .port
        .clone()
        .or_else(SerialTransport::auto_find_port)
        .and_then(|port| {
            let transport = SerialTransport::open(&port, config.fanled.baud_rate).ok()?;
            let mut bridge = FanLedBridge::new(
                Box::new(transport),
                config.fanled.swap_blue_green,
                Duration::from_millis(config.fanled.timeout_ms),
            );
            bridge.connect().ok()?;
            println!("Fan/LED bridge ready on {}", port);
            Some(bridge)
        });
    if fanled.is_none() {
        println!("Fan/LED bridge not available");
    }

    let mut peltier = match Bts7960::open(&config.peltier) {
        Ok(driver) => {
            println!("Peltier driver ready");
            Some(driver)
        }
        Err(e) => {
            println!("Peltier driver not available: {}", e);
            None
        }
    };

    loop {
        print_menu(fanled.is_some(), peltier.is_some());
        let Some(choice) = prompt_line("> ") else {
            break;
        };

        let result = match choice.as_str() {
            "q" | "quit" | "exit" => break,
            "" => continue,

            "1" => {
                let Some(ch) = prompt_int("channel (0..7) > ", 0, 7) else {
                    break;
                };
                servo.home_channel(ch as u8)
            }
            "2" => servo.home_all(),
            "3" => {
                let Some(ch) = prompt_int("channel (0..7) > ", 0, 7) else {
                    break;
                };
                servo.recalibrate_channel(ch as u8)
            }
            "4" => {
                let Some(ch) = prompt_int("channel (0..7) > ", 0, 7) else {
                    break;
                };
                let Some(angle) = prompt_f64("angle (0..105) > ", 0.0, 105.0) else {
                    break;
                };
                servo.move_channel(ch as u8, angle)
            }
            "5" => {
                let Some(angles) = prompt_angles4("internal angles (4x) > ") else {
                    break;
                };
                servo.apply_internal(&angles)
            }
            "6" => {
                let Some(angles) = prompt_angles4("external angles (4x) > ") else {
                    break;
                };
                servo.apply_external(&angles)
            }
            "7" => {
                let Some(internal) = prompt_angles4("internal angles (4x) > ") else {
                    break;
                };
                let Some(external) = prompt_angles4("external angles (4x) > ") else {
                    break;
                };
                servo.apply_both(&internal, &external)
            }
            "8" => match &mut fanled {
                Some(bridge) => {
                    let Some((intake, main)) = prompt_fans("f1 f2 f3 f4 big (0..100) > ") else {
                        break;
                    };
                    bridge.set_fans(intake, main)
                }
                None => {
                    println!("Fan/LED bridge not available");
                    continue;
                }
            },
            "9" => match &mut fanled {
                Some(bridge) => {
                    let Some(colors) = prompt_colors("LED1..LED4 (R/G/B/W/OFF) > ") else {
                        break;
                    };
                    bridge.set_leds(colors)
                }
                None => {
                    println!("Fan/LED bridge not available");
                    continue;
                }
            },
            "10" => match &mut peltier {
                Some(driver) => {
                    let Some(duty) = prompt_int("duty (0..100) > ", 0, 100) else {
                        break;
                    };
                    driver.set_duty(duty as u8).map(|applied| {
                        println!("applied duty: {}%", applied);
                    })
                }
                None => {
                    println!("Peltier driver not available");
                    continue;
                }
            },
            "11" => match &mut fanled {
                Some(bridge) => bridge.query_state().map(|state| {
                    println!("intake: {:?}  main: {}", state.intake, state.main);
                }),
                None => {
                    println!("Fan/LED bridge not available");
                    continue;
                }
            },

            _ => {
                println!("Unknown menu entry");
                continue;
            }
        };

        match result {
            Ok(()) => println!("ok  (positions: {:?})", servo.positions()),
            Err(e) => println!("error: {}", e),
        }
    }

    println!("Bye.");
    Ok(())
}
