//! # Yeelight Control Library
//!
//! `yeelight-control-lib` talks to Yeelight smart lights over their LAN control
//! protocol: one JSON object per line over a plain TCP connection (port 55443 by
//! default). Each request carries a correlation id, a method name and a list of
//! positional parameters; the device answers with one line holding either a
//! `result` array or an `error` object.
//!
//! ## Features
//!
//! - A protocol engine that frames commands, waits for the answer with a timeout and
//!   manages the connection per command or persistently
//! - Wrapper methods for power, color, brightness, color temperature and sleep timers
//! - 24-bit colors with hex, RGB and the compact four-symbol text used by LED-matrix
//!   devices, plus a few frame patterns
//!
//! ## Example
//!
//! ```no_run
//! use yeelight_control_lib::control_interface::ControlInterface;
//! use yeelight_control_lib::util::config::DeviceConfig;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut light = ControlInterface::new("192.168.1.40:55443", DeviceConfig::default());
//!     light.set_on().await?;
//!     light.set_hex_color("#ff8800").await?;
//!     println!("Brightness: {}", light.get_bright().await?);
//!     Ok(())
//! }
//! ```
//!
//! A timeout is not an error: a command that got no answer in time returns an empty
//! `Response`. `ControlInterface::send_command_outcome` returns `Reply::TimedOut`
//! instead when the distinction matters.
//!
//! ## Disclaimer
//!
//! This project is not affiliated with, authorized by, endorsed by, or in any way officially connected
//! with Yeelight or its affiliates.
//!
//! ## License
//!
//! This project is dual-licensed under the MIT License and the Apache License, Version 2.0.

// The `control_interface` module owns the device handle: connection policy, command
// framing, the timeout-bounded response wait and the wrapper methods built on top.
pub mod control_interface;

// The `led` module holds the color type, LED-matrix frames and frame patterns.
pub mod led;

// The `util` module has the error type, device configuration and helper traits.
pub mod util;
