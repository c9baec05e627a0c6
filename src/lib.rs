//! Hardware abstraction for lab equipment.
//!
//! - [`relay`] and [`actuator`]: switchable outputs driven by the
//!   [`fsm`] switch state machine over `embedded-hal` pins;
//! - [`gpio`]: pin and PWM factories from [`config`] entries;
//! - [`rs485`]: serial links and Modbus framing;
//! - [`vacuum_gauge`], [`qcm`], [`vfd`]: device clients on the bus.
//!
//! Device clients are `async` and runtime-agnostic; any executor that
//! can poll an `async-io` timer drives them.

#![deny(unused_must_use)]

pub mod actuator;
pub mod config;
pub mod error;
pub mod fsm;
pub mod gpio;
pub mod qcm;
pub mod relay;
pub mod rs485;
pub mod vacuum_gauge;
pub mod vfd;

pub use error::{Error, Result};

/// Crate version, from `Cargo.toml`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
