//! Unified error types for the hardware library.
//!
//! A single `Error` enum that every subsystem converts into, so device
//! clients and actuators share one `Result` alias. Variants carry only
//! `Copy` data; serial failures keep the `io::ErrorKind` and drop the
//! OS message.

use core::fmt;
use std::io;

use crate::fsm::{Event, State};

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Every fallible operation in the library funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A GPIO pin or PWM channel could not be created or driven.
    Gpio(GpioError),
    /// A device answered with something the protocol does not allow.
    Protocol(ProtocolError),
    /// A state machine event was sent from a state that has no matching transition.
    Transition(TransitionError),
    /// Configuration is invalid or could not be loaded.
    Config(ConfigError),
    /// Serial port I/O failed.
    Io(io::ErrorKind),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gpio(e) => write!(f, "gpio: {e}"),
            Self::Protocol(e) => write!(f, "protocol: {e}"),
            Self::Transition(e) => write!(f, "state machine: {e}"),
            Self::Config(e) => write!(f, "config: {e}"),
            Self::Io(kind) => write!(f, "serial I/O: {kind}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Self::Io(e.kind())
    }
}

// ---------------------------------------------------------------------------
// GPIO errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GpioError {
    /// The requested backend is not implemented on this platform.
    Unsupported(&'static str),
    /// The configured backend name is not one this library knows.
    UnknownBackend(BackendName),
    /// Writing a pin level failed.
    WriteFailed,
    /// Setting a PWM duty cycle or frequency failed.
    PwmWriteFailed,
    /// Reading a pin level failed.
    ReadFailed,
}

impl fmt::Display for GpioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unsupported(backend) => write!(f, "{backend} support not implemented yet"),
            Self::UnknownBackend(name) => write!(f, "unknown GPIO backend {:?}", name.as_str()),
            Self::WriteFailed => write!(f, "GPIO write failed"),
            Self::PwmWriteFailed => write!(f, "PWM write failed"),
            Self::ReadFailed => write!(f, "GPIO read failed"),
        }
    }
}

/// Backend name copied out of a config, cut at a char boundary to
/// [`BackendName::CAPACITY`] bytes so errors stay `Copy`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendName {
    buf: [u8; BackendName::CAPACITY],
    len: u8,
}

impl BackendName {
    pub const CAPACITY: usize = 32;

    pub fn new(name: &str) -> Self {
        let len = name
            .char_indices()
            .map(|(i, c)| i + c.len_utf8())
            .take_while(|&end| end <= Self::CAPACITY)
            .last()
            .unwrap_or(0);
        let mut buf = [0; Self::CAPACITY];
        buf[..len].copy_from_slice(&name.as_bytes()[..len]);
        Self { buf, len: len as u8 }
    }

    pub fn as_str(&self) -> &str {
        core::str::from_utf8(&self.buf[..usize::from(self.len)]).unwrap_or_default()
    }
}

impl fmt::Display for BackendName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<GpioError> for Error {
    fn from(e: GpioError) -> Self {
        Self::Gpio(e)
    }
}

// ---------------------------------------------------------------------------
// Protocol errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolError {
    /// Request payload exceeds what the device accepts.
    PayloadTooLong { max: usize },
    /// Command code is not part of the device command set.
    UnknownCommand(u8),
    /// Checksum / LRC / CRC of a frame does not match.
    ChecksumMismatch,
    /// Frame is too short or not correctly delimited.
    Malformed,
    /// Response came from a different bus address.
    AddressMismatch { expected: u8, got: u8 },
    /// Device returned a Modbus exception code.
    Exception { function: u8, code: u8 },
    /// No usable response after all retries.
    NoResponse,
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PayloadTooLong { max } => write!(f, "data can not exceed {max} bytes"),
            Self::UnknownCommand(c) => write!(f, "wrong command {:?}", *c as char),
            Self::ChecksumMismatch => write!(f, "wrong checksum"),
            Self::Malformed => write!(f, "malformed frame"),
            Self::AddressMismatch { expected, got } => {
                write!(f, "wrong address: expected {expected}, got {got}")
            }
            Self::Exception { function, code } => {
                write!(f, "exception 0x{code:02X} for function 0x{function:02X}")
            }
            Self::NoResponse => write!(f, "no response"),
        }
    }
}

impl From<ProtocolError> for Error {
    fn from(e: ProtocolError) -> Self {
        Self::Protocol(e)
    }
}

// ---------------------------------------------------------------------------
// State machine errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionError {
    /// No row of the transition table matches the event in this state.
    NotAllowed { event: Event, state: State },
}

impl fmt::Display for TransitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotAllowed { event, state } => {
                write!(f, "can't {} when in {}", event.name(), state.name())
            }
        }
    }
}

impl From<TransitionError> for Error {
    fn from(e: TransitionError) -> Self {
        Self::Transition(e)
    }
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// Input could not be deserialised.
    Parse,
    /// A field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse => write!(f, "config could not be parsed"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {msg}"),
        }
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Library-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
