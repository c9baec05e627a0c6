//! Serial link abstraction: any half-duplex byte channel to the bus.
//!
//! Device clients are generic over [`SerialLink`], so the same protocol
//! code runs against a real port ([`SerialPortLink`]) or a scripted
//! mock in tests.

use crate::error::Result;

/// Half-duplex byte channel to an RS-485 bus.
pub trait SerialLink {
    /// Send a complete request.
    fn write_all(&mut self, data: &[u8]) -> Result<()>;

    /// Append bytes up to and including `delimiter` to `buf`.
    /// Stops early on timeout; returns the number of bytes appended,
    /// which may be 0 when the device stayed silent.
    fn read_until(&mut self, delimiter: u8, buf: &mut Vec<u8>) -> Result<usize>;

    /// [`read_until`](Self::read_until) a line feed.
    fn read_line(&mut self, buf: &mut Vec<u8>) -> Result<usize> {
        self.read_until(b'\n', buf)
    }

    /// Append everything that arrives until the line goes quiet.
    /// Used for binary (RTU) frames that have no terminator.
    fn read_frame(&mut self, buf: &mut Vec<u8>) -> Result<usize>;

    /// Reconfigure the line speed.
    fn set_baud_rate(&mut self, baud: u32) -> Result<()>;

    /// Drop stale input before a new request.
    fn discard_input(&mut self) -> Result<()> {
        Ok(())
    }
}

/// A link with nothing attached: writes vanish and reads time out empty.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NullLink {
    baud: u32,
}

impl NullLink {
    pub fn baud_rate(&self) -> u32 {
        self.baud
    }
}

impl SerialLink for NullLink {
    fn write_all(&mut self, _data: &[u8]) -> Result<()> {
        Ok(())
    }

    fn read_until(&mut self, _delimiter: u8, _buf: &mut Vec<u8>) -> Result<usize> {
        Ok(0)
    }

    fn read_frame(&mut self, _buf: &mut Vec<u8>) -> Result<usize> {
        Ok(0)
    }

    fn set_baud_rate(&mut self, baud: u32) -> Result<()> {
        self.baud = baud;
        Ok(())
    }
}

impl<L: SerialLink + ?Sized> SerialLink for &mut L {
    fn write_all(&mut self, data: &[u8]) -> Result<()> {
        (**self).write_all(data)
    }

    fn read_until(&mut self, delimiter: u8, buf: &mut Vec<u8>) -> Result<usize> {
        (**self).read_until(delimiter, buf)
    }

    fn read_frame(&mut self, buf: &mut Vec<u8>) -> Result<usize> {
        (**self).read_frame(buf)
    }

    fn set_baud_rate(&mut self, baud: u32) -> Result<()> {
        (**self).set_baud_rate(baud)
    }

    fn discard_input(&mut self) -> Result<()> {
        (**self).discard_input()
    }
}

// ───────────────────────────────────────────────────────────────
// serialport adapter
// ───────────────────────────────────────────────────────────────

#[cfg(feature = "serial")]
pub use port::SerialPortLink;

#[cfg(feature = "serial")]
mod port {
    use core::time::Duration;
    use std::io::{self, Read, Write};

    use log::debug;
    use serialport::{ClearBuffer, DataBits, SerialPort, StopBits};

    use super::SerialLink;
    use crate::error::Result;
    use crate::rs485::{ModbusSerialConnectionConfig, Parity, SerialConnectionConfig, rtu_frame_gap};

    /// Read timeout used when the config leaves it unset.
    const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

    /// A serial port opened through the `serialport` crate.
    pub struct SerialPortLink {
        port: Box<dyn SerialPort>,
        timeout: Duration,
        inter_byte_timeout: Option<Duration>,
        /// Line shape (bytesize, parity, stop bits) when the inter-byte gap
        /// tracks the RTU character time.
        rtu_line: Option<(u8, Parity, u8)>,
    }

    fn secs(s: Option<f64>) -> Option<Duration> {
        s.filter(|v| v.is_finite() && *v >= 0.0)
            .map(Duration::from_secs_f64)
    }

    fn data_bits(bytesize: u8) -> DataBits {
        match bytesize {
            5 => DataBits::Five,
            6 => DataBits::Six,
            7 => DataBits::Seven,
            _ => DataBits::Eight,
        }
    }

    fn parity(p: Parity) -> serialport::Parity {
        match p {
            Parity::Even => serialport::Parity::Even,
            Parity::Odd => serialport::Parity::Odd,
            // mark/space are not exposed by serialport
            Parity::None | Parity::Mark | Parity::Space => serialport::Parity::None,
        }
    }

    fn is_timeout(e: &io::Error) -> bool {
        matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock)
    }

    impl SerialPortLink {
        pub fn open(cfg: &SerialConnectionConfig) -> Result<Self> {
            let timeout = secs(cfg.timeout).unwrap_or(DEFAULT_TIMEOUT);
            let stop_bits = if cfg.stopbits == 2 {
                StopBits::Two
            } else {
                StopBits::One
            };
            let port = serialport::new(cfg.port.as_str(), cfg.baudrate)
                .data_bits(data_bits(cfg.bytesize))
                .parity(parity(cfg.parity))
                .stop_bits(stop_bits)
                .timeout(timeout)
                .open()
                .map_err(io::Error::from)?;
            debug!("serial: opened {} at {} baud", cfg.port, cfg.baudrate);
            Ok(Self {
                port,
                timeout,
                inter_byte_timeout: secs(cfg.inter_byte_timeout),
                rtu_line: None,
            })
        }

        /// Open a Modbus line. RTU frames end on 3.5 character times of
        /// silence instead of the full read timeout.
        pub fn open_modbus(cfg: &ModbusSerialConnectionConfig) -> Result<Self> {
            let mut link = Self::open(&SerialConnectionConfig::from(cfg))?;
            if let Some(gap) = cfg.frame_gap() {
                debug!("serial: RTU frame gap {gap:?}");
                link.inter_byte_timeout = Some(gap);
                link.rtu_line = Some((cfg.bytesize, cfg.parity, cfg.stopbits));
            }
            Ok(link)
        }

        /// After the first byte, wait only the inter-byte gap if one is set.
        fn after_first_byte(&mut self) -> Result<()> {
            if let Some(gap) = self.inter_byte_timeout {
                self.port.set_timeout(gap).map_err(io::Error::from)?;
            }
            Ok(())
        }

        fn restore_timeout(&mut self) -> Result<()> {
            if self.inter_byte_timeout.is_some() {
                self.port.set_timeout(self.timeout).map_err(io::Error::from)?;
            }
            Ok(())
        }

        fn read_bytes(&mut self, buf: &mut Vec<u8>, stop: Option<u8>) -> Result<usize> {
            let start = buf.len();
            let mut chunk = [0u8; 64];
            loop {
                let want = if stop.is_some() { 1 } else { chunk.len() };
                match self.port.read(&mut chunk[..want]) {
                    Ok(0) => break,
                    Ok(n) => {
                        if buf.len() == start {
                            self.after_first_byte()?;
                        }
                        buf.extend_from_slice(&chunk[..n]);
                        if stop.is_some_and(|s| chunk[n - 1] == s) {
                            break;
                        }
                    }
                    Err(e) if is_timeout(&e) => break,
                    Err(e) => {
                        self.restore_timeout()?;
                        return Err(e.into());
                    }
                }
            }
            self.restore_timeout()?;
            Ok(buf.len() - start)
        }
    }

    impl SerialLink for SerialPortLink {
        fn write_all(&mut self, data: &[u8]) -> Result<()> {
            self.port.write_all(data)?;
            self.port.flush()?;
            Ok(())
        }

        fn read_until(&mut self, delimiter: u8, buf: &mut Vec<u8>) -> Result<usize> {
            self.read_bytes(buf, Some(delimiter))
        }

        fn read_frame(&mut self, buf: &mut Vec<u8>) -> Result<usize> {
            self.read_bytes(buf, None)
        }

        fn set_baud_rate(&mut self, baud: u32) -> Result<()> {
            debug!("serial: baud rate -> {baud}");
            self.port.set_baud_rate(baud).map_err(io::Error::from)?;
            if let Some((bytesize, parity, stopbits)) = self.rtu_line {
                self.inter_byte_timeout = Some(rtu_frame_gap(baud, bytesize, parity, stopbits));
            }
            Ok(())
        }

        fn discard_input(&mut self) -> Result<()> {
            self.port
                .clear(ClearBuffer::Input)
                .map_err(io::Error::from)?;
            Ok(())
        }
    }
}
