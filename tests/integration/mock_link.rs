//! Serial links for integration tests.
//!
//! [`ScriptedLink`] plays back canned replies; [`ModbusSlave`] answers
//! Modbus requests from an in-memory register map.

use std::collections::{BTreeMap, VecDeque};

use nts_hardware::Result;
use nts_hardware::rs485::{Framer, SerialLink};

// ── Scripted replies ──────────────────────────────────────────

/// Records writes and answers each read with the next queued reply.
/// An empty reply stands for a silent device.
#[derive(Debug, Default)]
pub struct ScriptedLink {
    pub writes: Vec<Vec<u8>>,
    replies: VecDeque<Vec<u8>>,
    pub baud: u32,
}

#[allow(dead_code)]
impl ScriptedLink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(mut self, bytes: impl Into<Vec<u8>>) -> Self {
        self.replies.push_back(bytes.into());
        self
    }

    pub fn silence(self) -> Self {
        self.reply(Vec::new())
    }

    pub fn pending(&self) -> usize {
        self.replies.len()
    }

    fn next(&mut self, buf: &mut Vec<u8>) -> usize {
        let reply = self.replies.pop_front().unwrap_or_default();
        buf.extend_from_slice(&reply);
        reply.len()
    }
}

impl SerialLink for ScriptedLink {
    fn write_all(&mut self, data: &[u8]) -> Result<()> {
        self.writes.push(data.to_vec());
        Ok(())
    }

    fn read_until(&mut self, _delimiter: u8, buf: &mut Vec<u8>) -> Result<usize> {
        Ok(self.next(buf))
    }

    fn read_frame(&mut self, buf: &mut Vec<u8>) -> Result<usize> {
        Ok(self.next(buf))
    }

    fn set_baud_rate(&mut self, baud: u32) -> Result<()> {
        self.baud = baud;
        Ok(())
    }
}

// ── Modbus register map ───────────────────────────────────────

/// Side effect of a register write: `(slave, register, value)`.
pub type WriteHook = fn(&mut ModbusSlave, u16, u16);

/// Emulated Modbus device.  Reads of unmapped registers get exception 2.
pub struct ModbusSlave {
    pub framer: Framer,
    pub address: u8,
    pub registers: BTreeMap<u16, u16>,
    /// Decoded request bodies, in order.
    pub requests: Vec<Vec<u8>>,
    /// Requests to ignore before answering again.
    pub drop_next: usize,
    /// Apply writes without echoing them.
    pub silent_writes: bool,
    pub on_write: Option<WriteHook>,
    pub baud: u32,
    pending: Option<Vec<u8>>,
}

#[allow(dead_code)]
impl ModbusSlave {
    pub fn new(framer: Framer, address: u8) -> Self {
        Self {
            framer,
            address,
            registers: BTreeMap::new(),
            requests: Vec::new(),
            drop_next: 0,
            silent_writes: false,
            on_write: None,
            baud: 9600,
            pending: None,
        }
    }

    pub fn with_registers(mut self, start: u16, words: &[u16]) -> Self {
        for (r, w) in (start..).zip(words) {
            self.registers.insert(r, *w);
        }
        self
    }

    pub fn with_hook(mut self, hook: WriteHook) -> Self {
        self.on_write = Some(hook);
        self
    }

    pub fn register(&self, r: u16) -> Option<u16> {
        self.registers.get(&r).copied()
    }

    fn answer(&mut self, address: u8, function: u8, register: u16, operand: u16) -> Option<Vec<u8>> {
        match function {
            0x03 => {
                let words: Option<Vec<u16>> = (u32::from(register)..u32::from(register) + u32::from(operand))
                    .map(|r| self.registers.get(&(r as u16)).copied())
                    .collect();
                Some(match words {
                    Some(words) => {
                        let mut reply = vec![address, function, (words.len() * 2) as u8];
                        for w in words {
                            reply.extend_from_slice(&w.to_be_bytes());
                        }
                        reply
                    }
                    None => vec![address, function | 0x80, 0x02],
                })
            }
            0x06 => {
                self.registers.insert(register, operand);
                let [rh, rl] = register.to_be_bytes();
                let [vh, vl] = operand.to_be_bytes();
                let echo = vec![address, function, rh, rl, vh, vl];
                if let Some(hook) = self.on_write {
                    hook(self, register, operand);
                }
                (!self.silent_writes).then_some(echo)
            }
            f => Some(vec![address, f | 0x80, 0x01]),
        }
    }
}

impl SerialLink for ModbusSlave {
    fn write_all(&mut self, data: &[u8]) -> Result<()> {
        self.pending = None;
        let Ok(body) = self.framer.decode(data) else {
            return Ok(());
        };
        self.requests.push(body.clone());
        let [address, function, rh, rl, oh, ol] = body[..] else {
            return Ok(());
        };
        if address != self.address {
            return Ok(());
        }
        if self.drop_next > 0 {
            self.drop_next -= 1;
            return Ok(());
        }
        let register = u16::from_be_bytes([rh, rl]);
        let operand = u16::from_be_bytes([oh, ol]);
        self.pending = self
            .answer(address, function, register, operand)
            .map(|reply| self.framer.encode(&reply));
        Ok(())
    }

    fn read_until(&mut self, _delimiter: u8, buf: &mut Vec<u8>) -> Result<usize> {
        self.read_frame(buf)
    }

    fn read_frame(&mut self, buf: &mut Vec<u8>) -> Result<usize> {
        let reply = self.pending.take().unwrap_or_default();
        buf.extend_from_slice(&reply);
        Ok(reply.len())
    }

    fn set_baud_rate(&mut self, baud: u32) -> Result<()> {
        self.baud = baud;
        Ok(())
    }
}
