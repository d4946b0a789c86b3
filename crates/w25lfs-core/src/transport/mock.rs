//! Recording mock transport used by the unit tests
//!
//! Keeps every chip-select frame, serves reads from a flat memory image and
//! answers identification reads from queued replies. Program and erase land
//! in memory so round trips can be checked; chip behaviour beyond that lives
//! in the `w25lfs-dummy` emulator.

use std::collections::VecDeque;
use std::vec;
use std::vec::Vec;

use crate::error::{Error, Phase, Result};
use crate::spi::{opcodes, AddressWidth};
use crate::transport::Transport;

pub(crate) const MOCK_SIZE: usize = 64 * 1024;

/// One chip-select frame as seen on the wire
#[derive(Debug, Clone)]
pub(crate) struct Frame {
    pub tx: Vec<u8>,
    pub rx_len: usize,
}

impl Frame {
    pub fn opcode(&self) -> u8 {
        self.tx.first().copied().unwrap_or(0)
    }

    pub fn address(&self) -> Option<u32> {
        AddressWidth::ThreeByte.decode(self.tx.get(1..).unwrap_or(&[]))
    }
}

pub(crate) struct MockTransport {
    pub memory: Vec<u8>,
    pub frames: Vec<Frame>,
    pub replies: VecDeque<Vec<u8>>,
    pub selected: bool,
    pub selects: u32,
    pub deselects: u32,
    pub busy_after_mutation: u32,
    pub busy_remaining: u32,
    pub stuck_busy: bool,
    pub ignored_while_busy: u32,
    pub fail_transmit: bool,
    pub fail_receive: bool,
    pub last_transmit_timeout: Option<u32>,
    pub last_receive_timeout: Option<u32>,
    pub delayed_us: u64,
    pub max_read: usize,
    tx: Vec<u8>,
    rx_len: usize,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            memory: vec![0xFF; MOCK_SIZE],
            frames: Vec::new(),
            replies: VecDeque::new(),
            selected: false,
            selects: 0,
            deselects: 0,
            busy_after_mutation: 0,
            busy_remaining: 0,
            stuck_busy: false,
            ignored_while_busy: 0,
            fail_transmit: false,
            fail_receive: false,
            last_transmit_timeout: None,
            last_receive_timeout: None,
            delayed_us: 0,
            max_read: usize::MAX,
            tx: Vec::new(),
            rx_len: 0,
        }
    }

    /// Queue the bytes returned by the next non-memory read
    pub fn reply(&mut self, bytes: &[u8]) {
        self.replies.push_back(bytes.to_vec());
    }

    /// Frames whose opcode matches
    pub fn frames_with(&self, opcode: u8) -> Vec<&Frame> {
        self.frames.iter().filter(|f| f.opcode() == opcode).collect()
    }

    /// (address, length) of every page program frame
    pub fn programs(&self) -> Vec<(u32, usize)> {
        self.frames_with(opcodes::PP)
            .iter()
            .map(|f| (f.address().unwrap_or(0), f.tx.len() - 4))
            .collect()
    }

    /// Sequence of opcodes in frame order
    pub fn opcodes(&self) -> Vec<u8> {
        self.frames.iter().map(Frame::opcode).collect()
    }

    fn busy(&self) -> bool {
        self.stuck_busy || self.busy_remaining > 0
    }

    fn address(&self) -> usize {
        AddressWidth::ThreeByte
            .decode(self.tx.get(1..).unwrap_or(&[]))
            .unwrap_or(0) as usize
    }

    fn respond(&mut self, buf: &mut [u8]) {
        match self.tx.first().copied() {
            Some(opcodes::RDSR) => {
                let busy = self.busy();
                self.busy_remaining = self.busy_remaining.saturating_sub(1);
                buf.fill(busy as u8);
            }
            Some(opcodes::READ) | Some(opcodes::FAST_READ) => {
                let addr = self.address();
                for (i, dst) in buf.iter_mut().enumerate() {
                    *dst = self.memory.get(addr + i).copied().unwrap_or(0xFF);
                }
            }
            _ => {
                buf.fill(0xFF);
                if let Some(reply) = self.replies.pop_front() {
                    let n = reply.len().min(buf.len());
                    buf[..n].copy_from_slice(&reply[..n]);
                }
            }
        }
    }

    fn apply(&mut self) {
        let opcode = self.tx.first().copied().unwrap_or(0);
        let mutation = matches!(
            opcode,
            opcodes::PP
                | opcodes::SE_20
                | opcodes::CE_60
                | opcodes::WRSR
                | opcodes::WRSR2
                | opcodes::WRSR3
        );
        if !mutation {
            return;
        }
        if self.busy() {
            self.ignored_while_busy += 1;
            return;
        }

        let addr = self.address();
        match opcode {
            opcodes::PP => {
                for (i, byte) in self.tx[4..].iter().enumerate() {
                    if let Some(cell) = self.memory.get_mut(addr + i) {
                        *cell &= byte;
                    }
                }
            }
            opcodes::SE_20 => {
                let end = (addr + opcodes::SECTOR_SIZE as usize).min(MOCK_SIZE);
                if addr < end {
                    self.memory[addr..end].fill(0xFF);
                }
            }
            opcodes::CE_60 => self.memory.fill(0xFF),
            _ => {}
        }
        self.busy_remaining = self.busy_after_mutation;
    }
}

impl Transport for MockTransport {
    fn select(&mut self) -> Result<()> {
        assert!(!self.selected, "nested chip-select");
        self.selected = true;
        self.selects += 1;
        self.tx.clear();
        self.rx_len = 0;
        Ok(())
    }

    fn deselect(&mut self) -> Result<()> {
        self.selected = false;
        self.deselects += 1;
        self.frames.push(Frame {
            tx: self.tx.clone(),
            rx_len: self.rx_len,
        });
        if self.rx_len == 0 {
            self.apply();
        }
        Ok(())
    }

    fn transmit(&mut self, data: &[u8], timeout_ms: u32) -> Result<()> {
        assert!(self.selected, "transmit without chip-select");
        self.last_transmit_timeout = Some(timeout_ms);
        if self.fail_transmit {
            return Err(Error::TransportTimeout(Phase::Transmit));
        }
        self.tx.extend_from_slice(data);
        Ok(())
    }

    fn receive(&mut self, buf: &mut [u8], timeout_ms: u32) -> Result<()> {
        assert!(self.selected, "receive without chip-select");
        self.last_receive_timeout = Some(timeout_ms);
        if self.fail_receive {
            return Err(Error::TransportTimeout(Phase::Receive));
        }
        self.rx_len += buf.len();
        self.respond(buf);
        Ok(())
    }

    fn max_read_len(&self) -> usize {
        self.max_read
    }

    fn delay_us(&mut self, us: u32) {
        self.delayed_us += us as u64;
    }
}
