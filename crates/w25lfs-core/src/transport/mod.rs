//! Chip-select framed SPI transport
//!
//! A [`Transport`] moves raw bytes; [`execute`] is the only place that frames
//! a [`SpiCommand`] into one assert-select / transmit / receive /
//! deassert-select transaction. Chip-select is a single shared line, so a
//! transaction is never interleaved with another one: the `&mut` borrow of
//! the transport is the whole locking story and the driver does none of its
//! own.

#[cfg(test)]
pub(crate) mod mock;

use crate::error::Result;
use crate::spi::{SpiCommand, MAX_HEADER_LEN};

/// Transmit deadline used by the reference board (ms)
pub const DEFAULT_TRANSMIT_TIMEOUT_MS: u32 = 2000;
/// Receive deadline used by the reference board (ms)
///
/// Longer than transmit since a receive may carry a whole sector.
pub const DEFAULT_RECEIVE_TIMEOUT_MS: u32 = 5000;

/// Per-phase deadlines handed to every transmit and receive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadlines {
    /// Deadline for one transmit call in milliseconds
    pub transmit_ms: u32,
    /// Deadline for one receive call in milliseconds
    pub receive_ms: u32,
}

impl Default for Deadlines {
    fn default() -> Self {
        Self {
            transmit_ms: DEFAULT_TRANSMIT_TIMEOUT_MS,
            receive_ms: DEFAULT_RECEIVE_TIMEOUT_MS,
        }
    }
}

/// Byte-level SPI link to one flash chip
///
/// Implementations are synchronous and blocking. A transmit or receive that
/// does not finish within its deadline fails with
/// [`Error::TransportTimeout`](crate::Error::TransportTimeout); nothing is
/// retried at this layer.
///
/// ## Example: wrapping a vendor HAL
///
/// ```ignore
/// impl Transport for Board {
///     fn select(&mut self) -> Result<()> { self.cs.set_low(); Ok(()) }
///     fn deselect(&mut self) -> Result<()> { self.cs.set_high(); Ok(()) }
///     fn transmit(&mut self, data: &[u8], timeout_ms: u32) -> Result<()> {
///         self.spi.transmit(data, timeout_ms).map_err(|_| Error::TransportTimeout(Phase::Transmit))
///     }
///     // ...
/// }
/// ```
pub trait Transport {
    /// Assert chip-select
    fn select(&mut self) -> Result<()>;

    /// Deassert chip-select, ending the transaction
    fn deselect(&mut self) -> Result<()>;

    /// Clock out `data`
    fn transmit(&mut self, data: &[u8], timeout_ms: u32) -> Result<()>;

    /// Clock in `buf.len()` bytes
    fn receive(&mut self, buf: &mut [u8], timeout_ms: u32) -> Result<()>;

    /// Largest receive phase this link can carry in one transaction
    fn max_read_len(&self) -> usize {
        usize::MAX
    }

    /// Block for the given number of microseconds
    fn delay_us(&mut self, us: u32);

    /// Block for the given number of milliseconds
    fn delay_ms(&mut self, ms: u32) {
        self.delay_us(ms.saturating_mul(1000));
    }
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn select(&mut self) -> Result<()> {
        (**self).select()
    }

    fn deselect(&mut self) -> Result<()> {
        (**self).deselect()
    }

    fn transmit(&mut self, data: &[u8], timeout_ms: u32) -> Result<()> {
        (**self).transmit(data, timeout_ms)
    }

    fn receive(&mut self, buf: &mut [u8], timeout_ms: u32) -> Result<()> {
        (**self).receive(buf, timeout_ms)
    }

    fn max_read_len(&self) -> usize {
        (**self).max_read_len()
    }

    fn delay_us(&mut self, us: u32) {
        (**self).delay_us(us)
    }

    fn delay_ms(&mut self, ms: u32) {
        (**self).delay_ms(ms)
    }
}

// Boxed transports let the CLI pick a backend at runtime
#[cfg(feature = "alloc")]
impl<T: Transport + ?Sized> Transport for alloc::boxed::Box<T> {
    fn select(&mut self) -> Result<()> {
        (**self).select()
    }

    fn deselect(&mut self) -> Result<()> {
        (**self).deselect()
    }

    fn transmit(&mut self, data: &[u8], timeout_ms: u32) -> Result<()> {
        (**self).transmit(data, timeout_ms)
    }

    fn receive(&mut self, buf: &mut [u8], timeout_ms: u32) -> Result<()> {
        (**self).receive(buf, timeout_ms)
    }

    fn max_read_len(&self) -> usize {
        (**self).max_read_len()
    }

    fn delay_us(&mut self, us: u32) {
        (**self).delay_us(us)
    }

    fn delay_ms(&mut self, ms: u32) {
        (**self).delay_ms(ms)
    }
}

/// Run one command as a single chip-select framed transaction
///
/// The header (opcode, address, dummy bytes) and the payload are transmitted
/// back to back, then the read buffer is filled. Chip-select is released even
/// when a phase fails; the first error wins.
pub fn execute<T: Transport + ?Sized>(
    transport: &mut T,
    cmd: &mut SpiCommand<'_>,
    deadlines: Deadlines,
) -> Result<()> {
    let mut header = [0u8; MAX_HEADER_LEN];
    let header_len = cmd.encode_header(&mut header);

    log::trace!(
        "spi: op=0x{:02X} addr={:?} tx={} rx={}",
        cmd.opcode,
        cmd.address,
        cmd.write_data.len(),
        cmd.read_buf.len()
    );

    transport.select()?;
    let result = run_phases(transport, &header[..header_len], cmd, deadlines);
    let released = transport.deselect();
    result.and(released)
}

fn run_phases<T: Transport + ?Sized>(
    transport: &mut T,
    header: &[u8],
    cmd: &mut SpiCommand<'_>,
    deadlines: Deadlines,
) -> Result<()> {
    transport.transmit(header, deadlines.transmit_ms)?;
    if cmd.has_write() {
        transport.transmit(cmd.write_data, deadlines.transmit_ms)?;
    }
    if cmd.has_read() {
        transport.receive(cmd.read_buf, deadlines.receive_ms)?;
    }
    Ok(())
}
