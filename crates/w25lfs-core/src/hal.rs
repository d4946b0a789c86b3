//! [`Transport`] over `embedded-hal` 1.0 traits
//!
//! Microcontroller builds drive the chip through an exclusive [`SpiBus`], a
//! chip-select [`OutputPin`] and a [`DelayNs`]. Any bus or pin error is
//! reported as [`Error::TransportFailed`].
//!
//! # Deadlines
//!
//! The per-phase timeout arguments are not enforced here and this transport
//! never returns [`Error::TransportTimeout`]. `SpiBus::write` and
//! `SpiBus::read` block until the peripheral has shifted every word, so a
//! transfer lasts its length at the SPI clock the HAL was configured with.
//! A peripheral that never completes has to be caught below this layer, by
//! the HAL driver's own bus timeout or by the target's watchdog. Chip busy
//! time is still bounded by the poll budget of
//! [`FlashDevice::wait_ready`](crate::device::FlashDevice::wait_ready).

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use embedded_hal::spi::SpiBus;

use crate::error::{Error, Result};
use crate::transport::Transport;

/// SPI bus, chip-select pin and delay bundled as a transport
pub struct HalTransport<SPI, CS, D> {
    spi: SPI,
    cs: CS,
    delay: D,
}

impl<SPI, CS, D> HalTransport<SPI, CS, D>
where
    SPI: SpiBus<u8>,
    CS: OutputPin,
    D: DelayNs,
{
    /// Take ownership of the peripherals and park chip-select high
    pub fn new(spi: SPI, mut cs: CS, delay: D) -> Result<Self> {
        cs.set_high().map_err(|_| Error::TransportFailed)?;
        Ok(Self { spi, cs, delay })
    }

    /// Give the peripherals back
    pub fn release(self) -> (SPI, CS, D) {
        (self.spi, self.cs, self.delay)
    }
}

impl<SPI, CS, D> Transport for HalTransport<SPI, CS, D>
where
    SPI: SpiBus<u8>,
    CS: OutputPin,
    D: DelayNs,
{
    fn select(&mut self) -> Result<()> {
        self.cs.set_low().map_err(|_| Error::TransportFailed)
    }

    fn deselect(&mut self) -> Result<()> {
        // Clock out everything before raising CS
        let flushed = self.spi.flush().map_err(|_| Error::TransportFailed);
        let released = self.cs.set_high().map_err(|_| Error::TransportFailed);
        flushed.and(released)
    }

    // Bounded by the HAL, see the module docs
    fn transmit(&mut self, data: &[u8], _timeout_ms: u32) -> Result<()> {
        self.spi.write(data).map_err(|_| Error::TransportFailed)
    }

    fn receive(&mut self, buf: &mut [u8], _timeout_ms: u32) -> Result<()> {
        self.spi.read(buf).map_err(|_| Error::TransportFailed)
    }

    fn delay_us(&mut self, us: u32) {
        self.delay.delay_us(us);
    }

    fn delay_ms(&mut self, ms: u32) {
        self.delay.delay_ms(ms);
    }
}
