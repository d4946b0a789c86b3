//! Deadlines and busy-poll budgets

use crate::transport::Deadlines;

/// How often and for how long to poll the busy bit
///
/// Typical values for W25Q parts:
/// * Page program: 10us poll, 10ms timeout (typical 0.7-3ms)
/// * 4KB sector erase: 10ms poll, 1s timeout (typical 45-400ms)
/// * Chip erase: 1s poll, 200s timeout
/// * Status register write: 10ms poll, 500ms timeout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Delay between two status reads in microseconds
    pub interval_us: u32,
    /// Total budget in microseconds
    pub timeout_us: u32,
}

impl PollPolicy {
    /// Create a new policy
    pub const fn new(interval_us: u32, timeout_us: u32) -> Self {
        Self {
            interval_us,
            timeout_us,
        }
    }

    /// Number of status reads before giving up, never zero
    pub fn max_polls(&self) -> u32 {
        let polls = if self.interval_us > 0 {
            self.timeout_us / self.interval_us
        } else {
            self.timeout_us
        };
        polls.max(1)
    }
}

/// Every timing constant the driver uses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    /// Transport phase deadlines
    pub deadlines: Deadlines,
    /// Settle time after a software reset in milliseconds
    pub reset_settle_ms: u32,
    /// Busy wait after a page program
    pub page_program: PollPolicy,
    /// Busy wait after a sector erase
    pub sector_erase: PollPolicy,
    /// Busy wait after a chip erase
    pub chip_erase: PollPolicy,
    /// Busy wait after a status register write
    pub status_write: PollPolicy,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            deadlines: Deadlines::default(),
            reset_settle_ms: 100,
            page_program: PollPolicy::new(10, 10_000),
            sector_erase: PollPolicy::new(10_000, 1_000_000),
            chip_erase: PollPolicy::new(1_000_000, 200_000_000),
            status_write: PollPolicy::new(10_000, 500_000),
        }
    }
}
