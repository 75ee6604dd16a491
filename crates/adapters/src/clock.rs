//! Wall-clock adapter.

use crate::logger::now_epoch_ms;
use code_agent_ports::ClockPort;

/// Reads the system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl ClockPort for SystemClock {
    fn now_ms(&self) -> u64 {
        now_epoch_ms()
    }
}
