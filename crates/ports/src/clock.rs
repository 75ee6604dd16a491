//! Wall-clock boundary contract.

/// Source of record timestamps.
pub trait ClockPort: Send + Sync {
    /// Milliseconds since the Unix epoch.
    fn now_ms(&self) -> u64;
}
