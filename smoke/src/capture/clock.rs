/// Wall-clock milliseconds since the Unix epoch.
pub type Timestamp = f64;

/// Source of the capture start time.
pub trait Clock {
    fn now(&self) -> Timestamp;
}

/// Reads the system clock.
///
/// `std::time::SystemTime` is unavailable on `wasm32-unknown-unknown`; the
/// browser host provides its own clock backed by `Date.now()`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs_f64() * 1000.0)
            .unwrap_or(0.0)
    }
}
