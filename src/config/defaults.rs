//! Default configuration values.

/// Delay before reconnecting to the dispatcher after the connection drops.
pub const RECONNECT_DELAY_MS: u64 = 5_000;

/// Bound on writing one frame to the dispatcher.
pub const WRITE_TIMEOUT_MS: u64 = 10_000;

/// Overall bound on waiting for a remote verdict.
pub const POLL_TIMEOUT_MS: u64 = 60_000;

/// Pause between two status checks while waiting for a verdict.
pub const POLL_INTERVAL_MS: u64 = 1_000;

/// Bound on any single backend request (login, submit, compile info).
pub const REQUEST_TIMEOUT_MS: u64 = 30_000;

/// Tier-3 delay before the last submit attempt ("submitted too quickly").
pub const SUBMIT_BACKOFF_MS: u64 = 5_000;

pub(crate) fn reconnect_delay_ms() -> u64 {
    RECONNECT_DELAY_MS
}

pub(crate) fn write_timeout_ms() -> u64 {
    WRITE_TIMEOUT_MS
}

pub(crate) fn poll_timeout_ms() -> u64 {
    POLL_TIMEOUT_MS
}

pub(crate) fn poll_interval_ms() -> u64 {
    POLL_INTERVAL_MS
}

pub(crate) fn submit_backoff_ms() -> u64 {
    SUBMIT_BACKOFF_MS
}

pub(crate) fn request_timeout_ms() -> u64 {
    REQUEST_TIMEOUT_MS
}
