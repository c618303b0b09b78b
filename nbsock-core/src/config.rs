//! Provided I/O tuning constants.
//!
//! These are inputs to the retry/backoff machinery, not values the library
//! derives. Every retrying operation sleeps between [`WAIT_STEP_MIN`] and
//! [`WAIT_STEP_MAX`] per attempt and gives up after [`MAX_RETRIES`]
//! consecutive not-ready attempts.

use std::time::Duration;

/// Shortest wait between retries of a not-ready operation.
pub const WAIT_STEP_MIN: Duration = Duration::from_millis(25);

/// Longest wait between retries of a not-ready operation.
pub const WAIT_STEP_MAX: Duration = Duration::from_millis(250);

/// Chunk size for send loops and receive buffers, in bytes.
pub const PACKET_SIZE: usize = 8_192;

/// Consecutive not-ready attempts tolerated before an operation fails.
pub const MAX_RETRIES: usize = 100;
