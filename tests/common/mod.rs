//! Common test utilities and helpers

#![allow(dead_code)] // Test utilities may not all be used in every test file

pub mod builders;
pub mod reference;

use pipeliner_rs::pipeline::{Chunk, Mailbox};
use std::time::Duration;

/// Upper bound on how long a test waits for a running pipeline
pub fn test_timeout() -> Duration {
    Duration::from_secs(10)
}

/// Block until `mailbox` yields `End`, panicking after `timeout`.
pub fn wait_for_end(mailbox: &Mailbox, timeout: Duration) {
    let deadline = std::time::Instant::now() + timeout;
    loop {
        let remaining = deadline.saturating_duration_since(std::time::Instant::now());
        assert!(!remaining.is_zero(), "timed out waiting for End");
        if let Some(Chunk::End) = mailbox.retrieve_timeout(remaining) {
            return;
        }
    }
}
