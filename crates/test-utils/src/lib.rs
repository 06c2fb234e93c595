//! Shared helpers for `actiongraph` integration tests.
//!
//! - [`builders`] assembles project configs in code.
//! - [`mock_task`] provides scriptable tasks and a call log for solver tests.

pub mod builders;
pub mod mock_task;

use std::future::Future;
use std::sync::Once;
use std::time::Duration;

use tracing_subscriber::{EnvFilter, fmt};

pub use mock_task::{Call, MockEvent, MockGraph, MockSpec, MockStatus};

/// Upper bound for a single solve in tests. A hung solver fails the test
/// instead of hanging the suite.
pub const TEST_TIMEOUT: Duration = Duration::from_secs(5);

static INIT: Once = Once::new();

/// Install a test-writer subscriber once per test binary.
///
/// Output only shows for failing tests (or with `--nocapture`). The filter
/// comes from `RUST_LOG`, e.g. `RUST_LOG=actiongraph=debug cargo test`,
/// and defaults to `info`.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .init();
    });
}

/// Await `f`, panicking if it takes longer than [`TEST_TIMEOUT`].
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: Future<Output = T>,
{
    with_timeout_of(TEST_TIMEOUT, f).await
}

pub async fn with_timeout_of<F, T>(limit: Duration, f: F) -> T
where
    F: Future<Output = T>,
{
    match tokio::time::timeout(limit, f).await {
        Ok(value) => value,
        Err(_) => panic!("test future did not finish within {limit:?}"),
    }
}
