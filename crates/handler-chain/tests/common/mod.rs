//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Once};

use handler_chain::mocks::{CallLog, MockHandler};
use handler_chain::ChainHandler;
use tracing_subscriber::EnvFilter;

static TRACING: Once = Once::new();

/// Install a test-writer subscriber once per test binary.
///
/// Honors `RUST_LOG`, e.g. `RUST_LOG=handler_chain=debug`.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

pub fn logical(handler: MockHandler) -> ChainHandler {
    ChainHandler::logical(Arc::new(handler))
}

pub fn protocol(handler: MockHandler) -> ChainHandler {
    ChainHandler::protocol(Arc::new(handler))
}

/// Logical handlers that always continue.
pub fn logical_chain(log: &CallLog, names: &[&str]) -> Vec<ChainHandler> {
    names
        .iter()
        .map(|name| logical(MockHandler::new(*name, log)))
        .collect()
}

/// Protocol handlers that always continue.
pub fn protocol_chain(log: &CallLog, names: &[&str]) -> Vec<ChainHandler> {
    names
        .iter()
        .map(|name| protocol(MockHandler::new(*name, log)))
        .collect()
}
