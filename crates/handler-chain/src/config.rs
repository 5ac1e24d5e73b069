use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::ledger::Direction;

/// Configuration for a [`HandlerChainInvoker`](crate::HandlerChainInvoker).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InvokerConfig {
    /// Whether the exchange expects a response (default: true).
    /// One-way exchanges set this to false.
    pub response_expected: bool,
    /// Direction the exchange starts in (default: outbound)
    pub initial_direction: Direction,
    /// Keep a journal of every handler call (default: true)
    pub record_journal: bool,
}

impl Default for InvokerConfig {
    fn default() -> Self {
        Self {
            response_expected: true,
            initial_direction: Direction::Outbound,
            record_journal: true,
        }
    }
}

impl InvokerConfig {
    /// Parse a JSON document; missing fields take their defaults.
    pub fn from_json(source: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(source)?)
    }

    /// Config for a one-way exchange.
    pub fn one_way() -> Self {
        Self {
            response_expected: false,
            ..Self::default()
        }
    }

    /// Config for a responder, which sees the request inbound first.
    pub fn responder() -> Self {
        Self {
            initial_direction: Direction::Inbound,
            ..Self::default()
        }
    }
}
