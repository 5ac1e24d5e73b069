use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A protocol-level fault raised by a handler.
///
/// This is the "soft" fault class: the chain answers it by reversing the
/// message direction and walking the fault sub-machine, rather than tearing
/// the exchange down outright.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProtocolFault {
    /// Fault code (e.g. `Client`, `Server`, `MustUnderstand`)
    pub code: String,
    /// Human readable fault string
    pub reason: String,
    /// Optional structured detail carried with the fault
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<serde_json::Value>,
}

impl ProtocolFault {
    pub fn new(code: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            reason: reason.into(),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: serde_json::Value) -> Self {
        self.detail = Some(detail);
        self
    }
}

impl std::fmt::Display for ProtocolFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.reason)
    }
}

/// Errors a handler may raise from `handle_message`, `handle_fault` or `close`.
#[derive(Error, Clone, Debug, PartialEq)]
pub enum HandlerError {
    /// Recognized protocol fault; drives the fault sub-machine when a
    /// response is expected.
    #[error("protocol fault: {0}")]
    Protocol(ProtocolFault),

    /// Any other failure. Fatal to the exchange: the chain closes every
    /// invoked handler and re-raises immediately.
    #[error("handler runtime error: {0}")]
    Runtime(String),
}

impl HandlerError {
    /// Shorthand for a [`HandlerError::Protocol`] fault.
    pub fn protocol(code: impl Into<String>, reason: impl Into<String>) -> Self {
        HandlerError::Protocol(ProtocolFault::new(code, reason))
    }

    /// Shorthand for a [`HandlerError::Runtime`] error.
    pub fn runtime(message: impl Into<String>) -> Self {
        HandlerError::Runtime(message.into())
    }

    /// Is this the protocol-level ("soft") fault class?
    pub fn is_protocol(&self) -> bool {
        matches!(self, HandlerError::Protocol(_))
    }

    /// The protocol fault carried by this error, if any.
    pub fn as_protocol_fault(&self) -> Option<&ProtocolFault> {
        match self {
            HandlerError::Protocol(fault) => Some(fault),
            HandlerError::Runtime(_) => None,
        }
    }
}

impl From<ProtocolFault> for HandlerError {
    fn from(fault: ProtocolFault) -> Self {
        HandlerError::Protocol(fault)
    }
}

/// Errors from loading invoker configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid invoker configuration: {0}")]
    Parse(#[from] serde_json::Error),
}
