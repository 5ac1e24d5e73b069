use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::context::MessageContext;
use crate::error::HandlerError;

/// A pluggable unit that observes or mutates a message in flight.
///
/// Handlers are shared across exchanges, so every operation takes `&self`;
/// stateful handlers use interior mutability.
pub trait Handler: Send + Sync {
    /// Name used in diagnostics.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Process a normal message. `Ok(false)` stops forward processing.
    fn handle_message(&self, ctx: &mut dyn MessageContext) -> Result<bool, HandlerError>;

    /// Process a fault. `Ok(false)` stops fault processing.
    fn handle_fault(&self, ctx: &mut dyn MessageContext) -> Result<bool, HandlerError>;

    /// Release per-exchange resources. Called at most once per exchange.
    fn close(&self, ctx: &mut dyn MessageContext) -> Result<(), HandlerError>;
}

/// Static capability tag of a handler.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HandlerKind {
    Logical,
    Protocol,
}

impl fmt::Display for HandlerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandlerKind::Logical => write!(f, "logical"),
            HandlerKind::Protocol => write!(f, "protocol"),
        }
    }
}

/// Anything that carries a static [`HandlerKind`].
pub trait Classified {
    fn kind(&self) -> HandlerKind;
}

impl Classified for HandlerKind {
    fn kind(&self) -> HandlerKind {
        *self
    }
}

/// A registered handler together with its capability tag.
#[derive(Clone)]
pub enum ChainHandler {
    Logical(Arc<dyn Handler>),
    Protocol(Arc<dyn Handler>),
}

impl ChainHandler {
    pub fn logical(handler: Arc<dyn Handler>) -> Self {
        ChainHandler::Logical(handler)
    }

    pub fn protocol(handler: Arc<dyn Handler>) -> Self {
        ChainHandler::Protocol(handler)
    }

    pub fn handler(&self) -> &dyn Handler {
        match self {
            ChainHandler::Logical(h) | ChainHandler::Protocol(h) => h.as_ref(),
        }
    }

    pub fn name(&self) -> &str {
        self.handler().name()
    }
}

impl Classified for ChainHandler {
    fn kind(&self) -> HandlerKind {
        match self {
            ChainHandler::Logical(_) => HandlerKind::Logical,
            ChainHandler::Protocol(_) => HandlerKind::Protocol,
        }
    }
}

impl fmt::Debug for ChainHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainHandler")
            .field("kind", &self.kind())
            .field("name", &self.name())
            .finish()
    }
}

/// Slot of a handler in the partitioned chain.
///
/// Ledger membership and close de-duplication key on the slot, so the same
/// handler object registered twice is two distinct chain entries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HandlerId(pub usize);

impl fmt::Display for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::PropertyContext;

    struct Passthrough;

    impl Handler for Passthrough {
        fn handle_message(&self, _ctx: &mut dyn MessageContext) -> Result<bool, HandlerError> {
            Ok(true)
        }

        fn handle_fault(&self, _ctx: &mut dyn MessageContext) -> Result<bool, HandlerError> {
            Ok(true)
        }

        fn close(&self, _ctx: &mut dyn MessageContext) -> Result<(), HandlerError> {
            Ok(())
        }
    }

    #[test]
    fn chain_handler_reports_kind() {
        let logical = ChainHandler::logical(Arc::new(Passthrough));
        let protocol = ChainHandler::protocol(Arc::new(Passthrough));
        assert_eq!(logical.kind(), HandlerKind::Logical);
        assert_eq!(protocol.kind(), HandlerKind::Protocol);
    }

    #[test]
    fn default_name_is_type_name() {
        let handler = ChainHandler::logical(Arc::new(Passthrough));
        assert!(handler.name().ends_with("Passthrough"));

        let mut ctx = PropertyContext::logical();
        assert!(handler.handler().handle_message(&mut ctx).unwrap());
    }
}
