//! Handler Chain Invoker: runs an ordered list of message handlers against
//! an in-flight RPC request or response.
//!
//! Handlers are registered as one flat list and split into two subsets that
//! the pipeline invokes separately: **logical** handlers (protocol-agnostic)
//! and **protocol** handlers (envelope-aware). Each subset keeps its
//! registration order.
//!
//! ## Invocation Rules
//!
//! - **Ordering**: outbound messages visit a subset in registration order,
//!   inbound messages in reverse registration order.
//! - **Direction reversal**: a handler returning `false` while a response is
//!   expected turns the message around. The next walk resumes at the
//!   handler's predecessor in the new direction; the handler that stopped
//!   processing is not revisited. Once the message has travelled back
//!   through every handler it reached, the original direction is restored.
//! - **Faults**: a protocol fault reverses the direction and runs
//!   `handle_fault` back over the handlers that preceded the thrower. Any
//!   other error closes the chain and is re-raised untouched.
//! - **One-way exchanges**: with no response expected, a `false` or a fault
//!   closes every invoked handler instead of reversing.
//! - **Close**: every invoked handler is closed exactly once, most recently
//!   invoked first, either on a terminal outcome or at
//!   [`HandlerChainInvoker::mep_complete`].
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use handler_chain::mocks::{CallLog, MockHandler};
//! use handler_chain::{ChainHandler, HandlerChainInvoker, PropertyContext};
//!
//! let log = CallLog::new();
//! let mut invoker = HandlerChainInvoker::new(vec![
//!     ChainHandler::protocol(Arc::new(MockHandler::new("security", &log))),
//!     ChainHandler::logical(Arc::new(MockHandler::new("audit", &log))),
//! ]);
//!
//! let mut ctx = PropertyContext::logical();
//! assert!(invoker.invoke_logical_handlers(true, &mut ctx).unwrap());
//! let mut ctx = PropertyContext::protocol();
//! assert!(invoker.invoke_protocol_handlers(true, &mut ctx).unwrap());
//! invoker.mep_complete(&mut ctx).unwrap();
//! assert!(invoker.is_closed());
//! ```

pub mod chain;
pub mod config;
pub mod context;
pub mod error;
pub mod handler;
pub mod invoker;
pub mod ledger;
pub mod mocks;

pub use chain::{partition, HandlerChain};
pub use config::InvokerConfig;
pub use context::{ContextKind, MessageContext, PropertyContext, MESSAGE_OUTBOUND_PROPERTY};
pub use error::{ConfigError, HandlerError, ProtocolFault};
pub use handler::{ChainHandler, Classified, Handler, HandlerId, HandlerKind};
pub use invoker::HandlerChainInvoker;
pub use ledger::{Direction, Fault, InvocationLedger, InvocationRecord, Phase, SubsetCursor};
