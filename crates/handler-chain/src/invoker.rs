use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use crate::chain::HandlerChain;
use crate::config::InvokerConfig;
use crate::context::MessageContext;
use crate::error::HandlerError;
use crate::handler::{ChainHandler, HandlerId, HandlerKind};
use crate::ledger::{Direction, Fault, InvocationLedger, InvocationRecord, Phase};

/// Runs the registered handler chain for one message exchange.
///
/// The pipeline calls [`invoke_logical_handlers`](Self::invoke_logical_handlers)
/// and [`invoke_protocol_handlers`](Self::invoke_protocol_handlers) at its two
/// handler phases, in whichever order the current direction requires, and
/// [`mep_complete`](Self::mep_complete) once the exchange is over.
///
/// Outcomes of a subset walk:
/// - every handler returned `true`: `Ok(true)`
/// - a handler returned `false`: the direction reverses (response expected)
///   or every invoked handler is closed (one-way); `Ok(false)`
/// - a handler raised a protocol fault: the fault is recorded and, if a
///   response is expected, `handle_fault` runs back over the handlers that
///   preceded it; the fault is re-raised unless a `handle_fault` stopped it
/// - a handler raised any other error: every invoked handler is closed and
///   the error is re-raised
///
/// One invoker belongs to exactly one exchange and is not reused.
pub struct HandlerChainInvoker {
    chain: HandlerChain,
    ledger: InvocationLedger,
    config: InvokerConfig,
    exchange_id: Uuid,
}

impl HandlerChainInvoker {
    /// Create an invoker with the default configuration.
    pub fn new(handlers: Vec<ChainHandler>) -> Self {
        Self::with_config(handlers, InvokerConfig::default())
    }

    pub fn with_config(handlers: Vec<ChainHandler>, config: InvokerConfig) -> Self {
        let chain = HandlerChain::new(handlers);
        let ledger = InvocationLedger::new(
            config.initial_direction,
            config.response_expected,
            config.record_journal,
        );
        let exchange_id = Uuid::new_v4();

        debug!(
            exchange = %exchange_id,
            logical = chain.logical().len(),
            protocol = chain.protocol().len(),
            direction = %config.initial_direction,
            "Handler chain invoker created"
        );

        Self {
            chain,
            ledger,
            config,
            exchange_id,
        }
    }

    /// Run `handle_message` over the logical handlers.
    ///
    /// Returns `Ok(true)` when the whole subset completed.
    pub fn invoke_logical_handlers(
        &mut self,
        is_requestor: bool,
        ctx: &mut dyn MessageContext,
    ) -> Result<bool, HandlerError> {
        self.invoke_handle_message(HandlerKind::Logical, is_requestor, ctx)
    }

    /// Run `handle_message` over the protocol handlers.
    pub fn invoke_protocol_handlers(
        &mut self,
        is_requestor: bool,
        ctx: &mut dyn MessageContext,
    ) -> Result<bool, HandlerError> {
        self.invoke_handle_message(HandlerKind::Protocol, is_requestor, ctx)
    }

    /// Run `handle_fault` over the logical handlers, for a message that is
    /// itself a fault.
    pub fn invoke_logical_handlers_handle_fault(
        &mut self,
        is_requestor: bool,
        ctx: &mut dyn MessageContext,
    ) -> Result<bool, HandlerError> {
        self.invoke_handle_fault(HandlerKind::Logical, is_requestor, ctx)
    }

    /// Run `handle_fault` over the protocol handlers.
    pub fn invoke_protocol_handlers_handle_fault(
        &mut self,
        is_requestor: bool,
        ctx: &mut dyn MessageContext,
    ) -> Result<bool, HandlerError> {
        self.invoke_handle_fault(HandlerKind::Protocol, is_requestor, ctx)
    }

    /// Close every invoked handler not yet closed, most recent first.
    ///
    /// Safe to call more than once; a handler is never closed twice.
    pub fn mep_complete(&mut self, ctx: &mut dyn MessageContext) -> Result<(), HandlerError> {
        info!(
            exchange = %self.exchange_id,
            invoked = self.ledger.invoked().len(),
            "Message exchange complete"
        );
        self.close_invoked(ctx)
    }

    fn invoke_handle_message(
        &mut self,
        kind: HandlerKind,
        is_requestor: bool,
        ctx: &mut dyn MessageContext,
    ) -> Result<bool, HandlerError> {
        self.ledger.set_requestor(is_requestor);

        let len = self.chain.subset(kind).len();
        if len == 0 {
            trace!(exchange = %self.exchange_id, kind = %kind, "No handlers registered");
            return Ok(true);
        }
        if self.ledger.is_closed() {
            warn!(
                exchange = %self.exchange_id,
                kind = %kind,
                "Handler chain already closed, not invoking handlers"
            );
            return Ok(false);
        }

        let direction = self.ledger.direction();
        ctx.set_outbound(direction.is_outbound());

        let mut step = self.ledger.cursor(kind).get(direction);
        while step < len {
            let index = direction.index_at(step, len);
            let id = self.chain.id_of(kind, index);
            step += 1;
            self.ledger.set_cursor(kind, direction, step);

            // After a reversal the message only travels back through
            // handlers it already passed.
            if self.ledger.is_reversed() && !self.ledger.was_invoked(id) {
                trace!(
                    exchange = %self.exchange_id,
                    handler = %id,
                    "Skipping handler not on reversed path"
                );
                continue;
            }

            let handler = &self.chain.subset(kind)[index];
            debug!(
                exchange = %self.exchange_id,
                handler = handler.name(),
                kind = %kind,
                direction = %direction,
                "Invoking handleMessage"
            );
            self.ledger.push_invoked(id);
            self.ledger.record(id, kind, Phase::HandleMessage);

            match handler.handler().handle_message(ctx) {
                Ok(true) => {}
                Ok(false) => return self.on_stop(kind, index, ctx),
                Err(err) if err.is_protocol() => {
                    return self.on_protocol_fault(kind, index, err, ctx)
                }
                Err(err) => return self.on_runtime_error(id, err, ctx),
            }
        }

        if self.ledger.reversed_from().is_some() && self.return_path_exhausted() {
            self.restore_direction(ctx);
        }
        Ok(true)
    }

    fn invoke_handle_fault(
        &mut self,
        kind: HandlerKind,
        is_requestor: bool,
        ctx: &mut dyn MessageContext,
    ) -> Result<bool, HandlerError> {
        self.ledger.set_requestor(is_requestor);

        if self.chain.subset(kind).is_empty() {
            return Ok(true);
        }
        if self.ledger.is_closed() {
            warn!(
                exchange = %self.exchange_id,
                kind = %kind,
                "Handler chain already closed, not invoking handleFault"
            );
            return Ok(false);
        }

        ctx.set_outbound(self.ledger.direction().is_outbound());

        let reached = self
            .ledger
            .is_reversed()
            .then(|| self.ledger.invoked().to_vec());
        self.walk_handle_fault(
            kind,
            &|id: HandlerId| reached.as_ref().map_or(true, |r| r.contains(&id)),
            ctx,
        )
    }

    /// A handler returned `false` from `handle_message`.
    fn on_stop(
        &mut self,
        kind: HandlerKind,
        index: usize,
        ctx: &mut dyn MessageContext,
    ) -> Result<bool, HandlerError> {
        if self.ledger.is_response_expected() {
            self.reverse_at(kind, index, ctx);
        } else {
            debug!(
                exchange = %self.exchange_id,
                kind = %kind,
                "Handler stopped one-way message, closing chain"
            );
            self.close_invoked(ctx)?;
        }
        Ok(false)
    }

    fn on_protocol_fault(
        &mut self,
        kind: HandlerKind,
        index: usize,
        err: HandlerError,
        ctx: &mut dyn MessageContext,
    ) -> Result<bool, HandlerError> {
        warn!(
            exchange = %self.exchange_id,
            handler = self.chain.subset(kind)[index].name(),
            error = %err,
            "handleMessage raised protocol fault"
        );
        self.ledger.set_fault(Fault::Raised(err.clone()));

        if !self.ledger.is_response_expected() {
            self.close_invoked(ctx)?;
            return Err(err);
        }

        // Handlers that saw the message in this pass before the thrower.
        let pass = self.ledger.current_pass();
        let preceding = pass[..pass.len().saturating_sub(1)].to_vec();

        self.reverse_at(kind, index, ctx);
        match self.walk_handle_fault(kind, &|id: HandlerId| preceding.contains(&id), ctx) {
            Ok(true) => Err(err),
            Ok(false) => Ok(false),
            Err(replaced) => Err(replaced),
        }
    }

    fn on_runtime_error(
        &mut self,
        id: HandlerId,
        err: HandlerError,
        ctx: &mut dyn MessageContext,
    ) -> Result<bool, HandlerError> {
        warn!(
            exchange = %self.exchange_id,
            handler = %id,
            error = %err,
            "handleMessage raised runtime error, closing chain"
        );
        self.close_invoked(ctx)?;
        Err(err)
    }

    /// Flip the direction after the handler at `index` cut processing short.
    /// The next walk of this subset starts at that handler's predecessor.
    fn reverse_at(&mut self, kind: HandlerKind, index: usize, ctx: &mut dyn MessageContext) {
        let len = self.chain.subset(kind).len();
        let direction = self.ledger.reverse();
        ctx.set_outbound(direction.is_outbound());
        self.ledger
            .set_cursor(kind, direction, direction.step_after(index, len));

        info!(
            exchange = %self.exchange_id,
            handler = self.chain.subset(kind)[index].name(),
            direction = %direction,
            "Message direction reversed"
        );
    }

    /// Whether no handler the message reached is left ahead of either
    /// subset's cursor in the current direction.
    fn return_path_exhausted(&self) -> bool {
        let direction = self.ledger.direction();
        [HandlerKind::Logical, HandlerKind::Protocol]
            .into_iter()
            .all(|kind| {
                let len = self.chain.subset(kind).len();
                (self.ledger.cursor(kind).get(direction)..len).all(|step| {
                    let id = self.chain.id_of(kind, direction.index_at(step, len));
                    !self.ledger.was_invoked(id)
                })
            })
    }

    /// The reversed message is back where it started; resume the direction
    /// it had before the reversal.
    fn restore_direction(&mut self, ctx: &mut dyn MessageContext) {
        if let Some(direction) = self.ledger.restore_direction() {
            ctx.set_outbound(direction.is_outbound());
            info!(
                exchange = %self.exchange_id,
                direction = %direction,
                "Message direction restored"
            );
        }
    }

    /// Walk `kind` in the current direction calling `handle_fault` on every
    /// `eligible` handler.
    ///
    /// `Ok(true)` when the walk ran out, `Ok(false)` when a handler stopped
    /// it. Stopping and raising both close the chain first.
    fn walk_handle_fault(
        &mut self,
        kind: HandlerKind,
        eligible: &dyn Fn(HandlerId) -> bool,
        ctx: &mut dyn MessageContext,
    ) -> Result<bool, HandlerError> {
        let len = self.chain.subset(kind).len();
        let direction = self.ledger.direction();

        let mut step = self.ledger.cursor(kind).get(direction);
        while step < len {
            let index = direction.index_at(step, len);
            let id = self.chain.id_of(kind, index);
            step += 1;
            self.ledger.set_cursor(kind, direction, step);

            if !eligible(id) {
                continue;
            }

            let handler = &self.chain.subset(kind)[index];
            debug!(
                exchange = %self.exchange_id,
                handler = handler.name(),
                kind = %kind,
                direction = %direction,
                "Invoking handleFault"
            );
            if !self.ledger.was_invoked(id) {
                self.ledger.push_invoked(id);
            }
            self.ledger.record(id, kind, Phase::HandleFault);

            match handler.handler().handle_fault(ctx) {
                Ok(true) => {}
                Ok(false) => {
                    debug!(
                        exchange = %self.exchange_id,
                        handler = %id,
                        "handleFault stopped fault processing"
                    );
                    self.close_invoked(ctx)?;
                    return Ok(false);
                }
                Err(err) => {
                    warn!(
                        exchange = %self.exchange_id,
                        handler = %id,
                        error = %err,
                        "handleFault raised error"
                    );
                    if err.is_protocol() {
                        self.ledger.set_fault(Fault::Raised(err.clone()));
                    }
                    self.close_invoked(ctx)?;
                    return Err(err);
                }
            }
        }

        Ok(true)
    }

    /// Close every invoked handler still open, most recently invoked first,
    /// then mark the exchange closed.
    ///
    /// Every handler is attempted; the first close error is returned.
    fn close_invoked(&mut self, ctx: &mut dyn MessageContext) -> Result<(), HandlerError> {
        let mut first_error = None;

        for id in self.ledger.pending_close() {
            self.ledger.mark_handler_closed(id);
            let kind = self.chain.kind_of(id);
            self.ledger.record(id, kind, Phase::Close);

            let Some(handler) = self.chain.get(id) else {
                continue;
            };
            debug!(
                exchange = %self.exchange_id,
                handler = handler.name(),
                kind = %kind,
                "Closing handler"
            );
            if let Err(err) = handler.handler().close(ctx) {
                warn!(
                    exchange = %self.exchange_id,
                    handler = handler.name(),
                    error = %err,
                    "Handler close failed"
                );
                first_error.get_or_insert(err);
            }
        }

        self.ledger.mark_closed();
        first_error.map_or(Ok(()), Err)
    }

    pub fn is_outbound(&self) -> bool {
        self.ledger.direction().is_outbound()
    }

    pub fn is_inbound(&self) -> bool {
        !self.is_outbound()
    }

    pub fn set_outbound(&mut self) {
        self.ledger.set_direction(Direction::Outbound);
    }

    pub fn set_inbound(&mut self) {
        self.ledger.set_direction(Direction::Inbound);
    }

    pub fn direction(&self) -> Direction {
        self.ledger.direction()
    }

    pub fn is_requestor(&self) -> bool {
        self.ledger.is_requestor()
    }

    pub fn set_requestor(&mut self, requestor: bool) {
        self.ledger.set_requestor(requestor);
    }

    pub fn is_response_expected(&self) -> bool {
        self.ledger.is_response_expected()
    }

    pub fn set_response_expected(&mut self, expected: bool) {
        self.ledger.set_response_expected(expected);
    }

    pub fn is_closed(&self) -> bool {
        self.ledger.is_closed()
    }

    pub fn fault_raised(&self) -> bool {
        self.ledger.fault_raised()
    }

    pub fn fault(&self) -> Option<&Fault> {
        self.ledger.fault()
    }

    pub fn set_fault(&mut self, fault: Fault) {
        self.ledger.set_fault(fault);
    }

    /// Handlers invoked so far, in invocation order.
    pub fn invoked_handlers(&self) -> Vec<&ChainHandler> {
        self.ledger
            .invoked()
            .iter()
            .filter_map(|id| self.chain.get(*id))
            .collect()
    }

    pub fn invoked_ids(&self) -> &[HandlerId] {
        self.ledger.invoked()
    }

    pub fn logical_handlers(&self) -> &[ChainHandler] {
        self.chain.logical()
    }

    pub fn protocol_handlers(&self) -> &[ChainHandler] {
        self.chain.protocol()
    }

    pub fn chain(&self) -> &HandlerChain {
        &self.chain
    }

    pub fn ledger(&self) -> &InvocationLedger {
        &self.ledger
    }

    pub fn journal(&self) -> &[InvocationRecord] {
        self.ledger.journal()
    }

    pub fn exchange_id(&self) -> Uuid {
        self.exchange_id
    }

    pub fn config(&self) -> &InvokerConfig {
        &self.config
    }
}
