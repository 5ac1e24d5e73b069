use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use crate::context::MessageContext;
use crate::error::HandlerError;
use crate::handler::Handler;
use crate::ledger::Phase;

/// Scripted result of one mock handler call.
#[derive(Clone, Debug, PartialEq)]
pub enum Outcome {
    /// Return `Ok(true)`
    Continue,
    /// Return `Ok(false)`
    Stop,
    /// Raise the given error
    Fail(HandlerError),
}

impl Outcome {
    pub fn protocol_fault(reason: impl Into<String>) -> Self {
        Outcome::Fail(HandlerError::protocol("Server", reason))
    }

    pub fn runtime_error(message: impl Into<String>) -> Self {
        Outcome::Fail(HandlerError::runtime(message))
    }

    fn into_result(self) -> Result<bool, HandlerError> {
        match self {
            Outcome::Continue => Ok(true),
            Outcome::Stop => Ok(false),
            Outcome::Fail(err) => Err(err),
        }
    }
}

/// One observed handler call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallEvent {
    /// Position in the owning [`CallLog`], starting at 1
    pub order: u64,
    pub handler: String,
    pub phase: Phase,
    /// Outbound flag of the context at call time
    pub outbound: bool,
}

/// Shared record of calls made on mock handlers.
///
/// Ordering is per log, so parallel tests never share a counter.
#[derive(Clone, Debug, Default)]
pub struct CallLog {
    events: Arc<Mutex<Vec<CallEvent>>>,
}

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, handler: &str, phase: Phase, outbound: bool) {
        let mut events = self.events.lock().unwrap_or_else(PoisonError::into_inner);
        let order = events.len() as u64 + 1;
        events.push(CallEvent {
            order,
            handler: handler.to_string(),
            phase,
            outbound,
        });
    }

    pub fn events(&self) -> Vec<CallEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Names of handlers called for `phase`, in call order.
    pub fn calls(&self, phase: Phase) -> Vec<String> {
        self.events()
            .into_iter()
            .filter(|e| e.phase == phase)
            .map(|e| e.handler)
            .collect()
    }

    pub fn count(&self, handler: &str, phase: Phase) -> usize {
        self.events()
            .iter()
            .filter(|e| e.handler == handler && e.phase == phase)
            .count()
    }

    /// Total calls for `phase` across all handlers.
    pub fn total(&self, phase: Phase) -> usize {
        self.events().iter().filter(|e| e.phase == phase).count()
    }

    pub fn clear(&self) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

/// Handler whose results are scripted per call.
///
/// Scripted outcomes are consumed in order; once a script runs dry the
/// handler answers `Ok(true)`.
pub struct MockHandler {
    name: String,
    log: CallLog,
    message_script: Mutex<VecDeque<Outcome>>,
    fault_script: Mutex<VecDeque<Outcome>>,
    close_error: Mutex<Option<HandlerError>>,
}

impl MockHandler {
    pub fn new(name: impl Into<String>, log: &CallLog) -> Self {
        Self {
            name: name.into(),
            log: log.clone(),
            message_script: Mutex::new(VecDeque::new()),
            fault_script: Mutex::new(VecDeque::new()),
            close_error: Mutex::new(None),
        }
    }

    /// Queue outcomes for successive `handle_message` calls.
    pub fn with_message_outcomes(self, outcomes: impl IntoIterator<Item = Outcome>) -> Self {
        self.message_script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(outcomes);
        self
    }

    /// Queue outcomes for successive `handle_fault` calls.
    pub fn with_fault_outcomes(self, outcomes: impl IntoIterator<Item = Outcome>) -> Self {
        self.fault_script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(outcomes);
        self
    }

    /// Make the first `close` call fail with `err`.
    pub fn failing_close(self, err: HandlerError) -> Self {
        *self.close_error.lock().unwrap_or_else(PoisonError::into_inner) = Some(err);
        self
    }

    fn next(script: &Mutex<VecDeque<Outcome>>) -> Outcome {
        script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or(Outcome::Continue)
    }
}

impl Handler for MockHandler {
    fn name(&self) -> &str {
        &self.name
    }

    fn handle_message(&self, ctx: &mut dyn MessageContext) -> Result<bool, HandlerError> {
        self.log
            .record(&self.name, Phase::HandleMessage, ctx.is_outbound());
        Self::next(&self.message_script).into_result()
    }

    fn handle_fault(&self, ctx: &mut dyn MessageContext) -> Result<bool, HandlerError> {
        self.log
            .record(&self.name, Phase::HandleFault, ctx.is_outbound());
        Self::next(&self.fault_script).into_result()
    }

    fn close(&self, ctx: &mut dyn MessageContext) -> Result<(), HandlerError> {
        self.log.record(&self.name, Phase::Close, ctx.is_outbound());
        match self
            .close_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::PropertyContext;

    #[test]
    fn scripted_outcomes_then_continue() {
        let log = CallLog::new();
        let handler = MockHandler::new("A", &log)
            .with_message_outcomes([Outcome::Stop, Outcome::runtime_error("boom")]);
        let mut ctx = PropertyContext::logical();

        assert_eq!(handler.handle_message(&mut ctx), Ok(false));
        assert!(handler.handle_message(&mut ctx).is_err());
        assert_eq!(handler.handle_message(&mut ctx), Ok(true));
        assert_eq!(log.count("A", Phase::HandleMessage), 3);
    }

    #[test]
    fn log_orders_calls_across_handlers() {
        let log = CallLog::new();
        let a = MockHandler::new("A", &log);
        let b = MockHandler::new("B", &log);
        let mut ctx = PropertyContext::protocol();

        b.handle_fault(&mut ctx).unwrap();
        a.close(&mut ctx).unwrap();

        let events = log.events();
        assert_eq!(events[0].order, 1);
        assert_eq!(events[0].handler, "B");
        assert_eq!(events[1].phase, Phase::Close);
        assert_eq!(log.calls(Phase::Close), vec!["A".to_string()]);

        log.clear();
        assert!(log.events().is_empty());
    }

    #[test]
    fn failing_close_fails_once() {
        let log = CallLog::new();
        let handler = MockHandler::new("A", &log).failing_close(HandlerError::runtime("leak"));
        let mut ctx = PropertyContext::logical();

        assert!(handler.close(&mut ctx).is_err());
        assert!(handler.close(&mut ctx).is_ok());
        assert_eq!(log.total(Phase::Close), 2);
    }
}
