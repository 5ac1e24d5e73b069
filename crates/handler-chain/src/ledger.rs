use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::HandlerError;
use crate::handler::{HandlerId, HandlerKind};

/// Direction the message currently flows in.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Outbound,
    Inbound,
}

impl Direction {
    pub fn flip(self) -> Self {
        match self {
            Direction::Outbound => Direction::Inbound,
            Direction::Inbound => Direction::Outbound,
        }
    }

    pub fn is_outbound(self) -> bool {
        self == Direction::Outbound
    }

    /// Registration index visited at traversal `step` of a subset of `len`.
    ///
    /// Outbound walks registration order, inbound walks it reversed.
    pub fn index_at(self, step: usize, len: usize) -> usize {
        match self {
            Direction::Outbound => step,
            Direction::Inbound => len - 1 - step,
        }
    }

    /// Traversal step, in this direction, of the handler that follows
    /// registration index `index`.
    ///
    /// Used after a reversal: the handler at `index` is not revisited and
    /// the walk resumes at its predecessor in the new direction.
    pub fn step_after(self, index: usize, len: usize) -> usize {
        match self {
            Direction::Outbound => index + 1,
            Direction::Inbound => len - index,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Outbound => write!(f, "outbound"),
            Direction::Inbound => write!(f, "inbound"),
        }
    }
}

/// Which handler operation a journal record describes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    HandleMessage,
    HandleFault,
    Close,
}

/// Fault state of an exchange.
#[derive(Clone, Debug, PartialEq)]
pub enum Fault {
    /// A handler raised a protocol fault.
    Raised(HandlerError),
    /// Fault flag set by the pipeline.
    Flag(bool),
}

impl Fault {
    pub fn is_raised(&self) -> bool {
        match self {
            Fault::Raised(_) => true,
            Fault::Flag(flag) => *flag,
        }
    }

    pub fn error(&self) -> Option<&HandlerError> {
        match self {
            Fault::Raised(err) => Some(err),
            Fault::Flag(_) => None,
        }
    }
}

/// One handler call, as recorded in the ledger journal.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InvocationRecord {
    /// Monotonic per-ledger ordinal, starting at 1
    pub ordinal: u64,
    pub handler: HandlerId,
    pub kind: HandlerKind,
    pub phase: Phase,
    pub direction: Direction,
    pub at: DateTime<Utc>,
}

/// Resume positions of one subset, one per direction.
///
/// Each value is the next traversal step (see [`Direction::index_at`]).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SubsetCursor {
    pub outbound: usize,
    pub inbound: usize,
}

impl SubsetCursor {
    pub fn get(&self, direction: Direction) -> usize {
        match direction {
            Direction::Outbound => self.outbound,
            Direction::Inbound => self.inbound,
        }
    }

    pub fn set(&mut self, direction: Direction, step: usize) {
        match direction {
            Direction::Outbound => self.outbound = step,
            Direction::Inbound => self.inbound = step,
        }
    }
}

/// Per-exchange state of a handler chain invocation.
///
/// `invoked` is append-only and accumulates across the logical and protocol
/// phases so the close cascade can span both subsets.
#[derive(Debug)]
pub struct InvocationLedger {
    invoked: Vec<HandlerId>,
    /// Index into `invoked` where the current direction's pass began
    pass_start: usize,
    closed_handlers: HashSet<HandlerId>,
    cursors: [SubsetCursor; 2],
    direction: Direction,
    is_requestor: bool,
    response_expected: bool,
    reversed: bool,
    /// Direction in effect before an in-flight reversal not yet undone
    reversed_from: Option<Direction>,
    fault: Option<Fault>,
    closed: bool,
    journal: Vec<InvocationRecord>,
    record_journal: bool,
    next_ordinal: u64,
}

impl InvocationLedger {
    pub fn new(direction: Direction, response_expected: bool, record_journal: bool) -> Self {
        Self {
            invoked: Vec::new(),
            pass_start: 0,
            closed_handlers: HashSet::new(),
            cursors: [SubsetCursor::default(); 2],
            direction,
            is_requestor: false,
            response_expected,
            reversed: false,
            reversed_from: None,
            fault: None,
            closed: false,
            journal: Vec::new(),
            record_journal,
            next_ordinal: 1,
        }
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Set the direction; a change starts a new pass.
    ///
    /// An explicit direction drops any pending restore.
    pub fn set_direction(&mut self, direction: Direction) {
        self.reversed_from = None;
        if self.direction != direction {
            self.direction = direction;
            self.pass_start = self.invoked.len();
        }
    }

    /// In-flight reversal: flip the direction and remember that the
    /// message no longer travels its original path.
    pub fn reverse(&mut self) -> Direction {
        let from = self.direction;
        self.set_direction(from.flip());
        self.reversed = true;
        self.reversed_from = Some(from);
        self.direction
    }

    /// Direction to return to once the reversed message has travelled back
    /// through every handler it reached.
    pub fn reversed_from(&self) -> Option<Direction> {
        self.reversed_from
    }

    /// Go back to the direction in effect before the last reversal.
    ///
    /// Returns the restored direction, or `None` if no restore is pending.
    pub fn restore_direction(&mut self) -> Option<Direction> {
        let origin = self.reversed_from.take()?;
        self.set_direction(origin);
        Some(origin)
    }

    /// Whether a handler reversed the direction during this exchange.
    pub fn is_reversed(&self) -> bool {
        self.reversed
    }

    pub fn is_requestor(&self) -> bool {
        self.is_requestor
    }

    pub fn set_requestor(&mut self, requestor: bool) {
        self.is_requestor = requestor;
    }

    pub fn is_response_expected(&self) -> bool {
        self.response_expected
    }

    pub fn set_response_expected(&mut self, expected: bool) {
        self.response_expected = expected;
    }

    pub fn fault(&self) -> Option<&Fault> {
        self.fault.as_ref()
    }

    pub fn set_fault(&mut self, fault: Fault) {
        self.fault = Some(fault);
    }

    pub fn fault_raised(&self) -> bool {
        self.fault.as_ref().is_some_and(Fault::is_raised)
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn mark_closed(&mut self) {
        self.closed = true;
    }

    pub fn cursor(&self, kind: HandlerKind) -> &SubsetCursor {
        &self.cursors[Self::slot(kind)]
    }

    pub fn set_cursor(&mut self, kind: HandlerKind, direction: Direction, step: usize) {
        self.cursors[Self::slot(kind)].set(direction, step);
    }

    fn slot(kind: HandlerKind) -> usize {
        match kind {
            HandlerKind::Logical => 0,
            HandlerKind::Protocol => 1,
        }
    }

    /// Handlers invoked so far, in invocation order.
    pub fn invoked(&self) -> &[HandlerId] {
        &self.invoked
    }

    /// Handlers invoked since the last direction change.
    pub fn current_pass(&self) -> &[HandlerId] {
        &self.invoked[self.pass_start.min(self.invoked.len())..]
    }

    pub fn was_invoked(&self, id: HandlerId) -> bool {
        self.invoked.contains(&id)
    }

    pub fn push_invoked(&mut self, id: HandlerId) {
        self.invoked.push(id);
    }

    pub fn is_handler_closed(&self, id: HandlerId) -> bool {
        self.closed_handlers.contains(&id)
    }

    /// Invoked handlers still owed a `close`, most recently invoked first.
    ///
    /// A handler invoked more than once appears once, at its latest position.
    pub fn pending_close(&self) -> Vec<HandlerId> {
        let mut seen = HashSet::new();
        self.invoked
            .iter()
            .rev()
            .filter(|id| !self.is_handler_closed(**id) && seen.insert(**id))
            .copied()
            .collect()
    }

    pub fn mark_handler_closed(&mut self, id: HandlerId) {
        self.closed_handlers.insert(id);
    }

    /// Append a journal record, returning its ordinal.
    pub fn record(&mut self, handler: HandlerId, kind: HandlerKind, phase: Phase) -> u64 {
        let ordinal = self.next_ordinal;
        self.next_ordinal += 1;
        if self.record_journal {
            self.journal.push(InvocationRecord {
                ordinal,
                handler,
                kind,
                phase,
                direction: self.direction,
                at: Utc::now(),
            });
        }
        ordinal
    }

    pub fn journal(&self) -> &[InvocationRecord] {
        &self.journal
    }
}
