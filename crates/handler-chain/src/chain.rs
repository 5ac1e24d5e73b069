use std::ops::Range;

use crate::handler::{ChainHandler, Classified, HandlerId, HandlerKind};

/// Stable-partition `items` into `(logical, protocol)`.
///
/// Relative order inside each class is the input order.
pub fn partition<T: Classified>(items: Vec<T>) -> (Vec<T>, Vec<T>) {
    items
        .into_iter()
        .partition(|item| item.kind() == HandlerKind::Logical)
}

/// The immutable, partitioned handler list of one invoker.
///
/// Slots `0..logical_len` hold the logical handlers and the rest the
/// protocol handlers, each in registration order.
#[derive(Clone, Debug)]
pub struct HandlerChain {
    handlers: Vec<ChainHandler>,
    logical_len: usize,
}

impl HandlerChain {
    pub fn new(handlers: Vec<ChainHandler>) -> Self {
        let (logical, protocol) = partition(handlers);
        let logical_len = logical.len();
        let mut handlers = logical;
        handlers.extend(protocol);
        Self {
            handlers,
            logical_len,
        }
    }

    /// Slot range of a subset.
    pub fn range(&self, kind: HandlerKind) -> Range<usize> {
        match kind {
            HandlerKind::Logical => 0..self.logical_len,
            HandlerKind::Protocol => self.logical_len..self.handlers.len(),
        }
    }

    pub fn subset(&self, kind: HandlerKind) -> &[ChainHandler] {
        &self.handlers[self.range(kind)]
    }

    pub fn logical(&self) -> &[ChainHandler] {
        self.subset(HandlerKind::Logical)
    }

    pub fn protocol(&self) -> &[ChainHandler] {
        self.subset(HandlerKind::Protocol)
    }

    /// Slot of the `index`-th handler (registration order) of a subset.
    pub fn id_of(&self, kind: HandlerKind, index: usize) -> HandlerId {
        HandlerId(self.range(kind).start + index)
    }

    pub fn get(&self, id: HandlerId) -> Option<&ChainHandler> {
        self.handlers.get(id.0)
    }

    /// Subset a slot belongs to.
    pub fn kind_of(&self, id: HandlerId) -> HandlerKind {
        if id.0 < self.logical_len {
            HandlerKind::Logical
        } else {
            HandlerKind::Protocol
        }
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (HandlerId, &ChainHandler)> {
        self.handlers
            .iter()
            .enumerate()
            .map(|(slot, h)| (HandlerId(slot), h))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::{CallLog, MockHandler};
    use std::sync::Arc;

    #[test]
    fn partition_moves_logical_first_and_keeps_order() {
        use HandlerKind::*;
        let tagged = vec![(Protocol, 0), (Logical, 1), (Protocol, 2), (Logical, 3)];

        struct Tagged((HandlerKind, u32));
        impl Classified for Tagged {
            fn kind(&self) -> HandlerKind {
                (self.0).0
            }
        }

        let (logical, protocol) = partition(tagged.into_iter().map(Tagged).collect());
        let logical: Vec<u32> = logical.iter().map(|t| (t.0).1).collect();
        let protocol: Vec<u32> = protocol.iter().map(|t| (t.0).1).collect();
        assert_eq!(logical, vec![1, 3]);
        assert_eq!(protocol, vec![0, 2]);
    }

    #[test]
    fn chain_exposes_subsets_by_slot() {
        let log = CallLog::new();
        let chain = HandlerChain::new(vec![
            ChainHandler::protocol(Arc::new(MockHandler::new("p0", &log))),
            ChainHandler::logical(Arc::new(MockHandler::new("l0", &log))),
            ChainHandler::logical(Arc::new(MockHandler::new("l1", &log))),
        ]);

        assert_eq!(chain.len(), 3);
        assert_eq!(chain.range(HandlerKind::Logical), 0..2);
        assert_eq!(chain.range(HandlerKind::Protocol), 2..3);
        assert_eq!(chain.logical()[1].name(), "l1");
        assert_eq!(chain.protocol()[0].name(), "p0");
        assert_eq!(chain.id_of(HandlerKind::Protocol, 0), HandlerId(2));
        assert_eq!(chain.kind_of(HandlerId(1)), HandlerKind::Logical);
        assert_eq!(chain.kind_of(HandlerId(2)), HandlerKind::Protocol);
    }

    #[test]
    fn empty_chain_has_empty_subsets() {
        let chain = HandlerChain::new(vec![]);
        assert!(chain.is_empty());
        assert!(chain.logical().is_empty());
        assert!(chain.protocol().is_empty());
    }
}
