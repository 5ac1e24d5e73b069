//! Property tests: partitioning keeps each handler class in registration order.

mod common;

use handler_chain::mocks::{CallLog, MockHandler};
use handler_chain::{partition, Classified, HandlerChain, HandlerKind};
use proptest::prelude::*;

#[derive(Clone, Debug, PartialEq)]
struct Tagged {
    kind: HandlerKind,
    seq: usize,
}

impl Classified for Tagged {
    fn kind(&self) -> HandlerKind {
        self.kind
    }
}

fn arb_kind() -> impl Strategy<Value = HandlerKind> {
    prop_oneof![Just(HandlerKind::Logical), Just(HandlerKind::Protocol)]
}

fn arb_tagged(max: usize) -> impl Strategy<Value = Vec<Tagged>> {
    prop::collection::vec(arb_kind(), 0..max).prop_map(|kinds| {
        kinds
            .into_iter()
            .enumerate()
            .map(|(seq, kind)| Tagged { kind, seq })
            .collect()
    })
}

proptest! {
    /// Each side holds only its class, in input order.
    #[test]
    fn partition_is_stable(items in arb_tagged(32)) {
        let (logical, protocol) = partition(items.clone());

        prop_assert!(logical.iter().all(|t| t.kind == HandlerKind::Logical));
        prop_assert!(protocol.iter().all(|t| t.kind == HandlerKind::Protocol));
        prop_assert!(logical.windows(2).all(|w| w[0].seq < w[1].seq));
        prop_assert!(protocol.windows(2).all(|w| w[0].seq < w[1].seq));

        let expected_logical: Vec<Tagged> = items
            .iter()
            .filter(|t| t.kind == HandlerKind::Logical)
            .cloned()
            .collect();
        prop_assert_eq!(&logical, &expected_logical);
    }

    /// Concatenating both sides is a permutation of the input.
    #[test]
    fn partition_is_a_permutation(items in arb_tagged(32)) {
        let (logical, protocol) = partition(items.clone());
        let mut seqs: Vec<usize> = logical.iter().chain(protocol.iter()).map(|t| t.seq).collect();
        seqs.sort_unstable();
        prop_assert_eq!(seqs, (0..items.len()).collect::<Vec<_>>());
    }

    /// Partitioning an already partitioned list changes nothing.
    #[test]
    fn partition_is_idempotent(items in arb_tagged(32)) {
        let (logical, protocol) = partition(items);
        let once: Vec<Tagged> = logical.into_iter().chain(protocol).collect();

        let (logical, protocol) = partition(once.clone());
        let twice: Vec<Tagged> = logical.into_iter().chain(protocol).collect();
        prop_assert_eq!(once, twice);
    }

    /// The chain built by the invoker uses the same ordering.
    #[test]
    fn chain_slots_follow_partition(kinds in prop::collection::vec(arb_kind(), 0..16)) {
        let log = CallLog::new();
        let handlers = kinds
            .iter()
            .enumerate()
            .map(|(i, kind)| {
                let handler = MockHandler::new(format!("h{i}"), &log);
                match kind {
                    HandlerKind::Logical => common::logical(handler),
                    HandlerKind::Protocol => common::protocol(handler),
                }
            })
            .collect();
        let chain = HandlerChain::new(handlers);

        let expected: Vec<String> = kinds
            .iter()
            .enumerate()
            .filter(|(_, k)| **k == HandlerKind::Logical)
            .chain(kinds.iter().enumerate().filter(|(_, k)| **k == HandlerKind::Protocol))
            .map(|(i, _)| format!("h{i}"))
            .collect();
        let actual: Vec<String> = chain.iter().map(|(_, h)| h.name().to_string()).collect();

        prop_assert_eq!(actual, expected);
        prop_assert_eq!(chain.logical().len() + chain.protocol().len(), kinds.len());
    }
}
