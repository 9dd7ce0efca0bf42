// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::cell::RefCell;
use std::fmt::Display;
use std::rc::Rc;

/// Collects state invariant violations found while checking actor state.
/// Accumulators derived with `with_prefix` share the parent's collection.
#[derive(Default, Clone)]
pub struct MessageAccumulator {
    msgs: Rc<RefCell<Vec<String>>>,
    prefix: String,
}

impl MessageAccumulator {
    /// Returns an accumulator sharing this one's messages that prefixes each new message.
    pub fn with_prefix(&self, prefix: &str) -> Self {
        MessageAccumulator { msgs: self.msgs.clone(), prefix: self.prefix.to_owned() + prefix }
    }

    pub fn is_empty(&self) -> bool {
        self.msgs.borrow().is_empty()
    }

    pub fn messages(&self) -> Vec<String> {
        self.msgs.borrow().to_owned()
    }

    pub fn add(&self, msg: &str) {
        self.msgs.borrow_mut().push(format!("{}{msg}", self.prefix));
    }

    pub fn add_all(&self, other: &Self) {
        self.msgs.borrow_mut().extend_from_slice(&other.msgs.borrow());
    }

    /// Records `msg` unless the predicate holds.
    pub fn require(&self, predicate: bool, msg: &str) {
        if !predicate {
            self.add(msg);
        }
    }

    /// Records `msg` and the error text if `result` is an error.
    pub fn require_no_error<V, E: Display>(&self, result: Result<V, E>, msg: &str) {
        if let Err(e) = result {
            self.add(&format!("{msg}: {e}"));
        }
    }

    /// Panics listing every message if any were recorded. Intended for tests.
    pub fn assert_empty(&self) {
        let msgs = self.msgs.borrow();
        assert!(msgs.is_empty(), "{} invariant violations:\n{}", msgs.len(), msgs.join("\n"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefixes_nest_and_share_storage() {
        let acc = MessageAccumulator::default();
        let escrow = acc.with_prefix("escrow: ");
        let client = escrow.with_prefix("client t0100: ");

        acc.add("top");
        client.add("negative balance");
        escrow.require(true, "never recorded");
        escrow.require(false, "total mismatch");

        assert_eq!(
            acc.messages(),
            vec![
                "top".to_string(),
                "escrow: client t0100: negative balance".to_string(),
                "escrow: total mismatch".to_string(),
            ]
        );
        assert_eq!(3, client.messages().len());
    }

    #[test]
    fn records_errors_with_context() {
        let acc = MessageAccumulator::default();
        acc.require_no_error(Ok::<(), String>(()), "fine");
        acc.require_no_error(Err::<(), _>("root missing"), "failed to load deals");
        assert_eq!(acc.messages(), vec!["failed to load deals: root missing".to_string()]);
    }

    #[test]
    fn add_all_copies_messages() {
        let first = MessageAccumulator::default();
        let second = MessageAccumulator::default();
        first.add("a");
        second.add_all(&first);
        second.add("b");
        assert_eq!(second.messages(), vec!["a".to_string(), "b".to_string()]);
        assert_eq!(first.messages(), vec!["a".to_string()]);
    }

    #[test]
    #[should_panic(expected = "1 invariant violations")]
    fn assert_empty_panics_with_messages() {
        let acc = MessageAccumulator::default();
        acc.add("locked exceeds escrow");
        acc.assert_empty();
    }
}
