//! The subscription list.

use std::panic::{catch_unwind, AssertUnwindSafe};

use regex::Regex;
use tracing::warn;

use crate::error::Error;

/// Callback invoked with `(channel, payload)` for each matching
/// delivery.
pub type Handler = Box<dyn FnMut(&str, &[u8])>;

/// Identity of one subscription, returned by
/// [`Lcm::subscribe`](crate::Lcm::subscribe) and consumed by
/// [`Lcm::unsubscribe`](crate::Lcm::unsubscribe).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subscription(u64);

struct Entry {
    id: u64,
    pattern: Regex,
    handler: Handler,
}

/// Insertion-ordered list of subscriptions. Every delivery is offered
/// to every entry whose anchored pattern matches the channel.
#[derive(Default)]
pub(crate) struct SubscriptionList {
    entries: Vec<Entry>,
    next_id: u64,
}

impl SubscriptionList {
    /// Compile `pattern` anchored at both ends and append it.
    pub fn subscribe(&mut self, pattern: &str, handler: Handler) -> Result<Subscription, Error> {
        let pattern = Regex::new(&format!("^(?:{pattern})$"))?;
        let id = self.next_id;
        self.next_id += 1;
        self.entries.push(Entry {
            id,
            pattern,
            handler,
        });
        Ok(Subscription(id))
    }

    /// Remove by identity; reports whether the entry was still present.
    pub fn unsubscribe(&mut self, handle: Subscription) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.id != handle.0);
        self.entries.len() != before
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Offer a delivery to every matching entry in insertion order. A
    /// panicking handler is reported and does not stop delivery to the
    /// rest.
    pub fn dispatch(&mut self, channel: &str, payload: &[u8]) {
        for entry in &mut self.entries {
            if !entry.pattern.is_match(channel) {
                continue;
            }
            let handler = &mut entry.handler;
            if catch_unwind(AssertUnwindSafe(|| handler(channel, payload))).is_err() {
                warn!(
                    channel,
                    pattern = entry.pattern.as_str(),
                    "subscription handler panicked"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    fn recording(list: &mut SubscriptionList, pattern: &str) -> Rc<RefCell<Vec<String>>> {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        list.subscribe(
            pattern,
            Box::new(move |channel, _| sink.borrow_mut().push(channel.to_owned())),
        )
        .unwrap();
        seen
    }

    #[test]
    fn patterns_are_anchored_at_both_ends() {
        let mut list = SubscriptionList::default();
        let seen = recording(&mut list, "SENSOR_.*");

        for channel in ["SENSOR_1", "SENSOR_2", "OTHER", "XSENSOR_1", "SENSOR"] {
            list.dispatch(channel, b"");
        }
        assert_eq!(*seen.borrow(), ["SENSOR_1", "SENSOR_2"]);
    }

    #[test]
    fn anchoring_survives_alternation() {
        let mut list = SubscriptionList::default();
        let seen = recording(&mut list, "A|B");
        for channel in ["A", "B", "XA", "BX"] {
            list.dispatch(channel, b"");
        }
        assert_eq!(*seen.borrow(), ["A", "B"]);
    }

    #[test]
    fn overlapping_subscriptions_deliver_independently() {
        let mut list = SubscriptionList::default();
        let first = recording(&mut list, "TEST");
        let second = recording(&mut list, "T.*");
        list.dispatch("TEST", b"");
        assert_eq!(first.borrow().len(), 1);
        assert_eq!(second.borrow().len(), 1);
    }

    #[test]
    fn unsubscribe_removes_by_identity() {
        let mut list = SubscriptionList::default();
        let seen = recording(&mut list, "C");
        let handle = list
            .subscribe("C", Box::new(|_, _| panic!("should have been removed")))
            .unwrap();
        assert!(list.unsubscribe(handle));
        assert!(!list.unsubscribe(handle));
        list.dispatch("C", b"");
        assert_eq!(seen.borrow().len(), 1);
    }

    #[test]
    fn a_panicking_handler_does_not_stop_the_others() {
        let mut list = SubscriptionList::default();
        list.subscribe("C", Box::new(|_, _| panic!("boom")))
            .unwrap();
        let seen = recording(&mut list, "C");
        list.dispatch("C", b"");
        list.dispatch("C", b"");
        assert_eq!(seen.borrow().len(), 2);
    }

    #[test]
    fn invalid_patterns_are_rejected() {
        let mut list = SubscriptionList::default();
        assert!(matches!(
            list.subscribe("SENSOR_(", Box::new(|_, _| {})),
            Err(Error::Pattern(_))
        ));
    }
}
