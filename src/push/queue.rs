//! Bounded FIFO queue for envelopes awaiting delivery
//!
//! Envelopes produced while the socket is down are held here and flushed in
//! enqueue order once the connection opens. The queue is bounded with a
//! drop-oldest overflow policy so a long disconnection cannot grow memory
//! without limit.

use std::collections::VecDeque;

use super::Envelope;

/// FIFO queue with a fixed capacity and drop-oldest overflow
#[derive(Debug)]
pub struct OutgoingQueue {
    items: VecDeque<Envelope>,
    capacity: usize,
}

impl OutgoingQueue {
    /// Create a queue holding at most `capacity` envelopes.
    ///
    /// A capacity of zero is bumped to one so a push always stores something.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            items: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    /// Append an envelope, evicting the oldest when full.
    ///
    /// Returns the evicted envelope, if any.
    pub fn push(&mut self, envelope: Envelope) -> Option<Envelope> {
        let dropped = if self.items.len() == self.capacity {
            self.items.pop_front()
        } else {
            None
        };
        self.items.push_back(envelope);
        dropped
    }

    /// Take the oldest envelope for delivery.
    pub fn pop(&mut self) -> Option<Envelope> {
        self.items.pop_front()
    }

    /// Put an envelope back at the head after a failed send.
    ///
    /// Used when a flush is interrupted mid-way: the failed envelope returns
    /// to the front so the original order is preserved on the next flush.
    pub fn requeue_front(&mut self, envelope: Envelope) {
        self.items.push_front(envelope);
    }

    /// Number of queued envelopes
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the queue is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::push::EnvelopeKind;

    fn envelope(n: u64) -> Envelope {
        Envelope::new(EnvelopeKind::Stock, serde_json::json!({ "n": n }), None)
    }

    fn number(envelope: &Envelope) -> u64 {
        envelope.data.as_ref().unwrap()["n"].as_u64().unwrap()
    }

    #[test]
    fn pops_in_fifo_order() {
        let mut q = OutgoingQueue::new(10);
        q.push(envelope(1));
        q.push(envelope(2));
        q.push(envelope(3));

        assert_eq!(number(&q.pop().unwrap()), 1);
        assert_eq!(number(&q.pop().unwrap()), 2);
        assert_eq!(number(&q.pop().unwrap()), 3);
        assert!(q.pop().is_none());
    }

    #[test]
    fn overflow_drops_oldest() {
        let mut q = OutgoingQueue::new(2);
        assert!(q.push(envelope(1)).is_none());
        assert!(q.push(envelope(2)).is_none());

        let dropped = q.push(envelope(3)).unwrap();
        assert_eq!(number(&dropped), 1);

        assert_eq!(q.len(), 2);
        assert_eq!(number(&q.pop().unwrap()), 2);
        assert_eq!(number(&q.pop().unwrap()), 3);
    }

    #[test]
    fn requeue_front_preserves_order() {
        let mut q = OutgoingQueue::new(10);
        q.push(envelope(1));
        q.push(envelope(2));

        // Simulate a failed send of the head
        let head = q.pop().unwrap();
        q.requeue_front(head);

        assert_eq!(number(&q.pop().unwrap()), 1);
        assert_eq!(number(&q.pop().unwrap()), 2);
    }

    #[test]
    fn zero_capacity_still_holds_one() {
        let mut q = OutgoingQueue::new(0);
        q.push(envelope(1));
        assert_eq!(q.len(), 1);
    }
}
