//! Single-slot reading handoff between the acquisition and display tasks.
//!
//! This is deliberately a one-element mailbox with swap-on-send semantics,
//! not a queue: a send into an occupied slot displaces the unconsumed value.
//! The producer therefore never blocks and never observes backpressure; a
//! slow consumer sees only the newest reading. Overwrite-on-full is the
//! intended behavior, not a capacity defect.

use core::cell::Cell;

use critical_section::Mutex;

pub struct Mailbox<T> {
    slot: Mutex<Cell<Option<T>>>,
}

impl<T> Mailbox<T> {
    pub const fn new() -> Self {
        Self {
            slot: Mutex::new(Cell::new(None)),
        }
    }

    /// Place `value` in the slot, displacing and returning any unconsumed
    /// predecessor. Never blocks.
    pub fn send(&self, value: T) -> Option<T> {
        critical_section::with(|cs| self.slot.borrow(cs).replace(Some(value)))
    }

    /// Take the current value, leaving the slot empty.
    pub fn recv(&self) -> Option<T> {
        critical_section::with(|cs| self.slot.borrow(cs).take())
    }

    pub fn is_empty(&self) -> bool {
        critical_section::with(|cs| {
            let slot = self.slot.borrow(cs);
            let value = slot.take();
            let empty = value.is_none();
            slot.set(value);
            empty
        })
    }
}

impl<T> Default for Mailbox<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_displaces_unconsumed_value() {
        let mbox = Mailbox::new();
        assert_eq!(mbox.send('a'), None);
        // 'a' was never received: 'b' silently displaces it.
        assert_eq!(mbox.send('b'), Some('a'));
        assert_eq!(mbox.recv(), Some('b'));
        assert_eq!(mbox.recv(), None);
    }

    #[test]
    fn at_most_one_buffered_item() {
        let mbox = Mailbox::new();
        for i in 0..100 {
            mbox.send(i);
        }
        assert_eq!(mbox.recv(), Some(99));
        assert!(mbox.is_empty());
    }

    #[test]
    fn fast_producer_slow_consumer_sees_no_backlog() {
        // Producer runs 20x faster than the consumer: every receive observes
        // the newest value and never a queued backlog behind it.
        let mbox = Mailbox::new();
        for round in 0..5u32 {
            for i in 0..20 {
                mbox.send(round * 100 + i);
            }
            assert_eq!(mbox.recv(), Some(round * 100 + 19));
            assert_eq!(mbox.recv(), None);
        }
    }
}
