//! Bounded buffer of payloads that could not be delivered.
//!
//! The limit governs retained bytes only. When an append would push the total
//! past the limit the new chunk is discarded and everything already held is
//! kept, so older events are never displaced by a burst of newer ones.

use std::collections::VecDeque;

/// Result of offering a chunk to the backlog.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Append {
    Accepted,
    Rejected,
}

#[derive(Debug)]
pub struct Backlog {
    chunks: VecDeque<Vec<u8>>,
    size: usize,
    limit: usize,
}

impl Backlog {
    /// Create an empty backlog holding at most `limit` bytes.
    pub fn new(limit: usize) -> Self {
        Self {
            chunks: VecDeque::new(),
            size: 0,
            limit,
        }
    }

    /// Retain `bytes` unless doing so would exceed the limit.
    pub fn try_append(&mut self, bytes: Vec<u8>) -> Append {
        match self.size.checked_add(bytes.len()) {
            Some(total) if total <= self.limit => {
                self.size = total;
                self.chunks.push_back(bytes);
                Append::Accepted
            }
            _ => Append::Rejected,
        }
    }

    /// Take every retained byte, oldest first, leaving the backlog empty.
    pub fn drain(&mut self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.size);
        for chunk in self.chunks.drain(..) {
            out.extend_from_slice(&chunk);
        }
        self.size = 0;
        out
    }

    /// Put previously drained bytes back at the front.
    ///
    /// These bytes were admitted under the limit earlier, so the limit is not
    /// re-checked here.
    pub fn requeue(&mut self, bytes: Vec<u8>) {
        if bytes.is_empty() {
            return;
        }
        self.size += bytes.len();
        self.chunks.push_front(bytes);
    }

    /// Bytes currently retained.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Change the limit. Data already retained is kept even if it now exceeds
    /// the new limit; only later appends are affected.
    pub fn set_limit(&mut self, limit: usize) {
        self.limit = limit;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    #[rstest]
    fn accepts_within_limit_and_reports_size() {
        let mut backlog = Backlog::new(10);
        assert_eq!(backlog.try_append(vec![1; 4]), Append::Accepted);
        assert_eq!(backlog.try_append(vec![2; 6]), Append::Accepted);
        assert_eq!(backlog.size(), 10);
    }

    #[rstest]
    fn rejects_newest_chunk_on_overflow() {
        let mut backlog = Backlog::new(8);
        assert_eq!(backlog.try_append(vec![1; 5]), Append::Accepted);
        assert_eq!(backlog.try_append(vec![2; 4]), Append::Rejected);
        assert_eq!(backlog.size(), 5);
        assert_eq!(backlog.drain(), vec![1; 5]);
    }

    #[rstest]
    fn drain_preserves_order_and_clears() {
        let mut backlog = Backlog::new(usize::MAX);
        backlog.try_append(b"ab".to_vec());
        backlog.try_append(b"cd".to_vec());
        assert_eq!(backlog.drain(), b"abcd".to_vec());
        assert!(backlog.is_empty());
        assert!(backlog.drain().is_empty());
    }

    #[rstest]
    fn requeue_restores_drained_bytes_ahead_of_new_ones() {
        let mut backlog = Backlog::new(6);
        backlog.try_append(b"old".to_vec());
        let drained = backlog.drain();
        backlog.requeue(drained);
        assert_eq!(backlog.try_append(b"new".to_vec()), Append::Accepted);
        assert_eq!(backlog.drain(), b"oldnew".to_vec());
    }

    #[rstest]
    fn shrinking_the_limit_keeps_retained_data() {
        let mut backlog = Backlog::new(100);
        backlog.try_append(vec![0; 40]);
        backlog.set_limit(10);
        assert_eq!(backlog.size(), 40);
        assert_eq!(backlog.try_append(vec![0; 1]), Append::Rejected);
    }

    #[rstest]
    fn oversized_chunk_is_rejected_on_empty_backlog() {
        let mut backlog = Backlog::new(3);
        assert_eq!(backlog.try_append(vec![0; 4]), Append::Rejected);
        assert!(backlog.is_empty());
    }

    proptest! {
        #[test]
        fn size_never_exceeds_limit(
            limit in 0usize..256,
            chunks in proptest::collection::vec(0usize..64, 0..32),
        ) {
            let mut backlog = Backlog::new(limit);
            let mut expected = 0usize;
            for len in chunks {
                let before = backlog.size();
                match backlog.try_append(vec![0; len]) {
                    Append::Accepted => expected += len,
                    Append::Rejected => prop_assert_eq!(backlog.size(), before),
                }
                prop_assert!(backlog.size() <= limit);
            }
            prop_assert_eq!(backlog.size(), expected);
        }
    }
}
