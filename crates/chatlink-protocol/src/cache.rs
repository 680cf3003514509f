//! Per-connection signature cache.
//!
//! Both peers keep a mirror of this table and must push identical sequences
//! in identical order; packed signatures then refer to slots instead of
//! repeating 256 bytes. The cache never detects desync itself: a mismatch
//! surfaces later as an unknown slot or a last-seen checksum failure.

use std::collections::VecDeque;

use crate::body::Body;
use crate::signature::Signature;
use crate::SIGNATURE_CACHE_SIZE;

/// Fixed-capacity most-recently-pushed table of signatures.
///
/// Lookups scan linearly. Slot assignment is part of the wire contract, so
/// this is deliberately an ordered array, not a map.
#[derive(Debug, Clone)]
pub struct SignatureCache {
    entries: Vec<Option<Signature>>,
}

impl SignatureCache {
    pub fn new() -> Self {
        Self::with_capacity(SIGNATURE_CACHE_SIZE)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: vec![None; capacity],
        }
    }

    pub fn capacity(&self) -> usize {
        self.entries.len()
    }

    /// Slot currently holding `signature`, if any.
    pub fn pack(&self, signature: &Signature) -> Option<usize> {
        self.entries
            .iter()
            .position(|entry| entry.as_ref() == Some(signature))
    }

    pub fn unpack(&self, id: usize) -> Option<&Signature> {
        self.entries.get(id).and_then(Option::as_ref)
    }

    /// Push the signatures a message carries: its last-seen entries, then
    /// its own signature if it has one.
    pub fn push(&mut self, body: &Body, signature: Option<&Signature>) {
        let sequence = body
            .last_seen()
            .entries()
            .iter()
            .chain(signature)
            .cloned()
            .collect::<Vec<_>>();
        self.push_all(sequence);
    }

    /// Advance the table with `signatures` (oldest first).
    ///
    /// The newest pushed value lands in slot 0, the next newest in slot 1 and
    /// so on. A displaced value that is not itself being pushed is carried
    /// along to the next slot, so older entries shift up rather than vanish
    /// until they fall off the end.
    pub fn push_all<I>(&mut self, signatures: I)
    where
        I: IntoIterator<Item = Signature>,
    {
        let incoming: Vec<Signature> = signatures.into_iter().collect();
        let mut queue: VecDeque<Signature> = incoming.iter().cloned().collect();

        for slot in self.entries.iter_mut() {
            let Some(next) = queue.pop_back() else {
                break;
            };
            if let Some(displaced) = slot.replace(next) {
                if !incoming.contains(&displaced) {
                    queue.push_front(displaced);
                }
            }
        }

        tracing::trace!(pushed = incoming.len(), "signature cache advanced");
    }

    /// Resident signatures in slot order.
    pub fn iter(&self) -> impl Iterator<Item = &Signature> {
        self.entries.iter().flatten()
    }
}

impl Default for SignatureCache {
    fn default() -> Self {
        Self::new()
    }
}
