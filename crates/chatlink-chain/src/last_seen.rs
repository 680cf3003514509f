//! Last-seen window state machines.
//!
//! The validating party keeps a [`LastSeenValidator`]: every message it
//! relays becomes a pending slot, and each incoming update must confirm or
//! clear slots consistently with earlier updates. The acknowledging party
//! keeps a [`LastSeenTracker`] and generates those updates. Fed the same
//! message sequence, the two always agree.

use chatlink_protocol::{AcknowledgedSet, LastSeen, LastSeenUpdate, Signature, LAST_SEEN_WINDOW};
use tracing::trace;

use crate::ValidationError;

#[derive(Debug, Clone, PartialEq, Eq)]
struct TrackedEntry {
    signature: Signature,
    pending: bool,
}

impl TrackedEntry {
    fn pending(signature: Signature) -> Self {
        Self {
            signature,
            pending: true,
        }
    }
}

fn check_window(window: usize) -> Result<(), ValidationError> {
    if window == 0 || window > LAST_SEEN_WINDOW {
        return Err(ValidationError::InvalidWindow {
            window,
            max: LAST_SEEN_WINDOW,
        });
    }
    Ok(())
}

// ============================================================================
// Validating side
// ============================================================================

/// Trailing list of relayed messages awaiting acknowledgement.
///
/// Starts as `window` empty slots and grows with every pending message; each
/// update drops its offset from the front and then covers exactly the first
/// `window` slots.
#[derive(Debug, Clone)]
pub struct LastSeenValidator {
    window: usize,
    tracked: Vec<Option<TrackedEntry>>,
    last_pending: Option<Signature>,
}

impl LastSeenValidator {
    pub fn new() -> Self {
        Self::sized(LAST_SEEN_WINDOW)
    }

    /// A narrower window. The acknowledged bitset on the wire caps it at
    /// [`LAST_SEEN_WINDOW`].
    pub fn with_window(window: usize) -> Result<Self, ValidationError> {
        check_window(window)?;
        Ok(Self::sized(window))
    }

    fn sized(window: usize) -> Self {
        Self {
            window,
            tracked: vec![None; window],
            last_pending: None,
        }
    }

    /// Track a message relayed to the acknowledging party. An immediate
    /// repeat of the previous pending signature is ignored.
    pub fn add_pending(&mut self, signature: Signature) {
        if self.last_pending.as_ref() == Some(&signature) {
            return;
        }
        self.last_pending = Some(signature.clone());
        self.tracked.push(Some(TrackedEntry::pending(signature)));
    }

    /// Number of tracked slots, including the fixed window.
    pub fn tracked_count(&self) -> usize {
        self.tracked.len()
    }

    /// Drop the `offset` oldest slots. Never shrinks below the window size.
    pub fn apply_offset(&mut self, offset: i32) -> Result<(), ValidationError> {
        let max = self.tracked.len() - self.window;
        let Ok(count) = usize::try_from(offset) else {
            return Err(ValidationError::IllegalOffset { offset, max });
        };
        if count > max {
            return Err(ValidationError::IllegalOffset { offset, max });
        }
        self.tracked.drain(..count);
        Ok(())
    }

    /// Apply an acknowledgement and return the confirmed last-seen list the
    /// acknowledging party signed.
    pub fn apply_update(&mut self, update: &LastSeenUpdate) -> Result<LastSeen, ValidationError> {
        self.apply_offset(update.offset)?;

        if update.acknowledged.len() > self.window {
            return Err(ValidationError::WindowTooLarge {
                len: update.acknowledged.len(),
                max: self.window,
            });
        }

        let mut entries = Vec::with_capacity(update.acknowledged.count());
        for (index, slot) in self.tracked.iter_mut().take(self.window).enumerate() {
            if update.acknowledged.get(index) {
                let Some(entry) = slot else {
                    return Err(ValidationError::UnknownAcknowledged { index });
                };
                entry.pending = false;
                entries.push(entry.signature.clone());
            } else {
                if slot.as_ref().is_some_and(|entry| !entry.pending) {
                    return Err(ValidationError::IgnoredAcknowledged { index });
                }
                *slot = None;
            }
        }

        let last_seen = LastSeen::new(entries);
        if !update.verify_checksum(&last_seen) {
            return Err(ValidationError::ChecksumMismatch {
                expected: update.checksum,
                actual: last_seen.checksum(),
            });
        }

        trace!(
            offset = update.offset,
            acknowledged = last_seen.len(),
            "applied last-seen update"
        );
        Ok(last_seen)
    }
}

impl Default for LastSeenValidator {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Acknowledging side
// ============================================================================

/// Ring of the last `window` messages received from the validating party.
#[derive(Debug, Clone)]
pub struct LastSeenTracker {
    entries: Vec<Option<TrackedEntry>>,
    tail: usize,
    offset: i32,
    last_tracked: Option<Signature>,
}

impl LastSeenTracker {
    pub fn new() -> Self {
        Self::sized(LAST_SEEN_WINDOW)
    }

    pub fn with_window(window: usize) -> Result<Self, ValidationError> {
        check_window(window)?;
        Ok(Self::sized(window))
    }

    fn sized(window: usize) -> Self {
        Self {
            entries: vec![None; window],
            tail: 0,
            offset: 0,
            last_tracked: None,
        }
    }

    /// Record a received message. A message that was not displayed still
    /// occupies a slot but is never acknowledged. Returns `false` for an
    /// immediate repeat, which is not tracked again.
    pub fn add_pending(&mut self, signature: Signature, displayed: bool) -> bool {
        if self.last_tracked.as_ref() == Some(&signature) {
            return false;
        }
        self.last_tracked = Some(signature.clone());

        let index = self.tail;
        self.tail = (index + 1) % self.entries.len();
        self.offset += 1;
        self.entries[index] = displayed.then(|| TrackedEntry::pending(signature));
        true
    }

    /// Withdraw a still-pending message, e.g. once the user hides it.
    pub fn ignore_pending(&mut self, signature: &Signature) {
        let found = self.entries.iter_mut().find(|slot| {
            slot.as_ref()
                .is_some_and(|entry| entry.pending && entry.signature == *signature)
        });
        if let Some(slot) = found {
            *slot = None;
        }
    }

    /// Messages tracked since the last update.
    pub fn offset(&self) -> i32 {
        self.offset
    }

    /// Reset the offset for a standalone acknowledgement.
    pub fn take_offset(&mut self) -> i32 {
        std::mem::take(&mut self.offset)
    }

    /// Confirm every occupied slot, oldest first.
    pub fn generate_update(&mut self) -> (LastSeen, LastSeenUpdate) {
        let offset = self.take_offset();
        let window = self.entries.len();
        let mut acknowledged = AcknowledgedSet::new();
        let mut signatures = Vec::with_capacity(window);

        for i in 0..window {
            let index = (self.tail + i) % window;
            if let Some(entry) = &mut self.entries[index] {
                acknowledged.set(i);
                signatures.push(entry.signature.clone());
                entry.pending = false;
            }
        }

        let last_seen = LastSeen::new(signatures);
        let checksum = last_seen.checksum();
        (
            last_seen,
            LastSeenUpdate {
                offset,
                acknowledged,
                checksum,
            },
        )
    }
}

impl Default for LastSeenTracker {
    fn default() -> Self {
        Self::new()
    }
}
