// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Per-tag sliding window of correlation slots.
//!
//! A [`TagWindow`] holds, newest-first, the last `max_sequence_ids` sequence
//! numbers observed for one tag, each with the set of per-locator angles
//! collected for it so far. Slots become "ripe" once they hold as many
//! angles as [`crate::schedule`] expects for their position in the window,
//! at which point they are fed to the estimator and retired in order.

use crate::sequence;

/// One measurement from one locator for one CTE.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Angle {
    pub sequence: u16,
    pub azimuth: f32,
    pub elevation: f32,
    pub distance: f32,
    pub rssi: i32,
}

/// A correlation bucket for a single sequence number across locators.
#[derive(Debug, Clone)]
pub struct Slot {
    /// `-1` means the slot is empty/unused.
    pub sequence: i32,
    angles: Vec<Option<Angle>>,
    pub num_angles: u32,
}

impl Slot {
    fn empty(locator_count: usize) -> Self {
        Self {
            sequence: -1,
            angles: vec![None; locator_count],
            num_angles: 0,
        }
    }

    pub fn is_present(&self, locator_idx: usize) -> bool {
        self.angles[locator_idx].is_some()
    }

    pub fn angle(&self, locator_idx: usize) -> Option<&Angle> {
        self.angles[locator_idx].as_ref()
    }

    pub fn present_count(&self) -> u32 {
        self.angles.iter().filter(|a| a.is_some()).count() as u32
    }

    /// All per-locator angle slots, indexed by locator index.
    pub fn angles_slice(&self) -> &[Option<Angle>] {
        &self.angles
    }
}

/// A slot ready for estimation, produced by [`TagWindow::flush_ripe`].
pub struct RipeSlot {
    pub slot_index: usize,
    pub sequence: u16,
}

/// Per-tag correlation state.
pub struct TagWindow {
    pub id: String,
    slots: Vec<Slot>,
    locator_count: usize,
    max_sequence_diff: i32,
    /// The sequence of the most recently emitted slot. `None` before the
    /// first emit, so there is no accidental-zero sentinel to trip over.
    pub oldest_sequence: Option<u16>,
}

impl TagWindow {
    pub fn new(id: String, locator_count: usize, max_sequence_ids: usize, max_sequence_diff: i32) -> Self {
        Self {
            id,
            slots: (0..max_sequence_ids).map(|_| Slot::empty(locator_count)).collect(),
            locator_count,
            max_sequence_diff,
            oldest_sequence: None,
        }
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    /// (a) Clear any slot that is now too far from `new_seq` to ever be
    /// newer, and every slot older than it.
    pub fn evict_stale(&mut self, new_seq: u16) {
        let len = self.slots.len();
        for i in 0..len {
            if self.slots[i].sequence < 0 {
                continue;
            }
            let stored = self.slots[i].sequence as u16;
            if sequence::diff(stored, new_seq, self.max_sequence_diff) == sequence::STALE {
                for slot in &mut self.slots[i..] {
                    *slot = Slot::empty(self.locator_count);
                }
                break;
            }
        }
    }

    /// (b) Find the slot index to receive `new_seq`: an exact match if one
    /// exists among non-empty slots, otherwise the chronologically correct
    /// insertion point.
    ///
    /// Returning `0` unconditionally on a miss would conflate "insert as
    /// newest" with "no match", shifting newer slots down for an
    /// out-of-order-but-in-window older sequence and breaking the
    /// newest-first ordering. Instead, the insertion point is the first
    /// slot whose stored sequence is NOT newer than `new_seq`, so the
    /// window stays newest-first after insertion.
    pub fn locate_slot(&self, new_seq: u16) -> usize {
        for (i, slot) in self.slots.iter().enumerate() {
            if slot.sequence == new_seq as i32 {
                return i;
            }
        }
        for (i, slot) in self.slots.iter().enumerate() {
            if slot.sequence < 0 {
                return i;
            }
            let stored = slot.sequence as u16;
            if !sequence::is_newer(new_seq, stored, self.max_sequence_diff) {
                // `stored` is not newer than `new_seq`, i.e. new_seq belongs
                // at or before index i.
                return i;
            }
        }
        self.slots.len().saturating_sub(1)
    }

    /// (c) Insert or merge `angle` from `loc_idx` into `slot_idx`.
    pub fn insert_or_merge(&mut self, angle: Angle, slot_idx: usize, loc_idx: usize) {
        if self.slots[slot_idx].sequence != angle.sequence as i32 {
            // Insertion case: shift everything from slot_idx down by one,
            // discarding the oldest slot, then re-init slot_idx.
            let len = self.slots.len();
            for i in (slot_idx + 1..len).rev() {
                self.slots[i] = self.slots[i - 1].clone();
            }
            self.slots[slot_idx] = Slot::empty(self.locator_count);
            self.slots[slot_idx].sequence = angle.sequence as i32;
        }

        let slot = &mut self.slots[slot_idx];
        // Only increment num_angles on a genuinely new locator reading, so a
        // repeated report from the same locator doesn't double-count.
        if slot.angles[loc_idx].is_none() {
            slot.num_angles += 1;
        }
        slot.angles[loc_idx] = Some(angle);
    }

    /// (d) Scan from oldest to `from_idx`, collect every ripe slot, and
    /// clear the fired slot(s) together with every older, still-incomplete
    /// slot, leaving anything newer untouched.
    pub fn flush_ripe(&mut self, from_idx: usize, expected: &[u32]) -> Vec<RipeSlot> {
        let mut ripe = Vec::new();
        let mut last_fired: Option<usize> = None;

        let mut i = self.slots.len();
        while i > from_idx {
            i -= 1;
            if self.slots[i].sequence >= 0 && self.slots[i].num_angles == expected[i] {
                let seq = self.slots[i].sequence as u16;
                ripe.push(RipeSlot { slot_index: i, sequence: seq });
                self.oldest_sequence = Some(seq);
                last_fired = Some(last_fired.map_or(i, |j| j.min(i)));
            }
        }

        // `ripe` is already oldest-first since we scanned from the back.
        if let Some(newest_fired) = last_fired {
            // Dropping the fired slot(s) plus everything older than them
            // gives up on any older slot that never completed in time,
            // while slots newer than `newest_fired` stay pending for a
            // future call.
            for slot in &mut self.slots[newest_fired..] {
                *slot = Slot::empty(self.locator_count);
            }
        }

        ripe
    }
}
