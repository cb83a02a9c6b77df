// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Expected-angle-count schedule.
//!
//! A slot's "ripeness" depends on how many locators need to have reported an
//! angle for it before the estimator runs. Slot 0 (newest) expects every
//! configured locator; older slots relax that requirement linearly so a
//! position still gets published when one or two locators drop packets.

/// Compute `expected[i]` for `i in 0..max_sequence_ids`, given `locator_count`
/// configured locators.
///
/// `expected[0] == locator_count` (or `1` when `locator_count == 1`),
/// non-increasing with slot index, `expected[last] = locator_count -
/// round((last * coeff) / (max_sequence_ids - 1))` where
/// `coeff = max(0, locator_count - 2)`, using round-half-up division.
pub fn compute(locator_count: u32, max_sequence_ids: usize) -> Vec<u32> {
    if locator_count <= 1 {
        return vec![1; max_sequence_ids];
    }

    let coeff = locator_count.saturating_sub(2);
    let denom = (max_sequence_ids - 1).max(1) as u32;

    (0..max_sequence_ids)
        .map(|i| locator_count - round_div(i as u32 * coeff, denom))
        .collect()
}

/// Round-half-up integer division: `(num + den / 2) / den`.
fn round_div(num: u32, den: u32) -> u32 {
    (num + den / 2) / den
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_locator_always_expects_one() {
        assert_eq!(compute(1, 6), vec![1; 6]);
    }

    #[test]
    fn two_locators_never_relax() {
        // coeff = 0 for L=2, so every slot expects both locators.
        assert_eq!(compute(2, 6), vec![2; 6]);
    }

    #[test]
    fn three_locators_relax_to_two_by_the_end() {
        // coeff = 1, denom = 5: expected[i] = 3 - round(i/5)
        assert_eq!(compute(3, 6), vec![3, 3, 3, 2, 2, 2]);
    }

    #[test]
    fn six_locators_full_schedule() {
        // coeff = 4, denom = 5: expected[i] = 6 - round(4i/5)
        // i=0: 6-0=6, i=1: 6-round(0.8)=6-1=5, i=2: 6-round(1.6)=6-2=4
        // i=3: 6-round(2.4)=6-2=4, i=4: 6-round(3.2)=6-3=3, i=5: 6-round(4)=6-4=2
        assert_eq!(compute(6, 6), vec![6, 5, 4, 4, 3, 2]);
    }

    #[test]
    fn schedule_is_non_increasing() {
        for l in 1..=6u32 {
            let sched = compute(l, 6);
            for w in sched.windows(2) {
                assert!(w[0] >= w[1], "schedule not non-increasing for L={l}: {sched:?}");
            }
        }
    }

    #[test]
    fn first_slot_expects_all_locators() {
        for l in 2..=6u32 {
            assert_eq!(compute(l, 6)[0], l);
        }
    }

    #[test]
    fn last_slot_is_at_least_two_when_multiple_locators() {
        for l in 2..=6u32 {
            let sched = compute(l, 6);
            assert!(*sched.last().unwrap() >= 2);
        }
    }
}
