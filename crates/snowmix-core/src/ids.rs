// ── Identity allocation ──
//
// The server hands out the lowest free slot when it assigns ids itself.
// Allocating the same way locally keeps both sides in agreement.

use std::collections::BTreeSet;

/// Next id to allocate given the ids currently in use.
///
/// Returns the smallest positive integer not in `used`: the lowest gap
/// when one exists, otherwise one past the highest id. Order and
/// duplicates in the input do not matter; `0` is never a valid id and is
/// ignored.
pub fn next_id(used: impl IntoIterator<Item = u32>) -> u32 {
    let sorted: BTreeSet<u32> = used.into_iter().filter(|&id| id > 0).collect();

    let mut candidate = 1;
    for id in sorted {
        if id != candidate {
            break;
        }
        candidate += 1;
    }
    candidate
}
