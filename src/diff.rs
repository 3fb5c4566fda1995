//! Character-level diff statistics between two revision bodies.
//!
//! Finds an optimal matching-block alignment between the two texts: the
//! longest common contiguous block is located, then the regions to its left
//! and right are aligned recursively. The summed length of all matched
//! blocks gives the number of characters the two texts share; everything
//! else counts as added or deleted. No "auto-junk" heuristic is applied to
//! frequently repeated characters, since an undercounted common length would
//! skew the attribution totals.
//!
//! This is a pure function over already-materialized strings; callers are
//! free to run it on many page-pairs in parallel.

use rustc_hash::FxHashMap;

/// Added/deleted character counts for one pair of consecutive revisions.
///
/// Counts are Unicode scalar values, not bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DiffCounts {
    pub added: usize,
    pub deleted: usize,
}

/// Diffs `old` against `new` and returns `(added, deleted)` counts.
///
/// Identical inputs yield `(0, 0)`; an empty `old` yields
/// `(new.chars().count(), 0)`; an empty `new` the reverse.
pub fn char_diff(old: &str, new: &str) -> DiffCounts {
    if old == new {
        return DiffCounts::default();
    }

    let a: Vec<char> = old.chars().collect();
    let b: Vec<char> = new.chars().collect();
    let same = matched_length(&a, &b);

    DiffCounts {
        added: b.len() - same,
        deleted: a.len() - same,
    }
}

/// Sum of matched block lengths in the optimal block alignment of `a` and
/// `b`.
fn matched_length(a: &[char], b: &[char]) -> usize {
    // positions of each character in b, ascending
    let mut b2j: FxHashMap<char, Vec<usize>> = FxHashMap::default();
    for (j, &c) in b.iter().enumerate() {
        b2j.entry(c).or_default().push(j);
    }

    let mut same = 0;
    // sub-windows still to align: (alo, ahi, blo, bhi)
    let mut queue = vec![(0, a.len(), 0, b.len())];
    while let Some((alo, ahi, blo, bhi)) = queue.pop() {
        let (i, j, k) = longest_match(a, &b2j, alo, ahi, blo, bhi);
        if k > 0 {
            same += k;
            queue.push((alo, i, blo, j));
            queue.push((i + k, ahi, j + k, bhi));
        }
    }
    same
}

/// Longest block `a[i..i+k] == b[j..j+k]` with `alo <= i <= i+k <= ahi` and
/// `blo <= j <= j+k <= bhi`. Of equally long blocks, the one starting
/// earliest in `a` (then earliest in `b`) wins, so the result is
/// deterministic.
fn longest_match(
    a: &[char],
    b2j: &FxHashMap<char, Vec<usize>>,
    alo: usize,
    ahi: usize,
    blo: usize,
    bhi: usize,
) -> (usize, usize, usize) {
    let (mut besti, mut bestj, mut bestk) = (alo, blo, 0);

    // j2len[j] = length of the run of matches ending at a[i], b[j]
    let mut j2len: FxHashMap<usize, usize> = FxHashMap::default();
    for i in alo..ahi {
        let mut new_j2len = FxHashMap::default();
        if let Some(positions) = b2j.get(&a[i]) {
            for &j in positions {
                if j < blo {
                    continue;
                }
                if j >= bhi {
                    break;
                }
                let k = match j.checked_sub(1) {
                    Some(prev) => j2len.get(&prev).copied().unwrap_or(0) + 1,
                    None => 1,
                };
                new_j2len.insert(j, k);
                if k > bestk {
                    besti = i + 1 - k;
                    bestj = j + 1 - k;
                    bestk = k;
                }
            }
        }
        j2len = new_j2len;
    }

    (besti, bestj, bestk)
}
