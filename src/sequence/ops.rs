//! Set algorithms over decoded ascending sequences.
//!
//! All operations assume their inputs are sorted ascending; the coded
//! sequence iterators and posting sources guarantee this.

/// Test whether N ascending sequences share at least one common value.
///
/// Zero or one sequences trivially intersect. The sweep is a round-robin
/// gallop: each sequence in rotation is advanced past the running
/// maximum, and the intersection is found once a full rotation passes
/// without any sequence needing to advance. Runs in O(total elements).
pub fn intersect_sequences<I>(iters: &mut [I]) -> bool
where
    I: Iterator<Item = i32>,
{
    intersect_offset_sequences(iters, &[])
}

/// [`intersect_sequences`] with a per-sequence additive offset.
///
/// Missing offsets are treated as zero.
pub fn intersect_offset_sequences<I>(iters: &mut [I], offsets: &[i32]) -> bool
where
    I: Iterator<Item = i32>,
{
    let n = iters.len();
    if n <= 1 {
        return true;
    }

    let offset = |i: usize| offsets.get(i).copied().unwrap_or(0);

    let mut values = Vec::with_capacity(n);
    for (i, iter) in iters.iter_mut().enumerate() {
        match iter.next() {
            Some(v) => values.push(v + offset(i)),
            None => return false,
        }
    }

    let mut max = values[0];
    let mut successes = 0;

    let mut i = 0;
    loop {
        if successes == n {
            return true;
        }

        let idx = i % n;
        if values[idx] == max {
            successes += 1;
        } else {
            while values[idx] < max {
                match iters[idx].next() {
                    Some(v) => values[idx] = v + offset(idx),
                    None => return false,
                }
            }
            max = values[idx];
            successes = 0;
        }

        i += 1;
    }
}

/// Minimal span over N ascending position lists: the smallest
/// `max - min` over all ways of picking one element from each list.
///
/// Fewer than two lists span nothing and return 0; if any list is empty
/// no span exists and `i32::MAX` is returned.
pub fn min_distance(positions: &[&[i32]]) -> i32 {
    min_distance_offset(positions, &[])
}

/// [`min_distance`] with a per-list additive offset.
pub fn min_distance_offset(positions: &[&[i32]], offsets: &[i32]) -> i32 {
    if positions.len() < 2 {
        return 0;
    }
    if positions.iter().any(|p| p.is_empty()) {
        return i32::MAX;
    }

    let offset = |i: usize| offsets.get(i).copied().unwrap_or(0);

    let mut idx = vec![0usize; positions.len()];
    let mut best = i32::MAX;

    loop {
        let mut min_value = i32::MAX;
        let mut max_value = i32::MIN;
        let mut min_list = 0;

        for (i, list) in positions.iter().enumerate() {
            let v = list[idx[i]] + offset(i);
            if v < min_value {
                min_value = v;
                min_list = i;
            }
            if v > max_value {
                max_value = v;
            }
        }

        best = best.min(max_value - min_value);
        if best == 0 {
            return 0;
        }

        // Only advancing the list holding the minimum can shrink the span.
        idx[min_list] += 1;
        if idx[min_list] >= positions[min_list].len() {
            return best;
        }
    }
}

/// Minimum absolute difference between any pair of values drawn from two
/// ascending sequences, or -1 if either sequence is empty.
///
/// A linear two-pointer sweep: the pointer at the smaller value advances
/// (ties advance `a`) until either sequence is exhausted.
pub fn min_distance_pair<A, B>(mut a: A, mut b: B) -> i32
where
    A: Iterator<Item = i32>,
    B: Iterator<Item = i32>,
{
    let (Some(mut va), Some(mut vb)) = (a.next(), b.next()) else {
        return -1;
    };

    let mut best = (va - vb).abs();
    loop {
        if best == 0 {
            return 0;
        }
        if va <= vb {
            match a.next() {
                Some(v) => va = v,
                None => break,
            }
        } else {
            match b.next() {
                Some(v) => vb = v,
                None => break,
            }
        }
        best = best.min((va - vb).abs());
    }
    best
}

/// Values common to all N offset-adjusted ascending lists.
pub fn find_intersections(lists: &[&[i32]]) -> Vec<i32> {
    let mut out = Vec::new();
    find_intersections_into(&mut out, lists, &[], usize::MAX);
    out
}

/// Collect values common to all N offset-adjusted ascending lists into a
/// reusable output buffer, stopping once `max` results have been found.
///
/// The sweep checks the limit after appending, so the output may contain
/// `max + 1` values.
pub fn find_intersections_into(
    out: &mut Vec<i32>,
    lists: &[&[i32]],
    offsets: &[i32],
    max: usize,
) {
    if lists.is_empty() {
        return;
    }

    let offset = |i: usize| offsets.get(i).copied().unwrap_or(0);

    if lists.len() == 1 {
        out.extend(lists[0].iter().map(|v| v + offset(0)));
        return;
    }

    if lists.iter().any(|list| list.is_empty()) {
        return;
    }

    let mut idx = vec![0usize; lists.len()];

    'sweep: loop {
        let mut target = i32::MIN;
        for (i, list) in lists.iter().enumerate() {
            target = target.max(list[idx[i]] + offset(i));
        }

        let mut all_equal = true;
        for (i, list) in lists.iter().enumerate() {
            while list[idx[i]] + offset(i) < target {
                idx[i] += 1;
                if idx[i] >= list.len() {
                    break 'sweep;
                }
            }
            if list[idx[i]] + offset(i) != target {
                all_equal = false;
            }
        }

        if all_equal {
            out.push(target);
            if out.len() > max {
                break;
            }
            for (i, list) in lists.iter().enumerate() {
                idx[i] += 1;
                if idx[i] >= list.len() {
                    break 'sweep;
                }
            }
        }
    }
}
