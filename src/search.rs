//! Binary searches over sorted sequences, shared by cycle matching, voltage
//! lookup and marker placement.

/// Index of the first element whose key is `>= target` (lower bound).
pub fn lower_bound_by_key<T, K, F>(sorted: &[T], target: &K, key: F) -> usize
where
    K: PartialOrd,
    F: Fn(&T) -> K,
{
    sorted.partition_point(|item| key(item) < *target)
}

/// Index of the first element whose key is `> target` (upper bound).
pub fn upper_bound_by_key<T, K, F>(sorted: &[T], target: &K, key: F) -> usize
where
    K: PartialOrd,
    F: Fn(&T) -> K,
{
    sorted.partition_point(|item| key(item) <= *target)
}

/// First element strictly after `t`, or `None` past the end.
pub fn first_after(sorted: &[f64], t: f64) -> Option<usize> {
    let idx = upper_bound_by_key(sorted, &t, |&x| x);
    (idx < sorted.len()).then_some(idx)
}

/// First element at or after `t`, or `None` past the end.
pub fn first_at_or_after(sorted: &[f64], t: f64) -> Option<usize> {
    let idx = lower_bound_by_key(sorted, &t, |&x| x);
    (idx < sorted.len()).then_some(idx)
}

/// Last element at or before `t`, or `None` if every element is later.
pub fn last_at_or_before(sorted: &[f64], t: f64) -> Option<usize> {
    upper_bound_by_key(sorted, &t, |&x| x).checked_sub(1)
}

/// Element nearest to `t`; ties go to the earlier element.
pub fn closest(sorted: &[f64], t: f64) -> Option<usize> {
    if sorted.is_empty() {
        return None;
    }
    let idx = lower_bound_by_key(sorted, &t, |&x| x);
    if idx == 0 {
        return Some(0);
    }
    if idx == sorted.len() {
        return Some(sorted.len() - 1);
    }
    if (t - sorted[idx - 1]) <= (sorted[idx] - t) {
        Some(idx - 1)
    } else {
        Some(idx)
    }
}
