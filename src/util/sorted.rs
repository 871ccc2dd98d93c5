// Sorted vector helpers for the key-ordered tables

/// Locate `key` in a slice sorted by `key_of`
///
/// `Ok(index)` when present, `Err(insertion_point)` otherwise, same as
/// `binary_search_by_key`.
pub fn search<T, K: Ord>(items: &[T], key: &K, key_of: impl Fn(&T) -> K) -> Result<usize, usize> {
    items.binary_search_by(|item| key_of(item).cmp(key))
}

/// Insert a value keeping the slice order; refuses duplicates
///
/// Returns the index of the new value, or `None` if the key already exists.
pub fn insert_unique<T, K: Ord>(
    items: &mut Vec<T>,
    value: T,
    key_of: impl Fn(&T) -> K,
) -> Option<usize> {
    let key = key_of(&value);
    match search(items, &key, &key_of) {
        Ok(_) => None,
        Err(index) => {
            items.insert(index, value);
            Some(index)
        }
    }
}

/// Check that keys are strictly increasing
pub fn is_strictly_sorted<T, K: Ord>(items: &[T], key_of: impl Fn(&T) -> K) -> bool {
    items.windows(2).all(|pair| key_of(&pair[0]) < key_of(&pair[1]))
}
