//! Pure edits on a favorites list.
//!
//! The session manager always writes the complete list; these helpers build
//! that list from the current one. Order is preserved and duplicates are
//! never removed implicitly.

/// `current` with `item` appended, even if already present.
pub fn with_added(current: &[String], item: &str) -> Vec<String> {
    let mut list = current.to_vec();
    list.push(item.to_string());
    list
}

/// `current` with every occurrence of `item` removed.
pub fn without(current: &[String], item: &str) -> Vec<String> {
    current.iter().filter(|f| *f != item).cloned().collect()
}

/// Remove `item` if present, otherwise append it.
pub fn toggled(current: &[String], item: &str) -> Vec<String> {
    if contains(current, item) {
        without(current, item)
    } else {
        with_added(current, item)
    }
}

pub fn contains(current: &[String], item: &str) -> bool {
    current.iter().any(|f| f == item)
}
