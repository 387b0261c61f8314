// Insertion rebuilds only the nodes along the path of the new key sequence.
// Everything else is shared with the trie it started from.
//
// Key sequences are complete prefix-order trees, so no stored sequence is a proper
// prefix of another. Running out of keys anywhere but at a leaf means the trie or the
// sequence is malformed, and we panic.

use std::sync::Arc;

use tracing::trace;

use crate::key::{format_keys, Key};
use crate::trie::{Root, Trie};

/// Adds `value` to the values of an existing leaf.
/// A value equal to one already there replaces it. Otherwise it goes at the end.
fn merge_values<T: Clone + PartialEq>(values: &[T], value: T) -> Vec<T> {
    let mut answer = values.to_vec();
    match answer.iter().position(|v| *v == value) {
        Some(i) => answer[i] = value,
        None => answer.push(value),
    }
    answer
}

impl<T: Clone + PartialEq> Trie<T> {
    /// Returns a new trie with `value` stored at the end of `keys`.
    pub fn insert(&self, keys: &[Key], value: T) -> Trie<T> {
        match self {
            Trie::Leaf(values) => {
                if !keys.is_empty() {
                    panic!(
                        "key mismatch: leaf reached with keys left: {}",
                        format_keys(keys)
                    );
                }
                Trie::Leaf(Arc::new(merge_values(values, value)))
            }

            Trie::Node(children) => {
                let Some((first, rest)) = keys.split_first() else {
                    panic!("key mismatch: node reached with no keys left");
                };
                let mut new_children = children.as_ref().clone();
                match children.binary_search_by(|(k, _)| k.cmp(first)) {
                    Ok(i) => new_children[i].1 = children[i].1.insert(rest, value),
                    Err(i) => new_children.insert(i, (first.clone(), Trie::fresh(rest, value))),
                }
                Trie::Node(Arc::new(new_children))
            }

            Trie::Path(path, child) => {
                let n = path
                    .iter()
                    .zip(keys.iter())
                    .take_while(|(a, b)| a == b)
                    .count();
                if n == path.len() {
                    let new_child = child.insert(&keys[n..], value);
                    return Trie::Path(path.clone(), Arc::new(new_child));
                }
                if n == keys.len() {
                    panic!(
                        "key mismatch: sequence {} ends inside path {}",
                        format_keys(keys),
                        format_keys(path)
                    );
                }

                // Split at the first difference.
                let old_branch = if n + 1 == path.len() {
                    child.as_ref().clone()
                } else {
                    Trie::Path(Arc::from(&path[n + 1..]), child.clone())
                };
                let new_branch = Trie::fresh(&keys[n + 1..], value);
                let mut children = vec![
                    (path[n].clone(), old_branch),
                    (keys[n].clone(), new_branch),
                ];
                children.sort_by(|a, b| a.0.cmp(&b.0));
                Trie::with_prefix(&path[..n], Trie::Node(Arc::new(children)))
            }
        }
    }
}

/// Returns a new root with `value` stored at the end of `keys`.
/// `keys` must be a well-formed sequence.
pub fn insert_root<T: Clone + PartialEq>(root: &Root<T>, keys: &[Key], value: T) -> Root<T> {
    trace!(keys = %format_keys(keys), "inserting");
    let Some((first, rest)) = keys.split_first() else {
        panic!("cannot insert an empty key sequence");
    };
    let child = match root.get(first) {
        Some(existing) => existing.insert(rest, value),
        None => Trie::fresh(rest, value),
    };
    root.update(first.clone(), child)
}
