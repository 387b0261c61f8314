// A persistent trie over key sequences, with single-child runs compressed into paths.
//
// Nodes are never modified once built. Every subtree sits behind an Arc, so a new
// version of the trie shares everything it did not rebuild with the old one, and
// readers of an old version are unaffected by later insertions.
//
// Shape invariants:
//   A Node has at least two children, sorted strictly by key. Stars come first.
//   A Path has at least one key, and its child is never another Path.
//   A Leaf has at least one value, and sits exactly where a key sequence ends.

use std::fmt;
use std::sync::Arc;

use im::OrdMap;

use crate::key::{format_keys, Key};

pub enum Trie<T> {
    Node(Arc<Vec<(Key, Trie<T>)>>),
    Path(Arc<[Key]>, Arc<Trie<T>>),
    Leaf(Arc<Vec<T>>),
}

/// The top of the trie, keyed by the first key of each sequence.
pub type Root<T> = OrdMap<Key, Trie<T>>;

impl<T> Clone for Trie<T> {
    fn clone(&self) -> Self {
        match self {
            Trie::Node(children) => Trie::Node(children.clone()),
            Trie::Path(keys, child) => Trie::Path(keys.clone(), child.clone()),
            Trie::Leaf(values) => Trie::Leaf(values.clone()),
        }
    }
}

impl<T> Trie<T> {
    /// The chain holding a single value at the end of `keys`.
    pub fn fresh(keys: &[Key], value: T) -> Trie<T> {
        let leaf = Trie::Leaf(Arc::new(vec![value]));
        if keys.is_empty() {
            leaf
        } else {
            Trie::Path(keys.into(), Arc::new(leaf))
        }
    }

    /// Wraps `child` in a path of `keys`, if there are any.
    pub fn with_prefix(keys: &[Key], child: Trie<T>) -> Trie<T> {
        if keys.is_empty() {
            child
        } else {
            Trie::Path(keys.into(), Arc::new(child))
        }
    }

    pub fn values(&self) -> Option<&Arc<Vec<T>>> {
        match self {
            Trie::Leaf(values) => Some(values),
            _ => None,
        }
    }

    /// The number of key sequences stored below here.
    pub fn num_leaves(&self) -> usize {
        match self {
            Trie::Node(children) => children.iter().map(|(_, c)| c.num_leaves()).sum(),
            Trie::Path(_, child) => child.num_leaves(),
            Trie::Leaf(_) => 1,
        }
    }

    /// Rebuilds the trie with every value transformed. The shape is unchanged.
    pub fn map_values<U>(&self, f: &mut impl FnMut(&T) -> U) -> Trie<U> {
        match self {
            Trie::Node(children) => Trie::Node(Arc::new(
                children
                    .iter()
                    .map(|(key, child)| (key.clone(), child.map_values(f)))
                    .collect(),
            )),
            Trie::Path(keys, child) => Trie::Path(keys.clone(), Arc::new(child.map_values(f))),
            Trie::Leaf(values) => Trie::Leaf(Arc::new(values.iter().map(f).collect())),
        }
    }

    /// Appends every stored sequence below here, each extending `prefix`, with its values.
    pub fn collect_entries<'a>(&'a self, prefix: &mut Vec<Key>, output: &mut Vec<(Vec<Key>, &'a [T])>) {
        match self {
            Trie::Node(children) => {
                for (key, child) in children.iter() {
                    prefix.push(key.clone());
                    child.collect_entries(prefix, output);
                    prefix.pop();
                }
            }
            Trie::Path(keys, child) => {
                let initial_len = prefix.len();
                prefix.extend(keys.iter().cloned());
                child.collect_entries(prefix, output);
                prefix.truncate(initial_len);
            }
            Trie::Leaf(values) => output.push((prefix.clone(), values.as_slice())),
        }
    }

    /// Panics if the shape invariants are broken, or if the keys along some branch
    /// do not form exactly one tree. `pending` is the number of subtrees still owed
    /// on entry.
    pub fn check(&self, pending: usize) {
        match self {
            Trie::Node(children) => {
                if children.len() < 2 {
                    panic!("node with {} children", children.len());
                }
                for pair in children.windows(2) {
                    if pair[0].0 >= pair[1].0 {
                        panic!("node children out of order: {} then {}", pair[0].0, pair[1].0);
                    }
                }
                for (key, child) in children.iter() {
                    child.check(consume(pending, key));
                }
            }
            Trie::Path(keys, child) => {
                if keys.is_empty() {
                    panic!("empty path");
                }
                if let Trie::Path(..) = child.as_ref() {
                    panic!("path {} contains another path", format_keys(keys));
                }
                let pending = keys.iter().fold(pending, consume);
                child.check(pending);
            }
            Trie::Leaf(values) => {
                if values.is_empty() {
                    panic!("empty leaf");
                }
                if pending != 0 {
                    panic!("leaf reached with {} subtrees missing", pending);
                }
            }
        }
    }

    fn fmt_at(&self, f: &mut fmt::Formatter, depth: usize) -> fmt::Result
    where
        T: fmt::Debug,
    {
        let pad = "  ".repeat(depth);
        match self {
            Trie::Node(children) => {
                for (key, child) in children.iter() {
                    writeln!(f, "{}{}", pad, key)?;
                    child.fmt_at(f, depth + 1)?;
                }
                Ok(())
            }
            Trie::Path(keys, child) => {
                writeln!(f, "{}{}", pad, format_keys(keys))?;
                child.fmt_at(f, depth + 1)
            }
            Trie::Leaf(values) => writeln!(f, "{}=> {:?}", pad, values),
        }
    }
}

// Accounts for one key against the subtrees still owed.
fn consume(pending: usize, key: &Key) -> usize {
    if pending == 0 {
        panic!("key {} after the sequence is complete", key);
    }
    pending - 1 + key.arity()
}

/// Checks every branch below the root. See `Trie::check`.
pub fn check_root<T>(root: &Root<T>) {
    for (key, child) in root.iter() {
        child.check(consume(1, key));
    }
}

pub fn num_leaves<T>(root: &Root<T>) -> usize {
    root.values().map(|t| t.num_leaves()).sum()
}

pub fn map_root<T, U>(root: &Root<T>, f: &mut impl FnMut(&T) -> U) -> Root<U> {
    root.iter()
        .map(|(key, child)| (key.clone(), child.map_values(f)))
        .collect()
}

pub fn root_entries<T>(root: &Root<T>) -> Vec<(Vec<Key>, &[T])> {
    let mut output = vec![];
    let mut prefix = vec![];
    for (key, child) in root.iter() {
        prefix.push(key.clone());
        child.collect_entries(&mut prefix, &mut output);
        prefix.pop();
    }
    output
}

pub fn fmt_root<T: fmt::Debug>(root: &Root<T>, f: &mut fmt::Formatter) -> fmt::Result {
    for (key, child) in root.iter() {
        writeln!(f, "{}", key)?;
        child.fmt_at(f, 1)?;
    }
    Ok(())
}
