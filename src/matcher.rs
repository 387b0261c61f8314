// Finds every stored pattern that could unify with a query pattern tree.
//
// The search walks the query and the trie together, depth first, backtracking over
// three kinds of step:
//
//   Exact. The query node's key is a child here. Worth 1, or 0 for a lambda.
//   Stored star. A stored wildcard takes the whole query subtree. The first occurrence
//     of a star id binds it for free. A later occurrence must see an equal subtree, and
//     is worth the size of that subtree.
//   Query star. A query wildcard skips one complete stored subtree, whatever it is. A
//     repeated metavariable must skip the same keys each time. Skipping an opaque
//     subtree is worth 1.
//
// Every thread that reaches a leaf with the query used up is one result.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::trace;

use crate::config::LookupOptions;
use crate::kernel::expr::MVarId;
use crate::key::Key;
use crate::pattern::DTExpr;
use crate::trie::{Root, Trie};

/// A place in the trie. Inside a path, the offset counts the path keys already consumed.
enum Cursor<'t, T> {
    Root(&'t Root<T>),
    At(&'t Trie<T>, usize),
}

impl<T> Clone for Cursor<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Cursor<'_, T> {}

impl<'t, T> Cursor<'t, T> {
    fn is_root(&self) -> bool {
        matches!(self, Cursor::Root(_))
    }

    // Where we are after taking the key at `offset` in a path.
    fn along_path(trie: &'t Trie<T>, len: usize, child: &'t Trie<T>, offset: usize) -> Self {
        if offset + 1 < len {
            Cursor::At(trie, offset + 1)
        } else {
            Cursor::At(child, 0)
        }
    }

    /// The child reached by exactly this key.
    fn child(self, key: &Key) -> Option<Cursor<'t, T>> {
        match self {
            Cursor::Root(root) => root.get(key).map(|t| Cursor::At(t, 0)),
            Cursor::At(trie, offset) => match trie {
                Trie::Node(children) => children
                    .binary_search_by(|(k, _)| k.cmp(key))
                    .ok()
                    .map(|i| Cursor::At(&children[i].1, 0)),
                Trie::Path(keys, child) if keys[offset] == *key => {
                    Some(Cursor::along_path(trie, keys.len(), child, offset))
                }
                _ => None,
            },
        }
    }

    /// Every child, with the key that leads to it.
    fn children(self) -> Vec<(&'t Key, Cursor<'t, T>)> {
        match self {
            Cursor::Root(root) => root.iter().map(|(k, t)| (k, Cursor::At(t, 0))).collect(),
            Cursor::At(trie, offset) => match trie {
                Trie::Node(children) => children
                    .iter()
                    .map(|(k, t)| (k, Cursor::At(t, 0)))
                    .collect(),
                Trie::Path(keys, child) => {
                    vec![(&keys[offset], Cursor::along_path(trie, keys.len(), child, offset))]
                }
                Trie::Leaf(_) => vec![],
            },
        }
    }

    /// The children reached by stars, found by scanning only the front of the children.
    fn star_children(self) -> Vec<(usize, Cursor<'t, T>)> {
        match self {
            Cursor::Root(root) => root
                .range(..Key::first_non_star())
                .filter_map(|(k, t)| k.star_id().map(|id| (id, Cursor::At(t, 0))))
                .collect(),
            Cursor::At(trie, offset) => match trie {
                Trie::Node(children) => children
                    .iter()
                    .map_while(|(k, t)| k.star_id().map(|id| (id, Cursor::At(t, 0))))
                    .collect(),
                Trie::Path(keys, child) => match keys[offset].star_id() {
                    Some(id) => vec![(id, Cursor::along_path(trie, keys.len(), child, offset))],
                    None => vec![],
                },
                Trie::Leaf(_) => vec![],
            },
        }
    }

    fn values(self) -> Option<&'t Arc<Vec<T>>> {
        match self {
            Cursor::At(trie, _) => trie.values(),
            Cursor::Root(_) => None,
        }
    }
}

struct Search<'q, 't, T, F> {
    root: &'t Root<T>,
    unify: bool,
    allow_root_star: bool,

    // The query subtree each stored star id has matched on this branch.
    stars: HashMap<usize, &'q DTExpr>,

    // The stored keys each query metavariable has skipped on this branch.
    mvars: HashMap<MVarId, Vec<Key>>,

    // The keys of the subtree currently being skipped.
    skipped: Vec<Key>,

    callback: F,
}

impl<'q, 't, T, F> Search<'q, 't, T, F>
where
    F: FnMut(&'t Arc<Vec<T>>, usize) -> bool,
{
    // Matches `terms` in order, starting at `cursor`.
    // Returns false if the callback asked to stop.
    fn step(&mut self, cursor: Cursor<'t, T>, terms: &[&'q DTExpr], score: usize) -> bool {
        let Some((&first, rest)) = terms.split_first() else {
            return match cursor.values() {
                Some(values) => (self.callback)(values, score),
                None => panic!("key mismatch: query ended before a leaf"),
            };
        };
        let stars_allowed = !cursor.is_root() || self.allow_root_star;

        if let DTExpr::Star(mvar) = first {
            if mvar.is_none() || self.unify {
                if !stars_allowed {
                    return true;
                }
                return self.skip(cursor, 1, *mvar, rest, score);
            }
        }

        if let Some(key) = first.exact_key() {
            if let Some(next) = cursor.child(&key) {
                let bonus = if key == Key::Lam { 0 } else { 1 };
                let mut next_terms = first.children();
                next_terms.extend_from_slice(rest);
                if !self.step(next, &next_terms, score + bonus) {
                    return false;
                }
            }
        }

        if !stars_allowed {
            return true;
        }
        for (id, next) in cursor.star_children() {
            let keep_going = match self.stars.get(&id).copied() {
                Some(bound) if bound == first => self.step(next, rest, score + first.size()),
                Some(bound) => {
                    trace!(star = id, bound = %bound, query = %first, "star already bound");
                    true
                }
                None => {
                    self.stars.insert(id, first);
                    let keep_going = self.step(next, rest, score);
                    self.stars.remove(&id);
                    keep_going
                }
            };
            if !keep_going {
                return false;
            }
        }
        true
    }

    // Skips `pending` complete stored subtrees, then continues with `rest`.
    fn skip(
        &mut self,
        cursor: Cursor<'t, T>,
        pending: usize,
        mvar: Option<MVarId>,
        rest: &[&'q DTExpr],
        score: usize,
    ) -> bool {
        if pending > 0 {
            for (key, next) in cursor.children() {
                self.skipped.push(key.clone());
                let keep_going = self.skip(next, pending - 1 + key.arity(), mvar, rest, score);
                self.skipped.pop();
                if !keep_going {
                    return false;
                }
            }
            return true;
        }

        let bonus = usize::from(self.skipped.first() == Some(&Key::Opaque));
        let skipped = std::mem::take(&mut self.skipped);
        let keep_going = match mvar {
            None => self.step(cursor, rest, score + bonus),
            Some(id) => match self.mvars.get(&id).map(|bound| *bound == skipped) {
                Some(true) => self.step(cursor, rest, score + bonus),
                Some(false) => {
                    trace!(mvar = %id, "metavariable already bound");
                    true
                }
                None => {
                    self.mvars.insert(id, skipped.clone());
                    let keep_going = self.step(cursor, rest, score + bonus);
                    self.mvars.remove(&id);
                    keep_going
                }
            },
        };
        self.skipped = skipped;
        keep_going
    }
}

/// Calls `callback` with the values and score of every successful match, in trie order.
/// Stops early, returning false, if the callback returns false.
pub fn get_unify_while<'t, T, F>(
    root: &'t Root<T>,
    query: &DTExpr,
    options: &LookupOptions,
    callback: F,
) -> bool
where
    F: FnMut(&'t Arc<Vec<T>>, usize) -> bool,
{
    if query.is_star() && !options.allow_root_star {
        return true;
    }
    let mut search = Search {
        root,
        unify: options.unify,
        allow_root_star: options.allow_root_star,
        stars: HashMap::new(),
        mvars: HashMap::new(),
        skipped: vec![],
        callback,
    };
    search.step(Cursor::Root(search.root), &[query], 0)
}

/// Every match, best first. Matches with equal scores keep their trie order.
pub fn get_unify<T>(
    root: &Root<T>,
    query: &DTExpr,
    options: &LookupOptions,
) -> Vec<(Arc<Vec<T>>, usize)> {
    let mut answer = vec![];
    get_unify_while(root, query, options, |values, score| {
        answer.push((values.clone(), score));
        true
    });
    answer.sort_by(|a, b| b.1.cmp(&a.1));
    answer
}
