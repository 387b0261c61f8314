use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::debug;

use crate::config::{IndexConfig, LookupOptions};
use crate::encoder::{Encoder, Mode};
use crate::error::KeyError;
use crate::insert::insert_root;
use crate::kernel::expr::Expr;
use crate::kernel::reduce::Reducer;
use crate::kernel::relevance::RelevanceOracle;
use crate::key::{check_keys, Key};
use crate::matcher::get_unify_while;
use crate::pattern::DTExpr;
use crate::rewrite::RewriteTable;
use crate::trie::{self, Root};

/// The values stored under one key sequence, and how well that sequence matched.
pub struct MatchGroup<T> {
    pub values: Arc<Vec<T>>,
    pub score: usize,
}

impl<T> Clone for MatchGroup<T> {
    fn clone(&self) -> Self {
        MatchGroup {
            values: self.values.clone(),
            score: self.score,
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for MatchGroup<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?} @ {}", self.values, self.score)
    }
}

/// A persistent index from expression patterns to values.
///
/// Inserting returns a new index and leaves the old one intact. The two share all the
/// structure the insertion did not touch, so cloning and snapshotting are cheap.
/// Values are compared with `PartialEq`: inserting a value equal to one already stored
/// under the same keys replaces it.
pub struct LemmaIndex<T> {
    root: Root<T>,
    config: IndexConfig,
    rewrites: Arc<RewriteTable>,
}

impl<T> Clone for LemmaIndex<T> {
    fn clone(&self) -> Self {
        LemmaIndex {
            root: self.root.clone(),
            config: self.config.clone(),
            rewrites: self.rewrites.clone(),
        }
    }
}

impl<T> Default for LemmaIndex<T> {
    fn default() -> Self {
        LemmaIndex::new(IndexConfig::default())
    }
}

impl<T> LemmaIndex<T> {
    pub fn new(config: IndexConfig) -> LemmaIndex<T> {
        LemmaIndex {
            root: Root::new(),
            config,
            rewrites: Arc::new(RewriteTable::default()),
        }
    }

    pub fn with_rewrites(mut self, rewrites: RewriteTable) -> Self {
        self.rewrites = Arc::new(rewrites);
        self
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    /// The pattern trees a stored expression is indexed under.
    pub fn encode(
        &self,
        e: &Expr,
        reducer: &dyn Reducer,
        oracle: &dyn RelevanceOracle,
    ) -> Vec<DTExpr> {
        let encoder = Encoder::new(&self.config.encoder, &self.rewrites, reducer, oracle, Mode::Store);
        encoder.encode_all(e)
    }

    /// The pattern tree a query expression is looked up with.
    pub fn encode_query(
        &self,
        e: &Expr,
        options: &LookupOptions,
        reducer: &dyn Reducer,
        oracle: &dyn RelevanceOracle,
    ) -> DTExpr {
        let mode = Mode::Query {
            unify: options.unify,
        };
        Encoder::new(&self.config.encoder, &self.rewrites, reducer, oracle, mode).encode_one(e)
    }

    /// Finds the values whose patterns could unify with `e`, best first.
    pub fn lookup(
        &self,
        e: &Expr,
        options: &LookupOptions,
        reducer: &dyn Reducer,
        oracle: &dyn RelevanceOracle,
    ) -> Vec<MatchGroup<T>> {
        let query = self.encode_query(e, options, reducer, oracle);
        self.lookup_pattern(&query, options)
    }

    /// Like `lookup`, with the config's default options.
    pub fn lookup_default(
        &self,
        e: &Expr,
        reducer: &dyn Reducer,
        oracle: &dyn RelevanceOracle,
    ) -> Vec<MatchGroup<T>> {
        self.lookup(e, &self.config.lookup, reducer, oracle)
    }

    /// Every group of values that matches the query pattern, best first.
    /// A group reached along several paths is reported once, with its best score.
    pub fn lookup_pattern(&self, query: &DTExpr, options: &LookupOptions) -> Vec<MatchGroup<T>> {
        let mut groups: Vec<MatchGroup<T>> = vec![];
        let mut positions: HashMap<*const Vec<T>, usize> = HashMap::new();
        get_unify_while(&self.root, query, options, |values, score| {
            match positions.get(&Arc::as_ptr(values)) {
                Some(&i) => groups[i].score = groups[i].score.max(score),
                None => {
                    positions.insert(Arc::as_ptr(values), groups.len());
                    groups.push(MatchGroup {
                        values: values.clone(),
                        score,
                    });
                }
            }
            true
        });
        groups.sort_by(|a, b| b.score.cmp(&a.score));
        groups.retain(|g| g.score >= options.min_score);
        if let Some(max_results) = options.max_results {
            groups.truncate(max_results);
        }
        debug!(query = %query, results = groups.len(), "lookup");
        groups
    }

    /// Calls `callback` on each match as the search finds it, unsorted and without merging.
    /// Returns false if the callback stopped the search by returning false.
    pub fn lookup_while<F>(&self, query: &DTExpr, options: &LookupOptions, mut callback: F) -> bool
    where
        F: FnMut(&[T], usize) -> bool,
    {
        get_unify_while(&self.root, query, options, |values, score| {
            callback(values.as_slice(), score)
        })
    }

    /// An index with the same shape, holding `f` of each value.
    pub fn map_values<U>(&self, mut f: impl FnMut(&T) -> U) -> LemmaIndex<U> {
        LemmaIndex {
            root: trie::map_root(&self.root, &mut f),
            config: self.config.clone(),
            rewrites: self.rewrites.clone(),
        }
    }

    /// The number of distinct key sequences stored.
    pub fn len(&self) -> usize {
        trie::num_leaves(&self.root)
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    /// Every stored key sequence, in key order, with its values.
    pub fn entries(&self) -> Vec<(Vec<Key>, &[T])> {
        trie::root_entries(&self.root)
    }

    /// Every stored value, in key order.
    /// A value stored under several encodings appears once for each.
    pub fn values(&self) -> Vec<&T> {
        self.entries()
            .into_iter()
            .flat_map(|(_, values)| values.iter())
            .collect()
    }

    /// Panics if the trie is malformed.
    pub fn check_invariants(&self) {
        trie::check_root(&self.root);
    }
}

impl<T: Clone + PartialEq> LemmaIndex<T> {
    /// Returns an index that also maps every encoding of `e` to `value`.
    pub fn insert(
        &self,
        e: &Expr,
        value: T,
        reducer: &dyn Reducer,
        oracle: &dyn RelevanceOracle,
    ) -> LemmaIndex<T> {
        let mut answer = self.clone();
        answer.insert_mut(e, value, reducer, oracle);
        answer
    }

    /// Inserts in place. Snapshots taken before are unaffected.
    pub fn insert_mut(
        &mut self,
        e: &Expr,
        value: T,
        reducer: &dyn Reducer,
        oracle: &dyn RelevanceOracle,
    ) {
        for pattern in self.encode(e, reducer, oracle) {
            self.root = insert_root(&self.root, &pattern.keys(), value.clone());
        }
    }

    pub fn insert_pattern(&self, pattern: &DTExpr, value: T) -> LemmaIndex<T> {
        let mut answer = self.clone();
        answer.root = insert_root(&self.root, &pattern.keys(), value);
        answer
    }

    /// Inserts an already flattened sequence, after checking that it is one complete tree.
    pub fn insert_keys(&self, keys: &[Key], value: T) -> Result<LemmaIndex<T>, KeyError> {
        check_keys(keys)?;
        let mut answer = self.clone();
        answer.root = insert_root(&self.root, keys, value);
        Ok(answer)
    }
}

impl<T: fmt::Debug> fmt::Display for LemmaIndex<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        trie::fmt_root(&self.root, f)
    }
}

fn lock<X>(mutex: &Mutex<X>) -> MutexGuard<'_, X> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Holds the current version of an index for many readers and serialized writers.
///
/// Readers take a snapshot and search it without holding any lock. A writer builds
/// the next version from the current one, and only the final swap is under the lock
/// readers use.
pub struct SharedIndex<T> {
    current: Mutex<Arc<LemmaIndex<T>>>,
    writer: Mutex<()>,
}

impl<T> SharedIndex<T> {
    pub fn new(index: LemmaIndex<T>) -> SharedIndex<T> {
        SharedIndex {
            current: Mutex::new(Arc::new(index)),
            writer: Mutex::new(()),
        }
    }

    pub fn snapshot(&self) -> Arc<LemmaIndex<T>> {
        lock(&self.current).clone()
    }

    /// Replaces the current index with `f` of it.
    pub fn update(&self, f: impl FnOnce(&LemmaIndex<T>) -> LemmaIndex<T>) {
        let _writer = lock(&self.writer);
        let base = self.snapshot();
        let next = Arc::new(f(&base));
        *lock(&self.current) = next;
    }
}
