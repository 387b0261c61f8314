use crate::config::{IndexConfig, LookupOptions};
use crate::index::{LemmaIndex, MatchGroup};
use crate::kernel::expr::Expr;
use crate::kernel::parse::ParseContext;
use crate::kernel::reduce::StructuralReducer;
use crate::kernel::relevance::ParamTable;
use crate::pattern::DTExpr;

/// An index together with the host services it is built against.
/// Expressions share one parse context, so `?x` means the same metavariable everywhere.
pub struct Fixture {
    pub context: ParseContext,
    pub reducer: StructuralReducer,
    pub params: ParamTable,
    pub index: LemmaIndex<&'static str>,
}

impl Fixture {
    pub fn new() -> Fixture {
        Fixture::with_config(IndexConfig::default())
    }

    pub fn with_config(config: IndexConfig) -> Fixture {
        Fixture {
            context: ParseContext::new(),
            reducer: StructuralReducer::new(),
            params: ParamTable::new(),
            index: LemmaIndex::new(config),
        }
    }

    pub fn parse(&mut self, text: &str) -> Expr {
        match self.context.parse(text) {
            Ok(e) => e,
            Err(e) => panic!("could not parse {}: {}", text, e),
        }
    }

    pub fn insert(&mut self, text: &str, value: &'static str) {
        let e = self.parse(text);
        self.index
            .insert_mut(&e, value, &self.reducer, &self.params);
    }

    pub fn encode(&mut self, text: &str) -> Vec<DTExpr> {
        let e = self.parse(text);
        self.index.encode(&e, &self.reducer, &self.params)
    }

    pub fn query(&mut self, text: &str, options: &LookupOptions) -> DTExpr {
        let e = self.parse(text);
        self.index
            .encode_query(&e, options, &self.reducer, &self.params)
    }

    pub fn groups(&mut self, text: &str, options: &LookupOptions) -> Vec<MatchGroup<&'static str>> {
        let e = self.parse(text);
        self.index.lookup(&e, options, &self.reducer, &self.params)
    }

    /// Each value found, with the score of its group, best first.
    pub fn lookup_with(&mut self, text: &str, options: &LookupOptions) -> Vec<(&'static str, usize)> {
        flatten(&self.groups(text, options))
    }

    pub fn lookup(&mut self, text: &str) -> Vec<(&'static str, usize)> {
        self.lookup_with(text, &LookupOptions::default())
    }

    /// Just the values found, best first.
    pub fn found(&mut self, text: &str) -> Vec<&'static str> {
        self.lookup(text).into_iter().map(|(v, _)| v).collect()
    }
}

pub fn flatten(groups: &[MatchGroup<&'static str>]) -> Vec<(&'static str, usize)> {
    let mut answer = vec![];
    for group in groups {
        for value in group.values.iter() {
            answer.push((*value, group.score));
        }
    }
    answer
}

pub fn without_unify() -> LookupOptions {
    LookupOptions {
        unify: false,
        ..LookupOptions::default()
    }
}
