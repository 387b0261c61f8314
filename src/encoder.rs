// Builds pattern trees from host expressions.
//
// Each subexpression is put in weak head normal form first, then passed through the
// rewrite table, then split into a head node and its arguments. Arguments the relevance
// oracle rejects become anonymous wildcards.
//
// When storing, a lambda `fun x => h a₁ … aₙ x` with `x` unused elsewhere is also encoded
// in its eta-contracted form `h a₁ … aₙ`. Alternatives at different positions multiply,
// so the number of encodings is capped by the config. The direct encoding always comes first.

use std::collections::HashSet;

use tracing::trace;

use crate::config::EncoderConfig;
use crate::kernel::expr::Expr;
use crate::kernel::reduce::{Reducer, Reduction};
use crate::kernel::relevance::RelevanceOracle;
use crate::pattern::DTExpr;
use crate::rewrite::RewriteTable;

/// Whether an expression is being stored, or used to look things up.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Mode {
    Store,

    /// With `unify`, query metavariables stay wildcards.
    /// Without it, they are fixed unknowns that flatten to opaque keys.
    Query { unify: bool },
}

pub struct Encoder<'a> {
    config: &'a EncoderConfig,
    rewrites: &'a RewriteTable,
    reducer: &'a dyn Reducer,
    oracle: &'a dyn RelevanceOracle,
    mode: Mode,
}

impl<'a> Encoder<'a> {
    pub fn new(
        config: &'a EncoderConfig,
        rewrites: &'a RewriteTable,
        reducer: &'a dyn Reducer,
        oracle: &'a dyn RelevanceOracle,
        mode: Mode,
    ) -> Encoder<'a> {
        Encoder {
            config,
            rewrites,
            reducer,
            oracle,
            mode,
        }
    }

    /// Every encoding of the expression, the direct one first.
    /// Only stored expressions get eta alternates.
    pub fn encode_all(&self, e: &Expr) -> Vec<DTExpr> {
        let alternates = self.mode == Mode::Store && self.config.eta_alternates;
        let mut encodings = self.encode(e, 0, alternates);
        encodings.truncate(self.cap());
        trace!(expr = %e, encodings = encodings.len(), "encoded expression");
        encodings
    }

    /// The direct encoding alone.
    pub fn encode_one(&self, e: &Expr) -> DTExpr {
        self.encode(e, 0, false)
            .into_iter()
            .next()
            .unwrap_or(DTExpr::Opaque)
    }

    fn cap(&self) -> usize {
        self.config.max_encodings.max(1)
    }

    // `depth` counts the binders entered inside the pattern itself.
    // The result is never empty.
    fn encode(&self, e: &Expr, depth: u32, alternates: bool) -> Vec<DTExpr> {
        let e = match self.reducer.whnf(e, self.config.policy) {
            Reduction::Whnf(e) => e,
            Reduction::Opaque => return vec![DTExpr::Opaque],
        };
        match self.rewrites.apply(&e) {
            Some(rewritten) => {
                trace!(from = %e, to = %rewritten, "rewrote");
                self.encode_structure(&rewritten, depth, alternates)
            }
            None => self.encode_structure(&e, depth, alternates),
        }
    }

    fn encode_structure(&self, e: &Expr, depth: u32, alternates: bool) -> Vec<DTExpr> {
        match e {
            Expr::Lit(lit) => vec![DTExpr::Lit(lit.clone())],
            Expr::Sort(_) => vec![DTExpr::Sort],

            // Zeta reduction was off.
            Expr::Let(..) => vec![DTExpr::Opaque],

            Expr::Lam(_, _, _, body) => {
                let mut encodings: Vec<DTExpr> = self
                    .encode(body, depth + 1, alternates)
                    .into_iter()
                    .map(|b| DTExpr::Lam(Box::new(b)))
                    .collect();
                if alternates {
                    if let Some(contracted) = eta_contract(e) {
                        encodings.extend(self.encode(&contracted, depth, alternates));
                    }
                }
                self.dedup(encodings)
            }

            Expr::ForallE(_, _, domain, body) => {
                let domains = if self.config.index_forall_domains {
                    self.encode(domain, depth, alternates)
                } else {
                    vec![DTExpr::Star(None)]
                };
                let bodies = self.encode(body, depth + 1, alternates);
                self.combine(vec![domains, bodies], |mut parts| {
                    let body = parts.pop().unwrap_or(DTExpr::Opaque);
                    let domain = parts.pop().unwrap_or(DTExpr::Opaque);
                    DTExpr::Forall(Box::new(domain), Box::new(body))
                })
            }

            _ => self.encode_app(e, depth, alternates),
        }
    }

    fn encode_app(&self, e: &Expr, depth: u32, alternates: bool) -> Vec<DTExpr> {
        let head = e.get_app_fn();
        let args = e.get_app_args();

        match head {
            Expr::MVar(id) => {
                let encoded = match self.mode {
                    Mode::Query { unify: false } if args.is_empty() => DTExpr::Fixed(*id),
                    Mode::Query { unify: false } => DTExpr::Opaque,
                    _ if args.is_empty() => DTExpr::Star(Some(*id)),
                    _ => DTExpr::Star(None),
                };
                return vec![encoded];
            }

            // Bound outside the pattern.
            Expr::BVar(index) if *index >= depth => return vec![DTExpr::Opaque],

            _ => {}
        }

        let mut parts: Vec<Vec<DTExpr>> = vec![];
        if let Expr::Proj(_, _, value) = head {
            parts.push(self.encode(value, depth, alternates));
        }
        for (i, arg) in args.iter().enumerate() {
            if self.oracle.ignore_arg(head, i, arg) {
                parts.push(vec![DTExpr::Star(None)]);
            } else {
                parts.push(self.encode(arg, depth, alternates));
            }
        }

        match head {
            Expr::Const(name) => self.combine(parts, |args| DTExpr::Const(name.clone(), args)),
            Expr::FVar(id) => self.combine(parts, |args| DTExpr::FVar(*id, args)),
            Expr::BVar(index) => self.combine(parts, |args| DTExpr::BVar(*index, args)),
            Expr::Proj(structure, field, _) => self.combine(parts, |mut args| {
                let value = args.remove(0);
                DTExpr::Proj(structure.clone(), *field, Box::new(value), args)
            }),

            // Something applied that did not reduce, like a lambda with beta off.
            _ => vec![DTExpr::Opaque],
        }
    }

    // The cartesian product of the choices at each position, in lexicographic order,
    // so the first result uses the first choice everywhere.
    // Only distinct combinations count toward the cap.
    fn combine(
        &self,
        parts: Vec<Vec<DTExpr>>,
        build: impl Fn(Vec<DTExpr>) -> DTExpr,
    ) -> Vec<DTExpr> {
        let cap = self.cap();
        let mut combos: Vec<Vec<DTExpr>> = vec![vec![]];
        for choices in parts {
            let mut seen = HashSet::new();
            let mut next = vec![];
            'outer: for combo in &combos {
                for choice in &choices {
                    let mut extended = combo.clone();
                    extended.push(choice.clone());
                    if !seen.insert(extended.clone()) {
                        continue;
                    }
                    next.push(extended);
                    if next.len() == cap {
                        break 'outer;
                    }
                }
            }
            combos = next;
        }
        self.dedup(combos.into_iter().map(build).collect())
    }

    fn dedup(&self, encodings: Vec<DTExpr>) -> Vec<DTExpr> {
        let mut seen = HashSet::new();
        let mut answer = vec![];
        for e in encodings {
            if answer.len() == self.cap() {
                break;
            }
            if seen.insert(e.clone()) {
                answer.push(e);
            }
        }
        answer
    }
}

/// Contracts `fun x => f x` to `f`, when `x` does not occur in `f`.
/// A body that is itself a lambda is contracted first, so `fun x y => f x y` gives `f`.
pub fn eta_contract(e: &Expr) -> Option<Expr> {
    let Expr::Lam(_, _, _, body) = e else {
        return None;
    };
    let body = match body.as_ref() {
        Expr::Lam(..) => eta_contract(body).unwrap_or_else(|| body.as_ref().clone()),
        _ => body.as_ref().clone(),
    };
    match &body {
        Expr::App(f, x) if **x == Expr::BVar(0) && !f.has_loose_bvar(0) => {
            Some(f.lower_loose_bvars(1, 1))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::name::Name;
    use crate::kernel::parse::ParseContext;
    use crate::kernel::reduce::{ReductionPolicy, StructuralReducer};
    use crate::kernel::relevance::{AllRelevant, ParamTable};

    fn parse(s: &str) -> Expr {
        Expr::parse(s).unwrap()
    }

    fn encode_with(config: &EncoderConfig, mode: Mode, s: &str) -> Vec<String> {
        let rewrites = RewriteTable::default();
        let reducer = StructuralReducer::new();
        let encoder = Encoder::new(config, &rewrites, &reducer, &AllRelevant, mode);
        encoder
            .encode_all(&parse(s))
            .iter()
            .map(|e| e.to_string())
            .collect()
    }

    fn encode(mode: Mode, s: &str) -> Vec<String> {
        encode_with(&EncoderConfig::default(), mode, s)
    }

    #[test]
    fn test_structure() {
        assert_eq!(
            encode(Mode::Store, "forall (n : Nat), Eq (f n) 0"),
            vec!["(∀ Nat (Eq (f #0) 0))"]
        );
        assert_eq!(encode(Mode::Store, "proj Prod 0 p"), vec!["(Prod.0 p)"]);
        assert_eq!(encode(Mode::Store, "Prop"), vec!["Sort"]);
    }

    #[test]
    fn test_metavariables_by_mode() {
        let mut context = ParseContext::new();
        let e = context.parse("f ?x (?g 1) ?x").unwrap();
        let config = EncoderConfig::default();
        let rewrites = RewriteTable::default();
        let reducer = StructuralReducer::new();
        let x = context.mvar("x");

        let stored = Encoder::new(&config, &rewrites, &reducer, &AllRelevant, Mode::Store);
        assert_eq!(
            stored.encode_one(&e),
            DTExpr::constant(
                "f",
                vec![DTExpr::Star(Some(x)), DTExpr::Star(None), DTExpr::Star(Some(x))]
            )
        );

        let fixed = Encoder::new(
            &config,
            &rewrites,
            &reducer,
            &AllRelevant,
            Mode::Query { unify: false },
        );
        assert_eq!(
            fixed.encode_one(&e),
            DTExpr::constant("f", vec![DTExpr::Fixed(x), DTExpr::Opaque, DTExpr::Fixed(x)])
        );
        assert_eq!(fixed.encode_one(&e).to_string(), format!("(f {} ◾ {})", x, x));
        assert_eq!(
            fixed.encode_one(&e).keys(),
            DTExpr::constant("f", vec![DTExpr::Opaque; 3]).keys()
        );
    }

    #[test]
    fn test_duplicate_choices_do_not_use_up_the_cap() {
        let config = EncoderConfig {
            max_encodings: 2,
            ..EncoderConfig::default()
        };
        let rewrites = RewriteTable::default();
        let reducer = StructuralReducer::new();
        let encoder = Encoder::new(&config, &rewrites, &reducer, &AllRelevant, Mode::Store);
        let a = DTExpr::constant("a", vec![]);
        let b = DTExpr::constant("b", vec![]);
        let parts = vec![vec![a.clone(), a.clone(), b.clone()]];
        let encodings = encoder.combine(parts, |args| DTExpr::constant("f", args));
        assert_eq!(
            encodings,
            vec![
                DTExpr::constant("f", vec![a.clone()]),
                DTExpr::constant("f", vec![b.clone()]),
            ]
        );

        let parts = vec![vec![a.clone(), a.clone(), b.clone()], vec![a.clone()]];
        let encodings = encoder.combine(parts, |args| DTExpr::constant("f", args));
        assert_eq!(
            encodings,
            vec![
                DTExpr::constant("f", vec![a.clone(), a.clone()]),
                DTExpr::constant("f", vec![b, a]),
            ]
        );
    }

    #[test]
    fn test_escaping_bound_variable_is_opaque() {
        let e = Expr::app(Expr::constant("f"), Expr::BVar(3));
        let config = EncoderConfig::default();
        let rewrites = RewriteTable::default();
        let reducer = StructuralReducer::new();
        let encoder = Encoder::new(&config, &rewrites, &reducer, &AllRelevant, Mode::Store);
        assert_eq!(encoder.encode_one(&e).to_string(), "(f ◾)");
    }

    #[test]
    fn test_reduction_before_encoding() {
        let config = EncoderConfig::default();
        let rewrites = RewriteTable::default();
        let mut reducer = StructuralReducer::new();
        reducer
            .define("double", parse("fun n => HAdd.hAdd n n"))
            .opaque("Classical.choose");
        let encoder = Encoder::new(&config, &rewrites, &reducer, &AllRelevant, Mode::Store);
        assert_eq!(
            encoder.encode_one(&parse("double 3")).to_string(),
            "(HAdd.hAdd 3 3)"
        );
        assert_eq!(
            encoder
                .encode_one(&parse("Prime (Classical.choose h)"))
                .to_string(),
            "(Prime ◾)"
        );
    }

    #[test]
    fn test_let_without_zeta_is_opaque() {
        let config = EncoderConfig {
            policy: ReductionPolicy {
                zeta: false,
                ..ReductionPolicy::default()
            },
            ..EncoderConfig::default()
        };
        assert_eq!(
            encode_with(&config, Mode::Store, "f (let y := a; g y)"),
            vec!["(f ◾)"]
        );
    }

    #[test]
    fn test_ignored_arguments_become_wildcards() {
        let mut table = ParamTable::new();
        table
            .declare("HAdd.hAdd", &parse("forall {α : Type} [HAdd α α α], α -> α -> α"))
            .type_former("Nat");
        let config = EncoderConfig::default();
        let rewrites = RewriteTable::default();
        let reducer = StructuralReducer::new();
        let encoder = Encoder::new(&config, &rewrites, &reducer, &table, Mode::Store);
        assert_eq!(
            encoder
                .encode_one(&parse("HAdd.hAdd Nat instAddNat a b"))
                .to_string(),
            "(HAdd.hAdd Nat * a b)"
        );
    }

    #[test]
    fn test_rewrites_apply() {
        assert_eq!(encode(Mode::Store, "map (fun x => x) l"), vec!["(map id l)"]);
        assert_eq!(
            encode(Mode::Store, "Eq (OfNat.ofNat Nat 2 inst) Nat.zero"),
            vec!["(Eq 2 0)"]
        );
    }

    #[test]
    fn test_eta_alternates() {
        let mut context = ParseContext::new();
        let e = context.parse("Continuous (fun x => ?f x)").unwrap();
        let f = context.mvar("f");
        let config = EncoderConfig::default();
        let rewrites = RewriteTable::default();
        let reducer = StructuralReducer::new();
        let encoder = Encoder::new(&config, &rewrites, &reducer, &AllRelevant, Mode::Store);
        assert_eq!(
            encoder.encode_all(&e),
            vec![
                DTExpr::constant("Continuous", vec![DTExpr::Lam(Box::new(DTExpr::Star(None)))]),
                DTExpr::Const(Name::new("Continuous"), vec![DTExpr::Star(Some(f))]),
            ]
        );

        // Queries only get the direct encoding.
        let query = Encoder::new(
            &config,
            &rewrites,
            &reducer,
            &AllRelevant,
            Mode::Query { unify: true },
        );
        assert_eq!(query.encode_all(&e).len(), 1);
    }

    #[test]
    fn test_nested_eta_alternates() {
        assert_eq!(
            encode(Mode::Store, "P (fun x y => g x y)"),
            vec!["(P (λ (λ (g #1 #0))))", "(P (λ (g #0)))", "(P g)"]
        );
        // `x` occurs in the function part, so there is nothing to contract.
        assert_eq!(encode(Mode::Store, "P (fun x => g x x)"), vec!["(P (λ (g #0 #0)))"]);
    }

    #[test]
    fn test_alternates_multiply_up_to_cap() {
        let e = "R (fun x => f x) (fun y => g y)";
        assert_eq!(
            encode(Mode::Store, e),
            vec![
                "(R (λ (f #0)) (λ (g #0)))",
                "(R (λ (f #0)) g)",
                "(R f (λ (g #0)))",
                "(R f g)",
            ]
        );
        let config = EncoderConfig {
            max_encodings: 3,
            ..EncoderConfig::default()
        };
        assert_eq!(encode_with(&config, Mode::Store, e).len(), 3);
        let config = EncoderConfig {
            eta_alternates: false,
            ..EncoderConfig::default()
        };
        assert_eq!(encode_with(&config, Mode::Store, e).len(), 1);
    }

    #[test]
    fn test_forall_domains_can_be_skipped() {
        let config = EncoderConfig {
            index_forall_domains: false,
            ..EncoderConfig::default()
        };
        assert_eq!(
            encode_with(&config, Mode::Store, "forall (n : Nat), P n"),
            vec!["(∀ * (P #0))"]
        );
    }
}
