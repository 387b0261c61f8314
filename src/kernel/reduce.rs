use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::expr::Expr;
use super::name::Name;

// Upper bound on reduction steps for one weak head normalization.
const MAX_WHNF_STEPS: usize = 512;

/// Which reduction steps weak head normalization may take.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReductionPolicy {
    /// `(fun x => b) a` to `b[x := a]`.
    pub beta: bool,

    /// `let x := v; b` to `b[x := v]`.
    pub zeta: bool,

    /// Unfold constants that have definitions.
    pub delta: bool,

    /// Project a field out of a constructor application.
    pub proj: bool,
}

impl Default for ReductionPolicy {
    fn default() -> Self {
        ReductionPolicy {
            beta: true,
            zeta: true,
            delta: true,
            proj: true,
        }
    }
}

impl ReductionPolicy {
    /// A policy that never reduces.
    pub fn none() -> Self {
        ReductionPolicy {
            beta: false,
            zeta: false,
            delta: false,
            proj: false,
        }
    }
}

/// The result of weak head normalization.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Reduction {
    Whnf(Expr),

    /// The expression has no structure the index should look at.
    Opaque,
}

/// Weak head normalization, supplied by the host engine.
pub trait Reducer {
    fn whnf(&self, expr: &Expr, policy: ReductionPolicy) -> Reduction;
}

/// What the reducer knows about a structure type.
#[derive(Clone, Debug)]
pub struct StructureInfo {
    pub constructor: Name,

    // Number of parameters the constructor takes before its fields.
    pub num_params: usize,
}

/// A reducer that works purely from tables: definitions to unfold, structures to project,
/// and names to treat as opaque. It has no notion of types.
#[derive(Clone, Debug, Default)]
pub struct StructuralReducer {
    definitions: HashMap<Name, Expr>,
    structures: HashMap<Name, StructureInfo>,
    opaque: HashSet<Name>,
}

impl StructuralReducer {
    pub fn new() -> StructuralReducer {
        StructuralReducer::default()
    }

    /// Registers a definition. The value is usually a lambda.
    pub fn define(&mut self, name: &str, value: Expr) -> &mut Self {
        self.definitions.insert(Name::new(name), value);
        self
    }

    pub fn structure(&mut self, name: &str, constructor: &str, num_params: usize) -> &mut Self {
        self.structures.insert(
            Name::new(name),
            StructureInfo {
                constructor: Name::new(constructor),
                num_params,
            },
        );
        self
    }

    /// Anything headed by this constant is opaque to the index.
    pub fn opaque(&mut self, name: &str) -> &mut Self {
        self.opaque.insert(Name::new(name));
        self
    }

    // Reduces `proj S i e` when `e` normalizes to a constructor application of `S`.
    fn reduce_proj(&self, structure: &Name, index: u32, e: &Expr, policy: ReductionPolicy) -> Option<Expr> {
        let info = self.structures.get(structure)?;
        let inner = match self.whnf(e, policy) {
            Reduction::Whnf(inner) => inner,
            Reduction::Opaque => return None,
        };
        match inner.get_app_fn() {
            Expr::Const(name) if *name == info.constructor => {
                let args = inner.get_app_args();
                args.get(info.num_params + index as usize).map(|a| (*a).clone())
            }
            _ => None,
        }
    }
}

impl Reducer for StructuralReducer {
    fn whnf(&self, expr: &Expr, policy: ReductionPolicy) -> Reduction {
        let mut e = expr.clone();
        for _ in 0..MAX_WHNF_STEPS {
            if let Expr::Let(_, _, value, body) = &e {
                if policy.zeta {
                    e = body.instantiate1(value);
                    continue;
                }
                return Reduction::Whnf(e);
            }
            let num_args = e.get_app_num_args();
            let next = match e.get_app_fn() {
                Expr::Lam(..) if policy.beta && num_args > 0 => Some(e.head_beta()),
                Expr::Const(name) if self.opaque.contains(name) => return Reduction::Opaque,
                Expr::Const(name) if policy.delta => self.definitions.get(name).map(|value| {
                    let args = e.get_app_args().into_iter().cloned();
                    Expr::mk_app(value.clone(), args)
                }),
                Expr::Proj(structure, index, inner) if policy.proj => self
                    .reduce_proj(structure, *index, inner, policy)
                    .map(|field| {
                        let args = e.get_app_args().into_iter().cloned();
                        Expr::mk_app(field, args)
                    }),
                _ => None,
            };
            match next {
                Some(reduced) => e = reduced,
                None => return Reduction::Whnf(e),
            }
        }
        debug!(expr = %expr, "whnf step limit reached");
        Reduction::Whnf(e)
    }
}
