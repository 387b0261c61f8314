use std::fmt;
use std::sync::Arc;

use super::name::Name;

/// Identifies a free (local) variable of the host context.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct FVarId(pub u32);

/// Identifies a metavariable, a hole that unification may fill.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct MVarId(pub u32);

impl fmt::Display for FVarId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "${}", self.0)
    }
}

impl fmt::Display for MVarId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "?{}", self.0)
    }
}

/// Literal constants. Naturals sort before strings.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Literal {
    Nat(u64),
    Str(Arc<str>),
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Literal::Nat(n) => write!(f, "{}", n),
            Literal::Str(s) => write!(f, "{:?}", s),
        }
    }
}

/// How a binder was declared. Drives argument relevance.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum BinderInfo {
    #[default]
    Default,
    Implicit,
    StrictImplicit,
    InstImplicit,
}

/// The host expression language, with de Bruijn indices for bound variables.
///
/// This is the input to pattern-tree construction. Bound variable `BVar(0)` refers
/// to the closest enclosing binder. Children are shared, so cloning is cheap.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum Expr {
    BVar(u32),
    FVar(FVarId),
    MVar(MVarId),

    // The universe level is kept for display only. Sorts are not distinguished by the index.
    Sort(u32),

    Const(Name),
    App(Arc<Expr>, Arc<Expr>),

    // Binder name, binder info, domain, body.
    Lam(Name, BinderInfo, Arc<Expr>, Arc<Expr>),
    ForallE(Name, BinderInfo, Arc<Expr>, Arc<Expr>),

    // Binder name, type, value, body.
    Let(Name, Arc<Expr>, Arc<Expr>, Arc<Expr>),

    Lit(Literal),

    // Structure name, field index, the structure value.
    Proj(Name, u32, Arc<Expr>),
}

impl Expr {
    pub fn constant(name: &str) -> Expr {
        Expr::Const(Name::new(name))
    }

    pub fn nat(n: u64) -> Expr {
        Expr::Lit(Literal::Nat(n))
    }

    pub fn string(s: &str) -> Expr {
        Expr::Lit(Literal::Str(Arc::from(s)))
    }

    pub fn app(f: Expr, a: Expr) -> Expr {
        Expr::App(Arc::new(f), Arc::new(a))
    }

    /// Applies `f` to each of `args` in order.
    pub fn mk_app(f: Expr, args: impl IntoIterator<Item = Expr>) -> Expr {
        args.into_iter().fold(f, Expr::app)
    }

    pub fn lam(name: &str, info: BinderInfo, domain: Expr, body: Expr) -> Expr {
        Expr::Lam(Name::new(name), info, Arc::new(domain), Arc::new(body))
    }

    pub fn forall(name: &str, info: BinderInfo, domain: Expr, body: Expr) -> Expr {
        Expr::ForallE(Name::new(name), info, Arc::new(domain), Arc::new(body))
    }

    /// A non-dependent arrow `domain -> codomain`.
    /// The codomain is lifted so it does not see the new binder.
    pub fn arrow(domain: Expr, codomain: Expr) -> Expr {
        let body = codomain.lift_loose_bvars(0, 1);
        Expr::forall("a", BinderInfo::Default, domain, body)
    }

    /// The head of an application spine.
    pub fn get_app_fn(&self) -> &Expr {
        let mut e = self;
        while let Expr::App(f, _) = e {
            e = f;
        }
        e
    }

    /// The arguments of an application spine, outermost last.
    pub fn get_app_args(&self) -> Vec<&Expr> {
        let mut args = vec![];
        let mut e = self;
        while let Expr::App(f, a) = e {
            args.push(a.as_ref());
            e = f;
        }
        args.reverse();
        args
    }

    pub fn get_app_num_args(&self) -> usize {
        let mut n = 0;
        let mut e = self;
        while let Expr::App(f, _) = e {
            n += 1;
            e = f;
        }
        n
    }

    pub fn is_mvar(&self) -> bool {
        matches!(self, Expr::MVar(_))
    }

    /// True for sorts and for function types ending in a sort, which can only be types.
    pub fn is_sort_like(&self) -> bool {
        match self {
            Expr::Sort(_) => true,
            Expr::ForallE(_, _, _, body) => body.is_sort_like(),
            _ => false,
        }
    }

    /// One more than the largest loose bound variable, or 0 if there are none.
    pub fn loose_bvar_range(&self) -> u32 {
        match self {
            Expr::BVar(i) => i + 1,
            Expr::App(f, a) => f.loose_bvar_range().max(a.loose_bvar_range()),
            Expr::Lam(_, _, ty, body) | Expr::ForallE(_, _, ty, body) => ty
                .loose_bvar_range()
                .max(body.loose_bvar_range().saturating_sub(1)),
            Expr::Let(_, ty, val, body) => ty
                .loose_bvar_range()
                .max(val.loose_bvar_range())
                .max(body.loose_bvar_range().saturating_sub(1)),
            Expr::Proj(_, _, e) => e.loose_bvar_range(),
            Expr::FVar(_)
            | Expr::MVar(_)
            | Expr::Sort(_)
            | Expr::Const(_)
            | Expr::Lit(_) => 0,
        }
    }

    pub fn has_loose_bvars(&self) -> bool {
        self.loose_bvar_range() > 0
    }

    /// Whether the loose bound variable `index` occurs in this expression.
    pub fn has_loose_bvar(&self, index: u32) -> bool {
        match self {
            Expr::BVar(i) => *i == index,
            Expr::App(f, a) => f.has_loose_bvar(index) || a.has_loose_bvar(index),
            Expr::Lam(_, _, ty, body) | Expr::ForallE(_, _, ty, body) => {
                ty.has_loose_bvar(index) || body.has_loose_bvar(index + 1)
            }
            Expr::Let(_, ty, val, body) => {
                ty.has_loose_bvar(index)
                    || val.has_loose_bvar(index)
                    || body.has_loose_bvar(index + 1)
            }
            Expr::Proj(_, _, e) => e.has_loose_bvar(index),
            Expr::FVar(_)
            | Expr::MVar(_)
            | Expr::Sort(_)
            | Expr::Const(_)
            | Expr::Lit(_) => false,
        }
    }

    /// Rebuilds the expression, applying `f` to each loose bound variable.
    /// `f` receives the variable's index and the current binder depth.
    fn map_loose_bvars(&self, depth: u32, f: &impl Fn(u32, u32) -> Expr) -> Expr {
        if self.loose_bvar_range() <= depth {
            return self.clone();
        }
        match self {
            Expr::BVar(i) => f(*i, depth),
            Expr::App(g, a) => Expr::App(
                Arc::new(g.map_loose_bvars(depth, f)),
                Arc::new(a.map_loose_bvars(depth, f)),
            ),
            Expr::Lam(n, bi, ty, body) => Expr::Lam(
                n.clone(),
                *bi,
                Arc::new(ty.map_loose_bvars(depth, f)),
                Arc::new(body.map_loose_bvars(depth + 1, f)),
            ),
            Expr::ForallE(n, bi, ty, body) => Expr::ForallE(
                n.clone(),
                *bi,
                Arc::new(ty.map_loose_bvars(depth, f)),
                Arc::new(body.map_loose_bvars(depth + 1, f)),
            ),
            Expr::Let(n, ty, val, body) => Expr::Let(
                n.clone(),
                Arc::new(ty.map_loose_bvars(depth, f)),
                Arc::new(val.map_loose_bvars(depth, f)),
                Arc::new(body.map_loose_bvars(depth + 1, f)),
            ),
            Expr::Proj(s, i, e) => Expr::Proj(s.clone(), *i, Arc::new(e.map_loose_bvars(depth, f))),
            _ => self.clone(),
        }
    }

    /// Adds `amount` to every loose bound variable with index at least `start`.
    pub fn lift_loose_bvars(&self, start: u32, amount: u32) -> Expr {
        if amount == 0 {
            return self.clone();
        }
        self.map_loose_bvars(0, &|i, depth| {
            if i >= start + depth {
                Expr::BVar(i + amount)
            } else {
                Expr::BVar(i)
            }
        })
    }

    /// Subtracts `amount` from every loose bound variable with index at least `start`.
    /// The variables in `start - amount .. start` must not occur.
    pub fn lower_loose_bvars(&self, start: u32, amount: u32) -> Expr {
        if amount == 0 {
            return self.clone();
        }
        self.map_loose_bvars(0, &|i, depth| {
            if i >= start + depth {
                Expr::BVar(i - amount)
            } else {
                Expr::BVar(i)
            }
        })
    }

    /// Substitutes `value` for the loose bound variable 0, as when entering a binder body.
    pub fn instantiate1(&self, value: &Expr) -> Expr {
        self.map_loose_bvars(0, &|i, depth| {
            if i == depth {
                value.lift_loose_bvars(0, depth)
            } else if i > depth {
                Expr::BVar(i - 1)
            } else {
                Expr::BVar(i)
            }
        })
    }

    /// Beta-reduces the head of an application spine as far as possible.
    pub fn head_beta(&self) -> Expr {
        let mut args: Vec<Expr> = self.get_app_args().into_iter().cloned().collect();
        let mut head = self.get_app_fn().clone();
        let mut consumed = 0;
        while consumed < args.len() {
            match head {
                Expr::Lam(_, _, _, body) => {
                    head = body.instantiate1(&args[consumed]);
                    consumed += 1;
                }
                _ => break,
            }
        }
        if consumed == 0 {
            return self.clone();
        }
        let rest = args.split_off(consumed);
        let result = Expr::mk_app(head, rest);
        if matches!(result.get_app_fn(), Expr::Lam(..)) && result.get_app_num_args() > 0 {
            result.head_beta()
        } else {
            result
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Expr::BVar(i) => write!(f, "#{}", i),
            Expr::FVar(id) => write!(f, "{}", id),
            Expr::MVar(id) => write!(f, "{}", id),
            Expr::Sort(0) => write!(f, "Prop"),
            Expr::Sort(_) => write!(f, "Type"),
            Expr::Const(name) => write!(f, "{}", name),
            Expr::App(..) => {
                write!(f, "({}", self.get_app_fn())?;
                for arg in self.get_app_args() {
                    write!(f, " {}", arg)?;
                }
                write!(f, ")")
            }
            Expr::Lam(n, _, ty, body) => write!(f, "(fun ({} : {}) => {})", n, ty, body),
            Expr::ForallE(n, _, ty, body) => write!(f, "(forall ({} : {}), {})", n, ty, body),
            Expr::Let(n, ty, val, body) => write!(f, "(let {} : {} := {}; {})", n, ty, val, body),
            Expr::Lit(lit) => write!(f, "{}", lit),
            Expr::Proj(s, i, e) => write!(f, "(proj {} {} {})", s, i, e),
        }
    }
}
