// A small, fixed table of rewrites applied to an expression in weak head normal form,
// just before it becomes a pattern tree node. They normalize a few definitional
// equalities that reduction alone does not expose, so that `fun x => x` and `id`
// land at the same place in the index.

use crate::kernel::expr::{Expr, Literal};
use crate::kernel::name::Name;

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Rewrite {
    /// `fun x => x` becomes the given constant.
    Identity(Name),

    /// `C _ n _` becomes the literal `n` when `n` is a natural literal.
    /// The constant takes three arguments, and the numeral is the second.
    Numeral(Name),

    /// A constant that is a literal in disguise, like `Nat.zero`.
    Literal(Name, Literal),

    /// `fun x => op (f x) (g x)` becomes `op f g`, for a binary operator `op`
    /// whose operands are its last two arguments.
    Pointwise(Name),
}

impl Rewrite {
    fn apply(&self, e: &Expr) -> Option<Expr> {
        match self {
            Rewrite::Identity(name) => match e {
                Expr::Lam(_, _, _, body) if **body == Expr::BVar(0) => {
                    Some(Expr::Const(name.clone()))
                }
                _ => None,
            },
            Rewrite::Numeral(name) => {
                if !matches!(e.get_app_fn(), Expr::Const(n) if n == name) {
                    return None;
                }
                match e.get_app_args().as_slice() {
                    [_, Expr::Lit(lit @ Literal::Nat(_)), _] => Some(Expr::Lit(lit.clone())),
                    _ => None,
                }
            }
            Rewrite::Literal(name, lit) => match e {
                Expr::Const(n) if n == name => Some(Expr::Lit(lit.clone())),
                _ => None,
            },
            Rewrite::Pointwise(name) => {
                let Expr::Lam(_, _, _, body) = e else {
                    return None;
                };
                pointwise(name, body)
            }
        }
    }
}

// Matches `op a₁ … (f #0) (g #0)` where #0 occurs nowhere else, and drops the binder.
fn pointwise(op: &Name, body: &Expr) -> Option<Expr> {
    if !matches!(body.get_app_fn(), Expr::Const(n) if n == op) {
        return None;
    }
    let args = body.get_app_args();
    if args.len() < 2 {
        return None;
    }
    let (prefix, operands) = args.split_at(args.len() - 2);
    let mut new_args = vec![];
    for arg in prefix {
        if arg.has_loose_bvar(0) {
            return None;
        }
        new_args.push(arg.lower_loose_bvars(1, 1));
    }
    for operand in operands {
        match operand {
            Expr::App(f, x) if **x == Expr::BVar(0) && !f.has_loose_bvar(0) => {
                new_args.push(f.lower_loose_bvars(1, 1));
            }
            _ => return None,
        }
    }
    Some(Expr::mk_app(Expr::Const(op.clone()), new_args))
}

/// The rewrites the encoder tries, in order. The first one that applies wins.
#[derive(Clone, Debug)]
pub struct RewriteTable {
    rules: Vec<Rewrite>,
}

impl Default for RewriteTable {
    fn default() -> Self {
        RewriteTable {
            rules: vec![
                Rewrite::Identity(Name::new("id")),
                Rewrite::Numeral(Name::new("OfNat.ofNat")),
                Rewrite::Literal(Name::new("Nat.zero"), Literal::Nat(0)),
                Rewrite::Pointwise(Name::new("HAdd.hAdd")),
            ],
        }
    }
}

impl RewriteTable {
    pub fn empty() -> RewriteTable {
        RewriteTable { rules: vec![] }
    }

    pub fn push(&mut self, rule: Rewrite) -> &mut Self {
        self.rules.push(rule);
        self
    }

    pub fn rules(&self) -> &[Rewrite] {
        &self.rules
    }

    pub fn apply(&self, e: &Expr) -> Option<Expr> {
        self.rules.iter().find_map(|rule| rule.apply(e))
    }
}
