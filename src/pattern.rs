// The pattern tree is the binder-aware shape of an expression, just before it is
// flattened into keys. It looks like a Key with its arguments attached.
//
// Wildcards carry the identity of the metavariable they came from, if any. Flattening
// turns identities into small star ids, numbered by first occurrence.

use std::collections::HashMap;
use std::fmt;

use crate::error::KeyError;
use crate::kernel::expr::{FVarId, Literal, MVarId};
use crate::kernel::name::Name;
use crate::key::{check_keys, Key};

#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum DTExpr {
    /// A wildcard. `None` is an anonymous wildcard that never repeats.
    Star(Option<MVarId>),

    Opaque,

    /// A query metavariable held fixed. Flattens to an opaque key, but two of them
    /// are equal only if they name the same metavariable.
    Fixed(MVarId),

    Const(Name, Vec<DTExpr>),
    FVar(FVarId, Vec<DTExpr>),
    BVar(u32, Vec<DTExpr>),
    Lit(Literal),
    Sort,
    Lam(Box<DTExpr>),

    /// Domain, then body.
    Forall(Box<DTExpr>, Box<DTExpr>),

    /// Structure name, field index, the projected value, and any further arguments.
    Proj(Name, u32, Box<DTExpr>, Vec<DTExpr>),
}

impl DTExpr {
    pub fn constant(name: &str, args: Vec<DTExpr>) -> DTExpr {
        DTExpr::Const(Name::new(name), args)
    }

    pub fn is_star(&self) -> bool {
        matches!(self, DTExpr::Star(_))
    }

    /// The key this node flattens to. Stars have no key until they are numbered.
    pub fn exact_key(&self) -> Option<Key> {
        Some(match self {
            DTExpr::Star(_) => return None,
            DTExpr::Opaque | DTExpr::Fixed(_) => Key::Opaque,
            DTExpr::Const(name, args) => Key::Const(name.clone(), args.len()),
            DTExpr::FVar(id, args) => Key::FVar(*id, args.len()),
            DTExpr::BVar(index, args) => Key::BVar(*index, args.len()),
            DTExpr::Lit(lit) => Key::Lit(lit.clone()),
            DTExpr::Sort => Key::Sort,
            DTExpr::Lam(_) => Key::Lam,
            DTExpr::Forall(..) => Key::Forall,
            DTExpr::Proj(name, index, _, args) => Key::Proj(name.clone(), *index, args.len() + 1),
        })
    }

    /// The children in the order they are flattened.
    pub fn children(&self) -> Vec<&DTExpr> {
        match self {
            DTExpr::Star(_)
            | DTExpr::Opaque
            | DTExpr::Fixed(_)
            | DTExpr::Lit(_)
            | DTExpr::Sort => vec![],
            DTExpr::Const(_, args) | DTExpr::FVar(_, args) | DTExpr::BVar(_, args) => {
                args.iter().collect()
            }
            DTExpr::Lam(body) => vec![body],
            DTExpr::Forall(domain, body) => vec![domain, body],
            DTExpr::Proj(_, _, value, args) => {
                let mut children = vec![value.as_ref()];
                children.extend(args.iter());
                children
            }
        }
    }

    /// The score an exact match of the whole tree earns.
    /// Every node counts one, except stars and lambdas, which count nothing.
    pub fn size(&self) -> usize {
        let own = match self {
            DTExpr::Star(_) | DTExpr::Lam(_) => 0,
            _ => 1,
        };
        own + self.children().iter().map(|c| c.size()).sum::<usize>()
    }

    /// The number of keys this tree flattens to.
    pub fn num_keys(&self) -> usize {
        1 + self.children().iter().map(|c| c.num_keys()).sum::<usize>()
    }

    /// Flattens into prefix order. Returns the keys and the number of distinct stars.
    pub fn flatten(&self) -> (Vec<Key>, usize) {
        let mut flattener = Flattener::default();
        flattener.push(self);
        (flattener.keys, flattener.next_star)
    }

    pub fn keys(&self) -> Vec<Key> {
        self.flatten().0
    }

    /// Rebuilds a tree from a flattened sequence.
    /// Star `n` comes back as the wildcard for metavariable `n`.
    pub fn from_keys(keys: &[Key]) -> Result<DTExpr, KeyError> {
        check_keys(keys)?;
        let mut pos = 0;
        DTExpr::read(keys, &mut pos)
    }

    // The sequence has already passed `check_keys`.
    fn read(keys: &[Key], pos: &mut usize) -> Result<DTExpr, KeyError> {
        let key = &keys[*pos];
        *pos += 1;
        Ok(match key {
            Key::Star(id) => {
                let id = u32::try_from(*id)
                    .map_err(|_| KeyError::StarOutOfRange { position: *pos - 1 })?;
                DTExpr::Star(Some(MVarId(id)))
            }
            Key::Opaque => DTExpr::Opaque,
            Key::Const(name, arity) => {
                DTExpr::Const(name.clone(), DTExpr::read_n(keys, pos, *arity)?)
            }
            Key::FVar(id, arity) => DTExpr::FVar(*id, DTExpr::read_n(keys, pos, *arity)?),
            Key::BVar(index, arity) => DTExpr::BVar(*index, DTExpr::read_n(keys, pos, *arity)?),
            Key::Lit(lit) => DTExpr::Lit(lit.clone()),
            Key::Sort => DTExpr::Sort,
            Key::Lam => DTExpr::Lam(Box::new(DTExpr::read(keys, pos)?)),
            Key::Forall => {
                let domain = DTExpr::read(keys, pos)?;
                let body = DTExpr::read(keys, pos)?;
                DTExpr::Forall(Box::new(domain), Box::new(body))
            }
            Key::Proj(name, index, arity) => {
                let value = DTExpr::read(keys, pos)?;
                let args = DTExpr::read_n(keys, pos, arity.saturating_sub(1))?;
                DTExpr::Proj(name.clone(), *index, Box::new(value), args)
            }
        })
    }

    fn read_n(keys: &[Key], pos: &mut usize, n: usize) -> Result<Vec<DTExpr>, KeyError> {
        (0..n).map(|_| DTExpr::read(keys, pos)).collect()
    }
}

/// Numbers stars by the first occurrence of their identity while emitting keys.
#[derive(Default)]
struct Flattener {
    keys: Vec<Key>,
    star_ids: HashMap<MVarId, usize>,
    next_star: usize,
}

impl Flattener {
    fn fresh_star(&mut self) -> usize {
        let id = self.next_star;
        self.next_star += 1;
        id
    }

    fn push(&mut self, e: &DTExpr) {
        let key = match e {
            DTExpr::Star(None) => Key::Star(self.fresh_star()),
            DTExpr::Star(Some(mvar)) => match self.star_ids.get(mvar) {
                Some(id) => Key::Star(*id),
                None => {
                    let id = self.fresh_star();
                    self.star_ids.insert(*mvar, id);
                    Key::Star(id)
                }
            },
            _ => match e.exact_key() {
                Some(key) => key,
                None => unreachable!("only stars lack an exact key"),
            },
        };
        self.keys.push(key);
        for child in e.children() {
            self.push(child);
        }
    }
}

fn write_args(f: &mut fmt::Formatter, head: &dyn fmt::Display, args: &[DTExpr]) -> fmt::Result {
    if args.is_empty() {
        return write!(f, "{}", head);
    }
    write!(f, "({}", head)?;
    for arg in args {
        write!(f, " {}", arg)?;
    }
    write!(f, ")")
}

impl fmt::Display for DTExpr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DTExpr::Star(Some(id)) => write!(f, "*{}", id.0),
            DTExpr::Star(None) => write!(f, "*"),
            DTExpr::Opaque => write!(f, "◾"),
            DTExpr::Fixed(id) => write!(f, "{}", id),
            DTExpr::Const(name, args) => write_args(f, name, args),
            DTExpr::FVar(id, args) => write_args(f, id, args),
            DTExpr::BVar(index, args) => write_args(f, &format!("#{}", index), args),
            DTExpr::Lit(lit) => write!(f, "{}", lit),
            DTExpr::Sort => write!(f, "Sort"),
            DTExpr::Lam(body) => write!(f, "(λ {})", body),
            DTExpr::Forall(domain, body) => write!(f, "(∀ {} {})", domain, body),
            DTExpr::Proj(name, index, value, args) => {
                write!(f, "({}.{} {}", name, index, value)?;
                for arg in args {
                    write!(f, " {}", arg)?;
                }
                write!(f, ")")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(name: &str, args: Vec<DTExpr>) -> DTExpr {
        DTExpr::constant(name, args)
    }

    fn star(id: u32) -> DTExpr {
        DTExpr::Star(Some(MVarId(id)))
    }

    fn nat(n: u64) -> DTExpr {
        DTExpr::Lit(Literal::Nat(n))
    }

    #[test]
    fn test_flatten_prefix_order() {
        // ∀ (P a) (λ (f #0))
        let e = DTExpr::Forall(
            Box::new(c("P", vec![c("a", vec![])])),
            Box::new(DTExpr::Lam(Box::new(DTExpr::Const(
                Name::new("f"),
                vec![DTExpr::BVar(0, vec![])],
            )))),
        );
        let (keys, stars) = e.flatten();
        assert_eq!(stars, 0);
        assert_eq!(
            keys,
            vec![
                Key::Forall,
                Key::Const(Name::new("P"), 1),
                Key::Const(Name::new("a"), 0),
                Key::Lam,
                Key::Const(Name::new("f"), 1),
                Key::BVar(0, 0),
            ]
        );
        assert_eq!(keys.len(), e.num_keys());
    }

    #[test]
    fn test_star_numbering_by_first_occurrence() {
        // f ?7 * ?3 ?7 *
        let e = c(
            "f",
            vec![star(7), DTExpr::Star(None), star(3), star(7), DTExpr::Star(None)],
        );
        let (keys, stars) = e.flatten();
        assert_eq!(stars, 4);
        assert_eq!(
            keys[1..],
            [Key::Star(0), Key::Star(1), Key::Star(2), Key::Star(0), Key::Star(3)]
        );
    }

    #[test]
    fn test_keys_round_trip() {
        let e = DTExpr::Proj(
            Name::new("Prod"),
            1,
            Box::new(c("g", vec![star(5), nat(2)])),
            vec![DTExpr::Opaque, DTExpr::Sort],
        );
        let keys = e.keys();
        let rebuilt = DTExpr::from_keys(&keys).unwrap();
        assert_eq!(rebuilt.keys(), keys);
        assert_eq!(rebuilt.num_keys(), keys.len());
        assert_eq!(rebuilt.to_string(), "(Prod.1 (g *0 2) ◾ Sort)");
    }

    #[test]
    fn test_from_keys_rejects_malformed() {
        let keys = vec![Key::Const(Name::new("f"), 2), Key::Sort];
        assert_eq!(
            DTExpr::from_keys(&keys),
            Err(KeyError::Truncated { missing: 1 })
        );
    }

    #[test]
    fn test_from_keys_rejects_huge_star_ids() {
        let keys = vec![Key::Const(Name::new("f"), 2), Key::Star(0), Key::Star(usize::MAX)];
        if usize::BITS > u32::BITS {
            assert_eq!(
                DTExpr::from_keys(&keys),
                Err(KeyError::StarOutOfRange { position: 2 })
            );
        }
        let largest = vec![Key::Star(u32::MAX as usize)];
        assert_eq!(DTExpr::from_keys(&largest), Ok(star(u32::MAX)));
    }

    #[test]
    fn test_fixed_unknowns_keep_identity() {
        let a = DTExpr::Fixed(MVarId(1));
        let b = DTExpr::Fixed(MVarId(2));
        assert_ne!(a, b);
        assert_ne!(a, DTExpr::Opaque);
        assert_eq!(a.exact_key(), Some(Key::Opaque));
        assert_eq!(a.size(), 1);
        let e = c("f", vec![a.clone(), b]);
        assert_eq!(e.keys(), c("f", vec![DTExpr::Opaque, DTExpr::Opaque]).keys());
    }

    #[test]
    fn test_size_ignores_stars_and_lambdas() {
        // f (λ (g #0)) *
        let e = c(
            "f",
            vec![
                DTExpr::Lam(Box::new(c("g", vec![DTExpr::BVar(0, vec![])]))),
                DTExpr::Star(None),
            ],
        );
        assert_eq!(e.size(), 3);
        assert_eq!(nat(4).size(), 1);
        assert_eq!(DTExpr::Opaque.size(), 1);
    }
}
