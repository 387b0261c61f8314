// Keys are the alphabet of the index. A pattern is stored as a sequence of keys in
// prefix order, and each key's arity says how many complete subtrees follow it.
//
// Keys are totally ordered, and the derived order puts every Star first. The matcher
// depends on this: the wildcard children of a node are always a prefix of its children.

use std::fmt;

use crate::error::KeyError;
use crate::kernel::expr::{FVarId, Literal};
use crate::kernel::name::Name;

#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Key {
    /// Matches any subtree. Within one stored sequence, stars with the same id are the
    /// same variable and must match equal subtrees.
    Star(usize),

    /// Something with structure the index doesn't look at.
    /// Matches only another opaque key, or a wildcard.
    Opaque,

    /// A constant applied to the given number of arguments.
    Const(Name, usize),

    /// A free variable applied to the given number of arguments.
    FVar(FVarId, usize),

    /// A de Bruijn index applied to the given number of arguments.
    BVar(u32, usize),

    Lit(Literal),

    Sort,

    /// Followed by the body only. The binder's domain is not indexed.
    Lam,

    /// Followed by the domain and then the body.
    Forall,

    /// Structure name, field index, and arity.
    /// The arity counts the projected value itself plus any arguments applied to the projection.
    Proj(Name, u32, usize),
}

impl Key {
    /// How many complete subtrees follow this key in a flattened sequence.
    pub fn arity(&self) -> usize {
        match self {
            Key::Star(_) | Key::Opaque | Key::Lit(_) | Key::Sort => 0,
            Key::Const(_, arity) | Key::FVar(_, arity) | Key::BVar(_, arity) => *arity,
            Key::Lam => 1,
            Key::Forall => 2,
            Key::Proj(_, _, arity) => *arity,
        }
    }

    pub fn is_star(&self) -> bool {
        matches!(self, Key::Star(_))
    }

    pub fn star_id(&self) -> Option<usize> {
        match self {
            Key::Star(id) => Some(*id),
            _ => None,
        }
    }

    /// The smallest key that is not a star. Every star sorts below it.
    pub fn first_non_star() -> Key {
        Key::Opaque
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Key::Star(id) => write!(f, "*{}", id),
            Key::Opaque => write!(f, "◾"),
            Key::Const(name, arity) => write!(f, "{}/{}", name, arity),
            Key::FVar(id, arity) => write!(f, "{}/{}", id, arity),
            Key::BVar(index, arity) => write!(f, "#{}/{}", index, arity),
            Key::Lit(lit) => write!(f, "{}", lit),
            Key::Sort => write!(f, "Sort"),
            Key::Lam => write!(f, "λ"),
            Key::Forall => write!(f, "∀"),
            Key::Proj(name, index, arity) => write!(f, "{}.{}/{}", name, index, arity),
        }
    }
}

/// Debug helper that renders a key sequence on one line.
pub fn format_keys(keys: &[Key]) -> String {
    keys.iter()
        .map(|k| k.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

/// The number of keys taken by the complete subtree that starts at `start`.
/// Returns None if the sequence ends before the subtree does.
pub fn subtree_len(keys: &[Key], start: usize) -> Option<usize> {
    let mut pos = start;
    let mut pending = 1;
    while pending > 0 {
        let key = keys.get(pos)?;
        pending = pending - 1 + key.arity();
        pos += 1;
    }
    Some(pos - start)
}

/// Checks that the sequence is exactly one complete tree in prefix order.
pub fn check_keys(keys: &[Key]) -> Result<(), KeyError> {
    if keys.is_empty() {
        return Err(KeyError::Empty);
    }
    let mut pending = 1;
    for (pos, key) in keys.iter().enumerate() {
        if pending == 0 {
            return Err(KeyError::Trailing { position: pos });
        }
        if let Key::Proj(_, _, 0) = key {
            return Err(KeyError::BadArity { position: pos });
        }
        pending = pending - 1 + key.arity();
    }
    if pending > 0 {
        return Err(KeyError::Truncated { missing: pending });
    }
    Ok(())
}
