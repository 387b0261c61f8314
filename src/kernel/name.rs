use std::fmt;
use std::sync::Arc;

/// A hierarchical constant name like `HAdd.hAdd` or `Nat.Prime`.
/// Components are separated by dots. Cloning is cheap.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Name(Arc<str>);

impl Name {
    pub fn new(s: &str) -> Name {
        Name(Arc::from(s))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Appends a component, as in `Prod` + `mk` = `Prod.mk`.
    pub fn append(&self, component: &str) -> Name {
        Name::new(&format!("{}.{}", self.0, component))
    }

    pub fn components(&self) -> impl Iterator<Item = &str> {
        self.0.split('.')
    }

    /// The last component, or the whole name if there is only one.
    pub fn last(&self) -> &str {
        match self.0.rfind('.') {
            Some(i) => &self.0[i + 1..],
            None => &self.0,
        }
    }

    /// The name with its last component dropped.
    pub fn prefix(&self) -> Option<Name> {
        self.0.rfind('.').map(|i| Name::new(&self.0[..i]))
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Name {
    fn from(s: &str) -> Name {
        Name::new(s)
    }
}
