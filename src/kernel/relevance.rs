use std::collections::{HashMap, HashSet};

use super::expr::{BinderInfo, Expr};
use super::name::Name;

/// Decides which arguments of an application are worth indexing.
/// An ignored argument is indexed as an anonymous wildcard.
pub trait RelevanceOracle {
    /// `head` is the function of the application, `index` the position of `arg` among its arguments.
    fn ignore_arg(&self, head: &Expr, index: usize, arg: &Expr) -> bool;
}

/// Indexes every argument.
#[derive(Clone, Copy, Debug, Default)]
pub struct AllRelevant;

impl RelevanceOracle for AllRelevant {
    fn ignore_arg(&self, _head: &Expr, _index: usize, _arg: &Expr) -> bool {
        false
    }
}

/// How a function declares one of its parameters.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ParamInfo {
    pub binder_info: BinderInfo,

    /// Type class out-params are determined by the other arguments.
    pub is_out_param: bool,
}

impl ParamInfo {
    pub fn new(binder_info: BinderInfo) -> ParamInfo {
        ParamInfo {
            binder_info,
            is_out_param: false,
        }
    }
}

/// Relevance from declared parameter kinds.
///
/// Instance arguments and out-params are ignored. Implicit arguments are ignored unless
/// they are types. Explicit arguments are ignored only when they are proofs.
/// Arguments with no declared parameter are always kept.
#[derive(Clone, Debug, Default)]
pub struct ParamTable {
    params: HashMap<Name, Vec<ParamInfo>>,

    // Constants whose applications are types, like `List` or `Nat`.
    types: HashSet<Name>,

    // Constants whose applications are proofs, like theorem names.
    proofs: HashSet<Name>,
}

impl ParamTable {
    pub fn new() -> ParamTable {
        ParamTable::default()
    }

    pub fn params(&mut self, name: &str, params: Vec<ParamInfo>) -> &mut Self {
        self.params.insert(Name::new(name), params);
        self
    }

    /// Reads the parameter kinds off the leading binders of a declared type.
    /// A domain of the form `outParam T` marks an out-param.
    pub fn declare(&mut self, name: &str, declared_type: &Expr) -> &mut Self {
        let mut params = vec![];
        let mut t = declared_type;
        while let Expr::ForallE(_, info, domain, body) = t {
            let is_out_param = matches!(
                domain.get_app_fn(),
                Expr::Const(n) if n.as_str() == "outParam"
            );
            params.push(ParamInfo {
                binder_info: *info,
                is_out_param,
            });
            t = body;
        }
        self.params.insert(Name::new(name), params);
        self
    }

    pub fn type_former(&mut self, name: &str) -> &mut Self {
        self.types.insert(Name::new(name));
        self
    }

    pub fn proof(&mut self, name: &str) -> &mut Self {
        self.proofs.insert(Name::new(name));
        self
    }

    pub fn is_type(&self, e: &Expr) -> bool {
        if e.is_sort_like() || matches!(e, Expr::ForallE(..)) {
            return true;
        }
        matches!(e.get_app_fn(), Expr::Const(name) if self.types.contains(name))
    }

    pub fn is_proof(&self, e: &Expr) -> bool {
        matches!(e.get_app_fn(), Expr::Const(name) if self.proofs.contains(name))
    }
}

impl RelevanceOracle for ParamTable {
    fn ignore_arg(&self, head: &Expr, index: usize, arg: &Expr) -> bool {
        let info = match head {
            Expr::Const(name) => self.params.get(name).and_then(|p| p.get(index)),
            _ => None,
        };
        match info {
            Some(info) if info.is_out_param => true,
            Some(info) => match info.binder_info {
                BinderInfo::InstImplicit => true,
                BinderInfo::Implicit | BinderInfo::StrictImplicit => !self.is_type(arg),
                BinderInfo::Default => self.is_proof(arg),
            },
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> Expr {
        Expr::parse(s).unwrap()
    }

    #[test]
    fn test_declare_reads_binders() {
        let mut table = ParamTable::new();
        table.declare("HAdd.hAdd", &parse("forall {α β : Type} {γ : outParam Type} [HAdd α β γ], α -> β -> γ"));
        let params = &table.params[&Name::new("HAdd.hAdd")];
        assert_eq!(params.len(), 6);
        assert_eq!(params[0].binder_info, BinderInfo::Implicit);
        assert!(!params[0].is_out_param);
        assert!(params[2].is_out_param);
        assert_eq!(params[3].binder_info, BinderInfo::InstImplicit);
        assert_eq!(params[4].binder_info, BinderInfo::Default);
    }

    #[test]
    fn test_relevance_rules() {
        let mut table = ParamTable::new();
        table
            .declare("HAdd.hAdd", &parse("forall {α : Type} [HAdd α α α], α -> α -> α"))
            .declare("List.length", &parse("forall {α : Type}, List α -> Nat"))
            .type_former("Nat")
            .proof("Nat.le_refl");
        let head = Expr::constant("HAdd.hAdd");
        // Implicit type argument is kept.
        assert!(!table.ignore_arg(&head, 0, &parse("Nat")));
        // Implicit non-type argument is dropped.
        assert!(table.ignore_arg(&head, 0, &parse("n")));
        // Instances are always dropped.
        assert!(table.ignore_arg(&head, 1, &parse("instHAdd")));
        // Explicit arguments are kept unless they are proofs.
        assert!(!table.ignore_arg(&head, 2, &parse("x")));
        assert!(table.ignore_arg(&head, 2, &parse("Nat.le_refl x")));
        // Unknown heads keep every argument, proofs included.
        let other = Expr::constant("f");
        assert!(!table.ignore_arg(&other, 7, &parse("x")));
        assert!(!table.ignore_arg(&other, 0, &parse("Nat.le_refl 3")));
        // So do arguments past the declared ones.
        assert!(!table.ignore_arg(&head, 4, &parse("Nat.le_refl 3")));
    }

    #[test]
    fn test_explicit_params() {
        let mut table = ParamTable::new();
        table
            .params(
                "g",
                vec![
                    ParamInfo::new(BinderInfo::InstImplicit),
                    ParamInfo::new(BinderInfo::Default),
                ],
            )
            .proof("Nat.le_refl");
        let head = Expr::constant("g");
        assert!(!ParamInfo::new(BinderInfo::Default).is_out_param);
        assert!(table.ignore_arg(&head, 0, &parse("instG")));
        assert!(!table.ignore_arg(&head, 1, &parse("x")));
        assert!(table.ignore_arg(&head, 1, &parse("Nat.le_refl x")));
        assert!(!table.ignore_arg(&head, 2, &parse("Nat.le_refl x")));
    }
}
