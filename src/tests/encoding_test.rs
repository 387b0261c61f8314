use crate::config::{EncoderConfig, IndexConfig, LookupOptions};
use crate::error::KeyError;
use crate::key::{check_keys, format_keys, subtree_len, Key};
use crate::kernel::name::Name;
use crate::pattern::DTExpr;
use crate::tests::common::Fixture;

const LEMMAS: &[&str] = &[
    "Eq (HAdd.hAdd ?a ?b) (HAdd.hAdd ?b ?a)",
    "Eq (HMul.hMul ?a 1) ?a",
    "forall (n : Nat), LE.le n (Nat.succ n)",
    "List.length (List.map ?f ?l)",
    "List.map (fun x => ?f (?g x)) ?l",
    "List.map (fun x => x) ?l",
    "Continuous (fun x => HAdd.hAdd (?f x) (?g x))",
    "Continuous (fun x y => ?f x y)",
    "proj Prod 0 (Prod.mk ?a ?b)",
    "Eq (OfNat.ofNat Nat 0 inst) Nat.zero",
    "Iff (Eq ?x ?y) (Eq ?y ?x)",
    "Set.image ?f (Set.image ?g ?s)",
    "fun (x : Nat) => Eq x x",
    "Prop -> Prop",
    "Eq \"lemma\" ?s",
];

#[test]
fn test_stored_keys_are_complete_trees() {
    let mut f = Fixture::new();
    for text in LEMMAS {
        for pattern in f.encode(text) {
            let (keys, stars) = pattern.flatten();
            assert_eq!(check_keys(&keys), Ok(()), "{}", format_keys(&keys));
            assert_eq!(subtree_len(&keys, 0), Some(keys.len()));
            assert_eq!(keys.len(), pattern.num_keys());
            assert!(keys.iter().filter(|k| k.is_star()).count() >= stars);

            let rebuilt = DTExpr::from_keys(&keys).unwrap();
            assert_eq!(rebuilt.keys(), keys);
            assert_eq!(rebuilt.size(), pattern.size());
        }
    }
}

#[test]
fn test_trie_invariants_hold_after_every_insert() {
    let mut f = Fixture::new();
    for text in LEMMAS {
        f.insert(text, *text);
        f.index.check_invariants();
    }
    for (keys, _) in f.index.entries() {
        assert_eq!(check_keys(&keys), Ok(()));
    }
    let mut sorted = f.index.entries();
    sorted.sort_by(|a, b| a.0.cmp(&b.0));
    assert_eq!(sorted, f.index.entries());
}

#[test]
fn test_every_lemma_finds_itself() {
    let mut f = Fixture::new();
    for text in LEMMAS {
        f.insert(text, *text);
    }
    for text in LEMMAS {
        assert!(f.found(text).contains(text), "{} did not find itself", text);
    }
}

#[test]
fn test_eta_alternates_per_lemma() {
    let mut f = Fixture::new();
    let counts: Vec<usize> = LEMMAS.iter().map(|text| f.encode(text).len()).collect();
    // `fun x => ?f (?g x)` has nothing to contract.
    assert_eq!(counts[4], 1);
    // `fun x => x` is rewritten before it is seen as a lambda.
    assert_eq!(counts[5], 1);
    // Pointwise addition is rewritten, then contracted no further.
    let pointwise = f.encode(LEMMAS[6]);
    assert_eq!(pointwise.len(), 1);
    assert_eq!(
        format_keys(&pointwise[0].keys()),
        "Continuous/1 HAdd.hAdd/2 *0 *1"
    );
    // Two nested binders give the direct form, the inner contraction, and the full one.
    assert_eq!(counts[7], 3);
}

#[test]
fn test_alternates_can_be_disabled() {
    let config = IndexConfig {
        encoder: EncoderConfig {
            eta_alternates: false,
            ..EncoderConfig::default()
        },
        ..IndexConfig::default()
    };
    let mut f = Fixture::with_config(config);
    for text in LEMMAS {
        assert_eq!(f.encode(text).len(), 1, "{}", text);
    }
    f.insert("Continuous (fun x => ?f x)", "cont");
    assert_eq!(f.index.len(), 1);
    assert!(f.found("Continuous Real.sin").is_empty());
}

#[test]
fn test_query_encoding_is_direct() {
    let mut f = Fixture::new();
    let query = f.query("Continuous (fun x y => g x y)", &LookupOptions::default());
    assert_eq!(query.to_string(), "(Continuous (λ (λ (g #1 #0))))");
}

#[test]
fn test_raw_keys_are_checked() {
    let f = Fixture::new();
    let truncated = vec![Key::Forall, Key::Sort];
    assert_eq!(
        f.index.insert_keys(&truncated, "bad").err(),
        Some(KeyError::Truncated { missing: 1 })
    );
    assert_eq!(
        f.index.insert_keys(&[], "bad").err(),
        Some(KeyError::Empty)
    );
    let valueless = vec![Key::Proj(Name::new("Prod"), 0, 0)];
    assert_eq!(
        f.index.insert_keys(&valueless, "bad").err(),
        Some(KeyError::BadArity { position: 0 })
    );
    assert!(DTExpr::from_keys(&valueless).is_err());
    let index = f
        .index
        .insert_keys(&[Key::Forall, Key::Sort, Key::Star(0)], "good")
        .unwrap();
    index.check_invariants();
    assert_eq!(index.values(), vec![&"good"]);
}
