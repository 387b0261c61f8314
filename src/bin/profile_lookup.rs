// A representative run of insertion and lookup over a synthetic corpus, to use for profiling.
//
// To profile using samply:
//
//   cargo build --bin=profile_lookup --profile=fastdev
//   samply record target/fastdev/profile_lookup
//
// Use RUST_LOG to see what the index is doing, e.g. RUST_LOG=lemma_index=debug.

use std::path::Path;
use std::time::Instant;

use clap::Parser;
use lemma_index::config::{IndexConfig, LookupOptions};
use lemma_index::error::IndexError;
use lemma_index::index::LemmaIndex;
use lemma_index::kernel::expr::{BinderInfo, Expr, MVarId};
use lemma_index::kernel::reduce::StructuralReducer;
use lemma_index::kernel::relevance::AllRelevant;
use mimalloc::MiMalloc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[derive(Parser)]
#[clap(
    name = "profile_lookup",
    about = "Builds an index of random patterns and times lookups against it"
)]
struct Args {
    /// How many patterns to insert
    #[clap(long, default_value_t = 20000)]
    patterns: usize,

    /// How many random queries to run
    #[clap(long, default_value_t = 2000)]
    queries: usize,

    /// Maximum nesting depth of the generated expressions
    #[clap(long, default_value_t = 4)]
    depth: usize,

    #[clap(long, default_value_t = 0)]
    seed: u64,

    /// A JSON index config file
    #[clap(long, value_name = "FILE")]
    config: Option<String>,

    /// Treat query metavariables as fixed unknowns
    #[clap(long)]
    no_unify: bool,

    /// Run one query given in expression syntax, and print its results
    #[clap(long, value_name = "EXPR")]
    query: Option<String>,

    /// Check the trie invariants after building
    #[clap(long)]
    check: bool,
}

const SYMBOLS: [(&str, usize); 8] = [
    ("HAdd.hAdd", 2),
    ("HMul.hMul", 2),
    ("Nat.succ", 1),
    ("List.map", 2),
    ("List.length", 1),
    ("Eq", 2),
    ("f", 1),
    ("g", 3),
];

// A closed expression over SYMBOLS, with a few metavariables and the occasional lambda.
fn random_expr(rng: &mut StdRng, depth: usize) -> Expr {
    if depth == 0 || rng.gen_bool(0.25) {
        return match rng.gen_range(0..4) {
            0 => Expr::MVar(MVarId(rng.gen_range(0..3))),
            1 => Expr::nat(rng.gen_range(0..10)),
            2 => Expr::constant("a"),
            _ => Expr::constant("b"),
        };
    }
    if rng.gen_bool(0.1) {
        let head = random_expr(rng, depth - 1);
        let body = Expr::app(head, Expr::BVar(0));
        return Expr::lam("x", BinderInfo::Default, Expr::constant("Nat"), body);
    }
    let (name, arity) = SYMBOLS[rng.gen_range(0..SYMBOLS.len())];
    let args: Vec<Expr> = (0..arity).map(|_| random_expr(rng, depth - 1)).collect();
    Expr::mk_app(Expr::constant(name), args)
}

fn main() -> Result<(), IndexError> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_ansi(false).without_time())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => IndexConfig::from_file(Path::new(path))?,
        None => IndexConfig::default(),
    };
    let options = LookupOptions {
        unify: config.lookup.unify && !args.no_unify,
        ..config.lookup.clone()
    };
    let reducer = StructuralReducer::new();
    let mut rng = StdRng::seed_from_u64(args.seed);

    let start = Instant::now();
    let mut index = LemmaIndex::new(config);
    for i in 0..args.patterns {
        let e = random_expr(&mut rng, args.depth);
        index.insert_mut(&e, i, &reducer, &AllRelevant);
    }
    let elapsed = start.elapsed().as_secs_f32();
    println!(
        "inserted {} patterns as {} key sequences in {:.3} seconds",
        args.patterns,
        index.len(),
        elapsed
    );
    if args.check {
        index.check_invariants();
        println!("trie invariants hold");
    }

    if let Some(text) = &args.query {
        let e = Expr::parse(text)?;
        for group in index.lookup(&e, &options, &reducer, &AllRelevant) {
            println!("{:>4}  {:?}", group.score, group.values);
        }
        return Ok(());
    }

    let start = Instant::now();
    let mut total_results = 0;
    for _ in 0..args.queries {
        let e = random_expr(&mut rng, args.depth);
        total_results += index.lookup(&e, &options, &reducer, &AllRelevant).len();
    }
    let elapsed = start.elapsed().as_secs_f32();
    println!(
        "{} queries found {} groups in {:.3} seconds",
        args.queries, total_results, elapsed
    );
    println!("{:.1} queries per second", args.queries as f32 / elapsed);
    Ok(())
}
