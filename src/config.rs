use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::kernel::reduce::ReductionPolicy;

/// How expressions become pattern trees.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderConfig {
    // Handed to the reducer for every subexpression.
    pub policy: ReductionPolicy,

    // Whether stored lambdas are also indexed in eta-contracted form.
    pub eta_alternates: bool,

    // The most encodings one stored expression may produce.
    pub max_encodings: usize,

    // If false, the domain of every forall is indexed as a wildcard.
    pub index_forall_domains: bool,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            policy: ReductionPolicy::default(),
            eta_alternates: true,
            max_encodings: 8,
            index_forall_domains: true,
        }
    }
}

/// Options for a single lookup.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LookupOptions {
    // Whether query metavariables are wildcards. If false, they only match stored wildcards.
    pub unify: bool,

    // Whether a query that is just a wildcard, or a stored pattern that is just a wildcard,
    // may match at the root.
    pub allow_root_star: bool,

    // Keep only this many of the best results.
    pub max_results: Option<usize>,

    // Drop results scoring below this.
    pub min_score: usize,
}

impl Default for LookupOptions {
    fn default() -> Self {
        Self {
            unify: true,
            allow_root_star: false,
            max_results: None,
            min_score: 0,
        }
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    pub encoder: EncoderConfig,
    pub lookup: LookupOptions,
}

impl IndexConfig {
    pub fn from_json(text: &str) -> Result<IndexConfig, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_file(path: &Path) -> Result<IndexConfig, ConfigError> {
        let text = fs::read_to_string(path)?;
        IndexConfig::from_json(&text)
    }
}
