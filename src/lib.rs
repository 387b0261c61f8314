pub mod config;
pub mod encoder;
pub mod error;
pub mod index;
pub mod insert;
pub mod kernel;
pub mod key;
pub mod matcher;
pub mod pattern;
pub mod rewrite;
pub mod trie;

#[cfg(test)]
mod tests;
