// The host side of the index: the expression language patterns are built from,
// and the reduction and relevance services the encoder calls back into.
pub mod expr;
pub mod name;
pub mod parse;
pub mod reduce;
pub mod relevance;
