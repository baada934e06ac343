//! Library entrypoint for `stata_engine`.
//!
//! The crate exposes the two-pass source lexer, the chunk layer that
//! decides completeness and assembles submissions, and the session layer
//! that drives a statistics process and reconciles its output.

pub mod cache;
pub mod chunk;
pub mod lexer;
pub mod session;
