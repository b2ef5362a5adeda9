//! Shared utilities used across `huddle`: the error taxonomy returned by the
//! broker and the tracing setup used by the binary and tests.

pub mod error;
pub mod logging;

#[cfg(test)]
mod tests;
