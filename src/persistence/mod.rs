//! The `persistence` module mirrors topic history to disk.
//!
//! It is optional: a broker without it keeps history in memory only. When
//! configured, every broadcast record is written through to an embedded
//! `sled` database and the whole history is reloaded on startup. Delivery
//! itself is never persisted.

pub mod sled_store;

pub use sled_store::Persistence;

#[cfg(test)]
mod tests;
