//! The `subscriber` module defines the broker-side representation of a named
//! endpoint.
//!
//! It provides the `Subscriber` handle returned by `Broker::attach`, which
//! tracks the subscriber's topic memberships and owns the bounded channel the
//! broker delivers into, and the `Inbox` a consumer drains.

pub mod endpoint;
pub mod inbox;
pub mod waiters;

pub use endpoint::{Subscriber, SubscriberId};
pub use inbox::{Delivery, DropReason, Inbox};
pub use waiters::Waiters;

#[cfg(test)]
mod tests;
