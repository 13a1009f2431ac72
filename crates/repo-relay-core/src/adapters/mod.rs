//! # Infrastructure Adapters
//!
//! Subscription store implementations.

pub mod file_subscriptions;
pub mod memory_subscriptions;

pub use file_subscriptions::FileSubscriptionStore;
pub use memory_subscriptions::InMemorySubscriptionStore;
