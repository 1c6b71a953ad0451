//! Messaging between companies and applicants, relayed through the review client.

pub mod handlers;
pub mod relay;
pub mod transcript;

pub use relay::{Exchange, MessageRelay};
