//! Job applications: resume submission with AI review, and the CRUD around it.

pub mod compensation;
pub mod handlers;
pub mod orchestrator;

pub use orchestrator::{ApplicationReviewer, SubmittedApplication};
