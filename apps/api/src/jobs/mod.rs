//! Job post CRUD and saved-job bookmarks.

pub mod posts;
pub mod saved;
