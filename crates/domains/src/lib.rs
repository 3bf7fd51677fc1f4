//! The central domain types and port definitions for WorldFeed.

pub mod bucket;
pub mod error;
pub mod models;
pub mod traits;

// Re-exporting for easier access in other crates
pub use bucket::*;
pub use error::*;
pub use models::*;
pub use traits::*;
