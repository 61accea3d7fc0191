//! # Repository Pattern Implementation
//!
//! Repository traits and their SQLite implementations.
//!
//! - `PhotoRepository` - capture-side catalogue operations
//! - `SqlitePhotoRepository` - SQLite backing for both `PhotoRepository` and
//!   [`PhotoSource`](crate::source::PhotoSource)

pub mod photo;

pub use photo::{PhotoRepository, SqlitePhotoRepository};
