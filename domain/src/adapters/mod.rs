//! In-process adapters that live inside the domain crate for convenience.
//!
//! Used by unit tests and by the server's `memory` storage mode. The SQLite
//! adapter lives in its own crate.

pub mod memory_repo;
