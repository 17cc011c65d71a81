//! # Collection of Basic Data Structures
//!
//! - `storage`: Arena-based storage to give IR entities a handle identity.

pub mod storage;
