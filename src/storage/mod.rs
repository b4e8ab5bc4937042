//! Storage abstraction layer for Tessera.
//!
//! Indexes talk to a [`Storage`] backend holding flat, named files. The
//! file system backend is what production indexes use; the memory backend
//! serves tests and throwaway indexes.

pub mod file;
pub mod memory;
pub mod structured;
pub mod traits;

// Re-export commonly used types
pub use file::*;
pub use memory::*;
pub use structured::*;
pub use traits::*;
