//! # Disk Caches
//!
//! * [`disk`] - read-through download cache.
//! * [`archive`] - `.tar.gz` extraction into the cache.

pub mod archive;
pub mod disk;
