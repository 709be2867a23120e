//! hyperion-storage: Store implementations for hyperion

#[cfg(feature = "memory")]
pub mod memory;

#[cfg(feature = "memory")]
mod snapshot;

#[cfg(feature = "memory")]
pub use memory::{
    GridConfig, GridIndex, MemoryConfig, MemoryFeedStore, MemoryStore, MergeSummary,
};
