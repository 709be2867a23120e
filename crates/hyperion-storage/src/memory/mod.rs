//! In-memory stores

mod backend;
mod feed;
mod grid_index;

pub use backend::{MemoryConfig, MemoryStore};
pub use feed::{MemoryFeedStore, MergeSummary};
pub use grid_index::{GridConfig, GridIndex};
