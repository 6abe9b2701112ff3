//! Dingilink Loader Library
//!
//! Version: 0.3.0
//! Purpose: Batched entity loading scoped to a single operation
//! License: Apache-2.0/MIT
//!
//! Many concurrent `load(id)` calls made while resolving one request are
//! collapsed into one bulk fetch per entity kind.

pub mod batch;
pub mod cache;
pub mod dataloader;
pub mod loaders;

pub use batch::{BatchCollector, BatchFn};
pub use cache::{CacheStore, LoadResult, ResultSlot};
pub use dataloader::Dataloader;
pub use loaders::{GroupLoader, GroupMembersLoader, MessageLoader, UserLoader};
