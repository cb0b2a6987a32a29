//! Look-aside cache over a pluggable key/value store.
//!
//! `store` defines the client contract, `memory` the in-process backend,
//! `redis` the distributed one. Key names come from `keys`; the service
//! layer never builds them by hand.

pub mod keys;
mod lock;
pub mod memory;
pub mod redis;
pub mod store;

pub use memory::MemoryStore;
pub use redis::RedisStore;
pub use store::{CacheError, CacheStore, get_json, set_json};
