// Central store: typed records plus the REST gateway and its in-memory twin.

pub mod gateway;
pub mod memory;
pub mod types;

pub use gateway::{BaseCentralStore, RestStore, StoreError};
pub use memory::MemoryStore;
pub use types::*;
