// # State Store Implementations
//
// - `MemoryStateStore`: process-lifetime state, for tests and dry runs
// - `FileStateStore`: versioned JSON file with atomic writes and backup recovery

pub mod file;
pub mod memory;

pub use file::{FileStateStore, FileStateStoreFactory};
pub use memory::{MemoryStateStore, MemoryStateStoreFactory};
