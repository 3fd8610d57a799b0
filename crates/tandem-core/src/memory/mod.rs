pub mod entry;
pub mod store;

pub use entry::{
    MemoryEntry, MemoryQuery, MemorySnapshot, MemoryStats, MemoryUpdate, NewMemoryEntry,
};
pub use store::SharedMemoryStore;
