pub mod bundle;
pub mod error;
pub mod memory;
pub mod stack;

// Re-export key types
pub use bundle::{AgentSpec, AutomationSpec, Bundle, BundleLoader, BundleType, WidgetSpec};
pub use error::{BundleError, MemoryError, StackError, ValidationError};
pub use memory::{
    MemoryEntry, MemoryQuery, MemorySnapshot, MemoryStats, MemoryUpdate, NewMemoryEntry,
    SharedMemoryStore,
};
pub use stack::{
    AutomationResolver, PassthroughResolver, ScopedAgent, ScopedAutomation, StackManager,
    StackSummary,
};
pub use tandem_config::WriteAccess;
