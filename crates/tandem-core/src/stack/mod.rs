pub mod manager;
pub mod resolver;

pub use manager::{ScopedAgent, ScopedAutomation, StackManager, StackSummary};
pub use resolver::{AutomationResolver, PassthroughResolver};
