pub mod descriptor;
pub mod loader;
pub mod types;

pub use descriptor::{parse_descriptor, validate_bundle};
pub use loader::BundleLoader;
pub use types::{AgentSpec, AutomationSpec, Bundle, BundleType, WidgetSpec};
