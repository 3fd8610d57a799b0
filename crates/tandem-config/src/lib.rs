pub mod loader;
pub mod schema;

pub use loader::{find_config_path, load_config, resolve_path, save_config, CONFIG_ENV};
pub use schema::{BundlesConfig, Config, MemoryConfig, StackConfig, WriteAccess};
