pub mod loader;
pub mod schema;

pub use loader::{discover, load_file, load_from_path, load_from_str, ConfigError, LoadedConfig, CONFIG_FILE};
pub use schema::{
    ActorConfig, CacheConfig, EngineConfig, MatchingConfig, ValidationError, ValidationIssue,
    WorkspaceConfig,
};
