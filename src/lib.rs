// Public modules
pub mod aggregate;
pub mod collector;
pub mod config;
pub mod discord;
pub mod error;
pub mod format;
pub mod posthog;
pub mod report;
pub mod trend;
pub mod types;

// Re-export commonly used items
pub use aggregate::aggregate;
pub use collector::{MetricsCollector, ProjectSnapshots, WindowPlan, MAX_CONCURRENT_FETCHES};
pub use config::{
    load_config, load_config_with_env, EnvironmentProvider, MockEnvironment, SystemEnvironment,
};
pub use discord::{split_message, Delivery, DiscordClient};
pub use error::DigestError;
pub use format::format_digest;
pub use posthog::{ActiveUserKind, MetricsSource, PostHogClient};
pub use report::{build_project_digest, build_report};
pub use trend::compare;
pub use types::*;
