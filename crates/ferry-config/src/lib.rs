#![forbid(unsafe_code)]
#![warn(
    unused,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    rustdoc::broken_intra_doc_links,
    missing_docs
)]

//! Configuration models and loaders for Ferry transfer adapters.
//!
//! Layout: `model.rs` (typed options and adapter definitions), `loader.rs`
//! (option maps, definition files, environment overrides), `validate.rs`
//! (glob/regex compilation and structural checks), `defaults.rs`.

pub mod defaults;
pub mod error;
pub mod loader;
pub mod model;
pub mod validate;

pub use defaults::{ENV_SOURCE_DIRECTORY, ENV_TARGET_DIRECTORY};
pub use error::{ConfigError, ConfigResult};
pub use loader::{
    apply_env_overrides, from_json_str, from_options, load_definition, load_transfer_config,
};
pub use model::{
    AdapterDefinition, AuditStamp, EmptyFileHandling, EmptyMessageHandling, OutputNamingMode,
    PostProcessAction, RuleSpec, Severity, TransferConfig, ValidationRuleConfig, WriteMode,
};
pub use validate::{compile_globs, compile_rule_regex, validate_transfer_config};
