//! Builds [`TransferConfig`] values from option maps and definition files.
//!
//! # Design
//! - Option maps use the camelCase keys handed over by the external loader.
//! - Scalars arrive either typed or as strings; both are accepted.
//! - Environment overrides are applied to the raw map so the same parsing
//!   and validation path runs for every source of configuration.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::defaults::{
    DEFAULT_FILE_PATTERN, DEFAULT_MAXIMUM_CONCURRENCY, ENV_SOURCE_DIRECTORY, ENV_TARGET_DIRECTORY,
};
use crate::error::{ConfigError, ConfigResult};
use crate::model::{
    AdapterDefinition, EmptyFileHandling, EmptyMessageHandling, OutputNamingMode,
    PostProcessAction, TransferConfig, ValidationRuleConfig, WriteMode,
};
use crate::validate::validate_transfer_config;

const KNOWN_KEYS: &[&str] = &[
    "sourceDirectory",
    "targetDirectory",
    "filePattern",
    "exclusionMask",
    "processReadOnlyFiles",
    "maximumFileSize",
    "msecsToWaitBeforeModificationCheck",
    "emptyFileHandling",
    "emptyMessageHandling",
    "postProcessAction",
    "processingMode",
    "archiveDirectory",
    "addTimestamp",
    "archiveFaultySourceFiles",
    "archiveErrorDirectory",
    "outputFilenameMode",
    "customFilenamePattern",
    "writeMode",
    "maximumConcurrency",
    "validationRules",
    "pollIntervalSecs",
];

/// Resolve and validate a camelCase option map.
///
/// # Errors
///
/// Returns an error when a required directory is missing, a value has the
/// wrong type, or validation of the resolved configuration fails.
pub fn from_options(options: &Map<String, Value>) -> ConfigResult<TransferConfig> {
    for key in options.keys() {
        if !KNOWN_KEYS.contains(&key.as_str()) {
            debug!(key = %key, "ignoring unrecognised transfer option");
        }
    }

    let source_directory = string_opt(options, "sourceDirectory")?.ok_or(
        ConfigError::MissingField {
            field: "sourceDirectory",
        },
    )?;
    let target_directory = string_opt(options, "targetDirectory")?.ok_or(
        ConfigError::MissingField {
            field: "targetDirectory",
        },
    )?;

    let post_process_label = match string_opt(options, "postProcessAction")? {
        Some(label) => Some(label),
        None => string_opt(options, "processingMode")?,
    };

    let validation_rules = match options.get("validationRules") {
        None | Some(Value::Null) => Vec::new(),
        Some(value @ Value::Array(_)) => {
            serde_json::from_value::<Vec<ValidationRuleConfig>>(value.clone())
                .map_err(|source| ConfigError::Json { path: None, source })?
        }
        Some(other) => {
            return Err(ConfigError::invalid(
                "validationRules",
                Some(other.to_string()),
                "must be an array",
            ));
        }
    };

    let maximum_concurrency = match u64_opt(options, "maximumConcurrency")? {
        Some(value) => usize::try_from(value).map_err(|_| {
            ConfigError::invalid(
                "maximumConcurrency",
                Some(value.to_string()),
                "exceeds platform limits",
            )
        })?,
        None => DEFAULT_MAXIMUM_CONCURRENCY,
    };

    let config = TransferConfig {
        source_directory: PathBuf::from(source_directory),
        target_directory: PathBuf::from(target_directory),
        file_pattern: string_opt(options, "filePattern")?
            .unwrap_or_else(|| DEFAULT_FILE_PATTERN.to_string()),
        exclusion_mask: string_opt(options, "exclusionMask")?,
        process_read_only_files: bool_opt(options, "processReadOnlyFiles")?.unwrap_or(false),
        maximum_file_size: u64_opt(options, "maximumFileSize")?.unwrap_or(0),
        stability_wait: Duration::from_millis(
            u64_opt(options, "msecsToWaitBeforeModificationCheck")?.unwrap_or(0),
        ),
        empty_file_handling: string_opt(options, "emptyFileHandling")?
            .map(|label| EmptyFileHandling::parse_or_default(&label))
            .unwrap_or_default(),
        empty_message_handling: string_opt(options, "emptyMessageHandling")?
            .map(|label| EmptyMessageHandling::parse_or_default(&label))
            .unwrap_or_default(),
        post_process_action: post_process_label
            .map(|label| PostProcessAction::parse_or_default(&label))
            .unwrap_or_default(),
        archive_directory: string_opt(options, "archiveDirectory")?.map(PathBuf::from),
        add_timestamp: bool_opt(options, "addTimestamp")?.unwrap_or(false),
        archive_faulty_source_files: bool_opt(options, "archiveFaultySourceFiles")?
            .unwrap_or(false),
        archive_error_directory: string_opt(options, "archiveErrorDirectory")?.map(PathBuf::from),
        output_naming_mode: string_opt(options, "outputFilenameMode")?
            .map(|label| OutputNamingMode::parse_or_default(&label))
            .unwrap_or_default(),
        custom_filename_pattern: string_opt(options, "customFilenamePattern")?,
        write_mode: string_opt(options, "writeMode")?
            .map(|label| WriteMode::parse_or_default(&label))
            .unwrap_or_default(),
        maximum_concurrency,
        validation_rules,
        poll_interval: u64_opt(options, "pollIntervalSecs")?
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs),
    };

    validate_transfer_config(&config)?;
    Ok(config)
}

/// Parse a JSON object of options and resolve it.
///
/// # Errors
///
/// Returns an error if the text is not a JSON object or fails [`from_options`].
pub fn from_json_str(raw: &str) -> ConfigResult<TransferConfig> {
    let value: Value =
        serde_json::from_str(raw).map_err(|source| ConfigError::Json { path: None, source })?;
    let Value::Object(options) = value else {
        return Err(ConfigError::invalid(
            "options",
            None,
            "must be a JSON object",
        ));
    };
    from_options(&options)
}

/// Read an adapter definition from a `.json`, `.yaml` or `.yml` file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or decoded.
pub fn load_definition(path: &Path) -> ConfigResult<AdapterDefinition> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        operation: "definition.read",
        path: path.to_path_buf(),
        source,
    })?;
    let is_yaml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"));

    if is_yaml {
        serde_yaml::from_str(&raw).map_err(|source| ConfigError::Yaml {
            path: path.to_path_buf(),
            source,
        })
    } else {
        serde_json::from_str(&raw).map_err(|source| ConfigError::Json {
            path: Some(path.to_path_buf()),
            source,
        })
    }
}

/// Overlay directory overrides onto an option map using `lookup` for variables.
pub fn apply_env_overrides<F>(options: &mut Map<String, Value>, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    for (variable, key) in [
        (ENV_SOURCE_DIRECTORY, "sourceDirectory"),
        (ENV_TARGET_DIRECTORY, "targetDirectory"),
    ] {
        if let Some(value) = lookup(variable).filter(|value| !value.trim().is_empty()) {
            info!(variable, key, "applying environment override");
            options.insert(key.to_string(), Value::String(value));
        }
    }
}

/// Load a definition file, apply process environment overrides and resolve it.
///
/// # Errors
///
/// Returns an error if loading, decoding or validation fails.
pub fn load_transfer_config(path: &Path) -> ConfigResult<(AdapterDefinition, TransferConfig)> {
    let mut definition = load_definition(path)?;
    apply_env_overrides(&mut definition.settings, |name| std::env::var(name).ok());
    let config = from_options(&definition.settings)?;
    Ok((definition, config))
}

fn string_opt(options: &Map<String, Value>, key: &'static str) -> ConfigResult<Option<String>> {
    match options.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(text)) => {
            let trimmed = text.trim();
            Ok((!trimmed.is_empty()).then(|| trimmed.to_string()))
        }
        Some(Value::Number(number)) => Ok(Some(number.to_string())),
        Some(other) => Err(ConfigError::invalid(
            key,
            Some(other.to_string()),
            "must be a string",
        )),
    }
}

fn bool_opt(options: &Map<String, Value>, key: &'static str) -> ConfigResult<Option<bool>> {
    match options.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(flag)) => Ok(Some(*flag)),
        Some(Value::String(text)) => match text.trim().to_ascii_lowercase().as_str() {
            "" => Ok(None),
            "true" | "yes" | "1" => Ok(Some(true)),
            "false" | "no" | "0" => Ok(Some(false)),
            _ => Err(ConfigError::invalid(
                key,
                Some(text.clone()),
                "must be a boolean",
            )),
        },
        Some(other) => Err(ConfigError::invalid(
            key,
            Some(other.to_string()),
            "must be a boolean",
        )),
    }
}

fn u64_opt(options: &Map<String, Value>, key: &'static str) -> ConfigResult<Option<u64>> {
    match options.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(number)) => number.as_u64().map(Some).ok_or_else(|| {
            ConfigError::invalid(
                key,
                Some(number.to_string()),
                "must be a non-negative integer",
            )
        }),
        Some(Value::String(text)) if text.trim().is_empty() => Ok(None),
        Some(Value::String(text)) => text.trim().parse::<u64>().map(Some).map_err(|_| {
            ConfigError::invalid(key, Some(text.clone()), "must be a non-negative integer")
        }),
        Some(other) => Err(ConfigError::invalid(
            key,
            Some(other.to_string()),
            "must be a non-negative integer",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{RuleSpec, Severity};
    use serde_json::json;

    fn options(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn from_options_applies_defaults() -> anyhow::Result<()> {
        let config = from_options(&options(json!({
            "sourceDirectory": "/in",
            "targetDirectory": "/out",
        })))?;
        assert_eq!(config, TransferConfig::new("/in", "/out"));
        Ok(())
    }

    #[test]
    fn from_options_reads_every_key() -> anyhow::Result<()> {
        let config = from_options(&options(json!({
            "sourceDirectory": "/in",
            "targetDirectory": "/out",
            "filePattern": "*.csv",
            "exclusionMask": "*.tmp",
            "processReadOnlyFiles": "true",
            "maximumFileSize": "1024",
            "msecsToWaitBeforeModificationCheck": 250,
            "emptyFileHandling": "ProcessEmptyFiles",
            "emptyMessageHandling": "SkipEmptyMessages",
            "processingMode": "DELETE",
            "archiveDirectory": "/archive",
            "addTimestamp": true,
            "archiveFaultySourceFiles": true,
            "archiveErrorDirectory": "/err",
            "outputFilenameMode": "Custom",
            "customFilenamePattern": "{original_name}_{date}{extension}",
            "writeMode": "Create Temp File",
            "maximumConcurrency": 4,
            "pollIntervalSecs": 30,
            "validationRules": [
                {"type": "contentContains", "value": "HDR", "severity": "warning"}
            ],
        })))?;

        assert_eq!(config.file_pattern, "*.csv");
        assert_eq!(config.exclusion_mask.as_deref(), Some("*.tmp"));
        assert!(config.process_read_only_files);
        assert_eq!(config.maximum_file_size, 1024);
        assert_eq!(config.stability_wait, Duration::from_millis(250));
        assert_eq!(config.empty_file_handling, EmptyFileHandling::ProcessEmptyFiles);
        assert_eq!(
            config.empty_message_handling,
            EmptyMessageHandling::SkipEmptyMessages
        );
        assert_eq!(config.post_process_action, PostProcessAction::Delete);
        assert_eq!(config.archive_directory, Some(PathBuf::from("/archive")));
        assert!(config.add_timestamp);
        assert_eq!(config.quarantine_directory(), Some(&PathBuf::from("/err")));
        assert_eq!(config.output_naming_mode, OutputNamingMode::CustomPattern);
        assert_eq!(config.write_mode, WriteMode::TempThenRename);
        assert_eq!(config.maximum_concurrency, 4);
        assert_eq!(config.poll_interval, Some(Duration::from_secs(30)));
        assert_eq!(config.validation_rules.len(), 1);
        assert_eq!(config.validation_rules[0].severity, Severity::Warning);
        assert_eq!(
            config.validation_rules[0].rule,
            RuleSpec::ContentContains {
                value: "HDR".into()
            }
        );
        Ok(())
    }

    #[test]
    fn post_process_action_takes_precedence_over_processing_mode() -> anyhow::Result<()> {
        let config = from_options(&options(json!({
            "sourceDirectory": "/in",
            "targetDirectory": "/out",
            "postProcessAction": "KEEP_AND_MARK",
            "processingMode": "DELETE",
        })))?;
        assert_eq!(config.post_process_action, PostProcessAction::KeepAndMark);
        Ok(())
    }

    #[test]
    fn from_options_rejects_missing_and_mistyped_values() {
        let missing = from_options(&options(json!({"targetDirectory": "/out"})));
        assert!(matches!(
            missing,
            Err(ConfigError::MissingField {
                field: "sourceDirectory"
            })
        ));

        let mistyped = from_options(&options(json!({
            "sourceDirectory": "/in",
            "targetDirectory": "/out",
            "maximumFileSize": "lots",
        })));
        assert!(matches!(mistyped, Err(ConfigError::InvalidField { .. })));

        let bad_rules = from_options(&options(json!({
            "sourceDirectory": "/in",
            "targetDirectory": "/out",
            "validationRules": {"type": "lineCount"},
        })));
        assert!(matches!(bad_rules, Err(ConfigError::InvalidField { .. })));
    }

    #[test]
    fn env_overrides_replace_directories() {
        let mut map = options(json!({
            "sourceDirectory": "/in",
            "targetDirectory": "/out",
        }));
        apply_env_overrides(&mut map, |name| match name {
            ENV_SOURCE_DIRECTORY => Some("/override/in".to_string()),
            ENV_TARGET_DIRECTORY => Some("  ".to_string()),
            _ => None,
        });
        assert_eq!(map["sourceDirectory"], "/override/in");
        assert_eq!(map["targetDirectory"], "/out");
    }

    #[test]
    fn from_json_str_requires_object() {
        assert!(matches!(
            from_json_str("[1, 2]"),
            Err(ConfigError::InvalidField { .. })
        ));
        assert!(matches!(
            from_json_str("{not json"),
            Err(ConfigError::Json { path: None, .. })
        ));
    }
}
