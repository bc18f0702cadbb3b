//! Validation helpers for transfer configuration.

use globset::{Glob, GlobSet, GlobSetBuilder};
use regex::Regex;
use tracing::warn;

use crate::error::{ConfigError, ConfigResult};
use crate::model::{OutputNamingMode, RuleSpec, TransferConfig};

/// Compile a `;`-separated list of globs into a single matcher.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidGlob`] when any entry fails to compile.
pub fn compile_globs(field: &'static str, value: &str) -> ConfigResult<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in value.split(';').map(str::trim).filter(|p| !p.is_empty()) {
        let glob = Glob::new(pattern).map_err(|source| ConfigError::InvalidGlob {
            field,
            value: pattern.to_string(),
            source,
        })?;
        builder.add(glob);
    }
    builder.build().map_err(|source| ConfigError::InvalidGlob {
        field,
        value: value.to_string(),
        source,
    })
}

/// Compile the regular expression carried by a rule.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidRegex`] when the expression is malformed.
pub fn compile_rule_regex(rule: &str, pattern: &str) -> ConfigResult<Regex> {
    Regex::new(pattern).map_err(|source| ConfigError::InvalidRegex {
        field: rule.to_string(),
        value: pattern.to_string(),
        source,
    })
}

/// Check a resolved configuration before any run uses it.
///
/// # Errors
///
/// Returns the first structural problem found: blank directories, bad globs
/// or regexes, a zero worker pool, or inverted rule ranges.
pub fn validate_transfer_config(config: &TransferConfig) -> ConfigResult<()> {
    if config.source_directory.as_os_str().is_empty() {
        return Err(ConfigError::MissingField {
            field: "sourceDirectory",
        });
    }
    if config.target_directory.as_os_str().is_empty() {
        return Err(ConfigError::MissingField {
            field: "targetDirectory",
        });
    }
    if config.maximum_concurrency == 0 {
        return Err(ConfigError::invalid(
            "maximumConcurrency",
            Some("0".to_string()),
            "must be at least 1",
        ));
    }

    compile_globs("filePattern", &config.file_pattern)?;
    if let Some(mask) = config.exclusion_mask.as_deref() {
        compile_globs("exclusionMask", mask)?;
    }

    for (index, rule) in config.validation_rules.iter().enumerate() {
        let field = format!("validationRules[{index}].{}", rule.rule.name());
        match &rule.rule {
            RuleSpec::NamePattern { pattern } | RuleSpec::HeaderMatch { pattern } => {
                compile_rule_regex(&field, pattern)?;
            }
            RuleSpec::LineCount { min, max } | RuleSpec::SizeRange { min, max } => {
                if let (Some(min), Some(max)) = (min, max)
                    && min > max
                {
                    return Err(ConfigError::invalid(
                        field,
                        Some(format!("{min}..{max}")),
                        "minimum exceeds maximum",
                    ));
                }
            }
            RuleSpec::ContentContains { value } | RuleSpec::ContentExcludes { value } => {
                if value.is_empty() {
                    return Err(ConfigError::invalid(field, None, "must not be empty"));
                }
            }
            RuleSpec::MinimumAge { .. } => {}
        }
    }

    if config.archive_faulty_source_files && config.archive_error_directory.is_none() {
        warn!("archiveFaultySourceFiles is set without archiveErrorDirectory; rejected files stay in place");
    }
    if config.output_naming_mode == OutputNamingMode::CustomPattern
        && config
            .custom_filename_pattern
            .as_deref()
            .is_none_or(|pattern| pattern.trim().is_empty())
    {
        warn!("custom output naming without customFilenamePattern; original names will be used");
    }
    Ok(())
}
