//! Ordered validation chain.
//!
//! Required checks run in a fixed order and the first failure wins:
//! existence, exclusion mask, read-only policy, size bound, empty-file
//! policy. Stability runs after them (see [`crate::stability`]); the
//! optional rules run last against content that has already been read.

use std::fs::File;
use std::time::{Duration, SystemTime};

use ferry_config::{
    EmptyFileHandling, RuleSpec, Severity, TransferConfig, compile_globs, compile_rule_regex,
};
use globset::GlobSet;
use regex::Regex;

use crate::error::TransferResult;
use crate::model::{FileCandidate, RejectCategory, ValidationOutcome};

#[derive(Debug)]
enum RuleCheck {
    NamePattern(Regex),
    ContentContains(String),
    ContentExcludes(String),
    HeaderMatch(Regex),
    LineCount { min: Option<u64>, max: Option<u64> },
    SizeRange { min: Option<u64>, max: Option<u64> },
    MinimumAge(Duration),
}

#[derive(Debug)]
struct CompiledRule {
    name: &'static str,
    severity: Severity,
    check: RuleCheck,
}

impl CompiledRule {
    fn compile(index: usize, spec: &RuleSpec, severity: Severity) -> TransferResult<Self> {
        let field = format!("validationRules[{index}].{}", spec.name());
        let check = match spec {
            RuleSpec::NamePattern { pattern } => {
                RuleCheck::NamePattern(compile_rule_regex(&field, pattern)?)
            }
            RuleSpec::ContentContains { value } => RuleCheck::ContentContains(value.clone()),
            RuleSpec::ContentExcludes { value } => RuleCheck::ContentExcludes(value.clone()),
            RuleSpec::HeaderMatch { pattern } => {
                RuleCheck::HeaderMatch(compile_rule_regex(&field, pattern)?)
            }
            RuleSpec::LineCount { min, max } => RuleCheck::LineCount {
                min: *min,
                max: *max,
            },
            RuleSpec::SizeRange { min, max } => RuleCheck::SizeRange {
                min: *min,
                max: *max,
            },
            RuleSpec::MinimumAge { seconds } => {
                RuleCheck::MinimumAge(Duration::from_secs(*seconds))
            }
        };
        Ok(Self {
            name: spec.name(),
            severity,
            check,
        })
    }

    const fn category(&self) -> RejectCategory {
        match self.check {
            RuleCheck::NamePattern(_) => RejectCategory::Name,
            RuleCheck::ContentContains(_)
            | RuleCheck::ContentExcludes(_)
            | RuleCheck::LineCount { .. } => RejectCategory::Content,
            RuleCheck::HeaderMatch(_) => RejectCategory::Format,
            RuleCheck::SizeRange { .. } => RejectCategory::Size,
            RuleCheck::MinimumAge(_) => RejectCategory::Timestamp,
        }
    }

    /// `Err(reason)` when the rule fails.
    fn evaluate(
        &self,
        candidate: &FileCandidate,
        content: &[u8],
        now: SystemTime,
    ) -> Result<(), String> {
        match &self.check {
            RuleCheck::NamePattern(regex) => {
                if regex.is_match(&candidate.name) {
                    Ok(())
                } else {
                    Err(format!("File name does not match pattern {}", regex.as_str()))
                }
            }
            RuleCheck::ContentContains(needle) => {
                if contains(content, needle.as_bytes()) {
                    Ok(())
                } else {
                    Err(format!("Content does not contain \"{needle}\""))
                }
            }
            RuleCheck::ContentExcludes(needle) => {
                if contains(content, needle.as_bytes()) {
                    Err(format!("Content contains forbidden text \"{needle}\""))
                } else {
                    Ok(())
                }
            }
            RuleCheck::HeaderMatch(regex) => {
                let header = first_line(content);
                if regex.is_match(&header) {
                    Ok(())
                } else {
                    Err(format!("Header does not match pattern {}", regex.as_str()))
                }
            }
            RuleCheck::LineCount { min, max } => {
                let lines = line_count(content);
                check_range("Line count", lines, *min, *max)
            }
            RuleCheck::SizeRange { min, max } => {
                check_range("File size", candidate.size_bytes, *min, *max)
            }
            RuleCheck::MinimumAge(minimum) => {
                let age = now
                    .duration_since(candidate.last_modified_at)
                    .unwrap_or(Duration::ZERO);
                if age >= *minimum {
                    Ok(())
                } else {
                    Err(format!(
                        "File modified {}s ago; minimum age is {}s",
                        age.as_secs(),
                        minimum.as_secs()
                    ))
                }
            }
        }
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    needle.is_empty() || haystack.windows(needle.len()).any(|window| window == needle)
}

fn first_line(content: &[u8]) -> String {
    let line = content
        .split(|byte| *byte == b'\n')
        .next()
        .unwrap_or_default();
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    String::from_utf8_lossy(line).into_owned()
}

fn line_count(content: &[u8]) -> u64 {
    if content.is_empty() {
        return 0;
    }
    let newlines = content.iter().filter(|byte| **byte == b'\n').count() as u64;
    if content.ends_with(b"\n") {
        newlines
    } else {
        newlines + 1
    }
}

fn check_range(label: &str, value: u64, min: Option<u64>, max: Option<u64>) -> Result<(), String> {
    if let Some(min) = min
        && value < min
    {
        return Err(format!("{label} {value} is below minimum {min}"));
    }
    if let Some(max) = max
        && value > max
    {
        return Err(format!("{label} {value} exceeds maximum {max}"));
    }
    Ok(())
}

/// Compiled validation chain for one configuration.
#[derive(Debug)]
pub struct ValidationChain {
    exclusion: Option<GlobSet>,
    process_read_only_files: bool,
    maximum_file_size: u64,
    empty_file_handling: EmptyFileHandling,
    rules: Vec<CompiledRule>,
}

impl ValidationChain {
    /// Compile the exclusion mask and rules from `config`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if a glob or rule expression is invalid.
    pub fn new(config: &TransferConfig) -> TransferResult<Self> {
        let exclusion = config
            .exclusion_mask
            .as_deref()
            .map(|mask| compile_globs("exclusionMask", mask))
            .transpose()?;
        let rules = config
            .validation_rules
            .iter()
            .enumerate()
            .map(|(index, rule)| CompiledRule::compile(index, &rule.rule, rule.severity))
            .collect::<TransferResult<Vec<_>>>()?;
        Ok(Self {
            exclusion,
            process_read_only_files: config.process_read_only_files,
            maximum_file_size: config.maximum_file_size,
            empty_file_handling: config.empty_file_handling,
            rules,
        })
    }

    /// Run the required checks that precede stability. `None` means every check passed.
    #[must_use]
    pub fn check_required(&self, candidate: &FileCandidate) -> Option<ValidationOutcome> {
        match std::fs::metadata(&candidate.path) {
            Err(_) => {
                return Some(ValidationOutcome::reject(
                    RejectCategory::Permission,
                    "File no longer exists",
                ));
            }
            Ok(metadata) if !metadata.is_file() => {
                return Some(ValidationOutcome::reject_quarantine(
                    RejectCategory::Permission,
                    "Not a regular file",
                ));
            }
            Ok(_) => {}
        }
        if let Err(err) = File::open(&candidate.path) {
            return Some(ValidationOutcome::reject_quarantine(
                RejectCategory::Permission,
                format!("File is not readable: {err}"),
            ));
        }

        if self
            .exclusion
            .as_ref()
            .is_some_and(|mask| mask.is_match(&candidate.name))
        {
            return Some(ValidationOutcome::reject(
                RejectCategory::Name,
                "File matches exclusion mask",
            ));
        }

        if candidate.read_only && !self.process_read_only_files {
            return Some(ValidationOutcome::reject_quarantine(
                RejectCategory::Permission,
                "File is read-only",
            ));
        }

        if self.maximum_file_size > 0 && candidate.size_bytes > self.maximum_file_size {
            return Some(ValidationOutcome::reject_quarantine(
                RejectCategory::Size,
                format!(
                    "File size {} bytes exceeds maximum {} bytes",
                    candidate.size_bytes, self.maximum_file_size
                ),
            ));
        }

        if candidate.size_bytes == 0 {
            match self.empty_file_handling {
                EmptyFileHandling::DoNotCreateMessage => {
                    return Some(ValidationOutcome::reject_quarantine(
                        RejectCategory::Size,
                        "File is empty",
                    ));
                }
                EmptyFileHandling::SkipEmptyFiles => {
                    return Some(ValidationOutcome::reject(
                        RejectCategory::Size,
                        "Skipping empty file",
                    ));
                }
                EmptyFileHandling::ProcessEmptyFiles => {}
            }
        }

        None
    }

    /// Outcome for a candidate that failed the stability window.
    #[must_use]
    pub fn unstable() -> ValidationOutcome {
        ValidationOutcome::reject(
            RejectCategory::LockStatus,
            "File is still being modified",
        )
    }

    /// Evaluate optional rules against content already read for the unit.
    #[must_use]
    pub fn evaluate_rules(
        &self,
        candidate: &FileCandidate,
        content: &[u8],
        now: SystemTime,
    ) -> ValidationOutcome {
        let mut warnings = Vec::new();
        for rule in &self.rules {
            if let Err(reason) = rule.evaluate(candidate, content, now) {
                match rule.severity {
                    Severity::Warning => warnings.push(format!("{}: {reason}", rule.name)),
                    Severity::Error => {
                        return ValidationOutcome::reject_quarantine(rule.category(), reason)
                            .with_warnings(warnings);
                    }
                }
            }
        }
        ValidationOutcome::accept(warnings)
    }

    /// Whether any optional rules are configured.
    #[must_use]
    pub fn has_rules(&self) -> bool {
        !self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Decision;
    use ferry_config::ValidationRuleConfig;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn candidate_for(path: &Path, size_bytes: u64) -> FileCandidate {
        FileCandidate {
            path: path.to_path_buf(),
            name: path
                .file_name()
                .and_then(|name| name.to_str())
                .unwrap_or_default()
                .to_string(),
            size_bytes,
            last_modified_at: SystemTime::now(),
            read_only: false,
        }
    }

    fn rule(rule: RuleSpec, severity: Severity) -> ValidationRuleConfig {
        ValidationRuleConfig { rule, severity }
    }

    #[test]
    fn exclusion_rejects_without_quarantine() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let path = temp.path().join("b.tmp");
        fs::write(&path, b"partial")?;
        let mut config = TransferConfig::new(temp.path(), "/out");
        config.exclusion_mask = Some("*.tmp".into());

        let chain = ValidationChain::new(&config)?;
        let outcome = chain
            .check_required(&candidate_for(&path, 7))
            .expect("excluded");
        assert_eq!(outcome.decision, Decision::Reject);
        assert_eq!(outcome.category, Some(RejectCategory::Name));
        Ok(())
    }

    #[test]
    fn oversize_file_reason_matches_contract() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let path = temp.path().join("big.dat");
        fs::write(&path, vec![0_u8; 200])?;
        let mut config = TransferConfig::new(temp.path(), "/out");
        config.maximum_file_size = 50;

        let outcome = ValidationChain::new(&config)?
            .check_required(&candidate_for(&path, 200))
            .expect("too large");
        assert_eq!(outcome.decision, Decision::RejectQuarantine);
        assert_eq!(
            outcome.reason.as_deref(),
            Some("File size 200 bytes exceeds maximum 50 bytes")
        );
        Ok(())
    }

    #[test]
    fn read_only_and_missing_files_are_rejected() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let path = temp.path().join("locked.txt");
        fs::write(&path, b"x")?;
        let config = TransferConfig::new(temp.path(), "/out");
        let chain = ValidationChain::new(&config)?;

        let mut locked = candidate_for(&path, 1);
        locked.read_only = true;
        let outcome = chain.check_required(&locked).expect("read-only");
        assert_eq!(outcome.category, Some(RejectCategory::Permission));
        assert_eq!(outcome.decision, Decision::RejectQuarantine);

        let missing = candidate_for(&temp.path().join("gone.txt"), 1);
        let outcome = chain.check_required(&missing).expect("missing");
        assert_eq!(outcome.decision, Decision::Reject);
        Ok(())
    }

    #[test]
    fn empty_file_policies() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let path = temp.path().join("empty.txt");
        fs::write(&path, b"")?;
        let mut config = TransferConfig::new(temp.path(), "/out");

        config.empty_file_handling = EmptyFileHandling::DoNotCreateMessage;
        let outcome = ValidationChain::new(&config)?
            .check_required(&candidate_for(&path, 0))
            .expect("rejected");
        assert_eq!(outcome.decision, Decision::RejectQuarantine);

        config.empty_file_handling = EmptyFileHandling::SkipEmptyFiles;
        let outcome = ValidationChain::new(&config)?
            .check_required(&candidate_for(&path, 0))
            .expect("skipped");
        assert_eq!(outcome.decision, Decision::Reject);

        config.empty_file_handling = EmptyFileHandling::ProcessEmptyFiles;
        assert!(
            ValidationChain::new(&config)?
                .check_required(&candidate_for(&path, 0))
                .is_none()
        );
        Ok(())
    }

    #[test]
    fn warnings_accumulate_and_errors_short_circuit() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let path = temp.path().join("data.csv");
        let mut config = TransferConfig::new(temp.path(), "/out");
        config.validation_rules = vec![
            rule(
                RuleSpec::NamePattern {
                    pattern: "^inv_".into(),
                },
                Severity::Warning,
            ),
            rule(
                RuleSpec::LineCount {
                    min: Some(5),
                    max: None,
                },
                Severity::Warning,
            ),
            rule(
                RuleSpec::HeaderMatch {
                    pattern: "^id,amount$".into(),
                },
                Severity::Error,
            ),
            rule(
                RuleSpec::ContentExcludes {
                    value: "never-evaluated".into(),
                },
                Severity::Error,
            ),
        ];
        let chain = ValidationChain::new(&config)?;
        let candidate = candidate_for(&path, 20);

        let accepted = chain.evaluate_rules(&candidate, b"id,amount\r\n1,2\n", SystemTime::now());
        assert!(accepted.is_accepted());
        assert_eq!(accepted.warnings.len(), 2);

        let rejected = chain.evaluate_rules(&candidate, b"name,total\n", SystemTime::now());
        assert_eq!(rejected.decision, Decision::RejectQuarantine);
        assert_eq!(rejected.category, Some(RejectCategory::Format));
        assert_eq!(rejected.warnings.len(), 2);
        Ok(())
    }

    #[test]
    fn content_size_and_age_rules() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let mut config = TransferConfig::new(temp.path(), "/out");
        config.validation_rules = vec![
            rule(
                RuleSpec::ContentContains {
                    value: "TOTAL".into(),
                },
                Severity::Error,
            ),
            rule(
                RuleSpec::SizeRange {
                    min: Some(1),
                    max: Some(100),
                },
                Severity::Error,
            ),
            rule(RuleSpec::MinimumAge { seconds: 60 }, Severity::Error),
        ];
        let chain = ValidationChain::new(&config)?;
        assert!(chain.has_rules());

        let mut candidate = candidate_for(&temp.path().join("r.txt"), 10);
        let now = SystemTime::now();
        candidate.last_modified_at = now - Duration::from_secs(120);

        assert!(chain.evaluate_rules(&candidate, b"TOTAL 10", now).is_accepted());
        let missing = chain.evaluate_rules(&candidate, b"nothing", now);
        assert_eq!(missing.category, Some(RejectCategory::Content));

        candidate.size_bytes = 500;
        let large = chain.evaluate_rules(&candidate, b"TOTAL", now);
        assert_eq!(large.category, Some(RejectCategory::Size));

        candidate.size_bytes = 10;
        candidate.last_modified_at = now - Duration::from_secs(5);
        let fresh = chain.evaluate_rules(&candidate, b"TOTAL", now);
        assert_eq!(fresh.category, Some(RejectCategory::Timestamp));
        Ok(())
    }

    #[test]
    fn line_count_handles_trailing_newline() {
        assert_eq!(line_count(b""), 0);
        assert_eq!(line_count(b"one"), 1);
        assert_eq!(line_count(b"one\n"), 1);
        assert_eq!(line_count(b"one\ntwo"), 2);
        assert_eq!(first_line(b"head\r\nbody"), "head");
    }
}
