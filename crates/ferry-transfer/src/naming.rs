//! Destination file naming.
//!
//! Name generation never fails: every problem falls back to the source name.

use std::path::Path;

use chrono::NaiveDateTime;
use ferry_config::OutputNamingMode;
use tracing::warn;
use uuid::Uuid;

const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";
const DATE_FORMAT: &str = "%Y%m%d";

/// Split a file name into its stem and extension (extension includes the dot).
#[must_use]
pub fn split_name(name: &str) -> (&str, &str) {
    let path = Path::new(name);
    match (
        path.file_stem().and_then(|stem| stem.to_str()),
        path.extension().and_then(|ext| ext.to_str()),
    ) {
        (Some(stem), Some(ext)) => (stem, &name[name.len() - ext.len() - 1..]),
        (Some(stem), None) => (stem, ""),
        _ => (name, ""),
    }
}

/// `<stem>_<YYYYMMDDHHMMSS><ext>`.
#[must_use]
pub fn timestamped_name(name: &str, now: NaiveDateTime) -> String {
    let (stem, extension) = split_name(name);
    format!("{stem}_{}{extension}", now.format(TIMESTAMP_FORMAT))
}

/// Compute the destination name for `source_name` under `mode`.
#[must_use]
pub fn output_file_name(
    source_name: &str,
    mode: OutputNamingMode,
    pattern: Option<&str>,
    now: NaiveDateTime,
) -> String {
    match mode {
        OutputNamingMode::Original => source_name.to_string(),
        OutputNamingMode::Timestamped => timestamped_name(source_name, now),
        OutputNamingMode::CustomPattern => match pattern.map(str::trim) {
            Some(pattern) if !pattern.is_empty() => {
                let candidate = substitute(pattern, source_name, now);
                if is_usable_name(&candidate) {
                    candidate
                } else {
                    warn!(
                        pattern,
                        file = source_name,
                        result = %candidate,
                        "custom filename pattern produced an unusable name; keeping original"
                    );
                    source_name.to_string()
                }
            }
            _ => {
                warn!(file = source_name, "custom naming without a pattern; keeping original");
                source_name.to_string()
            }
        },
    }
}

fn substitute(pattern: &str, source_name: &str, now: NaiveDateTime) -> String {
    let (stem, extension) = split_name(source_name);
    let mut rendered = pattern
        .replace("{original_name}", stem)
        .replace("{timestamp}", &now.format(TIMESTAMP_FORMAT).to_string())
        .replace("{date}", &now.format(DATE_FORMAT).to_string())
        .replace("{extension}", extension);
    if rendered.contains("{uuid}") {
        rendered = rendered.replace("{uuid}", &Uuid::new_v4().to_string());
    }
    rendered
}

fn is_usable_name(name: &str) -> bool {
    let trimmed = name.trim();
    !trimmed.is_empty()
        && trimmed != "."
        && trimmed != ".."
        && !name.contains(['/', '\\', '\0'])
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn march_first() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 1)
            .and_then(|date| date.and_hms_opt(9, 30, 5))
            .expect("valid timestamp")
    }

    #[test]
    fn original_mode_is_identity() {
        for name in ["a.txt", "report.csv", ".hidden", "no_ext", "archive.tar.gz", "x y.z"] {
            assert_eq!(
                output_file_name(name, OutputNamingMode::Original, None, march_first()),
                name
            );
        }
    }

    #[test]
    fn timestamped_mode_inserts_before_extension() {
        assert_eq!(
            output_file_name("report.csv", OutputNamingMode::Timestamped, None, march_first()),
            "report_20240301093005.csv"
        );
        assert_eq!(timestamped_name("README", march_first()), "README_20240301093005");
        assert_eq!(
            timestamped_name("archive.tar.gz", march_first()),
            "archive.tar_20240301093005.gz"
        );
    }

    #[test]
    fn custom_pattern_substitutes_tokens() {
        assert_eq!(
            output_file_name(
                "invoice.pdf",
                OutputNamingMode::CustomPattern,
                Some("{original_name}_{date}{extension}"),
                march_first(),
            ),
            "invoice_20240301.pdf"
        );
        assert_eq!(
            output_file_name(
                "invoice.pdf",
                OutputNamingMode::CustomPattern,
                Some("out_{timestamp}"),
                march_first(),
            ),
            "out_20240301093005"
        );
        let with_uuid = output_file_name(
            "invoice.pdf",
            OutputNamingMode::CustomPattern,
            Some("{uuid}{extension}"),
            march_first(),
        );
        assert_eq!(with_uuid.len(), 36 + ".pdf".len());
        assert!(with_uuid.ends_with(".pdf"));
    }

    #[test]
    fn custom_pattern_falls_back_to_original() {
        for pattern in [None, Some(""), Some("   "), Some("../{original_name}"), Some(".."), Some("a/b")] {
            assert_eq!(
                output_file_name(
                    "invoice.pdf",
                    OutputNamingMode::CustomPattern,
                    pattern,
                    march_first()
                ),
                "invoice.pdf",
                "pattern {pattern:?}"
            );
        }
    }

    #[test]
    fn split_name_handles_dotfiles() {
        assert_eq!(split_name(".bashrc"), (".bashrc", ""));
        assert_eq!(split_name("a.txt"), ("a", ".txt"));
        assert_eq!(split_name("plain"), ("plain", ""));
    }
}
