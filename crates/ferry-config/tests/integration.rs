use std::fs;
use std::path::PathBuf;

use chrono::Utc;
use ferry_config::{
    AdapterDefinition, AuditStamp, ConfigError, PostProcessAction, WriteMode, from_options,
    load_definition,
};
use serde_json::json;
use tempfile::TempDir;
use uuid::Uuid;

#[test]
fn yaml_definition_resolves_to_transfer_config() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("adapter.yaml");
    fs::write(
        &path,
        r#"
id: 6f1c2a4e-0000-4000-8000-000000000001
name: invoices
audit:
  createdAt: 2024-03-01T12:00:00Z
  createdBy: ops
  updatedAt: 2024-03-01T12:00:00Z
  updatedBy: ops
settings:
  sourceDirectory: /data/in
  targetDirectory: /data/out
  postProcessAction: KEEP_AND_MARK
  writeMode: Create Temp File
  validationRules:
    - type: headerMatch
      pattern: "^id,amount"
      severity: warning
"#,
    )?;

    let definition = load_definition(&path)?;
    assert_eq!(definition.name, "invoices");
    assert_eq!(
        definition.audit.as_ref().map(|stamp| stamp.created_by.as_str()),
        Some("ops")
    );

    let config = from_options(&definition.settings)?;
    assert_eq!(config.source_directory, PathBuf::from("/data/in"));
    assert_eq!(config.post_process_action, PostProcessAction::KeepAndMark);
    assert_eq!(config.write_mode, WriteMode::TempThenRename);
    assert_eq!(config.validation_rules.len(), 1);
    Ok(())
}

#[test]
fn json_definition_round_trips_audit_stamp() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("adapter.json");
    let definition = AdapterDefinition {
        id: Uuid::new_v4(),
        name: "reports".into(),
        audit: Some(AuditStamp::created("scheduler", Utc::now())),
        settings: match json!({"sourceDirectory": "/in", "targetDirectory": "/out"}) {
            serde_json::Value::Object(map) => map,
            _ => unreachable!("literal object"),
        },
    };
    fs::write(&path, serde_json::to_vec_pretty(&definition)?)?;

    let loaded = load_definition(&path)?;
    assert_eq!(loaded, definition);
    Ok(())
}

#[test]
fn definition_errors_report_path() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let missing = dir.path().join("absent.json");
    assert!(matches!(
        load_definition(&missing),
        Err(ConfigError::Io {
            operation: "definition.read",
            ..
        })
    ));

    let broken = dir.path().join("broken.yml");
    fs::write(&broken, "id: [unterminated")?;
    match load_definition(&broken) {
        Err(ConfigError::Yaml { path, .. }) => assert_eq!(path, broken),
        other => panic!("expected yaml error, got {other:?}"),
    }
    Ok(())
}
