//! `*.skill.json`: the unified record serialized directly.
//!
//! A file holds one record or an array of records. `format` defaults to
//! `record`; `source_path` and `integrity` are filled in when absent.

use std::path::Path;

use serde_json::Value;
use skillward_types::error::MalformedRecord;
use skillward_types::skill::UnifiedSkillRecord;

use super::{file_name, integrity, read_source, SkillParser};

const SUFFIX: &str = ".skill.json";

pub struct RecordJsonParser;

impl RecordJsonParser {
    fn record(&self, mut value: Value, path: &Path, digest: &str) -> Result<UnifiedSkillRecord, MalformedRecord> {
        let origin = path.display().to_string();
        let Some(object) = value.as_object_mut() else {
            return Err(MalformedRecord::new(origin, "record is not a JSON object"));
        };
        object
            .entry("format")
            .or_insert_with(|| Value::String(self.format().to_string()));

        let mut record: UnifiedSkillRecord =
            serde_json::from_value(value).map_err(|e| MalformedRecord::new(origin, e.to_string()))?;
        if record.source_path.as_os_str().is_empty() {
            record.source_path = path.to_path_buf();
        }
        if record.integrity.is_none() {
            record.integrity = Some(digest.to_string());
        }
        Ok(record)
    }
}

impl SkillParser for RecordJsonParser {
    fn format(&self) -> &'static str {
        "record"
    }

    fn can_parse(&self, path: &Path) -> bool {
        file_name(path).ends_with(SUFFIX)
    }

    fn parse(&self, path: &Path) -> Result<Vec<UnifiedSkillRecord>, MalformedRecord> {
        let source = read_source(path)?;
        let digest = integrity(source.as_bytes());
        let value: Value = serde_json::from_str(&source)
            .map_err(|e| MalformedRecord::new(path.display().to_string(), format!("invalid JSON: {e}")))?;

        match value {
            Value::Array(items) => items
                .into_iter()
                .map(|item| self.record(item, path, &digest))
                .collect(),
            single => Ok(vec![self.record(single, path, &digest)?]),
        }
    }
}
