use anyhow::Context;
use serde::Serialize;
use std::path::PathBuf;

pub const ENV_WORKSPACE: &str = "ADMISIOND_WORKSPACE";
pub const ENV_MAX_UPLOAD_BYTES: &str = "ADMISIOND_MAX_UPLOAD_BYTES";
pub const ENV_MAX_ATTENDANCE_RECORDS: &str = "ADMISIOND_MAX_ATTENDANCE_RECORDS";

pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 5 * 1024 * 1024;
// 4 bound parameters per record keeps a full batch under SQLite's 32766 limit.
pub const DEFAULT_MAX_ATTENDANCE_RECORDS: usize = 5000;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceConfig {
    pub workspace: Option<PathBuf>,
    pub max_upload_bytes: u64,
    pub max_attendance_records: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            workspace: None,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            max_attendance_records: DEFAULT_MAX_ATTENDANCE_RECORDS,
        }
    }
}

impl ServiceConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let mut cfg = Self::default();
        if let Some(ws) = lookup(ENV_WORKSPACE).filter(|s| !s.trim().is_empty()) {
            cfg.workspace = Some(PathBuf::from(ws.trim()));
        }
        if let Some(raw) = lookup(ENV_MAX_UPLOAD_BYTES) {
            cfg.max_upload_bytes = parse_positive(ENV_MAX_UPLOAD_BYTES, &raw)?;
        }
        if let Some(raw) = lookup(ENV_MAX_ATTENDANCE_RECORDS) {
            let max = parse_positive(ENV_MAX_ATTENDANCE_RECORDS, &raw)?;
            if max > DEFAULT_MAX_ATTENDANCE_RECORDS as u64 {
                anyhow::bail!(
                    "{} must be at most {}",
                    ENV_MAX_ATTENDANCE_RECORDS,
                    DEFAULT_MAX_ATTENDANCE_RECORDS
                );
            }
            cfg.max_attendance_records = max as usize;
        }
        Ok(cfg)
    }
}

fn parse_positive(key: &str, raw: &str) -> anyhow::Result<u64> {
    let v: u64 = raw
        .trim()
        .parse()
        .with_context(|| format!("{} must be a positive integer, got {:?}", key, raw))?;
    if v == 0 {
        anyhow::bail!("{} must be greater than zero", key);
    }
    Ok(v)
}
