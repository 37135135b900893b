use crate::ipc::error::HandlerErr;
use chrono::NaiveDate;

pub fn get_required_str(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| HandlerErr::new("bad_params", format!("missing {}", key)))
}

pub fn get_optional_str(params: &serde_json::Value, key: &str) -> Option<String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

pub fn get_required_id(params: &serde_json::Value, key: &str) -> Result<i64, HandlerErr> {
    let v = params.get(key);
    v.and_then(|v| v.as_i64())
        .or_else(|| v.and_then(|v| v.as_str()).and_then(|s| s.trim().parse().ok()))
        .filter(|id| *id > 0)
        .ok_or_else(|| HandlerErr::new("bad_params", format!("missing/invalid {}", key)))
}

pub fn get_limit(params: &serde_json::Value, default: usize, max: usize) -> usize {
    params
        .get("limit")
        .and_then(|v| v.as_u64())
        .map(|v| (v as usize).clamp(1, max))
        .unwrap_or(default)
}

pub fn get_required_date(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    let raw = get_required_str(params, key)?;
    NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
        .map(|d| d.format("%Y-%m-%d").to_string())
        .map_err(|_| HandlerErr::new("bad_params", format!("{} must be YYYY-MM-DD", key)))
}
