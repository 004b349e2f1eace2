//! Small utility helpers used across modules.

/// First 8 characters of a task id, for log lines.
/// Task ids are UUIDv4 strings, but don't assume that here.
pub fn short_id(id: &str) -> &str {
  id.get(..8).unwrap_or(id)
}

/// Round to one decimal place. Used for spent-time accounting.
pub fn round1(v: f64) -> f64 {
  (v * 10.0).round() / 10.0
}

/// Constant-time string comparison for key checks.
pub fn ct_eq(a: &str, b: &str) -> bool {
  let (a, b) = (a.as_bytes(), b.as_bytes());
  if a.len() != b.len() {
    return false;
  }
  a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Log-safe truncation for large strings.
/// Avoids spamming logs with huge request/response payloads.
pub fn trunc_for_log(s: &str, max: usize) -> String {
  if s.len() <= max {
    s.to_string()
  } else {
    format!("{}... ({} bytes total)", &s[..max], s.len())
  }
}
