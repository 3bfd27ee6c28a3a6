//! Output formatting for CLI

use serde::Serialize;

/// Serialize a value as pretty JSON for `--format json`
pub fn to_json<T: Serialize>(data: &T) -> String {
    serde_json::to_string_pretty(data).unwrap_or_else(|_| "{}".to_string())
}
