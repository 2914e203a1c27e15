//! The response envelope shared by every API endpoint.

use chrono::{SecondsFormat, Utc};
use serde::Serialize;

/// Fewest keywords an extraction is expected to return before a warning is attached.
pub const EXPECTED_MINIMUM_KEYWORDS: usize = 12;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ErrorDetail {
    pub has_error: bool,
    pub code: String,
    pub message: String,
    pub details: String,
}

impl ErrorDetail {
    pub fn new(code: &str, message: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            has_error: true,
            code: code.to_string(),
            message: message.into(),
            details: details.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WarningInfo {
    pub has_warning: bool,
    pub message: String,
    pub expected_minimum: usize,
    pub actual_extracted: usize,
    pub suggestion: String,
}

impl Default for WarningInfo {
    fn default() -> Self {
        Self {
            has_warning: false,
            message: String::new(),
            expected_minimum: EXPECTED_MINIMUM_KEYWORDS,
            actual_extracted: 0,
            suggestion: String::new(),
        }
    }
}

impl WarningInfo {
    pub fn new(message: impl Into<String>, actual_extracted: usize, suggestion: impl Into<String>) -> Self {
        Self {
            has_warning: true,
            message: message.into(),
            actual_extracted,
            suggestion: suggestion.into(),
            ..Default::default()
        }
    }
}

/// `{success, data, error, warning, timestamp}`. `error` and `warning` are
/// always present; their `has_*` flag says whether they carry anything.
#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: T,
    pub error: ErrorDetail,
    pub warning: WarningInfo,
    pub timestamp: String,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data,
            error: ErrorDetail::default(),
            warning: WarningInfo::default(),
            timestamp: now(),
        }
    }

    pub fn failure(data: T, error: ErrorDetail) -> Self {
        Self {
            success: false,
            data,
            error,
            warning: WarningInfo::default(),
            timestamp: now(),
        }
    }

    pub fn with_warning(mut self, warning: WarningInfo) -> Self {
        self.warning = warning;
        self
    }
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_success_envelope_shape() {
        let value = serde_json::to_value(ApiResponse::success(json!({"x": 1}))).unwrap();
        assert_eq!(value["success"], true);
        assert_eq!(value["data"]["x"], 1);
        assert_eq!(value["error"]["has_error"], false);
        assert_eq!(value["error"]["code"], "");
        assert_eq!(value["warning"]["has_warning"], false);
        assert_eq!(value["warning"]["expected_minimum"], 12);
        assert!(value["timestamp"].as_str().unwrap().ends_with('Z'));
    }

    #[test]
    fn test_failure_envelope_keeps_data() {
        let response = ApiResponse::failure(
            json!({"gap_analysis": {}}),
            ErrorDetail::new("VALIDATION_ERROR", "resume is required", ""),
        );
        let value = serde_json::to_value(response).unwrap();
        assert_eq!(value["success"], false);
        assert!(value["data"]["gap_analysis"].is_object());
        assert_eq!(value["error"]["has_error"], true);
        assert_eq!(value["error"]["code"], "VALIDATION_ERROR");
    }

    #[test]
    fn test_warning_attached() {
        let response = ApiResponse::success(()).with_warning(WarningInfo::new("few", 7, "add detail"));
        assert!(response.warning.has_warning);
        assert_eq!(response.warning.actual_extracted, 7);
        assert_eq!(response.warning.expected_minimum, EXPECTED_MINIMUM_KEYWORDS);
    }
}
