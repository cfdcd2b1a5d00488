use std::fmt;

/// Identifies a validation level in the pipeline.
#[cfg_attr(
    feature = "with-serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "lowercase")
)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckLevel {
    Syntax,
    Dns,
    Domain,
    Smtp,
}

impl fmt::Display for CheckLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Syntax => f.write_str("syntax"),
            Self::Dns => f.write_str("dns"),
            Self::Domain => f.write_str("domain"),
            Self::Smtp => f.write_str("smtp"),
        }
    }
}

/// Outcome of a single validation level.
///
/// `mx_host`, `smtp_code` and `suggestion` are only meaningful for the
/// levels that produce them and are omitted from the serialised form when
/// absent.
#[cfg_attr(
    feature = "with-serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "camelCase")
)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckResult {
    pub level: CheckLevel,
    pub passed: bool,
    #[cfg_attr(
        feature = "with-serde",
        serde(default, skip_serializing_if = "String::is_empty")
    )]
    pub details: String,
    #[cfg_attr(
        feature = "with-serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub mx_host: Option<String>,
    #[cfg_attr(
        feature = "with-serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub smtp_code: Option<u16>,
    #[cfg_attr(
        feature = "with-serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub suggestion: Option<String>,
}

impl CheckResult {
    pub(crate) fn pass(level: CheckLevel, details: impl Into<String>) -> Self {
        Self {
            level,
            passed: true,
            details: details.into(),
            mx_host: None,
            smtp_code: None,
            suggestion: None,
        }
    }

    pub(crate) fn fail(level: CheckLevel, details: impl Into<String>) -> Self {
        Self {
            passed: false,
            ..Self::pass(level, details)
        }
    }

    pub(crate) fn with_mx_host(mut self, host: impl Into<String>) -> Self {
        self.mx_host = Some(host.into());
        self
    }

    pub(crate) fn with_smtp_code(mut self, code: u16) -> Self {
        self.smtp_code = Some(code);
        self
    }

    pub(crate) fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}

/// Full outcome of validating one address. `valid` is true only when every
/// executed check passed.
#[cfg_attr(
    feature = "with-serde",
    derive(serde::Serialize, serde::Deserialize)
)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    pub email: String,
    pub valid: bool,
    pub checks: Vec<CheckResult>,
}

impl ValidationResult {
    /// The checks that did not pass.
    pub fn failed_checks(&self) -> Vec<&CheckResult> {
        self.checks.iter().filter(|check| !check.passed).collect()
    }

    /// The result for the given level, if that level was executed.
    pub fn check_for(&self, level: CheckLevel) -> Option<&CheckResult> {
        self.checks.iter().find(|check| check.level == level)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_checks_filters_passed() {
        let result = ValidationResult {
            email: "user@example.com".to_string(),
            valid: false,
            checks: vec![
                CheckResult::pass(CheckLevel::Syntax, "syntax ok"),
                CheckResult::fail(CheckLevel::Dns, "no MX records found"),
            ],
        };
        let failed = result.failed_checks();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].level, CheckLevel::Dns);
    }

    #[test]
    fn check_for_reports_missing_levels() {
        let result = ValidationResult {
            email: "user@example.com".to_string(),
            valid: true,
            checks: vec![CheckResult::pass(CheckLevel::Syntax, "syntax ok")],
        };
        assert!(result.check_for(CheckLevel::Syntax).is_some());
        assert!(result.check_for(CheckLevel::Smtp).is_none());
    }

    #[cfg(feature = "with-serde")]
    #[test]
    fn serialises_with_camel_case_and_optional_fields() {
        let result = ValidationResult {
            email: "user@example.com".to_string(),
            valid: true,
            checks: vec![
                CheckResult::pass(CheckLevel::Smtp, "RCPT TO accepted")
                    .with_mx_host("mx1.example.com")
                    .with_smtp_code(250),
            ],
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["valid"], true);
        assert_eq!(json["checks"][0]["level"], "smtp");
        assert_eq!(json["checks"][0]["mxHost"], "mx1.example.com");
        assert_eq!(json["checks"][0]["smtpCode"], 250);
        assert!(json["checks"][0].get("suggestion").is_none());
    }
}
