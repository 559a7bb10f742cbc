//! Configuration validation
//!
//! Validates configuration and reports issues.

use super::types::Config;

/// Result of configuration validation
#[derive(Debug, Clone)]
pub struct ConfigValidationResult {
    /// Whether the config is valid
    pub valid: bool,
    /// Validation errors (critical)
    pub errors: Vec<ValidationIssue>,
    /// Validation warnings (non-critical)
    pub warnings: Vec<ValidationIssue>,
}

impl ConfigValidationResult {
    /// Create a valid result
    pub fn valid() -> Self {
        ConfigValidationResult {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Add an error
    pub fn with_error(mut self, issue: ValidationIssue) -> Self {
        self.valid = false;
        self.errors.push(issue);
        self
    }

    /// Add a warning
    pub fn with_warning(mut self, issue: ValidationIssue) -> Self {
        self.warnings.push(issue);
        self
    }
}

/// A validation issue
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    /// Path to the config field
    pub path: String,
    /// Issue message
    pub message: String,
    /// Suggested fix
    pub suggestion: Option<String>,
}

impl ValidationIssue {
    /// Create a new issue
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        ValidationIssue {
            path: path.into(),
            message: message.into(),
            suggestion: None,
        }
    }

    /// Add a suggestion
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}

/// Validate the configuration
pub fn validate_config(config: &Config) -> ConfigValidationResult {
    let mut result = ConfigValidationResult::valid();

    // Validate gateway configuration
    result = validate_gateway_config(config, result);

    // Validate dashboard configuration
    result = validate_dashboard_config(config, result);

    result
}

fn validate_gateway_config(config: &Config, mut result: ConfigValidationResult) -> ConfigValidationResult {
    match url::Url::parse(&config.gateway.url) {
        Ok(parsed) => {
            if parsed.scheme() != "ws" && parsed.scheme() != "wss" {
                result = result.with_error(
                    ValidationIssue::new(
                        "gateway.url",
                        format!("Gateway URL must use ws:// or wss://, got {}://", parsed.scheme()),
                    )
                    .with_suggestion("Set CLAWDBOT_GATEWAY_URL to a WebSocket endpoint like ws://127.0.0.1:18789"),
                );
            }
        }
        Err(e) => {
            result = result.with_error(
                ValidationIssue::new("gateway.url", format!("Invalid gateway URL: {}", e))
                    .with_suggestion("Set CLAWDBOT_GATEWAY_URL to a WebSocket endpoint like ws://127.0.0.1:18789"),
            );
        }
    }

    if !config.gateway.has_token() {
        result = result.with_warning(
            ValidationIssue::new(
                "gateway.token",
                "No gateway token configured. The gateway will reject operator calls unless it accepts anonymous local clients.",
            )
            .with_suggestion("Set the CLAWDBOT_GATEWAY_TOKEN environment variable"),
        );
    }

    for (path, timeout) in [
        ("gateway.status_timeout", config.gateway.status_timeout),
        ("gateway.history_timeout", config.gateway.history_timeout),
        ("gateway.send_timeout", config.gateway.send_timeout),
    ] {
        if timeout.is_zero() {
            result = result.with_error(
                ValidationIssue::new(path, "Timeout must be greater than zero")
                    .with_suggestion("Use a duration like \"8s\""),
            );
        }
    }

    result
}

fn validate_dashboard_config(config: &Config, mut result: ConfigValidationResult) -> ConfigValidationResult {
    if config.dashboard.port == 0 {
        result = result.with_warning(
            ValidationIssue::new("dashboard.port", "Port 0 binds an ephemeral port")
                .with_suggestion("Set dashboard.port to a fixed port like 3000"),
        );
    }

    result
}
