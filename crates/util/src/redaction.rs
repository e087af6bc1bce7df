//! Redaction of secrets before they reach logs or the terminal.
//!
//! Two layers are applied:
//!
//! - pattern-based scrubbing of free text (authorization headers, `*_KEY=...`
//!   assignments, well-known API key formats);
//! - field-based masking of model-provider configuration, driven by the static
//!   sensitive-field table in `otto_types::model_provider`.

use once_cell::sync::Lazy;
use otto_types::model_provider;
use regex::Regex;
use serde_json::{Map, Value};

/// Replacement used by [`redact_sensitive`].
pub const REDACTED: &str = "[REDACTED]";

const SENSITIVE_KEYWORDS: &[&str] = &[
    "ACCESS_KEY",
    "API_KEY",
    "API_TOKEN",
    "AUTH_TOKEN",
    "CLIENT_SECRET",
    "PASSWORD",
    "PRIVATE_KEY",
    "SECRET",
    "SECRET_ACCESS_KEY",
    "SESSION_TOKEN",
    "TOKEN",
];

static REDACT_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(build_redact_patterns);

fn build_redact_patterns() -> Vec<Regex> {
    let keywords = SENSITIVE_KEYWORDS
        .iter()
        .map(|keyword| keyword.split('_').map(regex::escape).collect::<Vec<_>>().join("[_\\-]?"))
        .collect::<Vec<_>>()
        .join("|");

    let patterns = [
        // Provider key formats: OpenAI, Anthropic, Groq, Voyage.
        r"\b(sk-(?:ant-|proj-)?[A-Za-z0-9_\-]{16,})".to_string(),
        r"\b(gsk_[A-Za-z0-9]{20,})".to_string(),
        r"\b(pa-[A-Za-z0-9_\-]{20,})".to_string(),
        r"(?i)(authorization:\s+)([^\s]+(?:\s+[^\s]+)*)".to_string(),
        r"(?i)((?:^|\b)Bearer\s+)([A-Za-z0-9\-._~+/]+=*)".to_string(),
        format!(r"(?i)((?:export\s+)?[A-Za-z0-9_]*?(?:{keywords})[A-Za-z0-9_]*\s*=\s*)([^\s]+)"),
        format!("(?i)(\"[A-Za-z0-9_.-]*?(?:{keywords})[A-Za-z0-9_.-]*\"\\s*:\\s*\")([^\"]+)(\")"),
    ];

    patterns
        .iter()
        .filter_map(|pattern| match Regex::new(pattern) {
            Ok(regex) => Some(regex),
            Err(error) => {
                tracing::error!(%pattern, %error, "invalid redaction pattern");
                None
            }
        })
        .collect()
}

/// Redacts values that look like secrets in a string.
///
/// Key names are preserved so the output stays useful for debugging:
/// `OPENAI_API_KEY=abc` becomes `OPENAI_API_KEY=[REDACTED]`.
pub fn redact_sensitive(input: &str) -> String {
    redact_sensitive_with(input, REDACTED)
}

/// Redacts sensitive-looking values, using a custom replacement token.
pub fn redact_sensitive_with(input: &str, replacement: &str) -> String {
    let mut redacted = input.to_string();
    for pattern in REDACT_PATTERNS.iter() {
        redacted = pattern
            .replace_all(&redacted, |captures: &regex::Captures| {
                let prefix = captures.get(1).map(|m| m.as_str()).unwrap_or("");
                match captures.get(2) {
                    Some(_) => {
                        let suffix = captures.get(3).map(|m| m.as_str()).unwrap_or("");
                        format!("{prefix}{replacement}{suffix}")
                    }
                    None => replacement.to_string(),
                }
            })
            .into_owned();
    }
    redacted
}

/// Recursively redacts string values of a JSON document.
pub fn redact_json(value: &Value) -> Value {
    match value {
        Value::String(text) => Value::String(redact_sensitive(text)),
        Value::Array(items) => Value::Array(items.iter().map(redact_json).collect()),
        Value::Object(object) => Value::Object(object.iter().map(|(key, item)| (key.clone(), redact_json(item))).collect()),
        other => other.clone(),
    }
}

/// Mask model-provider configuration values flagged as sensitive.
///
/// Keys listed as sensitive are replaced with `mask`; keys listed as not
/// sensitive are kept verbatim; unknown keys fall back to pattern redaction.
pub fn mask_provider_config(config: &Map<String, Value>, mask: &str) -> Map<String, Value> {
    config
        .iter()
        .map(|(key, value)| {
            let masked = match model_provider::is_sensitive_field(key) {
                Some(true) => Value::String(mask.to_string()),
                Some(false) => value.clone(),
                None => redact_json(value),
            };
            (key.clone(), masked)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn redacts_shell_style_assignments() {
        assert_eq!(
            redact_sensitive("export OBOT_GROQ_MODEL_PROVIDER_API_KEY=abc123"),
            "export OBOT_GROQ_MODEL_PROVIDER_API_KEY=[REDACTED]"
        );
    }

    #[test]
    fn redacts_json_style_entries() {
        assert_eq!(redact_sensitive(r#"{"client_secret": "top"}"#), r#"{"client_secret": "[REDACTED]"}"#);
    }

    #[test]
    fn redacts_bearer_tokens_and_provider_keys() {
        assert_eq!(redact_sensitive("Bearer abc.def"), "Bearer [REDACTED]");
        assert_eq!(redact_sensitive("key sk-ant-0123456789abcdefXYZ"), "key [REDACTED]");
    }

    #[test]
    fn leaves_plain_text_alone() {
        assert_eq!(redact_sensitive("PORT=8080 name=nightly"), "PORT=8080 name=nightly");
    }

    #[test]
    fn redact_json_walks_nested_values() {
        let value = json!({"env": [{"value": "TOKEN=xyz"}], "count": 2});
        assert_eq!(redact_json(&value), json!({"env": [{"value": "TOKEN=[REDACTED]"}], "count": 2}));
    }

    #[test]
    fn provider_config_masks_by_table() {
        let config = json!({
            "OBOT_AZURE_OPENAI_MODEL_PROVIDER_CLIENT_SECRET": "s3cr3t",
            "OBOT_AZURE_OPENAI_MODEL_PROVIDER_TENANT_ID": "tenant",
            "EXTRA": "Bearer abc"
        });
        let masked = mask_provider_config(config.as_object().unwrap(), "****");

        assert_eq!(masked["OBOT_AZURE_OPENAI_MODEL_PROVIDER_CLIENT_SECRET"], json!("****"));
        assert_eq!(masked["OBOT_AZURE_OPENAI_MODEL_PROVIDER_TENANT_ID"], json!("tenant"));
        assert_eq!(masked["EXTRA"], json!("Bearer [REDACTED]"));
    }
}
