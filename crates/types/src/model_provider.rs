//! Static metadata about the model providers known to the console.
//!
//! These tables are immutable and built once on first access. Lookups by an
//! unknown provider or field return `None`; the console then falls back to
//! rendering the raw configuration without hints.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// Model providers shipped with the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelProviderId {
    #[serde(rename = "ollama-model-provider")]
    Ollama,
    #[serde(rename = "groq-model-provider")]
    Groq,
    #[serde(rename = "voyage-model-provider")]
    Voyage,
    #[serde(rename = "anthropic-model-provider")]
    Anthropic,
    #[serde(rename = "openai-model-provider")]
    OpenAi,
    #[serde(rename = "azure-openai-model-provider")]
    AzureOpenAi,
    #[serde(rename = "anthropic-bedrock-model-provider")]
    AnthropicBedrock,
}

impl ModelProviderId {
    pub const ALL: [ModelProviderId; 7] = [
        Self::Ollama,
        Self::Groq,
        Self::Voyage,
        Self::Anthropic,
        Self::OpenAi,
        Self::AzureOpenAi,
        Self::AnthropicBedrock,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ollama => "ollama-model-provider",
            Self::Groq => "groq-model-provider",
            Self::Voyage => "voyage-model-provider",
            Self::Anthropic => "anthropic-model-provider",
            Self::OpenAi => "openai-model-provider",
            Self::AzureOpenAi => "azure-openai-model-provider",
            Self::AnthropicBedrock => "anthropic-bedrock-model-provider",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Ollama => "Ollama",
            Self::Groq => "Groq",
            Self::Voyage => "Voyage AI",
            Self::Anthropic => "Anthropic",
            Self::OpenAi => "OpenAI",
            Self::AzureOpenAi => "Azure OpenAI",
            Self::AnthropicBedrock => "Anthropic (Bedrock)",
        }
    }
}

impl fmt::Display for ModelProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for provider identifiers that are not part of the static table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownModelProvider(pub String);

impl fmt::Display for UnknownModelProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown model provider '{}'", self.0)
    }
}

impl std::error::Error for UnknownModelProvider {}

impl FromStr for ModelProviderId {
    type Err = UnknownModelProvider;

    /// Accepts the full identifier (`openai-model-provider`) or its short form (`openai`).
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|id| id.as_str() == normalized || id.as_str().strip_suffix("-model-provider") == Some(normalized.as_str()))
            .ok_or_else(|| UnknownModelProvider(value.to_string()))
    }
}

/// Everything the console knows about one provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelProviderInfo {
    pub id: ModelProviderId,
    /// Vendor homepage.
    pub link: &'static str,
    /// Documentation page for configuring the provider, when one exists.
    pub configuration_link: Option<&'static str>,
    pub recommended: bool,
    /// Help text for required configuration fields, keyed by field label in display order.
    pub required_field_tooltips: IndexMap<&'static str, &'static str>,
}

static PROVIDER_INFO: Lazy<HashMap<ModelProviderId, ModelProviderInfo>> = Lazy::new(build_provider_info);

static SENSITIVE_FIELDS: Lazy<HashMap<&'static str, bool>> = Lazy::new(|| {
    HashMap::from([
        ("OBOT_OPENAI_MODEL_PROVIDER_API_KEY", true),
        ("OBOT_AZURE_OPENAI_MODEL_PROVIDER_ENDPOINT", false),
        ("OBOT_AZURE_OPENAI_MODEL_PROVIDER_CLIENT_ID", false),
        ("OBOT_AZURE_OPENAI_MODEL_PROVIDER_CLIENT_SECRET", true),
        ("OBOT_AZURE_OPENAI_MODEL_PROVIDER_TENANT_ID", false),
        ("OBOT_AZURE_OPENAI_MODEL_PROVIDER_SUBSCRIPTION_ID", false),
        ("OBOT_AZURE_OPENAI_MODEL_PROVIDER_RESOURCE_GROUP", false),
        ("OBOT_ANTHROPIC_MODEL_PROVIDER_API_KEY", true),
        ("OBOT_VOYAGE_MODEL_PROVIDER_API_KEY", true),
        ("OBOT_OLLAMA_MODEL_PROVIDER_HOST", true),
        ("OBOT_GROQ_MODEL_PROVIDER_API_KEY", true),
        ("OBOT_ANTHROPIC_BEDROCK_MODEL_PROVIDER_ACCESS_KEY_ID", true),
        ("OBOT_ANTHROPIC_BEDROCK_MODEL_PROVIDER_SECRET_ACCESS_KEY", true),
        ("OBOT_ANTHROPIC_BEDROCK_MODEL_PROVIDER_SESSION_TOKEN", true),
        ("OBOT_ANTHROPIC_BEDROCK_MODEL_PROVIDER_REGION", false),
    ])
});

fn entry(
    id: ModelProviderId,
    link: &'static str,
    configuration_link: Option<&'static str>,
    tooltips: &[(&'static str, &'static str)],
) -> (ModelProviderId, ModelProviderInfo) {
    let info = ModelProviderInfo {
        id,
        link,
        configuration_link,
        recommended: matches!(id, ModelProviderId::OpenAi | ModelProviderId::AzureOpenAi),
        required_field_tooltips: tooltips.iter().copied().collect(),
    };
    (id, info)
}

fn build_provider_info() -> HashMap<ModelProviderId, ModelProviderInfo> {
    HashMap::from([
        entry(
            ModelProviderId::Ollama,
            "https://ollama.com/",
            None,
            &[("Host", "IP Address for the ollama server (eg. 127.0.0.1:1234)")],
        ),
        entry(
            ModelProviderId::Groq,
            "https://groq.com/",
            None,
            &[("Api Key", "Groq API Key. Can be created and fetched from https://console.groq.com/keys")],
        ),
        entry(ModelProviderId::Voyage, "https://www.voyageai.com/", None, &[]),
        entry(ModelProviderId::Anthropic, "https://www.anthropic.com", None, &[]),
        entry(ModelProviderId::OpenAi, "https://openai.com/", None, &[]),
        entry(
            ModelProviderId::AzureOpenAi,
            "https://azure.microsoft.com/en-us/explore/",
            Some("https://docs.otto8.ai/configuration/model-providers#azure-openai"),
            &[
                (
                    "Endpoint",
                    "Endpoint for the Azure OpenAI service (e.g. https://<resource-name>.<region>.api.cognitive.microsoft.com/)",
                ),
                (
                    "Client Id",
                    "Unique identifier for the application when using Azure Active Directory. Can typically be found in App Registrations > [application].",
                ),
                (
                    "Client Secret",
                    "Password or key that app uses to authenticate with Azure Active Directory. Can typically be found in App Registrations > [application] > Certificates & Secrets",
                ),
                (
                    "Tenant Id",
                    "Identifier of instance where the app and resources reside. Can typically be found in Azure Active Directory > Overview > Directory ID",
                ),
                (
                    "Subscription Id",
                    "Identifier of user's Azure subscription. Can typically be found in Azure Portal > Subscriptions > Overview.",
                ),
                (
                    "Resource Group",
                    "Container that holds related Azure resources. Can typically be found in Azure Portal > Resource Groups > [OpenAI Resource Group] > Overview",
                ),
            ],
        ),
        entry(
            ModelProviderId::AnthropicBedrock,
            "https://aws.amazon.com/bedrock/claude/",
            None,
            &[
                ("Access Key ID", "AWS Access Key ID"),
                ("Secret Access Key", "AWS Secret Access Key"),
                ("Session Token", "AWS Session Token"),
                (
                    "Region",
                    "AWS Region - make sure that the models you want to use are available in this region: https://docs.aws.amazon.com/bedrock/latest/userguide/models-regions.html",
                ),
            ],
        ),
    ])
}

/// Metadata for a known provider.
pub fn info(id: ModelProviderId) -> &'static ModelProviderInfo {
    // Every variant is inserted by `build_provider_info`.
    &PROVIDER_INFO[&id]
}

/// Metadata for a provider identified by its raw string id.
pub fn lookup(raw_id: &str) -> Option<&'static ModelProviderInfo> {
    raw_id.parse::<ModelProviderId>().ok().map(info)
}

/// Providers the console highlights during setup, in display order.
pub fn recommended() -> Vec<ModelProviderId> {
    ModelProviderId::ALL.into_iter().filter(|id| info(*id).recommended).collect()
}

/// Tooltip for a required configuration field of a provider.
pub fn required_tooltip(id: ModelProviderId, field_label: &str) -> Option<&'static str> {
    info(id).required_field_tooltips.get(field_label).copied()
}

/// Whether a provider configuration variable holds a secret.
///
/// `None` means the variable is not listed; callers decide how to treat it.
pub fn is_sensitive_field(env_name: &str) -> Option<bool> {
    SENSITIVE_FIELDS.get(env_name).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_provider_has_metadata() {
        for id in ModelProviderId::ALL {
            let info = info(id);
            assert_eq!(info.id, id);
            assert!(info.link.starts_with("https://"));
        }
    }

    #[test]
    fn parses_full_and_short_identifiers() {
        assert_eq!("openai-model-provider".parse::<ModelProviderId>(), Ok(ModelProviderId::OpenAi));
        assert_eq!("Azure-OpenAI".parse::<ModelProviderId>(), Ok(ModelProviderId::AzureOpenAi));
        assert!("mistral".parse::<ModelProviderId>().is_err());
    }

    #[test]
    fn recommended_providers_are_openai_and_azure() {
        assert_eq!(recommended(), vec![ModelProviderId::OpenAi, ModelProviderId::AzureOpenAi]);
    }

    #[test]
    fn only_azure_has_a_configuration_link() {
        let with_links: Vec<_> = ModelProviderId::ALL
            .into_iter()
            .filter(|id| info(*id).configuration_link.is_some())
            .collect();
        assert_eq!(with_links, vec![ModelProviderId::AzureOpenAi]);
    }

    #[test]
    fn tooltips_keep_display_order() {
        let labels: Vec<_> = info(ModelProviderId::AnthropicBedrock)
            .required_field_tooltips
            .keys()
            .copied()
            .collect();
        assert_eq!(labels, vec!["Access Key ID", "Secret Access Key", "Session Token", "Region"]);
        assert_eq!(required_tooltip(ModelProviderId::Ollama, "Host").map(|t| t.starts_with("IP Address")), Some(true));
        assert_eq!(required_tooltip(ModelProviderId::OpenAi, "Host"), None);
    }

    #[test]
    fn sensitive_field_flags() {
        assert_eq!(is_sensitive_field("OBOT_OPENAI_MODEL_PROVIDER_API_KEY"), Some(true));
        assert_eq!(is_sensitive_field("OBOT_ANTHROPIC_BEDROCK_MODEL_PROVIDER_REGION"), Some(false));
        assert_eq!(is_sensitive_field("SOMETHING_ELSE"), None);
    }

    #[test]
    fn serde_uses_platform_identifiers() {
        let value = serde_json::to_value(ModelProviderId::AnthropicBedrock).unwrap();
        assert_eq!(value, serde_json::json!("anthropic-bedrock-model-provider"));
    }
}
