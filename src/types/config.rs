//! Provider configuration record

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer};

use super::{CompletionOptions, ProviderKind};

/// Configuration for one backend, supplied by the configuration collaborator.
///
/// The core only reads this record; it is never written back.
#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    /// Backend family
    pub kind: ProviderKind,
    /// API key for hosted backends
    #[serde(default, alias = "apiKey", deserialize_with = "deserialize_secret")]
    pub credential: Option<SecretString>,
    /// Base URL; required for generic local servers, optional elsewhere
    #[serde(default, alias = "baseUrl", alias = "url")]
    pub endpoint: Option<String>,
    /// Model identifier
    #[serde(default)]
    pub model: Option<String>,
    /// Options applied when a request leaves them unset
    #[serde(default)]
    pub request_defaults: CompletionOptions,
}

impl ProviderConfig {
    /// Create an empty configuration for a backend.
    pub fn new(kind: ProviderKind) -> Self {
        Self {
            kind,
            credential: None,
            endpoint: None,
            model: None,
            request_defaults: CompletionOptions::default(),
        }
    }

    pub fn with_credential(mut self, credential: impl Into<String>) -> Self {
        self.credential = Some(SecretString::from(credential.into()));
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_request_defaults(mut self, defaults: CompletionOptions) -> Self {
        self.request_defaults = defaults;
        self
    }

    /// Whether any credential text is present.
    pub fn has_credential(&self) -> bool {
        self.credential
            .as_ref()
            .is_some_and(|c| !c.expose_secret().is_empty())
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("kind", &self.kind)
            .field("has_credential", &self.has_credential())
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("request_defaults", &self.request_defaults)
            .finish()
    }
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.map(SecretString::from))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_collaborator_record() {
        let config: ProviderConfig = serde_json::from_str(
            r#"{
                "kind": "anthropic",
                "apiKey": "sk-ant-test",
                "model": "claude-3-5-haiku-latest",
                "requestDefaults": { "maxTokens": 1024 }
            }"#,
        )
        .unwrap();

        assert_eq!(config.kind, ProviderKind::Anthropic);
        assert!(config.has_credential());
        assert_eq!(config.request_defaults.max_tokens, Some(1024));
        assert_eq!(config.endpoint, None);
    }

    #[test]
    fn debug_output_redacts_credential() {
        let config = ProviderConfig::new(ProviderKind::OpenAi).with_credential("sk-secret-value");
        let printed = format!("{config:?}");
        assert!(!printed.contains("sk-secret-value"));
        assert!(printed.contains("has_credential: true"));
    }
}
