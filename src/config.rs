//! Read-only configuration sources
//!
//! The dispatcher looks up a [`ProviderConfig`] by key when a request does not
//! carry one inline. Keys are free-form; the environment store uses provider
//! kind names (`openai`, `ollama`, ...).

use std::collections::{BTreeMap, HashMap};

use crate::error::LlmError;
use crate::types::{ProviderConfig, ProviderKind};

/// Key-value source of provider configurations.
pub trait ConfigStore: Send + Sync {
    fn get(&self, key: &str) -> Option<ProviderConfig>;

    /// Every key with a configuration, sorted.
    fn keys(&self) -> Vec<String>;
}

/// In-memory store, typically loaded from the settings collaborator's JSON.
#[derive(Debug, Clone, Default)]
pub struct MemoryConfigStore {
    entries: BTreeMap<String, ProviderConfig>,
}

impl MemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a JSON object of `key -> ProviderConfig`.
    ///
    /// ```
    /// use llm_relay::config::{ConfigStore, MemoryConfigStore};
    ///
    /// let store = MemoryConfigStore::from_json(r#"{
    ///     "local": { "kind": "ollama", "endpoint": "http://localhost:11434", "model": "llama3.2" }
    /// }"#).unwrap();
    /// assert_eq!(store.keys(), vec!["local".to_string()]);
    /// ```
    pub fn from_json(text: &str) -> Result<Self, LlmError> {
        let entries: BTreeMap<String, ProviderConfig> = serde_json::from_str(text)
            .map_err(|e| LlmError::ConfigurationError(format!("Invalid configuration JSON: {e}")))?;
        Ok(Self { entries })
    }

    pub fn with_entry(mut self, key: impl Into<String>, config: ProviderConfig) -> Self {
        self.entries.insert(key.into(), config);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, config: ProviderConfig) {
        self.entries.insert(key.into(), config);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ConfigStore for MemoryConfigStore {
    fn get(&self, key: &str) -> Option<ProviderConfig> {
        self.entries.get(key).cloned()
    }

    fn keys(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }
}

impl<K: Into<String>> FromIterator<(K, ProviderConfig)> for MemoryConfigStore {
    fn from_iter<I: IntoIterator<Item = (K, ProviderConfig)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// Store built from environment variables, keyed by provider kind name.
///
/// | Kind | Variables |
/// |---|---|
/// | `openai` | `OPENAI_API_KEY`, `OPENAI_MODEL` |
/// | `anthropic` | `ANTHROPIC_API_KEY`, `ANTHROPIC_MODEL` |
/// | `deepseek` | `DEEPSEEK_API_KEY`, `DEEPSEEK_MODEL` |
/// | `ollama` | `OLLAMA_HOST`, `OLLAMA_MODEL` |
/// | `lmstudio` | `LMSTUDIO_HOST`, `LMSTUDIO_MODEL` |
/// | `openai_compatible` | `OPENAI_COMPATIBLE_URL`, `OPENAI_COMPATIBLE_API_KEY`, `OPENAI_COMPATIBLE_MODEL` |
#[derive(Debug, Clone, Default)]
pub struct EnvConfigStore {
    inner: MemoryConfigStore,
}

struct EnvSpec {
    kind: ProviderKind,
    prefix: &'static str,
    credential: Option<&'static str>,
    endpoint: Option<&'static str>,
}

const ENV_SPECS: &[EnvSpec] = &[
    EnvSpec {
        kind: ProviderKind::OpenAi,
        prefix: "OPENAI",
        credential: Some("OPENAI_API_KEY"),
        endpoint: None,
    },
    EnvSpec {
        kind: ProviderKind::Anthropic,
        prefix: "ANTHROPIC",
        credential: Some("ANTHROPIC_API_KEY"),
        endpoint: None,
    },
    EnvSpec {
        kind: ProviderKind::DeepSeek,
        prefix: "DEEPSEEK",
        credential: Some("DEEPSEEK_API_KEY"),
        endpoint: None,
    },
    EnvSpec {
        kind: ProviderKind::Ollama,
        prefix: "OLLAMA",
        credential: None,
        endpoint: Some("OLLAMA_HOST"),
    },
    EnvSpec {
        kind: ProviderKind::LmStudio,
        prefix: "LMSTUDIO",
        credential: None,
        endpoint: Some("LMSTUDIO_HOST"),
    },
    EnvSpec {
        kind: ProviderKind::OpenAiCompatible,
        prefix: "OPENAI_COMPATIBLE",
        credential: Some("OPENAI_COMPATIBLE_API_KEY"),
        endpoint: Some("OPENAI_COMPATIBLE_URL"),
    },
];

impl EnvConfigStore {
    /// Read the process environment.
    pub fn from_env() -> Self {
        Self::from_vars(std::env::vars())
    }

    /// Build from an explicit set of variables.
    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let vars: HashMap<String, String> = vars
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .filter(|(_, v)| !v.trim().is_empty())
            .collect();

        let mut inner = MemoryConfigStore::new();
        for spec in ENV_SPECS {
            let credential = spec.credential.and_then(|name| vars.get(name));
            let endpoint = spec.endpoint.and_then(|name| vars.get(name));
            let model = vars.get(&format!("{}_MODEL", spec.prefix));
            if credential.is_none() && endpoint.is_none() && model.is_none() {
                continue;
            }

            let mut config = ProviderConfig::new(spec.kind);
            if let Some(credential) = credential {
                config = config.with_credential(credential.trim());
            }
            match (endpoint, spec.kind.conventional_endpoint()) {
                (Some(endpoint), _) => config = config.with_endpoint(normalize_host(endpoint)),
                (None, Some(fallback)) => config = config.with_endpoint(fallback),
                (None, None) => {}
            }
            if let Some(model) = model {
                config = config.with_model(model.trim());
            }
            tracing::debug!(provider = %spec.kind, "loaded provider configuration from environment");
            inner.insert(spec.kind.as_str(), config);
        }
        Self { inner }
    }
}

impl ConfigStore for EnvConfigStore {
    fn get(&self, key: &str) -> Option<ProviderConfig> {
        self.inner.get(key)
    }

    fn keys(&self) -> Vec<String> {
        self.inner.keys()
    }
}

// OLLAMA_HOST is commonly given as `host:port` without a scheme.
fn normalize_host(value: &str) -> String {
    let value = value.trim();
    if value.contains("://") {
        value.to_string()
    } else {
        format!("http://{value}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn memory_store_from_json() {
        let store = MemoryConfigStore::from_json(
            r#"{
                "work": { "kind": "openai", "apiKey": "sk-work", "model": "gpt-4o" },
                "home": { "kind": "lmstudio", "baseUrl": "http://10.0.0.2:1234/v1" }
            }"#,
        )
        .unwrap();
        assert_eq!(store.keys(), vec!["home".to_string(), "work".to_string()]);

        let work = store.get("work").unwrap();
        assert_eq!(work.kind, ProviderKind::OpenAi);
        assert_eq!(work.credential.unwrap().expose_secret(), "sk-work");
        assert_eq!(
            store.get("home").unwrap().endpoint.as_deref(),
            Some("http://10.0.0.2:1234/v1")
        );
        assert!(store.get("missing").is_none());
    }

    #[test]
    fn invalid_json_is_a_configuration_error() {
        assert!(matches!(
            MemoryConfigStore::from_json("[1, 2]"),
            Err(LlmError::ConfigurationError(_))
        ));
    }

    #[test]
    fn env_store_reads_known_variables() {
        let store = EnvConfigStore::from_vars([
            ("OPENAI_API_KEY", "sk-env"),
            ("OPENAI_MODEL", "gpt-4.1-mini"),
            ("OLLAMA_HOST", "127.0.0.1:11434"),
            ("ANTHROPIC_API_KEY", "   "),
            ("UNRELATED", "x"),
        ]);
        assert_eq!(store.keys(), vec!["ollama".to_string(), "openai".to_string()]);

        let openai = store.get("openai").unwrap();
        assert!(openai.has_credential());
        assert_eq!(openai.model.as_deref(), Some("gpt-4.1-mini"));

        let ollama = store.get("ollama").unwrap();
        assert_eq!(ollama.endpoint.as_deref(), Some("http://127.0.0.1:11434"));
        assert!(store.get("anthropic").is_none());
    }

    #[test]
    fn local_server_without_host_gets_its_conventional_address() {
        let store = EnvConfigStore::from_vars([("LMSTUDIO_MODEL", "qwen2.5-7b")]);
        assert_eq!(
            store.get("lmstudio").unwrap().endpoint.as_deref(),
            Some("http://localhost:1234/v1")
        );
    }

    #[test]
    fn unset_local_server_is_not_configured() {
        let store = EnvConfigStore::from_vars([("OPENAI_API_KEY", "sk-env")]);
        assert!(store.get("ollama").is_none());
        assert!(store.get("lmstudio").is_none());
    }

    #[test]
    fn compatible_server_model_does_not_leak_into_openai() {
        let store = EnvConfigStore::from_vars([
            ("OPENAI_COMPATIBLE_URL", "http://localhost:8080/v1"),
            ("OPENAI_COMPATIBLE_MODEL", "qwen2.5"),
        ]);
        assert!(store.get("openai").is_none());
        let compat = store.get("openai_compatible").unwrap();
        assert_eq!(compat.model.as_deref(), Some("qwen2.5"));
        assert!(!compat.has_credential());
    }
}
