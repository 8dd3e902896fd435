//! Configuration loading and provider factory.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use memoriva_core::traits::LlmProvider;
use memoriva_core::{QueueConfig, SelectionConfig};

use crate::openai::{OpenAiCompatibleProvider, DEEPSEEK_DEFAULT_MODEL, OPENAI_DEFAULT_MODEL};

/// Configuration for a single LLM provider.
///
/// Note: Custom Debug impl masks API keys to prevent accidental exposure in logs.
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProviderConfig {
    DeepSeek {
        api_key: String,
        #[serde(default)]
        base_url: Option<String>,
        #[serde(default)]
        model: Option<String>,
    },
    OpenAI {
        api_key: String,
        #[serde(default)]
        base_url: Option<String>,
        #[serde(default)]
        model: Option<String>,
    },
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (name, base_url, model) = match self {
            ProviderConfig::DeepSeek {
                base_url, model, ..
            } => ("DeepSeek", base_url, model),
            ProviderConfig::OpenAI {
                base_url, model, ..
            } => ("OpenAI", base_url, model),
        };
        f.debug_struct(name)
            .field("api_key", &"***")
            .field("base_url", base_url)
            .field("model", model)
            .finish()
    }
}

impl ProviderConfig {
    pub fn api_key(&self) -> &str {
        match self {
            ProviderConfig::DeepSeek { api_key, .. } | ProviderConfig::OpenAI { api_key, .. } => {
                api_key
            }
        }
    }

    /// Model to request: the configured one, or the provider's default.
    pub fn model(&self) -> String {
        match self {
            ProviderConfig::DeepSeek { model, .. } => model
                .clone()
                .unwrap_or_else(|| DEEPSEEK_DEFAULT_MODEL.to_string()),
            ProviderConfig::OpenAI { model, .. } => model
                .clone()
                .unwrap_or_else(|| OPENAI_DEFAULT_MODEL.to_string()),
        }
    }

    fn with_api_key(self, key: String) -> Self {
        match self {
            ProviderConfig::DeepSeek {
                base_url, model, ..
            } => ProviderConfig::DeepSeek {
                api_key: key,
                base_url,
                model,
            },
            ProviderConfig::OpenAI {
                base_url, model, ..
            } => ProviderConfig::OpenAI {
                api_key: key,
                base_url,
                model,
            },
        }
    }
}

/// Prompt and sampling settings for the model selection path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionSettings {
    /// Cards rendered into the prompt.
    #[serde(default = "default_prompt_card_limit")]
    pub prompt_card_limit: usize,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
}

impl Default for SelectionSettings {
    fn default() -> Self {
        Self {
            prompt_card_limit: default_prompt_card_limit(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
        }
    }
}

/// Top-level memoriva configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemorivaConfig {
    /// Provider configurations keyed by name.
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
    /// Provider tried first when resolving the selection model.
    #[serde(default = "default_provider")]
    pub default_provider: String,
    /// Session workers started by the queue.
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Jobs the queue buffers before rejecting submissions.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default)]
    pub selection: SelectionSettings,
}

fn default_provider() -> String {
    "deepseek".to_string()
}
fn default_workers() -> usize {
    memoriva_core::queue::DEFAULT_WORKERS
}
fn default_queue_capacity() -> usize {
    memoriva_core::queue::DEFAULT_CAPACITY
}
fn default_prompt_card_limit() -> usize {
    50
}
fn default_max_tokens() -> u32 {
    1000
}
fn default_temperature() -> f64 {
    0.3
}

impl Default for MemorivaConfig {
    fn default() -> Self {
        Self {
            providers: HashMap::new(),
            default_provider: default_provider(),
            workers: default_workers(),
            queue_capacity: default_queue_capacity(),
            selection: SelectionSettings::default(),
        }
    }
}

impl MemorivaConfig {
    pub fn queue_config(&self) -> QueueConfig {
        QueueConfig {
            workers: self.workers,
            capacity: self.queue_capacity,
        }
    }

    /// Selection settings paired with the model of the resolved provider.
    pub fn selection_config(&self, model: &str) -> SelectionConfig {
        SelectionConfig {
            model: model.to_string(),
            prompt_card_limit: self.selection.prompt_card_limit,
            max_tokens: self.selection.max_tokens,
            temperature: self.selection.temperature,
        }
    }
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
fn resolve_env_vars(s: &str) -> String {
    let mut result = s.to_string();
    while let Some(start) = result.find("${") {
        if let Some(end) = result[start..].find('}') {
            let var_name = &result[start + 2..start + end];
            let value = std::env::var(var_name).unwrap_or_default();
            result = format!(
                "{}{}{}",
                &result[..start],
                value,
                &result[start + end + 1..]
            );
        } else {
            break;
        }
    }
    result
}

fn resolve_provider_config(config: &ProviderConfig) -> ProviderConfig {
    match config {
        ProviderConfig::DeepSeek {
            api_key,
            base_url,
            model,
        } => ProviderConfig::DeepSeek {
            api_key: resolve_env_vars(api_key),
            base_url: base_url.as_deref().map(resolve_env_vars),
            model: model.as_deref().map(resolve_env_vars),
        },
        ProviderConfig::OpenAI {
            api_key,
            base_url,
            model,
        } => ProviderConfig::OpenAI {
            api_key: resolve_env_vars(api_key),
            base_url: base_url.as_deref().map(resolve_env_vars),
            model: model.as_deref().map(resolve_env_vars),
        },
    }
}

/// Load config from an explicit path, or search the default locations.
///
/// Search order without a path:
/// 1. `memoriva.toml` in the current directory
/// 2. `~/.config/memoriva/config.toml`
///
/// Environment variable overrides: `DEEPSEEK_API_KEY`, `OPENAI_API_KEY`.
pub fn load_config_from(path: Option<&Path>) -> Result<MemorivaConfig> {
    let config_path = if let Some(p) = path {
        if p.exists() {
            Some(p.to_path_buf())
        } else {
            anyhow::bail!("config file not found: {}", p.display());
        }
    } else {
        let local = PathBuf::from("memoriva.toml");
        if local.exists() {
            Some(local)
        } else {
            dirs_path()
                .map(|home| home.join("config.toml"))
                .filter(|global| global.exists())
        }
    };

    let config = match config_path {
        Some(path) => {
            debug!(path = %path.display(), "loading config");
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            toml::from_str::<MemorivaConfig>(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?
        }
        None => MemorivaConfig::default(),
    };

    let mut config = apply_env_overrides(config, |name| std::env::var(name).ok());

    let resolved: HashMap<String, ProviderConfig> = config
        .providers
        .iter()
        .map(|(k, v)| (k.clone(), resolve_provider_config(v)))
        .collect();
    config.providers = resolved;

    Ok(config)
}

/// Inject or re-key providers from `DEEPSEEK_API_KEY` / `OPENAI_API_KEY`.
fn apply_env_overrides(
    mut config: MemorivaConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> MemorivaConfig {
    let overrides = [
        (
            "deepseek",
            "DEEPSEEK_API_KEY",
            ProviderConfig::DeepSeek {
                api_key: String::new(),
                base_url: None,
                model: None,
            },
        ),
        (
            "openai",
            "OPENAI_API_KEY",
            ProviderConfig::OpenAI {
                api_key: String::new(),
                base_url: None,
                model: None,
            },
        ),
    ];

    for (name, var, empty) in overrides {
        let Some(key) = lookup(var).filter(|k| !k.is_empty()) else {
            continue;
        };
        let current = config.providers.remove(name).unwrap_or(empty);
        config
            .providers
            .insert(name.to_string(), current.with_api_key(key));
    }
    config
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("memoriva"))
}

/// Create a provider instance from its configuration.
pub fn create_provider(name: &str, config: &ProviderConfig) -> Result<Box<dyn LlmProvider>> {
    if config.api_key().is_empty() {
        anyhow::bail!("provider '{name}' has no API key");
    }
    match config {
        ProviderConfig::DeepSeek {
            api_key, base_url, ..
        } => Ok(Box::new(OpenAiCompatibleProvider::deepseek(
            api_key,
            base_url.clone(),
        ))),
        ProviderConfig::OpenAI {
            api_key, base_url, ..
        } => Ok(Box::new(OpenAiCompatibleProvider::openai(
            api_key,
            base_url.clone(),
        ))),
    }
}

/// Pick the provider used for model-guided selection.
///
/// Tries `default_provider`, then `deepseek`, then `openai`, skipping entries
/// without an API key. Returns the provider with the model it should be asked
/// for, or `None` when no provider is usable.
pub fn resolve_provider(
    config: &MemorivaConfig,
) -> Result<Option<(Arc<dyn LlmProvider>, String)>> {
    let candidates = [config.default_provider.as_str(), "deepseek", "openai"];
    for name in candidates {
        let Some(provider_config) = config.providers.get(name) else {
            continue;
        };
        if provider_config.api_key().is_empty() {
            debug!(provider = name, "skipping provider without API key");
            continue;
        }
        let provider = create_provider(name, provider_config)?;
        let model = provider_config.model();
        info!(provider = name, model = %model, "using language model for card selection");
        return Ok(Some((Arc::from(provider), model)));
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn resolve_env_vars_basic() {
        std::env::set_var("_MEMORIVA_TEST_VAR", "hello");
        assert_eq!(resolve_env_vars("${_MEMORIVA_TEST_VAR}"), "hello");
        assert_eq!(
            resolve_env_vars("prefix_${_MEMORIVA_TEST_VAR}_suffix"),
            "prefix_hello_suffix"
        );
        assert_eq!(resolve_env_vars("${unterminated"), "${unterminated");
        std::env::remove_var("_MEMORIVA_TEST_VAR");
    }

    #[test]
    fn default_config() {
        let config = MemorivaConfig::default();
        assert_eq!(config.default_provider, "deepseek");
        assert_eq!(config.workers, 3);
        assert_eq!(config.queue_capacity, 100);
        assert_eq!(config.selection.prompt_card_limit, 50);
        assert_eq!(config.selection.max_tokens, 1000);
        assert!((config.selection.temperature - 0.3).abs() < f64::EPSILON);

        let queue = config.queue_config();
        assert_eq!(queue.workers, 3);
        assert_eq!(queue.capacity, 100);
    }

    #[test]
    fn parse_provider_config() {
        let toml_str = r#"
default_provider = "openai"
workers = 5

[selection]
prompt_card_limit = 20

[providers.deepseek]
type = "deepseek"
api_key = "sk-deep"

[providers.openai]
type = "openai"
api_key = "sk-openai"
model = "gpt-4o-mini"
"#;
        let config: MemorivaConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.providers.len(), 2);
        assert_eq!(config.workers, 5);
        assert_eq!(config.queue_capacity, 100);
        assert_eq!(config.selection.prompt_card_limit, 20);
        assert_eq!(config.selection.max_tokens, 1000);
        assert!(matches!(
            config.providers.get("deepseek"),
            Some(ProviderConfig::DeepSeek { .. })
        ));
        assert_eq!(config.providers["deepseek"].model(), "deepseek-chat");
        assert_eq!(config.providers["openai"].model(), "gpt-4o-mini");

        let selection = config.selection_config("gpt-4o-mini");
        assert_eq!(selection.model, "gpt-4o-mini");
        assert_eq!(selection.prompt_card_limit, 20);
    }

    #[test]
    fn debug_masks_api_key() {
        let config = ProviderConfig::OpenAI {
            api_key: "sk-secret".into(),
            base_url: None,
            model: None,
        };
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("sk-secret"));
        assert!(rendered.contains("***"));
    }

    #[test]
    fn load_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memoriva.toml");
        std::fs::write(&path, "workers = 7\nqueue_capacity = 10\n").unwrap();

        let config = load_config_from(Some(&path)).unwrap();
        assert_eq!(config.workers, 7);
        assert_eq!(config.queue_capacity, 10);

        let missing = dir.path().join("nope.toml");
        let err = load_config_from(Some(&missing)).unwrap_err();
        assert!(err.to_string().contains("config file not found"));
    }

    #[test]
    fn load_reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "workers = \"many\"").unwrap();

        let err = load_config_from(Some(&path)).unwrap_err();
        assert!(format!("{err:#}").contains("failed to parse config"));
    }

    #[test]
    fn env_overrides_inject_and_rekey() {
        let mut config = MemorivaConfig::default();
        config.providers.insert(
            "openai".into(),
            ProviderConfig::OpenAI {
                api_key: "from-file".into(),
                base_url: Some("http://localhost:9999".into()),
                model: Some("gpt-4o".into()),
            },
        );

        let config = apply_env_overrides(config, |name| match name {
            "DEEPSEEK_API_KEY" => Some("deep-env".into()),
            "OPENAI_API_KEY" => Some("openai-env".into()),
            _ => None,
        });

        assert_eq!(config.providers["deepseek"].api_key(), "deep-env");
        assert_eq!(config.providers["openai"].api_key(), "openai-env");
        match &config.providers["openai"] {
            ProviderConfig::OpenAI { base_url, model, .. } => {
                assert_eq!(base_url.as_deref(), Some("http://localhost:9999"));
                assert_eq!(model.as_deref(), Some("gpt-4o"));
            }
            other => panic!("unexpected provider {other:?}"),
        }
    }

    #[test]
    fn empty_env_values_are_ignored() {
        let config = apply_env_overrides(MemorivaConfig::default(), |_| Some(String::new()));
        assert!(config.providers.is_empty());
        let config = apply_env_overrides(MemorivaConfig::default(), no_env);
        assert!(config.providers.is_empty());
    }

    #[test]
    fn resolve_provider_order() {
        let mut config = MemorivaConfig::default();
        assert!(resolve_provider(&config).unwrap().is_none());

        config.providers.insert(
            "openai".into(),
            ProviderConfig::OpenAI {
                api_key: "sk-openai".into(),
                base_url: None,
                model: None,
            },
        );
        let (provider, model) = resolve_provider(&config).unwrap().unwrap();
        assert_eq!(provider.name(), "openai");
        assert_eq!(model, "gpt-3.5-turbo");

        // A keyless deepseek entry is skipped.
        config.providers.insert(
            "deepseek".into(),
            ProviderConfig::DeepSeek {
                api_key: String::new(),
                base_url: None,
                model: None,
            },
        );
        let (provider, _) = resolve_provider(&config).unwrap().unwrap();
        assert_eq!(provider.name(), "openai");

        config.providers.insert(
            "deepseek".into(),
            ProviderConfig::DeepSeek {
                api_key: "sk-deep".into(),
                base_url: None,
                model: None,
            },
        );
        let (provider, model) = resolve_provider(&config).unwrap().unwrap();
        assert_eq!(provider.name(), "deepseek");
        assert_eq!(model, "deepseek-chat");

        config.default_provider = "openai".into();
        let (provider, _) = resolve_provider(&config).unwrap().unwrap();
        assert_eq!(provider.name(), "openai");
    }

    #[test]
    fn create_provider_requires_key() {
        let config = ProviderConfig::DeepSeek {
            api_key: String::new(),
            base_url: None,
            model: None,
        };
        assert!(create_provider("deepseek", &config).is_err());
    }
}
