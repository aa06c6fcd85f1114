use std::env;
use std::time::Duration;

use dotart_contracts::backends::BackendRegistry;

const DEFAULT_REGION: &str = "us-east-1";
const DEFAULT_TIMEOUT_S: f64 = 60.0;

/// Process-wide provider configuration. Built once at startup and shared
/// read-only by every adapter.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub region: String,
    pub runtime_api_base: String,
    pub control_api_base: String,
    pub bearer_token: Option<String>,
    pub timeout: Duration,
    pub backend_order: Option<Vec<String>>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let region = read("BEDROCK_REGION").unwrap_or_else(|| DEFAULT_REGION.to_string());
        let runtime_api_base = read("BEDROCK_RUNTIME_API_BASE")
            .map(|value| value.trim_end_matches('/').to_string())
            .unwrap_or_else(|| format!("https://bedrock-runtime.{region}.amazonaws.com"));
        let control_api_base = read("BEDROCK_API_BASE")
            .map(|value| value.trim_end_matches('/').to_string())
            .unwrap_or_else(|| format!("https://bedrock.{region}.amazonaws.com"));
        let timeout_s = read("DOTART_BACKEND_TIMEOUT_S")
            .and_then(|value| value.parse::<f64>().ok())
            .filter(|value| value.is_finite())
            .unwrap_or(DEFAULT_TIMEOUT_S)
            .clamp(1.0, 600.0);
        let backend_order = read("DOTART_BACKENDS").map(|value| {
            value
                .split(',')
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(str::to_string)
                .collect::<Vec<String>>()
        });

        Self {
            region,
            runtime_api_base,
            control_api_base,
            bearer_token: read("AWS_BEARER_TOKEN_BEDROCK"),
            timeout: Duration::from_secs_f64(timeout_s),
            backend_order,
        }
    }

    /// The default chain, narrowed and reordered by `backend_order` when set.
    pub fn backend_registry(&self) -> BackendRegistry {
        let registry = BackendRegistry::default();
        let Some(order) = self.backend_order.as_ref() else {
            return registry;
        };
        let (reordered, unknown) = registry.reordered(order);
        for id in unknown {
            tracing::warn!(backend = %id, "ignoring unknown backend in DOTART_BACKENDS");
        }
        reordered
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use super::EngineConfig;

    fn config_from(pairs: &[(&str, &str)]) -> EngineConfig {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        EngineConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_target_us_east_1_without_credentials() {
        let config = config_from(&[]);
        assert_eq!(config.region, "us-east-1");
        assert_eq!(
            config.runtime_api_base,
            "https://bedrock-runtime.us-east-1.amazonaws.com"
        );
        assert_eq!(config.control_api_base, "https://bedrock.us-east-1.amazonaws.com");
        assert!(config.bearer_token.is_none());
        assert_eq!(config.timeout, Duration::from_secs(60));
        assert_eq!(config.backend_registry().len(), 3);
    }

    #[test]
    fn region_and_overrides_are_trimmed() {
        let config = config_from(&[
            ("BEDROCK_REGION", " eu-west-1 "),
            ("BEDROCK_RUNTIME_API_BASE", "http://localhost:9000/"),
            ("AWS_BEARER_TOKEN_BEDROCK", "  "),
            ("DOTART_BACKEND_TIMEOUT_S", "0.1"),
        ]);
        assert_eq!(config.region, "eu-west-1");
        assert_eq!(config.runtime_api_base, "http://localhost:9000");
        assert_eq!(config.control_api_base, "https://bedrock.eu-west-1.amazonaws.com");
        assert!(config.bearer_token.is_none());
        assert_eq!(config.timeout, Duration::from_secs(1));
    }

    #[test]
    fn backend_order_override_narrows_the_chain() {
        let config = config_from(&[(
            "DOTART_BACKENDS",
            "amazon.titan-image-generator-v1, nope",
        )]);
        assert_eq!(
            config.backend_registry().ids(),
            vec!["amazon.titan-image-generator-v1".to_string()]
        );
    }
}
