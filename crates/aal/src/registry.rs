//! Provider registry.
//!
//! Constructs and holds all providers declared in the [`AalConfig`] manifest.
//! `class` selects from a compile-time match over constructor functions —
//! there is no dynamic class-loading in a statically compiled
//! implementation. A provider whose `auth_env` credential is absent is
//! disabled and skipped rather than treated as a startup failure (spec.md
//! §6).

use std::collections::HashMap;
use std::sync::Arc;

use archon_domain::config::{AalConfig, EnvResolver, ProviderManifestEntry};

use crate::echo::EchoProvider;
use crate::traits::Provider;

pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn Provider>>,
}

impl ProviderRegistry {
    /// Build the registry from the application's [`AalConfig`]. Entries
    /// with an unknown `class` or a missing `auth_env` credential are
    /// logged and skipped; the registry may end up empty without that being
    /// an error — the router surfaces `ServiceUnavailable` at request time
    /// instead (spec.md §4.8).
    pub fn from_config(config: &AalConfig) -> Self {
        let mut providers: HashMap<String, Arc<dyn Provider>> = HashMap::new();

        for entry in &config.providers {
            if let Some(env_var) = &entry.auth_env {
                if EnvResolver::lookup(env_var).is_none() {
                    tracing::warn!(class = %entry.class, env_var, "provider credential missing, disabling");
                    continue;
                }
            }

            match construct_provider(entry) {
                Some(provider) => {
                    tracing::info!(provider = %provider.name(), "registered AAL provider");
                    providers.insert(provider.name().to_string(), provider);
                }
                None => {
                    tracing::warn!(class = %entry.class, "unknown provider class in manifest, skipping");
                }
            }
        }

        Self { providers }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Provider>> {
        self.providers.get(name).cloned()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Provider>> {
        self.providers.values()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

fn construct_provider(entry: &ProviderManifestEntry) -> Option<Arc<dyn Provider>> {
    match entry.class.as_str() {
        "echo" => Some(Arc::new(EchoProvider::from_manifest(entry))),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use archon_domain::config::{CostPerMillionTokens, ModelManifestEntry};

    fn manifest_entry(class: &str, auth_env: Option<&str>) -> ProviderManifestEntry {
        let mut models = HashMap::new();
        models.insert(
            "m1".to_string(),
            ModelManifestEntry {
                capabilities: vec!["text_generation".to_string()],
                cost_per_million_tokens: CostPerMillionTokens { input: 1.0, output: 1.0 },
            },
        );
        ProviderManifestEntry {
            class: class.to_string(),
            models,
            auth_env: auth_env.map(String::from),
        }
    }

    #[test]
    fn registers_known_providers() {
        let config = AalConfig {
            providers: vec![manifest_entry("echo", None)],
            default_timeout_ms: 1000,
        };
        let registry = ProviderRegistry::from_config(&config);
        assert_eq!(registry.len(), 1);
        assert!(registry.get("echo").is_some());
    }

    #[test]
    fn skips_unknown_provider_class() {
        let config = AalConfig {
            providers: vec![manifest_entry("nonexistent-vendor", None)],
            default_timeout_ms: 1000,
        };
        let registry = ProviderRegistry::from_config(&config);
        assert!(registry.is_empty());
    }

    #[test]
    fn disables_provider_with_missing_credential() {
        let config = AalConfig {
            providers: vec![manifest_entry("echo", Some("ARCHON_TEST_NONEXISTENT_CRED_XYZ"))],
            default_timeout_ms: 1000,
        };
        let registry = ProviderRegistry::from_config(&config);
        assert!(registry.is_empty());
    }

    #[test]
    fn enables_provider_with_present_credential() {
        std::env::set_var("ARCHON_TEST_CRED_PRESENT", "secret");
        let config = AalConfig {
            providers: vec![manifest_entry("echo", Some("ARCHON_TEST_CRED_PRESENT"))],
            default_timeout_ms: 1000,
        };
        let registry = ProviderRegistry::from_config(&config);
        assert_eq!(registry.len(), 1);
        std::env::remove_var("ARCHON_TEST_CRED_PRESENT");
    }
}
