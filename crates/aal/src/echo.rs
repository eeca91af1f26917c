//! A minimal, dependency-free provider implementation. Concrete upstream
//! vendor bindings are out of scope (spec.md §1); this is the one real
//! `Provider` the compile-time registry (`registry.rs`) knows how to
//! construct from a manifest entry with `class = "echo"`, useful both as a
//! development default and as the shape every future vendor adapter would
//! follow.

use std::collections::HashSet;
use std::time::Instant;

use archon_domain::config::ProviderManifestEntry;
use archon_domain::error::Result;
use archon_domain::types::{AgentRequest, AgentResponse, Usage};
use async_trait::async_trait;

use crate::traits::{ModelSpec, Provider};

pub struct EchoProvider {
    name: String,
    models: Vec<ModelSpec>,
}

impl EchoProvider {
    pub fn from_manifest(entry: &ProviderManifestEntry) -> Self {
        let models = entry
            .models
            .iter()
            .map(|(model_name, spec)| ModelSpec {
                name: model_name.clone(),
                capabilities: spec.capabilities.iter().cloned().collect::<HashSet<_>>(),
                cost_per_million_input: spec.cost_per_million_tokens.input,
                cost_per_million_output: spec.cost_per_million_tokens.output,
            })
            .collect();
        Self {
            name: entry.class.clone(),
            models,
        }
    }
}

#[async_trait]
impl Provider for EchoProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn model_specs(&self) -> &[ModelSpec] {
        &self.models
    }

    async fn execute(&self, request: &AgentRequest) -> Result<AgentResponse> {
        let start = Instant::now();
        let model_name = self
            .models
            .first()
            .map(|m| m.name.clone())
            .unwrap_or_else(|| "default".to_string());

        let input_tokens = (request.prompt.len() as f64 / 4.0).ceil() as u32;
        let content = format!("echo: {}", request.prompt);
        let output_tokens = (content.len() as f64 / 4.0).ceil() as u32;

        let cost = self
            .model_specs()
            .iter()
            .find(|m| m.name == model_name)
            .map(|m| {
                (input_tokens as f64 / 1_000_000.0) * m.cost_per_million_input
                    + (output_tokens as f64 / 1_000_000.0) * m.cost_per_million_output
            })
            .unwrap_or(0.0);

        Ok(AgentResponse {
            content,
            provider_used: self.name.clone(),
            model_name_used: model_name,
            usage: Usage {
                input_tokens,
                output_tokens,
            },
            cost_usd: cost,
            latency_ms: start.elapsed().as_millis() as u64,
            error: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn entry() -> ProviderManifestEntry {
        let mut models = HashMap::new();
        models.insert(
            "echo-1".to_string(),
            archon_domain::config::ModelManifestEntry {
                capabilities: vec!["text_generation".to_string(), "quality_medium".to_string()],
                cost_per_million_tokens: archon_domain::config::CostPerMillionTokens {
                    input: 1.0,
                    output: 2.0,
                },
            },
        );
        ProviderManifestEntry {
            class: "echo".to_string(),
            models,
            auth_env: None,
        }
    }

    #[tokio::test]
    async fn echoes_the_prompt() {
        let provider = EchoProvider::from_manifest(&entry());
        let request = AgentRequest {
            prompt: "hi".to_string(),
            conversation_history: vec![],
            user_id: None,
            session_id: None,
            enable_memory: false,
            memory_max_tokens: 0,
            preferred_provider: None,
            required_capabilities: HashSet::new(),
            max_cost_usd: None,
            quality_tier: archon_domain::types::QualityTier::Medium,
            temperature: 1.0,
            max_tokens: 100,
        };
        let response = provider.execute(&request).await.unwrap();
        assert_eq!(response.content, "echo: hi");
        assert_eq!(response.provider_used, "echo");
    }
}
