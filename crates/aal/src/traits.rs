//! Provider capability surface (spec.md §4.7) — the contract every
//! upstream model vendor adapter implements. Concrete vendor bindings
//! beyond this shape are out of scope (spec.md §1); [`crate::echo`] ships
//! one minimal, dependency-free implementation so the registry and router
//! have something real to load and execute.

use std::collections::HashSet;

use archon_domain::error::Result;
use archon_domain::types::{AgentRequest, AgentResponse, QualityTier};
use async_trait::async_trait;

/// One model's advertised capabilities and per-million-token cost, as
/// loaded from a provider manifest entry (spec.md §6).
#[derive(Debug, Clone)]
pub struct ModelSpec {
    pub name: String,
    pub capabilities: HashSet<String>,
    pub cost_per_million_input: f64,
    pub cost_per_million_output: f64,
}

/// A provider exposes a name, the capabilities of its *best available*
/// model, and an `execute` entry point. Model-level selection among a
/// provider's own models is internal to the provider (spec.md §4.7).
#[async_trait]
pub trait Provider: Send + Sync {
    fn name(&self) -> &str;

    /// Every model this provider can route to, manifest-declared.
    fn model_specs(&self) -> &[ModelSpec];

    async fn execute(&self, request: &AgentRequest) -> Result<AgentResponse>;

    /// Union of every model's capabilities — what the provider advertises
    /// overall (its best available model can do all of this, though not
    /// necessarily any single cheaper model).
    fn advertised_capabilities(&self) -> HashSet<String> {
        let mut caps = HashSet::new();
        for model in self.model_specs() {
            caps.extend(model.capabilities.iter().cloned());
        }
        caps
    }

    /// Coarse quality tier derived from the `quality_low|medium|high`
    /// capability markers (spec.md §4.7). Defaults to `Medium` when no
    /// marker is present.
    fn quality_tier(&self) -> QualityTier {
        let caps = self.advertised_capabilities();
        if caps.contains("quality_high") {
            QualityTier::High
        } else if caps.contains("quality_low") && !caps.contains("quality_medium") {
            QualityTier::Low
        } else {
            QualityTier::Medium
        }
    }

    /// Rough cost estimate (spec.md §4.7 "Cost estimation") for the
    /// cheapest model that satisfies `required_capabilities`, or `None` if
    /// no model qualifies.
    fn cheapest_eligible_cost(
        &self,
        required_capabilities: &HashSet<String>,
        prompt_len: usize,
        max_tokens: u32,
    ) -> Option<f64> {
        let input_tokens = (prompt_len as f64 / 4.0).ceil();
        let output_tokens = (max_tokens as f64).min(1000.0);
        self.model_specs()
            .iter()
            .filter(|m| required_capabilities.is_subset(&m.capabilities))
            .map(|m| {
                (input_tokens / 1_000_000.0) * m.cost_per_million_input
                    + (output_tokens / 1_000_000.0) * m.cost_per_million_output
            })
            .fold(None, |acc, cost| Some(acc.map_or(cost, |a: f64| a.min(cost))))
    }
}
