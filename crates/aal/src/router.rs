//! Capability-driven provider router (C8, spec.md §4.8).
//!
//! The router injects memory context ahead of every request, filters the
//! registry down to candidate providers by required capability and cost
//! cap, orders candidates by quality tier and cost, and fails over across
//! candidates guarded by per-provider circuit breakers — the same
//! breaker-admission-then-attempt shape `providers/src/router.rs`'s
//! `try_chat` uses, generalized from a single role-pinned model to an
//! ordered candidate list.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use archon_breaker::CircuitBreakerRegistry;
use archon_domain::ids::UserId;
use archon_domain::trace::TraceEvent;
use archon_domain::types::{AgentRequest, AgentResponse, QualityTier};
use archon_memory::ContextAssembler;

use crate::registry::ProviderRegistry;
use crate::traits::Provider;

const BREAKER_PREFIX: &str = "aal.provider";

pub struct Router {
    registry: ProviderRegistry,
    context_assembler: Option<Arc<ContextAssembler>>,
    breakers: Arc<CircuitBreakerRegistry>,
}

impl Router {
    pub fn new(
        registry: ProviderRegistry,
        context_assembler: Option<Arc<ContextAssembler>>,
        breakers: Arc<CircuitBreakerRegistry>,
    ) -> Self {
        Self {
            registry,
            context_assembler,
            breakers,
        }
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// Execute an agent request end to end: inject memory (if requested and
    /// wired), select candidate providers, and fail over across them.
    pub async fn execute(&self, mut request: AgentRequest) -> AgentResponse {
        if let Err(e) = request.validate() {
            return AgentResponse::error_response("aal_service", e.to_string());
        }

        if request.enable_memory {
            if let Some(assembler) = &self.context_assembler {
                if let Some(user_id) = &request.user_id {
                    self.inject_memory(&mut request, user_id, assembler).await;
                }
            }
        }

        let candidates = self.select_candidates(&request);
        if candidates.is_empty() {
            return AgentResponse::error_response(
                "aal_service",
                "no provider available satisfying required capabilities, cost cap, or quality tier",
            );
        }

        for provider in candidates {
            let breaker_name = format!("{}.{}", BREAKER_PREFIX, provider.name());
            let breaker = self.breakers.get_or_create(&breaker_name);
            metrics::gauge!("aal_circuit_breaker_state", "provider" => provider.name().to_string())
                .set(breaker.state() as u8 as f64);
            if !breaker.is_request_allowed() {
                TraceEvent::ProviderAttempt {
                    provider: provider.name().to_string(),
                    model: String::new(),
                    quality_tier: format!("{:?}", provider.quality_tier()),
                    status: "breaker_open".to_string(),
                    duration_ms: 0,
                    cost_usd: 0.0,
                }
                .emit();
                continue;
            }

            let start = Instant::now();
            let result = provider.execute(&request).await;
            let duration_ms = start.elapsed().as_millis() as u64;

            match result {
                Ok(response) => {
                    breaker.record_success();
                    TraceEvent::ProviderAttempt {
                        provider: provider.name().to_string(),
                        model: response.model_name_used.clone(),
                        quality_tier: format!("{:?}", provider.quality_tier()),
                        status: "ok".to_string(),
                        duration_ms,
                        cost_usd: response.cost_usd,
                    }
                    .emit();
                    metrics::counter!("aal_requests_total", "provider" => provider.name().to_string(), "status" => "ok").increment(1);
                    metrics::histogram!("aal_requests_latency_seconds", "provider" => provider.name().to_string()).record(duration_ms as f64 / 1000.0);
                    metrics::histogram!("aal_requests_cost_usd", "provider" => provider.name().to_string()).record(response.cost_usd);
                    metrics::counter!("aal_tokens_total", "provider" => provider.name().to_string(), "direction" => "input").increment(response.usage.input_tokens as u64);
                    metrics::counter!("aal_tokens_total", "provider" => provider.name().to_string(), "direction" => "output").increment(response.usage.output_tokens as u64);
                    return response;
                }
                Err(e) => {
                    breaker.record_failure();
                    TraceEvent::ProviderAttempt {
                        provider: provider.name().to_string(),
                        model: String::new(),
                        quality_tier: format!("{:?}", provider.quality_tier()),
                        status: "error".to_string(),
                        duration_ms,
                        cost_usd: 0.0,
                    }
                    .emit();
                    metrics::counter!("aal_requests_total", "provider" => provider.name().to_string(), "status" => "error").increment(1);
                    metrics::counter!("aal_circuit_breaker_failures_total", "provider" => provider.name().to_string()).increment(1);
                    tracing::warn!(provider = %provider.name(), error = %e, "provider attempt failed, trying next candidate");
                    continue;
                }
            }
        }

        AgentResponse::error_response(
            "aal_service",
            "all candidate providers failed or were unavailable",
        )
    }

    /// Assembles memory context and prepends it to `conversation_history` as
    /// a synthetic system message (spec.md §4.6/§4.8 integration point).
    async fn inject_memory(
        &self,
        request: &mut AgentRequest,
        user_id: &UserId,
        assembler: &Arc<ContextAssembler>,
    ) {
        let assembled = assembler
            .assemble_context(user_id, request.session_id.as_ref(), request.memory_max_tokens)
            .await;
        let Some(system_message) = assembled.as_system_message() else {
            return;
        };
        let mut history = Vec::with_capacity(request.conversation_history.len() + 1);
        history.push(system_message);
        history.extend(std::mem::take(&mut request.conversation_history));
        request.conversation_history = history;
    }

    /// Providers filtered by required capability and cost cap, ordered by
    /// descending quality tier and ascending estimated cost within tier
    /// (spec.md §4.8 "candidate ordering").
    fn select_candidates(&self, request: &AgentRequest) -> Vec<Arc<dyn Provider>> {
        if let Some(preferred) = &request.preferred_provider {
            if let Some(provider) = self.registry.get(preferred) {
                if satisfies(&provider, &request.required_capabilities) {
                    return vec![provider];
                }
            }
        }

        let mut candidates: Vec<(Arc<dyn Provider>, f64)> = self
            .registry
            .iter()
            .filter(|p| satisfies(p, &request.required_capabilities))
            .filter_map(|p| {
                let cost = p.cheapest_eligible_cost(
                    &request.required_capabilities,
                    request.prompt.len(),
                    request.max_tokens,
                )?;
                if let Some(max_cost) = request.max_cost_usd {
                    if cost > max_cost {
                        return None;
                    }
                }
                Some((p.clone(), cost))
            })
            .collect();

        candidates.sort_by(|(a, a_cost), (b, b_cost)| {
            b.quality_tier()
                .cmp(&a.quality_tier())
                .then(a_cost.partial_cmp(b_cost).unwrap_or(std::cmp::Ordering::Equal))
        });

        candidates.into_iter().map(|(p, _)| p).collect()
    }
}

fn satisfies(provider: &Arc<dyn Provider>, required: &HashSet<String>) -> bool {
    let caps = provider.advertised_capabilities();
    required.is_subset(&caps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use archon_domain::config::{AalConfig, BreakerConfig, CostPerMillionTokens, ModelManifestEntry, ProviderManifestEntry};
    use std::collections::HashMap;

    fn echo_manifest(capabilities: Vec<&str>) -> AalConfig {
        let mut models = HashMap::new();
        models.insert(
            "echo-1".to_string(),
            ModelManifestEntry {
                capabilities: capabilities.into_iter().map(String::from).collect(),
                cost_per_million_tokens: CostPerMillionTokens { input: 1.0, output: 1.0 },
            },
        );
        AalConfig {
            providers: vec![ProviderManifestEntry { class: "echo".to_string(), models, auth_env: None }],
            default_timeout_ms: 1000,
        }
    }

    fn router(config: &AalConfig) -> Router {
        let registry = ProviderRegistry::from_config(config);
        let breakers = Arc::new(CircuitBreakerRegistry::new(BreakerConfig::default()));
        Router::new(registry, None, breakers)
    }

    fn base_request() -> AgentRequest {
        AgentRequest {
            prompt: "hello".to_string(),
            conversation_history: vec![],
            user_id: None,
            session_id: None,
            enable_memory: false,
            memory_max_tokens: 0,
            preferred_provider: None,
            required_capabilities: HashSet::new(),
            max_cost_usd: None,
            quality_tier: QualityTier::Low,
            temperature: 1.0,
            max_tokens: 100,
        }
    }

    #[tokio::test]
    async fn executes_against_sole_eligible_provider() {
        let config = echo_manifest(vec!["text_generation", "quality_medium"]);
        let router = router(&config);
        let response = router.execute(base_request()).await;
        assert_eq!(response.provider_used, "echo");
        assert!(response.error.is_none());
    }

    #[tokio::test]
    async fn no_candidates_yields_error_response() {
        let config = echo_manifest(vec!["text_generation"]);
        let router = router(&config);
        let mut request = base_request();
        request.required_capabilities.insert("vision".to_string());
        let response = router.execute(request).await;
        assert!(response.error.is_some());
    }

    #[tokio::test]
    async fn cost_cap_excludes_overpriced_candidates() {
        let config = echo_manifest(vec!["text_generation", "quality_medium"]);
        let router = router(&config);
        let mut request = base_request();
        request.max_cost_usd = Some(0.0);
        let response = router.execute(request).await;
        assert!(response.error.is_some());
    }

    #[tokio::test]
    async fn quality_tier_below_request_still_attempted_not_filtered() {
        // spec.md §4.7: quality tier orders candidates, it never excludes
        // one — only capability superset and cost cap filter.
        let config = echo_manifest(vec!["text_generation", "quality_low"]);
        let router = router(&config);
        let mut request = base_request();
        request.quality_tier = QualityTier::High;
        let response = router.execute(request).await;
        assert_eq!(response.provider_used, "echo");
        assert!(response.error.is_none());
    }

    #[tokio::test]
    async fn invalid_temperature_is_rejected_before_any_candidate_is_tried() {
        let config = echo_manifest(vec!["text_generation", "quality_medium"]);
        let router = router(&config);
        let mut request = base_request();
        request.temperature = 5.0;
        let response = router.execute(request).await;
        assert_eq!(response.provider_used, "aal_service");
        assert!(response.error.is_some());
    }
}
