//! The shared data model: messages, sessions, memories, events, and the
//! request/response shapes the Agent Abstraction Layer routes.

use crate::ids::{EventId, FailureId, MemoryId, SessionId, UserId};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Messages & sessions (C1)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    System,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, serde_json::Value>>,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
            metadata: None,
        }
    }

    /// Cheap, deterministic token estimate: ~1 token per 4 characters of the
    /// serialized form. Monotonic in content length; no external tokenizer
    /// is assumed anywhere in this crate.
    pub fn estimated_tokens(&self) -> u32 {
        estimate_tokens(&serde_json::to_string(self).unwrap_or_default())
    }
}

/// Lightweight, per-session scratch context: an active project/task focus
/// plus a free-form bag for forward-compatible fields read from storage.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_project_id: Option<String>,
    #[serde(default)]
    pub active_task_ids: HashSet<String>,
    #[serde(default)]
    pub mentioned_files: HashSet<String>,
    #[serde(default)]
    pub free_form: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub session_id: SessionId,
    pub user_id: UserId,
    pub started_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
    pub messages: Vec<Message>,
    pub context: SessionContext,
}

impl Session {
    pub fn new(user_id: UserId, session_id: SessionId) -> Self {
        let now = Utc::now();
        Self {
            session_id,
            user_id,
            started_at: now,
            last_accessed_at: now,
            messages: Vec::new(),
            context: SessionContext::default(),
        }
    }

    pub fn estimated_tokens(&self) -> u32 {
        estimate_tokens(&serde_json::to_string(self).unwrap_or_default())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Working memory (C2)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkingMemoryType {
    Conversation,
    Action,
    Decision,
    Preference,
    Observation,
    Task,
    /// Unknown value read from storage — forward-compat fallback.
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkingEntry {
    pub id: MemoryId,
    pub user_id: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
    pub memory_type: WorkingMemoryType,
    pub content: HashMap<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, serde_json::Value>>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub relevance_score: f64,
    /// Consolidation marker: set once this entry has been promoted to a
    /// long-term entry, so the consolidator never double-promotes it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub promoted_to: Option<MemoryId>,
}

impl WorkingEntry {
    pub fn estimated_tokens(&self) -> u32 {
        estimate_tokens(&serde_json::to_string(self).unwrap_or_default())
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Sha256 fingerprint over the serialized content, used by the
    /// consolidator and by duplicate-promotion detection.
    pub fn content_fingerprint(&self) -> String {
        use sha2::{Digest, Sha256};
        let serialized = serde_json::to_string(&self.content).unwrap_or_default();
        let digest = Sha256::digest(serialized.as_bytes());
        hex::encode(digest)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Long-term memory (C3)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LongTermMemoryType {
    Fact,
    Preference,
    Skill,
    Relationship,
    Goal,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LongTermEntry {
    pub id: MemoryId,
    pub user_id: UserId,
    pub memory_type: LongTermMemoryType,
    pub content: HashMap<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, serde_json::Value>>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_accessed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub access_count: u64,
    pub importance_score: f64,
    /// Date `decayImportance` last applied a reduction to this entry, so a
    /// second same-day sweep is a no-op rather than compounding the decay
    /// factor (spec.md §4.2 "idempotent across runs within the same day").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_decayed_on: Option<NaiveDate>,
}

impl LongTermEntry {
    pub fn estimated_tokens(&self) -> u32 {
        estimate_tokens(&serde_json::to_string(self).unwrap_or_default())
    }

    pub fn content_fingerprint(&self) -> String {
        use sha2::{Digest, Sha256};
        let serialized = serde_json::to_string(&self.content).unwrap_or_default();
        let digest = Sha256::digest(serialized.as_bytes());
        hex::encode(digest)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Events (C4/C5)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub event_id: EventId,
    /// Dotted namespace, e.g. `memory.working.created`.
    pub event_type: String,
    pub payload: HashMap<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, serde_json::Value>>,
}

impl Event {
    pub fn new(
        event_type: impl Into<String>,
        payload: HashMap<String, serde_json::Value>,
        user_id: Option<UserId>,
    ) -> Self {
        Self {
            event_id: EventId::new(),
            event_type: event_type.into(),
            payload,
            user_id,
            timestamp: Utc::now(),
            metadata: None,
        }
    }
}

/// Canonical event-type namespace published by the substrate. `eventType`
/// itself remains a plain string on the wire for forward-compatibility;
/// this enum is the internal, exhaustively-matched surface.
pub mod event_type {
    pub const SESSION_CREATED: &str = "memory.session.created";
    pub const SESSION_MESSAGE_ADDED: &str = "memory.session.message_added";
    pub const SESSION_CONTEXT_UPDATED: &str = "memory.session.context_updated";
    pub const SESSION_DELETED: &str = "memory.session.deleted";
    pub const WORKING_CREATED: &str = "memory.working.created";
    pub const LONGTERM_CREATED: &str = "memory.longterm.created";
    pub const CLEANUP_TRIGGERED: &str = "system.cleanup.triggered";
    pub const HEALTH_DEGRADED: &str = "system.health.degraded";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStatus {
    Pending,
    Resolved,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventFailure {
    pub failure_id: FailureId,
    pub event_id: EventId,
    pub event_type: String,
    pub payload: HashMap<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
    pub error_message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack_trace: Option<String>,
    pub retry_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_retry_at: Option<DateTime<Utc>>,
    pub status: FailureStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_retry_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
}

/// One row of the replay audit log, appended on every retry attempt —
/// a supplement the spec's distillation left implicit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayLogEntry {
    pub failure_id: FailureId,
    pub attempted_at: DateTime<Utc>,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub retry_count_after: u32,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Assembled context (C7)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssemblyStatus {
    Healthy,
    Degraded,
    Cached,
    Error,
    NoCache,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssembledContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<Session>,
    #[serde(default)]
    pub recent_memories: Vec<WorkingEntry>,
    #[serde(default)]
    pub facts: Vec<LongTermEntry>,
    pub total_tokens: u32,
    pub source_counts: HashMap<String, usize>,
    pub status: AssemblyStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AssembledContext {
    pub fn empty(status: AssemblyStatus) -> Self {
        Self {
            session: None,
            recent_memories: Vec::new(),
            facts: Vec::new(),
            total_tokens: 0,
            source_counts: HashMap::new(),
            status,
            error: None,
        }
    }

    /// Render a synthetic system message summarizing this context, suitable
    /// for prepending to a provider's conversation history.
    pub fn as_system_message(&self) -> Option<Message> {
        if self.session.is_none() && self.recent_memories.is_empty() && self.facts.is_empty() {
            return None;
        }

        let mut parts = Vec::new();
        if let Some(session) = &self.session {
            parts.push(format!(
                "Conversation so far ({} messages).",
                session.messages.len()
            ));
        }
        if !self.recent_memories.is_empty() {
            let summaries: Vec<String> = self
                .recent_memories
                .iter()
                .filter_map(|entry| entry.content.get("summary").and_then(|v| v.as_str()))
                .map(|s| s.to_string())
                .collect();
            if summaries.is_empty() {
                parts.push(format!("{} recent memories.", self.recent_memories.len()));
            } else {
                parts.push(format!("Recent context: {}", summaries.join("; ")));
            }
        }
        if !self.facts.is_empty() {
            let facts: Vec<String> = self
                .facts
                .iter()
                .filter_map(|entry| entry.content.get("fact").and_then(|v| v.as_str()))
                .map(|s| s.to_string())
                .collect();
            if facts.is_empty() {
                parts.push(format!("{} known facts.", self.facts.len()));
            } else {
                parts.push(format!("Known facts: {}", facts.join("; ")));
            }
        }

        Some(Message::new(
            Role::System,
            format!("[assembled context]\n{}", parts.join("\n")),
        ))
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Agent request/response (C8)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityTier {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRequest {
    pub prompt: String,
    #[serde(default)]
    pub conversation_history: Vec<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
    #[serde(default = "default_enable_memory")]
    pub enable_memory: bool,
    #[serde(default = "default_memory_max_tokens")]
    pub memory_max_tokens: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_provider: Option<String>,
    #[serde(default)]
    pub required_capabilities: HashSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_cost_usd: Option<f64>,
    #[serde(default = "default_quality_tier")]
    pub quality_tier: QualityTier,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_enable_memory() -> bool {
    true
}
fn default_memory_max_tokens() -> u32 {
    4000
}
fn default_quality_tier() -> QualityTier {
    QualityTier::Medium
}
fn default_temperature() -> f64 {
    1.0
}
fn default_max_tokens() -> u32 {
    1024
}

impl AgentRequest {
    pub fn validate(&self) -> crate::error::Result<()> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(crate::error::Error::Validation(format!(
                "temperature {} out of range [0,2]",
                self.temperature
            )));
        }
        if self.max_tokens == 0 {
            return Err(crate::error::Error::Validation(
                "maxTokens must be > 0".into(),
            ));
        }
        if let Some(cap) = self.max_cost_usd {
            if cap < 0.0 {
                return Err(crate::error::Error::Validation(
                    "maxCostUsd must be >= 0".into(),
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentResponse {
    pub content: String,
    pub provider_used: String,
    pub model_name_used: String,
    pub usage: Usage,
    pub cost_usd: f64,
    pub latency_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AgentResponse {
    pub fn error_response(provider_used: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            content: String::new(),
            provider_used: provider_used.into(),
            model_name_used: String::new(),
            usage: Usage::default(),
            cost_usd: 0.0,
            latency_ms: 0,
            error: Some(error.into()),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Token estimation — shared by every budget-aware component.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Deterministic, cheap heuristic: ~1 token per 4 characters. Monotonic in
/// input length; no external tokenizer is assumed anywhere in this system.
pub fn estimate_tokens(serialized: &str) -> u32 {
    ((serialized.len() as f64) / 4.0).ceil() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_estimate_is_monotonic() {
        let short = estimate_tokens("hi");
        let long = estimate_tokens(&"hi".repeat(100));
        assert!(long > short);
    }

    #[test]
    fn agent_request_rejects_bad_temperature() {
        let req = AgentRequest {
            prompt: "x".into(),
            conversation_history: vec![],
            user_id: None,
            session_id: None,
            enable_memory: true,
            memory_max_tokens: 100,
            preferred_provider: None,
            required_capabilities: HashSet::new(),
            max_cost_usd: None,
            quality_tier: QualityTier::Medium,
            temperature: 3.0,
            max_tokens: 10,
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn working_entry_expiry() {
        let now = Utc::now();
        let entry = WorkingEntry {
            id: MemoryId::new(),
            user_id: UserId::new(),
            session_id: None,
            memory_type: WorkingMemoryType::Observation,
            content: HashMap::new(),
            metadata: None,
            created_at: now - chrono::Duration::hours(2),
            expires_at: now - chrono::Duration::hours(1),
            relevance_score: 0.5,
            promoted_to: None,
        };
        assert!(entry.is_expired(now));
    }
}
