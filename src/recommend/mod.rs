//! Recommender - resolve a decision to a remediation playbook
//!
//! Resolution order: known ACTIVE playbook matching the
//! `(pattern_type, service_pattern)` key, ranked by adaptive score; else a
//! generator-drafted playbook persisted for review; else a synthetic
//! fallback carrying the specialists' suggested actions.
//!
//! Adaptive score: `confidence · success_rate · ln(1 + total_executions)`,
//! so a playbook earns rank through use and loses it through failure.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::adapters::{GenerationParams, TextGenerator};
use crate::playbooks::{PlaybookStore, StoreError};
use crate::types::{
    DecisionCandidate, Playbook, PlaybookSource, PlaybookStatus, PlaybookStep, SemanticVersion,
};

/// Where the recommended playbook came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecommendationSource {
    Known,
    Generated,
    Fallback,
}

/// Whether the playbook can execute immediately or needs a human first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Readiness {
    Ready,
    RequiresApproval,
}

#[derive(Debug, Clone)]
pub struct Recommendation {
    pub playbook: Playbook,
    pub source: RecommendationSource,
    pub readiness: Readiness,
    /// Adaptive score of the winning known playbook
    pub score: Option<f64>,
    /// Whether the playbook exists in the store
    pub persisted: bool,
}

/// Rank a known playbook for this decision.
pub fn adaptive_score(confidence: f64, playbook: &Playbook) -> f64 {
    let stats = &playbook.stats;
    confidence * stats.success_rate() * (1.0 + stats.total_executions as f64).ln()
}

pub struct Recommender {
    store: Arc<PlaybookStore>,
    generator: Arc<dyn TextGenerator>,
    generation: GenerationParams,
}

impl Recommender {
    pub fn new(
        store: Arc<PlaybookStore>,
        generator: Arc<dyn TextGenerator>,
        generation: GenerationParams,
    ) -> Self {
        Self {
            store,
            generator,
            generation,
        }
    }

    /// Resolve a playbook for the decision.
    pub async fn recommend(
        &self,
        cancel: &CancellationToken,
        decision: &DecisionCandidate,
        pattern_type: &str,
        service: &str,
        now: DateTime<Utc>,
    ) -> Result<Recommendation, StoreError> {
        // 1-4. Known playbook by adaptive score
        let candidates = self
            .store
            .find_active(cancel, pattern_type, service)
            .await?;
        if !candidates.is_empty() {
            let mut ranked: Vec<(f64, &Playbook)> = candidates
                .iter()
                .map(|p| (adaptive_score(decision.confidence, p), p))
                .collect();
            ranked.sort_by(|a, b| {
                b.0.total_cmp(&a.0)
                    .then_with(|| b.1.stats.last_executed_at.cmp(&a.1.stats.last_executed_at))
                    .then_with(|| a.1.id.cmp(&b.1.id))
            });
            let (score, winner) = ranked[0];
            info!(
                decision = %decision.id,
                playbook = %winner.id,
                score = format!("{score:.3}"),
                "Known playbook matched"
            );
            return Ok(Recommendation {
                playbook: winner.clone(),
                source: RecommendationSource::Known,
                readiness: Readiness::Ready,
                score: Some(score),
                persisted: true,
            });
        }

        // 5. Draft one with the text generator
        match self
            .generate_playbook(cancel, decision, pattern_type, service, now)
            .await
        {
            Ok(playbook) => {
                self.store.save(cancel, &playbook).await?;
                info!(
                    decision = %decision.id,
                    playbook = %playbook.id,
                    "Generated playbook persisted for review"
                );
                Ok(Recommendation {
                    playbook,
                    source: RecommendationSource::Generated,
                    readiness: Readiness::RequiresApproval,
                    score: None,
                    persisted: true,
                })
            }
            // 6. Generator down: synthesise from specialist actions
            Err(e) => {
                warn!(decision = %decision.id, error = %e, "Playbook generation failed; using fallback");
                Ok(Recommendation {
                    playbook: fallback_playbook(decision, pattern_type, service, now),
                    source: RecommendationSource::Fallback,
                    readiness: Readiness::RequiresApproval,
                    score: None,
                    persisted: false,
                })
            }
        }
    }

    async fn generate_playbook(
        &self,
        cancel: &CancellationToken,
        decision: &DecisionCandidate,
        pattern_type: &str,
        service: &str,
        now: DateTime<Utc>,
    ) -> Result<Playbook, crate::resilience::AdapterError> {
        let prompt = build_prompt(decision, service);
        let raw = self
            .generator
            .generate(cancel, &prompt, &self.generation)
            .await?;
        let draft: GeneratedDraft = parse_draft(&raw).map_err(|e| {
            crate::resilience::AdapterError::ValidationFailed(format!(
                "generator returned unusable draft: {e}"
            ))
        })?;

        let steps: Vec<PlaybookStep> = draft
            .steps
            .into_iter()
            .enumerate()
            .map(|(index, s)| PlaybookStep {
                index,
                title: s.title,
                description: s.description.unwrap_or_default(),
                commands: s.commands,
                expected_output: s.expected_output.unwrap_or_default(),
                rollback_command: s.rollback_command,
            })
            .collect();

        Ok(Playbook {
            id: format!("pb-gen-{}", &decision.id["dec-".len()..]),
            title: draft.title,
            description: draft.description.unwrap_or_else(|| decision.hypothesis.clone()),
            pattern_type: pattern_type.to_string(),
            service_pattern: service.to_string(),
            steps,
            estimated_duration_secs: draft.estimated_duration_secs.unwrap_or(600),
            automation: decision.automation,
            risk: decision.risk,
            prerequisites: draft.prerequisites,
            success_criteria: draft.success_criteria,
            rollback_procedure: draft.rollback_procedure.unwrap_or_default(),
            source: PlaybookSource::LlmGenerated,
            status: PlaybookStatus::PendingReview,
            version: SemanticVersion::initial(),
            previous_version_id: None,
            created_at: now,
            created_by: "strands-generator".to_string(),
            updated_at: now,
            updated_by: "strands-generator".to_string(),
            approved_at: None,
            approved_by: None,
            rejection_note: None,
            stats: Default::default(),
        })
    }
}

// ============================================================================
// Generation plumbing
// ============================================================================

#[derive(Debug, Deserialize)]
struct GeneratedDraft {
    title: String,
    #[serde(default)]
    description: Option<String>,
    steps: Vec<GeneratedStep>,
    #[serde(default)]
    estimated_duration_secs: Option<u64>,
    #[serde(default)]
    prerequisites: Vec<String>,
    #[serde(default)]
    success_criteria: Vec<String>,
    #[serde(default)]
    rollback_procedure: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeneratedStep {
    title: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    commands: Vec<String>,
    #[serde(default)]
    expected_output: Option<String>,
    #[serde(default)]
    rollback_command: Option<String>,
}

fn build_prompt(decision: &DecisionCandidate, service: &str) -> String {
    let mut prompt = format!(
        "Draft a Kubernetes remediation playbook as JSON.\n\
         Service: {service}\n\
         Hypothesis: {}\n\
         Evidence:\n",
        decision.hypothesis
    );
    for item in decision.evidence.iter().take(10) {
        prompt.push_str(&format!("- {}\n", item.description));
    }
    prompt.push_str(
        "\nRespond with a single JSON object: \
         {\"title\", \"description\", \"steps\": [{\"title\", \"description\", \
         \"commands\", \"expected_output\", \"rollback_command\"}], \
         \"prerequisites\", \"success_criteria\", \"rollback_procedure\", \
         \"estimated_duration_secs\"}",
    );
    prompt
}

/// Parse a draft, tolerating fenced or prefixed output around the JSON
/// object.
fn parse_draft(raw: &str) -> Result<GeneratedDraft, serde_json::Error> {
    if let Ok(draft) = serde_json::from_str(raw) {
        return Ok(draft);
    }
    let start = raw.find('{');
    let end = raw.rfind('}');
    match (start, end) {
        (Some(s), Some(e)) if e > s => serde_json::from_str(&raw[s..=e]),
        _ => serde_json::from_str(raw),
    }
}

/// Synthetic playbook from specialist actions; never persisted.
fn fallback_playbook(
    decision: &DecisionCandidate,
    pattern_type: &str,
    service: &str,
    now: DateTime<Utc>,
) -> Playbook {
    let steps: Vec<PlaybookStep> = decision
        .suggested_actions
        .iter()
        .enumerate()
        .map(|(index, action)| PlaybookStep {
            index,
            title: format!("Step {}", index + 1),
            description: action.clone(),
            commands: vec![action.clone()],
            expected_output: String::new(),
            rollback_command: None,
        })
        .collect();

    Playbook {
        id: format!("pb-fallback-{}", &decision.id["dec-".len()..]),
        title: format!("Manual remediation for {service}"),
        description: decision.hypothesis.clone(),
        pattern_type: pattern_type.to_string(),
        service_pattern: service.to_string(),
        steps,
        estimated_duration_secs: 900,
        automation: crate::types::AutomationLevel::Manual,
        risk: decision.risk,
        prerequisites: Vec::new(),
        success_criteria: Vec::new(),
        rollback_procedure: String::new(),
        source: PlaybookSource::Hybrid,
        status: PlaybookStatus::Draft,
        version: SemanticVersion::initial(),
        previous_version_id: None,
        created_at: now,
        created_by: "strands-fallback".to_string(),
        updated_at: now,
        updated_by: "strands-fallback".to_string(),
        approved_at: None,
        approved_by: None,
        rejection_note: None,
        stats: Default::default(),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::EmbeddedGraphStore;
    use crate::resilience::AdapterError;
    use crate::types::{
        AutomationLevel, DecisionType, PlaybookStats, RiskLevel,
    };
    use async_trait::async_trait;

    struct StubGenerator {
        response: Option<String>,
    }

    #[async_trait]
    impl TextGenerator for StubGenerator {
        async fn embed(
            &self,
            _cancel: &CancellationToken,
            _text: &str,
        ) -> Result<Vec<f32>, AdapterError> {
            Err(AdapterError::UpstreamUnavailable("no embeddings".to_string()))
        }

        async fn generate(
            &self,
            _cancel: &CancellationToken,
            _prompt: &str,
            _params: &GenerationParams,
        ) -> Result<String, AdapterError> {
            self.response
                .clone()
                .ok_or_else(|| AdapterError::UpstreamUnavailable("generator down".to_string()))
        }
    }

    fn decision() -> DecisionCandidate {
        DecisionCandidate {
            id: "dec-abcdef0123456789".to_string(),
            cluster_id: "cluster-1".to_string(),
            hypothesis: "memory leak in checkout".to_string(),
            confidence: 0.8,
            risk: RiskLevel::Medium,
            automation: AutomationLevel::Assisted,
            decision_type: DecisionType::RequiresApproval,
            conflict: false,
            degraded: false,
            suggested_actions: vec!["kubectl rollout restart deployment/checkout".to_string()],
            evidence: Vec::new(),
            created_at: Utc::now(),
            model_version: "v1".to_string(),
            weights_version: "w1".to_string(),
            audit_id: "audit-abcdef0123456789".to_string(),
        }
    }

    fn active_playbook(id: &str, executions: u64, successes: u64) -> Playbook {
        let mut stats = PlaybookStats::default();
        for i in 0..executions {
            stats.record(i < successes, 10.0, Utc::now());
        }
        Playbook {
            id: id.to_string(),
            title: "known".to_string(),
            description: String::new(),
            pattern_type: "METRIC_METRIC".to_string(),
            service_pattern: "checkout".to_string(),
            steps: Vec::new(),
            estimated_duration_secs: 60,
            automation: AutomationLevel::Assisted,
            risk: RiskLevel::Medium,
            prerequisites: Vec::new(),
            success_criteria: Vec::new(),
            rollback_procedure: String::new(),
            source: PlaybookSource::HumanWritten,
            status: PlaybookStatus::Active,
            version: SemanticVersion::initial(),
            previous_version_id: None,
            created_at: Utc::now(),
            created_by: "ops".to_string(),
            updated_at: Utc::now(),
            updated_by: "ops".to_string(),
            approved_at: None,
            approved_by: None,
            rejection_note: None,
            stats,
        }
    }

    fn recommender(generator_response: Option<&str>) -> (Recommender, Arc<PlaybookStore>) {
        let store = Arc::new(PlaybookStore::new(Arc::new(
            EmbeddedGraphStore::temporary().unwrap(),
        )));
        let rec = Recommender::new(
            Arc::clone(&store),
            Arc::new(StubGenerator {
                response: generator_response.map(str::to_string),
            }),
            GenerationParams::default(),
        );
        (rec, store)
    }

    #[test]
    fn adaptive_score_rewards_proven_playbooks() {
        let fresh = active_playbook("fresh", 0, 0);
        let proven = active_playbook("proven", 20, 18);
        let flaky = active_playbook("flaky", 20, 5);
        assert_eq!(adaptive_score(0.8, &fresh), 0.0);
        assert!(adaptive_score(0.8, &proven) > adaptive_score(0.8, &flaky));
    }

    #[tokio::test]
    async fn known_playbook_wins() {
        let (rec, store) = recommender(None);
        let cancel = CancellationToken::new();
        store
            .save(&cancel, &active_playbook("pb-proven", 10, 9))
            .await
            .unwrap();

        let r = rec
            .recommend(&cancel, &decision(), "METRIC_METRIC", "checkout", Utc::now())
            .await
            .unwrap();
        assert_eq!(r.source, RecommendationSource::Known);
        assert_eq!(r.readiness, Readiness::Ready);
        assert_eq!(r.playbook.id, "pb-proven");
        assert!(r.score.unwrap() > 0.0);
    }

    #[tokio::test]
    async fn no_match_generates_and_persists_for_review() {
        let draft = r#"{
            "title": "Fix checkout memory leak",
            "steps": [
                {"title": "Restart", "commands": ["kubectl rollout restart deployment/checkout"]}
            ],
            "rollback_procedure": "kubectl rollout undo deployment/checkout"
        }"#;
        let (rec, store) = recommender(Some(draft));
        let cancel = CancellationToken::new();

        let r = rec
            .recommend(&cancel, &decision(), "METRIC_METRIC", "checkout", Utc::now())
            .await
            .unwrap();
        assert_eq!(r.source, RecommendationSource::Generated);
        assert_eq!(r.readiness, Readiness::RequiresApproval);
        assert!(r.persisted);

        let stored = store.get(&cancel, &r.playbook.id).await.unwrap();
        assert_eq!(stored.status, PlaybookStatus::PendingReview);
        assert_eq!(stored.source, PlaybookSource::LlmGenerated);
        assert_eq!(stored.steps.len(), 1);
    }

    #[tokio::test]
    async fn generator_failure_falls_back_to_specialist_actions() {
        let (rec, store) = recommender(None);
        let cancel = CancellationToken::new();

        let r = rec
            .recommend(&cancel, &decision(), "METRIC_METRIC", "checkout", Utc::now())
            .await
            .unwrap();
        assert_eq!(r.source, RecommendationSource::Fallback);
        assert_eq!(r.readiness, Readiness::RequiresApproval);
        assert!(!r.persisted);
        assert_eq!(r.playbook.steps.len(), 1);
        assert!(r.playbook.steps[0]
            .commands
            .contains(&"kubectl rollout restart deployment/checkout".to_string()));
        // Fallback never lands in the store
        assert!(store.get(&cancel, &r.playbook.id).await.is_err());
    }

    #[test]
    fn parse_draft_tolerates_fencing() {
        let fenced = "```json\n{\"title\": \"t\", \"steps\": []}\n```";
        let draft = parse_draft(fenced).unwrap();
        assert_eq!(draft.title, "t");
    }
}
