//! Conversation orchestrator
//!
//! Answers follow-up questions about an analyzed file. The generation
//! service keeps no session, so every turn rebuilds the full grounding
//! context from scratch: standing role instruction with the serialized
//! profile, the complete prior history in caller order, and the original
//! documents re-attached to the newest message.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::UnderwritingError;
use crate::gemini::{Content, GenerateRequest, GenerationService, Part, SystemInstruction};
use crate::models::{ConversationTurn, LoanProfile, TurnRole, UploadedArtifact};
use crate::Result;

/// Shown in place of an answer when the service produced no text.
pub const EMPTY_RESPONSE_FALLBACK: &str = "I couldn't generate a response.";

/// Shown in place of an answer when a turn fails outright. The failed turn
/// stays in the log either way.
pub const TRANSPORT_FAILURE_FALLBACK: &str = "Transmission error. Please retry query.";

pub struct ConversationOrchestrator {
    service: Arc<dyn GenerationService>,
    model: String,
}

impl ConversationOrchestrator {
    pub fn new(service: Arc<dyn GenerationService>, model: String) -> Self {
        Self { service, model }
    }

    /// Answer one question grounded in the documents, the profile, and
    /// every prior turn.
    ///
    /// The reply text is returned as-is; appending it to the log is the
    /// caller's move. A missing profile degrades the grounding context, it
    /// never fails the call.
    pub async fn ask(
        &self,
        history: &[ConversationTurn],
        new_message: &str,
        artifacts: &[UploadedArtifact],
        profile: Option<&LoanProfile>,
    ) -> Result<String> {
        self.service.preflight()?;

        let request = build_chat_request(history, new_message, artifacts, profile)?;
        info!(
            history_len = history.len(),
            artifact_count = artifacts.len(),
            model = %self.model,
            "Submitting conversation turn"
        );

        let response = self.service.generate(&self.model, request).await?;
        let text = response
            .primary_text()
            .ok_or(UnderwritingError::EmptyResponse)?;

        Ok(text)
    }
}

/// Rebuild the full request for one turn: prior history replayed in order,
/// then a user content carrying the documents and the new question.
fn build_chat_request(
    history: &[ConversationTurn],
    new_message: &str,
    artifacts: &[UploadedArtifact],
    profile: Option<&LoanProfile>,
) -> Result<GenerateRequest> {
    let mut contents = Vec::with_capacity(history.len() + 1);
    for turn in history {
        contents.push(Content {
            role: wire_role(turn.role).to_string(),
            parts: vec![Part::text(&turn.text)],
        });
    }

    // Documents first, question last, mirroring the extraction layout
    let mut parts: Vec<Part> = artifacts.iter().map(Part::inline).collect();
    parts.push(Part::text(new_message));
    contents.push(Content::user(parts));

    Ok(GenerateRequest {
        contents,
        generation_config: None,
        system_instruction: Some(SystemInstruction::from_text(&grounding_instruction(
            profile,
        )?)),
    })
}

/// Standing role instruction. The profile is embedded verbatim so the
/// assistant quotes the same numbers the dashboard shows.
fn grounding_instruction(profile: Option<&LoanProfile>) -> Result<String> {
    let profile_context = match profile {
        Some(profile) => format!(
            "the generated loan profile: {}",
            serde_json::to_string(profile)?
        ),
        None => "no generated loan profile yet, so ground every answer in the documents alone"
            .to_string(),
    };

    Ok(format!(
        "You are an expert Underwriting Assistant. \
         You have access to the user's uploaded documents and {}. \
         Answer questions specifically about these documents, the risk factors, or the underwriting decision. \
         Be professional, concise, and helpful.",
        profile_context
    ))
}

fn wire_role(role: TurnRole) -> &'static str {
    match role {
        TurnRole::User => "user",
        TurnRole::Assistant => "model",
    }
}

//
// ================= Conversation Log =================
//

/// Append-only record of the underwriting conversation.
///
/// Starts empty; the first append, conventionally the seeded analysis
/// summary, makes it active. Turns are never edited or removed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversationLog {
    turns: Vec<ConversationTurn>,
}

impl ConversationLog {
    pub fn new() -> Self {
        Self { turns: Vec::new() }
    }

    pub fn append(&mut self, turn: ConversationTurn) {
        self.turns.push(turn);
    }

    /// All turns in append order.
    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// True once at least one turn has been appended.
    pub fn is_active(&self) -> bool {
        !self.turns.is_empty()
    }

    pub fn last(&self) -> Option<&ConversationTurn> {
        self.turns.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gemini::MockGenerationService;
    use uuid::Uuid;

    fn sample_profile() -> LoanProfile {
        serde_json::from_str(
            r#"{
                "applicant": {
                    "fullName": "Ruth Okafor",
                    "currentAddress": "4 Quay Street, Portland, OR",
                    "employmentStatus": "Self-employed"
                },
                "income": {
                    "sources": [
                        {"source": "Consulting", "amount": 6200.0, "frequency": "Monthly", "verified": false}
                    ],
                    "totalMonthlyIncome": 6200.0
                },
                "liabilities": {
                    "debts": [
                        {"type": "Mortgage", "amount": 1850.0, "creditor": "Cascade Home Loans"}
                    ],
                    "totalMonthlyDebt": 1850.0
                },
                "metrics": {"debtToIncomeRatio": 29.8, "disposableIncome": 4350.0},
                "riskAssessment": {
                    "overallRisk": "High",
                    "factors": [
                        {"factor": "Irregular income", "severity": "High", "description": "Monthly deposits vary by more than 40%."}
                    ],
                    "summary": "Self-employment income with high variance."
                },
                "recommendation": {"decision": "MANUAL_REVIEW", "reasoning": "Request two further years of returns."}
            }"#,
        )
        .unwrap()
    }

    fn artifact(name: &str) -> UploadedArtifact {
        UploadedArtifact {
            id: Uuid::new_v4(),
            name: name.to_string(),
            media_type: "application/pdf".to_string(),
            payload: "JVBERi0=".to_string(),
        }
    }

    fn orchestrator(mock: Arc<MockGenerationService>) -> ConversationOrchestrator {
        ConversationOrchestrator::new(mock, "gemini-3-flash-preview".to_string())
    }

    #[tokio::test]
    async fn test_history_replayed_in_exact_order() {
        let mock = Arc::new(MockGenerationService::new());
        mock.push_text("The DTI is 29.8%.");

        let history = vec![
            ConversationTurn::assistant("Analysis complete.".to_string()),
            ConversationTurn::user("Why is the risk High?".to_string()),
            ConversationTurn::assistant("Because the income varies.".to_string()),
            ConversationTurn::user("Which months vary most?".to_string()),
            ConversationTurn::assistant("March and June.".to_string()),
        ];
        let docs = vec![artifact("returns.pdf")];
        let profile = sample_profile();

        let answer = orchestrator(mock.clone())
            .ask(&history, "And what is the DTI?", &docs, Some(&profile))
            .await
            .unwrap();
        assert_eq!(answer, "The DTI is 29.8%.");

        let requests = mock.requests();
        let (model, request) = &requests[0];
        assert_eq!(model, "gemini-3-flash-preview");
        assert_eq!(request.contents.len(), history.len() + 1);

        for (content, turn) in request.contents.iter().zip(&history) {
            let expected_role = match turn.role {
                TurnRole::User => "user",
                TurnRole::Assistant => "model",
            };
            assert_eq!(content.role, expected_role);
            assert_eq!(content.parts[0].text.as_deref(), Some(turn.text.as_str()));
        }
    }

    #[tokio::test]
    async fn test_documents_reattached_before_question() {
        let mock = Arc::new(MockGenerationService::new());
        mock.push_text("ok");

        let docs = vec![artifact("id.pdf"), artifact("paystub.pdf")];
        orchestrator(mock.clone())
            .ask(&[], "Is the ID legible?", &docs, None)
            .await
            .unwrap();

        let requests = mock.requests();
        let latest = requests[0].1.contents.last().unwrap();
        assert_eq!(latest.role, "user");
        assert_eq!(latest.parts.len(), docs.len() + 1);

        for (part, doc) in latest.parts[..docs.len()].iter().zip(&docs) {
            assert_eq!(
                part.inline_data.as_ref().unwrap().data,
                doc.payload
            );
        }
        assert_eq!(
            latest.parts.last().unwrap().text.as_deref(),
            Some("Is the ID legible?")
        );
    }

    #[tokio::test]
    async fn test_profile_embedded_verbatim_in_instruction() {
        let mock = Arc::new(MockGenerationService::new());
        mock.push_text("ok");

        let profile = sample_profile();
        orchestrator(mock.clone())
            .ask(&[], "Summarize the risk.", &[artifact("a.pdf")], Some(&profile))
            .await
            .unwrap();

        let requests = mock.requests();
        let instruction = requests[0]
            .1
            .system_instruction
            .as_ref()
            .unwrap()
            .parts[0]
            .text
            .as_deref()
            .unwrap()
            .to_string();

        assert!(instruction.contains("expert Underwriting Assistant"));
        assert!(instruction.contains(&serde_json::to_string(&profile).unwrap()));
    }

    #[tokio::test]
    async fn test_absent_profile_degrades_instruction() {
        let mock = Arc::new(MockGenerationService::new());
        mock.push_text("ok");

        orchestrator(mock.clone())
            .ask(&[], "What documents do you see?", &[artifact("a.pdf")], None)
            .await
            .unwrap();

        let requests = mock.requests();
        let instruction = requests[0]
            .1
            .system_instruction
            .as_ref()
            .unwrap()
            .parts[0]
            .text
            .as_deref()
            .unwrap()
            .to_string();

        assert!(instruction.contains("no generated loan profile yet"));
        assert!(!instruction.contains("null"));
    }

    #[tokio::test]
    async fn test_empty_history_builds_single_content() {
        let mock = Arc::new(MockGenerationService::new());
        mock.push_text("ok");

        orchestrator(mock.clone())
            .ask(&[], "First question", &[], None)
            .await
            .unwrap();

        assert_eq!(mock.requests()[0].1.contents.len(), 1);
    }

    #[tokio::test]
    async fn test_reply_split_across_parts_returned_whole() {
        let mock = Arc::new(MockGenerationService::new());
        mock.push_text_parts(&["The DTI is 29.8%, ", "which exceeds the usual threshold."]);

        let answer = orchestrator(mock)
            .ask(&[], "What is the DTI?", &[artifact("returns.pdf")], None)
            .await
            .unwrap();
        assert_eq!(answer, "The DTI is 29.8%, which exceeds the usual threshold.");
    }

    #[tokio::test]
    async fn test_empty_reply_surfaces_as_error() {
        let mock = Arc::new(MockGenerationService::new());
        mock.push_empty();

        let result = orchestrator(mock)
            .ask(&[], "Anything?", &[artifact("a.pdf")], None)
            .await;
        assert!(matches!(result, Err(UnderwritingError::EmptyResponse)));
    }

    #[tokio::test]
    async fn test_missing_credential_rejected_before_any_call() {
        let mock = Arc::new(MockGenerationService::without_credential());
        let result = orchestrator(mock.clone())
            .ask(&[], "Anything?", &[artifact("a.pdf")], None)
            .await;

        assert!(matches!(result, Err(UnderwritingError::MissingCredential)));
        assert_eq!(mock.request_count(), 0);
    }

    #[test]
    fn test_log_starts_empty_then_activates() {
        let mut log = ConversationLog::new();
        assert!(log.is_empty());
        assert!(!log.is_active());

        let profile = sample_profile();
        log.append(ConversationTurn::analysis_summary(&profile, 2));
        assert!(log.is_active());
        assert_eq!(log.len(), 1);
        assert_eq!(log.last().unwrap().role, TurnRole::Assistant);
    }

    #[test]
    fn test_log_preserves_append_order() {
        let mut log = ConversationLog::new();
        log.append(ConversationTurn::user("one".to_string()));
        log.append(ConversationTurn::assistant("two".to_string()));
        log.append(ConversationTurn::user("three".to_string()));

        let texts: Vec<&str> = log.turns().iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["one", "two", "three"]);
    }
}
