//! Extraction orchestrator
//!
//! Runs the single schema-constrained analysis request that turns a set of
//! uploaded documents into a typed [`LoanProfile`]. One invocation means at
//! most one service call: no retries, no partial profiles. Keeping a second
//! analysis off the same artifact set while one is in flight is the
//! caller's job.

use std::sync::Arc;

use tracing::{info, warn};

use crate::error::UnderwritingError;
use crate::gemini::{
    Content, GenerateRequest, GenerationConfig, GenerationService, Part, ThinkingConfig,
};
use crate::models::{LoanProfile, UploadedArtifact};
use crate::schema::loan_profile_schema;
use crate::Result;

/// Internal reasoning budget for underwriting arithmetic (DTI, income
/// normalization).
const EXTRACTION_THINKING_BUDGET: i32 = 4096;

/// Fixed task instruction sent with every analysis run.
const EXTRACTION_INSTRUCTION: &str = "\
You are a Senior Loan Underwriter AI.
Analyze the attached financial documents (Pay stubs, Bank Statements, Tax Returns, ID, etc.).

Your goal is to extract structured data to build a Loan Profile.
1. Identify the applicant.
2. Calculate monthly income (normalize to monthly if pay is bi-weekly/weekly).
3. Identify recurring monthly debts/liabilities.
4. Calculate the Debt-to-Income (DTI) ratio.
5. Assess risk factors (e.g., overdraft fees, irregular income, high DTI).
6. Provide a recommendation.

Be conservative in your estimates. If data is ambiguous, flag it in the risk assessment.";

pub struct ExtractionOrchestrator {
    service: Arc<dyn GenerationService>,
    model: String,
}

impl ExtractionOrchestrator {
    pub fn new(service: Arc<dyn GenerationService>, model: String) -> Self {
        Self { service, model }
    }

    /// Analyze the uploaded documents into a loan profile.
    ///
    /// Rejects an empty artifact set and a missing credential before any
    /// request is constructed. Every failure is surfaced to the caller;
    /// nothing is defaulted.
    pub async fn analyze(&self, artifacts: &[UploadedArtifact]) -> Result<LoanProfile> {
        if artifacts.is_empty() {
            return Err(UnderwritingError::EmptyArtifactSet);
        }
        self.service.preflight()?;

        info!(
            artifact_count = artifacts.len(),
            model = %self.model,
            "Starting document analysis"
        );

        let request = build_extraction_request(artifacts);
        let response = self.service.generate(&self.model, request).await?;

        let text = response
            .primary_text()
            .ok_or(UnderwritingError::EmptyResponse)?;
        let profile = parse_profile(&text)?;

        info!(
            applicant = %profile.applicant.full_name,
            overall_risk = %profile.risk_assessment.overall_risk,
            decision = %profile.recommendation.decision,
            "Analysis complete"
        );

        Ok(profile)
    }
}

/// Assemble the one-shot extraction request: task instruction first, then
/// every document in upload order, constrained to the profile schema.
fn build_extraction_request(artifacts: &[UploadedArtifact]) -> GenerateRequest {
    let mut parts = vec![Part::text(EXTRACTION_INSTRUCTION)];
    parts.extend(artifacts.iter().map(Part::inline));

    GenerateRequest {
        contents: vec![Content::user(parts)],
        generation_config: Some(GenerationConfig {
            response_mime_type: Some("application/json".to_string()),
            response_schema: Some(loan_profile_schema()),
            thinking_config: Some(ThinkingConfig {
                thinking_budget: EXTRACTION_THINKING_BUDGET,
            }),
        }),
        system_instruction: None,
    }
}

/// Strip optional markdown fences, parse, and enforce structural checks.
fn parse_profile(text: &str) -> Result<LoanProfile> {
    let cleaned = text
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();

    let profile: LoanProfile = serde_json::from_str(cleaned).map_err(|e| {
        warn!("Profile output failed to parse: {}", e);
        UnderwritingError::MalformedOutput(format!("profile JSON did not match schema: {}", e))
    })?;

    validate_profile(&profile)?;
    Ok(profile)
}

/// Structural invariants serde cannot express. Cross-field arithmetic
/// (income totals, disposable income) is the generation service's
/// responsibility and is not re-derived here.
fn validate_profile(profile: &LoanProfile) -> Result<()> {
    let dti = profile.metrics.debt_to_income_ratio;
    if !(0.0..=100.0).contains(&dti) {
        return Err(UnderwritingError::MalformedOutput(format!(
            "debtToIncomeRatio {} is outside the 0-100 percentage range",
            dti
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gemini::MockGenerationService;
    use crate::models::{Decision, RiskLevel};
    use uuid::Uuid;

    const PROFILE_JSON: &str = r#"{
        "applicant": {
            "fullName": "Dana Whitfield",
            "currentAddress": "18 Alder Row, Springfield, IL",
            "employmentStatus": "Employed (Full-time)",
            "estimatedCreditScore": 702
        },
        "income": {
            "sources": [
                {"source": "Acme Corp payroll", "amount": 4100.0, "frequency": "Bi-weekly", "verified": true},
                {"source": "Rental income", "amount": 850.0, "frequency": "Monthly", "verified": false}
            ],
            "totalMonthlyIncome": 4950.0
        },
        "liabilities": {
            "debts": [
                {"type": "Auto Loan", "amount": 430.0, "creditor": "First Motor Credit"},
                {"type": "Credit Card", "amount": 210.0, "creditor": "Meridian Bank"}
            ],
            "totalMonthlyDebt": 640.0
        },
        "metrics": {"debtToIncomeRatio": 12.9, "disposableIncome": 4310.0},
        "riskAssessment": {
            "overallRisk": "Medium",
            "factors": [
                {"factor": "Unverified rental income", "severity": "Medium", "description": "No lease agreement among the documents."}
            ],
            "summary": "Stable primary income with one unverified secondary source."
        },
        "recommendation": {
            "decision": "MANUAL_REVIEW",
            "reasoning": "Verify the rental income before final approval.",
            "suggestedLoanAmount": 18000.0
        }
    }"#;

    fn artifact(name: &str, media_type: &str) -> UploadedArtifact {
        UploadedArtifact {
            id: Uuid::new_v4(),
            name: name.to_string(),
            media_type: media_type.to_string(),
            payload: "ZGF0YQ==".to_string(),
        }
    }

    fn artifacts() -> Vec<UploadedArtifact> {
        vec![
            artifact("paystub.png", "image/png"),
            artifact("statement.pdf", "application/pdf"),
            artifact("id.jpg", "image/jpeg"),
        ]
    }

    fn orchestrator(mock: Arc<MockGenerationService>) -> ExtractionOrchestrator {
        ExtractionOrchestrator::new(mock, "gemini-3-pro-preview".to_string())
    }

    #[tokio::test]
    async fn test_empty_artifact_set_rejected_before_any_call() {
        let mock = Arc::new(MockGenerationService::new());
        let result = orchestrator(mock.clone()).analyze(&[]).await;

        assert!(matches!(result, Err(UnderwritingError::EmptyArtifactSet)));
        assert_eq!(mock.request_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_credential_rejected_before_any_call() {
        let mock = Arc::new(MockGenerationService::without_credential());
        let result = orchestrator(mock.clone()).analyze(&artifacts()).await;

        assert!(matches!(result, Err(UnderwritingError::MissingCredential)));
        assert_eq!(mock.request_count(), 0);
    }

    #[tokio::test]
    async fn test_analyze_builds_schema_constrained_request() {
        let mock = Arc::new(MockGenerationService::new());
        mock.push_text(PROFILE_JSON);

        let docs = artifacts();
        let profile = orchestrator(mock.clone()).analyze(&docs).await.unwrap();

        assert_eq!(profile.applicant.full_name, "Dana Whitfield");
        assert!(profile.income.total_monthly_income > 0.0);
        assert!(profile.liabilities.total_monthly_debt >= 0.0);
        assert!((0.0..=100.0).contains(&profile.metrics.debt_to_income_ratio));
        assert_eq!(profile.risk_assessment.overall_risk, RiskLevel::Medium);
        assert_eq!(profile.recommendation.decision, Decision::ManualReview);

        let requests = mock.requests();
        assert_eq!(requests.len(), 1);
        let (model, request) = &requests[0];
        assert_eq!(model, "gemini-3-pro-preview");

        // Single user content: instruction first, then documents in order
        assert_eq!(request.contents.len(), 1);
        let content = &request.contents[0];
        assert_eq!(content.role, "user");
        assert_eq!(content.parts.len(), 1 + docs.len());
        assert!(content.parts[0]
            .text
            .as_deref()
            .unwrap()
            .contains("Senior Loan Underwriter"));
        for (part, doc) in content.parts[1..].iter().zip(&docs) {
            let inline = part.inline_data.as_ref().unwrap();
            assert_eq!(inline.mime_type, doc.media_type);
            assert_eq!(inline.data, doc.payload);
        }

        let config = request.generation_config.as_ref().unwrap();
        assert_eq!(config.response_mime_type.as_deref(), Some("application/json"));
        assert!(config.response_schema.is_some());
        assert_eq!(config.thinking_config.as_ref().unwrap().thinking_budget, 4096);
        assert!(request.system_instruction.is_none());
    }

    #[tokio::test]
    async fn test_fenced_output_still_parses() {
        let mock = Arc::new(MockGenerationService::new());
        mock.push_text(&format!("```json\n{}\n```", PROFILE_JSON));

        let profile = orchestrator(mock).analyze(&artifacts()).await.unwrap();
        assert_eq!(profile.liabilities.debts.len(), 2);
    }

    #[tokio::test]
    async fn test_profile_split_across_text_parts_still_parses() {
        let mock = Arc::new(MockGenerationService::new());
        let (head, tail) = PROFILE_JSON.split_at(PROFILE_JSON.len() / 2);
        mock.push_text_parts(&[head, tail]);

        let profile = orchestrator(mock).analyze(&artifacts()).await.unwrap();
        assert_eq!(profile.applicant.full_name, "Dana Whitfield");
        assert_eq!(profile.income.sources.len(), 2);
    }

    #[tokio::test]
    async fn test_empty_response_surfaces_as_error() {
        let mock = Arc::new(MockGenerationService::new());
        mock.push_empty();

        let result = orchestrator(mock).analyze(&artifacts()).await;
        assert!(matches!(result, Err(UnderwritingError::EmptyResponse)));
    }

    #[tokio::test]
    async fn test_non_json_output_is_malformed() {
        let mock = Arc::new(MockGenerationService::new());
        mock.push_text("I could not read the documents clearly.");

        let result = orchestrator(mock).analyze(&artifacts()).await;
        assert!(matches!(result, Err(UnderwritingError::MalformedOutput(_))));
    }

    #[tokio::test]
    async fn test_unknown_enum_value_is_malformed() {
        let mock = Arc::new(MockGenerationService::new());
        mock.push_text(&PROFILE_JSON.replace("\"Medium\"", "\"Severe\""));

        let result = orchestrator(mock).analyze(&artifacts()).await;
        assert!(matches!(result, Err(UnderwritingError::MalformedOutput(_))));
    }

    #[tokio::test]
    async fn test_out_of_range_dti_is_malformed() {
        let mock = Arc::new(MockGenerationService::new());
        mock.push_text(&PROFILE_JSON.replace("12.9", "140.0"));

        let result = orchestrator(mock).analyze(&artifacts()).await;
        match result {
            Err(UnderwritingError::MalformedOutput(detail)) => {
                assert!(detail.contains("debtToIncomeRatio"))
            }
            other => panic!("expected MalformedOutput, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_analyze_is_repeatable() {
        let mock = Arc::new(MockGenerationService::new());
        mock.push_text(PROFILE_JSON);
        mock.push_text(PROFILE_JSON);

        let orchestrator = orchestrator(mock.clone());
        let docs = artifacts();
        let first = orchestrator.analyze(&docs).await.unwrap();
        let second = orchestrator.analyze(&docs).await.unwrap();

        assert_eq!(first.applicant.full_name, second.applicant.full_name);
        assert_eq!(mock.request_count(), 2);
    }
}
