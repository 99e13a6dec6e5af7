//! Core data models for the underwriting orchestrator

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

//
// ================= Enums =================
//

/// Severity scale shared by the overall assessment and individual factors.
///
/// Wire values are the capitalized variant names ("Low", "Medium", ...).
/// The set is closed: any other value fails deserialization.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

/// Final underwriting outcome. Closed set, SCREAMING_SNAKE_CASE on the wire.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    Approve,
    Deny,
    ManualReview,
}

/// Author of a conversation turn.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
}

//
// ================= Artifacts =================
//

/// One uploaded document, encoded for transport to the generation service.
///
/// The payload is the base64 form of the raw bytes; the id is opaque and
/// assigned at encode time, never derived from content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadedArtifact {
    pub id: Uuid,
    pub name: String,
    pub media_type: String,
    pub payload: String,
}

//
// ================= Loan Profile =================
//

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicantInfo {
    pub full_name: String,
    pub current_address: String,
    pub employment_status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_credit_score: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomeSource {
    pub source: String,
    pub amount: f64,
    pub frequency: String,
    pub verified: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomeSummary {
    pub sources: Vec<IncomeSource>,
    pub total_monthly_income: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Liability {
    #[serde(rename = "type")]
    pub debt_type: String,
    pub amount: f64,
    pub creditor: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiabilitySummary {
    pub debts: Vec<Liability>,
    pub total_monthly_debt: f64,
}

/// Derived affordability metrics. `debt_to_income_ratio` is a percentage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AffordabilityMetrics {
    pub debt_to_income_ratio: f64,
    pub disposable_income: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskFactor {
    pub factor: String,
    pub severity: RiskLevel,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskAssessment {
    pub overall_risk: RiskLevel,
    pub factors: Vec<RiskFactor>,
    pub summary: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub decision: Decision,
    pub reasoning: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_loan_amount: Option<f64>,
}

/// The structured risk profile produced by one analysis run.
///
/// Field names follow the generation service's JSON contract (camelCase),
/// so a profile round-trips verbatim between extraction output and the
/// grounding context of later chat turns.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoanProfile {
    pub applicant: ApplicantInfo,
    pub income: IncomeSummary,
    pub liabilities: LiabilitySummary,
    pub metrics: AffordabilityMetrics,
    pub risk_assessment: RiskAssessment,
    pub recommendation: Recommendation,
}

//
// ================= Conversation =================
//

/// A single message in the underwriting conversation. Immutable once built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub id: Uuid,
    pub role: TurnRole,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl ConversationTurn {
    pub fn new(role: TurnRole, text: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            text,
            timestamp: Utc::now(),
        }
    }

    pub fn user(text: String) -> Self {
        Self::new(TurnRole::User, text)
    }

    pub fn assistant(text: String) -> Self {
        Self::new(TurnRole::Assistant, text)
    }

    /// Assistant-authored opener seeded right after a successful analysis,
    /// so the first real question already has a prior turn to build on.
    pub fn analysis_summary(profile: &LoanProfile, artifact_count: usize) -> Self {
        Self::assistant(format!(
            "Analysis complete. I've reviewed the {} documents for {}. \
             The overall risk is assessed as {}. \
             I am ready to answer specific queries regarding the file.",
            artifact_count, profile.applicant.full_name, profile.risk_assessment.overall_risk
        ))
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RiskLevel::Low => "Low",
            RiskLevel::Medium => "Medium",
            RiskLevel::High => "High",
            RiskLevel::Critical => "Critical",
        };
        write!(f, "{}", s)
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Decision::Approve => "APPROVE",
            Decision::Deny => "DENY",
            Decision::ManualReview => "MANUAL_REVIEW",
        };
        write!(f, "{}", s)
    }
}
