//! Structured-output schema for the loan profile
//!
//! Declarative description of [`crate::models::LoanProfile`] in the Gemini
//! structured-output dialect. The schema is what actually constrains the
//! service, so every object node lists its required keys and every
//! categorical field carries its closed value set; a drift between this
//! module and models.rs surfaces as MalformedOutput at parse time rather
//! than corrupting silently.

use serde_json::{json, Value};

/// Closed severity scale, shared by overallRisk and per-factor severity.
pub const RISK_LEVELS: [&str; 4] = ["Low", "Medium", "High", "Critical"];

/// Closed decision set for the final recommendation.
pub const DECISIONS: [&str; 3] = ["APPROVE", "DENY", "MANUAL_REVIEW"];

/// Response schema attached to every extraction request.
pub fn loan_profile_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "applicant": {
                "type": "OBJECT",
                "properties": {
                    "fullName": { "type": "STRING" },
                    "currentAddress": { "type": "STRING" },
                    "employmentStatus": { "type": "STRING" },
                    "estimatedCreditScore": {
                        "type": "NUMBER",
                        "description": "Estimated score if found in documents, else omit"
                    }
                },
                "required": ["fullName", "currentAddress", "employmentStatus"]
            },
            "income": {
                "type": "OBJECT",
                "properties": {
                    "sources": {
                        "type": "ARRAY",
                        "items": {
                            "type": "OBJECT",
                            "properties": {
                                "source": {
                                    "type": "STRING",
                                    "description": "Employer name or income type"
                                },
                                "amount": {
                                    "type": "NUMBER",
                                    "description": "Monthly amount"
                                },
                                "frequency": {
                                    "type": "STRING",
                                    "description": "Pay frequency (e.g., Bi-weekly, Monthly)"
                                },
                                "verified": {
                                    "type": "BOOLEAN",
                                    "description": "Does the document explicitly verify this?"
                                }
                            },
                            "required": ["source", "amount", "frequency", "verified"]
                        }
                    },
                    "totalMonthlyIncome": { "type": "NUMBER" }
                },
                "required": ["sources", "totalMonthlyIncome"]
            },
            "liabilities": {
                "type": "OBJECT",
                "properties": {
                    "debts": {
                        "type": "ARRAY",
                        "items": {
                            "type": "OBJECT",
                            "properties": {
                                "type": { "type": "STRING" },
                                "amount": {
                                    "type": "NUMBER",
                                    "description": "Monthly payment amount"
                                },
                                "creditor": { "type": "STRING" }
                            },
                            "required": ["type", "amount", "creditor"]
                        }
                    },
                    "totalMonthlyDebt": { "type": "NUMBER" }
                },
                "required": ["debts", "totalMonthlyDebt"]
            },
            "metrics": {
                "type": "OBJECT",
                "properties": {
                    "debtToIncomeRatio": {
                        "type": "NUMBER",
                        "description": "Calculated DTI percentage (0-100)"
                    },
                    "disposableIncome": { "type": "NUMBER" }
                },
                "required": ["debtToIncomeRatio", "disposableIncome"]
            },
            "riskAssessment": {
                "type": "OBJECT",
                "properties": {
                    "overallRisk": { "type": "STRING", "enum": RISK_LEVELS },
                    "factors": {
                        "type": "ARRAY",
                        "items": {
                            "type": "OBJECT",
                            "properties": {
                                "factor": { "type": "STRING" },
                                "severity": { "type": "STRING", "enum": RISK_LEVELS },
                                "description": { "type": "STRING" }
                            },
                            "required": ["factor", "severity", "description"]
                        }
                    },
                    "summary": {
                        "type": "STRING",
                        "description": "Executive summary of the risk profile."
                    }
                },
                "required": ["overallRisk", "factors", "summary"]
            },
            "recommendation": {
                "type": "OBJECT",
                "properties": {
                    "decision": { "type": "STRING", "enum": DECISIONS },
                    "reasoning": { "type": "STRING" },
                    "suggestedLoanAmount": { "type": "NUMBER" }
                },
                "required": ["decision", "reasoning"]
            }
        },
        "required": [
            "applicant",
            "income",
            "liabilities",
            "metrics",
            "riskAssessment",
            "recommendation"
        ]
    })
}
