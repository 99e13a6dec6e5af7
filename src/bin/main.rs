use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, warn};
use underwriting_orchestrator::{
    config::GeminiConfig,
    conversation::{
        ConversationLog, ConversationOrchestrator, EMPTY_RESPONSE_FALLBACK,
        TRANSPORT_FAILURE_FALLBACK,
    },
    encoder,
    error::UnderwritingError,
    extraction::ExtractionOrchestrator,
    gemini::GeminiClient,
    models::ConversationTurn,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    // Load environment variables
    dotenv::dotenv().ok();

    let paths: Vec<PathBuf> = std::env::args().skip(1).map(PathBuf::from).collect();
    if paths.is_empty() {
        eprintln!("Usage: underwriter <document> [document ...]");
        eprintln!("Supported formats: PDF, PNG, JPEG, WebP");
        std::process::exit(2);
    }

    info!("Loan Underwriting Orchestrator starting");

    let config = GeminiConfig::from_env();
    let client = Arc::new(GeminiClient::new(config.clone()));
    let extraction = ExtractionOrchestrator::new(client.clone(), config.extraction_model.clone());
    let conversation = ConversationOrchestrator::new(client, config.chat_model.clone());

    let artifacts = encoder::encode_files(&paths).await?;
    info!(artifact_count = artifacts.len(), "Documents encoded");

    let profile = match extraction.analyze(&artifacts).await {
        Ok(profile) => profile,
        Err(e) => {
            eprintln!("Analysis failed: {}", e);
            return Err(Box::new(e) as Box<dyn std::error::Error>);
        }
    };

    println!("\n=== LOAN PROFILE ===");
    println!("Applicant: {}", profile.applicant.full_name);
    println!("Employment: {}", profile.applicant.employment_status);
    println!(
        "Monthly income: ${:.2}",
        profile.income.total_monthly_income
    );
    println!(
        "Monthly debt: ${:.2}",
        profile.liabilities.total_monthly_debt
    );
    println!("DTI: {:.1}%", profile.metrics.debt_to_income_ratio);
    println!("Overall risk: {}", profile.risk_assessment.overall_risk);
    for factor in &profile.risk_assessment.factors {
        println!(
            "  [{}] {}: {}",
            factor.severity, factor.factor, factor.description
        );
    }
    println!("Decision: {}", profile.recommendation.decision);
    println!("Reasoning: {}", profile.recommendation.reasoning);
    if let Some(amount) = profile.recommendation.suggested_loan_amount {
        println!("Suggested loan amount: ${:.2}", amount);
    }

    let mut log = ConversationLog::new();
    log.append(ConversationTurn::analysis_summary(&profile, artifacts.len()));
    println!(
        "\n{}",
        log.last().map(|turn| turn.text.as_str()).unwrap_or_default()
    );
    println!("Type a question, or \"exit\" to quit.");

    let stdin = io::stdin();
    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if question.eq_ignore_ascii_case("exit") || question.eq_ignore_ascii_case("quit") {
            break;
        }

        // History snapshot excludes the question being asked
        let prior_turns = log.turns().to_vec();
        log.append(ConversationTurn::user(question.to_string()));

        match conversation
            .ask(&prior_turns, question, &artifacts, Some(&profile))
            .await
        {
            Ok(answer) => {
                println!("{}", answer);
                log.append(ConversationTurn::assistant(answer));
            }
            Err(UnderwritingError::EmptyResponse) => {
                println!("{}", EMPTY_RESPONSE_FALLBACK);
                log.append(ConversationTurn::assistant(
                    EMPTY_RESPONSE_FALLBACK.to_string(),
                ));
            }
            Err(e) => {
                warn!("Chat turn failed: {}", e);
                println!("{}", TRANSPORT_FAILURE_FALLBACK);
                log.append(ConversationTurn::assistant(
                    TRANSPORT_FAILURE_FALLBACK.to_string(),
                ));
            }
        }
    }

    Ok(())
}
