//! VoxCal - natural-language calendar assistant
//!
//! Thin conversation loop: reads utterances from stdin, runs them through
//! the turn service, prints results, and collects the explicit yes/no that
//! destructive actions require. All pipeline logic lives in `voxcal-core`.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use tokio::io::{AsyncBufReadExt, BufReader};
use voxcal_core::{CalendarGateway, TurnService};
use voxcal_domain::{ActionResult, CalendarAction, ClarificationRequest, Utterance};
use voxcal_infra::config::AppConfig;
use voxcal_infra::integrations::google::{GoogleAuthManager, GoogleCalendarGateway};
use voxcal_infra::{observability, AnthropicExtractor, HttpClient};

/// What the loop is waiting on from the user, if anything.
enum Pending {
    Clarification(ClarificationRequest),
    Confirmation(CalendarAction),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logging first so .env loading is visible.
    observability::init_tracing();

    match dotenvy::dotenv() {
        Ok(path) => tracing::info!(path = %path.display(), "loaded .env"),
        Err(err) => tracing::debug!(error = %err, "no .env file loaded"),
    }

    // Fatal on missing secrets, before the pipeline is reachable.
    let config = AppConfig::load().context("configuration error")?;

    let http = HttpClient::builder()
        .timeout(Duration::from_secs(config.settings.request_timeout_secs))
        .user_agent("voxcal/0.1")
        .build()
        .context("failed to build HTTP client")?;

    let auth = GoogleAuthManager::new(&config.google, http.clone());
    let gateway: Arc<dyn CalendarGateway> = Arc::new(GoogleCalendarGateway::new(
        http.clone(),
        auth,
        config.settings.calendar_id.clone(),
    ));
    let extractor = Arc::new(
        AnthropicExtractor::new(config.anthropic_api_key.clone(), http)
            .with_model(config.settings.model.clone()),
    );

    // Stamp every utterance with the calendar's zone so relative times
    // resolve where the user lives.
    let timezone = gateway.primary_timezone().await.ok();
    if let Some(zone) = &timezone {
        tracing::info!(%zone, "using primary calendar timezone");
    }

    let turns = TurnService::new(extractor, gateway);

    println!("VoxCal calendar assistant");
    println!("Examples:");
    println!("  - Schedule lunch with Sarah tomorrow at noon");
    println!("  - What's on my calendar today?");
    println!("  - Move my 3pm meeting to Friday");
    println!("Type 'quit' to exit.\n");

    let mut pending: Option<Pending> = None;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print_prompt();
        let Some(line) = lines.next_line().await.context("failed to read input")? else {
            break;
        };
        let input = line.trim().to_string();

        if input.is_empty() {
            continue;
        }
        if matches!(input.to_lowercase().as_str(), "quit" | "exit" | "q") {
            println!("Goodbye!");
            break;
        }

        pending = run_turn(&turns, &input, pending.take(), timezone.as_deref()).await;
    }

    Ok(())
}

fn print_prompt() {
    use std::io::Write;
    print!("You: ");
    let _ = std::io::stdout().flush();
}

/// Run one input through the pipeline, printing the outcome and returning
/// the state the next input should be interpreted against.
async fn run_turn(
    turns: &TurnService,
    input: &str,
    pending: Option<Pending>,
    timezone: Option<&str>,
) -> Option<Pending> {
    // An explicit yes/no answers an outstanding confirmation directly,
    // without another model round trip. Anything else abandons the
    // confirmation and is treated as a fresh request.
    let pending = match pending {
        Some(Pending::Confirmation(action)) => match input.to_lowercase().as_str() {
            "yes" | "y" => {
                return match turns.confirm(action).await {
                    Ok(result) => report(result, None),
                    Err(err) => {
                        println!("Agent: {err}\n");
                        None
                    }
                };
            }
            "no" | "n" => {
                println!("Agent: Okay, I won't do that.\n");
                return None;
            }
            _ => None,
        },
        other => other,
    };

    let pending_action = match &pending {
        Some(Pending::Clarification(request)) => Some(&request.pending),
        _ => None,
    };

    let mut utterance = Utterance::new(input, Utc::now());
    if let Some(zone) = timezone {
        utterance = utterance.with_timezone(zone);
    }

    match turns.process(&utterance, pending_action).await {
        Ok(outcome) => report(outcome.result, outcome.action),
        Err(err) => {
            println!("Agent: {err}\n");
            None
        }
    }
}

/// Print a turn result and derive the next pending state.
fn report(result: ActionResult, action: Option<CalendarAction>) -> Option<Pending> {
    match result {
        ActionResult::Applied { summary, .. } => {
            println!("Agent: {summary}\n");
            None
        }
        ActionResult::Rejected { reason } => {
            if reason.starts_with("needs confirmation") {
                if let Some(action) = action {
                    println!("Agent: I'm about to {}. Proceed? (yes/no)\n", action.describe());
                    return Some(Pending::Confirmation(action));
                }
            }
            println!("Agent: {reason}\n");
            None
        }
        ActionResult::Clarify(request) => {
            println!("Agent: {}\n", request.question);
            Some(Pending::Clarification(request))
        }
    }
}
