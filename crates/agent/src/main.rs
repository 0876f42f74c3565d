//! PaperLedger Agent
//!
//! Console front end over the gateway API:
//! 1. Opens a session on the gateway
//! 2. Searches papers and narrows the selection
//! 3. Requests a quote and records a payment
//! 4. Downloads paid papers and summarises them through the LLM

mod agent;
mod client;

use anyhow::Context;
use paperledger_common::{config::AppConfig, llm, VERSION};
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::agent::{Agent, HELP};
use crate::client::HttpGateway;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("Failed to load configuration")?;

    // Logs go to stderr so replies on stdout stay readable
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.observability.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    info!(server = %config.agent.server_url, "Starting PaperLedger Agent v{}", VERSION);

    let gateway = HttpGateway::new(&config.agent.server_url, config.request_timeout())?;
    let chat_model = llm::create_chat_model(&config.llm)?;

    let mut agent = Agent::start(gateway, chat_model, config.agent.excerpt_chars)
        .await
        .with_context(|| format!("Could not open a session on {}", config.agent.server_url))?;

    println!("PaperLedger agent ready (session {}).", agent.session().id);
    println!("{}", HELP);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };

        match agent.handle(&line).await {
            Ok(turn) => {
                if !turn.reply.is_empty() {
                    println!("{}", turn.reply);
                }
                if turn.quit {
                    break;
                }
            }
            Err(e) => {
                warn!(error = %e, "Failed to save the conversation");
                println!("Could not reach the server: {}", e);
            }
        }
    }

    info!("Agent stopped");
    Ok(())
}
