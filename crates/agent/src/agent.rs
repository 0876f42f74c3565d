//! Conversational agent state machine
//!
//! Stages follow the session on the gateway: idle → papers selected →
//! quoted → paid. Every input and reply is appended to the session log and
//! persisted through the gateway.

use anyhow::Result;
use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;

use crate::client::Gateway;
use paperledger_common::{
    api::{ChatPaper, ChatRequest, SessionUpdate, SessionView},
    content,
    db::models::{ChatMessage, MessageRole, RelatedPaper, SessionStage},
    llm::{summary_prompt, ChatModel},
};

pub const HELP: &str = "Commands:
  search <text>   find papers (plain text works too)
  select <n,...>  keep only the listed results
  quote           price the selected papers
  pay             pay the current quote
  read            summarise the papers you paid for
  ask <question>  ask the assistant about the catalogue
  status          show where this session stands
  help            show this message
  quit            leave";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Search(String),
    Select(Vec<usize>),
    Quote,
    Pay,
    Read,
    Ask(String),
    Status,
    Help,
    Quit,
}

impl Command {
    /// Parse one input line. Blank input yields `None`; a usage problem
    /// yields the message to show.
    pub fn parse(line: &str) -> std::result::Result<Option<Command>, String> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }

        let (verb, rest) = match line.split_once(char::is_whitespace) {
            Some((verb, rest)) => (verb, rest.trim()),
            None => (line, ""),
        };

        let command = match verb.to_ascii_lowercase().as_str() {
            "search" | "find" if rest.is_empty() => return Err("Usage: search <text>".to_string()),
            "search" | "find" => Command::Search(rest.to_string()),
            "select" => Command::Select(parse_indices(rest)?),
            "quote" => Command::Quote,
            "pay" => Command::Pay,
            "read" => Command::Read,
            "ask" if rest.is_empty() => return Err("Usage: ask <question>".to_string()),
            "ask" => Command::Ask(rest.to_string()),
            "status" => Command::Status,
            "help" | "?" => Command::Help,
            "quit" | "exit" => Command::Quit,
            _ => Command::Search(line.to_string()),
        };
        Ok(Some(command))
    }
}

/// 1-based result numbers separated by commas or spaces
fn parse_indices(text: &str) -> std::result::Result<Vec<usize>, String> {
    let mut indices = Vec::new();
    for part in text
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|p| !p.is_empty())
    {
        match part.parse::<usize>() {
            Ok(n) if n > 0 => {
                if !indices.contains(&n) {
                    indices.push(n);
                }
            }
            _ => return Err(format!("'{}' is not a result number", part)),
        }
    }
    if indices.is_empty() {
        return Err("Usage: select <n,...>".to_string());
    }
    Ok(indices)
}

fn stage_label(stage: SessionStage) -> &'static str {
    match stage {
        SessionStage::Idle => "idle",
        SessionStage::PapersSelected => "papers selected",
        SessionStage::Quoted => "quoted",
        SessionStage::Paid => "paid",
    }
}

/// Result of one input line
#[derive(Debug, Clone, PartialEq)]
pub struct Turn {
    pub reply: String,
    pub quit: bool,
}

/// Reply plus an optional new paper selection to persist with it
struct Outcome {
    reply: String,
    selection: Option<Vec<RelatedPaper>>,
}

impl Outcome {
    fn say(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            selection: None,
        }
    }
}

pub struct Agent<G> {
    gateway: G,
    chat_model: Arc<dyn ChatModel>,
    session: SessionView,
    /// Last search or chat matches, numbered for `select`
    listing: Vec<ChatPaper>,
    /// Papers paid for in this process
    paid: HashSet<String>,
    excerpt_chars: usize,
}

impl<G: Gateway> Agent<G> {
    pub fn new(
        gateway: G,
        chat_model: Arc<dyn ChatModel>,
        session: SessionView,
        paid: HashSet<String>,
        excerpt_chars: usize,
    ) -> Self {
        Self {
            gateway,
            chat_model,
            session,
            listing: Vec::new(),
            paid,
            excerpt_chars,
        }
    }

    /// Open a fresh session with an empty paid cache
    pub async fn start(gateway: G, chat_model: Arc<dyn ChatModel>, excerpt_chars: usize) -> Result<Self> {
        let session = gateway.create_session().await?;
        tracing::info!(session_id = %session.id, "Session opened");
        Ok(Self::new(gateway, chat_model, session, HashSet::new(), excerpt_chars))
    }

    pub fn session(&self) -> &SessionView {
        &self.session
    }

    pub fn paid_papers(&self) -> &HashSet<String> {
        &self.paid
    }

    /// Handle one line of input
    ///
    /// Command failures become replies; only a failure to persist the
    /// conversation is returned as an error.
    pub async fn handle(&mut self, line: &str) -> Result<Turn> {
        let command = match Command::parse(line) {
            Ok(Some(command)) => command,
            Ok(None) => {
                return Ok(Turn {
                    reply: String::new(),
                    quit: false,
                })
            }
            Err(usage) => {
                self.record(line, &usage, None).await?;
                return Ok(Turn {
                    reply: usage,
                    quit: false,
                });
            }
        };

        // The gateway appends chat turns to the session itself
        if let Command::Ask(question) = &command {
            let reply = match self.ask(question).await {
                Ok(reply) => reply,
                Err(e) => {
                    let reply = format!("Sorry, the assistant is unavailable: {}", e);
                    self.record(line, &reply, None).await?;
                    reply
                }
            };
            return Ok(Turn { reply, quit: false });
        }

        let quit = command == Command::Quit;
        let outcome = match self.execute(command).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!(error = %e, "Command failed");
                Outcome::say(format!("Sorry, that did not work: {}", e))
            }
        };

        self.record(line, &outcome.reply, outcome.selection).await?;
        Ok(Turn {
            reply: outcome.reply,
            quit,
        })
    }

    async fn execute(&mut self, command: Command) -> Result<Outcome> {
        match command {
            Command::Search(query) => self.search(&query).await,
            Command::Select(indices) => Ok(self.select(&indices)),
            Command::Quote => self.quote().await,
            Command::Pay => self.pay().await,
            Command::Read => Ok(Outcome::say(self.read().await)),
            Command::Status => Ok(Outcome::say(self.status())),
            Command::Help => Ok(Outcome::say(HELP)),
            Command::Quit => Ok(Outcome::say("Goodbye.")),
            Command::Ask(_) => Ok(Outcome::say(HELP)),
        }
    }

    async fn search(&mut self, query: &str) -> Result<Outcome> {
        let results = self.gateway.search_papers(query).await?;
        tracing::debug!(query, matches = results.len(), "Search finished");
        self.listing = results.iter().map(ChatPaper::from).collect();

        if self.listing.is_empty() {
            return Ok(Outcome {
                reply: format!("No papers matched \"{}\". Try different keywords.", query),
                selection: Some(Vec::new()),
            });
        }

        let lines: Vec<String> = self
            .listing
            .iter()
            .enumerate()
            .map(|(i, p)| format!("{}. {} by {} (fee {})", i + 1, p.title, p.authors.join(", "), p.fee))
            .collect();

        Ok(Outcome {
            reply: format!(
                "Found {} paper(s):\n{}\nType `select 1,2` to narrow the selection or `quote` to price it.",
                self.listing.len(),
                lines.join("\n")
            ),
            selection: Some(self.listing.iter().map(ChatPaper::to_related).collect()),
        })
    }

    fn select(&self, indices: &[usize]) -> Outcome {
        if self.listing.is_empty() {
            return Outcome::say("Search for papers first.");
        }
        if let Some(bad) = indices.iter().find(|&&n| n > self.listing.len()) {
            return Outcome::say(format!(
                "There is no result {}; the last search returned {}.",
                bad,
                self.listing.len()
            ));
        }

        let chosen: Vec<RelatedPaper> = indices
            .iter()
            .map(|&n| self.listing[n - 1].to_related())
            .collect();
        let titles: Vec<&str> = chosen.iter().map(|p| p.title.as_str()).collect();

        Outcome {
            reply: format!("Selected: {}", titles.join("; ")),
            selection: Some(chosen),
        }
    }

    async fn quote(&mut self) -> Result<Outcome> {
        match self.session.stage {
            SessionStage::Idle => return Ok(Outcome::say("Search for papers first.")),
            SessionStage::Paid => {
                return Ok(Outcome::say("This selection is already paid. Type `read`."))
            }
            SessionStage::PapersSelected | SessionStage::Quoted => {}
        }

        self.session = self.gateway.quote(self.session.id).await?;
        let Some(quote) = &self.session.quote else {
            anyhow::bail!("the gateway returned no quote");
        };

        Ok(Outcome::say(format!(
            "Quote for {} paper(s): papers {}, platform fee {}, total {}. Type `pay` to confirm.",
            quote.papers.len(),
            quote.papers_cost,
            quote.platform_fee,
            quote.total
        )))
    }

    async fn pay(&mut self) -> Result<Outcome> {
        match self.session.stage {
            SessionStage::Quoted => {}
            SessionStage::Paid => return Ok(Outcome::say("Already paid. Type `read`.")),
            _ => return Ok(Outcome::say("Ask for a quote first.")),
        }

        let id = self.session.id;
        match self.gateway.pay(id).await {
            Ok(session) => self.session = session,
            Err(e) => {
                // The gateway records the failure on the session
                if let Ok(session) = self.gateway.get_session(id).await {
                    self.session = session;
                }
                return Err(e);
            }
        }

        let Some(receipt) = &self.session.payment else {
            anyhow::bail!("the gateway returned no payment receipt");
        };
        self.paid.extend(receipt.paper_ids.iter().cloned());
        tracing::info!(session_id = %id, amount = receipt.amount, simulated = receipt.simulated, "Payment settled");

        let detail = match (&receipt.transaction_id, receipt.simulated) {
            (Some(tx), _) => format!("transaction {}", tx),
            (None, true) => "simulated, no funds moved".to_string(),
            (None, false) => "no transfer needed".to_string(),
        };
        Ok(Outcome::say(format!(
            "Paid {} for {} paper(s) ({}). Type `read` for summaries.",
            receipt.amount,
            receipt.paper_ids.len(),
            detail
        )))
    }

    /// Summaries of the paid papers in the current selection
    async fn read(&self) -> String {
        let papers: Vec<&RelatedPaper> = self
            .session
            .related_papers
            .iter()
            .filter(|p| self.paid.contains(&p.paper_id))
            .collect();

        if papers.is_empty() {
            return "Nothing paid yet. Use `quote` and then `pay`.".to_string();
        }

        let mut sections = Vec::with_capacity(papers.len());
        for paper in papers {
            let section = match self.summarize(paper).await {
                Ok(summary) => summary,
                Err(e) => {
                    tracing::warn!(paper_id = %paper.paper_id, error = %e, "Could not summarise paper");
                    format!("{}: could not be read ({})", paper.title, e)
                }
            };
            sections.push(section);
        }
        sections.join("\n\n")
    }

    async fn summarize(&self, paper: &RelatedPaper) -> Result<String> {
        let file = self.gateway.download_content(&paper.paper_id).await?;
        let text = content::extract_text(&file.media_type, &file.bytes)?;
        let excerpt = content::excerpt(&text, self.excerpt_chars);
        let prompt = summary_prompt(&paper.title, &excerpt);
        Ok(self.chat_model.complete(&prompt.system, &prompt.user).await?)
    }

    fn status(&self) -> String {
        let mut status = format!(
            "Session {}: {}, {} paper(s) selected, {} paid in this run.",
            self.session.id,
            stage_label(self.session.stage),
            self.session.related_papers.len(),
            self.paid.len()
        );
        if let Some(quote) = &self.session.quote {
            status.push_str(&format!(" Current quote: {}.", quote.total));
        }
        status
    }

    async fn ask(&mut self, question: &str) -> Result<String> {
        let id = self.session.id;
        let response = self
            .gateway
            .chat(&ChatRequest {
                message: Some(question.to_string()),
                session_id: Some(id),
            })
            .await?;
        self.session = self.gateway.get_session(id).await?;

        // Unless the session is paid, the gateway selected the chat matches
        if !response.papers.is_empty() && self.session.stage != SessionStage::Paid {
            self.listing = response.papers;
        }
        Ok(response.reply)
    }

    /// Append the exchange to the session log and persist it
    async fn record(
        &mut self,
        input: &str,
        reply: &str,
        selection: Option<Vec<RelatedPaper>>,
    ) -> Result<()> {
        // A paid session keeps its selection; a new one starts the next purchase
        if selection.is_some() && self.session.stage == SessionStage::Paid {
            let paid_id = self.session.id;
            self.session = self.gateway.create_session().await?;
            tracing::info!(paid_session = %paid_id, session_id = %self.session.id, "New session opened");
        }

        let now = Utc::now();
        self.session.messages.push(ChatMessage {
            role: MessageRole::User,
            text: input.trim().to_string(),
            time: now,
        });
        self.session.messages.push(ChatMessage {
            role: MessageRole::Assistant,
            text: reply.to_string(),
            time: now,
        });

        let update = SessionUpdate {
            messages: Some(self.session.messages.clone()),
            related_papers: selection,
        };
        self.session = self.gateway.update_session(self.session.id, &update).await?;
        Ok(())
    }
}
