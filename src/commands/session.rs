//! Interactive crawling session
//!
//! Crawls run on tokio tasks and report back over a channel. The session
//! drains the channel on a fixed interval and is the only writer to the
//! catalog. Deliveries started before a `clear` are dropped.

use super::crawl::{nothing_to_export, print_dictionary, print_lineage, print_statistics};
use crate::catalog::Catalog;
use crate::config::Config;
use crate::crawl::{
    parse_header_json, parse_header_pairs, CrawlOutcome, CrawlStatus, DatabaseCrawler,
};
use crate::error::{Error, Result};
use crate::meta::SourceType;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

const HELP: &str = "\
Commands:
  db <url> [kind]              Crawl a database (sqlite://, postgres://)
  api <url> [KEY=VALUE ...]    Crawl a JSON API; headers may also be a JSON object
  files <path> [path ...]      Crawl files or directories
  dict                         Show the data dictionary
  lineage [dot]                Show the lineage map
  stats                        Show statistics
  export [path]                Export the workbook
  clear                        Discard all crawled data
  help                         Show this help
  quit                         Leave the session";

/// One parsed session line
#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand {
    Database { url: String, kind: Option<String> },
    Api { url: String, headers: BTreeMap<String, String> },
    Files(Vec<PathBuf>),
    Dictionary,
    Lineage { dot: bool },
    Statistics,
    Export(Option<PathBuf>),
    Clear,
    Help,
    Quit,
}

/// Parse a session line; blank lines yield `None`
pub fn parse_command(line: &str) -> Result<Option<SessionCommand>> {
    let line = line.trim();
    let Some((verb, rest)) = split_word(line) else {
        return Ok(None);
    };

    let command = match verb.to_lowercase().as_str() {
        "db" | "database" => {
            let mut args = rest.split_whitespace();
            let url = args
                .next()
                .ok_or_else(|| Error::Other("usage: db <url> [kind]".to_string()))?;
            SessionCommand::Database {
                url: url.to_string(),
                kind: args.next().map(str::to_string),
            }
        }
        "api" => {
            let (url, headers) = split_word(rest)
                .ok_or_else(|| Error::Other("usage: api <url> [KEY=VALUE ...]".to_string()))?;
            let headers = if headers.starts_with('{') {
                parse_header_json(headers)?
            } else {
                let pairs: Vec<&str> = headers.split_whitespace().collect();
                parse_header_pairs(&pairs)?
            };
            SessionCommand::Api {
                url: url.to_string(),
                headers,
            }
        }
        "files" | "file" => {
            let paths: Vec<PathBuf> = rest.split_whitespace().map(PathBuf::from).collect();
            if paths.is_empty() {
                return Err(Error::Other("usage: files <path> [path ...]".to_string()));
            }
            SessionCommand::Files(paths)
        }
        "dict" | "dictionary" => SessionCommand::Dictionary,
        "lineage" => SessionCommand::Lineage {
            dot: rest.eq_ignore_ascii_case("dot"),
        },
        "stats" | "statistics" | "summary" => SessionCommand::Statistics,
        "export" => SessionCommand::Export((!rest.is_empty()).then(|| PathBuf::from(rest))),
        "clear" => SessionCommand::Clear,
        "help" | "?" => SessionCommand::Help,
        "quit" | "exit" => SessionCommand::Quit,
        other => return Err(Error::Other(format!("Unknown command '{}'. Type 'help'.", other))),
    };
    Ok(Some(command))
}

fn split_word(s: &str) -> Option<(&str, &str)> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    match s.split_once(char::is_whitespace) {
        Some((word, rest)) => Some((word, rest.trim())),
        None => Some((s, "")),
    }
}

/// Outcomes of one background crawl
#[derive(Debug)]
struct Delivery {
    generation: u64,
    outcomes: Vec<CrawlOutcome>,
}

/// Session state: the catalog plus the delivery channel
pub struct Session {
    catalog: Catalog,
    tx: UnboundedSender<Delivery>,
    rx: UnboundedReceiver<Delivery>,
    generation: u64,
    pending: usize,
    json: bool,
}

impl Session {
    pub fn new(config: Config, json: bool) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            catalog: Catalog::new(config),
            tx,
            rx,
            generation: 0,
            pending: 0,
            json,
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Crawls started but not yet collected
    pub fn pending(&self) -> usize {
        self.pending
    }

    /// Run one command; returns `false` when the session should end
    pub fn dispatch(&mut self, command: SessionCommand) -> bool {
        match command {
            SessionCommand::Database { url, kind } => self.spawn_database(url, kind),
            SessionCommand::Api { url, headers } => self.spawn_api(url, headers),
            SessionCommand::Files(paths) => self.spawn_files(paths),
            SessionCommand::Dictionary => {
                let dictionary = self.catalog.data_dictionary();
                if self.json {
                    print_json(&dictionary);
                } else {
                    print_dictionary(&dictionary);
                }
            }
            SessionCommand::Lineage { dot: true } => println!("{}", self.catalog.lineage().to_dot()),
            SessionCommand::Lineage { dot: false } => {
                let view = self.catalog.lineage_view();
                if self.json {
                    print_json(&view);
                } else {
                    print_lineage(&view);
                }
            }
            SessionCommand::Statistics => {
                let stats = self.catalog.statistics();
                if self.json {
                    print_json(&stats);
                } else {
                    print_statistics(&stats);
                }
            }
            SessionCommand::Export(path) => {
                let status = self.export(path);
                self.report(&status);
            }
            SessionCommand::Clear => {
                self.clear();
                println!("All data cleared");
            }
            SessionCommand::Help => println!("{}", HELP),
            SessionCommand::Quit => return false,
        }
        true
    }

    fn export(&self, path: Option<PathBuf>) -> CrawlStatus {
        if self.catalog.is_empty() {
            return nothing_to_export();
        }
        let path = path.unwrap_or_else(|| PathBuf::from(&self.catalog.config().export.default_path));
        info!("Exporting to {}", path.display());
        self.catalog.export(&path)
    }

    /// Drop all data; crawls still running are ignored when they finish
    pub fn clear(&mut self) {
        self.generation += 1;
        self.catalog.clear();
    }

    fn spawn_database(&mut self, url: String, kind: Option<String>) {
        let config = self.catalog.config().database.clone();
        let kind = kind.unwrap_or_else(|| config.default_kind.clone());
        let crawler = DatabaseCrawler::new(config);
        println!("Starting database crawl: {}", kind);

        let task = tokio::spawn(async move { vec![crawler.crawl(&url, &kind).await] });
        self.track(SourceType::Database, task);
    }

    fn spawn_api(&mut self, url: String, headers: BTreeMap<String, String>) {
        let crawler = match self.catalog.api_crawler() {
            Ok(c) => c,
            Err(e) => {
                let status = self
                    .catalog
                    .apply(CrawlOutcome::failed(SourceType::Api, Vec::new(), e));
                self.report(&status);
                return;
            }
        };
        println!("Starting API crawl: {}", url);

        let task = tokio::spawn(async move { vec![crawler.crawl(&url, &headers).await] });
        self.track(SourceType::Api, task);
    }

    fn spawn_files(&mut self, paths: Vec<PathBuf>) {
        let crawler = self.catalog.file_crawler();
        println!("Starting file crawl: {} path(s)", paths.len());

        let task = tokio::task::spawn_blocking(move || crawler.crawl_files(&paths));
        self.track(SourceType::File, task);
    }

    /// Deliver the task's outcomes, or a failure if the task panicked or was cancelled
    fn track(&mut self, source_type: SourceType, task: JoinHandle<Vec<CrawlOutcome>>) {
        let (tx, generation) = (self.tx.clone(), self.generation);
        self.pending += 1;
        tokio::spawn(async move {
            let outcomes = match task.await {
                Ok(outcomes) => outcomes,
                Err(e) => {
                    warn!("{} crawl task ended abnormally: {}", source_type, e);
                    vec![CrawlOutcome::failed(
                        source_type,
                        Vec::new(),
                        Error::Other(format!("crawl task failed: {}", e)),
                    )]
                }
            };
            let _ = tx.send(Delivery {
                generation,
                outcomes,
            });
        });
    }

    fn accept(&mut self, delivery: Delivery) -> Vec<CrawlStatus> {
        self.pending = self.pending.saturating_sub(1);
        if delivery.generation != self.generation {
            debug!(
                "Discarding {} outcome(s) from before the last clear",
                delivery.outcomes.len()
            );
            return Vec::new();
        }
        delivery
            .outcomes
            .into_iter()
            .map(|outcome| self.catalog.apply(outcome))
            .collect()
    }

    /// Apply every delivery that has arrived, without waiting
    pub fn drain(&mut self) -> Vec<CrawlStatus> {
        let mut statuses = Vec::new();
        while let Ok(delivery) = self.rx.try_recv() {
            statuses.extend(self.accept(delivery));
        }
        statuses
    }

    /// Wait for every running crawl to report
    pub async fn wait_pending(&mut self) -> Vec<CrawlStatus> {
        let mut statuses = Vec::new();
        while self.pending > 0 {
            match self.rx.recv().await {
                Some(delivery) => statuses.extend(self.accept(delivery)),
                None => break,
            }
        }
        statuses
    }

    fn report(&self, status: &CrawlStatus) {
        if self.json {
            print_json(status);
        } else {
            println!("{}", status);
        }
    }
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{}", s),
        Err(e) => warn!("Could not serialize output: {}", e),
    }
}

/// Read commands from stdin until `quit` or end of input
pub async fn cmd_session(config: Config, json: bool) -> Result<()> {
    let mut ticker = tokio::time::interval(config.session.poll_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut session = Session::new(config, json);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("metacrawl session. Type 'help' for commands.");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                for status in session.drain() {
                    session.report(&status);
                }
            }
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                match parse_command(&line) {
                    Ok(Some(command)) => {
                        if !session.dispatch(command) {
                            break;
                        }
                    }
                    Ok(None) => {}
                    Err(e) => eprintln!("{}", e),
                }
            }
        }
    }

    if session.pending() > 0 {
        println!("Waiting for {} running crawl(s)...", session.pending());
    }
    for status in session.wait_pending().await {
        session.report(&status);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lineage::{LineageOp, NodeType};
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_parse_commands() {
        assert_eq!(parse_command("   ").unwrap(), None);
        assert_eq!(
            parse_command("db sqlite://shop.db sqlite").unwrap(),
            Some(SessionCommand::Database {
                url: "sqlite://shop.db".to_string(),
                kind: Some("sqlite".to_string()),
            })
        );
        assert_eq!(
            parse_command("files a.csv  b.json").unwrap(),
            Some(SessionCommand::Files(vec![
                PathBuf::from("a.csv"),
                PathBuf::from("b.json")
            ]))
        );
        assert_eq!(
            parse_command("LINEAGE dot").unwrap(),
            Some(SessionCommand::Lineage { dot: true })
        );
        assert_eq!(parse_command("export").unwrap(), Some(SessionCommand::Export(None)));
        assert_eq!(parse_command("quit").unwrap(), Some(SessionCommand::Quit));
        assert!(parse_command("db").is_err());
        assert!(parse_command("frobnicate").is_err());
    }

    #[test]
    fn test_parse_api_headers() {
        let Some(SessionCommand::Api { url, headers }) =
            parse_command("api https://x.test/v1/users Accept=application/json").unwrap()
        else {
            panic!("expected api command");
        };
        assert_eq!(url, "https://x.test/v1/users");
        assert_eq!(headers["Accept"], "application/json");

        let Some(SessionCommand::Api { headers, .. }) =
            parse_command(r#"api https://x.test {"X-Key": "a b"}"#).unwrap()
        else {
            panic!("expected api command");
        };
        assert_eq!(headers["X-Key"], "a b");

        assert!(parse_command("api https://x.test {bad").is_err());
    }

    #[tokio::test]
    async fn test_file_crawl_delivered() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("items.json");
        fs::write(&path, r#"{"sku": "A1"}"#).unwrap();

        let mut session = Session::new(Config::default(), false);
        assert!(session.dispatch(SessionCommand::Files(vec![path])));
        assert_eq!(session.pending(), 1);

        let statuses = session.wait_pending().await;
        assert_eq!(statuses.len(), 1);
        assert!(statuses[0].success);
        assert_eq!(session.pending(), 0);
        assert!(session.catalog().data_dictionary().contains_key("items.json.sku"));
    }

    #[tokio::test]
    async fn test_stale_deliveries_dropped_after_clear() {
        let mut session = Session::new(Config::default(), false);
        let stale = Delivery {
            generation: session.generation,
            outcomes: vec![CrawlOutcome::failed(
                SourceType::Database,
                vec![LineageOp::Node {
                    name: "orders".to_string(),
                    node_type: NodeType::Table,
                    source: "sqlite://old.db".to_string(),
                }],
                Error::Other("late".to_string()),
            )],
        };
        session.pending += 1;
        session.tx.send(stale).unwrap();

        session.clear();
        assert!(session.drain().is_empty());
        assert_eq!(session.pending(), 0);
        assert!(session.catalog().lineage().is_empty());
    }

    #[tokio::test]
    async fn test_panicked_crawl_reported_as_failure() {
        let mut session = Session::new(Config::default(), false);
        let task = tokio::task::spawn_blocking(|| -> Vec<CrawlOutcome> {
            panic!("spreadsheet reader panicked")
        });
        session.track(SourceType::File, task);
        assert_eq!(session.pending(), 1);

        let statuses = tokio::time::timeout(Duration::from_secs(3), session.wait_pending())
            .await
            .expect("pending crawls should settle");
        assert_eq!(statuses.len(), 1);
        assert!(!statuses[0].success);
        assert!(statuses[0].message.starts_with("File crawl error: crawl task failed"));
        assert_eq!(session.pending(), 0);
        assert!(session.catalog().is_empty());
    }

    #[tokio::test]
    async fn test_aborted_crawl_reported_as_failure() {
        let mut session = Session::new(Config::default(), false);
        let task = tokio::spawn(async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Vec::new()
        });
        task.abort();
        session.track(SourceType::Database, task);

        let statuses = tokio::time::timeout(Duration::from_secs(3), session.wait_pending())
            .await
            .expect("pending crawls should settle");
        assert_eq!(statuses.len(), 1);
        assert!(statuses[0].message.starts_with("Database crawl error:"));
    }

    #[test]
    fn test_export_refused_when_empty() {
        let session = Session::new(Config::default(), false);
        assert_eq!(session.export(None), nothing_to_export());
    }
}
