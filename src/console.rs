//! Line-oriented console over stdin.

use crate::catalog::{load_catalog, Catalog, CatalogEntry};
use crate::config::ConsoleConfig;
use crate::executor::RequestExecutor;
use crate::form::FormEdit;
use crate::history::History;
use crate::models::EndpointDescriptor;
use crate::session::{Outcome, Session, Ticket};
use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio_stream::{wrappers::LinesStream, StreamExt};

const HELP: &str = "\
Commands:
  list [category]      list endpoints, optionally for one category
  search <text>        search names, paths and descriptions
  open <n|name>        open an endpoint from the list
  custom <url>         open an ad-hoc GET request
  status               check which catalog endpoints are online
  params               show editable parameters
  set <key> <value>    edit a parameter
  unset <key>          clear a parameter
  reset                restore parameters to the endpoint defaults
  template             show the endpoint template
  url                  show the request URL
  curl                 show an equivalent curl command
  send                 send the request
  history [clear]      show or clear request history
  replay <n>           reopen history entry n
  link open            open the resource link in the browser
  link download        download the resource link
  save                 save the previewed media
  help                 show this help
  quit                 leave the console";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    List(Option<String>),
    Search(String),
    Open(String),
    Custom(String),
    Status,
    Params,
    Edit(FormEdit),
    Template,
    Url,
    Curl,
    Send,
    History,
    ClearHistory,
    Replay(usize),
    LinkOpen,
    LinkDownload,
    Save,
    Help,
    Quit,
}

pub fn parse_command(line: &str) -> Result<Option<Command>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };
    let required = |what: &str| -> Result<String, String> {
        if rest.is_empty() {
            Err(format!("usage: {} {}", word, what))
        } else {
            Ok(rest.to_string())
        }
    };

    let command = match word.to_ascii_lowercase().as_str() {
        "list" | "ls" => Command::List(Some(rest.to_string()).filter(|r| !r.is_empty())),
        "search" => Command::Search(required("<text>")?),
        "open" => Command::Open(required("<n|name>")?),
        "custom" => Command::Custom(required("<url>")?),
        "status" | "health" => Command::Status,
        "params" => Command::Params,
        "set" => {
            let (key, value) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
            if key.is_empty() {
                return Err("usage: set <key> <value>".to_string());
            }
            Command::Edit(FormEdit::Set {
                key: key.to_string(),
                value: value.trim().to_string(),
            })
        }
        "unset" => Command::Edit(FormEdit::Clear { key: required("<key>")? }),
        "reset" => Command::Edit(FormEdit::Reset),
        "template" => Command::Template,
        "url" => Command::Url,
        "curl" => Command::Curl,
        "send" => Command::Send,
        "history" if rest.eq_ignore_ascii_case("clear") => Command::ClearHistory,
        "history" => Command::History,
        "replay" => Command::Replay(
            required("<n>")?
                .parse::<usize>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| "usage: replay <n>".to_string())?,
        ),
        "link" => match rest.to_ascii_lowercase().as_str() {
            "open" => Command::LinkOpen,
            "download" => Command::LinkDownload,
            _ => return Err("usage: link open|download".to_string()),
        },
        "save" => Command::Save,
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => return Err(format!("unknown command '{}', try 'help'", other)),
    };
    Ok(Some(command))
}

type Completion = (Ticket, Outcome);

pub struct Console {
    catalog: Result<Catalog, String>,
    session: Session,
    history: History,
    executor: Arc<RequestExecutor>,
    download_dir: PathBuf,
    results_tx: mpsc::UnboundedSender<Completion>,
    results_rx: mpsc::UnboundedReceiver<Completion>,
}

impl Console {
    pub async fn new(config: &ConsoleConfig) -> Result<Self> {
        let executor = RequestExecutor::new(
            &config.origin,
            Duration::from_secs(config.request_timeout_secs.max(1)),
        )?;
        let catalog = load_catalog(&config.catalog).await.map_err(|e| {
            tracing::error!("catalog unavailable: {:#}", e);
            format!("{:#}", e)
        });
        let (results_tx, results_rx) = mpsc::unbounded_channel();

        Ok(Console {
            catalog,
            session: Session::new(config.max_blob_bytes),
            history: History::with_cap(config.history_cap()),
            executor: Arc::new(executor),
            download_dir: PathBuf::from(&config.download_directory),
            results_tx,
            results_rx,
        })
    }

    pub async fn run(mut self) -> Result<()> {
        println!("Ada API console, requests go to {}", self.executor.origin());
        match &self.catalog {
            Ok(catalog) => println!("{} endpoints loaded. Type 'help' for commands.", catalog.entries().len()),
            Err(e) => println!("Could not load the endpoint catalog: {}\nCustom requests still work.", e),
        }

        let mut lines = LinesStream::new(BufReader::new(tokio::io::stdin()).lines());
        loop {
            tokio::select! {
                line = lines.next() => {
                    let Some(Ok(line)) = line else { break };
                    match parse_command(&line) {
                        Ok(Some(Command::Quit)) => break,
                        Ok(Some(command)) => self.handle(command).await,
                        Ok(None) => {}
                        Err(message) => println!("{}", message),
                    }
                }
                Some((ticket, outcome)) = self.results_rx.recv() => {
                    self.on_result(ticket, outcome);
                }
            }
        }
        Ok(())
    }

    async fn handle(&mut self, command: Command) {
        match command {
            Command::List(category) => {
                self.with_catalog(|catalog| match category {
                    Some(c) => catalog.by_category(&c),
                    None => catalog.entries(),
                });
            }
            Command::Search(query) => self.with_catalog(|catalog| catalog.search(&query)),
            Command::Open(key) => {
                let found = match &self.catalog {
                    Ok(catalog) => catalog.find(&key).cloned(),
                    Err(_) => None,
                };
                match found {
                    Some(descriptor) => self.open(descriptor),
                    None => println!("No endpoint '{}'.", key),
                }
            }
            Command::Custom(url) => self.open(EndpointDescriptor::custom(url)),
            Command::Status => self.check_endpoints().await,
            Command::Params => self.print_params(),
            Command::Edit(edit) => {
                if self.session.descriptor().is_none() {
                    println!("Open an endpoint first.");
                    return;
                }
                self.session.edit(edit);
                self.print_params();
            }
            Command::Template => print_or_hint(self.session.template()),
            Command::Url => print_or_hint(self.session.request_url()),
            Command::Curl => {
                let method = self.session.descriptor().map(|d| d.method.as_str()).unwrap_or("GET");
                print_or_hint(self.session.request_url().map(|url| {
                    let absolute = self
                        .executor
                        .absolute_url(&url)
                        .map(|u| u.to_string())
                        .unwrap_or(url);
                    format!("curl -X {} \"{}\"", method, absolute)
                }));
            }
            Command::Send => self.send(),
            Command::History => {
                if self.history.is_empty() {
                    println!("No requests yet.");
                }
                for (i, entry) in self.history.iter().enumerate() {
                    println!(
                        "{:>3}. {}  {}  {}",
                        i + 1,
                        entry.time.format("%Y-%m-%d %H:%M:%S"),
                        entry.name,
                        entry.path
                    );
                }
            }
            Command::ClearHistory => {
                self.history.clear();
                println!("History cleared.");
            }
            Command::Replay(n) => match self.history.get(n - 1).cloned() {
                Some(entry) => self.open(EndpointDescriptor {
                    name: entry.name,
                    desc: "Opened from history".to_string(),
                    ..EndpointDescriptor::custom(entry.path)
                }),
                None => println!("No history entry {}.", n),
            },
            Command::LinkOpen => match self.current_link() {
                Some(link) => {
                    if let Err(e) = opener::open(&link) {
                        println!("Could not open {}: {}", link, e);
                    }
                }
                None => println!("The current result has no resource link."),
            },
            Command::LinkDownload => match self.current_link() {
                Some(link) => match self.executor.download(&link, &self.download_dir).await {
                    Ok(path) => println!("Saved to {}", path.display()),
                    Err(e) => println!("Download failed: {:#}", e),
                },
                None => println!("The current result has no resource link."),
            },
            Command::Save => self.save_media().await,
            Command::Help => println!("{}", HELP),
            Command::Quit => {}
        }
    }

    fn open(&mut self, descriptor: EndpointDescriptor) {
        println!("{} [{}]", descriptor.name, descriptor.method.as_str());
        if !descriptor.desc.is_empty() {
            println!("{}", descriptor.desc);
        }
        self.session.open(descriptor);
        print_or_hint(self.session.template());
        self.print_params();
    }

    fn send(&mut self) {
        let Some(pending) = self.executor.prepare(&mut self.session, &mut self.history) else {
            println!("Open an endpoint first.");
            return;
        };
        println!("Sending #{} {} ...", pending.ticket.seq(), pending.url);

        let executor = Arc::clone(&self.executor);
        let tx = self.results_tx.clone();
        tokio::spawn(async move {
            let outcome = executor.send(&pending.url).await;
            if tx.send((pending.ticket, outcome)).is_err() {
                tracing::debug!("console closed before request #{} finished", pending.ticket.seq());
            }
        });
    }

    fn on_result(&mut self, ticket: Ticket, outcome: Outcome) {
        if !self.session.complete(ticket, outcome) {
            return;
        }
        if let Some(result) = self.session.current() {
            println!("--- result #{} ---", ticket.seq());
            for line in result.lines() {
                println!("{}", line);
            }
        }
        if self.session.is_sending() {
            println!("(other requests still sending)");
        }
    }

    fn print_params(&self) {
        let Some(descriptor) = self.session.descriptor() else {
            println!("Open an endpoint first.");
            return;
        };
        let form = self.session.form();
        if form.is_empty() {
            println!("This endpoint has no editable parameters.");
            return;
        }
        for (key, value) in form.iter() {
            let hint = descriptor
                .params
                .as_ref()
                .and_then(|p| p.get(key))
                .map(String::as_str)
                .unwrap_or_default();
            println!("  {} = {:?}    {}", key, value, hint);
        }
    }

    fn with_catalog<'a, F>(&'a self, select: F)
    where
        F: FnOnce(&'a Catalog) -> Vec<CatalogEntry<'a>>,
    {
        match &self.catalog {
            Ok(catalog) => {
                let entries = select(catalog);
                if entries.is_empty() {
                    println!("No endpoints match.");
                }
                for e in entries {
                    println!(
                        "{:>3}. [{}] {} {}  {}",
                        e.index,
                        e.category,
                        e.descriptor.method.as_str(),
                        e.descriptor.name,
                        e.descriptor.path
                    );
                }
            }
            Err(e) => println!("Catalog unavailable: {}", e),
        }
    }

    async fn check_endpoints(&self) {
        let catalog = match &self.catalog {
            Ok(catalog) => catalog,
            Err(e) => {
                println!("Catalog unavailable: {}", e);
                return;
            }
        };
        println!("Checking {} endpoints ...", catalog.entries().len());
        for report in self.executor.check_catalog(catalog).await {
            println!(
                "{:>3}. {:<6}  {}  {}",
                report.index,
                report.health.label(),
                report.name,
                report.path
            );
        }
    }

    fn current_link(&self) -> Option<String> {
        self.session
            .current()
            .and_then(|r| r.view.link())
            .map(str::to_string)
    }

    async fn save_media(&self) {
        let Some(blob) = self.session.current().and_then(|r| r.view.blob()) else {
            println!("The current result is not media.");
            return;
        };
        let stem = self
            .session
            .descriptor()
            .map(|d| d.name.clone())
            .unwrap_or_default();
        match self.session.blobs().save(blob, &self.download_dir, &stem).await {
            Ok(path) => println!("Saved to {}", path.display()),
            Err(e) => println!("Save failed: {:#}", e),
        }
    }
}

fn print_or_hint(value: Option<String>) {
    match value {
        Some(value) => println!("{}", value),
        None => println!("Open an endpoint first."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_edits() {
        assert_eq!(
            parse_command("set url https://youtu.be/abc 123").unwrap(),
            Some(Command::Edit(FormEdit::Set {
                key: "url".to_string(),
                value: "https://youtu.be/abc 123".to_string(),
            }))
        );
        assert_eq!(
            parse_command("unset url").unwrap(),
            Some(Command::Edit(FormEdit::Clear { key: "url".to_string() }))
        );
        assert_eq!(parse_command("reset").unwrap(), Some(Command::Edit(FormEdit::Reset)));
    }

    #[test]
    fn parses_history_and_links() {
        assert_eq!(parse_command("history clear").unwrap(), Some(Command::ClearHistory));
        assert_eq!(parse_command("HISTORY").unwrap(), Some(Command::History));
        assert_eq!(parse_command("replay 3").unwrap(), Some(Command::Replay(3)));
        assert_eq!(parse_command("link download").unwrap(), Some(Command::LinkDownload));
        assert!(parse_command("replay 0").is_err());
        assert!(parse_command("link share").is_err());
    }

    #[test]
    fn blank_lines_and_unknown_commands() {
        assert_eq!(parse_command("   ").unwrap(), None);
        assert!(parse_command("frobnicate").unwrap_err().contains("unknown command"));
        assert!(parse_command("open").unwrap_err().starts_with("usage"));
        assert_eq!(parse_command("list").unwrap(), Some(Command::List(None)));
        assert_eq!(parse_command("status").unwrap(), Some(Command::Status));
        assert_eq!(
            parse_command("list Downloader").unwrap(),
            Some(Command::List(Some("Downloader".to_string())))
        );
    }
}
