//! Interactive read-eval-print loop

use super::bookmarks::{Bookmark, BookmarkStore};
use super::opener::Opener;
use super::renderer::Renderer;
use super::Command;
use crate::config::Settings;
use crate::error::SearchError;
use crate::query::Query;
use crate::search::{Dispatch, Dispatcher};
use crate::session::{execute, DispatchTicket, SessionState};
use anyhow::{bail, Result};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Whether the loop keeps reading input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

/// A dispatch running in the background
struct Pending {
    ticket: DispatchTicket,
    handle: JoinHandle<Result<Dispatch, SearchError>>,
}

/// Console front end: turns input lines into session transitions and
/// renders the outcome.
///
/// Searches run as background tasks so that a new query typed while one
/// is in flight supersedes it. Every other command waits for the search in
/// flight to finish first.
pub struct Console {
    dispatcher: Arc<Dispatcher>,
    settings: Arc<Settings>,
    session: SessionState,
    renderer: Box<dyn Renderer>,
    opener: Box<dyn Opener>,
    bookmarks: Box<dyn BookmarkStore>,
}

impl Console {
    pub fn new(
        dispatcher: Arc<Dispatcher>,
        session: SessionState,
        renderer: Box<dyn Renderer>,
        opener: Box<dyn Opener>,
        bookmarks: Box<dyn BookmarkStore>,
    ) -> Self {
        Self {
            dispatcher,
            settings: Arc::new(Settings::default()),
            session,
            renderer,
            opener,
            bookmarks,
        }
    }

    /// Settings reported by the `settings` command
    pub fn with_settings(mut self, settings: Arc<Settings>) -> Self {
        self.settings = settings;
        self
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    /// Read commands until `exit` or end of input
    pub async fn run<R>(&mut self, input: R) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
    {
        info!("Session {} started", self.session.id());
        let mut lines = input.lines();
        let mut pending: Option<Pending> = None;
        self.renderer.prompt()?;

        loop {
            tokio::select! {
                result = wait(&mut pending) => {
                    if let Some(done) = pending.take() {
                        self.finish(&done.ticket, result)?;
                    }
                    self.renderer.prompt()?;
                }
                line = lines.next_line() => {
                    let Some(line) = line? else {
                        break;
                    };
                    if self.dispatch_line(&line, &mut pending).await? == Flow::Exit {
                        self.session.cancel();
                        return Ok(());
                    }
                    if pending.is_none() {
                        self.renderer.prompt()?;
                    }
                }
            }
        }

        if let Some(done) = pending.take() {
            let result = joined(done.handle.await);
            self.finish(&done.ticket, result)?;
        }
        Ok(())
    }

    /// Handle one line and wait for any search it starts
    pub async fn execute_line(&mut self, line: &str) -> Result<Flow> {
        let mut pending = None;
        let flow = self.dispatch_line(line, &mut pending).await?;
        self.settle(&mut pending).await?;
        Ok(flow)
    }

    /// Run `text` as a search even if it reads like a command
    pub async fn run_query(&mut self, text: &str) -> Result<()> {
        let mut pending = None;
        self.handle(Command::Search(text.to_string()), &mut pending)?;
        self.settle(&mut pending).await
    }

    /// Run one search per line, skipping blank lines and `#` comments
    pub async fn run_batch(&mut self, content: &str) -> Result<()> {
        let queries: Vec<&str> = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .collect();
        info!("Running {} batch queries", queries.len());

        for query in queries {
            self.run_query(query).await?;
        }
        Ok(())
    }

    async fn settle(&mut self, pending: &mut Option<Pending>) -> Result<()> {
        if let Some(done) = pending.take() {
            let result = joined(done.handle.await);
            self.finish(&done.ticket, result)?;
        }
        Ok(())
    }

    async fn dispatch_line(&mut self, line: &str, pending: &mut Option<Pending>) -> Result<Flow> {
        let command = match Command::parse(line) {
            Ok(Some(command)) => command,
            Ok(None) => return Ok(Flow::Continue),
            Err(e) => {
                self.renderer.error(&e.to_string())?;
                return Ok(Flow::Continue);
            }
        };

        match command {
            Command::Search(_) | Command::Exit => {}
            _ => self.settle(pending).await?,
        }
        self.handle(command, pending)
    }

    fn handle(&mut self, command: Command, pending: &mut Option<Pending>) -> Result<Flow> {
        let started = match command {
            Command::Exit => return Ok(Flow::Exit),
            Command::Search(text) => self.session.begin_submit(Query::parse(&text)),
            Command::Next => self.session.begin_next(),
            Command::Prev => self.session.begin_prev(),
            Command::First => self.session.begin_first(),
            Command::Last => self.session.begin_last(),
            Command::Page(target) => self.session.begin_goto(target),
            Command::Refresh => self.session.begin_refresh(),
            other => {
                self.show(other)?;
                return Ok(Flow::Continue);
            }
        };

        match started {
            Ok(ticket) => {
                // Replacing the handle detaches the superseded task; its
                // ticket was cancelled by the session.
                *pending = Some(self.spawn(ticket)?);
            }
            Err(e) => self.renderer.error(&e.to_string())?,
        }
        Ok(Flow::Continue)
    }

    /// Commands that only read or edit local state
    fn show(&mut self, command: Command) -> Result<()> {
        match command {
            Command::ShowFilters => self.renderer.filters(self.session.filters())?,
            Command::EditFilters(edit) => {
                let filters = edit.apply(self.session.filters());
                self.session.set_filters(filters);
                self.renderer.filters(self.session.filters())?;
            }
            Command::History => {
                let entries = self.session.history().recent(self.session.history().len());
                self.renderer.history(&entries)?;
            }
            Command::Bookmarks => self.renderer.bookmarks(self.bookmarks.list())?,
            Command::Stats => {
                let stats = self.dispatcher.metrics().snapshot();
                self.renderer.stats(&stats)?;
            }
            Command::Settings => self.renderer.settings(&self.settings)?,
            Command::Help => self.renderer.help()?,
            Command::Open(index) => {
                let url = match self.result_at(index) {
                    Ok((result, _)) => result.url,
                    Err(message) => return Ok(self.renderer.error(&message)?),
                };
                match self.opener.open(&url) {
                    Ok(()) => self.renderer.notice(&format!("Opening {}", url))?,
                    Err(e) => self.renderer.error(&e.to_string())?,
                }
            }
            Command::Save(index) => {
                let bookmark = match self.result_at(index) {
                    Ok((result, query)) => Bookmark::from_result(&result, query),
                    Err(message) => return Ok(self.renderer.error(&message)?),
                };
                let url = bookmark.url.clone();
                match self.bookmarks.save(bookmark) {
                    Ok(true) => self.renderer.notice(&format!("Saved {}", url))?,
                    Ok(false) => self.renderer.notice(&format!("Already saved {}", url))?,
                    Err(e) => self.renderer.error(&e.to_string())?,
                }
            }
            other => debug!("Unhandled command {:?}", other),
        }
        Ok(())
    }

    fn result_at(&self, index: i64) -> std::result::Result<(crate::results::SearchResult, String), String> {
        let Some(view) = self.session.view() else {
            return Err("no results on screen".to_string());
        };
        usize::try_from(index)
            .ok()
            .and_then(|i| view.page.get(i))
            .map(|result| (result.clone(), view.query.raw_text.clone()))
            .ok_or_else(|| {
                format!(
                    "no result {} on this page (choose 1-{})",
                    index,
                    view.page.len()
                )
            })
    }

    fn spawn(&mut self, ticket: DispatchTicket) -> Result<Pending> {
        self.renderer
            .searching(&ticket.query.to_string(), ticket.page)?;
        let dispatcher = Arc::clone(&self.dispatcher);
        let task_ticket = ticket.clone();
        let handle = tokio::spawn(async move { execute(&dispatcher, &task_ticket).await });
        Ok(Pending { ticket, handle })
    }

    fn finish(&mut self, ticket: &DispatchTicket, result: Result<Dispatch, SearchError>) -> Result<()> {
        match self.session.complete(ticket, result) {
            Ok(_) => {
                if let Some(view) = self.session.view() {
                    self.renderer.page(view, self.session.last_page())?;
                }
            }
            Err(SearchError::Cancelled) => debug!("Dispatch #{} superseded", ticket.generation),
            Err(SearchError::Internal(message)) => bail!("internal error: {}", message),
            Err(e) => self.renderer.error(&e.to_string())?,
        }
        Ok(())
    }
}

async fn wait(pending: &mut Option<Pending>) -> Result<Dispatch, SearchError> {
    match pending {
        Some(p) => joined((&mut p.handle).await),
        None => std::future::pending().await,
    }
}

fn joined(
    result: std::result::Result<Result<Dispatch, SearchError>, tokio::task::JoinError>,
) -> Result<Dispatch, SearchError> {
    result.unwrap_or_else(|e| Err(SearchError::Internal(format!("dispatch task failed: {}", e))))
}
