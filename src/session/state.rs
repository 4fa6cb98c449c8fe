//! Session state machine
//!
//! ```text
//! Idle | Viewing | Error --submit--> Searching --ok--> Viewing
//!                                    Searching --all failed--> Error
//! Viewing --next/prev/goto--> Searching --ok--> Viewing
//! ```
//!
//! Every dispatch is described by a [`DispatchTicket`]. Starting a new
//! submit cancels the ticket in flight; completions of stale tickets are
//! ignored.

use super::history::{History, HistoryEntry};
use super::pagination::PaginationController;
use crate::error::{ProviderFailure, SearchError};
use crate::query::Query;
use crate::results::ResultPage;
use crate::search::{Dispatch, Dispatcher, Filters};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

/// Where the session is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Idle,
    Searching,
    Viewing,
    Error,
}

/// Why a dispatch was started
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchKind {
    /// New query
    Submit,
    /// Resubmission of the current query, bypassing the cache
    Refresh,
    /// Page change within the current result set; never recorded in history
    Navigate,
}

/// Everything needed to run one dispatch
#[derive(Debug, Clone)]
pub struct DispatchTicket {
    pub generation: u64,
    pub kind: DispatchKind,
    pub query: Query,
    pub filters: Filters,
    pub page: u32,
    pub cancel: CancellationToken,
}

/// The page on screen and what produced it
#[derive(Debug, Clone)]
pub struct View {
    pub query: Query,
    pub filters: Filters,
    pub page_number: u32,
    pub page: Arc<ResultPage>,
    /// Providers that failed for this page
    pub failed: Vec<ProviderFailure>,
    pub from_cache: bool,
}

/// State to go back to when a dispatch is abandoned
#[derive(Debug, Clone)]
struct Resume {
    status: Status,
    view: Option<View>,
    last_error: Option<SearchError>,
}

#[derive(Debug)]
struct InFlight {
    generation: u64,
    cancel: CancellationToken,
    resume: Resume,
}

/// Per-loop session: current query, filters, page and history
#[derive(Debug)]
pub struct SessionState {
    id: Uuid,
    status: Status,
    /// Filters for the next submit
    filters: Filters,
    view: Option<View>,
    /// Query of the last submit, kept for refresh after a failure
    last_query: Option<(Query, Filters)>,
    last_error: Option<SearchError>,
    pagination: PaginationController,
    history: History,
    generation: u64,
    in_flight: Option<InFlight>,
}

impl SessionState {
    pub fn new(page_size: u32, filters: Filters, history: History) -> Self {
        Self {
            id: Uuid::new_v4(),
            status: Status::Idle,
            filters,
            view: None,
            last_query: None,
            last_error: None,
            pagination: PaginationController::new(page_size),
            history,
            generation: 0,
            in_flight: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn filters(&self) -> &Filters {
        &self.filters
    }

    /// Replace the filters used by the next submit; never dispatches
    pub fn set_filters(&mut self, filters: Filters) {
        self.filters = filters;
    }

    pub fn view(&self) -> Option<&View> {
        self.view.as_ref()
    }

    pub fn current_page(&self) -> Option<u32> {
        self.view.as_ref().map(|v| v.page_number)
    }

    /// Last page of the current result set, when the total is known
    pub fn last_page(&self) -> Option<u32> {
        let view = self.view.as_ref()?;
        self.pagination.last_page(view.page.estimated_total)
    }

    pub fn last_error(&self) -> Option<&SearchError> {
        self.last_error.as_ref()
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn pagination(&self) -> &PaginationController {
        &self.pagination
    }

    pub fn can_go_next(&self) -> bool {
        match self.view {
            Some(ref view) if self.status == Status::Viewing => self
                .pagination
                .can_go_next(view.page_number, view.page.estimated_total),
            _ => false,
        }
    }

    /// Start a new search. Cancels a dispatch still in flight.
    pub fn begin_submit(&mut self, query: Query) -> Result<DispatchTicket, SearchError> {
        if query.is_empty() {
            return Err(SearchError::EmptyQuery);
        }
        let filters = self.filters.clone();
        Ok(self.start(DispatchKind::Submit, query, filters, 1))
    }

    /// Run the current query again from page 1, skipping the cache
    pub fn begin_refresh(&mut self) -> Result<DispatchTicket, SearchError> {
        let (query, filters) = match (&self.view, &self.last_query) {
            (Some(view), _) => (view.query.clone(), view.filters.clone()),
            (None, Some((query, filters))) => (query.clone(), filters.clone()),
            (None, None) => return Err(SearchError::NoActiveQuery),
        };
        Ok(self.start(DispatchKind::Refresh, query, filters, 1))
    }

    pub fn begin_next(&mut self) -> Result<DispatchTicket, SearchError> {
        let current = self.viewing()?.page_number as i64;
        self.begin_goto(current + 1)
    }

    pub fn begin_prev(&mut self) -> Result<DispatchTicket, SearchError> {
        let current = self.viewing()?.page_number as i64;
        self.begin_goto(current - 1)
    }

    pub fn begin_first(&mut self) -> Result<DispatchTicket, SearchError> {
        self.begin_goto(1)
    }

    pub fn begin_last(&mut self) -> Result<DispatchTicket, SearchError> {
        self.viewing()?;
        match self.last_page() {
            Some(last) => self.begin_goto(last as i64),
            None => Err(SearchError::invalid_page(
                -1,
                "total number of results is unknown",
            )),
        }
    }

    /// Jump to page `target`. Rejected targets leave the session unchanged.
    pub fn begin_goto(&mut self, target: i64) -> Result<DispatchTicket, SearchError> {
        let view = self.viewing()?;
        let page = self
            .pagination
            .check(target, view.page_number, view.page.estimated_total)?;
        let (query, filters) = (view.query.clone(), view.filters.clone());
        Ok(self.start(DispatchKind::Navigate, query, filters, page))
    }

    fn viewing(&self) -> Result<&View, SearchError> {
        match (self.status, self.view.as_ref()) {
            (Status::Searching, _) => Err(SearchError::Busy),
            (Status::Viewing, Some(view)) => Ok(view),
            _ => Err(SearchError::NoActiveQuery),
        }
    }

    fn snapshot(&self) -> Resume {
        Resume {
            status: self.status,
            view: self.view.clone(),
            last_error: self.last_error.clone(),
        }
    }

    fn start(
        &mut self,
        kind: DispatchKind,
        query: Query,
        filters: Filters,
        page: u32,
    ) -> DispatchTicket {
        // A superseded dispatch resumes to the state before it started
        let resume = match self.in_flight.take() {
            Some(previous) => {
                debug!("Cancelling dispatch #{}", previous.generation);
                previous.cancel.cancel();
                previous.resume
            }
            None => self.snapshot(),
        };

        self.generation += 1;
        let cancel = CancellationToken::new();
        self.in_flight = Some(InFlight {
            generation: self.generation,
            cancel: cancel.clone(),
            resume,
        });
        self.status = Status::Searching;

        DispatchTicket {
            generation: self.generation,
            kind,
            query,
            filters,
            page,
            cancel,
        }
    }

    /// Abandon the dispatch in flight, if any
    pub fn cancel(&mut self) {
        if let Some(in_flight) = self.in_flight.take() {
            in_flight.cancel.cancel();
            self.restore(in_flight.resume);
        }
    }

    fn restore(&mut self, resume: Resume) {
        self.status = resume.status;
        self.view = resume.view;
        self.last_error = resume.last_error;
    }

    /// Apply the result of a dispatch.
    ///
    /// Results of stale tickets are dropped and reported as `Cancelled`.
    pub fn complete(
        &mut self,
        ticket: &DispatchTicket,
        result: Result<Dispatch, SearchError>,
    ) -> Result<Dispatch, SearchError> {
        let in_flight = match self.in_flight.take() {
            Some(f) if f.generation == ticket.generation => f,
            other => {
                debug!("Ignoring stale dispatch #{}", ticket.generation);
                self.in_flight = other;
                return Err(SearchError::Cancelled);
            }
        };

        match result {
            Ok(dispatch) => {
                if ticket.kind == DispatchKind::Navigate && dispatch.page.is_empty() {
                    self.pagination.record_fetch(ticket.page, 0);
                    self.restore(in_flight.resume);
                    return Err(SearchError::invalid_page(
                        ticket.page as i64,
                        "no more results",
                    ));
                }

                if ticket.kind != DispatchKind::Navigate {
                    self.pagination.reset();
                    self.last_query = Some((ticket.query.clone(), ticket.filters.clone()));
                }
                self.pagination.record_fetch(ticket.page, dispatch.page.len());

                if ticket.kind != DispatchKind::Navigate {
                    self.history.push(HistoryEntry::new(
                        ticket.query.clone(),
                        ticket.filters.clone(),
                        dispatch.page.len(),
                    ));
                }

                self.view = Some(View {
                    query: ticket.query.clone(),
                    filters: ticket.filters.clone(),
                    page_number: ticket.page,
                    page: Arc::clone(&dispatch.page),
                    failed: dispatch.failed.clone(),
                    from_cache: dispatch.from_cache,
                });
                self.status = Status::Viewing;
                self.last_error = None;
                Ok(dispatch)
            }
            Err(SearchError::Cancelled) => {
                self.restore(in_flight.resume);
                Err(SearchError::Cancelled)
            }
            Err(error) if error.is_rejection() => {
                self.restore(in_flight.resume);
                Err(error)
            }
            Err(error) => {
                info!("Search '{}' failed: {}", ticket.query, error);
                if ticket.kind != DispatchKind::Navigate {
                    self.last_query = Some((ticket.query.clone(), ticket.filters.clone()));
                }
                self.view = None;
                self.status = Status::Error;
                self.last_error = Some(error.clone());
                Err(error)
            }
        }
    }

    /// Run a ticket to completion against a dispatcher
    pub async fn run(
        &mut self,
        dispatcher: &Dispatcher,
        ticket: DispatchTicket,
    ) -> Result<Dispatch, SearchError> {
        let result = execute(dispatcher, &ticket).await;
        self.complete(&ticket, result)
    }

    /// Parse and submit a query
    pub async fn submit(&mut self, dispatcher: &Dispatcher, raw: &str) -> Result<Dispatch, SearchError> {
        let ticket = self.begin_submit(Query::parse(raw))?;
        self.run(dispatcher, ticket).await
    }

    pub async fn refresh(&mut self, dispatcher: &Dispatcher) -> Result<Dispatch, SearchError> {
        let ticket = self.begin_refresh()?;
        self.run(dispatcher, ticket).await
    }

    pub async fn next_page(&mut self, dispatcher: &Dispatcher) -> Result<Dispatch, SearchError> {
        let ticket = self.begin_next()?;
        self.run(dispatcher, ticket).await
    }

    pub async fn prev_page(&mut self, dispatcher: &Dispatcher) -> Result<Dispatch, SearchError> {
        let ticket = self.begin_prev()?;
        self.run(dispatcher, ticket).await
    }

    pub async fn goto_page(
        &mut self,
        dispatcher: &Dispatcher,
        target: i64,
    ) -> Result<Dispatch, SearchError> {
        let ticket = self.begin_goto(target)?;
        self.run(dispatcher, ticket).await
    }
}

/// Run the dispatch a ticket describes, without touching session state.
///
/// Refresh tickets drop the query's own cached pages first.
pub async fn execute(
    dispatcher: &Dispatcher,
    ticket: &DispatchTicket,
) -> Result<Dispatch, SearchError> {
    if ticket.kind == DispatchKind::Refresh {
        let dropped = dispatcher.cache().invalidate_query(&ticket.query).await;
        debug!("Refresh dropped {} cached pages", dropped);
    }
    dispatcher
        .search_with_cancel(&ticket.query, &ticket.filters, ticket.page, &ticket.cancel)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ResultCache;
    use crate::error::ProviderError;
    use crate::metrics::Metrics;
    use crate::providers::{Provider, ProviderRegistry, SimulationProvider};
    use crate::search::{ContentType, DispatchOptions};
    use async_trait::async_trait;
    use std::time::Duration;

    struct Broken;

    #[async_trait]
    impl Provider for Broken {
        fn id(&self) -> &str {
            "broken"
        }

        fn content_types(&self) -> Vec<ContentType> {
            vec![ContentType::Web]
        }

        async fn fetch(
            &self,
            _query: &Query,
            _filters: &Filters,
            _page: u32,
            _timeout: Duration,
        ) -> Result<ResultPage, ProviderError> {
            Err(ProviderError::Unavailable("offline".into()))
        }
    }

    fn dispatcher_with(provider: Arc<dyn Provider>) -> Dispatcher {
        let mut registry = ProviderRegistry::new();
        registry.register(provider, None);
        Dispatcher::new(
            Arc::new(registry),
            Arc::new(ResultCache::new(64)),
            Arc::new(Metrics::new()),
        )
        .with_options(DispatchOptions {
            provider_timeout: Duration::from_secs(1),
            dispatch_timeout: Duration::from_secs(2),
            cache_ttl: Duration::from_secs(60),
            retry_backoff: Duration::from_millis(5),
            rate_limit_cooldown: Duration::from_secs(60),
        })
    }

    fn simulated(total: u64) -> Dispatcher {
        dispatcher_with(Arc::new(
            SimulationProvider::new()
                .with_delay(Duration::ZERO)
                .with_total(total),
        ))
    }

    fn session(max_history: usize) -> SessionState {
        SessionState::new(10, Filters::default(), History::new(max_history))
    }

    #[tokio::test]
    async fn test_submit_moves_to_viewing() {
        let d = simulated(35);
        let mut s = session(10);
        assert_eq!(s.status(), Status::Idle);

        let dispatch = s.submit(&d, "rust tokio").await.unwrap();
        assert_eq!(dispatch.page.len(), 10);
        assert_eq!(s.status(), Status::Viewing);
        assert_eq!(s.current_page(), Some(1));
        assert_eq!(s.last_page(), Some(4));
        assert_eq!(s.history().len(), 1);
    }

    #[tokio::test]
    async fn test_navigation_does_not_touch_history() {
        let d = simulated(35);
        let mut s = session(10);
        s.submit(&d, "rust").await.unwrap();

        s.next_page(&d).await.unwrap();
        s.next_page(&d).await.unwrap();
        assert_eq!(s.current_page(), Some(3));
        s.prev_page(&d).await.unwrap();
        assert_eq!(s.current_page(), Some(2));
        assert_eq!(s.history().len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_goto_leaves_state_unchanged() {
        let d = simulated(50);
        let mut s = session(10);
        s.submit(&d, "rust").await.unwrap();
        s.goto_page(&d, 2).await.unwrap();
        let searches = d.metrics().total_searches();

        for target in [0, 50 / 10 + 5] {
            let err = s.goto_page(&d, target).await.unwrap_err();
            assert!(matches!(err, SearchError::InvalidPageRequest { .. }));
            assert_eq!(s.current_page(), Some(2));
            assert_eq!(s.status(), Status::Viewing);
        }
        assert_eq!(d.metrics().total_searches(), searches);
        assert!(s.prev_page(&d).await.is_ok());
        assert!(matches!(
            s.prev_page(&d).await,
            Err(SearchError::InvalidPageRequest { .. })
        ));
    }

    #[tokio::test]
    async fn test_all_failed_moves_to_error() {
        let d = dispatcher_with(Arc::new(Broken));
        let mut s = session(10);

        let err = s.submit(&d, "rust").await.unwrap_err();
        assert!(matches!(err, SearchError::AllProvidersFailed(_)));
        assert_eq!(s.status(), Status::Error);
        assert!(s.last_error().is_some());
        assert!(s.history().is_empty());
        assert_eq!(s.begin_next().unwrap_err(), SearchError::NoActiveQuery);
        assert!(s.begin_refresh().is_ok());
    }

    #[tokio::test]
    async fn test_navigation_requires_a_view() {
        let mut s = session(10);
        assert_eq!(s.begin_next().unwrap_err(), SearchError::NoActiveQuery);
        assert_eq!(s.begin_goto(2).unwrap_err(), SearchError::NoActiveQuery);
        assert_eq!(s.begin_refresh().unwrap_err(), SearchError::NoActiveQuery);
        assert_eq!(
            s.begin_submit(Query::parse("  -java ")).unwrap_err(),
            SearchError::EmptyQuery
        );
        assert_eq!(s.status(), Status::Idle);
    }

    #[tokio::test]
    async fn test_navigation_while_searching_is_busy() {
        let d = simulated(50);
        let mut s = session(10);
        s.submit(&d, "rust").await.unwrap();

        let _ticket = s.begin_submit(Query::parse("python")).unwrap();
        assert_eq!(s.status(), Status::Searching);
        assert_eq!(s.begin_next().unwrap_err(), SearchError::Busy);
    }

    #[tokio::test]
    async fn test_history_is_bounded() {
        let d = simulated(20);
        let mut s = session(3);
        for q in ["a1", "b2", "c3", "d4"] {
            s.submit(&d, q).await.unwrap();
        }
        let queries: Vec<String> = s.history().entries().map(|e| e.query.to_string()).collect();
        assert_eq!(queries, vec!["b2", "c3", "d4"]);
    }

    #[tokio::test]
    async fn test_history_keeps_parsed_operators() {
        let d = simulated(20);
        let mut s = session(5);
        s.submit(&d, "  python -snake site:docs.python.org ").await.unwrap();

        let entry = s.history().recent(1)[0];
        assert_eq!(entry.query.terms, vec!["python"]);
        assert!(entry.query.excluded.contains("snake"));
        assert_eq!(entry.query.site_filter.as_deref(), Some("docs.python.org"));
        assert_eq!(entry.query.to_string(), "python -snake site:docs.python.org");
    }

    #[tokio::test]
    async fn test_new_submit_supersedes_in_flight() {
        let d = simulated(50);
        let mut s = session(10);

        let stale = s.begin_submit(Query::parse("first")).unwrap();
        let fresh = s.begin_submit(Query::parse("second")).unwrap();
        assert!(stale.cancel.is_cancelled());
        assert!(!fresh.cancel.is_cancelled());

        let stale_result = execute(&d, &stale).await;
        assert_eq!(stale_result.unwrap_err(), SearchError::Cancelled);

        let fresh_result = execute(&d, &fresh).await;
        s.complete(&fresh, fresh_result).unwrap();
        assert_eq!(
            s.complete(&stale, Ok(Dispatch {
                page: Arc::new(ResultPage::new(vec![], 1)),
                succeeded: vec![],
                failed: vec![],
                from_cache: false,
            }))
            .unwrap_err(),
            SearchError::Cancelled
        );

        assert_eq!(s.view().map(|v| v.query.raw_text.as_str()), Some("second"));
        let queries: Vec<String> = s.history().entries().map(|e| e.query.to_string()).collect();
        assert_eq!(queries, vec!["second"]);
    }

    #[tokio::test]
    async fn test_cancel_restores_previous_view() {
        let d = simulated(50);
        let mut s = session(10);
        s.submit(&d, "rust").await.unwrap();

        let ticket = s.begin_next().unwrap();
        s.cancel();
        assert!(ticket.cancel.is_cancelled());
        assert_eq!(s.status(), Status::Viewing);
        assert_eq!(s.current_page(), Some(1));
    }

    #[tokio::test]
    async fn test_empty_page_stops_optimistic_paging() {
        let mut s = session(10);
        let ticket = s.begin_submit(Query::parse("rust")).unwrap();
        let first = Dispatch {
            page: Arc::new(ResultPage::new(
                (1..=10)
                    .map(|i| crate::results::SearchResult::new(format!("https://r{}.com", i), "r", "p"))
                    .collect(),
                1,
            )),
            succeeded: vec!["p".into()],
            failed: vec![],
            from_cache: false,
        };
        s.complete(&ticket, Ok(first)).unwrap();
        assert!(s.can_go_next());

        let ticket = s.begin_next().unwrap();
        let empty = Dispatch {
            page: Arc::new(ResultPage::new(vec![], 2)),
            succeeded: vec!["p".into()],
            failed: vec![],
            from_cache: false,
        };
        let err = s.complete(&ticket, Ok(empty)).unwrap_err();
        assert!(matches!(err, SearchError::InvalidPageRequest { requested: 2, .. }));
        assert_eq!(s.current_page(), Some(1));
        assert_eq!(s.status(), Status::Viewing);
        assert!(!s.can_go_next());
    }

    #[tokio::test]
    async fn test_refresh_bypasses_cache() {
        let d = simulated(50);
        let mut s = session(10);
        s.submit(&d, "rust").await.unwrap();
        s.next_page(&d).await.unwrap();

        let dispatch = s.refresh(&d).await.unwrap();
        assert!(!dispatch.from_cache);
        assert_eq!(s.current_page(), Some(1));
        assert_eq!(s.history().len(), 2);

        let again = s.submit(&d, "rust").await.unwrap();
        assert!(again.from_cache);
        assert_eq!(s.history().len(), 3);
    }

    #[tokio::test]
    async fn test_refresh_keeps_sibling_queries_cached() {
        let d = simulated(50);
        let mut s = session(10);
        s.submit(&d, "rustacean").await.unwrap();
        s.submit(&d, "rust tokio").await.unwrap();
        s.submit(&d, "rust").await.unwrap();

        assert!(!s.refresh(&d).await.unwrap().from_cache);
        assert!(s.submit(&d, "rustacean").await.unwrap().from_cache);
        assert!(s.submit(&d, "tokio rust").await.unwrap().from_cache);
    }

    #[tokio::test]
    async fn test_filters_change_without_dispatch() {
        let d = simulated(50);
        let mut s = session(10);
        s.submit(&d, "rust").await.unwrap();
        let searches = d.metrics().total_searches();

        s.set_filters(Filters::default().with_language("de"));
        assert_eq!(d.metrics().total_searches(), searches);
        assert!(s.view().unwrap().filters.language.is_none());

        s.submit(&d, "rust").await.unwrap();
        assert_eq!(s.view().unwrap().filters.language.as_deref(), Some("de"));
    }
}
