use crate::{
    config::Config,
    semantic::{PageRequest, PageResult, QueryError, QueryPipeline},
};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::{num::NonZeroUsize, sync::Arc};
use tokio::signal;

mod html;

#[derive(Clone)]
pub struct SharedState {
    pipeline: Arc<QueryPipeline>,
    config: Arc<Config>,
}

impl SharedState {
    pub fn new(pipeline: Arc<QueryPipeline>, config: Arc<Config>) -> Self {
        Self { pipeline, config }
    }
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/search", get(api_search))
        .route("/api/corpora", get(api_corpora))
        .layer(
            tower_http::trace::TraceLayer::new_for_http()
                .make_span_with(
                    tower_http::trace::DefaultMakeSpan::new().level(tracing::Level::INFO),
                )
                .on_response(
                    tower_http::trace::DefaultOnResponse::new().level(tracing::Level::INFO),
                ),
        )
        .with_state(Arc::new(state))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            log::error!("failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                log::error!("failed to install signal handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    log::warn!("shutting down");
}

async fn start_app(state: SharedState, listen: &str) -> anyhow::Result<()> {
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(listen).await?;
    log::info!("listening on {listen}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

pub fn start_daemon(state: SharedState, listen: &str) -> anyhow::Result<()> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async { start_app(state, listen).await })
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Query(#[from] QueryError),

    #[error("{0}")]
    InvalidParam(String),

    #[error("query task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

#[derive(Debug)]
struct HttpError(ApiError);

impl IntoResponse for HttpError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self.0 {
            ApiError::Query(QueryError::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Query(QueryError::EmptyQuery) | ApiError::InvalidParam(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Query(_) | ApiError::Task(_) => {
                log::error!("{:?}", self.0);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (status, Json(json!({"error": self.0.to_string()}))).into_response()
    }
}

impl<E> From<E> for HttpError
where
    E: Into<ApiError>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

/// Query string shared by the page and the JSON API.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchParams {
    /// Defaults to the configured corpus
    pub corpus: Option<String>,

    #[serde(default)]
    pub text: String,

    pub page: Option<usize>,

    pub per_page: Option<usize>,

    /// Free text from the filter form; see [`parse_limit`]
    pub limit: Option<String>,
}

/// Empty, non-numeric and zero limits all mean "no limit".
pub fn parse_limit(raw: Option<&str>) -> Option<NonZeroUsize> {
    raw.and_then(|s| s.trim().parse::<usize>().ok())
        .and_then(NonZeroUsize::new)
}

impl SearchParams {
    fn resolve(&self, config: &Config) -> Result<PageRequest, ApiError> {
        let corpus = self
            .corpus
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .unwrap_or(&config.default_corpus);

        let page = NonZeroUsize::new(self.page.unwrap_or(1))
            .ok_or_else(|| ApiError::InvalidParam("page must be at least 1".to_string()))?;

        let per_page = self.per_page.unwrap_or(config.default_per_page);
        let per_page = NonZeroUsize::new(per_page)
            .filter(|p| p.get() <= config.max_per_page)
            .ok_or_else(|| {
                ApiError::InvalidParam(format!(
                    "per_page must be between 1 and {}",
                    config.max_per_page
                ))
            })?;

        Ok(PageRequest::new(corpus, self.text.clone(), per_page)
            .with_page(page)
            .with_limit(parse_limit(self.limit.as_deref())))
    }
}

async fn run_query(state: &SharedState, request: PageRequest) -> Result<PageResult, ApiError> {
    let pipeline = state.pipeline.clone();

    // ranking is CPU bound; a dropped request leaves the task to finish alone
    let result = tokio::task::spawn_blocking(move || pipeline.query(&request)).await??;

    Ok(result)
}

async fn index(
    State(state): State<Arc<SharedState>>,
    Query(params): Query<SearchParams>,
) -> Result<Html<String>, HttpError> {
    let request = params.resolve(&state.config)?;

    let result = if request.query_text.trim().is_empty() {
        None
    } else {
        Some(run_query(&state, request.clone()).await?)
    };

    Ok(Html(html::render_page(
        &state.config,
        &request,
        result.as_ref(),
    )))
}

#[derive(Debug, Serialize)]
struct SearchResponse {
    corpus: String,
    #[serde(flatten)]
    result: PageResult,
}

async fn api_search(
    State(state): State<Arc<SharedState>>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, HttpError> {
    let request = params.resolve(&state.config)?;
    log::debug!("search: {request:?}");

    let corpus = request.corpus.clone();
    let result = run_query(&state, request).await?;

    Ok(Json(SearchResponse { corpus, result }))
}

#[derive(Debug, Serialize)]
struct CorpusInfo {
    name: String,
    title: String,
    loaded: bool,
}

async fn api_corpora(State(state): State<Arc<SharedState>>) -> Json<Vec<CorpusInfo>> {
    let registry = state.pipeline.registry();

    let corpora = registry
        .corpus_names()
        .map(|name| CorpusInfo {
            name: name.to_string(),
            title: state.config.corpus_title(name).to_string(),
            loaded: registry.is_loaded(name),
        })
        .collect();

    Json(corpora)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_limit() {
        assert_eq!(parse_limit(None), None);
        assert_eq!(parse_limit(Some("")), None);
        assert_eq!(parse_limit(Some("abc")), None);
        assert_eq!(parse_limit(Some("0")), None);
        assert_eq!(parse_limit(Some("-3")), None);
        assert_eq!(parse_limit(Some(" 6 ")), NonZeroUsize::new(6));
    }

    #[test]
    fn test_resolve_defaults() {
        let config = Config::default();

        let request = SearchParams::default().resolve(&config).unwrap();

        assert_eq!(request.corpus, config.default_corpus);
        assert_eq!(request.page.get(), 1);
        assert_eq!(request.per_page.get(), config.default_per_page);
        assert_eq!(request.limit, None);
    }

    #[test]
    fn test_resolve_rejects_bad_paging() {
        let config = Config::default();

        let zero_page = SearchParams {
            page: Some(0),
            ..Default::default()
        };
        assert!(matches!(
            zero_page.resolve(&config),
            Err(ApiError::InvalidParam(_))
        ));

        let huge_page_size = SearchParams {
            per_page: Some(config.max_per_page + 1),
            ..Default::default()
        };
        assert!(matches!(
            huge_page_size.resolve(&config),
            Err(ApiError::InvalidParam(_))
        ));
    }
}
