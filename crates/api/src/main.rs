use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rateintel_core::analytics::brief::{build_brief, DailyBrief};
use rateintel_core::analytics::changes::{
    detect_changes, series_for, summarize, RateChangeEvent, RateDriftSummary,
};
use rateintel_core::analytics::detail::{product_details, ProductDetail};
use rateintel_core::analytics::rank::{rank, Ranking};
use rateintel_core::analytics::risk::{risk_board, RiskBoard};
use rateintel_core::analytics::stats::{slice_stats, SliceStats};
use rateintel_core::domain::dataset::RateDataset;
use rateintel_core::domain::product::{is_known_term, ProductType};
use rateintel_core::domain::view::ViewState;
use rateintel_core::error::{SliceError, SourceError};
use rateintel_core::storage::{CachedRateSource, PgRateSource, TableNames};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = rateintel_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let tables = TableNames::from_settings(&settings)?;
    let source = match settings.require_database_url() {
        Ok(db_url) => match rateintel_core::storage::connect(db_url).await {
            Ok(pool) => Some(Arc::new(CachedRateSource::new(
                PgRateSource::new(pool, tables),
                settings.cache_ttl,
            ))),
            Err(e) => {
                sentry_anyhow::capture_anyhow(&e);
                tracing::error!(error = %e, "db connect failed; starting API in degraded mode");
                None
            }
        },
        Err(e) => {
            sentry_anyhow::capture_anyhow(&e);
            tracing::error!(error = %e, "DATABASE_URL missing; starting API in degraded mode");
            None
        }
    };

    let state = AppState {
        source,
        reference_bank: settings.reference_bank.clone(),
    };

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/slices/:product_type/:term/ranking", get(get_ranking))
        .route("/slices/:product_type/:term/stats", get(get_stats))
        .route("/slices/:product_type/:term/risks", get(get_risks))
        .route("/products", get(get_products))
        .route("/history", get(get_history))
        .route("/brief", get(get_brief))
        .route("/refresh", post(refresh))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3000);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!(%addr, reference_bank = %settings.reference_bank, "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn healthz() -> &'static str {
    "ok"
}

type Source = CachedRateSource<PgRateSource>;

#[derive(Clone)]
struct AppState {
    source: Option<Arc<Source>>,
    reference_bank: String,
}

impl AppState {
    async fn dataset(&self) -> Result<Arc<RateDataset>, ApiError> {
        let Some(source) = &self.source else {
            return Err(ApiError::new(
                StatusCode::SERVICE_UNAVAILABLE,
                "degraded",
                "rate database is not configured",
            ));
        };
        source.dataset().await.map_err(ApiError::from)
    }

    fn reference_bank<'a>(&'a self, requested: &'a Option<String>) -> &'a str {
        requested
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(&self.reference_bank)
    }
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    body: serde_json::Value,
}

impl ApiError {
    fn new(status: StatusCode, kind: &str, message: impl ToString) -> Self {
        Self {
            status,
            body: json!({ "kind": kind, "message": message.to_string() }),
        }
    }
}

impl From<SourceError> for ApiError {
    fn from(e: SourceError) -> Self {
        let err = anyhow::Error::new(e);
        sentry_anyhow::capture_anyhow(&err);
        tracing::error!(error = %err, "rate dataset load failed");
        let status = match err.downcast_ref::<SourceError>() {
            Some(SourceError::Unavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        ApiError::new(status, "upstream", err)
    }
}

impl From<SliceError> for ApiError {
    fn from(e: SliceError) -> Self {
        let message = e.to_string();
        let mut body = serde_json::to_value(&e).unwrap_or_else(|_| json!({}));
        body["message"] = json!(message);
        Self {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            body,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

fn parse_slice(product_type: &str, term: &str) -> Result<(ProductType, i32), ApiError> {
    let product_type = product_type
        .parse::<ProductType>()
        .map_err(|e| ApiError::new(StatusCode::BAD_REQUEST, "bad_request", e))?;
    let term = term
        .trim()
        .parse::<i32>()
        .ok()
        .filter(|t| is_known_term(*t))
        .ok_or_else(|| {
            ApiError::new(StatusCode::BAD_REQUEST, "bad_request", format!("unsupported term: {term}"))
        })?;
    Ok((product_type, term))
}

#[derive(Debug, Deserialize)]
struct ReferenceQuery {
    reference: Option<String>,
}

async fn get_ranking(
    State(state): State<AppState>,
    Path((product_type, term)): Path<(String, String)>,
    Query(q): Query<ReferenceQuery>,
) -> ApiResult<Ranking> {
    let (product_type, term) = parse_slice(&product_type, &term)?;
    let dataset = state.dataset().await?;
    let reference = state.reference_bank(&q.reference);
    Ok(Json(rank(&dataset.products, product_type, term, reference)))
}

async fn get_stats(
    State(state): State<AppState>,
    Path((product_type, term)): Path<(String, String)>,
) -> ApiResult<SliceStats> {
    let (product_type, term) = parse_slice(&product_type, &term)?;
    let dataset = state.dataset().await?;
    Ok(Json(slice_stats(&dataset.products, product_type, term)))
}

async fn get_risks(
    State(state): State<AppState>,
    Path((product_type, term)): Path<(String, String)>,
    Query(q): Query<ReferenceQuery>,
) -> ApiResult<RiskBoard> {
    let (product_type, term) = parse_slice(&product_type, &term)?;
    let dataset = state.dataset().await?;
    let reference = state.reference_bank(&q.reference);
    let ranking = rank(&dataset.products, product_type, term, reference);
    let board = risk_board(&dataset.comparison, &ranking)?;
    Ok(Json(board))
}

#[derive(Debug, Deserialize)]
struct ViewQuery {
    product_type: Option<String>,
    term: Option<String>,
    bank: Option<String>,
    #[serde(default)]
    show_all_changes: bool,
    reference: Option<String>,
}

impl ViewQuery {
    fn view_state(&self) -> Result<ViewState, ApiError> {
        let defaults = ViewState::default();
        let (product_type, term_months) = parse_slice(
            self.product_type
                .as_deref()
                .unwrap_or(defaults.product_type.as_str()),
            &self
                .term
                .clone()
                .unwrap_or_else(|| defaults.term_months.to_string()),
        )?;
        Ok(ViewState {
            product_type,
            term_months,
            bank: self
                .bank
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty() && *s != "전체")
                .map(str::to_string),
            show_all_changes: self.show_all_changes,
        })
    }
}

async fn get_products(
    State(state): State<AppState>,
    Query(q): Query<ViewQuery>,
) -> ApiResult<Vec<ProductDetail>> {
    let view = q.view_state()?;
    let dataset = state.dataset().await?;
    let reference = state.reference_bank(&q.reference);
    Ok(Json(product_details(&dataset.products, &view, reference)))
}

async fn get_brief(
    State(state): State<AppState>,
    Query(q): Query<ViewQuery>,
) -> ApiResult<DailyBrief> {
    let view = q.view_state()?;
    let dataset = state.dataset().await?;
    let reference = state.reference_bank(&q.reference);
    let brief = build_brief(&dataset, &view, reference, chrono::Utc::now()).map_err(|e| {
        sentry_anyhow::capture_anyhow(&e);
        ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "internal", e)
    })?;
    Ok(Json(brief))
}

#[derive(Debug, Deserialize)]
struct HistoryQuery {
    bank: String,
    product: String,
    term: String,
    product_type: Option<String>,
}

#[derive(Debug, Serialize)]
struct ApiHistory {
    bank_name: String,
    product_name: String,
    term_months: i32,
    observations: usize,
    events: Vec<RateChangeEvent>,
    summary: RateDriftSummary,
}

async fn get_history(
    State(state): State<AppState>,
    Query(q): Query<HistoryQuery>,
) -> ApiResult<ApiHistory> {
    let term = q
        .term
        .trim()
        .parse::<i32>()
        .map_err(|e| ApiError::new(StatusCode::BAD_REQUEST, "bad_request", e))?;
    let product_type = q
        .product_type
        .as_deref()
        .map(str::parse::<ProductType>)
        .transpose()
        .map_err(|e| ApiError::new(StatusCode::BAD_REQUEST, "bad_request", e))?;

    let dataset = state.dataset().await?;
    let series = series_for(&dataset.history, &q.bank, &q.product, term, product_type);

    Ok(Json(ApiHistory {
        bank_name: q.bank,
        product_name: q.product,
        term_months: term,
        observations: series.len(),
        events: detect_changes(&series),
        summary: summarize(&series),
    }))
}

async fn refresh(State(state): State<AppState>) -> StatusCode {
    match &state.source {
        Some(source) => {
            source.invalidate().await;
            StatusCode::NO_CONTENT
        }
        None => StatusCode::SERVICE_UNAVAILABLE,
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn init_sentry(settings: &rateintel_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_slices() {
        assert_eq!(parse_slice("deposit", "12").unwrap(), (ProductType::Deposit, 12));
        assert_eq!(parse_slice("적금", " 6 ").unwrap(), (ProductType::Savings, 6));
    }

    #[test]
    fn rejects_unknown_slices() {
        assert_eq!(
            parse_slice("fund", "12").unwrap_err().status,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            parse_slice("deposit", "18").unwrap_err().status,
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn view_query_defaults_and_all_banks() {
        let q = ViewQuery {
            product_type: None,
            term: None,
            bank: Some("전체".to_string()),
            show_all_changes: true,
            reference: None,
        };
        let view = q.view_state().unwrap();
        assert_eq!(view.product_type, ProductType::Deposit);
        assert_eq!(view.term_months, 12);
        assert_eq!(view.bank, None);
        assert!(view.show_all_changes);
    }

    #[test]
    fn slice_errors_become_unprocessable() {
        let err = ApiError::from(SliceError::MissingReferenceBank {
            bank: "우리은행".to_string(),
            product_type: ProductType::Deposit,
            term_months: 12,
        });
        assert_eq!(err.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(err.body["kind"], "missing_reference_bank");
    }

    #[test]
    fn requested_reference_overrides_default() {
        let state = AppState {
            source: None,
            reference_bank: "우리은행".to_string(),
        };
        assert_eq!(state.reference_bank(&Some(" 부산은행 ".to_string())), "부산은행");
        assert_eq!(state.reference_bank(&Some("".to_string())), "우리은행");
        assert_eq!(state.reference_bank(&None), "우리은행");
    }
}
