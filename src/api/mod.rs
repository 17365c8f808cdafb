use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};
use serde::Deserialize;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::PipelineConfig;
use crate::db::load_matches;
use crate::models::{
    ApiResponse, BacktestReport, FixturePrediction, FixtureSummary, MatchRecord, Page, PipelineError,
};
use crate::services::PredictionEngine;
use crate::utils::DEFAULT_PAGE_SIZE;

/// Shared, read-only request state. Each request re-runs the pipeline over
/// the same loaded records.
#[derive(Clone)]
pub struct AppState {
    records: Arc<[MatchRecord]>,
    engine: PredictionEngine,
}

impl AppState {
    pub fn new(records: Vec<MatchRecord>, engine: PredictionEngine) -> Self {
        Self {
            records: records.into(),
            engine,
        }
    }
}

type ApiError = (StatusCode, Json<ApiResponse<()>>);
type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

pub async fn serve(port: u16, config: PipelineConfig) -> anyhow::Result<()> {
    let records = load_matches(&config.data_path, &config.team_names)?;
    let state = AppState::new(records, PredictionEngine::from_config(&config));

    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
    tracing::info!("Predictor API server listening on port {}", port);

    axum::serve(listener, app).await?;
    Ok(())
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/future-matches", get(future_matches_handler))
        .route("/api/predictions/{id}", get(predict_fixture_handler))
        .route("/api/backtest", get(backtest_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

// Health check endpoint
async fn health_check() -> Json<ApiResponse<&'static str>> {
    Json(ApiResponse::success("Predictor API is running"))
}

// GET /api/future-matches - Upcoming fixtures, one row per match
#[derive(Deserialize)]
struct FutureMatchesQuery {
    page: Option<usize>,
    page_size: Option<usize>,
}

async fn future_matches_handler(
    State(state): State<AppState>,
    Query(params): Query<FutureMatchesQuery>,
) -> ApiResult<Page<FixtureSummary>> {
    let page = params.page.unwrap_or(1);
    let page_size = params.page_size.unwrap_or(DEFAULT_PAGE_SIZE);

    let fixtures = run_pipeline(state, move |engine, records| {
        engine.list_future_fixtures(records, page, page_size)
    })
    .await?;

    Ok(Json(ApiResponse::success(fixtures)))
}

// GET /api/predictions/{id} - Outcome percentages for one fixture
async fn predict_fixture_handler(
    State(state): State<AppState>,
    Path(fixture_id): Path<String>,
) -> ApiResult<FixturePrediction> {
    let prediction = run_pipeline(state, move |engine, records| {
        engine.predict_fixture(records, &fixture_id)
    })
    .await?;

    Ok(Json(ApiResponse::success(prediction)))
}

// GET /api/backtest - Holdout precision and per-fixture predictions
async fn backtest_handler(State(state): State<AppState>) -> ApiResult<BacktestReport> {
    let report = run_pipeline(state, |engine, records| engine.backtest(records)).await?;
    Ok(Json(ApiResponse::success(report)))
}

/// Training is CPU-bound, so the pipeline runs on the blocking pool.
async fn run_pipeline<T, F>(state: AppState, job: F) -> Result<T, ApiError>
where
    F: FnOnce(&PredictionEngine, &[MatchRecord]) -> crate::models::Result<T> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(move || job(&state.engine, &state.records)).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(error_response(&e)),
        Err(e) => {
            tracing::error!("Pipeline task failed: {}", e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("prediction task failed".to_string())),
            ))
        }
    }
}

fn error_response(error: &PipelineError) -> ApiError {
    let status = match error {
        PipelineError::NotFound { .. } => StatusCode::NOT_FOUND,
        PipelineError::EmptyTrainingSet { .. } | PipelineError::EmptyInferenceSet { .. } => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    if status.is_server_error() {
        tracing::error!("Pipeline failed: {}", error);
    } else {
        tracing::warn!("Request rejected: {}", error);
    }

    (status, Json(ApiResponse::error(error.to_string())))
}
