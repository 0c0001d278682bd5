use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use ivv_core::storage::is_snapshot_file_name;
use ivv_core::storage::reader::{self, CityView, LoadedSnapshot};
use std::path::PathBuf;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = ivv_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    if !settings.data_dir.is_dir() {
        tracing::warn!(
            data_dir = %settings.data_dir.display(),
            "data dir does not exist yet; serving empty snapshot list"
        );
    }

    let state = AppState {
        data_dir: settings.data_dir.clone(),
    };

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3000);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!(%addr, data_dir = %state.data_dir.display(), "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn app(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/snapshots", get(list_snapshots))
        .route("/snapshots/latest", get(get_latest_snapshot))
        .route("/snapshots/latest/cities/:city", get(get_latest_city))
        .route("/snapshots/:file_name", get(get_snapshot_by_name))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Debug, Clone)]
struct AppState {
    data_dir: PathBuf,
}

async fn list_snapshots(State(state): State<AppState>) -> Result<Json<Vec<String>>, StatusCode> {
    let paths = blocking(move || reader::list_snapshots(&state.data_dir))
        .await?
        .map_err(internal)?;

    Ok(Json(
        paths
            .iter()
            .filter_map(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .collect(),
    ))
}

async fn get_latest_snapshot(
    State(state): State<AppState>,
) -> Result<Json<LoadedSnapshot>, StatusCode> {
    let latest = latest_path(state).await?;
    load(latest).await.map(Json)
}

async fn get_snapshot_by_name(
    State(state): State<AppState>,
    Path(file_name): Path<String>,
) -> Result<Json<LoadedSnapshot>, StatusCode> {
    if !is_snapshot_file_name(&file_name) {
        return Err(StatusCode::BAD_REQUEST);
    }

    let path = state.data_dir.join(&file_name);
    if !path.is_file() {
        return Err(StatusCode::NOT_FOUND);
    }
    load(path).await.map(Json)
}

async fn get_latest_city(
    State(state): State<AppState>,
    Path(city): Path<String>,
) -> Result<Json<CityView>, StatusCode> {
    let latest = latest_path(state).await?;
    let snapshot = load(latest).await?;

    snapshot
        .cities
        .into_iter()
        .find(|c| c.city == city)
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

async fn latest_path(state: AppState) -> Result<PathBuf, StatusCode> {
    let paths = blocking(move || reader::list_snapshots(&state.data_dir))
        .await?
        .map_err(internal)?;
    reader::pick_latest(&paths).ok_or(StatusCode::NOT_FOUND)
}

async fn load(path: PathBuf) -> Result<LoadedSnapshot, StatusCode> {
    blocking(move || reader::load_snapshot(&path))
        .await?
        .map_err(|e| {
            tracing::warn!(error = %format!("{e:#}"), "snapshot could not be loaded");
            StatusCode::UNPROCESSABLE_ENTITY
        })
}

async fn blocking<T, F>(f: F) -> Result<T, StatusCode>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| internal(anyhow::Error::new(e)))
}

fn internal(e: anyhow::Error) -> StatusCode {
    sentry_anyhow::capture_anyhow(&e);
    tracing::error!(error = %format!("{e:#}"), "snapshot storage error");
    StatusCode::INTERNAL_SERVER_ERROR
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn init_sentry(settings: &ivv_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
