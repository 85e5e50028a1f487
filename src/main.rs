//! Dance School Timetable - Axum Server
//!
//! Run with: cargo run
//! Then open: http://localhost:7860

use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use dance_timetable::api;
use dance_timetable::config::SolverConfig;
use dance_timetable::demo_data::{self, DemoData};
use dance_timetable::service::SolverService;
use dance_timetable::store::InMemoryStore;

const CONFIG_PATH: &str = "solver.toml";
const DEFAULT_PORT: u16 = 7860;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("dance_timetable=info".parse()?))
        .init();

    #[cfg(feature = "console")]
    dance_timetable::console::print_banner();

    let config = if std::path::Path::new(CONFIG_PATH).exists() {
        SolverConfig::load(CONFIG_PATH).unwrap_or_else(|e| {
            warn!(error = %e, "Falling back to default solver configuration");
            SolverConfig::default()
        })
    } else {
        SolverConfig::default()
    };

    let seed = demo_data::generate(DemoData::Small);
    #[cfg(feature = "console")]
    dance_timetable::console::print_config(
        seed.timeslots.len(),
        seed.rooms.len(),
        seed.teachers.len(),
        seed.lessons.len(),
    );
    let store = Arc::new(InMemoryStore::from_schedule(&seed)?);
    let state = Arc::new(api::AppState::new(SolverService::new(store, config)));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = api::router(state).layer(cors);

    let port = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(DEFAULT_PORT);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "Server listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
