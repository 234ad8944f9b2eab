use crate::report::ReportRunner;
use crate::state::AppState;
use axum::Router;
use axum::routing::{get, post};
use std::sync::{Arc, RwLock};

pub mod handlers;
pub mod responses;

#[derive(Clone)]
pub struct ApiState {
    pub reports: Arc<RwLock<AppState>>,
    pub runner: Arc<ReportRunner>,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/trigger_report", post(handlers::trigger_report))
        .route("/get_report", get(handlers::get_report))
        .with_state(state)
}
