use axum::{
    routing::{get, post},
    Router,
};

use crate::{api::doe, state::AppState};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/doe/calculate", post(doe::calculate_doe))
        .route("/doe/calculate/batch", post(doe::calculate_doe_batch))
        .route("/doe/prosumers", get(doe::list_prosumers))
        .route("/doe/prosumers/:id", get(doe::get_prosumer))
        .with_state(state)
}
