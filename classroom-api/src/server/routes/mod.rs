use crate::server::{ServerRouter, json::Json, proxy::Upstream};
use axum::{Router, extract::State};
use axum_extra::routing::{RouterExt, TypedPath};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub fn routes() -> ServerRouter {
    Router::new().typed_get(health)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/health")]
struct HealthPath;

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Health {
    status: String,
    upstream: String,
    api_key: bool,
}

#[axum::debug_handler(state = crate::server::ServerState)]
async fn health(_: HealthPath, State(upstream): State<Arc<Upstream>>) -> Json<Health> {
    Json(Health {
        status: String::from("ok"),
        upstream: upstream.base_url().to_owned(),
        api_key: upstream.has_api_key(),
    })
}
