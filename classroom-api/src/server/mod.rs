use axum::{
    Router,
    extract::{FromRef, Request},
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
};
use json::Json;
use proxy::Upstream;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::error;

mod json;
pub mod proxy;
mod routes;

pub type ServerRouter = Router<ServerState>;

#[derive(Clone, Debug, FromRef)]
pub struct ServerState {
    pub upstream: Arc<Upstream>,
}

pub fn routes() -> ServerRouter {
    routes::routes().merge(proxy::routes()).fallback(fallback)
}

pub async fn fallback(request: Request) -> ServerError {
    ServerError::UnknownRoute(request.into_parts().0.uri)
}

pub type Result<T, E = ServerError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Unknown route requested: {0}")]
    UnknownRoute(Uri),
    #[error("JSON response could not be serialized: {0}")]
    JsonResponse(#[from] serde_json::Error),
    #[error("Request body could not be read: {0}")]
    RequestBody(axum::Error),
    #[error("Upstream {url} could not be reached: {source}")]
    Upstream {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::UnknownRoute(_) => StatusCode::NOT_FOUND,
            ServerError::RequestBody(_) => StatusCode::BAD_REQUEST,
            ServerError::JsonResponse(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ServerError::Upstream { .. } => StatusCode::BAD_GATEWAY,
        }
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub status: u16,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();

        error!(error = %self, %status, "Replying with error");

        let error_response = ErrorResponse {
            status: status.as_u16(),
        };
        (status, Json(error_response)).into_response()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use crate::server::{ServerState, proxy::Upstream, routes};
    use std::{net::SocketAddr, sync::Arc};

    pub(crate) async fn serve(app: axum::Router) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        address
    }

    /// Serves the full router in front of `upstream_url`.
    pub(crate) async fn serve_proxy(upstream_url: &str, api_key: Option<&str>) -> SocketAddr {
        let upstream = Upstream::new(upstream_url, api_key).unwrap();
        let state = ServerState {
            upstream: Arc::new(upstream),
        };
        serve(routes().with_state(state)).await
    }
}
