use crate::server::ServerError;
use axum::response::{IntoResponse, Response};
use axum_extra::TypedHeader;
use headers::ContentType;
use serde::Serialize;

/// JSON response body whose serialization failures reply through
/// [`ServerError`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Json<T>(pub T);

impl<T: Serialize> IntoResponse for Json<T> {
    fn into_response(self) -> Response {
        serde_json::to_vec(&self.0).map_or_else(
            |e| ServerError::JsonResponse(e).into_response(),
            |json| (TypedHeader(ContentType::json()), json).into_response(),
        )
    }
}
