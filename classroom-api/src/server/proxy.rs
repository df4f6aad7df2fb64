//! Passthrough from `/api/classroom` to the classroom service. The browser
//! never sees the upstream origin or the API key.

use crate::server::{Result, ServerError, ServerRouter};
use axum::{
    Router,
    body::{self, Body},
    extract::{Request, State},
    http::{
        HeaderMap, HeaderName, HeaderValue, Method, Uri,
        header::{
            ACCEPT, ACCEPT_ENCODING, CONNECTION, CONTENT_LENGTH, HOST, ORIGIN, REFERER,
            TRANSFER_ENCODING,
        },
    },
    response::Response,
    routing::any,
};
use reqwest::{header::InvalidHeaderValue, redirect};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

pub const PROXY_PREFIX: &str = "/api/classroom";
pub const DEFAULT_API_TARGET: &str = "https://cis.kku.ac.th/api/classroom";

const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

static API_KEY_HEADER: HeaderName = HeaderName::from_static("x-api-key");
static STRIPPED_REQUEST_HEADERS: [HeaderName; 6] =
    [HOST, CONTENT_LENGTH, ACCEPT_ENCODING, CONNECTION, ORIGIN, REFERER];
static STRIPPED_RESPONSE_HEADERS: [HeaderName; 2] = [CONTENT_LENGTH, TRANSFER_ENCODING];

pub fn routes() -> ServerRouter {
    Router::new()
        .route(PROXY_PREFIX, any(forward))
        .route(&format!("{PROXY_PREFIX}/{{*path}}"), any(forward))
}

async fn forward(State(upstream): State<Arc<Upstream>>, request: Request) -> Result<Response> {
    upstream.forward(request).await
}

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("Upstream HTTP client could not be built: {0}")]
    Client(#[from] reqwest::Error),
    #[error("Configured API key is not a valid header value: {0}")]
    ApiKey(#[from] InvalidHeaderValue),
}

#[derive(Clone, Debug)]
pub struct Upstream {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<HeaderValue>,
}

impl Upstream {
    /// An empty `api_key` counts as none.
    pub fn new(base_url: &str, api_key: Option<&str>) -> Result<Self, UpstreamError> {
        let http = reqwest::Client::builder()
            .redirect(redirect::Policy::none())
            .build()?;

        let api_key = api_key
            .filter(|key| !key.is_empty())
            .map(HeaderValue::from_str)
            .transpose()?
            .map(|mut key| {
                key.set_sensitive(true);
                key
            });

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_owned(),
            api_key,
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[must_use]
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Maps a path below [`PROXY_PREFIX`] onto the upstream, keeping the query.
    #[must_use]
    pub fn target_url(&self, uri: &Uri) -> String {
        let rest = uri.path().strip_prefix(PROXY_PREFIX).unwrap_or_default();
        let rest = rest.trim_end_matches('/');

        match uri.query() {
            Some(query) if !query.is_empty() => format!("{}{rest}?{query}", self.base_url),
            _ => format!("{}{rest}", self.base_url),
        }
    }

    #[must_use]
    pub fn outbound_headers(&self, mut headers: HeaderMap) -> HeaderMap {
        for name in &STRIPPED_REQUEST_HEADERS {
            headers.remove(name);
        }

        if !headers.contains_key(ACCEPT) {
            headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        }
        if let Some(key) = &self.api_key {
            headers.insert(&API_KEY_HEADER, key.clone());
        }

        headers
    }

    pub async fn forward(&self, request: Request) -> Result<Response> {
        let (parts, body) = request.into_parts();
        let url = self.target_url(&parts.uri);

        let mut outbound = self
            .http
            .request(parts.method.clone(), &url)
            .headers(self.outbound_headers(parts.headers));

        if !matches!(parts.method, Method::GET | Method::HEAD) {
            let body = body::to_bytes(body, MAX_BODY_BYTES)
                .await
                .map_err(ServerError::RequestBody)?;
            outbound = outbound.body(body);
        }

        debug!(method = %parts.method, %url, "Forwarding request");

        let reply = outbound
            .send()
            .await
            .map_err(|source| ServerError::Upstream {
                url: url.clone(),
                source,
            })?;

        let status = reply.status();
        let headers = relayed_headers(reply.headers().clone());
        debug!(%url, %status, "Relaying upstream reply");

        let mut response = Response::new(Body::from_stream(reply.bytes_stream()));
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        Ok(response)
    }
}

#[must_use]
pub fn relayed_headers(mut headers: HeaderMap) -> HeaderMap {
    for name in &STRIPPED_RESPONSE_HEADERS {
        headers.remove(name);
    }
    headers
}

#[cfg(test)]
mod tests {
    use crate::server::{
        ErrorResponse,
        proxy::{Upstream, relayed_headers},
        testing::{serve, serve_proxy},
    };
    use axum::{
        Json, Router,
        body::Bytes,
        http::{
            HeaderMap, HeaderValue, Method, StatusCode, Uri,
            header::{
                ACCEPT, CONTENT_LENGTH, CONTENT_TYPE, HOST, LOCATION, ORIGIN, REFERER,
                TRANSFER_ENCODING,
            },
        },
        routing::{any, get},
    };
    use serde_json::{Value, json};

    fn upstream() -> Upstream {
        Upstream::new("https://classroom.example/api/classroom/", Some("secret")).unwrap()
    }

    #[test]
    fn target_urls() {
        let upstream = upstream();
        assert_eq!(upstream.base_url(), "https://classroom.example/api/classroom");

        let cases = [
            ("/api/classroom", "https://classroom.example/api/classroom"),
            ("/api/classroom/", "https://classroom.example/api/classroom"),
            (
                "/api/classroom/status/p1",
                "https://classroom.example/api/classroom/status/p1",
            ),
            (
                "/api/classroom/class/2565?page=2&size=10",
                "https://classroom.example/api/classroom/class/2565?page=2&size=10",
            ),
        ];
        for (path, expected) in cases {
            assert_eq!(upstream.target_url(&Uri::from_static(path)), expected);
        }
    }

    #[test]
    fn outbound_headers_are_filtered() {
        let mut headers = HeaderMap::new();
        headers.insert(HOST, HeaderValue::from_static("localhost:3000"));
        headers.insert(ORIGIN, HeaderValue::from_static("http://localhost:3000"));
        headers.insert(REFERER, HeaderValue::from_static("http://localhost:3000/feed"));
        headers.insert(CONTENT_LENGTH, HeaderValue::from_static("12"));
        headers.insert("authorization", HeaderValue::from_static("Bearer t1"));
        headers.insert("x-api-key", HeaderValue::from_static("from-browser"));

        let headers = upstream().outbound_headers(headers);

        for stripped in [HOST, ORIGIN, REFERER, CONTENT_LENGTH] {
            assert!(!headers.contains_key(stripped));
        }
        assert_eq!(headers["authorization"], "Bearer t1");
        assert_eq!(headers[ACCEPT], "application/json");
        assert_eq!(headers["x-api-key"], "secret");
    }

    #[test]
    fn accept_and_missing_key_pass_through() {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("text/plain"));
        headers.insert("x-api-key", HeaderValue::from_static("from-browser"));

        let upstream = Upstream::new("http://127.0.0.1:9", Some("")).unwrap();
        assert!(!upstream.has_api_key());
        let headers = upstream.outbound_headers(headers);

        assert_eq!(headers[ACCEPT], "text/plain");
        assert_eq!(headers["x-api-key"], "from-browser");
    }

    #[test]
    fn relayed_headers_drop_framing() {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_LENGTH, HeaderValue::from_static("2"));
        headers.insert(TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let headers = relayed_headers(headers);

        assert_eq!(headers.len(), 1);
        assert_eq!(headers[CONTENT_TYPE], "application/json");
    }

    async fn echo(method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> Json<Value> {
        let header = |name: &str| headers.get(name).and_then(|value| value.to_str().ok());
        Json(json!({
            "method": method.as_str(),
            "uri": uri.to_string(),
            "apiKey": header("x-api-key"),
            "accept": header("accept"),
            "origin": header("origin"),
            "authorization": header("authorization"),
            "body": String::from_utf8_lossy(&body),
        }))
    }

    #[tokio::test]
    async fn requests_are_relayed() {
        let upstream = serve(Router::new().route("/api/classroom/{*path}", any(echo))).await;
        let proxy = serve_proxy(&format!("http://{upstream}/api/classroom"), Some("secret")).await;
        let http = reqwest::Client::new();

        let reply: Value = http
            .post(format!("http://{proxy}/api/classroom/comment?draft=1"))
            .bearer_auth("t1")
            .header("origin", "http://localhost:3000")
            .json(&json!({ "statusId": "p1", "content": "hi" }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

        assert_eq!(reply["method"], "POST");
        assert_eq!(reply["uri"], "/api/classroom/comment?draft=1");
        assert_eq!(reply["apiKey"], "secret");
        assert_eq!(reply["accept"], "application/json");
        assert_eq!(reply["origin"], Value::Null);
        assert_eq!(reply["authorization"], "Bearer t1");
        assert_eq!(reply["body"], r#"{"content":"hi","statusId":"p1"}"#);

        let reply: Value = http
            .get(format!("http://{proxy}/api/classroom/status"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

        assert_eq!(reply["method"], "GET");
        assert_eq!(reply["body"], "");
    }

    #[tokio::test]
    async fn upstream_status_and_redirects_are_kept() {
        let upstream = serve(
            Router::new()
                .route(
                    "/api/classroom/status",
                    get(|| async { (StatusCode::UNAUTHORIZED, Json(json!({ "message": "no" }))) }),
                )
                .route(
                    "/api/classroom/moved",
                    get(|| async { (StatusCode::FOUND, [(LOCATION, "/elsewhere")]) }),
                ),
        )
        .await;
        let proxy = serve_proxy(&format!("http://{upstream}/api/classroom/"), None).await;
        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .unwrap();

        let rejected = http
            .get(format!("http://{proxy}/api/classroom/status"))
            .send()
            .await
            .unwrap();
        assert_eq!(rejected.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(rejected.json::<Value>().await.unwrap(), json!({ "message": "no" }));

        let moved = http
            .get(format!("http://{proxy}/api/classroom/moved"))
            .send()
            .await
            .unwrap();
        assert_eq!(moved.status(), StatusCode::FOUND);
        assert_eq!(moved.headers()[LOCATION], "/elsewhere");
    }

    #[tokio::test]
    async fn unreachable_upstream_is_a_bad_gateway() {
        let closed = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = closed.local_addr().unwrap();
        drop(closed);
        let proxy = serve_proxy(&format!("http://{address}"), None).await;

        let response = reqwest::get(format!("http://{proxy}/api/classroom/status"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let body: ErrorResponse = response.json().await.unwrap();
        assert_eq!(body, ErrorResponse { status: 502 });
    }
}
