use crate::auth::login_handler;
use crate::cart::{CartCookies, CartSession};
use crate::config::ServerConfig;
use crate::graphql::{ClientInfo, GraphQLSchema};
use crate::metrics;
use crate::storage::Storage;
use async_graphql_axum::{GraphQLRequest, GraphQLResponse};
use axum::{
    extract::ConnectInfo,
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE, COOKIE, SET_COOKIE, USER_AGENT},
        HeaderMap, HeaderValue, Method,
    },
    response::{Html, IntoResponse, Json, Response},
    routing::{get, post},
    Extension, Router,
};
use hyper::Server;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Shared state for the GraphQL endpoint
#[derive(Clone)]
pub struct AppState {
    pub schema: GraphQLSchema,
    pub cookies: CartCookies,
}

/// Health check endpoint
async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "family-coffee",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn metrics_handler() -> impl IntoResponse {
    (
        [(CONTENT_TYPE, "text/plain; version=0.0.4")],
        metrics::render(),
    )
}

/// First `X-Forwarded-For` hop, else the socket peer.
fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
}

/// GraphQL handler (supports GET and POST)
///
/// Every request gets its own cart session from the signed cookie; a cart
/// created or extended while resolving is re-issued in `Set-Cookie`.
async fn graphql_handler(
    Extension(state): Extension<AppState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    req: GraphQLRequest,
) -> Response {
    let token = headers
        .get(COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| state.cookies.read(v));
    let session = Arc::new(CartSession::new(token));
    let client = ClientInfo {
        ip: client_ip(&headers, connect_info.map(|ConnectInfo(addr)| addr)),
        user_agent: headers
            .get(USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string(),
    };

    let request = req.into_inner().data(session.clone()).data(client);
    let response: GraphQLResponse = state.schema.execute(request).await.into();
    let mut response = response.into_response();

    if let Some(issued) = session.issued_token().await {
        match HeaderValue::from_str(&state.cookies.set_cookie(issued)) {
            Ok(cookie) => {
                response.headers_mut().append(SET_COOKIE, cookie);
            }
            Err(e) => warn!("Could not encode cart cookie: {}", e),
        }
    }
    response
}

async fn graphiql() -> impl IntoResponse {
    Html(
        async_graphql::http::GraphiQLSource::build()
            .endpoint("/graphql")
            .finish(),
    )
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin '{}'", origin);
                None
            }
        })
        .collect();

    let cors = CorsLayer::new().allow_methods([Method::GET, Method::POST, Method::OPTIONS]);
    if allowed.is_empty() {
        cors.allow_origin(Any).allow_headers(Any)
    } else {
        // Credentialed requests carry the cart cookie across origins.
        cors.allow_origin(AllowOrigin::list(allowed))
            .allow_headers([CONTENT_TYPE, AUTHORIZATION])
            .allow_credentials(true)
    }
}

/// Create the HTTP server with all routes, including GraphQL
pub fn create_server(
    schema: GraphQLSchema,
    storage: Arc<dyn Storage>,
    cookies: CartCookies,
    config: &ServerConfig,
) -> Router {
    let state = AppState { schema, cookies };

    let mut router = Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics_handler))
        .route("/graphql", post(graphql_handler).get(graphql_handler))
        .route("/graphiql", get(graphiql))
        .route("/api/auth/login/", post(login_handler));

    let media_path = format!("/{}", config.media_url.trim_matches('/'));
    if media_path != "/" {
        router = router.nest_service(&media_path, ServeDir::new(&config.media_root));
    }

    router
        .layer(Extension(state))
        .layer(Extension(storage))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(&config.cors_origins)),
        )
}

/// Start the HTTP server on the configured host and port
pub async fn start_server(app: Router, host: &str, port: u16) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{host}:{port}").parse()?;

    info!("HTTP server running on http://{addr}");
    info!("Health check: http://{addr}/health");
    info!("GraphQL:      http://{addr}/graphql");
    info!("GraphiQL UI:  http://{addr}/graphiql");

    Server::bind(&addr)
        .serve(app.into_make_service_with_connect_info::<SocketAddr>())
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forwarded_for_wins_over_peer() {
        let mut headers = HeaderMap::new();
        let peer: SocketAddr = "10.0.0.5:4000".parse().unwrap();
        assert_eq!(client_ip(&headers, Some(peer)).as_deref(), Some("10.0.0.5"));

        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.7, 10.0.0.1"));
        assert_eq!(client_ip(&headers, Some(peer)).as_deref(), Some("203.0.113.7"));
        assert_eq!(client_ip(&HeaderMap::new(), None), None);
    }
}
