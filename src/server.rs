use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Result;
use hyper::service::{make_service_fn, service_fn};
use hyper::{header, Body, Method, Request, Response, Server, StatusCode};
use tracing::{debug, error, info};

use crate::config::ServerConfig;
use crate::deployment::Deployment;
use crate::request::RequestContext;

/// Header carrying the caller's session, used to scope stateful beans.
pub const SESSION_HEADER: &str = "x-session-id";

/// Deployed applications keyed by name.
pub type Applications = BTreeMap<String, Deployment>;

/// HTTP surface exposing the naming directories of the deployed applications
pub struct HttpServer {
    config: ServerConfig,
    applications: Arc<Applications>,
}

impl HttpServer {
    pub fn new(config: ServerConfig, applications: Arc<Applications>) -> Self {
        HttpServer { config, applications }
    }

    /// Start the HTTP server
    pub async fn start(&self) -> Result<()> {
        let addr: std::net::SocketAddr = format!("{}:{}", self.config.host, self.config.port)
            .parse()
            .map_err(|e| {
                error!("Failed to parse server address: {}", e);
                anyhow::Error::from(e)
            })?;

        let applications = self.applications.clone();

        info!("🚀 Starting HTTP server on {}:{}", self.config.host, self.config.port);
        info!("📦 Serving {} application(s)", applications.len());

        let make_svc = make_service_fn(move |_conn| {
            let applications = applications.clone();

            async move {
                Ok::<_, hyper::Error>(service_fn(move |req| {
                    let applications = applications.clone();
                    handle_request(req, applications)
                }))
            }
        });

        let server = Server::try_bind(&addr)
            .map_err(|e| {
                error!("Failed to bind to {}: {}", addr, e);
                anyhow::Error::from(e)
            })?
            .serve(make_svc);

        server.await.map_err(anyhow::Error::from)
    }
}

/// Routes a request to the application listing, a binding listing, a lookup
/// or, for `DELETE /<app>`, the end of the caller's session.
pub async fn handle_request(
    req: Request<Body>,
    applications: Arc<Applications>,
) -> Result<Response<Body>, hyper::Error> {
    debug!("Received request: {} {}", req.method(), req.uri());

    let deleting = req.method() == Method::DELETE;
    if req.method() != Method::GET && !deleting {
        return Ok(method_not_allowed());
    }

    let segments = match path_segments(req.uri().path()) {
        Some(segments) => segments,
        None => {
            return Ok(json_response(
                StatusCode::BAD_REQUEST,
                serde_json::json!({ "success": false, "error": "malformed path" }),
            ))
        }
    };

    let Some((app_name, ref_path)) = segments.split_first() else {
        if deleting {
            return Ok(method_not_allowed());
        }
        return Ok(list_applications(&applications));
    };

    let Some(deployment) = applications.get(app_name) else {
        return Ok(json_response(
            StatusCode::NOT_FOUND,
            serde_json::json!({ "success": false, "error": format!("unknown application {}", app_name) }),
        ));
    };

    let session = req
        .headers()
        .get(SESSION_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);

    match (deleting, ref_path.is_empty()) {
        (true, true) => Ok(end_session(deployment, session)),
        (true, false) => Ok(method_not_allowed()),
        (false, true) => Ok(list_bindings(deployment)),
        (false, false) => Ok(lookup(deployment, ref_path.join("/"), session).await),
    }
}

/// Lookups may run application callbacks, so they run on the blocking pool.
async fn lookup(deployment: &Deployment, ref_name: String, session: Option<String>) -> Response<Body> {
    let application = deployment.application.clone();

    let result = tokio::task::spawn_blocking(move || {
        let request = match session {
            Some(session) => RequestContext::with_session(session),
            None => RequestContext::new(),
        };
        let uri = application.global_uri(&ref_name)?.to_string();
        let value = application.lookup(&uri, Some(&request))?;
        debug!(
            "Request {} resolved {} ({} proxies cached)",
            request.id(),
            uri,
            request.cached_proxy_count()
        );
        Ok::<_, crate::errors::NamingError>((uri, value.describe()))
    })
    .await;

    match result {
        Ok(Ok((uri, value))) => json_response(
            StatusCode::OK,
            serde_json::json!({ "success": true, "uri": uri, "value": value }),
        ),
        Ok(Err(e)) => crate::errors::handle_error_response(e.into()),
        Err(e) => crate::errors::handle_error_response(anyhow::anyhow!("lookup task failed: {}", e)),
    }
}

/// Drops the stateful bean instances held for the caller's session.
fn end_session(deployment: &Deployment, session: Option<String>) -> Response<Body> {
    let Some(session) = session else {
        return json_response(
            StatusCode::BAD_REQUEST,
            serde_json::json!({ "success": false, "error": format!("missing {} header", SESSION_HEADER) }),
        );
    };

    let ended = deployment.container.end_session(&session);
    info!(
        "Ended session {} of application {} ({} instance(s))",
        session,
        deployment.application.name(),
        ended
    );
    json_response(
        StatusCode::OK,
        serde_json::json!({
            "success": true,
            "application": deployment.application.name(),
            "session": session,
            "ended": ended,
        }),
    )
}

fn list_applications(applications: &Applications) -> Response<Body> {
    let listing: Vec<serde_json::Value> = applications
        .values()
        .map(|deployment| {
            serde_json::json!({
                "name": deployment.application.name(),
                "unique_name": deployment.application.unique_name(),
                "container": deployment.container.stats(),
            })
        })
        .collect();

    json_response(
        StatusCode::OK,
        serde_json::json!({ "success": true, "applications": listing }),
    )
}

fn list_bindings(deployment: &Deployment) -> Response<Body> {
    let application = &deployment.application;
    let prefix = format!("php:global/{}/", application.unique_name());

    let bindings: Vec<serde_json::Value> = application
        .naming_directory()
        .bindings()
        .into_iter()
        .map(|(uri, binding)| (uri.to_string(), binding))
        .filter(|(uri, _)| uri.starts_with(&prefix))
        .map(|(uri, binding)| serde_json::json!({ "uri": uri, "binding": binding.describe() }))
        .collect();

    json_response(
        StatusCode::OK,
        serde_json::json!({
            "success": true,
            "application": application.name(),
            "bindings": bindings,
        }),
    )
}

/// Splits and percent-decodes the request path; `None` if a segment doesn't decode.
fn path_segments(path: &str) -> Option<Vec<String>> {
    path.split('/')
        .filter(|segment| !segment.is_empty())
        .map(|segment| urlencoding::decode(segment).ok().map(|s| s.into_owned()))
        .collect()
}

fn method_not_allowed() -> Response<Body> {
    json_response(
        StatusCode::METHOD_NOT_ALLOWED,
        serde_json::json!({ "success": false, "error": "method not allowed" }),
    )
}

fn json_response(status: StatusCode, body: serde_json::Value) -> Response<Body> {
    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap_or_else(|_| internal_server_error())
}

/// Create an internal server error response
fn internal_server_error() -> Response<Body> {
    let mut response = Response::new(Body::from("Internal Server Error"));
    *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_segments_are_decoded() {
        assert_eq!(
            path_segments("/shop/env%2Fcurrency/"),
            Some(vec!["shop".to_string(), "env/currency".to_string()])
        );
        assert_eq!(path_segments("/"), Some(Vec::new()));
        assert_eq!(path_segments("/%FF"), None);
    }
}
