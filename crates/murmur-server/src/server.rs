//! HTTP front end: index page, WebSocket upgrade and the accept loop.

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use bytes::Bytes;
use http::header::{self, HeaderName, HeaderValue};
use http::{Method, Request, Response, StatusCode, Uri};
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use murmur_hub::{attach, HubHandle};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::handshake::derive_accept_key;
use tokio_tungstenite::tungstenite::protocol::{Role, WebSocketConfig};
use tokio_tungstenite::WebSocketStream;

use crate::ws::WsReader;

/// Configuration for [`Server`].
///
/// ```rust
/// use murmur_server::ServerConfig;
///
/// let config = ServerConfig::new("127.0.0.1:8080".parse().unwrap())
///     .index("static/index.html")
///     .max_message_size(4096);
/// assert_eq!(config.addr().port(), 8080);
/// ```
#[derive(Debug, Clone)]
pub struct ServerConfig {
    addr: SocketAddr,
    index: PathBuf,
    max_message_size: usize,
}

impl ServerConfig {
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            index: PathBuf::from("index.html"),
            max_message_size: murmur_hub::MAX_MESSAGE_SIZE,
        }
    }

    /// Path of the page served at `/` (default: `index.html`).
    pub fn index(mut self, path: impl Into<PathBuf>) -> Self {
        self.index = path.into();
        self
    }

    /// Largest WebSocket message accepted from a client (default: 1024).
    ///
    /// Should match the hub's limit.
    pub fn max_message_size(mut self, bytes: usize) -> Self {
        self.max_message_size = bytes;
        self
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }
}

struct Shared {
    hub: HubHandle,
    index: PathBuf,
    ws_config: WebSocketConfig,
}

/// A bound listener ready to serve.
pub struct Server {
    listener: TcpListener,
    shared: Arc<Shared>,
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("local_addr", &self.listener.local_addr().ok())
            .field("index", &self.shared.index)
            .finish()
    }
}

impl Server {
    /// Bind the listener. Connections are attached to `hub`.
    pub async fn bind(config: ServerConfig, hub: HubHandle) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(config.addr)
            .await
            .with_context(|| format!("failed to bind {}", config.addr))?;

        let mut ws_config = WebSocketConfig::default();
        ws_config.max_message_size = Some(config.max_message_size);
        ws_config.max_frame_size = Some(config.max_message_size);

        Ok(Self {
            listener,
            shared: Arc::new(Shared {
                hub,
                index: config.index,
                ws_config,
            }),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections until `shutdown` resolves.
    pub async fn serve(self, shutdown: impl Future<Output = ()>) -> anyhow::Result<()> {
        tracing::info!(addr = %self.local_addr()?, "listening");
        tokio::pin!(shutdown);

        loop {
            let (stream, remote) = tokio::select! {
                _ = &mut shutdown => break,
                accepted = self.listener.accept() => match accepted {
                    Ok(pair) => pair,
                    Err(e) => {
                        tracing::warn!("accept failed: {e}");
                        continue;
                    }
                },
            };

            let shared = self.shared.clone();
            tokio::spawn(async move {
                let service = service_fn(move |req| handle(req, shared.clone(), remote));
                if let Err(e) = http1::Builder::new()
                    .serve_connection(TokioIo::new(stream), service)
                    .with_upgrades()
                    .await
                {
                    tracing::debug!(%remote, "http connection error: {e}");
                }
            });
        }

        tracing::info!("stopped accepting connections");
        Ok(())
    }
}

// ── Routing ───────────────────────────────────────────────────────────

#[derive(Debug, PartialEq, Eq)]
enum Route {
    Home,
    Socket,
    MethodNotAllowed,
    NotFound,
}

fn route<B>(req: &Request<B>) -> Route {
    match req.uri().path() {
        "/" if *req.method() == Method::GET => Route::Home,
        "/" => Route::MethodNotAllowed,
        "/ws" => Route::Socket,
        _ => Route::NotFound,
    }
}

async fn handle(
    req: Request<Incoming>,
    shared: Arc<Shared>,
    remote: SocketAddr,
) -> Result<Response<Full<Bytes>>, Infallible> {
    tracing::info!(%remote, method = %req.method(), uri = %req.uri(), "request");
    let response = match route(&req) {
        Route::Home => serve_home(&shared).await,
        Route::Socket => serve_ws(req, shared, remote),
        Route::MethodNotAllowed => text(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed"),
        Route::NotFound => text(StatusCode::NOT_FOUND, "Not found"),
    };
    Ok(response)
}

async fn serve_home(shared: &Shared) -> Response<Full<Bytes>> {
    match tokio::fs::read(&shared.index).await {
        Ok(page) => {
            let mut response = Response::new(Full::new(Bytes::from(page)));
            response.headers_mut().insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/html; charset=utf-8"),
            );
            response
        }
        Err(e) => {
            tracing::warn!(path = %shared.index.display(), "cannot read index page: {e}");
            text(StatusCode::NOT_FOUND, "Not found")
        }
    }
}

fn serve_ws(mut req: Request<Incoming>, shared: Arc<Shared>, remote: SocketAddr) -> Response<Full<Bytes>> {
    let accept = match check_upgrade(&req) {
        Ok(accept) => accept,
        Err(rejection) => {
            tracing::debug!(%remote, "upgrade rejected: {}", rejection.reason);
            return rejection.into_response();
        }
    };

    let on_upgrade = hyper::upgrade::on(&mut req);
    tokio::spawn(async move {
        let upgraded = match on_upgrade.await {
            Ok(upgraded) => upgraded,
            Err(e) => {
                tracing::warn!(%remote, "upgrade failed: {e}");
                return;
            }
        };
        let ws = WebSocketStream::from_raw_socket(
            TokioIo::new(upgraded),
            Role::Server,
            Some(shared.ws_config.clone()),
        )
        .await;
        let (reader, writer) = WsReader::split(ws);

        match attach(&shared.hub, remote.to_string(), reader, writer).await {
            Ok(tasks) => tracing::debug!(%remote, peer = %tasks.id(), "websocket attached"),
            Err(e) => tracing::warn!(%remote, "cannot attach websocket: {e}"),
        }
    });

    let mut response = Response::new(Full::default());
    *response.status_mut() = StatusCode::SWITCHING_PROTOCOLS;
    let headers = response.headers_mut();
    headers.insert(header::CONNECTION, HeaderValue::from_static("Upgrade"));
    headers.insert(header::UPGRADE, HeaderValue::from_static("websocket"));
    headers.insert(header::SEC_WEBSOCKET_ACCEPT, accept);
    response
}

// ── Handshake validation ──────────────────────────────────────────────

#[derive(Debug)]
struct Rejection {
    status: StatusCode,
    reason: &'static str,
    /// Tell the client which protocol version we speak.
    advertise_version: bool,
}

impl Rejection {
    fn new(status: StatusCode, reason: &'static str) -> Self {
        Self {
            status,
            reason,
            advertise_version: false,
        }
    }

    fn unsupported_version() -> Self {
        Self {
            advertise_version: true,
            ..Self::new(StatusCode::BAD_REQUEST, "unsupported websocket version")
        }
    }

    fn into_response(self) -> Response<Full<Bytes>> {
        let mut response = text(self.status, self.reason);
        if self.advertise_version {
            response
                .headers_mut()
                .insert(header::SEC_WEBSOCKET_VERSION, HeaderValue::from_static("13"));
        }
        response
    }
}

/// Validate a WebSocket opening handshake and return the
/// `Sec-WebSocket-Accept` value for it.
fn check_upgrade<B>(req: &Request<B>) -> Result<HeaderValue, Rejection> {
    if !has_token(req, header::CONNECTION, "upgrade") {
        return Err(Rejection::new(
            StatusCode::BAD_REQUEST,
            "'upgrade' token not found in 'Connection' header",
        ));
    }
    if !has_token(req, header::UPGRADE, "websocket") {
        return Err(Rejection::new(
            StatusCode::BAD_REQUEST,
            "'websocket' token not found in 'Upgrade' header",
        ));
    }
    if *req.method() != Method::GET {
        return Err(Rejection::new(StatusCode::METHOD_NOT_ALLOWED, "request method is not GET"));
    }
    if !has_token(req, header::SEC_WEBSOCKET_VERSION, "13") {
        return Err(Rejection::unsupported_version());
    }
    if !origin_matches_host(req) {
        return Err(Rejection::new(StatusCode::FORBIDDEN, "origin not allowed"));
    }

    let key = req
        .headers()
        .get(header::SEC_WEBSOCKET_KEY)
        .map(|k| k.as_bytes())
        .filter(|k| !k.is_empty())
        .ok_or_else(|| {
            Rejection::new(
                StatusCode::BAD_REQUEST,
                "'Sec-WebSocket-Key' header is missing or blank",
            )
        })?;

    HeaderValue::from_str(&derive_accept_key(key)).map_err(|_| {
        Rejection::new(StatusCode::BAD_REQUEST, "invalid 'Sec-WebSocket-Key' header")
    })
}

/// Whether any comma-separated value of header `name` equals `token`,
/// ignoring ASCII case.
fn has_token<B>(req: &Request<B>, name: HeaderName, token: &str) -> bool {
    req.headers()
        .get_all(name)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|t| t.trim().eq_ignore_ascii_case(token))
}

/// Browsers always send `Origin`; a request without one is not cross-site.
/// Otherwise the origin's host must equal the request's `Host`.
fn origin_matches_host<B>(req: &Request<B>) -> bool {
    let Some(origin) = req.headers().get(header::ORIGIN) else {
        return true;
    };
    let Some(origin_host) = origin
        .to_str()
        .ok()
        .and_then(|o| o.parse::<Uri>().ok())
        .and_then(|uri| uri.authority().map(|a| a.as_str().to_owned()))
    else {
        return false;
    };
    let host = req
        .headers()
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .unwrap_or_default();
    origin_host.eq_ignore_ascii_case(host)
}

fn text(status: StatusCode, body: &'static str) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from_static(body.as_bytes())));
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}
