//! HTTP surface
//!
//! ```text
//! GET /ws                               relay WebSocket
//! GET /bundles/<bundle>/panels/...      panel content
//! GET /bundles/<bundle>/graphics/...    graphic content
//! GET /api/v1/{bundles,panels,graphics,status}
//! GET /...                              static dashboard files
//! ```
//!
//! ## Modules
//!
//! - [`api`]: Dashboard JSON API
//! - [`catalog`]: Read-only view of loaded bundles
//! - [`content`]: Bundle content routes

pub mod api;
pub mod catalog;
pub mod content;

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use axum::Router;
use axum::extract::FromRef;
use axum::routing::get;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

pub use catalog::{Catalog, FailedBundle};

use crate::error::{OmphalosError, Result};
use crate::loader::AssetCategory;
use crate::relay::Relay;
use crate::relay::socket::websocket_handler;

/// Shared state of every request handler
#[derive(Clone)]
pub struct AppState {
    pub relay: Relay,
    pub catalog: Arc<Catalog>,
}

impl FromRef<AppState> for Relay {
    fn from_ref(state: &AppState) -> Self {
        state.relay.clone()
    }
}

/// Build the application router
pub fn router(state: AppState, static_dir: &Path) -> Router {
    let mut app = Router::new()
        .route("/ws", get(websocket_handler))
        .nest("/api/v1", api::routes());

    for bundle in state.catalog.bundles() {
        for category in bundle.assets.categories() {
            let prefix = AssetCategory::url_prefix(&bundle.manifest.name, category.kind);
            app = app.nest(&prefix, content::category_router(&bundle.manifest.name, category));
        }
    }

    app.fallback_service(ServeDir::new(static_dir))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind `addr` and serve until the process is stopped
///
/// # Errors
///
/// Returns `ServerFailed` if the address cannot be bound or serving fails.
pub async fn serve(addr: SocketAddr, app: Router) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| OmphalosError::ServerFailed {
            message: format!("cannot listen on {addr}: {e}"),
        })?;
    tracing::info!("Listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| OmphalosError::ServerFailed {
            message: e.to_string(),
        })
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::loader::{LoadedBundle, validate_assets};
    use crate::manifest::validate;
    use crate::relay::{ClientIdentity, ClientKind, ClientMessage, ServerMessage};
    use crate::test_fixtures::{create_temp_dir, package, write_bundle, write_file};
    use serde_json::json;
    use tempfile::TempDir;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    struct Fixture {
        temp: TempDir,
        relay: Relay,
        app: Router,
    }

    impl Fixture {
        fn graphics(&self) -> std::path::PathBuf {
            self.temp.path().join("bundles").join("clock").join("graphics")
        }

        /// Open the clock graphic in a viewer; keep the receiver to stay connected
        fn claim_clock(&self) -> tokio::sync::mpsc::UnboundedReceiver<ServerMessage> {
            let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
            let viewer = self.relay.connect(tx);
            self.relay
                .handle(
                    viewer,
                    ClientMessage::Hello(ClientIdentity {
                        bundle: "clock".to_string(),
                        name: "clock.html".to_string(),
                        kind: ClientKind::Graphic,
                    }),
                )
                .unwrap();
            rx
        }
    }

    fn fixture() -> Fixture {
        let temp = create_temp_dir();
        let raw = package(
            "clock",
            "1.0.0",
            json!({
                "panels": [{ "file": "control.html", "name": "control", "title": "Clock",
                             "size": { "width": 2, "height": 2 } }],
                "graphics": [
                    { "file": "clock.html", "size": { "width": 1920, "height": 1080 }, "singleInstance": true },
                    { "file": "gone.html", "size": { "width": 1920, "height": 1080 } }
                ]
            }),
        );
        let dir = write_bundle(&temp.path().join("bundles"), "clock", &raw);
        write_file(&dir, "panels/control.html", "<p>control panel</p>");
        write_file(&dir, "graphics/clock.html", "<p>clock graphic</p>");
        write_file(&dir, "graphics/style.css", "p { color: red }");
        let www = temp.path().join("www");
        write_file(&www, "index.html", "<p>dashboard</p>");

        let manifest = validate(&raw, &dir).unwrap();
        let assets = validate_assets(&manifest).unwrap();
        let relay = Relay::new();
        relay.register_single_instance("clock", "clock.html");
        let state = AppState {
            relay: relay.clone(),
            catalog: Arc::new(
                Catalog::new(vec![LoadedBundle {
                    manifest: Arc::new(manifest),
                    assets,
                }])
                .with_failures([FailedBundle {
                    name: "ticker".to_string(),
                    reason: "dependency 'feeds' did not load".to_string(),
                }]),
            ),
        };
        let app = router(state, &www);
        Fixture {
            temp,
            relay,
            app,
        }
    }

    async fn request(app: Router, path: &str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await });

        let mut stream = TcpStream::connect(addr).await.unwrap();
        let head = format!("GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n");
        stream.write_all(head.as_bytes()).await.unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }

    #[tokio::test]
    async fn test_declared_assets_are_served() {
        let fx = fixture();
        let response = request(fx.app.clone(), "/bundles/clock/panels/control.html").await;
        assert!(response.starts_with("HTTP/1.1 200"));
        assert!(response.contains("text/html"));
        assert!(response.contains("control panel"));

        let response = request(fx.app, "/bundles/clock/graphics/style.css").await;
        assert!(response.starts_with("HTTP/1.1 200"));
        assert!(response.contains("color: red"));
    }

    #[tokio::test]
    async fn test_missing_asset_page() {
        let fx = fixture();
        let response = request(fx.app, "/bundles/clock/graphics/gone.html").await;
        assert!(response.starts_with("HTTP/1.1 404"));
        assert!(response.contains("Asset missing"));
    }

    #[tokio::test]
    async fn test_claimed_single_instance_graphic_conflicts() {
        let fx = fixture();
        let response = request(fx.app.clone(), "/bundles/clock/graphics/clock.html").await;
        assert!(response.starts_with("HTTP/1.1 200"));

        let _viewer = fx.claim_clock();

        let response = request(fx.app, "/bundles/clock/graphics/clock.html").await;
        assert!(response.starts_with("HTTP/1.1 409"));
        assert!(response.contains("Graphic in use"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_claimed_graphic_conflicts_under_any_spelling() {
        let fx = fixture();
        std::os::unix::fs::symlink(fx.graphics().join("clock.html"), fx.graphics().join("alias.html")).unwrap();
        let _viewer = fx.claim_clock();

        for path in [
            "/bundles/clock/graphics/clock%2Ehtml",
            "/bundles/clock/graphics/./clock.html",
            "/bundles/clock/graphics/alias.html",
        ] {
            let response = request(fx.app.clone(), path).await;
            assert!(response.starts_with("HTTP/1.1 409"), "{path}: {response}");
            assert!(!response.contains("clock graphic"), "{path}");
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_symlink_out_of_folder_not_served() {
        let fx = fixture();
        let secret = write_file(fx.temp.path(), "secret.txt", "top secret");
        std::os::unix::fs::symlink(&secret, fx.graphics().join("link.html")).unwrap();

        let response = request(fx.app, "/bundles/clock/graphics/link.html").await;
        assert!(response.starts_with("HTTP/1.1 404"));
        assert!(!response.contains("top secret"));
    }

    #[tokio::test]
    async fn test_traversal_not_served() {
        let fx = fixture();
        write_file(fx.temp.path(), "secret.txt", "top secret");
        for path in [
            "/bundles/clock/graphics/..%2F..%2F..%2Fsecret.txt",
            "/bundles/clock/graphics/..%2Fpackage.json",
        ] {
            let response = request(fx.app.clone(), path).await;
            assert!(response.starts_with("HTTP/1.1 404"), "{path}: {response}");
            assert!(!response.contains("top secret"), "{path}");
            assert!(!response.contains("\"name\""), "{path}");
        }
    }

    #[tokio::test]
    async fn test_api_and_static_fallback() {
        let fx = fixture();
        let response = request(fx.app.clone(), "/api/v1/bundles").await;
        assert!(response.starts_with("HTTP/1.1 200"));
        assert!(response.contains(r#""name":"clock""#));

        let response = request(fx.app.clone(), "/api/v1/status").await;
        assert!(response.contains(r#""connections":0"#));
        assert!(response.contains(r#""failed":[{"name":"ticker""#));

        let response = request(fx.app, "/index.html").await;
        assert!(response.starts_with("HTTP/1.1 200"));
        assert!(response.contains("dashboard"));
    }
}
