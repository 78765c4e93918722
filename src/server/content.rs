//! Serving bundle content
//!
//! Each category folder is mounted behind one handler. A request is decoded,
//! confined to the folder (symlinks included) and then matched against the
//! declared assets, first by name and then by the file it resolves to, so no
//! spelling of a path bypasses the single instance check. Undeclared files in
//! the folder (scripts, images, styles) are served as they are.

use std::collections::HashMap;
use std::path::{Component, Path as FsPath, PathBuf};
use std::sync::Arc;

use axum::Router;
use axum::extract::{Path, Request, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use tower_http::services::ServeFile;

use super::AppState;
use crate::loader::{AssetCategory, AssetRoute};
use crate::path_utils::{is_plain_relative, resolve_within, to_forward_slashes};
use crate::relay::Relay;

/// A declared asset and the file it resolved to at load time
#[derive(Debug)]
struct DeclaredAsset {
    route: AssetRoute,
    canonical: Option<PathBuf>,
}

/// One category folder of one bundle
#[derive(Debug)]
struct CategoryMount {
    bundle: String,
    root: PathBuf,
    /// Declared assets by normalised relative path
    declared: HashMap<String, DeclaredAsset>,
}

impl CategoryMount {
    fn new(bundle: &str, category: &AssetCategory) -> Self {
        let declared = category
            .routes
            .iter()
            .filter_map(|route| {
                let key = normalise(&route.file)?;
                let asset = DeclaredAsset {
                    route: route.clone(),
                    canonical: dunce::canonicalize(&route.path).ok(),
                };
                Some((key, asset))
            })
            .collect();
        Self {
            bundle: bundle.to_string(),
            root: category.root.clone(),
            declared,
        }
    }

    fn declared_at(&self, canonical: &FsPath) -> Option<&DeclaredAsset> {
        self.declared
            .values()
            .find(|asset| asset.canonical.as_deref() == Some(canonical))
    }
}

/// Router for one asset category, to be nested at its URL prefix
pub fn category_router(bundle: &str, category: &AssetCategory) -> Router<AppState> {
    let mount = Arc::new(CategoryMount::new(bundle, category));
    Router::new().route(
        "/*path",
        get(
            move |State(relay): State<Relay>, Path(path): Path<String>, request: Request| {
                let mount = Arc::clone(&mount);
                async move { serve_path(&relay, &mount, &path, request).await }
            },
        ),
    )
}

/// Relative path with `.` components dropped and `/` separators
///
/// `None` for anything that is not a plain relative path.
fn normalise(relative: &str) -> Option<String> {
    let relative = relative.strip_prefix('/').unwrap_or(relative);
    let path = FsPath::new(relative);
    if !is_plain_relative(path) {
        return None;
    }
    let normalised: PathBuf = path
        .components()
        .filter(|c| matches!(c, Component::Normal(_)))
        .collect();
    Some(to_forward_slashes(&normalised))
}

async fn serve_path(relay: &Relay, mount: &CategoryMount, requested: &str, request: Request) -> Response {
    let Some(relative) = normalise(requested) else {
        tracing::debug!(bundle = %mount.bundle, path = requested, "Refusing path outside the bundle folder");
        return StatusCode::NOT_FOUND.into_response();
    };
    if let Some(asset) = mount.declared.get(&relative) {
        return serve_asset(relay, &mount.bundle, asset, request).await;
    }

    let Some(path) = resolve_within(&mount.root, &relative) else {
        tracing::debug!(bundle = %mount.bundle, path = %relative, "Refusing path escaping the bundle folder");
        return StatusCode::NOT_FOUND.into_response();
    };
    let Ok(canonical) = dunce::canonicalize(&path) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    if let Some(asset) = mount.declared_at(&canonical) {
        return serve_asset(relay, &mount.bundle, asset, request).await;
    }
    if !canonical.is_file() {
        return StatusCode::NOT_FOUND.into_response();
    }
    serve_file(&path, request).await
}

async fn serve_asset(relay: &Relay, bundle: &str, asset: &DeclaredAsset, request: Request) -> Response {
    let route = &asset.route;

    if route.single_instance && relay.is_claimed(bundle, &route.file) {
        tracing::info!(bundle, file = %route.file, "Refusing second viewer of single instance graphic");
        return (StatusCode::CONFLICT, Html(in_use_page(bundle, &route.file))).into_response();
    }
    if !route.path.is_file() {
        tracing::warn!(bundle, file = %route.file, "Declared asset does not exist");
        return (StatusCode::NOT_FOUND, Html(missing_page(bundle, &route.file))).into_response();
    }
    serve_file(&route.path, request).await
}

async fn serve_file(path: &FsPath, request: Request) -> Response {
    match ServeFile::new(path).try_call(request).await {
        Ok(response) => response.into_response(),
        Err(e) => {
            tracing::warn!(path = %path.display(), "Cannot serve file: {e}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn page(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\"><title>{title}</title></head>\
         <body><h1>{title}</h1><p>{body}</p></body></html>\n"
    )
}

pub fn missing_page(bundle: &str, file: &str) -> String {
    page(
        "Asset missing",
        &format!(
            "Bundle <code>{}</code> declares <code>{}</code>, but the file does not exist.",
            escape(bundle),
            escape(file)
        ),
    )
}

pub fn in_use_page(bundle: &str, file: &str) -> String {
    page(
        "Graphic in use",
        &format!(
            "<code>{}</code> of bundle <code>{}</code> can only be displayed once and is already open elsewhere.",
            escape(file),
            escape(bundle)
        ),
    )
}
