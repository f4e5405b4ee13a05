// Copyright (c) 2026 gitvol contributors
// SPDX-License-Identifier: AGPL-3.0

//! Docker volume plugin protocol.
//!
//! Every endpoint is a `POST` with a JSON body. The engine labels request
//! bodies `application/vnd.docker.plugins.v1.2+json`, so bodies are decoded
//! from raw bytes instead of through the `Json` extractor, which insists on
//! `application/json`. Failures are answered with HTTP 500 and `{"Err": msg}`.

use axum::{
    body::Bytes,
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::fmt::Display;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::application::volume_manager::VolumeService;
use crate::domain::volume::VolumeSummary;

pub const PLUGIN_CONTENT_TYPE: &str = "application/vnd.docker.plugins.v1+json";

pub struct AppState {
    pub volume_service: Arc<dyn VolumeService>,
}

pub fn app(service: Arc<dyn VolumeService>) -> Router {
    let state = Arc::new(AppState {
        volume_service: service,
    });

    Router::new()
        .route("/Plugin.Activate", post(activate_handler))
        .route("/VolumeDriver.Create", post(create_handler))
        .route("/VolumeDriver.Remove", post(remove_handler))
        .route("/VolumeDriver.Mount", post(mount_handler))
        .route("/VolumeDriver.Unmount", post(unmount_handler))
        .route("/VolumeDriver.Path", post(path_handler))
        .route("/VolumeDriver.Get", post(get_handler))
        .route("/VolumeDriver.List", post(list_handler))
        .route("/VolumeDriver.Capabilities", post(capabilities_handler))
        .with_state(state)
}

// ============================================================================
// Request Bodies
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct CreateRequest {
    #[serde(rename = "Name", default)]
    pub name: String,

    #[serde(rename = "Opts", default)]
    pub opts: Option<HashMap<String, String>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct NameRequest {
    #[serde(rename = "Name", default)]
    pub name: String,
}

/// Mount and unmount also carry the caller's id, which only gets logged
#[derive(Debug, Default, Deserialize)]
pub struct MountRequest {
    #[serde(rename = "Name", default)]
    pub name: String,

    #[serde(rename = "ID", default)]
    pub id: String,
}

/// Parse a plugin request body. An empty body is the default request.
fn decode<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, Response> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| plugin_error("decode", format!("invalid request body: {}", e)))
}

// ============================================================================
// Responses
// ============================================================================

fn plugin_response(status: StatusCode, body: Value) -> Response {
    (
        status,
        [(header::CONTENT_TYPE, PLUGIN_CONTENT_TYPE)],
        body.to_string(),
    )
        .into_response()
}

fn plugin_ok(body: Value) -> Response {
    plugin_response(StatusCode::OK, body)
}

fn plugin_error(operation: &str, err: impl Display) -> Response {
    warn!("{} failed: {}", operation, err);
    plugin_response(
        StatusCode::INTERNAL_SERVER_ERROR,
        json!({ "Err": err.to_string() }),
    )
}

fn volume_json(summary: &VolumeSummary) -> Value {
    json!({
        "Name": summary.name,
        "Mountpoint": summary.mount_path,
        "CreatedAt": summary.created_at.to_rfc3339(),
        "Status": { "ReferenceCount": summary.reference_count },
    })
}

// ============================================================================
// Handlers
// ============================================================================

async fn activate_handler() -> Response {
    debug!("Plugin.Activate");
    plugin_ok(json!({ "Implements": ["VolumeDriver"] }))
}

async fn create_handler(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let request: CreateRequest = match decode(&body) {
        Ok(request) => request,
        Err(response) => return response,
    };
    let options = request.opts.unwrap_or_default();

    match state
        .volume_service
        .create_volume(&request.name, &options)
        .await
    {
        Ok(()) => plugin_ok(json!({})),
        Err(e) => plugin_error("VolumeDriver.Create", e),
    }
}

async fn remove_handler(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let request: NameRequest = match decode(&body) {
        Ok(request) => request,
        Err(response) => return response,
    };

    match state.volume_service.remove_volume(&request.name).await {
        Ok(()) => plugin_ok(json!({})),
        Err(e) => plugin_error("VolumeDriver.Remove", e),
    }
}

async fn mount_handler(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let request: MountRequest = match decode(&body) {
        Ok(request) => request,
        Err(response) => return response,
    };
    debug!("Mount of {} requested by {}", request.name, request.id);

    match state.volume_service.mount_volume(&request.name).await {
        Ok(path) => plugin_ok(json!({ "Mountpoint": path })),
        Err(e) => plugin_error("VolumeDriver.Mount", e),
    }
}

async fn unmount_handler(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let request: MountRequest = match decode(&body) {
        Ok(request) => request,
        Err(response) => return response,
    };
    debug!("Unmount of {} requested by {}", request.name, request.id);

    match state.volume_service.unmount_volume(&request.name).await {
        Ok(()) => plugin_ok(json!({})),
        Err(e) => plugin_error("VolumeDriver.Unmount", e),
    }
}

async fn path_handler(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let request: NameRequest = match decode(&body) {
        Ok(request) => request,
        Err(response) => return response,
    };

    match state.volume_service.volume_path(&request.name).await {
        Ok(path) => plugin_ok(json!({ "Mountpoint": path })),
        Err(e) => plugin_error("VolumeDriver.Path", e),
    }
}

async fn get_handler(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let request: NameRequest = match decode(&body) {
        Ok(request) => request,
        Err(response) => return response,
    };

    match state.volume_service.get_volume(&request.name).await {
        Ok(summary) => plugin_ok(json!({ "Volume": volume_json(&summary) })),
        Err(e) => plugin_error("VolumeDriver.Get", e),
    }
}

async fn list_handler(State(state): State<Arc<AppState>>) -> Response {
    let mut volumes = state.volume_service.list_volumes().await;
    volumes.sort_by(|a, b| a.name.cmp(&b.name));

    let volumes: Vec<Value> = volumes
        .iter()
        .map(|v| json!({ "Name": v.name, "Mountpoint": v.mount_path }))
        .collect();
    plugin_ok(json!({ "Volumes": volumes }))
}

async fn capabilities_handler(State(state): State<Arc<AppState>>) -> Response {
    plugin_ok(json!({ "Capabilities": state.volume_service.capabilities() }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::volume_manager::StandardVolumeService;
    use crate::application::volume_registry::VolumeRegistry;
    use crate::domain::source_control::{GitCredential, SourceControlClient, SourceControlError};
    use crate::infrastructure::secrets::SecretProviderRegistry;
    use crate::infrastructure::state_store::InMemoryVolumeStateStore;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use std::path::Path;
    use tempfile::TempDir;
    use tokio_util::sync::CancellationToken;
    use tower::ServiceExt;

    struct EmptyCheckout;

    #[async_trait]
    impl SourceControlClient for EmptyCheckout {
        async fn fetch(
            &self,
            _url: &str,
            destination: &Path,
            _credential: Option<&GitCredential>,
            _cancel: &CancellationToken,
        ) -> Result<(), SourceControlError> {
            std::fs::write(destination.join(".git-placeholder"), b"").unwrap();
            Ok(())
        }

        async fn checkout(
            &self,
            _repository: &Path,
            _reference: &str,
            _cancel: &CancellationToken,
        ) -> Result<(), SourceControlError> {
            Ok(())
        }
    }

    fn router(root: &Path) -> Router {
        let service = StandardVolumeService::new(
            VolumeRegistry::new(Arc::new(InMemoryVolumeStateStore::new())),
            Arc::new(SecretProviderRegistry::with_builtin_providers()),
            Arc::new(EmptyCheckout),
            root.join("volumes"),
            "stdin",
        );
        app(Arc::new(service))
    }

    async fn call(app: &Router, endpoint: &str, body: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri(endpoint)
            .header(header::CONTENT_TYPE, "application/vnd.docker.plugins.v1.2+json")
            .body(Body::from(body.to_string()))
            .unwrap();

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_activate_and_capabilities() {
        let dir = TempDir::new().unwrap();
        let app = router(dir.path());

        let (status, body) = call(&app, "/Plugin.Activate", "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "Implements": ["VolumeDriver"] }));

        let (_, body) = call(&app, "/VolumeDriver.Capabilities", "{}").await;
        assert_eq!(body, json!({ "Capabilities": { "Scope": "local" } }));
    }

    #[tokio::test]
    async fn test_volume_lifecycle_over_http() {
        let dir = TempDir::new().unwrap();
        let app = router(dir.path());
        let mount_path = dir.path().join("volumes").join("repo1");

        let (status, _) = call(
            &app,
            "/VolumeDriver.Create",
            r#"{"Name":"repo1","Opts":{"url":"https://example.com/a.git"}}"#,
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (_, body) = call(&app, "/VolumeDriver.List", "{}").await;
        assert_eq!(
            body,
            json!({ "Volumes": [{ "Name": "repo1", "Mountpoint": mount_path }] })
        );

        let (_, body) = call(&app, "/VolumeDriver.Mount", r#"{"Name":"repo1","ID":"c0ffee"}"#).await;
        assert_eq!(body, json!({ "Mountpoint": mount_path }));

        let (_, body) = call(&app, "/VolumeDriver.Get", r#"{"Name":"repo1"}"#).await;
        assert_eq!(body["Volume"]["Status"]["ReferenceCount"], 1);

        let (status, body) = call(&app, "/VolumeDriver.Remove", r#"{"Name":"repo1"}"#).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({ "Err": "volume repo1 is currently used by a container" }));

        call(&app, "/VolumeDriver.Unmount", r#"{"Name":"repo1","ID":"c0ffee"}"#).await;
        assert!(!mount_path.exists());

        let (_, body) = call(&app, "/VolumeDriver.Path", r#"{"Name":"repo1"}"#).await;
        assert_eq!(body, json!({ "Mountpoint": mount_path }));

        let (status, body) = call(&app, "/VolumeDriver.Remove", r#"{"Name":"repo1"}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({}));
    }

    #[tokio::test]
    async fn test_errors_are_reported_in_err_field() {
        let dir = TempDir::new().unwrap();
        let app = router(dir.path());

        let (status, body) = call(
            &app,
            "/VolumeDriver.Create",
            r#"{"Name":"repo2","Opts":{"url":""}}"#,
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({ "Err": "url cannot be empty" }));

        let (_, body) = call(&app, "/VolumeDriver.Create", r#"{"Name":"repo3","Opts":null}"#).await;
        assert_eq!(body, json!({ "Err": "url option is mandatory" }));

        let (_, body) = call(&app, "/VolumeDriver.Mount", r#"{"Name":"ghost"}"#).await;
        assert_eq!(body, json!({ "Err": "volume ghost not found" }));

        let (status, body) = call(&app, "/VolumeDriver.Get", "{not json").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["Err"].as_str().unwrap().starts_with("invalid request body"));
    }
}
