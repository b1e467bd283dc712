//! QR (re)generation.

use std::path::Path as FsPath;

use axum::extract::{Path, State};
use axum::Json;
use checklist_engine::qr::GeneratedQr;
use checklist_engine::QrSize;
use serde::Serialize;

use crate::error::Result;
use crate::state::AppState;

/// Images live under `<QR_ROOT>/qr_codes` and are served from the same path.
pub const QR_MOUNT: &str = "/qr_codes";

#[derive(Debug, Serialize)]
pub struct QrFile {
    pub size: QrSize,
    pub path: String,
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct QrFiles {
    pub files: Vec<QrFile>,
}

fn listing(root: &FsPath, generated: Vec<GeneratedQr>) -> QrFiles {
    let files = generated
        .into_iter()
        .map(|g| {
            let relative = g.path.strip_prefix(root).unwrap_or(&g.path);
            let url_path = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            QrFile {
                size: g.size,
                path: g.path.display().to_string(),
                url: format!("/{}", url_path),
            }
        })
        .collect();
    QrFiles { files }
}

/// `POST /api/equipment/{id}/qr`
pub async fn equipment(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Json<QrFiles>> {
    let generated = state.qr.generate_for_equipment(id).await?;
    Ok(Json(listing(&state.config().qr_root, generated)))
}

/// `POST /api/operators/{id}/qr`
pub async fn operator(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Json<QrFiles>> {
    let generated = state.qr.generate_for_operator(id).await?;
    Ok(Json(listing(&state.config().qr_root, generated)))
}

/// `POST /api/checklists/{uuid}/qr`
pub async fn checklist(State(state): State<AppState>, Path(uuid): Path<String>) -> Result<Json<QrFiles>> {
    let generated = state.qr.generate_for_checklist(&uuid).await?;
    Ok(Json(listing(&state.config().qr_root, generated)))
}
