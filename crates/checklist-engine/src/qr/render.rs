//! PNG rendering of QR payloads.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::{DynamicImage, ImageFormat, Luma};
use qrcode::{EcLevel, QrCode};
use serde::Serialize;
use tracing::debug;

use super::payload::{image_path, QrKind, QrSize};
use crate::error::{EngineError, Result};

/// One generated image file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeneratedQr {
    pub size: QrSize,
    pub path: PathBuf,
}

/// Render a payload as PNG bytes.
///
/// Error correction level M with a four-module quiet zone. Output depends
/// only on `data` and `size`.
pub fn render_png(data: &str, size: QrSize) -> Result<Vec<u8>> {
    let code = QrCode::with_error_correction_level(data.as_bytes(), EcLevel::M)
        .map_err(|e| EngineError::Qr(e.to_string()))?;

    let pixels = code
        .render::<Luma<u8>>()
        .module_dimensions(size.box_size(), size.box_size())
        .quiet_zone(true)
        .build();

    let mut bytes = Vec::new();
    DynamicImage::ImageLuma8(pixels)
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .map_err(|e| EngineError::Qr(e.to_string()))?;

    Ok(bytes)
}

/// Write all three sizes for an identity, replacing existing files.
pub async fn write_all_sizes(
    root: &Path,
    kind: QrKind,
    id: &str,
    data: &str,
) -> Result<Vec<GeneratedQr>> {
    let mut generated = Vec::with_capacity(QrSize::ALL.len());

    for size in QrSize::ALL {
        let path = image_path(root, kind, id, size);
        let bytes = render_png(data, size)?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| EngineError::Qr(format!("{}: {}", parent.display(), e)))?;
        }
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|e| EngineError::Qr(format!("{}: {}", path.display(), e)))?;

        debug!("Wrote {} ({} bytes)", path.display(), bytes.len());
        generated.push(GeneratedQr { size, path });
    }

    Ok(generated)
}
