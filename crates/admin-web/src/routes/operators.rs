//! Printed operator badges link here; the response forwards to the bot.

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use checklist_engine::qr::operator_payload;
use database::{operator, validation};

use crate::error::{AdminError, Result};
use crate::state::AppState;

/// `GET /bot/op/{code}`: 302 to the operator login deep link.
pub async fn deep_link(State(state): State<AppState>, Path(code): Path<String>) -> Result<impl IntoResponse> {
    if !validation::is_operator_code(&code) {
        return Err(AdminError::BadRequest(format!("invalid operator code {}", code)));
    }
    let op = operator::get_operator_by_code(state.db().pool(), &code).await?;
    let target = operator_payload(&state.config().bot_deep_link_base, &op.code);

    Ok((StatusCode::FOUND, [(header::LOCATION, target)]))
}
