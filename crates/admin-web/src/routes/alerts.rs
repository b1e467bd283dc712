//! Maintenance alert admin.

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::Utc;
use database::{AlertState, MaintenanceAlert};
use serde::{Deserialize, Serialize};

use crate::error::{AdminError, Result};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub state: Option<String>,
}

/// An alert with its countdown relative to today.
#[derive(Debug, Serialize)]
pub struct AlertView {
    #[serde(flatten)]
    pub alert: MaintenanceAlert,
    pub days_remaining: i64,
    pub urgent: bool,
}

fn parse_state(raw: &str) -> Result<AlertState> {
    raw.parse::<AlertState>().map_err(AdminError::BadRequest)
}

fn with_countdown(state: &AppState, alerts: Vec<MaintenanceAlert>) -> Vec<AlertView> {
    let today = state.config().today(Utc::now());
    alerts
        .into_iter()
        .map(|alert| AlertView {
            days_remaining: alert.days_remaining(today),
            urgent: alert.is_urgent(today),
            alert,
        })
        .collect()
}

/// `GET /api/alerts?state=`
pub async fn list(State(state): State<AppState>, Query(query): Query<ListQuery>) -> Result<Json<Vec<AlertView>>> {
    let filter = query.state.as_deref().filter(|s| !s.trim().is_empty()).map(parse_state).transpose()?;
    let alerts = state.service.alerts().list(filter).await?;
    Ok(Json(with_countdown(&state, alerts)))
}

/// `POST /api/alerts/{id}/notify`
pub async fn notify(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Json<MaintenanceAlert>> {
    Ok(Json(state.service.alerts().mark_notified(id, Utc::now()).await?))
}

/// `POST /api/alerts/{id}/resolve`
pub async fn resolve(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Json<MaintenanceAlert>> {
    Ok(Json(state.service.alerts().mark_resolved(id, Utc::now()).await?))
}

/// `POST /api/checklists/{uuid}/alerts`: re-run emission for a completed checklist.
pub async fn emit(State(state): State<AppState>, Path(uuid): Path<String>) -> Result<Json<Vec<MaintenanceAlert>>> {
    let chk = state.service.get_by_uuid(&uuid).await?;
    Ok(Json(state.service.alerts().emit_for(chk.id, Utc::now()).await?))
}
