//! Equipment lookup by QR UUID.

use axum::extract::{Path, State};
use axum::Json;
use chrono::Utc;
use database::{equipment, Checklist};
use serde::Serialize;

use crate::error::Result;
use crate::state::AppState;

#[derive(Serialize)]
pub struct ChecklistSummary {
    pub uuid: String,
    pub cadence: database::Cadence,
    pub shift: database::Shift,
    pub state: database::ChecklistState,
    pub answered: i64,
    pub total: i64,
}

#[derive(Serialize)]
pub struct EquipmentPage {
    pub id: i64,
    pub uuid: String,
    pub name: String,
    pub nr12_active: bool,
    pub hour_meter: f64,
    pub checklists: Vec<ChecklistSummary>,
}

async fn summarize(state: &AppState, chk: Checklist) -> Result<ChecklistSummary> {
    let progress = state.service.progress(chk.id).await?;
    Ok(ChecklistSummary {
        uuid: chk.uuid,
        cadence: chk.cadence,
        shift: chk.shift,
        state: chk.state,
        answered: progress.answered,
        total: progress.total,
    })
}

/// `GET /eq/{uuid}`: equipment and today's checklists.
pub async fn show(State(state): State<AppState>, Path(uuid): Path<String>) -> Result<Json<EquipmentPage>> {
    let eq = equipment::get_equipment_by_uuid(state.db().pool(), &uuid).await?;

    let mut checklists = Vec::new();
    for chk in state.service.todays_checklists(eq.id, Utc::now()).await? {
        checklists.push(summarize(&state, chk).await?);
    }

    Ok(Json(EquipmentPage {
        id: eq.id,
        uuid: eq.uuid,
        name: eq.name,
        nr12_active: eq.nr12_active,
        hour_meter: eq.hour_meter,
        checklists,
    }))
}
