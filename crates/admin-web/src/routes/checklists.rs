//! QR-addressed checklist view and bulk web submission.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use checklist_engine::{SubmitOutcome, SubmitRequest};
use chrono::Utc;
use database::{equipment, Checklist, ChecklistItem, ChecklistState, Criticality, ItemStatus};
use serde::Serialize;
use serde_json::json;

use crate::error::Result;
use crate::state::AppState;

#[derive(Serialize)]
pub struct EquipmentRef {
    pub id: i64,
    pub name: String,
}

#[derive(Serialize)]
pub struct ItemView {
    pub item_index: usize,
    pub description: String,
    pub details: String,
    pub criticality: Criticality,
    pub requires_observation: bool,
    pub allows_na: bool,
    pub status: ItemStatus,
}

#[derive(Serialize)]
pub struct ChecklistView {
    pub id: i64,
    pub uuid: String,
    pub date: String,
    pub state: ChecklistState,
    pub items: Vec<ItemView>,
}

#[derive(Serialize)]
pub struct ChecklistPage {
    pub equipment: EquipmentRef,
    pub checklist: ChecklistView,
}

fn closed(chk: &Checklist) -> Response {
    (
        StatusCode::CONFLICT,
        Json(json!({
            "error": format!("checklist is {}", chk.state.as_str()),
            "status": chk.state,
        })),
    )
        .into_response()
}

fn view(chk: Checklist, items: Vec<ChecklistItem>) -> ChecklistView {
    ChecklistView {
        id: chk.id,
        uuid: chk.uuid,
        date: chk.date.to_string(),
        state: chk.state,
        items: items
            .into_iter()
            .enumerate()
            .map(|(item_index, item)| ItemView {
                item_index,
                description: item.text,
                details: item.description,
                criticality: item.criticality,
                requires_observation: item.requires_observation,
                allows_na: item.allows_na,
                status: item.status,
            })
            .collect(),
    }
}

/// `GET /chk/{uuid}`: open checklists only.
pub async fn show(State(state): State<AppState>, Path(uuid): Path<String>) -> Result<Response> {
    let chk = state.service.get_by_uuid(&uuid).await?;
    if !chk.state.is_open() {
        return Ok(closed(&chk));
    }

    let eq = equipment::get_equipment(state.db().pool(), chk.equipment_id).await?;
    let items = state.service.items(chk.id).await?;

    Ok(Json(ChecklistPage {
        equipment: EquipmentRef { id: eq.id, name: eq.name },
        checklist: view(chk, items),
    })
    .into_response())
}

/// `POST /chk/{uuid}/submit`: apply every answer or none.
pub async fn submit(
    State(state): State<AppState>,
    Path(uuid): Path<String>,
    Json(request): Json<SubmitRequest>,
) -> Result<Response> {
    let outcome = state.service.submit(&uuid, &request, Utc::now()).await?;

    let response = match &outcome {
        SubmitOutcome::Applied { .. } => (StatusCode::OK, Json(outcome)).into_response(),
        SubmitOutcome::Rejected { .. } => (StatusCode::UNPROCESSABLE_ENTITY, Json(outcome)).into_response(),
        SubmitOutcome::Closed { state: chk_state } => (
            StatusCode::CONFLICT,
            Json(json!({
                "error": format!("checklist is {}", chk_state.as_str()),
                "status": chk_state,
            })),
        )
            .into_response(),
    };
    Ok(response)
}
