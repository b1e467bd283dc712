//! Checklist lifecycle operations shared by the bot engine and the web surface.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use database::validation::validate_observation;
use database::checklist_item::SubmitWrite;
use database::{
    checklist, checklist_item, Cadence, Checklist, ChecklistItem, ChecklistState, Database,
    Equipment, ItemStatus, MaintenanceAlert, NewChecklist, Operator, Progress,
};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::alerts::AlertEmitter;
use crate::catalog::Catalog;
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::registry::OperatorRegistry;

/// Result of a create-and-claim attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum CreateOutcome {
    /// This call created the checklist and holds its responsible slot.
    Created(Checklist),
    /// The slot was already taken; the existing checklist is returned.
    Existing(Checklist),
}

impl CreateOutcome {
    pub fn checklist(&self) -> &Checklist {
        match self {
            Self::Created(c) | Self::Existing(c) => c,
        }
    }
}

/// A completed checklist and what completion produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FinalizeOutcome {
    pub checklist: Checklist,
    pub alerts: Vec<MaintenanceAlert>,
}

/// One answer of a bulk web submission.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmittedResponse {
    /// Zero-based position in presentation order.
    pub item_index: usize,
    pub status: String,
    #[serde(default)]
    pub observation: Option<String>,
}

/// Bulk answers for `POST /chk/{uuid}/submit`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubmitRequest {
    #[serde(default)]
    pub responses: Vec<SubmittedResponse>,
    #[serde(default)]
    pub observations: Option<String>,
    #[serde(default)]
    pub operator_code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum SubmitOutcome {
    /// Validation failed; nothing was written.
    Rejected { errors: Vec<String> },
    /// The checklist no longer accepts answers.
    Closed { state: ChecklistState },
    Applied {
        answered: usize,
        progress: Progress,
        completed: bool,
        alerts: usize,
    },
}

/// Whether a NOK answer still lacks its required observation.
pub fn needs_observation(item: &ChecklistItem, status: ItemStatus, observation: &str) -> bool {
    status == ItemStatus::Nok && item.requires_observation && observation.trim().is_empty()
}

/// Check an answer against the item rules.
pub fn validate_answer(item: &ChecklistItem, status: ItemStatus, observation: &str) -> Result<()> {
    match status {
        ItemStatus::Pending => {
            return Err(EngineError::Input("answer must be OK, NOK or NA".into()));
        }
        ItemStatus::Na if !item.allows_na => {
            return Err(EngineError::Input(format!("NA is not allowed for '{}'", item.text)));
        }
        _ => {}
    }
    if needs_observation(item, status, observation) {
        return Err(EngineError::Input(format!(
            "observation required for NOK on '{}'",
            item.text
        )));
    }
    validate_observation(observation).map_err(|e| EngineError::Input(e.to_string()))
}

/// Bot- and web-facing checklist operations.
#[derive(Debug, Clone)]
pub struct ChecklistService {
    db: Database,
    config: EngineConfig,
    catalog: Catalog,
    registry: OperatorRegistry,
    alerts: AlertEmitter,
    locks: Arc<Mutex<HashMap<i64, Arc<Mutex<()>>>>>,
}

impl ChecklistService {
    pub fn new(db: Database, config: EngineConfig) -> Self {
        Self {
            catalog: Catalog::new(db.clone()),
            registry: OperatorRegistry::new(db.clone()),
            alerts: AlertEmitter::new(db.clone(), config.clone()),
            locks: Arc::new(Mutex::new(HashMap::new())),
            db,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &OperatorRegistry {
        &self.registry
    }

    pub fn alerts(&self) -> &AlertEmitter {
        &self.alerts
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub async fn get(&self, checklist_id: i64) -> Result<Checklist> {
        Ok(checklist::get_checklist(self.db.pool(), checklist_id).await?)
    }

    pub async fn get_by_uuid(&self, uuid: &str) -> Result<Checklist> {
        Ok(checklist::get_checklist_by_uuid(self.db.pool(), uuid).await?)
    }

    pub async fn items(&self, checklist_id: i64) -> Result<Vec<ChecklistItem>> {
        Ok(checklist_item::list_items(self.db.pool(), checklist_id).await?)
    }

    pub async fn item(&self, item_id: i64) -> Result<ChecklistItem> {
        Ok(checklist_item::get_item(self.db.pool(), item_id).await?)
    }

    pub async fn next_pending(&self, checklist_id: i64) -> Result<Option<ChecklistItem>> {
        Ok(checklist_item::next_pending(self.db.pool(), checklist_id).await?)
    }

    pub async fn progress(&self, checklist_id: i64) -> Result<Progress> {
        Ok(checklist::progress(self.db.pool(), checklist_id).await?)
    }

    /// Checklists of an equipment for the operational day of `now`.
    pub async fn todays_checklists(&self, equipment_id: i64, now: DateTime<Utc>) -> Result<Vec<Checklist>> {
        let today = self.config.today(now);
        Ok(checklist::list_for_equipment_on(self.db.pool(), equipment_id, today).await?)
    }

    /// Create today's checklist for the equipment already claimed by `operator_id`.
    ///
    /// When the slot is taken (before or during the insert) the existing
    /// checklist is returned instead.
    pub async fn create_and_claim(
        &self,
        eq: &Equipment,
        operator_id: i64,
        now: DateTime<Utc>,
    ) -> Result<CreateOutcome> {
        let pool = self.db.pool();
        let today = self.config.today(now);
        let shift = self.config.default_shift;

        if let Some(existing) = checklist::find_checklist(pool, eq.id, today, shift).await? {
            return Ok(CreateOutcome::Existing(existing));
        }

        let type_id = eq
            .type_id
            .ok_or_else(|| EngineError::Fatal(format!("equipment {} has no type", eq.name)))?;
        let items = self.catalog.snapshot_for(type_id).await?;

        let cadences = eq.cadence_set();
        let label = if cadences.contains(&Cadence::Daily) {
            Cadence::Daily
        } else {
            cadences.first().copied().unwrap_or(Cadence::Daily)
        };

        let new = NewChecklist {
            hour_meter_start: Some(eq.hour_meter),
            ..NewChecklist::pending(eq.id, today, shift, label).claimed_by(operator_id, now)
        };

        match checklist::create_with_items(pool, &new, &items).await {
            Ok(created) => {
                info!(
                    equipment_id = eq.id,
                    checklist_id = created.id,
                    operator_id,
                    "Checklist created from the bot"
                );
                Ok(CreateOutcome::Created(created))
            }
            Err(e) => match EngineError::from(e) {
                EngineError::Conflict(slot) => {
                    let existing = checklist::find_checklist(pool, eq.id, today, shift)
                        .await?
                        .ok_or(EngineError::Conflict(slot))?;
                    Ok(CreateOutcome::Existing(existing))
                }
                other => Err(other),
            },
        }
    }

    /// Take the responsible slot. Returns `false` if someone else holds it
    /// or the checklist is closed.
    pub async fn claim(&self, checklist_id: i64, operator_id: i64, now: DateTime<Utc>) -> Result<bool> {
        let lock = self.lock_for(checklist_id).await;
        let _guard = lock.lock().await;
        Ok(checklist::claim(self.db.pool(), checklist_id, operator_id, now).await?)
    }

    /// Record one answer from the responsible operator.
    ///
    /// Returns the updated item. Nothing is written when validation fails.
    pub async fn answer(
        &self,
        checklist_id: i64,
        item_id: i64,
        status: ItemStatus,
        observation: &str,
        operator_id: i64,
        now: DateTime<Utc>,
    ) -> Result<ChecklistItem> {
        let pool = self.db.pool();
        let item = checklist_item::get_item(pool, item_id).await?;
        if item.checklist_id != checklist_id {
            return Err(EngineError::Input(format!(
                "item {} does not belong to checklist {}",
                item_id, checklist_id
            )));
        }
        if item.status != ItemStatus::Pending {
            return Err(EngineError::Input(format!("item '{}' was already answered", item.text)));
        }
        let observation = observation.trim();
        validate_answer(&item, status, observation)?;

        let lock = self.lock_for(checklist_id).await;
        let _guard = lock.lock().await;

        let chk = checklist::get_checklist(pool, checklist_id).await?;
        if !chk.state.is_open() {
            return Err(EngineError::Input(format!("checklist is {}", chk.state.as_str())));
        }
        let holds_slot = match chk.responsible_operator_id {
            Some(responsible) => responsible == operator_id,
            None => checklist::claim(pool, checklist_id, operator_id, now).await?,
        };
        if !holds_slot {
            return Err(EngineError::Auth("checklist is held by another operator".into()));
        }

        if !checklist_item::answer_item(pool, item_id, status, observation, Some(operator_id), now).await? {
            return Err(EngineError::Input(format!("item '{}' can no longer be answered", item.text)));
        }

        Ok(checklist_item::get_item(pool, item_id).await?)
    }

    /// Complete a checklist with no pending items and hand off to the alert emitter.
    ///
    /// Alert failures are logged; the completion stands.
    pub async fn finalize(&self, checklist_id: i64, now: DateTime<Utc>) -> Result<FinalizeOutcome> {
        let pool = self.db.pool();
        let needs_maintenance = checklist_item::has_nok(pool, checklist_id).await?;

        if !checklist::complete(pool, checklist_id, needs_maintenance, now).await? {
            let chk = checklist::get_checklist(pool, checklist_id).await?;
            return Err(EngineError::Input(if chk.state.is_open() {
                "checklist still has pending items".to_string()
            } else {
                format!("checklist is {}", chk.state.as_str())
            }));
        }

        let chk = checklist::get_checklist(pool, checklist_id).await?;
        info!(
            checklist_id,
            equipment_id = chk.equipment_id,
            needs_maintenance,
            "Checklist completed"
        );

        let alerts = match self.alerts.emit_for(checklist_id, now).await {
            Ok(alerts) => alerts,
            Err(e) => {
                warn!(checklist_id, "Alert emission failed: {}", e);
                Vec::new()
            }
        };

        self.locks.lock().await.remove(&checklist_id);
        Ok(FinalizeOutcome { checklist: chk, alerts })
    }

    /// Abandon a checklist. Only its responsible operator may do so.
    pub async fn cancel(&self, checklist_id: i64, operator_id: i64) -> Result<()> {
        if !checklist::cancel(self.db.pool(), checklist_id, operator_id).await? {
            return Err(EngineError::Input(
                "only the responsible operator may cancel an open checklist".into(),
            ));
        }
        info!(checklist_id, operator_id, "Checklist cancelled");
        self.locks.lock().await.remove(&checklist_id);
        Ok(())
    }

    /// Apply a bulk web submission, all or nothing.
    pub async fn submit(&self, uuid: &str, request: &SubmitRequest, now: DateTime<Utc>) -> Result<SubmitOutcome> {
        let pool = self.db.pool();
        let chk = self.get_by_uuid(uuid).await?;
        if !chk.state.is_open() {
            return Ok(SubmitOutcome::Closed { state: chk.state });
        }

        let operator = match request.operator_code.as_deref().map(str::trim) {
            Some(code) if !code.is_empty() => Some(self.submitting_operator(code, &chk).await?),
            _ => {
                if chk.responsible_operator_id.is_some() {
                    return Err(EngineError::Auth(
                        "operator_code is required for a claimed checklist".into(),
                    ));
                }
                None
            }
        };

        let items = self.items(chk.id).await?;
        let mut errors = Vec::new();
        let mut answers = Vec::with_capacity(request.responses.len());
        let mut seen = vec![false; items.len()];

        for (n, response) in request.responses.iter().enumerate() {
            let Some(item) = items.get(response.item_index) else {
                errors.push(format!("responses[{}]: item_index {} out of range", n, response.item_index));
                continue;
            };
            if std::mem::replace(&mut seen[response.item_index], true) {
                errors.push(format!("responses[{}]: item_index {} repeated", n, response.item_index));
                continue;
            }
            if item.status != ItemStatus::Pending {
                errors.push(format!("responses[{}]: '{}' was already answered", n, item.text));
                continue;
            }
            let status = match response.status.parse::<ItemStatus>() {
                Ok(status) => status,
                Err(e) => {
                    errors.push(format!("responses[{}]: {}", n, e));
                    continue;
                }
            };
            let observation = response.observation.as_deref().unwrap_or_default().trim();
            if let Err(e) = validate_answer(item, status, observation) {
                errors.push(format!("responses[{}]: {}", n, e));
                continue;
            }
            answers.push((item.id, status, observation.to_string()));
        }

        if let Some(notes) = &request.observations {
            if let Err(e) = validate_observation(notes) {
                errors.push(format!("observations: {}", e));
            }
        }

        if !errors.is_empty() {
            return Ok(SubmitOutcome::Rejected { errors });
        }

        let lock = self.lock_for(chk.id).await;
        let guard = lock.lock().await;

        let operator_id = operator.as_ref().map(|op| op.id);
        let notes = request.observations.as_deref().map(str::trim);
        match checklist_item::submit_answers(pool, chk.id, operator_id, &answers, notes, now).await? {
            SubmitWrite::Applied => {}
            SubmitWrite::Held => {
                return Err(EngineError::Auth("checklist is held by another operator".into()));
            }
            SubmitWrite::Stale => {
                return Ok(SubmitOutcome::Rejected {
                    errors: vec!["checklist changed while submitting; reload and retry".into()],
                });
            }
        }
        drop(guard);

        let progress = self.progress(chk.id).await?;
        let mut completed = false;
        let mut alerts = 0;
        if progress.is_complete() {
            let outcome = self.finalize(chk.id, now).await?;
            completed = true;
            alerts = outcome.alerts.len();
        }

        info!(checklist_id = chk.id, answered = answers.len(), "Web submission applied");
        Ok(SubmitOutcome::Applied {
            answered: answers.len(),
            progress,
            completed,
            alerts,
        })
    }

    async fn submitting_operator(&self, code: &str, chk: &Checklist) -> Result<Operator> {
        let op = match database::operator::get_operator_by_code(self.db.pool(), code).await {
            Ok(op) if op.can_use_bot() => op,
            Ok(op) => return Err(EngineError::Auth(format!("operator {} is not active", op.code))),
            Err(database::DatabaseError::NotFound { .. }) => {
                return Err(EngineError::Auth(format!("unknown operator code {}", code)))
            }
            Err(e) => return Err(e.into()),
        };
        if !self.registry.can_fill(&op, chk.equipment_id).await? {
            return Err(EngineError::Auth(format!(
                "operator {} may not fill this equipment",
                op.code
            )));
        }
        if matches!(chk.responsible_operator_id, Some(r) if r != op.id) {
            return Err(EngineError::Auth("checklist is held by another operator".into()));
        }
        Ok(op)
    }

    async fn lock_for(&self, checklist_id: i64) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        Arc::clone(locks.entry(checklist_id).or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use database::{catalog, equipment, operator, Criticality, NewEquipment, NewStandardItem, Permissions};

    struct Fixture {
        service: ChecklistService,
        eq: Equipment,
        op: Operator,
    }

    async fn fixture() -> Fixture {
        let db = Database::connect_in_memory().await.unwrap();
        let pool = db.pool();
        let type_id = catalog::create_type(pool, "Retro", "").await.unwrap();
        catalog::add_standard_item(pool, type_id, &NewStandardItem::new(1, "Freios", Criticality::High))
            .await
            .unwrap();
        catalog::add_standard_item(
            pool,
            type_id,
            &NewStandardItem::new(2, "Buzina", Criticality::Low).allows_na(false),
        )
        .await
        .unwrap();
        let eq = equipment::create_equipment(pool, &NewEquipment::new("RE-1").nr12(type_id, &[Cadence::Weekly, Cadence::Daily]))
            .await
            .unwrap();
        let op = operator::create_operator(pool, "Ana", None, Permissions::field_operator())
            .await
            .unwrap();
        Fixture {
            service: ChecklistService::new(db, EngineConfig::default()),
            eq,
            op,
        }
    }

    #[tokio::test]
    async fn test_create_and_claim_then_existing() {
        let f = fixture().await;
        let now = Utc::now();

        let created = f.service.create_and_claim(&f.eq, f.op.id, now).await.unwrap();
        let CreateOutcome::Created(chk) = created else { panic!("expected creation") };
        assert_eq!(chk.state, ChecklistState::InProgress);
        assert_eq!(chk.cadence, Cadence::Daily);
        assert_eq!(chk.responsible_operator_id, Some(f.op.id));

        let again = f.service.create_and_claim(&f.eq, 999, now).await.unwrap();
        assert_eq!(again, CreateOutcome::Existing(chk.clone()));
        assert!(!f.service.claim(chk.id, 999, now).await.unwrap());
    }

    #[tokio::test]
    async fn test_answer_rules() {
        let f = fixture().await;
        let now = Utc::now();
        let chk = f.service.create_and_claim(&f.eq, f.op.id, now).await.unwrap().checklist().clone();
        let items = f.service.items(chk.id).await.unwrap();

        let err = f.service.answer(chk.id, items[0].id, ItemStatus::Nok, " ", f.op.id, now).await.unwrap_err();
        assert!(matches!(err, EngineError::Input(_)));
        assert_eq!(f.service.item(items[0].id).await.unwrap().status, ItemStatus::Pending);

        let err = f.service.answer(chk.id, items[1].id, ItemStatus::Na, "", f.op.id, now).await.unwrap_err();
        assert!(matches!(err, EngineError::Input(_)));

        let other = operator::create_operator(f.service.database().pool(), "Bia", None, Permissions::field_operator())
            .await
            .unwrap();
        let err = f.service.answer(chk.id, items[0].id, ItemStatus::Ok, "", other.id, now).await.unwrap_err();
        assert!(matches!(err, EngineError::Auth(_)));

        let answered = f.service.answer(chk.id, items[0].id, ItemStatus::Nok, "vazamento", f.op.id, now).await.unwrap();
        assert_eq!(answered.observation, "vazamento");
        assert_eq!(answered.verified_by, Some(f.op.id));

        let err = f.service.answer(chk.id, items[0].id, ItemStatus::Ok, "", f.op.id, now).await.unwrap_err();
        assert!(matches!(err, EngineError::Input(_)));
    }

    #[tokio::test]
    async fn test_finalize_requires_all_answered() {
        let f = fixture().await;
        let now = Utc::now();
        let chk = f.service.create_and_claim(&f.eq, f.op.id, now).await.unwrap().checklist().clone();
        let items = f.service.items(chk.id).await.unwrap();

        f.service.answer(chk.id, items[0].id, ItemStatus::Nok, "gasto", f.op.id, now).await.unwrap();
        assert!(matches!(f.service.finalize(chk.id, now).await, Err(EngineError::Input(_))));

        f.service.answer(chk.id, items[1].id, ItemStatus::Ok, "", f.op.id, now).await.unwrap();
        let done = f.service.finalize(chk.id, now).await.unwrap();
        assert_eq!(done.checklist.state, ChecklistState::Completed);
        assert!(done.checklist.needs_maintenance);
        assert_eq!(done.alerts.len(), 1);
        assert!(f.service.cancel(chk.id, f.op.id).await.is_err());
    }

    #[tokio::test]
    async fn test_submit_all_or_nothing() {
        let f = fixture().await;
        let now = Utc::now();
        let pool = f.service.database().pool();
        let items = catalog::active_items_for_type(pool, f.eq.type_id.unwrap()).await.unwrap();
        let today = f.service.config().today(now);
        let chk = checklist::create_with_items(
            pool,
            &NewChecklist::pending(f.eq.id, today, database::Shift::Morning, Cadence::Daily),
            &items,
        )
        .await
        .unwrap();

        let bad = SubmitRequest {
            responses: vec![
                SubmittedResponse { item_index: 0, status: "OK".into(), observation: None },
                SubmittedResponse { item_index: 1, status: "NA".into(), observation: None },
                SubmittedResponse { item_index: 5, status: "OK".into(), observation: None },
            ],
            ..SubmitRequest::default()
        };
        let SubmitOutcome::Rejected { errors } = f.service.submit(&chk.uuid, &bad, now).await.unwrap() else {
            panic!("expected rejection");
        };
        assert_eq!(errors.len(), 2);
        assert_eq!(f.service.progress(chk.id).await.unwrap().answered, 0);

        let good = SubmitRequest {
            responses: vec![
                SubmittedResponse { item_index: 0, status: "nok".into(), observation: Some("trincado".into()) },
                SubmittedResponse { item_index: 1, status: "OK".into(), observation: None },
            ],
            observations: Some("turno tranquilo".into()),
            operator_code: None,
        };
        let outcome = f.service.submit(&chk.uuid, &good, now).await.unwrap();
        assert_eq!(
            outcome,
            SubmitOutcome::Applied {
                answered: 2,
                progress: Progress { answered: 2, total: 2 },
                completed: true,
                alerts: 1,
            }
        );

        let again = f.service.submit(&chk.uuid, &good, now).await.unwrap();
        assert_eq!(again, SubmitOutcome::Closed { state: ChecklistState::Completed });
    }

    #[tokio::test]
    async fn test_submit_respects_responsible_slot() {
        let f = fixture().await;
        let now = Utc::now();
        let chk = f.service.create_and_claim(&f.eq, f.op.id, now).await.unwrap().checklist().clone();

        let anonymous = SubmitRequest {
            responses: vec![SubmittedResponse { item_index: 1, status: "OK".into(), observation: None }],
            ..SubmitRequest::default()
        };
        assert!(matches!(f.service.submit(&chk.uuid, &anonymous, now).await, Err(EngineError::Auth(_))));

        let owned = SubmitRequest {
            operator_code: Some(f.op.code.clone()),
            ..anonymous
        };
        let outcome = f.service.submit(&chk.uuid, &owned, now).await.unwrap();
        assert!(matches!(outcome, SubmitOutcome::Applied { answered: 1, completed: false, .. }));
    }
}
