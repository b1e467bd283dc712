//! Checklist scheduler: materializes PENDING checklists for due cadences.
//!
//! Due-ness is derived from the last date each `(equipment, cadence)` was
//! satisfied and the most recent cadence boundary, so a missed run catches
//! up on the next one. Running twice on the same day creates nothing new.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc, Weekday};
use database::{
    alert, cadence_run, checklist, equipment, AlertKind, Cadence, Criticality, Database,
    Equipment, NewAlert, NewChecklist,
};
use serde::Serialize;
use tracing::{debug, error, info};

use crate::catalog::Catalog;
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};

/// Outcome of one scheduler pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunReport {
    /// Checklists created.
    pub created: usize,
    /// Equipment with a due cadence whose slot was already taken.
    pub skipped: usize,
    /// Per-equipment failures; the batch continues past them.
    pub failures: Vec<(i64, String)>,
}

impl RunReport {
    fn merge(&mut self, other: RunReport) {
        self.created += other.created;
        self.skipped += other.skipped;
        self.failures.extend(other.failures);
    }
}

impl std::fmt::Display for RunReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "created={} skipped={} failures={}",
            self.created,
            self.skipped,
            self.failures.len()
        )
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Outcome {
    Created,
    Occupied,
    NotDue,
}

/// The checklist scheduler.
#[derive(Debug, Clone)]
pub struct Scheduler {
    db: Database,
    catalog: Catalog,
    config: EngineConfig,
}

impl Scheduler {
    pub fn new(db: Database, config: EngineConfig) -> Self {
        Self {
            catalog: Catalog::new(db.clone()),
            db,
            config,
        }
    }

    /// Create checklists for every NR12 equipment with a due cadence.
    pub async fn run_due(&self, now: DateTime<Utc>) -> Result<RunReport> {
        self.run_due_for(now, None).await
    }

    /// Like [`run_due`](Self::run_due), optionally restricted to one equipment.
    pub async fn run_due_for(
        &self,
        now: DateTime<Utc>,
        equipment_id: Option<i64>,
    ) -> Result<RunReport> {
        let today = self.config.today(now);
        self.run_for_date(today, equipment_id).await
    }

    /// Run for an explicit operational date.
    pub async fn run_for_date(
        &self,
        today: NaiveDate,
        equipment_id: Option<i64>,
    ) -> Result<RunReport> {
        let mut fleet = equipment::list_nr12_active(self.db.pool()).await?;
        if let Some(id) = equipment_id {
            fleet.retain(|e| e.id == id);
        }

        let mut report = RunReport::default();
        for eq in &fleet {
            match self.process_equipment(eq, today).await {
                Ok(Outcome::Created) => report.created += 1,
                Ok(Outcome::Occupied) => report.skipped += 1,
                Ok(Outcome::NotDue) => {}
                Err(e) => {
                    error!(equipment_id = eq.id, "Checklist generation failed: {}", e);
                    report.failures.push((eq.id, e.to_string()));
                }
            }
        }

        info!("Scheduler run for {}: {}", today, report);
        Ok(report)
    }

    /// Run once per day from `start` for `days` days.
    pub async fn run_range(
        &self,
        start: NaiveDate,
        days: u32,
        equipment_id: Option<i64>,
    ) -> Result<RunReport> {
        let mut report = RunReport::default();
        for offset in 0..days.max(1) {
            let day = start + Duration::days(i64::from(offset));
            report.merge(self.run_for_date(day, equipment_id).await?);
        }
        Ok(report)
    }

    /// Cadences of the equipment due on `today`.
    pub async fn due_cadences(&self, eq: &Equipment, today: NaiveDate) -> Result<Vec<Cadence>> {
        let mut due = Vec::new();
        for cadence in eq.cadence_set() {
            let last = cadence_run::last_generated(self.db.pool(), eq.id, cadence).await?;
            let boundary = last_boundary(
                cadence,
                today,
                self.config.weekly_cadence_day,
                self.config.monthly_cadence_day,
            );
            if is_due(boundary, today, last) {
                due.push(cadence);
            }
        }
        Ok(due)
    }

    async fn process_equipment(&self, eq: &Equipment, today: NaiveDate) -> Result<Outcome> {
        let due = self.due_cadences(eq, today).await?;
        let Some(label) = due.iter().max().copied() else {
            return Ok(Outcome::NotDue);
        };

        let pool = self.db.pool();
        let shift = self.config.default_shift;

        let outcome = if checklist::find_checklist(pool, eq.id, today, shift).await?.is_some() {
            debug!(equipment_id = eq.id, "Slot for {} already taken", today);
            Outcome::Occupied
        } else {
            let type_id = eq
                .type_id
                .ok_or_else(|| EngineError::Fatal(format!("equipment {} has no type", eq.id)))?;
            let items = self.catalog.snapshot_for(type_id).await?;
            let new = NewChecklist::pending(eq.id, today, shift, label);

            match checklist::create_with_items(pool, &new, &items).await {
                Ok(created) => {
                    info!(
                        equipment_id = eq.id,
                        checklist_id = created.id,
                        "Created {} checklist for {}",
                        label,
                        today
                    );
                    Outcome::Created
                }
                Err(e) => match EngineError::from(e) {
                    EngineError::Conflict(_) => Outcome::Occupied,
                    other => return Err(other),
                },
            }
        };

        for cadence in due {
            cadence_run::mark_generated(pool, eq.id, cadence, today).await?;
        }

        Ok(outcome)
    }

    /// Raise one PREVENTIVE alert per PENDING checklist dated before today.
    ///
    /// Returns the number of alerts created.
    pub async fn flag_overdue(&self, now: DateTime<Utc>) -> Result<usize> {
        let today = self.config.today(now);
        let pool = self.db.pool();
        let overdue = checklist::list_pending_before(pool, today).await?;

        let mut created = 0;
        for c in overdue {
            if alert::exists_for_checklist(pool, c.id, AlertKind::Preventive).await? {
                continue;
            }
            let new = NewAlert {
                equipment_id: c.equipment_id,
                kind: AlertKind::Preventive,
                title: format!("Checklist {} em atraso", c.cadence),
                description: format!("Checklist de {} não foi iniciado", c.date.format("%d/%m/%Y")),
                criticality: Criticality::Medium,
                standard_item_id: None,
                scheduled_for: today + Duration::days(1),
                checklist_id: Some(c.id),
            };
            alert::create_alert(pool, &new, now).await?;
            created += 1;
        }

        if created > 0 {
            info!("Flagged {} overdue checklists", created);
        }
        Ok(created)
    }
}

/// Whether a cadence is due given its most recent boundary.
///
/// With a record, it is due until satisfied on or after the boundary. Without
/// one, only the boundary day itself triggers generation.
pub fn is_due(boundary: NaiveDate, today: NaiveDate, last: Option<NaiveDate>) -> bool {
    match last {
        Some(last) => last < boundary,
        None => boundary == today,
    }
}

/// The latest cadence boundary on or before `today`.
pub fn last_boundary(
    cadence: Cadence,
    today: NaiveDate,
    weekly_day: Weekday,
    monthly_day: u32,
) -> NaiveDate {
    match cadence {
        Cadence::Daily => today,
        Cadence::Weekly => {
            let diff = (today.weekday().num_days_from_monday() + 7
                - weekly_day.num_days_from_monday())
                % 7;
            today - Duration::days(i64::from(diff))
        }
        Cadence::Monthly => {
            let this_month = clamped_day(today.year(), today.month(), monthly_day);
            if today >= this_month {
                this_month
            } else {
                let (year, month) = if today.month() == 1 {
                    (today.year() - 1, 12)
                } else {
                    (today.year(), today.month() - 1)
                };
                clamped_day(year, month, monthly_day)
            }
        }
    }
}

fn clamped_day(year: i32, month: u32, day: u32) -> NaiveDate {
    let last = days_in_month(year, month);
    NaiveDate::from_ymd_opt(year, month, day.clamp(1, last)).unwrap_or(NaiveDate::MIN)
}

fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|d| d.pred_opt())
        .map(|d| d.day())
        .unwrap_or(28)
}
