//! Per-chat checklist session engine.
//!
//! Every inbound event goes through the authentication gate first, then the
//! focus state machine of the chat. Store errors never reach the transport:
//! each one becomes a reply, and the session is only mutated after the
//! write it depends on succeeded.

use std::sync::Arc;

use bot_core::{Button, EventKind, InboundEvent, OutboundReply, ReplySender, SendError};
use chrono::{DateTime, Utc};
use database::{equipment, Checklist, Equipment, ItemStatus, Operator};
use tracing::{debug, error, info, warn};

use crate::callback::{parse_text_answer, CallbackAction};
use crate::error::{EngineError, Result};
use crate::messages;
use crate::qr::{parse_payload, resolve_parsed, ParsedPayload, Resolved};
use crate::service::{needs_observation, ChecklistService, CreateOutcome};
use crate::session::{Focus, OperatorSession, SessionStatus, SessionStore};

/// Scratch key of a QR scanned before login.
pub const PENDING_QR: &str = "pending_qr";

/// What to do with the session after an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum After {
    Keep,
    Clear,
}

type Replies = Vec<OutboundReply>;

/// Drives chats through login, equipment view and checklist filling.
pub struct ChecklistEngine<S: ReplySender> {
    service: ChecklistService,
    sessions: Arc<SessionStore>,
    sender: S,
}

impl<S: ReplySender> ChecklistEngine<S> {
    pub fn new(service: ChecklistService, sender: S) -> Self {
        let sessions = Arc::new(SessionStore::new(service.config().session_timeout()));
        Self::with_sessions(service, sessions, sender)
    }

    pub fn with_sessions(service: ChecklistService, sessions: Arc<SessionStore>, sender: S) -> Self {
        Self {
            service,
            sessions,
            sender,
        }
    }

    pub fn service(&self) -> &ChecklistService {
        &self.service
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    pub fn sender(&self) -> &S {
        &self.sender
    }

    /// Handle an event and send its replies in order.
    pub async fn process(&self, event: &InboundEvent) -> std::result::Result<(), SendError> {
        let replies = self.handle(event).await;
        self.sender.send_all(&replies).await
    }

    /// Handle an event and return the replies without sending them.
    pub async fn handle(&self, event: &InboundEvent) -> Replies {
        let chat_id = event.chat_id;
        let now = event.timestamp;
        let (mut session, status) = self.sessions.begin(chat_id, now).await;

        let mut replies = Vec::new();
        if status == SessionStatus::Expired {
            replies.push(OutboundReply::text(chat_id, messages::SESSION_EXPIRED));
        }

        let outcome = if session.authenticated {
            self.handle_authenticated(&mut session, event).await
        } else {
            self.handle_login(&mut session, event).await
        };

        let after = match outcome {
            Ok((after, mut out)) => {
                replies.append(&mut out);
                after
            }
            Err(e) => {
                let (text, after) = self.error_reply(chat_id, &e);
                replies.push(OutboundReply::text(chat_id, text));
                after
            }
        };

        match after {
            After::Keep => {
                session.last_activity = now;
                self.sessions.save(session).await;
            }
            After::Clear => self.sessions.remove(chat_id).await,
        }

        replies
    }

    fn error_reply(&self, chat_id: i64, e: &EngineError) -> (&'static str, After) {
        match e {
            EngineError::Auth(_) => {
                info!(chat_id, "Session cleared: {}", e);
                (messages::ACCESS_REVOKED, After::Clear)
            }
            EngineError::Input(_) => {
                debug!(chat_id, "Rejected input: {}", e);
                (messages::INVALID_ACTION, After::Keep)
            }
            EngineError::NotFound(_) => (messages::NOT_FOUND, After::Keep),
            EngineError::TransientStore(_) | EngineError::Conflict(_) => {
                warn!(chat_id, "Store error: {}", e);
                (messages::TRY_AGAIN, After::Keep)
            }
            EngineError::Fatal(_) => {
                error!(chat_id, "{}", e);
                (messages::CANNOT_CREATE, After::Keep)
            }
            EngineError::Qr(_) => {
                error!(chat_id, "{}", e);
                (messages::INVALID_ACTION, After::Keep)
            }
        }
    }

    // ---- authentication gate ----

    async fn handle_login(&self, session: &mut OperatorSession, event: &InboundEvent) -> Result<(After, Replies)> {
        let chat_id = event.chat_id;
        let text = |t: &str| Ok((After::Keep, vec![OutboundReply::text(chat_id, t)]));

        let payload = match event.kind {
            EventKind::Text => match event.command() {
                Some(cmd) if cmd.name == "start" && !cmd.arg.is_empty() => cmd.arg.to_string(),
                Some(cmd) if cmd.name == "help" => {
                    return Ok((
                        After::Keep,
                        vec![
                            OutboundReply::text(chat_id, messages::HELP_TEXT),
                            OutboundReply::text(chat_id, messages::LOGIN_PROMPT),
                        ],
                    ))
                }
                Some(_) => return text(messages::LOGIN_PROMPT),
                None => event.payload.trim().to_string(),
            },
            EventKind::Callback | EventKind::Photo => return text(messages::LOGIN_PROMPT),
        };

        match parse_payload(&payload) {
            Ok(ParsedPayload::OperatorCode(code)) => {
                let op = match self.service.registry().authenticate(&code, chat_id, event.timestamp).await {
                    Ok(op) => op,
                    Err(EngineError::Auth(_)) => return text(messages::LOGIN_REJECTED),
                    Err(e) => return Err(e),
                };
                session.login(op.id);

                let mut replies = vec![OutboundReply::text(chat_id, messages::welcome(&op.name))];
                match session.scratch.remove(PENDING_QR) {
                    Some(pending) => {
                        let opened = match parse_payload(&pending) {
                            Ok(parsed) => self.open_target(session, &op, &parsed, event.timestamp).await,
                            Err(e) => Err(e),
                        };
                        match opened {
                            Ok(out) => replies.extend(out),
                            Err(e) => {
                                let (text, _) = self.error_reply(chat_id, &e);
                                replies.push(OutboundReply::text(chat_id, text));
                            }
                        }
                    }
                    None => replies.push(OutboundReply::text(chat_id, messages::MENU_HINT)),
                }
                Ok((After::Keep, replies))
            }
            Ok(_) => {
                session.scratch.insert(PENDING_QR.to_string(), payload);
                text(messages::LOGIN_FIRST)
            }
            Err(_) => text(messages::LOGIN_PROMPT),
        }
    }

    // ---- authenticated dispatch ----

    async fn handle_authenticated(
        &self,
        session: &mut OperatorSession,
        event: &InboundEvent,
    ) -> Result<(After, Replies)> {
        let chat_id = event.chat_id;
        let now = event.timestamp;

        let operator_id = session
            .operator_id
            .ok_or_else(|| EngineError::Auth("session without operator".into()))?;
        let op = self.service.registry().get_active(operator_id).await?;
        if op.chat_id != Some(chat_id) {
            return Err(EngineError::Auth(format!("operator {} logged in from another chat", op.code)));
        }

        if let Some(cmd) = event.command() {
            let arg = cmd.arg.to_string();
            return match cmd.name.as_str() {
                "start" if !arg.is_empty() => self.open_raw(session, &op, &arg, now).await.map(keep),
                "start" => Ok(keep(vec![OutboundReply::text(chat_id, messages::MENU_HINT)])),
                "checklist" => self.list_equipment(session, &op).await.map(keep),
                "status" => self.status(session).await.map(keep),
                "pause" => Ok(keep(self.pause(session))),
                "cancel" => {
                    let uuid = session.checklist_uuid.clone();
                    self.cancel(session, &op, uuid.as_deref()).await.map(keep)
                }
                "logout" => {
                    self.service.registry().logout(op.id).await?;
                    Ok((After::Clear, vec![OutboundReply::text(chat_id, messages::LOGGED_OUT)]))
                }
                "help" => Ok(keep(vec![OutboundReply::text(chat_id, messages::HELP_TEXT)])),
                _ => Ok(keep(vec![OutboundReply::text(chat_id, messages::UNKNOWN_INPUT)])),
            };
        }

        let replies = match event.kind {
            EventKind::Callback => match CallbackAction::parse(&event.payload) {
                Some(action) => self.handle_callback(session, &op, action, now).await?,
                None => vec![OutboundReply::text(chat_id, messages::UNKNOWN_INPUT)],
            },
            EventKind::Text => self.handle_text(session, &op, event.payload.trim(), now).await?,
            EventKind::Photo => match session.focus {
                Focus::AwaitingObservation { item_id } if !event.payload.trim().is_empty() => {
                    self.answer(session, &op, item_id, ItemStatus::Nok, event.payload.trim(), now)
                        .await?
                }
                _ => vec![OutboundReply::text(chat_id, messages::PHOTO_IGNORED)],
            },
        };

        Ok(keep(replies))
    }

    async fn handle_callback(
        &self,
        session: &mut OperatorSession,
        op: &Operator,
        action: CallbackAction,
        now: DateTime<Utc>,
    ) -> Result<Replies> {
        match action {
            CallbackAction::Equipment(id) => {
                let eq = equipment::get_equipment(self.service.database().pool(), id).await?;
                self.show_equipment(session, op, &eq, now).await
            }
            CallbackAction::Create(id) => self.create(session, op, id, now).await,
            CallbackAction::Start(uuid) | CallbackAction::Resume(uuid) => {
                self.enter_fill(session, op, &uuid, now).await
            }
            CallbackAction::Answer { item_id, status } => {
                self.answer(session, op, item_id, status, "", now).await
            }
            CallbackAction::Pause => Ok(self.pause(session)),
            CallbackAction::Cancel(uuid) => self.cancel(session, op, Some(&uuid)).await,
        }
    }

    async fn handle_text(
        &self,
        session: &mut OperatorSession,
        op: &Operator,
        text: &str,
        now: DateTime<Utc>,
    ) -> Result<Replies> {
        let chat_id = session.chat_id;

        match session.focus {
            Focus::AwaitingObservation { item_id } => {
                if text.is_empty() {
                    return Ok(vec![OutboundReply::text(chat_id, messages::OBSERVATION_REQUIRED)]);
                }
                // Only a bare OK/NA replaces the pending NOK; other text is the observation.
                return match parse_text_answer(text) {
                    Some((ItemStatus::Nok, observation)) if observation.is_empty() => {
                        Ok(vec![OutboundReply::text(chat_id, messages::OBSERVATION_REQUIRED)])
                    }
                    Some((status, observation)) => {
                        self.answer(session, op, item_id, status, &observation, now).await
                    }
                    None => self.answer(session, op, item_id, ItemStatus::Nok, text, now).await,
                };
            }
            Focus::ChecklistFill => {
                if let Some((status, observation)) = parse_text_answer(text) {
                    return match session.cursor {
                        Some(item_id) => self.answer(session, op, item_id, status, &observation, now).await,
                        None => self.present_current(session, now).await,
                    };
                }
            }
            _ => {}
        }

        match parse_payload(text) {
            Ok(parsed) => self.open_target(session, op, &parsed, now).await,
            Err(_) if session.focus == Focus::ChecklistFill => {
                Ok(vec![OutboundReply::text(chat_id, messages::ANSWER_HINT)])
            }
            Err(_) => Ok(vec![OutboundReply::text(chat_id, messages::UNKNOWN_INPUT)]),
        }
    }

    // ---- navigation ----

    async fn open_raw(&self, session: &mut OperatorSession, op: &Operator, raw: &str, now: DateTime<Utc>) -> Result<Replies> {
        match parse_payload(raw) {
            Ok(parsed) => self.open_target(session, op, &parsed, now).await,
            Err(_) => Ok(vec![OutboundReply::text(session.chat_id, messages::UNKNOWN_INPUT)]),
        }
    }

    async fn open_target(
        &self,
        session: &mut OperatorSession,
        op: &Operator,
        parsed: &ParsedPayload,
        now: DateTime<Utc>,
    ) -> Result<Replies> {
        match resolve_parsed(self.service.database(), parsed).await? {
            Resolved::Operator(_) => Ok(vec![OutboundReply::text(session.chat_id, messages::ALREADY_LOGGED_IN)]),
            Resolved::Equipment(eq) => self.show_equipment(session, op, &eq, now).await,
            Resolved::Checklist(chk) => {
                let eq = equipment::get_equipment(self.service.database().pool(), chk.equipment_id).await?;
                if !self.service.registry().can_fill(op, eq.id).await? {
                    return Ok(vec![OutboundReply::text(session.chat_id, messages::NOT_AUTHORIZED_EQUIPMENT)]);
                }
                session.focus = Focus::EquipmentView { equipment_id: Some(eq.id) };
                let mut reply = OutboundReply::text(session.chat_id, messages::equipment_header(&eq.name));
                reply = self.append_checklist(reply, &chk, op).await?;
                Ok(vec![reply])
            }
        }
    }

    async fn list_equipment(&self, session: &mut OperatorSession, op: &Operator) -> Result<Replies> {
        let chat_id = session.chat_id;
        if !op.permissions.may_checklist() {
            return Ok(vec![OutboundReply::text(chat_id, messages::NO_PERMISSION)]);
        }

        let fleet = self.service.registry().authorized_equipment(op).await?;
        if fleet.is_empty() {
            return Ok(vec![OutboundReply::text(chat_id, messages::NO_EQUIPMENT)]);
        }

        session.focus = Focus::EquipmentView { equipment_id: None };
        let reply = fleet.iter().fold(
            OutboundReply::text(chat_id, messages::SELECT_EQUIPMENT),
            |reply, eq| reply.with_row(vec![Button::new(&eq.name, CallbackAction::Equipment(eq.id).encode())]),
        );
        Ok(vec![reply])
    }

    async fn show_equipment(
        &self,
        session: &mut OperatorSession,
        op: &Operator,
        eq: &Equipment,
        now: DateTime<Utc>,
    ) -> Result<Replies> {
        let chat_id = session.chat_id;
        if !self.service.registry().can_fill(op, eq.id).await? {
            return Ok(vec![OutboundReply::text(chat_id, messages::NOT_AUTHORIZED_EQUIPMENT)]);
        }

        session.focus = Focus::EquipmentView { equipment_id: Some(eq.id) };
        let today = self.service.todays_checklists(eq.id, now).await?;

        if today.is_empty() {
            let reply = OutboundReply::text(chat_id, messages::no_checklist_today(&eq.name)).with_row(vec![
                Button::new("➕ Criar checklist", CallbackAction::Create(eq.id).encode()),
            ]);
            return Ok(vec![reply]);
        }

        let mut reply = OutboundReply::text(chat_id, messages::equipment_header(&eq.name));
        for chk in &today {
            reply = self.append_checklist(reply, chk, op).await?;
        }
        Ok(vec![reply])
    }

    /// Add a checklist line and, when the operator may work on it, its button.
    async fn append_checklist(&self, reply: OutboundReply, chk: &Checklist, op: &Operator) -> Result<OutboundReply> {
        let progress = self.service.progress(chk.id).await?;
        let mut line = messages::checklist_line(chk, &progress);

        let button = match (chk.state.is_open(), chk.responsible_operator_id) {
            (true, None) => Some(Button::new("▶️ Iniciar", CallbackAction::Start(chk.uuid.clone()).encode())),
            (true, Some(r)) if r == op.id => {
                Some(Button::new("⏯️ Continuar", CallbackAction::Resume(chk.uuid.clone()).encode()))
            }
            (true, Some(_)) => {
                line.push_str("\n  ");
                line.push_str(messages::HELD_BY_OTHER);
                None
            }
            (false, _) => None,
        };

        let reply = match reply {
            OutboundReply::Text { chat_id, text, buttons } => OutboundReply::Text {
                chat_id,
                text: format!("{}\n{}", text, line),
                buttons,
            },
            other => other,
        };
        Ok(match button {
            Some(b) => reply.with_row(vec![b]),
            None => reply,
        })
    }

    // ---- checklist fill ----

    async fn create(&self, session: &mut OperatorSession, op: &Operator, equipment_id: i64, now: DateTime<Utc>) -> Result<Replies> {
        let eq = equipment::get_equipment(self.service.database().pool(), equipment_id).await?;
        if !self.service.registry().can_fill(op, eq.id).await? {
            return Ok(vec![OutboundReply::text(session.chat_id, messages::NOT_AUTHORIZED_EQUIPMENT)]);
        }

        let uuid = match self.service.create_and_claim(&eq, op.id, now).await? {
            CreateOutcome::Created(chk) => chk.uuid,
            CreateOutcome::Existing(chk) => {
                debug!(equipment_id, "Checklist already existed, joining it");
                chk.uuid
            }
        };
        self.enter_fill(session, op, &uuid, now).await
    }

    async fn enter_fill(&self, session: &mut OperatorSession, op: &Operator, uuid: &str, now: DateTime<Utc>) -> Result<Replies> {
        let chat_id = session.chat_id;
        let chk = self.service.get_by_uuid(uuid).await?;
        if !self.service.registry().can_fill(op, chk.equipment_id).await? {
            return Ok(vec![OutboundReply::text(chat_id, messages::NOT_AUTHORIZED_EQUIPMENT)]);
        }

        if !chk.state.is_open() || !self.service.claim(chk.id, op.id, now).await? {
            let chk = self.service.get(chk.id).await?;
            let eq = equipment::get_equipment(self.service.database().pool(), chk.equipment_id).await?;
            session.focus = Focus::EquipmentView { equipment_id: Some(eq.id) };
            let reply = OutboundReply::text(chat_id, messages::equipment_header(&eq.name));
            return Ok(vec![self.append_checklist(reply, &chk, op).await?]);
        }

        session.checklist_uuid = Some(chk.uuid.clone());
        session.focus = Focus::ChecklistFill;
        info!(chat_id, checklist_id = chk.id, operator_id = op.id, "Filling checklist");
        self.present_next(session, &chk, now).await
    }

    async fn present_current(&self, session: &mut OperatorSession, now: DateTime<Utc>) -> Result<Replies> {
        match session.checklist_uuid.clone() {
            Some(uuid) => {
                let chk = self.service.get_by_uuid(&uuid).await?;
                self.present_next(session, &chk, now).await
            }
            None => Ok(vec![OutboundReply::text(session.chat_id, messages::NO_ACTIVE_CHECKLIST)]),
        }
    }

    /// Present the next pending item, or finalize when none is left.
    async fn present_next(&self, session: &mut OperatorSession, chk: &Checklist, now: DateTime<Utc>) -> Result<Replies> {
        let chat_id = session.chat_id;

        let Some(item) = self.service.next_pending(chk.id).await? else {
            let outcome = self.service.finalize(chk.id, now).await?;
            session.leave_checklist();
            return Ok(vec![OutboundReply::text(
                chat_id,
                messages::completed(outcome.checklist.needs_maintenance, outcome.alerts.len()),
            )]);
        };

        let progress = self.service.progress(chk.id).await?;
        session.cursor = Some(item.id);
        session.focus = Focus::ChecklistFill;

        let mut answers = vec![
            Button::new("✅ OK", CallbackAction::Answer { item_id: item.id, status: ItemStatus::Ok }.encode()),
            Button::new("❌ NOK", CallbackAction::Answer { item_id: item.id, status: ItemStatus::Nok }.encode()),
        ];
        if item.allows_na {
            answers.push(Button::new(
                "➖ NA",
                CallbackAction::Answer { item_id: item.id, status: ItemStatus::Na }.encode(),
            ));
        }

        let reply = OutboundReply::text(chat_id, messages::item_prompt(&item, progress.answered + 1, progress.total))
            .with_row(answers)
            .with_row(vec![Button::new("⏸️ Pausar", CallbackAction::Pause.encode())]);
        Ok(vec![reply])
    }

    async fn answer(
        &self,
        session: &mut OperatorSession,
        op: &Operator,
        item_id: i64,
        status: ItemStatus,
        observation: &str,
        now: DateTime<Utc>,
    ) -> Result<Replies> {
        let chat_id = session.chat_id;
        let filling = matches!(session.focus, Focus::ChecklistFill | Focus::AwaitingObservation { .. });
        let Some(uuid) = session.checklist_uuid.clone().filter(|_| filling) else {
            return Ok(vec![OutboundReply::text(chat_id, messages::NO_ACTIVE_CHECKLIST)]);
        };

        if session.cursor != Some(item_id) {
            let mut replies = vec![OutboundReply::text(chat_id, messages::STALE_ITEM)];
            replies.extend(self.present_current(session, now).await?);
            return Ok(replies);
        }

        let chk = self.service.get_by_uuid(&uuid).await?;
        let item = self.service.item(item_id).await?;

        if needs_observation(&item, status, observation) {
            session.focus = Focus::AwaitingObservation { item_id };
            return Ok(vec![OutboundReply::text(chat_id, messages::OBSERVATION_REQUIRED)]);
        }
        if status == ItemStatus::Na && !item.allows_na {
            return Ok(vec![OutboundReply::text(chat_id, messages::NA_NOT_ALLOWED)]);
        }

        match self.service.answer(chk.id, item_id, status, observation, op.id, now).await {
            Ok(_) => {}
            Err(EngineError::Auth(_)) => {
                session.leave_checklist();
                return Ok(vec![OutboundReply::text(chat_id, messages::HELD_BY_OTHER)]);
            }
            Err(EngineError::Input(reason)) => {
                debug!(chat_id, item_id, "Answer rejected: {}", reason);
                let mut replies = vec![OutboundReply::text(chat_id, messages::INVALID_ACTION)];
                replies.extend(self.present_current(session, now).await?);
                return Ok(replies);
            }
            Err(e) => return Err(e),
        }

        session.focus = Focus::ChecklistFill;
        self.present_next(session, &chk, now).await
    }

    fn pause(&self, session: &mut OperatorSession) -> Replies {
        let chat_id = session.chat_id;
        let Some(uuid) = session.checklist_uuid.clone() else {
            return vec![OutboundReply::text(chat_id, messages::NO_ACTIVE_CHECKLIST)];
        };
        session.focus = Focus::Idle;
        vec![OutboundReply::text(chat_id, messages::PAUSED)
            .with_row(vec![Button::new("⏯️ Continuar", CallbackAction::Resume(uuid).encode())])]
    }

    async fn cancel(&self, session: &mut OperatorSession, op: &Operator, uuid: Option<&str>) -> Result<Replies> {
        let chat_id = session.chat_id;
        let Some(uuid) = uuid else {
            return Ok(vec![OutboundReply::text(chat_id, messages::NO_ACTIVE_CHECKLIST)]);
        };
        let chk = self.service.get_by_uuid(uuid).await?;

        match self.service.cancel(chk.id, op.id).await {
            Ok(()) => {
                if session.checklist_uuid.as_deref() == Some(uuid) {
                    session.leave_checklist();
                }
                Ok(vec![OutboundReply::text(chat_id, messages::CANCELLED)])
            }
            Err(EngineError::Input(_)) => Ok(vec![OutboundReply::text(chat_id, messages::CANCEL_REFUSED)]),
            Err(e) => Err(e),
        }
    }

    async fn status(&self, session: &OperatorSession) -> Result<Replies> {
        let chat_id = session.chat_id;
        let Some(uuid) = session.checklist_uuid.as_deref() else {
            return Ok(vec![OutboundReply::text(chat_id, messages::NO_ACTIVE_CHECKLIST)]);
        };
        let chk = self.service.get_by_uuid(uuid).await?;
        let eq = equipment::get_equipment(self.service.database().pool(), chk.equipment_id).await?;
        let progress = self.service.progress(chk.id).await?;
        Ok(vec![OutboundReply::text(chat_id, messages::status(&eq.name, &chk, &progress))])
    }
}

fn keep(replies: Replies) -> (After, Replies) {
    (After::Keep, replies)
}
