//! End-to-end checklist scenarios through the scheduler and the bot engine.

use bot_core::{InboundEvent, OutboundReply, RecordingSender};
use chrono::{DateTime, Utc};
use checklist_engine::{messages, ChecklistEngine, ChecklistService, EngineConfig, Focus, Scheduler};
use database::{
    alert, catalog, checklist, checklist_item, equipment, operator, Cadence, ChecklistState,
    Criticality, Database, Equipment, ItemStatus, NewEquipment, NewStandardItem, Permissions,
};

struct World {
    db: Database,
    config: EngineConfig,
    e1: Equipment,
    engine: ChecklistEngine<RecordingSender>,
}

/// E1 of type T1 with [I1 (HIGH, requires observation), I2 (LOW)], DAILY cadence.
async fn world() -> World {
    let db = Database::connect_in_memory().await.unwrap();
    let pool = db.pool();
    let t1 = catalog::create_type(pool, "T1", "").await.unwrap();
    catalog::add_standard_item(pool, t1, &NewStandardItem::new(1, "I1", Criticality::High).requires_observation(true))
        .await
        .unwrap();
    catalog::add_standard_item(pool, t1, &NewStandardItem::new(2, "I2", Criticality::Low).requires_observation(false))
        .await
        .unwrap();
    let e1 = equipment::create_equipment(pool, &NewEquipment::new("E1").nr12(t1, &[Cadence::Daily]))
        .await
        .unwrap();
    operator::create_operator(pool, "Operador Um", Some("OP0001"), Permissions::field_operator())
        .await
        .unwrap();

    let config = EngineConfig::default();
    let engine = ChecklistEngine::new(ChecklistService::new(db.clone(), config.clone()), RecordingSender::new());
    World { db, config, e1, engine }
}

async fn say(w: &World, chat_id: i64, text: &str, now: DateTime<Utc>) -> Vec<OutboundReply> {
    w.engine.handle(&InboundEvent::text(chat_id, text, now)).await
}

async fn press(w: &World, chat_id: i64, data: &str, now: DateTime<Utc>) -> Vec<OutboundReply> {
    w.engine.handle(&InboundEvent::callback(chat_id, data, now)).await
}

fn joined(replies: &[OutboundReply]) -> String {
    replies.iter().map(|r| r.body()).collect::<Vec<_>>().join("\n")
}

fn button<'a>(replies: &'a [OutboundReply], label: &str) -> Option<&'a str> {
    replies
        .iter()
        .flat_map(|r| r.buttons())
        .find(|b| b.label.contains(label))
        .map(|b| b.data.as_str())
}

#[tokio::test]
async fn s1_scheduler_creates_one_pending_checklist() {
    let w = world().await;
    let now = Utc::now();

    let report = Scheduler::new(w.db.clone(), w.config.clone()).run_due(now).await.unwrap();
    assert_eq!(report.created, 1);
    assert!(report.failures.is_empty());

    let today = checklist::list_for_equipment_on(w.db.pool(), w.e1.id, w.config.today(now)).await.unwrap();
    assert_eq!(today.len(), 1);
    assert_eq!(today[0].state, ChecklistState::Pending);
    assert_eq!(today[0].cadence, Cadence::Daily);

    let items = checklist_item::list_items(w.db.pool(), today[0].id).await.unwrap();
    let texts: Vec<_> = items.iter().map(|i| i.text.as_str()).collect();
    assert_eq!(texts, vec!["I1", "I2"]);
    assert!(items.iter().all(|i| i.status == ItemStatus::Pending));
}

#[tokio::test]
async fn s2_to_s5_fill_through_the_bot() {
    let w = world().await;
    let now = Utc::now();
    let pool = w.db.pool();
    Scheduler::new(w.db.clone(), w.config.clone()).run_due(now).await.unwrap();
    let chk = checklist::list_for_equipment_on(pool, w.e1.id, w.config.today(now)).await.unwrap().remove(0);
    let items = checklist_item::list_items(pool, chk.id).await.unwrap();

    // S2: scan the equipment QR and start the listed checklist.
    say(&w, 1, "OP0001", now).await;
    let replies = say(&w, 1, &format!("/start eq{}", w.e1.uuid), now).await;
    let start = button(&replies, "Iniciar").expect("Iniciar button");
    assert_eq!(start, format!("start:{}", chk.uuid));
    assert_eq!(checklist::get_checklist(pool, chk.id).await.unwrap().state, ChecklistState::Pending);

    let replies = press(&w, 1, start, now).await;
    assert!(joined(&replies).starts_with("Item 1/2"));
    let chk_now = checklist::get_checklist(pool, chk.id).await.unwrap();
    assert_eq!(chk_now.state, ChecklistState::InProgress);
    assert!(chk_now.responsible_operator_id.is_some());

    // S3: NOK without observation is refused.
    let replies = press(&w, 1, &format!("ans:{}:NOK", items[0].id), now).await;
    assert!(joined(&replies).contains("observação obrigatória"));
    assert_eq!(checklist_item::get_item(pool, items[0].id).await.unwrap().status, ItemStatus::Pending);

    // S4: the observation completes the NOK and advances.
    let replies = say(&w, 1, "vazamento", now).await;
    let i1 = checklist_item::get_item(pool, items[0].id).await.unwrap();
    assert_eq!(i1.status, ItemStatus::Nok);
    assert_eq!(i1.observation, "vazamento");
    assert!(joined(&replies).starts_with("Item 2/2"));
    assert_eq!(button(&replies, "OK"), Some(format!("ans:{}:OK", items[1].id).as_str()));

    // S5: the last answer completes the checklist and raises one alert.
    let replies = press(&w, 1, &format!("ans:{}:OK", items[1].id), now).await;
    assert!(joined(&replies).contains("Checklist concluído"));

    let done = checklist::get_checklist(pool, chk.id).await.unwrap();
    assert_eq!(done.state, ChecklistState::Completed);
    assert!(done.needs_maintenance);
    assert!(done.completed_at.is_some());

    let alerts = alert::list_for_checklist(pool, chk.id).await.unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].criticality, Criticality::High);
    assert_eq!(alerts[0].title, "Non-conforming: I1");
    assert_eq!(alerts[0].description, "vazamento");
}

#[tokio::test]
async fn s4_inline_nok_observation() {
    let w = world().await;
    let now = Utc::now();
    say(&w, 1, "OP0001", now).await;
    press(&w, 1, &format!("create:{}", w.e1.id), now).await;

    let replies = say(&w, 1, "NOK vazamento", now).await;
    assert!(joined(&replies).starts_with("Item 2/2"));
    let session = w.engine.sessions().get(1).await.unwrap();
    assert_eq!(session.focus, Focus::ChecklistFill);
}

#[tokio::test]
async fn observation_starting_with_an_answer_word_stays_nok() {
    let w = world().await;
    let pool = w.db.pool();
    let now = Utc::now();
    say(&w, 1, "OP0001", now).await;
    press(&w, 1, &format!("create:{}", w.e1.id), now).await;
    let chk = checklist::list_for_equipment_on(pool, w.e1.id, w.config.today(now)).await.unwrap().remove(0);
    let items = checklist_item::list_items(pool, chk.id).await.unwrap();

    press(&w, 1, &format!("ans:{}:NOK", items[0].id), now).await;
    let replies = say(&w, 1, "na mangueira hidráulica tem vazamento", now).await;
    assert!(joined(&replies).starts_with("Item 2/2"));
    let i1 = checklist_item::get_item(pool, items[0].id).await.unwrap();
    assert_eq!(i1.status, ItemStatus::Nok);
    assert_eq!(i1.observation, "na mangueira hidráulica tem vazamento");

    press(&w, 1, &format!("ans:{}:OK", items[1].id), now).await;
    let done = checklist::get_checklist(pool, chk.id).await.unwrap();
    assert_eq!(done.state, ChecklistState::Completed);
    assert!(done.needs_maintenance);
    assert_eq!(alert::list_for_checklist(pool, chk.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn bare_ok_replaces_a_pending_nok() {
    let w = world().await;
    let pool = w.db.pool();
    let now = Utc::now();
    say(&w, 1, "OP0001", now).await;
    press(&w, 1, &format!("create:{}", w.e1.id), now).await;
    let chk = checklist::list_for_equipment_on(pool, w.e1.id, w.config.today(now)).await.unwrap().remove(0);
    let items = checklist_item::list_items(pool, chk.id).await.unwrap();

    press(&w, 1, &format!("ans:{}:NOK", items[0].id), now).await;
    say(&w, 1, "OK", now).await;
    assert_eq!(checklist_item::get_item(pool, items[0].id).await.unwrap().status, ItemStatus::Ok);
}

#[tokio::test]
async fn stale_item_is_rejected_and_cursor_represented() {
    let w = world().await;
    let now = Utc::now();
    say(&w, 1, "OP0001", now).await;
    press(&w, 1, &format!("create:{}", w.e1.id), now).await;
    let chk = checklist::list_for_equipment_on(w.db.pool(), w.e1.id, w.config.today(now)).await.unwrap().remove(0);
    let items = checklist_item::list_items(w.db.pool(), chk.id).await.unwrap();

    let replies = press(&w, 1, &format!("ans:{}:OK", items[1].id), now).await;
    assert_eq!(replies[0].body(), messages::STALE_ITEM);
    assert!(replies[1].body().starts_with("Item 1/2"));
    assert_eq!(
        checklist_item::get_item(w.db.pool(), items[1].id).await.unwrap().status,
        ItemStatus::Pending
    );
}

#[tokio::test]
async fn s6_concurrent_create_yields_one_checklist() {
    let w = world().await;
    let now = Utc::now();
    operator::create_operator(w.db.pool(), "Operador Dois", Some("OP0002"), Permissions::field_operator())
        .await
        .unwrap();
    say(&w, 1, "OP0001", now).await;
    say(&w, 2, "OP0002", now).await;

    let data = format!("create:{}", w.e1.id);
    let (a, b) = tokio::join!(press(&w, 1, &data, now), press(&w, 2, &data, now));

    let today = checklist::list_for_equipment_on(w.db.pool(), w.e1.id, w.config.today(now)).await.unwrap();
    assert_eq!(today.len(), 1);
    let responsible = today[0].responsible_operator_id.expect("claimed");

    let op1 = operator::get_operator_by_code(w.db.pool(), "OP0001").await.unwrap();
    let (winner, loser, loser_chat) = if responsible == op1.id { (a, b, 2) } else { (b, a, 1) };

    assert!(joined(&winner).starts_with("Item 1/2"));
    assert!(joined(&loser).contains(messages::HELD_BY_OTHER));
    assert!(button(&loser, "Iniciar").is_none());
    assert!(button(&loser, "Continuar").is_none());

    let session = w.engine.sessions().get(loser_chat).await.unwrap();
    assert_ne!(session.focus, Focus::ChecklistFill);
    assert!(session.checklist_uuid.is_none());
}

#[tokio::test]
async fn completed_checklist_is_read_only() {
    let w = world().await;
    let now = Utc::now();
    say(&w, 1, "OP0001", now).await;
    press(&w, 1, &format!("create:{}", w.e1.id), now).await;
    say(&w, 1, "NOK vazamento", now).await;
    say(&w, 1, "OK", now).await;

    let replies = say(&w, 1, &format!("/start eq{}", w.e1.uuid), now).await;
    assert!(joined(&replies).contains("Concluído"));
    assert!(button(&replies, "Iniciar").is_none());
    assert!(button(&replies, "Criar").is_none());
}

#[tokio::test]
async fn expired_session_requires_login_and_keeps_checklist_open() {
    let w = world().await;
    let now = Utc::now();
    say(&w, 1, "OP0001", now).await;
    press(&w, 1, &format!("create:{}", w.e1.id), now).await;

    let later = now + chrono::Duration::hours(25);
    let replies = say(&w, 1, "OK", later).await;
    assert_eq!(replies[0].body(), messages::SESSION_EXPIRED);
    assert_eq!(replies[1].body(), messages::LOGIN_PROMPT);

    let today = checklist::list_for_equipment_on(w.db.pool(), w.e1.id, w.config.today(now)).await.unwrap();
    assert_eq!(today[0].state, ChecklistState::InProgress);

    // Resumable after a new login.
    say(&w, 1, "OP0001", later).await;
    let replies = press(&w, 1, &format!("resume:{}", today[0].uuid), later).await;
    assert!(joined(&replies).starts_with("Item 1/2"));
}
