//! Route handlers for the admin web interface.

pub mod alerts;
pub mod checklists;
pub mod equipment;
pub mod health;
pub mod operators;
pub mod qr;

use axum::routing::{get, post};
use axum::Router;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the router with all routes.
pub fn router() -> Router<AppState> {
    Router::new()
        // Health check
        .route("/health", get(health::health))
        // QR targets
        .route("/chk/:uuid", get(checklists::show))
        .route("/chk/:uuid/submit", post(checklists::submit))
        .route("/eq/:uuid", get(equipment::show))
        .route("/bot/op/:code", get(operators::deep_link))
        // Admin API
        .route("/api/equipment/:id/qr", post(qr::equipment))
        .route("/api/operators/:id/qr", post(qr::operator))
        .route("/api/checklists/:uuid/qr", post(qr::checklist))
        .route("/api/checklists/:uuid/alerts", post(alerts::emit))
        .route("/api/alerts", get(alerts::list))
        .route("/api/alerts/:id/notify", post(alerts::notify))
        .route("/api/alerts/:id/resolve", post(alerts::resolve))
}

/// The complete application: routes, static QR images and request tracing.
pub fn app(state: AppState) -> Router {
    let qr_images = ServeDir::new(state.config().qr_root.join(qr::QR_MOUNT.trim_start_matches('/')));
    router()
        .nest_service(qr::QR_MOUNT, qr_images)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use axum::response::Response;
    use checklist_engine::{EngineConfig, Scheduler};
    use chrono::Utc;
    use database::{
        catalog, checklist, checklist_item, equipment as eq_store, operator, Cadence, Checklist,
        Criticality, Database, Equipment, ItemStatus, NewEquipment, NewStandardItem, Permissions,
    };
    use serde_json::{json, Value};
    use tempfile::TempDir;
    use tower::ServiceExt;

    struct Fixture {
        app: Router,
        db: Database,
        eq: Equipment,
        chk: Checklist,
        _qr_root: TempDir,
    }

    async fn fixture() -> Fixture {
        let qr_root = TempDir::new().unwrap();
        let db = Database::connect_in_memory().await.unwrap();
        let pool = db.pool();
        let type_id = catalog::create_type(pool, "T1", "").await.unwrap();
        catalog::add_standard_item(pool, type_id, &NewStandardItem::new(1, "I1", Criticality::High).requires_observation(true))
            .await
            .unwrap();
        catalog::add_standard_item(pool, type_id, &NewStandardItem::new(2, "I2", Criticality::Low).requires_observation(false))
            .await
            .unwrap();
        let eq = eq_store::create_equipment(pool, &NewEquipment::new("E1").nr12(type_id, &[Cadence::Daily]))
            .await
            .unwrap();
        operator::create_operator(pool, "Ana", Some("OP0001"), Permissions::field_operator())
            .await
            .unwrap();

        let config = EngineConfig {
            qr_root: qr_root.path().to_path_buf(),
            ..EngineConfig::default()
        };
        let now = Utc::now();
        Scheduler::new(db.clone(), config.clone()).run_due(now).await.unwrap();
        let chk = checklist::list_for_equipment_on(pool, eq.id, config.today(now))
            .await
            .unwrap()
            .remove(0);

        Fixture {
            app: app(AppState::new(db.clone(), config)),
            db,
            eq,
            chk,
            _qr_root: qr_root,
        }
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> Response {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        app.clone().oneshot(request).await.unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let f = fixture().await;
        let response = send(&f.app, "GET", "/health", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["database"], "ok");

        f.db.close().await;
        let down = send(&f.app, "GET", "/health", None).await;
        assert_eq!(down.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_open_checklist_view() {
        let f = fixture().await;
        let response = send(&f.app, "GET", &format!("/chk/{}", f.chk.uuid), None).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["equipment"]["name"], "E1");
        assert_eq!(body["checklist"]["uuid"], f.chk.uuid.as_str());
        assert_eq!(body["checklist"]["items"][0]["description"], "I1");
        assert_eq!(body["checklist"]["items"][1]["status"], "PENDING");

        let missing = send(&f.app, "GET", "/chk/00000000-0000-0000-0000-000000000000", None).await;
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_submit_is_all_or_nothing_then_completes() {
        let f = fixture().await;
        let uri = format!("/chk/{}/submit", f.chk.uuid);

        let rejected = send(
            &f.app,
            "POST",
            &uri,
            Some(json!({"responses": [
                {"item_index": 0, "status": "NOK"},
                {"item_index": 1, "status": "OK"}
            ]})),
        )
        .await;
        assert_eq!(rejected.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(json_body(rejected).await["result"], "rejected");
        let items = checklist_item::list_items(f.db.pool(), f.chk.id).await.unwrap();
        assert!(items.iter().all(|i| i.status == ItemStatus::Pending));

        let applied = send(
            &f.app,
            "POST",
            &uri,
            Some(json!({
                "responses": [
                    {"item_index": 0, "status": "NOK", "observation": "vazamento"},
                    {"item_index": 1, "status": "OK"}
                ],
                "observations": "turno da manhã"
            })),
        )
        .await;
        assert_eq!(applied.status(), StatusCode::OK);
        let body = json_body(applied).await;
        assert_eq!(body["result"], "applied");
        assert_eq!(body["completed"], true);
        assert_eq!(body["alerts"], 1);

        let closed = send(&f.app, "GET", &format!("/chk/{}", f.chk.uuid), None).await;
        assert_eq!(closed.status(), StatusCode::CONFLICT);
        assert_eq!(json_body(closed).await["status"], "COMPLETED");

        let again = send(&f.app, "POST", &uri, Some(json!({"responses": []}))).await;
        assert_eq!(again.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_submit_respects_responsible_operator() {
        let f = fixture().await;
        let other = operator::create_operator(f.db.pool(), "Bia", Some("OP0002"), Permissions::field_operator())
            .await
            .unwrap();
        checklist::claim(f.db.pool(), f.chk.id, other.id, Utc::now()).await.unwrap();
        let uri = format!("/chk/{}/submit", f.chk.uuid);
        let answers = json!([{"item_index": 1, "status": "OK"}]);

        let anonymous = send(&f.app, "POST", &uri, Some(json!({"responses": answers}))).await;
        assert_eq!(anonymous.status(), StatusCode::FORBIDDEN);

        let wrong = send(
            &f.app,
            "POST",
            &uri,
            Some(json!({"responses": answers, "operator_code": "OP0001"})),
        )
        .await;
        assert_eq!(wrong.status(), StatusCode::FORBIDDEN);

        let holder = send(
            &f.app,
            "POST",
            &uri,
            Some(json!({"responses": answers, "operator_code": "OP0002"})),
        )
        .await;
        assert_eq!(holder.status(), StatusCode::OK);
        assert_eq!(json_body(holder).await["completed"], false);
    }

    #[tokio::test]
    async fn test_equipment_view_lists_todays_checklists() {
        let f = fixture().await;
        let response = send(&f.app, "GET", &format!("/eq/{}", f.eq.uuid), None).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["name"], "E1");
        assert_eq!(body["checklists"][0]["uuid"], f.chk.uuid.as_str());
        assert_eq!(body["checklists"][0]["total"], 2);
    }

    #[tokio::test]
    async fn test_operator_deep_link_redirect() {
        let f = fixture().await;
        let response = send(&f.app, "GET", "/bot/op/op0001", None).await;
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(
            response.headers()[header::LOCATION],
            "https://t.me/mandacaru_bot?start=opOP0001"
        );

        let bad = send(&f.app, "GET", "/bot/op/xyz", None).await;
        assert_eq!(bad.status(), StatusCode::BAD_REQUEST);
        let unknown = send(&f.app, "GET", "/bot/op/OP9999", None).await;
        assert_eq!(unknown.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_generated_qr_is_served() {
        let f = fixture().await;
        let response = send(&f.app, "POST", &format!("/api/equipment/{}/qr", f.eq.id), None).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        let files = body["files"].as_array().unwrap();
        assert_eq!(files.len(), 3);

        let url = files[0]["url"].as_str().unwrap();
        assert!(url.starts_with("/qr_codes/"));
        let image = send(&f.app, "GET", url, None).await;
        assert_eq!(image.status(), StatusCode::OK);
        assert_eq!(image.headers()[header::CONTENT_TYPE], "image/png");
    }

    #[tokio::test]
    async fn test_alert_actions() {
        let f = fixture().await;
        send(
            &f.app,
            "POST",
            &format!("/chk/{}/submit", f.chk.uuid),
            Some(json!({"responses": [
                {"item_index": 0, "status": "NOK", "observation": "vazamento"},
                {"item_index": 1, "status": "OK"}
            ]})),
        )
        .await;

        let active = json_body(send(&f.app, "GET", "/api/alerts?state=active", None).await).await;
        let active = active.as_array().unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0]["criticality"], "HIGH");
        assert_eq!(active[0]["days_remaining"], 0);
        assert_eq!(active[0]["urgent"], true);
        let id = active[0]["id"].as_i64().unwrap();

        let notified = send(&f.app, "POST", &format!("/api/alerts/{}/notify", id), None).await;
        assert_eq!(notified.status(), StatusCode::OK);
        assert_eq!(json_body(notified).await["state"], "NOTIFIED");

        let twice = send(&f.app, "POST", &format!("/api/alerts/{}/notify", id), None).await;
        assert_eq!(twice.status(), StatusCode::BAD_REQUEST);

        let resolved = send(&f.app, "POST", &format!("/api/alerts/{}/resolve", id), None).await;
        assert_eq!(json_body(resolved).await["state"], "RESOLVED");

        // The earlier alert is resolved, so re-emission creates a fresh one.
        let emitted = send(&f.app, "POST", &format!("/api/checklists/{}/alerts", f.chk.uuid), None).await;
        assert_eq!(emitted.status(), StatusCode::OK);
        assert_eq!(json_body(emitted).await.as_array().unwrap().len(), 1);

        let bogus = send(&f.app, "GET", "/api/alerts?state=bogus", None).await;
        assert_eq!(bogus.status(), StatusCode::BAD_REQUEST);
    }
}
