//! End-to-end tests for the session REST surface.
//!
//! Each test serves `session_routes` on a random port with a stub gateway
//! and drives a full conversation over HTTP.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use rust_decimal_macros::dec;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::time::timeout;

use intake_assist::error::SubmissionError;
use intake_assist::gateway::{
    AccountQuery, AccountRecord, CompareStats, Comparison, EmergencyAck, EmergencyReport,
    ImageAttachment, QuestionContext, SubmissionGateway,
};
use intake_assist::routes::{SessionRouteState, session_routes};
use intake_assist::session::SessionController;

/// Maximum time any test is allowed to run before we consider it hung.
const TEST_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Default)]
struct StubGateway {
    emergencies: AtomicUsize,
    images: AtomicUsize,
    compares: AtomicUsize,
}

#[async_trait]
impl SubmissionGateway for StubGateway {
    async fn create_emergency_report(
        &self,
        _report: &EmergencyReport,
        image: Option<&ImageAttachment>,
    ) -> Result<EmergencyAck, SubmissionError> {
        self.emergencies.fetch_add(1, Ordering::SeqCst);
        if image.is_some() {
            self.images.fetch_add(1, Ordering::SeqCst);
        }
        Ok(EmergencyAck {
            id: Some("55".into()),
            mensaje: None,
        })
    }

    async fn query_account_records(
        &self,
        _query: &AccountQuery,
    ) -> Result<Vec<AccountRecord>, SubmissionError> {
        Ok(["a", "b"]
            .iter()
            .map(|id| AccountRecord {
                id: id.to_string(),
                numero_cliente: None,
                periodo: Some(format!("2025-{id}")),
                consumo: Some(dec!(10)),
                monto: Some(dec!(9000)),
                vencimiento: None,
                estado: None,
            })
            .collect())
    }

    async fn compare_records(&self, ids: &[String]) -> Result<Comparison, SubmissionError> {
        self.compares.fetch_add(1, Ordering::SeqCst);
        Ok(Comparison {
            records: vec![],
            stats: CompareStats {
                count: ids.len() as u32,
                total_consumption: dec!(20),
                total_amount: dec!(18000),
            },
        })
    }

    async fn ask(
        &self,
        _question: &str,
        _context: &QuestionContext,
    ) -> Result<String, SubmissionError> {
        Ok("Atendemos de lunes a viernes.".into())
    }
}

struct TestServer {
    base: String,
    client: reqwest::Client,
}

impl TestServer {
    async fn get(&self) -> Value {
        self.client
            .get(format!("{}/api/session", self.base))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap()
    }

    async fn post(&self, path: &str, body: Value) -> reqwest::Response {
        self.client
            .post(format!("{}{}", self.base, path))
            .json(&body)
            .send()
            .await
            .unwrap()
    }

    async fn say(&self, text: &str) -> Value {
        self.post("/api/session/message", json!({ "text": text }))
            .await
            .json()
            .await
            .unwrap()
    }
}

/// Start the session server on a random port.
async fn start_server(gateway: Arc<StubGateway>) -> TestServer {
    let controller = Arc::new(SessionController::new(gateway));
    let app = session_routes(SessionRouteState { controller });

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    TestServer {
        base: format!("http://127.0.0.1:{port}"),
        client: reqwest::Client::new(),
    }
}

fn last_text(snapshot: &Value) -> String {
    snapshot["transcript"]
        .as_array()
        .and_then(|entries| entries.last())
        .and_then(|entry| entry["text"].as_str())
        .unwrap_or_default()
        .to_string()
}

#[tokio::test]
async fn emergency_with_photo_over_http() {
    timeout(TEST_TIMEOUT, async {
        let gateway = Arc::new(StubGateway::default());
        let server = start_server(Arc::clone(&gateway)).await;

        let home = server.get().await;
        assert_eq!(home["step"]["step"], "home");

        server.say("Reportar emergencia").await;
        for answer in [
            "Ana Pérez",
            "+56912345678",
            "3",
            "Calle Falsa 123",
            "2",
            "1",
            "Hay una fuga grande",
        ] {
            server.say(answer).await;
        }
        let snapshot = server.say("sí").await;
        assert_eq!(snapshot["awaiting_image"], true);
        assert_eq!(snapshot["record"]["sector"], "La Compañía");

        let response = server
            .post(
                "/api/session/image",
                json!({
                    "file_name": "fuga.jpg",
                    "data": STANDARD.encode([0xFFu8, 0xD8, 0xFF, 0xE0]),
                }),
            )
            .await;
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        let snapshot: Value = response.json().await.unwrap();
        assert_eq!(snapshot["step"]["step"], "complete");
        assert_eq!(snapshot["busy"], false);
        assert_eq!(gateway.emergencies.load(Ordering::SeqCst), 1);
        assert_eq!(gateway.images.load(Ordering::SeqCst), 1);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn compare_flow_over_http() {
    timeout(TEST_TIMEOUT, async {
        let gateway = Arc::new(StubGateway::default());
        let server = start_server(Arc::clone(&gateway)).await;

        server.say("2").await;
        server.say("3").await;
        server.say("2").await;
        let snapshot = server.say("12345678-9").await;
        assert_eq!(snapshot["step"]["step"], "awaiting_compare_selection");
        assert_eq!(snapshot["candidates"].as_array().unwrap().len(), 2);

        let snapshot = server.say("1,3").await;
        assert_eq!(snapshot["step"]["step"], "awaiting_compare_selection");
        assert_eq!(gateway.compares.load(Ordering::SeqCst), 0);

        let snapshot = server.say("1,2").await;
        assert_eq!(snapshot["step"]["step"], "complete");
        assert_eq!(gateway.compares.load(Ordering::SeqCst), 1);

        let snapshot = server.say("¿Horario de atención?").await;
        assert_eq!(last_text(&snapshot), "Atendemos de lunes a viernes.");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn restart_and_home() {
    timeout(TEST_TIMEOUT, async {
        let server = start_server(Arc::new(StubGateway::default())).await;

        let fresh = server.say("1").await;
        server.say("Ana Pérez").await;
        let snapshot = server.say("+56912345678").await;
        assert_eq!(snapshot["step"]["index"], 2);

        let restarted: Value = server
            .post("/api/session/restart", json!({}))
            .await
            .json()
            .await
            .unwrap();
        assert_eq!(restarted["step"], fresh["step"]);
        assert_eq!(restarted["record"], json!({}));
        assert_eq!(
            restarted["transcript"].as_array().unwrap().len(),
            fresh["transcript"].as_array().unwrap().len()
        );

        let home: Value = server
            .post("/api/session/home", json!({}))
            .await
            .json()
            .await
            .unwrap();
        assert_eq!(home["step"]["step"], "home");
        assert!(home["flow"].is_null());
        assert!(last_text(&home).contains("Consulta de boletas"));
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn bad_image_payload_is_rejected() {
    timeout(TEST_TIMEOUT, async {
        let server = start_server(Arc::new(StubGateway::default())).await;
        let response = server
            .post(
                "/api/session/image",
                json!({"file_name": "x.png", "data": "%%% not base64 %%%"}),
            )
            .await;
        assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
    })
    .await
    .expect("test timed out");
}
