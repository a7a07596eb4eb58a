// tests/api_tests.rs

use std::sync::Arc;
use std::time::Duration;

use lms_backend::{
    config::Config,
    routes,
    session::Role,
    state::AppState,
    store::{Fault, MemoryStore},
    utils::jwt::sign_jwt,
};
use reqwest::StatusCode;
use serde_json::{Value, json};
use sqlx::postgres::PgPoolOptions;

const SECRET: &str = "test_secret_for_integration_tests";

struct TestApp {
    address: String,
    store: Arc<MemoryStore>,
    client: reqwest::Client,
}

impl TestApp {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    fn token(&self, user_id: i64, role: Role) -> String {
        sign_jwt(user_id, role, SECRET, 600).expect("Failed to sign token")
    }
}

fn test_config(database_url: &str) -> Config {
    Config {
        database_url: database_url.to_string(),
        jwt_secret: SECRET.to_string(),
        jwt_expiration: 600,
        rust_log: "error".to_string(),
        bind_addr: "127.0.0.1:0".to_string(),
        admin_email: None,
        admin_password: None,
        receipt_dir: std::env::temp_dir()
            .join("lms-receipts")
            .to_string_lossy()
            .into_owned(),
        max_receipt_bytes: 1024 * 1024,
        quiz_tick: Duration::from_secs(1),
    }
}

/// Serves the router on a random port, backed by an in-memory store.
///
/// The pool is lazy and never connected, so only routes that go through the
/// store work here. Routes that query Postgres directly are covered by the
/// ignored tests at the bottom.
async fn spawn_app() -> TestApp {
    let pool = PgPoolOptions::new()
        .acquire_timeout(Duration::from_millis(200))
        .connect_lazy("postgres://localhost/unused")
        .expect("Failed to build lazy pool");

    let store = Arc::new(MemoryStore::new());
    let state = AppState::new(pool, test_config("postgres://localhost/unused"), store.clone());
    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestApp {
        address: format!("http://127.0.0.1:{}", port),
        store,
        client: reqwest::Client::new(),
    }
}

#[tokio::test]
async fn health_check_404() {
    let app = spawn_app().await;

    let response = app
        .client
        .get(app.url("/random_path_that_does_not_exist"))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn protected_routes_require_token() {
    let app = spawn_app().await;

    let response = app.client.get(app.url("/api/me")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .client
        .get(app.url("/api/me"))
        .bearer_auth("not-a-token")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn students_cannot_reach_admin_routes() {
    let app = spawn_app().await;
    let student = app.store.add_profile("s@example.com", "student");

    let response = app
        .client
        .get(app.url("/api/admin/payments"))
        .bearer_auth(app.token(student.id, Role::Student))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn content_is_gated_by_grant() {
    let app = spawn_app().await;
    let student = app.store.add_profile("s@example.com", "student");
    let subject = app.store.add_subject("Algebra", 1000);
    let quiz = app.store.add_quiz(subject.id, 10, 50);
    app.store.add_question(quiz.id, 4, 0);
    let token = app.token(student.id, Role::Student);

    let response = app
        .client
        .get(app.url(&format!("/api/subjects/{}", subject.id)))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .client
        .post(app.url(&format!("/api/quizzes/{}/attempt", quiz.id)))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body: Value = response.json().await.unwrap();
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn quiz_attempt_flow() {
    let app = spawn_app().await;
    let student = app.store.add_profile("s@example.com", "student");
    let subject = app.store.add_subject("Algebra", 1000);
    let quiz = app.store.add_quiz(subject.id, 10, 70);
    let questions: Vec<_> = [0, 1, 2, 3]
        .into_iter()
        .map(|correct| app.store.add_question(quiz.id, 4, correct))
        .collect();

    // No grants yet.
    let admin = app.store.add_profile("a@example.com", "admin");
    let response = app
        .client
        .get(app.url(&format!("/api/admin/access?student_id={}", student.id)))
        .bearer_auth(app.token(admin.id, Role::Admin))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let grants: Vec<Value> = response.json().await.unwrap();
    assert!(grants.is_empty());

    let token = app.token(student.id, Role::Student);
    grant(&app, student.id, subject.id).await;

    // Start
    let view: Value = app
        .client
        .post(app.url(&format!("/api/quizzes/{}/attempt", quiz.id)))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(view["phase"], "in_progress");
    assert_eq!(view["attempt_number"], 1);
    assert_eq!(view["remaining_seconds"], 600);
    assert_eq!(view["questions"].as_array().unwrap().len(), 4);
    assert!(view["questions"][0].get("correct_answer").is_none());

    // Answer: three right, one wrong.
    for (question, pick) in questions.iter().zip([0, 1, 2, 1]) {
        let response = app
            .client
            .put(app.url(&format!("/api/quizzes/{}/attempt/answers", quiz.id)))
            .bearer_auth(&token)
            .json(&json!({ "question_id": question.id, "option_index": pick }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app
        .client
        .put(app.url(&format!("/api/quizzes/{}/attempt/answers", quiz.id)))
        .bearer_auth(&token)
        .json(&json!({ "question_id": 999_999, "option_index": 0 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // Submit twice: same record.
    let submit_url = app.url(&format!("/api/quizzes/{}/attempt/submit", quiz.id));
    let first: Value = app
        .client
        .post(&submit_url)
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let second: Value = app
        .client
        .post(&submit_url)
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(first["score"], 75);
    assert_eq!(first["correct_count"], 3);
    assert_eq!(first["total_questions"], 4);
    assert_eq!(first["passed"], true);
    assert_eq!(first["id"], second["id"]);
    assert_eq!(app.store.attempt_rows(), 1);

    let history: Value = app
        .client
        .get(app.url(&format!("/api/quizzes/{}/attempts", quiz.id)))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(history["attempt_count"], 1);
    assert_eq!(history["best_score"], 75);
    assert_eq!(history["passed_ever"], true);
}

#[tokio::test]
async fn abandoned_attempt_is_not_recorded() {
    let app = spawn_app().await;
    let student = app.store.add_profile("s@example.com", "student");
    let subject = app.store.add_subject("Algebra", 1000);
    let quiz = app.store.add_quiz(subject.id, 10, 50);
    app.store.add_question(quiz.id, 4, 0);
    grant(&app, student.id, subject.id).await;
    let token = app.token(student.id, Role::Student);
    let attempt_url = app.url(&format!("/api/quizzes/{}/attempt", quiz.id));

    let response = app
        .client
        .post(&attempt_url)
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .client
        .delete(&attempt_url)
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(app.store.attempt_rows(), 0);

    let response = app
        .client
        .post(app.url(&format!("/api/quizzes/{}/attempt/submit", quiz.id)))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn payment_approval_flow() {
    let app = spawn_app().await;
    let student = app.store.add_profile("s@example.com", "student");
    let admin = app.store.add_profile("a@example.com", "admin");
    let subject = app.store.add_subject("Algebra", 1000);
    let student_token = app.token(student.id, Role::Student);
    let admin_token = app.token(admin.id, Role::Admin);

    let payment: Value = app
        .client
        .post(app.url("/api/payments"))
        .bearer_auth(&student_token)
        .json(&json!({
            "subject_id": subject.id,
            "amount": 1000,
            "receipt_ref": "1/receipt.png"
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(payment["status"], "pending");
    let payment_id = payment["id"].as_i64().unwrap();

    let decision_url = app.url(&format!("/api/admin/payments/{}/decision", payment_id));
    let response = app
        .client
        .post(&decision_url)
        .bearer_auth(&admin_token)
        .json(&json!({ "decision": "approve", "admin_notes": "Thanks" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let decided: Value = response.json().await.unwrap();
    assert_eq!(decided["status"], "approved");
    assert_eq!(decided["reviewed_by"], admin.id);

    // A second decision loses.
    let response = app
        .client
        .post(&decision_url)
        .bearer_auth(&admin_token)
        .json(&json!({ "decision": "reject" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let me: Value = app
        .client
        .get(app.url("/api/me"))
        .bearer_auth(&student_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(me["is_approved"], true);
    assert_eq!(me["subject_ids"], json!([subject.id]));

    let mine: Vec<Value> = app
        .client
        .get(app.url("/api/payments"))
        .bearer_auth(&student_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0]["status"], "approved");
}

#[tokio::test]
async fn invalid_payment_is_rejected() {
    let app = spawn_app().await;
    let student = app.store.add_profile("s@example.com", "student");
    let subject = app.store.add_subject("Algebra", 1000);

    let response = app
        .client
        .post(app.url("/api/payments"))
        .bearer_auth(app.token(student.id, Role::Student))
        .json(&json!({ "subject_id": subject.id, "amount": -5, "receipt_ref": "x" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn partial_approval_reports_step_and_is_repairable() {
    let app = spawn_app().await;
    let student = app.store.add_profile("s@example.com", "student");
    let admin = app.store.add_profile("a@example.com", "admin");
    let subject = app.store.add_subject("Algebra", 1000);
    let admin_token = app.token(admin.id, Role::Admin);

    let payment: Value = app
        .client
        .post(app.url("/api/payments"))
        .bearer_auth(app.token(student.id, Role::Student))
        .json(&json!({ "subject_id": subject.id, "amount": 1000, "receipt_ref": "r.pdf" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let payment_id = payment["id"].as_i64().unwrap();

    app.store.fail(Fault::UpsertGrant);
    let response = app
        .client
        .post(app.url(&format!("/api/admin/payments/{}/decision", payment_id)))
        .bearer_auth(&admin_token)
        .json(&json!({ "decision": "approve" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["step"], "grant_access");
    assert_eq!(body["retryable"], true);
    assert_eq!(app.store.grant_rows(student.id, subject.id), 0);

    app.store.heal(Fault::UpsertGrant);
    let repair: Value = app
        .client
        .post(app.url(&format!("/api/admin/payments/{}/ensure-access", payment_id)))
        .bearer_auth(&admin_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(repair["grant_created"], true);
    assert_eq!(repair["profile_approved"], true);

    let report: Value = app
        .client
        .post(app.url("/api/admin/payments/reconcile"))
        .bearer_auth(&admin_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(report["checked"], 1);
    assert_eq!(report["grants_created"], 0);
    assert_eq!(app.store.grant_rows(student.id, subject.id), 1);
}

#[tokio::test]
async fn revoking_access_closes_the_gate() {
    let app = spawn_app().await;
    let student = app.store.add_profile("s@example.com", "student");
    let admin = app.store.add_profile("a@example.com", "admin");
    let subject = app.store.add_subject("Algebra", 1000);
    let quiz = app.store.add_quiz(subject.id, 10, 50);
    app.store.add_question(quiz.id, 2, 1);
    grant(&app, student.id, subject.id).await;

    let response = app
        .client
        .delete(app.url(&format!(
            "/api/admin/access/{}/{}",
            student.id, subject.id
        )))
        .bearer_auth(app.token(admin.id, Role::Admin))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .client
        .post(app.url(&format!("/api/quizzes/{}/attempt", quiz.id)))
        .bearer_auth(app.token(student.id, Role::Student))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

const PNG_HEADER: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

fn receipt_form(file_name: &str, data: Vec<u8>) -> reqwest::multipart::Form {
    let part = reqwest::multipart::Part::bytes(data).file_name(file_name.to_string());
    reqwest::multipart::Form::new().part("file", part)
}

fn png_bytes(len: usize) -> Vec<u8> {
    let mut data = PNG_HEADER.to_vec();
    data.resize(len.max(PNG_HEADER.len()), 0);
    data
}

#[tokio::test]
async fn receipt_upload_checks_the_file() {
    let app = spawn_app().await;
    let student = app.store.add_profile("s@example.com", "student");
    let token = app.token(student.id, Role::Student);
    let upload_url = app.url("/api/payments/receipts");

    let rejected = [
        receipt_form("receipt.exe", png_bytes(64)),
        receipt_form("receipt.png", b"%PDF-1.7 not a png".to_vec()),
        receipt_form("receipt.png", png_bytes(1024 * 1024 + 1)),
        reqwest::multipart::Form::new().text("note", "no file here"),
    ];
    for form in rejected {
        let response = app
            .client
            .post(&upload_url)
            .bearer_auth(&token)
            .multipart(form)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    let response = app
        .client
        .post(&upload_url)
        .bearer_auth(&token)
        .multipart(receipt_form("Bank Slip.PNG", png_bytes(256)))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body: Value = response.json().await.unwrap();
    let receipt_ref = body["receipt_ref"].as_str().unwrap();

    let (owner, file) = receipt_ref.split_once('/').expect("Missing student directory");
    assert_eq!(owner, student.id.to_string());
    let stem = file.strip_suffix(".png").expect("Missing extension");
    assert!(uuid::Uuid::parse_str(stem).is_ok());
}

#[tokio::test]
async fn receipts_are_served_to_owner_and_admins() {
    let app = spawn_app().await;
    let student = app.store.add_profile("s@example.com", "student");
    let other = app.store.add_profile("o@example.com", "student");
    let admin = app.store.add_profile("a@example.com", "admin");
    let subject = app.store.add_subject("Algebra", 1000);
    let token = app.token(student.id, Role::Student);
    let data = png_bytes(300);

    let uploaded: Value = app
        .client
        .post(app.url("/api/payments/receipts"))
        .bearer_auth(&token)
        .multipart(receipt_form("slip.png", data.clone()))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let payment: Value = app
        .client
        .post(app.url("/api/payments"))
        .bearer_auth(&token)
        .json(&json!({
            "subject_id": subject.id,
            "amount": 1000,
            "receipt_ref": uploaded["receipt_ref"]
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let payment_id = payment["id"].as_i64().unwrap();

    let response = app
        .client
        .get(app.url(&format!("/api/admin/payments/{}/receipt", payment_id)))
        .bearer_auth(app.token(admin.id, Role::Admin))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "image/png");
    assert_eq!(response.bytes().await.unwrap().to_vec(), data);

    let own_url = app.url(&format!("/api/payments/{}/receipt", payment_id));
    let response = app.client.get(&own_url).bearer_auth(&token).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .client
        .get(&own_url)
        .bearer_auth(app.token(other.id, Role::Student))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // References that leave the receipt directory are never read.
    let escaping: Value = app
        .client
        .post(app.url("/api/payments"))
        .bearer_auth(&token)
        .json(&json!({
            "subject_id": subject.id,
            "amount": 1000,
            "receipt_ref": "../../etc/passwd.png"
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let response = app
        .client
        .get(app.url(&format!(
            "/api/admin/payments/{}/receipt",
            escaping["id"].as_i64().unwrap()
        )))
        .bearer_auth(app.token(admin.id, Role::Admin))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn concurrent_approvals_grant_access_once() {
    let app = spawn_app().await;
    let student = app.store.add_profile("s@example.com", "student");
    let admin = app.store.add_profile("a@example.com", "admin");
    let subject = app.store.add_subject("Algebra", 1000);
    let student_token = app.token(student.id, Role::Student);
    let admin_token = app.token(admin.id, Role::Admin);

    let mut ids = Vec::new();
    for receipt in ["1/first.png", "1/second.png"] {
        let payment: Value = app
            .client
            .post(app.url("/api/payments"))
            .bearer_auth(&student_token)
            .json(&json!({ "subject_id": subject.id, "amount": 1000, "receipt_ref": receipt }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        ids.push(payment["id"].as_i64().unwrap());
    }

    let approve = |id: i64| {
        app.client
            .post(app.url(&format!("/api/admin/payments/{}/decision", id)))
            .bearer_auth(&admin_token)
            .json(&json!({ "decision": "approve" }))
            .send()
    };
    let (first, second) = tokio::join!(approve(ids[0]), approve(ids[1]));

    for response in [first.unwrap(), second.unwrap()] {
        assert_eq!(response.status(), StatusCode::OK);
        let payment: Value = response.json().await.unwrap();
        assert_eq!(payment["status"], "approved");
    }
    assert_eq!(app.store.grant_rows(student.id, subject.id), 1);

    let me: Value = app
        .client
        .get(app.url("/api/me"))
        .bearer_auth(&student_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(me["is_approved"], true);
    assert_eq!(me["subject_ids"], json!([subject.id]));
}

#[tokio::test]
async fn profile_can_be_updated() {
    let app = spawn_app().await;
    let student = app.store.add_profile("s@example.com", "student");
    let token = app.token(student.id, Role::Student);

    let response = app
        .client
        .put(app.url("/api/me"))
        .bearer_auth(&token)
        .json(&json!({ "full_name": "Ada<script>alert(1)</script>", "phone": " +234 801 234 5678 " }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let me: Value = response.json().await.unwrap();
    assert_eq!(me["full_name"], "Ada");
    assert_eq!(me["phone"], "+234 801 234 5678");

    // Absent fields stay, blank ones are cleared.
    let me: Value = app
        .client
        .put(app.url("/api/me"))
        .bearer_auth(&token)
        .json(&json!({ "phone": "" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(me["full_name"], "Ada");
    assert_eq!(me["phone"], Value::Null);

    let response = app
        .client
        .put(app.url("/api/me"))
        .bearer_auth(&token)
        .json(&json!({ "phone": "call me" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn blocked_student_is_refused_with_a_live_token() {
    let app = spawn_app().await;
    let student = app.store.add_profile("s@example.com", "student");
    let subject = app.store.add_subject("Algebra", 1000);
    let quiz = app.store.add_quiz(subject.id, 10, 50);
    app.store.add_question(quiz.id, 4, 0);
    grant(&app, student.id, subject.id).await;
    let token = app.token(student.id, Role::Student);
    let attempt_url = app.url(&format!("/api/quizzes/{}/attempt", quiz.id));

    let response = app.client.post(&attempt_url).bearer_auth(&token).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    app.store.set_active(student.id, false);

    let response = app.client.post(&attempt_url).bearer_auth(&token).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .client
        .post(app.url("/api/payments"))
        .bearer_auth(&token)
        .json(&json!({ "subject_id": subject.id, "amount": 1000, "receipt_ref": "1/r.png" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    app.store.set_active(student.id, true);
    let response = app.client.get(app.url("/api/me")).bearer_auth(&token).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

async fn grant(app: &TestApp, student_id: i64, subject_id: i64) {
    use lms_backend::store::Store;
    app.store
        .upsert_grant(student_id, subject_id)
        .await
        .expect("Failed to grant access");
}

// ---- Postgres-backed tests: need DATABASE_URL and a migrated database ----

async fn spawn_pg_app() -> String {
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&database_url)
        .await
        .expect("Failed to connect to Postgres for testing. Make sure DATABASE_URL is set.");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to migrate database");

    let store = Arc::new(lms_backend::store::PgStore::new(pool.clone()));
    let state = AppState::new(pool, test_config(&database_url), store);
    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://127.0.0.1:{}", port)
}

#[tokio::test]
#[ignore = "requires Postgres (DATABASE_URL)"]
async fn register_and_login() {
    let address = spawn_pg_app().await;
    let client = reqwest::Client::new();
    let email = format!("u_{}@example.com", &uuid::Uuid::new_v4().to_string()[..8]);

    let response = client
        .post(format!("{}/api/auth/register", address))
        .json(&json!({ "email": email, "password": "password123", "full_name": "Ada" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let profile: Value = response.json().await.unwrap();
    assert_eq!(profile["is_approved"], false);
    assert!(profile.get("password").is_none());

    let response = client
        .post(format!("{}/api/auth/register", address))
        .json(&json!({ "email": email, "password": "password123" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let login: Value = client
        .post(format!("{}/api/auth/login", address))
        .json(&json!({ "email": email.to_uppercase(), "password": "password123" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(login["role"], "student");
    let token = login["token"].as_str().expect("Token not found");

    let me: Value = client
        .get(format!("{}/api/me", address))
        .bearer_auth(token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(me["email"], email);

    let response = client
        .post(format!("{}/api/auth/login", address))
        .json(&json!({ "email": email, "password": "wrong-password" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore = "requires Postgres (DATABASE_URL)"]
async fn register_fails_validation() {
    let address = spawn_pg_app().await;

    let response = reqwest::Client::new()
        .post(format!("{}/api/auth/register", address))
        .json(&json!({ "email": "not-an-email", "password": "password123" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[ignore = "requires Postgres (DATABASE_URL)"]
async fn fee_settings_are_readable_after_update() {
    let address = spawn_pg_app().await;
    let client = reqwest::Client::new();
    let token = sign_jwt(1, Role::Admin, SECRET, 600).unwrap();

    let response = client
        .put(format!("{}/api/admin/fee-settings", address))
        .bearer_auth(&token)
        .json(&json!({ "bank_name": "First Bank", "account_number": "0123456789" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let settings: Value = client
        .get(format!("{}/api/fee-settings", address))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(settings["bank_name"], "First Bank");
    assert_eq!(settings["account_holder"], Value::Null);
}

#[tokio::test]
#[ignore = "requires Postgres (DATABASE_URL)"]
async fn quiz_with_attempts_cannot_be_deleted() {
    let address = spawn_pg_app().await;
    let client = reqwest::Client::new();
    let admin_token = sign_jwt(1, Role::Admin, SECRET, 600).unwrap();
    let email = format!("q_{}@example.com", &uuid::Uuid::new_v4().to_string()[..8]);

    let student: Value = client
        .post(format!("{}/api/auth/register", address))
        .json(&json!({ "email": email, "password": "password123" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let student_id = student["id"].as_i64().unwrap();
    let student_token = sign_jwt(student_id, Role::Student, SECRET, 600).unwrap();

    let subject: Value = client
        .post(format!("{}/api/admin/subjects", address))
        .bearer_auth(&admin_token)
        .json(&json!({ "title": "Chemistry", "fee": 500 }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let subject_id = subject["id"].as_i64().unwrap();

    let quiz: Value = client
        .post(format!("{}/api/admin/quizzes", address))
        .bearer_auth(&admin_token)
        .json(&json!({
            "subject_id": subject_id,
            "title": "Bonds",
            "time_limit_minutes": 5,
            "passing_score": 50
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let quiz_id = quiz["id"].as_i64().unwrap();

    let response = client
        .post(format!("{}/api/admin/quizzes/{}/questions", address, quiz_id))
        .bearer_auth(&admin_token)
        .json(&json!({ "question_text": "H2O is?", "options": ["Water", "Salt"], "correct_answer": 0 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = client
        .post(format!("{}/api/admin/access", address))
        .bearer_auth(&admin_token)
        .json(&json!({ "student_id": student_id, "subject_id": subject_id }))
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());

    let response = client
        .post(format!("{}/api/quizzes/{}/attempt", address, quiz_id))
        .bearer_auth(&student_token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let response = client
        .post(format!("{}/api/quizzes/{}/attempt/submit", address, quiz_id))
        .bearer_auth(&student_token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = client
        .delete(format!("{}/api/admin/quizzes/{}", address, quiz_id))
        .bearer_auth(&admin_token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = client
        .put(format!("{}/api/admin/quizzes/{}", address, quiz_id))
        .bearer_auth(&admin_token)
        .json(&json!({ "is_active": false }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let history: Value = client
        .get(format!("{}/api/quizzes/{}/attempts", address, quiz_id))
        .bearer_auth(&student_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(history["attempt_count"], 1);
}
