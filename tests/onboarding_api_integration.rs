//! Integration tests for the onboarding REST API.
//!
//! Each test spins up an Axum server on a random port and exercises the
//! real HTTP contract with reqwest.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::time::timeout;
use uuid::Uuid;

use hr_onboarding::error::OnboardingError;
use hr_onboarding::onboarding::{
    AccessPolicy, OnboardingEngine, OnboardingRouteState, OnboardingStep, StepCatalog,
    onboarding_routes,
};
use hr_onboarding::store::{LibSqlBackend, MemoryStore, OnboardingStore};

/// Maximum time any test is allowed to run before we consider it hung.
const TEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Only the named actor may advance steps.
struct OnlyActor(&'static str);

impl AccessPolicy for OnlyActor {
    fn authorize_step_advance(
        &self,
        actor: Option<&str>,
        employee_id: Uuid,
    ) -> Result<(), OnboardingError> {
        match actor {
            Some(actor) if actor == self.0 => Ok(()),
            other => Err(OnboardingError::NotAuthorized {
                actor: other.unwrap_or("anonymous").to_string(),
                employee_id,
            }),
        }
    }
}

/// Start an Axum server on a random port, return its base URL.
async fn start_server(state: OnboardingRouteState) -> String {
    let app = onboarding_routes(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    // Give the server a moment to start accepting connections.
    tokio::time::sleep(Duration::from_millis(50)).await;

    format!("http://127.0.0.1:{port}")
}

fn engine_over(store: Arc<dyn OnboardingStore>, catalog: StepCatalog) -> Arc<OnboardingEngine> {
    Arc::new(OnboardingEngine::new(store, Arc::new(catalog)))
}

async fn start_default() -> String {
    let engine = engine_over(Arc::new(MemoryStore::new()), StepCatalog::default_catalog());
    start_server(OnboardingRouteState::new(engine)).await
}

fn three_step_catalog() -> StepCatalog {
    StepCatalog::new(vec![
        OnboardingStep::new("contract", "Sign contract", "", 1),
        OnboardingStep::new("documents", "Submit documents", "", 2),
        OnboardingStep::new("laptop", "Collect laptop", "", 3),
    ])
    .unwrap()
}

fn full_profile() -> Value {
    json!({
        "phoneNumber": "+91 98765 43210",
        "emergencyContactName": "Asha Rao",
        "emergencyContactPhone": "+91 91234 56789",
        "currentAddress": "12 MG Road, Bengaluru",
        "bankAccountNumber": "000123456789",
        "bankName": "State Bank",
        "bankRoutingCode": "SBIN0001234",
        "taxId": "ABCDE1234F",
        "nationalId": "1234 5678 9012"
    })
}

async fn post(client: &reqwest::Client, url: String) -> reqwest::Response {
    client.post(url).send().await.unwrap()
}

async fn advance(client: &reqwest::Client, base: &str, id: Uuid, step: &str) -> reqwest::Response {
    post(
        client,
        format!("{base}/api/employees/{id}/onboarding/steps/{step}/advance"),
    )
    .await
}

async fn status(client: &reqwest::Client, base: &str, id: Uuid) -> Value {
    client
        .get(format!("{base}/api/employees/{id}/onboarding-status"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap()
}

#[tokio::test]
async fn rest_health_endpoint() {
    timeout(TEST_TIMEOUT, async {
        let base = start_default().await;

        let resp = reqwest::get(format!("{base}/health")).await.unwrap();
        assert_eq!(resp.status(), 200);

        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["service"], "hr-onboarding");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn partial_progress_reports_percentage() {
    timeout(TEST_TIMEOUT, async {
        let engine = engine_over(Arc::new(MemoryStore::new()), three_step_catalog());
        let base = start_server(OnboardingRouteState::new(engine)).await;
        let client = reqwest::Client::new();
        let id = Uuid::new_v4();

        let resp = post(&client, format!("{base}/api/employees/{id}/onboarding")).await;
        assert_eq!(resp.status(), 201);

        for _ in 0..2 {
            assert_eq!(advance(&client, &base, id, "contract").await.status(), 200);
        }
        let body = status(&client, &base, id).await;
        assert_eq!(body["completedSteps"], 1);
        assert_eq!(body["totalSteps"], 3);
        assert_eq!(body["percentage"], 33.0);
        assert_eq!(body["isOnboarded"], false);
        assert_eq!(body["steps"][0]["status"], "completed");
        assert!(body["steps"][0]["completedAt"].is_string());
        assert_eq!(body["steps"][1]["status"], "not_started");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn profile_completion_flips_onboarded() {
    timeout(TEST_TIMEOUT, async {
        let engine = engine_over(Arc::new(MemoryStore::new()), three_step_catalog());
        let base = start_server(OnboardingRouteState::new(engine)).await;
        let client = reqwest::Client::new();
        let id = Uuid::new_v4();

        post(&client, format!("{base}/api/employees/{id}/onboarding")).await;

        let mut profile = full_profile();
        profile["phoneNumber"] = Value::Null;
        client
            .put(format!("{base}/api/employees/{id}/profile"))
            .json(&profile)
            .send()
            .await
            .unwrap();

        for step in ["contract", "documents", "laptop"] {
            advance(&client, &base, id, step).await;
            let resp = advance(&client, &base, id, step).await;
            assert_eq!(resp.status(), 200);
        }

        let body = status(&client, &base, id).await;
        assert_eq!(body["percentage"], 100.0);
        assert_eq!(body["isOnboarded"], false);
        assert_eq!(body["requiredFields"]["phone_number"], false);

        let resp = client
            .put(format!("{base}/api/employees/{id}/profile"))
            .json(&json!({"phoneNumber": "+91 98765 43210"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let outcome: Value = resp.json().await.unwrap();
        assert_eq!(outcome["recomputed"], true);
        assert_eq!(outcome["status"]["isOnboarded"], true);

        let body = status(&client, &base, id).await;
        assert_eq!(body["isOnboarded"], true);
        assert!(body["onboardingCompletedAt"].is_string());

        let listed: Vec<Value> = client
            .get(format!("{base}/api/onboarding/statuses"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0]["employeeId"], id.to_string());
        assert_eq!(listed[0]["isOnboarded"], true);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn unknown_step_leaves_status_untouched() {
    timeout(TEST_TIMEOUT, async {
        let base = start_default().await;
        let client = reqwest::Client::new();
        let id = Uuid::new_v4();
        post(&client, format!("{base}/api/employees/{id}/onboarding")).await;
        let before = status(&client, &base, id).await;

        let resp = advance(&client, &base, id, "space_training").await;
        assert_eq!(resp.status(), 404);
        let body: Value = resp.json().await.unwrap();
        assert!(body["error"].as_str().unwrap().contains("space_training"));

        assert_eq!(status(&client, &base, id).await, before);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn repeated_advance_on_completed_step_is_stable() {
    timeout(TEST_TIMEOUT, async {
        let base = start_default().await;
        let client = reqwest::Client::new();
        let id = Uuid::new_v4();
        post(&client, format!("{base}/api/employees/{id}/onboarding")).await;

        advance(&client, &base, id, "it_setup").await;
        advance(&client, &base, id, "it_setup").await;
        let first = status(&client, &base, id).await;

        let resp = advance(&client, &base, id, "it_setup").await;
        assert_eq!(resp.status(), 200);
        let again = status(&client, &base, id).await;
        assert_eq!(again["completedSteps"], 1);
        assert_eq!(again["steps"][4]["completedAt"], first["steps"][4]["completedAt"]);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn strict_initialize_conflicts() {
    timeout(TEST_TIMEOUT, async {
        let engine = Arc::new(
            OnboardingEngine::new(
                Arc::new(MemoryStore::new()),
                Arc::new(StepCatalog::default_catalog()),
            )
            .with_init_mode(hr_onboarding::onboarding::InitMode::Strict),
        );
        let base = start_server(OnboardingRouteState::new(engine)).await;
        let client = reqwest::Client::new();
        let id = Uuid::new_v4();

        let first = post(&client, format!("{base}/api/employees/{id}/onboarding")).await;
        assert_eq!(first.status(), 201);
        let second = post(&client, format!("{base}/api/employees/{id}/onboarding")).await;
        assert_eq!(second.status(), 409);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn access_policy_rejects_other_actors() {
    timeout(TEST_TIMEOUT, async {
        let engine = engine_over(Arc::new(MemoryStore::new()), StepCatalog::default_catalog());
        let state = OnboardingRouteState::new(engine).with_access(Arc::new(OnlyActor("hr-admin")));
        let base = start_server(state).await;
        let client = reqwest::Client::new();
        let id = Uuid::new_v4();
        post(&client, format!("{base}/api/employees/{id}/onboarding")).await;
        let url = format!("{base}/api/employees/{id}/onboarding/steps/it_setup/advance");

        let anonymous = client.post(&url).send().await.unwrap();
        assert_eq!(anonymous.status(), 403);

        let stranger = client
            .post(&url)
            .header("x-actor-id", "intern")
            .send()
            .await
            .unwrap();
        assert_eq!(stranger.status(), 403);
        assert_eq!(status(&client, &base, id).await["steps"][4]["status"], "not_started");

        let admin = client
            .post(&url)
            .header("x-actor-id", "hr-admin")
            .send()
            .await
            .unwrap();
        assert_eq!(admin.status(), 200);
        assert_eq!(status(&client, &base, id).await["steps"][4]["status"], "in_progress");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn concurrent_requests_on_libsql_backend() {
    timeout(TEST_TIMEOUT, async {
        let dir = tempfile::tempdir().unwrap();
        let store = LibSqlBackend::new_local(&dir.path().join("hr.db"))
            .await
            .unwrap();
        let engine = engine_over(Arc::new(store), three_step_catalog());
        let base = start_server(OnboardingRouteState::new(engine)).await;
        let client = reqwest::Client::new();
        let id = Uuid::new_v4();
        post(&client, format!("{base}/api/employees/{id}/onboarding")).await;

        let mut requests = Vec::new();
        for step in ["contract", "documents", "laptop"] {
            for _ in 0..2 {
                requests.push(advance(&client, &base, id, step));
            }
        }
        let responses = join_all(requests).await;
        assert!(responses.iter().all(|r| r.status() == 200));

        client
            .put(format!("{base}/api/employees/{id}/profile"))
            .json(&full_profile())
            .send()
            .await
            .unwrap();

        let body = status(&client, &base, id).await;
        assert_eq!(body["completedSteps"], 3);
        assert_eq!(body["isOnboarded"], true);
    })
    .await
    .expect("test timed out");
}
