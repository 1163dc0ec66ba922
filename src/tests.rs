//! Integration tests for the enrollment store API and the portal client over HTTP.

use std::sync::Arc;

use chrono::{Duration, Utc};
use reqwest::Client;
use serde_json::{json, Value};
use tempfile::TempDir;

use crate::client::{
    ClaimState, Identity, LocalEnrollmentCache, MemberForm, Portal, Route, Session,
};
use crate::config::Config;
use crate::db::{init_database, Repository};
use crate::models::{AbortReason, ClaimOutcome, CreateTopicRequest};
use crate::search::TopicIndex;
use crate::store::{EnrollmentStore, RemoteStore, SharedStore};
use crate::window::EnrollmentWindow;
use crate::{create_router, AppState};

const TEST_KEY: &str = "test-api-key";

const TOPICS: &[(&str, &str, &str)] = &[
    ("t1", "Machine Learning for Crop Yield", "A"),
    ("t2", "Blockchain Voting System", "A"),
    ("t3", "Compiler for a Toy Language", "B"),
];

fn open_window() -> EnrollmentWindow {
    let now = Utc::now();
    EnrollmentWindow::new(now - Duration::hours(1), now + Duration::hours(1)).unwrap()
}

fn upcoming_window() -> EnrollmentWindow {
    let now = Utc::now();
    EnrollmentWindow::new(now + Duration::hours(1), now + Duration::hours(2)).unwrap()
}

/// Test fixture for integration tests.
struct TestFixture {
    client: Client,
    base_url: String,
    _temp_dir: TempDir,
}

impl TestFixture {
    async fn new() -> Self {
        Self::with_options(Some(TEST_KEY.to_string()), open_window()).await
    }

    async fn with_options(psk: Option<String>, window: EnrollmentWindow) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.sqlite");
        let index_path = temp_dir.path().join("index");

        let pool = init_database(&db_path).await.expect("Failed to init DB");
        let repo = Arc::new(Repository::new(pool));
        let search = Arc::new(TopicIndex::open(&index_path).expect("Failed to init search"));
        let store = SharedStore::new(repo, search, window);

        let seed: Vec<CreateTopicRequest> = TOPICS
            .iter()
            .map(|(id, title, section)| CreateTopicRequest {
                id: Some(id.to_string()),
                title: title.to_string(),
                section: Some(section.to_string()),
            })
            .collect();
        store.seed_and_index(&seed).await.expect("Failed to seed");

        let config = Config {
            api_psk: psk.clone(),
            db_path,
            index_path,
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            log_level: "warn".to_string(),
            log_json: false,
            window,
            seed_path: None,
        };

        let state = AppState {
            store: Arc::new(store),
            config: Arc::new(config),
        };

        let app = create_router(state);

        // Bind to random port
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind");
        let addr = listener.local_addr().expect("Failed to get addr");
        let base_url = format!("http://{}", addr);

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Wait for server to start
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

        let mut client_builder = Client::builder();
        if let Some(key) = psk {
            let mut headers = reqwest::header::HeaderMap::new();
            headers.insert("x-api-key", key.parse().unwrap());
            client_builder = client_builder.default_headers(headers);
        }

        TestFixture {
            client: client_builder.build().unwrap(),
            base_url,
            _temp_dir: temp_dir,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn remote(&self) -> RemoteStore {
        RemoteStore::new(&self.base_url, Some(TEST_KEY.to_string())).unwrap()
    }

    async fn claim(&self, body: &Value) -> (u16, Value) {
        let resp = self
            .client
            .post(self.url("/api/claims"))
            .json(body)
            .send()
            .await
            .unwrap();
        let status = resp.status().as_u16();
        (status, resp.json().await.unwrap())
    }
}

fn claim_body(topic_id: &str, usn1: &str, usn2: &str) -> Value {
    json!({
        "topicId": topic_id,
        "student1Name": "Asha",
        "student1USN": usn1,
        "student2Name": "Ravi",
        "student2USN": usn2
    })
}

#[tokio::test]
async fn test_health_check() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .get(fixture.url("/health"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "OK");
}

#[tokio::test]
async fn test_auth_missing_and_invalid_key() {
    let fixture = TestFixture::new().await;
    let anonymous = Client::new();

    let resp = anonymous
        .get(fixture.url("/api/topics"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");

    let resp = anonymous
        .get(fixture.url("/api/topics"))
        .header("x-api-key", "wrong-key")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    // Health stays public
    let resp = anonymous.get(fixture.url("/health")).send().await.unwrap();
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn test_auth_bearer_token() {
    let fixture = TestFixture::new().await;

    let resp = Client::new()
        .get(fixture.url("/api/stats"))
        .header("Authorization", format!("Bearer {}", TEST_KEY))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn test_no_key_configured_allows_all() {
    let fixture = TestFixture::with_options(None, open_window()).await;

    let resp = fixture
        .client
        .get(fixture.url("/api/topics"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn test_list_topics_with_filters() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .get(fixture.url("/api/topics"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert!(body["revisionId"].is_number());
    assert_eq!(body["data"].as_array().unwrap().len(), 3);
    assert_eq!(body["data"][0]["taken"], false);

    let body: Value = fixture
        .client
        .get(fixture.url("/api/topics?section=A&q=vot"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let topics = body["data"].as_array().unwrap();
    assert_eq!(topics.len(), 1);
    assert_eq!(topics[0]["id"], "t2");

    let (status, _) = fixture
        .claim(&claim_body("t1", "1RV23IS001", "1RV23IS002"))
        .await;
    assert_eq!(status, 200);

    let body: Value = fixture
        .client
        .get(fixture.url("/api/topics?section=A&availableOnly=true"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let ids: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["t2"]);
}

#[tokio::test]
async fn test_get_topic_and_not_found() {
    let fixture = TestFixture::new().await;

    let body: Value = fixture
        .client
        .get(fixture.url("/api/topics/t3"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["data"]["title"], "Compiler for a Toy Language");
    assert_eq!(body["data"]["section"], "B");

    let resp = fixture
        .client
        .get(fixture.url("/api/topics/missing"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_claim_commit_and_aborts() {
    let fixture = TestFixture::new().await;

    let (status, body) = fixture
        .claim(&claim_body("t1", "1RV23IS001", "1RV23IS002"))
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["topicId"], "t1");
    assert_eq!(body["data"]["topicTitle"], "Machine Learning for Crop Yield");
    assert_eq!(body["data"]["student1USN"], "1RV23IS001");
    assert!(body["data"]["timestamp"].as_str().unwrap().ends_with('Z'));

    // Same topic again
    let (status, body) = fixture
        .claim(&claim_body("t1", "1RV23IS003", "1RV23IS004"))
        .await;
    assert_eq!(status, 409);
    assert_eq!(body["error"]["code"], "ALREADY_CLAIMED");
    assert_eq!(body["error"]["message"], "This topic has already been taken!");

    // Unknown topic
    let (status, body) = fixture
        .claim(&claim_body("nope", "1RV23IS003", "1RV23IS004"))
        .await;
    assert_eq!(status, 404);
    assert_eq!(body["error"]["code"], "TOPIC_NOT_FOUND");

    // Member already on a committed team
    let (status, body) = fixture
        .claim(&claim_body("t2", "1RV23IS005", "1RV23IS001"))
        .await;
    assert_eq!(status, 409);
    assert_eq!(body["error"]["code"], "DUPLICATE_IDENTIFIER");
    assert_eq!(body["error"]["details"]["usns"], json!(["1RV23IS001"]));

    let topic: Value = fixture
        .client
        .get(fixture.url("/api/topics/t2"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(topic["data"]["taken"], false);
}

#[tokio::test]
async fn test_claim_validation_errors() {
    let fixture = TestFixture::new().await;

    let (status, body) = fixture
        .claim(&json!({
            "topicId": "t1",
            "student1Name": "",
            "student1USN": "1RV22IS001",
            "student2Name": "Ravi",
            "student2USN": "1RV23IS002"
        }))
        .await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    let fields: Vec<&str> = body["error"]["details"]["fields"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["field"].as_str().unwrap())
        .collect();
    assert_eq!(fields, vec!["student1Name", "student1USN"]);

    let stats: Value = fixture
        .client
        .get(fixture.url("/api/stats"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stats["data"]["totalResponses"], 0);
}

#[tokio::test]
async fn test_claim_outside_window() {
    let fixture = TestFixture::with_options(Some(TEST_KEY.to_string()), upcoming_window()).await;

    let (status, body) = fixture
        .claim(&claim_body("t1", "1RV23IS001", "1RV23IS002"))
        .await;
    assert_eq!(status, 403);
    assert_eq!(body["error"]["code"], "WINDOW_CLOSED");

    let window: Value = fixture
        .client
        .get(fixture.url("/api/window"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(window["data"]["phase"], "notYetOpen");
    assert_eq!(window["data"]["open"], false);
    assert_eq!(window["data"]["timeLeftPercentage"], 100.0);
}

#[tokio::test]
async fn test_create_topic_before_window_only() {
    let upcoming = TestFixture::with_options(Some(TEST_KEY.to_string()), upcoming_window()).await;
    let resp = upcoming
        .client
        .post(upcoming.url("/api/topics"))
        .json(&json!({ "title": "Quantum Key Distribution", "section": "B" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["taken"], false);
    assert!(!body["data"]["id"].as_str().unwrap().is_empty());

    let resp = upcoming
        .client
        .post(upcoming.url("/api/topics"))
        .json(&json!({ "id": "t1", "title": "Duplicate" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 409);

    let open = TestFixture::new().await;
    let resp = open
        .client
        .post(open.url("/api/topics"))
        .json(&json!({ "title": "Too Late" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 409);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "CONFLICT");
}

#[tokio::test]
async fn test_responses_and_membership_query() {
    let fixture = TestFixture::new().await;
    fixture
        .claim(&claim_body("t1", "1RV23IS001", "1RV23IS002"))
        .await;
    fixture
        .claim(&claim_body("t3", "1RV24IS010", "1RV24IS011"))
        .await;

    let body: Value = fixture
        .client
        .get(fixture.url("/api/responses"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let topics: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["topicId"].as_str().unwrap())
        .collect();
    assert_eq!(topics, vec!["t1", "t3"]);

    let body: Value = fixture
        .client
        .post(fixture.url("/api/responses/query"))
        .json(&json!({ "slot": "student2", "usns": ["1RV24IS011", "1RV23IS001"] }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let records = body["data"].as_array().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["topicId"], "t3");
}

#[tokio::test]
async fn test_revision_increments_on_claim() {
    let fixture = TestFixture::new().await;

    let before: Value = fixture
        .client
        .get(fixture.url("/api/stats"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let before = before["revisionId"].as_i64().unwrap();

    let (_, body) = fixture
        .claim(&claim_body("t1", "1RV23IS001", "1RV23IS002"))
        .await;
    assert_eq!(body["revisionId"].as_i64().unwrap(), before + 1);

    // Aborts leave the revision alone
    let (_, body) = fixture
        .claim(&claim_body("t1", "1RV23IS003", "1RV23IS004"))
        .await;
    assert_eq!(body["revisionId"].as_i64().unwrap(), before + 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_http_claims_commit_once() {
    let fixture = Arc::new(TestFixture::new().await);

    let mut handles = Vec::new();
    for i in 0..10 {
        let fixture = fixture.clone();
        handles.push(tokio::spawn(async move {
            let body = claim_body(
                "t2",
                &format!("1RV23IS{:03}", 100 + 2 * i),
                &format!("1RV23IS{:03}", 101 + 2 * i),
            );
            fixture.claim(&body).await
        }));
    }

    let mut committed = 0;
    let mut already_claimed = 0;
    for handle in handles {
        let (status, body) = handle.await.unwrap();
        match status {
            200 => committed += 1,
            409 => {
                assert_eq!(body["error"]["code"], "ALREADY_CLAIMED");
                already_claimed += 1;
            }
            other => panic!("unexpected status {}: {}", other, body),
        }
    }
    assert_eq!(committed, 1);
    assert_eq!(already_claimed, 9);

    let responses = fixture.remote().list_responses().await.unwrap();
    assert_eq!(responses.len(), 1);
}

#[tokio::test]
async fn test_remote_store_round_trip() {
    let fixture = TestFixture::new().await;
    let remote = fixture.remote();

    let window = remote.window_status().await.unwrap();
    assert!(window.open);

    assert!(remote.get_topic("missing").await.unwrap().is_none());
    assert_eq!(remote.stats().await.unwrap().total_topics, 3);

    let unauthenticated = RemoteStore::new(&fixture.base_url, None).unwrap();
    assert!(matches!(
        unauthenticated.stats().await,
        Err(crate::errors::AppError::Unauthorized(_))
    ));
}

#[tokio::test]
async fn test_remote_topic_ids_with_reserved_characters() {
    let fixture = TestFixture::with_options(Some(TEST_KEY.to_string()), upcoming_window()).await;
    let remote = fixture.remote();

    // Fragment and query characters must not cut the id short
    assert!(remote.get_topic("t1#frag").await.unwrap().is_none());
    assert!(remote.get_topic("t1?x=1").await.unwrap().is_none());
    assert_eq!(remote.get_topic("t1").await.unwrap().unwrap().id, "t1");

    let resp = fixture
        .client
        .post(fixture.url("/api/topics"))
        .json(&json!({ "id": "iot#7?lab=2", "title": "Smart Irrigation", "section": "A" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let topic = remote.get_topic("iot#7?lab=2").await.unwrap().unwrap();
    assert_eq!(topic.id, "iot#7?lab=2");
    assert_eq!(topic.title, "Smart Irrigation");
}

#[tokio::test]
async fn test_portal_does_not_claim_a_truncated_id() {
    let fixture = TestFixture::new().await;
    let dir = TempDir::new().unwrap();
    let remote = Arc::new(fixture.remote());
    let status = remote.window_status().await.unwrap();
    let window = EnrollmentWindow::new(status.start, status.end).unwrap();
    let cache = LocalEnrollmentCache::open(dir.path()).await.unwrap();

    let mut portal = Portal::new(remote.clone(), cache, window);
    portal.set_session(Session::signed_in(Identity {
        display_name: "asha".to_string(),
        subject: "asha@example.edu".to_string(),
    }));

    assert!(matches!(
        portal.begin_claim("t1#x").await,
        Err(crate::errors::AppError::ClaimAborted(AbortReason::NotFound))
    ));
    assert!(!remote.get_topic("t1").await.unwrap().unwrap().claimed);
}

#[tokio::test]
async fn test_portal_tolerates_stats_failure() {
    let fixture = TestFixture::new().await;
    let dir = TempDir::new().unwrap();
    let cache = LocalEnrollmentCache::open(dir.path()).await.unwrap();

    // Without the key every store call is refused
    let refused = Arc::new(RemoteStore::new(&fixture.base_url, None).unwrap());
    let portal = Portal::new(refused, cache, open_window());

    assert!(portal.stats().await.is_none());
    assert!(matches!(
        portal.landing(Utc::now()).await,
        crate::client::Landing::Open(_)
    ));

    let dir = TempDir::new().unwrap();
    let cache = LocalEnrollmentCache::open(dir.path()).await.unwrap();
    let portal = Portal::new(Arc::new(fixture.remote()), cache, open_window());
    assert_eq!(portal.stats().await.unwrap().total_topics, 3);
}

#[tokio::test]
async fn test_portal_end_to_end_over_http() {
    let fixture = TestFixture::new().await;

    async fn portal(fixture: &TestFixture, dir: &TempDir, name: &str) -> Portal<RemoteStore> {
        let remote = Arc::new(fixture.remote());
        let status = remote.window_status().await.unwrap();
        let window = EnrollmentWindow::new(status.start, status.end).unwrap();
        let cache = LocalEnrollmentCache::open(dir.path()).await.unwrap();

        let mut portal = Portal::new(remote, cache, window);
        portal.set_session(Session::signed_in(Identity {
            display_name: name.to_string(),
            subject: format!("{}@example.edu", name),
        }));
        portal
    }

    let first_dir = TempDir::new().unwrap();
    let second_dir = TempDir::new().unwrap();
    let first = portal(&fixture, &first_dir, "asha").await;
    let second = portal(&fixture, &second_dir, "meera").await;
    let now = Utc::now();

    assert_eq!(first.enter(now).await.unwrap(), Route::Section);
    let topics = first.topics(Some("B"), None).await.unwrap();
    assert_eq!(topics.len(), 1);

    // Both teams pick the same topic; the first commit wins
    let mut flow1 = first.begin_claim(&topics[0].id).await.unwrap();
    let mut flow2 = second.begin_claim(&topics[0].id).await.unwrap();

    let form1 = MemberForm {
        student1_name: "Asha".to_string(),
        student1_usn: "1rv23is001".to_string(),
        student2_name: "Ravi".to_string(),
        student2_usn: "1rv23is002".to_string(),
    };
    let outcome = first.submit(&mut flow1, &form1).await.unwrap();
    assert!(outcome.is_committed());
    assert_eq!(flow1.route(), Route::Progress);
    assert_eq!(first.enter(now).await.unwrap(), Route::Progress);

    let form2 = MemberForm {
        student1_name: "Meera".to_string(),
        student1_usn: "1RV24IS021".to_string(),
        student2_name: "Kiran".to_string(),
        student2_usn: "1RV24IS022".to_string(),
    };
    let outcome = second.submit(&mut flow2, &form2).await.unwrap();
    assert_eq!(outcome, ClaimOutcome::Aborted(AbortReason::AlreadyClaimed));
    assert_eq!(flow2.state(), &ClaimState::Aborted(AbortReason::AlreadyClaimed));
    assert!(second.cached().await.is_none());
    assert_eq!(second.enter(now).await.unwrap(), Route::Section);

    // A retried form is validated again before anything is sent
    flow2.retry();
    let bad = MemberForm {
        student2_usn: "1RV24IS021".to_string(),
        ..form2.clone()
    };
    assert!(matches!(
        second.submit(&mut flow2, &bad).await,
        Err(crate::errors::AppError::InvalidSubmission(_))
    ));

    let progress = second.progress().await.unwrap();
    assert_eq!(progress.len(), 1);
    assert_eq!(progress[0].student1_usn, "1RV23IS001");
}
