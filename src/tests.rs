//! Integration tests for the tender backend.

use reqwest::Client;
use serde_json::{json, Value};

use crate::db::fixtures::TestDb;
use crate::{create_router, AppState};

/// Test fixture for integration tests.
///
/// alice acts for O1, carol for O2, bob for O3.
struct TestFixture {
    client: Client,
    base_url: String,
    state: AppState,
    db: TestDb,
    o1: String,
    o3: String,
    bob: String,
}

impl TestFixture {
    async fn new() -> Self {
        let db = TestDb::new().await;
        let o1 = db.organization("O1").await;
        let o2 = db.organization("O2").await;
        let o3 = db.organization("O3").await;
        let alice = db.employee("alice").await;
        let carol = db.employee("carol").await;
        let bob = db.employee("bob").await;
        db.responsible(&o1, &alice).await;
        db.responsible(&o2, &carol).await;
        db.responsible(&o3, &bob).await;

        let state = AppState::new(db.pool.clone());
        let app = create_router(state.clone());

        // Bind to random port
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind");
        let addr = listener.local_addr().expect("Failed to get addr");
        let base_url = format!("http://{}", addr);

        // Spawn server
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Wait for server to start
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

        TestFixture {
            client: Client::new(),
            base_url,
            state,
            db,
            o1,
            o3,
            bob,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn create_tender(&self, name: &str, service_type: &str) -> Value {
        let resp = self
            .client
            .post(self.url("/api/tenders/new"))
            .json(&json!({
                "name": name,
                "description": "Paving",
                "serviceType": service_type,
                "organizationId": self.o1,
                "creatorUsername": "alice"
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        body["data"].clone()
    }

    async fn put(&self, path: &str) -> reqwest::Response {
        self.client.put(self.url(path)).send().await.unwrap()
    }

    async fn get(&self, path: &str) -> reqwest::Response {
        self.client.get(self.url(path)).send().await.unwrap()
    }
}

#[tokio::test]
async fn test_health_check() {
    let fixture = TestFixture::new().await;

    let resp = fixture.get("/health").await;
    assert_eq!(resp.status(), 200);
    assert!(resp.headers().contains_key("x-request-id"));
    assert_eq!(resp.text().await.unwrap(), "OK");
}

#[tokio::test]
async fn test_ping() {
    let fixture = TestFixture::new().await;

    let resp = fixture.get("/api/ping").await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["data"], "ok");
}

#[tokio::test]
async fn test_tender_publish_and_public_status() {
    let fixture = TestFixture::new().await;

    let tender = fixture.create_tender("Road", "Construction").await;
    assert_eq!(tender["version"], 1);
    assert_eq!(tender["status"], "Created");
    assert_eq!(tender["serviceType"], "Construction");
    let id = tender["id"].as_str().unwrap();

    // Not visible to other organizations yet
    let resp = fixture
        .get(&format!("/api/tenders/{}/status?username=carol", id))
        .await;
    assert_eq!(resp.status(), 403);

    let resp = fixture
        .put(&format!(
            "/api/tenders/{}/status?status=Published&username=alice",
            id
        ))
        .await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["version"], 2);
    assert_eq!(body["data"]["status"], "Published");

    let resp = fixture
        .get(&format!("/api/tenders/{}/status?username=carol", id))
        .await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"], "Published");
}

#[tokio::test]
async fn test_tender_edit_is_partial_and_idempotent() {
    let fixture = TestFixture::new().await;
    let tender = fixture.create_tender("Road", "Construction").await;
    let id = tender["id"].as_str().unwrap();

    for _ in 0..2 {
        let resp = fixture
            .client
            .patch(fixture.url(&format!("/api/tenders/{}/edit?username=alice", id)))
            .json(&json!({ "name": "", "description": "Repaving" }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["data"]["version"], 2);
        assert_eq!(body["data"]["name"], "Road");
        assert_eq!(body["data"]["description"], "Repaving");
    }

    let resp = fixture
        .client
        .patch(fixture.url(&format!("/api/tenders/{}/edit?username=carol", id)))
        .json(&json!({ "name": "Stolen" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "FORBIDDEN");
}

#[tokio::test]
async fn test_tender_rollback() {
    let fixture = TestFixture::new().await;
    let tender = fixture.create_tender("Road", "Construction").await;
    let id = tender["id"].as_str().unwrap();

    fixture
        .put(&format!(
            "/api/tenders/{}/status?status=Published&username=alice",
            id
        ))
        .await;
    fixture
        .put(&format!(
            "/api/tenders/{}/status?status=Closed&username=alice",
            id
        ))
        .await;

    let resp = fixture
        .put(&format!("/api/tenders/{}/rollback/1?username=alice", id))
        .await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["version"], 4);
    assert_eq!(body["data"]["status"], "Created");

    let resp = fixture
        .put(&format!("/api/tenders/{}/rollback/0?username=alice", id))
        .await;
    assert_eq!(resp.status(), 400);

    let resp = fixture
        .put(&format!("/api/tenders/{}/rollback/9?username=alice", id))
        .await;
    assert_eq!(resp.status(), 404);

    let resp = fixture
        .put(&format!("/api/tenders/{}/rollback/1?username=ghost", id))
        .await;
    assert_eq!(resp.status(), 401);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "IDENTITY_NOT_FOUND");
}

#[tokio::test]
async fn test_tender_validation_errors() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .post(fixture.url("/api/tenders/new"))
        .json(&json!({
            "name": "Road",
            "description": "Paving",
            "serviceType": "Cleaning",
            "organizationId": fixture.o1,
            "creatorUsername": "alice"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    let resp = fixture
        .client
        .post(fixture.url("/api/tenders/new"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    let tender = fixture.create_tender("Road", "Construction").await;
    let id = tender["id"].as_str().unwrap();

    let resp = fixture.get(&format!("/api/tenders/{}/status", id)).await;
    assert_eq!(resp.status(), 400);

    let resp = fixture
        .put(&format!(
            "/api/tenders/{}/status?status=PUBLISHED&username=alice",
            id
        ))
        .await;
    assert_eq!(resp.status(), 400);

    let resp = fixture.get("/api/tenders?limit=-1").await;
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn test_tender_listing() {
    let fixture = TestFixture::new().await;
    fixture.create_tender("Bridge", "Construction").await;
    fixture.create_tender("Asphalt", "Construction").await;
    fixture.create_tender("Trucks", "Delivery").await;

    // Omitted paging skips the first five
    let resp = fixture.get("/api/tenders").await;
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"].as_array().unwrap().len(), 0);

    let resp = fixture.get("/api/tenders?limit=10&offset=0").await;
    let body: Value = resp.json().await.unwrap();
    let names: Vec<_> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(names, ["Asphalt", "Bridge", "Trucks"]);

    let resp = fixture
        .get("/api/tenders?limit=10&offset=0&service_type=Delivery&service_type=Manufacture")
        .await;
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let resp = fixture.get("/api/tenders/my?username=alice&limit=2&offset=0").await;
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_bid_flow_with_feedback() {
    let fixture = TestFixture::new().await;
    let tender = fixture.create_tender("Road", "Construction").await;
    let tender_id = tender["id"].as_str().unwrap().to_string();

    let new_bid = json!({
        "name": "Offer",
        "description": "Cheap and fast",
        "tenderId": tender_id,
        "authorType": "User",
        "authorId": fixture.bob
    });

    // Unpublished tender, foreign organization
    let resp = fixture
        .client
        .post(fixture.url("/api/bids/new"))
        .json(&new_bid)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);

    fixture
        .put(&format!(
            "/api/tenders/{}/status?status=Published&username=alice",
            tender_id
        ))
        .await;

    let resp = fixture
        .client
        .post(fixture.url("/api/bids/new"))
        .json(&new_bid)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["authorType"], "User");
    assert_eq!(body["data"]["authorId"], fixture.bob.as_str());
    assert_eq!(body["data"]["status"], "Created");
    let bid_id = body["data"]["id"].as_str().unwrap().to_string();

    // Feedback on a draft is refused
    let resp = fixture
        .put(&format!(
            "/api/bids/{}/feedback?bidFeedback=Nice&username=alice",
            bid_id
        ))
        .await;
    assert_eq!(resp.status(), 403);

    let resp = fixture
        .put(&format!(
            "/api/bids/{}/status?status=Published&username=bob",
            bid_id
        ))
        .await;
    assert_eq!(resp.status(), 200);

    let resp = fixture
        .get(&format!("/api/bids/{}/status?username=alice", bid_id))
        .await;
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"], "Published");

    let resp = fixture
        .put(&format!(
            "/api/bids/{}/feedback?bidFeedback=Nice&username=alice",
            bid_id
        ))
        .await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["id"], bid_id.as_str());

    let resp = fixture
        .get(&format!(
            "/api/bids/{}/reviews?authorUsername=bob&requesterUsername=alice&limit=5&offset=0",
            tender_id
        ))
        .await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    let reviews = body["data"].as_array().unwrap();
    assert_eq!(reviews.len(), 1);
    assert_eq!(reviews[0]["description"], "Nice");
    assert!(reviews[0]["createdAt"].is_string());

    let resp = fixture
        .get(&format!(
            "/api/bids/{}/list?username=alice&limit=5&offset=0",
            tender_id
        ))
        .await;
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let resp = fixture
        .put(&format!(
            "/api/bids/{}/submit_decision?decision=Approved&username=alice",
            bid_id
        ))
        .await;
    assert_eq!(resp.status(), 501);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "NOT_IMPLEMENTED");
}

#[tokio::test]
async fn test_bid_edit_and_rollback() {
    let fixture = TestFixture::new().await;
    let tender = fixture.create_tender("Road", "Construction").await;
    let tender_id = tender["id"].as_str().unwrap();
    fixture
        .put(&format!(
            "/api/tenders/{}/status?status=Published&username=alice",
            tender_id
        ))
        .await;

    let resp = fixture
        .client
        .post(fixture.url("/api/bids/new"))
        .json(&json!({
            "name": "Offer",
            "description": "Cheap",
            "tenderId": tender_id,
            "authorType": "Organization",
            "authorId": fixture.o3
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    let bid_id = body["data"]["id"].as_str().unwrap().to_string();

    let resp = fixture
        .client
        .patch(fixture.url(&format!("/api/bids/{}/edit?username=bob", bid_id)))
        .json(&json!({ "name": "Better offer" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["version"], 2);
    assert_eq!(body["data"]["name"], "Better offer");

    let resp = fixture
        .put(&format!("/api/bids/{}/rollback/1?username=bob", bid_id))
        .await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["version"], 3);
    assert_eq!(body["data"]["name"], "Offer");

    // Version zero passes validation but never exists
    let resp = fixture
        .put(&format!("/api/bids/{}/rollback/0?username=bob", bid_id))
        .await;
    assert_eq!(resp.status(), 404);

    let resp = fixture
        .get("/api/bids/my?username=bob&limit=5&offset=0")
        .await;
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_availability_latch_injected() {
    let fixture = TestFixture::new().await;

    fixture
        .state
        .availability
        .mark_unavailable("maintenance drill");

    let resp = fixture.get("/api/ping").await;
    assert_eq!(resp.status(), 503);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "SERVICE_UNAVAILABLE");

    let resp = fixture.get("/health").await;
    assert_eq!(resp.status(), 503);
    assert_eq!(resp.text().await.unwrap(), "maintenance drill");
}

#[tokio::test]
async fn test_store_loss_latches_every_request() {
    let fixture = TestFixture::new().await;

    let resp = fixture.get("/api/ping").await;
    assert_eq!(resp.status(), 200);

    fixture.db.pool.close().await;

    let resp = fixture.get("/api/tenders?limit=5&offset=0").await;
    assert_eq!(resp.status(), 503);
    assert!(!fixture.state.availability.is_available());

    // Even requests that never touch the store are refused now
    let resp = fixture.get("/api/ping").await;
    assert_eq!(resp.status(), 503);

    let resp = fixture.get("/health").await;
    assert_eq!(resp.status(), 503);
}
