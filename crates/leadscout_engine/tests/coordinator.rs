use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

use leadscout_core::{
    search_filters, AckStatus, Contact, JobId, PollerSettings, Request, Response,
    ORGANIZATION_DOMAIN_PARAM, PERSON_TITLE_PARAM,
};
use leadscout_engine::{
    BackendSettings, Coordinator, CoordinatorHandle, CoordinatorSettings, DeliveryError,
    ExtractionSettings, Navigator, PageError, PendingBatch, PendingStore, ReqwestBackend,
    RevealTarget, SearchPage, SelectorProfile,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use tempfile::TempDir;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(scout_logging::initialize_for_tests);
}

const RESULTS_HTML: &str = r#"<html><body>
<div data-cy="people-row"><span data-cy="name-cell">Jane Doe</span><span data-cy="title-cell">Technical Recruiter</span><span data-cy="account-name">Acme</span><span data-cy="email-value">jane@acme.com</span></div>
</body></html>"#;

struct StaticPage {
    url: String,
}

#[async_trait::async_trait]
impl SearchPage for StaticPage {
    async fn current_url(&self) -> Result<String, PageError> {
        Ok(self.url.clone())
    }

    async fn snapshot_html(&self) -> Result<String, PageError> {
        Ok(RESULTS_HTML.to_string())
    }

    async fn reveal(&self, _target: &RevealTarget) -> Result<bool, PageError> {
        Ok(false)
    }
}

#[derive(Default)]
struct RecordingNavigator {
    opened: Mutex<Vec<Url>>,
    /// Number of tabs that open before every later attempt fails.
    fail_after: Option<usize>,
    /// Where opened tabs end up, when not on the requested URL.
    landing_url: Option<String>,
}

impl RecordingNavigator {
    fn failing_after(tabs: usize) -> Self {
        Self {
            fail_after: Some(tabs),
            ..Self::default()
        }
    }

    fn opened_count(&self) -> usize {
        self.opened.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl Navigator for RecordingNavigator {
    async fn open_tab(&self, url: &Url) -> Result<Arc<dyn SearchPage>, PageError> {
        let mut opened = self.opened.lock().unwrap();
        opened.push(url.clone());
        if self.fail_after.is_some_and(|tabs| opened.len() > tabs) {
            return Err(PageError::Navigation("no browser".to_string()));
        }
        Ok(Arc::new(StaticPage {
            url: self.landing_url.clone().unwrap_or_else(|| url.to_string()),
        }))
    }
}

fn fast_extraction() -> ExtractionSettings {
    ExtractionSettings {
        profile: SelectorProfile::DataAttributes,
        reveal_emails: false,
        initial_delay_ms: 0,
        settle_poll_ms: 10,
        settle_timeout_ms: 200,
        settle_buffer_ms: 0,
        reveal_settle_ms: 0,
        between_rows_ms: 0,
        ..ExtractionSettings::default()
    }
}

fn spawn(
    server: &MockServer,
    poller: PollerSettings,
    navigator: Arc<RecordingNavigator>,
    store: PendingStore,
) -> CoordinatorHandle {
    init_logging();
    let backend = ReqwestBackend::new(BackendSettings {
        base_url: format!("{}/api/apollo", server.uri()),
        connect_timeout: Duration::from_secs(2),
        request_timeout: Duration::from_secs(2),
    })
    .expect("backend");
    let settings = CoordinatorSettings {
        poller,
        search_base: Url::parse("https://app.apollo.io/").unwrap(),
        extraction: fast_extraction(),
    };
    let (handle, _join) = Coordinator::spawn(settings, Arc::new(backend), navigator, store);
    handle
}

async fn wait_for_requests(server: &MockServer, verb: &str, count: usize) -> Vec<wiremock::Request> {
    for _ in 0..100 {
        let matching: Vec<_> = server
            .received_requests()
            .await
            .unwrap_or_default()
            .into_iter()
            .filter(|request| request.method.as_str() == verb)
            .collect();
        if matching.len() >= count {
            return matching;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("expected {count} {verb} request(s)");
}

async fn post_bodies(server: &MockServer) -> Vec<serde_json::Value> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|request| request.method.as_str() == "POST")
        .map(|request| request.body_json().unwrap())
        .collect()
}

async fn wait_for_tabs(navigator: &RecordingNavigator, count: usize) {
    for _ in 0..100 {
        if navigator.opened_count() >= count {
            // Let the coordinator register the tab.
            tokio::time::sleep(Duration::from_millis(100)).await;
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("expected {count} tab(s) to open");
}

async fn mount_task_once(server: &MockServer, task: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/api/apollo/task/next"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "status": "task_found", "task": task })),
        )
        .up_to_n_times(1)
        .mount(server)
        .await;
}

async fn mount_complete(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api/apollo/task/complete"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "success" })))
        .mount(server)
        .await;
}

async fn mount_no_task(server: &MockServer, expected: u64) {
    Mock::given(method("GET"))
        .and(path("/api/apollo/task/next"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "no_task" })))
        .expect(expected)
        .mount(server)
        .await;
}

#[tokio::test]
async fn duplicate_start_runs_a_single_loop() {
    let server = MockServer::start().await;
    mount_no_task(&server, 1).await;
    let temp = TempDir::new().unwrap();
    let handle = spawn(
        &server,
        PollerSettings::default(),
        Arc::new(RecordingNavigator::default()),
        PendingStore::new(temp.path()),
    );

    assert_eq!(handle.start().await.unwrap(), Response::ack(AckStatus::Started));
    assert_eq!(handle.start().await.unwrap(), Response::ack(AckStatus::Started));
    wait_for_requests(&server, "GET", 1).await;
    tokio::time::sleep(Duration::from_millis(200)).await;

    let status = handle.status().await.unwrap();
    assert!(status.is_running);
    assert_eq!(status.current_task, None);
    server.verify().await;
}

#[tokio::test]
async fn stop_is_reported_and_idempotent() {
    let server = MockServer::start().await;
    mount_no_task(&server, 1).await;
    let temp = TempDir::new().unwrap();
    let handle = spawn(
        &server,
        PollerSettings::default(),
        Arc::new(RecordingNavigator::default()),
        PendingStore::new(temp.path()),
    );

    assert_eq!(handle.stop().await.unwrap(), Response::ack(AckStatus::Stopped));
    assert!(!handle.status().await.unwrap().is_running);

    handle.start().await.unwrap();
    wait_for_requests(&server, "GET", 1).await;
    assert_eq!(handle.stop().await.unwrap(), Response::ack(AckStatus::Stopped));
    assert!(!handle.status().await.unwrap().is_running);
}

#[tokio::test]
async fn fetched_task_is_opened_scraped_and_completed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/apollo/task/next"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "task_found",
            "task": { "job_id": 11, "company": "Acme", "company_domain": "acme.com", "department": "HR" }
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/apollo/task/complete"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "success" })))
        .mount(&server)
        .await;
    let temp = TempDir::new().unwrap();
    let navigator = Arc::new(RecordingNavigator::default());
    let handle = spawn(&server, PollerSettings::default(), navigator.clone(), PendingStore::new(temp.path()));

    handle.start().await.unwrap();
    let posts = wait_for_requests(&server, "POST", 1).await;

    let body: serde_json::Value = posts[0].body_json().unwrap();
    assert_eq!(
        body,
        json!({
            "job_id": 11,
            "contacts": [
                { "name": "Jane Doe", "title": "Technical Recruiter", "company": "Acme", "email": "jane@acme.com" }
            ],
            "status": "found"
        })
    );

    let opened = navigator.opened.lock().unwrap().clone();
    assert_eq!(opened.len(), 1);
    assert!(opened[0].fragment().unwrap_or_default().starts_with("/people?"));
    let filters = search_filters(&opened[0]);
    assert!(filters.contains(&(ORGANIZATION_DOMAIN_PARAM.to_string(), "acme.com".to_string())));
    assert!(filters.contains(&(PERSON_TITLE_PARAM.to_string(), "HR Recruiter".to_string())));

    assert_eq!(handle.status().await.unwrap().current_task, None);
}

#[tokio::test]
async fn pending_task_gates_further_fetches() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/apollo/task/next"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "task_found",
            "task": { "job_id": "j-1", "company": "Acme" }
        })))
        .expect(1)
        .mount(&server)
        .await;
    let temp = TempDir::new().unwrap();
    let navigator = Arc::new(RecordingNavigator::failing_after(0));
    let poller = PollerSettings {
        poll_interval: Duration::from_millis(50),
        gate_on_pending_result: true,
        stale_task_cycles: 0,
    };
    let handle = spawn(&server, poller, navigator, PendingStore::new(temp.path()));

    handle.start().await.unwrap();
    wait_for_requests(&server, "GET", 1).await;
    tokio::time::sleep(Duration::from_millis(400)).await;

    let status = handle.status().await.unwrap();
    assert!(status.is_running);
    assert_eq!(status.current_task.map(|task| task.job_id), Some(JobId::from("j-1")));
    server.verify().await;
}

#[tokio::test]
async fn contacts_without_task_are_acknowledged() {
    let server = MockServer::start().await;
    let temp = TempDir::new().unwrap();
    let handle = spawn(
        &server,
        PollerSettings::default(),
        Arc::new(RecordingNavigator::default()),
        PendingStore::new(temp.path()),
    );

    let response = handle
        .request(Request::ContactsScraped {
            contacts: vec![Contact::default()],
            job_id: None,
        })
        .await
        .unwrap();
    assert_eq!(response, Response::ack(AckStatus::Submitted));
    assert_eq!(response.encode(), r#"{"status":"submitted"}"#);
}

#[tokio::test]
async fn trigger_without_tab_completes_without_count() {
    let server = MockServer::start().await;
    let temp = TempDir::new().unwrap();
    let handle = spawn(
        &server,
        PollerSettings::default(),
        Arc::new(RecordingNavigator::default()),
        PendingStore::new(temp.path()),
    );

    let response = handle.trigger_scrape().await.unwrap();
    assert_eq!(response, Response::scrape_complete(None));
    assert_eq!(response.encode(), r#"{"status":"complete"}"#);
}

#[tokio::test]
async fn parked_results_are_resubmitted_on_startup() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/apollo/task/complete"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "success" })))
        .mount(&server)
        .await;
    let temp = TempDir::new().unwrap();
    let store = PendingStore::new(temp.path());
    store
        .append(PendingBatch::now(
            JobId::from(21),
            vec![Contact {
                name: "Jane Doe".to_string(),
                title: "Recruiter".to_string(),
                company: "Acme".to_string(),
                email: "jane@acme.com".to_string(),
            }],
        ))
        .unwrap();

    let _handle = spawn(
        &server,
        PollerSettings::default(),
        Arc::new(RecordingNavigator::default()),
        store.clone(),
    );

    let posts = wait_for_requests(&server, "POST", 1).await;
    let body: serde_json::Value = posts[0].body_json().unwrap();
    assert_eq!(body["job_id"], json!(21));
    assert_eq!(body["status"], json!("found"));
    assert_eq!(store.load().unwrap(), Vec::new());
}

#[tokio::test]
async fn requests_fail_after_shutdown() {
    let server = MockServer::start().await;
    let temp = TempDir::new().unwrap();
    let handle = spawn(
        &server,
        PollerSettings::default(),
        Arc::new(RecordingNavigator::default()),
        PendingStore::new(temp.path()),
    );

    handle.shutdown().await;
    let mut result = handle.status().await;
    for _ in 0..20 {
        if result.is_err() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
        result = handle.status().await;
    }
    assert_eq!(result, Err(DeliveryError::ChannelClosed));
}

#[tokio::test]
async fn trigger_on_open_results_tab_reports_count() {
    let server = MockServer::start().await;
    mount_task_once(
        &server,
        json!({ "job_id": 11, "company": "Acme", "company_domain": "acme.com" }),
    )
    .await;
    mount_complete(&server).await;
    let temp = TempDir::new().unwrap();
    let handle = spawn(
        &server,
        PollerSettings::default(),
        Arc::new(RecordingNavigator::default()),
        PendingStore::new(temp.path()),
    );

    handle.start().await.unwrap();
    wait_for_requests(&server, "POST", 1).await;

    let response = handle.trigger_scrape().await.unwrap();
    assert_eq!(response, Response::scrape_complete(Some(1)));
    assert_eq!(response.encode(), r#"{"status":"complete","count":1}"#);

    // The task already reported; the rescrape is not a second result.
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(post_bodies(&server).await.len(), 1);
}

#[tokio::test]
async fn trigger_off_results_view_completes_without_count() {
    let server = MockServer::start().await;
    mount_task_once(&server, json!({ "job_id": 12, "company": "Acme" })).await;
    mount_complete(&server).await;
    let temp = TempDir::new().unwrap();
    let navigator = Arc::new(RecordingNavigator {
        landing_url: Some("https://app.apollo.io/#/home".to_string()),
        ..RecordingNavigator::default()
    });
    let handle = spawn(&server, PollerSettings::default(), navigator.clone(), PendingStore::new(temp.path()));

    handle.start().await.unwrap();
    wait_for_tabs(&navigator, 1).await;

    let response = handle.trigger_scrape().await.unwrap();
    assert_eq!(response, Response::scrape_complete(None));
    assert_eq!(response.encode(), r#"{"status":"complete"}"#);

    let status = handle.status().await.unwrap();
    assert_eq!(status.current_task.map(|task| task.job_id), Some(JobId::from(12)));
    assert!(post_bodies(&server).await.is_empty());
}

#[tokio::test]
async fn contacts_from_an_earlier_tab_never_complete_the_next_task() {
    let server = MockServer::start().await;
    mount_task_once(
        &server,
        json!({ "job_id": "A", "company": "Acme", "company_domain": "acme.com" }),
    )
    .await;
    mount_task_once(
        &server,
        json!({ "job_id": "B", "company": "Globex", "company_domain": "globex.com" }),
    )
    .await;
    mount_complete(&server).await;
    let temp = TempDir::new().unwrap();
    // Acme's tab opens; Globex's does not.
    let navigator = Arc::new(RecordingNavigator::failing_after(1));
    let poller = PollerSettings {
        poll_interval: Duration::from_millis(50),
        gate_on_pending_result: true,
        stale_task_cycles: 0,
    };
    let handle = spawn(&server, poller, navigator.clone(), PendingStore::new(temp.path()));

    handle.start().await.unwrap();
    wait_for_requests(&server, "POST", 1).await;
    wait_for_requests(&server, "GET", 2).await;
    wait_for_tabs(&navigator, 2).await;

    let status = handle.status().await.unwrap();
    assert_eq!(status.current_task.map(|task| task.job_id), Some(JobId::from("B")));

    // Acme's tab was released when Globex was dispatched.
    assert_eq!(handle.trigger_scrape().await.unwrap(), Response::scrape_complete(None));

    let late = handle
        .request(Request::ContactsScraped {
            contacts: vec![Contact {
                name: "Jane Doe".to_string(),
                title: "Technical Recruiter".to_string(),
                company: "Acme".to_string(),
                email: "jane@acme.com".to_string(),
            }],
            job_id: Some(JobId::from("A")),
        })
        .await
        .unwrap();
    assert_eq!(late, Response::ack(AckStatus::Submitted));
    tokio::time::sleep(Duration::from_millis(200)).await;

    let bodies = post_bodies(&server).await;
    assert_eq!(bodies.len(), 1);
    assert_eq!(bodies[0]["job_id"], json!("A"));
    let status = handle.status().await.unwrap();
    assert_eq!(status.current_task.map(|task| task.job_id), Some(JobId::from("B")));

    handle
        .request(Request::ContactsScraped {
            contacts: Vec::new(),
            job_id: Some(JobId::from("B")),
        })
        .await
        .unwrap();
    let bodies = wait_for_requests(&server, "POST", 2).await;
    let body: serde_json::Value = bodies[1].body_json().unwrap();
    assert_eq!(body, json!({ "job_id": "B", "contacts": [], "status": "not_found" }));
}

#[tokio::test]
async fn stale_task_is_abandoned_and_polling_resumes() {
    let server = MockServer::start().await;
    mount_task_once(&server, json!({ "job_id": "j-stale", "company": "Acme" })).await;
    Mock::given(method("GET"))
        .and(path("/api/apollo/task/next"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "no_task" })))
        .mount(&server)
        .await;
    mount_complete(&server).await;
    let temp = TempDir::new().unwrap();
    let poller = PollerSettings {
        poll_interval: Duration::from_millis(50),
        gate_on_pending_result: true,
        stale_task_cycles: 2,
    };
    let handle = spawn(
        &server,
        poller,
        Arc::new(RecordingNavigator::failing_after(0)),
        PendingStore::new(temp.path()),
    );

    handle.start().await.unwrap();
    wait_for_requests(&server, "GET", 2).await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    let status = handle.status().await.unwrap();
    assert!(status.is_running);
    assert_eq!(status.current_task, None);
    assert!(post_bodies(&server).await.is_empty());
}
