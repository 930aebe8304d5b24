//! Common test utilities for outflow integration tests.

#![allow(dead_code)] // Some utilities are used by different test files

use std::sync::Arc;

use axum::Router;
use axum_test::TestServer;
use chrono::{Duration, Utc};
use tempfile::TempDir;

use outflow_core::{
    Campaign, CampaignId, DispatchConfig, PricingConfig, Recipient, RecipientList, SendingAccount,
    TemplateId, UserId, UserRecord,
};
use outflow_engine::EmailTemplate;
use outflow_service::{
    create_router, AppState, InMemoryTemplates, LocalMailProvider, ServiceConfig,
};
use outflow_store::{RocksStore, Store};

/// Test harness containing everything needed for integration tests.
pub struct TestHarness {
    /// The test server for making HTTP requests.
    pub server: TestServer,
    /// Temporary directory for the database (kept alive for test duration).
    pub _temp_dir: TempDir,
    /// Direct handle to the store for seeding fixtures.
    pub store: Arc<dyn Store>,
    /// The template catalog the scheduler resolves against.
    pub templates: Arc<InMemoryTemplates>,
    /// A seeded user for authenticated requests.
    pub user_id: UserId,
}

impl TestHarness {
    /// Create a harness with a fresh database and one seeded user.
    pub fn new() -> Self {
        Self::with_dispatch_config(DispatchConfig::default())
    }

    /// Create a harness with custom dispatch limits.
    pub fn with_dispatch_config(dispatch: DispatchConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store: Arc<dyn Store> =
            Arc::new(RocksStore::open(temp_dir.path()).expect("Failed to open store"));

        let config = ServiceConfig {
            listen_addr: "127.0.0.1:0".into(),
            data_dir: temp_dir.path().to_string_lossy().to_string(),
            cors_origins: vec!["*".into()],
            max_body_bytes: 1024 * 1024,
            request_timeout_seconds: 30,
            dispatch_interval_seconds: 60,
            pricing: PricingConfig::default(),
            dispatch,
        };

        let state = AppState::new(Arc::clone(&store), config, Arc::new(LocalMailProvider));
        let templates = Arc::clone(&state.templates);
        let router: Router = create_router(state);
        let server = TestServer::new(router).expect("Failed to create test server");

        let user_id = UserId::generate();
        store
            .put_user(&UserRecord::new(user_id, "owner@example.com"))
            .expect("Failed to seed user");

        Self {
            server,
            _temp_dir: temp_dir,
            store,
            templates,
            user_id,
        }
    }

    /// The identity header value for the seeded user.
    pub fn user_header(&self) -> String {
        self.user_id.to_string()
    }

    /// An identity header for a different (also seeded) user.
    pub fn other_user_header(&self) -> String {
        let other = UserId::generate();
        self.store
            .put_user(&UserRecord::new(other, "other@example.com"))
            .expect("Failed to seed user");
        other.to_string()
    }

    /// Fund the seeded user through the credits endpoint.
    pub async fn fund(&self, amount: i64) {
        self.server
            .post("/v1/credits/add")
            .add_header("x-user-id", self.user_header())
            .json(&serde_json::json!({
                "amount": amount,
                "reason": "purchase"
            }))
            .await
            .assert_status_ok();
    }

    /// Seed a connected account, a recipient list, a template, and a draft
    /// campaign over them. Returns the campaign id.
    pub fn seed_campaign(&self, emails: &[&str]) -> CampaignId {
        let account = SendingAccount::new(self.user_id, "owner@example.com");
        self.store.put_account(&account).expect("Failed to seed account");

        let list = RecipientList::new(self.user_id, "prospects".into());
        self.store
            .put_recipient_list(&list)
            .expect("Failed to seed list");
        for email in emails {
            self.store
                .append_recipient(&list.id, &Recipient::new(*email))
                .expect("Failed to seed recipient");
        }

        let template_id = TemplateId::generate();
        self.templates.insert(
            template_id,
            self.user_id,
            EmailTemplate {
                subject: "Quick question".into(),
                body_html: "<p>Hello there</p>".into(),
                footer: "Reply STOP to opt out.".into(),
            },
        );

        let campaign = Campaign::new(self.user_id, "spring outreach".into(), template_id, list.id);
        let campaign_id = campaign.id;
        self.store
            .put_campaign(&campaign)
            .expect("Failed to seed campaign");
        campaign_id
    }

    /// Pull every record under `idempotency_key` into the past so a
    /// dispatcher tick sees it as due.
    pub fn make_all_due(&self, idempotency_key: &str) {
        let records = self
            .store
            .list_dispatch_records_by_key(idempotency_key)
            .expect("Failed to list records");
        let base = Utc::now() - Duration::minutes(10);
        let updated: Vec<_> = records
            .into_iter()
            .enumerate()
            .map(|(i, mut record)| {
                record.send_at = base + Duration::seconds(i64::try_from(i).unwrap());
                record
            })
            .collect();
        self.store
            .insert_dispatch_records(&updated)
            .expect("Failed to re-insert records");
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
