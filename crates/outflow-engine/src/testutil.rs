//! Shared test fixtures: a seeded on-disk store plus in-memory provider
//! and template fakes.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use tempfile::TempDir;

use outflow_core::{
    AccountId, Campaign, CampaignId, DispatchConfig, DispatchRecord, EntryReason, LedgerEntry,
    ListId, PricingConfig, Recipient, RecipientList, SendingAccount, SuppressionEntry, TemplateId,
    UserId, UserRecord,
};
use outflow_store::{RocksStore, Store};

use crate::dispatcher::SendDispatcher;
use crate::ledger::LedgerEngine;
use crate::providers::{
    AccessToken, EmailTemplate, MailProvider, NoopAuditLog, ProviderError, TemplateStore,
};
use crate::scheduler::CampaignScheduler;
use crate::suppression::StoreSuppressionFilter;

/// A mail provider fake with scriptable failures.
#[derive(Default)]
pub struct MockMailProvider {
    drafts: Mutex<Vec<(String, String)>>,
    sent: Mutex<Vec<String>>,
    fail_draft: Mutex<HashSet<String>>,
    fail_send: Mutex<HashSet<String>>,
    next_draft: AtomicUsize,
}

impl MockMailProvider {
    /// Reject draft creation for this address.
    pub fn fail_draft_for(&self, email: &str) {
        self.fail_draft.lock().unwrap().insert(email.to_string());
    }

    /// Reject sends whose draft was addressed to this address.
    pub fn fail_send_to(&self, email: &str) {
        self.fail_send.lock().unwrap().insert(email.to_string());
    }

    /// Drafts created so far.
    pub fn drafts_created(&self) -> usize {
        self.drafts.lock().unwrap().len()
    }

    /// Draft ids sent, in send order.
    pub fn sent_drafts(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }

    fn recipient_of(&self, draft_id: &str) -> Option<String> {
        self.drafts
            .lock()
            .unwrap()
            .iter()
            .find(|(id, _)| id == draft_id)
            .map(|(_, to)| to.clone())
    }
}

#[async_trait]
impl MailProvider for MockMailProvider {
    async fn valid_credential(
        &self,
        account: &SendingAccount,
    ) -> Result<AccessToken, ProviderError> {
        if account.revoked {
            return Err(ProviderError("grant revoked".into()));
        }
        Ok(AccessToken(format!("token-{}", account.id)))
    }

    async fn create_draft(
        &self,
        _token: &AccessToken,
        _account_id: &AccountId,
        to: &str,
        _subject: &str,
        _body_html: &str,
    ) -> Result<String, ProviderError> {
        if self.fail_draft.lock().unwrap().contains(to) {
            return Err(ProviderError(format!("draft rejected for {to}")));
        }
        let draft_id = format!("draft-{}", self.next_draft.fetch_add(1, Ordering::SeqCst));
        self.drafts
            .lock()
            .unwrap()
            .push((draft_id.clone(), to.to_string()));
        Ok(draft_id)
    }

    async fn send_draft(
        &self,
        _token: &AccessToken,
        _account_id: &AccountId,
        draft_id: &str,
    ) -> Result<String, ProviderError> {
        let to = self
            .recipient_of(draft_id)
            .ok_or_else(|| ProviderError(format!("unknown draft {draft_id}")))?;
        if self.fail_send.lock().unwrap().contains(&to) {
            return Err(ProviderError(format!("send rejected for {to}")));
        }
        self.sent.lock().unwrap().push(draft_id.to_string());
        Ok(format!("msg-{draft_id}"))
    }
}

/// A template catalog fake with a single template.
pub struct MockTemplates {
    template_id: TemplateId,
    owner: UserId,
    template: EmailTemplate,
}

#[async_trait]
impl TemplateStore for MockTemplates {
    async fn get(
        &self,
        template_id: &TemplateId,
        user_id: &UserId,
    ) -> Result<Option<EmailTemplate>, ProviderError> {
        if *template_id == self.template_id && *user_id == self.owner {
            Ok(Some(self.template.clone()))
        } else {
            Ok(None)
        }
    }
}

/// A seeded workspace: one user with a connected account, a recipient
/// list, and a draft campaign over it.
pub struct Fixture {
    _dir: TempDir,
    pub store: Arc<dyn Store>,
    pub mail: Arc<MockMailProvider>,
    pub templates: Arc<MockTemplates>,
    pub ledger: Arc<LedgerEngine>,
    pub user_id: UserId,
    pub account_id: AccountId,
    pub campaign_id: CampaignId,
    pub list_id: ListId,
    pub template_id: TemplateId,
    dispatch: DispatchConfig,
    pricing: PricingConfig,
}

impl Fixture {
    pub fn new(balance: i64, emails: &[&str]) -> Self {
        Self::with_dispatch_config(balance, emails, DispatchConfig::default())
    }

    pub fn with_dispatch_config(balance: i64, emails: &[&str], dispatch: DispatchConfig) -> Self {
        let dir = TempDir::new().unwrap();
        let store: Arc<dyn Store> = Arc::new(RocksStore::open(dir.path()).unwrap());
        let ledger = Arc::new(LedgerEngine::new(Arc::clone(&store)));

        let user_id = UserId::generate();
        store.put_user(&UserRecord::new(user_id, "owner@example.com")).unwrap();

        let account = SendingAccount::new(user_id, "owner@example.com");
        let account_id = account.id;
        store.put_account(&account).unwrap();

        let list = RecipientList::new(user_id, "prospects".into());
        let list_id = list.id;
        store.put_recipient_list(&list).unwrap();
        for email in emails {
            store.append_recipient(&list_id, &Recipient::new(*email)).unwrap();
        }

        let template_id = TemplateId::generate();
        let campaign = Campaign::new(user_id, "spring outreach".into(), template_id, list_id);
        let campaign_id = campaign.id;
        store.put_campaign(&campaign).unwrap();

        let fixture = Self {
            _dir: dir,
            store,
            mail: Arc::new(MockMailProvider::default()),
            templates: Arc::new(MockTemplates {
                template_id,
                owner: user_id,
                template: EmailTemplate {
                    subject: "Quick question".into(),
                    body_html: "<p>Hello there</p>".into(),
                    footer: "Reply STOP to opt out.".into(),
                },
            }),
            ledger,
            user_id,
            account_id,
            campaign_id,
            list_id,
            template_id,
            dispatch,
            pricing: PricingConfig::default(),
        };
        if balance > 0 {
            fixture.credit(&user_id, balance);
        }
        fixture
    }

    pub fn scheduler(&self) -> CampaignScheduler {
        CampaignScheduler::new(
            Arc::clone(&self.store),
            Arc::clone(&self.ledger),
            Arc::clone(&self.mail) as Arc<dyn MailProvider>,
            Arc::clone(&self.templates) as Arc<dyn TemplateStore>,
            Arc::new(StoreSuppressionFilter::new(Arc::clone(&self.store))),
            Arc::new(NoopAuditLog),
            self.pricing.clone(),
            self.dispatch.clone(),
        )
    }

    pub fn dispatcher(&self) -> SendDispatcher {
        SendDispatcher::new(
            Arc::clone(&self.store),
            Arc::clone(&self.mail) as Arc<dyn MailProvider>,
            &self.dispatch,
        )
    }

    /// Schedule the fixture campaign and return its idempotency key.
    pub async fn schedule(&self) -> String {
        self.scheduler()
            .schedule(&self.campaign_id, &self.user_id, None)
            .await
            .unwrap()
            .idempotency_key
    }

    pub fn credit(&self, user_id: &UserId, amount: i64) {
        let balance = self.store.get_balance(user_id).unwrap() + amount;
        let entry = LedgerEntry::new(*user_id, amount, balance, EntryReason::Purchase, None, None);
        self.store.append_entry(&entry).unwrap();
    }

    pub fn balance(&self) -> i64 {
        self.balance_of(&self.user_id)
    }

    pub fn balance_of(&self, user_id: &UserId) -> i64 {
        self.store.get_balance(user_id).unwrap()
    }

    pub fn campaign(&self) -> Campaign {
        self.store.get_campaign(&self.campaign_id).unwrap().unwrap()
    }

    pub fn records_by_key(&self, idempotency_key: &str) -> Vec<DispatchRecord> {
        self.store.list_dispatch_records_by_key(idempotency_key).unwrap()
    }

    pub fn due_records(&self) -> Vec<DispatchRecord> {
        self.store.due_dispatch_records(Utc::now(), 100).unwrap()
    }

    /// Pull every record under `idempotency_key` into the past so the
    /// dispatcher sees it as due, preserving relative order.
    pub fn make_all_due(&self, idempotency_key: &str) {
        let records = self.records_by_key(idempotency_key);
        let base = Utc::now() - Duration::minutes(10);
        let updated: Vec<DispatchRecord> = records
            .into_iter()
            .enumerate()
            .map(|(i, mut record)| {
                #[allow(clippy::cast_possible_wrap)]
                let offset = Duration::seconds(i as i64);
                record.send_at = base + offset;
                record
            })
            .collect();
        // Re-insert so the due index follows the new send_at values.
        self.store.insert_dispatch_records(&updated).unwrap();
    }

    pub fn suppress(&self, email: &str) {
        let entry = SuppressionEntry::new(email, Some(self.user_id), "verification").unwrap();
        self.store.add_suppression(&entry).unwrap();
    }

    pub fn revoke_account(&self) {
        let mut account = self.store.get_account(&self.account_id).unwrap().unwrap();
        account.revoked = true;
        self.store.put_account(&account).unwrap();
    }

    /// Create a referrer and mark the fixture user as referred by them.
    pub fn add_referrer(&self) -> UserId {
        let referrer = UserRecord::new(UserId::generate(), "referrer@example.com");
        let referrer_id = referrer.id;
        self.store.put_user(&referrer).unwrap();

        let mut user = self.store.get_user(&self.user_id).unwrap().unwrap();
        user.referred_by = Some(referrer_id);
        self.store.put_user(&user).unwrap();
        referrer_id
    }

    /// Append a recipient whose enrichment chose a different address.
    pub fn add_recipient_with_chosen(&self, raw: &str, chosen: &str) {
        let recipient = Recipient {
            email: raw.to_string(),
            chosen_email: Some(chosen.to_string()),
            name: None,
        };
        self.store.append_recipient(&self.list_id, &recipient).unwrap();
    }
}
