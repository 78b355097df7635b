//! The Accountant: unified API for recording and verifying ledgers.
//!
//! The Accountant brings together a store, the cipher and notary
//! registries, and configuration. Every entry it writes goes through
//! [`Accountant::append`], which signs, stores and prunes in that order.

use std::sync::Arc;

use accountant_core::{
    is_current_state_reachable, verify_history, CipherRegistry, Compiled, EntryContext, EntryId,
    EntryPayload, Identifiable, LedgerEntry, LedgerError, ModelRef, Notary, NotaryRegistry,
    Properties, Recordable, RequestContext, Signable, Verdict,
};
use accountant_core::types::now_millis;
use accountant_store::Store;
use serde_json::Value;
use tracing::{debug, info};

use crate::config::AccountantConfig;
use crate::driver::open_store;
use crate::error::{AccountantError, Result};

/// Event skipped while a restore is in progress.
const UPDATED_EVENT: &str = "updated";

/// Per-call recording context supplied by the host.
///
/// Replaces ambient toggles: suppression and restore state travel with
/// the call that needs them.
#[derive(Default)]
pub struct RecordContext<'a> {
    /// The acting principal.
    pub user: Option<&'a dyn Identifiable>,
    /// Where the event came from.
    pub request: RequestContext,
    /// Changed attributes. Every attribute when absent.
    pub modified: Option<Vec<String>>,
    /// Relationship change stored under `extra["pivot"]`.
    pub pivot: Option<(String, Value)>,
    /// Refuse to record anything.
    pub suppressed: bool,
    /// A restore is in progress; its `updated` events are not recorded.
    pub restoring: bool,
}

impl<'a> RecordContext<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn user(mut self, user: &'a dyn Identifiable) -> Self {
        self.user = Some(user);
        self
    }

    pub fn request(mut self, request: RequestContext) -> Self {
        self.request = request;
        self
    }

    pub fn modified<I, K>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        self.modified = Some(keys.into_iter().map(Into::into).collect());
        self
    }

    pub fn pivot(mut self, relation: impl Into<String>, properties: Value) -> Self {
        self.pivot = Some((relation.into(), properties));
        self
    }

    pub fn suppressed(mut self, suppressed: bool) -> Self {
        self.suppressed = suppressed;
        self
    }

    pub fn restoring(mut self, restoring: bool) -> Self {
        self.restoring = restoring;
        self
    }
}

/// The main Accountant struct.
///
/// Provides a unified API for:
/// - Recording entity events as signed ledger entries
/// - Retention pruning
/// - Querying an entity's ledgers
/// - Taint checks, extraction and compilation of single entries
/// - Replaying a whole history against live state
pub struct Accountant<S: Store> {
    /// The storage backend.
    store: Arc<S>,
    /// Configuration.
    config: AccountantConfig,
    ciphers: CipherRegistry,
    notaries: NotaryRegistry,
    /// The notary named by `config.notary`.
    notary: Arc<dyn Notary>,
}

impl Accountant<Arc<dyn Store>> {
    /// Create an accountant over the store named by `config.driver`.
    pub fn open(config: AccountantConfig) -> Result<Self> {
        let store = open_store(&config)?;
        Self::new(store, config)
    }
}

impl<S: Store> Accountant<S> {
    /// Create a new accountant.
    ///
    /// Fails if `config.notary` does not name a built-in notary.
    pub fn new(store: S, config: AccountantConfig) -> Result<Self> {
        let notaries = NotaryRegistry::new();
        let notary = notaries.resolve(&config.notary)?;
        Ok(Self {
            store: Arc::new(store),
            config,
            ciphers: CipherRegistry::new(),
            notaries,
            notary,
        })
    }

    /// Replace the cipher registry.
    pub fn with_ciphers(mut self, ciphers: CipherRegistry) -> Self {
        self.ciphers = ciphers;
        self
    }

    /// Replace the notary registry and resolve `config.notary` against it.
    pub fn with_notaries(mut self, notaries: NotaryRegistry) -> Result<Self> {
        self.notary = notaries.resolve(&self.config.notary)?;
        self.notaries = notaries;
        Ok(self)
    }

    /// Get the store reference.
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &AccountantConfig {
        &self.config
    }

    pub fn ciphers(&self) -> &CipherRegistry {
        &self.ciphers
    }

    pub fn notaries(&self) -> &NotaryRegistry {
        &self.notaries
    }

    pub fn notary(&self) -> &dyn Notary {
        self.notary.as_ref()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Recording
    // ─────────────────────────────────────────────────────────────────────────

    /// Record `event` on `model`.
    ///
    /// Returns `None` when the event is deliberately skipped (an `updated`
    /// event during a restore).
    pub async fn record(
        &self,
        model: &dyn Recordable,
        event: &str,
        ctx: &RecordContext<'_>,
    ) -> Result<Option<LedgerEntry>> {
        // 1. Suppressed calls never write
        if ctx.suppressed {
            return Err(AccountantError::RecordingDisabled);
        }

        // 2. A restore touches the entity, but only `restored` is recorded
        if ctx.restoring && event == UPDATED_EVENT {
            debug!(recordable = %model.model_ref(), "skipping update during restore");
            return Ok(None);
        }

        // 3. Entity overrides win over configuration
        let recordable_event = match model.ledger_events() {
            Some(events) => events.iter().any(|e| e == event),
            None => self.config.records(event),
        };
        if !recordable_event {
            return Err(LedgerError::InvalidEvent(event.to_string()).into());
        }

        let payload = self.build_payload(model, event, ctx)?;
        let threshold = model.ledger_threshold().unwrap_or(self.config.threshold);

        self.append(&payload, threshold).await.map(Some)
    }

    fn build_payload(
        &self,
        model: &dyn Recordable,
        event: &str,
        ctx: &RecordContext<'_>,
    ) -> Result<EntryPayload> {
        let properties = model.attributes();
        let modified = match &ctx.modified {
            Some(keys) => keys.clone(),
            None => properties.keys().cloned().collect(),
        };
        let extra = model.extra_ledger_data(event, &properties, ctx.user);

        let mut builder = EntryPayload::builder(event, model.model_ref())
            .user(ctx.user.map(|user| user.model_ref()))
            .properties(properties)
            .modified(modified)
            .ciphers(model.ciphers())
            .extra(extra)
            .context(ctx.request.clone());

        if let Some((relation, properties)) = &ctx.pivot {
            builder = builder.pivot(relation.clone(), properties.clone());
        }

        Ok(builder.build(&self.ciphers)?)
    }

    /// Sign and store `payload`, then prune its recordable down to
    /// `threshold` entries.
    ///
    /// This is the only path that writes entries.
    pub async fn append(&self, payload: &EntryPayload, threshold: usize) -> Result<LedgerEntry> {
        let signature = self.notary.sign(&payload.signable());
        let entry = self
            .store
            .insert_entry(payload, &signature, now_millis())
            .await?;

        info!(
            entry = %entry.id,
            event = %payload.event,
            recordable = %payload.recordable,
            "recorded ledger entry"
        );

        self.prune(&payload.recordable, threshold).await?;
        Ok(entry)
    }

    /// Keep only the `threshold` newest entries of `recordable`.
    ///
    /// `0` keeps everything.
    pub async fn prune(&self, recordable: &ModelRef, threshold: usize) -> Result<usize> {
        let removed = self.store.prune(recordable, threshold).await?;
        if removed > 0 {
            info!(recordable = %recordable, removed, threshold, "pruned ledger");
        }
        Ok(removed)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Query Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Every entry of `recordable`, oldest first.
    pub async fn ledgers(&self, recordable: &ModelRef) -> Result<Vec<LedgerEntry>> {
        Ok(self.store.entries_oldest_first(recordable).await?)
    }

    /// Every entry of `recordable`, newest first.
    pub async fn ledgers_newest_first(&self, recordable: &ModelRef) -> Result<Vec<LedgerEntry>> {
        Ok(self.store.entries_newest_first(recordable).await?)
    }

    /// Get an entry by id.
    pub async fn get_entry(&self, id: EntryId) -> Result<Option<LedgerEntry>> {
        Ok(self.store.get_entry(id).await?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Entry Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Whether `entry` was altered after it was stored.
    pub fn is_tainted(&self, entry: &LedgerEntry) -> bool {
        entry.is_tainted(self.notary.as_ref())
    }

    /// Recover the attributes recorded in `entry`.
    pub fn extract(&self, entry: &LedgerEntry, strict: bool) -> Result<Properties> {
        Ok(entry.extract(&self.ciphers, self.notary.as_ref(), strict)?)
    }

    /// Compile `entry` for display, formatting through the given models.
    pub fn compile<'a>(
        &'a self,
        entry: &LedgerEntry,
        user: Option<&'a dyn Identifiable>,
        recordable: Option<&'a dyn Identifiable>,
    ) -> Result<Compiled<'a>> {
        let mut ctx = EntryContext::new(&self.ciphers).user_prefix(&self.config.user_prefix);
        if let Some(user) = user {
            ctx = ctx.user(user);
        }
        if let Some(recordable) = recordable {
            ctx = ctx.recordable(recordable);
        }
        Ok(entry.compile(&ctx)?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Replay
    // ─────────────────────────────────────────────────────────────────────────

    /// Replay the stored history of `live` against its current state.
    pub async fn verify_history(&self, live: &dyn Recordable) -> Result<Verdict> {
        let entries = self.store.entries_oldest_first(&live.model_ref()).await?;
        let verdict = verify_history(
            live,
            &entries,
            self.notary.as_ref(),
            &self.ciphers,
            &self.config.replay,
        )?;
        Ok(verdict)
    }

    /// Whether the current state of `live` follows from its history.
    pub async fn is_current_state_reachable(&self, live: &dyn Recordable) -> Result<bool> {
        let entries = self.store.entries_oldest_first(&live.model_ref()).await?;
        Ok(is_current_state_reachable(
            live,
            &entries,
            self.notary.as_ref(),
            &self.ciphers,
            &self.config.replay,
        )?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use accountant_core::Attribute;
    use accountant_store::MemoryStore;
    use serde_json::json;
    use std::collections::BTreeMap;

    struct Note {
        id: u64,
        attributes: Properties,
        events: Option<Vec<String>>,
        threshold: Option<usize>,
    }

    impl Note {
        fn new(id: u64, body: &str) -> Self {
            let mut attributes = Properties::new();
            attributes.insert("id".into(), json!(id));
            attributes.insert("body".into(), json!(body));
            attributes.insert("created_at".into(), json!("2012-06-14 15:03:03"));
            attributes.insert("updated_at".into(), json!("2012-06-14 15:03:03"));
            Self {
                id,
                attributes,
                events: None,
                threshold: None,
            }
        }
    }

    impl Identifiable for Note {
        fn model_ref(&self) -> ModelRef {
            ModelRef::new("note", self.id)
        }

        fn attributes(&self) -> Properties {
            self.attributes.clone()
        }
    }

    impl Recordable for Note {
        fn ciphers(&self) -> BTreeMap<String, String> {
            BTreeMap::from([("body".to_string(), "base64".to_string())])
        }

        fn ledger_events(&self) -> Option<Vec<String>> {
            self.events.clone()
        }

        fn ledger_threshold(&self) -> Option<usize> {
            self.threshold
        }

        fn extra_ledger_data(
            &self,
            event: &str,
            _properties: &Properties,
            _user: Option<&dyn Identifiable>,
        ) -> Properties {
            let mut extra = Properties::new();
            extra.insert("source".into(), json!(format!("note-{event}")));
            extra
        }
    }

    struct Clerk;

    impl Identifiable for Clerk {
        fn model_ref(&self) -> ModelRef {
            ModelRef::new("clerk", 7)
        }

        fn attributes(&self) -> Properties {
            let mut attributes = Properties::new();
            attributes.insert("name".into(), json!("Ada"));
            attributes
        }

        fn format_attribute(&self, key: &str, value: &Value) -> Attribute {
            match (key, value.as_str()) {
                ("name", Some(name)) => Attribute::Plain(json!(name.to_uppercase())),
                _ => Attribute::Plain(value.clone()),
            }
        }
    }

    fn accountant() -> Accountant<MemoryStore> {
        Accountant::new(MemoryStore::new(), AccountantConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn test_record_builds_signed_payload() {
        let accountant = accountant();
        let note = Note::new(1, "hello");
        let clerk = Clerk;
        let ctx = RecordContext::new()
            .user(&clerk)
            .request(RequestContext {
                url: Some("https://example.test/notes/1".into()),
                ..RequestContext::default()
            });

        let entry = accountant
            .record(&note, "created", &ctx)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(entry.payload.user, Some(ModelRef::new("clerk", 7)));
        assert_eq!(entry.payload.properties["body"], json!("ImhlbGxvIg=="));
        assert_eq!(entry.payload.modified.len(), 4);
        assert_eq!(entry.payload.extra["source"], json!("note-created"));
        assert!(!accountant.is_tainted(&entry));
        assert_eq!(accountant.extract(&entry, true).unwrap(), note.attributes());
    }

    #[tokio::test]
    async fn test_suppressed_context_refuses() {
        let accountant = accountant();
        let note = Note::new(1, "hello");
        let err = accountant
            .record(&note, "created", &RecordContext::new().suppressed(true))
            .await
            .unwrap_err();
        assert!(matches!(err, AccountantError::RecordingDisabled));
        assert!(accountant.ledgers(&note.model_ref()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_event_overrides() {
        let accountant = accountant();
        let mut note = Note::new(1, "hello");

        let err = accountant
            .record(&note, "retrieved", &RecordContext::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AccountantError::Ledger(LedgerError::InvalidEvent(ref e)) if e == "retrieved"
        ));

        note.events = Some(vec!["retrieved".into()]);
        assert!(accountant
            .record(&note, "retrieved", &RecordContext::new())
            .await
            .unwrap()
            .is_some());
        assert!(accountant
            .record(&note, "created", &RecordContext::new())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_restore_skips_updates() {
        let accountant = accountant();
        let note = Note::new(1, "hello");
        let ctx = RecordContext::new().restoring(true);

        assert!(accountant.record(&note, "updated", &ctx).await.unwrap().is_none());
        assert!(accountant.record(&note, "restored", &ctx).await.unwrap().is_some());
        assert_eq!(accountant.ledgers(&note.model_ref()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_restore_skips_updates_outside_entity_events() {
        let accountant = accountant();
        let mut note = Note::new(1, "hello");
        note.events = Some(vec!["created".into()]);
        let ctx = RecordContext::new().restoring(true);

        assert!(accountant.record(&note, "updated", &ctx).await.unwrap().is_none());
        assert!(matches!(
            accountant.record(&note, "updated", &RecordContext::new()).await,
            Err(AccountantError::Ledger(LedgerError::InvalidEvent(_)))
        ));
        assert!(accountant.ledgers(&note.model_ref()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_entity_threshold_wins() {
        let accountant = accountant();
        let mut note = Note::new(1, "hello");
        note.threshold = Some(2);

        for _ in 0..5 {
            accountant
                .record(&note, "updated", &RecordContext::new())
                .await
                .unwrap();
        }

        let ids: Vec<u64> = accountant
            .ledgers(&note.model_ref())
            .await
            .unwrap()
            .iter()
            .map(|e| e.id.get())
            .collect();
        assert_eq!(ids, vec![4, 5]);
    }

    #[tokio::test]
    async fn test_pivot_and_compile() {
        let accountant = accountant();
        let note = Note::new(1, "hello");
        let clerk = Clerk;
        let ctx = RecordContext::new()
            .user(&clerk)
            .modified(["body"])
            .pivot("tags", json!([{"tag_id": 3}]));

        let entry = accountant
            .record(&note, "updated", &ctx)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(entry.payload.pivot().unwrap()["relation"], json!("tags"));

        let compiled = accountant.compile(&entry, Some(&clerk), None).unwrap();
        assert_eq!(compiled.raw()["user_id"], json!("7"));
        assert_eq!(
            compiled.get_property("user_name").unwrap().into_value(),
            json!("ADA")
        );
        assert_eq!(compiled.data(false).unwrap()["body"], json!("hello"));
    }

    #[test]
    fn test_unknown_notary_fails_fast() {
        let config = AccountantConfig {
            notary: "md5".into(),
            ..AccountantConfig::default()
        };
        let err = Accountant::new(MemoryStore::new(), config).err().unwrap();
        assert!(matches!(
            err,
            AccountantError::Ledger(LedgerError::InvalidNotaryImplementation(_))
        ));
    }
}
