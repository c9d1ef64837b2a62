//! Schema manager tests with a recording store and migrator.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use strand_core::config::AdminListConfig;
use strand_core::{
    Class, Context, DataType, Kind, Principal, Property, PropertyValue, Result, Schema,
    StrandError, Thing,
};
use strand_schema::{
    AdminListAuthorizer, Authorizer, FileSchemaStore, Migrator, SchemaManager, SchemaStore,
};

type Events = Arc<Mutex<Vec<String>>>;

// ── Fakes ────────────────────────────────────────────────────────

struct RecordingStore {
    events: Events,
    saved: Mutex<Option<Schema>>,
    saves: AtomicUsize,
    /// Saves numbered at or past this index fail.
    fail_from: AtomicUsize,
}

impl RecordingStore {
    fn new(events: Events) -> Self {
        Self {
            events,
            saved: Mutex::new(None),
            saves: AtomicUsize::new(0),
            fail_from: AtomicUsize::new(usize::MAX),
        }
    }

    fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    fn saved(&self) -> Option<Schema> {
        self.saved.lock().unwrap().clone()
    }
}

impl SchemaStore for RecordingStore {
    fn load(&self) -> Result<Schema> {
        Ok(self.saved().unwrap_or_default())
    }

    fn save(&self, schema: &Schema) -> Result<()> {
        let n = self.saves.fetch_add(1, Ordering::SeqCst);
        if n >= self.fail_from.load(Ordering::SeqCst) {
            return Err(StrandError::Io(std::io::Error::other("disk full")));
        }
        self.events.lock().unwrap().push("save".to_string());
        *self.saved.lock().unwrap() = Some(schema.clone());
        Ok(())
    }
}

#[derive(Default)]
struct RecordingMigrator {
    events: Events,
    fail: AtomicBool,
    delay: Option<Duration>,
}

impl RecordingMigrator {
    async fn record(&self, event: String) -> Result<()> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(StrandError::BackendUnavailable("graph down".to_string()));
        }
        self.events.lock().unwrap().push(event);
        Ok(())
    }
}

#[async_trait]
impl Migrator for RecordingMigrator {
    async fn add_class(&self, _ctx: &Context, kind: Kind, class: &Class) -> Result<()> {
        self.record(format!("add_class {} {}", kind.name(), class.class)).await
    }

    async fn drop_class(&self, _ctx: &Context, kind: Kind, class: &str) -> Result<()> {
        self.record(format!("drop_class {} {class}", kind.name())).await
    }

    async fn add_property(
        &self,
        _ctx: &Context,
        _kind: Kind,
        class: &str,
        property: &Property,
    ) -> Result<()> {
        self.record(format!("add_property {class}.{}", property.name)).await
    }

    async fn drop_property(&self, _ctx: &Context, _kind: Kind, class: &str, property: &str) -> Result<()> {
        self.record(format!("drop_property {class}.{property}")).await
    }
}

struct AllowAll;

#[async_trait]
impl Authorizer for AllowAll {
    async fn authorize(&self, _: Option<&Principal>, _: &str, _: &str) -> Result<()> {
        Ok(())
    }
}

struct Harness {
    events: Events,
    store: Arc<RecordingStore>,
    migrator: Arc<RecordingMigrator>,
    manager: Arc<SchemaManager>,
}

fn harness_with(schema: Schema, migrator: RecordingMigrator, authorizer: Arc<dyn Authorizer>) -> Harness {
    let events = Arc::clone(&migrator.events);
    let store = Arc::new(RecordingStore::new(Arc::clone(&events)));
    let migrator = Arc::new(migrator);
    let manager = Arc::new(SchemaManager::new(
        schema,
        store.clone(),
        migrator.clone(),
        authorizer,
    ));
    Harness {
        events,
        store,
        migrator,
        manager,
    }
}

fn harness() -> Harness {
    harness_with(Schema::default(), RecordingMigrator::default(), Arc::new(AllowAll))
}

fn city() -> Class {
    Class::new("City").with_property("name", DataType::String, true)
}

fn class_names(schema: &Schema, kind: Kind) -> BTreeSet<String> {
    schema
        .semantic_schema(kind)
        .classes
        .iter()
        .map(|c| c.class.clone())
        .collect()
}

fn ctx() -> Context {
    Context::background()
}

// ── Class lifecycle ──────────────────────────────────────────────

#[tokio::test]
async fn add_then_delete_restores_class_list() {
    let mut initial = Schema::default();
    initial.things.classes.push(Class::new("Country"));
    initial.things.classes.push(Class::new("Person"));
    let h = harness_with(initial.clone(), RecordingMigrator::default(), Arc::new(AllowAll));

    h.manager.add_class(&ctx(), None, Kind::Thing, city()).await.unwrap();
    assert!(h.manager.handle().read().things.class("City").is_some());

    h.manager.delete_class(&ctx(), None, Kind::Thing, "City").await.unwrap();

    let after = h.manager.handle().snapshot();
    assert_eq!(class_names(&after, Kind::Thing), class_names(&initial, Kind::Thing));
    assert_eq!(
        *h.events.lock().unwrap(),
        vec!["save", "add_class thing City", "save", "drop_class thing City"]
    );
}

#[tokio::test]
async fn delete_of_missing_class_touches_nothing() {
    let h = harness();

    let err = h
        .manager
        .delete_class(&ctx(), None, Kind::Thing, "Ghost")
        .await
        .unwrap_err();

    assert!(matches!(err, StrandError::NotFound(_)));
    assert_eq!(h.store.save_count(), 0);
    assert!(h.events.lock().unwrap().is_empty());
}

#[tokio::test]
async fn same_name_in_one_kind_is_rejected() {
    let h = harness();
    h.manager.add_class(&ctx(), None, Kind::Thing, city()).await.unwrap();

    let err = h
        .manager
        .add_class(&ctx(), None, Kind::Thing, city())
        .await
        .unwrap_err();
    assert!(matches!(err, StrandError::ValidationFailed(_)));
    assert_eq!(h.store.save_count(), 1);
}

#[tokio::test]
async fn invalid_class_is_rejected_before_persisting() {
    let h = harness();
    let bad = Class::new("Person").with_property("worksAt", DataType::CrossRef("Company".into()), false);

    let err = h.manager.add_class(&ctx(), None, Kind::Thing, bad).await.unwrap_err();

    assert!(matches!(err, StrandError::ValidationFailed(_)));
    assert_eq!(h.store.save_count(), 0);
}

#[tokio::test]
async fn persist_happens_before_migration() {
    let h = harness();
    h.manager.add_class(&ctx(), None, Kind::Action, Class::new("Visit")).await.unwrap();

    assert_eq!(*h.events.lock().unwrap(), vec!["save", "add_class action Visit"]);
    let saved = h.store.saved().unwrap();
    assert!(saved.actions.class("Visit").is_some());
    assert!(saved.things.classes.is_empty());
}

#[tokio::test]
async fn concurrent_adds_both_land() {
    let migrator = RecordingMigrator {
        delay: Some(Duration::from_millis(10)),
        ..Default::default()
    };
    let h = harness_with(Schema::default(), migrator, Arc::new(AllowAll));

    let first = {
        let manager = Arc::clone(&h.manager);
        tokio::spawn(async move { manager.add_class(&ctx(), None, Kind::Thing, city()).await })
    };
    let second = {
        let manager = Arc::clone(&h.manager);
        tokio::spawn(async move {
            manager
                .add_class(&ctx(), None, Kind::Thing, Class::new("Country"))
                .await
        })
    };
    first.await.unwrap().unwrap();
    second.await.unwrap().unwrap();

    let expected: BTreeSet<String> = ["City", "Country"].into_iter().map(String::from).collect();
    assert_eq!(class_names(&h.manager.handle().snapshot(), Kind::Thing), expected);
    assert_eq!(class_names(&h.store.saved().unwrap(), Kind::Thing), expected);
}

// ── Properties ───────────────────────────────────────────────────

#[tokio::test]
async fn property_lifecycle() {
    let h = harness();
    h.manager.add_class(&ctx(), None, Kind::Thing, city()).await.unwrap();

    let population = Property {
        name: "population".to_string(),
        data_type: DataType::Int,
        indexed: false,
        description: None,
    };
    h.manager
        .add_property(&ctx(), None, Kind::Thing, "City", population.clone())
        .await
        .unwrap();
    assert!(h.manager.handle().read().things.class("City").unwrap().property("population").is_some());

    let err = h
        .manager
        .add_property(&ctx(), None, Kind::Thing, "City", population)
        .await
        .unwrap_err();
    assert!(matches!(err, StrandError::ValidationFailed(_)));

    h.manager
        .delete_property(&ctx(), None, Kind::Thing, "City", "population")
        .await
        .unwrap();
    assert!(h.manager.handle().read().things.class("City").unwrap().property("population").is_none());

    let events = h.events.lock().unwrap().clone();
    assert!(events.contains(&"add_property City.population".to_string()));
    assert!(events.contains(&"drop_property City.population".to_string()));
}

#[tokio::test]
async fn property_changes_on_missing_targets_are_not_found() {
    let h = harness();
    h.manager.add_class(&ctx(), None, Kind::Thing, city()).await.unwrap();
    let prop = Property {
        name: "area".to_string(),
        data_type: DataType::Number,
        indexed: false,
        description: None,
    };

    let err = h
        .manager
        .add_property(&ctx(), None, Kind::Action, "City", prop)
        .await
        .unwrap_err();
    assert!(matches!(err, StrandError::NotFound(_)));

    let err = h
        .manager
        .delete_property(&ctx(), None, Kind::Thing, "City", "area")
        .await
        .unwrap_err();
    assert!(matches!(err, StrandError::NotFound(_)));
    assert_eq!(h.store.save_count(), 1);
}

// ── Authorization ────────────────────────────────────────────────

#[tokio::test]
async fn unauthorized_request_changes_nothing() {
    let authorizer = AdminListAuthorizer::new(AdminListConfig {
        enabled: true,
        users: vec!["admin".into()],
        read_only_users: vec!["viewer".into()],
    })
    .unwrap();
    let h = harness_with(Schema::default(), RecordingMigrator::default(), Arc::new(authorizer));
    let viewer = Principal::new("viewer");

    let err = h
        .manager
        .add_class(&ctx(), Some(&viewer), Kind::Thing, city())
        .await
        .unwrap_err();
    assert!(matches!(err, StrandError::Unauthorized { .. }));

    let err = h.manager.add_class(&ctx(), None, Kind::Thing, city()).await.unwrap_err();
    assert!(matches!(err, StrandError::Unauthorized { .. }));

    assert_eq!(h.store.save_count(), 0);
    assert!(h.manager.handle().read().things.classes.is_empty());

    assert!(h.manager.get_schema(Some(&viewer)).await.is_ok());
    let admin = Principal::new("admin");
    h.manager
        .add_class(&ctx(), Some(&admin), Kind::Thing, city())
        .await
        .unwrap();
}

// ── Failure handling ─────────────────────────────────────────────

#[tokio::test]
async fn failed_migration_rolls_back() {
    let h = harness();
    h.manager.add_class(&ctx(), None, Kind::Thing, city()).await.unwrap();
    h.migrator.fail.store(true, Ordering::SeqCst);

    let err = h
        .manager
        .add_class(&ctx(), None, Kind::Thing, Class::new("Country"))
        .await
        .unwrap_err();

    assert!(matches!(err, StrandError::BackendUnavailable(_)));
    let published = h.manager.handle().snapshot();
    assert!(published.things.class("Country").is_none());
    assert!(published.things.class("City").is_some());
    let persisted = h.store.saved().unwrap();
    assert_eq!(persisted, published);
    // initial add, new schema, rollback
    assert_eq!(h.store.save_count(), 3);
}

#[tokio::test]
async fn failed_rollback_is_inconsistent() {
    let h = harness();
    h.migrator.fail.store(true, Ordering::SeqCst);
    h.store.fail_from.store(1, Ordering::SeqCst);

    let err = h.manager.add_class(&ctx(), None, Kind::Thing, city()).await.unwrap_err();

    assert!(matches!(err, StrandError::Inconsistent(_)));
    // The store still holds the new schema, and so does memory.
    assert!(h.store.saved().unwrap().things.class("City").is_some());
    assert!(h.manager.handle().read().things.class("City").is_some());
}

#[tokio::test]
async fn canceled_request_changes_nothing() {
    let h = harness();
    let (ctx, cancel) = Context::with_cancel();
    cancel.cancel();

    let err = h.manager.add_class(&ctx, None, Kind::Thing, city()).await.unwrap_err();

    assert!(matches!(err, StrandError::Canceled(_)));
    assert_eq!(h.store.save_count(), 0);
    assert!(h.manager.handle().read().things.classes.is_empty());
}

// ── Entity validation ────────────────────────────────────────────

#[tokio::test]
async fn things_are_validated_against_published_schema() {
    let h = harness();
    let amsterdam = Thing::new("City").with_property("name", PropertyValue::value("Amsterdam"));
    assert!(matches!(
        h.manager.validate_thing(&amsterdam),
        Err(StrandError::NotFound(_))
    ));

    h.manager.add_class(&ctx(), None, Kind::Thing, city()).await.unwrap();
    h.manager.validate_thing(&amsterdam).unwrap();

    let wrong = Thing::new("City").with_property("name", PropertyValue::value(5i64));
    assert!(matches!(
        h.manager.validate_thing(&wrong),
        Err(StrandError::ValidationFailed(_))
    ));
}

// ── File store ───────────────────────────────────────────────────

#[tokio::test]
async fn file_store_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("schema.json");

    let manager = SchemaManager::load(
        Arc::new(FileSchemaStore::new(&path)),
        Arc::new(RecordingMigrator::default()),
        Arc::new(AllowAll),
    )
    .unwrap();
    manager.add_class(&ctx(), None, Kind::Thing, city()).await.unwrap();
    manager
        .add_class(&ctx(), None, Kind::Action, Class::new("Visit"))
        .await
        .unwrap();

    let reloaded = SchemaManager::load(
        Arc::new(FileSchemaStore::new(&path)),
        Arc::new(RecordingMigrator::default()),
        Arc::new(AllowAll),
    )
    .unwrap();
    assert_eq!(reloaded.handle().snapshot(), manager.handle().snapshot());
    assert!(reloaded.handle().read().actions.class("Visit").is_some());
}
