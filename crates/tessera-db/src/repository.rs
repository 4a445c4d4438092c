//! The repository API.
//!
//! [`Database`] is the handle the rest of the application holds. Every call
//! opens exactly one session for its own duration; writes additionally run in
//! a transaction. Arguments are validated before any session is opened, so a
//! rejected call has no side effects.

use std::sync::Arc;

use tessera_config::ConnectionSettings;
use tracing::info;
use uuid::Uuid;

use crate::{
    connection::SessionFactory,
    dialect::Dialect,
    driver::DriverRegistry,
    error::Result,
    expr::Col,
    query::{FieldFilter, Page, SelectQuery, SortDirection, SortSpec},
    registry::{EntityMapping, EntityRegistry},
    session::{record_values, Session},
    traits::{Entity, Expression, ID_COLUMN},
};

const SAVE_FAILED: &str = "Could not save or update entity";
const DELETE_FAILED: &str = "Could not delete entity";
const TRANSACTION_FAILED: &str = "Transaction failed";

/// Shared handle to the persistence layer. Cloning is cheap.
///
/// # Example
///
/// ```rust
/// use tessera_db::{define_entity, ConnectionSettings, Database, EntityRegistry, FieldFilter};
///
/// define_entity!(
///     pub struct Member in members {
///         table: "members",
///         columns: {
///             NAME => name: String,
///             GROUP => group: String
///         }
///     }
/// );
///
/// fn main() -> tessera_db::Result<()> {
///     let registry = EntityRegistry::builder().register::<Member>().build()?;
///     let settings = ConnectionSettings::new("jdbc:h2:mem:bot", "sa", "");
///     let db = Database::initialize(&settings, registry)?;
///
///     let member = Member::new("ana".into(), "a".into());
///     db.insert(&member)?;
///
///     assert_eq!(db.select_by_id::<Member>(member.id())?, Some(member));
///     let in_a: Vec<Member> = db.select_where(&FieldFilter::new().with(members::GROUP, "a"))?;
///     assert_eq!(in_a.len(), 1);
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct Database {
    factory: Arc<SessionFactory>,
}

impl Database {
    /// Connects using the built-in drivers.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Configuration`](crate::DbError::Configuration) if
    /// the URL names no supported engine or its driver is not available, and
    /// a connection or query error if the engine cannot be reached or the
    /// schema cannot be reconciled.
    pub fn initialize(settings: &ConnectionSettings, registry: EntityRegistry) -> Result<Self> {
        Self::initialize_with_drivers(settings, registry, &DriverRegistry::with_defaults())
    }

    /// Connects using an explicit driver registry, e.g. one holding server
    /// engine drivers.
    pub fn initialize_with_drivers(
        settings: &ConnectionSettings,
        registry: EntityRegistry,
        drivers: &DriverRegistry,
    ) -> Result<Self> {
        let factory = SessionFactory::initialize(settings, registry, drivers)?;
        Ok(Self {
            factory: Arc::new(factory),
        })
    }

    pub fn dialect(&self) -> Dialect {
        self.factory.dialect()
    }

    pub fn registry(&self) -> &EntityRegistry {
        self.factory.registry()
    }

    fn mapping<E: Entity>(&self) -> Result<&EntityMapping> {
        self.factory.registry().mapping::<E>()
    }

    fn by_id<E: Entity>(&self, id: Uuid) -> Result<SelectQuery<'_>> {
        Ok(SelectQuery::for_entity(self.mapping::<E>()?).filter(Col::<Uuid>::new(ID_COLUMN).eq(id)))
    }

    /// Returns the record with identity `id`, or `None`.
    pub fn select_by_id<E: Entity>(&self, id: Uuid) -> Result<Option<E>> {
        let query = self.by_id::<E>(id)?;
        let mut records = self.factory.with_session(|session| session.fetch::<E>(&query))?;
        Ok(records.pop())
    }

    /// Inserts `entity`, or overwrites the stored record with the same
    /// identity.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Validation`](crate::DbError::Validation) for an
    /// unregistered type or a field that cannot be encoded, and [`DbError::Transaction`](crate::DbError::Transaction)
    /// if the write or its commit fails; nothing is kept in that case.
    pub fn insert<E: Entity>(&self, entity: &E) -> Result<()> {
        let mapping = self.mapping::<E>()?;
        record_values(mapping, entity)?;

        self.factory
            .with_transaction(SAVE_FAILED, |session| session.save(entity))?;

        if self.factory.debug() {
            info!("Saved {} {}", mapping.type_name(), entity.id());
        }
        Ok(())
    }

    /// Records matching every constraint in `filter`, in no particular order.
    pub fn select_where<E: Entity>(&self, filter: &FieldFilter) -> Result<Vec<E>> {
        let query = SelectQuery::for_entity(self.mapping::<E>()?).matching(filter)?;
        self.factory.with_session(|session| session.fetch(&query))
    }

    pub fn select_all<E: Entity>(&self) -> Result<Vec<E>> {
        self.select_where(&FieldFilter::new())
    }

    /// Deletes the record with identity `id`. Returns `false`, not an error,
    /// if there was none.
    pub fn delete_by_id<E: Entity>(&self, id: Uuid) -> Result<bool> {
        let mapping = self.mapping::<E>()?;

        let removed = self
            .factory
            .with_transaction(DELETE_FAILED, |session| session.remove::<E>(id))?;

        if self.factory.debug() {
            if removed {
                info!("Deleted {} {id}", mapping.type_name());
            } else {
                info!("No {} {id} found for deletion", mapping.type_name());
            }
        }
        Ok(removed)
    }

    /// Up to `limit` matching records after skipping `offset`, ordered by
    /// identity so consecutive pages never overlap.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Validation`](crate::DbError::Validation) if `offset`
    /// is negative or `limit` is not positive.
    pub fn select_paged_where<E: Entity>(
        &self,
        filter: &FieldFilter,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<E>> {
        let page = Page::new(offset, limit)?;
        self.select_page(filter, &SortSpec::new(), page)
    }

    pub fn select_paged<E: Entity>(&self, offset: i64, limit: i64) -> Result<Vec<E>> {
        self.select_paged_where(&FieldFilter::new(), offset, limit)
    }

    /// Matching records ordered by `sort`; the first key takes precedence.
    pub fn select_where_sorted<E: Entity>(
        &self,
        filter: &FieldFilter,
        sort: &SortSpec,
    ) -> Result<Vec<E>> {
        let query = SelectQuery::for_entity(self.mapping::<E>()?)
            .matching(filter)?
            .sorted(sort)?;
        self.factory.with_session(|session| session.fetch(&query))
    }

    /// One engine-applied window of the sorted, filtered records. Identity is
    /// appended as the final sort key.
    pub fn select_page<E: Entity>(
        &self,
        filter: &FieldFilter,
        sort: &SortSpec,
        page: Page,
    ) -> Result<Vec<E>> {
        let query = SelectQuery::for_entity(self.mapping::<E>()?)
            .matching(filter)?
            .sorted(sort)?
            .order_by(Col::<Uuid>::new(ID_COLUMN), SortDirection::Asc)
            .page(page);
        self.factory.with_session(|session| session.fetch(&query))
    }

    pub fn count<E: Entity>(&self) -> Result<u64> {
        self.count_where::<E>(&FieldFilter::new())
    }

    pub fn count_where<E: Entity>(&self, filter: &FieldFilter) -> Result<u64> {
        let query = SelectQuery::for_entity(self.mapping::<E>()?).matching(filter)?;
        self.factory
            .with_session(|session| session.fetch_count(&query))
    }

    pub fn exists_by_id<E: Entity>(&self, id: Uuid) -> Result<bool> {
        let query = self.by_id::<E>(id)?;
        let count = self
            .factory
            .with_session(|session| session.fetch_count(&query))?;
        Ok(count > 0)
    }

    /// Runs `work` atomically on one session.
    ///
    /// `work` must do all of its reads and writes through the [`Session`] it
    /// is given. On the embedded engine, calling back into this `Database`
    /// from inside `work` blocks forever waiting for that same session.
    ///
    /// # Errors
    ///
    /// Any error returned by `work`, or by the commit, is wrapped in
    /// [`DbError::Transaction`](crate::DbError::Transaction) after the
    /// transaction is rolled back. Use
    /// [`DbError::custom`](crate::DbError::custom) to abort with an
    /// application error.
    pub fn do_in_transaction<R>(
        &self,
        work: impl FnOnce(&mut Session<'_>) -> Result<R>,
    ) -> Result<R> {
        self.factory.with_transaction(TRANSACTION_FAILED, work)
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("dialect", &self.dialect())
            .field("entities", &self.registry().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::{HashMap, HashSet},
        thread,
    };

    use super::*;
    use crate::{
        define_entity,
        error::DbError,
        test_support::{
            guilds, init_tracing, members, FakeDriver, Guild, LogCapture, Member, Stray,
        },
        value::{Json, Value},
    };

    define_entity!(
        struct Board in boards {
            table: "boards",
            columns: {
                TITLE => title: String,
                CELLS => cells: Option<Json<HashMap<(i32, i32), String>>>,
                LAYOUT => layout: Json<HashMap<(i32, i32), String>>
            }
        }
    );

    fn registry() -> EntityRegistry {
        EntityRegistry::builder()
            .register::<Member>()
            .register::<Guild>()
            .build()
            .unwrap()
    }

    fn setup() -> Database {
        init_tracing();
        let settings = ConnectionSettings::new("jdbc:h2:mem:bot", "sa", "").with_debug(true);
        Database::initialize(&settings, registry()).unwrap()
    }

    fn member(name: &str, group: &str, score: i64) -> Member {
        Member::new(name.into(), group.into(), score, None)
    }

    fn ids(records: &[Member]) -> Vec<Uuid> {
        records.iter().map(Member::id).collect()
    }

    #[test]
    fn test_insert_then_select_by_id() {
        let db = setup();
        let ana = member("x", "a", 1);

        db.insert(&ana).unwrap();

        assert_eq!(db.select_by_id::<Member>(ana.id()).unwrap(), Some(ana.clone()));
        assert!(db.exists_by_id::<Member>(ana.id()).unwrap());
    }

    #[test]
    fn test_delete_by_id() {
        let db = setup();
        let ana = member("x", "a", 1);
        db.insert(&ana).unwrap();

        assert!(db.delete_by_id::<Member>(ana.id()).unwrap());
        assert_eq!(db.select_by_id::<Member>(ana.id()).unwrap(), None);
        assert!(!db.exists_by_id::<Member>(ana.id()).unwrap());
        assert!(!db.delete_by_id::<Member>(ana.id()).unwrap());
    }

    #[test]
    fn test_delete_logs_outcome_in_debug_mode() {
        let db = setup();
        let ana = member("x", "a", 1);
        db.insert(&ana).unwrap();

        let (removed, logs) = LogCapture::during(|| {
            (
                db.delete_by_id::<Member>(ana.id()).unwrap(),
                db.delete_by_id::<Member>(ana.id()).unwrap(),
            )
        });

        assert_eq!(removed, (true, false));
        let lines = logs.lines();
        assert_eq!(lines.iter().filter(|l| l.contains("Deleted")).count(), 1);
        assert_eq!(
            lines
                .iter()
                .filter(|l| l.contains("found for deletion"))
                .count(),
            1
        );
    }

    #[test]
    fn test_unencodable_field_is_rejected_before_writing() {
        init_tracing();
        let settings = ConnectionSettings::new("jdbc:h2:mem:boards", "sa", "");
        let registry = EntityRegistry::builder().register::<Board>().build().unwrap();
        let db = Database::initialize(&settings, registry).unwrap();

        let bad = HashMap::from([((1, 2), "x".to_string())]);
        let optional = Board::new("a".into(), Some(Json(bad.clone())), Json(HashMap::new()));
        let required = Board::new("b".into(), None, Json(bad));

        for (board, field) in [(&optional, "'cells'"), (&required, "'layout'")] {
            match db.insert(board) {
                Err(DbError::Validation(message)) => assert!(message.contains(field)),
                other => panic!("expected validation error, got {other:?}"),
            }
            assert_eq!(db.select_by_id::<Board>(board.id()).unwrap(), None);
        }
        assert_eq!(db.count::<Board>().unwrap(), 0);

        let fine = Board::new("c".into(), None, Json(HashMap::new()));
        db.insert(&fine).unwrap();
        assert_eq!(db.select_by_id::<Board>(fine.id()).unwrap(), Some(fine));
    }

    #[test]
    fn test_absent_identity_is_not_an_error() {
        let db = setup();
        let id = Uuid::new_v4();

        assert_eq!(db.select_by_id::<Member>(id).unwrap(), None);
        assert!(!db.exists_by_id::<Member>(id).unwrap());
        assert!(!db.delete_by_id::<Member>(id).unwrap());
    }

    #[test]
    fn test_select_where_and_count() {
        let db = setup();
        for (name, group) in [("a1", "a"), ("a2", "a"), ("a3", "a"), ("b1", "b"), ("b2", "b")] {
            db.insert(&member(name, group, 0)).unwrap();
        }

        let in_a: Vec<Member> = db
            .select_where(&FieldFilter::new().with(members::GROUP, "a"))
            .unwrap();
        assert_eq!(in_a.len(), 3);
        assert!(in_a.iter().all(|m| m.group == "a"));

        assert_eq!(db.count::<Member>().unwrap(), 5);
        assert_eq!(db.select_all::<Member>().unwrap().len(), 5);
        assert_eq!(
            db.count_where::<Member>(&FieldFilter::new().with("group", "b"))
                .unwrap(),
            2
        );
    }

    #[test]
    fn test_filter_is_a_conjunction() {
        let db = setup();
        db.insert(&member("x", "a", 1)).unwrap();
        db.insert(&member("x", "b", 1)).unwrap();
        db.insert(&member("y", "a", 1)).unwrap();

        let filter = FieldFilter::new()
            .eq(members::NAME, "x".to_string())
            .eq(members::GROUP, "a".to_string());
        let matched: Vec<Member> = db.select_where(&filter).unwrap();

        assert_eq!(matched.len(), 1);
        assert_eq!((matched[0].name.as_str(), matched[0].group.as_str()), ("x", "a"));
    }

    #[test]
    fn test_null_filter_matches_missing_values() {
        let db = setup();
        let mut named = member("x", "a", 1);
        named.nickname = Some("xx".into());
        db.insert(&named).unwrap();
        db.insert(&member("y", "a", 1)).unwrap();

        let unnamed: Vec<Member> = db
            .select_where(&FieldFilter::new().with(members::NICKNAME, Value::Null))
            .unwrap();

        assert_eq!(unnamed.len(), 1);
        assert_eq!(unnamed[0].name, "y");
    }

    #[test]
    fn test_paged_where_is_drawn_from_filter() {
        let db = setup();
        for (name, group) in [("a1", "a"), ("a2", "a"), ("a3", "a"), ("b1", "b"), ("b2", "b")] {
            db.insert(&member(name, group, 0)).unwrap();
        }

        let page: Vec<Member> = db
            .select_paged_where(&FieldFilter::new().with("group", "a"), 1, 1)
            .unwrap();

        assert_eq!(page.len(), 1);
        assert_eq!(page[0].group, "a");
    }

    #[test]
    fn test_pages_are_slices_of_sorted_result() {
        let db = setup();
        for score in [5, 3, 9, 1, 7, 3, 8] {
            db.insert(&member("m", "a", score)).unwrap();
        }

        let filter = FieldFilter::new().with("group", "a");
        let sort = SortSpec::new().desc(members::SCORE).asc(members::ID);
        let sorted: Vec<Member> = db.select_where_sorted(&filter, &sort).unwrap();
        let scores: Vec<i64> = sorted.iter().map(|m| m.score).collect();
        assert_eq!(scores, vec![9, 8, 7, 5, 3, 3, 1]);

        let mut paged = Vec::new();
        for offset in (0..7).step_by(3) {
            let page = Page::new(offset, 3).unwrap();
            paged.extend(db.select_page::<Member>(&filter, &sort, page).unwrap());
        }
        assert_eq!(ids(&paged), ids(&sorted));

        let by_id: Vec<Member> = db
            .select_where_sorted(&filter, &SortSpec::new().asc(members::ID))
            .unwrap();
        let window: Vec<Member> = db.select_paged_where(&filter, 2, 3).unwrap();
        assert_eq!(ids(&window), ids(&by_id[2..5]));

        let past_end: Vec<Member> = db.select_paged(10, 3).unwrap();
        assert!(past_end.is_empty());
    }

    #[test]
    fn test_invalid_page_is_rejected() {
        let db = setup();

        assert!(matches!(
            db.select_paged::<Member>(-1, 10),
            Err(DbError::Validation(_))
        ));
        assert!(matches!(
            db.select_paged::<Member>(0, 0),
            Err(DbError::Validation(_))
        ));
    }

    #[test]
    fn test_invalid_calls_touch_nothing() {
        init_tracing();
        let driver = FakeDriver::default();
        let drivers = DriverRegistry::new().register("postgres", driver.clone());
        let db = Database::initialize_with_drivers(&FakeDriver::settings(), registry(), &drivers)
            .unwrap();
        let acquired = driver.state().acquired;
        driver.take_statements();

        assert!(db.select_paged::<Member>(0, -1).is_err());
        assert!(db.select_all::<Stray>().is_err());
        assert!(db.insert(&Stray::new("lost".into())).is_err());
        assert!(db
            .select_where::<Member>(&FieldFilter::new().with("rank", 1))
            .is_err());

        assert!(driver.take_statements().is_empty());
        assert_eq!(driver.state().acquired, acquired);
    }

    #[test]
    fn test_unregistered_type_is_rejected() {
        let db = setup();
        let stray = Stray::new("lost".into());

        assert!(matches!(db.insert(&stray), Err(DbError::Validation(_))));
        assert!(matches!(
            db.select_by_id::<Stray>(stray.id()),
            Err(DbError::Validation(_))
        ));
        assert!(matches!(db.count::<Stray>(), Err(DbError::Validation(_))));
    }

    #[test]
    fn test_unknown_filter_field_is_rejected() {
        let db = setup();

        let result = db.select_where::<Member>(&FieldFilter::new().with("rank", 1));
        assert!(matches!(result, Err(DbError::Validation(_))));
    }

    #[test]
    fn test_insert_is_an_upsert() {
        let db = setup();
        let mut ana = member("x", "a", 1);
        db.insert(&ana).unwrap();

        ana.score = 42;
        ana.nickname = Some("ace".into());
        db.insert(&ana).unwrap();

        assert_eq!(db.count::<Member>().unwrap(), 1);
        assert_eq!(db.select_by_id::<Member>(ana.id()).unwrap(), Some(ana));
    }

    #[test]
    fn test_structured_fields_round_trip() {
        let db = setup();
        let guild = Guild::new(
            "zig".into(),
            Json(vec!["admin".into(), "moderator".into()]),
            true,
            4.5,
        );
        db.insert(&guild).unwrap();

        let stored = db.select_by_id::<Guild>(guild.id()).unwrap().unwrap();
        assert_eq!(stored, guild);

        let active: Vec<Guild> = db
            .select_where(&FieldFilter::new().eq(guilds::ACTIVE, true))
            .unwrap();
        assert_eq!(active.len(), 1);
    }

    #[test]
    fn test_transaction_commits_all_writes() {
        let db = setup();
        let (a, b) = (member("a", "a", 1), member("b", "a", 2));

        let saved = db
            .do_in_transaction(|session| {
                session.save(&a)?;
                session.save(&b)?;
                session.count::<Member>(&FieldFilter::new())
            })
            .unwrap();

        assert_eq!(saved, 2);
        assert_eq!(db.count::<Member>().unwrap(), 2);
    }

    #[test]
    fn test_failed_transaction_leaves_no_writes() {
        let db = setup();
        db.insert(&member("kept", "a", 1)).unwrap();
        let before = db.count::<Member>().unwrap();

        let err = db
            .do_in_transaction(|session| -> Result<()> {
                session.save(&member("lost", "a", 2))?;
                Err(DbError::custom("command aborted"))
            })
            .unwrap_err();

        match err {
            DbError::Transaction { context, source } => {
                assert_eq!(context, "Transaction failed");
                assert_eq!(source.to_string(), "command aborted");
            }
            other => panic!("expected transaction error, got {other:?}"),
        }
        assert_eq!(db.count::<Member>().unwrap(), before);
    }

    #[test]
    fn test_panicking_transaction_leaves_no_writes() {
        let db = setup();

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            db.do_in_transaction(|session| -> Result<()> {
                session.save(&member("lost", "a", 2))?;
                panic!("handler crashed");
            })
        }));

        assert!(result.is_err());
        assert_eq!(db.count::<Member>().unwrap(), 0);
    }

    #[test]
    fn test_unsupported_engine_is_rejected() {
        let settings = ConnectionSettings::new("sqlite://local.db", "bot", "");

        let result = Database::initialize(&settings, registry());
        assert!(matches!(result, Err(DbError::Configuration(_))));
    }

    #[test]
    fn test_server_engine_requires_registered_driver() {
        let settings = ConnectionSettings::new("jdbc:mysql://localhost:3306/bot", "bot", "");

        let result = Database::initialize(&settings, registry());
        assert!(matches!(result, Err(DbError::Configuration(_))));
    }

    #[test]
    fn test_file_database_persists_and_gains_columns() {
        init_tracing();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bot.db");

        // A guilds table from before roles, active and rating existed.
        rusqlite::Connection::open(&path)
            .unwrap()
            .execute_batch(
                "CREATE TABLE \"guilds\" (\"id\" VARCHAR(36) NOT NULL PRIMARY KEY, \"name\" VARCHAR NOT NULL)",
            )
            .unwrap();

        let settings = ConnectionSettings::new(format!("jdbc:h2:file:{}", path.display()), "sa", "");
        let ana = member("x", "a", 1);
        let guild = Guild::new("zig".into(), Json(vec![]), false, 0.0);
        {
            let db = Database::initialize(&settings, registry()).unwrap();
            db.insert(&ana).unwrap();
            db.insert(&guild).unwrap();
        }

        let db = Database::initialize(&settings, registry()).unwrap();
        assert_eq!(db.select_by_id::<Member>(ana.id()).unwrap(), Some(ana));
        assert_eq!(db.select_by_id::<Guild>(guild.id()).unwrap(), Some(guild));
    }

    #[test]
    fn test_concurrent_inserts() {
        let db = setup();

        let handles: Vec<_> = (0..4)
            .map(|t| {
                let db = db.clone();
                thread::spawn(move || {
                    for i in 0..10 {
                        db.insert(&member(&format!("t{t}-{i}"), "a", i)).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let all: Vec<Member> = db.select_all().unwrap();
        assert_eq!(all.len(), 40);
        let unique: HashSet<Uuid> = all.iter().map(Member::id).collect();
        assert_eq!(unique.len(), 40);
        assert_eq!(db.count::<Member>().unwrap(), 40);
    }
}
