//! Session scope.
//!
//! A [`Session`] is one exclusive connection, held for exactly one repository
//! call. Dropping it releases the connection on every exit path, rolling back
//! first if a transaction is still open (an early return or a panic inside
//! transactional work).

use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    connection::SessionFactory,
    dialect::Dialect,
    driver::Connection,
    error::{DbError, Result},
    expr::Col,
    query::{DeleteQuery, FieldFilter, InsertQuery, Page, SelectQuery, SortSpec, UpdateQuery},
    registry::{EntityMapping, EntityRegistry},
    traits::{Entity, Expression, ID_COLUMN},
    value::{Row, Value},
};

/// Log target for executed statements.
pub const SQL_TARGET: &str = "tessera_db::sql";

/// A live unit of work, handed to
/// [`Database::do_in_transaction`](crate::Database::do_in_transaction).
pub struct Session<'f> {
    conn: Box<dyn Connection + 'f>,
    dialect: Dialect,
    registry: &'f EntityRegistry,
    debug: bool,
    in_transaction: bool,
}

impl<'f> Session<'f> {
    pub(crate) fn new(
        conn: Box<dyn Connection + 'f>,
        dialect: Dialect,
        registry: &'f EntityRegistry,
        debug: bool,
    ) -> Self {
        Self {
            conn,
            dialect,
            registry,
            debug,
            in_transaction: false,
        }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn log(&self, sql: &str, params: &[Value]) {
        if self.debug {
            info!(target: SQL_TARGET, "{sql} {params:?}");
        }
    }

    /// Runs a raw statement. Identifiers and values are not checked; prefer
    /// the typed operations.
    pub fn execute(&mut self, sql: &str, params: &[Value]) -> Result<usize> {
        self.log(sql, params);
        self.conn.execute(sql, params)
    }

    /// Runs a raw query and returns every row.
    pub fn query(&mut self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        self.log(sql, params);
        self.conn.query(sql, params)
    }

    /// Looks up one record by identity.
    pub fn find<E: Entity>(&mut self, id: Uuid) -> Result<Option<E>> {
        let mapping = self.registry.mapping::<E>()?;
        let query = SelectQuery::for_entity(mapping).filter(by_id(id));
        let mut records = self.fetch::<E>(&query)?;
        Ok(records.pop())
    }

    pub fn exists<E: Entity>(&mut self, id: Uuid) -> Result<bool> {
        let mapping = self.registry.mapping::<E>()?;
        let query = SelectQuery::for_entity(mapping).filter(by_id(id));
        Ok(self.fetch_count(&query)? > 0)
    }

    /// Filtered, sorted and optionally paged scan.
    pub fn select<E: Entity>(
        &mut self,
        filter: &FieldFilter,
        sort: &SortSpec,
        page: Option<Page>,
    ) -> Result<Vec<E>> {
        let mapping = self.registry.mapping::<E>()?;
        let mut query = SelectQuery::for_entity(mapping)
            .matching(filter)?
            .sorted(sort)?;
        if let Some(page) = page {
            query = query.page(page);
        }
        self.fetch(&query)
    }

    pub fn count<E: Entity>(&mut self, filter: &FieldFilter) -> Result<u64> {
        let mapping = self.registry.mapping::<E>()?;
        let query = SelectQuery::for_entity(mapping).matching(filter)?;
        self.fetch_count(&query)
    }

    /// Inserts `entity`, or updates every column of the stored record with
    /// the same identity.
    pub fn save<E: Entity>(&mut self, entity: &E) -> Result<()> {
        let mapping = self.registry.mapping::<E>()?;
        let values = record_values(mapping, entity)?;
        let id = entity.id();

        if self.exists::<E>(id)? {
            if let Some((sql, params)) = UpdateQuery::table(mapping, id)
                .set(values)
                .build_sql(self.dialect)
            {
                self.execute(&sql, &params)?;
            }
        } else {
            let mut row = Vec::with_capacity(values.len() + 1);
            row.push(Value::from(id));
            row.extend(values);
            let (sql, params) = InsertQuery::into(mapping)
                .values(row)
                .build_sql(self.dialect);
            self.execute(&sql, &params)?;
        }

        Ok(())
    }

    /// Deletes the record with identity `id`; `false` if there was none.
    pub fn remove<E: Entity>(&mut self, id: Uuid) -> Result<bool> {
        let mapping = self.registry.mapping::<E>()?;
        let (sql, params) = DeleteQuery::from(mapping)
            .filter(by_id(id))
            .build_sql(self.dialect);
        Ok(self.execute(&sql, &params)? > 0)
    }

    pub(crate) fn fetch<E: Entity>(&mut self, query: &SelectQuery<'_>) -> Result<Vec<E>> {
        let (sql, params) = query.build_sql(self.dialect);
        let rows = self.query(&sql, &params)?;
        rows.iter().map(E::from_row).collect()
    }

    pub(crate) fn fetch_count(&mut self, query: &SelectQuery<'_>) -> Result<u64> {
        let (sql, params) = query.build_count_sql(self.dialect);
        let rows = self.query(&sql, &params)?;
        let count = match rows.first().and_then(|row| row.value(0)) {
            Some(Value::Integer(n)) => *n,
            other => {
                return Err(DbError::Decode {
                    column: "COUNT(*)".to_string(),
                    message: format!("expected integer, found {other:?}"),
                })
            }
        };
        u64::try_from(count).map_err(|e| DbError::Decode {
            column: "COUNT(*)".to_string(),
            message: e.to_string(),
        })
    }

    pub(crate) fn table_columns(&mut self, table: &str) -> Result<Vec<String>> {
        self.conn.table_columns(table)
    }

    pub(crate) fn registry(&self) -> &'f EntityRegistry {
        self.registry
    }

    pub(crate) fn begin(&mut self) -> Result<()> {
        self.log("BEGIN", &[]);
        self.conn.begin()?;
        self.in_transaction = true;
        Ok(())
    }

    pub(crate) fn commit(&mut self) -> Result<()> {
        self.log("COMMIT", &[]);
        self.conn.commit()?;
        self.in_transaction = false;
        Ok(())
    }

    pub(crate) fn rollback(&mut self) -> Result<()> {
        self.log("ROLLBACK", &[]);
        self.in_transaction = false;
        self.conn.rollback()
    }
}

impl Drop for Session<'_> {
    fn drop(&mut self) {
        if self.in_transaction {
            warn!("Session released with an open transaction, rolling back");
            if let Err(err) = self.rollback() {
                error!("Rollback on release failed: {err}");
            }
        }
    }
}

fn by_id(id: Uuid) -> impl Expression + 'static {
    Col::<Uuid>::new(ID_COLUMN).eq(id)
}

/// Column values of `entity`, encoded and checked against its mapping.
pub(crate) fn record_values<E: Entity>(mapping: &EntityMapping, entity: &E) -> Result<Vec<Value>> {
    let values = entity.values()?;
    if values.len() != mapping.columns().len() {
        return Err(DbError::Validation(format!(
            "{} produced {} values for {} columns",
            mapping.type_name(),
            values.len(),
            mapping.columns().len()
        )));
    }
    Ok(values)
}

impl SessionFactory {
    /// Runs `work` on a fresh session without a transaction. The session is
    /// released when this returns or unwinds.
    pub(crate) fn with_session<R>(
        &self,
        work: impl FnOnce(&mut Session<'_>) -> Result<R>,
    ) -> Result<R> {
        let mut session = self.open_session()?;
        work(&mut session)
    }

    /// Runs `work` inside a transaction.
    ///
    /// Commits if `work` succeeds. Otherwise, or if the commit itself fails,
    /// rolls back and returns [`DbError::Transaction`] wrapping the original
    /// error. A failed rollback is logged and never replaces that error.
    pub(crate) fn with_transaction<R>(
        &self,
        context: &'static str,
        work: impl FnOnce(&mut Session<'_>) -> Result<R>,
    ) -> Result<R> {
        let mut session = self.open_session()?;
        session
            .begin()
            .map_err(|err| DbError::transaction(context, err))?;

        let outcome = work(&mut session).and_then(|value| session.commit().map(|()| value));

        match outcome {
            Ok(value) => Ok(value),
            Err(err) => {
                error!("{context}: {err}");
                match session.rollback() {
                    Ok(()) => warn!("Transaction rolled back"),
                    Err(rollback_err) => error!("Rollback failed: {rollback_err}"),
                }
                Err(DbError::transaction(context, err))
            }
        }
    }
}
