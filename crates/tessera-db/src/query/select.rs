//! SELECT and COUNT rendering for one entity table.

use crate::{
    dialect::Dialect,
    error::{DbError, Result},
    expr::Col,
    query::{
        clause::{Bindings, OrderClause},
        filter::{FieldFilter, Page, SortDirection, SortSpec},
    },
    registry::EntityMapping,
    traits::Expression,
    value::Value,
};

/// A SELECT over one mapped table.
///
/// Constructed via [`SelectQuery::for_entity`], then shaped with
/// [`matching`](SelectQuery::matching), [`sorted`](SelectQuery::sorted) and
/// [`page`](SelectQuery::page). Rendering never touches a connection; a
/// [`Session`](crate::Session) executes the result.
///
/// # Example
///
/// ```rust
/// use tessera_db::{
///     define_entity, dialect::Dialect, query::SelectQuery, EntityRegistry, FieldFilter, Page,
///     SortSpec,
/// };
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
/// let registry = EntityRegistry::builder().register::<Member>().build().unwrap();
/// let mapping = registry.mapping::<Member>().unwrap();
///
/// let (sql, params) = SelectQuery::for_entity(mapping)
///     .matching(&FieldFilter::new().eq(members::GROUP, "a".to_string()))
///     .unwrap()
///     .sorted(&SortSpec::new().asc(members::NAME))
///     .unwrap()
///     .page(Page::new(10, 5).unwrap())
///     .build_sql(Dialect::PostgreSql);
///
/// assert_eq!(
///     sql,
///     "SELECT \"id\", \"name\", \"group\" FROM \"members\" WHERE \"group\" = $1 \
///      ORDER BY \"name\" ASC LIMIT 5 OFFSET 10"
/// );
/// assert_eq!(params.len(), 1);
/// ```
pub struct SelectQuery<'m> {
    mapping: &'m EntityMapping,
    wheres: Vec<Box<dyn Expression>>,
    orders: Vec<OrderClause>,
    limit: Option<i64>,
    offset: Option<i64>,
}

impl<'m> SelectQuery<'m> {
    pub fn for_entity(mapping: &'m EntityMapping) -> Self {
        Self {
            mapping,
            wheres: Vec::new(),
            orders: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    /// Adds one equality condition per filter entry.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Validation`] if a field is not a column of the
    /// entity, or if a filter value could not be encoded.
    pub fn matching(mut self, filter: &FieldFilter) -> Result<Self> {
        if let Some(message) = filter.rejected() {
            return Err(DbError::Validation(message.to_string()));
        }
        for (field, value) in filter.iter() {
            let column = self.resolve(field)?;
            self.wheres
                .push(Box::new(Col::<Value>::new(column).eq(value.clone())));
        }
        Ok(self)
    }

    /// Appends one ORDER BY key per sort entry, in order.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Validation`] if a field is not a column of the
    /// entity.
    pub fn sorted(mut self, sort: &SortSpec) -> Result<Self> {
        for (field, direction) in sort.iter() {
            let column = self.resolve(field)?;
            self.orders.push(OrderClause { column, direction });
        }
        Ok(self)
    }

    /// Applies the WHERE condition.
    pub fn filter<E: Expression + 'static>(mut self, expr: E) -> Self {
        self.wheres.push(Box::new(expr));
        self
    }

    /// Adds an ORDER BY clause.
    pub fn order_by<T>(mut self, col: Col<T>, direction: SortDirection) -> Self {
        self.orders.push(OrderClause {
            column: col.name,
            direction,
        });
        self
    }

    pub fn page(mut self, page: Page) -> Self {
        self.limit = Some(page.limit());
        self.offset = Some(page.offset());
        self
    }

    pub fn mapping(&self) -> &'m EntityMapping {
        self.mapping
    }

    fn resolve(&self, field: &str) -> Result<&'static str> {
        self.mapping.column(field).ok_or_else(|| {
            DbError::Validation(format!(
                "Unknown field '{}' for entity {}",
                field,
                self.mapping.type_name()
            ))
        })
    }

    fn push_where(&self, sql: &mut String, out: &mut Bindings) {
        if self.wheres.is_empty() {
            return;
        }
        let conditions: Vec<String> = self.wheres.iter().map(|w| w.to_sql(out)).collect();
        sql.push_str(" WHERE ");
        sql.push_str(&conditions.join(" AND "));
    }

    pub fn build_sql(&self, dialect: Dialect) -> (String, Vec<Value>) {
        let mut out = Bindings::new(dialect);

        let columns: Vec<String> = self.mapping.column_names().map(|c| out.ident(c)).collect();
        let mut sql = format!(
            "SELECT {} FROM {}",
            columns.join(", "),
            out.ident(self.mapping.table())
        );

        self.push_where(&mut sql, &mut out);

        if !self.orders.is_empty() {
            let orders: Vec<String> = self.orders.iter().map(|o| o.to_sql(&out)).collect();
            sql.push_str(" ORDER BY ");
            sql.push_str(&orders.join(", "));
        }

        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }

        if let Some(offset) = self.offset {
            sql.push_str(&format!(" OFFSET {offset}"));
        }

        (sql, out.into_params())
    }

    /// Renders `SELECT COUNT(*)` with the same conditions; order and window
    /// are ignored.
    pub fn build_count_sql(&self, dialect: Dialect) -> (String, Vec<Value>) {
        let mut out = Bindings::new(dialect);
        let mut sql = format!("SELECT COUNT(*) FROM {}", out.ident(self.mapping.table()));
        self.push_where(&mut sql, &mut out);
        (sql, out.into_params())
    }
}
