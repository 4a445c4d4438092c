//! Schema reconciliation: create missing tables, add missing columns, never
//! drop anything.

use tracing::info;

use crate::{
    dialect::Dialect,
    error::Result,
    registry::{ColumnDef, EntityMapping},
    session::Session,
    traits::ID_COLUMN,
    value::ColumnKind,
};

pub(crate) fn reconcile_schema(session: &mut Session<'_>) -> Result<()> {
    let registry = session.registry();
    let dialect = session.dialect();

    for mapping in registry.mappings() {
        let existing = session.table_columns(mapping.table())?;

        if existing.is_empty() {
            info!("Creating table '{}'", mapping.table());
            session.execute(&create_table_sql(mapping, dialect), &[])?;
            continue;
        }

        for column in mapping.columns() {
            if existing.iter().any(|c| c.eq_ignore_ascii_case(column.name)) {
                continue;
            }
            info!("Adding column '{}' to table '{}'", column.name, mapping.table());
            session.execute(&add_column_sql(mapping, column, dialect), &[])?;
        }
    }

    Ok(())
}

pub(crate) fn create_table_sql(mapping: &EntityMapping, dialect: Dialect) -> String {
    let mut columns = vec![format!(
        "{} {} NOT NULL PRIMARY KEY",
        dialect.quote(ID_COLUMN),
        dialect.column_type(ColumnKind::Uuid)
    )];

    columns.extend(mapping.columns().iter().map(|column| {
        let null = if column.nullable { "" } else { " NOT NULL" };
        format!(
            "{} {}{null}",
            dialect.quote(column.name),
            dialect.column_type(column.kind)
        )
    }));

    format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        dialect.quote(mapping.table()),
        columns.join(", ")
    )
}

/// Added columns are always nullable: rows written before the column existed
/// have no value for it.
pub(crate) fn add_column_sql(mapping: &EntityMapping, column: &ColumnDef, dialect: Dialect) -> String {
    format!(
        "ALTER TABLE {} ADD COLUMN {} {}",
        dialect.quote(mapping.table()),
        dialect.quote(column.name),
        dialect.column_type(column.kind)
    )
}
