//! The query builder.
//!
//! Statements are rendered against an [`EntityMapping`](crate::registry::EntityMapping)
//! for one [`Dialect`](crate::dialect::Dialect), producing SQL text plus the
//! bound parameter list. Only names known to the mapping ever reach the SQL
//! text; every value travels as a bound parameter.
//!
//! - [`SelectQuery`] renders `SELECT` and `SELECT COUNT(*)` with equality
//!   filters, ordering and an engine-applied window.
//! - [`InsertQuery`] renders `INSERT INTO` for a full record.
//! - [`UpdateQuery`] renders `UPDATE ... SET` keyed by identity.
//! - [`DeleteQuery`] renders `DELETE FROM` with filtering conditions.
//!
//! [`FieldFilter`], [`SortSpec`] and [`Page`] are the caller-facing shapes the
//! repository turns into a [`SelectQuery`].

pub mod clause;
pub mod delete;
pub mod filter;
pub mod insert;
pub mod select;
pub mod update;

pub use delete::DeleteQuery;
pub use filter::{FieldFilter, Page, SortDirection, SortSpec};
pub use insert::InsertQuery;
pub use select::SelectQuery;
pub use update::UpdateQuery;
