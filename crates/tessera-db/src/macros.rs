//! Macros for defining entities.
//!
//! The [`define_entity!`] macro generates an entity struct, its [`Entity`]
//! implementation and a module of typed column constants, tying database
//! column names to Rust types.
//!
//! [`Entity`]: crate::Entity

/// Defines a persisted record type.
///
/// # Syntax
///
/// ```ignore
/// define_entity!(
///     pub struct Member in members {
///         table: "members",
///         columns: {
///             NAME => name: String,
///             NICKNAME => nickname: Option<String>
///         }
///     }
/// );
/// ```
///
/// This expands to:
///
/// - `pub struct Member` with a private identity and one public field per
///   column, plus `Member::new(name, nickname)` which assigns a fresh UUID
///   and `Member::id()`
/// - `impl Entity for Member`
/// - `pub mod members` holding `TABLE`, `ID` and one `Col<T>` constant per
///   column, for use in [`FieldFilter`](crate::FieldFilter) and
///   [`SortSpec`](crate::SortSpec)
///
/// Column names are the field names. Field types must implement
/// [`SqlType`](crate::SqlType); the column module resolves them through
/// `use super::*`, so define entities at module level.
///
/// # Usage
///
/// ```rust
/// use tessera_db::{define_entity, Entity, FieldFilter, Json};
///
/// define_entity!(
///     /// A guild and the roles it grants.
///     pub struct Guild in guilds {
///         table: "guilds",
///         columns: {
///             NAME => name: String,
///             ROLES => roles: Json<Vec<String>>
///         }
///     }
/// );
///
/// fn main() {
///     let guild = Guild::new("zig".into(), Json(vec!["admin".into()]));
///     assert_eq!(Guild::TABLE, "guilds");
///     assert_eq!(guilds::ROLES.name, "roles");
///     assert_eq!(guild.values().unwrap().len(), 2);
///     assert!(!guild.id().is_nil());
///
///     let filter = FieldFilter::new().eq(guilds::NAME, "zig".to_string());
///     assert_eq!(filter.len(), 1);
/// }
/// ```
#[macro_export]
macro_rules! define_entity {
    (
        $(#[$meta:meta])*
        $vis:vis struct $entity:ident in $module:ident {
            table: $table:literal,
            columns: {
                $($konst:ident => $field:ident: $ty:ty),* $(,)?
            }
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq)]
        $vis struct $entity {
            id: $crate::uuid::Uuid,
            $(pub $field: $ty,)*
        }

        impl $entity {
            /// Creates a record with a fresh identity.
            #[allow(clippy::too_many_arguments, clippy::new_without_default)]
            pub fn new($($field: $ty),*) -> Self {
                Self {
                    id: $crate::uuid::Uuid::new_v4(),
                    $($field,)*
                }
            }

            pub fn id(&self) -> $crate::uuid::Uuid {
                self.id
            }
        }

        impl $crate::Entity for $entity {
            const TABLE: &'static str = $table;
            const COLUMNS: &'static [$crate::ColumnDef] = &[
                $($crate::ColumnDef::of::<$ty>(stringify!($field)),)*
            ];

            fn id(&self) -> $crate::uuid::Uuid {
                self.id
            }

            fn values(&self) -> $crate::Result<::std::vec::Vec<$crate::Value>> {
                Ok(::std::vec![$(
                    $crate::SqlType::to_value(&self.$field).map_err(|message| {
                        $crate::DbError::Validation(::std::format!(
                            "Cannot encode field '{}' of {}: {}",
                            stringify!($field),
                            stringify!($entity),
                            message
                        ))
                    })?
                ),*])
            }

            fn from_row(row: &$crate::Row) -> $crate::Result<Self> {
                Ok(Self {
                    id: row.get($crate::ID_COLUMN)?,
                    $($field: row.get(stringify!($field))?,)*
                })
            }
        }

        $vis mod $module {
            #[allow(unused_imports)]
            use super::*;

            pub const TABLE: &str = $table;
            pub const ID: $crate::expr::Col<$crate::uuid::Uuid> =
                $crate::expr::Col::new($crate::ID_COLUMN);
            $(
                pub const $konst: $crate::expr::Col<$ty> = $crate::expr::Col::new(stringify!($field));
            )*
        }
    };
}

#[cfg(test)]
mod tests {
    use crate::{
        test_support::{members, Member},
        value::{Row, Value},
        Entity,
    };

    #[test]
    fn test_generated_mapping() {
        assert_eq!(Member::TABLE, "members");
        assert_eq!(members::TABLE, "members");
        assert_eq!(members::ID.name, "id");
        assert_eq!(members::NICKNAME.name, "nickname");

        let names: Vec<_> = Member::COLUMNS.iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["name", "group", "score", "nickname"]);
        assert!(!Member::COLUMNS[0].nullable);
        assert!(Member::COLUMNS[3].nullable);
    }

    #[test]
    fn test_new_assigns_distinct_identities() {
        let a = Member::new("ana".into(), "a".into(), 1, None);
        let b = Member::new("ana".into(), "a".into(), 1, None);
        assert_ne!(a.id(), b.id());
        assert!(!a.is_same_record(&b));

        let mut renamed = a.clone();
        renamed.name = "bea".into();
        assert!(a.is_same_record(&renamed));
    }

    #[test]
    fn test_from_row_reads_identity_and_fields() {
        let member = Member::new("ana".into(), "a".into(), 4, Some("an".into()));

        let mut values = vec![Value::from(member.id())];
        values.extend(member.values().unwrap());
        let row = Row::new(
            ["id", "name", "group", "score", "nickname"]
                .iter()
                .map(|c| c.to_string())
                .collect(),
            values,
        );

        assert_eq!(Member::from_row(&row).unwrap(), member);
    }
}
