use crate::{
    dialect::Dialect,
    expr::Col,
    query::clause::Bindings,
    registry::EntityMapping,
    traits::{Expression, ID_COLUMN},
    value::Value,
};

/// An UPDATE of every non-identity column of the record with a given identity.
pub struct UpdateQuery<'m> {
    mapping: &'m EntityMapping,
    id: Value,
    values: Vec<Value>,
}

impl<'m> UpdateQuery<'m> {
    pub fn table(mapping: &'m EntityMapping, id: impl Into<Value>) -> Self {
        Self {
            mapping,
            id: id.into(),
            values: Vec::new(),
        }
    }

    /// Sets the new values, in [`EntityMapping::columns`] order.
    pub fn set(mut self, values: Vec<Value>) -> Self {
        self.values = values;
        self
    }

    /// Returns `None` when the entity has no columns besides its identity,
    /// since there is nothing to update.
    pub fn build_sql(&self, dialect: Dialect) -> Option<(String, Vec<Value>)> {
        if self.mapping.columns().is_empty() {
            return None;
        }

        let mut out = Bindings::new(dialect);
        let assignments: Vec<String> = self
            .mapping
            .columns()
            .iter()
            .zip(&self.values)
            .map(|(column, value)| {
                let placeholder = out.bind(value.clone());
                format!("{} = {}", out.ident(column.name), placeholder)
            })
            .collect();

        let condition = Col::<Value>::new(ID_COLUMN)
            .eq(self.id.clone())
            .to_sql(&mut out);

        let sql = format!(
            "UPDATE {} SET {} WHERE {}",
            out.ident(self.mapping.table()),
            assignments.join(", "),
            condition
        );

        Some((sql, out.into_params()))
    }
}
