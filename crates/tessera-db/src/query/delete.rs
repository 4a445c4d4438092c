use crate::{
    dialect::Dialect, query::clause::Bindings, registry::EntityMapping, traits::Expression,
    value::Value,
};

/// A DELETE over one mapped table.
pub struct DeleteQuery<'m> {
    mapping: &'m EntityMapping,
    wheres: Vec<Box<dyn Expression>>,
}

impl<'m> DeleteQuery<'m> {
    pub fn from(mapping: &'m EntityMapping) -> Self {
        Self {
            mapping,
            wheres: Vec::new(),
        }
    }

    /// Applies the WHERE condition.
    pub fn filter<E: Expression + 'static>(mut self, expr: E) -> Self {
        self.wheres.push(Box::new(expr));
        self
    }

    pub fn build_sql(&self, dialect: Dialect) -> (String, Vec<Value>) {
        let mut out = Bindings::new(dialect);
        let mut sql = format!("DELETE FROM {}", out.ident(self.mapping.table()));

        if !self.wheres.is_empty() {
            let conditions: Vec<String> = self.wheres.iter().map(|w| w.to_sql(&mut out)).collect();
            sql.push_str(" WHERE ");
            sql.push_str(&conditions.join(" AND "));
        }

        (sql, out.into_params())
    }
}
