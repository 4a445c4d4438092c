//! SQL expression operators.
//!
//! Each implements [`Expression`] and recursively builds SQL fragments.

use crate::{query::clause::Bindings, traits::Expression, value::Value};

/// An equality comparison between an expression and a bound value.
pub struct EqOp<L> {
    left: L,
    right: Value,
}

impl<L> EqOp<L> {
    pub fn new(left: L, right: Value) -> Self {
        Self { left, right }
    }
}

impl<L: Expression> Expression for EqOp<L> {
    fn to_sql(&self, out: &mut Bindings) -> String {
        let left_sql = self.left.to_sql(out);
        if self.right.is_null() {
            // `x = NULL` never matches; compare the way the caller meant it.
            return format!("{left_sql} IS NULL");
        }
        let placeholder = out.bind(self.right.clone());
        format!("{left_sql} = {placeholder}")
    }
}
