//! Audit log entries for user changes.

use tracing::debug;

use super::{QueryCatalog, Statement};
use crate::db::Value;
use crate::error::Result;

impl QueryCatalog {
    /// Appends an audit entry.
    ///
    /// Callers treat this as best effort: they log a failure at `debug` and
    /// carry on with the primary operation.
    pub async fn record_audit(
        &self,
        user_id: Option<i64>,
        action: &str,
        detail: &str,
    ) -> Result<()> {
        let audit = &self.schema.audit;
        let statement = Statement::new(
            format!(
                "INSERT INTO {} ({}, {}, {}) VALUES (%s, %s, %s)",
                audit.table, audit.user_id, audit.action, audit.detail
            ),
            vec![
                user_id.map(Value::Int).unwrap_or(Value::Null),
                Value::from(action),
                Value::from(detail),
            ],
        );
        self.exec(&statement).await?;
        Ok(())
    }

    /// Records an audit entry, logging instead of returning a failure.
    pub(crate) async fn audit_quietly(&self, user_id: Option<i64>, action: &str, detail: &str) {
        if let Err(e) = self.record_audit(user_id, action, detail).await {
            debug!(action, "Audit entry not written: {}", e);
        }
    }
}
