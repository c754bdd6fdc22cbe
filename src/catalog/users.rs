//! User management and login.

use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use super::{require_text, QueryCatalog, Statement};
use crate::db::{QueryOutput, Value};
use crate::error::{GameSearchError, Result};
use crate::query::{count_rows, normalize};

/// Length of a stored password digest (hex-encoded SHA-256).
pub const PASSWORD_DIGEST_LEN: usize = 64;

/// Maximum rows returned by the user listing.
pub const USER_LIST_LIMIT: usize = 300;

const NO_SELECTION: &str = "Select a user row first.";

/// Hex-encoded SHA-256 digest of a password.
pub fn hash_password(password: &str) -> String {
    format!("{:x}", Sha256::digest(password.as_bytes()))
}

/// User fields as entered in the form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserForm {
    pub username: String,
    pub email: String,
    /// Plain-text password; blank on update keeps the stored digest.
    pub password: String,
    pub active: bool,
}

impl Default for UserForm {
    fn default() -> Self {
        Self {
            username: String::new(),
            email: String::new(),
            password: String::new(),
            active: true,
        }
    }
}

impl UserForm {
    fn normalized_email(&self) -> String {
        self.email.trim().to_lowercase()
    }
}

/// How a delete request was carried out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// The row was removed.
    Deleted,
    /// The hard delete failed and the row was flagged inactive instead.
    Deactivated,
}

/// Result of a login attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginOutcome {
    Granted { user_id: i64 },
    Denied,
}

impl QueryCatalog {
    /// Lists users, newest first. The password digest is never selected.
    pub async fn list_users(&self) -> Result<QueryOutput> {
        let u = &self.schema.users;
        let statement = Statement::new(
            format!(
                "SELECT {id} AS user_id, {username} AS username, {email} AS email, \
                 {active} AS is_active, {created} AS created_at, {updated} AS updated_at \
                 FROM {table} \
                 ORDER BY {id} DESC \
                 LIMIT {USER_LIST_LIMIT}",
                id = u.id,
                username = u.username,
                email = u.email,
                active = u.active,
                created = u.created,
                updated = u.updated,
                table = u.table,
            ),
            Vec::new(),
        );
        self.select(&statement).await
    }

    /// Inserts a user with a hashed password.
    ///
    /// The password is hashed exactly as typed, so surrounding whitespace is
    /// part of it and a whitespace-only password is accepted. `update_user`
    /// trims instead, because there a blank password means "keep the current one".
    pub async fn create_user(&self, form: &UserForm) -> Result<()> {
        let username = form.username.trim();
        let email = form.normalized_email();
        if username.is_empty() || email.is_empty() || form.password.is_empty() {
            return Err(GameSearchError::validation(
                "Username, email, and password are required.",
            ));
        }

        let u = &self.schema.users;
        let statement = Statement::new(
            format!(
                "INSERT INTO {} ({}, {}, {}) VALUES (%s, %s, %s)",
                u.table, u.username, u.email, u.password
            ),
            vec![
                Value::from(username),
                Value::from(email),
                Value::String(hash_password(&form.password)),
            ],
        );
        self.exec(&statement).await?;

        info!(username, "User created");
        self.audit_quietly(None, "create_user", username).await;
        Ok(())
    }

    /// Updates the selected user. A blank password keeps the stored digest.
    pub async fn update_user(&self, selected: Option<i64>, form: &UserForm) -> Result<()> {
        let user_id = selected.ok_or_else(|| GameSearchError::validation(NO_SELECTION))?;
        let username = form.username.trim();
        let email = form.normalized_email();
        if username.is_empty() || email.is_empty() {
            return Err(GameSearchError::validation(
                "Username and email are required.",
            ));
        }

        let u = &self.schema.users;
        let mut assignments = vec![format!("{}=%s", u.username), format!("{}=%s", u.email)];
        let mut params = vec![Value::from(username), Value::from(email)];

        let password = form.password.trim();
        if !password.is_empty() {
            assignments.push(format!("{}=%s", u.password));
            params.push(Value::String(hash_password(password)));
        }

        assignments.push(format!("{}=%s", u.active));
        params.push(Value::Int(i64::from(form.active)));
        params.push(Value::Int(user_id));

        let statement = Statement::new(
            format!(
                "UPDATE {} SET {} WHERE {}=%s",
                u.table,
                assignments.join(", "),
                u.id
            ),
            params,
        );
        self.exec(&statement).await?;

        info!(user_id, "User updated");
        self.audit_quietly(Some(user_id), "update_user", username)
            .await;
        Ok(())
    }

    /// Deletes the selected user, falling back to deactivation when the row
    /// cannot be removed (for example because other rows reference it).
    ///
    /// When the fallback fails too, the error of the hard delete is returned.
    pub async fn delete_user(&self, selected: Option<i64>, confirmed: bool) -> Result<DeleteOutcome> {
        let user_id = selected.ok_or_else(|| GameSearchError::validation(NO_SELECTION))?;
        if !confirmed {
            return Err(GameSearchError::validation(format!(
                "Confirm deletion of user_id={user_id}."
            )));
        }

        let u = &self.schema.users;
        let hard = Statement::new(
            format!("DELETE FROM {} WHERE {}=%s", u.table, u.id),
            vec![Value::Int(user_id)],
        );

        let outcome = match self.exec(&hard).await {
            Ok(_) => DeleteOutcome::Deleted,
            Err(delete_error) => {
                warn!(user_id, "Hard delete failed ({}); deactivating instead", delete_error);
                let soft = Statement::new(
                    format!("UPDATE {} SET {}=0 WHERE {}=%s", u.table, u.active, u.id),
                    vec![Value::Int(user_id)],
                );
                if let Err(e) = self.exec(&soft).await {
                    debug!(user_id, "Deactivation failed as well: {}", e);
                    return Err(delete_error);
                }
                DeleteOutcome::Deactivated
            }
        };

        // A removed row can no longer be referenced by the audit entry.
        let (audit_user, action) = match outcome {
            DeleteOutcome::Deleted => (None, "delete_user"),
            DeleteOutcome::Deactivated => (Some(user_id), "deactivate_user"),
        };
        self.audit_quietly(audit_user, action, &user_id.to_string())
            .await;
        Ok(outcome)
    }

    /// Checks a username and password against the stored digest.
    ///
    /// Unknown users, wrong passwords and inactive accounts are all `Denied`.
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<LoginOutcome> {
        let username = require_text(username, "Username")?;
        if password.is_empty() {
            return Err(GameSearchError::validation("Password is required."));
        }

        let u = &self.schema.users;
        let statement = Statement::new(
            format!(
                "SELECT {} AS user_id, {} AS password_hash, {} AS is_active \
                 FROM {} WHERE {}=%s LIMIT 1",
                u.id, u.password, u.active, u.table, u.username
            ),
            vec![Value::from(username)],
        );
        let output = self.select(&statement).await?;

        if count_rows(&output) == 0 {
            debug!(username, "Login refused: unknown user");
            return Ok(LoginOutcome::Denied);
        }

        let table = normalize(&output);
        let Some(row) = table.rows.first() else {
            return Ok(LoginOutcome::Denied);
        };
        let cell = |i: usize| row.get(i).cloned().unwrap_or(Value::Null);

        let stored = cell(1);
        let digest_matches = stored
            .as_str()
            .is_some_and(|d| d.eq_ignore_ascii_case(&hash_password(password)));
        if !digest_matches {
            debug!(username, "Login refused: password mismatch");
            return Ok(LoginOutcome::Denied);
        }

        if !is_truthy(&cell(2)) {
            debug!(username, "Login refused: account inactive");
            return Ok(LoginOutcome::Denied);
        }

        let user_id = int_value(&cell(0)).ok_or_else(|| {
            GameSearchError::internal(format!("User '{username}' has a non-integer id"))
        })?;

        info!(user_id, "Login granted");
        self.audit_quietly(Some(user_id), "login", username).await;
        Ok(LoginOutcome::Granted { user_id })
    }
}

fn int_value(value: &Value) -> Option<i64> {
    match value {
        Value::String(s) => s.trim().parse().ok(),
        other => other.as_int(),
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Float(f) => *f != 0.0,
        Value::String(s) => matches!(s.trim().to_lowercase().as_str(), "1" | "true" | "yes"),
        other => other.as_int().is_some_and(|i| i != 0),
    }
}
