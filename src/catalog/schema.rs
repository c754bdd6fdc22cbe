//! Table and column names used by the catalog.
//!
//! Defaults match the seeded dataset; every name can be overridden in the
//! `[schema]` section of the config file.

use serde::{Deserialize, Serialize};

use crate::error::{GameSearchError, Result};

/// All table and column names the catalog interpolates into statements.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaMap {
    pub games: GamesTable,
    pub users: UsersTable,
    pub analytics: AnalyticsTables,
    pub audit: AuditTable,
}

/// The searchable games relation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GamesTable {
    pub table: String,
    pub id: String,
    pub title: String,
    pub platform: String,
    pub genre: String,
    pub publisher: String,
    pub developer: String,
    pub release_year: String,
    pub source: String,
}

impl Default for GamesTable {
    fn default() -> Self {
        Self {
            table: "bg_sales_game".to_string(),
            id: "sales_game_id".to_string(),
            title: "title".to_string(),
            platform: "platform".to_string(),
            genre: "genre".to_string(),
            publisher: "publisher".to_string(),
            developer: "developer".to_string(),
            release_year: "release_year".to_string(),
            source: "source".to_string(),
        }
    }
}

/// The application user relation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UsersTable {
    pub table: String,
    pub id: String,
    pub username: String,
    pub email: String,
    pub password: String,
    pub active: String,
    pub created: String,
    pub updated: String,
}

impl Default for UsersTable {
    fn default() -> Self {
        Self {
            table: "app_user".to_string(),
            id: "user_id".to_string(),
            username: "username".to_string(),
            email: "email".to_string(),
            password: "password_hash".to_string(),
            active: "is_active".to_string(),
            created: "created_at".to_string(),
            updated: "updated_at".to_string(),
        }
    }
}

/// Sales-record and ESRB relations joined for the analytics queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsTables {
    pub sales_table: String,
    pub sales_game_id: String,
    pub region: String,
    pub sales_millions: String,
    pub esrb_table: String,
    pub esrb_title: String,
    pub esrb_rating: String,
}

impl Default for AnalyticsTables {
    fn default() -> Self {
        Self {
            sales_table: "bg_sales_record".to_string(),
            sales_game_id: "sales_game_id".to_string(),
            region: "region".to_string(),
            sales_millions: "sales_millions".to_string(),
            esrb_table: "bg_esrb_game".to_string(),
            esrb_title: "title".to_string(),
            esrb_rating: "esrb".to_string(),
        }
    }
}

/// The audit log relation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditTable {
    pub table: String,
    pub user_id: String,
    pub action: String,
    pub detail: String,
}

impl Default for AuditTable {
    fn default() -> Self {
        Self {
            table: "app_audit_log".to_string(),
            user_id: "user_id".to_string(),
            action: "action".to_string(),
            detail: "detail".to_string(),
        }
    }
}

impl SchemaMap {
    /// Checks every name is a plain SQL identifier.
    pub fn validate(&self) -> Result<()> {
        let g = &self.games;
        let u = &self.users;
        let a = &self.analytics;
        let log = &self.audit;

        let identifiers = [
            ("schema.games.table", &g.table),
            ("schema.games.id", &g.id),
            ("schema.games.title", &g.title),
            ("schema.games.platform", &g.platform),
            ("schema.games.genre", &g.genre),
            ("schema.games.publisher", &g.publisher),
            ("schema.games.developer", &g.developer),
            ("schema.games.release_year", &g.release_year),
            ("schema.games.source", &g.source),
            ("schema.users.table", &u.table),
            ("schema.users.id", &u.id),
            ("schema.users.username", &u.username),
            ("schema.users.email", &u.email),
            ("schema.users.password", &u.password),
            ("schema.users.active", &u.active),
            ("schema.users.created", &u.created),
            ("schema.users.updated", &u.updated),
            ("schema.analytics.sales_table", &a.sales_table),
            ("schema.analytics.sales_game_id", &a.sales_game_id),
            ("schema.analytics.region", &a.region),
            ("schema.analytics.sales_millions", &a.sales_millions),
            ("schema.analytics.esrb_table", &a.esrb_table),
            ("schema.analytics.esrb_title", &a.esrb_title),
            ("schema.analytics.esrb_rating", &a.esrb_rating),
            ("schema.audit.table", &log.table),
            ("schema.audit.user_id", &log.user_id),
            ("schema.audit.action", &log.action),
            ("schema.audit.detail", &log.detail),
        ];

        for (key, name) in identifiers {
            if !is_identifier(name) {
                return Err(GameSearchError::config(format!(
                    "{key} = '{name}' is not a valid SQL identifier"
                )));
            }
        }
        Ok(())
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}
