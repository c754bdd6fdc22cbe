//! Seeded SQLite database shared by the integration tests.

use gamesearch::catalog::{QueryCatalog, SchemaMap};
use gamesearch::config::DatabaseConfig;
use gamesearch::db::{QueryOutput, SqlStore, Value};
use gamesearch::query::{normalize, QueryAdapter};
use std::sync::Arc;
use tempfile::TempDir;

const SCHEMA: &[&str] = &[
    "CREATE TABLE bg_sales_game (
        sales_game_id INTEGER PRIMARY KEY,
        title TEXT NOT NULL,
        platform TEXT,
        genre TEXT,
        publisher TEXT,
        developer TEXT,
        release_year INTEGER,
        source TEXT
    )",
    "CREATE TABLE bg_sales_record (
        sales_id INTEGER PRIMARY KEY,
        sales_game_id INTEGER NOT NULL REFERENCES bg_sales_game(sales_game_id),
        region TEXT NOT NULL,
        sales_millions REAL,
        source TEXT
    )",
    "CREATE TABLE bg_esrb_game (
        esrb_game_id INTEGER PRIMARY KEY,
        title TEXT NOT NULL,
        esrb TEXT,
        developer TEXT,
        publisher TEXT
    )",
    "CREATE TABLE app_user (
        user_id INTEGER PRIMARY KEY AUTOINCREMENT,
        username TEXT NOT NULL UNIQUE,
        email TEXT NOT NULL,
        password_hash TEXT NOT NULL,
        is_active INTEGER NOT NULL DEFAULT 1,
        created_at TEXT DEFAULT CURRENT_TIMESTAMP,
        updated_at TEXT DEFAULT CURRENT_TIMESTAMP
    )",
    "CREATE TABLE app_audit_log (
        audit_id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER REFERENCES app_user(user_id),
        action TEXT NOT NULL,
        detail TEXT,
        created_at TEXT DEFAULT CURRENT_TIMESTAMP
    )",
];

/// (id, title, platform, genre, publisher, developer, year)
const GAMES: &[(i64, &str, &str, &str, &str, &str, i64)] = &[
    (1, "Wii Sports", "Wii", "Sports", "Nintendo", "Nintendo EAD", 2006),
    (2, "Mario Kart Wii", "Wii", "Racing", "Nintendo", "Nintendo EAD", 2008),
    (3, "Super Mario Bros.", "NES", "Platform", "Nintendo", "Nintendo", 1985),
    (4, "Halo 3", "X360", "Shooter", "Microsoft", "Bungie", 2007),
    (5, "Grand Theft Auto V", "PS3", "Action", "Take-Two", "Rockstar North", 2013),
];

/// (game id, region, millions)
const SALES: &[(i64, &str, f64)] = &[
    (1, "global_sales", 82.74),
    (1, "na_sales", 41.49),
    (2, "global_sales", 35.82),
    (3, "Global", 40.24),
    (4, "global_sales", 12.12),
    (5, "global_sales", 21.40),
];

/// (title, rating)
const RATINGS: &[(&str, &str)] = &[
    ("Wii Sports", "E"),
    ("Mario Kart Wii", "E"),
    ("Halo 3", "M"),
    ("Grand Theft Auto V", "M"),
];

/// A seeded database living as long as the fixture.
pub struct Fixture {
    _dir: TempDir,
    pub config: DatabaseConfig,
    pub catalog: QueryCatalog,
}

impl Fixture {
    pub async fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("games.db").display());
        let config = DatabaseConfig::from_connection_string(&url).unwrap();
        let store = SqlStore::new(&config).unwrap();
        let catalog = QueryCatalog::new(QueryAdapter::new(Arc::new(store)), SchemaMap::default());

        let adapter = catalog.adapter();
        for ddl in SCHEMA {
            adapter.exec(ddl, &[]).await.unwrap();
        }

        for &(id, title, platform, genre, publisher, developer, year) in GAMES {
            adapter
                .exec(
                    "INSERT INTO bg_sales_game \
                     (sales_game_id, title, platform, genre, publisher, developer, release_year, source) \
                     VALUES (%s, %s, %s, %s, %s, %s, %s, 'vgchartz')",
                    &[
                        Value::Int(id),
                        Value::from(title),
                        Value::from(platform),
                        Value::from(genre),
                        Value::from(publisher),
                        Value::from(developer),
                        Value::Int(year),
                    ],
                )
                .await
                .unwrap();
        }

        for &(game_id, region, millions) in SALES {
            adapter
                .exec(
                    "INSERT INTO bg_sales_record (sales_game_id, region, sales_millions) \
                     VALUES (?, ?, ?)",
                    &[Value::Int(game_id), Value::from(region), Value::Float(millions)],
                )
                .await
                .unwrap();
        }

        for &(title, rating) in RATINGS {
            adapter
                .exec(
                    "INSERT INTO bg_esrb_game (title, esrb) VALUES (?, ?)",
                    &[Value::from(title), Value::from(rating)],
                )
                .await
                .unwrap();
        }

        Self {
            _dir: dir,
            config,
            catalog,
        }
    }
}

/// The values of one column, by name, after normalization.
pub fn column(output: &QueryOutput, name: &str) -> Vec<Value> {
    let table = normalize(output);
    let index = table
        .columns
        .iter()
        .position(|c| c == name)
        .unwrap_or_else(|| panic!("no column {name} in {:?}", table.columns));
    table.rows.iter().map(|row| row[index].clone()).collect()
}

/// Text values of one column.
pub fn texts(output: &QueryOutput, name: &str) -> Vec<String> {
    column(output, name)
        .iter()
        .map(|v| v.to_display_string())
        .collect()
}
