//! gamesearch - search and manage a video-game sales database.

use std::io::Read;
use std::sync::Arc;

use gamesearch::catalog::{
    parse_row_bound, DbCheck, DeleteOutcome, LoginOutcome, QueryCatalog,
};
use gamesearch::cli::{Cli, Command, UsersCommand};
use gamesearch::config::Config;
use gamesearch::db::{QueryOutput, SqlStore, Value};
use gamesearch::error::{GameSearchError, Result};
use gamesearch::logging;
use gamesearch::query::{count_rows, normalize, QueryAdapter, Table};
use gamesearch::render::{render, status_line};
use tracing::{debug, error, info};

#[tokio::main]
async fn main() {
    // A missing .env file is fine.
    let _ = dotenvy::dotenv();
    logging::init_stderr_logging();

    if let Err(e) = run().await {
        error!("{}: {}", e.category(), e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse_args();

    let config_path = cli.config_path();
    debug!("Loading config from: {}", config_path.display());
    let config = Config::load_from_file(&config_path)?;

    let database = cli.resolve_database(&config.database)?;
    let store = SqlStore::new(&database)?;
    info!(backend = store.backend().as_str(), "Database: {}", store.display_string());

    let catalog = QueryCatalog::new(QueryAdapter::new(Arc::new(store)), config.schema);
    debug!("Query function binding: {}", catalog.adapter().binding().call_shape());

    let output = dispatch(&catalog, &cli.command).await?;

    let row_count = count_rows(&output);
    let table = normalize(&output);
    println!("{}", render(&table, row_count, cli.format));
    eprintln!("{}", status_line(row_count));
    Ok(())
}

async fn dispatch(catalog: &QueryCatalog, command: &Command) -> Result<QueryOutput> {
    match command {
        Command::Search(args) => catalog.search_games(&args.to_filter()).await,
        Command::Users(users) => dispatch_users(catalog, users).await,
        Command::Top { limit } => {
            let limit = parse_row_bound(limit)?;
            catalog.top_games_by_sales(limit).await
        }
        Command::Ratings => catalog.average_sales_by_rating().await,
        Command::Rating { rating, min_sales } => catalog.games_by_rating(rating, min_sales).await,
        Command::Lookup { term } => catalog.lookup_titles(term).await,
        Command::Console { sql } => {
            let text = if sql == "-" { read_stdin()? } else { sql.clone() };
            catalog.run_console(&text).await
        }
        Command::Login { username, password } => {
            let password = match password {
                Some(password) => password.clone(),
                None => read_password()?,
            };
            match catalog.authenticate(username, &password).await? {
                LoginOutcome::Granted { user_id } => {
                    Ok(Table::info(format!("Login granted (user_id={user_id}).")).into())
                }
                LoginOutcome::Denied => Err(GameSearchError::validation(
                    "Invalid username or password.",
                )),
            }
        }
        Command::Check => Ok(check_table(&catalog.db_check().await?).into()),
    }
}

async fn dispatch_users(catalog: &QueryCatalog, command: &UsersCommand) -> Result<QueryOutput> {
    match command {
        UsersCommand::List => catalog.list_users().await,
        UsersCommand::Create(fields) => {
            catalog.create_user(&fields.to_form()).await?;
            Ok(Table::info("User created.").into())
        }
        UsersCommand::Update { id, fields } => {
            catalog.update_user(*id, &fields.to_form()).await?;
            Ok(Table::info("User updated.").into())
        }
        UsersCommand::Delete { id, yes } => {
            let message = match catalog.delete_user(*id, *yes).await? {
                DeleteOutcome::Deleted => "User deleted.",
                DeleteOutcome::Deactivated => "User deactivated (FK prevented hard delete).",
            };
            Ok(Table::info(message).into())
        }
    }
}

fn check_table(check: &DbCheck) -> Table {
    let count = |v: &Option<Value>| v.clone().unwrap_or(Value::Null);
    Table {
        columns: vec!["check".to_string(), "value".to_string()],
        rows: vec![
            vec![Value::from("app users"), count(&check.user_rows)],
            vec![Value::from("games"), count(&check.game_rows)],
            vec![Value::from("accepts fetch"), Value::Bool(check.supports_fetch)],
            vec![Value::from("accepts commit"), Value::Bool(check.supports_commit)],
        ],
    }
}

fn read_stdin() -> Result<String> {
    let mut text = String::new();
    std::io::stdin()
        .read_to_string(&mut text)
        .map_err(|e| GameSearchError::internal(format!("Failed to read stdin: {e}")))?;
    Ok(text)
}

fn read_password() -> Result<String> {
    eprint!("Password: ");
    let mut line = String::new();
    std::io::stdin()
        .read_line(&mut line)
        .map_err(|e| GameSearchError::internal(format!("Failed to read password: {e}")))?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}
