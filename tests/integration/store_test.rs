//! Adapter and store behaviour against a real SQLite file.

use super::fixture::Fixture;
use gamesearch::config::DatabaseConfig;
use gamesearch::db::{QueryFn, QueryOutput, SqlStore, Value};
use gamesearch::error::GameSearchError;
use gamesearch::query::{count_rows, normalize, CallShape, CallingConvention, QueryAdapter};
use pretty_assertions::assert_eq;
use std::sync::Arc;

#[tokio::test]
async fn test_store_binding_is_keyword_fetch() {
    let fixture = Fixture::new().await;
    assert_eq!(
        fixture.catalog.adapter().binding().call_shape(),
        CallShape::Keyword {
            fetch: true,
            commit: false
        }
    );
}

#[tokio::test]
async fn test_percent_placeholders_are_retried_as_question_marks() {
    let fixture = Fixture::new().await;
    let output = fixture
        .catalog
        .adapter()
        .select(
            "SELECT title FROM bg_sales_game WHERE platform = %s AND release_year = %s",
            &[Value::from("X360"), Value::Int(2007)],
        )
        .await
        .unwrap();

    assert_eq!(output.first_value(), Some(&Value::from("Halo 3")));
}

#[tokio::test]
async fn test_exec_returns_null_and_select_of_nothing_is_empty() {
    let fixture = Fixture::new().await;
    let adapter = fixture.catalog.adapter();

    let written = adapter
        .exec(
            "UPDATE bg_sales_game SET source = %s WHERE sales_game_id = %s",
            &[Value::from("manual"), Value::Int(4)],
        )
        .await
        .unwrap();
    assert!(written.is_null());

    let empty = adapter
        .select("SELECT title FROM bg_sales_game WHERE 1 = 0", &[])
        .await
        .unwrap();
    assert!(empty.is_empty_sequence());
    assert_eq!(count_rows(&empty), 0);
}

#[tokio::test]
async fn test_positional_fetch_convention_reaches_store() {
    let fixture = Fixture::new().await;
    let store = SqlStore::new(&fixture.config).unwrap();
    let adapter = QueryAdapter::with_convention(Arc::new(store), CallingConvention::Positional3);
    assert_eq!(adapter.binding().call_shape(), CallShape::PositionalWithFetch);

    let output = adapter
        .select("SELECT COUNT(*) AS n FROM bg_sales_game", &[])
        .await
        .unwrap();
    assert_eq!(output.first_value(), Some(&Value::Int(5)));
}

#[tokio::test]
async fn test_single_argument_convention_sends_statement_only() {
    let fixture = Fixture::new().await;
    let store = SqlStore::new(&fixture.config).unwrap();
    let adapter = QueryAdapter::with_convention(Arc::new(store), CallingConvention::SingleArg);

    let output = adapter
        .select("SELECT COUNT(*) AS n FROM app_user", &[])
        .await
        .unwrap();
    assert_eq!(output.first_value(), Some(&Value::Int(0)));
}

#[tokio::test]
async fn test_records_normalize_in_select_order() {
    let fixture = Fixture::new().await;
    let output = fixture
        .catalog
        .adapter()
        .select(
            "SELECT release_year, title FROM bg_sales_game WHERE sales_game_id = ?",
            &[Value::Int(3)],
        )
        .await
        .unwrap();

    let table = normalize(&output);
    assert_eq!(table.columns, vec!["release_year", "title"]);
    assert_eq!(
        table.rows,
        vec![vec![Value::Int(1985), Value::from("Super Mario Bros.")]]
    );
}

#[tokio::test]
async fn test_unreachable_database_is_connection_error() {
    let config = DatabaseConfig::from_connection_string("sqlite:///nonexistent/dir/games.db")
        .unwrap();
    let store = SqlStore::new(&config).unwrap();
    assert_eq!(store.parameters(), vec!["query", "params", "fetch"]);

    let adapter = QueryAdapter::new(Arc::new(store));
    let err = adapter.select("SELECT 1", &[]).await.unwrap_err();
    assert!(matches!(err, GameSearchError::Connection(_)));
}

#[tokio::test]
async fn test_tables_survive_between_calls() {
    let fixture = Fixture::new().await;
    let adapter = fixture.catalog.adapter();

    adapter
        .exec(
            "INSERT INTO bg_esrb_game (title, esrb) VALUES (%s, %s)",
            &[Value::from("Super Mario Bros."), Value::from("E")],
        )
        .await
        .unwrap();

    let output = adapter
        .select("SELECT COUNT(*) FROM bg_esrb_game", &[])
        .await
        .unwrap();
    assert!(matches!(output, QueryOutput::Records(_)));
    assert_eq!(output.first_value(), Some(&Value::Int(5)));
}
