//! Catalog operations against a seeded SQLite database.

use super::fixture::{column, texts, Fixture};
use gamesearch::catalog::{DeleteOutcome, GameFilter, LoginOutcome, UserForm};
use gamesearch::db::Value;
use gamesearch::error::GameSearchError;
use gamesearch::query::{count_rows, normalize};
use pretty_assertions::assert_eq;

fn user(username: &str, email: &str, password: &str) -> UserForm {
    UserForm {
        username: username.to_string(),
        email: email.to_string(),
        password: password.to_string(),
        active: true,
    }
}

fn title_filter(title: &str) -> GameFilter {
    GameFilter {
        title: Some(title.to_string()),
        ..GameFilter::default()
    }
}

async fn user_id(fixture: &Fixture, username: &str) -> i64 {
    let users = fixture.catalog.list_users().await.unwrap();
    let names = texts(&users, "username");
    let ids = column(&users, "user_id");
    let index = names.iter().position(|n| n == username).unwrap();
    ids[index].as_int().unwrap()
}

#[tokio::test]
async fn test_search_by_title_substring() {
    let fixture = Fixture::new().await;
    let output = fixture.catalog.search_games(&title_filter("mario")).await.unwrap();

    assert_eq!(
        texts(&output, "title"),
        vec!["Mario Kart Wii", "Super Mario Bros."]
    );
    assert_eq!(
        normalize(&output).columns,
        vec![
            "game_id",
            "title",
            "platform",
            "genre",
            "publisher",
            "developer",
            "release_year",
            "source"
        ]
    );
}

#[tokio::test]
async fn test_search_combines_filters() {
    let fixture = Fixture::new().await;
    let filter = GameFilter {
        platform: Some("Wii".to_string()),
        release_year: Some("2008".to_string()),
        ..GameFilter::default()
    };
    let output = fixture.catalog.search_games(&filter).await.unwrap();
    assert_eq!(texts(&output, "title"), vec!["Mario Kart Wii"]);
}

#[tokio::test]
async fn test_search_without_filters_lists_everything() {
    let fixture = Fixture::new().await;
    let output = fixture
        .catalog
        .search_games(&GameFilter::default())
        .await
        .unwrap();
    assert_eq!(count_rows(&output), 5);
}

#[tokio::test]
async fn test_search_with_no_match_normalizes_to_message() {
    let fixture = Fixture::new().await;
    let output = fixture
        .catalog
        .search_games(&title_filter("zelda"))
        .await
        .unwrap();

    assert_eq!(count_rows(&output), 0);
    let table = normalize(&output);
    assert_eq!(table.columns, vec!["info"]);
    assert_eq!(table.rows, vec![vec![Value::from("No rows returned.")]]);
}

#[tokio::test]
async fn test_search_rejects_bad_year() {
    let fixture = Fixture::new().await;
    let filter = GameFilter {
        release_year: Some("soon".to_string()),
        ..GameFilter::default()
    };
    let err = fixture.catalog.search_games(&filter).await.unwrap_err();
    assert!(err.is_validation());
}

#[tokio::test]
async fn test_top_games_by_sales_uses_global_rows() {
    let fixture = Fixture::new().await;
    let output = fixture.catalog.top_games_by_sales(3).await.unwrap();

    assert_eq!(
        texts(&output, "title"),
        vec!["Wii Sports", "Super Mario Bros.", "Mario Kart Wii"]
    );
    // Regional rows are not added to the global figure.
    assert_eq!(column(&output, "global_sales")[0], Value::Float(82.74));
}

#[tokio::test]
async fn test_average_sales_by_rating() {
    let fixture = Fixture::new().await;
    let output = fixture.catalog.average_sales_by_rating().await.unwrap();

    assert_eq!(texts(&output, "esrb_rating"), vec!["E", "M"]);
    assert_eq!(column(&output, "num_games"), vec![Value::Int(2), Value::Int(2)]);

    let averages: Vec<f64> = column(&output, "avg_global_sales")
        .iter()
        .map(|v| match v {
            Value::Float(f) => *f,
            other => panic!("expected float, got {other:?}"),
        })
        .collect();
    assert!((averages[0] - 59.28).abs() < 1e-9);
    assert!((averages[1] - 16.76).abs() < 1e-9);
}

#[tokio::test]
async fn test_games_by_rating_and_minimum_sales() {
    let fixture = Fixture::new().await;
    let output = fixture.catalog.games_by_rating("m", "15").await.unwrap();
    assert_eq!(texts(&output, "title"), vec!["Grand Theft Auto V"]);

    let err = fixture
        .catalog
        .games_by_rating("M", "a lot")
        .await
        .unwrap_err();
    assert!(err.is_validation());
}

#[tokio::test]
async fn test_lookup_titles_includes_unrated_games() {
    let fixture = Fixture::new().await;
    let output = fixture.catalog.lookup_titles("mario").await.unwrap();

    assert_eq!(
        texts(&output, "title"),
        vec!["Super Mario Bros.", "Mario Kart Wii"]
    );
    assert_eq!(
        column(&output, "esrb_rating"),
        vec![Value::Null, Value::from("E")]
    );
}

#[tokio::test]
async fn test_console_runs_select_and_blocks_writes() {
    let fixture = Fixture::new().await;
    let output = fixture
        .catalog
        .run_console("WITH w AS (SELECT title FROM bg_sales_game WHERE platform = 'Wii') SELECT COUNT(*) AS n FROM w")
        .await
        .unwrap();
    assert_eq!(output.first_value(), Some(&Value::Int(2)));

    let err = fixture
        .catalog
        .run_console("DELETE FROM bg_sales_game")
        .await
        .unwrap_err();
    assert!(err.is_validation());
    assert_eq!(
        count_rows(&fixture.catalog.search_games(&GameFilter::default()).await.unwrap()),
        5
    );
}

#[tokio::test]
async fn test_console_surfaces_sql_errors() {
    let fixture = Fixture::new().await;
    let err = fixture
        .catalog
        .run_console("SELECT * FROM no_such_table")
        .await
        .unwrap_err();
    assert!(matches!(err, GameSearchError::Query(ref msg) if msg.contains("no_such_table")));
}

#[tokio::test]
async fn test_user_lifecycle() {
    let fixture = Fixture::new().await;
    let catalog = &fixture.catalog;

    catalog
        .create_user(&user("ana", " Ana@Example.com ", "secret"))
        .await
        .unwrap();
    let id = user_id(&fixture, "ana").await;

    let users = catalog.list_users().await.unwrap();
    assert_eq!(texts(&users, "email"), vec!["ana@example.com"]);
    assert!(!normalize(&users).columns.iter().any(|c| c.contains("password")));

    catalog
        .update_user(Some(id), &user("ana.b", "ana.b@example.com", ""))
        .await
        .unwrap();

    // Blank password on update keeps the old one.
    assert_eq!(
        catalog.authenticate("ana.b", "secret").await.unwrap(),
        LoginOutcome::Granted { user_id: id }
    );
    assert_eq!(
        catalog.authenticate("ana.b", "wrong").await.unwrap(),
        LoginOutcome::Denied
    );
}

#[tokio::test]
async fn test_delete_without_references_removes_row() {
    let fixture = Fixture::new().await;
    let catalog = &fixture.catalog;

    catalog
        .create_user(&user("temp", "temp@example.com", "pw"))
        .await
        .unwrap();
    let id = user_id(&fixture, "temp").await;

    let outcome = catalog.delete_user(Some(id), true).await.unwrap();
    assert_eq!(outcome, DeleteOutcome::Deleted);
    assert_eq!(count_rows(&catalog.list_users().await.unwrap()), 0);
}

#[tokio::test]
async fn test_delete_referenced_user_is_deactivated() {
    let fixture = Fixture::new().await;
    let catalog = &fixture.catalog;

    catalog
        .create_user(&user("bob", "bob@example.com", "pw"))
        .await
        .unwrap();
    let id = user_id(&fixture, "bob").await;

    // A successful login leaves an audit row pointing at the user.
    assert_eq!(
        catalog.authenticate("bob", "pw").await.unwrap(),
        LoginOutcome::Granted { user_id: id }
    );

    let outcome = catalog.delete_user(Some(id), true).await.unwrap();
    assert_eq!(outcome, DeleteOutcome::Deactivated);

    let users = catalog.list_users().await.unwrap();
    assert_eq!(column(&users, "is_active"), vec![Value::Int(0)]);
    assert_eq!(
        catalog.authenticate("bob", "pw").await.unwrap(),
        LoginOutcome::Denied
    );
}

#[tokio::test]
async fn test_duplicate_username_is_a_query_error() {
    let fixture = Fixture::new().await;
    let catalog = &fixture.catalog;

    catalog
        .create_user(&user("ana", "a@example.com", "pw"))
        .await
        .unwrap();
    let err = catalog
        .create_user(&user("ana", "b@example.com", "pw"))
        .await
        .unwrap_err();
    // SQLite rejects the `%s` form first; that error is the one reported.
    assert!(matches!(err, GameSearchError::Query(_)));
    assert_eq!(count_rows(&catalog.list_users().await.unwrap()), 1);
}

#[tokio::test]
async fn test_db_check() {
    let fixture = Fixture::new().await;
    let check = fixture.catalog.db_check().await.unwrap();

    assert_eq!(check.user_rows, Some(Value::Int(0)));
    assert_eq!(check.game_rows, Some(Value::Int(5)));
    assert!(check.supports_fetch);
    assert!(!check.supports_commit);
    assert!(fixture.config.display_string().starts_with("sqlite @ "));
}
