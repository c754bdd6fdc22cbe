//! Game search and sales/rating analytics.

use tracing::debug;

use super::schema::{AnalyticsTables, GamesTable};
use super::{present, require_text, QueryCatalog, Statement};
use crate::db::{QueryOutput, Value};
use crate::error::{GameSearchError, Result};

/// Maximum rows returned by the game search.
pub const GAME_SEARCH_LIMIT: usize = 200;

/// Maximum rows returned by the title lookup.
pub const TITLE_LOOKUP_LIMIT: usize = 25;

/// Region labels that hold worldwide totals in the sales-record table.
const GLOBAL_REGIONS: &str = "('global_sales', 'global')";

/// Optional search constraints, as typed by the user. Blank fields are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GameFilter {
    /// Substring of the title.
    pub title: Option<String>,
    /// Exact platform.
    pub platform: Option<String>,
    /// Exact genre.
    pub genre: Option<String>,
    /// Exact release year; must be a whole number when present.
    pub release_year: Option<String>,
}

/// Builds the game search. The `IS NOT NULL` anchor keeps the WHERE clause non-empty.
pub fn build_game_search(games: &GamesTable, filter: &GameFilter) -> Result<Statement> {
    let mut predicates = vec![format!("{} IS NOT NULL", games.title)];
    let mut params = Vec::new();

    if let Some(title) = present(filter.title.as_deref()) {
        predicates.push(format!("{} LIKE %s", games.title));
        params.push(Value::String(format!("%{title}%")));
    }

    if let Some(platform) = present(filter.platform.as_deref()) {
        predicates.push(format!("{} = %s", games.platform));
        params.push(Value::from(platform));
    }

    if let Some(genre) = present(filter.genre.as_deref()) {
        predicates.push(format!("{} = %s", games.genre));
        params.push(Value::from(genre));
    }

    if let Some(year) = present(filter.release_year.as_deref()) {
        let year: i64 = year.parse().map_err(|_| {
            GameSearchError::validation("Release year must be a whole number (e.g., 2011).")
        })?;
        predicates.push(format!("{} = %s", games.release_year));
        params.push(Value::Int(year));
    }

    let sql = format!(
        "SELECT {id} AS game_id, {title} AS title, {platform} AS platform, {genre} AS genre, \
         {publisher} AS publisher, {developer} AS developer, {year} AS release_year, \
         {source} AS source \
         FROM {table} \
         WHERE {predicate} \
         ORDER BY {title} ASC \
         LIMIT {GAME_SEARCH_LIMIT}",
        id = games.id,
        title = games.title,
        platform = games.platform,
        genre = games.genre,
        publisher = games.publisher,
        developer = games.developer,
        year = games.release_year,
        source = games.source,
        table = games.table,
        predicate = predicates.join(" AND "),
    );

    Ok(Statement::new(sql, params))
}

/// Parses a row-count bound typed by the user.
pub fn parse_row_bound(text: &str) -> Result<i64> {
    match text.trim().parse::<i64>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(GameSearchError::validation(
            "Row limit must be a positive whole number.",
        )),
    }
}

/// Top games by worldwide sales, limited to `limit` rows.
pub fn build_top_games_by_sales(
    games: &GamesTable,
    sales: &AnalyticsTables,
    limit: i64,
) -> Result<Statement> {
    if limit <= 0 {
        return Err(GameSearchError::validation(
            "Row limit must be a positive whole number.",
        ));
    }

    let sql = format!(
        "SELECT g.{title} AS title, g.{platform} AS platform, g.{year} AS release_year, \
         g.{genre} AS genre, g.{publisher} AS publisher, SUM(r.{millions}) AS global_sales \
         FROM {games_table} AS g \
         JOIN {sales_table} AS r ON r.{sales_game_id} = g.{id} \
         WHERE LOWER(r.{region}) IN {GLOBAL_REGIONS} \
         GROUP BY g.{id}, g.{title}, g.{platform}, g.{year}, g.{genre}, g.{publisher} \
         ORDER BY global_sales DESC \
         LIMIT %s",
        title = games.title,
        platform = games.platform,
        year = games.release_year,
        genre = games.genre,
        publisher = games.publisher,
        id = games.id,
        games_table = games.table,
        millions = sales.sales_millions,
        sales_table = sales.sales_table,
        sales_game_id = sales.sales_game_id,
        region = sales.region,
    );

    Ok(Statement::new(sql, vec![Value::Int(limit)]))
}

/// Average worldwide sales per ESRB rating, for games present in both relations.
pub fn build_average_sales_by_rating(games: &GamesTable, sales: &AnalyticsTables) -> Statement {
    let sql = format!(
        "SELECT e.{rating} AS esrb_rating, COUNT(*) AS num_games, \
         ROUND(AVG(r.{millions}), 2) AS avg_global_sales \
         FROM {esrb_table} AS e \
         JOIN {games_table} AS g ON e.{esrb_title} = g.{title} \
         JOIN {sales_table} AS r ON r.{sales_game_id} = g.{id} \
         WHERE LOWER(r.{region}) IN {GLOBAL_REGIONS} \
         GROUP BY e.{rating} \
         ORDER BY avg_global_sales DESC",
        rating = sales.esrb_rating,
        millions = sales.sales_millions,
        esrb_table = sales.esrb_table,
        games_table = games.table,
        esrb_title = sales.esrb_title,
        title = games.title,
        sales_table = sales.sales_table,
        sales_game_id = sales.sales_game_id,
        id = games.id,
        region = sales.region,
    );

    Statement::new(sql, Vec::new())
}

/// Games with a given ESRB rating and at least `min_sales` million worldwide sales.
pub fn build_games_by_rating(
    games: &GamesTable,
    sales: &AnalyticsTables,
    rating: &str,
    min_sales: &str,
) -> Result<Statement> {
    let rating = require_text(rating, "Rating")?.to_uppercase();
    let min_sales: f64 = min_sales
        .trim()
        .parse()
        .ok()
        .filter(|v: &f64| v.is_finite())
        .ok_or_else(|| GameSearchError::validation("Invalid number for minimum sales."))?;

    let sql = format!(
        "SELECT g.{title} AS title, g.{platform} AS platform, g.{year} AS release_year, \
         g.{genre} AS genre, r.{millions} AS global_sales, e.{rating_col} AS esrb_rating \
         FROM {esrb_table} AS e \
         JOIN {games_table} AS g ON e.{esrb_title} = g.{title} \
         JOIN {sales_table} AS r ON r.{sales_game_id} = g.{id} \
         WHERE LOWER(r.{region}) IN {GLOBAL_REGIONS} \
         AND e.{rating_col} = %s \
         AND r.{millions} >= %s \
         ORDER BY global_sales DESC",
        title = games.title,
        platform = games.platform,
        year = games.release_year,
        genre = games.genre,
        millions = sales.sales_millions,
        rating_col = sales.esrb_rating,
        esrb_table = sales.esrb_table,
        games_table = games.table,
        esrb_title = sales.esrb_title,
        sales_table = sales.sales_table,
        sales_game_id = sales.sales_game_id,
        id = games.id,
        region = sales.region,
    );

    Ok(Statement::new(
        sql,
        vec![Value::String(rating), Value::Float(min_sales)],
    ))
}

/// Title substring lookup with worldwide sales and ESRB rating when known.
pub fn build_title_lookup(
    games: &GamesTable,
    sales: &AnalyticsTables,
    term: &str,
) -> Result<Statement> {
    let term = require_text(term, "Search term")?;

    let sql = format!(
        "SELECT g.{title} AS title, g.{platform} AS platform, g.{year} AS release_year, \
         g.{genre} AS genre, g.{publisher} AS publisher, r.{millions} AS global_sales, \
         e.{rating} AS esrb_rating \
         FROM {games_table} AS g \
         LEFT JOIN {sales_table} AS r ON r.{sales_game_id} = g.{id} \
         AND LOWER(r.{region}) IN {GLOBAL_REGIONS} \
         LEFT JOIN {esrb_table} AS e ON e.{esrb_title} = g.{title} \
         WHERE g.{title} LIKE %s \
         ORDER BY global_sales DESC \
         LIMIT {TITLE_LOOKUP_LIMIT}",
        title = games.title,
        platform = games.platform,
        year = games.release_year,
        genre = games.genre,
        publisher = games.publisher,
        millions = sales.sales_millions,
        rating = sales.esrb_rating,
        games_table = games.table,
        sales_table = sales.sales_table,
        sales_game_id = sales.sales_game_id,
        id = games.id,
        region = sales.region,
        esrb_table = sales.esrb_table,
        esrb_title = sales.esrb_title,
    );

    Ok(Statement::new(sql, vec![Value::String(format!("%{term}%"))]))
}

impl QueryCatalog {
    /// Searches games by the present filter fields.
    pub async fn search_games(&self, filter: &GameFilter) -> Result<QueryOutput> {
        let statement = build_game_search(&self.schema.games, filter)?;
        debug!(params = statement.params.len(), "Searching games");
        self.select(&statement).await
    }

    /// Top `limit` games by worldwide sales.
    pub async fn top_games_by_sales(&self, limit: i64) -> Result<QueryOutput> {
        let statement =
            build_top_games_by_sales(&self.schema.games, &self.schema.analytics, limit)?;
        self.select(&statement).await
    }

    /// Average worldwide sales grouped by ESRB rating.
    pub async fn average_sales_by_rating(&self) -> Result<QueryOutput> {
        let statement = build_average_sales_by_rating(&self.schema.games, &self.schema.analytics);
        self.select(&statement).await
    }

    /// Games with an ESRB rating and a minimum worldwide sales figure.
    pub async fn games_by_rating(&self, rating: &str, min_sales: &str) -> Result<QueryOutput> {
        let statement =
            build_games_by_rating(&self.schema.games, &self.schema.analytics, rating, min_sales)?;
        self.select(&statement).await
    }

    /// Looks up titles containing `term`, with sales and rating.
    pub async fn lookup_titles(&self, term: &str) -> Result<QueryOutput> {
        let statement = build_title_lookup(&self.schema.games, &self.schema.analytics, term)?;
        self.select(&statement).await
    }
}
