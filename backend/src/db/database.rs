//! Database capability
//!
//! The narrow interface the rest of the application uses to talk to the
//! connected database: statement execution and schema introspection.
//! `SqlxDatabase` implements it over sqlx MySQL and SQLite pools.

use crate::db::error::DatabaseError;
use async_trait::async_trait;
use futures_util::{Stream, TryStreamExt};
use serde::Serialize;
use serde_json::Value;
use sqlx::mysql::{MySqlPool, MySqlRow};
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::{Column, Row, ValueRef};
use tracing::debug;

/// Number of sample rows included per table in `table_info`
const SAMPLE_ROWS: usize = 3;

/// SQL dialect of the connected database
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// MySQL / MariaDB
    MySql,
    /// SQLite
    Sqlite,
}

impl Dialect {
    /// Name of the dialect as shown to the language model
    pub fn as_str(&self) -> &'static str {
        match self {
            Dialect::MySql => "mysql",
            Dialect::Sqlite => "sqlite",
        }
    }

    /// Quote an identifier for this dialect
    pub fn quote_ident(&self, ident: &str) -> String {
        match self {
            Dialect::MySql => format!("`{}`", ident.replace('`', "``")),
            Dialect::Sqlite => format!("\"{}\"", ident.replace('"', "\"\"")),
        }
    }
}

/// Result of running a statement
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueryResult {
    /// Column names, in select order
    pub columns: Vec<String>,
    /// Row values, one JSON value per column
    pub rows: Vec<Vec<Value>>,
}

impl QueryResult {
    /// Index of a column by name
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Render rows as a list of tuples, the shape the agent sees as tool output
    pub fn to_text(&self) -> String {
        let rows: Vec<String> = self
            .rows
            .iter()
            .map(|row| {
                let values: Vec<String> = row.iter().map(value_to_text).collect();
                if values.len() == 1 {
                    format!("({},)", values[0])
                } else {
                    format!("({})", values.join(", "))
                }
            })
            .collect();
        format!("[{}]", rows.join(", "))
    }

    /// Render rows as a tab-separated table with a header line
    pub fn to_table(&self) -> String {
        let mut out = self.columns.join("\t");
        for row in &self.rows {
            out.push('\n');
            let cells: Vec<String> = row
                .iter()
                .map(|v| match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect();
            out.push_str(&cells.join("\t"));
        }
        out
    }
}

fn value_to_text(value: &Value) -> String {
    match value {
        Value::Null => "None".to_string(),
        Value::String(s) => format!("'{}'", s),
        other => other.to_string(),
    }
}

/// Database capability consumed by the agent tools and the chart materializer
#[async_trait]
pub trait Database: Send + Sync {
    /// SQL dialect of this database
    fn dialect(&self) -> Dialect;

    /// Names of the user tables, sorted
    async fn table_names(&self) -> Result<Vec<String>, DatabaseError>;

    /// Schema and sample rows for the given tables (all tables if empty)
    async fn table_info(&self, tables: &[String]) -> Result<String, DatabaseError>;

    /// Run a statement and collect its rows
    async fn run(&self, sql: &str) -> Result<QueryResult, DatabaseError>;

    /// Run a statement and collect at most `max_rows` rows
    ///
    /// Rows past the limit are never fetched.
    async fn run_limited(&self, sql: &str, max_rows: usize) -> Result<QueryResult, DatabaseError>;

    /// Release the underlying connections
    async fn close(&self);
}

enum DbPool {
    MySql(MySqlPool),
    Sqlite(SqlitePool),
}

/// `Database` implementation backed by an sqlx connection pool
pub struct SqlxDatabase {
    pool: DbPool,
}

impl SqlxDatabase {
    /// Wrap an open MySQL pool
    pub fn from_mysql(pool: MySqlPool) -> Self {
        Self {
            pool: DbPool::MySql(pool),
        }
    }

    /// Wrap an open SQLite pool
    pub fn from_sqlite(pool: SqlitePool) -> Self {
        Self {
            pool: DbPool::Sqlite(pool),
        }
    }

    async fn fetch_rows(
        &self,
        sql: &str,
        limit: Option<usize>,
    ) -> Result<QueryResult, DatabaseError> {
        debug!(dialect = self.dialect().as_str(), sql = %sql, limit = ?limit, "Running statement");

        let result = match &self.pool {
            DbPool::MySql(pool) => {
                let rows = take_rows(sqlx::query(sql).fetch(pool), limit).await?;
                collect_rows(&rows, mysql_value)
            }
            DbPool::Sqlite(pool) => {
                let rows = take_rows(sqlx::query(sql).fetch(pool), limit).await?;
                collect_rows(&rows, sqlite_value)
            }
        };

        debug!(rows = result.rows.len(), "Statement finished");
        Ok(result)
    }

    async fn create_statement(&self, table: &str) -> Result<String, DatabaseError> {
        match &self.pool {
            DbPool::MySql(pool) => {
                let sql = format!("SHOW CREATE TABLE {}", self.dialect().quote_ident(table));
                let row = sqlx::query(&sql).fetch_one(pool).await?;
                Ok(row.try_get::<String, _>(1)?)
            }
            DbPool::Sqlite(pool) => {
                let row = sqlx::query(
                    "SELECT sql FROM sqlite_master WHERE type = 'table' AND name = ?",
                )
                .bind(table)
                .fetch_one(pool)
                .await?;
                Ok(row.try_get::<String, _>(0)?)
            }
        }
    }
}

#[async_trait]
impl Database for SqlxDatabase {
    fn dialect(&self) -> Dialect {
        match self.pool {
            DbPool::MySql(_) => Dialect::MySql,
            DbPool::Sqlite(_) => Dialect::Sqlite,
        }
    }

    async fn table_names(&self) -> Result<Vec<String>, DatabaseError> {
        let names = match &self.pool {
            DbPool::MySql(pool) => {
                sqlx::query_scalar::<_, String>(
                    "SELECT CAST(TABLE_NAME AS CHAR) FROM information_schema.TABLES \
                     WHERE TABLE_SCHEMA = DATABASE() ORDER BY TABLE_NAME",
                )
                .fetch_all(pool)
                .await?
            }
            DbPool::Sqlite(pool) => {
                sqlx::query_scalar::<_, String>(
                    "SELECT name FROM sqlite_master \
                     WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
                )
                .fetch_all(pool)
                .await?
            }
        };
        Ok(names)
    }

    async fn table_info(&self, tables: &[String]) -> Result<String, DatabaseError> {
        let known = self.table_names().await?;
        let selected: Vec<String> = if tables.is_empty() {
            known
        } else {
            for table in tables {
                if !known.contains(table) {
                    return Err(DatabaseError::UnknownTable(table.clone()));
                }
            }
            tables.to_vec()
        };

        let mut sections = Vec::with_capacity(selected.len());
        for table in &selected {
            let create = self.create_statement(table).await?;
            let sample_sql = format!(
                "SELECT * FROM {} LIMIT {}",
                self.dialect().quote_ident(table),
                SAMPLE_ROWS
            );
            let sample = self.run(&sample_sql).await?;
            sections.push(format!(
                "{}\n\n/*\n{} rows from {} table:\n{}\n*/",
                create.trim(),
                SAMPLE_ROWS,
                table,
                sample.to_table()
            ));
        }

        Ok(sections.join("\n\n"))
    }

    async fn run(&self, sql: &str) -> Result<QueryResult, DatabaseError> {
        self.fetch_rows(sql, None).await
    }

    async fn run_limited(&self, sql: &str, max_rows: usize) -> Result<QueryResult, DatabaseError> {
        self.fetch_rows(sql, Some(max_rows)).await
    }

    async fn close(&self) {
        match &self.pool {
            DbPool::MySql(pool) => pool.close().await,
            DbPool::Sqlite(pool) => pool.close().await,
        }
    }
}

/// Pull rows off `stream` until it ends or `limit` rows are held
async fn take_rows<R, S>(mut stream: S, limit: Option<usize>) -> Result<Vec<R>, sqlx::Error>
where
    S: Stream<Item = Result<R, sqlx::Error>> + Unpin,
{
    let mut rows = Vec::new();
    if limit == Some(0) {
        return Ok(rows);
    }
    while let Some(row) = stream.try_next().await? {
        rows.push(row);
        if limit.is_some_and(|max| rows.len() >= max) {
            break;
        }
    }
    Ok(rows)
}

fn collect_rows<R: Row>(rows: &[R], decode: fn(&R, usize) -> Value) -> QueryResult {
    let columns = rows
        .first()
        .map(|row| {
            row.columns()
                .iter()
                .map(|c| c.name().to_string())
                .collect()
        })
        .unwrap_or_default();

    let rows = rows
        .iter()
        .map(|row| (0..row.len()).map(|idx| decode(row, idx)).collect())
        .collect();

    QueryResult { columns, rows }
}

fn float_value(v: f64) -> Value {
    serde_json::Number::from_f64(v)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

fn mysql_value(row: &MySqlRow, idx: usize) -> Value {
    match row.try_get_raw(idx) {
        Ok(raw) if !raw.is_null() => {}
        _ => return Value::Null,
    }

    if let Ok(v) = row.try_get::<i64, _>(idx) {
        return Value::from(v);
    }
    if let Ok(v) = row.try_get::<u64, _>(idx) {
        return Value::from(v);
    }
    if let Ok(v) = row.try_get::<f64, _>(idx) {
        return float_value(v);
    }
    if let Ok(v) = row.try_get::<f32, _>(idx) {
        return float_value(f64::from(v));
    }
    if let Ok(v) = row.try_get::<sqlx::types::Decimal, _>(idx) {
        return v
            .to_string()
            .parse::<f64>()
            .map(float_value)
            .unwrap_or_else(|_| Value::String(v.to_string()));
    }
    if let Ok(v) = row.try_get::<chrono::NaiveDateTime, _>(idx) {
        return Value::String(v.to_string());
    }
    if let Ok(v) = row.try_get::<chrono::NaiveDate, _>(idx) {
        return Value::String(v.to_string());
    }
    if let Ok(v) = row.try_get::<chrono::NaiveTime, _>(idx) {
        return Value::String(v.to_string());
    }
    if let Ok(v) = row.try_get::<String, _>(idx) {
        return Value::String(v);
    }
    if let Ok(v) = row.try_get::<Vec<u8>, _>(idx) {
        return match String::from_utf8(v) {
            Ok(s) => Value::String(s),
            Err(e) => Value::String(format!("<{} bytes>", e.as_bytes().len())),
        };
    }
    Value::String("<unsupported>".to_string())
}

fn sqlite_value(row: &SqliteRow, idx: usize) -> Value {
    match row.try_get_raw(idx) {
        Ok(raw) if !raw.is_null() => {}
        _ => return Value::Null,
    }

    if let Ok(v) = row.try_get::<i64, _>(idx) {
        return Value::from(v);
    }
    if let Ok(v) = row.try_get::<f64, _>(idx) {
        return float_value(v);
    }
    if let Ok(v) = row.try_get::<String, _>(idx) {
        return Value::String(v);
    }
    if let Ok(v) = row.try_get::<Vec<u8>, _>(idx) {
        return Value::String(format!("<{} bytes>", v.len()));
    }
    // SQLite converts any storage class to text on request
    row.try_get_unchecked::<String, _>(idx)
        .map(Value::String)
        .unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn memory_db() -> SqlxDatabase {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("Failed to open in-memory database");
        for stmt in [
            "CREATE TABLE customers (id INTEGER PRIMARY KEY, name TEXT NOT NULL, city TEXT)",
            "CREATE TABLE orders (id INTEGER PRIMARY KEY, customer_id INTEGER, total REAL)",
            "INSERT INTO customers (name, city) VALUES ('Ada', 'London'), ('Linus', NULL), ('Grace', 'Arlington'), ('Ken', 'Murray Hill')",
            "INSERT INTO orders (customer_id, total) VALUES (1, 10.5), (1, 20.0), (3, 7.25)",
        ] {
            sqlx::query(stmt).execute(&pool).await.unwrap();
        }
        SqlxDatabase::from_sqlite(pool)
    }

    #[test]
    fn test_quote_ident() {
        assert_eq!(Dialect::MySql.quote_ident("sales"), "`sales`");
        assert_eq!(Dialect::MySql.quote_ident("we`ird"), "`we``ird`");
        assert_eq!(Dialect::Sqlite.quote_ident("a\"b"), "\"a\"\"b\"");
    }

    #[test]
    fn test_to_text_formats_tuples() {
        let result = QueryResult {
            columns: vec!["count".into()],
            rows: vec![vec![json!(4)]],
        };
        assert_eq!(result.to_text(), "[(4,)]");

        let result = QueryResult {
            columns: vec!["name".into(), "city".into()],
            rows: vec![vec![json!("Ada"), json!("London")], vec![json!("Linus"), Value::Null]],
        };
        assert_eq!(result.to_text(), "[('Ada', 'London'), ('Linus', None)]");
    }

    #[tokio::test]
    async fn test_run_decodes_values() {
        let db = memory_db().await;
        let result = db
            .run("SELECT name, city, id FROM customers ORDER BY id LIMIT 2")
            .await
            .unwrap();
        assert_eq!(result.columns, vec!["name", "city", "id"]);
        assert_eq!(result.rows[0], vec![json!("Ada"), json!("London"), json!(1)]);
        assert_eq!(result.rows[1][1], Value::Null);
    }

    #[tokio::test]
    async fn test_run_aggregate() {
        let db = memory_db().await;
        let result = db
            .run("SELECT customer_id, SUM(total) AS total FROM orders GROUP BY customer_id ORDER BY customer_id")
            .await
            .unwrap();
        assert_eq!(result.column_index("total"), Some(1));
        assert_eq!(result.rows[0][1], json!(30.5));
    }

    #[tokio::test]
    async fn test_run_invalid_sql() {
        let db = memory_db().await;
        let err = db.run("SELECT * FROM missing_table").await.unwrap_err();
        assert!(matches!(err, DatabaseError::Query(_)));
    }

    #[tokio::test]
    async fn test_table_names_sorted() {
        let db = memory_db().await;
        assert_eq!(db.table_names().await.unwrap(), vec!["customers", "orders"]);
        assert_eq!(db.dialect(), Dialect::Sqlite);
    }

    #[tokio::test]
    async fn test_table_info_includes_schema_and_samples() {
        let db = memory_db().await;
        let info = db.table_info(&["customers".to_string()]).await.unwrap();
        assert!(info.contains("CREATE TABLE customers"));
        assert!(info.contains("3 rows from customers table:"));
        assert!(info.contains("Ada\tLondon"));
        assert!(!info.contains("Ken"));
        assert!(!info.contains("CREATE TABLE orders"));
    }

    #[tokio::test]
    async fn test_table_info_unknown_table() {
        let db = memory_db().await;
        let err = db
            .table_info(&["customers; DROP TABLE orders".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::UnknownTable(_)));
    }

    #[tokio::test]
    async fn test_close() {
        let db = memory_db().await;
        db.close().await;
        assert!(db.run("SELECT 1").await.is_err());
    }

    #[tokio::test]
    async fn test_run_limited_stops_fetching() {
        let db = memory_db().await;
        let sql = "WITH RECURSIVE n(i) AS (SELECT 1 UNION ALL SELECT i + 1 FROM n WHERE i < 2000000) \
                   SELECT i, i * 2 AS twice FROM n";
        let result = db.run_limited(sql, 5).await.unwrap();
        assert_eq!(result.columns, vec!["i", "twice"]);
        assert_eq!(result.rows.len(), 5);
        assert_eq!(result.rows[4], vec![Value::from(5), Value::from(10)]);

        let all = db.run_limited("SELECT name FROM customers", 100).await.unwrap();
        assert_eq!(all.rows.len(), db.run("SELECT name FROM customers").await.unwrap().rows.len());
    }
}
