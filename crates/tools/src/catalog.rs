//! Product catalog search: `query_db`.
//!
//! The model writes SQL; this module decides whether it may run, runs it
//! read-only against PostgreSQL, and renders the rows as a Markdown table
//! followed by the slug and product-id lookups the model needs for
//! navigation and cart operations.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cartwright_config::CatalogConfig;
use cartwright_core::error::{ResourceError, ToolError};
use cartwright_core::resource::{Connector, LazyResource};
use cartwright_core::tool::{Tool, ToolResult};
use serde::de::{Deserializer, MapAccess, Visitor};
use serde::Deserialize;
use serde_json::{Value, json};
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use tracing::{debug, info, warn};

use crate::args::parse_args;

/// Column hidden from the rendered table.
const HIDDEN_COLUMNS: &[&str] = &["image_url"];

/// One result row with its columns in select-list order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row(pub Vec<(String, Value)>);

impl Row {
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.0.iter().find(|(name, _)| name == column).map(|(_, v)| v)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(name, _)| name.as_str())
    }
}

impl<'de> Deserialize<'de> for Row {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct RowVisitor;

        impl<'de> Visitor<'de> for RowVisitor {
            type Value = Row;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a JSON object")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Row, A::Error> {
                let mut columns = Vec::with_capacity(map.size_hint().unwrap_or(8));
                while let Some((name, value)) = map.next_entry::<String, Value>()? {
                    columns.push((name, value));
                }
                Ok(Row(columns))
            }
        }

        deserializer.deserialize_map(RowVisitor)
    }
}

/// Why a catalog query produced no rows.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error(transparent)]
    Unavailable(#[from] ResourceError),

    #[error("{0}")]
    Database(#[from] sqlx::Error),

    #[error("unreadable row: {0}")]
    Row(#[from] serde_json::Error),
}

/// Runs already-vetted SQL against the catalog.
#[async_trait]
pub trait CatalogQuery: Send + Sync {
    async fn fetch_rows(&self, sql: &str) -> Result<Vec<Row>, CatalogError>;

    /// Release the underlying connections.
    async fn shutdown(&self) {}
}

/// Builds the PostgreSQL pool on first use.
///
/// The pool itself is lazy: connections are opened per query, so a
/// database outage fails the queries made during it and nothing more.
/// Only configuration problems (no URL, unparsable URL) are remembered.
pub struct PgConnector {
    config: CatalogConfig,
}

impl PgConnector {
    pub fn new(config: CatalogConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Connector for PgConnector {
    type Handle = PgPool;

    fn resource_name(&self) -> &str {
        "catalog"
    }

    async fn connect(&self) -> Result<PgPool, ResourceError> {
        let failed = |reason: String| ResourceError::ConnectFailed {
            resource: "catalog".into(),
            reason,
        };

        let url = self
            .config
            .database_url
            .as_deref()
            .ok_or_else(|| failed("no database URL configured (set DATABASE_URL)".into()))?;

        let options: PgConnectOptions = url.parse().map_err(|e: sqlx::Error| failed(e.to_string()))?;
        let options = options
            .application_name("cartwright")
            .options([("statement_timeout", self.config.statement_timeout_ms.to_string())]);

        info!(
            max_connections = self.config.max_connections,
            statement_timeout_ms = self.config.statement_timeout_ms,
            "Catalog pool ready"
        );

        Ok(PgPoolOptions::new()
            .max_connections(self.config.max_connections)
            .acquire_timeout(Duration::from_secs(self.config.acquire_timeout_secs))
            .max_lifetime(Duration::from_secs(self.config.max_lifetime_secs))
            .test_before_acquire(true)
            .connect_lazy_with(options))
    }

    async fn close(&self, pool: &PgPool) {
        pool.close().await;
    }
}

/// The production catalog: a lazily connected PostgreSQL pool.
pub struct PgCatalog {
    pool: LazyResource<PgConnector>,
}

impl PgCatalog {
    pub fn new(config: CatalogConfig) -> Self {
        Self {
            pool: LazyResource::new(PgConnector::new(config)),
        }
    }
}

#[async_trait]
impl CatalogQuery for PgCatalog {
    async fn fetch_rows(&self, sql: &str) -> Result<Vec<Row>, CatalogError> {
        let pool = self.pool.get().await?;

        // Each row comes back as a JSON object so column order survives.
        let wrapped = format!("SELECT row_to_json(q)::text FROM ({sql}) AS q");

        let mut tx = pool.begin().await?;
        sqlx::query("SET TRANSACTION READ ONLY").execute(&mut *tx).await?;
        let raw: Vec<String> = sqlx::query_scalar(&wrapped).fetch_all(&mut *tx).await?;
        tx.rollback().await?;

        raw.iter()
            .map(|text| serde_json::from_str::<Row>(text).map_err(CatalogError::from))
            .collect()
    }

    async fn shutdown(&self) {
        self.pool.shutdown().await;
    }
}

/// A query the guard refused, with the text shown to the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection(pub String);

/// Check a model-written query against the table policy.
///
/// Table names are matched as substrings of the lowercased query, so a
/// forbidden name anywhere (even inside an identifier) rejects it.
/// Returns the statement with any trailing semicolons removed.
pub fn vet_query<'q>(query: &'q str, config: &CatalogConfig) -> Result<&'q str, Rejection> {
    let lowered = query.to_lowercase();

    if config.forbidden_tables.iter().any(|t| lowered.contains(&t.to_lowercase())) {
        return Err(Rejection(format!(
            "Error: Query contains forbidden tables. Only {} tables are allowed.",
            quoted_list(&config.allowed_tables, "and")
        )));
    }

    if !config.allowed_tables.iter().any(|t| lowered.contains(&t.to_lowercase())) {
        return Err(Rejection(format!(
            "Error: Query must reference {} tables.",
            quoted_list(&config.allowed_tables, "or")
        )));
    }

    let statement = query.trim().trim_end_matches(|c: char| c == ';' || c.is_whitespace());
    if has_second_statement(statement) {
        return Err(Rejection("Error: Only a single SQL statement is allowed.".into()));
    }

    let head = statement
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase();
    if head != "select" && head != "with" {
        return Err(Rejection("Error: Only read-only SELECT queries are allowed.".into()));
    }

    Ok(statement)
}

/// Whether a `;` outside string literals and quoted identifiers is
/// followed by more text. Doubled quotes (`'it''s'`) reopen the literal.
fn has_second_statement(sql: &str) -> bool {
    let mut quote: Option<char> = None;
    for (i, c) in sql.char_indices() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == '\'' || c == '"' => quote = Some(c),
            None if c == ';' => {
                if !sql[i + 1..].trim().is_empty() {
                    return true;
                }
            }
            None => {}
        }
    }
    false
}

fn quoted_list(items: &[String], conjunction: &str) -> String {
    let quoted: Vec<String> = items.iter().map(|t| format!("'{t}'")).collect();
    match quoted.as_slice() {
        [] => String::new(),
        [only] => only.clone(),
        [rest @ .., last] => format!("{} {conjunction} {last}", rest.join(", ")),
    }
}

fn cell(value: &Value) -> String {
    let text = match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    text.replace('|', "\\|").replace('\n', " ")
}

/// Render rows as a pipe table, then the internal lookup sections.
pub fn render_rows(rows: &[Row]) -> String {
    let Some(first) = rows.first() else {
        return "The query returned no rows.".into();
    };

    let headers: Vec<&str> = first
        .columns()
        .filter(|c| !HIDDEN_COLUMNS.contains(c))
        .collect();

    let body: Vec<Vec<String>> = rows
        .iter()
        .map(|row| {
            headers
                .iter()
                .map(|h| row.get(h).map(cell).unwrap_or_default())
                .collect()
        })
        .collect();

    let widths: Vec<usize> = headers
        .iter()
        .enumerate()
        .map(|(i, h)| {
            body.iter()
                .map(|r| r[i].chars().count())
                .chain(std::iter::once(h.chars().count()))
                .max()
                .unwrap_or(0)
                .max(3)
        })
        .collect();

    let line = |cells: Vec<String>| -> String {
        let padded: Vec<String> = cells
            .into_iter()
            .zip(&widths)
            .map(|(c, w)| format!("{c:<w$}"))
            .collect();
        format!("| {} |", padded.join(" | "))
    };

    let mut out = Vec::with_capacity(rows.len() + 2);
    out.push(line(headers.iter().map(|h| h.to_string()).collect()));
    out.push(format!(
        "|{}|",
        widths.iter().map(|w| "-".repeat(w + 2)).collect::<Vec<_>>().join("|")
    ));
    out.extend(body.into_iter().map(line));
    let mut rendered = out.join("\n");

    for (column, label) in [("slug", "INTERNAL_SLUG_DATA"), ("product_id", "INTERNAL_PRODUCT_ID_DATA")] {
        if first.get(column).is_none() {
            continue;
        }
        rendered.push_str(&format!("\n\n[{label}]:"));
        if first.get("name").is_none() {
            continue;
        }
        for row in rows {
            let name = row.get("name").map(cell).unwrap_or_default();
            let value = row.get(column).map(cell).unwrap_or_default();
            rendered.push_str(&format!("\n- {name}: {value}"));
        }
    }

    rendered
}

#[derive(Debug, Deserialize)]
struct QueryArgs {
    query: String,
}

/// `query_db`: read-only SQL over the product tables.
pub struct QueryDbTool {
    catalog: Arc<dyn CatalogQuery>,
    config: CatalogConfig,
}

impl QueryDbTool {
    pub fn new(catalog: Arc<dyn CatalogQuery>, config: CatalogConfig) -> Self {
        Self { catalog, config }
    }
}

#[async_trait]
impl Tool for QueryDbTool {
    fn name(&self) -> &str {
        "query_db"
    }

    fn description(&self) -> &str {
        "Search the furniture catalog with a single PostgreSQL SELECT over the products and \
         featured_products tables (no other tables are reachable). Include name, slug and \
         product_id columns so follow-up navigation and cart actions have what they need."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "A PostgreSQL SELECT statement over products/featured_products"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, arguments: Value) -> Result<ToolResult, ToolError> {
        let args: QueryArgs = parse_args(self.name(), arguments)?;

        let statement = match vet_query(&args.query, &self.config) {
            Ok(statement) => statement,
            Err(Rejection(message)) => {
                warn!(query = %args.query, reason = %message, "Rejected catalog query");
                return Ok(ToolResult::failure(message));
            }
        };

        debug!(query = %statement, "Running catalog query");
        match self.catalog.fetch_rows(statement).await {
            Ok(rows) => {
                info!(rows = rows.len(), "Catalog query succeeded");
                Ok(ToolResult::text(render_rows(&rows)))
            }
            Err(e) => {
                warn!(error = %e, "Catalog query failed");
                Ok(ToolResult::failure(format!("Error executing query: {e}")))
            }
        }
    }
}
