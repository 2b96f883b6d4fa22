//! Database access restricted to the inventory table
//!
//! Information Hiding:
//! - Driver choice (rusqlite for the bundled file, sqlx for MySQL) hidden behind `SqlDatabase`
//! - Connection lifetime managed by the provider's TTL cache
//! - Table visibility enforced inside each handle

mod cache;
pub mod mysql;
pub mod provider;
pub mod sqlite;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

pub use provider::{ConnectionProvider, Connector, DriverConnector};

pub const LOCAL_SOURCE_LABEL: &str = "Use SQLite3 Database - inventory.db";
pub const REMOTE_SOURCE_LABEL: &str = "Connect to MySQL Database";

/// Connection parameters for a remote MySQL server
#[derive(Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct RemoteParams {
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub database: String,
}

impl RemoteParams {
    /// Names of the fields left blank, in form order
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("host", &self.host),
            ("user", &self.user),
            ("password", &self.password),
            ("database", &self.database),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect()
    }

    /// Credentialed `mysql://` URL; user and password are percent-encoded
    pub fn connection_url(&self) -> Result<url::Url> {
        let mut url = url::Url::parse(&format!("mysql://{}", self.host.trim()))
            .map_err(|e| anyhow::anyhow!("Invalid MySQL host '{}': {}", self.host, e))?;

        url.set_username(self.user.trim())
            .map_err(|_| anyhow::anyhow!("MySQL user cannot be set on '{}'", self.host))?;
        url.set_password(Some(&self.password))
            .map_err(|_| anyhow::anyhow!("MySQL password cannot be set on '{}'", self.host))?;
        url.set_path(self.database.trim());

        Ok(url)
    }
}

impl fmt::Debug for RemoteParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteParams")
            .field("host", &self.host)
            .field("user", &self.user)
            .field("password", &"********")
            .field("database", &self.database)
            .finish()
    }
}

impl fmt::Display for RemoteParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mysql://{}:********@{}/{}", self.user, self.host, self.database)
    }
}

/// Which database the user chose to chat with
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DataSource {
    Local,
    Remote(RemoteParams),
}

impl DataSource {
    pub fn label(&self) -> &'static str {
        match self {
            DataSource::Local => LOCAL_SOURCE_LABEL,
            DataSource::Remote(_) => REMOTE_SOURCE_LABEL,
        }
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSource::Local => write!(f, "local sqlite"),
            DataSource::Remote(params) => write!(f, "{}", params),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Sqlite,
    Mysql,
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dialect::Sqlite => write!(f, "sqlite"),
            Dialect::Mysql => write!(f, "mysql"),
        }
    }
}

/// Rows returned by a query, all values rendered as text
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryOutput {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
    pub truncated: bool,
    pub rows_affected: Option<u64>,
}

impl fmt::Display for QueryOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(affected) = self.rows_affected {
            return write!(f, "{} rows affected", affected);
        }
        if self.rows.is_empty() {
            return write!(f, "Query returned no rows");
        }

        writeln!(f, "{}", self.columns.join("\t"))?;
        for row in &self.rows {
            let cells: Vec<&str> = row.iter().map(|v| v.as_deref().unwrap_or("NULL")).collect();
            writeln!(f, "{}", cells.join("\t"))?;
        }
        if self.truncated {
            write!(f, "(results truncated to {} rows)", self.rows.len())?;
        }
        Ok(())
    }
}

/// A handle onto one database with visibility limited to the configured table
#[async_trait]
pub trait SqlDatabase: Send + Sync {
    fn dialect(&self) -> Dialect;

    /// Tables the agent is allowed to see
    fn usable_tables(&self) -> Vec<String>;

    /// CREATE statement plus a few sample rows for each requested table
    async fn table_info(&self, tables: &[String]) -> Result<String>;

    /// Run a statement and return at most `max_rows` rows
    async fn run(&self, sql: &str, max_rows: usize) -> Result<QueryOutput>;
}

pub(crate) const SAMPLE_ROWS: usize = 3;

/// Resolve requested table names against the allowed set (case-insensitive)
pub(crate) fn check_tables(requested: &[String], allowed: &str) -> Result<Vec<String>> {
    let mut resolved = Vec::new();
    for table in requested {
        let table = table.trim().trim_matches(|c| c == '`' || c == '"');
        if table.is_empty() {
            continue;
        }
        if !table.eq_ignore_ascii_case(allowed) {
            return Err(anyhow::anyhow!(
                "table_names {{'{}'}} not found in database",
                table
            ));
        }
        resolved.push(allowed.to_string());
    }
    if resolved.is_empty() {
        return Err(anyhow::anyhow!("No table name given"));
    }
    resolved.dedup();
    Ok(resolved)
}

/// Render schema text the way the agent's schema tool presents it
pub(crate) fn format_table_info(table: &str, create_sql: &str, sample: &QueryOutput) -> String {
    let mut out = String::new();
    out.push_str(create_sql.trim());
    out.push_str("\n\n/*\n");
    out.push_str(&format!("{} rows from {} table:\n", SAMPLE_ROWS, table));
    out.push_str(&sample.columns.join("\t"));
    out.push('\n');
    for row in &sample.rows {
        let cells: Vec<&str> = row.iter().map(|v| v.as_deref().unwrap_or("None")).collect();
        out.push_str(&cells.join("\t"));
        out.push('\n');
    }
    out.push_str("*/");
    out
}
