//! Read-only SQLite handle for the bundled inventory file

use super::{check_tables, format_table_info, Dialect, QueryOutput, SqlDatabase, SAMPLE_ROWS};
use anyhow::{Context, Result};
use async_trait::async_trait;
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

pub struct SqliteDatabase {
    conn: Arc<Mutex<Connection>>,
    path: PathBuf,
    table: String,
}

impl SqliteDatabase {
    /// Open `path` through a `file:` URI with `mode=ro`
    ///
    /// A missing file is an error; nothing is ever created.
    pub fn open_read_only(path: &Path, table: impl Into<String>) -> Result<Self> {
        let path = path
            .canonicalize()
            .with_context(|| format!("SQLite database file not found: {:?}", path))?;
        let mut uri = url::Url::from_file_path(&path)
            .map_err(|_| anyhow::anyhow!("Cannot build a file URI for {:?}", path))?;
        uri.set_query(Some("mode=ro"));

        let conn = Connection::open_with_flags(
            uri.as_str(),
            OpenFlags::SQLITE_OPEN_READ_ONLY
                | OpenFlags::SQLITE_OPEN_URI
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .with_context(|| format!("Failed to open {}", uri))?;

        tracing::info!("[SqliteDatabase] Opened {} read-only", uri);

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path,
            table: table.into(),
        })
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| anyhow::anyhow!("SQLite connection lock poisoned"))?;
            f(&guard)
        })
        .await
        .context("SQLite worker task failed")?
    }
}

fn render(value: ValueRef<'_>) -> Option<String> {
    match value {
        ValueRef::Null => None,
        ValueRef::Integer(i) => Some(i.to_string()),
        ValueRef::Real(f) => Some(f.to_string()),
        ValueRef::Text(t) => Some(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Some(format!("<{} bytes>", b.len())),
    }
}

fn run_statement(conn: &Connection, sql: &str, max_rows: usize) -> Result<QueryOutput> {
    let mut stmt = conn.prepare(sql)?;
    let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();

    if columns.is_empty() {
        let affected = stmt.execute([])?;
        return Ok(QueryOutput {
            rows_affected: Some(affected as u64),
            ..Default::default()
        });
    }

    let mut rows = stmt.query([])?;
    let mut output = QueryOutput {
        columns,
        ..Default::default()
    };

    while let Some(row) = rows.next()? {
        if output.rows.len() >= max_rows {
            output.truncated = true;
            break;
        }
        let mut values = Vec::with_capacity(output.columns.len());
        for i in 0..output.columns.len() {
            values.push(render(row.get_ref(i)?));
        }
        output.rows.push(values);
    }

    Ok(output)
}

#[async_trait]
impl SqlDatabase for SqliteDatabase {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn usable_tables(&self) -> Vec<String> {
        vec![self.table.clone()]
    }

    async fn table_info(&self, tables: &[String]) -> Result<String> {
        let tables = check_tables(tables, &self.table)?;

        self.with_conn(move |conn| {
            let mut sections = Vec::new();
            for table in tables {
                let create_sql: String = conn
                    .query_row(
                        "SELECT sql FROM sqlite_master WHERE type = 'table' AND name = ?1 COLLATE NOCASE",
                        [&table],
                        |row| row.get(0),
                    )
                    .with_context(|| format!("Table '{}' does not exist", table))?;

                let sample = run_statement(
                    conn,
                    &format!("SELECT * FROM \"{}\" LIMIT {}", table, SAMPLE_ROWS),
                    SAMPLE_ROWS,
                )?;
                sections.push(format_table_info(&table, &create_sql, &sample));
            }
            Ok(sections.join("\n\n"))
        })
        .await
    }

    async fn run(&self, sql: &str, max_rows: usize) -> Result<QueryOutput> {
        let sql = sql.trim().to_string();
        tracing::debug!("[SqliteDatabase] Running on {:?}: {}", self.path, sql);
        self.with_conn(move |conn| run_statement(conn, &sql, max_rows)).await
    }
}
