//! MySQL handle over an sqlx pool

use super::{
    check_tables, format_table_info, Dialect, QueryOutput, RemoteParams, SqlDatabase, SAMPLE_ROWS,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::TryStreamExt;
use sqlx::mysql::{MySqlPool, MySqlPoolOptions, MySqlRow};
use sqlx::{Column, Either, Row, TypeInfo, ValueRef};
use std::time::Duration;

pub struct MySqlDatabase {
    pool: MySqlPool,
    table: String,
}

impl MySqlDatabase {
    pub async fn connect(
        params: &RemoteParams,
        table: impl Into<String>,
        acquire_timeout: Duration,
    ) -> Result<Self> {
        let url = params.connection_url()?;

        let pool = MySqlPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(acquire_timeout)
            .connect(url.as_str())
            .await
            .with_context(|| format!("Failed to connect to {}", params))?;

        tracing::info!("[MySqlDatabase] Connected to {}", params);

        Ok(Self {
            pool,
            table: table.into(),
        })
    }
}

fn render(row: &MySqlRow, index: usize) -> Option<String> {
    let is_null = row.try_get_raw(index).map(|v| v.is_null()).unwrap_or(true);
    if is_null {
        return None;
    }

    if let Ok(v) = row.try_get::<String, _>(index) {
        return Some(v);
    }
    if let Ok(v) = row.try_get::<i64, _>(index) {
        return Some(v.to_string());
    }
    if let Ok(v) = row.try_get::<u64, _>(index) {
        return Some(v.to_string());
    }
    if let Ok(v) = row.try_get::<f64, _>(index) {
        return Some(v.to_string());
    }
    if let Ok(v) = row.try_get::<f32, _>(index) {
        return Some(v.to_string());
    }
    if let Ok(v) = row.try_get::<bool, _>(index) {
        return Some(v.to_string());
    }
    if let Ok(v) = row.try_get::<Vec<u8>, _>(index) {
        return Some(String::from_utf8_lossy(&v).into_owned());
    }
    // raw_sql uses the text protocol, so DECIMAL and temporal values arrive as text
    if let Ok(v) = row.try_get_unchecked::<String, _>(index) {
        return Some(v);
    }

    let type_name = row.columns()[index].type_info().name().to_string();
    Some(format!("<{}>", type_name))
}

fn returns_rows(sql: &str) -> bool {
    let keyword = sql
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .trim_start_matches('(')
        .to_ascii_uppercase();
    matches!(
        keyword.as_str(),
        "SELECT" | "SHOW" | "WITH" | "DESCRIBE" | "DESC" | "EXPLAIN"
    )
}

fn row_values(row: &MySqlRow) -> Vec<Option<String>> {
    (0..row.columns().len()).map(|i| render(row, i)).collect()
}

#[async_trait]
impl SqlDatabase for MySqlDatabase {
    fn dialect(&self) -> Dialect {
        Dialect::Mysql
    }

    fn usable_tables(&self) -> Vec<String> {
        vec![self.table.clone()]
    }

    async fn table_info(&self, tables: &[String]) -> Result<String> {
        let tables = check_tables(tables, &self.table)?;

        let mut sections = Vec::new();
        for table in tables {
            let create_row = sqlx::query(&format!("SHOW CREATE TABLE `{}`", table))
                .fetch_one(&self.pool)
                .await
                .with_context(|| format!("Table '{}' does not exist", table))?;
            let create_sql = render(&create_row, 1).unwrap_or_default();

            let sample = self
                .run(&format!("SELECT * FROM `{}` LIMIT {}", table, SAMPLE_ROWS), SAMPLE_ROWS)
                .await?;
            sections.push(format_table_info(&table, &create_sql, &sample));
        }
        Ok(sections.join("\n\n"))
    }

    async fn run(&self, sql: &str, max_rows: usize) -> Result<QueryOutput> {
        let sql = sql.trim();
        tracing::debug!("[MySqlDatabase] Running: {}", sql);

        let mut output = QueryOutput::default();
        let mut affected = 0u64;
        let mut saw_rows = false;

        let mut stream = sqlx::raw_sql(sql).fetch_many(&self.pool);
        while let Some(item) = stream.try_next().await? {
            match item {
                Either::Left(result) => affected += result.rows_affected(),
                Either::Right(row) => {
                    if !saw_rows {
                        output.columns = row.columns().iter().map(|c| c.name().to_string()).collect();
                        saw_rows = true;
                    }
                    if output.rows.len() >= max_rows {
                        output.truncated = true;
                        break;
                    }
                    output.rows.push(row_values(&row));
                }
            }
        }

        if !saw_rows && !returns_rows(sql) {
            output.rows_affected = Some(affected);
        }
        Ok(output)
    }
}
