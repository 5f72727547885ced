//! Relational driver backed by MySQL.
//!
//! Rows travel as raw text-protocol bytes; MySQL coerces the bound bytes
//! back into column types on insert.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use sqlx::mysql::{MySqlPool, MySqlPoolOptions, MySqlRow};
use sqlx::Row as _;
use tracing::info;

use super::options::{Options, OptionsExt};
use super::types::{DriverError, ExtractionTask, LoadTask, ResultSet, Row, Value};
use super::{Destination, Source};

const QUERY: &str = "query";

static IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[\p{L}_][\p{L}\p{N}@$#_]{0,127}$").expect("identifier pattern is valid")
});

fn identifier<'a>(options: &'a Options, key: &str) -> Result<&'a str, DriverError> {
    let value = options.require_str(key)?;
    if !IDENTIFIER.is_match(value) {
        return Err(DriverError::Configuration(format!(
            "invalid {} name `{}`",
            key, value
        )));
    }
    Ok(value)
}

async fn connect(options: &Options) -> Result<MySqlPool, DriverError> {
    let endpoint = options.require_str("endpoint")?;
    MySqlPoolOptions::new()
        .connect(endpoint)
        .await
        .map_err(|e| DriverError::Connection(e.to_string()))
}

async fn ensure_table(pool: &MySqlPool, database: &str, table: &str) -> Result<(), DriverError> {
    let found: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM information_schema.tables WHERE table_schema = ? AND table_name = ?",
    )
    .bind(database)
    .bind(table)
    .fetch_one(pool)
    .await
    .map_err(|e| DriverError::Connection(e.to_string()))?;

    if found == 0 {
        return Err(DriverError::Configuration(format!(
            "table not found `{}`.`{}`",
            database, table
        )));
    }
    Ok(())
}

fn decode(row: &MySqlRow) -> Result<Row, sqlx::Error> {
    (0..row.len())
        .map(|i| {
            row.try_get_unchecked::<Option<Vec<u8>>, _>(i)
                .map(Value::from)
        })
        .collect()
}

pub struct MysqlSource {
    pool: MySqlPool,
    database: String,
    table: String,
    columns: String,
    limit: u64,
    offset: u64,
    count: u64,
}

impl MysqlSource {
    pub async fn connect(options: &Options) -> Result<Self, DriverError> {
        let database = identifier(options, "database")?.to_string();
        let table = identifier(options, "table")?.to_string();
        let columns = match options.str_opt("columns")? {
            Some(columns) if !columns.is_empty() => columns.to_string(),
            _ => "*".to_string(),
        };
        let limit = options.u64_opt("limit")?.unwrap_or(1).max(1);
        let offset = options.u64_opt("offset")?.unwrap_or(0);

        let pool = connect(options).await?;
        ensure_table(&pool, &database, &table).await?;

        let count = match options.u64_opt("count")?.unwrap_or(0) {
            0 => {
                let total: i64 =
                    sqlx::query_scalar(&format!("SELECT COUNT(*) FROM `{}`.`{}`", database, table))
                        .fetch_one(&pool)
                        .await
                        .map_err(|e| DriverError::Connection(e.to_string()))?;
                info!(database = %database, table = %table, rows = total, "counted source rows");
                total.max(0) as u64
            }
            count => count,
        };

        Ok(Self {
            pool,
            database,
            table,
            columns,
            limit,
            offset,
            count,
        })
    }
}

#[async_trait]
impl Source for MysqlSource {
    async fn plan(&self) -> Result<Vec<ExtractionTask>, DriverError> {
        let mut tasks = Vec::new();
        let mut offset = self.offset;
        while offset < self.count {
            let query = format!(
                "SELECT {} FROM `{}`.`{}` LIMIT {}, {}",
                self.columns, self.database, self.table, offset, self.limit
            );
            tasks.push(ExtractionTask::new().with(QUERY, query));
            offset += self.limit;
        }
        Ok(tasks)
    }

    async fn extract(&self, task: &ExtractionTask) -> Result<ResultSet, DriverError> {
        let query = task
            .get_str(QUERY)
            .ok_or_else(|| DriverError::Extraction("task has no query".to_string()))?;

        let rows = sqlx::raw_sql(query)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DriverError::Extraction(e.to_string()))?;

        rows.iter()
            .map(decode)
            .collect::<Result<ResultSet, _>>()
            .map_err(|e| DriverError::Extraction(e.to_string()))
    }
}

/// Bind values for one row; bytes go to the server untouched.
fn parameters(row: &Row) -> Vec<Option<&[u8]>> {
    row.iter().map(Value::as_raw).collect()
}

pub struct MysqlDestination {
    pool: MySqlPool,
    database: String,
    table: String,
}

impl MysqlDestination {
    pub async fn connect(options: &Options) -> Result<Self, DriverError> {
        let database = identifier(options, "database")?.to_string();
        let table = identifier(options, "table")?.to_string();
        let truncate = options.bool_opt("truncate")?.unwrap_or(false);

        let pool = connect(options).await?;
        ensure_table(&pool, &database, &table).await?;

        if truncate {
            info!(database = %database, table = %table, "truncating destination table");
            sqlx::raw_sql(&format!("TRUNCATE TABLE `{}`.`{}`", database, table))
                .execute(&pool)
                .await
                .map_err(|e| DriverError::Connection(e.to_string()))?;
        }

        Ok(Self {
            pool,
            database,
            table,
        })
    }
}

#[async_trait]
impl Destination for MysqlDestination {
    async fn adapt(&self, rows: ResultSet) -> Result<LoadTask, DriverError> {
        let width = rows.first().map_or(0, Vec::len);
        if rows.iter().any(|row| row.len() != width) {
            return Err(DriverError::Adaptation(
                "rows have differing column counts".to_string(),
            ));
        }

        let marks = vec!["?"; width].join(", ");
        let query = format!(
            "INSERT INTO `{}`.`{}` VALUES ({})",
            self.database, self.table, marks
        );
        Ok(LoadTask::new(rows).with(QUERY, query))
    }

    async fn persist(&self, task: LoadTask) -> Result<usize, DriverError> {
        let rows = task.row_count();
        if rows == 0 {
            return Ok(0);
        }
        let query = task
            .get_str(QUERY)
            .ok_or_else(|| DriverError::persistence(rows, "task has no query"))?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DriverError::persistence(rows, e))?;
        for row in &task.rows {
            let mut statement = sqlx::query(query);
            for parameter in parameters(row) {
                statement = statement.bind(parameter);
            }
            statement
                .execute(&mut *tx)
                .await
                .map_err(|e| DriverError::persistence(rows, e))?;
        }
        tx.commit()
            .await
            .map_err(|e| DriverError::persistence(rows, e))?;

        Ok(rows)
    }
}
