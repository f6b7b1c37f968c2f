use crate::schema::{ELIGIBLE, INDICES, SCHEMA};
use crate::store::{Datastore, Rows, StoreError};
use chrono::NaiveDate;
use pkgcat_core::daily::{date_as_string, DailySelector};
use pkgcat_core::query::{Assignments, Field, FieldValue, Filter};
use pkgcat_core::record::PackageRecord;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, ErrorCode, Row};
use std::path::Path;
use tracing::{debug, info, warn};

pub struct SqliteStore {
    conn: Connection,
    selector: DailySelector,
}

impl SqliteStore {
    /// Opens (creating if needed) the database at `path` and begins a transaction.
    pub fn open(path: &Path, selector: DailySelector) -> Result<SqliteStore, StoreError> {
        debug!(path = %path.display(), "opening sqlite store");
        SqliteStore::from_connection(Connection::open(path)?, selector)
    }

    pub fn open_in_memory(selector: DailySelector) -> Result<SqliteStore, StoreError> {
        SqliteStore::from_connection(Connection::open_in_memory()?, selector)
    }

    fn from_connection(
        conn: Connection,
        selector: DailySelector,
    ) -> Result<SqliteStore, StoreError> {
        conn.execute_batch(SCHEMA)?;
        conn.execute_batch("BEGIN")?;
        Ok(SqliteStore { conn, selector })
    }

    fn in_transaction(&self) -> bool {
        !self.conn.is_autocommit()
    }

    fn query_names(&self, sql: &str, args: &[Value]) -> Result<Rows<String>, StoreError> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params_from_iter(args.iter()), |row| {
            row.get::<_, String>(0)
        })?;
        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }
        Ok(results.into_iter())
    }

    fn query_records(&self, sql: &str, args: &[Value]) -> Result<Vec<PackageRecord>, StoreError> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params_from_iter(args.iter()), record_from_row)?;
        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }
        Ok(results)
    }
}

fn columns() -> String {
    Field::ALL
        .iter()
        .map(|field| field.column())
        .collect::<Vec<_>>()
        .join(", ")
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<PackageRecord> {
    Ok(PackageRecord {
        name: row.get(0)?,
        version: row.get(1)?,
        arch: row.get(2)?,
        restricted: row.get::<_, i32>(3)? != 0,
        build_date: row.get(4)?,
        repo_metadata: row.get(5)?,
        extra_metadata: row.get(6)?,
        dependents_count: row.get(7)?,
        upstream_version: row.get(8)?,
        repo: row.get(9)?,
    })
}

fn sql_value(value: &FieldValue) -> Value {
    match value {
        FieldValue::Text(text) => Value::Text(text.clone()),
        FieldValue::Bool(flag) => Value::Integer(i64::from(*flag)),
        FieldValue::Integer(Some(count)) => Value::Integer(*count),
        FieldValue::Integer(None) => Value::Null,
    }
}

/// `WHERE` clause for `filter`, numbering placeholders from `first`. `IS`
/// makes a null constraint match null columns.
fn where_clause(filter: &Filter, first: usize) -> String {
    if filter.is_empty() {
        return String::new();
    }
    let terms: Vec<String> = filter
        .constraints()
        .iter()
        .enumerate()
        .map(|(i, (field, _))| format!("{} IS ?{}", field.column(), first + i))
        .collect();
    format!(" WHERE {}", terms.join(" AND "))
}

fn store_error(err: rusqlite::Error) -> StoreError {
    if err.sqlite_error_code() == Some(ErrorCode::ConstraintViolation) {
        StoreError::Constraint(err.to_string())
    } else {
        StoreError::Db(err)
    }
}

impl Datastore for SqliteStore {
    fn create(&mut self, record: &PackageRecord, dates: &[NaiveDate]) -> Result<(), StoreError> {
        let mut insert = self.conn.prepare_cached(
            "INSERT INTO packages (pkgname, pkgver, arch, restricted, builddate, repodata, templatedata, depends_count, upstreamver, repo) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        )?;
        insert
            .execute(params![
                record.name,
                record.version,
                record.arch,
                record.restricted as i32,
                record.build_date,
                record.repo_metadata,
                record.extra_metadata,
                record.dependents_count,
                record.upstream_version,
                record.repo,
            ])
            .map_err(store_error)?;

        if !record.is_dailyable() {
            return Ok(());
        }
        let mut daily = self
            .conn
            .prepare_cached("INSERT OR IGNORE INTO daily_hash (pkgname, date) VALUES (?1, ?2)")?;
        for date in self.selector.selected_dates(&record.name, dates) {
            daily
                .execute(params![record.name, date_as_string(date)])
                .map_err(store_error)?;
        }
        Ok(())
    }

    fn read(&self, filter: &Filter) -> Result<Rows<PackageRecord>, StoreError> {
        let sql = format!(
            "SELECT {} FROM packages{} ORDER BY rowid",
            columns(),
            where_clause(filter, 1)
        );
        let args: Vec<Value> = filter
            .constraints()
            .iter()
            .map(|(_, value)| sql_value(value))
            .collect();
        Ok(self.query_records(&sql, &args)?.into_iter())
    }

    fn list_all(&self) -> Result<Vec<PackageRecord>, StoreError> {
        let sql = format!(
            "SELECT {cols} FROM ( \
                 SELECT {cols}, ROW_NUMBER() OVER ( \
                     PARTITION BY pkgname ORDER BY arch, builddate, rowid \
                 ) AS pick FROM packages \
             ) WHERE pick = 1 ORDER BY pkgname",
            cols = columns()
        );
        self.query_records(&sql, &[])
    }

    fn update(&mut self, filter: &Filter, assignments: &Assignments) -> Result<usize, StoreError> {
        assignments.ensure_not_empty()?;
        let sets: Vec<String> = assignments
            .values()
            .iter()
            .enumerate()
            .map(|(i, (field, _))| format!("{} = ?{}", field.column(), i + 1))
            .collect();
        let sql = format!(
            "UPDATE packages SET {}{}",
            sets.join(", "),
            where_clause(filter, sets.len() + 1)
        );
        let args: Vec<Value> = assignments
            .values()
            .iter()
            .chain(filter.constraints())
            .map(|(_, value)| sql_value(value))
            .collect();
        let changed = self
            .conn
            .execute(&sql, params_from_iter(args.iter()))
            .map_err(store_error)?;
        debug!(changed, "updated packages");
        Ok(changed)
    }

    fn of_day(&self, date: NaiveDate) -> Result<Rows<String>, StoreError> {
        self.query_names(
            "SELECT pkgname FROM daily_hash WHERE date = ?1 ORDER BY pkgname",
            &[Value::Text(date_as_string(date))],
        )
    }

    fn newest(&self, count: usize) -> Result<Rows<String>, StoreError> {
        let sql = format!(
            "SELECT pkgname FROM packages \
             WHERE {ELIGIBLE} AND builddate != '' \
             GROUP BY pkgname \
             ORDER BY MAX(builddate) DESC, pkgname \
             LIMIT ?1"
        );
        let limit = i64::try_from(count).unwrap_or(i64::MAX);
        self.query_names(&sql, &[Value::Integer(limit)])
    }

    fn longest_names(&self, at_most: usize) -> Result<Rows<String>, StoreError> {
        if at_most == 0 {
            return Ok(Vec::new().into_iter());
        }
        let sql = format!(
            "SELECT DISTINCT pkgname FROM packages \
             WHERE {ELIGIBLE} \
             AND length(pkgname) > ( \
                 SELECT length(pkgname) FROM ( \
                     SELECT DISTINCT pkgname FROM packages WHERE {ELIGIBLE} \
                 ) \
                 ORDER BY length(pkgname) DESC \
                 LIMIT 1 OFFSET ?1 \
             ) \
             ORDER BY pkgname"
        );
        let offset = i64::try_from(at_most - 1).unwrap_or(i64::MAX);
        self.query_names(&sql, &[Value::Integer(offset)])
    }

    fn metapackages(&self) -> Result<Rows<String>, StoreError> {
        self.query_names(
            "SELECT DISTINCT pkgname FROM packages \
             WHERE depends_count > 1 \
             AND pkgname NOT GLOB '*-32bit' \
             AND CASE WHEN json_valid(repodata) \
                 THEN json_extract(repodata, '$.installed_size') END = 0 \
             ORDER BY pkgname",
            &[],
        )
    }

    fn finish_creating(&mut self) -> Result<(), StoreError> {
        self.conn.execute_batch(INDICES)?;
        info!("created package indices");
        Ok(())
    }

    fn commit(&mut self) -> Result<(), StoreError> {
        if self.in_transaction() {
            self.conn.execute_batch("COMMIT")?;
        }
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), StoreError> {
        if self.in_transaction() {
            self.conn.execute_batch("ROLLBACK")?;
        }
        Ok(())
    }

    fn close(self: Box<Self>) -> Result<(), StoreError> {
        let mut store = *self;
        store.rollback()?;
        debug!("closing sqlite store");
        Ok(())
    }
}

impl Drop for SqliteStore {
    fn drop(&mut self) {
        if self.in_transaction() {
            if let Err(err) = self.conn.execute_batch("ROLLBACK") {
                warn!(error = %err, "rollback on drop failed");
            }
        }
    }
}
