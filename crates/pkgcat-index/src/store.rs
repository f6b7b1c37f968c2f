use crate::memory::MemoryStore;
use crate::sqlite::SqliteStore;
use chrono::NaiveDate;
use pkgcat_core::config::{Backend, StoreSettings};
use pkgcat_core::daily::DailySelector;
use pkgcat_core::query::{Assignments, Filter, QueryError};
use pkgcat_core::record::{NormalizeError, PackageRecord};
use std::path::PathBuf;
use tracing::{debug, warn};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Db(#[from] rusqlite::Error),
    #[error("constraint violation: {0}")]
    Constraint(String),
    #[error("invalid query: {0}")]
    InvalidQuery(#[from] QueryError),
    #[error(transparent)]
    Normalize(#[from] NormalizeError),
    #[error("failed to read repository index {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse repository index {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("build store and live store share the path {0}")]
    SharedPath(PathBuf),
    #[error("failed to remove stale store {path}: {source}")]
    Discard {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to publish {from} to {to}: {source}")]
    Publish {
        from: PathBuf,
        to: PathBuf,
        source: std::io::Error,
    },
}

/// Forward-only query result. Collect it to iterate more than once.
pub type Rows<T> = std::vec::IntoIter<T>;

/// Storage of package records and of the precomputed daily subsets.
///
/// A store is opened inside a transaction. Everything written is visible to
/// later calls on the same store, and reaches storage only on [`Datastore::commit`].
pub trait Datastore {
    /// Inserts one package row, plus a daily hash entry for every date in
    /// `dates` the package is selected on.
    fn create(&mut self, record: &PackageRecord, dates: &[NaiveDate]) -> Result<(), StoreError>;

    fn read(&self, filter: &Filter) -> Result<Rows<PackageRecord>, StoreError>;

    /// One row per package name, sorted by name. Among duplicates the row with
    /// the lowest arch, then the lowest build date, then the first inserted wins.
    fn list_all(&self) -> Result<Vec<PackageRecord>, StoreError>;

    /// Applies `assignments` to every row matching `filter`, returning the
    /// number of rows changed.
    fn update(&mut self, filter: &Filter, assignments: &Assignments) -> Result<usize, StoreError>;

    fn of_day(&self, date: NaiveDate) -> Result<Rows<String>, StoreError>;

    /// Up to `count` names, most recently built first.
    fn newest(&self, count: usize) -> Result<Rows<String>, StoreError>;

    /// Names longer than the `at_most`-th longest name (counting from 1).
    fn longest_names(&self, at_most: usize) -> Result<Rows<String>, StoreError>;

    fn metapackages(&self) -> Result<Rows<String>, StoreError>;

    /// Builds secondary indices once all packages are created.
    fn finish_creating(&mut self) -> Result<(), StoreError>;

    fn commit(&mut self) -> Result<(), StoreError>;

    fn rollback(&mut self) -> Result<(), StoreError>;

    fn close(self: Box<Self>) -> Result<(), StoreError>;
}

pub fn open_store(
    settings: &StoreSettings,
    selector: DailySelector,
) -> Result<Box<dyn Datastore>, StoreError> {
    match settings.backend {
        Backend::Sqlite => Ok(Box::new(SqliteStore::open(&settings.path, selector)?)),
        Backend::Memory => Ok(Box::new(MemoryStore::new(selector))),
    }
}

/// Runs `f` against a freshly opened store. The store is committed when `f`
/// succeeds, rolled back otherwise, and closed either way.
pub fn with_store<T, F>(
    settings: &StoreSettings,
    selector: DailySelector,
    f: F,
) -> Result<T, StoreError>
where
    F: FnOnce(&mut dyn Datastore) -> Result<T, StoreError>,
{
    let store = open_store(settings, selector)?;
    scoped(store, f)
}

pub fn scoped<T, F>(mut store: Box<dyn Datastore>, f: F) -> Result<T, StoreError>
where
    F: FnOnce(&mut dyn Datastore) -> Result<T, StoreError>,
{
    match f(store.as_mut()) {
        Ok(value) => {
            let committed = store.commit();
            if committed.is_err() {
                if let Err(err) = store.rollback() {
                    warn!(error = %err, "rollback after failed commit failed");
                }
            }
            let closed = store.close();
            committed?;
            closed?;
            debug!("store committed and closed");
            Ok(value)
        }
        Err(err) => {
            warn!(error = %err, "rolling back store");
            if let Err(rollback_err) = store.rollback() {
                warn!(error = %rollback_err, "rollback failed");
            }
            if let Err(close_err) = store.close() {
                warn!(error = %close_err, "closing store failed");
            }
            Err(err)
        }
    }
}
