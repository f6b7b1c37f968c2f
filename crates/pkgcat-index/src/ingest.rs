use crate::store::{with_store, Datastore, StoreError};
use chrono::NaiveDate;
use pkgcat_core::config::{Backend, Config, StoreSettings};
use pkgcat_core::daily::{date_window, DailySelector};
use pkgcat_core::record::{normalize, RawAttributes, RawValue};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Package name to raw index attributes, for one repository.
pub type RepoIndex = BTreeMap<String, RawAttributes>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildSummary {
    pub repos: Vec<(String, usize)>,
    pub skipped: Vec<String>,
    pub published: bool,
}

impl BuildSummary {
    pub fn packages(&self) -> usize {
        self.repos.iter().map(|(_, count)| count).sum()
    }
}

pub fn index_path(dir: &Path, repo: &str) -> PathBuf {
    dir.join(repo).join("index.json")
}

/// Reads a JSON dump of a repository index, `None` when there is no dump.
pub fn load_repo_index(path: &Path) -> Result<Option<RepoIndex>, StoreError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(StoreError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    parse_repo_index(&content)
        .map(Some)
        .map_err(|source| StoreError::Json {
            path: path.to_path_buf(),
            source,
        })
}

pub fn parse_repo_index(content: &str) -> Result<RepoIndex, serde_json::Error> {
    let value: serde_json::Value = serde_json::from_str(content)?;
    let mut index = RepoIndex::new();
    let obj = match value {
        serde_json::Value::Object(obj) => obj,
        _ => return Ok(index),
    };

    for (pkgname, entry) in obj {
        let entry = match entry {
            serde_json::Value::Object(map) => map,
            _ => {
                warn!(package = %pkgname, "skipping index entry that is not an object");
                continue;
            }
        };
        let attributes = entry
            .into_iter()
            .map(|(key, value)| (key, RawValue::from(value)))
            .collect();
        index.insert(pkgname, attributes);
    }

    Ok(index)
}

/// Normalizes and stores every package of one repository. The first package
/// that fails to normalize aborts the whole repository.
pub fn ingest_repo(
    store: &mut dyn Datastore,
    repo: &str,
    index: &RepoIndex,
    dates: &[NaiveDate],
) -> Result<usize, StoreError> {
    for (pkgname, attributes) in index {
        let record = normalize(pkgname, attributes, repo)?;
        store.create(&record, dates)?;
    }
    info!(repo, packages = index.len(), "ingested repository");
    Ok(index.len())
}

pub fn ingest_repos(
    store: &mut dyn Datastore,
    dir: &Path,
    repos: &[String],
    dates: &[NaiveDate],
) -> Result<BuildSummary, StoreError> {
    let mut summary = BuildSummary::default();
    for repo in repos {
        let path = index_path(dir, repo);
        let Some(index) = load_repo_index(&path)? else {
            warn!(repo = %repo, path = %path.display(), "no repository index, skipping");
            summary.skipped.push(repo.clone());
            continue;
        };
        let count = ingest_repo(store, repo, &index, dates)?;
        summary.repos.push((repo.clone(), count));
    }
    Ok(summary)
}

/// Builds a fresh store from the configured repositories and swaps it in as
/// the live store. A failed ingestion leaves the live store untouched.
pub fn rebuild(config: &Config, today: NaiveDate) -> Result<BuildSummary, StoreError> {
    let build = config.store_settings(true);
    let live = config.store_settings(false);
    let selector = DailySelector::new(config.daily.bits);
    let dates = date_window(today, config.daily.window_days);

    if build.backend == Backend::Sqlite
        && live.backend == Backend::Sqlite
        && build.path == live.path
    {
        return Err(StoreError::SharedPath(live.path.clone()));
    }
    discard_build_store(build)?;
    info!(
        bits = selector.bits(),
        days = dates.len(),
        start = %today,
        "building package store"
    );
    let mut summary = with_store(build, selector, |store| {
        let summary = ingest_repos(store, &config.index.dir, &config.index.repos, &dates)?;
        store.finish_creating()?;
        Ok(summary)
    })?;
    summary.published = publish(build, live)?;
    Ok(summary)
}

fn discard_build_store(build: &StoreSettings) -> Result<(), StoreError> {
    if build.backend != Backend::Sqlite {
        return Ok(());
    }
    for path in [build.path.clone(), journal_path(&build.path)] {
        match std::fs::remove_file(&path) {
            Ok(()) => debug!(path = %path.display(), "removed stale build store"),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(source) => return Err(StoreError::Discard { path, source }),
        }
    }
    Ok(())
}

fn journal_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push("-journal");
    PathBuf::from(name)
}

/// Renames the build store over the live store. Only file backed stores on
/// both ends can be published.
pub fn publish(build: &StoreSettings, live: &StoreSettings) -> Result<bool, StoreError> {
    if build.backend != Backend::Sqlite || live.backend != Backend::Sqlite {
        info!("store is not file backed, nothing to publish");
        return Ok(false);
    }
    std::fs::rename(&build.path, &live.path).map_err(|source| StoreError::Publish {
        from: build.path.clone(),
        to: live.path.clone(),
        source,
    })?;
    info!(path = %live.path.display(), "published package store");
    Ok(true)
}
