use crate::store::{Datastore, StoreError};
use chrono::{Local, NaiveDate};
use pkgcat_core::query::{Assignments, Field, Filter};
use pkgcat_core::record::PackageRecord;

/// Read side of the catalog, as used by the presentation layer.
pub struct Catalog<'a> {
    store: &'a dyn Datastore,
}

impl<'a> Catalog<'a> {
    pub fn new(store: &'a dyn Datastore) -> Self {
        Catalog { store }
    }

    /// Every row stored for `name`, across repositories.
    pub fn package(&self, name: &str) -> Result<Vec<PackageRecord>, StoreError> {
        Ok(self.store.read(&Filter::by_name(name))?.collect())
    }

    /// Rows for `name` in the given repositories, in repository order.
    pub fn package_in_repos(
        &self,
        name: &str,
        repos: &[String],
    ) -> Result<Vec<PackageRecord>, StoreError> {
        let mut records = Vec::new();
        for repo in repos {
            let filter = Filter::by_name(name).with(Field::Repo, repo.as_str())?;
            records.extend(self.store.read(&filter)?);
        }
        Ok(records)
    }

    /// Distinct names containing `term`.
    pub fn search(&self, term: &str) -> Result<Vec<String>, StoreError> {
        Ok(self
            .store
            .list_all()?
            .into_iter()
            .map(|record| record.name)
            .filter(|name| name.contains(term))
            .collect())
    }

    pub fn names(&self) -> Result<Vec<String>, StoreError> {
        Ok(self
            .store
            .list_all()?
            .into_iter()
            .map(|record| record.name)
            .collect())
    }

    pub fn newest(&self, count: usize) -> Result<Vec<String>, StoreError> {
        Ok(self.store.newest(count)?.collect())
    }

    pub fn longest_names(&self, at_most: usize) -> Result<Vec<String>, StoreError> {
        Ok(self.store.longest_names(at_most)?.collect())
    }

    pub fn of_day(&self, date: NaiveDate) -> Result<Vec<String>, StoreError> {
        Ok(self.store.of_day(date)?.collect())
    }

    pub fn today(&self) -> Result<Vec<String>, StoreError> {
        self.of_day(Local::now().date_naive())
    }

    pub fn metapackages(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.store.metapackages()?.collect())
    }
}

pub fn set_upstream_version(
    store: &mut dyn Datastore,
    name: &str,
    version: &str,
) -> Result<usize, StoreError> {
    let assignments = Assignments::new().set(Field::UpstreamVersion, version)?;
    store.update(&Filter::by_name(name), &assignments)
}

pub fn set_dependents_count(
    store: &mut dyn Datastore,
    name: &str,
    count: i64,
) -> Result<usize, StoreError> {
    let assignments = Assignments::new().set(Field::DependentsCount, count)?;
    store.update(&Filter::by_name(name), &assignments)
}

#[cfg(test)]
mod tests {
    use crate::catalog::{set_dependents_count, set_upstream_version, Catalog};
    use crate::memory::MemoryStore;
    use crate::store::Datastore;
    use pkgcat_core::daily::DailySelector;
    use pkgcat_core::record::PackageRecord;

    fn record(name: &str, repo: &str) -> PackageRecord {
        PackageRecord {
            name: name.to_string(),
            version: format!("{name}-1.0_1"),
            arch: repo.rsplit('/').next().unwrap_or(repo).to_string(),
            restricted: false,
            build_date: "2021-05-01".to_string(),
            repo_metadata: "{}".to_string(),
            extra_metadata: "{}".to_string(),
            dependents_count: None,
            upstream_version: String::new(),
            repo: repo.to_string(),
        }
    }

    fn store() -> MemoryStore {
        let mut store = MemoryStore::new(DailySelector::new(0));
        for package in [
            record("vim", "current"),
            record("vim", "current/aarch64"),
            record("vim-common", "current"),
            record("neovim", "current"),
        ] {
            store.create(&package, &[]).expect("create failed");
        }
        store
    }

    #[test]
    fn package_returns_every_repo_row() {
        let store = store();
        let catalog = Catalog::new(&store);
        assert_eq!(catalog.package("vim").expect("query failed").len(), 2);
        assert!(catalog.package("emacs").expect("query failed").is_empty());
    }

    #[test]
    fn package_in_repos_follows_repo_order() {
        let store = store();
        let catalog = Catalog::new(&store);
        let rows = catalog
            .package_in_repos(
                "vim",
                &["current/aarch64".to_string(), "current".to_string()],
            )
            .expect("query failed");
        let repos: Vec<_> = rows.iter().map(|row| row.repo.as_str()).collect();
        assert_eq!(repos, vec!["current/aarch64", "current"]);
    }

    #[test]
    fn search_matches_substrings_of_distinct_names() {
        let store = store();
        let catalog = Catalog::new(&store);
        assert_eq!(
            catalog.search("vim").expect("query failed"),
            vec![
                "neovim".to_string(),
                "vim".to_string(),
                "vim-common".to_string()
            ]
        );
    }

    #[test]
    fn enrichment_updates_only_named_package() {
        let mut store = store();
        let changed = set_upstream_version(&mut store, "vim", "9.1").expect("update failed");
        assert_eq!(changed, 2);
        set_dependents_count(&mut store, "neovim", 3).expect("update failed");

        let catalog = Catalog::new(&store);
        let vim = catalog.package("vim").expect("query failed");
        assert!(vim.iter().all(|row| row.upstream_version == "9.1"));
        let common = catalog.package("vim-common").expect("query failed");
        assert!(common[0].upstream_version.is_empty());
        let neovim = catalog.package("neovim").expect("query failed");
        assert_eq!(neovim[0].dependents_count, Some(3));
    }
}
