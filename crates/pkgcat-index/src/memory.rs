//! In-process store with the same observable behaviour as the SQLite one.
//! Committed state lives behind a shared handle so a later store can be
//! opened over what an earlier one committed.

use crate::store::{Datastore, Rows, StoreError};
use chrono::NaiveDate;
use pkgcat_core::daily::{dailyable, DailySelector};
use pkgcat_core::query::{Assignments, Filter};
use pkgcat_core::record::PackageRecord;
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemorySnapshot {
    pub packages: Vec<PackageRecord>,
    pub daily: BTreeSet<(NaiveDate, String)>,
}

pub type SharedSnapshot = Rc<RefCell<MemorySnapshot>>;

pub struct MemoryStore {
    selector: DailySelector,
    committed: SharedSnapshot,
    working: MemorySnapshot,
}

impl MemoryStore {
    pub fn new(selector: DailySelector) -> Self {
        MemoryStore::open(Rc::new(RefCell::new(MemorySnapshot::default())), selector)
    }

    pub fn open(committed: SharedSnapshot, selector: DailySelector) -> Self {
        let working = committed.borrow().clone();
        MemoryStore {
            selector,
            committed,
            working,
        }
    }

    pub fn committed_handle(&self) -> SharedSnapshot {
        Rc::clone(&self.committed)
    }

    fn eligible(&self) -> impl Iterator<Item = &PackageRecord> {
        self.working
            .packages
            .iter()
            .filter(|record| dailyable(&record.name, &record.repo))
    }
}

impl Datastore for MemoryStore {
    fn create(&mut self, record: &PackageRecord, dates: &[NaiveDate]) -> Result<(), StoreError> {
        self.working.packages.push(record.clone());
        if record.is_dailyable() {
            for date in self.selector.selected_dates(&record.name, dates) {
                self.working.daily.insert((date, record.name.clone()));
            }
        }
        Ok(())
    }

    fn read(&self, filter: &Filter) -> Result<Rows<PackageRecord>, StoreError> {
        let rows: Vec<_> = self
            .working
            .packages
            .iter()
            .filter(|record| filter.matches(record))
            .cloned()
            .collect();
        Ok(rows.into_iter())
    }

    fn list_all(&self) -> Result<Vec<PackageRecord>, StoreError> {
        let mut picked: BTreeMap<&str, &PackageRecord> = BTreeMap::new();
        for record in &self.working.packages {
            let entry = picked.entry(record.name.as_str()).or_insert(record);
            // Strict comparison keeps the earlier row on a full tie.
            if (&record.arch, &record.build_date) < (&entry.arch, &entry.build_date) {
                *entry = record;
            }
        }
        Ok(picked.into_values().cloned().collect())
    }

    fn update(&mut self, filter: &Filter, assignments: &Assignments) -> Result<usize, StoreError> {
        assignments.ensure_not_empty()?;
        let mut changed = 0;
        for record in self.working.packages.iter_mut() {
            if filter.matches(record) {
                assignments.apply(record);
                changed += 1;
            }
        }
        Ok(changed)
    }

    fn of_day(&self, date: NaiveDate) -> Result<Rows<String>, StoreError> {
        let names: Vec<_> = self
            .working
            .daily
            .range((date, String::new())..)
            .take_while(|(day, _)| *day == date)
            .map(|(_, name)| name.clone())
            .collect();
        Ok(names.into_iter())
    }

    fn newest(&self, count: usize) -> Result<Rows<String>, StoreError> {
        let mut latest: BTreeMap<&str, &str> = BTreeMap::new();
        for record in self.eligible().filter(|record| !record.build_date.is_empty()) {
            let entry = latest.entry(record.name.as_str()).or_insert("");
            if record.build_date.as_str() > *entry {
                *entry = record.build_date.as_str();
            }
        }
        let mut ordered: Vec<(&str, &str)> = latest.into_iter().collect();
        ordered.sort_by(|left, right| right.1.cmp(left.1).then(left.0.cmp(right.0)));
        let names: Vec<_> = ordered
            .into_iter()
            .take(count)
            .map(|(name, _)| name.to_string())
            .collect();
        Ok(names.into_iter())
    }

    fn longest_names(&self, at_most: usize) -> Result<Rows<String>, StoreError> {
        if at_most == 0 {
            return Ok(Vec::new().into_iter());
        }
        let names: BTreeSet<&str> = self.eligible().map(|record| record.name.as_str()).collect();
        let mut lengths: Vec<usize> = names.iter().map(|name| name.chars().count()).collect();
        lengths.sort_unstable_by(|left, right| right.cmp(left));
        let Some(&threshold) = lengths.get(at_most - 1) else {
            return Ok(Vec::new().into_iter());
        };
        let longer: Vec<_> = names
            .into_iter()
            .filter(|name| name.chars().count() > threshold)
            .map(str::to_string)
            .collect();
        Ok(longer.into_iter())
    }

    fn metapackages(&self) -> Result<Rows<String>, StoreError> {
        let names: BTreeSet<String> = self
            .working
            .packages
            .iter()
            .filter(|record| record.dependents_count.is_some_and(|count| count > 1))
            .filter(|record| !record.name.ends_with("-32bit"))
            .filter(|record| {
                serde_json::from_str::<serde_json::Value>(&record.repo_metadata)
                    .ok()
                    .and_then(|value| value.get("installed_size").and_then(|size| size.as_f64()))
                    == Some(0.0)
            })
            .map(|record| record.name.clone())
            .collect();
        Ok(names.into_iter().collect::<Vec<_>>().into_iter())
    }

    // Lookups scan the working set, there is nothing to index.
    fn finish_creating(&mut self) -> Result<(), StoreError> {
        Ok(())
    }

    fn commit(&mut self) -> Result<(), StoreError> {
        *self.committed.borrow_mut() = self.working.clone();
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), StoreError> {
        self.working = self.committed.borrow().clone();
        Ok(())
    }

    fn close(self: Box<Self>) -> Result<(), StoreError> {
        Ok(())
    }
}
