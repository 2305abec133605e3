//! In-memory `ShelterStorage` backend.
//!
//! Committed state lives behind one `RwLock`. A snapshot stages its writes
//! privately together with the version each write was based on; commit takes
//! the write lock, re-validates every base version and the adoption
//! uniqueness constraint, then applies all writes at once.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use shelter_core::{
    AdoptionApplication, AdoptionId, AdoptionRecord, AdoptionStatus, Animal, AnimalId,
    ApplicationId, ApplicationStatus,
};
use time::{Duration, OffsetDateTime};

use crate::error::{EntityKind, StorageError};
use crate::record::{AdoptionFilter, ApplicationFilter, Page};
use crate::stats::AdoptionStatistics;
use crate::traits::ShelterStorage;

// ── Stored rows ──────────────────────────────────────────────────────────────

trait Stored: Clone + fmt::Debug {
    type Id: Copy + Ord + fmt::Display + fmt::Debug;
    const KIND: EntityKind;

    fn key(&self) -> Self::Id;
    fn version(&self) -> i64;
    fn set_version(&mut self, version: i64);
}

macro_rules! impl_stored {
    ($ty:ty, $id:ty, $kind:expr) => {
        impl Stored for $ty {
            type Id = $id;
            const KIND: EntityKind = $kind;

            fn key(&self) -> Self::Id {
                self.id
            }

            fn version(&self) -> i64 {
                self.version
            }

            fn set_version(&mut self, version: i64) {
                self.version = version;
            }
        }
    };
}

impl_stored!(Animal, AnimalId, EntityKind::Animal);
impl_stored!(AdoptionApplication, ApplicationId, EntityKind::Application);
impl_stored!(AdoptionRecord, AdoptionId, EntityKind::Adoption);

/// A staged write and the committed version it was based on (`None` for
/// rows inserted by this snapshot).
#[derive(Debug, Clone)]
enum Write<T> {
    Put { row: T, base: Option<i64> },
    Delete { base: i64 },
}

#[derive(Debug)]
struct Staged<T: Stored> {
    writes: BTreeMap<T::Id, Write<T>>,
}

impl<T: Stored> Default for Staged<T> {
    fn default() -> Self {
        Self {
            writes: BTreeMap::new(),
        }
    }
}

impl<T: Stored> Staged<T> {
    /// The row as this snapshot sees it.
    fn visible(&self, committed: &BTreeMap<T::Id, T>, id: T::Id) -> Option<T> {
        match self.writes.get(&id) {
            Some(Write::Put { row, .. }) => Some(row.clone()),
            Some(Write::Delete { .. }) => None,
            None => committed.get(&id).cloned(),
        }
    }

    /// Committed rows overlaid with this snapshot's writes.
    fn merged(&self, committed: &BTreeMap<T::Id, T>) -> BTreeMap<T::Id, T> {
        let mut rows = committed.clone();
        for (id, write) in &self.writes {
            match write {
                Write::Put { row, .. } => {
                    rows.insert(*id, row.clone());
                }
                Write::Delete { .. } => {
                    rows.remove(id);
                }
            }
        }
        rows
    }

    fn get(&self, committed: &BTreeMap<T::Id, T>, id: T::Id) -> Result<T, StorageError> {
        self.visible(committed, id)
            .ok_or_else(|| StorageError::not_found(T::KIND, id))
    }

    fn insert(&mut self, committed: &BTreeMap<T::Id, T>, mut row: T) -> Result<(), StorageError> {
        let id = row.key();
        if self.visible(committed, id).is_some() {
            return Err(StorageError::AlreadyExists {
                entity: T::KIND,
                id: id.to_string(),
            });
        }
        let base = match self.writes.get(&id) {
            // Re-inserting a row this snapshot deleted.
            Some(Write::Delete { base }) => Some(*base),
            _ => None,
        };
        row.set_version(0);
        self.writes.insert(id, Write::Put { row, base });
        Ok(())
    }

    fn update(
        &mut self,
        committed: &BTreeMap<T::Id, T>,
        mut row: T,
        expected_version: i64,
    ) -> Result<i64, StorageError> {
        let id = row.key();
        let current = self.get(committed, id)?;
        if current.version() != expected_version {
            return Err(StorageError::conflict(T::KIND, id, expected_version));
        }
        let base = match self.writes.get(&id) {
            Some(Write::Put { base, .. }) => *base,
            _ => Some(current.version()),
        };
        let new_version = expected_version + 1;
        row.set_version(new_version);
        self.writes.insert(id, Write::Put { row, base });
        Ok(new_version)
    }

    fn delete(
        &mut self,
        committed: &BTreeMap<T::Id, T>,
        id: T::Id,
        expected_version: i64,
    ) -> Result<(), StorageError> {
        let current = self.get(committed, id)?;
        if current.version() != expected_version {
            return Err(StorageError::conflict(T::KIND, id, expected_version));
        }
        match self.writes.remove(&id) {
            Some(Write::Put { base: None, .. }) => {}
            Some(Write::Put {
                base: Some(base), ..
            })
            | Some(Write::Delete { base }) => {
                self.writes.insert(id, Write::Delete { base });
            }
            None => {
                self.writes.insert(
                    id,
                    Write::Delete {
                        base: current.version(),
                    },
                );
            }
        }
        Ok(())
    }

    /// Every base version must still be the committed one.
    fn validate(&self, committed: &BTreeMap<T::Id, T>) -> Result<(), StorageError> {
        for (id, write) in &self.writes {
            let base = match write {
                Write::Put { base, .. } => *base,
                Write::Delete { base } => Some(*base),
            };
            match (base, committed.get(id)) {
                (None, None) => {}
                (None, Some(_)) => {
                    return Err(StorageError::AlreadyExists {
                        entity: T::KIND,
                        id: id.to_string(),
                    })
                }
                (Some(base), Some(row)) if row.version() == base => {}
                (Some(base), _) => return Err(StorageError::conflict(T::KIND, id, base)),
            }
        }
        Ok(())
    }

    fn apply(self, committed: &mut BTreeMap<T::Id, T>) {
        for (id, write) in self.writes {
            match write {
                Write::Put { row, .. } => {
                    committed.insert(id, row);
                }
                Write::Delete { .. } => {
                    committed.remove(&id);
                }
            }
        }
    }

    fn staged_rows(&self) -> impl Iterator<Item = &T> {
        self.writes.values().filter_map(|w| match w {
            Write::Put { row, .. } => Some(row),
            Write::Delete { .. } => None,
        })
    }
}

// ── Storage ──────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct Tables {
    animals: BTreeMap<AnimalId, Animal>,
    applications: BTreeMap<ApplicationId, AdoptionApplication>,
    adoptions: BTreeMap<AdoptionId, AdoptionRecord>,
}

/// A pending transaction against [`MemoryStorage`].
#[derive(Debug, Default)]
pub struct MemorySnapshot {
    animals: Staged<Animal>,
    applications: Staged<AdoptionApplication>,
    adoptions: Staged<AdoptionRecord>,
}

impl MemorySnapshot {
    /// True when nothing has been staged.
    pub fn is_empty(&self) -> bool {
        self.animals.writes.is_empty()
            && self.applications.writes.is_empty()
            && self.adoptions.writes.is_empty()
    }
}

/// Process-local storage. Cloning shares the same tables.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage preloaded with committed animals (registry seed data).
    pub fn with_animals(animals: impl IntoIterator<Item = Animal>) -> Self {
        let tables = Tables {
            animals: animals.into_iter().map(|a| (a.id, a)).collect(),
            ..Tables::default()
        };
        Self {
            tables: Arc::new(RwLock::new(tables)),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>, StorageError> {
        self.tables
            .read()
            .map_err(|_| StorageError::Backend("memory storage lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>, StorageError> {
        self.tables
            .write()
            .map_err(|_| StorageError::Backend("memory storage lock poisoned".into()))
    }
}

/// No two adoption records in `rows` may share an application, where at
/// least one of the pair is in `staged`.
fn check_unique_application<'a>(
    staged: impl Iterator<Item = &'a AdoptionRecord>,
    rows: &BTreeMap<AdoptionId, AdoptionRecord>,
) -> Result<(), StorageError> {
    for record in staged {
        let clash = rows
            .values()
            .any(|other| other.id != record.id && other.application_id == record.application_id);
        if clash {
            return Err(StorageError::DuplicateAdoption {
                application_id: record.application_id.to_string(),
            });
        }
    }
    Ok(())
}

#[async_trait]
impl ShelterStorage for MemoryStorage {
    type Snapshot = MemorySnapshot;

    async fn begin_snapshot(&self) -> Result<MemorySnapshot, StorageError> {
        Ok(MemorySnapshot::default())
    }

    async fn commit_snapshot(&self, snapshot: MemorySnapshot) -> Result<(), StorageError> {
        let mut tables = self.write()?;
        snapshot.animals.validate(&tables.animals)?;
        snapshot.applications.validate(&tables.applications)?;
        snapshot.adoptions.validate(&tables.adoptions)?;
        let merged = snapshot.adoptions.merged(&tables.adoptions);
        check_unique_application(snapshot.adoptions.staged_rows(), &merged)?;

        tracing::debug!(
            animals = snapshot.animals.writes.len(),
            applications = snapshot.applications.writes.len(),
            adoptions = snapshot.adoptions.writes.len(),
            "memory snapshot committed"
        );
        let MemorySnapshot {
            animals,
            applications,
            adoptions,
        } = snapshot;
        animals.apply(&mut tables.animals);
        applications.apply(&mut tables.applications);
        adoptions.apply(&mut tables.adoptions);
        Ok(())
    }

    async fn abort_snapshot(&self, snapshot: MemorySnapshot) -> Result<(), StorageError> {
        drop(snapshot);
        Ok(())
    }

    // ── Animals ───────────────────────────────────────────────────────────────

    async fn insert_animal(
        &self,
        snapshot: &mut MemorySnapshot,
        animal: Animal,
    ) -> Result<(), StorageError> {
        let tables = self.read()?;
        snapshot.animals.insert(&tables.animals, animal)
    }

    async fn get_animal_for_update(
        &self,
        snapshot: &mut MemorySnapshot,
        id: AnimalId,
    ) -> Result<Animal, StorageError> {
        let tables = self.read()?;
        snapshot.animals.get(&tables.animals, id)
    }

    async fn update_animal(
        &self,
        snapshot: &mut MemorySnapshot,
        animal: Animal,
        expected_version: i64,
    ) -> Result<i64, StorageError> {
        let tables = self.read()?;
        snapshot
            .animals
            .update(&tables.animals, animal, expected_version)
    }

    // ── Applications ──────────────────────────────────────────────────────────

    async fn insert_application(
        &self,
        snapshot: &mut MemorySnapshot,
        application: AdoptionApplication,
    ) -> Result<(), StorageError> {
        let tables = self.read()?;
        snapshot
            .applications
            .insert(&tables.applications, application)
    }

    async fn get_application_for_update(
        &self,
        snapshot: &mut MemorySnapshot,
        id: ApplicationId,
    ) -> Result<AdoptionApplication, StorageError> {
        let tables = self.read()?;
        snapshot.applications.get(&tables.applications, id)
    }

    async fn update_application(
        &self,
        snapshot: &mut MemorySnapshot,
        application: AdoptionApplication,
        expected_version: i64,
    ) -> Result<i64, StorageError> {
        let tables = self.read()?;
        snapshot
            .applications
            .update(&tables.applications, application, expected_version)
    }

    async fn delete_application(
        &self,
        snapshot: &mut MemorySnapshot,
        id: ApplicationId,
        expected_version: i64,
    ) -> Result<(), StorageError> {
        let tables = self.read()?;
        snapshot
            .applications
            .delete(&tables.applications, id, expected_version)
    }

    // ── Adoption records ──────────────────────────────────────────────────────

    async fn insert_adoption(
        &self,
        snapshot: &mut MemorySnapshot,
        record: AdoptionRecord,
    ) -> Result<(), StorageError> {
        let tables = self.read()?;
        let merged = snapshot.adoptions.merged(&tables.adoptions);
        check_unique_application(std::iter::once(&record), &merged)?;
        snapshot.adoptions.insert(&tables.adoptions, record)
    }

    async fn get_adoption_for_update(
        &self,
        snapshot: &mut MemorySnapshot,
        id: AdoptionId,
    ) -> Result<AdoptionRecord, StorageError> {
        let tables = self.read()?;
        snapshot.adoptions.get(&tables.adoptions, id)
    }

    async fn find_adoption_by_application_for_update(
        &self,
        snapshot: &mut MemorySnapshot,
        application_id: ApplicationId,
    ) -> Result<Option<AdoptionRecord>, StorageError> {
        let tables = self.read()?;
        Ok(snapshot
            .adoptions
            .merged(&tables.adoptions)
            .into_values()
            .find(|r| r.application_id == application_id))
    }

    async fn update_adoption(
        &self,
        snapshot: &mut MemorySnapshot,
        record: AdoptionRecord,
        expected_version: i64,
    ) -> Result<i64, StorageError> {
        let tables = self.read()?;
        snapshot
            .adoptions
            .update(&tables.adoptions, record, expected_version)
    }

    async fn delete_adoption(
        &self,
        snapshot: &mut MemorySnapshot,
        id: AdoptionId,
        expected_version: i64,
    ) -> Result<(), StorageError> {
        let tables = self.read()?;
        snapshot
            .adoptions
            .delete(&tables.adoptions, id, expected_version)
    }

    // ── Queries ───────────────────────────────────────────────────────────────

    async fn get_animal(&self, id: AnimalId) -> Result<Animal, StorageError> {
        self.read()?
            .animals
            .get(&id)
            .cloned()
            .ok_or_else(|| StorageError::not_found(EntityKind::Animal, id))
    }

    async fn get_application(
        &self,
        id: ApplicationId,
    ) -> Result<AdoptionApplication, StorageError> {
        self.read()?
            .applications
            .get(&id)
            .cloned()
            .ok_or_else(|| StorageError::not_found(EntityKind::Application, id))
    }

    async fn get_adoption(&self, id: AdoptionId) -> Result<AdoptionRecord, StorageError> {
        self.read()?
            .adoptions
            .get(&id)
            .cloned()
            .ok_or_else(|| StorageError::not_found(EntityKind::Adoption, id))
    }

    async fn list_applications(
        &self,
        filter: &ApplicationFilter,
    ) -> Result<Page<AdoptionApplication>, StorageError> {
        let mut items: Vec<_> = self
            .read()?
            .applications
            .values()
            .filter(|a| filter.matches(a))
            .cloned()
            .collect();
        filter.sort(&mut items);
        Ok(Page::from_sorted(items, filter.offset, filter.limit))
    }

    async fn list_adoptions(
        &self,
        filter: &AdoptionFilter,
    ) -> Result<Page<AdoptionRecord>, StorageError> {
        let mut items: Vec<_> = self
            .read()?
            .adoptions
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        filter.sort(&mut items);
        Ok(Page::from_sorted(items, filter.offset, filter.limit))
    }

    async fn applications_by_animal(
        &self,
        animal_id: AnimalId,
    ) -> Result<Vec<AdoptionApplication>, StorageError> {
        let mut items: Vec<_> = self
            .read()?
            .applications
            .values()
            .filter(|a| a.animal_id == animal_id)
            .cloned()
            .collect();
        items.sort_by(|a, b| b.application_date.cmp(&a.application_date));
        Ok(items)
    }

    async fn pending_applications(&self) -> Result<Vec<AdoptionApplication>, StorageError> {
        let mut items: Vec<_> = self
            .read()?
            .applications
            .values()
            .filter(|a| a.status == ApplicationStatus::Submitted)
            .cloned()
            .collect();
        items.sort_by(|a, b| a.application_date.cmp(&b.application_date));
        Ok(items)
    }

    async fn adoption_by_animal(
        &self,
        animal_id: AnimalId,
    ) -> Result<Option<AdoptionRecord>, StorageError> {
        Ok(self
            .read()?
            .adoptions
            .values()
            .filter(|r| r.animal_id == animal_id)
            .max_by_key(|r| r.adoption_date)
            .cloned())
    }

    async fn adoption_by_application(
        &self,
        application_id: ApplicationId,
    ) -> Result<Option<AdoptionRecord>, StorageError> {
        Ok(self
            .read()?
            .adoptions
            .values()
            .find(|r| r.application_id == application_id)
            .cloned())
    }

    async fn pending_follow_ups(
        &self,
        days: u32,
        now: OffsetDateTime,
    ) -> Result<Vec<AdoptionRecord>, StorageError> {
        // `None` past the representable range: everything after `now` counts.
        let horizon = now.checked_add(Duration::days(i64::from(days)));
        let mut items: Vec<_> = self
            .read()?
            .adoptions
            .values()
            .filter(|r| {
                matches!(r.status, AdoptionStatus::Active | AdoptionStatus::Completed)
                    && r
                        .next_follow_up_date
                        .is_some_and(|next| next >= now && horizon.map_or(true, |h| next <= h))
            })
            .cloned()
            .collect();
        items.sort_by_key(|r| r.next_follow_up_date);
        Ok(items)
    }

    async fn adoption_statistics(
        &self,
        now: OffsetDateTime,
    ) -> Result<AdoptionStatistics, StorageError> {
        let tables = self.read()?;
        Ok(AdoptionStatistics::from_records(tables.adoptions.values(), now))
    }
}
