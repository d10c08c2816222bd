use crate::error::Error;
use crate::paths::normalize_library_path;
use crate::service::{ContainerRecord, EntityKind, EntityRecord, FileRecord, LibraryCatalog};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Container and file-record lookups memoized for one run.
///
/// Many deleted episodes share a series, so each container is fetched once.
/// A failed lookup is not cached and will be retried by the next caller.
#[derive(Debug, Default)]
pub struct RunCache {
    containers: HashMap<i64, Option<ContainerRecord>>,
    files: HashMap<i64, Option<FileRecord>>,
    container_fetches: usize,
    file_fetches: usize,
}

impl RunCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn container<C: LibraryCatalog + ?Sized>(
        &mut self,
        catalog: &C,
        id: i64,
    ) -> Result<Option<&ContainerRecord>, Error> {
        if !self.containers.contains_key(&id) {
            let fetched = catalog.container(id)?;
            self.container_fetches += 1;
            self.containers.insert(id, fetched);
        }
        Ok(self.containers.get(&id).and_then(Option::as_ref))
    }

    pub fn file_record<C: LibraryCatalog + ?Sized>(
        &mut self,
        catalog: &C,
        entity: &EntityRecord,
    ) -> Result<Option<FileRecord>, Error> {
        let Some(file_id) = entity.file_id else {
            return catalog.file_record(entity);
        };
        if !self.files.contains_key(&file_id) {
            let fetched = catalog.file_record(entity)?;
            self.file_fetches += 1;
            self.files.insert(file_id, fetched);
        }
        Ok(self.files.get(&file_id).cloned().flatten())
    }

    /// Display title for a container, fetching it on first use.
    pub fn container_title<C: LibraryCatalog + ?Sized>(&mut self, catalog: &C, id: i64) -> String {
        match self.container(catalog, id) {
            Ok(Some(c)) => c.title.clone().unwrap_or_else(|| format!("Series {}", id)),
            Ok(None) => format!("Series {}", id),
            Err(e) => {
                warn!("Could not fetch container {}: {}", id, e);
                format!("Series {}", id)
            }
        }
    }

    pub fn container_fetches(&self) -> usize {
        self.container_fetches
    }

    pub fn file_fetches(&self) -> usize {
        self.file_fetches
    }
}

/// What the service currently says about an entity's file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// A file exists at this normalized path.
    Present(String),
    /// The service reports a file but its location could not be assembled.
    PresentPathUnknown,
    /// No file, or the entity itself no longer exists.
    Absent,
    /// A lookup failed after retries.
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityState {
    pub entity_id: i64,
    pub container_id: Option<i64>,
    pub outcome: ProbeOutcome,
}

impl EntityState {
    pub fn current_path(&self) -> Option<&str> {
        match &self.outcome {
            ProbeOutcome::Present(path) => Some(path),
            _ => None,
        }
    }
}

pub struct CurrentStateProbe<'a, C: LibraryCatalog + ?Sized> {
    catalog: &'a C,
    kind: EntityKind,
    cache: &'a mut RunCache,
}

impl<'a, C: LibraryCatalog + ?Sized> CurrentStateProbe<'a, C> {
    pub fn new(catalog: &'a C, cache: &'a mut RunCache) -> Self {
        Self {
            kind: catalog.kind(),
            catalog,
            cache,
        }
    }

    pub fn catalog(&self) -> &'a C {
        self.catalog
    }

    pub fn cache(&mut self) -> &mut RunCache {
        &mut *self.cache
    }

    /// Never fails: lookup errors are folded into [`ProbeOutcome::Failed`].
    pub fn probe(&mut self, entity_id: i64) -> EntityState {
        match self.try_probe(entity_id) {
            Ok(state) => state,
            Err(e) => {
                warn!("Probe of {} {} failed: {}", self.kind, entity_id, e);
                EntityState {
                    entity_id,
                    container_id: None,
                    outcome: ProbeOutcome::Failed(e.to_string()),
                }
            }
        }
    }

    fn try_probe(&mut self, entity_id: i64) -> Result<EntityState, Error> {
        let Some(entity) = self.catalog.entity(entity_id)? else {
            debug!("{} {} no longer exists", self.kind, entity_id);
            return Ok(EntityState {
                entity_id,
                container_id: None,
                outcome: ProbeOutcome::Absent,
            });
        };

        let outcome = if entity.has_file {
            match self.cache.file_record(self.catalog, &entity)? {
                Some(file) => self.resolve_path(&entity, &file)?,
                None => ProbeOutcome::Absent,
            }
        } else {
            ProbeOutcome::Absent
        };

        Ok(EntityState {
            entity_id,
            container_id: entity.container_id,
            outcome,
        })
    }

    /// Prefer the file's own absolute path; otherwise join the container's
    /// folder with the file's relative path.
    fn resolve_path(&mut self, entity: &EntityRecord, file: &FileRecord) -> Result<ProbeOutcome, Error> {
        if let Some(path) = &file.path {
            return Ok(self.present(path));
        }
        let Some(relative) = &file.relative_path else {
            return Ok(ProbeOutcome::PresentPathUnknown);
        };

        let base = match (&entity.path, entity.container_id) {
            (Some(path), _) => Some(path.clone()),
            (None, Some(container_id)) => self
                .cache
                .container(self.catalog, container_id)?
                .and_then(|c| c.path.clone()),
            (None, None) => None,
        };

        Ok(match base {
            Some(base) => {
                let joined = format!(
                    "{}/{}",
                    base.trim_end_matches(['/', '\\']),
                    relative.trim_start_matches(['/', '\\'])
                );
                self.present(&joined)
            }
            None => ProbeOutcome::PresentPathUnknown,
        })
    }

    fn present(&self, raw: &str) -> ProbeOutcome {
        let normalized = normalize_library_path(raw, self.kind.root());
        if normalized.is_empty() {
            ProbeOutcome::PresentPathUnknown
        } else {
            ProbeOutcome::Present(normalized)
        }
    }
}
