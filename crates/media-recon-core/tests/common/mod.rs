#![allow(dead_code)]

use media_recon_core::history::HistoryRecord;
use media_recon_core::service::{
    ContainerRecord, EntityKind, EntityRecord, FileRecord, HistoryFeed, LibraryCatalog,
};
use media_recon_core::Error;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

/// In-memory history, newest first.
pub struct FakeFeed {
    records: Vec<Value>,
    pub page_requests: Cell<u32>,
    pub since_requests: Cell<u32>,
}

impl FakeFeed {
    pub fn new(records: Vec<Value>) -> Self {
        Self {
            records,
            page_requests: Cell::new(0),
            since_requests: Cell::new(0),
        }
    }
}

impl HistoryFeed for FakeFeed {
    fn since(&self, _start: DateTime<Utc>) -> Result<Vec<HistoryRecord>, Error> {
        self.since_requests.set(self.since_requests.get() + 1);
        Ok(self.records.iter().cloned().map(HistoryRecord::new).collect())
    }

    fn page(&self, page: u32, page_size: u32) -> Result<Vec<HistoryRecord>, Error> {
        self.page_requests.set(self.page_requests.get() + 1);
        let start = ((page - 1) * page_size) as usize;
        Ok(self
            .records
            .iter()
            .skip(start)
            .take(page_size as usize)
            .cloned()
            .map(HistoryRecord::new)
            .collect())
    }
}

/// In-memory library with call logging and injectable failures.
pub struct FakeCatalog {
    kind: EntityKind,
    entities: HashMap<i64, Value>,
    containers: HashMap<i64, Value>,
    files: HashMap<i64, Value>,
    pub failing_entities: HashSet<i64>,
    /// Zero-based indices of search batches that should fail.
    pub failing_batches: HashSet<usize>,
    pub entity_calls: Cell<usize>,
    pub container_calls: Cell<usize>,
    pub monitored: RefCell<Vec<i64>>,
    pub searches: RefCell<Vec<Vec<i64>>>,
}

impl FakeCatalog {
    pub fn new(kind: EntityKind) -> Self {
        Self {
            kind,
            entities: HashMap::new(),
            containers: HashMap::new(),
            files: HashMap::new(),
            failing_entities: HashSet::new(),
            failing_batches: HashSet::new(),
            entity_calls: Cell::new(0),
            container_calls: Cell::new(0),
            monitored: RefCell::new(Vec::new()),
            searches: RefCell::new(Vec::new()),
        }
    }

    pub fn with_entity(mut self, body: Value) -> Self {
        let id = body["id"].as_i64().unwrap();
        self.entities.insert(id, body);
        self
    }

    pub fn with_container(mut self, body: Value) -> Self {
        let id = body["id"].as_i64().unwrap();
        self.containers.insert(id, body);
        self
    }

    pub fn with_file(mut self, body: Value) -> Self {
        let id = body["id"].as_i64().unwrap();
        self.files.insert(id, body);
        self
    }

    pub fn failing(mut self, id: i64) -> Self {
        self.failing_entities.insert(id);
        self
    }
}

impl LibraryCatalog for FakeCatalog {
    fn kind(&self) -> EntityKind {
        self.kind
    }

    fn entity(&self, id: i64) -> Result<Option<EntityRecord>, Error> {
        self.entity_calls.set(self.entity_calls.get() + 1);
        if self.failing_entities.contains(&id) {
            return Err(Error::Http {
                url: format!("fake/{}", id),
                message: "connection reset".to_string(),
            });
        }
        Ok(self
            .entities
            .get(&id)
            .cloned()
            .and_then(|raw| EntityRecord::from_json(self.kind, raw)))
    }

    fn container(&self, id: i64) -> Result<Option<ContainerRecord>, Error> {
        self.container_calls.set(self.container_calls.get() + 1);
        Ok(self.containers.get(&id).and_then(ContainerRecord::from_json))
    }

    fn file_record(&self, entity: &EntityRecord) -> Result<Option<FileRecord>, Error> {
        if let Some(embedded) = entity.raw.get("movieFile") {
            return Ok(Some(FileRecord::from_json(embedded)));
        }
        Ok(entity
            .file_id
            .and_then(|id| self.files.get(&id))
            .map(FileRecord::from_json))
    }

    fn set_monitored(&self, entity: &EntityRecord) -> Result<(), Error> {
        self.monitored.borrow_mut().push(entity.id);
        Ok(())
    }

    fn enqueue_search(&self, entity_ids: &[i64]) -> Result<(), Error> {
        let idx = self.searches.borrow().len();
        self.searches.borrow_mut().push(entity_ids.to_vec());
        if self.failing_batches.contains(&idx) {
            return Err(Error::Status {
                url: "fake/command".to_string(),
                status: 503,
            });
        }
        Ok(())
    }
}

pub fn deletion(date: &str, kind_field: &str, id: i64, path: &str) -> Value {
    json!({
        "date": date,
        "eventType": "episodeFileDeleted",
        kind_field: id,
        "data": { "path": path },
    })
}

pub fn event(date: &str, event_type: &str, kind_field: &str, id: i64) -> Value {
    json!({
        "date": date,
        "eventType": event_type,
        kind_field: id,
    })
}

pub fn write_file(root: &Path, rel: &str, body: &str) {
    let p = root.join(rel);
    fs::create_dir_all(p.parent().unwrap()).unwrap();
    fs::write(p, body).unwrap();
}

pub fn read_lines(path: &Path) -> Vec<String> {
    fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}
