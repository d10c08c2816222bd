//! Boundary to the library managers (Radarr for movies, Sonarr for episodes).
//!
//! The pipelines only see the [`HistoryFeed`] and [`LibraryCatalog`] traits;
//! [`client::ArrClient`] is the HTTP implementation of both.

pub mod client;

use crate::error::Error;
use crate::history::HistoryRecord;
use crate::paths::MediaRoot;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

pub use client::ArrClient;

/// A tracked entity type and everything that differs between the two services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Movie,
    Episode,
}

impl EntityKind {
    pub fn root(&self) -> MediaRoot {
        match self {
            EntityKind::Movie => MediaRoot::Movies,
            EntityKind::Episode => MediaRoot::Tv,
        }
    }

    pub fn service_name(&self) -> &'static str {
        match self {
            EntityKind::Movie => "radarr",
            EntityKind::Episode => "sonarr",
        }
    }

    /// API resource for single-entity reads and writes.
    pub fn resource(&self) -> &'static str {
        match self {
            EntityKind::Movie => "movie",
            EntityKind::Episode => "episode",
        }
    }

    pub fn search_command(&self) -> &'static str {
        match self {
            EntityKind::Movie => "MoviesSearch",
            EntityKind::Episode => "EpisodeSearch",
        }
    }

    pub fn search_ids_field(&self) -> &'static str {
        match self {
            EntityKind::Movie => "movieIds",
            EntityKind::Episode => "episodeIds",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.resource())
    }
}

impl FromStr for EntityKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "movie" | "movies" | "radarr" => Ok(EntityKind::Movie),
            "episode" | "episodes" | "sonarr" => Ok(EntityKind::Episode),
            other => Err(Error::invalid_input(format!("unknown entity kind '{}'", other))),
        }
    }
}

/// One movie or episode as reported by the managing service.
#[derive(Debug, Clone)]
pub struct EntityRecord {
    pub id: i64,
    pub has_file: bool,
    pub monitored: bool,
    /// Series id for episodes; movies are their own container.
    pub container_id: Option<i64>,
    pub file_id: Option<i64>,
    /// Folder path stored on the entity itself (movies only).
    pub path: Option<String>,
    pub title: Option<String>,
    /// Full body as fetched, sent back verbatim on update.
    pub raw: Value,
}

impl EntityRecord {
    pub fn from_json(kind: EntityKind, raw: Value) -> Option<Self> {
        let id = positive_i64(raw.get("id"))?;
        let (container_id, file_id) = match kind {
            EntityKind::Movie => (
                None,
                positive_i64(raw.get("movieFileId"))
                    .or_else(|| positive_i64(raw.get("movieFile").and_then(|f| f.get("id")))),
            ),
            EntityKind::Episode => (
                positive_i64(raw.get("seriesId")),
                positive_i64(raw.get("episodeFileId")),
            ),
        };
        Some(Self {
            id,
            has_file: raw.get("hasFile").and_then(Value::as_bool).unwrap_or(false),
            monitored: raw.get("monitored").and_then(Value::as_bool).unwrap_or(false),
            container_id,
            file_id,
            path: non_empty_str(raw.get("path")),
            title: non_empty_str(raw.get("title")),
            raw,
        })
    }
}

/// Parent grouping of an entity (a series).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerRecord {
    pub id: i64,
    pub path: Option<String>,
    pub title: Option<String>,
}

impl ContainerRecord {
    pub fn from_json(raw: &Value) -> Option<Self> {
        Some(Self {
            id: positive_i64(raw.get("id"))?,
            path: non_empty_str(raw.get("path")),
            title: non_empty_str(raw.get("title")),
        })
    }
}

/// The media file currently attached to an entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub id: Option<i64>,
    pub path: Option<String>,
    pub relative_path: Option<String>,
    pub size: u64,
}

impl FileRecord {
    pub fn from_json(raw: &Value) -> Self {
        Self {
            id: positive_i64(raw.get("id")),
            path: non_empty_str(raw.get("path")),
            relative_path: non_empty_str(raw.get("relativePath")),
            size: raw.get("size").and_then(Value::as_u64).unwrap_or(0),
        }
    }

    /// True when the record carries no path information at all.
    pub fn is_blank(&self) -> bool {
        self.path.is_none() && self.relative_path.is_none()
    }
}

/// Time-ordered event history.
pub trait HistoryFeed {
    /// Every record at or after `start`.
    fn since(&self, start: DateTime<Utc>) -> Result<Vec<HistoryRecord>, Error>;

    /// One page (1-based) of records sorted newest-first.
    fn page(&self, page: u32, page_size: u32) -> Result<Vec<HistoryRecord>, Error>;
}

/// Entity and container reads plus the two remediation writes.
///
/// Lookups return `Ok(None)` when the service reports the object does not exist.
pub trait LibraryCatalog {
    fn kind(&self) -> EntityKind;

    fn entity(&self, id: i64) -> Result<Option<EntityRecord>, Error>;

    fn container(&self, id: i64) -> Result<Option<ContainerRecord>, Error>;

    fn file_record(&self, entity: &EntityRecord) -> Result<Option<FileRecord>, Error>;

    fn set_monitored(&self, entity: &EntityRecord) -> Result<(), Error>;

    fn enqueue_search(&self, entity_ids: &[i64]) -> Result<(), Error>;
}

/// Integer id from a number or numeric string; zero and negatives count as absent.
pub(crate) fn positive_i64(value: Option<&Value>) -> Option<i64> {
    let id = match value? {
        Value::Number(n) => n.as_i64()?,
        Value::String(s) => s.trim().parse().ok()?,
        _ => return None,
    };
    (id > 0).then_some(id)
}

pub(crate) fn non_empty_str(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_movie_record_from_json() {
        let raw = json!({
            "id": 7, "title": "Alien", "hasFile": true, "monitored": false,
            "path": "/movies/Alien (1979)", "movieFile": {"id": 70}
        });
        let movie = EntityRecord::from_json(EntityKind::Movie, raw).unwrap();
        assert_eq!(movie.id, 7);
        assert!(movie.has_file);
        assert!(!movie.monitored);
        assert_eq!(movie.file_id, Some(70));
        assert_eq!(movie.container_id, None);
        assert_eq!(movie.path.as_deref(), Some("/movies/Alien (1979)"));
    }

    #[test]
    fn test_episode_record_from_json() {
        let raw = json!({"id": 11, "seriesId": 3, "episodeFileId": 0, "hasFile": false});
        let ep = EntityRecord::from_json(EntityKind::Episode, raw).unwrap();
        assert_eq!(ep.container_id, Some(3));
        assert_eq!(ep.file_id, None);
        assert!(!ep.has_file);
        assert!(EntityRecord::from_json(EntityKind::Episode, json!({"title": "x"})).is_none());
    }

    #[test]
    fn test_positive_i64_accepts_numeric_strings() {
        assert_eq!(positive_i64(Some(&json!("42"))), Some(42));
        assert_eq!(positive_i64(Some(&json!(0))), None);
        assert_eq!(positive_i64(Some(&json!(null))), None);
        assert_eq!(positive_i64(Some(&json!("abc"))), None);
    }

    #[test]
    fn test_entity_kind_parsing() {
        assert_eq!("Movie".parse::<EntityKind>().unwrap(), EntityKind::Movie);
        assert_eq!("sonarr".parse::<EntityKind>().unwrap(), EntityKind::Episode);
        assert!("album".parse::<EntityKind>().is_err());
    }
}
