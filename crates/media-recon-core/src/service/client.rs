//! Blocking HTTP client for the Radarr/Sonarr v3 API.

use super::{ContainerRecord, EntityKind, EntityRecord, FileRecord, HistoryFeed, LibraryCatalog};
use crate::config::HttpConfig;
use crate::error::Error;
use crate::history::HistoryRecord;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

/// Which failures a request may be resent after.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Retry {
    /// Reads and the whole-body monitored PUT.
    Idempotent,
    ConnectOnly,
}

pub struct ArrClient {
    http: Client,
    base_url: String,
    kind: EntityKind,
    retry_count: u32,
    retry_delay: Duration,
}

impl ArrClient {
    pub fn new(kind: EntityKind, base_url: &str, api_key: &str, config: &HttpConfig) -> Result<Self, Error> {
        if api_key.trim().is_empty() {
            return Err(Error::invalid_input(format!(
                "missing API key for {}",
                kind.service_name()
            )));
        }
        let base_url = base_url.trim().trim_end_matches('/').to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(Error::invalid_input(format!("invalid service URL '{}'", base_url)));
        }

        let mut headers = HeaderMap::new();
        let key = HeaderValue::from_str(api_key.trim())
            .map_err(|_| Error::invalid_input("API key contains invalid header characters"))?;
        headers.insert("X-Api-Key", key);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http = Client::builder()
            .timeout(config.timeout())
            .default_headers(headers)
            .user_agent(format!("media-recon/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::invalid_input(format!("cannot build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url,
            kind,
            retry_count: config.retry_count,
            retry_delay: config.retry_delay(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v3/{}", self.base_url, path)
    }

    /// Fail fast on a wrong URL or key before a long scan starts.
    pub fn check_status(&self) -> Result<(), Error> {
        let url = self.url("system/status");
        let resp = self.send(&url, Retry::Idempotent, || self.http.get(&url))?;
        if !resp.status().is_success() {
            return Err(Error::Status {
                url,
                status: resp.status().as_u16(),
            });
        }
        Ok(())
    }

    /// Send with a bounded number of retries at a fixed delay.
    ///
    /// Idempotent requests are retried on connection errors, timeouts and 5xx.
    /// A command POST is retried only when the connection was never made, since
    /// a timeout or 5xx may mean the server already queued it. Anything else is
    /// returned as-is for the caller to interpret.
    fn send<F>(&self, url: &str, retry: Retry, build: F) -> Result<Response, Error>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut last_error = String::new();
        for attempt in 0..=self.retry_count {
            if attempt > 0 {
                debug!("Retrying {} (attempt {})", url, attempt + 1);
                thread::sleep(self.retry_delay);
            }
            match build().send() {
                Ok(resp) if resp.status().is_server_error() && retry == Retry::Idempotent => {
                    last_error = format!("server error {}", resp.status());
                    warn!("{} returned {}", url, resp.status());
                }
                Ok(resp) => return Ok(resp),
                Err(e)
                    if e.is_connect()
                        || (retry == Retry::Idempotent && (e.is_timeout() || e.is_request())) =>
                {
                    last_error = e.to_string();
                    warn!("Request to {} failed: {}", url, e);
                }
                Err(e) => {
                    return Err(Error::Http {
                        url: url.to_string(),
                        message: e.to_string(),
                    })
                }
            }
        }
        Err(Error::Http {
            url: url.to_string(),
            message: last_error,
        })
    }

    /// GET returning `None` on 404.
    fn get_json(&self, path: &str, query: &[(&str, String)]) -> Result<Option<Value>, Error> {
        let url = self.url(path);
        let resp = self.send(&url, Retry::Idempotent, || self.http.get(&url).query(query))?;
        match resp.status() {
            StatusCode::NOT_FOUND => Ok(None),
            s if s.is_success() => Ok(Some(read_json(&url, resp)?)),
            s => Err(Error::Status {
                url,
                status: s.as_u16(),
            }),
        }
    }

    fn expect_success(url: String, resp: Response) -> Result<(), Error> {
        if resp.status().is_success() {
            Ok(())
        } else {
            Err(Error::Status {
                url,
                status: resp.status().as_u16(),
            })
        }
    }
}

fn read_json(url: &str, resp: Response) -> Result<Value, Error> {
    let body = resp.text().map_err(|e| Error::Http {
        url: url.to_string(),
        message: e.to_string(),
    })?;
    Ok(serde_json::from_str(&body)?)
}

/// History endpoints answer either a bare array or `{"records": [...]}`.
fn into_records(body: Value) -> Vec<HistoryRecord> {
    let list = match body {
        Value::Array(items) => items,
        Value::Object(mut obj) => match obj.remove("records") {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    };
    list.into_iter().map(HistoryRecord::new).collect()
}

impl HistoryFeed for ArrClient {
    fn since(&self, start: DateTime<Utc>) -> Result<Vec<HistoryRecord>, Error> {
        let date = start.to_rfc3339_opts(SecondsFormat::Secs, true);
        let body = self.get_json("history/since", &[("date", date)])?;
        Ok(body.map(into_records).unwrap_or_default())
    }

    fn page(&self, page: u32, page_size: u32) -> Result<Vec<HistoryRecord>, Error> {
        let query = [
            ("page", page.to_string()),
            ("pageSize", page_size.to_string()),
            ("sortKey", "date".to_string()),
            ("sortDirection", "descending".to_string()),
        ];
        let body = self.get_json("history", &query)?;
        Ok(body.map(into_records).unwrap_or_default())
    }
}

impl LibraryCatalog for ArrClient {
    fn kind(&self) -> EntityKind {
        self.kind
    }

    fn entity(&self, id: i64) -> Result<Option<EntityRecord>, Error> {
        let path = format!("{}/{}", self.kind.resource(), id);
        Ok(self
            .get_json(&path, &[])?
            .and_then(|raw| EntityRecord::from_json(self.kind, raw)))
    }

    fn container(&self, id: i64) -> Result<Option<ContainerRecord>, Error> {
        let path = match self.kind {
            EntityKind::Episode => format!("series/{}", id),
            EntityKind::Movie => format!("movie/{}", id),
        };
        Ok(self
            .get_json(&path, &[])?
            .and_then(|raw| ContainerRecord::from_json(&raw)))
    }

    fn file_record(&self, entity: &EntityRecord) -> Result<Option<FileRecord>, Error> {
        match self.kind {
            EntityKind::Movie => {
                if let Some(embedded) = entity.raw.get("movieFile").map(FileRecord::from_json) {
                    if !embedded.is_blank() {
                        return Ok(Some(embedded));
                    }
                }
                let files = self.get_json("moviefile", &[("movieId", entity.id.to_string())])?;
                let mut files: Vec<FileRecord> = match files {
                    Some(Value::Array(items)) => items.iter().map(FileRecord::from_json).collect(),
                    _ => Vec::new(),
                };
                // Several files can be attached; the largest is the one that counts.
                files.sort_by(|a, b| b.size.cmp(&a.size));
                Ok(files.into_iter().next())
            }
            EntityKind::Episode => match entity.file_id {
                Some(file_id) => Ok(self
                    .get_json(&format!("episodefile/{}", file_id), &[])?
                    .map(|raw| FileRecord::from_json(&raw))),
                None => Ok(None),
            },
        }
    }

    fn set_monitored(&self, entity: &EntityRecord) -> Result<(), Error> {
        let mut body = entity.raw.clone();
        if let Value::Object(obj) = &mut body {
            obj.insert("monitored".to_string(), Value::Bool(true));
        }
        let url = self.url(&format!("{}/{}", self.kind.resource(), entity.id));
        let resp = self.send(&url, Retry::Idempotent, || self.http.put(&url).json(&body))?;
        Self::expect_success(url, resp)
    }

    fn enqueue_search(&self, entity_ids: &[i64]) -> Result<(), Error> {
        let mut payload = json!({ "name": self.kind.search_command() });
        payload[self.kind.search_ids_field()] = json!(entity_ids);
        let url = self.url("command");
        let resp = self.send(&url, Retry::ConnectOnly, || self.http.post(&url).json(&payload))?;
        Self::expect_success(url, resp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_records_accepts_both_shapes() {
        let paged = json!({"page": 1, "records": [{"id": 1}, {"id": 2}]});
        assert_eq!(into_records(paged).len(), 2);
        assert_eq!(into_records(json!([{"id": 1}])).len(), 1);
        assert!(into_records(json!({"page": 1})).is_empty());
        assert!(into_records(json!("nope")).is_empty());
    }

    #[test]
    fn test_rejects_bad_configuration() {
        let cfg = HttpConfig::default();
        assert!(ArrClient::new(EntityKind::Movie, "http://localhost:7878", "", &cfg).is_err());
        assert!(ArrClient::new(EntityKind::Movie, "localhost:7878", "key", &cfg).is_err());
        let client = ArrClient::new(EntityKind::Movie, "http://localhost:7878/", "key", &cfg).unwrap();
        assert_eq!(client.base_url(), "http://localhost:7878");
    }
}
