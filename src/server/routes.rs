use chrono::{SecondsFormat, Utc};
use serde_json::json;
use tracing::{error, info, warn};
use url::Url;

use crate::db::{Database, StoreError};
use crate::model::{FetchedRange, SaveRequest};

const RANGES_PREFIX: &str = "/ranges/";
const EXPORT_FILENAME: &str = "skipranges.json";

/// A response before it is written to the wire.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ApiResponse {
    pub(crate) status: u16,
    pub(crate) body: Option<String>,
    pub(crate) headers: Vec<(&'static str, String)>,
}

impl ApiResponse {
    fn json(status: u16, value: serde_json::Value) -> Self {
        Self {
            status,
            body: Some(value.to_string()),
            headers: vec![("Content-Type", "application/json".to_string())],
        }
    }

    fn empty(status: u16) -> Self {
        Self {
            status,
            body: None,
            headers: Vec::new(),
        }
    }

    fn error(status: u16, message: &str) -> Self {
        Self::json(status, json!({ "error": message }))
    }

    fn no_store(mut self) -> Self {
        self.headers.push(("Cache-Control", "no-store".to_string()));
        self
    }

    pub(crate) fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Request dispatch for the range service, independent of the transport.
pub(crate) struct Router {
    db: Database,
    plugin_version: String,
}

impl Router {
    pub(crate) fn new(db: Database, plugin_version: impl Into<String>) -> Self {
        Self {
            db,
            plugin_version: plugin_version.into(),
        }
    }

    pub(crate) fn handle(&self, method: &str, target: &str, body: &str) -> ApiResponse {
        let Ok(url) = Url::parse("http://localhost").and_then(|base| base.join(target)) else {
            return ApiResponse::error(400, "Bad request target");
        };
        let path = url.path();

        if method.eq_ignore_ascii_case("OPTIONS") {
            return ApiResponse::empty(204);
        }

        if path == "/ranges" {
            return match method {
                "POST" => self.save(body),
                _ => ApiResponse::error(404, "Not found"),
            };
        }

        if let Some(raw_id) = path.strip_prefix(RANGES_PREFIX) {
            let episode_id = match urlencoding::decode(raw_id) {
                Ok(id) => id.into_owned(),
                Err(_) => return ApiResponse::error(400, "Bad episode id").no_store(),
            };
            let file_id = query_value(&url, "fileId");
            let response = match method {
                "GET" => self.fetch(&episode_id, file_id.as_deref(), query_value(&url, "title")),
                "HEAD" => self.exists(&episode_id),
                "DELETE" => self.delete(&episode_id),
                _ => ApiResponse::error(404, "Not found"),
            };
            return response.no_store();
        }

        match (method, path) {
            ("GET", "/download-db") => self.export(),
            ("GET", "/plugin-version") => {
                ApiResponse::json(200, json!({ "version": self.plugin_version }))
            }
            ("GET", "/ping") => ApiResponse::json(
                200,
                json!({
                    "status": "ok",
                    "time": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
                }),
            ),
            _ => ApiResponse::error(404, "Not found"),
        }
    }

    fn save(&self, body: &str) -> ApiResponse {
        let request: SaveRequest = match serde_json::from_str(body) {
            Ok(request) => request,
            Err(err) => {
                warn!(error = %err, "invalid POST body");
                return ApiResponse::error(400, "episodeId, start and end are required");
            }
        };
        match self.db.upsert_range(&request) {
            Ok(record) => {
                info!(
                    episode_id = %record.episode_id,
                    title = ?record.title,
                    start = record.start,
                    end = record.end,
                    file_id = ?request.file_id,
                    offset = ?request.offset,
                    "saved range"
                );
                ApiResponse::json(200, json!(record))
            }
            Err(StoreError::InvalidRange(message)) => {
                warn!(episode_id = %request.episode_id, %message, "rejected range");
                ApiResponse::error(400, &message)
            }
            Err(err) => {
                error!(episode_id = %request.episode_id, error = %err, "database error on save");
                ApiResponse::error(500, "Database error")
            }
        }
    }

    fn fetch(&self, episode_id: &str, file_id: Option<&str>, title: Option<String>) -> ApiResponse {
        match self.db.get_range(episode_id) {
            Ok(Some(record)) => {
                info!(
                    episode_id,
                    title = ?record.title.as_deref().or(title.as_deref()),
                    start = record.start,
                    end = record.end,
                    "fetched range"
                );
                let offset = record.offset_for(file_id);
                ApiResponse::json(
                    200,
                    json!(FetchedRange {
                        range: record,
                        offset: Some(offset),
                    }),
                )
            }
            Ok(None) => {
                info!(episode_id, "no range stored, returning 204");
                ApiResponse::empty(204)
            }
            Err(err) => {
                error!(episode_id, error = %err, "database error on fetch");
                ApiResponse::error(500, "Database error")
            }
        }
    }

    fn exists(&self, episode_id: &str) -> ApiResponse {
        match self.db.range_exists(episode_id) {
            Ok(found) => {
                let status = if found { 200 } else { 204 };
                info!(episode_id, status, "existence check");
                ApiResponse::empty(status)
            }
            Err(err) => {
                error!(episode_id, error = %err, "database error on existence check");
                ApiResponse::empty(500)
            }
        }
    }

    fn delete(&self, episode_id: &str) -> ApiResponse {
        match self.db.delete_range(episode_id) {
            Ok(true) => {
                info!(episode_id, "deleted range");
                ApiResponse::json(200, json!({ "success": true }))
            }
            Ok(false) => {
                info!(episode_id, "no range to delete");
                ApiResponse::error(404, "Not found")
            }
            Err(err) => {
                error!(episode_id, error = %err, "database error on delete");
                ApiResponse::error(500, "Database error")
            }
        }
    }

    fn export(&self) -> ApiResponse {
        let ranges = match self.db.list_ranges() {
            Ok(ranges) => ranges,
            Err(err) => {
                error!(error = %err, "database error on export");
                return ApiResponse::error(500, "Database error");
            }
        };
        match serde_json::to_string_pretty(&ranges) {
            Ok(body) => ApiResponse {
                status: 200,
                body: Some(body),
                headers: vec![
                    ("Content-Type", "application/json".to_string()),
                    (
                        "Content-Disposition",
                        format!("attachment; filename={EXPORT_FILENAME}"),
                    ),
                ],
            },
            Err(err) => {
                error!(error = %err, "could not encode export");
                ApiResponse::error(500, "Database error")
            }
        }
    }
}

fn query_value(url: &Url, name: &str) -> Option<String> {
    url.query_pairs()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
}
