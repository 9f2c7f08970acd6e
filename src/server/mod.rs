mod routes;

use std::io::Read;

use anyhow::{Result, anyhow};
use tiny_http::{Header, Request, Response, Server};
use tracing::{debug, info, warn};

pub(crate) use routes::{ApiResponse, Router};

const CORS_HEADERS: [(&str, &str); 3] = [
    ("Access-Control-Allow-Origin", "*"),
    ("Access-Control-Allow-Headers", "Content-Type"),
    ("Access-Control-Allow-Methods", "GET, POST, HEAD, DELETE, OPTIONS"),
];

pub(crate) fn bind(addr: &str) -> Result<Server> {
    Server::http(addr).map_err(|err| anyhow!("http bind on {addr} failed: {err}"))
}

/// Serves requests one at a time until the listener shuts down.
pub(crate) fn serve(server: &Server, router: &Router) {
    if let Some(addr) = server.server_addr().to_ip() {
        info!(%addr, "range service listening");
    }
    for request in server.incoming_requests() {
        handle_request(request, router);
    }
}

fn handle_request(mut request: Request, router: &Router) {
    let method = request.method().to_string();
    let target = request.url().to_string();
    debug!(%method, %target, "request");

    let mut body = String::new();
    let response = match request.as_reader().read_to_string(&mut body) {
        Ok(_) => router.handle(&method, &target, &body),
        Err(err) => {
            warn!(%method, %target, error = %err, "could not read request body");
            ApiResponse {
                status: 400,
                body: Some(format!(r#"{{"error":"read error: {err}"}}"#)),
                headers: Vec::new(),
            }
        }
    };

    let status = response.status;
    if let Err(err) = request.respond(into_wire(response)) {
        warn!(%method, %target, status, error = %err, "could not write response");
    }
}

fn into_wire(response: ApiResponse) -> Response<std::io::Cursor<Vec<u8>>> {
    let mut wire = Response::from_data(response.body.unwrap_or_default().into_bytes())
        .with_status_code(response.status);
    let headers = CORS_HEADERS
        .iter()
        .map(|(name, value)| (*name, (*value).to_string()))
        .chain(response.headers);
    for (name, value) in headers {
        match Header::from_bytes(name.as_bytes(), value.as_bytes()) {
            Ok(header) => wire.add_header(header),
            Err(()) => warn!(header = name, "skipping malformed response header"),
        }
    }
    wire
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;
    use crate::client::{RangeClient, RangeFetch, RangeService};
    use crate::db::Database;
    use crate::model::SaveRequest;

    fn spawn_service() -> String {
        let server = bind("127.0.0.1:0").expect("bind");
        let addr = server.server_addr().to_ip().expect("ip listener");
        let router = Router::new(Database::open_in_memory().expect("db"), "1.1.0");
        thread::spawn(move || serve(&server, &router));
        format!("http://{addr}")
    }

    fn save(episode_id: &str, file_id: &str, offset: f64) -> SaveRequest {
        SaveRequest {
            episode_id: episode_id.to_string(),
            file_id: Some(file_id.to_string()),
            start: 30.0,
            end: 90.0,
            offset: Some(offset),
            title: Some("Show S01E01".to_string()),
        }
    }

    #[test]
    fn two_files_share_a_range_with_their_own_offsets() {
        let client = RangeClient::new(&spawn_service());

        client.save_range(&save("tt123:1", "f1", 0.0)).expect("save f1");
        let stored = client.save_range(&save("tt123:1", "f2", 5.0)).expect("save f2");
        assert_eq!(stored.offsets.len(), 2);

        let Ok(RangeFetch::Found(for_f2)) = client.fetch_range("tt123:1", Some("f2"), None) else {
            panic!("expected a range for f2");
        };
        assert_eq!((for_f2.start, for_f2.end, for_f2.offset), (30.0, 90.0, 5.0));
        assert!(for_f2.contains(35.0));
        assert_eq!(for_f2.skip_target(), 95.0);

        let Ok(RangeFetch::Found(for_f1)) = client.fetch_range("tt123:1", Some("f1"), None) else {
            panic!("expected a range for f1");
        };
        assert_eq!(for_f1.offset, 0.0);
        assert_eq!(for_f1.skip_target(), 90.0);
    }

    #[test]
    fn full_lifecycle_over_http() {
        let client = RangeClient::new(&spawn_service());

        assert_eq!(
            client.fetch_range("tt5:2", Some("f1"), Some("Show S01E02")),
            Ok(RangeFetch::Empty)
        );
        assert_eq!(client.range_exists("tt5:2"), Ok(false));

        client.save_range(&save("tt5:2", "f1", 1.0)).expect("save");
        assert_eq!(client.range_exists("tt5:2"), Ok(true));
        assert!(client.export().expect("export").contains("tt5:2"));
        assert_eq!(client.plugin_version().as_deref(), Some("1.1.0"));
        assert_eq!(client.ping().expect("ping").status, "ok");

        assert_eq!(client.delete_range("tt5:2"), Ok(true));
        assert_eq!(client.delete_range("tt5:2"), Ok(false));
        assert_eq!(
            client.fetch_range("tt5:2", None, None),
            Ok(RangeFetch::Empty)
        );
    }
}
