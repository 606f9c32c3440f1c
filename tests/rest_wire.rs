//! Wire-level behaviour of the REST store, checked against a loopback HTTP
//! server that records every request it receives.

mod common;

use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use cms_seed::seed::{self, SeedError, SeedOptions, UpsertAction};
use cms_seed_store::{
    ContentStore, ContentType, DocumentId, KeyFilter, PublishOutcome, RestOptions, RestStore,
    Scope, StoreError,
};
use serde_json::{Map, Value, json};
use tiny_http::{Header, Response, Server};

use common::sample;

const TOKEN: &str = "seed-token";

/// One request as the server saw it.
#[derive(Clone, Debug)]
struct Exchange {
    method: String,
    path: String,
    query: BTreeMap<String, String>,
    authorization: Option<String>,
    body: Value,
}

impl Exchange {
    fn is_write(&self) -> bool {
        self.method != "GET"
    }
}

/// A loopback server answering with whatever `handler` returns.
struct CmsServer {
    base_url: String,
    log: Arc<Mutex<Vec<Exchange>>>,
}

impl CmsServer {
    fn start(mut handler: impl FnMut(&Exchange) -> (u16, Value) + Send + 'static) -> Self {
        let server = Server::http("127.0.0.1:0").unwrap();
        let addr = server.server_addr().to_ip().unwrap();
        let log = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&log);

        thread::spawn(move || {
            for mut request in server.incoming_requests() {
                let url = url::Url::parse(&format!("http://localhost{}", request.url())).unwrap();
                let mut raw = String::new();
                request.as_reader().read_to_string(&mut raw).unwrap();
                let exchange = Exchange {
                    method: request.method().to_string(),
                    path: url.path().to_owned(),
                    query: url.query_pairs().into_owned().collect(),
                    authorization: request
                        .headers()
                        .iter()
                        .find(|h| h.field.equiv("Authorization"))
                        .map(|h| h.value.to_string()),
                    body: if raw.is_empty() {
                        Value::Null
                    } else {
                        serde_json::from_str(&raw).unwrap()
                    },
                };
                let (status, body) = handler(&exchange);
                seen.lock().unwrap().push(exchange);

                let content_type =
                    Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]).unwrap();
                let response = Response::from_string(body.to_string())
                    .with_status_code(status)
                    .with_header(content_type);
                let _ = request.respond(response);
            }
        });

        Self {
            base_url: format!("http://{addr}"),
            log,
        }
    }

    fn store(&self, token: Option<&str>) -> RestStore {
        RestStore::new(RestOptions {
            base_url: self.base_url.clone(),
            token: token.map(str::to_owned),
            timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    fn requests(&self) -> Vec<Exchange> {
        self.log.lock().unwrap().clone()
    }

    fn last(&self) -> Exchange {
        self.requests().pop().expect("no request received")
    }
}

fn data(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap()
}

fn id(s: &str) -> DocumentId {
    DocumentId::new(s).unwrap()
}

fn strapi_error(status: u16, message: &str) -> Value {
    json!({"data": null, "error": {"status": status, "name": "Error", "message": message}})
}

// ---------------------------------------------------------------------------
// Request shapes
// ---------------------------------------------------------------------------

#[test]
fn create_sends_bearer_token_and_data_envelope() {
    let server = CmsServer::start(|_| {
        (200, json!({"data": {"documentId": "abc", "id": 7, "slug": "about", "title": "About"}}))
    });
    let mut store = server.store(Some(TOKEN));

    let record = store
        .create(ContentType::Page, &data(json!({"slug": "about", "title": "About"})))
        .unwrap();
    assert_eq!(record.document_id, id("abc"));
    assert_eq!(record.id, Some(7));

    let sent = server.last();
    assert_eq!(sent.method, "POST");
    assert_eq!(sent.path, "/api/pages");
    assert_eq!(sent.authorization.as_deref(), Some("Bearer seed-token"));
    assert_eq!(sent.body, json!({"data": {"slug": "about", "title": "About"}}));
}

#[test]
fn single_types_are_written_with_put() {
    let server = CmsServer::start(|_| (200, json!({"data": {"documentId": "site"}})));
    let mut store = server.store(Some(TOKEN));

    store
        .create(ContentType::SiteSetting, &data(json!({"siteName": "OpenHR"})))
        .unwrap();
    let sent = server.last();
    assert_eq!((sent.method.as_str(), sent.path.as_str()), ("PUT", "/api/site-setting"));
    assert_eq!(sent.body, json!({"data": {"siteName": "OpenHR"}}));

    // The document id is not part of a single type's path.
    store
        .update(ContentType::Footer, &id("site"), &data(json!({"copyrightText": "(c)"})))
        .unwrap();
    let sent = server.last();
    assert_eq!((sent.method.as_str(), sent.path.as_str()), ("PUT", "/api/footer"));
}

#[test]
fn update_publish_and_connect_address_the_document() {
    let server = CmsServer::start(|_| (200, json!({"data": {"documentId": "abc"}})));
    let mut store = server.store(Some(TOKEN));
    let page = id("abc");

    store
        .update(ContentType::Page, &page, &data(json!({"title": "About us"})))
        .unwrap();
    let sent = server.last();
    assert_eq!((sent.method.as_str(), sent.path.as_str()), ("PUT", "/api/pages/abc"));
    assert_eq!(sent.body, json!({"data": {"title": "About us"}}));

    assert_eq!(
        store.publish(ContentType::Page, &page).unwrap(),
        PublishOutcome::Published
    );
    let sent = server.last();
    assert_eq!((sent.method.as_str(), sent.path.as_str()), ("PUT", "/api/pages/abc"));
    let published_at = sent.body["data"]["publishedAt"].as_str().unwrap();
    assert!(chrono::DateTime::parse_from_rfc3339(published_at).is_ok(), "{published_at}");
    assert_eq!(sent.body["data"].as_object().unwrap().len(), 1);

    store
        .connect(ContentType::Page, &page, "sections", &[id("s1"), id("s2")])
        .unwrap();
    let sent = server.last();
    assert_eq!((sent.method.as_str(), sent.path.as_str()), ("PUT", "/api/pages/abc"));
    assert_eq!(
        sent.body,
        json!({"data": {"sections": {"connect": ["s1", "s2"]}}})
    );
}

#[test]
fn find_and_ping_send_filters_and_pagination() {
    let server = CmsServer::start(|_| {
        (200, json!({"data": [{"documentId": "home", "slug": "home"}], "meta": {}}))
    });
    let store = server.store(Some(TOKEN));

    store.ping().unwrap();
    let sent = server.last();
    assert_eq!((sent.method.as_str(), sent.path.as_str()), ("GET", "/api/pages"));
    assert_eq!(sent.query.get("pagination[limit]").map(String::as_str), Some("1"));

    let found = store
        .find(ContentType::Page, Some(&KeyFilter::eq("slug", "home")), Scope::Draft, 2)
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].str_field("slug"), Some("home"));

    let query = server.last().query;
    assert_eq!(query.get("filters[slug][$eq]").map(String::as_str), Some("home"));
    assert_eq!(query.get("status").map(String::as_str), Some("draft"));
    assert_eq!(query.get("pagination[limit]").map(String::as_str), Some("2"));
    assert_eq!(query.get("populate").map(String::as_str), Some("sections"));
}

#[test]
fn public_read_grants_send_nothing() {
    let server = CmsServer::start(|_| (500, strapi_error(500, "unexpected")));
    let mut store = server.store(Some(TOKEN));
    assert_eq!(store.grant_public_read(ContentType::Page, &["find"]).unwrap(), 0);
    assert!(store.missing_public_read(ContentType::Page, &["find"]).unwrap().is_empty());
    assert!(server.requests().is_empty());
}

// ---------------------------------------------------------------------------
// Status mapping
// ---------------------------------------------------------------------------

#[test]
fn rejected_credentials_map_to_unauthorized() {
    let server = CmsServer::start(|exchange| match exchange.authorization {
        None => (401, strapi_error(401, "Missing or invalid credentials")),
        Some(_) => (403, strapi_error(403, "Forbidden")),
    });

    let err = server.store(None).ping().unwrap_err();
    assert!(
        matches!(&err, StoreError::Unauthorized { status: 401, message } if message == "Missing or invalid credentials"),
        "{err:?}"
    );
    assert!(err.is_connectivity());
    assert!(server.last().authorization.is_none());

    let err = server
        .store(Some(TOKEN))
        .create(ContentType::Page, &data(json!({"slug": "home"})))
        .unwrap_err();
    assert!(matches!(err, StoreError::Unauthorized { status: 403, .. }), "{err:?}");
    assert!(err.is_connectivity());
}

#[test]
fn missing_single_type_reads_as_empty() {
    let server = CmsServer::start(|_| (404, strapi_error(404, "Not Found")));
    let mut store = server.store(Some(TOKEN));

    assert!(
        store
            .find(ContentType::Footer, None, Scope::Published, 1)
            .unwrap()
            .is_empty()
    );
    let sent = server.last();
    assert_eq!(sent.path, "/api/footer");
    assert_eq!(sent.query.get("status").map(String::as_str), Some("published"));

    // A collection document that vanished is still an error.
    let err = store
        .update(ContentType::Page, &id("gone"), &data(json!({"title": "x"})))
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound { .. }), "{err:?}");
}

#[test]
fn other_failures_are_rejections_with_the_server_message() {
    let server = CmsServer::start(|_| (400, strapi_error(400, "anchor must be unique")));
    let mut store = server.store(Some(TOKEN));
    let err = store
        .create(ContentType::Section, &data(json!({"anchor": "home-hero"})))
        .unwrap_err();
    assert!(
        matches!(
            &err,
            StoreError::Rejected { status: 400, message, .. } if message == "anchor must be unique"
        ),
        "{err:?}"
    );
    assert!(!err.is_connectivity());
}

#[test]
fn truncated_response_body_is_unreachable() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut request = Vec::new();
        let mut buf = [0u8; 1024];
        while !request.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = stream.read(&mut buf).unwrap();
            if n == 0 {
                break;
            }
            request.extend_from_slice(&buf[..n]);
        }
        // Promise 100 bytes, send 8, hang up.
        stream
            .write_all(b"HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 100\r\n\r\n{\"data\":")
            .unwrap();
    });

    let store = RestStore::new(RestOptions {
        base_url: format!("http://{addr}"),
        token: Some(TOKEN.to_owned()),
        timeout: Duration::from_secs(5),
    })
    .unwrap();
    let err = store.ping().unwrap_err();
    assert!(matches!(err, StoreError::Unreachable { .. }), "{err:?}");
}

// ---------------------------------------------------------------------------
// Full runs
// ---------------------------------------------------------------------------

/// Minimal in-memory CMS speaking the subset of the content API the seed
/// engine uses.
#[derive(Default)]
struct FakeCms {
    collections: BTreeMap<String, Vec<Map<String, Value>>>,
    singles: BTreeMap<String, Map<String, Value>>,
    next_id: u64,
}

impl FakeCms {
    fn handle(&mut self, exchange: &Exchange) -> (u16, Value) {
        let path = exchange.path.trim_start_matches("/api/");
        let mut segments = path.splitn(2, '/');
        let collection = segments.next().unwrap_or_default().to_owned();
        let document = segments.next().map(str::to_owned);
        let payload = exchange.body["data"].as_object().cloned().unwrap_or_default();

        match (exchange.method.as_str(), collection.as_str(), document) {
            ("GET", "upload", _) => (200, json!([])),
            ("GET", "site-setting" | "footer", None) => match self.singles.get(&collection) {
                Some(doc) => (200, json!({"data": doc})),
                None => (404, strapi_error(404, "Not Found")),
            },
            ("PUT", "site-setting" | "footer", None) => {
                self.next_id += 1;
                let fresh = json!({"documentId": format!("{collection}-doc"), "id": self.next_id});
                let doc = self
                    .singles
                    .entry(collection.clone())
                    .or_insert_with(|| data(fresh));
                merge(doc, payload);
                (200, json!({"data": doc}))
            }
            ("GET", _, None) => {
                let filters: Vec<(String, &String)> = exchange
                    .query
                    .iter()
                    .filter_map(|(k, v)| {
                        let field = k.strip_prefix("filters[")?.strip_suffix("][$eq]")?;
                        Some((field.to_owned(), v))
                    })
                    .collect();
                let docs: Vec<&Map<String, Value>> = self
                    .collections
                    .get(&collection)
                    .into_iter()
                    .flatten()
                    .filter(|doc| {
                        filters
                            .iter()
                            .all(|(field, value)| doc.get(field).and_then(Value::as_str) == Some(value.as_str()))
                    })
                    .collect();
                (200, json!({"data": docs, "meta": {}}))
            }
            ("POST", _, None) => {
                self.next_id += 1;
                let mut doc = data(json!({
                    "documentId": format!("doc{}", self.next_id),
                    "id": self.next_id,
                }));
                merge(&mut doc, payload);
                self.collections.entry(collection.clone()).or_default().push(doc.clone());
                (200, json!({"data": doc}))
            }
            ("PUT", _, Some(document_id)) => {
                let found = self
                    .collections
                    .get_mut(&collection)
                    .into_iter()
                    .flatten()
                    .find(|doc| doc["documentId"] == json!(document_id));
                match found {
                    Some(doc) => {
                        merge(doc, payload);
                        (200, json!({"data": doc}))
                    }
                    None => (404, strapi_error(404, "Not Found")),
                }
            }
            _ => (405, strapi_error(405, "Method Not Allowed")),
        }
    }
}

/// Apply a write payload: plain attributes replace, `{connect: [...]}`
/// appends ids not yet present.
fn merge(doc: &mut Map<String, Value>, payload: Map<String, Value>) {
    for (key, value) in payload {
        match value.get("connect").and_then(Value::as_array) {
            Some(ids) => {
                let entry = doc.entry(key).or_insert_with(|| json!([]));
                if !entry.is_array() {
                    *entry = json!([]);
                }
                if let Value::Array(existing) = entry {
                    for id in ids {
                        if !existing.contains(id) {
                            existing.push(id.clone());
                        }
                    }
                }
            }
            None => {
                doc.insert(key, value);
            }
        }
    }
}

fn fake_cms() -> CmsServer {
    let mut cms = FakeCms::default();
    CmsServer::start(move |exchange| cms.handle(exchange))
}

#[test]
fn run_seeds_publishes_and_wires_over_http() {
    let server = fake_cms();
    let mut store = server.store(Some(TOKEN));

    let report = seed::run(&mut store, &sample(), &SeedOptions::default()).unwrap();
    assert!(report.is_success(), "{:#?}", report.failures);
    assert_eq!(report.count(UpsertAction::Created), 16);
    assert_eq!(report.relation_failures(), 0);
    assert_eq!(report.publish_failures(), 0);

    let requests = server.requests();
    assert!(requests.iter().all(|r| r.authorization.as_deref() == Some("Bearer seed-token")));

    let first = &requests[0];
    assert_eq!((first.method.as_str(), first.path.as_str()), ("GET", "/api/pages"));
    assert_eq!(first.query.get("pagination[limit]").map(String::as_str), Some("1"));

    let settings = requests
        .iter()
        .find(|r| r.is_write() && r.path == "/api/site-setting")
        .unwrap();
    assert_eq!(settings.method, "PUT");
    assert_eq!(settings.body["data"]["siteName"], json!("OpenHR"));

    let page_creates: Vec<&Exchange> = requests
        .iter()
        .filter(|r| r.method == "POST" && r.path == "/api/pages")
        .collect();
    assert_eq!(page_creates.len(), 3);
    assert!(page_creates.iter().all(|r| r.body["data"]["locale"].is_string()));

    // Wiring a page's sections is followed by a publish of that page.
    let home = report.entity(ContentType::Page, "home").unwrap();
    let home_path = format!("/api/pages/{}", home.document_id);
    let wired = requests
        .iter()
        .position(|r| r.path == home_path && r.body["data"].get("sections").is_some())
        .unwrap();
    assert_eq!(
        requests[wired].body["data"]["sections"]["connect"].as_array().map(Vec::len),
        Some(3)
    );
    let next = &requests[wired + 1];
    assert_eq!((next.method.as_str(), next.path.as_str()), ("PUT", home_path.as_str()));
    assert!(next.body["data"]["publishedAt"].is_string());

    // A second run finds every document and creates nothing.
    let before = server.requests().len();
    let again = seed::run(&mut store, &sample(), &SeedOptions::default()).unwrap();
    assert_eq!(again.count(UpsertAction::Created), 0);
    assert_eq!(again.count(UpsertAction::Updated), 16);
    assert!(server.requests()[before..].iter().all(|r| r.method != "POST"));
}

#[test]
fn rejected_write_during_run_is_a_connectivity_error() {
    let server = CmsServer::start(|exchange| match (exchange.method.as_str(), exchange.path.as_str()) {
        ("GET", "/api/site-setting" | "/api/footer") => (404, strapi_error(404, "Not Found")),
        ("GET", "/api/upload/files") => (200, json!([])),
        ("GET", _) => (200, json!({"data": []})),
        _ => (401, strapi_error(401, "Missing or invalid credentials")),
    });
    let mut store = server.store(Some(TOKEN));

    let err = seed::run(&mut store, &sample(), &SeedOptions::default()).unwrap_err();
    assert!(
        matches!(
            &err,
            SeedError::Connectivity { source: StoreError::Unauthorized { status: 401, .. }, .. }
        ),
        "{err}"
    );
    assert!(err.to_string().contains("To fix:"), "{err}");

    // The run stopped at the first write.
    let writes: Vec<Exchange> = server.requests().into_iter().filter(Exchange::is_write).collect();
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0].path, "/api/site-setting");
}
