//! Tenable.io plugin catalog and scans over HTTP.
//!
//! Plugins are listed with `GET /plugins/plugin?page=&size=&last_updated=`;
//! a single plugin is `GET /plugins/plugin/{id}`. Scans are listed with
//! `GET /scans?last_modification_date=<unix seconds>` and read with
//! `GET /scans/{id}`. All requests authenticate with the `X-ApiKeys` header
//! built from an access/secret key pair.

use chrono::NaiveDate;
use reqwest::blocking::{Client, Response};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT};
use serde::Deserialize;
use tracing::debug;

use crate::catalog::{FetchParams, PluginDetailsList};
use crate::config::ApiConfig;
use crate::error::{Result, SyncError};
use crate::source::{CatalogPage, PageSource};

pub const ACCESS_KEY_ENV: &str = "TENABLE_ACCESS_KEY";
pub const SECRET_KEY_ENV: &str = "TENABLE_SECRET_KEY";

const USER_AGENT: &str = concat!("nessync/", env!("CARGO_PKG_VERSION"));

/// Access/secret key pair for the API
#[derive(Clone)]
pub struct Credentials {
    access_key: String,
    secret_key: String,
}

impl Credentials {
    /// Blank keys are rejected before any request is made.
    pub fn new(access_key: &str, secret_key: &str) -> Result<Self> {
        let (access_key, secret_key) = (access_key.trim(), secret_key.trim());
        if access_key.is_empty() || secret_key.is_empty() {
            return Err(SyncError::MissingCredentials);
        }
        Ok(Credentials {
            access_key: access_key.to_string(),
            secret_key: secret_key.to_string(),
        })
    }

    fn header_value(&self) -> String {
        format!("accessKey={};secretKey={}", self.access_key, self.secret_key)
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key", &"***")
            .field("secret_key", &"***")
            .finish()
    }
}

/// One page of `GET /plugins/plugin`. The echoed `params` block is not read.
#[derive(Deserialize)]
struct PluginPage {
    #[serde(default)]
    total_count: u64,

    #[serde(default)]
    data: PluginDetailsList,
}

/// Blocking client for the plugin catalog and scan endpoints
pub struct TenableClient {
    client: Client,
    endpoint: String,
    scans_endpoint: String,
}

impl TenableClient {
    pub fn new(api: &ApiConfig, credentials: &Credentials) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let mut keys = HeaderValue::from_str(&credentials.header_value())
            .map_err(|_| SyncError::InvalidParams("API keys contain invalid header characters".into()))?;
        keys.set_sensitive(true);
        headers.insert(HeaderName::from_static("x-apikeys"), keys);

        let client = Client::builder()
            .default_headers(headers)
            .user_agent(USER_AGENT)
            .timeout(api.timeout())
            .build()
            .map_err(|e| SyncError::transport(api.plugins_endpoint(), e))?;

        Ok(TenableClient {
            client,
            endpoint: api.plugins_endpoint(),
            scans_endpoint: api.scans_endpoint(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Details of one plugin, as the API returns them.
    pub fn fetch_plugin(&self, id: i64) -> Result<serde_json::Value> {
        self.get_json(&format!("{}/{}", self.endpoint, id), &[])
    }

    /// Scan list, optionally limited to scans modified since midnight UTC of `since`.
    pub fn list_scans(&self, since: Option<NaiveDate>) -> Result<serde_json::Value> {
        let query: Vec<(&str, String)> = since
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .map(|midnight| midnight.and_utc().timestamp())
            .map(|ts| vec![("last_modification_date", ts.to_string())])
            .unwrap_or_default();
        self.get_json(&self.scans_endpoint, &query)
    }

    /// Details of one scan, as the API returns them.
    pub fn fetch_scan(&self, id: i64) -> Result<serde_json::Value> {
        self.get_json(&format!("{}/{}", self.scans_endpoint, id), &[])
    }

    fn get_json(&self, url: &str, query: &[(&str, String)]) -> Result<serde_json::Value> {
        debug!("GET {} {:?}", url, query);
        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .map_err(|e| SyncError::transport(url, e))?;
        decode(url, response)
    }
}

impl PageSource for TenableClient {
    fn fetch_page(&self, params: &FetchParams) -> Result<CatalogPage> {
        debug!("GET {} {:?}", self.endpoint, params.query_pairs());
        let response = self
            .client
            .get(&self.endpoint)
            .query(&params.query_pairs())
            .send()
            .map_err(|e| SyncError::transport(&self.endpoint, e))?;

        let page: PluginPage = decode(&self.endpoint, response)?;
        Ok(CatalogPage {
            total_count: page.total_count,
            entries: page.data.plugin_details,
        })
    }
}

/// Non-2xx is a transport failure; an unreadable body is a decode failure.
fn decode<T: serde::de::DeserializeOwned>(url: &str, response: Response) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        return Err(SyncError::transport(url, format!("server answered {}", status)));
    }
    let body = response
        .bytes()
        .map_err(|e| SyncError::transport(url, e))?;
    serde_json::from_slice(&body).map_err(|source| SyncError::Decode {
        url: url.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    // The blocking client owns a runtime, so it is built and dropped off the async threads.
    fn client_for(base_url: String) -> TenableClient {
        let api = ApiConfig {
            base_url,
            ..Default::default()
        };
        let creds = Credentials::new("ak", "sk").unwrap();
        TenableClient::new(&api, &creds).unwrap()
    }

    fn page_body(ids: &[i64], total: u64) -> serde_json::Value {
        let details: Vec<_> = ids
            .iter()
            .map(|id| {
                serde_json::json!({
                    "id": id,
                    "name": format!("plugin {id}"),
                    "attributes": {
                        "plugin_publication_date": "2020-01-01T00:00:00Z",
                        "plugin_modification_date": "2021-01-01T00:00:00Z",
                        "risk_factor": "Medium"
                    }
                })
            })
            .collect();
        serde_json::json!({
            "size": ids.len(),
            "total_count": total,
            "params": {"page": 1, "size": 2},
            "data": {"plugin_details": details}
        })
    }

    #[test]
    fn blank_credentials_are_rejected() {
        assert!(matches!(Credentials::new("", "sk"), Err(SyncError::MissingCredentials)));
        assert!(matches!(Credentials::new("ak", "  "), Err(SyncError::MissingCredentials)));
        let creds = Credentials::new(" AK-1 ", "SK-2").unwrap();
        assert!(!format!("{creds:?}").contains("SK-2"));
        assert_eq!(creds.header_value(), "accessKey=AK-1;secretKey=SK-2");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn fetch_page_sends_query_and_keys() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/plugins/plugin"))
            .and(query_param("page", "2"))
            .and(query_param("size", "2"))
            .and(query_param("last_updated", "2024-03-01"))
            .and(header("X-ApiKeys", "accessKey=ak;secretKey=sk"))
            .and(header("Accept", "application/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page_body(&[3, 4], 5)))
            .expect(1)
            .mount(&server)
            .await;

        let uri = server.uri();
        let page = tokio::task::spawn_blocking(move || {
            let client = client_for(uri);
            let params = FetchParams {
                page: 2,
                page_size: 2,
                last_updated: chrono::NaiveDate::from_ymd_opt(2024, 3, 1),
            };
            client.fetch_page(&params)
        })
        .await
        .unwrap()
        .unwrap();

        assert_eq!(page.total_count, 5);
        let ids: Vec<i64> = page.entries.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![3, 4]);
        assert_eq!(page.entries[0].attributes.extra["risk_factor"], "Medium");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn error_status_is_a_transport_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/plugins/plugin"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let uri = server.uri();
        let result = tokio::task::spawn_blocking(move || client_for(uri).fetch_page(&FetchParams::new(10, None)))
            .await
            .unwrap();
        match result {
            Err(e @ SyncError::Transport { .. }) => {
                assert!(e.is_retryable());
                assert!(e.to_string().contains("429"));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn malformed_body_is_a_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/plugins/plugin"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
            .mount(&server)
            .await;

        let uri = server.uri();
        let result = tokio::task::spawn_blocking(move || client_for(uri).fetch_page(&FetchParams::new(10, None)))
            .await
            .unwrap();
        assert!(matches!(result, Err(SyncError::Decode { .. })));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn page_with_timestamp_filter_and_null_fields_decodes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/plugins/plugin"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "size": 2,
                "total_count": 2,
                "params": {"page": "1", "size": 2, "last_updated": "2024-03-01T00:00:00Z"},
                "data": {"plugin_details": [
                    {
                        "id": 1,
                        "name": null,
                        "attributes": {
                            "plugin_publication_date": null,
                            "plugin_modification_date": "2024-03-02T00:00:00Z"
                        }
                    },
                    {"id": 2, "name": "plugin 2", "attributes": {}}
                ]}
            })))
            .mount(&server)
            .await;

        let uri = server.uri();
        let page = tokio::task::spawn_blocking(move || client_for(uri).fetch_page(&FetchParams::new(2, None)))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(page.total_count, 2);
        assert_eq!(page.entries[0].name, "");
        assert_eq!(page.entries[0].attributes.plugin_publication_date, "");
        assert_eq!(page.entries[0].attributes.plugin_modification_date, "2024-03-02T00:00:00Z");
        assert_eq!(page.entries[1].attributes.plugin_modification_date, "");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn list_scans_filters_by_unix_timestamp() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/scans"))
            .and(query_param("last_modification_date", "1705276800"))
            .and(header("X-ApiKeys", "accessKey=ak;secretKey=sk"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "folders": [],
                "scans": [{"id": 42, "name": "weekly"}],
                "timestamp": 1705300000
            })))
            .expect(1)
            .mount(&server)
            .await;

        let uri = server.uri();
        let scans = tokio::task::spawn_blocking(move || {
            client_for(uri).list_scans(chrono::NaiveDate::from_ymd_opt(2024, 1, 15))
        })
        .await
        .unwrap()
        .unwrap();
        assert_eq!(scans["scans"][0]["id"], 42);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn list_scans_without_date_sends_no_filter() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/scans"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"scans": []})))
            .mount(&server)
            .await;

        let uri = server.uri();
        let scans = tokio::task::spawn_blocking(move || client_for(uri).list_scans(None))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(scans["scans"], serde_json::json!([]));

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].url.query(), None);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn fetch_scan_reads_details_and_reports_missing_scans() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/scans/42"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "info": {"name": "weekly", "status": "completed"},
                "hosts": []
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/scans/7"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let uri = server.uri();
        let (found, missing) = tokio::task::spawn_blocking(move || {
            let client = client_for(uri);
            (client.fetch_scan(42), client.fetch_scan(7))
        })
        .await
        .unwrap();
        assert_eq!(found.unwrap()["info"]["status"], "completed");
        assert!(matches!(missing, Err(SyncError::Transport { .. })));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn fetch_plugin_returns_raw_details() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/plugins/plugin/19506"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": 19506,
                "name": "Nessus Scan Information",
                "attributes": [{"attribute_name": "risk_factor", "attribute_value": "None"}]
            })))
            .mount(&server)
            .await;

        let uri = server.uri();
        let details = tokio::task::spawn_blocking(move || client_for(uri).fetch_plugin(19506))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(details["name"], "Nessus Scan Information");
    }
}
