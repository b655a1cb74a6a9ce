use std::io::Read;
use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};

use chrono::{DateTime, NaiveDateTime};
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::catalog::{CatalogClient, SearchResults};
use crate::domain::{Collection, Polygon, Product, ProductId, TimeRange};
use crate::error::SatfetchError;
use crate::job::{Customization, JobHandle, JobService};
use crate::time::floor_to_snapshot;

pub const LOGIN_ENV: &str = "EUMETSAT_API_LOGIN";
pub const PASSWORD_ENV: &str = "EUMETSAT_API_PASSWORD";

const API_BASE: &str = "https://api.eumetsat.int";
const PAGE_SIZE: u64 = 100;
const MAX_PAGES: u64 = 10_000;
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
struct AccessToken {
    value: String,
    expires_at: Instant,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomisationStatus {
    pub status: String,
    pub outputs: Vec<String>,
}

pub struct EumetsatHttpClient {
    client: Client,
    /// Output downloads are bounded only while connecting, never on the body read.
    download_client: Client,
    base_url: String,
    collection: Collection,
    login: String,
    password: String,
    token: Mutex<Option<AccessToken>>,
}

impl EumetsatHttpClient {
    /// Builds a client with credentials read from [`LOGIN_ENV`] and [`PASSWORD_ENV`].
    pub fn new(collection: Collection) -> Result<Self, SatfetchError> {
        let login = read_credential(LOGIN_ENV)?;
        let password = read_credential(PASSWORD_ENV)?;
        Self::with_credentials(collection, login, password)
    }

    pub fn with_credentials(
        collection: Collection,
        login: String,
        password: String,
    ) -> Result<Self, SatfetchError> {
        Ok(Self {
            client: api_client(REQUEST_TIMEOUT)?,
            download_client: download_client()?,
            base_url: API_BASE.to_string(),
            collection,
            login,
            password,
            token: Mutex::new(None),
        })
    }

    /// Replaces the whole-request timeout of catalog and job calls.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Result<Self, SatfetchError> {
        self.client = api_client(timeout)?;
        Ok(self)
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn collection(&self) -> Collection {
        self.collection
    }

    fn token(&self) -> Result<String, SatfetchError> {
        let mut guard = self
            .token
            .lock()
            .map_err(|_| SatfetchError::EumetsatHttp("token cache poisoned".to_string()))?;
        if let Some(token) = guard.as_ref() {
            if Instant::now() + TOKEN_REFRESH_MARGIN < token.expires_at {
                return Ok(token.value.clone());
            }
        }

        let url = format!("{}/token", self.base_url);
        let response = self.send_with_retries(|| {
            self.client
                .post(&url)
                .basic_auth(&self.login, Some(&self.password))
                .form(&[("grant_type", "client_credentials")])
        })?;
        let response = Self::handle_status(response)?;
        let body: TokenResponse = response
            .json()
            .map_err(|err| SatfetchError::InvalidResponse(err.to_string()))?;
        info!(
            "accessing token '{}' issued at {}, expires in {}s",
            abbreviate_token(&body.access_token),
            chrono::Utc::now(),
            body.expires_in
        );
        let token = AccessToken {
            value: body.access_token,
            expires_at: Instant::now() + Duration::from_secs(body.expires_in),
        };
        let value = token.value.clone();
        *guard = Some(token);
        Ok(value)
    }

    fn send_with_retries<F>(
        &self,
        mut make_req: F,
    ) -> Result<reqwest::blocking::Response, SatfetchError>
    where
        F: FnMut() -> reqwest::blocking::RequestBuilder,
    {
        const MAX_RETRIES: usize = 3;
        const BASE_DELAY_MS: u64 = 500;
        let mut attempt = 0usize;
        loop {
            let response = make_req().send();
            match response {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    if attempt < MAX_RETRIES && is_retryable_status(status) {
                        let delay = BASE_DELAY_MS * (attempt as u64 + 1);
                        debug!(status, delay_ms = delay, "retrying EUMETSAT request");
                        thread::sleep(Duration::from_millis(delay));
                        attempt += 1;
                        continue;
                    }
                    return Ok(resp);
                }
                Err(err) => {
                    if attempt < MAX_RETRIES && is_retryable_error(&err) {
                        let delay = BASE_DELAY_MS * (attempt as u64 + 1);
                        debug!(error = %err, delay_ms = delay, "retrying EUMETSAT request");
                        thread::sleep(Duration::from_millis(delay));
                        attempt += 1;
                        continue;
                    }
                    return Err(SatfetchError::EumetsatHttp(err.to_string()));
                }
            }
        }
    }

    fn handle_status(
        response: reqwest::blocking::Response,
    ) -> Result<reqwest::blocking::Response, SatfetchError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let message = response
            .text()
            .unwrap_or_else(|_| "EUMETSAT request failed".to_string());
        Err(SatfetchError::EumetsatStatus { status, message })
    }

    fn search_page(
        &self,
        range: &TimeRange,
        geo: Option<&Polygon>,
        start_index: u64,
        count: u64,
    ) -> Result<SearchResults, SatfetchError> {
        let url = format!("{}/data/search-products/1.0.0/os", self.base_url);
        let mut params = vec![
            ("format", "json".to_string()),
            ("pi", self.collection.query_string().to_string()),
            ("dtstart", format_instant(range.start())),
            (
                "dtend",
                format_instant(floor_to_snapshot(
                    range.end(),
                    self.collection.snapshot_minutes(),
                )),
            ),
            ("sort", "start,time,0".to_string()),
            ("si", start_index.to_string()),
            ("c", count.to_string()),
        ];
        if let Some(polygon) = geo {
            params.push(("geo", polygon.to_string()));
        }
        let response = self.send_with_retries(|| self.client.get(&url).query(&params))?;
        let response = Self::handle_status(response)?;
        let body: Value = response
            .json()
            .map_err(|err| SatfetchError::InvalidResponse(err.to_string()))?;
        parse_search_page(&body)
    }

    fn customisation_status(&self, job: &JobHandle) -> Result<CustomisationStatus, SatfetchError> {
        let token = self.token()?;
        let url = format!("{}/epcs/customisations/{}", self.base_url, job.as_str());
        let response = self.send_with_retries(|| self.client.get(&url).bearer_auth(&token))?;
        let response = Self::handle_status(response)?;
        let body: Value = response
            .json()
            .map_err(|err| SatfetchError::InvalidResponse(err.to_string()))?;
        parse_customisation_status(&body, job)
    }
}

impl CatalogClient for EumetsatHttpClient {
    fn search(
        &self,
        range: &TimeRange,
        geo: Option<&Polygon>,
    ) -> Result<SearchResults, SatfetchError> {
        let mut results = SearchResults::default();
        let mut page = 0u64;
        loop {
            if page >= MAX_PAGES {
                return Err(SatfetchError::InvalidResponse(format!(
                    "page limit ({MAX_PAGES}) exceeded for period {range}"
                )));
            }
            let start_index = results.items.len() as u64;
            let next = self.search_page(range, geo, start_index, PAGE_SIZE)?;
            if page == 0 {
                results.total = next.total;
            }
            debug!(page, received = next.items.len(), "catalog page");
            if next.items.is_empty() {
                break;
            }
            results.items.extend(next.items);
            if results.items.len() as u64 >= results.total {
                break;
            }
            page += 1;
        }
        Ok(results)
    }

    fn count(&self, range: &TimeRange, geo: Option<&Polygon>) -> Result<u64, SatfetchError> {
        Ok(self.search_page(range, geo, 0, 1)?.total)
    }
}

impl JobService for EumetsatHttpClient {
    fn submit(
        &self,
        product: &Product,
        customization: &Customization,
    ) -> Result<JobHandle, SatfetchError> {
        let token = self.token()?;
        let url = format!("{}/epcs/customisations", self.base_url);
        let product_url = product_download_url(&self.base_url, self.collection, &product.id);
        let chain = chain_config(customization).to_string();
        let response = self.send_with_retries(|| {
            self.client.post(&url).bearer_auth(&token).form(&[
                ("product_paths", product_url.as_str()),
                ("access_token", token.as_str()),
                ("chain_config", chain.as_str()),
            ])
        })?;
        let response = Self::handle_status(response)?;
        let body: Value = response
            .json()
            .map_err(|err| SatfetchError::InvalidResponse(err.to_string()))?;
        body.get("data")
            .and_then(|data| data.get(0))
            .and_then(Value::as_str)
            .map(JobHandle::new)
            .ok_or_else(|| {
                SatfetchError::InvalidResponse(format!("customisation id missing in {body}"))
            })
    }

    fn status(&self, job: &JobHandle) -> Result<String, SatfetchError> {
        Ok(self.customisation_status(job)?.status)
    }

    fn outputs(&self, job: &JobHandle) -> Result<Vec<String>, SatfetchError> {
        Ok(self.customisation_status(job)?.outputs)
    }

    fn stream_output(
        &self,
        _job: &JobHandle,
        output: &str,
    ) -> Result<Box<dyn Read + Send>, SatfetchError> {
        let token = self.token()?;
        let url = format!("{}/epcs/download", self.base_url);
        let response = self.send_with_retries(|| {
            self.download_client
                .get(&url)
                .bearer_auth(&token)
                .query(&[("path", output)])
        })?;
        let response = Self::handle_status(response)?;
        Ok(Box::new(response))
    }
}

fn default_headers() -> Result<HeaderMap, SatfetchError> {
    let mut headers = HeaderMap::new();
    headers.insert(
        USER_AGENT,
        HeaderValue::from_str(&format!("satfetch/{}", env!("CARGO_PKG_VERSION")))
            .map_err(|err| SatfetchError::EumetsatHttp(err.to_string()))?,
    );
    Ok(headers)
}

fn api_client(timeout: Duration) -> Result<Client, SatfetchError> {
    Client::builder()
        .default_headers(default_headers()?)
        .timeout(timeout)
        .build()
        .map_err(|err| SatfetchError::EumetsatHttp(err.to_string()))
}

fn download_client() -> Result<Client, SatfetchError> {
    Client::builder()
        .default_headers(default_headers()?)
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(None)
        .build()
        .map_err(|err| SatfetchError::EumetsatHttp(err.to_string()))
}

pub fn product_download_url(base_url: &str, collection: Collection, id: &ProductId) -> String {
    format!(
        "{}/data/download/1.0.0/collections/{}/products/{}",
        base_url.trim_end_matches('/'),
        collection.query_string().replace(':', "%3A"),
        id.as_str()
    )
}

pub fn chain_config(customization: &Customization) -> Value {
    json!({
        "product": customization.product_type,
        "format": customization.format.to_string(),
        "roi": {
            "NSWE": <[f64; 4]>::from(customization.roi),
        },
    })
}

pub fn parse_search_page(body: &Value) -> Result<SearchResults, SatfetchError> {
    let total = body
        .get("totalResults")
        .and_then(Value::as_u64)
        .ok_or_else(|| SatfetchError::InvalidResponse("totalResults missing".to_string()))?;
    let features = body
        .get("features")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    let items = features
        .iter()
        .map(|feature| {
            let id = feature
                .get("id")
                .and_then(Value::as_str)
                .ok_or_else(|| SatfetchError::InvalidResponse("feature without id".to_string()))?
                .parse::<ProductId>()?;
            let product = Product::new(id);
            Ok(match sensing_start(feature) {
                Some(start) => product.with_sensing_start(start),
                None => product,
            })
        })
        .collect::<Result<Vec<_>, SatfetchError>>()?;

    Ok(SearchResults { items, total })
}

pub fn parse_customisation_status(
    body: &Value,
    job: &JobHandle,
) -> Result<CustomisationStatus, SatfetchError> {
    let entry = body.get(job.as_str()).ok_or_else(|| {
        SatfetchError::InvalidResponse(format!("customisation {job} missing in response"))
    })?;
    let status = entry
        .get("status")
        .and_then(Value::as_str)
        .ok_or_else(|| {
            SatfetchError::InvalidResponse(format!("customisation {job} without status"))
        })?
        .to_string();
    let outputs = entry
        .get("output_products")
        .and_then(Value::as_array)
        .map(|values| {
            values
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    Ok(CustomisationStatus { status, outputs })
}

fn sensing_start(feature: &Value) -> Option<NaiveDateTime> {
    let date = feature.get("properties")?.get("date")?.as_str()?;
    let start = date.split('/').next()?;
    DateTime::parse_from_rfc3339(start)
        .ok()
        .map(|value| value.naive_utc())
}

fn format_instant(instant: NaiveDateTime) -> String {
    instant.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

fn abbreviate_token(token: &str) -> String {
    let chars = token.chars().collect::<Vec<_>>();
    if chars.len() <= 6 {
        return "...".to_string();
    }
    let head = chars[..3].iter().collect::<String>();
    let tail = chars[chars.len() - 3..].iter().collect::<String>();
    format!("{head} ... {tail}")
}

fn read_credential(key: &str) -> Result<String, SatfetchError> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| SatfetchError::MissingCredentials(key.to_string()))
}

fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}
