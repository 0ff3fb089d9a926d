//! UniFi Network controller client.
//!
//! Reservations live on the controller as "users" (known clients) with
//! `use_fixedip` set. The client reads them per site and drives plan changes
//! through the same REST resource. All requests authenticate with the
//! environment's API key in the `X-API-KEY` header.

use std::collections::HashMap;

use reqwest::blocking::{Client, Response};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use reservation_diff_core::{
    ApplyDriver, BoxError, Change, ChangeOutcome, Environment, MacAddress, Observed,
    ObservedStateFetcher, RawReservation, Reservation,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

const SITES_PATH: &str = "/proxy/network/api/self/sites";
const AUTH_CHECK_PATH: &str = "/proxy/network/integration/v1/sites";

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("API key is not a valid header value")]
    InvalidKey,
    #[error("request to {url} failed: {source}")]
    Transport { url: String, source: reqwest::Error },
    #[error("authentication failed at {url}: invalid API key")]
    Unauthorized { url: String },
    #[error("{url} returned {status}: {body}")]
    Status {
        url: String,
        status: StatusCode,
        body: String,
    },
    #[error("unexpected response from {url}: {source}")]
    Decode { url: String, source: reqwest::Error },
    #[error("no controller record for {0}")]
    UnknownClient(MacAddress),
    #[error("site not resolved; observed state must be fetched first")]
    SiteUnresolved,
}

/// `{"meta": {...}, "data": [...]}` wrapper used by the classic API.
#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
    #[serde(default = "Vec::new")]
    data: Vec<T>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SiteRecord {
    /// Short name used in API paths.
    pub name: String,
    #[serde(default)]
    pub desc: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct UserRecord {
    #[serde(rename = "_id", default)]
    pub id: Option<String>,
    #[serde(default)]
    pub mac: String,
    #[serde(default)]
    pub use_fixedip: bool,
    #[serde(default)]
    pub fixed_ip: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub hostname: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
}

/// Body for creating or updating a user.
#[derive(Debug, Serialize, PartialEq)]
struct UserPayload<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    mac: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    fixed_ip: Option<String>,
    use_fixedip: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    note: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    noted: Option<bool>,
}

impl<'a> UserPayload<'a> {
    fn reserve(r: &'a Reservation, include_mac: bool) -> Self {
        Self {
            mac: include_mac.then(|| r.mac_address.to_string()),
            fixed_ip: Some(r.ip_address.to_string()),
            use_fixedip: true,
            name: Some(&r.hostname),
            note: Some(r.description.as_deref().unwrap_or("")),
            noted: Some(r.description.is_some()),
        }
    }

    fn release() -> Self {
        Self {
            mac: None,
            fixed_ip: None,
            use_fixedip: false,
            name: None,
            note: None,
            noted: None,
        }
    }
}

/// Site belonging to `environment`: short name equal to its host label, else
/// description equal to its display name.
pub fn find_site<'s>(sites: &'s [SiteRecord], environment: &Environment) -> Option<&'s SiteRecord> {
    sites
        .iter()
        .find(|s| s.name == environment.host_label)
        .or_else(|| sites.iter().find(|s| s.desc == environment.display_name))
}

/// Reservations among `users`: fixed-IP entries only. Hostname comes from the
/// alias (`name`), falling back to the DHCP hostname. A fixed-IP entry without
/// an address keeps an empty one so validation rejects the batch.
pub fn reservations_from_users(users: &[UserRecord]) -> Vec<RawReservation> {
    users
        .iter()
        .filter(|u| u.use_fixedip)
        .map(|u| RawReservation {
            mac_address: u.mac.clone(),
            ip_address: u.fixed_ip.clone().unwrap_or_default(),
            hostname: u
                .name
                .clone()
                .or_else(|| u.hostname.clone())
                .unwrap_or_default(),
            description: u.note.clone().filter(|n| !n.trim().is_empty()),
        })
        .collect()
}

/// Controller record id per MAC, for every user whether reserved or not.
pub fn user_index(users: &[UserRecord]) -> HashMap<MacAddress, String> {
    users
        .iter()
        .filter_map(|u| {
            let mac = u.mac.parse::<MacAddress>().ok()?;
            Some((mac, u.id.clone()?))
        })
        .collect()
}

/// Blocking client for one environment's controller.
pub struct UnifiClient {
    http: Client,
    base_url: String,
    site: Option<String>,
    users: HashMap<MacAddress, String>,
}

impl UnifiClient {
    /// Build a client from the environment's connection settings. No request is sent.
    pub fn connect(environment: &Environment) -> Result<Self, ControllerError> {
        let mut key = HeaderValue::from_str(environment.credential.expose())
            .map_err(|_| ControllerError::InvalidKey)?;
        key.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(HeaderName::from_static("x-api-key"), key);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http = Client::builder()
            .timeout(environment.connection.timeout)
            .danger_accept_invalid_certs(!environment.connection.verify_tls)
            .default_headers(headers)
            .build()
            .map_err(ControllerError::Client)?;

        Ok(Self {
            http,
            base_url: environment.connection.base_url.clone(),
            site: None,
            users: HashMap::new(),
        })
    }

    /// Verify the API key against the integration API.
    pub fn check_connection(&self) -> Result<(), ControllerError> {
        let url = self.url(AUTH_CHECK_PATH);
        let response = self.send(Method::GET, &url, None::<&()>)?;
        expect_success(&url, response).map(|_| ())
    }

    pub fn sites(&self) -> Result<Vec<SiteRecord>, ControllerError> {
        self.get_data(SITES_PATH)
    }

    /// Every known user of `site`, reserved or not.
    pub fn users(&self, site: &str) -> Result<Vec<UserRecord>, ControllerError> {
        self.get_data(&format!("/proxy/network/api/s/{site}/rest/user"))
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn get_data<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>, ControllerError> {
        let url = self.url(path);
        let response = expect_success(&url, self.send(Method::GET, &url, None::<&()>)?)?;
        let envelope: ApiEnvelope<T> = response
            .json()
            .map_err(|source| ControllerError::Decode { url, source })?;
        Ok(envelope.data)
    }

    fn send<B: Serialize>(
        &self,
        method: Method,
        url: &str,
        body: Option<&B>,
    ) -> Result<Response, ControllerError> {
        debug!(%method, %url, "controller request");
        let mut request = self.http.request(method, url);
        if let Some(body) = body {
            request = request.json(body);
        }
        request.send().map_err(|source| ControllerError::Transport {
            url: url.to_string(),
            source,
        })
    }

    fn user_id(&self, mac: MacAddress) -> Result<&str, ControllerError> {
        self.users
            .get(&mac)
            .map(String::as_str)
            .ok_or(ControllerError::UnknownClient(mac))
    }

    fn mutate(&self, change: &Change) -> Result<(), ControllerError> {
        let site = self.site.as_deref().ok_or(ControllerError::SiteUnresolved)?;
        let collection = format!("/proxy/network/api/s/{site}/rest/user");

        let (method, path, payload) = match change {
            Change::Remove(r) => {
                let id = self.user_id(r.mac_address)?;
                (Method::PUT, format!("{collection}/{id}"), UserPayload::release())
            }
            Change::Update(u) => {
                let id = self.user_id(u.mac())?;
                (
                    Method::PUT,
                    format!("{collection}/{id}"),
                    UserPayload::reserve(&u.after, false),
                )
            }
            // A known but unreserved client is updated in place.
            Change::Add(r) => match self.users.get(&r.mac_address) {
                Some(id) => (
                    Method::PUT,
                    format!("{collection}/{id}"),
                    UserPayload::reserve(r, false),
                ),
                None => (Method::POST, collection, UserPayload::reserve(r, true)),
            },
        };

        let url = self.url(&path);
        expect_success(&url, self.send(method, &url, Some(&payload))?).map(|_| ())
    }
}

impl ObservedStateFetcher for UnifiClient {
    fn fetch(&mut self, environment: &Environment) -> Result<Observed, BoxError> {
        let sites = self.sites()?;
        let Some(site) = find_site(&sites, environment) else {
            debug!(environment = %environment.id, sites = sites.len(), "no matching site");
            self.site = None;
            return Ok(Observed::default());
        };
        let site = site.name.clone();

        let users = self.users(&site)?;
        self.users = user_index(&users);
        let reservations = reservations_from_users(&users);
        debug!(
            environment = %environment.id,
            %site,
            users = users.len(),
            reservations = reservations.len(),
            "read controller users"
        );
        self.site = Some(site);

        Ok(Observed {
            site_found: true,
            reservations,
        })
    }
}

impl ApplyDriver for UnifiClient {
    fn apply_one(&mut self, _environment: &Environment, change: &Change) -> ChangeOutcome {
        match self.mutate(change) {
            Ok(()) => ChangeOutcome::Applied,
            Err(err) => ChangeOutcome::Failed(err.to_string()),
        }
    }
}

fn expect_success(url: &str, response: Response) -> Result<Response, ControllerError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::UNAUTHORIZED {
        return Err(ControllerError::Unauthorized {
            url: url.to_string(),
        });
    }
    let body = response.text().unwrap_or_default();
    Err(ControllerError::Status {
        url: url.to_string(),
        status,
        body,
    })
}
