#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{json, Value};
use tokio::runtime::Runtime;
use wiremock::matchers::{any, header, method, path, path_regex};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

pub const API_KEY: &str = "test-key";
pub const KEY_VAR: &str = "UDS_TEST_API_KEY";

const USERS: &str = "/proxy/network/api/s/default/rest/user";

/// In-memory UniFi controller with one site, `default` / "Default Site".
pub struct FakeUnifi {
    server: MockServer,
    runtime: Runtime,
    pub users: Arc<Mutex<Vec<Value>>>,
}

impl FakeUnifi {
    /// `reject_mac`: writes touching this MAC answer 500.
    pub fn start(users: Vec<Value>, reject_mac: Option<&'static str>) -> Self {
        Self::with_write_delay(users, reject_mac, None)
    }

    /// Like [`FakeUnifi::start`], but every write answers after `delay`.
    pub fn with_write_delay(
        users: Vec<Value>,
        reject_mac: Option<&'static str>,
        delay: Option<Duration>,
    ) -> Self {
        let runtime = Runtime::new().expect("runtime");
        let users = Arc::new(Mutex::new(users));
        let responder = UserResource {
            users: Arc::clone(&users),
            reject_mac,
            delay,
        };
        let server = runtime.block_on(async {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .and(path("/proxy/network/integration/v1/sites"))
                .and(header("x-api-key", API_KEY))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [] })))
                .mount(&server)
                .await;
            Mock::given(method("GET"))
                .and(path("/proxy/network/api/self/sites"))
                .and(header("x-api-key", API_KEY))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "data": [{ "name": "default", "desc": "Default Site" }]
                })))
                .mount(&server)
                .await;
            Mock::given(path_regex(r"^/proxy/network/api/s/default/rest/user(/[^/]+)?$"))
                .and(header("x-api-key", API_KEY))
                .respond_with(responder)
                .mount(&server)
                .await;
            Mock::given(any())
                .respond_with(
                    ResponseTemplate::new(401).set_body_json(json!({ "error": "unauthorized" })),
                )
                .with_priority(10)
                .mount(&server)
                .await;
            server
        });

        Self {
            server,
            runtime,
            users,
        }
    }

    pub fn base_url(&self) -> String {
        self.server.uri()
    }

    /// Every request the controller has seen, in arrival order.
    pub fn recorded(&self) -> Vec<Request> {
        self.runtime
            .block_on(self.server.received_requests())
            .unwrap_or_default()
    }

    pub fn user(&self, mac: &str) -> Option<Value> {
        self.users
            .lock()
            .expect("lock")
            .iter()
            .find(|u| u["mac"] == mac)
            .cloned()
    }

    pub fn writes(&self) -> usize {
        self.recorded()
            .iter()
            .filter(|r| r.method.as_str() != "GET")
            .count()
    }
}

/// The user collection: GET lists it, POST creates, PUT merges into one record.
struct UserResource {
    users: Arc<Mutex<Vec<Value>>>,
    reject_mac: Option<&'static str>,
    delay: Option<Duration>,
}

impl UserResource {
    fn write(&self, template: ResponseTemplate) -> ResponseTemplate {
        match self.delay {
            Some(delay) => template.set_delay(delay),
            None => template,
        }
    }
}

impl Respond for UserResource {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let mut users = self.users.lock().expect("lock");
        let body: Value = serde_json::from_slice(&request.body).unwrap_or(Value::Null);
        let error = || json!({ "meta": { "rc": "error" } });

        match request.method.as_str() {
            "GET" => ResponseTemplate::new(200)
                .set_body_json(json!({ "meta": { "rc": "ok" }, "data": users.clone() })),
            "POST" => {
                if self.reject_mac.is_some_and(|m| body["mac"] == m) {
                    return self.write(ResponseTemplate::new(500).set_body_json(error()));
                }
                let mut created = body;
                created["_id"] = json!(format!("new{}", users.len()));
                users.push(created.clone());
                let reply = json!({ "data": [created] });
                self.write(ResponseTemplate::new(200).set_body_json(reply))
            }
            "PUT" => {
                let id = request
                    .url
                    .path()
                    .trim_start_matches(USERS)
                    .trim_start_matches('/');
                let Some(user) = users.iter_mut().find(|u| u["_id"] == id) else {
                    return ResponseTemplate::new(404).set_body_json(error());
                };
                if self.reject_mac.is_some_and(|m| user["mac"] == m) {
                    return self.write(ResponseTemplate::new(500).set_body_json(error()));
                }
                if let (Some(target), Some(fields)) = (user.as_object_mut(), body.as_object()) {
                    for (k, v) in fields {
                        target.insert(k.clone(), v.clone());
                    }
                }
                let reply = json!({ "data": [user.clone()] });
                self.write(ResponseTemplate::new(200).set_body_json(reply))
            }
            _ => ResponseTemplate::new(405).set_body_json(error()),
        }
    }
}

pub fn user(id: &str, mac: &str, fixed_ip: Option<&str>, name: &str) -> Value {
    let mut user = json!({ "_id": id, "mac": mac, "name": name, "use_fixedip": fixed_ip.is_some() });
    if let Some(ip) = fixed_ip {
        user["fixed_ip"] = json!(ip);
    }
    user
}

/// Config with environments `dev` (at `base_url`) and `prod` (keyed by an unset variable).
pub fn write_config(dir: &Path, base_url: &str) -> PathBuf {
    let path = dir.join("unifi-sync.toml");
    fs::write(
        &path,
        format!(
            r#"state_dir = "state"

[[environment]]
id = "dev"
display_name = "Default Site"
host_label = "default"
base_url = "{base_url}"
api_key_env = "{KEY_VAR}"
timeout_secs = 5

[[environment]]
id = "prod"
display_name = "Production"
host_label = "prod"
base_url = "https://192.0.2.1"
api_key_env = "UDS_TEST_UNSET_KEY"
timeout_secs = 1
"#
        ),
    )
    .expect("write config");
    path
}

pub fn write_desired(dir: &Path, env: &str, records: Value) {
    let state = dir.join("state");
    fs::create_dir_all(&state).expect("state dir");
    fs::write(
        state.join(format!("{env}.json")),
        serde_json::to_string_pretty(&records).expect("json"),
    )
    .expect("write desired");
}

pub fn path_as_str(path: &Path) -> &str {
    path.to_str().expect("utf8 path")
}
