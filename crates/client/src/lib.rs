use std::env;

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tokio::runtime::Runtime;

use csv2thesis_core::{Person, ThesisPlan, ThesisSummary, ThesisType};

pub const URL_ENV: &str = "THESIS_MANAGER_URL";
pub const TOKEN_ENV: &str = "THESIS_MANAGER_API_TOKEN";

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("{0} is not set")]
    MissingEnv(&'static str),
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{method} {url} returned {status}: {body}")]
    Status {
        method: &'static str,
        url: String,
        status: u16,
        body: String,
    },
    #[error("unexpected response from {url}: {message}")]
    Decode { url: String, message: String },
    #[error("failed to start async runtime: {0}")]
    Runtime(#[source] std::io::Error),
}

impl RemoteError {
    /// HTTP status of the failing response, when one was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            RemoteError::Status { status, .. } => Some(*status),
            RemoteError::Transport { source, .. } => source.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Payload for creating a person in the Thesis Manager.
#[derive(Debug, Clone, Serialize)]
pub struct NewPerson {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
}

/// Typed client for the Thesis Manager REST API (token auth).
pub struct ApiClient {
    http: Client,
    base_url: String,
    token: String,
}

impl ApiClient {
    /// Explicit arguments win over the `THESIS_MANAGER_URL` /
    /// `THESIS_MANAGER_API_TOKEN` environment variables.
    pub fn new(url: Option<String>, token: Option<String>) -> Result<Self, RemoteError> {
        let url = url
            .or_else(|| env::var(URL_ENV).ok())
            .map(|u| u.trim().trim_end_matches('/').to_string())
            .filter(|u| !u.is_empty())
            .ok_or(RemoteError::MissingEnv(URL_ENV))?;
        let token = token
            .or_else(|| env::var(TOKEN_ENV).ok())
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or(RemoteError::MissingEnv(TOKEN_ENV))?;
        tracing::debug!(url = %url, "initialized Thesis Manager client");
        Ok(Self {
            http: Client::new(),
            base_url: url,
            token,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/api/{path}/", self.base_url)
    }

    fn auth(&self) -> String {
        format!("Token {}", self.token)
    }

    pub async fn list_people(&self) -> Result<Vec<Person>, RemoteError> {
        self.get_listing("people").await
    }

    pub async fn list_theses(&self) -> Result<Vec<ThesisSummary>, RemoteError> {
        let items: Vec<ThesisListItem> = self.get_listing("theses").await?;
        Ok(items.into_iter().map(ThesisListItem::into_summary).collect())
    }

    pub async fn create_person(&self, person: &NewPerson) -> Result<Person, RemoteError> {
        let url = self.endpoint("people");
        let response = self
            .http
            .post(&url)
            .header("Authorization", self.auth())
            .json(person)
            .send()
            .await
            .map_err(|source| RemoteError::Transport {
                url: url.clone(),
                source,
            })?;
        let value = decode_body(response, "POST", &url).await?;
        serde_json::from_value(value).map_err(|err| RemoteError::Decode {
            url,
            message: err.to_string(),
        })
    }

    pub async fn create_thesis(&self, plan: &ThesisPlan) -> Result<i64, RemoteError> {
        let url = self.endpoint("theses");
        let payload = thesis_payload(plan);
        let response = self
            .http
            .post(&url)
            .header("Authorization", self.auth())
            .json(&payload)
            .send()
            .await
            .map_err(|source| RemoteError::Transport {
                url: url.clone(),
                source,
            })?;
        let value = decode_body(response, "POST", &url).await?;
        value
            .get("id")
            .and_then(Value::as_i64)
            .ok_or_else(|| RemoteError::Decode {
                url,
                message: "created thesis response has no numeric id".to_string(),
            })
    }

    async fn get_listing<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>, RemoteError> {
        let url = self.endpoint(path);
        let response = self
            .http
            .get(&url)
            .header("Authorization", self.auth())
            .send()
            .await
            .map_err(|source| RemoteError::Transport {
                url: url.clone(),
                source,
            })?;
        let value = decode_body(response, "GET", &url).await?;
        let items = listing_items(value).ok_or_else(|| RemoteError::Decode {
            url: url.clone(),
            message: "expected a list or a paginated object with `results`".to_string(),
        })?;
        items
            .into_iter()
            .map(|item| {
                serde_json::from_value(item).map_err(|err| RemoteError::Decode {
                    url: url.clone(),
                    message: err.to_string(),
                })
            })
            .collect()
    }
}

/// Blocking facade over [`ApiClient`]; owns the tokio runtime the batch
/// loop shares for signal handling.
pub struct BlockingApi {
    client: ApiClient,
    runtime: Runtime,
}

impl BlockingApi {
    pub fn new(url: Option<String>, token: Option<String>) -> Result<Self, RemoteError> {
        let client = ApiClient::new(url, token)?;
        let runtime = Runtime::new().map_err(RemoteError::Runtime)?;
        Ok(Self { client, runtime })
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    pub fn base_url(&self) -> &str {
        self.client.base_url()
    }

    pub fn list_people(&self) -> Result<Vec<Person>, RemoteError> {
        self.runtime.block_on(self.client.list_people())
    }

    pub fn list_theses(&self) -> Result<Vec<ThesisSummary>, RemoteError> {
        self.runtime.block_on(self.client.list_theses())
    }

    pub fn create_person(&self, person: &NewPerson) -> Result<Person, RemoteError> {
        self.runtime.block_on(self.client.create_person(person))
    }

    pub fn create_thesis(&self, plan: &ThesisPlan) -> Result<i64, RemoteError> {
        self.runtime.block_on(self.client.create_thesis(plan))
    }
}

async fn decode_body(
    response: reqwest::Response,
    method: &'static str,
    url: &str,
) -> Result<Value, RemoteError> {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    if !status.is_success() {
        return Err(RemoteError::Status {
            method,
            url: url.to_string(),
            status: status.as_u16(),
            body,
        });
    }
    serde_json::from_str(&body).map_err(|err| RemoteError::Decode {
        url: url.to_string(),
        message: err.to_string(),
    })
}

/// The API serves either a plain list or a paginated `{"results": [...]}`.
fn listing_items(value: Value) -> Option<Vec<Value>> {
    match value {
        Value::Array(items) => Some(items),
        Value::Object(mut map) => match map.remove("results") {
            Some(Value::Array(items)) => Some(items),
            _ => None,
        },
        _ => None,
    }
}

fn thesis_payload(plan: &ThesisPlan) -> Value {
    json!({
        "thesis_type": plan.thesis_type.as_str(),
        "title": plan.title.as_deref().unwrap_or("Untitled"),
        "students": plan.student_ids,
        "supervisors": plan.supervisor_ids,
        "phase": plan.phase.as_str(),
        "date_first_contact": plan.date_first_contact,
        "date_registration": plan.date_registration,
        "date_deadline": plan.date_deadline,
        "date_presentation": plan.date_presentation,
        "description": plan.note,
    })
}

#[derive(Debug, Deserialize)]
struct ThesisListItem {
    id: i64,
    thesis_type: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    students: Vec<PersonIdRef>,
}

/// List serializers embed students either as bare ids or as objects.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PersonIdRef {
    Id(i64),
    Object { id: i64 },
}

impl ThesisListItem {
    fn into_summary(self) -> ThesisSummary {
        ThesisSummary {
            id: self.id,
            thesis_type: ThesisType::from_label(&self.thesis_type),
            title: self.title,
            student_ids: self
                .students
                .into_iter()
                .map(|s| match s {
                    PersonIdRef::Id(id) => id,
                    PersonIdRef::Object { id } => id,
                })
                .collect(),
        }
    }
}
