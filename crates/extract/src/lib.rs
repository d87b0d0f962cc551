mod local;

use std::collections::BTreeMap;
use std::env;
use std::thread;
use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tokio::runtime::Runtime;

use csv2thesis_core::{
    parse_flex_date, sanitize_email, PersonDraft, Phase, Role, ThesisDraft, ThesisType,
};

const MAX_ATTEMPTS: u32 = 3;
const MAX_TOKENS: u32 = 1024;
const SYSTEM_PROMPT: &str = "\
You extract thesis records from messy, handcrafted spreadsheet rows.
Column names vary wildly; use context and content to understand meaning.
Handle German terms, abbreviations and misspellings. Missing data is fine.

Respond with a single JSON object and nothing else:
{
  \"student\": {\"first_name\": \"\", \"last_name\": \"\", \"email\": null, \"student_id\": null},
  \"thesis_type\": \"bachelor|master|project|other\",
  \"title\": null,
  \"phase\": null,
  \"supervisors\": [{\"first_name\": \"\", \"last_name\": \"\", \"email\": null, \"role\": null}],
  \"date_first_contact\": null,
  \"date_registration\": null,
  \"date_deadline\": null,
  \"date_presentation\": null,
  \"description\": null,
  \"warnings\": []
}

Supervisor names may hide in any text field; look for titles like Prof. or
Dr. and strip them. Dates may use any common European format. Put degree
program, semester and grade into description. Add a warning for every data
quality issue you notice.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractProvider {
    Anthropic,
    OpenAi,
    Local,
}

impl ExtractProvider {
    pub fn from_str(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "anthropic" => Some(ExtractProvider::Anthropic),
            "openai" => Some(ExtractProvider::OpenAi),
            "local" => Some(ExtractProvider::Local),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractProvider::Anthropic => "anthropic",
            ExtractProvider::OpenAi => "openai",
            ExtractProvider::Local => "local",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            ExtractProvider::Anthropic => "claude-3-5-sonnet-20241022",
            ExtractProvider::OpenAi => "gpt-4.1-mini",
            ExtractProvider::Local => "local",
        }
    }
}

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("row {row} unusable: {message}")]
    RowUnusable { row: usize, message: String },
    #[error("{0} is not set")]
    MissingKey(&'static str),
    #[error("extraction request failed: {0}")]
    Transport(String),
    #[error("extractor returned an invalid payload: {0}")]
    InvalidPayload(String),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("failed to start async runtime: {0}")]
    Runtime(#[source] std::io::Error),
}

/// Turns one raw CSV row into a [`ThesisDraft`] via the configured
/// provider. The `Local` provider maps columns by keyword and needs no
/// network or key.
pub struct Extractor {
    provider: ExtractProvider,
    model: String,
    http: Client,
    api_key: Option<String>,
    runtime: Option<Runtime>,
}

impl Extractor {
    pub fn new(provider: ExtractProvider, model: impl Into<String>) -> Result<Self, ExtractError> {
        let (api_key, runtime) = match provider {
            ExtractProvider::Anthropic => (
                Some(read_api_key("ANTHROPIC_API_KEY", "sk-ant-")?),
                Some(Runtime::new().map_err(ExtractError::Runtime)?),
            ),
            ExtractProvider::OpenAi => (
                Some(read_api_key("OPENAI_API_KEY", "sk-")?),
                Some(Runtime::new().map_err(ExtractError::Runtime)?),
            ),
            ExtractProvider::Local => (None, None),
        };
        Ok(Self {
            provider,
            model: model.into(),
            http: Client::new(),
            api_key,
            runtime,
        })
    }

    pub fn provider(&self) -> ExtractProvider {
        self.provider
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn extract(
        &self,
        row: &BTreeMap<String, String>,
        row_index: usize,
    ) -> Result<ThesisDraft, ExtractError> {
        if self.provider == ExtractProvider::Local {
            return local::extract(row, row_index);
        }
        let row_json = serde_json::to_string_pretty(row)
            .map_err(|err| ExtractError::InvalidPayload(err.to_string()))?;
        let prompt = format!(
            "Extract thesis data from CSV row {row_index}:\n\n```json\n{row_json}\n```\n\n\
             This is real-world migration data; be flexible with column names and formats."
        );
        let content = self.complete_with_retry(&prompt, row_index)?;
        parse_draft(&content, row_index)
    }

    fn complete_with_retry(&self, prompt: &str, row_index: usize) -> Result<String, ExtractError> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.complete(prompt) {
                Ok(content) => return Ok(content),
                Err(err) => {
                    tracing::warn!(
                        row = row_index,
                        attempt,
                        error = %err,
                        "extraction call failed"
                    );
                    if attempt >= MAX_ATTEMPTS {
                        return Err(err);
                    }
                    thread::sleep(Duration::from_secs((attempt * 2) as u64));
                }
            }
        }
    }

    fn complete(&self, prompt: &str) -> Result<String, ExtractError> {
        let runtime = self
            .runtime
            .as_ref()
            .ok_or_else(|| ExtractError::Transport("no runtime for remote provider".to_string()))?;
        match self.provider {
            ExtractProvider::Anthropic => runtime.block_on(self.complete_anthropic(prompt)),
            ExtractProvider::OpenAi => runtime.block_on(self.complete_openai(prompt)),
            ExtractProvider::Local => Err(ExtractError::Config(
                "local provider has no remote endpoint".to_string(),
            )),
        }
    }

    async fn complete_anthropic(&self, prompt: &str) -> Result<String, ExtractError> {
        let key = self.key()?;
        let payload = json!({
            "model": self.model,
            "max_tokens": MAX_TOKENS,
            "system": SYSTEM_PROMPT,
            "messages": [{ "role": "user", "content": prompt }],
        });
        let response = self
            .http
            .post("https://api.anthropic.com/v1/messages")
            .header("x-api-key", key)
            .header("anthropic-version", "2023-06-01")
            .json(&payload)
            .send()
            .await
            .map_err(|err| ExtractError::Transport(err.to_string()))?;
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(ExtractError::Transport(format!(
                "anthropic returned {status}: {body}"
            )));
        }
        let parsed: AnthropicResponse = serde_json::from_str(&body)
            .map_err(|err| ExtractError::InvalidPayload(err.to_string()))?;
        parsed
            .content
            .into_iter()
            .find_map(|part| part.text)
            .ok_or_else(|| ExtractError::InvalidPayload("missing text in response".to_string()))
    }

    async fn complete_openai(&self, prompt: &str) -> Result<String, ExtractError> {
        let key = self.key()?;
        let payload = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": prompt },
            ],
        });
        let response = self
            .http
            .post("https://api.openai.com/v1/chat/completions")
            .bearer_auth(key)
            .json(&payload)
            .send()
            .await
            .map_err(|err| ExtractError::Transport(err.to_string()))?;
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(ExtractError::Transport(format!(
                "openai returned {status}: {body}"
            )));
        }
        let parsed: ChatResponse = serde_json::from_str(&body)
            .map_err(|err| ExtractError::InvalidPayload(err.to_string()))?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| ExtractError::InvalidPayload("missing text in response".to_string()))
    }

    fn key(&self) -> Result<&str, ExtractError> {
        self.api_key
            .as_deref()
            .ok_or(ExtractError::MissingKey("api key"))
    }
}

fn read_api_key(var: &'static str, prefix: &str) -> Result<String, ExtractError> {
    let value = env::var(var).map_err(|_| ExtractError::MissingKey(var))?;
    if !value.starts_with(prefix) {
        return Err(ExtractError::Config(format!(
            "{var} must start with '{prefix}'"
        )));
    }
    Ok(value)
}

/// Parse a model response into a draft, tolerating code fences and prose
/// around the JSON object.
fn parse_draft(content: &str, row_index: usize) -> Result<ThesisDraft, ExtractError> {
    let stripped = extract_json_object(content).ok_or_else(|| {
        ExtractError::InvalidPayload("no JSON object found in response".to_string())
    })?;
    let payload: DraftPayload = serde_json::from_str(stripped)
        .map_err(|err| ExtractError::InvalidPayload(err.to_string()))?;
    build_draft(payload, row_index)
}

fn extract_json_object(content: &str) -> Option<&str> {
    let start = content.find('{')?;
    let end = content.rfind('}')?;
    (end > start).then(|| &content[start..=end])
}

fn build_draft(payload: DraftPayload, row_index: usize) -> Result<ThesisDraft, ExtractError> {
    let mut warnings = payload.warnings;
    let mut first = payload.student.first_name.trim().to_string();
    let mut last = payload.student.last_name.trim().to_string();
    if last.is_empty() {
        // Some rows carry the whole name in one field.
        let split = first
            .rsplit_once(' ')
            .map(|(head, tail)| (head.to_string(), tail.to_string()));
        if let Some((head, tail)) = split {
            first = head;
            last = tail;
            warnings.push("student name split from a single field".to_string());
        }
    }
    if first.is_empty() || last.is_empty() {
        return Err(ExtractError::RowUnusable {
            row: row_index,
            message: "student name missing".to_string(),
        });
    }
    let mut people = vec![PersonDraft {
        first_name: first,
        last_name: last,
        email: sanitize_email(payload.student.email),
        external_id: payload
            .student
            .student_id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty()),
        role: Some(Role::Student),
    }];
    for supervisor in payload.supervisors {
        let first = supervisor.first_name.trim().to_string();
        let last = supervisor.last_name.trim().to_string();
        if first.is_empty() && last.is_empty() {
            continue;
        }
        let role = supervisor
            .role
            .as_deref()
            .and_then(Role::from_label)
            .unwrap_or(Role::Supervisor);
        people.push(PersonDraft {
            first_name: first,
            last_name: last,
            email: sanitize_email(supervisor.email),
            external_id: None,
            role: Some(role),
        });
    }
    let date_first_contact =
        parse_date_field(payload.date_first_contact, "first contact", &mut warnings);
    let date_registration =
        parse_date_field(payload.date_registration, "registration", &mut warnings);
    let date_deadline = parse_date_field(payload.date_deadline, "deadline", &mut warnings);
    let date_presentation =
        parse_date_field(payload.date_presentation, "presentation", &mut warnings);
    Ok(ThesisDraft {
        thesis_type: payload
            .thesis_type
            .as_deref()
            .map(ThesisType::from_label)
            .unwrap_or(ThesisType::Other),
        title: payload
            .title
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty()),
        people,
        phase: payload
            .phase
            .as_deref()
            .map(Phase::from_label)
            .unwrap_or_default(),
        date_first_contact,
        date_registration,
        date_deadline,
        date_presentation,
        note: payload
            .description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty()),
        warnings,
        row_index,
    })
}

fn parse_date_field(
    raw: Option<String>,
    label: &str,
    warnings: &mut Vec<String>,
) -> Option<chrono::NaiveDate> {
    let value = raw?;
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    let parsed = parse_flex_date(value);
    if parsed.is_none() {
        warnings.push(format!("could not parse {label} date: {value}"));
    }
    parsed
}

#[derive(Debug, Deserialize)]
struct DraftPayload {
    student: PersonPayload,
    #[serde(default)]
    thesis_type: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    phase: Option<String>,
    #[serde(default)]
    supervisors: Vec<PersonPayload>,
    #[serde(default)]
    date_first_contact: Option<String>,
    #[serde(default)]
    date_registration: Option<String>,
    #[serde(default)]
    date_deadline: Option<String>,
    #[serde(default)]
    date_presentation: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    warnings: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct PersonPayload {
    #[serde(default)]
    first_name: String,
    #[serde(default)]
    last_name: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    student_id: Option<String>,
    #[serde(default)]
    role: Option<String>,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContent>,
}

#[derive(Deserialize)]
struct AnthropicContent {
    text: Option<String>,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: String,
}
