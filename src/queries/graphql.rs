//! GraphQL query execution over HTTP

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Map, Value};
use tracing::{debug, info};
use url::Url;

use super::QueryRunner;
use crate::config::QueriesConfig;
use crate::models::RenderedResult;
use crate::services::access::AccessPolicy;
use crate::state::schema::LIMIT_STEP;
use crate::state::{Session, StepDefinition, StepSchema, StepType, StepValue};
use crate::utils::errors::{BridgeError, Result};
use crate::utils::helpers::{escape_html, fits_message};
use crate::utils::logging;

pub const RESPONSE_TOO_LONG: &str = "Response text is bigger than 4096.";

/// Runs query documents against the configured GraphQL endpoint
pub struct GraphQlRenderer {
    client: Client,
    endpoint: Url,
    show_query: bool,
    access: Arc<dyn AccessPolicy>,
}

impl GraphQlRenderer {
    pub fn new(config: &QueriesConfig, access: Arc<dyn AccessPolicy>) -> Result<Self> {
        let endpoint = config
            .endpoint
            .as_deref()
            .ok_or_else(|| BridgeError::Config("queries.endpoint is required".to_string()))?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            endpoint: Url::parse(endpoint)?,
            show_query: config.show_query,
            access,
        })
    }
}

fn typed_value(step: &StepDefinition, raw: &str) -> Value {
    match step.step_type {
        StepType::Integer => raw
            .trim()
            .parse::<i64>()
            .map(Value::from)
            .unwrap_or_else(|_| Value::String(raw.to_string())),
        StepType::Float => raw
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .unwrap_or_else(|| Value::String(raw.to_string())),
        StepType::Boolean => Value::Bool(raw.eq_ignore_ascii_case("true")),
        StepType::File => json!({ "fileData": raw }),
        StepType::Text | StepType::Choice => Value::String(raw.to_string()),
    }
}

/// GraphQL variables for the answers in a session.
///
/// Unanswered and skipped steps are left out, as are empty multi-selects.
/// `offset` always carries the session offset and `limit` falls back to ten
/// when missing or zero.
pub fn build_variables(schema: &StepSchema, session: &Session) -> Map<String, Value> {
    let mut variables = Map::new();

    for step in schema.steps() {
        if step.is_offset() {
            variables.insert(step.name.clone(), json!(session.offset));
            continue;
        }

        if step.name == LIMIT_STEP && step.step_type == StepType::Integer {
            let limit = session
                .text(LIMIT_STEP)
                .and_then(|raw| raw.trim().parse::<u32>().ok())
                .filter(|limit| *limit > 0)
                .unwrap_or(10);
            variables.insert(step.name.clone(), json!(limit));
            continue;
        }

        let value = match session.value(&step.name) {
            Some(StepValue::Text(raw)) => typed_value(step, raw),
            Some(StepValue::List(items)) if items.is_empty() => continue,
            Some(StepValue::List(items)) => Value::Array(items.iter().map(|item| typed_value(step, item)).collect()),
            Some(StepValue::All) => Value::String(crate::state::schema::SELECT_ALL_TOKEN.to_string()),
            Some(StepValue::Null) => Value::Null,
            None => continue,
        };
        variables.insert(step.name.clone(), value);
    }

    variables
}

fn error_text(errors: &[Value]) -> String {
    let first = &errors[0];
    let part = |key: &str| first.get(key).and_then(Value::as_str).unwrap_or_default().to_string();
    let text = [part("debugMessage"), part("message")]
        .into_iter()
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    escape_html(&text)
}

#[async_trait]
impl QueryRunner for GraphQlRenderer {
    async fn run(&self, document: &str, schema: &StepSchema, session: &Session) -> Result<RenderedResult> {
        let body = json!({
            "query": document,
            "variables": Value::Object(build_variables(schema, session)),
        });

        let mut request = self
            .client
            .post(self.endpoint.clone())
            .header("Cache-Control", "no-cache")
            .json(&body);
        if let Some(token) = self.access.query_token(session.chat_id) {
            request = request.bearer_auth(token);
        }

        debug!(chat_id = session.chat_id, endpoint = %self.endpoint, "Sending GraphQL query");
        let response = request.send().await?;
        let status = response.status();

        let payload = match response.json::<Value>().await {
            Ok(payload) => payload,
            Err(e) if status.is_success() => return Err(e.into()),
            Err(_) => {
                logging::log_api_error("graphql", &status.to_string(), Some("non-JSON error response"));
                return Err(BridgeError::QueryFailed(format!("endpoint answered {}", status)));
            }
        };

        if let Some(errors) = payload.get("errors").and_then(Value::as_array).filter(|e| !e.is_empty()) {
            info!(chat_id = session.chat_id, count = errors.len(), "GraphQL query returned errors");
            return Ok(RenderedResult::text(error_text(errors)));
        }
        if !status.is_success() {
            logging::log_api_error("graphql", &status.to_string(), None);
            return Err(BridgeError::QueryFailed(format!("endpoint answered {}", status)));
        }

        let pretty = escape_html(&serde_json::to_string_pretty(&payload)?);
        let result = format!("<pre>{}</pre>", pretty);
        let mut text = if self.show_query {
            format!("<code>{}</code>\n\n{}", escape_html(&body.to_string()), result)
        } else {
            result.clone()
        };

        if !fits_message(&text) {
            let with_result = format!("{}{}", RESPONSE_TOO_LONG, result);
            text = if fits_message(&with_result) {
                with_result
            } else {
                RESPONSE_TOO_LONG.to_string()
            };
        }

        Ok(RenderedResult::text(text))
    }
}
