//! PostgREST-backed row store (the hosted backend's REST interface).
//!
//! Row-level security runs inside the database against the bearer token the
//! request carries, so each request-scoped store is built with the caller's
//! access token via [`PostgrestStore::with_access_token`].
//!
//! ## Error Mapping
//!
//! | Backend code | Meaning | StoreError |
//! |---|---|---|
//! | `42P01`, `PGRST205` | table missing | `UndefinedTable` |
//! | `42883`, `PGRST202` | function missing | `UndefinedProcedure` |
//! | `23502`, `23503`, `23505`, `23514` | constraint | `Constraint` |
//! | `42501` | RLS rejected an insert | `PolicyViolation` |
//! | anything else | | `Backend` |
//! | no response | network, timeout | `Transport` |

use reqwest::header::{CONTENT_RANGE, HeaderMap};
use reqwest::{RequestBuilder, Response};
use serde::Deserialize;
use serde_json::Value as JsonValue;
use tracing::{debug, instrument};

use super::{Condition, DeleteOutcome, Direction, Filter, InsertOutcome, Row, RowStore, StoreError, UpdateOutcome};
use crate::config::PostgrestSettings;

#[derive(Debug, Clone)]
pub struct PostgrestStore {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    access_token: Option<String>,
}

/// Error body returned by PostgREST.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl PostgrestStore {
    pub fn new(settings: &PostgrestSettings) -> Result<Self, StoreError> {
        let http = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| StoreError::Transport(format!("failed to build http client: {e}")))?;

        Ok(Self {
            http,
            base_url: settings.url.trim_end_matches('/').to_string(),
            api_key: settings.anon_key.clone(),
            access_token: None,
        })
    }

    /// Request-scoped copy acting as the holder of `token`.
    pub fn with_access_token(&self, token: impl Into<String>) -> Self {
        Self {
            access_token: Some(token.into()),
            ..self.clone()
        }
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn rpc_url(&self, name: &str) -> String {
        format!("{}/rest/v1/rpc/{}", self.base_url, name)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let bearer = self.access_token.as_deref().unwrap_or(&self.api_key);
        request.header("apikey", &self.api_key).bearer_auth(bearer)
    }

    async fn send(&self, request: RequestBuilder, target: Target<'_>) -> Result<Response, StoreError> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;

        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        Err(classify_error(status.as_u16(), &text, target))
    }
}

#[derive(Debug, Clone, Copy)]
enum Target<'a> {
    Table(&'a str),
    Procedure(&'a str),
}

fn classify_error(status: u16, body: &str, target: Target<'_>) -> StoreError {
    let parsed: Option<ErrorBody> = serde_json::from_str(body).ok();
    let code = parsed
        .as_ref()
        .and_then(|b| b.code.clone())
        .unwrap_or_else(|| status.to_string());
    let message = parsed
        .and_then(|b| b.message)
        .unwrap_or_else(|| body.to_string());

    match (code.as_str(), target) {
        ("42P01" | "PGRST205", Target::Table(name)) => StoreError::UndefinedTable(name.to_string()),
        ("42883" | "PGRST202", Target::Procedure(name)) => {
            StoreError::UndefinedProcedure(name.to_string())
        }
        ("23502" | "23503" | "23505" | "23514", _) => StoreError::Constraint(message),
        ("42501", _) => StoreError::PolicyViolation(message),
        _ => StoreError::Backend { code, message },
    }
}

/// PostgREST query-string form of a filter.
fn query_pairs(filter: &Filter) -> Vec<(String, String)> {
    let mut pairs: Vec<(String, String)> = filter
        .conditions()
        .iter()
        .map(|c| match c {
            Condition::Eq { column, value } => (column.clone(), format!("eq.{value}")),
            Condition::In { column, values } => {
                let quoted: Vec<String> = values
                    .iter()
                    .map(|v| format!("\"{}\"", v.replace('\\', "\\\\").replace('"', "\\\"")))
                    .collect();
                (column.clone(), format!("in.({})", quoted.join(",")))
            }
        })
        .collect();

    if let Some(order) = filter.order() {
        let dir = match order.direction {
            Direction::Asc => "asc",
            Direction::Desc => "desc",
        };
        pairs.push(("order".to_string(), format!("{}.{}", order.column, dir)));
    }

    pairs
}

/// Exact count from a `Content-Range` header (`0-4/5`, `*/0`).
fn content_range_total(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(CONTENT_RANGE)?
        .to_str()
        .ok()?
        .rsplit('/')
        .next()?
        .parse()
        .ok()
}

async fn decode_rows(response: Response) -> Result<Vec<Row>, StoreError> {
    let text = response
        .text()
        .await
        .map_err(|e| StoreError::Transport(e.to_string()))?;
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(&text).map_err(|e| StoreError::Decode(format!("expected row array: {e}")))
}

#[async_trait::async_trait]
impl RowStore for PostgrestStore {
    #[instrument(skip(self, filter), err)]
    async fn select(&self, table: &str, filter: &Filter) -> Result<Vec<Row>, StoreError> {
        let request = self
            .http
            .get(self.table_url(table))
            .query(&[("select", "*")])
            .query(&query_pairs(filter));
        let response = self.send(request, Target::Table(table)).await?;
        decode_rows(response).await
    }

    #[instrument(skip(self, rows), fields(row_count = rows.len()), err)]
    async fn insert(&self, table: &str, rows: Vec<Row>) -> Result<InsertOutcome, StoreError> {
        let request = self
            .http
            .post(self.table_url(table))
            .header("Prefer", "return=representation")
            .json(&rows);
        let response = self.send(request, Target::Table(table)).await?;
        Ok(InsertOutcome {
            rows: decode_rows(response).await?,
        })
    }

    #[instrument(skip(self, patch, filter), err)]
    async fn update(
        &self,
        table: &str,
        patch: Row,
        filter: &Filter,
    ) -> Result<UpdateOutcome, StoreError> {
        let request = self
            .http
            .patch(self.table_url(table))
            .header("Prefer", "return=representation,count=exact")
            .query(&query_pairs(filter))
            .json(&patch);
        let response = self.send(request, Target::Table(table)).await?;
        let counted = content_range_total(response.headers());
        let rows = decode_rows(response).await?;
        let affected = counted.unwrap_or(rows.len() as u64);
        debug!(affected, "update applied");
        Ok(UpdateOutcome { rows, affected })
    }

    #[instrument(skip(self, filter), err)]
    async fn delete(&self, table: &str, filter: &Filter) -> Result<DeleteOutcome, StoreError> {
        let request = self
            .http
            .delete(self.table_url(table))
            .header("Prefer", "return=minimal,count=exact")
            .query(&query_pairs(filter));
        let response = self.send(request, Target::Table(table)).await?;
        let affected = content_range_total(response.headers()).ok_or_else(|| {
            StoreError::Decode("delete response carried no exact count".to_string())
        })?;
        debug!(affected, "delete applied");
        Ok(DeleteOutcome { affected })
    }

    #[instrument(skip(self, args), err)]
    async fn call_procedure(&self, name: &str, args: JsonValue) -> Result<JsonValue, StoreError> {
        let request = self.http.post(self.rpc_url(name)).json(&args);
        let response = self.send(request, Target::Procedure(name)).await?;
        let text = response
            .text()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;
        if text.trim().is_empty() {
            return Ok(JsonValue::Null);
        }
        serde_json::from_str(&text).map_err(|e| StoreError::Decode(format!("procedure result: {e}")))
    }
}
