//! Minimal client for the backend's table API.
//!
//! Requests follow the PostgREST conventions: `select=` projections,
//! `column=eq.value` filters, `order=column.asc`, and `Prefer` headers to
//! choose between returning the written rows or nothing.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::{RepositoryError, NO_ROWS_CODE};

const SINGLE_OBJECT: &str = "application/vnd.pgrst.object+json";
const RETURN_REPRESENTATION: &str = "return=representation";
const RETURN_MINIMAL: &str = "return=minimal";

#[derive(Clone)]
pub struct RestClient {
    client: reqwest::Client,
    url: String,
    anon_key: String,
    access_token: Arc<RwLock<Option<String>>>,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    code: Option<String>,
    message: Option<String>,
    details: Option<String>,
    hint: Option<String>,
}

impl RestClient {
    pub fn new(url: &str, anon_key: &str, timeout: Duration) -> Result<Self, RepositoryError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            url: url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
            access_token: Arc::new(RwLock::new(None)),
        })
    }

    /// Token used as the bearer for row-level security. Falls back to the
    /// anon key when unset.
    pub fn set_access_token(&self, token: Option<String>) {
        match self.access_token.write() {
            Ok(mut guard) => *guard = token,
            Err(poisoned) => *poisoned.into_inner() = token,
        }
    }

    pub fn access_token(&self) -> Option<String> {
        match self.access_token.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn table(&self, name: &str) -> TableQuery {
        TableQuery {
            rest: self.clone(),
            table: name.to_string(),
            params: Vec::new(),
        }
    }

    fn request(&self, method: Method, table: &str) -> RequestBuilder {
        let bearer = self
            .access_token()
            .unwrap_or_else(|| self.anon_key.clone());

        self.client
            .request(method, format!("{}/rest/v1/{}", self.url, table))
            .header("apikey", &self.anon_key)
            .bearer_auth(bearer)
    }
}

pub struct TableQuery {
    rest: RestClient,
    table: String,
    params: Vec<(String, String)>,
}

impl TableQuery {
    pub fn select(mut self, columns: &str) -> Self {
        let columns: String = columns.chars().filter(|c| !c.is_whitespace()).collect();
        self.params.push(("select".to_string(), columns));
        self
    }

    pub fn eq(mut self, column: &str, value: &str) -> Self {
        self.params.push((column.to_string(), format!("eq.{}", value)));
        self
    }

    pub fn order(mut self, column: &str, ascending: bool) -> Self {
        let direction = if ascending { "asc" } else { "desc" };
        self.params
            .push(("order".to_string(), format!("{}.{}", column, direction)));
        self
    }

    pub async fn fetch<T: DeserializeOwned>(self) -> Result<Vec<T>, RepositoryError> {
        let request = self
            .rest
            .request(Method::GET, &self.table)
            .query(&self.params)
            .header(ACCEPT, "application/json");

        let body = self.execute(request).await?;
        self.decode(&body)
    }

    /// Zero or one row. "No rows" is not an error here.
    pub async fn fetch_maybe_single<T: DeserializeOwned>(self) -> Result<Option<T>, RepositoryError> {
        let table = self.table.clone();
        let mut rows: Vec<T> = match self.fetch().await {
            Ok(rows) => rows,
            Err(RepositoryError::NotFound(_)) => return Ok(None),
            Err(e) => return Err(e),
        };

        match rows.len() {
            0 => Ok(None),
            1 => Ok(rows.pop()),
            n => Err(RepositoryError::Ambiguous(table, n)),
        }
    }

    /// Inserts one row and returns it as stored.
    pub async fn insert<B, T>(self, body: &B) -> Result<T, RepositoryError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.write_single(Method::POST, body).await
    }

    pub async fn insert_minimal<B: Serialize + ?Sized>(self, body: &B) -> Result<(), RepositoryError> {
        self.write_minimal(Method::POST, body).await
    }

    /// Updates the single row matched by the filters and returns it.
    pub async fn update<B, T>(self, body: &B) -> Result<T, RepositoryError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.write_single(Method::PATCH, body).await
    }

    pub async fn update_minimal<B: Serialize + ?Sized>(self, body: &B) -> Result<(), RepositoryError> {
        self.write_minimal(Method::PATCH, body).await
    }

    async fn write_single<B, T>(self, method: Method, body: &B) -> Result<T, RepositoryError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = self
            .rest
            .request(method, &self.table)
            .query(&self.params)
            .header(ACCEPT, SINGLE_OBJECT)
            .header("Prefer", RETURN_REPRESENTATION)
            .json(body);

        let body = self.execute(request).await?;
        self.decode(&body)
    }

    async fn write_minimal<B: Serialize + ?Sized>(self, method: Method, body: &B) -> Result<(), RepositoryError> {
        let request = self
            .rest
            .request(method, &self.table)
            .query(&self.params)
            .header(CONTENT_TYPE, "application/json")
            .header("Prefer", RETURN_MINIMAL)
            .json(body);

        self.execute(request).await?;
        Ok(())
    }

    async fn execute(&self, request: RequestBuilder) -> Result<Vec<u8>, RepositoryError> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        if !status.is_success() {
            let error = api_error(&self.table, status, &body);
            log::debug!("{} request to {} failed: {}", status, self.table, error);
            return Err(error);
        }

        Ok(body.to_vec())
    }

    fn decode<T: DeserializeOwned>(&self, body: &[u8]) -> Result<T, RepositoryError> {
        serde_json::from_slice(body).map_err(|e| RepositoryError::Decode(self.table.clone(), e.to_string()))
    }
}

fn api_error(table: &str, status: StatusCode, body: &[u8]) -> RepositoryError {
    let parsed: Option<ApiErrorBody> = serde_json::from_slice(body).ok();

    match parsed {
        Some(error) if error.code.as_deref() == Some(NO_ROWS_CODE) => RepositoryError::NotFound(table.to_string()),
        Some(error) => {
            let message = error
                .message
                .or(error.details)
                .or(error.hint)
                .unwrap_or_else(|| status_message(status));

            RepositoryError::Api {
                status: status.as_u16(),
                code: error.code,
                message,
            }
        }
        None => {
            let text = String::from_utf8_lossy(body).trim().to_string();
            RepositoryError::Api {
                status: status.as_u16(),
                code: None,
                message: if text.is_empty() { status_message(status) } else { text },
            }
        }
    }
}

fn status_message(status: StatusCode) -> String {
    status
        .canonical_reason()
        .map(str::to_string)
        .unwrap_or_else(|| format!("HTTP {}", status.as_u16()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_no_rows_code_to_not_found() {
        let body = br#"{"code":"PGRST116","message":"JSON object requested, multiple (or no) rows returned","details":"The result contains 0 rows","hint":null}"#;
        let error = api_error("goals", StatusCode::NOT_ACCEPTABLE, body);
        assert!(matches!(error, RepositoryError::NotFound(table) if table == "goals"));
    }

    #[test]
    fn keeps_backend_message() {
        let body = br#"{"code":"23514","message":"new row violates check constraint \"goals_target_positive\"","details":null,"hint":null}"#;
        let error = api_error("goals", StatusCode::BAD_REQUEST, body);
        assert_eq!(error.to_string(), "new row violates check constraint \"goals_target_positive\"");
    }

    #[test]
    fn falls_back_to_status_reason() {
        let error = api_error("goals", StatusCode::SERVICE_UNAVAILABLE, b"");
        assert_eq!(error.to_string(), "Service Unavailable");
    }

    #[test]
    fn strips_whitespace_from_projection() {
        let rest = RestClient::new("http://localhost:54321/", "anon", Duration::from_secs(1)).unwrap();
        let query = rest.table("goals").select("id, name").eq("user_id", "u1").order("created_at", true);
        assert_eq!(
            query.params,
            vec![
                ("select".to_string(), "id,name".to_string()),
                ("user_id".to_string(), "eq.u1".to_string()),
                ("order".to_string(), "created_at.asc".to_string()),
            ]
        );
    }
}
