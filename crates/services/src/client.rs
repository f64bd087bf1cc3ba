use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::ApiError;

/// Thin client for the single GraphQL-over-HTTP endpoint.
///
/// Every backend operation posts a `{query, variables}` document and reads a
/// `{data, errors}` envelope back. HTTP status classification happens here
/// so the service wrappers only ever deal with [`ApiError`].
pub struct GraphqlClient {
    http: Client,
    endpoint: String,
    token: RwLock<Option<String>>,
}

impl GraphqlClient {
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            endpoint: endpoint.into(),
            token: RwLock::new(None),
        }
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Install or clear the bearer token used for subsequent requests.
    pub async fn set_token(&self, token: Option<String>) {
        *self.token.write().await = token;
    }

    /// Execute a GraphQL document and decode `data` into `T`.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` classified per the failure taxonomy: transport
    /// failures, 401/403/404, 5xx, other non-2xx rejections, GraphQL
    /// `errors`, or an undecodable payload.
    pub async fn execute<V, T>(&self, document: &str, variables: &V) -> Result<T, ApiError>
    where
        V: Serialize + Sync,
        T: DeserializeOwned,
    {
        let token = self.token.read().await.clone();
        let mut request = self.http.post(&self.endpoint).json(&GraphqlRequest {
            query: document,
            variables,
        });
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        decode_envelope(status, &body)
    }
}

#[derive(Serialize)]
struct GraphqlRequest<'a, V> {
    query: &'a str,
    variables: &'a V,
}

#[derive(Deserialize)]
struct GraphqlEnvelope<T> {
    // A plain `#[serde(default)]` would bound `T: Default`; the payload
    // types are not `Default` and never need to be.
    #[serde(default = "Option::default")]
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphqlErrorEntry>,
}

#[derive(Deserialize)]
struct GraphqlErrorEntry {
    message: String,
}

/// Map an HTTP status and response body onto the error taxonomy.
fn decode_envelope<T: DeserializeOwned>(status: u16, body: &str) -> Result<T, ApiError> {
    match status {
        401 => return Err(ApiError::Unauthorized),
        403 => return Err(ApiError::Forbidden),
        404 => return Err(ApiError::NotFound),
        s if s >= 500 => return Err(ApiError::Server(s)),
        s if !(200..300).contains(&s) => return Err(ApiError::Rejected(s)),
        _ => {}
    }

    let envelope: GraphqlEnvelope<T> =
        serde_json::from_str(body).map_err(|e| ApiError::Malformed(e.to_string()))?;

    if let Some(first) = envelope.errors.into_iter().next() {
        return Err(ApiError::Backend(first.message));
    }

    envelope
        .data
        .ok_or_else(|| ApiError::Malformed("response carried neither data nor errors".into()))
}
