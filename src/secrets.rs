//! Secret resolution for service credentials.
//!
//! Credentials are fetched from the secret store at the start of each handler
//! invocation and discarded afterwards; nothing is cached across invocations.
//! Every failure is wrapped with the requested secret name so that invocation
//! logs identify which lookup broke.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors raised while resolving a named secret.
#[derive(Debug, Error)]
pub enum SecretError {
    /// The named secret does not exist in the store.
    #[error("Secret '{name}' was not found")]
    NotFound {
        /// Name of the secret that was requested.
        name: String,
    },
    /// The store refused access to the named secret.
    #[error("Access to secret '{name}' was denied")]
    AccessDenied {
        /// Name of the secret that was requested.
        name: String,
    },
    /// The secret value was not a flat mapping of string fields.
    #[error("Secret '{name}' is malformed: {reason}")]
    Malformed {
        /// Name of the secret that was requested.
        name: String,
        /// Description of the parse failure.
        reason: String,
    },
    /// The secret resolved but lacks a field the caller requires.
    #[error("Secret '{name}' is missing required field '{field}'")]
    MissingField {
        /// Name of the secret that was requested.
        name: String,
        /// Field expected in the secret value.
        field: String,
    },
    /// HTTP layer failed before receiving a response.
    #[error("Failed to fetch secret '{name}': {source}")]
    Http {
        /// Name of the secret that was requested.
        name: String,
        /// Underlying transport error.
        #[source]
        source: reqwest::Error,
    },
    /// The store responded with an unexpected status code.
    #[error("Unexpected secret store response for '{name}' ({status}): {body}")]
    UnexpectedStatus {
        /// Name of the secret that was requested.
        name: String,
        /// HTTP status returned by the store.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
}

/// A named secret resolved to its string fields.
#[derive(Debug, Clone)]
pub struct SecretRecord {
    /// Name the secret was resolved under.
    pub name: String,
    /// Field values carried by the secret.
    pub fields: BTreeMap<String, String>,
}

impl SecretRecord {
    /// Fetch a required field, failing with the secret name for context.
    pub fn require(&self, field: &str) -> Result<&str, SecretError> {
        self.fields
            .get(field)
            .map(String::as_str)
            .ok_or_else(|| SecretError::MissingField {
                name: self.name.clone(),
                field: field.to_string(),
            })
    }
}

/// Interface implemented by secret store backends.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Resolve a named secret into its field mapping.
    async fn resolve(&self, name: &str) -> Result<SecretRecord, SecretError>;
}

/// HTTP-backed secret store client.
pub struct HttpSecretStore {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpSecretStore {
    /// Construct a client for the store at `base_url`, optionally authenticated.
    pub fn new(base_url: String, token: Option<String>) -> Self {
        let client = Client::builder()
            .user_agent("docuhub/0.1")
            .build()
            .expect("Failed to construct reqwest::Client for secret store");
        Self {
            client,
            base_url,
            token,
        }
    }

    /// Construct a client from the loaded configuration.
    pub fn from_config() -> Self {
        let config = crate::config::get_config();
        Self::new(
            config.secret_store_url.clone(),
            config.secret_store_token.clone(),
        )
    }

    fn endpoint(&self, name: &str) -> String {
        format!("{}/secrets/{name}", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl SecretStore for HttpSecretStore {
    async fn resolve(&self, name: &str) -> Result<SecretRecord, SecretError> {
        let mut request = self.client.get(self.endpoint(name));
        if let Some(token) = &self.token
            && !token.is_empty()
        {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|source| SecretError::Http {
            name: name.to_string(),
            source,
        })?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(SecretError::NotFound {
                name: name.to_string(),
            }),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(SecretError::AccessDenied {
                name: name.to_string(),
            }),
            status if status.is_success() => {
                let value: Value =
                    response
                        .json()
                        .await
                        .map_err(|error| SecretError::Malformed {
                            name: name.to_string(),
                            reason: error.to_string(),
                        })?;
                parse_secret_fields(name, value)
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                let error = SecretError::UnexpectedStatus {
                    name: name.to_string(),
                    status,
                    body,
                };
                tracing::error!(secret = name, error = %error, "Secret store request failed");
                Err(error)
            }
        }
    }
}

fn parse_secret_fields(name: &str, value: Value) -> Result<SecretRecord, SecretError> {
    let Value::Object(map) = value else {
        return Err(SecretError::Malformed {
            name: name.to_string(),
            reason: "secret value is not a JSON object".to_string(),
        });
    };

    let mut fields = BTreeMap::new();
    for (key, value) in map {
        match value {
            Value::String(text) => {
                fields.insert(key, text);
            }
            other => {
                return Err(SecretError::Malformed {
                    name: name.to_string(),
                    reason: format!("field '{key}' is not a string: {other}"),
                });
            }
        }
    }

    Ok(SecretRecord {
        name: name.to_string(),
        fields,
    })
}

/// Credentials for the embedding and chat-completion APIs.
#[derive(Debug, Clone)]
pub struct EmbeddingCredentials {
    /// API key presented as a bearer token.
    pub api_key: String,
}

impl EmbeddingCredentials {
    /// Resolve the named secret and extract the embedding credentials.
    pub async fn resolve(
        store: &dyn SecretStore,
        secret_name: &str,
    ) -> Result<Self, SecretError> {
        let record = store.resolve(secret_name).await?;
        Ok(Self {
            api_key: record.require("api_key")?.to_string(),
        })
    }
}

/// Credentials for the vector index service.
#[derive(Debug, Clone)]
pub struct IndexCredentials {
    /// API key sent with every index request.
    pub api_key: String,
    /// Index environment, the base URL of the cluster hosting the index.
    pub environment: String,
}

impl IndexCredentials {
    /// Resolve the named secret and extract the index credentials.
    pub async fn resolve(
        store: &dyn SecretStore,
        secret_name: &str,
    ) -> Result<Self, SecretError> {
        let record = store.resolve(secret_name).await?;
        Ok(Self {
            api_key: record.require("api_key")?.to_string(),
            environment: record.require("environment")?.to_string(),
        })
    }
}
