//! Google Drive download adapter.
//!
//! Authenticates as a service account with the OAuth2 JWT-bearer grant
//! (RS256 assertion, read-only Drive scope) and fetches one file by id.
//! Google-native documents cannot be downloaded directly and are exported as DOCX.
//!
//! A fresh access token is requested for every download.

use bytes::Bytes;
use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

pub const DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive.readonly";
pub const DEFAULT_API_BASE: &str = "https://www.googleapis.com/drive/v3";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;

const GOOGLE_APPS_MIME_PREFIX: &str = "application/vnd.google-apps";
const DOCX_MIME: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

#[derive(Debug, Error)]
pub enum DriveError {
    #[error("Drive configuration error: {0}")]
    Config(String),

    #[error("Drive authentication failed: {0}")]
    Auth(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Drive API error (status {status}): {message}")]
    Api { status: u16, message: String },
}

/// A downloaded Drive file. `name` carries a `.docx` suffix when the file was
/// exported from a Google-native format.
#[derive(Debug, Clone)]
pub struct DriveFile {
    pub name: String,
    pub mime_type: String,
    pub bytes: Bytes,
}

/// The fields of a service-account key file that the JWT-bearer flow needs.
#[derive(Debug, Deserialize)]
struct ServiceAccountKey {
    client_email: String,
    private_key: String,
    #[serde(default = "default_token_uri")]
    token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileMetadata {
    name: String,
    mime_type: String,
}

#[derive(Debug, Deserialize)]
struct GoogleError {
    error: GoogleErrorBody,
}

#[derive(Debug, Deserialize)]
struct GoogleErrorBody {
    message: String,
}

/// Rejects ids that could not be a Drive file id before they reach a URL path.
pub fn validate_file_id(file_id: &str) -> Result<(), String> {
    if file_id.is_empty() {
        return Err("file_id must not be empty".to_string());
    }
    if !file_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(format!("file_id '{file_id}' is not a valid Drive file id"));
    }
    Ok(())
}

pub struct DriveClient {
    http: Client,
    client_email: String,
    token_uri: String,
    signing_key: EncodingKey,
    api_base: String,
}

impl std::fmt::Debug for DriveClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriveClient")
            .field("client_email", &self.client_email)
            .field("token_uri", &self.token_uri)
            .field("api_base", &self.api_base)
            .finish_non_exhaustive()
    }
}

impl DriveClient {
    /// Builds a client from the raw service-account key JSON.
    pub fn from_service_account_json(http: Client, key_json: &str) -> Result<Self, DriveError> {
        let key: ServiceAccountKey = serde_json::from_str(key_json)
            .map_err(|e| DriveError::Config(format!("invalid service account JSON: {e}")))?;
        let signing_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
            .map_err(|e| DriveError::Config(format!("invalid service account private key: {e}")))?;

        Ok(Self {
            http,
            client_email: key.client_email,
            token_uri: key.token_uri,
            signing_key,
            api_base: DEFAULT_API_BASE.to_string(),
        })
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    pub fn client_email(&self) -> &str {
        &self.client_email
    }

    fn signed_assertion(&self) -> Result<String, DriveError> {
        let now = Utc::now().timestamp();
        let claims = AssertionClaims {
            iss: &self.client_email,
            scope: DRIVE_SCOPE,
            aud: &self.token_uri,
            iat: now,
            exp: now + ASSERTION_LIFETIME_SECS,
        };
        encode(&Header::new(Algorithm::RS256), &claims, &self.signing_key)
            .map_err(|e| DriveError::Auth(format!("failed to sign assertion: {e}")))
    }

    async fn access_token(&self) -> Result<String, DriveError> {
        let assertion = self.signed_assertion()?;
        let response = self
            .http
            .post(&self.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(DriveError::Auth(format!(
                "token endpoint returned {status}: {body}"
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| DriveError::Auth(format!("malformed token response: {e}")))?;
        Ok(token.access_token)
    }

    /// Downloads `file_id`, exporting Google-native documents as DOCX.
    pub async fn download(&self, file_id: &str) -> Result<DriveFile, DriveError> {
        let token = self.access_token().await?;
        let file_url = format!("{}/files/{}", self.api_base, file_id);

        let metadata: FileMetadata = checked(
            self.http
                .get(&file_url)
                .bearer_auth(&token)
                .query(&[("fields", "name,mimeType")])
                .send()
                .await?,
        )
        .await?
        .json()
        .await?;

        let (name, request) = if metadata.mime_type.starts_with(GOOGLE_APPS_MIME_PREFIX) {
            (
                format!("{}.docx", metadata.name),
                self.http
                    .get(format!("{file_url}/export"))
                    .query(&[("mimeType", DOCX_MIME)]),
            )
        } else {
            (
                metadata.name.clone(),
                self.http.get(&file_url).query(&[("alt", "media")]),
            )
        };

        let bytes = checked(request.bearer_auth(&token).send().await?)
            .await?
            .bytes()
            .await?;

        info!(
            "Downloaded Drive file {file_id} as '{name}' ({}, {} bytes)",
            metadata.mime_type,
            bytes.len()
        );

        Ok(DriveFile {
            name,
            mime_type: metadata.mime_type,
            bytes,
        })
    }
}

/// Passes 2xx responses through and turns anything else into `DriveError::Api`.
async fn checked(response: Response) -> Result<Response, DriveError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<GoogleError>(&body)
        .map(|e| e.error.message)
        .unwrap_or(body);
    Err(DriveError::Api { status, message })
}
