//! Anonymous session establishment.
//!
//! Votes are keyed to competitor records, not to identities, so nothing downstream
//! consumes the session beyond logging it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use thiserror::Error;

use crate::api::{ApiResponse, SessionResponse};

#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub established_at: DateTime<Utc>,
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("session request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("session rejected: {0}")]
    Rejected(String),
}

#[async_trait]
pub trait SessionService: Send + Sync {
    async fn establish_anonymous(&self) -> Result<Session, SessionError>;
}

/// Mints a random anonymous id without talking to anyone.
#[derive(Debug, Default, Clone)]
pub struct LocalSessionService;

#[async_trait]
impl SessionService for LocalSessionService {
    async fn establish_anonymous(&self) -> Result<Session, SessionError> {
        Ok(Session {
            id: uuid::Uuid::new_v4().to_string(),
            established_at: Utc::now(),
        })
    }
}

/// Asks the vote server for an anonymous session.
#[derive(Clone)]
pub struct HttpSessionService {
    client: Client,
    base_url: String,
}

impl HttpSessionService {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl SessionService for HttpSessionService {
    async fn establish_anonymous(&self) -> Result<Session, SessionError> {
        let response = self
            .client
            .post(format!("{}/api/session", self.base_url))
            .send()
            .await?
            .error_for_status()?;

        let body: ApiResponse<SessionResponse> = response.json().await?;
        match body.data {
            Some(session) if body.success => Ok(Session {
                id: session.session_id,
                established_at: session.established_at,
            }),
            _ => Err(SessionError::Rejected(
                body.error.unwrap_or_else(|| "no session returned".to_string()),
            )),
        }
    }
}
