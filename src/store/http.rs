use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;

use super::{CounterStore, StoreError};
use crate::api::{ApiResponse, IncrementRequest};
use crate::competitor::{Competitor, CounterName};

/// Counter store reached through the vote server's REST API.
#[derive(Clone)]
pub struct HttpCounterStore {
    client: Client,
    base_url: String,
}

impl HttpCounterStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    fn competitor_url(&self, competitor_id: &str) -> String {
        format!(
            "{}/api/competitors/{}",
            self.base_url,
            urlencoding::encode(competitor_id)
        )
    }
}

#[async_trait]
impl CounterStore for HttpCounterStore {
    async fn list_all(&self) -> Result<Vec<Competitor>, StoreError> {
        let response = self
            .client
            .get(format!("{}/api/competitors", self.base_url))
            .send()
            .await?;

        let competitors: Vec<Competitor> = read_data(response).await?;
        debug!(count = competitors.len(), "Fetched competitors from vote server");
        Ok(competitors)
    }

    async fn increment(
        &self,
        competitor_id: &str,
        counter: CounterName,
        new_value: u32,
    ) -> Result<(), StoreError> {
        let response = self
            .client
            .patch(self.competitor_url(competitor_id))
            .json(&IncrementRequest {
                counter,
                value: new_value,
            })
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(StoreError::NotFound(competitor_id.to_string()));
        }

        let _: IncrementRequest = read_data(response).await?;
        Ok(())
    }
}

/// Unwrap the `ApiResponse` envelope, turning non-2xx replies into `StoreError::Remote`
async fn read_data<T: DeserializeOwned>(response: Response) -> Result<T, StoreError> {
    let status = response.status();

    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        return Err(StoreError::Remote {
            status: status.as_u16(),
            message,
        });
    }

    let body: ApiResponse<T> = response.json().await?;
    match body.data {
        Some(data) if body.success => Ok(data),
        _ => Err(StoreError::Remote {
            status: status.as_u16(),
            message: body.error.unwrap_or_else(|| "empty response".to_string()),
        }),
    }
}
