//! Request/response channel over HTTP.

use std::time::Duration;

use gridsync_types::{
    AckBody, Cell, CellsBody, ChunkParams, ErrorBody, PositionParams, RadiusParams, SetCellParams,
};
use reqwest::{Client, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::TransportError;

/// Stateless HTTP calls against the `/api` routes.
#[derive(Debug, Clone)]
pub struct HttpChannel {
    base_url: String,
    client: Client,
}

impl HttpChannel {
    /// Create a channel for `base_url` (for example `http://127.0.0.1:4038`).
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Config`] if the HTTP client cannot be built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Config(format!("http client: {e}")))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_owned(),
            client,
        })
    }

    /// `POST /api/setCell`.
    pub async fn set_cell(&self, params: &SetCellParams) -> Result<(), TransportError> {
        self.post::<_, AckBody>("setCell", params).await.map(drop)
    }

    /// `POST /api/removeCell`.
    pub async fn remove_cell(&self, params: &PositionParams) -> Result<(), TransportError> {
        self.post::<_, AckBody>("removeCell", params).await.map(drop)
    }

    /// `GET /api/getChunk`.
    pub async fn get_chunk(&self, params: &ChunkParams) -> Result<Vec<Cell>, TransportError> {
        let body: CellsBody = self.get("getChunk", params).await?;
        Ok(body.cells)
    }

    /// `GET /api/getChunkByRadius`.
    pub async fn get_chunk_by_radius(
        &self,
        params: &RadiusParams,
    ) -> Result<Vec<Cell>, TransportError> {
        let body: CellsBody = self.get("getChunkByRadius", params).await?;
        Ok(body.cells)
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/{path}", self.base_url)
    }

    async fn get<Q, T>(&self, path: &str, query: &Q) -> Result<T, TransportError>
    where
        Q: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        debug!(path, "GET");
        let response = self.client.get(self.url(path)).query(query).send().await?;
        decode(response).await
    }

    async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, TransportError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        debug!(path, "POST");
        let response = self.client.post(self.url(path)).json(body).send().await?;
        decode(response).await
    }
}

/// Decode a success body, or turn an [`ErrorBody`] into
/// [`TransportError::Rejected`].
async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, TransportError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json::<T>().await?);
    }

    match response.json::<ErrorBody>().await {
        Ok(body) => Err(TransportError::Rejected {
            code: body.code,
            message: body.error,
        }),
        Err(_) => Err(TransportError::Http(format!("unexpected status {status}"))),
    }
}
