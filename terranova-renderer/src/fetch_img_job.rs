//reference:https://github.com/frewsxcv/rgis/blob/main/rgis-network/src/lib.rs

use std::{io, time::Duration};

use futures_util::StreamExt;
use terranova_scene::TileKey;

use crate::{settings::TileLayerSettings, tile_layer::TileRequest};

#[derive(thiserror::Error, Debug)]
pub enum FetchError {
    #[error("{0}")]
    Io(#[from] io::Error),
    #[error("{0}")]
    Reqwest(#[from] reqwest::Error),
    #[error("server answered with status {0}")]
    Status(u16),
    #[error("gave up after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: String },
    #[error("could not decode image: {0}")]
    Decode(String),
}

impl FetchError {
    /// Client errors will not change on a retry.
    fn is_permanent(&self) -> bool {
        matches!(self, FetchError::Status(status) if (400..500).contains(status))
    }
}

pub struct FetchOutcome {
    pub key: TileKey,
    pub result: Result<bytes::Bytes, FetchError>,
}

pub struct FetchImgJob {
    pub key: TileKey,
    pub url: String,
    pub retry_limit: u32,
    pub retry_delay: Duration,
    pub timeout: Duration,
}

impl FetchImgJob {
    pub fn new(request: TileRequest, settings: &TileLayerSettings) -> Self {
        Self {
            key: request.key,
            url: request.url,
            retry_limit: settings.retry_limit,
            retry_delay: Duration::from_millis(settings.retry_delay_ms),
            timeout: Duration::from_millis(settings.request_timeout_ms),
        }
    }

    pub fn into_request(self) -> TileRequest {
        TileRequest {
            key: self.key,
            url: self.url,
        }
    }
}

async fn fetch_once(
    client: &reqwest::Client,
    url: &str,
    ctx: &terranova_jobs::Context,
) -> Result<bytes::Bytes, FetchError> {
    let response = client.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status(status.as_u16()));
    }
    let total_size = response.content_length().unwrap_or(0);
    let mut bytes_stream = response.bytes_stream();
    let mut bytes = Vec::<u8>::with_capacity(usize::try_from(total_size).unwrap_or(0));

    while let Some(bytes_chunk) = bytes_stream.next().await {
        bytes.extend_from_slice(&bytes_chunk?);
        if total_size > 0 {
            let percent = (bytes.len() as u64).saturating_mul(100) / total_size;
            let _ = ctx
                .send_progress(u8::try_from(percent.min(100)).unwrap_or(100))
                .await;
        }
    }
    Ok(bytes::Bytes::from(bytes))
}

async fn fetch_with_retry(
    url: &str,
    retry_limit: u32,
    retry_delay: Duration,
    timeout: Duration,
    ctx: &terranova_jobs::Context,
) -> Result<bytes::Bytes, FetchError> {
    // the timeout covers the body stream too, so a stalled server frees the job slot
    let client = reqwest::Client::builder().timeout(timeout).build()?;
    let mut attempts = 0;
    loop {
        attempts += 1;
        match fetch_once(&client, url, ctx).await {
            Ok(bytes) => return Ok(bytes),
            Err(e) if e.is_permanent() => return Err(e),
            Err(e) if attempts > retry_limit => {
                return Err(FetchError::RetriesExhausted {
                    attempts,
                    last: e.to_string(),
                })
            }
            Err(e) => {
                bevy::log::debug!("attempt {} for {} failed: {}", attempts, url, e);
                tokio::time::sleep(retry_delay).await;
            }
        }
    }
}

impl terranova_jobs::Job for FetchImgJob {
    type Outcome = FetchOutcome;

    fn name(&self) -> String {
        format!("fetch tile {}", self.key)
    }

    fn perform(self, ctx: terranova_jobs::Context) -> terranova_jobs::AsyncReturn<Self::Outcome> {
        Box::pin(async move {
            let key = self.key;
            let fetch = fetch_with_retry(
                &self.url,
                self.retry_limit,
                self.retry_delay,
                self.timeout,
                &ctx,
            );
            let result = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .map_err(FetchError::from)
                .and_then(|runtime| runtime.block_on(fetch));
            FetchOutcome { key, result }
        })
    }
}
