//! The background FIDO Metadata Service refresh loop.
//!
//! Fetches the signed MDS blob over HTTP, verifies and decodes it with
//! [`webauthn_rp_core::metadata::registry::process_mds_blob`], and swaps
//! the result into a shared [`MetadataRegistry`] read by the ceremony
//! verifiers. A failed fetch or a blob that fails signature
//! verification never tears down the loop - it logs and retries with
//! exponential backoff, leaving the previous registry in place.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use thiserror::Error;
use tokio::sync::{watch, RwLock};
use webauthn_rp_core::metadata::registry::{process_mds_blob, MetadataRegistry, ProcessingResult};
use webauthn_rp_core::metadata::MetadataDecodeOptions;

/// Everything needed to fetch and authenticate one MDS blob.
#[derive(Debug, Clone)]
pub struct MetadataServiceConfig {
    pub blob_url: String,
    pub pinned_root_der: Vec<u8>,
    pub expected_signer_cn: String,
    pub refresh_interval: Duration,
    pub decode_options: MetadataDecodeOptions,
}

#[derive(Debug, Error)]
pub enum MetadataFetchError {
    #[error("fetching the metadata blob failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("verifying or decoding the metadata blob failed: {0}")]
    Core(#[from] webauthn_rp_core::error::WebauthnError),
    #[error("every entry in the metadata blob failed to decode ({0} errors)")]
    AllEntriesFailed(usize),
}

async fn fetch_once(
    http: &reqwest::Client,
    config: &MetadataServiceConfig,
) -> Result<MetadataRegistry, MetadataFetchError> {
    let body = http.get(&config.blob_url).send().await?.text().await?;
    let now_unix: i64 = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0);

    let (result, next_update) = process_mds_blob(
        &body,
        &config.pinned_root_der,
        &config.expected_signer_cn,
        now_unix,
        config.decode_options,
    )?;

    match result {
        ProcessingResult::That(registry) => {
            debug!(next_update = %next_update, count = registry.len(), "metadata blob fully decoded");
            Ok(registry)
        }
        ProcessingResult::These(errors, registry) => {
            warn!(
                next_update = %next_update,
                count = registry.len(),
                failed = errors.len(),
                "metadata blob partially decoded"
            );
            Ok(registry)
        }
        ProcessingResult::This(errors) => Err(MetadataFetchError::AllEntriesFailed(errors.len())),
    }
}

/// A running refresh loop plus the registry it keeps up to date.
pub struct MetadataService {
    registry: Arc<RwLock<MetadataRegistry>>,
    shutdown_tx: watch::Sender<bool>,
}

impl MetadataService {
    /// A handle to the live registry. Cloning the `Arc` is cheap;
    /// readers take a shared lock per ceremony verification call.
    pub fn registry(&self) -> Arc<RwLock<MetadataRegistry>> {
        self.registry.clone()
    }

    /// Spawn the refresh loop on the current Tokio runtime. The first
    /// fetch happens immediately; the loop keeps the last successfully
    /// fetched registry in place across failures.
    pub fn spawn(config: MetadataServiceConfig, http: reqwest::Client) -> Self {
        let registry = Arc::new(RwLock::new(MetadataRegistry::default()));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let task_registry = registry.clone();
        tokio::spawn(run_refresh_loop(config, http, task_registry, shutdown_rx));

        MetadataService {
            registry,
            shutdown_tx,
        }
    }

    /// Ask the refresh loop to stop after its current iteration. The
    /// registry returned by [`MetadataService::registry`] keeps whatever
    /// it last held.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}

async fn run_refresh_loop(
    config: MetadataServiceConfig,
    http: reqwest::Client,
    registry: Arc<RwLock<MetadataRegistry>>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut backoff = Duration::from_secs(1);

    loop {
        match fetch_once(&http, &config).await {
            Ok(fresh) => {
                *registry.write().await = fresh;
                backoff = config.refresh_interval;
            }
            Err(e) => {
                warn!(error = %e, next_attempt_in = ?backoff, "metadata refresh failed, backing off");
                backoff = (backoff * 2).min(config.refresh_interval);
            }
        }

        tokio::select! {
            _ = tokio::time::sleep(backoff) => {}
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    return;
                }
            }
        }
    }
}
