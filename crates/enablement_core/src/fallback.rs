//! crates/enablement_core/src/fallback.rs
//!
//! Per-capability provider fallback. A [`FallbackChain`] tries its providers
//! in priority order and reads the [`FailureKind`] of every failure to decide
//! whether to advance, jump to the degraded strategy, or stop with a
//! placeholder. `generate` always returns an asset.

use crate::domain::{MediaAsset, MediaKind, PlaceholderDetails, PlaceholderReason};
use crate::ports::{
    ChainStep, DegradedStrategy, FailureKind, MediaProvider, MediaRequest, ProviderAttempt,
    ProviderFailure, ProviderOutput, ProviderResult,
};
use crate::storage::MediaStorage;
use crate::throttle::ProviderThrottle;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Longest prompt excerpt copied into placeholder metadata.
const INTENT_EXCERPT_CHARS: usize = 500;

pub struct FallbackChain {
    kind: MediaKind,
    providers: Vec<Arc<dyn MediaProvider>>,
    degraded: Option<Arc<dyn DegradedStrategy>>,
    storage: Arc<MediaStorage>,
    throttle: Arc<ProviderThrottle>,
}

impl FallbackChain {
    pub fn new(kind: MediaKind, storage: Arc<MediaStorage>, throttle: Arc<ProviderThrottle>) -> Self {
        Self {
            kind,
            providers: Vec::new(),
            degraded: None,
            storage,
            throttle,
        }
    }

    /// Appends a provider at the lowest priority. Providers of another media
    /// kind are rejected.
    pub fn with_provider(mut self, provider: Arc<dyn MediaProvider>) -> Self {
        if provider.kind() == self.kind {
            self.providers.push(provider);
        } else {
            warn!(
                chain = %self.kind,
                provider = provider.id(),
                provider_kind = %provider.kind(),
                "Ignoring provider registered on a chain of another media kind"
            );
        }
        self
    }

    pub fn with_degraded(mut self, strategy: Arc<dyn DegradedStrategy>) -> Self {
        self.degraded = Some(strategy);
        self
    }

    pub fn provider_ids(&self) -> Vec<String> {
        self.providers.iter().map(|p| p.id().to_string()).collect()
    }

    /// False when no provider has credentials; such a chain only yields placeholders.
    pub fn is_configured(&self) -> bool {
        !self.providers.is_empty()
    }

    /// Produces an asset for `request`. Attempts are bounded by the chain
    /// length plus one degraded attempt; nothing is retried.
    pub async fn generate(&self, request: &MediaRequest) -> MediaAsset {
        if self.providers.is_empty() {
            info!(kind = %self.kind, subject = %request.subject, "No provider configured; using placeholder");
            return self
                .placeholder(request, PlaceholderReason::NotConfigured, Vec::new(), None)
                .await;
        }

        let mut attempts = Vec::new();
        let mut skip_to_degraded = false;

        for provider in &self.providers {
            match self.attempt(provider.as_ref(), request).await {
                Ok(asset) => return asset,
                Err(failure) => {
                    warn!(
                        kind = %self.kind,
                        provider = provider.id(),
                        failure = %failure.kind,
                        status = ?failure.provider_status,
                        lesson = ?request.lesson_index,
                        "Provider attempt failed: {}",
                        failure.message
                    );
                    attempts.push(ProviderAttempt::from_failure(provider.id(), &failure));

                    match failure.kind.chain_step() {
                        ChainStep::Advance => continue,
                        ChainStep::SkipToDegraded => {
                            skip_to_degraded = true;
                            break;
                        }
                        ChainStep::PendingPlaceholder => {
                            let pending = Some((provider.id().to_string(), failure.estimated_wait_seconds));
                            return self
                                .placeholder(request, PlaceholderReason::ServicePending, attempts, pending)
                                .await;
                        }
                    }
                }
            }
        }

        if skip_to_degraded {
            if let Some(strategy) = &self.degraded {
                match strategy.produce(request).await {
                    Ok(asset) => {
                        info!(
                            kind = %self.kind,
                            strategy = strategy.id(),
                            lesson = ?request.lesson_index,
                            "Degraded strategy produced asset"
                        );
                        return asset;
                    }
                    Err(failure) => {
                        warn!(
                            kind = %self.kind,
                            strategy = strategy.id(),
                            failure = %failure.kind,
                            "Degraded strategy failed: {}",
                            failure.message
                        );
                        attempts.push(ProviderAttempt::from_failure(strategy.id(), &failure));
                    }
                }
            }
        }

        self.placeholder(request, PlaceholderReason::ProvidersExhausted, attempts, None)
            .await
    }

    async fn attempt(
        &self,
        provider: &dyn MediaProvider,
        request: &MediaRequest,
    ) -> ProviderResult<MediaAsset> {
        let started = Instant::now();
        let output = invoke_bounded(provider, request, &self.throttle).await?;
        let asset = self
            .storage
            .store_output(provider.id(), request, output)
            .await
            .map_err(|e| {
                ProviderFailure::new(FailureKind::Unknown, format!("could not write asset: {}", e))
            })?;

        info!(
            kind = %self.kind,
            provider = provider.id(),
            lesson = ?request.lesson_index,
            bytes = asset.size_bytes,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Provider produced asset"
        );
        Ok(asset)
    }

    async fn placeholder(
        &self,
        request: &MediaRequest,
        reason: PlaceholderReason,
        attempts: Vec<ProviderAttempt>,
        pending: Option<(String, Option<f64>)>,
    ) -> MediaAsset {
        let (pending_provider, estimated_wait_seconds) = match pending {
            Some((provider, wait)) => (Some(provider), wait),
            None => (None, None),
        };
        let details = PlaceholderDetails {
            reason,
            subject: request.subject.clone(),
            intended_content: request.prompt.chars().take(INTENT_EXCERPT_CHARS).collect(),
            pending_provider,
            estimated_wait_seconds,
            attempts,
        };
        info!(kind = %self.kind, subject = %request.subject, reason = ?reason, "Using placeholder asset");
        self.storage.write_placeholder(request, details).await
    }
}

/// One provider call through the shared throttle, bounded by the provider's timeout.
pub(crate) async fn invoke_bounded(
    provider: &dyn MediaProvider,
    request: &MediaRequest,
    throttle: &ProviderThrottle,
) -> ProviderResult<ProviderOutput> {
    let _permit = throttle.acquire().await;
    let limit = provider.timeout();

    let output = match tokio::time::timeout(limit, provider.invoke(request)).await {
        Ok(result) => result?,
        Err(_) => {
            return Err(ProviderFailure::new(
                FailureKind::Timeout,
                format!("no response within {:?}", limit),
            ))
        }
    };

    if output.bytes.is_empty() {
        return Err(ProviderFailure::new(
            FailureKind::MalformedResponse,
            "provider returned an empty body",
        ));
    }
    Ok(output)
}
