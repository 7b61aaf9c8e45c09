//! Worker-side Lease Loop
//!
//! Keeps this process holding some shard for as long as it runs.
//!
//! ## Lifecycle
//! 1. **Acquire**: Ask for any shard, sleeping a fixed backoff between refusals.
//! 2. **Hold**: Report `LeaseEvent::Acquired`, then renew every half lease duration.
//! 3. **Lose**: A refused or failed renewal, a renewal answered with a different shard, or a
//!    renewal still unanswered at the local deadline ends the hold. `LeaseEvent::Lost` is
//!    reported and the loop starts over; if the manager already handed out a replacement it
//!    is held straight away.
//!
//! The local deadline is counted from when the granting request was *sent*, minus a margin,
//! so it always falls before the manager's own expiry.
//!
//! The loop runs as its own task so request load never delays a renewal.

use super::coordinator::LeaseCoordinator;
use super::protocol::ENDPOINT_LEASE;
use super::types::{Lease, LeaseEvent, LeaseRequest};
use crate::http::{PeerClient, decode};

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{RwLock, mpsc};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Fraction of the lease given up at the end of each term.
const EXPIRY_MARGIN_DIVISOR: u32 = 10;

/// Anything that can answer a lease request: the manager over HTTP, or a coordinator
/// in-process.
#[async_trait]
pub trait LeaseSource: Send + Sync {
    async fn request_lease(&self, holder: &str, renew: Option<&str>) -> Result<Option<Lease>>;
}

#[async_trait]
impl LeaseSource for LeaseCoordinator {
    async fn request_lease(&self, holder: &str, renew: Option<&str>) -> Result<Option<Lease>> {
        self.lease(holder, renew).await
    }
}

/// Talks to the manager's `POST /lease`.
pub struct HttpLeaseSource {
    peers: PeerClient,
    manager_url: String,
}

impl HttpLeaseSource {
    pub fn new(peers: PeerClient, manager_url: impl Into<String>) -> Self {
        Self {
            peers,
            manager_url: manager_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl LeaseSource for HttpLeaseSource {
    async fn request_lease(&self, holder: &str, renew: Option<&str>) -> Result<Option<Lease>> {
        let url = format!("{}{}", self.manager_url, ENDPOINT_LEASE);
        let request = LeaseRequest {
            holder: holder.to_string(),
            renew: renew.map(str::to_string),
        };

        // One attempt: the lease loop retries, bounded by the lease deadline.
        let response = self.peers.post_once(&url, &request).await?;

        if response.status() == reqwest::StatusCode::NO_CONTENT {
            return Ok(None);
        }

        Ok(Some(decode::<Lease>(response).await?))
    }
}

enum HoldOutcome {
    Cancelled,
    /// The lease ended; carries a different shard if the manager granted one instead.
    Lost(Option<Granted>),
}

/// A lease together with the local instant this process must stop acting on it.
struct Granted {
    lease: Lease,
    deadline: Instant,
}

impl Granted {
    fn new(lease: Lease, sent_at: Instant) -> Self {
        let term = lease.duration();
        let deadline = sent_at + term - term / EXPIRY_MARGIN_DIVISOR;
        Self { lease, deadline }
    }
}

pub struct LeaseClient {
    source: Arc<dyn LeaseSource>,
    identity: String,
    retry_backoff: Duration,
    current: RwLock<Option<Lease>>,
}

impl LeaseClient {
    pub fn new(
        source: Arc<dyn LeaseSource>,
        identity: impl Into<String>,
        retry_backoff: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            source,
            identity: identity.into(),
            retry_backoff,
            current: RwLock::new(None),
        })
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// The lease currently held, if any.
    pub async fn current_lease(&self) -> Option<Lease> {
        self.current.read().await.clone()
    }

    /// Runs until `cancel` fires, reporting ownership changes on `events`.
    pub async fn run(
        self: Arc<Self>,
        events: mpsc::UnboundedSender<LeaseEvent>,
        cancel: CancellationToken,
    ) {
        tracing::info!("Lease client started as {}", self.identity);
        let mut replacement: Option<Granted> = None;

        loop {
            let granted = match replacement.take() {
                Some(granted) => granted,
                None => match self.acquire(&cancel).await {
                    Some(granted) => granted,
                    None => break,
                },
            };

            let shard = granted.lease.shard_name.clone();
            tracing::info!("Acquired lease for {} ({}s)", shard, granted.lease.duration);
            *self.current.write().await = Some(granted.lease.clone());
            Self::notify(&events, LeaseEvent::Acquired(shard.clone()));

            let outcome = self.hold(granted, &cancel).await;

            *self.current.write().await = None;
            Self::notify(&events, LeaseEvent::Lost(shard.clone()));

            match outcome {
                HoldOutcome::Cancelled => {
                    tracing::info!("Releasing {} on shutdown", shard);
                    break;
                }
                HoldOutcome::Lost(next) => {
                    tracing::warn!("Lease lost for {}", shard);
                    replacement = next;
                }
            }
        }

        tracing::info!("Lease client stopped");
    }

    /// Requests any shard until one is granted. `None` means cancelled.
    async fn acquire(&self, cancel: &CancellationToken) -> Option<Granted> {
        loop {
            let sent_at = Instant::now();
            let answer = tokio::select! {
                _ = cancel.cancelled() => return None,
                answer = self.try_lease(None) => answer,
            };
            if let Some(lease) = answer {
                return Some(Granted::new(lease, sent_at));
            }

            tracing::debug!("No lease granted, retrying in {:?}", self.retry_backoff);
            tokio::select! {
                _ = cancel.cancelled() => return None,
                _ = tokio::time::sleep(self.retry_backoff) => {}
            }
        }
    }

    async fn hold(&self, mut granted: Granted, cancel: &CancellationToken) -> HoldOutcome {
        let shard = granted.lease.shard_name.clone();

        loop {
            let wake = (Instant::now() + granted.lease.renew_interval()).min(granted.deadline);
            tokio::select! {
                _ = cancel.cancelled() => return HoldOutcome::Cancelled,
                _ = tokio::time::sleep_until(wake) => {}
            }

            let sent_at = Instant::now();
            let renewal = tokio::time::timeout_at(granted.deadline, self.try_lease(Some(&shard)));
            let answer = tokio::select! {
                _ = cancel.cancelled() => return HoldOutcome::Cancelled,
                answer = renewal => answer,
            };

            match answer {
                Ok(Some(renewed)) if renewed.shard_name == shard => {
                    tracing::trace!("Renewed lease for {}", shard);
                    *self.current.write().await = Some(renewed.clone());
                    granted = Granted::new(renewed, sent_at);
                }
                Ok(Some(other)) => return HoldOutcome::Lost(Some(Granted::new(other, sent_at))),
                Ok(None) => return HoldOutcome::Lost(None),
                Err(_) => {
                    tracing::warn!("Renewal of {} unanswered at the lease deadline", shard);
                    return HoldOutcome::Lost(None);
                }
            }
        }
    }

    /// Store or network failures count as a refusal.
    async fn try_lease(&self, renew: Option<&str>) -> Option<Lease> {
        match self.source.request_lease(&self.identity, renew).await {
            Ok(lease) => lease,
            Err(e) => {
                tracing::warn!("Lease request failed: {}", e);
                None
            }
        }
    }

    fn notify(events: &mpsc::UnboundedSender<LeaseEvent>, event: LeaseEvent) {
        if events.send(event).is_err() {
            tracing::debug!("Lease event receiver dropped");
        }
    }
}
