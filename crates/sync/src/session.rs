//! Session-scoped pending add-to-cart intents.
//!
//! When an anonymous visitor tries an action that needs an account, the
//! intent is parked here under their session id and picked up exactly once
//! by the reconciliation that runs after login. Entries expire after a TTL so
//! an abandoned login never replays an old intent.

use core::fmt;
use std::time::{Duration, Instant};

use mercado_cart_core::PendingIntent;
use moka::future::Cache;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifies one client session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    /// A fresh random session id.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Pending intents keyed by session, with expiry.
#[derive(Clone)]
pub struct PendingIntents {
    cache: Cache<SessionId, Parked>,
    ttl: Duration,
}

#[derive(Debug, Clone, Copy)]
struct Parked {
    intent: PendingIntent,
    captured_at: Instant,
}

impl PendingIntents {
    /// Maximum number of sessions with a parked intent.
    const MAX_SESSIONS: u64 = 10_000;

    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(Self::MAX_SESSIONS)
            .time_to_live(ttl)
            .build();
        Self { cache, ttl }
    }

    fn live(&self, parked: Parked) -> Option<PendingIntent> {
        (parked.captured_at.elapsed() < self.ttl).then_some(parked.intent)
    }

    /// Park `intent` for `session`, replacing any previous one.
    pub async fn capture(&self, session: SessionId, intent: PendingIntent) {
        tracing::debug!(%session, product_id = %intent.product_id, "Pending intent captured");
        let parked = Parked {
            intent,
            captured_at: Instant::now(),
        };
        self.cache.insert(session, parked).await;
    }

    /// Remove and return the intent for `session`.
    ///
    /// The entry is removed even when it turns out to be expired.
    pub async fn take(&self, session: SessionId) -> Option<PendingIntent> {
        let parked = self.cache.remove(&session).await?;
        self.live(parked)
    }

    /// Look at the intent without consuming it.
    #[must_use]
    pub async fn peek(&self, session: SessionId) -> Option<PendingIntent> {
        let parked = self.cache.get(&session).await?;
        self.live(parked)
    }
}
