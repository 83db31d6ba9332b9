use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::ids::UserId;

pub const CSRF_TOKEN_TTL_MINUTES: i64 = 120;
/// Upper bound on live tokens; the oldest grant is evicted beyond it.
pub const CSRF_TOKEN_CAPACITY: usize = 10_000;

#[derive(Debug, Clone, Copy)]
struct CsrfGrant {
    owner: Option<UserId>,
    issued_at: DateTime<Utc>,
}

/// Anti-forgery tokens bound to the caller they were issued to.
///
/// Tokens stay valid for [`CSRF_TOKEN_TTL_MINUTES`] and may be reused within
/// that window, mirroring a per-session token. A signed-in user holds one live
/// token at a time; asking again hands back the same token with a fresh
/// expiry.
#[derive(Debug, Clone)]
pub struct CsrfRegistry {
    grants: Arc<Mutex<HashMap<String, CsrfGrant>>>,
    ttl: Duration,
    capacity: usize,
}

impl Default for CsrfRegistry {
    fn default() -> Self {
        Self::with_ttl(Duration::minutes(CSRF_TOKEN_TTL_MINUTES))
    }
}

impl CsrfRegistry {
    pub fn with_ttl(ttl: Duration) -> Self {
        Self::with_limits(ttl, CSRF_TOKEN_CAPACITY)
    }

    pub fn with_limits(ttl: Duration, capacity: usize) -> Self {
        Self {
            grants: Arc::new(Mutex::new(HashMap::new())),
            ttl,
            capacity: capacity.max(1),
        }
    }

    pub fn issue(&self, owner: Option<UserId>) -> String {
        let now = Utc::now();
        let ttl = self.ttl;
        let mut grants = self.grants.lock().unwrap_or_else(PoisonError::into_inner);
        grants.retain(|_, grant| now - grant.issued_at <= ttl);

        if owner.is_some() {
            let live = grants.iter_mut().find(|(_, grant)| grant.owner == owner);
            if let Some((token, grant)) = live {
                grant.issued_at = now;
                return token.clone();
            }
        }

        while grants.len() >= self.capacity {
            let oldest = grants
                .iter()
                .min_by_key(|(_, grant)| grant.issued_at)
                .map(|(token, _)| token.clone());
            let Some(token) = oldest else {
                break;
            };
            grants.remove(&token);
        }

        let token = Uuid::new_v4().simple().to_string();
        grants.insert(
            token.clone(),
            CsrfGrant {
                owner,
                issued_at: now,
            },
        );
        token
    }

    pub fn verify(&self, owner: Option<UserId>, token: &str) -> bool {
        let now = Utc::now();
        let ttl = self.ttl;
        let mut grants = self.grants.lock().unwrap_or_else(PoisonError::into_inner);
        grants.retain(|_, grant| now - grant.issued_at <= ttl);
        grants
            .get(token.trim())
            .is_some_and(|grant| grant.owner == owner)
    }

    #[cfg(test)]
    fn live_tokens(&self) -> usize {
        self.grants
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
