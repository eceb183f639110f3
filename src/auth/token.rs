//! In-memory access token cache with automatic refresh.
//!
//! Daraja tokens live for roughly an hour. The provider hands out the cached
//! token until it is within `buffer` of expiry, then fetches a new one. Only
//! one refresh runs at a time; callers arriving during a refresh wait for it
//! and reuse its result.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info};

use super::fetcher::CredentialFetcher;
use crate::error::MpesaResult;

/// Refresh this long before the reported expiry.
pub const TOKEN_EXPIRY_BUFFER: Duration = Duration::from_secs(60);

/// Lifetime assumed when the gateway omits `expires_in` or sends garbage.
pub const DEFAULT_TOKEN_LIFETIME_SECS: u64 = 3599;

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    expires_at: Instant,
}

impl CachedToken {
    fn is_expired(&self, now: Instant, buffer: Duration) -> bool {
        self.expires_at.saturating_duration_since(now) <= buffer
    }
}

/// Leading integer of the raw lifetime, falling back to the default window.
pub fn parse_expires_in(raw: Option<&str>) -> u64 {
    raw.map(str::trim)
        .map(|s| s.chars().take_while(char::is_ascii_digit).collect::<String>())
        .and_then(|digits| digits.parse::<u64>().ok())
        .unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS)
}

pub struct AccessTokenProvider {
    fetcher: Arc<dyn CredentialFetcher>,
    buffer: Duration,
    cache: Mutex<Option<CachedToken>>,
    refresh: tokio::sync::Mutex<()>,
}

impl AccessTokenProvider {
    pub fn new(fetcher: Arc<dyn CredentialFetcher>) -> Self {
        Self {
            fetcher,
            buffer: TOKEN_EXPIRY_BUFFER,
            cache: Mutex::new(None),
            refresh: tokio::sync::Mutex::new(()),
        }
    }

    pub fn with_buffer(mut self, buffer: Duration) -> Self {
        self.buffer = buffer;
        self
    }

    /// Returns a usable access token, fetching a new one when needed.
    pub async fn access_token(&self) -> MpesaResult<String> {
        if let Some(token) = self.current() {
            return Ok(token);
        }

        let _refresh = self.refresh.lock().await;

        // Another caller may have refreshed while we waited.
        if let Some(token) = self.current() {
            debug!("Reusing token refreshed by a concurrent caller");
            return Ok(token);
        }

        let grant = self.fetcher.fetch_token().await?;
        let now = Instant::now();
        // A lifetime past the clock's range is as useless as a garbled one.
        let requested = Duration::from_secs(parse_expires_in(grant.expires_in.as_deref()));
        let (lifetime, expires_at) = match now.checked_add(requested) {
            Some(expires_at) => (requested.as_secs(), expires_at),
            None => (
                DEFAULT_TOKEN_LIFETIME_SECS,
                now + Duration::from_secs(DEFAULT_TOKEN_LIFETIME_SECS),
            ),
        };

        *self.slot() = Some(CachedToken {
            token: grant.access_token.clone(),
            expires_at,
        });

        info!("Obtained new Daraja access token, expires in {}s", lifetime);
        Ok(grant.access_token)
    }

    /// Drop the cached token so the next call refreshes.
    pub fn invalidate(&self) {
        *self.slot() = None;
        debug!("Access token cache cleared");
    }

    fn current(&self) -> Option<String> {
        let now = Instant::now();
        self.slot()
            .as_ref()
            .filter(|cached| !cached.is_expired(now, self.buffer))
            .map(|cached| cached.token.clone())
    }

    fn slot(&self) -> MutexGuard<'_, Option<CachedToken>> {
        // The guarded value is a plain Option, so a poisoned lock is still usable.
        self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::fetcher::TokenGrant;
    use crate::error::MpesaError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingFetcher {
        calls: AtomicUsize,
        expires_in: Option<String>,
        fail: bool,
        delay: Duration,
    }

    impl CountingFetcher {
        fn new(expires_in: Option<&str>) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                expires_in: expires_in.map(str::to_string),
                fail: false,
                delay: Duration::ZERO,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CredentialFetcher for CountingFetcher {
        async fn fetch_token(&self) -> MpesaResult<TokenGrant> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if self.fail {
                return Err(MpesaError::auth("invalid_client"));
            }
            Ok(TokenGrant {
                access_token: format!("token-{}", n),
                expires_in: self.expires_in.clone(),
            })
        }
    }

    #[test]
    fn test_parse_expires_in() {
        assert_eq!(parse_expires_in(Some("3599")), 3599);
        assert_eq!(parse_expires_in(Some(" 120 ")), 120);
        assert_eq!(parse_expires_in(Some("300s")), 300);
        assert_eq!(parse_expires_in(Some("soon")), DEFAULT_TOKEN_LIFETIME_SECS);
        assert_eq!(parse_expires_in(None), DEFAULT_TOKEN_LIFETIME_SECS);
    }

    #[tokio::test(start_paused = true)]
    async fn test_token_reused_within_lifetime() {
        let fetcher = CountingFetcher::new(Some("3599"));
        let provider = AccessTokenProvider::new(fetcher.clone());

        let first = provider.access_token().await.unwrap();
        let second = provider.access_token().await.unwrap();

        assert_eq!(first, "token-1");
        assert_eq!(second, "token-1");
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalidate_forces_refresh() {
        let fetcher = CountingFetcher::new(Some("3599"));
        let provider = AccessTokenProvider::new(fetcher.clone());

        assert_eq!(provider.access_token().await.unwrap(), "token-1");
        provider.invalidate();
        assert_eq!(provider.access_token().await.unwrap(), "token-2");
        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_token_inside_buffer_is_expired() {
        let fetcher = CountingFetcher::new(Some("120"));
        let provider = AccessTokenProvider::new(fetcher.clone());

        provider.access_token().await.unwrap();

        // 61s left, more than the 60s buffer
        tokio::time::advance(Duration::from_secs(59)).await;
        assert_eq!(provider.access_token().await.unwrap(), "token-1");

        // 59s left, inside the buffer
        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(provider.access_token().await.unwrap(), "token-2");
        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unparseable_lifetime_uses_default() {
        let fetcher = CountingFetcher::new(Some("not-a-number"));
        let provider = AccessTokenProvider::new(fetcher.clone());

        provider.access_token().await.unwrap();
        tokio::time::advance(Duration::from_secs(DEFAULT_TOKEN_LIFETIME_SECS - 61)).await;
        provider.access_token().await.unwrap();

        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_out_of_range_lifetime_uses_default() {
        let fetcher = CountingFetcher::new(Some("10000000000000000000"));
        let provider = AccessTokenProvider::new(fetcher.clone());

        assert_eq!(provider.access_token().await.unwrap(), "token-1");
        tokio::time::advance(Duration::from_secs(DEFAULT_TOKEN_LIFETIME_SECS - 61)).await;
        assert_eq!(provider.access_token().await.unwrap(), "token-1");

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(provider.access_token().await.unwrap(), "token-2");
        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_oversized_buffer_always_refreshes() {
        let fetcher = CountingFetcher::new(Some("3599"));
        let provider = AccessTokenProvider::new(fetcher.clone()).with_buffer(Duration::MAX);

        assert_eq!(provider.access_token().await.unwrap(), "token-1");
        assert_eq!(provider.access_token().await.unwrap(), "token-2");
        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test]
    async fn test_fetch_failure_is_not_cached() {
        let fetcher = Arc::new(CountingFetcher {
            calls: AtomicUsize::new(0),
            expires_in: None,
            fail: true,
            delay: Duration::ZERO,
        });
        let provider = AccessTokenProvider::new(fetcher.clone());

        assert!(provider.access_token().await.unwrap_err().is_auth());
        assert!(provider.access_token().await.unwrap_err().is_auth());
        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_cold_start_shares_one_refresh() {
        let fetcher = Arc::new(CountingFetcher {
            calls: AtomicUsize::new(0),
            expires_in: Some("3599".to_string()),
            fail: false,
            delay: Duration::from_millis(50),
        });
        let provider = Arc::new(AccessTokenProvider::new(fetcher.clone()));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let provider = provider.clone();
                tokio::spawn(async move { provider.access_token().await })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), "token-1");
        }
        assert_eq!(fetcher.calls(), 1);
    }
}
