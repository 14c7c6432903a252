//! Sliding-window rate limiter over persisted request records.
//!
//! Each accepted request writes one record keyed `<category>:<key>`; a check
//! counts records younger than the window. Concurrent checks at the budget
//! boundary may both pass; the storage layer's insert is atomic and eventual
//! consistency is acceptable for a limiter.
//!
//! Fail-open policy: if the store is unreachable the limiter allows the
//! request and logs a warning. Blocking all traffic on an infrastructure
//! outage would be worse than briefly unmetered traffic. This is deliberate
//! and does not extend to authentication, which fails closed.

use chrono::{Duration, Utc};
use std::sync::Arc;

use crate::db::RateLimitStore;
use crate::error::AuthError;
use crate::models::RateLimitWindow;

/// Request categories with fixed, distinct budgets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateCategory {
    /// Credential-sensitive operations: login, register, password flows.
    Auth,
    /// Ordinary resource traffic.
    General,
    /// Expensive AI-backed operations.
    Ai,
}

impl RateCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            RateCategory::Auth => "auth",
            RateCategory::General => "general",
            RateCategory::Ai => "ai",
        }
    }

    pub fn budget(&self) -> u64 {
        match self {
            RateCategory::Auth => 5,
            RateCategory::General => 100,
            RateCategory::Ai => 10,
        }
    }

    pub fn window(&self) -> Duration {
        match self {
            RateCategory::Auth => Duration::minutes(15),
            RateCategory::General => Duration::minutes(1),
            RateCategory::Ai => Duration::minutes(1),
        }
    }
}

#[derive(Clone)]
pub struct RateLimitService {
    store: Arc<dyn RateLimitStore>,
}

impl RateLimitService {
    pub fn new(store: Arc<dyn RateLimitStore>) -> Self {
        Self { store }
    }

    /// Check and consume one unit of budget for `key` in `category`.
    ///
    /// `key` is the caller's identity id when authenticated, otherwise its
    /// network origin.
    pub async fn check(&self, key: &str, category: RateCategory) -> Result<(), AuthError> {
        let window = category.window();
        let now = Utc::now();
        let since = now - window;
        let window_key = format!("{}:{}", category.as_str(), key);

        let count = match self.store.count_window(&window_key, since).await {
            Ok(count) => count,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    key = %window_key,
                    "Rate limit store unreachable; allowing request"
                );
                return Ok(());
            }
        };

        if count >= category.budget() {
            let oldest = match self.store.oldest_in_window(&window_key, since).await {
                Ok(oldest) => oldest,
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        key = %window_key,
                        "Rate limit store unreachable; allowing request"
                    );
                    return Ok(());
                }
            };

            // The window frees up when its oldest record ages out.
            let reset_at = oldest.map(|o| o + window).unwrap_or(now);
            let retry_after_seconds = (reset_at - now).num_seconds().max(1) as u64;

            tracing::info!(
                key = %window_key,
                count = count,
                budget = category.budget(),
                "Rate limit exceeded"
            );

            return Err(AuthError::TooManyRequests {
                message: "Too many requests. Please try again later.".to_string(),
                retry_after_seconds,
                reset_at,
            });
        }

        let record = RateLimitWindow::new(window_key.clone(), window);
        if let Err(e) = self.store.insert_window_record(&record).await {
            tracing::warn!(
                error = %e,
                key = %window_key,
                "Failed to persist rate limit record; allowing request"
            );
        }

        Ok(())
    }
}
