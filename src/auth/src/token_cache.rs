// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::Result;
use crate::errors;
use crate::token::{Token, TokenProvider};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
// Using tokio's wrapper makes the cache testable without relying on clock
// times.
use tokio::time::Instant;

/// Replace tokens that expire within this period.
///
/// Callers receive a token that remains valid long enough to authenticate a
/// request, even if the request is delayed by connection setup or retries.
const EXPIRATION_SLACK: Duration = Duration::from_secs(30);

/// Caches tokens produced by a [TokenProvider].
///
/// The cache goes through these states, re-entering the refresh state when
/// the token approaches expiration:
///
/// ```norust
/// Empty -> Refreshing -> Valid
///                     -> Errored
/// ```
///
/// Only one refresh is in flight at a time. Other callers needing a token
/// wait on a notification and then read the shared result, so a burst of
/// concurrent requests results in a single call to the inner provider. An
/// error is shared with all waiting callers, and the next caller starts a
/// new refresh.
#[derive(Debug)]
pub(crate) struct TokenCache<T>
where
    T: TokenProvider,
{
    // The cached token, or the last seen error.
    token: Arc<Mutex<Result<Token>>>,

    // Tracks if a refresh is ongoing. If the lock is held, there is a
    // refresh in flight.
    refresh_in_progress: Arc<Mutex<()>>,
    // Allows us to await the result of a refresh from multiple tasks.
    refresh_notify: Arc<Notify>,

    // The token provider. This thing does the refreshing.
    inner: Arc<T>,
}

// Returns true if we are holding an error, or a token that is expired or
// about to expire.
fn invalid(token: &Result<Token>) -> bool {
    match token {
        Ok(t) => t
            .expires_at
            .is_some_and(|e| e <= Instant::now() + EXPIRATION_SLACK),
        Err(_) => true,
    }
}

// Manual `Clone` implementation because `T` need not be `Clone`; we only
// hold an `Arc<T>`.
impl<T: TokenProvider> Clone for TokenCache<T> {
    fn clone(&self) -> TokenCache<T> {
        TokenCache {
            token: self.token.clone(),
            refresh_in_progress: self.refresh_in_progress.clone(),
            refresh_notify: self.refresh_notify.clone(),
            inner: self.inner.clone(),
        }
    }
}

impl<T: TokenProvider> TokenCache<T> {
    pub(crate) fn new(inner: T) -> TokenCache<T> {
        TokenCache {
            token: Arc::new(Mutex::new(Err(errors::transient_from_str(
                "the token cache is empty",
            )))),
            refresh_in_progress: Arc::new(Mutex::new(())),
            refresh_notify: Arc::new(Notify::new()),
            inner: Arc::new(inner),
        }
    }

    // Clones the current token, releasing the lock on return.
    async fn current_token(&self) -> Result<Token> {
        self.token.lock().await.clone()
    }
}

#[async_trait::async_trait]
impl<T: TokenProvider + 'static> TokenProvider for TokenCache<T> {
    async fn token(&self) -> Result<Token> {
        let token = self.current_token().await;

        if !invalid(&token) {
            return token;
        }

        match self.refresh_in_progress.try_lock() {
            Ok(guard) => {
                // No refresh in flight, this task performs one.
                let token = self.inner.token().await;
                if let Err(e) = &token {
                    tracing::warn!("token refresh failed: {e}");
                }

                // Store the token, or the updated error.
                *self.token.lock().await = token.clone();

                // The refresh is complete. Release the refresh guard, then
                // wake any and all waiters.
                drop(guard);
                self.refresh_notify.notify_waiters();

                // Return here without taking the token lock again.
                return token;
            }
            Err(_) => {
                // There is already a refresh in flight, await its result.
                self.refresh_notify.notified().await;
            }
        }

        // The refresh completed, read the new token or error.
        self.current_token().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::CredentialsError;
    use crate::token::tests::MockTokenProvider;

    static TOKEN_VALID_DURATION: Duration = Duration::from_secs(3600);

    fn test_token(value: &str, expires_at: Option<Instant>) -> Token {
        Token {
            token: value.to_string(),
            token_type: "Bearer".to_string(),
            expires_at,
            metadata: None,
        }
    }

    #[tokio::test]
    async fn initial_token_success() {
        let expected = test_token("test-token", None);
        let expected_clone = expected.clone();

        let mut mock = MockTokenProvider::new();
        mock.expect_token().times(1).return_once(|| Ok(expected_clone));

        let cache = TokenCache::new(mock);
        let actual = cache.token().await.unwrap();
        assert_eq!(actual, expected);

        // The cached token is reused instead of making a new request to the
        // mock token provider.
        let actual = cache.token().await.unwrap();
        assert_eq!(actual, expected);
    }

    #[tokio::test]
    async fn initial_token_failure() {
        let mut mock = MockTokenProvider::new();
        mock.expect_token()
            .times(2)
            .returning(|| Err(CredentialsError::from_msg(false, "fail")));

        let cache = TokenCache::new(mock);
        assert!(cache.token().await.is_err());

        // A new request is made to the mock token provider when the cache
        // holds an error.
        assert!(cache.token().await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn expired_token_triggers_refresh() {
        let now = Instant::now();

        let initial = test_token("initial-token", Some(now + TOKEN_VALID_DURATION));
        let initial_clone = initial.clone();
        let refresh = test_token("refresh-token", Some(now + 2 * TOKEN_VALID_DURATION));
        let refresh_clone = refresh.clone();

        let mut mock = MockTokenProvider::new();
        mock.expect_token().times(1).return_once(|| Ok(initial_clone));
        mock.expect_token().times(1).return_once(|| Ok(refresh_clone));

        let cache = TokenCache::new(mock);
        let actual = cache.token().await.unwrap();
        assert_eq!(actual, initial);

        // Wait long enough for the token to be expired.
        tokio::time::advance(TOKEN_VALID_DURATION).await;

        let actual = cache.token().await.unwrap();
        assert_eq!(actual, refresh);
    }

    #[tokio::test(start_paused = true)]
    async fn token_within_slack_is_refreshed() {
        let now = Instant::now();

        let initial = test_token("initial-token", Some(now + TOKEN_VALID_DURATION));
        let initial_clone = initial.clone();
        let refresh = test_token("refresh-token", Some(now + 2 * TOKEN_VALID_DURATION));
        let refresh_clone = refresh.clone();

        let mut mock = MockTokenProvider::new();
        mock.expect_token().times(1).return_once(|| Ok(initial_clone));
        mock.expect_token().times(1).return_once(|| Ok(refresh_clone));

        let cache = TokenCache::new(mock);
        let _ = cache.token().await.unwrap();

        // The token is not yet expired, but it is within the slack period,
        // so the cache refreshes it anyway.
        tokio::time::advance(TOKEN_VALID_DURATION - EXPIRATION_SLACK / 2).await;

        let actual = cache.token().await.unwrap();
        assert_eq!(actual, refresh);
    }

    #[tokio::test(start_paused = true)]
    async fn expired_token_failure() {
        let now = Instant::now();

        let initial = test_token("initial-token", Some(now + TOKEN_VALID_DURATION));
        let initial_clone = initial.clone();

        let mut mock = MockTokenProvider::new();
        mock.expect_token().times(1).return_once(|| Ok(initial_clone));
        mock.expect_token()
            .times(1)
            .return_once(|| Err(CredentialsError::from_msg(true, "fail")));

        let cache = TokenCache::new(mock);
        let actual = cache.token().await.unwrap();
        assert_eq!(actual, initial);

        tokio::time::advance(TOKEN_VALID_DURATION).await;

        // The error is returned, not the expired token.
        assert!(cache.token().await.is_err());
    }

    #[derive(Clone, Debug)]
    struct FakeTokenProvider {
        result: Result<Token>,
        calls: Arc<std::sync::Mutex<i32>>,
    }

    impl FakeTokenProvider {
        pub fn new(result: Result<Token>) -> Self {
            FakeTokenProvider {
                result,
                calls: Arc::new(std::sync::Mutex::new(0)),
            }
        }

        pub fn calls(&self) -> i32 {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait::async_trait]
    impl TokenProvider for FakeTokenProvider {
        async fn token(&self) -> Result<Token> {
            // Give waiters in a thundering herd enough time to pile up.
            tokio::time::sleep(Duration::from_millis(50)).await;
            *self.calls.lock().unwrap() += 1;
            self.result.clone()
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn thundering_herd_success() {
        let token = test_token("herd-token", None);
        let tp = FakeTokenProvider::new(Ok(token.clone()));
        let cache = TokenCache::new(tp.clone());

        let tasks = (0..100)
            .map(|_| {
                let cache_clone = cache.clone();
                tokio::spawn(async move { cache_clone.token().await })
            })
            .collect::<Vec<_>>();

        for task in tasks {
            let actual = task.await.unwrap();
            assert!(actual.is_ok(), "{}", actual.err().unwrap());
            assert_eq!(actual.unwrap(), token);
        }

        // Not all N requests were passed along to the inner provider. The
        // expectation is loose, to avoid races between spawning the tasks
        // and executing the first line of code in the task. In most cases
        // there is exactly 1 call.
        let calls = tp.calls();
        assert!(calls < 100, "calls={calls}");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn thundering_herd_failure_shares_error() {
        let err = Err(CredentialsError::from_msg(false, "epic fail"));
        let tp = FakeTokenProvider::new(err);
        let cache = TokenCache::new(tp.clone());

        let tasks = (0..100)
            .map(|_| {
                let cache_clone = cache.clone();
                tokio::spawn(async move { cache_clone.token().await })
            })
            .collect::<Vec<_>>();

        for task in tasks {
            let actual = task.await.unwrap();
            assert!(actual.is_err(), "{:?}", actual.unwrap());
            let e = format!("{}", actual.err().unwrap());
            assert!(e.contains("epic fail"), "{e}");
        }

        let calls = tp.calls();
        assert!(calls < 100, "calls={calls}");
    }
}
