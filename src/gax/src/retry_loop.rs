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

use super::Result;
use super::backoff_policy::BackoffPolicy;
use super::retry_policy::RetryPolicy;
use super::retry_result::RetryResult;
use super::retry_throttler::SharedRetryThrottler;
use std::sync::Arc;

/// Runs the retry loop for a given function.
///
/// This function calls an inner function as long as (1) the retry policy has
/// not expired, (2) the inner function has not returned a successful request,
/// and (3) the retry throttler allows more calls.
///
/// In between calls the function waits the amount of time prescribed by the
/// backoff policy, using `sleep` to implement any sleep.
pub async fn retry_loop<F, B, Response>(
    inner: F,
    sleep: B,
    idempotent: bool,
    retry_throttler: SharedRetryThrottler,
    retry_policy: Arc<dyn RetryPolicy>,
    backoff_policy: Arc<dyn BackoffPolicy>,
) -> Result<Response>
where
    F: AsyncFn(Option<std::time::Duration>) -> Result<Response> + Send,
    B: AsyncFn(std::time::Duration) -> () + Send,
{
    let loop_start = std::time::Instant::now();
    let mut attempt_count = 0;
    loop {
        let remaining_time = retry_policy.remaining_time(loop_start, attempt_count);
        let throttle = if attempt_count == 0 {
            // The first attempt is never throttled.
            false
        } else {
            let t = retry_throttler
                .lock()
                .expect("retry throttler lock is poisoned");
            t.throttle_retry_attempt()
        };
        if throttle {
            // This counts as an error for the purposes of the retry policy.
            if let Some(error) = retry_policy.on_throttle(loop_start, attempt_count) {
                return Err(error);
            }
            let delay = backoff_policy.on_failure(loop_start, attempt_count);
            tracing::debug!("attempt throttled, backing off for {delay:?}");
            sleep(delay).await;
            continue;
        }
        attempt_count += 1;
        match inner(remaining_time).await {
            Ok(r) => {
                retry_throttler
                    .lock()
                    .expect("retry throttler lock is poisoned")
                    .on_success();
                return Ok(r);
            }
            Err(e) => {
                let flow = retry_policy.on_error(loop_start, attempt_count, idempotent, e);
                let delay = backoff_policy.on_failure(loop_start, attempt_count);
                retry_throttler
                    .lock()
                    .expect("retry throttler lock is poisoned")
                    .on_retry_failure(&flow);
                on_error(&sleep, flow, delay).await?;
            }
        };
    }
}

async fn on_error<B>(
    sleep: &B,
    retry_flow: RetryResult,
    backoff_delay: std::time::Duration,
) -> Result<()>
where
    B: AsyncFn(std::time::Duration) -> (),
{
    match retry_flow {
        RetryResult::Permanent(e) | RetryResult::Exhausted(e) => Err(e),
        RetryResult::Continue(e) => {
            tracing::debug!("retrying after {backoff_delay:?}, previous attempt failed: {e}");
            sleep(backoff_delay).await;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::retry_throttler::RetryThrottler;
    use std::sync::Mutex;
    use std::time::{Duration, Instant};

    #[tokio::test]
    async fn immediate_success() -> anyhow::Result<()> {
        let mut throttler = MockRetryThrottler::new();
        throttler.expect_on_success().once().return_const(());
        let mut retry_policy = MockRetryPolicy::new();
        retry_policy
            .expect_remaining_time()
            .once()
            .return_const(None);
        let backoff_policy = MockBackoffPolicy::new();

        let inner = async |_| Ok("success".to_string());
        let sleep = async |_| unreachable!("no sleep on immediate success");
        let response = retry_loop(
            inner,
            sleep,
            true,
            to_retry_throttler(throttler),
            to_retry_policy(retry_policy),
            to_backoff_policy(backoff_policy),
        )
        .await?;
        assert_eq!(response, "success");
        Ok(())
    }

    #[tokio::test]
    async fn success_after_transient_errors() -> anyhow::Result<()> {
        let mut throttler = MockRetryThrottler::new();
        throttler
            .expect_throttle_retry_attempt()
            .times(2)
            .return_const(false);
        throttler.expect_on_retry_failure().times(2).return_const(());
        throttler.expect_on_success().once().return_const(());
        let mut retry_policy = MockRetryPolicy::new();
        retry_policy.expect_remaining_time().return_const(None);
        retry_policy
            .expect_on_error()
            .times(2)
            .returning(|_, _, _, e| RetryResult::Continue(e));
        let mut backoff_policy = MockBackoffPolicy::new();
        backoff_policy
            .expect_on_failure()
            .times(2)
            .return_const(Duration::from_millis(1));

        let counter = Mutex::new(0);
        let inner = async |_| {
            let mut guard = counter.lock().unwrap();
            *guard += 1;
            if *guard <= 2 {
                Err(Error::io("try again"))
            } else {
                Ok(*guard)
            }
        };
        let sleep = async |_| ();
        let response = retry_loop(
            inner,
            sleep,
            true,
            to_retry_throttler(throttler),
            to_retry_policy(retry_policy),
            to_backoff_policy(backoff_policy),
        )
        .await?;
        assert_eq!(response, 3);
        Ok(())
    }

    #[tokio::test]
    async fn stops_on_permanent_error() {
        let mut throttler = MockRetryThrottler::new();
        throttler.expect_on_retry_failure().once().return_const(());
        let mut retry_policy = MockRetryPolicy::new();
        retry_policy.expect_remaining_time().return_const(None);
        retry_policy
            .expect_on_error()
            .once()
            .returning(|_, _, _, e| RetryResult::Permanent(e));
        let mut backoff_policy = MockBackoffPolicy::new();
        backoff_policy
            .expect_on_failure()
            .once()
            .return_const(Duration::from_millis(1));

        let inner = async |_| Err::<i32, _>(Error::other("fatal"));
        let sleep = async |_| unreachable!("permanent errors do not backoff");
        let response = retry_loop(
            inner,
            sleep,
            false,
            to_retry_throttler(throttler),
            to_retry_policy(retry_policy),
            to_backoff_policy(backoff_policy),
        )
        .await;
        let err = response.unwrap_err();
        assert!(format!("{err}").contains("fatal"), "{err}");
    }

    #[tokio::test]
    async fn throttled_attempts_can_exhaust_policy() {
        let mut throttler = MockRetryThrottler::new();
        throttler
            .expect_throttle_retry_attempt()
            .once()
            .return_const(true);
        throttler.expect_on_retry_failure().once().return_const(());
        let mut retry_policy = MockRetryPolicy::new();
        retry_policy.expect_remaining_time().return_const(None);
        retry_policy
            .expect_on_error()
            .once()
            .returning(|_, _, _, e| RetryResult::Continue(e));
        retry_policy
            .expect_on_throttle()
            .once()
            .returning(|_, _| Some(Error::exhausted("throttled out")));
        let mut backoff_policy = MockBackoffPolicy::new();
        backoff_policy
            .expect_on_failure()
            .once()
            .return_const(Duration::from_millis(1));

        let counter = Mutex::new(0);
        let inner = async |_| {
            *counter.lock().unwrap() += 1;
            Err::<i32, _>(Error::io("try again"))
        };
        let sleep = async |_| ();
        let response = retry_loop(
            inner,
            sleep,
            true,
            to_retry_throttler(throttler),
            to_retry_policy(retry_policy),
            to_backoff_policy(backoff_policy),
        )
        .await;
        let err = response.unwrap_err();
        assert!(err.is_exhausted(), "{err:?}");
        // One attempt, then the retry was throttled.
        assert_eq!(*counter.lock().unwrap(), 1);
    }

    fn to_retry_throttler(mock: MockRetryThrottler) -> SharedRetryThrottler {
        Arc::new(Mutex::new(mock))
    }

    fn to_retry_policy(mock: MockRetryPolicy) -> Arc<dyn RetryPolicy> {
        Arc::new(mock)
    }

    fn to_backoff_policy(mock: MockBackoffPolicy) -> Arc<dyn BackoffPolicy> {
        Arc::new(mock)
    }

    mockall::mock! {
        #[derive(Debug)]
        RetryPolicy {}
        impl RetryPolicy for RetryPolicy {
            fn on_error(&self, loop_start: Instant, attempt_count: u32, idempotent: bool, error: Error) -> RetryResult;
            fn on_throttle(&self, loop_start: Instant, attempt_count: u32) -> Option<Error>;
            fn remaining_time(&self, loop_start: Instant, attempt_count: u32) -> Option<Duration>;
        }
    }

    mockall::mock! {
        #[derive(Debug)]
        BackoffPolicy {}
        impl BackoffPolicy for BackoffPolicy {
            fn on_failure(&self, loop_start: Instant, attempt_count: u32) -> Duration;
        }
    }

    mockall::mock! {
        #[derive(Debug)]
        RetryThrottler {}
        impl RetryThrottler for RetryThrottler {
            fn throttle_retry_attempt(&self) -> bool;
            fn on_retry_failure(&mut self, error: &RetryResult);
            fn on_success(&mut self);
        }
    }
}
