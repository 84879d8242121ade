//! Consent-wall ("Pur Abo") dismissal with exponential backoff.
//!
//! Many German news sites hide their homepage behind a cookie/subscription
//! interstitial. [`ConsentClicker`] clicks the configured consent button,
//! retrying a fixed number of times with exponential backoff and jitter, and
//! [`page_source_after_consent`] wraps that in a browser session that is
//! always closed before returning.
//!
//! # Backoff Strategy
//!
//! ```text
//! delay = min(base_delay * 2^(attempt-1), max_delay) + random_jitter(0..250ms)
//! ```

use crate::browser::{BrowserDriver, BrowserSession};
use crate::config::ConsentSettings;
use crate::error::{AppError, Result};
use rand::{Rng, rng};
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{error, info, instrument, warn};

/// Pause after a successful click so the page can replace the interstitial.
const SETTLE_DELAY: Duration = Duration::from_secs(2);

/// Clicks a consent element with bounded retries.
#[derive(Debug, Clone)]
pub struct ConsentClicker {
    selector: String,
    /// Total click attempts before giving up.
    max_attempts: usize,
    /// Wait for the element on each attempt.
    wait: Duration,
    /// Initial delay between attempts (doubles with each attempt).
    base_delay: Duration,
    /// Cap on the backoff delay.
    max_delay: Duration,
}

impl ConsentClicker {
    pub fn new(selector: impl Into<String>, settings: &ConsentSettings) -> Self {
        Self {
            selector: selector.into(),
            max_attempts: settings.attempts.max(1),
            wait: settings.wait(),
            base_delay: settings.backoff(),
            max_delay: Duration::from_secs(30),
        }
    }

    /// Click the consent element.
    ///
    /// # Errors
    ///
    /// [`AppError::ConsentTimeout`] once every attempt has failed.
    #[instrument(level = "info", skip_all, fields(selector = %self.selector))]
    pub async fn click(&self, session: &mut dyn BrowserSession) -> Result<()> {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            attempt += 1;
            match session.click(&self.selector, self.wait).await {
                Ok(()) => {
                    info!(attempt, "Consent accepted");
                    sleep(SETTLE_DELAY).await;
                    return Ok(());
                }
                Err(e) => {
                    if attempt >= self.max_attempts {
                        error!(
                            attempt,
                            max = self.max_attempts,
                            elapsed_ms_total = total_t0.elapsed().as_millis() as u64,
                            error = %e,
                            "Consent click exhausted retries"
                        );
                        return Err(AppError::ConsentTimeout {
                            selector: self.selector.clone(),
                            attempts: attempt,
                        });
                    }

                    let delay = self.backoff_delay(attempt);
                    warn!(
                        attempt,
                        max = self.max_attempts,
                        ?delay,
                        error = %e,
                        "Consent click failed; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }

    fn backoff_delay(&self, attempt: usize) -> Duration {
        let shift = u32::try_from(attempt.saturating_sub(1)).unwrap_or(u32::MAX).min(16);
        let delay = self.base_delay.saturating_mul(1 << shift).min(self.max_delay);
        let jitter_ms: u64 = rng().random_range(0..=250);
        delay + Duration::from_millis(jitter_ms)
    }
}

/// Open `url`, dismiss its consent wall and return the rendered HTML.
///
/// The session is closed whether or not the click succeeded.
#[instrument(level = "info", skip(driver, settings))]
pub async fn page_source_after_consent(
    driver: &dyn BrowserDriver,
    url: &str,
    selector: &str,
    settings: &ConsentSettings,
) -> Result<String> {
    let mut session = driver.open(url).await?;

    let clicker = ConsentClicker::new(selector, settings);
    let outcome = match clicker.click(session.as_mut()).await {
        Ok(()) => session.page_source().await,
        Err(e) => Err(e),
    };

    if let Err(e) = session.close().await {
        warn!(error = %e, "Failed to close browser session");
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeBrowser;

    fn settings() -> ConsentSettings {
        ConsentSettings {
            attempts: 3,
            wait_secs: 10,
            backoff_ms: 1000,
            ..ConsentSettings::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_successful_click_returns_source_and_closes() {
        let browser = FakeBrowser::new("<a href='/a-b-c'>x</a>", true);
        let html = page_source_after_consent(&browser, "https://www.example.de/", "button", &settings())
            .await
            .unwrap();
        assert!(html.contains("a-b-c"));
        assert_eq!(browser.clicks(), 1);
        assert_eq!(browser.opened(), 1);
        assert_eq!(browser.closed(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeouts_exhaust_attempts_and_close() {
        let browser = FakeBrowser::new("", false);
        let err = page_source_after_consent(&browser, "https://www.example.de/", "button", &settings())
            .await
            .unwrap_err();
        match err {
            AppError::ConsentTimeout { attempts, .. } => assert_eq!(attempts, 3),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(browser.clicks(), 3);
        assert_eq!(browser.closed(), 1);
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let clicker = ConsentClicker::new("button", &settings());
        let first = clicker.backoff_delay(1);
        let second = clicker.backoff_delay(2);
        assert!(first >= Duration::from_millis(1000) && first <= Duration::from_millis(1250));
        assert!(second >= Duration::from_millis(2000) && second <= Duration::from_millis(2250));
        let capped = clicker.backoff_delay(20);
        assert!(capped <= Duration::from_millis(30_250));
    }
}
