use async_trait::async_trait;
use chrono::{Local, NaiveDateTime};
use tokio::time::Instant;

/// Represents an entity responsible for providing dates across application. This can allow it to
/// be used for testing
#[async_trait]
pub trait Clock: Sync + Send + 'static {
    /// Local wall-clock time. Timeline entries are stored without a timezone, so this is what
    /// every "now" in the application is compared against.
    fn now(&self) -> NaiveDateTime;

    fn instant(&self) -> Instant;

    async fn sleep_until(&self, instant: Instant);
}

pub struct DefaultClock;

#[async_trait]
impl Clock for DefaultClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }

    fn instant(&self) -> Instant {
        Instant::now()
    }

    async fn sleep_until(&self, instant: Instant) {
        tokio::time::sleep_until(instant).await;
    }
}

/// Clock frozen at a single moment. Sleeping still uses tokio time, so tests can combine it with
/// a paused runtime.
#[derive(Clone, Copy)]
pub struct FixedClock(pub NaiveDateTime);

#[async_trait]
impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }

    fn instant(&self) -> Instant {
        Instant::now()
    }

    async fn sleep_until(&self, instant: Instant) {
        tokio::time::sleep_until(instant).await;
    }
}
