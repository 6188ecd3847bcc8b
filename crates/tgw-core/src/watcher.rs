//! Polling loop: gate on listeners, fetch, notify, sleep.

use std::{sync::Arc, time::Duration};

use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    notifier::{DispatchReport, Notifier},
    ports::SnapshotSource,
    snapshot::Snapshot,
    store::ConfigStore,
    Result,
};

pub const POLLING_INTERVAL_KEY: &str = "api.pollingIntervalInMs";
pub const DEFAULT_POLLING_INTERVAL: Duration = Duration::from_secs(30);
const MIN_POLLING_INTERVAL: Duration = Duration::from_secs(1);

pub struct Watcher {
    source: Arc<dyn SnapshotSource>,
    notifier: Arc<Notifier>,
    store: Arc<ConfigStore>,
    interval_override: Option<Duration>,
}

impl Watcher {
    pub fn new(
        source: Arc<dyn SnapshotSource>,
        notifier: Arc<Notifier>,
        store: Arc<ConfigStore>,
    ) -> Self {
        Self {
            source,
            notifier,
            store,
            interval_override: None,
        }
    }

    pub fn with_interval_override(mut self, interval: Option<Duration>) -> Self {
        self.interval_override = interval;
        self
    }

    /// Env override, else the stored interval, else 30s. Never below 1s.
    pub fn polling_interval(&self) -> Duration {
        self.interval_override
            .or_else(|| {
                self.store
                    .get_as::<u64>(POLLING_INTERVAL_KEY)
                    .ok()
                    .map(Duration::from_millis)
            })
            .unwrap_or(DEFAULT_POLLING_INTERVAL)
            .max(MIN_POLLING_INTERVAL)
    }

    /// One cycle. `Ok(None)` means nobody is listening, so nothing was fetched.
    pub async fn tick(&self) -> Result<Option<DispatchReport>> {
        if !self.notifier.has_listeners()? {
            return Ok(None);
        }

        let records = self.source.fetch_favorites().await?;
        let snapshot: Snapshot = records.into_iter().collect();
        let report = self.notifier.notify_if_changed(snapshot).await?;
        Ok(Some(report))
    }

    /// Poll until `cancel` fires. Cycle errors are logged, never fatal.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut subscribers = self.notifier.watch_subscribers();
        info!(interval = ?self.polling_interval(), "watcher started");

        loop {
            match self.tick().await {
                Ok(Some(report)) => debug!(
                    changed = report.changed,
                    chat_sent = report.chat_messages_sent,
                    "cycle finished"
                ),
                Ok(None) => debug!("no listeners, skipping fetch"),
                Err(e) => warn!(error = %e, "cycle aborted"),
            }
            // Flips caused by the cycle itself (an unreachable chat dropped) must
            // not cut the sleep short.
            subscribers.borrow_and_update();

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = sleep(self.polling_interval()) => {}
                Ok(()) = subscribers.changed() => {
                    debug!(active = *subscribers.borrow_and_update(), "subscriber signal changed");
                }
            }
        }

        info!("watcher stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::ChatId,
        errors::Error,
        messaging::{port::MessagingPort, types::TextFormat},
        ports::ConsoleSink,
        registry::SubscriberRegistry,
        snapshot::StoreAvailability,
        store::builtin_defaults,
    };
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Silent;

    impl ConsoleSink for Silent {
        fn clear(&self) {}
        fn print(&self, _text: &str) {}
    }

    struct FakeSource {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl SnapshotSource for FakeSource {
        async fn fetch_favorites(&self) -> Result<Vec<StoreAvailability>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(Error::External("upstream down".into()));
            }
            Ok(vec![StoreAvailability::new("1", "Bakery", 2)])
        }
    }

    /// Accepts every send, or rejects every chat as unreachable.
    struct Chats {
        blocked: bool,
    }

    #[async_trait]
    impl MessagingPort for Chats {
        async fn send_message(
            &self,
            _chat_id: ChatId,
            _text: &str,
            _format: TextFormat,
        ) -> Result<()> {
            if self.blocked {
                return Err(Error::permanent_delivery("bot was blocked by the user"));
            }
            Ok(())
        }
    }

    fn chat_watcher(blocked: bool) -> (Arc<SubscriberRegistry>, Arc<FakeSource>, Watcher) {
        let store = Arc::new(ConfigStore::in_memory(builtin_defaults()));
        store.set("notifications.telegram.enabled", true).unwrap();
        let registry = Arc::new(SubscriberRegistry::load(store.clone()).unwrap());
        let notifier = Notifier::new(store.clone(), registry.clone(), Arc::new(Silent))
            .with_messenger(Arc::new(Chats { blocked }));
        let source = Arc::new(FakeSource {
            calls: AtomicUsize::new(0),
            fail: false,
        });
        let w = Watcher::new(source.clone(), Arc::new(notifier), store);
        (registry, source, w)
    }

    fn watcher(fail: bool) -> (Arc<ConfigStore>, Arc<FakeSource>, Watcher) {
        let store = Arc::new(ConfigStore::in_memory(builtin_defaults()));
        let registry = Arc::new(SubscriberRegistry::load(store.clone()).unwrap());
        let notifier = Arc::new(Notifier::new(store.clone(), registry, Arc::new(Silent)));
        let source = Arc::new(FakeSource {
            calls: AtomicUsize::new(0),
            fail,
        });
        let w = Watcher::new(source.clone(), notifier, store.clone());
        (store, source, w)
    }

    #[tokio::test]
    async fn skips_fetch_without_listeners() {
        let (store, source, w) = watcher(false);
        store.set("notifications.console.enabled", false).unwrap();

        assert!(w.tick().await.unwrap().is_none());
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn fetches_and_notifies_with_listeners() {
        let (_store, source, w) = watcher(false);
        let report = w.tick().await.unwrap().unwrap();
        assert_eq!(report.changed, 1);
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn fetch_errors_surface_from_tick() {
        let (_store, _source, w) = watcher(true);
        assert!(matches!(w.tick().await, Err(Error::External(_))));
    }

    #[test]
    fn interval_prefers_override_then_store() {
        let (store, _source, w) = watcher(false);
        assert_eq!(w.polling_interval(), Duration::from_secs(30));

        store.set(POLLING_INTERVAL_KEY, 5_000).unwrap();
        assert_eq!(w.polling_interval(), Duration::from_secs(5));

        store.set(POLLING_INTERVAL_KEY, 10).unwrap();
        assert_eq!(w.polling_interval(), MIN_POLLING_INTERVAL);

        let w = w.with_interval_override(Some(Duration::from_secs(90)));
        assert_eq!(w.polling_interval(), Duration::from_secs(90));
    }

    #[tokio::test]
    async fn run_stops_on_cancel() {
        let (_store, source, w) = watcher(false);
        let cancel = CancellationToken::new();
        cancel.cancel();
        w.run(cancel).await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cycle_that_drops_a_chat_waits_for_the_next_interval() {
        let (registry, source, w) = chat_watcher(true);
        registry.subscribe(ChatId(5), None, None).await.unwrap();

        tokio::select! {
            _ = w.run(CancellationToken::new()) => panic!("watcher stopped on its own"),
            _ = sleep(Duration::from_secs(10)) => {}
        }
        assert_eq!(registry.active_count().await, 0);
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn new_subscriber_wakes_the_watcher_early() {
        let (registry, source, w) = chat_watcher(false);
        w.store.set("notifications.console.enabled", false).unwrap();

        tokio::select! {
            _ = w.run(CancellationToken::new()) => panic!("watcher stopped on its own"),
            _ = async {
                sleep(Duration::from_secs(1)).await;
                registry.subscribe(ChatId(5), None, None).await.unwrap();
                sleep(Duration::from_secs(5)).await;
            } => {}
        }
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }
}
