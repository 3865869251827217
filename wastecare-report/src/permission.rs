//! Location permission and geolocation
//!
//! The monitor mirrors the platform's location permission. Updates are
//! reactive: the platform's change notifications are forwarded to observers as
//! they arrive, with no polling. A platform that cannot be queried yields
//! `Unsupported`, which stays in place until [`PermissionMonitor::reinitialize`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use wastecare_common::events::{EventBus, WasteCareEvent};
use wastecare_common::models::GeoError;
use wastecare_common::GeoPoint;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionState {
    Prompt,
    Granted,
    Denied,
    Unsupported,
}

impl PermissionState {
    pub fn as_str(self) -> &'static str {
        match self {
            PermissionState::Prompt => "prompt",
            PermissionState::Granted => "granted",
            PermissionState::Denied => "denied",
            PermissionState::Unsupported => "unsupported",
        }
    }
}

#[derive(Debug, Clone, Error)]
#[error("permission query failed: {0}")]
pub struct PlatformError(pub String);

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LocationError {
    #[error("location permission denied")]
    PermissionDenied,

    #[error("position unavailable: {0}")]
    Unavailable(String),

    #[error("timed out waiting for a position fix")]
    Timeout,

    #[error("invalid position: {0}")]
    InvalidPosition(#[from] GeoError),
}

/// Host permission API
#[async_trait]
pub trait PermissionPlatform: Send + Sync {
    /// Whether the permission state can be queried at all
    fn supports_query(&self) -> bool;

    async fn query(&self) -> Result<PermissionState, PlatformError>;

    /// Stream of state changes, if the platform publishes them
    fn change_notifications(&self) -> Option<broadcast::Receiver<PermissionState>>;
}

/// Host position API
#[async_trait]
pub trait GeolocationProvider: Send + Sync {
    /// Raw `(latitude, longitude)` fix
    async fn current_position(&self) -> Result<(f64, f64), LocationError>;
}

/// Shared state written by the monitor and its listener task
struct StateCell {
    tx: watch::Sender<PermissionState>,
    event_bus: Option<EventBus>,
}

impl StateCell {
    fn set(&self, state: PermissionState) {
        let changed = self.tx.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        });
        if !changed {
            return;
        }

        tracing::info!(state = state.as_str(), "Location permission changed");
        if let Some(bus) = &self.event_bus {
            bus.emit_lossy(WasteCareEvent::PermissionChanged {
                state: state.as_str().to_string(),
                timestamp: chrono::Utc::now(),
            });
        }
    }

    fn get(&self) -> PermissionState {
        *self.tx.borrow()
    }
}

pub struct PermissionMonitor {
    platform: Arc<dyn PermissionPlatform>,
    cell: Arc<StateCell>,
    listener: Option<JoinHandle<()>>,
}

impl PermissionMonitor {
    pub fn new(platform: Arc<dyn PermissionPlatform>) -> Self {
        Self::build(platform, None)
    }

    /// Also announce changes on `event_bus`
    pub fn with_events(platform: Arc<dyn PermissionPlatform>, event_bus: EventBus) -> Self {
        Self::build(platform, Some(event_bus))
    }

    fn build(platform: Arc<dyn PermissionPlatform>, event_bus: Option<EventBus>) -> Self {
        let (tx, _rx) = watch::channel(initial_state(platform.as_ref()));
        Self {
            platform,
            cell: Arc::new(StateCell { tx, event_bus }),
            listener: None,
        }
    }

    pub fn current(&self) -> PermissionState {
        self.cell.get()
    }

    /// Receiver that observes every subsequent change
    pub fn watch(&self) -> watch::Receiver<PermissionState> {
        self.cell.tx.subscribe()
    }

    /// Run `callback` on each change until the returned handle is cancelled
    /// or dropped
    pub fn on_change<F>(&self, callback: F) -> ChangeSubscription
    where
        F: Fn(PermissionState) + Send + Sync + 'static,
    {
        let mut rx = self.watch();
        let handle = tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let state = *rx.borrow_and_update();
                callback(state);
            }
        });
        ChangeSubscription {
            handle: Some(handle),
        }
    }

    /// Query the initial state and start forwarding platform notifications
    pub async fn start(&mut self) {
        if self.current() == PermissionState::Unsupported {
            tracing::info!("Permission query unsupported; location permission not monitored");
            return;
        }

        match self.platform.query().await {
            Ok(state) => self.cell.set(state),
            Err(e) => tracing::warn!(error = %e, "Initial permission query failed"),
        }

        self.stop();
        if let Some(mut notifications) = self.platform.change_notifications() {
            let cell = Arc::clone(&self.cell);
            self.listener = Some(tokio::spawn(async move {
                loop {
                    match notifications.recv().await {
                        Ok(state) => cell.set(state),
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::debug!(skipped, "Permission notifications lagged");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            }));
        } else {
            tracing::debug!("Platform publishes no permission change notifications");
        }
    }

    /// Query the platform again
    ///
    /// A no-op returning `Unsupported` when the platform cannot be queried.
    pub async fn recheck(&self) -> PermissionState {
        if self.current() == PermissionState::Unsupported {
            return PermissionState::Unsupported;
        }
        match self.platform.query().await {
            Ok(state) => self.cell.set(state),
            Err(e) => tracing::warn!(error = %e, "Permission recheck failed"),
        }
        self.current()
    }

    /// Re-detect platform support and start over
    pub async fn reinitialize(&mut self) {
        self.stop();
        self.cell.set(initial_state(self.platform.as_ref()));
        self.start().await;
    }

    /// Stop forwarding platform notifications
    pub fn stop(&mut self) {
        if let Some(handle) = self.listener.take() {
            handle.abort();
        }
    }

    /// Current position as a validated [`GeoPoint`]
    ///
    /// Refused without calling the provider while permission is denied. A
    /// successful fix implies the permission was granted.
    pub async fn locate(&self, provider: &dyn GeolocationProvider) -> Result<GeoPoint, LocationError> {
        if self.current() == PermissionState::Denied {
            return Err(LocationError::PermissionDenied);
        }

        match provider.current_position().await {
            Ok((latitude, longitude)) => {
                let point = GeoPoint::new(latitude, longitude)?;
                if self.current() == PermissionState::Prompt {
                    self.cell.set(PermissionState::Granted);
                }
                Ok(point)
            }
            Err(LocationError::PermissionDenied) => {
                if self.current() != PermissionState::Unsupported {
                    self.cell.set(PermissionState::Denied);
                }
                Err(LocationError::PermissionDenied)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Could not obtain position");
                Err(e)
            }
        }
    }
}

impl Drop for PermissionMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

fn initial_state(platform: &dyn PermissionPlatform) -> PermissionState {
    if platform.supports_query() {
        PermissionState::Prompt
    } else {
        PermissionState::Unsupported
    }
}

/// Handle for an [`PermissionMonitor::on_change`] callback
#[must_use = "dropping the subscription cancels it"]
pub struct ChangeSubscription {
    handle: Option<JoinHandle<()>>,
}

impl ChangeSubscription {
    pub fn cancel(mut self) {
        self.abort();
    }

    fn abort(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl Drop for ChangeSubscription {
    fn drop(&mut self) {
        self.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    struct FakePlatform {
        supported: AtomicBool,
        state: std::sync::Mutex<PermissionState>,
        changes: broadcast::Sender<PermissionState>,
        queries: AtomicUsize,
    }

    impl FakePlatform {
        fn new(supported: bool, state: PermissionState) -> Arc<Self> {
            let (changes, _) = broadcast::channel(8);
            Arc::new(Self {
                supported: AtomicBool::new(supported),
                state: std::sync::Mutex::new(state),
                changes,
                queries: AtomicUsize::new(0),
            })
        }

        fn change_to(&self, state: PermissionState) {
            *self.state.lock().unwrap() = state;
            let _ = self.changes.send(state);
        }
    }

    #[async_trait]
    impl PermissionPlatform for FakePlatform {
        fn supports_query(&self) -> bool {
            self.supported.load(Ordering::SeqCst)
        }

        async fn query(&self) -> Result<PermissionState, PlatformError> {
            self.queries.fetch_add(1, Ordering::SeqCst);
            Ok(*self.state.lock().unwrap())
        }

        fn change_notifications(&self) -> Option<broadcast::Receiver<PermissionState>> {
            Some(self.changes.subscribe())
        }
    }

    struct FixedPosition(Result<(f64, f64), LocationError>);

    #[async_trait]
    impl GeolocationProvider for FixedPosition {
        async fn current_position(&self) -> Result<(f64, f64), LocationError> {
            self.0.clone()
        }
    }

    async fn next_change(rx: &mut watch::Receiver<PermissionState>) -> PermissionState {
        timeout(Duration::from_secs(1), rx.changed())
            .await
            .expect("no permission change")
            .unwrap();
        *rx.borrow_and_update()
    }

    #[tokio::test]
    async fn test_initial_state_is_prompt_until_queried() {
        let platform = FakePlatform::new(true, PermissionState::Granted);
        let mut monitor = PermissionMonitor::new(platform);
        assert_eq!(monitor.current(), PermissionState::Prompt);

        monitor.start().await;
        assert_eq!(monitor.current(), PermissionState::Granted);
    }

    #[tokio::test]
    async fn test_unsupported_is_terminal_and_recheck_is_noop() {
        let platform = FakePlatform::new(false, PermissionState::Granted);
        let mut monitor = PermissionMonitor::new(platform.clone());
        assert_eq!(monitor.current(), PermissionState::Unsupported);

        monitor.start().await;
        assert_eq!(monitor.recheck().await, PermissionState::Unsupported);
        assert_eq!(platform.queries.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_reinitialize_leaves_unsupported() {
        let platform = FakePlatform::new(false, PermissionState::Denied);
        let mut monitor = PermissionMonitor::new(platform.clone());

        platform.supported.store(true, Ordering::SeqCst);
        assert_eq!(monitor.current(), PermissionState::Unsupported);

        monitor.reinitialize().await;
        assert_eq!(monitor.current(), PermissionState::Denied);
    }

    #[tokio::test]
    async fn test_platform_changes_reach_observers() {
        let platform = FakePlatform::new(true, PermissionState::Prompt);
        let bus = EventBus::new(16);
        let mut events = bus.subscribe();
        let mut monitor = PermissionMonitor::with_events(platform.clone(), bus);
        monitor.start().await;

        let mut rx = monitor.watch();
        platform.change_to(PermissionState::Denied);
        assert_eq!(next_change(&mut rx).await, PermissionState::Denied);

        platform.change_to(PermissionState::Granted);
        assert_eq!(next_change(&mut rx).await, PermissionState::Granted);

        let mut seen = Vec::new();
        while let Ok(event) = events.try_recv() {
            if let WasteCareEvent::PermissionChanged { state, .. } = event {
                seen.push(state);
            }
        }
        assert_eq!(seen, vec!["denied", "granted"]);
    }

    #[tokio::test]
    async fn test_cancelled_subscription_stops_callbacks() {
        let platform = FakePlatform::new(true, PermissionState::Prompt);
        let mut monitor = PermissionMonitor::new(platform.clone());
        monitor.start().await;

        let (tx, mut received) = mpsc::unbounded_channel();
        let subscription = monitor.on_change(move |state| {
            let _ = tx.send(state);
        });
        let mut rx = monitor.watch();

        platform.change_to(PermissionState::Granted);
        let first = timeout(Duration::from_secs(1), received.recv()).await.unwrap();
        assert_eq!(first, Some(PermissionState::Granted));
        next_change(&mut rx).await;

        subscription.cancel();
        platform.change_to(PermissionState::Denied);
        assert_eq!(next_change(&mut rx).await, PermissionState::Denied);

        // Aborted task drops its sender: the channel closes without a value
        let after = timeout(Duration::from_secs(1), received.recv()).await.unwrap();
        assert_eq!(after, None);
    }

    #[tokio::test]
    async fn test_locate_when_denied_does_not_ask_provider() {
        let platform = FakePlatform::new(true, PermissionState::Denied);
        let mut monitor = PermissionMonitor::new(platform);
        monitor.start().await;

        let provider = FixedPosition(Ok((-6.2, 106.8)));
        assert_eq!(
            monitor.locate(&provider).await,
            Err(LocationError::PermissionDenied)
        );
    }

    #[tokio::test]
    async fn test_locate_validates_and_grants() {
        let platform = FakePlatform::new(true, PermissionState::Prompt);
        let monitor = PermissionMonitor::new(platform);

        let point = monitor
            .locate(&FixedPosition(Ok((-6.2, 106.8))))
            .await
            .unwrap();
        assert_eq!(point.latitude(), -6.2);
        assert_eq!(monitor.current(), PermissionState::Granted);

        let invalid = monitor.locate(&FixedPosition(Ok((120.0, 0.0)))).await;
        assert!(matches!(invalid, Err(LocationError::InvalidPosition(_))));
    }

    #[tokio::test]
    async fn test_provider_denial_updates_state() {
        let platform = FakePlatform::new(true, PermissionState::Prompt);
        let monitor = PermissionMonitor::new(platform);

        let result = monitor
            .locate(&FixedPosition(Err(LocationError::PermissionDenied)))
            .await;
        assert_eq!(result, Err(LocationError::PermissionDenied));
        assert_eq!(monitor.current(), PermissionState::Denied);
    }
}
