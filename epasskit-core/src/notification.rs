//! Duplicate suppression for user-facing notifications.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::config::SessionConfig;
use crate::platform::NotificationSink;
use crate::types::{ToastDuration, ToastPosition};

#[derive(Debug, Default)]
struct ThrottleState {
    active: Option<String>,
    generation: u64,
    clear_task: Option<JoinHandle<()>>,
}

fn lock(state: &Mutex<ThrottleState>) -> MutexGuard<'_, ThrottleState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Forwards notifications to a [`NotificationSink`], dropping a message identical to the one
/// shown within the last `window`.
///
/// Every displayed message restarts the window. One throttle is meant to be shared by every
/// session of the process.
#[derive(uniffi::Object)]
pub struct NotificationThrottle {
    sink: Arc<dyn NotificationSink>,
    window: Duration,
    duration: ToastDuration,
    position: ToastPosition,
    state: Arc<Mutex<ThrottleState>>,
}

#[uniffi::export(async_runtime = "tokio")]
impl NotificationThrottle {
    /// Creates a throttle using the window and toast presentation from `config`.
    #[uniffi::constructor]
    #[must_use]
    #[allow(clippy::needless_pass_by_value)]
    pub fn new(sink: Arc<dyn NotificationSink>, config: SessionConfig) -> Self {
        Self {
            sink,
            window: config.notification_window(),
            duration: config.toast_duration,
            position: config.toast_position,
            state: Arc::default(),
        }
    }

    /// Shows `text` unless it is the currently active message.
    ///
    /// The message becomes active before it is handed to the sink, so concurrent calls with
    /// the same text display it once. Returns whether the message was displayed.
    pub async fn notify(&self, text: String) -> bool {
        if !self.claim(&text) {
            log::debug!("suppressed duplicate notification: {text}");
            return false;
        }

        self.sink.display(text, self.duration, self.position).await;
        true
    }

    /// The message currently suppressing duplicates, if any.
    #[must_use]
    pub fn active_message(&self) -> Option<String> {
        lock(&self.state).active.clone()
    }
}

impl NotificationThrottle {
    /// Makes `text` the active message and restarts the window, unless it already is.
    fn claim(&self, text: &str) -> bool {
        let mut state = lock(&self.state);
        if state.active.as_deref() == Some(text) {
            return false;
        }

        state.active = Some(text.to_owned());
        state.generation = state.generation.wrapping_add(1);
        if let Some(task) = state.clear_task.take() {
            task.abort();
        }

        let generation = state.generation;
        let shared = Arc::clone(&self.state);
        let window = self.window;
        state.clear_task = Some(tokio::spawn(async move {
            tokio::time::sleep(window).await;
            let mut state = lock(&shared);
            // a newer message may have raced the abort
            if state.generation == generation {
                state.active = None;
                state.clear_task = None;
            }
        }));
        true
    }
}

impl Drop for NotificationThrottle {
    fn drop(&mut self) {
        if let Some(task) = lock(&self.state).clear_task.take() {
            task.abort();
        }
    }
}
