//! Host lifecycle events and how they drive the gate

use serde::{Deserialize, Serialize};

use crate::controller::GateController;
use crate::state::GatePhase;

/// Lifecycle notifications a kiosk host forwards to the gate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleEvent {
    Started,
    Resumed,
    Paused,
    FocusLost,
    FocusGained,
    MultiWindowEntered,
    MultiWindowExited,
}

/// What the gate did in response to an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleAction {
    Initialized(GatePhase),
    Refreshed(GatePhase),
    Locked,
    Ignored,
}

impl GateController {
    pub async fn handle_lifecycle(&self, event: LifecycleEvent) -> LifecycleAction {
        tracing::debug!("Lifecycle event: {:?}", event);

        match event {
            LifecycleEvent::Started => {
                self.initialize();
                LifecycleAction::Initialized(self.refresh_status().await)
            }
            // Leaving the foreground or sharing the screen may hide a switch
            // to another app, so ask the backend again.
            LifecycleEvent::Resumed
            | LifecycleEvent::FocusLost
            | LifecycleEvent::MultiWindowEntered => {
                LifecycleAction::Refreshed(self.refresh_status().await)
            }
            LifecycleEvent::Paused => {
                self.lock();
                LifecycleAction::Locked
            }
            LifecycleEvent::FocusGained | LifecycleEvent::MultiWindowExited => {
                LifecycleAction::Ignored
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::tests::ScriptedApi;
    use crate::store::{KeyValueStore, MemoryStore, LOCKED_KEY};
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_started_initializes_then_refreshes() {
        let store = Arc::new(MemoryStore::with_bool(LOCKED_KEY, true));
        let api = Arc::new(ScriptedApi::default().status(false, Some("exam.local")));
        let controller = GateController::new(store.clone(), api.clone());

        let action = controller.handle_lifecycle(LifecycleEvent::Started).await;

        assert_eq!(action, LifecycleAction::Initialized(GatePhase::Unlocked));
        assert_eq!(store.get_bool(LOCKED_KEY).unwrap(), Some(false));
        assert_eq!(api.status_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_paused_locks_without_remote_call() {
        let store = Arc::new(MemoryStore::new());
        let api = Arc::new(ScriptedApi::default());
        let controller = GateController::new(store.clone(), api.clone());
        controller.initialize();

        let action = controller.handle_lifecycle(LifecycleEvent::Paused).await;

        assert_eq!(action, LifecycleAction::Locked);
        assert!(controller.state().locked);
        assert_eq!(store.get_bool(LOCKED_KEY).unwrap(), Some(true));
        assert_eq!(api.status_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_resume_after_pause_asks_backend() {
        let api = Arc::new(
            ScriptedApi::default()
                .status(false, None)
                .status(true, None)
                .status(false, None),
        );
        let controller = GateController::new(Arc::new(MemoryStore::new()), api.clone());
        controller.handle_lifecycle(LifecycleEvent::Started).await;

        controller.handle_lifecycle(LifecycleEvent::Paused).await;
        assert!(controller.state().locked);

        for event in [LifecycleEvent::Resumed, LifecycleEvent::FocusLost] {
            assert!(matches!(
                controller.handle_lifecycle(event).await,
                LifecycleAction::Refreshed(_)
            ));
        }
        assert!(!controller.state().locked);
        assert_eq!(api.status_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_multi_window_entry_refreshes() {
        let api = Arc::new(ScriptedApi::default().status(true, None));
        let controller = GateController::new(Arc::new(MemoryStore::new()), api.clone());
        controller.initialize();

        assert_eq!(
            controller.handle_lifecycle(LifecycleEvent::MultiWindowExited).await,
            LifecycleAction::Ignored
        );
        assert_eq!(
            controller.handle_lifecycle(LifecycleEvent::FocusGained).await,
            LifecycleAction::Ignored
        );
        assert_eq!(
            controller.handle_lifecycle(LifecycleEvent::MultiWindowEntered).await,
            LifecycleAction::Refreshed(GatePhase::Locked)
        );
        assert_eq!(api.status_calls.load(Ordering::SeqCst), 1);
    }
}
