//! Exam Gate - remote-gated kiosk session controller
//!
//! Keeps exam content behind a lock that the exam backend controls:
//! - Polls the backend for whether the exam gate is enabled and where the content lives
//! - Persists the lock flag so a restart never silently unlocks
//! - Unlocks on a proctor password accepted by the backend

pub mod api;
pub mod config;
pub mod controller;
pub mod lifecycle;
pub mod state;
pub mod store;

pub use api::{ApiError, GateApi, GateStatus, HttpGateApi};
pub use config::{ConfigError, GateConfig};
pub use controller::{GateController, VerifyOutcome};
pub use lifecycle::{LifecycleAction, LifecycleEvent};
pub use state::{GatePhase, Screen, SessionState};
pub use store::{FileStore, KeyValueStore, MemoryStore, StoreError};
