//! Session state observed by the presentation layer

use serde::{Deserialize, Serialize};

/// Conceptual gate phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GatePhase {
    /// No remote call has settled the gate yet
    Unknown,
    Locked,
    Unlocked,
}

/// The single screen a host should show for a given state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Screen {
    Loading,
    /// Status call failed, offer a retry
    ApiFailed,
    /// Content failed to load, offer a reload
    ContentFailed,
    /// Password prompt
    Login,
    Content,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    pub locked: bool,
    pub loading: bool,
    pub api_loading: bool,
    pub api_failed: bool,
    pub content_failed: bool,
    pub target_url: Option<String>,
    /// Set once a status fetch succeeds or a verification completes
    pub resolved: bool,
}

impl SessionState {
    pub fn new(locked: bool) -> Self {
        Self {
            locked,
            loading: true,
            api_loading: false,
            api_failed: false,
            content_failed: false,
            target_url: None,
            resolved: false,
        }
    }

    pub fn phase(&self) -> GatePhase {
        match (self.resolved, self.locked) {
            (false, _) => GatePhase::Unknown,
            (true, true) => GatePhase::Locked,
            (true, false) => GatePhase::Unlocked,
        }
    }

    pub fn screen(&self) -> Screen {
        if self.api_loading {
            Screen::Loading
        } else if self.api_failed {
            Screen::ApiFailed
        } else if self.content_failed {
            Screen::ContentFailed
        } else if self.locked {
            Screen::Login
        } else {
            Screen::Content
        }
    }

    /// Loadable URL for the target, defaulting to plain HTTP when the
    /// backend only sent a host
    pub fn content_url(&self) -> Option<String> {
        let target = self.target_url.as_deref()?.trim();
        if target.is_empty() {
            return None;
        }
        if target.contains("://") {
            Some(target.to_string())
        } else {
            Some(format!("http://{}", target))
        }
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_defaults() {
        let state = SessionState::new(true);
        assert!(state.locked);
        assert!(state.loading);
        assert!(!state.api_loading);
        assert!(!state.api_failed);
        assert!(!state.content_failed);
        assert_eq!(state.target_url, None);
        assert_eq!(state.phase(), GatePhase::Unknown);
    }

    #[test]
    fn test_screen_priority() {
        let mut state = SessionState {
            locked: true,
            api_loading: true,
            api_failed: true,
            content_failed: true,
            ..SessionState::default()
        };
        assert_eq!(state.screen(), Screen::Loading);

        state.api_loading = false;
        assert_eq!(state.screen(), Screen::ApiFailed);

        state.api_failed = false;
        assert_eq!(state.screen(), Screen::ContentFailed);

        state.content_failed = false;
        assert_eq!(state.screen(), Screen::Login);

        state.locked = false;
        assert_eq!(state.screen(), Screen::Content);
    }

    #[test]
    fn test_content_url() {
        let mut state = SessionState::default();
        assert_eq!(state.content_url(), None);

        state.target_url = Some("10.0.0.5/exam".to_string());
        assert_eq!(state.content_url().as_deref(), Some("http://10.0.0.5/exam"));

        state.target_url = Some("https://exam.example.org".to_string());
        assert_eq!(state.content_url().as_deref(), Some("https://exam.example.org"));

        state.target_url = Some("  ".to_string());
        assert_eq!(state.content_url(), None);
    }

    #[test]
    fn test_phase_follows_lock_once_resolved() {
        let mut state = SessionState::new(false);
        state.resolved = true;
        assert_eq!(state.phase(), GatePhase::Unlocked);
        state.locked = true;
        assert_eq!(state.phase(), GatePhase::Locked);
    }
}
