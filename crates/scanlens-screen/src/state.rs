//! Observable state containers and the screen UI state machine.

use crate::permission::PermissionId;
use tokio::sync::watch;

/// What the screen should currently show on top of its content.
///
/// `Success` and `Error` are one-shot: the UI shows them and then calls
/// `reset_ui_state` to return to `Idle`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum UiState {
    #[default]
    Idle,
    Loading,
    Success(String),
    Error(String),
    /// An operation needs a permission that is not granted; the UI should request it.
    PermissionAction(PermissionId),
}

impl UiState {
    pub fn error(message: impl Into<String>) -> Self {
        UiState::Error(message.into())
    }

    pub fn success(message: impl Into<String>) -> Self {
        UiState::Success(message.into())
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, UiState::Idle)
    }
}

/// A current value plus change notification for any number of subscribers.
///
/// Values are stored even while nobody is subscribed.
#[derive(Debug)]
pub struct Observable<T> {
    tx: watch::Sender<T>,
}

impl<T> Observable<T> {
    pub fn new(value: T) -> Self {
        let (tx, _) = watch::channel(value);
        Self { tx }
    }

    /// Snapshot of the current value.
    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.tx.borrow().clone()
    }

    /// Receiver that wakes on every published change.
    pub fn subscribe(&self) -> watch::Receiver<T> {
        self.tx.subscribe()
    }

    /// Publish `value`, returning the previous one.
    pub fn set(&self, value: T) -> T {
        self.tx.send_replace(value)
    }

    /// Modify in place. Subscribers are notified only when `f` returns true.
    pub fn update(&self, f: impl FnOnce(&mut T) -> bool) -> bool {
        self.tx.send_if_modified(f)
    }
}

impl<T: Default> Default for Observable<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_without_subscribers_is_kept() {
        let state = Observable::new(UiState::Idle);
        state.set(UiState::Loading);
        assert_eq!(state.get(), UiState::Loading);
    }

    #[test]
    fn test_fan_out_to_every_subscriber() {
        let state = Observable::new(0u32);
        let mut a = state.subscribe();
        let mut b = state.subscribe();
        state.set(7);
        assert!(a.has_changed().unwrap());
        assert!(b.has_changed().unwrap());
        assert_eq!(*a.borrow_and_update(), 7);
        assert_eq!(*b.borrow_and_update(), 7);
    }

    #[test]
    fn test_update_notifies_only_on_change() {
        let state = Observable::new(vec![1]);
        let mut rx = state.subscribe();
        assert!(!state.update(|_| false));
        assert!(!rx.has_changed().unwrap());

        assert!(state.update(|v| {
            v.push(2);
            true
        }));
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), vec![1, 2]);
    }

    #[test]
    fn test_ui_state_helpers() {
        assert!(UiState::default().is_idle());
        assert_eq!(UiState::error("boom"), UiState::Error("boom".into()));
        assert_eq!(UiState::success("ok"), UiState::Success("ok".into()));
    }
}
