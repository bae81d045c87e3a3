//! Platform permission flags as seen by the state holders.

use std::fmt;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PermissionId {
    Camera,
    Storage,
}

impl fmt::Display for PermissionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PermissionId::Camera => f.write_str("camera"),
            PermissionId::Storage => f.write_str("storage"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Permissions {
    pub camera: bool,
    pub storage: bool,
}

impl Permissions {
    pub fn is_granted(&self, id: PermissionId) -> bool {
        match id {
            PermissionId::Camera => self.camera,
            PermissionId::Storage => self.storage,
        }
    }

    fn slot(&mut self, id: PermissionId) -> &mut bool {
        match id {
            PermissionId::Camera => &mut self.camera,
            PermissionId::Storage => &mut self.storage,
        }
    }
}

/// Shared permission flags.
///
/// The platform layer writes grants with [`set_granted`](Self::set_granted)
/// and listens for [`request`](Self::request)s; state holders only read.
#[derive(Clone)]
pub struct PermissionHub {
    state: Arc<watch::Sender<Permissions>>,
    requests: broadcast::Sender<PermissionId>,
}

impl PermissionHub {
    pub fn new(initial: Permissions) -> Self {
        let (state, _) = watch::channel(initial);
        let (requests, _) = broadcast::channel(8);
        Self {
            state: Arc::new(state),
            requests,
        }
    }

    pub fn is_granted(&self, id: PermissionId) -> bool {
        self.state.borrow().is_granted(id)
    }

    pub fn set_granted(&self, id: PermissionId, granted: bool) {
        let changed = self.state.send_if_modified(|p| {
            let slot = p.slot(id);
            let changed = *slot != granted;
            *slot = granted;
            changed
        });
        if changed {
            tracing::info!(permission = %id, granted, "permission changed");
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Permissions> {
        self.state.subscribe()
    }

    /// Ask the platform to prompt for `id`.
    pub fn request(&self, id: PermissionId) {
        if self.requests.send(id).is_err() {
            tracing::warn!(permission = %id, "permission requested but no platform listener");
        }
    }

    pub fn subscribe_requests(&self) -> broadcast::Receiver<PermissionId> {
        self.requests.subscribe()
    }
}

impl Default for PermissionHub {
    fn default() -> Self {
        Self::new(Permissions::default())
    }
}
