use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard};

use tokio_util::sync::CancellationToken;

/// Shared teardown switch for everything that calls back into the caller.
///
/// Work that must not outlive the feed runs inside [`Gate::enter`]. Closing
/// waits for those sections to finish, so once [`Gate::close`] returns no
/// callback, notification or refresh is running or will start.
#[derive(Clone, Default)]
pub struct Gate {
    sections: Arc<RwLock<()>>,
    token: CancellationToken,
}

impl Gate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Closes the gate and blocks until in-flight sections have left.
    ///
    /// Must not be called from inside a section (for example from an event
    /// callback), which would wait on itself.
    pub fn close(&self) {
        self.token.cancel();
        drop(self.sections.write().unwrap_or_else(PoisonError::into_inner));
    }

    pub fn is_closed(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Enters a section, or `None` once closed. Keep the guard for as long as
    /// the section calls out; check [`Gate::is_closed`] between calls.
    pub fn enter(&self) -> Option<RwLockReadGuard<'_, ()>> {
        let guard = self.sections.read().unwrap_or_else(PoisonError::into_inner);
        if self.is_closed() {
            None
        } else {
            Some(guard)
        }
    }

    /// Resolves once the gate is closed.
    pub async fn closed(&self) {
        self.token.cancelled().await
    }
}
