//! Listener lifetime for one registration cycle

use crate::element::Listener;
use crate::engine::{EngineError, ErrorListener};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

type Detach = Box<dyn FnOnce() + Send + Sync>;

/// Every listener a backend attaches during one `register_listeners` call.
///
/// Listeners are wrapped with [`guard`](Self::guard) so they stop running the
/// moment the scope's token is cancelled, even if the element or engine still
/// holds them and fires late. Dropping the scope cancels the token and runs
/// each recorded detach action exactly once.
pub(crate) struct ListenerScope {
    token: CancellationToken,
    detach: Vec<Detach>,
}

impl ListenerScope {
    pub(crate) fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            detach: Vec::new(),
        }
    }

    pub(crate) fn guard<F>(&self, listener: F) -> Listener
    where
        F: Fn() + Send + Sync + 'static,
    {
        let token = self.token.clone();
        Arc::new(move || {
            if !token.is_cancelled() {
                listener();
            }
        })
    }

    pub(crate) fn guard_error<F>(&self, listener: F) -> ErrorListener
    where
        F: Fn(&EngineError) + Send + Sync + 'static,
    {
        let token = self.token.clone();
        Arc::new(move |error: &EngineError| {
            if !token.is_cancelled() {
                listener(error);
            }
        })
    }

    /// Record how to detach a listener that was just attached
    pub(crate) fn on_release<F>(&mut self, detach: F)
    where
        F: FnOnce() + Send + Sync + 'static,
    {
        self.detach.push(Box::new(detach));
    }

    pub(crate) fn len(&self) -> usize {
        self.detach.len()
    }

    pub(crate) fn release(self) {
        drop(self);
    }
}

impl Drop for ListenerScope {
    fn drop(&mut self) {
        self.token.cancel();
        for detach in self.detach.drain(..) {
            detach();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_guarded_listener_stops_after_release() {
        let calls = Arc::new(AtomicUsize::new(0));
        let scope = ListenerScope::new();

        let counter = calls.clone();
        let listener = scope.guard(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        listener();
        scope.release();
        listener();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_release_runs_each_detach_once() {
        let detached = Arc::new(AtomicUsize::new(0));
        let mut scope = ListenerScope::new();
        for _ in 0..8 {
            let detached = detached.clone();
            scope.on_release(move || {
                detached.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(scope.len(), 8);

        scope.release();
        assert_eq!(detached.load(Ordering::SeqCst), 8);
    }

    #[test]
    fn test_guarded_error_listener() {
        let calls = Arc::new(AtomicUsize::new(0));
        let scope = ListenerScope::new();
        let counter = calls.clone();
        let listener = scope.guard_error(move |error| {
            assert_eq!(error.details, "manifestError");
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let error = EngineError::new("networkError", "manifestError", true);
        listener(&error);
        drop(scope);
        listener(&error);

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
