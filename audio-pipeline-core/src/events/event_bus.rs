use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::models::audio_models::FormatDescriptor;
use crate::models::events::{ErrorCause, ErrorEvent, EventKind, SessionEvent};
use crate::traits::session_observer::SessionObserver;

/// Handler invoked for every event of the kind it subscribed to.
pub type EventHandler = Arc<dyn Fn(&SessionEvent) + Send + Sync + 'static>;

/// Token returned by `subscribe`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

/// Typed publish/subscribe channel owned by a capture session.
///
/// Handlers run synchronously on the publishing task, outside the bus lock,
/// so they may call back into the session. After `close` the bus drops every
/// handler and ignores further publishes.
pub struct EventBus {
    inner: Mutex<BusState>,
}

#[derive(Default)]
struct BusState {
    next_id: u64,
    handlers: HashMap<EventKind, Vec<(SubscriptionId, EventHandler)>>,
    format: Option<FormatDescriptor>,
    closed: bool,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(BusState::default()),
        }
    }

    pub fn subscribe<F>(&self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: Fn(&SessionEvent) + Send + Sync + 'static,
    {
        let mut state = self.inner.lock();
        state.next_id += 1;
        let id = SubscriptionId(state.next_id);
        if state.closed {
            log::debug!("Subscription to {:?} on a closed bus will never fire", kind);
            return id;
        }
        state
            .handlers
            .entry(kind)
            .or_default()
            .push((id, Arc::new(handler)));
        id
    }

    /// Returns `false` when no such subscription exists.
    pub fn unsubscribe(&self, kind: EventKind, id: SubscriptionId) -> bool {
        let mut state = self.inner.lock();
        let Some(handlers) = state.handlers.get_mut(&kind) else {
            return false;
        };
        let before = handlers.len();
        handlers.retain(|(existing, _)| *existing != id);
        handlers.len() != before
    }

    /// Route every event kind to `observer`.
    pub fn add_observer(&self, observer: Arc<dyn SessionObserver>) -> Vec<SubscriptionId> {
        let kinds = [EventKind::Format, EventKind::Data, EventKind::Error, EventKind::Close];
        kinds
            .into_iter()
            .map(|kind| {
                let observer = Arc::clone(&observer);
                self.subscribe(kind, move |event| match event {
                    SessionEvent::Format(format) => observer.on_format(format),
                    SessionEvent::Data(block) => observer.on_data(block),
                    SessionEvent::Error(error) => observer.on_error(error),
                    SessionEvent::Close => observer.on_close(),
                })
            })
            .collect()
    }

    #[cfg(test)]
    pub(crate) fn subscriber_count(&self, kind: EventKind) -> usize {
        self.inner
            .lock()
            .handlers
            .get(&kind)
            .map_or(0, |handlers| handlers.len())
    }

    /// The format published on this bus, if it has been published yet.
    pub fn format(&self) -> Option<FormatDescriptor> {
        self.inner.lock().format
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    /// Publish the format unless one was already published. `describe` is
    /// evaluated at delivery time.
    pub(crate) fn publish_format_once(&self, describe: impl FnOnce() -> FormatDescriptor) -> bool {
        let (format, handlers) = {
            let mut state = self.inner.lock();
            if state.closed || state.format.is_some() {
                return false;
            }
            let format = describe();
            state.format = Some(format);
            (format, Self::handlers_for(&state, EventKind::Format))
        };
        Self::dispatch(&handlers, &SessionEvent::Format(format));
        true
    }

    pub(crate) fn publish(&self, event: SessionEvent) -> usize {
        debug_assert!(
            !matches!(event, SessionEvent::Format(_) | SessionEvent::Close),
            "format and close have dedicated publishers"
        );
        let handlers = {
            let state = self.inner.lock();
            if state.closed {
                return 0;
            }
            Self::handlers_for(&state, event.kind())
        };
        Self::dispatch(&handlers, &event);
        handlers.len()
    }

    pub(crate) fn publish_error(&self, message: impl Into<String>, cause: impl Into<ErrorCause>) {
        self.publish(SessionEvent::Error(ErrorEvent {
            message: message.into(),
            cause: cause.into(),
        }));
    }

    /// Publish `close` and shut the bus. Only the first call has any effect.
    pub(crate) fn close(&self) -> bool {
        let handlers = {
            let mut state = self.inner.lock();
            if state.closed {
                return false;
            }
            state.closed = true;
            let handlers = Self::handlers_for(&state, EventKind::Close);
            state.handlers.clear();
            handlers
        };
        Self::dispatch(&handlers, &SessionEvent::Close);
        true
    }

    fn handlers_for(state: &BusState, kind: EventKind) -> Vec<EventHandler> {
        state
            .handlers
            .get(&kind)
            .map(|handlers| handlers.iter().map(|(_, h)| Arc::clone(h)).collect())
            .unwrap_or_default()
    }

    fn dispatch(handlers: &[EventHandler], event: &SessionEvent) {
        for handler in handlers {
            handler(event);
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
