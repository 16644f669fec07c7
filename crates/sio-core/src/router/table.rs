//! Event router
//!
//! Maps event names to handlers. A router is cheap to clone: handlers are
//! reference counted, so a per-session copy of a shared template costs one
//! map clone and later registrations on either side stay independent.

use super::handler::{AnyHandler, Handler, Reply};
use crate::args::Arg;
use crate::error::ArgumentDecodeError;
use crate::packet::EventMessage;
use std::collections::HashMap;

/// Result of dispatching a message
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    /// A handler ran and produced this reply
    Handled(Reply),
    /// No handler is registered for the event name
    Unrouted,
}

impl Dispatch {
    /// Check if a handler ran
    pub fn is_handled(&self) -> bool {
        matches!(self, Self::Handled(_))
    }

    /// The reply, if a handler ran
    pub fn into_reply(self) -> Option<Reply> {
        match self {
            Self::Handled(reply) => Some(reply),
            Self::Unrouted => None,
        }
    }
}

/// Handlers resolved for one event name, detached from the router so the
/// caller can release any lock before running application code.
#[derive(Debug)]
pub struct Route<C> {
    handler: Option<Handler<C>>,
    any: Option<AnyHandler<C>>,
}

impl<C: Clone + Send + 'static> Route<C> {
    /// Check if a named handler was found
    pub fn is_routable(&self) -> bool {
        self.handler.is_some()
    }

    /// Dispatch `message` through this route.
    ///
    /// The catch-all handler observes every EVENT packet before the named
    /// handler runs. When no named handler exists the message, including
    /// its attachments, is dropped and `Dispatch::Unrouted` is returned.
    pub async fn dispatch(
        self,
        ctx: C,
        message: EventMessage,
    ) -> Result<Dispatch, ArgumentDecodeError> {
        if message.is_event() {
            if let Some(any) = &self.any {
                any.invoke(ctx.clone(), message.name().to_string(), message.decode_all())
                    .await;
            }
        }

        let Some(handler) = self.handler else {
            drop(message);
            return Ok(Dispatch::Unrouted);
        };

        let args = message.decode_args(handler.shapes())?;
        drop(message);

        Ok(Dispatch::Handled(handler.invoke(ctx, args).await))
    }
}

/// Event name to handler table
#[derive(Debug)]
pub struct EventRouter<C> {
    handlers: HashMap<String, Handler<C>>,
    any: Option<AnyHandler<C>>,
}

impl<C> Clone for EventRouter<C> {
    fn clone(&self) -> Self {
        Self {
            handlers: self.handlers.clone(),
            any: self.any.clone(),
        }
    }
}

impl<C> Default for EventRouter<C> {
    fn default() -> Self {
        Self {
            handlers: HashMap::new(),
            any: None,
        }
    }
}

impl<C: Clone + Send + 'static> EventRouter<C> {
    /// Create an empty router
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `event`, returning the handler it replaced
    pub fn register(
        &mut self,
        event: impl Into<String>,
        handler: Handler<C>,
    ) -> Option<Handler<C>> {
        self.handlers.insert(event.into(), handler)
    }

    /// Register the catch-all handler, replacing any previous one
    pub fn register_any(&mut self, handler: AnyHandler<C>) {
        self.any = Some(handler);
    }

    /// Remove the handler for `event`
    pub fn unregister(&mut self, event: &str) -> Option<Handler<C>> {
        self.handlers.remove(event)
    }

    /// Check if `event` has a handler
    pub fn contains(&self, event: &str) -> bool {
        self.handlers.contains_key(event)
    }

    /// Number of named handlers
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Check if no named handlers are registered
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Registered event names
    pub fn event_names(&self) -> Vec<String> {
        self.handlers.keys().cloned().collect()
    }

    /// Independent copy of this router; later registrations on either side
    /// do not affect the other.
    pub fn snapshot(&self) -> Self {
        self.clone()
    }

    /// Resolve the handlers for `event`
    pub fn route(&self, event: &str) -> Route<C> {
        Route {
            handler: self.handlers.get(event).cloned(),
            any: self.any.clone(),
        }
    }

    /// Resolve and dispatch in one step
    pub async fn dispatch(
        &self,
        ctx: C,
        message: EventMessage,
    ) -> Result<Dispatch, ArgumentDecodeError> {
        self.route(message.name()).dispatch(ctx, message).await
    }

    /// Invoke the handler for `event` with already decoded arguments
    pub async fn emit_local(&self, ctx: C, event: &str, args: Vec<Arg>) -> Dispatch {
        match self.handlers.get(event) {
            Some(handler) => Dispatch::Handled(handler.invoke(ctx, args).await),
            None => Dispatch::Unrouted,
        }
    }
}
