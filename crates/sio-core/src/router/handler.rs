//! Handler descriptors
//!
//! A handler is an async closure plus the argument shapes it declared at
//! registration. `C` is the context passed on every call; the gateway uses
//! its socket handle.

use crate::args::{decode_args, Arg, ArgShape};
use crate::error::ArgumentDecodeError;
use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;

/// An error value returned by application handler code
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct HandlerError {
    message: String,
}

impl HandlerError {
    /// Create a new handler error
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<String> for HandlerError {
    fn from(message: String) -> Self {
        Self { message }
    }
}

impl From<&str> for HandlerError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

/// What a handler produced: ordered result values and an optional error,
/// kept apart so the error can be reported on its own.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reply {
    /// Result values, in order
    pub values: Vec<Arg>,
    /// Error returned by the handler
    pub error: Option<HandlerError>,
}

impl Reply {
    /// A reply with no values and no error
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Check if the handler produced neither values nor an error
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty() && self.error.is_none()
    }

    /// Arguments for the outgoing ACK: the values, followed by the error
    /// message when the handler failed.
    #[must_use]
    pub fn into_ack_args(self) -> Vec<Arg> {
        let mut args = self.values;
        if let Some(error) = self.error {
            args.push(Arg::String(error.message));
        }
        args
    }
}

impl From<()> for Reply {
    fn from((): ()) -> Self {
        Self::empty()
    }
}

impl From<Arg> for Reply {
    fn from(value: Arg) -> Self {
        Self {
            values: vec![value],
            error: None,
        }
    }
}

impl From<Vec<Arg>> for Reply {
    fn from(values: Vec<Arg>) -> Self {
        Self {
            values,
            error: None,
        }
    }
}

impl From<HandlerError> for Reply {
    fn from(error: HandlerError) -> Self {
        Self {
            values: Vec::new(),
            error: Some(error),
        }
    }
}

impl<T: Into<Reply>> From<Result<T, HandlerError>> for Reply {
    fn from(result: Result<T, HandlerError>) -> Self {
        match result {
            Ok(value) => value.into(),
            Err(error) => error.into(),
        }
    }
}

type HandlerFn<C> = dyn Fn(C, Vec<Arg>) -> BoxFuture<'static, Reply> + Send + Sync;

/// A registered event or ack handler
pub struct Handler<C> {
    shapes: Arc<[ArgShape]>,
    call: Arc<HandlerFn<C>>,
}

impl<C> Clone for Handler<C> {
    fn clone(&self) -> Self {
        Self {
            shapes: Arc::clone(&self.shapes),
            call: Arc::clone(&self.call),
        }
    }
}

impl<C: Send + 'static> Handler<C> {
    /// Wrap an async function with its declared argument shapes
    pub fn new<F, Fut, R>(shapes: &[ArgShape], f: F) -> Self
    where
        F: Fn(C, Vec<Arg>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: Into<Reply> + 'static,
    {
        let call = move |ctx: C, args: Vec<Arg>| -> BoxFuture<'static, Reply> {
            let fut = f(ctx, args);
            async move {
                let reply: Reply = fut.await.into();
                reply
            }
            .boxed()
        };

        Self {
            shapes: shapes.into(),
            call: Arc::new(call),
        }
    }

    /// Declared argument shapes
    pub fn shapes(&self) -> &[ArgShape] {
        &self.shapes
    }

    /// Number of declared parameters
    pub fn arity(&self) -> usize {
        self.shapes.len()
    }

    /// Invoke with already decoded arguments
    pub async fn invoke(&self, ctx: C, args: Vec<Arg>) -> Reply {
        (self.call)(ctx, args).await
    }

    /// Decode `values` against the declared shapes, then invoke.
    ///
    /// On a decode failure the handler is not called.
    pub async fn call(
        &self,
        ctx: C,
        values: &[Value],
        attachments: &[Vec<u8>],
    ) -> Result<Reply, ArgumentDecodeError> {
        let args = decode_args(values, attachments, &self.shapes)?;
        Ok(self.invoke(ctx, args).await)
    }
}

impl<C> std::fmt::Debug for Handler<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handler")
            .field("shapes", &self.shapes)
            .finish()
    }
}

type AnyHandlerFn<C> = dyn Fn(C, String, Vec<Arg>) -> BoxFuture<'static, ()> + Send + Sync;

/// Catch-all observer called with every inbound event's name and arguments
pub struct AnyHandler<C> {
    call: Arc<AnyHandlerFn<C>>,
}

impl<C> Clone for AnyHandler<C> {
    fn clone(&self) -> Self {
        Self {
            call: Arc::clone(&self.call),
        }
    }
}

impl<C: Send + 'static> AnyHandler<C> {
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(C, String, Vec<Arg>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let call = move |ctx: C, event: String, args: Vec<Arg>| -> BoxFuture<'static, ()> {
            f(ctx, event, args).boxed()
        };
        Self {
            call: Arc::new(call),
        }
    }

    pub async fn invoke(&self, ctx: C, event: String, args: Vec<Arg>) {
        (self.call)(ctx, event, args).await;
    }
}

impl<C> std::fmt::Debug for AnyHandler<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AnyHandler")
    }
}
