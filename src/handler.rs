//! Handler trait, response writer, and type erasure.
//!
//! # How handlers are stored
//!
//! The pipeline and the router both hold handlers of *different* concrete
//! types behind one interface, so every handler is erased to
//! `Arc<dyn Handler>` once at startup. Per request the cost is one `Arc`
//! clone and one virtual call.
//!
//! ```text
//! fn home(req: Request, w: &mut dyn ResponseWriter) { … }   ← user writes this
//!        ↓ handler::from_fn(home)
//! Arc::new(FnHandler(home))                                 ← BoxedHandler
//!        ↓
//! handler.serve(req, w)  at request time                    ← one vtable dispatch
//! ```
//!
//! # Why a writer instead of a returned response
//!
//! Middleware in this crate observes what downstream code *writes*: the
//! status recorder intercepts the first status and forwards body bytes
//! untouched. Handing every stage the same `&mut dyn ResponseWriter` keeps the
//! body streaming through without any stage holding a copy of it.

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::Arc;

use http::{HeaderMap, StatusCode};

use crate::request::Request;

/// A heap-allocated, type-erased future borrowed for `'a`.
///
/// `Send` lets tokio move the future between worker threads.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The write side of one HTTP response.
///
/// Body bytes go through [`io::Write`]. The status line follows the usual
/// response-writer rules:
///
/// - the first [`write_status`](ResponseWriter::write_status) wins, later calls
///   are ignored;
/// - writing body bytes before any status commits `200 OK`.
pub trait ResponseWriter: io::Write + Send {
    /// Headers that will be sent with the response. Changes after the status
    /// has been committed have no effect.
    fn headers_mut(&mut self) -> &mut HeaderMap;

    /// Commits the response status.
    fn write_status(&mut self, status: StatusCode);
}

/// Something that can serve a request.
///
/// Terminal handlers write a response; the pipeline itself is also a
/// `Handler`, which is what the server drives.
pub trait Handler: Send + Sync + 'static {
    fn serve<'a>(&'a self, req: Request, w: &'a mut dyn ResponseWriter) -> BoxFuture<'a, ()>;
}

/// A handler shared across concurrent requests.
pub type BoxedHandler = Arc<dyn Handler>;

/// Adapts a synchronous closure into a [`Handler`].
///
/// Most terminal handlers render a small body and never await anything, so
/// this is the usual way to register one:
///
/// ```rust
/// use matchbox_http::handler::{self, ResponseWriter};
/// use matchbox_http::Request;
///
/// let ipxe = handler::from_fn(|_req: Request, w: &mut dyn ResponseWriter| {
///     let _ = w.write_all(b"#!ipxe\nchain ipxe?uuid=${uuid}\n");
/// });
/// ```
pub fn from_fn<F>(f: F) -> BoxedHandler
where
    F: Fn(Request, &mut dyn ResponseWriter) + Send + Sync + 'static,
{
    Arc::new(FnHandler(f))
}

/// Newtype bridging a closure to the [`Handler`] trait object.
struct FnHandler<F>(F);

impl<F> Handler for FnHandler<F>
where
    F: Fn(Request, &mut dyn ResponseWriter) + Send + Sync + 'static,
{
    fn serve<'a>(&'a self, req: Request, w: &'a mut dyn ResponseWriter) -> BoxFuture<'a, ()> {
        (self.0)(req, w);
        Box::pin(std::future::ready(()))
    }
}

impl<H: Handler + ?Sized> Handler for Arc<H> {
    fn serve<'a>(&'a self, req: Request, w: &'a mut dyn ResponseWriter) -> BoxFuture<'a, ()> {
        (**self).serve(req, w)
    }
}
