//! # Courier Framework
//!
//! Dispatch components of the Courier bot framework:
//!
//! - [`Router`]: the command / callback / content-type dispatch table.
//! - [`Middleware`] and [`compose`]: cross-cutting behaviour as tower layers
//!   ([`RequestLogLayer`], [`CorrelationLayer`], [`AccessControlLayer`],
//!   [`TimingLayer`], [`RecoveryLayer`]).
//! - [`handler_fn`] and [`BoxedHandler`]: how application functions become
//!   handler services.
//!
//! ```rust,ignore
//! use courier_framework::{Middleware, Router, boxed, compose, handler_fn};
//!
//! let router = Router::new();
//! router.handle_command("/start", handler_fn(start));
//! router.handle_document(handler_fn(on_document));
//!
//! let pipeline = compose(
//!     boxed(router.clone()),
//!     [Middleware::request_log(), Middleware::timing(), Middleware::recovery()],
//! );
//! ```

pub mod handler;
pub mod middleware;
pub mod router;

pub use handler::{BoxFuture, BoxedHandler, Handler, HandlerService, boxed, handler_fn};
pub use middleware::{
    AccessControlLayer, CorrelationLayer, Middleware, RecoveryLayer, RequestLogLayer, TimingLayer,
    compose,
};
pub use router::{RouteKind, Router};
