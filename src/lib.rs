//! # matchbox-http
//!
//! The request pipeline in front of a bare-metal provisioning service.
//!
//! Machines network-boot and ask for their configuration with requests like
//! `GET /ipxe?mac=52:54:00:a1:9c:ae`. Before any content handler runs, this
//! crate works out which **Group** and **Profile** apply to the machine and
//! hands them downstream in the request's [`Context`].
//!
//! ## The pipeline
//!
//! ```text
//! RequestLogger → CountRequests → GroupResolver → ProfileResolver → Router → handler
//! ```
//!
//! - every request is logged once, on the way in;
//! - every request is counted once, by path and the status the client saw;
//! - Group and Profile resolution is advisory. A machine that matches nothing
//!   still reaches the terminal handler, which checks [`group_from`] /
//!   [`profile_from`] and decides what a missing entity means for it.
//!
//! Deciding *which* Group matches is the job of a [`Matcher`]; this crate
//! only calls it.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use http::StatusCode;
//! use matchbox_http::{
//!     Config, Matcher, Pipeline, ResponseWriter, Router, Server, handler, home, profile_from,
//!     telemetry,
//! };
//!
//! # fn engine() -> Arc<dyn Matcher> { unimplemented!() }
//! #[tokio::main]
//! async fn main() -> Result<(), matchbox_http::Error> {
//!     let config = Config::load("/etc/matchbox/http.toml")?;
//!     matchbox_http::logging::init(&config.log)?;
//!     let counter = telemetry::PrometheusCounter::new(&config.metrics.counter_name);
//!     let _metrics = telemetry::install_prometheus(&counter)?;
//!
//!     let ipxe = handler::from_fn(|req, w| {
//!         let Some(profile) = profile_from(req.context()) else {
//!             let _ = home::not_found(w);
//!             return;
//!         };
//!         w.write_status(StatusCode::OK);
//!         let _ = writeln!(w, "#!ipxe\n# profile {}", profile.id);
//!     });
//!
//!     let router = Router::new()
//!         .route("/ipxe", ipxe)
//!         .fallback(home::Home::new(&config.service_name));
//!
//!     let app = Pipeline::builder(engine())
//!         .counter(Arc::new(counter))
//!         .build(router);
//!
//!     Server::bind(config.socket_addr()?).await?.serve(app).await
//! }
//! ```

mod error;
mod request;
mod response;
mod router;
mod server;

pub mod config;
pub mod context;
pub mod entity;
pub mod handler;
pub mod home;
pub mod labels;
pub mod logging;
pub mod matcher;
pub mod middleware;
pub mod telemetry;

pub use config::Config;
pub use context::{Context, group_from, profile_from, with_group, with_profile};
pub use entity::{Boot, Group, Profile};
pub use error::{ConfigError, Error};
pub use handler::{BoxFuture, BoxedHandler, Handler, ResponseWriter};
pub use labels::{LabelExtractor, LabelSet, QueryLabels};
pub use matcher::{MatchError, Matcher};
pub use middleware::{Middleware, Next, Pipeline, PipelineBuilder};
pub use request::{Request, RequestBuilder};
pub use response::{BufferedResponse, TEXT_PLAIN};
pub use router::Router;
pub use server::Server;
pub use telemetry::{PrometheusCounter, RequestCounter, RequestTally};
