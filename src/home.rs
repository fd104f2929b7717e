//! Root and fallback handler.
//!
//! `GET /` answers with the service name so operators and load balancers can
//! tell they reached the right thing. Every other path that lands here got
//! past the router without a match and gets a plain `404`.
//!
//! ```text
//! $ curl http://matchbox.example:8080/
//! matchbox
//! $ curl -i http://matchbox.example:8080/nope
//! HTTP/1.1 404 Not Found
//! 404 page not found
//! ```

use http::{HeaderValue, StatusCode, header};
use tracing::warn;

use crate::handler::{BoxFuture, Handler, ResponseWriter};
use crate::request::Request;
use crate::response::write_text;

/// Body written for unmatched paths.
pub const NOT_FOUND_BODY: &str = "404 page not found\n";

/// Terminal handler for `/` and everything the router does not know.
#[derive(Clone, Debug)]
pub struct Home {
    banner: String,
}

impl Home {
    /// `service_name` is written, newline-terminated, for requests to `/`.
    pub fn new(service_name: &str) -> Self {
        Self { banner: format!("{service_name}\n") }
    }
}

impl Default for Home {
    fn default() -> Self {
        Self::new("matchbox")
    }
}

impl Handler for Home {
    fn serve<'a>(&'a self, req: Request, w: &'a mut dyn ResponseWriter) -> BoxFuture<'a, ()> {
        let written = if req.path() == "/" {
            write_text(w, StatusCode::OK, &self.banner)
        } else {
            not_found(w)
        };
        if let Err(e) = written {
            warn!(path = %req.path(), "response write failed: {e}");
        }
        Box::pin(std::future::ready(()))
    }
}

/// Writes the standard `404 Not Found` response.
pub fn not_found(w: &mut dyn ResponseWriter) -> std::io::Result<()> {
    w.headers_mut()
        .insert("x-content-type-options", HeaderValue::from_static("nosniff"));
    w.headers_mut().remove(header::CONTENT_TYPE);
    write_text(w, StatusCode::NOT_FOUND, NOT_FOUND_BODY)
}
