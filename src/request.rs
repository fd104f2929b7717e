//! Incoming HTTP request type.

use std::collections::HashMap;

use bytes::Bytes;
use http::{HeaderMap, Method, Uri};

use crate::context::Context;

/// An incoming HTTP request plus its propagation [`Context`].
///
/// Requests are moved through the pipeline by value. A stage that wants to
/// hand an enriched context downstream calls [`with_context`](Request::with_context)
/// and passes the result on; nothing upstream ever observes the change.
#[derive(Debug)]
pub struct Request {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
    params: HashMap<String, String>,
    context: Context,
}

impl Request {
    pub(crate) fn from_parts(parts: http::request::Parts, body: Bytes) -> Self {
        Self {
            method: parts.method,
            uri: parts.uri,
            headers: parts.headers,
            body,
            params: HashMap::new(),
            context: Context::new(),
        }
    }

    /// Starts building a request by hand, mostly useful in tests and adapters.
    pub fn builder() -> RequestBuilder {
        RequestBuilder {
            method: Method::GET,
            uri: Uri::from_static("/"),
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    pub fn method(&self) -> &Method { &self.method }
    pub fn uri(&self) -> &Uri { &self.uri }
    pub fn path(&self) -> &str { self.uri.path() }
    pub fn headers(&self) -> &HeaderMap { &self.headers }
    pub fn body(&self) -> &[u8] { &self.body }
    pub fn context(&self) -> &Context { &self.context }

    /// Case-insensitive header lookup. Non-UTF-8 values are skipped.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Returns a named path parameter captured by the router.
    ///
    /// For a route `/assets/{file}`, `req.param("file")` on `/assets/a.ign`
    /// returns `Some("a.ign")`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// Decoded query parameters in the order they appear.
    pub fn query_pairs(&self) -> impl Iterator<Item = (String, String)> + '_ {
        let query = self.uri.query().unwrap_or_default();
        url::form_urlencoded::parse(query.as_bytes())
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
    }

    /// Returns this request carrying `context` instead of its current one.
    pub fn with_context(mut self, context: Context) -> Self {
        self.context = context;
        self
    }

    pub(crate) fn with_params(mut self, params: HashMap<String, String>) -> Self {
        self.params = params;
        self
    }
}

/// Builder returned by [`Request::builder`].
#[derive(Debug)]
pub struct RequestBuilder {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
}

impl RequestBuilder {
    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn uri(mut self, uri: Uri) -> Self {
        self.uri = uri;
        self
    }

    /// Appends a header. Invalid names or values are ignored.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            http::header::HeaderName::from_bytes(name.as_bytes()),
            http::HeaderValue::from_str(value),
        ) {
            self.headers.append(name, value);
        }
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn build(self) -> Request {
        Request {
            method: self.method,
            uri: self.uri,
            headers: self.headers,
            body: self.body,
            params: HashMap::new(),
            context: Context::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_pairs_are_decoded() {
        let req = Request::builder()
            .uri(Uri::from_static("/ipxe?uuid=a%20b&os=installed"))
            .build();
        let pairs: Vec<_> = req.query_pairs().collect();
        assert_eq!(
            pairs,
            vec![
                ("uuid".to_owned(), "a b".to_owned()),
                ("os".to_owned(), "installed".to_owned()),
            ]
        );
    }

    #[test]
    fn with_context_replaces_only_the_context() {
        let req = Request::builder()
            .uri(Uri::from_static("/boot.ipxe"))
            .header("x-forwarded-for", "10.0.0.1")
            .build();
        let req = req.with_context(Context::new());
        assert_eq!(req.path(), "/boot.ipxe");
        assert_eq!(req.header("X-Forwarded-For"), Some("10.0.0.1"));
    }
}
