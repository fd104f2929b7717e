//! Machine labels derived from a request.
//!
//! A [`LabelSet`] is the input to the matching engine. The default extractor,
//! [`QueryLabels`], turns query parameters into labels:
//!
//! ```text
//! GET /ipxe?mac=52-54-00-A1-9C-AE&os=installed
//!   → { "mac": "52:54:00:a1:9c:ae", "os": "installed" }
//! ```

use std::collections::{BTreeMap, HashSet};

use tracing::warn;

use crate::request::Request;

/// Attribute name → value. Keys are unique; iteration order is sorted.
pub type LabelSet = BTreeMap<String, String>;

/// Builds a [`LabelSet`] for one request.
pub trait LabelExtractor: Send + Sync + 'static {
    fn extract(&self, req: &Request) -> LabelSet;
}

/// Extracts labels from query parameters.
///
/// - the first value of a repeated key wins;
/// - a `mac` key (any case) is kept only if it parses as a hardware address,
///   and is normalised to lowercase colon-separated hex.
#[derive(Clone, Copy, Debug, Default)]
pub struct QueryLabels;

impl LabelExtractor for QueryLabels {
    fn extract(&self, req: &Request) -> LabelSet {
        let mut labels = LabelSet::new();
        let mut seen = HashSet::new();
        for (key, value) in req.query_pairs() {
            if !seen.insert(key.clone()) {
                continue;
            }
            if key.eq_ignore_ascii_case("mac") {
                match parse_mac(&value) {
                    Some(mac) => {
                        labels.insert(key, mac);
                    }
                    None => warn!(mac = %value, "ignoring unparseable MAC address"),
                }
                continue;
            }
            labels.insert(key, value);
        }
        labels
    }
}

impl<F> LabelExtractor for F
where
    F: Fn(&Request) -> LabelSet + Send + Sync + 'static,
{
    fn extract(&self, req: &Request) -> LabelSet {
        self(req)
    }
}

/// Parses an EUI-48, EUI-64 or 20-octet IP over InfiniBand address.
///
/// Accepts `01:23:45:67:89:ab`, `01-23-45-67-89-ab` and `0123.4567.89ab`
/// (plus their 8- and 20-octet forms) and returns the lowercase colon form.
pub fn parse_mac(s: &str) -> Option<String> {
    let octets = if s.contains('.') {
        dotted_octets(s)?
    } else {
        let sep = if s.contains(':') { ':' } else { '-' };
        s.split(sep).map(hex_octet).collect::<Option<Vec<u8>>>()?
    };

    if !matches!(octets.len(), 6 | 8 | 20) {
        return None;
    }

    let hex: Vec<String> = octets.iter().map(|b| format!("{b:02x}")).collect();
    Some(hex.join(":"))
}

fn hex_octet(s: &str) -> Option<u8> {
    if s.len() != 2 || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    u8::from_str_radix(s, 16).ok()
}

fn dotted_octets(s: &str) -> Option<Vec<u8>> {
    let mut octets = Vec::with_capacity(20);
    for group in s.split('.') {
        if group.len() != 4 || !group.is_ascii() {
            return None;
        }
        octets.push(hex_octet(&group[..2])?);
        octets.push(hex_octet(&group[2..])?);
    }
    Some(octets)
}
