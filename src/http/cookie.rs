//! `Set-Cookie` encoding and deletion on top of [`HeaderBag`].
//!
//! Keys and values are percent-encoded, leaving only RFC 3986 unreserved
//! characters untouched. Expiry dates use the IMF-fixdate format produced by
//! [`httpdate`].

use std::time::{SystemTime, UNIX_EPOCH};

use indexmap::IndexMap;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};

use crate::http::headers::HeaderBag;

pub const SET_COOKIE: &str = "Set-Cookie";

const COOKIE_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieOptions {
    pub value: String,
    pub domain: Option<String>,
    pub path: Option<String>,
    pub expires: Option<SystemTime>,
    pub secure: bool,
    pub http_only: bool,
}

impl Default for CookieOptions {
    fn default() -> Self {
        Self {
            value: String::new(),
            domain: None,
            path: Some("/".to_string()),
            expires: None,
            secure: false,
            http_only: false,
        }
    }
}

impl CookieOptions {
    pub fn new(value: &str) -> Self {
        Self {
            value: value.to_string(),
            ..Self::default()
        }
    }

    pub fn domain(mut self, domain: &str) -> Self {
        self.domain = Some(domain.to_string());
        self
    }

    /// An empty path omits the attribute altogether.
    pub fn path(mut self, path: &str) -> Self {
        self.path = Some(path.to_string()).filter(|p| !p.is_empty());
        self
    }

    pub fn expires(mut self, at: SystemTime) -> Self {
        self.expires = Some(at);
        self
    }

    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    pub fn http_only(mut self, http_only: bool) -> Self {
        self.http_only = http_only;
        self
    }
}

fn escape(s: &str) -> String {
    utf8_percent_encode(s, COOKIE_COMPONENT).to_string()
}

/// Builds one `Set-Cookie` header value.
pub fn format_set_cookie(key: &str, cookie: &CookieOptions) -> String {
    let mut out = format!("{}={}", escape(key), escape(&cookie.value));

    if let Some(domain) = cookie.domain.as_deref().filter(|d| !d.is_empty()) {
        out.push_str("; domain=");
        out.push_str(domain);
    }
    if let Some(path) = cookie.path.as_deref().filter(|p| !p.is_empty()) {
        out.push_str("; path=");
        out.push_str(path);
    }
    if let Some(expires) = cookie.expires {
        out.push_str("; expires=");
        out.push_str(&httpdate::fmt_http_date(expires));
    }
    if cookie.secure {
        out.push_str("; secure");
    }
    if cookie.http_only {
        out.push_str("; HttpOnly");
    }
    out
}

/// Appends a `Set-Cookie` entry for `key`. Earlier entries are kept.
pub fn set_cookie(headers: &mut HeaderBag, key: &str, cookie: &CookieOptions) {
    headers.append(SET_COOKIE, &format_set_cookie(key, cookie));
}

/// Removes pending `Set-Cookie` entries for `key` and appends an
/// already-expired cookie in their place.
///
/// Without a scope every entry for `key` goes and the expired cookie is set
/// for `/`. With one, only entries in that scope are removed: the domain when
/// one is given, else the path, else the bare key.
pub fn delete_cookie(headers: &mut HeaderBag, key: &str, scope: Option<&CookieOptions>) {
    let prefix = format!("{}=", escape(key)).to_ascii_lowercase();
    let domain = scope
        .and_then(|s| s.domain.as_deref())
        .filter(|d| !d.is_empty())
        .map(|d| format!("domain={d}").to_ascii_lowercase());
    let path = scope
        .and_then(|s| s.path.as_deref())
        .filter(|p| !p.is_empty())
        .map(|p| format!("path={p}").to_ascii_lowercase());

    headers.retain_values(SET_COOKIE, |value| {
        let value = value.to_ascii_lowercase();
        if !value.starts_with(&prefix) {
            return true;
        }
        match (&domain, &path) {
            (Some(domain), _) => !value.contains(domain.as_str()),
            (None, Some(path)) => !value.contains(path.as_str()),
            (None, None) => false,
        }
    });

    let expired = CookieOptions {
        value: String::new(),
        domain: scope.and_then(|s| s.domain.clone()),
        path: scope.map_or_else(|| Some("/".to_string()), |s| s.path.clone()),
        expires: Some(UNIX_EPOCH),
        secure: false,
        http_only: false,
    };
    set_cookie(headers, key, &expired);
}

/// Parses a request `Cookie` header (`a=1; b=2`) into a name → value map.
/// Later duplicates do not override the first occurrence.
pub fn parse_cookie_header(header: &str) -> IndexMap<String, String> {
    let mut cookies = IndexMap::new();
    for pair in header.split(';') {
        let pair = pair.trim();
        if pair.is_empty() {
            continue;
        }
        let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
        let name = percent_decode_str(name.trim()).decode_utf8_lossy().into_owned();
        let value = percent_decode_str(value.trim()).decode_utf8_lossy().into_owned();
        cookies.entry(name).or_insert(value);
    }
    cookies
}

/// Whether a formatted `Set-Cookie` value carries an expiry at or before `now`.
pub fn is_expired(set_cookie: &str, now: SystemTime) -> bool {
    set_cookie
        .split(';')
        .filter_map(|attr| attr.trim().split_once('='))
        .find(|(name, _)| name.eq_ignore_ascii_case("expires"))
        .and_then(|(_, date)| httpdate::parse_http_date(date).ok())
        .is_some_and(|at| at <= now)
}
