//! Read-through projection of an [`Environment`] for the dispatch layer.
//!
//! Query string, form body and cookies are parsed on first access and cached.

use indexmap::IndexMap;
use once_cell::sync::OnceCell;
use percent_encoding::percent_decode_str;

use crate::http::HttpMethod;
use crate::http::cookie::parse_cookie_header;
use crate::http::headers::HeaderBag;
use crate::http::request::{Environment, User};

pub type Params = IndexMap<String, Vec<String>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestCookie {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Default)]
pub struct RequestCookies {
    cookies: IndexMap<String, String>,
}

impl RequestCookies {
    pub fn new(cookies: IndexMap<String, String>) -> Self {
        Self { cookies }
    }

    pub fn get(&self, name: &str) -> Option<RequestCookie> {
        self.cookies.get(name).map(|value| RequestCookie {
            name: name.to_string(),
            value: value.clone(),
        })
    }

    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.cookies.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

fn decode_component(s: &str) -> String {
    percent_decode_str(&s.replace('+', " "))
        .decode_utf8_lossy()
        .into_owned()
}

/// Parses `a=1&b=2&a=3` into an ordered multimap.
pub fn parse_urlencoded(input: &str) -> Params {
    let mut params = Params::new();
    for pair in input.split('&').filter(|p| !p.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        params
            .entry(decode_component(key))
            .or_default()
            .push(decode_component(value));
    }
    params
}

#[derive(Debug)]
pub struct ServerRequest {
    env: Environment,
    query: OnceCell<Params>,
    form: OnceCell<Params>,
    cookies: OnceCell<RequestCookies>,
}

impl ServerRequest {
    pub fn new(env: Environment) -> Self {
        Self {
            env,
            query: OnceCell::new(),
            form: OnceCell::new(),
            cookies: OnceCell::new(),
        }
    }

    pub fn environment(&self) -> &Environment {
        &self.env
    }

    pub fn method(&self) -> HttpMethod {
        self.env.method
    }

    pub fn path(&self) -> &str {
        &self.env.path
    }

    pub fn path_base(&self) -> &str {
        &self.env.path_base
    }

    /// `scheme://host/path_base/path?query`
    pub fn url(&self) -> String {
        let mut url = format!(
            "{}://{}{}{}",
            self.env.scheme, self.env.host, self.env.path_base, self.env.path
        );
        if !self.env.query_string.is_empty() {
            url.push('?');
            url.push_str(&self.env.query_string);
        }
        url
    }

    pub fn query_string(&self) -> &Params {
        self.query
            .get_or_init(|| parse_urlencoded(&self.env.query_string))
    }

    /// First value of query parameter `name`.
    pub fn query(&self, name: &str) -> Option<&str> {
        self.query_string()
            .get(name)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    pub fn headers(&self) -> &HeaderBag {
        &self.env.headers
    }

    pub fn header(&self, name: &str) -> Option<String> {
        self.env.headers.get(name)
    }

    pub fn form(&self) -> &Params {
        self.form
            .get_or_init(|| parse_urlencoded(self.env.form.as_deref().unwrap_or("")))
    }

    pub fn cookies(&self) -> &RequestCookies {
        self.cookies.get_or_init(|| {
            let mut cookies = IndexMap::new();
            for header in self.env.headers.get_all("Cookie").unwrap_or_default() {
                for (name, value) in parse_cookie_header(header) {
                    cookies.entry(name).or_insert(value);
                }
            }
            RequestCookies::new(cookies)
        })
    }

    pub fn user(&self) -> Option<&User> {
        self.env.user.as_ref()
    }
}
