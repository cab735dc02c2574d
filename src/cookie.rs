//! Cookie transport: the boundary between sessions and HTTP.
//!
//! The store only needs to read one named cookie from a request and append a
//! `Set-Cookie` header to a response. [`CookieSource`] and [`CookieSink`]
//! capture exactly that, with implementations for the `http` crate types.

use crate::error::{Error, Result};
use crate::session::SessionOptions;
use chrono::{DateTime, Duration, TimeZone, Utc};
use http::header::{COOKIE, SET_COOKIE};
use http::{HeaderMap, HeaderValue, Request, Response};
use serde::{Deserialize, Serialize};
use std::fmt;

const HTTP_DATE: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// `SameSite` cookie policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SameSite {
    /// Omit the attribute and let the browser decide.
    #[default]
    Default,

    /// `SameSite=Lax`.
    Lax,

    /// `SameSite=Strict`.
    Strict,

    /// `SameSite=None` (requires `Secure` in modern browsers).
    None,
}

impl SameSite {
    fn attribute(self) -> Option<&'static str> {
        match self {
            Self::Default => None,
            Self::Lax => Some("Lax"),
            Self::Strict => Some("Strict"),
            Self::None => Some("None"),
        }
    }
}

/// An outgoing session cookie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    /// Cookie name.
    pub name: String,

    /// Cookie value (the encoded session identifier, or empty).
    pub value: String,

    /// Attributes rendered after the value.
    pub options: SessionOptions,
}

impl Cookie {
    /// Build a cookie carrying `value` with the given attributes.
    #[must_use]
    pub fn new(name: &str, value: &str, options: &SessionOptions) -> Self {
        Self {
            name: name.to_string(),
            value: value.to_string(),
            options: options.clone(),
        }
    }

    /// Build an empty cookie that makes the browser drop it immediately.
    #[must_use]
    pub fn expired(name: &str, options: &SessionOptions) -> Self {
        let mut options = options.clone();
        options.max_age = -1;
        Self {
            name: name.to_string(),
            value: String::new(),
            options,
        }
    }

    /// Whether this cookie instructs the client to delete it.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.options.max_age < 0
    }

    /// Render as a `Set-Cookie` header value.
    #[must_use]
    pub fn to_header_value(&self) -> String {
        self.render_at(Utc::now())
    }

    fn render_at(&self, now: DateTime<Utc>) -> String {
        let mut out = format!("{}={}", self.name, self.value);
        let options = &self.options;

        if !options.path.is_empty() {
            out.push_str("; Path=");
            out.push_str(&options.path);
        }
        if let Some(domain) = options.domain.as_deref().filter(|d| !d.is_empty()) {
            out.push_str("; Domain=");
            out.push_str(domain);
        }
        if options.max_age > 0 {
            out.push_str(&format!(
                "; Expires={}; Max-Age={}",
                expires_at(now, options.max_age).format(HTTP_DATE),
                options.max_age
            ));
        } else if options.max_age < 0 {
            let epoch = Utc.timestamp_opt(1, 0).single().unwrap_or(now);
            out.push_str(&format!("; Expires={}; Max-Age=0", epoch.format(HTTP_DATE)));
        }
        if options.http_only {
            out.push_str("; HttpOnly");
        }
        if options.secure {
            out.push_str("; Secure");
        }
        if let Some(policy) = options.same_site.attribute() {
            out.push_str("; SameSite=");
            out.push_str(policy);
        }
        out
    }
}

/// `now + age`, clamped to the last date a four-digit HTTP date can express.
fn expires_at(now: DateTime<Utc>, age: i64) -> DateTime<Utc> {
    let latest = Utc
        .with_ymd_and_hms(9999, 12, 31, 23, 59, 59)
        .single()
        .unwrap_or(DateTime::<Utc>::MAX_UTC);
    Duration::try_seconds(age)
        .and_then(|age| now.checked_add_signed(age))
        .map_or(latest, |expires| expires.min(latest))
}

impl fmt::Display for Cookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_header_value())
    }
}

/// Find the value of cookie `name` in a `Cookie` request header.
#[must_use]
pub fn parse_cookie_header<'a>(header: &'a str, name: &str) -> Option<&'a str> {
    header.split(';').find_map(|pair| {
        let (key, value) = pair.trim().split_once('=')?;
        if key.trim() != name {
            return None;
        }
        let value = value.trim();
        Some(
            value
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .unwrap_or(value),
        )
    })
}

/// Something a session cookie can be read from.
pub trait CookieSource {
    /// Value of the first cookie called `name`, if any.
    fn cookie(&self, name: &str) -> Option<String>;
}

/// Something a session cookie can be written to.
pub trait CookieSink {
    /// Append a `Set-Cookie` for `cookie`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] if the cookie is not a valid header value.
    fn set_cookie(&mut self, cookie: &Cookie) -> Result<()>;
}

impl CookieSource for HeaderMap {
    fn cookie(&self, name: &str) -> Option<String> {
        self.get_all(COOKIE)
            .iter()
            .filter_map(|header| header.to_str().ok())
            .find_map(|header| parse_cookie_header(header, name))
            .map(str::to_string)
    }
}

impl<B> CookieSource for Request<B> {
    fn cookie(&self, name: &str) -> Option<String> {
        self.headers().cookie(name)
    }
}

impl CookieSink for HeaderMap {
    fn set_cookie(&mut self, cookie: &Cookie) -> Result<()> {
        let value = HeaderValue::from_str(&cookie.to_header_value())
            .map_err(|e| Error::Transport(e.to_string()))?;
        self.append(SET_COOKIE, value);
        Ok(())
    }
}

impl<B> CookieSink for Response<B> {
    fn set_cookie(&mut self, cookie: &Cookie) -> Result<()> {
        self.headers_mut().set_cookie(cookie)
    }
}
