//! Reading the browser's `Cookie` header and writing `Set-Cookie` values.

use axum::http::header::{InvalidHeaderValue, COOKIE};
use axum::http::{HeaderMap, HeaderValue};

use crate::config::Config;

pub const SESSION_COOKIE: &str = "session";
pub const REFRESH_COOKIE: &str = "refreshToken";
pub const CHANGE_PASSWORD_COOKIE: &str = "is_change_password";

fn pairs<'a>(headers: &'a HeaderMap) -> impl Iterator<Item = (&'a str, &'a str)> + 'a {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|raw| raw.split(';'))
        .filter_map(|pair| {
            let (name, value) = pair.trim().split_once('=')?;
            Some((name.trim(), value.trim()))
        })
}

/// First value of cookie `name`, if the browser sent one.
pub fn get_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    pairs(headers).find(|(n, _)| *n == name).map(|(_, v)| v)
}

/// Every `Cookie` header joined into one, as it is forwarded to the auth API.
pub fn cookie_header(headers: &HeaderMap) -> Option<String> {
    let joined = headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .collect::<Vec<_>>()
        .join("; ");
    (!joined.is_empty()).then_some(joined)
}

pub fn is_truthy_flag(value: Option<&str>) -> bool {
    matches!(
        value.map(|v| v.trim().to_ascii_lowercase()).as_deref(),
        Some("true") | Some("1")
    )
}

/// Rewrite the request's cookies so `name` carries `value`, keeping the rest.
pub fn replace_cookie(headers: &mut HeaderMap, name: &str, value: &str) -> Result<(), InvalidHeaderValue> {
    let mut kept: Vec<String> = pairs(headers)
        .filter(|(n, _)| *n != name)
        .map(|(n, v)| format!("{n}={v}"))
        .collect();
    kept.push(format!("{name}={value}"));

    let header = HeaderValue::from_str(&kept.join("; "))?;
    headers.remove(COOKIE);
    headers.insert(COOKIE, header);
    Ok(())
}

/// Attributes of the session cookie the gate issues after a refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookiePolicy {
    pub secure: bool,
    pub max_age_secs: u64,
}

impl CookiePolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            secure: config.is_production(),
            max_age_secs: config.session_max_age_secs,
        }
    }

    pub fn same_site(&self) -> &'static str {
        if self.secure {
            "None"
        } else {
            "Strict"
        }
    }

    pub fn session_cookie(&self, token: &str) -> String {
        let mut cookie = format!(
            "{SESSION_COOKIE}={token}; Path=/; Max-Age={}; HttpOnly; SameSite={}",
            self.max_age_secs,
            self.same_site()
        );
        if self.secure {
            cookie.push_str("; Secure");
        }
        cookie
    }
}

pub fn expired_cookie(name: &str) -> String {
    format!("{name}=; Path=/; Max-Age=0; Expires=Thu, 01 Jan 1970 00:00:00 GMT")
}
