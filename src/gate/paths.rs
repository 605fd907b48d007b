use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};

use crate::config::Config;

/// Characters escaped in the `redirect` query value. `/` stays readable.
const REDIRECT_VALUE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'&')
    .add(b'+')
    .add(b'<')
    .add(b'=')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// True when `path` is `prefix` itself or lies below it.
pub fn matches_prefix(path: &str, prefix: &str) -> bool {
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        return true;
    }
    path == prefix
        || path
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('/'))
}

fn same_path(a: &str, b: &str) -> bool {
    let a = a.trim_end_matches('/');
    let b = b.trim_end_matches('/');
    a == b
}

/// Which paths the gate guards and where it sends browsers.
#[derive(Debug, Clone)]
pub struct PathRules {
    protected: Vec<String>,
    auth_prefix: String,
    signin: String,
    set_password: String,
    home: String,
}

impl PathRules {
    pub fn from_config(config: &Config) -> Self {
        Self {
            protected: config.protected_prefixes.clone(),
            auth_prefix: config.auth_prefix.clone(),
            signin: config.signin_path.clone(),
            set_password: config.set_password_path.clone(),
            home: config.home_path.clone(),
        }
    }

    pub fn is_protected(&self, path: &str) -> bool {
        self.protected.iter().any(|prefix| matches_prefix(path, prefix))
    }

    pub fn is_auth_boundary(&self, path: &str) -> bool {
        matches_prefix(path, &self.auth_prefix)
    }

    pub fn is_set_password(&self, path: &str) -> bool {
        same_path(path, &self.set_password)
    }

    pub fn signin_redirect(&self, original_path: &str) -> String {
        format!(
            "{}?redirect={}",
            self.signin,
            utf8_percent_encode(original_path, REDIRECT_VALUE)
        )
    }

    pub fn set_password(&self) -> &str {
        &self.set_password
    }

    pub fn home(&self) -> &str {
        &self.home
    }
}
