use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Where the opaque bearer credential comes from. The source is read fresh on
/// every request, so a rotated token takes effect on the next call with no
/// invalidation step.
#[derive(Clone, Debug)]
pub enum TokenSource {
    Static(String),
    Env(String),
    File(PathBuf),
    None,
}

impl TokenSource {
    pub fn token(&self) -> Option<String> {
        let raw = match self {
            TokenSource::Static(token) => Some(token.clone()),
            TokenSource::Env(name) => env::var(name).ok(),
            TokenSource::File(path) => std::fs::read_to_string(path).ok(),
            TokenSource::None => None,
        };
        let raw = raw?.trim().to_string();
        if raw.is_empty() {
            None
        } else {
            Some(raw)
        }
    }
}

/// Explicit API context handed to every API-calling component, replacing any
/// notion of process-global token storage.
#[derive(Clone, Debug)]
pub struct Session {
    base_url: String,
    token_source: TokenSource,
    timeout: Duration,
}

impl Session {
    pub fn new(base_url: &str, token_source: TokenSource, timeout: Duration) -> Session {
        let mut base_url = base_url.trim().to_string();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Session {
            base_url,
            token_source,
            timeout,
        }
    }

    pub fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    /// Reads the bearer token from its source. Absence is not an error here:
    /// requests proceed without the header and fail server-side.
    pub fn bearer(&self) -> Option<String> {
        self.token_source.token()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}
