//! Auth token attached to every request.

use std::fmt;
use std::sync::Arc;

/// Either a fixed token or a provider evaluated on every request, so a
/// caller can rotate tokens without rebuilding the transport.
#[derive(Clone)]
pub enum AuthToken {
    Static(String),
    Provider(Arc<dyn Fn() -> String + Send + Sync>),
}

impl AuthToken {
    pub fn provider(f: impl Fn() -> String + Send + Sync + 'static) -> Self {
        AuthToken::Provider(Arc::new(f))
    }

    /// Returns the token to attach to the next request.
    pub fn resolve(&self) -> String {
        match self {
            AuthToken::Static(token) => token.clone(),
            AuthToken::Provider(f) => f(),
        }
    }
}

impl From<String> for AuthToken {
    fn from(token: String) -> Self {
        AuthToken::Static(token)
    }
}

impl From<&str> for AuthToken {
    fn from(token: &str) -> Self {
        AuthToken::Static(token.to_string())
    }
}

impl Default for AuthToken {
    fn default() -> Self {
        AuthToken::Static(String::new())
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthToken::Static(_) => f.write_str("AuthToken::Static(***)"),
            AuthToken::Provider(_) => f.write_str("AuthToken::Provider(..)"),
        }
    }
}
