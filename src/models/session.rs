//! Read-only session context supplied by an external login tool.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Cookie carrying the anti-forgery token.
pub const CSRF_COOKIE: &str = "csrftoken";

/// Authentication state as a set of named cookies.
///
/// The scanner only reads it. Several concurrent operations may share one
/// session by reference.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Session {
    cookies: BTreeMap<String, String>,
}

/// One entry of a browser cookie export.
#[derive(Debug, Deserialize)]
struct ExportedCookie {
    name: String,
    value: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SessionFile {
    Map(BTreeMap<String, String>),
    Export(Vec<ExportedCookie>),
}

impl Session {
    pub fn new<K, V>(cookies: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            cookies: cookies
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Parse either a `{name: value}` object or a list of
    /// `{"name": .., "value": ..}` cookie records.
    pub fn from_json(json: &str) -> Result<Self> {
        let parsed: SessionFile = serde_json::from_str(json)
            .map_err(|e| AppError::validation(format!("unreadable session file: {e}")))?;
        let session = match parsed {
            SessionFile::Map(cookies) => Self { cookies },
            SessionFile::Export(list) => Self::new(list.into_iter().map(|c| (c.name, c.value))),
        };
        Ok(session)
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    /// Anti-forgery token, if the session carries one.
    pub fn csrf_token(&self) -> Option<&str> {
        self.get(CSRF_COOKIE).filter(|token| !token.is_empty())
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

    /// Value for a single `Cookie` request header.
    pub fn cookie_header(&self) -> String {
        self.iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// Reject a session that cannot authenticate anything.
    pub fn ensure_usable(&self) -> Result<()> {
        if self.is_empty() {
            return Err(AppError::validation("session has no cookies"));
        }
        Ok(())
    }
}
