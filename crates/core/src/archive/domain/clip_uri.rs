use std::fmt;
use std::path::PathBuf;
use std::sync::OnceLock;

use regex::Regex;

use crate::shared::constants::{END_TIME_PARAM, START_TIME_PARAM};

const FILE_SCHEME: &str = "file://";

fn scheme_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    // Two or more characters, so Windows drive letters read as paths.
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9]{2,}:").expect("scheme pattern is valid"))
}

/// Whether `reference` names a URI rather than a filesystem path.
pub fn looks_like_uri(reference: &str) -> bool {
    scheme_pattern().is_match(reference)
}

/// A clip location plus its query parameters.
#[derive(Clone, Debug, PartialEq)]
pub struct ClipUri {
    location: String,
    params: Vec<(String, String)>,
}

impl ClipUri {
    pub fn parse(uri: &str) -> Self {
        let (location, query) = match uri.split_once('?') {
            Some((location, query)) => (location, query),
            None => (uri, ""),
        };
        let params = query
            .split('&')
            .filter(|pair| !pair.is_empty())
            .map(|pair| match pair.split_once('=') {
                Some((key, value)) => (key.to_string(), value.to_string()),
                None => (pair.to_string(), String::new()),
            })
            .collect();
        Self {
            location: location.to_string(),
            params,
        }
    }

    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self {
            location: path.into().to_string_lossy().into_owned(),
            params: Vec::new(),
        }
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    pub fn start_time(&self) -> Option<f64> {
        self.param(START_TIME_PARAM).and_then(|v| v.parse().ok())
    }

    pub fn end_time(&self) -> Option<f64> {
        self.param(END_TIME_PARAM).and_then(|v| v.parse().ok())
    }

    /// Copy of this URI selecting `[start, end]`, both rounded to the
    /// nearest integer.
    pub fn with_range(&self, start: f64, end: f64) -> Self {
        let mut params: Vec<(String, String)> = self
            .params
            .iter()
            .filter(|(k, _)| {
                !k.eq_ignore_ascii_case(START_TIME_PARAM) && !k.eq_ignore_ascii_case(END_TIME_PARAM)
            })
            .cloned()
            .collect();
        params.push((START_TIME_PARAM.to_string(), format!("{}", start.round() as i64)));
        params.push((END_TIME_PARAM.to_string(), format!("{}", end.round() as i64)));
        Self {
            location: self.location.clone(),
            params,
        }
    }

    /// Local file behind the URI; `None` for non-file schemes.
    pub fn local_path(&self) -> Option<PathBuf> {
        if let Some(path) = self.location.strip_prefix(FILE_SCHEME) {
            return Some(PathBuf::from(path));
        }
        if looks_like_uri(&self.location) {
            return None;
        }
        Some(PathBuf::from(&self.location))
    }
}

impl fmt::Display for ClipUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.location)?;
        for (i, (key, value)) in self.params.iter().enumerate() {
            let sep = if i == 0 { '?' } else { '&' };
            write!(f, "{sep}{key}={value}")?;
        }
        Ok(())
    }
}
