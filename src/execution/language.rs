//! Language resolution: base images and in-container commands.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::RequestError;

/// Maps a language tag to the base image that runs it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageCatalog {
    images: BTreeMap<String, String>,
}

impl Default for ImageCatalog {
    fn default() -> Self {
        Self::from_pairs([
            ("python", "python:3.12-slim"),
            ("javascript", "node:20-slim"),
            ("typescript", "node:20-slim"),
        ])
    }
}

impl ImageCatalog {
    /// Builds a catalog from `(language, image)` pairs.
    pub fn from_pairs<L, I>(pairs: impl IntoIterator<Item = (L, I)>) -> Self
    where
        L: Into<String>,
        I: Into<String>,
    {
        Self {
            images: pairs
                .into_iter()
                .map(|(l, i)| (l.into(), i.into()))
                .collect(),
        }
    }

    /// Returns the image for `language`, or `None` if it is not supported.
    pub fn resolve(&self, language: &str) -> Option<&str> {
        self.images.get(language).map(String::as_str)
    }

    /// Supported language tags, sorted.
    pub fn supported(&self) -> Vec<&str> {
        self.images.keys().map(String::as_str).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.images.iter().map(|(l, i)| (l.as_str(), i.as_str()))
    }
}

/// Builds the argument vector that evaluates `code` inline.
///
/// The snippet is passed as a single argument to the interpreter; no shell
/// is involved, so shell metacharacters in `code` are inert.
pub fn build_command(language: &str, code: &str) -> Result<Vec<String>, RequestError> {
    let (program, flag) = match language {
        "python" => ("python", "-c"),
        "javascript" | "typescript" => ("node", "-e"),
        other => return Err(RequestError::UnsupportedLanguage(other.to_string())),
    };

    Ok(vec![program.to_string(), flag.to_string(), code.to_string()])
}
