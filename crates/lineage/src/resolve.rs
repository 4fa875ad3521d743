//! Parent resolution.
//!
//! A record's parent is the request whose output image was used as the
//! record's input. Generated images live on the configured image origin
//! under `<requestId>.<variant>.<extension>`, so the parent can be read off
//! the record's `input.originalUrl` without consulting the store.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::issue::LineageIssue;

// ──────────────────────────────────────────────
// Variant / ParentLink
// ──────────────────────────────────────────────

/// Which of the parent's two outputs was used as input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    Good,
    Bad,
}

impl Variant {
    pub fn as_str(self) -> &'static str {
        match self {
            Variant::Good => "good",
            Variant::Bad => "bad",
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Variant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "good" => Ok(Variant::Good),
            "bad" => Ok(Variant::Bad),
            other => Err(format!("unknown variant '{}'", other)),
        }
    }
}

/// A resolved reference from a record to the request that produced its input.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParentLink {
    pub parent_request_id: String,
    pub variant: Variant,
}

impl fmt::Display for ParentLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.parent_request_id, self.variant)
    }
}

// ──────────────────────────────────────────────
// Resolution
// ──────────────────────────────────────────────

/// Outcome of resolving one record's parent.
///
/// Every variant except `Linked` means the record is a root; the variants
/// exist so callers can log why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The record has no `originalUrl`.
    NoOriginalUrl,
    /// The input came from outside the image host.
    ForeignOrigin,
    /// The URL does not parse, or its path is not `<id>.<variant>.<ext>`.
    Malformed(String),
    /// The URL names a request that is not in the working set.
    Dangling { candidate: String },
    Linked(ParentLink),
}

impl Resolution {
    pub fn link(&self) -> Option<&ParentLink> {
        match self {
            Resolution::Linked(link) => Some(link),
            _ => None,
        }
    }

    pub fn into_link(self) -> Option<ParentLink> {
        match self {
            Resolution::Linked(link) => Some(link),
            _ => None,
        }
    }
}

/// Decide whether `original_url` names an output of a request in `known`.
///
/// Pure: nothing is mutated and nothing is logged.
pub fn resolve_parent(
    original_url: Option<&str>,
    known: &HashSet<String>,
    image_origin: &Url,
) -> Resolution {
    let Some(raw) = original_url else {
        return Resolution::NoOriginalUrl;
    };
    let url = match Url::parse(raw) {
        Ok(url) => url,
        Err(e) => return Resolution::Malformed(format!("'{}': {}", raw, e)),
    };
    if url.origin() != image_origin.origin() {
        return Resolution::ForeignOrigin;
    }

    let (candidate, variant) = match split_image_path(url.path()) {
        Ok(parts) => parts,
        Err(message) => return Resolution::Malformed(message),
    };
    if !known.contains(candidate) {
        return Resolution::Dangling {
            candidate: candidate.to_string(),
        };
    }
    Resolution::Linked(ParentLink {
        parent_request_id: candidate.to_string(),
        variant,
    })
}

/// Split `/<requestId>.<variant>.<extension>` into request id and variant.
fn split_image_path(path: &str) -> Result<(&str, Variant), String> {
    let name = path.strip_prefix('/').unwrap_or(path);
    if name.contains('/') {
        return Err(format!("nested image path '{}'", path));
    }
    let parts: Vec<&str> = name.split('.').collect();
    let [request_id, variant, extension] = parts.as_slice() else {
        return Err(format!(
            "expected <id>.<variant>.<ext>, got '{}' ({} segments)",
            name,
            parts.len()
        ));
    };
    if request_id.is_empty() || extension.is_empty() {
        return Err(format!("empty segment in '{}'", name));
    }
    let variant = variant.parse::<Variant>()?;
    Ok((*request_id, variant))
}

// ──────────────────────────────────────────────
// LinkTable
// ──────────────────────────────────────────────

/// Parent links assigned during one pass.
///
/// A record gets at most one parent per pass. Offering the same link again
/// is a no-op; offering a different one is reported and the first link is
/// kept.
#[derive(Debug, Default)]
pub struct LinkTable {
    links: HashMap<String, ParentLink>,
}

impl LinkTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn assign(&mut self, request_id: &str, link: ParentLink) -> Result<(), LineageIssue> {
        if let Some(existing) = self.links.get(request_id) {
            if *existing == link {
                return Ok(());
            }
            return Err(LineageIssue::ParentConflict {
                request_id: request_id.to_string(),
                kept: existing.to_string(),
                rejected: link.to_string(),
            });
        }
        self.links.insert(request_id.to_string(), link);
        Ok(())
    }

    pub fn get(&self, request_id: &str) -> Option<&ParentLink> {
        self.links.get(request_id)
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }
}
