//! Page context supplied by the host per proactive evaluation.
//!
//! The memory subsystem never fetches or inspects page content itself;
//! the hosting application's extraction heuristics hand over this record.

use serde::{Deserialize, Serialize};

use std::fmt;
use std::str::FromStr;

/// Coarse classification of the page the user is looking at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageKind {
    Article,
    Documentation,
    Code,
    Video,
    Shopping,
    Social,
    Other,
}

impl fmt::Display for PageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageKind::Article => write!(f, "article"),
            PageKind::Documentation => write!(f, "documentation"),
            PageKind::Code => write!(f, "code"),
            PageKind::Video => write!(f, "video"),
            PageKind::Shopping => write!(f, "shopping"),
            PageKind::Social => write!(f, "social"),
            PageKind::Other => write!(f, "other"),
        }
    }
}

impl FromStr for PageKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "article" => Ok(PageKind::Article),
            "documentation" => Ok(PageKind::Documentation),
            "code" => Ok(PageKind::Code),
            "video" => Ok(PageKind::Video),
            "shopping" => Ok(PageKind::Shopping),
            "social" => Ok(PageKind::Social),
            "other" => Ok(PageKind::Other),
            other => Err(format!("invalid page kind: '{other}'")),
        }
    }
}

/// What the user currently has open, as detected by the host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageContext {
    pub url: String,
    pub origin: String,
    pub title: String,
    pub kind: PageKind,
}

impl PageContext {
    /// Placeholder context for evaluations with no page attached
    /// (e.g. session start before any navigation).
    pub fn blank() -> Self {
        Self {
            url: String::new(),
            origin: String::new(),
            title: String::new(),
            kind: PageKind::Other,
        }
    }
}
