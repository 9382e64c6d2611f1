/// Identity types for the curation engine.
///
/// - `UnitId`: spike-sorting unit identifier (integer or string)
/// - `UnitIdArg`: one-or-many unit ids, as carried by label actions
/// - `FeedId`: identifier of the remote append-only log backing a document
/// - `UserId`: signed-in user identity used by the authorization gate

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use thiserror::Error;

// ---------------------------------------------------------------------------
// UnitId
// ---------------------------------------------------------------------------

/// Opaque unit identifier. Serialized untagged: a JSON number or a JSON string.
///
/// Ordering puts every integer id (numerically) before every string id
/// (lexicographically), so merge groups and selections sort the way a
/// curator reads them.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UnitId {
    Int(i64),
    Str(String),
}

impl UnitId {
    /// Key used in `labelsByUnit` (`5` → `"5"`, `"abc"` → `"abc"`).
    pub fn label_key(&self) -> String {
        self.to_string()
    }
}

impl Ord for UnitId {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (UnitId::Int(a), UnitId::Int(b)) => a.cmp(b),
            (UnitId::Int(_), UnitId::Str(_)) => Ordering::Less,
            (UnitId::Str(_), UnitId::Int(_)) => Ordering::Greater,
            (UnitId::Str(a), UnitId::Str(b)) => a.cmp(b),
        }
    }
}

impl PartialOrd for UnitId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Debug for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnitId::Int(n) => write!(f, "{}", n),
            UnitId::Str(s) => write!(f, "{:?}", s),
        }
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnitId::Int(n) => write!(f, "{}", n),
            UnitId::Str(s) => f.write_str(s),
        }
    }
}

impl From<i64> for UnitId {
    fn from(n: i64) -> Self {
        UnitId::Int(n)
    }
}

impl From<i32> for UnitId {
    fn from(n: i32) -> Self {
        UnitId::Int(n as i64)
    }
}

impl From<&str> for UnitId {
    fn from(s: &str) -> Self {
        UnitId::Str(s.to_string())
    }
}

impl From<String> for UnitId {
    fn from(s: String) -> Self {
        UnitId::Str(s)
    }
}

/// Build a `Vec<UnitId>` from anything convertible (test and call-site sugar).
pub fn unit_ids<I, T>(ids: I) -> Vec<UnitId>
where
    I: IntoIterator<Item = T>,
    T: Into<UnitId>,
{
    ids.into_iter().map(Into::into).collect()
}

// ---------------------------------------------------------------------------
// UnitIdArg
// ---------------------------------------------------------------------------

/// `unitId` field of the label actions: a single id or a list of ids.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UnitIdArg {
    One(UnitId),
    Many(Vec<UnitId>),
}

impl UnitIdArg {
    /// Normalize to a slice-like list of targets.
    pub fn to_vec(&self) -> Vec<UnitId> {
        match self {
            UnitIdArg::One(id) => vec![id.clone()],
            UnitIdArg::Many(ids) => ids.clone(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            UnitIdArg::One(_) => 1,
            UnitIdArg::Many(ids) => ids.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<UnitId> for UnitIdArg {
    fn from(id: UnitId) -> Self {
        UnitIdArg::One(id)
    }
}

impl From<Vec<UnitId>> for UnitIdArg {
    fn from(ids: Vec<UnitId>) -> Self {
        UnitIdArg::Many(ids)
    }
}

// ---------------------------------------------------------------------------
// FeedId
// ---------------------------------------------------------------------------

#[derive(Error, Debug, PartialEq, Eq)]
pub enum FeedUriError {
    #[error("Feed URI has no feed id component: {0}")]
    MissingFeedId(String),

    #[error("Cannot specify both a feed id and a feed URI")]
    Ambiguous,

    #[error("Neither a feed id nor a feed URI was given")]
    Missing,
}

/// Identifier of a remote append-only feed.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeedId(String);

impl FeedId {
    pub fn new(id: impl Into<String>) -> Self {
        FeedId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Extract the feed id from a feed URI such as `feed://<id>/...`.
    ///
    /// The id is the third `/`-separated component: the first path segment
    /// after the scheme's `//`.
    pub fn from_uri(uri: &str) -> Result<Self, FeedUriError> {
        match uri.split('/').nth(2) {
            Some(id) if !id.is_empty() => Ok(FeedId(id.to_string())),
            _ => Err(FeedUriError::MissingFeedId(uri.to_string())),
        }
    }

    /// Resolve a feed from exactly one of an id or a URI.
    pub fn resolve(feed_id: Option<&str>, feed_uri: Option<&str>) -> Result<Self, FeedUriError> {
        match (feed_id, feed_uri) {
            (Some(_), Some(_)) => Err(FeedUriError::Ambiguous),
            (Some(id), None) => Ok(FeedId::new(id)),
            (None, Some(uri)) => FeedId::from_uri(uri),
            (None, None) => Err(FeedUriError::Missing),
        }
    }
}

impl fmt::Debug for FeedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let short = self.0.get(..8).unwrap_or(&self.0);
        write!(f, "FeedId({})", short)
    }
}

impl fmt::Display for FeedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// UserId
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        UserId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
