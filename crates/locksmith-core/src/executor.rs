//! The request executor: the only seam between this crate and a vault.
//!
//! An executor receives a request mapping plus an [`Operation`] and answers
//! with a [`Response`] carrying a provider [`Status`] and, for queries, an
//! optional result mapping. Executors hold no identity state between calls.
//!
//! Any `Fn(&AttributeMap, &Operation) -> Response + Send + Sync` closure is
//! an executor, which keeps ad-hoc test doubles one line long. For recorded
//! interactions use [`StubExecutor`].

use std::collections::VecDeque;
use std::fmt;
use std::sync::Mutex;

use crate::value::{AttributeMap, keys};

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Provider status vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Success,
    DuplicateItem,
    ItemNotFound,
    /// The provider rejected a key or value in the request.
    InvalidParameter,
    /// The vault is unreachable, locked, or access was denied.
    Unavailable,
    /// More than one item matched a single-item request.
    AmbiguousMatch,
    /// A provider-specific code outside the vocabulary above.
    Other(i32),
}

impl Status {
    /// Map a Security-framework style numeric status.
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => Self::Success,
            -25299 => Self::DuplicateItem,
            -25300 => Self::ItemNotFound,
            -50 => Self::InvalidParameter,
            // not available, interaction not allowed, auth failed
            -25291 | -25308 | -25293 => Self::Unavailable,
            other => Self::Other(other),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => f.write_str("success"),
            Self::DuplicateItem => f.write_str("duplicate item"),
            Self::ItemNotFound => f.write_str("item not found"),
            Self::InvalidParameter => f.write_str("invalid parameter"),
            Self::Unavailable => f.write_str("unavailable"),
            Self::AmbiguousMatch => f.write_str("ambiguous match"),
            Self::Other(code) => write!(f, "provider status {code}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Operation
// ---------------------------------------------------------------------------

/// Options for a [`Operation::QueryItem`] request.
///
/// Every query runs with a match limit of [`QueryOptions::MATCH_LIMIT`]: a
/// provider that finds more items than that answers
/// [`Status::AmbiguousMatch`] instead of picking one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryOptions {
    /// Include the item's attributes in the result.
    pub return_attributes: bool,
    /// Include the payload blob in the result.
    pub return_data: bool,
}

impl QueryOptions {
    /// Most items a query may match.
    pub const MATCH_LIMIT: usize = 1;

    /// Return every attribute and the payload of the one matching item.
    pub fn single_item() -> Self {
        Self {
            return_attributes: true,
            return_data: true,
        }
    }

    /// The part of a stored `item` these options ask for. Identity keys are
    /// always kept.
    pub fn apply(&self, item: &AttributeMap) -> AttributeMap {
        item.iter()
            .filter(|(key, _)| {
                if *key == keys::DATA {
                    self.return_data
                } else {
                    self.return_attributes || keys::IDENTITY.contains(key)
                }
            })
            .map(|(key, value)| (key, value.clone()))
            .collect()
    }
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self::single_item()
    }
}

/// The action an executor performs with a request mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// Insert the request mapping as a new item.
    AddItem,
    /// Find items matching the request mapping.
    QueryItem(QueryOptions),
    /// Apply `changes` to the item matching the request mapping.
    UpdateItem { changes: AttributeMap },
    /// Remove items matching the request mapping.
    DeleteItem,
}

impl Operation {
    /// Short name used in log events.
    pub fn name(&self) -> &'static str {
        match self {
            Self::AddItem => "add",
            Self::QueryItem(_) => "query",
            Self::UpdateItem { .. } => "update",
            Self::DeleteItem => "delete",
        }
    }
}

// ---------------------------------------------------------------------------
// Response
// ---------------------------------------------------------------------------

/// Outcome of a single executor call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: Status,
    pub result: Option<AttributeMap>,
}

impl Response {
    /// A successful response without a result mapping.
    pub fn success() -> Self {
        Self::with_status(Status::Success)
    }

    /// A successful query response carrying `result`.
    pub fn found(result: AttributeMap) -> Self {
        Self {
            status: Status::Success,
            result: Some(result),
        }
    }

    pub fn with_status(status: Status) -> Self {
        Self {
            status,
            result: None,
        }
    }
}

impl From<Status> for Response {
    fn from(status: Status) -> Self {
        Self::with_status(status)
    }
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Performs one request against a vault provider.
///
/// Implementations must be `Send + Sync` and must not keep per-identity
/// state between calls: everything a call needs is in its arguments.
pub trait RequestExecutor: Send + Sync {
    fn perform(&self, request: &AttributeMap, operation: &Operation) -> Response;
}

impl<F> RequestExecutor for F
where
    F: Fn(&AttributeMap, &Operation) -> Response + Send + Sync,
{
    fn perform(&self, request: &AttributeMap, operation: &Operation) -> Response {
        self(request, operation)
    }
}

// ---------------------------------------------------------------------------
// Stub
// ---------------------------------------------------------------------------

/// A deterministic executor that records every call and replays canned
/// responses.
///
/// Queued responses are returned first, in order; once the queue is empty
/// the fallback response is returned.
#[derive(Debug)]
pub struct StubExecutor {
    fallback: Response,
    queued: Mutex<VecDeque<Response>>,
    calls: Mutex<Vec<(AttributeMap, Operation)>>,
}

impl StubExecutor {
    /// A stub that always answers with `response`.
    pub fn new(response: impl Into<Response>) -> Self {
        Self {
            fallback: response.into(),
            queued: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// A stub that always answers [`Status::Success`] without a result.
    pub fn succeeding() -> Self {
        Self::new(Response::success())
    }

    /// Queue `response` ahead of the fallback.
    pub fn push_response(&self, response: impl Into<Response>) {
        lock(&self.queued).push_back(response.into());
    }

    /// Every `(request, operation)` pair received so far.
    pub fn calls(&self) -> Vec<(AttributeMap, Operation)> {
        lock(&self.calls).clone()
    }

    /// The most recent call, if any.
    pub fn last_call(&self) -> Option<(AttributeMap, Operation)> {
        lock(&self.calls).last().cloned()
    }
}

impl RequestExecutor for StubExecutor {
    fn perform(&self, request: &AttributeMap, operation: &Operation) -> Response {
        lock(&self.calls).push((request.clone(), operation.clone()));
        lock(&self.queued)
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone())
    }
}

/// Lock a mutex, recovering the data if a previous holder panicked.
fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
