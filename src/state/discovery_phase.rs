/// Discovery phase definitions for a single category
///
/// This module defines the states a category's URL discovery moves through.
use std::fmt;

/// Represents the current phase of a category's discovery run
///
/// Phases only move forward: `Paginating → SortVarying → Searching → Done`.
/// Any phase may jump straight to `Done` once the category quota is met.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DiscoveryPhase {
    /// Walking the plain listing pages 1..max_pages
    Paginating,

    /// Walking the listing under each alternative sort order
    SortVarying,

    /// Issuing keyword searches scoped to the category
    Searching,

    /// Discovery has finished, either at quota or with all strategies exhausted
    Done,
}

impl DiscoveryPhase {
    /// Returns true once no further pages will be visited
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done)
    }

    /// Returns the phase that follows this one when it runs out of work
    pub fn next(&self) -> Self {
        match self {
            Self::Paginating => Self::SortVarying,
            Self::SortVarying => Self::Searching,
            Self::Searching | Self::Done => Self::Done,
        }
    }

    /// Returns the string used in logs and the run ledger
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Paginating => "paginating",
            Self::SortVarying => "sort_varying",
            Self::Searching => "searching",
            Self::Done => "done",
        }
    }

    /// Returns all phases in order
    pub fn all_phases() -> [Self; 4] {
        [
            Self::Paginating,
            Self::SortVarying,
            Self::Searching,
            Self::Done,
        ]
    }
}

impl fmt::Display for DiscoveryPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
