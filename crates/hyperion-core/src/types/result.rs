//! Fetch and resolve outcomes

/// What an upstream said about a key
///
/// `NotFound` is a successful answer ("no such entity"), never an error.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome<E> {
    Found(E),
    NotFound,
}

impl<E> FetchOutcome<E> {
    pub fn is_found(&self) -> bool {
        matches!(self, FetchOutcome::Found(_))
    }

    pub fn into_option(self) -> Option<E> {
        match self {
            FetchOutcome::Found(entity) => Some(entity),
            FetchOutcome::NotFound => None,
        }
    }

    pub fn map<U, F>(self, f: F) -> FetchOutcome<U>
    where
        F: FnOnce(E) -> U,
    {
        match self {
            FetchOutcome::Found(entity) => FetchOutcome::Found(f(entity)),
            FetchOutcome::NotFound => FetchOutcome::NotFound,
        }
    }
}

impl<E> From<Option<E>> for FetchOutcome<E> {
    fn from(value: Option<E>) -> Self {
        match value {
            Some(entity) => FetchOutcome::Found(entity),
            None => FetchOutcome::NotFound,
        }
    }
}

/// Result of a resolve
#[derive(Debug, Clone, PartialEq)]
pub enum Resolved<E> {
    /// Served from the store; no upstream involved
    Cached(E),
    /// Fetched from the upstream and persisted
    Fetched(E),
    /// The upstream says the key has no entity
    NotFound,
}

impl<E> Resolved<E> {
    /// Check if an entity was produced
    pub fn is_found(&self) -> bool {
        !self.is_not_found()
    }

    /// Check if the upstream reported no entity
    pub fn is_not_found(&self) -> bool {
        matches!(self, Resolved::NotFound)
    }

    /// Check if this came straight from the store
    pub fn is_cached(&self) -> bool {
        matches!(self, Resolved::Cached(_))
    }

    /// Extract the entity, consuming the result
    pub fn value(self) -> Option<E> {
        match self {
            Resolved::Cached(entity) | Resolved::Fetched(entity) => Some(entity),
            Resolved::NotFound => None,
        }
    }

    pub fn as_ref(&self) -> Option<&E> {
        match self {
            Resolved::Cached(entity) | Resolved::Fetched(entity) => Some(entity),
            Resolved::NotFound => None,
        }
    }

    /// Map the entity if present, keeping its provenance
    pub fn map<U, F>(self, f: F) -> Resolved<U>
    where
        F: FnOnce(E) -> U,
    {
        match self {
            Resolved::Cached(entity) => Resolved::Cached(f(entity)),
            Resolved::Fetched(entity) => Resolved::Fetched(f(entity)),
            Resolved::NotFound => Resolved::NotFound,
        }
    }
}
