//! Per-resource state cache
//!
//! The cache is tri-state so that "never queried" and "queried, not there"
//! can never be confused. It lives inside a single resource for one process
//! run: no persistence, no expiry, no sharing.

/// Last observed state of one resource
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StateCache<T> {
    /// Never queried
    #[default]
    NotRead,
    /// Queried, the object does not exist
    Absent,
    /// Queried, the object exists
    Present(T),
}

impl<T> StateCache<T> {
    /// Current cached value
    pub fn get(&self) -> &Self {
        self
    }

    /// Record the result of a read. `None` means the backend reported absence.
    pub fn set(&mut self, value: Option<T>) {
        *self = match value {
            Some(snapshot) => Self::Present(snapshot),
            None => Self::Absent,
        };
    }

    /// Whether a read has populated the cache
    pub fn is_known(&self) -> bool {
        !matches!(self, Self::NotRead)
    }

    /// Whether the cache says the object exists
    pub fn is_present(&self) -> bool {
        matches!(self, Self::Present(_))
    }

    /// Whether the cache says the object is known to be missing
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    /// Cached snapshot, if the object is known to exist
    pub fn present(&self) -> Option<&T> {
        match self {
            Self::Present(snapshot) => Some(snapshot),
            _ => None,
        }
    }

    /// Forget the cached value
    pub fn clear(&mut self) {
        *self = Self::NotRead;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_not_read() {
        let cache: StateCache<u32> = StateCache::default();
        assert!(!cache.is_known());
        assert!(cache.present().is_none());
        assert!(!cache.is_absent());
    }

    #[test]
    fn test_set_absent_is_known() {
        let mut cache: StateCache<u32> = StateCache::default();
        cache.set(None);
        assert!(cache.is_known());
        assert!(cache.is_absent());
        assert_eq!(cache.get(), &StateCache::Absent);
    }

    #[test]
    fn test_set_present_then_clear() {
        let mut cache = StateCache::default();
        cache.set(Some("live"));
        assert_eq!(cache.present(), Some(&"live"));

        cache.clear();
        assert_eq!(cache, StateCache::NotRead);
    }
}
