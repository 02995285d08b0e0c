//! Annotation page cache state machine.

use crate::error::{AdapterError, AdapterResult};
use annopage_protocol::AnnotationPage;
use parking_lot::RwLock;
use std::fmt;

/// The state of a canvas's page cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheState {
    /// No query has succeeded yet.
    #[default]
    Unloaded,
    /// The store has no page for the canvas; an unpersisted stub is held.
    Empty,
    /// A persisted page is held.
    Loaded,
    /// A mutation is in flight; the held page is about to be replaced.
    StaleAfterWrite,
}

impl CacheState {
    /// Returns true if the cache holds a page that can be served or mutated.
    pub fn is_warm(&self) -> bool {
        matches!(self, CacheState::Empty | CacheState::Loaded)
    }

    fn settled(page: &AnnotationPage) -> Self {
        if page.is_persisted() {
            CacheState::Loaded
        } else {
            CacheState::Empty
        }
    }
}

impl fmt::Display for CacheState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CacheState::Unloaded => "unloaded",
            CacheState::Empty => "empty",
            CacheState::Loaded => "loaded",
            CacheState::StaleAfterWrite => "stale-after-write",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Default)]
struct Slot {
    state: CacheState,
    page: Option<AnnotationPage>,
    /// State to return to if the in-flight write is abandoned.
    resume: CacheState,
}

/// The single cached page of one canvas.
///
/// The held page is only ever replaced by a new value. During a write the
/// old value stays readable, so an abandoned write leaves it untouched.
#[derive(Debug, Default)]
pub struct PageCache {
    slot: RwLock<Slot>,
}

impl PageCache {
    /// Creates an unloaded cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Gets the current state.
    pub fn state(&self) -> CacheState {
        self.slot.read().state
    }

    /// Returns the held page, if any.
    pub fn page(&self) -> Option<AnnotationPage> {
        self.slot.read().page.clone()
    }

    /// Returns the held page if the cache is warm.
    pub fn warm_page(&self) -> Option<AnnotationPage> {
        let slot = self.slot.read();
        if slot.state.is_warm() {
            slot.page.clone()
        } else {
            None
        }
    }

    /// Stores the result of a page query.
    pub fn fill(&self, page: AnnotationPage) -> AdapterResult<CacheState> {
        let mut slot = self.slot.write();
        let next = CacheState::settled(&page);
        if slot.state == CacheState::StaleAfterWrite {
            return Err(transition(slot.state, next));
        }
        slot.state = next;
        slot.page = Some(page);
        Ok(next)
    }

    /// Marks the cache stale and returns the write in flight.
    ///
    /// Dropping the returned [`PendingWrite`] without committing it restores
    /// the previous state, so a cancelled mutation cannot wedge the cache.
    pub fn begin_write(&self) -> AdapterResult<PendingWrite<'_>> {
        let mut slot = self.slot.write();
        let page = match (slot.state.is_warm(), slot.page.clone()) {
            (true, Some(page)) => page,
            _ => return Err(transition(slot.state, CacheState::StaleAfterWrite)),
        };
        slot.resume = slot.state;
        slot.state = CacheState::StaleAfterWrite;
        Ok(PendingWrite {
            cache: self,
            page,
            finished: false,
        })
    }

    fn commit(&self, page: AnnotationPage) -> AdapterResult<CacheState> {
        let mut slot = self.slot.write();
        let next = CacheState::settled(&page);
        if slot.state != CacheState::StaleAfterWrite {
            return Err(transition(slot.state, next));
        }
        slot.state = next;
        slot.page = Some(page);
        Ok(next)
    }

    fn abort(&self) {
        let mut slot = self.slot.write();
        if slot.state == CacheState::StaleAfterWrite {
            slot.state = slot.resume;
        }
    }

    /// Drops the held page so the next read queries the store.
    pub fn invalidate(&self) -> AdapterResult<()> {
        let mut slot = self.slot.write();
        if slot.state == CacheState::StaleAfterWrite {
            return Err(transition(slot.state, CacheState::Unloaded));
        }
        *slot = Slot::default();
        Ok(())
    }
}

/// A write in flight against a [`PageCache`].
///
/// Holds the page the write starts from. Committing replaces the cached page;
/// aborting or dropping keeps the last known good one.
#[derive(Debug)]
pub struct PendingWrite<'a> {
    cache: &'a PageCache,
    page: AnnotationPage,
    finished: bool,
}

impl PendingWrite<'_> {
    /// Returns the page the write starts from.
    pub fn page(&self) -> &AnnotationPage {
        &self.page
    }

    /// Replaces the cached page with the store's response to the write.
    pub fn commit(mut self, page: AnnotationPage) -> AdapterResult<CacheState> {
        self.finished = true;
        self.cache.commit(page)
    }

    /// Abandons the write.
    pub fn abort(mut self) {
        self.finished = true;
        self.cache.abort();
    }
}

impl Drop for PendingWrite<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.cache.abort();
        }
    }
}

fn transition(from: CacheState, to: CacheState) -> AdapterError {
    AdapterError::InvalidStateTransition {
        from: from.to_string(),
        to: to.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn persisted(canvas: &str, id: &str) -> AnnotationPage {
        AnnotationPage::new(canvas).with_id(id)
    }

    #[test]
    fn fill_settles_by_persistence() {
        let cache = PageCache::new();
        assert_eq!(cache.state(), CacheState::Unloaded);
        assert!(cache.warm_page().is_none());

        assert_eq!(cache.fill(AnnotationPage::new("C1")).unwrap(), CacheState::Empty);
        assert_eq!(cache.fill(persisted("C1", "P1")).unwrap(), CacheState::Loaded);
        assert_eq!(cache.warm_page().unwrap().id().unwrap().as_str(), "P1");
    }

    #[test]
    fn write_requires_warm_cache() {
        let cache = PageCache::new();
        let result = cache.begin_write();
        assert!(matches!(
            result,
            Err(AdapterError::InvalidStateTransition { ref from, .. }) if from == "unloaded"
        ));
    }

    #[test]
    fn first_write_moves_empty_to_loaded() {
        let cache = PageCache::new();
        cache.fill(AnnotationPage::new("C1")).unwrap();

        let write = cache.begin_write().unwrap();
        assert!(!write.page().is_persisted());
        assert_eq!(cache.state(), CacheState::StaleAfterWrite);
        assert!(cache.warm_page().is_none());
        assert!(cache.page().is_some());

        assert_eq!(write.commit(persisted("C1", "P1")).unwrap(), CacheState::Loaded);
    }

    #[test]
    fn abort_restores_previous_state() {
        let cache = PageCache::new();
        cache.fill(persisted("C1", "P1")).unwrap();

        cache.begin_write().unwrap().abort();
        assert_eq!(cache.state(), CacheState::Loaded);
        assert_eq!(cache.page().unwrap().id().unwrap().as_str(), "P1");

        // Nothing to abort.
        cache.abort();
        assert_eq!(cache.state(), CacheState::Loaded);
    }

    #[test]
    fn dropped_write_restores_previous_state() {
        let cache = PageCache::new();
        cache.fill(AnnotationPage::new("C1")).unwrap();

        let write = cache.begin_write().unwrap();
        drop(write);
        assert_eq!(cache.state(), CacheState::Empty);
        assert!(cache.warm_page().is_some());

        cache.fill(persisted("C1", "P1")).unwrap();
        cache.invalidate().unwrap();
        assert_eq!(cache.state(), CacheState::Unloaded);
    }

    #[test]
    fn commit_outside_write_is_rejected() {
        let cache = PageCache::new();
        cache.fill(persisted("C1", "P1")).unwrap();
        assert!(cache.commit(persisted("C1", "P2")).is_err());
        assert_eq!(cache.page().unwrap().id().unwrap().as_str(), "P1");
    }

    #[test]
    fn no_fill_or_invalidate_mid_write() {
        let cache = PageCache::new();
        cache.fill(persisted("C1", "P1")).unwrap();
        let write = cache.begin_write().unwrap();

        assert!(cache.fill(persisted("C1", "P9")).is_err());
        assert!(cache.invalidate().is_err());

        write.abort();
        cache.invalidate().unwrap();
        assert_eq!(cache.state(), CacheState::Unloaded);
        assert!(cache.page().is_none());
    }
}
