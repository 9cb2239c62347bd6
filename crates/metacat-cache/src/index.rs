//! Name index shared by the lookup and composite caches

use crate::config::NameCase;
use crate::state::LoadState;
use indexmap::IndexMap;
use metacat_core::CachedObject;
use std::collections::HashSet;
use std::sync::Arc;

/// Insertion-ordered map of materialized objects keyed by (normalized) name.
///
/// Order is first-seen order: replacing an object keeps its original slot.
#[derive(Debug)]
pub(crate) struct ObjectIndex<E> {
    objects: IndexMap<String, Arc<E>>,
    state: LoadState,
    name_case: NameCase,
}

impl<E: CachedObject> ObjectIndex<E> {
    pub(crate) fn new(name_case: NameCase) -> Self {
        Self {
            objects: IndexMap::new(),
            state: LoadState::NotLoaded,
            name_case,
        }
    }

    /// Empty index with the same name handling, used to stage a full load
    pub(crate) fn staging(&self) -> Self {
        Self::new(self.name_case)
    }

    pub(crate) fn key(&self, name: &str) -> String {
        self.name_case.normalize(name).into_owned()
    }

    pub(crate) fn same_name(&self, a: &str, b: &str) -> bool {
        self.name_case.normalize(a) == self.name_case.normalize(b)
    }

    pub(crate) fn state(&self) -> LoadState {
        self.state
    }

    pub(crate) fn is_fully_loaded(&self) -> bool {
        self.state.is_loaded()
    }

    pub(crate) fn get(&self, name: &str) -> Option<Arc<E>> {
        self.objects.get(&*self.name_case.normalize(name)).cloned()
    }

    pub(crate) fn values(&self) -> Vec<Arc<E>> {
        self.objects.values().cloned().collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.objects.len()
    }

    /// Insert or replace by name. Returns the replaced object.
    pub(crate) fn insert(&mut self, object: Arc<E>) -> Option<Arc<E>> {
        let key = self.key(object.name());
        self.objects.insert(key, object)
    }

    pub(crate) fn remove(&mut self, name: &str) -> Option<Arc<E>> {
        let key = self.key(name);
        self.objects.shift_remove(&key)
    }

    /// Drop every object whose key is not in `keep`
    pub(crate) fn retain_keys(&mut self, keep: &HashSet<String>) -> usize {
        let before = self.objects.len();
        self.objects.retain(|key, _| keep.contains(key));
        before - self.objects.len()
    }

    /// Enter `Loading`, returning the state to restore if the load fails
    pub(crate) fn begin_load(&mut self) -> LoadState {
        std::mem::replace(&mut self.state, LoadState::Loading)
    }

    /// Back out of a load that did not complete
    pub(crate) fn abort_load(&mut self, previous: LoadState) {
        if self.state.is_loading() {
            self.state = previous;
        }
    }

    pub(crate) fn mark_loaded(&mut self) {
        self.state = LoadState::Loaded;
    }

    /// Adopt a staged full load and mark it complete.
    ///
    /// Names already published keep their instance and the staged copy is
    /// dropped; names the load did not report are removed. Order follows the
    /// staged load. Returns how many instances were kept.
    pub(crate) fn commit(&mut self, staged: ObjectIndex<E>) -> usize {
        let mut kept = 0;
        let objects: IndexMap<String, Arc<E>> = staged
            .objects
            .into_iter()
            .map(|(key, object)| match self.objects.get(&key) {
                Some(existing) => {
                    kept += 1;
                    (key, Arc::clone(existing))
                }
                None => (key, object),
            })
            .collect();
        self.objects = objects;
        self.state = LoadState::Loaded;
        kept
    }

    /// Replace the contents outright with objects built elsewhere
    pub(crate) fn replace(&mut self, staged: ObjectIndex<E>) {
        self.objects = staged.objects;
        self.state = LoadState::Loaded;
    }

    pub(crate) fn clear(&mut self) {
        self.objects.clear();
        self.state = LoadState::NotLoaded;
    }
}
