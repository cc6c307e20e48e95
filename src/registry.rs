// src/registry.rs
//! The list of {render proxy, rigid body} pairs kept in lockstep every tick.

use serde::{Deserialize, Serialize};

use crate::body::BodyHandle;
use crate::events::ListenerHandle;
use crate::scene::ProxyHandle;
use crate::shape::ShapeKind;

/// Stable id handed back by the spawner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PairId(u64);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PairedObject {
    pub id: PairId,
    pub kind: ShapeKind,
    pub proxy: ProxyHandle,
    pub body: BodyHandle,
    pub listener: ListenerHandle,
}

/// Owned by the sandbox and passed explicitly; there is no global list.
#[derive(Debug, Default)]
pub struct PairedRegistry {
    pairs: Vec<PairedObject>,
    next_id: u64,
}

impl PairedRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(
        &mut self,
        kind: ShapeKind,
        proxy: ProxyHandle,
        body: BodyHandle,
        listener: ListenerHandle,
    ) -> PairId {
        let id = PairId(self.next_id);
        self.next_id += 1;
        self.pairs.push(PairedObject { id, kind, proxy, body, listener });
        id
    }

    /// Empties the registry and hands the pairs to the caller, so teardown
    /// never walks a list it is also shrinking.
    pub(crate) fn take_all(&mut self) -> Vec<PairedObject> {
        std::mem::take(&mut self.pairs)
    }

    pub fn get(&self, id: PairId) -> Option<&PairedObject> {
        self.pairs.iter().find(|p| p.id == id)
    }

    pub fn find_by_body(&self, body: BodyHandle) -> Option<&PairedObject> {
        self.pairs.iter().find(|p| p.body == body)
    }

    pub fn contains_body(&self, body: BodyHandle) -> bool {
        self.find_by_body(body).is_some()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PairedObject> {
        self.pairs.iter()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

impl<'a> IntoIterator for &'a PairedRegistry {
    type Item = &'a PairedObject;
    type IntoIter = std::slice::Iter<'a, PairedObject>;

    fn into_iter(self) -> Self::IntoIter {
        self.pairs.iter()
    }
}
