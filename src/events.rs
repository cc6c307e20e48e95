// src/events.rs
//! Collision events raised by the world, and explicit listener subscriptions.

use std::collections::HashMap;

use glam::Vec3;

use crate::body::BodyHandle;

/// Raised once when two bodies start touching.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollisionEvent {
    pub body_a: BodyHandle,
    pub body_b: BodyHandle,
    /// Unit normal pointing from `body_a` to `body_b`.
    pub contact_normal: Vec3,
    pub contact_point: Vec3,
    /// Velocity of b relative to a at the contact point, before the solver ran.
    pub relative_velocity: Vec3,
}

impl CollisionEvent {
    /// Impact speed along the contact normal, `|v_rel · n|`.
    #[inline]
    pub fn impact_speed(&self) -> f32 {
        self.relative_velocity.dot(self.contact_normal).abs()
    }

    #[inline]
    pub fn involves(&self, body: BodyHandle) -> bool {
        self.body_a == body || self.body_b == body
    }

    /// The body on the other side, if `body` is part of this event.
    pub fn other(&self, body: BodyHandle) -> Option<BodyHandle> {
        if self.body_a == body {
            Some(self.body_b)
        } else if self.body_b == body {
            Some(self.body_a)
        } else {
            None
        }
    }
}

/// Disposable subscription token returned when a listener is registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerHandle(u64);

/// Which bodies have collision listeners.
#[derive(Debug, Default, Clone)]
pub struct ListenerSet {
    next_id: u64,
    owners: HashMap<ListenerHandle, BodyHandle>,
    by_body: HashMap<BodyHandle, Vec<ListenerHandle>>,
}

impl ListenerSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, body: BodyHandle) -> ListenerHandle {
        let handle = ListenerHandle(self.next_id);
        self.next_id += 1;
        self.owners.insert(handle, body);
        self.by_body.entry(body).or_default().push(handle);
        handle
    }

    /// Returns false if the handle was already gone.
    pub fn unsubscribe(&mut self, handle: ListenerHandle) -> bool {
        let Some(body) = self.owners.remove(&handle) else {
            return false;
        };
        if let Some(list) = self.by_body.get_mut(&body) {
            list.retain(|&h| h != handle);
            if list.is_empty() {
                self.by_body.remove(&body);
            }
        }
        true
    }

    /// Drops every listener attached to `body`. Returns how many were dropped.
    pub fn remove_body(&mut self, body: BodyHandle) -> usize {
        let Some(list) = self.by_body.remove(&body) else {
            return 0;
        };
        for handle in &list {
            self.owners.remove(handle);
        }
        list.len()
    }

    pub fn listeners_of(&self, body: BodyHandle) -> &[ListenerHandle] {
        self.by_body.get(&body).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn owner(&self, handle: ListenerHandle) -> Option<BodyHandle> {
        self.owners.get(&handle).copied()
    }

    pub fn len(&self) -> usize {
        self.owners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }
}
