//! Named broadcast groups and their connection membership.
//!
//! [`GroupRegistry`] is the only shared mutable state in the gateway. The
//! membership tables are guarded by a [`tokio::sync::RwLock`]: `join`,
//! `leave` and `evict` take the write lock, `publish` takes the read lock
//! for the whole fan-out pass. Delivery never waits on a peer (frames go
//! into each connection's bounded queue with `try_send`), so holding the
//! read lock while delivering keeps the pass short and gives every publish
//! an atomic membership snapshot.

use std::collections::{HashMap, HashSet};

use tokio::sync::RwLock;

use super::ConnectionId;
use super::connection::{ConnectionHandle, DeliveryError, Frame};

/// Result of one fan-out pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishOutcome {
    /// Number of members the frame was queued for.
    pub delivered: usize,
    /// Members that could not accept the frame and were evicted.
    pub evicted: Vec<ConnectionId>,
}

/// Name and current size of a group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupSummary {
    /// Group name.
    pub name: String,
    /// Number of member connections.
    pub members: usize,
}

/// Both directions of the membership relation, kept in step under one lock.
#[derive(Debug, Default)]
struct Membership {
    /// Group name to its members.
    groups: HashMap<String, HashMap<ConnectionId, ConnectionHandle>>,
    /// Connection to the names of the groups it has joined.
    joined: HashMap<ConnectionId, HashSet<String>>,
}

impl Membership {
    fn remove(&mut self, group: &str, id: ConnectionId) -> Option<ConnectionHandle> {
        let members = self.groups.get_mut(group)?;
        let handle = members.remove(&id)?;
        if members.is_empty() {
            self.groups.remove(group);
        }
        if let Some(names) = self.joined.get_mut(&id) {
            names.remove(group);
            if names.is_empty() {
                self.joined.remove(&id);
            }
        }
        Some(handle)
    }

    /// Drops `id` from every group it joined, pruning groups left empty.
    fn remove_everywhere(&mut self, id: ConnectionId) -> usize {
        let Some(names) = self.joined.remove(&id) else {
            return 0;
        };
        let mut removed = 0;
        for name in names {
            let Some(members) = self.groups.get_mut(&name) else {
                continue;
            };
            if let Some(handle) = members.remove(&id) {
                handle.liveness().mark_closed();
                removed += 1;
            }
            if members.is_empty() {
                self.groups.remove(&name);
            }
        }
        removed
    }
}

/// In-memory group membership registry.
///
/// # Concurrency
///
/// - A connection that leaves before a `publish` begins never receives it.
/// - A connection that joins after a `publish` has taken its snapshot does
///   not receive it.
/// - Empty groups are pruned on `leave` and `evict`; publishing to an
///   unknown group is a no-op.
#[derive(Debug)]
pub struct GroupRegistry {
    inner: RwLock<Membership>,
}

impl GroupRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Membership::default()),
        }
    }

    /// Adds a connection to `group`, creating the group on first join.
    ///
    /// Returns `true` if the connection was added. Re-adding a current
    /// member, or adding a connection that is already torn down, is a
    /// no-op returning `false`.
    pub async fn join(&self, group: &str, handle: ConnectionHandle) -> bool {
        if !handle.is_alive() {
            return false;
        }
        let id = handle.id();
        let mut inner = self.inner.write().await;
        let members = inner.groups.entry(group.to_string()).or_default();
        if members.contains_key(&id) {
            return false;
        }
        tracing::debug!(group, conn_id = %id, subject = %handle.subject(), "joined group");
        members.insert(id, handle);
        inner.joined.entry(id).or_default().insert(group.to_string());
        true
    }

    /// Removes a connection from `group`.
    ///
    /// Returns `true` if the connection was a member. Leaving a group the
    /// connection is not in is a no-op.
    pub async fn leave(&self, group: &str, id: ConnectionId) -> bool {
        let removed = self.inner.write().await.remove(group, id).is_some();
        if removed {
            tracing::debug!(group, conn_id = %id, "left group");
        }
        removed
    }

    /// Removes a connection from every group it joined and clears its
    /// liveness flag.
    ///
    /// Returns the number of groups it was removed from.
    pub async fn evict(&self, id: ConnectionId) -> usize {
        let removed = self.inner.write().await.remove_everywhere(id);
        if removed > 0 {
            tracing::debug!(conn_id = %id, groups = removed, "evicted connection");
        }
        removed
    }

    /// Queues `frame` for every live member of `group`.
    ///
    /// Each member is delivered to independently. A member whose queue is
    /// full or closed is marked closed and removed from every group once
    /// the pass completes; other members are unaffected.
    pub async fn publish(&self, group: &str, frame: &Frame) -> PublishOutcome {
        let mut outcome = PublishOutcome::default();
        {
            let inner = self.inner.read().await;
            let Some(members) = inner.groups.get(group) else {
                return outcome;
            };
            for handle in members.values() {
                match handle.deliver(frame) {
                    Ok(()) => outcome.delivered += 1,
                    Err(err) => {
                        if err == DeliveryError::QueueFull {
                            tracing::warn!(group, conn_id = %handle.id(), "outbound queue overflow, closing connection");
                        }
                        handle.liveness().mark_closed();
                        outcome.evicted.push(handle.id());
                    }
                }
            }
        }

        if !outcome.evicted.is_empty() {
            let mut inner = self.inner.write().await;
            for id in &outcome.evicted {
                inner.remove_everywhere(*id);
            }
        }

        tracing::debug!(
            group,
            delivered = outcome.delivered,
            evicted = outcome.evicted.len(),
            "published frame"
        );
        outcome
    }

    /// Returns the number of members in `group` (zero for unknown groups).
    pub async fn member_count(&self, group: &str) -> usize {
        self.inner
            .read()
            .await
            .groups
            .get(group)
            .map_or(0, HashMap::len)
    }

    /// Returns `true` if `id` is currently a member of `group`.
    pub async fn is_member(&self, group: &str, id: ConnectionId) -> bool {
        self.inner
            .read()
            .await
            .groups
            .get(group)
            .is_some_and(|members| members.contains_key(&id))
    }

    /// Returns the names of the groups `id` has joined, sorted.
    pub async fn joined_groups(&self, id: ConnectionId) -> Vec<String> {
        let mut names: Vec<String> = self
            .inner
            .read()
            .await
            .joined
            .get(&id)
            .map(|names| names.iter().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }

    /// Returns the number of non-empty groups.
    pub async fn group_count(&self) -> usize {
        self.inner.read().await.groups.len()
    }

    /// Returns the number of distinct connections across all groups.
    pub async fn connection_count(&self) -> usize {
        self.inner.read().await.joined.len()
    }

    /// Returns a name-sorted summary of every group.
    pub async fn groups(&self) -> Vec<GroupSummary> {
        let inner = self.inner.read().await;
        let mut summaries: Vec<GroupSummary> = inner
            .groups
            .iter()
            .map(|(name, members)| GroupSummary {
                name: name.clone(),
                members: members.len(),
            })
            .collect();
        summaries.sort_by(|a, b| a.name.cmp(&b.name));
        summaries
    }
}

impl Default for GroupRegistry {
    fn default() -> Self {
        Self::new()
    }
}
