//! Broadcast hub: fan-in from every connection's reader, fan-out to every
//! joined connection's outbound queue.
//!
//! Membership lives behind a single `parking_lot::Mutex` that is held only
//! to snapshot or mutate the set. Deliveries are `try_send`s into bounded
//! per-connection queues made after the lock is released, so a slow
//! recipient can never stall a publisher, a join, or another recipient.
//! A recipient whose queue is full or closed is dropped from the room.

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::error::RelayError;

use super::connection::{ChatMessage, ClientConnection};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HubError {
    #[error("chat hub is closed")]
    Closed,
    /// The membership key space ran out. Membership can no longer be
    /// tracked reliably.
    #[error("chat hub membership keys exhausted")]
    MembershipExhausted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct MembershipKey(u64);

/// Proof of one membership, returned by [`BroadcastHub::join`] and used to
/// leave again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    key: MembershipKey,
    connection_id: String,
}

impl Subscription {
    pub fn connection_id(&self) -> &str {
        &self.connection_id
    }
}

/// Outcome of one [`BroadcastHub::publish`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Delivery {
    /// Recipients the message was queued for.
    pub delivered: usize,
    /// Recipients that could not take it and were removed.
    pub dropped: usize,
}

enum HubState {
    Running(Membership),
    Closed,
}

#[derive(Default)]
struct Membership {
    next_key: u64,
    members: HashMap<MembershipKey, ClientConnection>,
}

/// The single chat room. Share it behind an `Arc`.
pub struct BroadcastHub {
    state: Mutex<HubState>,
}

impl BroadcastHub {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(HubState::Running(Membership::default())),
        }
    }

    /// Register a connection for future fan-out.
    ///
    /// Joining the same connection twice creates two independent
    /// memberships, and it receives every message once per membership.
    pub fn join(&self, connection: ClientConnection) -> Result<Subscription, HubError> {
        let mut state = self.state.lock();
        let HubState::Running(membership) = &mut *state else {
            return Err(HubError::Closed);
        };

        let key = MembershipKey(membership.next_key);
        membership.next_key = membership
            .next_key
            .checked_add(1)
            .ok_or(HubError::MembershipExhausted)?;

        let connection_id = connection.id().to_string();
        membership.members.insert(key, connection);
        let members = membership.members.len();
        drop(state);

        tracing::info!(connection_id = %connection_id, members, "connection joined chat");
        Ok(Subscription { key, connection_id })
    }

    /// Remove a membership. Returns `false` if it was already gone.
    pub fn leave(&self, subscription: &Subscription) -> bool {
        let (removed, members) = {
            let mut state = self.state.lock();
            match &mut *state {
                HubState::Running(membership) => (
                    membership.members.remove(&subscription.key),
                    membership.members.len(),
                ),
                HubState::Closed => (None, 0),
            }
        };

        let Some(connection) = removed else {
            return false;
        };
        // The hub's sender goes with it; the writer sees its queue close.
        drop(connection);

        tracing::info!(
            connection_id = %subscription.connection_id,
            members,
            "connection left chat"
        );
        true
    }

    /// Queue `message` for every connection joined at the moment fan-out
    /// begins.
    ///
    /// Never waits on a recipient. Recipients that cannot take the message
    /// are removed; their failure is reported only in the returned
    /// [`Delivery`].
    pub fn publish(&self, message: impl Into<ChatMessage>) -> Result<Delivery, HubError> {
        let message = message.into();

        let recipients: Vec<(MembershipKey, ClientConnection)> = {
            let state = self.state.lock();
            let HubState::Running(membership) = &*state else {
                return Err(HubError::Closed);
            };
            membership
                .members
                .iter()
                .map(|(key, connection)| (*key, connection.clone()))
                .collect()
        };

        let mut delivery = Delivery::default();
        let mut failed = Vec::new();
        for (key, connection) in &recipients {
            match connection.try_deliver(message.clone()) {
                Ok(()) => delivery.delivered += 1,
                Err(reason) => {
                    let err = RelayError::RecipientSendFailed {
                        connection_id: connection.id().to_string(),
                        reason,
                    };
                    tracing::warn!(error = %err, "dropping chat recipient");
                    failed.push(*key);
                }
            }
        }
        drop(recipients);

        if !failed.is_empty() {
            delivery.dropped = failed.len();
            let evicted: Vec<ClientConnection> = {
                let mut state = self.state.lock();
                match &mut *state {
                    HubState::Running(membership) => failed
                        .iter()
                        .filter_map(|key| membership.members.remove(key))
                        .collect(),
                    HubState::Closed => Vec::new(),
                }
            };
            drop(evicted);
        }

        Ok(delivery)
    }

    /// Close the room. Further joins and publishes fail with
    /// [`HubError::Closed`]; every held connection is released without
    /// sending anything. Returns how many memberships were released.
    pub fn shutdown(&self) -> usize {
        let previous = std::mem::replace(&mut *self.state.lock(), HubState::Closed);
        let released = match previous {
            HubState::Running(membership) => membership.members.len(),
            HubState::Closed => return 0,
        };
        tracing::info!(released, "chat hub shut down");
        released
    }

    pub fn is_closed(&self) -> bool {
        matches!(*self.state.lock(), HubState::Closed)
    }

    pub fn is_joined(&self, subscription: &Subscription) -> bool {
        match &*self.state.lock() {
            HubState::Running(membership) => membership.members.contains_key(&subscription.key),
            HubState::Closed => false,
        }
    }

    pub fn member_count(&self) -> usize {
        match &*self.state.lock() {
            HubState::Running(membership) => membership.members.len(),
            HubState::Closed => 0,
        }
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new()
    }
}
