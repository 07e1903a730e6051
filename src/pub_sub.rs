//! Channel subscriptions for SUBSCRIBE / PUBLISH.

use std::collections::{BTreeSet, HashMap};

use bytes::Bytes;
use dashmap::DashMap;
use tokio::sync::mpsc::UnboundedSender;

use crate::{connection::ConnectionId, resp::RespValue};

#[derive(Default)]
pub struct ChannelManager {
    channels: DashMap<String, HashMap<ConnectionId, UnboundedSender<Bytes>>>,
    subscriptions: DashMap<ConnectionId, BTreeSet<String>>,
}

impl ChannelManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns how many channels the connection is subscribed to afterwards.
    pub fn subscribe(
        &self,
        connection: ConnectionId,
        channel: &str,
        outbound: UnboundedSender<Bytes>,
    ) -> usize {
        let mut subscribed = self.subscriptions.entry(connection).or_default();
        subscribed.insert(channel.to_string());

        self.channels
            .entry(channel.to_string())
            .or_default()
            .insert(connection, outbound);

        subscribed.len()
    }

    /// Returns how many channels the connection is still subscribed to.
    pub fn unsubscribe(&self, connection: ConnectionId, channel: &str) -> usize {
        let remaining = match self.subscriptions.get_mut(&connection) {
            Some(mut subscribed) => {
                subscribed.remove(channel);
                subscribed.len()
            }
            None => 0,
        };

        if remaining == 0 {
            self.subscriptions
                .remove_if(&connection, |_, subscribed| subscribed.is_empty());
        }

        let abandoned = match self.channels.get_mut(channel) {
            Some(mut subscribers) => {
                subscribers.remove(&connection);
                subscribers.is_empty()
            }
            None => false,
        };

        if abandoned {
            self.channels
                .remove_if(channel, |_, subscribers| subscribers.is_empty());
        }

        remaining
    }

    /// Unsubscribes from every channel in name order, reporting the count left after
    /// each one.
    pub fn unsubscribe_all(&self, connection: ConnectionId) -> Vec<(String, usize)> {
        self.channels_of(connection)
            .into_iter()
            .map(|channel| {
                let remaining = self.unsubscribe(connection, &channel);
                (channel, remaining)
            })
            .collect()
    }

    pub fn channels_of(&self, connection: ConnectionId) -> Vec<String> {
        self.subscriptions
            .get(&connection)
            .map(|subscribed| subscribed.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn is_subscribed(&self, connection: ConnectionId) -> bool {
        self.subscriptions.contains_key(&connection)
    }

    pub fn subscriber_count(&self, channel: &str) -> usize {
        self.channels.get(channel).map_or(0, |subscribers| subscribers.len())
    }

    /// Delivers `["message", channel, message]` to every subscriber and returns how
    /// many received it.
    pub fn publish(&self, channel: &str, message: &str) -> usize {
        let Some(subscribers) = self.channels.get(channel) else {
            return 0;
        };

        let payload = RespValue::array_from_strings(["message", channel, message]).to_bytes();

        subscribers
            .values()
            .filter(|outbound| outbound.send(payload.clone()).is_ok())
            .count()
    }
}
