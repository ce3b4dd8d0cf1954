//! Per-connection subscription manager.
//!
//! Tracks which topics a WebSocket client follows.

use std::collections::HashSet;

use super::messages::Topic;

/// Manages the set of topic subscriptions for a single WebSocket connection.
#[derive(Debug, Default)]
pub struct SubscriptionManager {
    topics: HashSet<Topic>,
}

impl SubscriptionManager {
    /// Creates a new empty subscription manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds topics, returning those that were not subscribed before.
    pub fn subscribe(&mut self, topics: &[Topic]) -> Vec<Topic> {
        topics
            .iter()
            .copied()
            .filter(|topic| self.topics.insert(*topic))
            .collect()
    }

    /// Removes topics, returning those that were subscribed.
    pub fn unsubscribe(&mut self, topics: &[Topic]) -> Vec<Topic> {
        topics
            .iter()
            .copied()
            .filter(|topic| self.topics.remove(topic))
            .collect()
    }

    /// Returns `true` if `topic` is followed.
    #[must_use]
    pub fn matches(&self, topic: Topic) -> bool {
        self.topics.contains(&topic)
    }

    /// Number of followed topics.
    #[must_use]
    pub fn count(&self) -> usize {
        self.topics.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_matches_nothing() {
        let mgr = SubscriptionManager::new();
        assert!(!mgr.matches(Topic::Account));
        assert!(!mgr.matches(Topic::Transactions));
    }

    #[test]
    fn subscribe_reports_new_topics_only() {
        let mut mgr = SubscriptionManager::new();
        assert_eq!(mgr.subscribe(&[Topic::Account]), vec![Topic::Account]);
        assert_eq!(
            mgr.subscribe(&[Topic::Account, Topic::Transactions]),
            vec![Topic::Transactions]
        );
        assert_eq!(mgr.count(), 2);
    }

    #[test]
    fn unsubscribe_removes_topic() {
        let mut mgr = SubscriptionManager::new();
        mgr.subscribe(&[Topic::Transactions]);
        assert_eq!(mgr.unsubscribe(&[Topic::Transactions, Topic::Account]), vec![Topic::Transactions]);
        assert!(!mgr.matches(Topic::Transactions));
        assert_eq!(mgr.count(), 0);
    }
}
