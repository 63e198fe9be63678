//! Discovery deduplication.
//!
//! Discovery metadata is retained by the broker, so sending it once per
//! process lifetime is enough. [`DiscoveryRegistry`] remembers which
//! discovery topics have been announced; nothing is ever removed except by
//! restarting the process (or [`DiscoveryRegistry::reset`] in tests).

use dashmap::DashSet;
use tracing::trace;

/// Set of discovery topics already announced.
#[derive(Debug, Default)]
pub struct DiscoveryRegistry {
    topics: DashSet<String>,
}

impl DiscoveryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `topic` and return whether this call registered it.
    ///
    /// The membership check and insert are one atomic operation, so among
    /// concurrent callers with the same topic exactly one sees `true`.
    pub fn announce(&self, topic: &str) -> bool {
        let fresh = self.topics.insert(topic.to_string());
        if !fresh {
            trace!(topic = %topic, "Discovery already announced");
        }
        fresh
    }

    pub fn len(&self) -> usize {
        self.topics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }

    /// Forget every announced topic. Test use only.
    pub fn reset(&self) {
        self.topics.clear();
    }
}
