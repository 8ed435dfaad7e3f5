use serde::Deserialize;

/// What to do with a new event when a bounded buffer is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Evict the oldest buffered event to make room.
    #[default]
    DropOldest,
    /// Keep the buffer as is and drop the incoming event.
    DropNewest,
}

/// Per-subscription buffering strategy.
///
/// `Unbounded` keeps every event until the consumer drains it, so a consumer
/// that never drains grows without limit. `Bounded` caps memory per
/// subscription and reports losses as [`RecvError::Lagged`](crate::RecvError).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BufferPolicy {
    #[default]
    Unbounded,
    Bounded {
        capacity: usize,
        #[serde(default)]
        overflow: OverflowPolicy,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub struct BroadcastConfig {
    #[serde(default)]
    pub buffer: BufferPolicy,
}

impl BroadcastConfig {
    pub fn bounded(capacity: usize, overflow: OverflowPolicy) -> Self {
        Self {
            buffer: BufferPolicy::Bounded { capacity, overflow },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialize() {
        let config: BroadcastConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.buffer, BufferPolicy::Unbounded);

        let config: BroadcastConfig =
            serde_json::from_str(r#"{ "buffer": { "kind": "bounded", "capacity": 8 } }"#)
                .unwrap();
        assert_eq!(config, BroadcastConfig::bounded(8, OverflowPolicy::DropOldest));

        let config: BroadcastConfig = serde_json::from_str(
            r#"{ "buffer": { "kind": "bounded", "capacity": 2, "overflow": "drop_newest" } }"#,
        )
        .unwrap();
        assert_eq!(config, BroadcastConfig::bounded(2, OverflowPolicy::DropNewest));
    }
}
