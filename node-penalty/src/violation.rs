//! Mapping of observed network events to violation types.
//!
//! The event source reports node lifecycle events by tag. Classification is
//! a pure tagging step: the payload is passed through untouched and checked
//! later by the validator.

use {
    crate::{
        error::{PenaltyError, Result},
        types::{NodeId, Violation, ViolationData, ViolationType},
    },
    std::str::FromStr,
};

/// Event tags understood by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    NodeLeftEarly,
    NodeRefuted,
    NodeSyncTimeout,
}

impl EventKind {
    pub fn tag(self) -> &'static str {
        match self {
            EventKind::NodeLeftEarly => "node-left-early",
            EventKind::NodeRefuted => "node-refuted",
            EventKind::NodeSyncTimeout => "node-sync-timeout",
        }
    }

    pub fn violation_type(self) -> ViolationType {
        match self {
            EventKind::NodeLeftEarly => ViolationType::LeftNetworkEarly,
            EventKind::NodeRefuted => ViolationType::NodeRefuted,
            EventKind::NodeSyncTimeout => ViolationType::SyncingTooLong,
        }
    }
}

impl FromStr for EventKind {
    type Err = PenaltyError;

    fn from_str(tag: &str) -> Result<Self> {
        match tag {
            "node-left-early" => Ok(EventKind::NodeLeftEarly),
            "node-refuted" => Ok(EventKind::NodeRefuted),
            "node-sync-timeout" => Ok(EventKind::NodeSyncTimeout),
            other => Err(PenaltyError::UnknownEvent(other.to_string())),
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

/// A node lifecycle event as delivered by the network layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViolationEvent {
    /// Raw event tag, e.g. `"node-left-early"`.
    pub tag: String,
    pub node_id: NodeId,
    pub public_key: String,
    /// Cycle-end time of the cycle that reported the event, in seconds.
    pub time: u64,
    pub data: ViolationData,
}

/// Classify `event` into a [`Violation`].
///
/// Fails with [`PenaltyError::UnknownEvent`] on an unrecognised tag, which
/// means the event source and this node disagree on protocol version.
pub fn classify(event: ViolationEvent) -> Result<Violation> {
    let kind = EventKind::from_str(&event.tag)?;
    Ok(Violation {
        violation_type: kind.violation_type(),
        data: event.data,
        reported_node_id: event.node_id,
        reported_node_public_key: event.public_key,
        cycle_end_time: event.time,
    })
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::types::{NodeLostViolationData, NodeRefutedViolationData},
        assert_matches::assert_matches,
    };

    fn event(tag: &str, data: ViolationData) -> ViolationEvent {
        ViolationEvent {
            tag: tag.to_string(),
            node_id: "11".repeat(32),
            public_key: "22".repeat(32),
            time: 1_700_000_000,
            data,
        }
    }

    fn lost_data() -> ViolationData {
        ViolationData::Lost(NodeLostViolationData {
            node_lost_cycle: 10,
            node_dropped_cycle: Some(11),
            node_dropped_time: 1_700_000_000,
        })
    }

    #[test]
    fn test_classify_each_tag() {
        let cases = [
            ("node-left-early", ViolationType::LeftNetworkEarly),
            ("node-refuted", ViolationType::NodeRefuted),
            ("node-sync-timeout", ViolationType::SyncingTooLong),
        ];
        for (tag, expected) in cases {
            let violation = classify(event(tag, lost_data())).unwrap();
            assert_eq!(violation.violation_type, expected, "tag {tag}");
        }
    }

    #[test]
    fn test_payload_passes_through_unchanged() {
        let data = ViolationData::Refuted(NodeRefutedViolationData {
            node_refuted_cycle: 4,
            node_refuted_time: 55,
        });
        let violation = classify(event("node-refuted", data)).unwrap();
        assert_eq!(violation.data, data);
        assert_eq!(violation.reported_node_id, "11".repeat(32));
        assert_eq!(violation.cycle_end_time, 1_700_000_000);
    }

    #[test]
    fn test_unknown_tag_is_fatal() {
        assert_matches!(
            classify(event("node-double-voted", lost_data())),
            Err(PenaltyError::UnknownEvent(tag)) if tag == "node-double-voted"
        );
    }

    #[test]
    fn test_tag_display_roundtrip() {
        for kind in [
            EventKind::NodeLeftEarly,
            EventKind::NodeRefuted,
            EventKind::NodeSyncTimeout,
        ] {
            assert_eq!(EventKind::from_str(&kind.to_string()).unwrap(), kind);
        }
    }
}
