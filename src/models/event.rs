/// Announce lifecycle event, shared by the UDP and HTTP transports.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum AnnounceEvent {
    #[default]
    None,
    Completed,
    Started,
    Stopped,
}

/// What an announce does to the swarm.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SwarmTransition {
    /// Upsert the peer; `complete` is OR-ed into any existing flag by the store.
    Upsert { complete: bool },
    /// Remove the peer. No save happens.
    Leave,
}

impl AnnounceEvent {
    /// Transition table:
    ///
    /// | event     | left == 0 | left > 0  |
    /// |-----------|-----------|-----------|
    /// | none      | complete  | leeching  |
    /// | started   | complete  | leeching  |
    /// | completed | complete  | complete  |
    /// | stopped   | leave     | leave     |
    pub fn transition(self, left: i64) -> SwarmTransition {
        match self {
            AnnounceEvent::Stopped => SwarmTransition::Leave,
            AnnounceEvent::Completed => SwarmTransition::Upsert { complete: true },
            AnnounceEvent::None | AnnounceEvent::Started => {
                SwarmTransition::Upsert { complete: left == 0 }
            }
        }
    }

    /// Wire value used by the UDP protocol.
    pub fn as_i32(self) -> i32 {
        match self {
            AnnounceEvent::None => 0,
            AnnounceEvent::Completed => 1,
            AnnounceEvent::Started => 2,
            AnnounceEvent::Stopped => 3,
        }
    }

    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            0 => Some(AnnounceEvent::None),
            1 => Some(AnnounceEvent::Completed),
            2 => Some(AnnounceEvent::Started),
            3 => Some(AnnounceEvent::Stopped),
            _ => None,
        }
    }

    /// Value of the HTTP `event` query parameter. The empty string means none.
    pub fn from_query(value: &str) -> Option<Self> {
        match value {
            "" => Some(AnnounceEvent::None),
            "started" => Some(AnnounceEvent::Started),
            "stopped" => Some(AnnounceEvent::Stopped),
            "completed" => Some(AnnounceEvent::Completed),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_table() {
        use SwarmTransition::*;

        assert_eq!(AnnounceEvent::None.transition(100), Upsert { complete: false });
        assert_eq!(AnnounceEvent::None.transition(0), Upsert { complete: true });
        assert_eq!(AnnounceEvent::Started.transition(100), Upsert { complete: false });
        assert_eq!(AnnounceEvent::Started.transition(0), Upsert { complete: true });
        assert_eq!(AnnounceEvent::Completed.transition(100), Upsert { complete: true });
        assert_eq!(AnnounceEvent::Completed.transition(0), Upsert { complete: true });
        assert_eq!(AnnounceEvent::Stopped.transition(100), Leave);
        assert_eq!(AnnounceEvent::Stopped.transition(0), Leave);
    }

    #[test]
    fn test_wire_values_exhaustive() {
        for value in 0..4 {
            let event = AnnounceEvent::from_i32(value).unwrap();
            assert_eq!(event.as_i32(), value);
        }
        assert_eq!(AnnounceEvent::from_i32(-1), None);
        assert_eq!(AnnounceEvent::from_i32(4), None);
    }

    #[test]
    fn test_from_query() {
        assert_eq!(AnnounceEvent::from_query(""), Some(AnnounceEvent::None));
        assert_eq!(AnnounceEvent::from_query("started"), Some(AnnounceEvent::Started));
        assert_eq!(AnnounceEvent::from_query("stopped"), Some(AnnounceEvent::Stopped));
        assert_eq!(AnnounceEvent::from_query("completed"), Some(AnnounceEvent::Completed));
        assert_eq!(AnnounceEvent::from_query("paused"), None);
    }
}
