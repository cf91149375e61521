//! # Identity types for dispatcher entities.
//!
//! Every task, worker and listener gets a random UUID v4 on creation. The
//! newtypes keep the three id spaces apart at compile time; they are `Copy`,
//! hashable, ordered, serialize as plain UUID strings and parse back from
//! them (dashboards pass ids around as strings).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Generates a fresh random id.
            pub(crate) fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Returns the underlying UUID.
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }
    };
}

entity_id!(
    /// Identity of a submitted task.
    TaskId
);

entity_id!(
    /// Identity of a worker slot.
    WorkerId
);

entity_id!(
    /// Identity of a registered listener.
    ListenerId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique() {
        assert_ne!(TaskId::new(), TaskId::new());
        assert_ne!(WorkerId::new(), WorkerId::new());
    }

    #[test]
    fn test_display_parse_round_trip() {
        let id = ListenerId::new();
        let parsed: ListenerId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
        assert!("not-a-uuid".parse::<TaskId>().is_err());
    }
}
