use std::fmt;
use std::str::FromStr;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};
use uuid::Uuid;

/// Broadcast group key. Serializes to the wire strings the clients use
/// (`order-{id}`, `restaurant-{id}`, `user-{id}`, `driver-{id}`), while call
/// sites get a checked variant instead of a raw string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Room {
    Order(Uuid),
    Restaurant(Uuid),
    User(Uuid),
    Driver(Uuid),
}

impl fmt::Display for Room {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Room::Order(id) => write!(f, "order-{id}"),
            Room::Restaurant(id) => write!(f, "restaurant-{id}"),
            Room::User(id) => write!(f, "user-{id}"),
            Room::Driver(id) => write!(f, "driver-{id}"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("invalid room key: {0}")]
pub struct ParseRoomError(String);

impl FromStr for Room {
    type Err = ParseRoomError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (prefix, id) = s
            .split_once('-')
            .ok_or_else(|| ParseRoomError(s.to_string()))?;
        let id = Uuid::parse_str(id).map_err(|_| ParseRoomError(s.to_string()))?;

        match prefix {
            "order" => Ok(Room::Order(id)),
            "restaurant" => Ok(Room::Restaurant(id)),
            "user" => Ok(Room::User(id)),
            "driver" => Ok(Room::Driver(id)),
            _ => Err(ParseRoomError(s.to_string())),
        }
    }
}

impl Serialize for Room {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Room {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::Room;
    use uuid::Uuid;

    #[test]
    fn round_trips_through_wire_string() {
        let id = Uuid::new_v4();
        for room in [
            Room::Order(id),
            Room::Restaurant(id),
            Room::User(id),
            Room::Driver(id),
        ] {
            let wire = room.to_string();
            assert_eq!(wire.parse::<Room>().unwrap(), room);
        }
    }

    #[test]
    fn wire_format_matches_client_convention() {
        let id = Uuid::nil();
        assert_eq!(
            Room::Order(id).to_string(),
            format!("order-{id}"),
        );
    }

    #[test]
    fn rejects_unknown_prefix_and_garbage() {
        assert!("kitchen-00000000-0000-0000-0000-000000000000"
            .parse::<Room>()
            .is_err());
        assert!("order-not-a-uuid".parse::<Room>().is_err());
        assert!("order".parse::<Room>().is_err());
    }
}
