use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

use crate::realtime::room::Room;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TicketError {
    #[error("malformed ticket")]
    Malformed,

    #[error("ticket expired")]
    Expired,

    #[error("ticket not valid for this room")]
    WrongRoom,

    #[error("bad ticket signature")]
    BadSignature,
}

/// Issues and verifies short-lived join capabilities. A ticket is scoped to
/// exactly one room, so holding a ticket for `order-X` admits nothing else.
///
/// Format: `{room}.{expires_unix}.{hex(hmac_sha256(secret, room:expires))}`.
pub struct TicketIssuer {
    secret: Vec<u8>,
    ttl_secs: i64,
}

impl TicketIssuer {
    pub fn new(secret: impl Into<Vec<u8>>, ttl_secs: u64) -> Self {
        Self {
            secret: secret.into(),
            ttl_secs: ttl_secs as i64,
        }
    }

    pub fn issue(&self, room: Room, now: DateTime<Utc>) -> String {
        let expires = now.timestamp() + self.ttl_secs;
        let tag = self.sign(room, expires);
        format!("{room}.{expires}.{tag}")
    }

    pub fn verify(&self, ticket: &str, room: Room, now: DateTime<Utc>) -> Result<(), TicketError> {
        let mut parts = ticket.rsplitn(3, '.');
        let tag = parts.next().ok_or(TicketError::Malformed)?;
        let expires: i64 = parts
            .next()
            .ok_or(TicketError::Malformed)?
            .parse()
            .map_err(|_| TicketError::Malformed)?;
        let claimed_room: Room = parts
            .next()
            .ok_or(TicketError::Malformed)?
            .parse()
            .map_err(|_| TicketError::Malformed)?;

        if claimed_room != room {
            return Err(TicketError::WrongRoom);
        }

        let tag_bytes = hex::decode(tag).map_err(|_| TicketError::Malformed)?;
        let mut mac = self.mac();
        mac.update(signing_input(room, expires).as_bytes());
        mac.verify_slice(&tag_bytes)
            .map_err(|_| TicketError::BadSignature)?;

        if now.timestamp() > expires {
            return Err(TicketError::Expired);
        }

        Ok(())
    }

    fn sign(&self, room: Room, expires: i64) -> String {
        let mut mac = self.mac();
        mac.update(signing_input(room, expires).as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    fn mac(&self) -> HmacSha256 {
        HmacSha256::new_from_slice(&self.secret).expect("hmac accepts any key length")
    }
}

fn signing_input(room: Room, expires: i64) -> String {
    format!("{room}:{expires}")
}
