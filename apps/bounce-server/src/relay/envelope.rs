//! The wire record sent to clients, as JSON on binary frames.

use serde::{Deserialize, Serialize};

/// Discriminator for the envelopes a hub emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Intent {
    /// Sent once, directly to a client that has just been admitted.
    Welcome,
    /// Fanned out to the whole membership when a client is admitted.
    Joiner,
    /// Fanned out to the remaining membership when a client departs.
    Leaver,
    /// A forwarded client payload.
    Peer,
}

/// An immutable message record emitted by a hub.
///
/// `from` and `to` are multisets: membership is keyed by connection, not by
/// identifier, so two tabs sharing a cookie contribute their id twice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "From")]
    pub from: Vec<String>,
    #[serde(rename = "To")]
    pub to: Vec<String>,
    /// Seconds since the Unix epoch when the hub emitted this envelope.
    #[serde(rename = "Time")]
    pub time: i64,
    #[serde(rename = "Intent")]
    pub intent: Intent,
    /// Raw payload bytes of the sender's frame; only present for `Peer`.
    #[serde(rename = "Body", with = "body_base64", default)]
    pub body: Option<Vec<u8>>,
}

/// `Body` travels as a standard-alphabet base64 string, or `null` when absent.
mod body_base64 {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<Vec<u8>>, ser: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(bytes) => ser.serialize_str(&STANDARD.encode(bytes)),
            None => ser.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(de: D) -> Result<Option<Vec<u8>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<String>::deserialize(de)? {
            Some(text) => STANDARD
                .decode(text.as_bytes())
                .map(Some)
                .map_err(serde::de::Error::custom),
            None => Ok(None),
        }
    }
}
