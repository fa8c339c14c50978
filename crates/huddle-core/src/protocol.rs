//! Signaling wire protocol.
//!
//! Every frame is one JSON object with a string `type` discriminator.
//! Inbound frames are decoded in two phases: the discriminator is read
//! first, then the full payload is decoded against the shape for that type.
//! A frame that fails phase one is [`RelayError::Malformed`]; one that fails
//! phase two is [`RelayError::InvalidShape`].

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::RelayError;
use crate::ids::SessionId;

/// Field names the server fills in on forwarded peer-exchange messages.
const SERVER_FILLED_FIELDS: [&str; 2] = ["senderId", "senderName"];

/// Every `type` value the protocol knows about.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MessageType {
    /// SDP offer, client → server → target.
    PeerOffer,
    /// SDP answer, client → server → target.
    PeerAnswer,
    /// ICE candidate, client → server → target.
    IceCandidate,
    /// Claim a display name and enter the peer stream.
    JoinPeers,
    /// Leave the peer stream.
    LeavePeers,
    /// Another session joined.
    PeerJoined,
    /// Another session left.
    PeerLeft,
    /// Greeting sent once after the connection opens.
    ConnectionSuccess,
    /// Something the client sent was rejected.
    Error,
}

impl MessageType {
    /// All message types, in protocol order.
    pub const ALL: [Self; 9] = [
        Self::PeerOffer,
        Self::PeerAnswer,
        Self::IceCandidate,
        Self::JoinPeers,
        Self::LeavePeers,
        Self::PeerJoined,
        Self::PeerLeft,
        Self::ConnectionSuccess,
        Self::Error,
    ];

    /// Wire spelling.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PeerOffer => "peer-offer",
            Self::PeerAnswer => "peer-answer",
            Self::IceCandidate => "ice-candidate",
            Self::JoinPeers => "join-peers",
            Self::LeavePeers => "leave-peers",
            Self::PeerJoined => "peer-joined",
            Self::PeerLeft => "peer-left",
            Self::ConnectionSuccess => "connection-success",
            Self::Error => "error",
        }
    }

    /// Look up a wire spelling. Returns `None` for anything unrecognized.
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == s)
    }

    /// Whether this type only ever travels server → client.
    pub const fn is_client_bound(self) -> bool {
        matches!(
            self,
            Self::PeerJoined | Self::PeerLeft | Self::ConnectionSuccess | Self::Error
        )
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The three message types forwarded verbatim between peers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExchangeKind {
    /// `peer-offer`
    PeerOffer,
    /// `peer-answer`
    PeerAnswer,
    /// `ice-candidate`
    IceCandidate,
}

impl From<ExchangeKind> for MessageType {
    fn from(kind: ExchangeKind) -> Self {
        match kind {
            ExchangeKind::PeerOffer => Self::PeerOffer,
            ExchangeKind::PeerAnswer => Self::PeerAnswer,
            ExchangeKind::IceCandidate => Self::IceCandidate,
        }
    }
}

/// Addressee of a peer-exchange message.
///
/// Normally the numeric session id; a string is resolved as a display name.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PeerTarget {
    /// Address by session id.
    Id(SessionId),
    /// Address by claimed display name.
    Name(String),
}

impl fmt::Display for PeerTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{id}"),
            Self::Name(name) => write!(f, "{name:?}"),
        }
    }
}

/// Offer, answer or ICE candidate on its way from one peer to another.
///
/// `sender_id`/`sender_name` are never read from the client; the relay
/// stamps them from its own record before forwarding. Any fields the client
/// attached beyond the known ones are carried through in `extra`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerExchange {
    /// Which of the three exchange messages this is.
    #[serde(rename = "type")]
    pub kind: ExchangeKind,
    /// Sending session, filled by the relay.
    #[serde(skip_deserializing, skip_serializing_if = "Option::is_none")]
    pub sender_id: Option<SessionId>,
    /// Sender's display name at forwarding time, filled by the relay.
    #[serde(skip_deserializing, skip_serializing_if = "Option::is_none")]
    pub sender_name: Option<String>,
    /// Intended receiver.
    pub receiver_id: PeerTarget,
    /// SDP or ICE payload. Opaque to the relay.
    #[serde(default)]
    pub data: Value,
    /// Unrecognized fields, forwarded untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PeerExchange {
    /// Overwrite the sender fields with the relay's record of the sender.
    pub fn stamp_sender(&mut self, id: SessionId, name: impl Into<String>) {
        self.sender_id = Some(id);
        self.sender_name = Some(name.into());
    }
}

/// A decoded client → server frame.
#[derive(Clone, Debug, PartialEq)]
pub enum ClientMessage {
    /// Offer/answer/candidate to forward.
    PeerExchange(PeerExchange),
    /// Request to claim `name` and enter the peer stream.
    JoinPeers {
        /// Requested display name.
        name: String,
    },
    /// Request to leave the peer stream.
    LeavePeers,
    /// A known type that only the server may send.
    Unsupported(MessageType),
    /// A `type` the protocol does not define.
    Unknown(String),
}

#[derive(Deserialize)]
struct JoinPeersPayload {
    name: String,
}

impl ClientMessage {
    /// Decode one inbound frame.
    pub fn decode(raw: &str) -> Result<Self, RelayError> {
        let value: Value = serde_json::from_str(raw).map_err(RelayError::Malformed)?;
        let Value::Object(mut fields) = value else {
            return Err(RelayError::Malformed(serde::de::Error::custom(
                "expected a JSON object",
            )));
        };
        let declared = match fields.get("type") {
            Some(Value::String(declared)) => declared.clone(),
            _ => {
                return Err(RelayError::Malformed(serde::de::Error::custom(
                    "missing string field `type`",
                )));
            }
        };

        let Some(kind) = MessageType::parse(&declared) else {
            return Ok(Self::Unknown(declared));
        };

        match kind {
            MessageType::PeerOffer | MessageType::PeerAnswer | MessageType::IceCandidate => {
                for field in SERVER_FILLED_FIELDS {
                    let _ = fields.remove(field);
                }
                serde_json::from_value(Value::Object(fields))
                    .map(Self::PeerExchange)
                    .map_err(|source| RelayError::InvalidShape {
                        kind: kind.as_str(),
                        source,
                    })
            }
            MessageType::JoinPeers => serde_json::from_value::<JoinPeersPayload>(Value::Object(fields))
                .map(|p| Self::JoinPeers { name: p.name })
                .map_err(|source| RelayError::InvalidShape {
                    kind: kind.as_str(),
                    source,
                }),
            MessageType::LeavePeers => Ok(Self::LeavePeers),
            other => Ok(Self::Unsupported(other)),
        }
    }

    /// The message type, if it is one the protocol defines.
    pub fn message_type(&self) -> Option<MessageType> {
        match self {
            Self::PeerExchange(msg) => Some(msg.kind.into()),
            Self::JoinPeers { .. } => Some(MessageType::JoinPeers),
            Self::LeavePeers => Some(MessageType::LeavePeers),
            Self::Unsupported(kind) => Some(*kind),
            Self::Unknown(_) => None,
        }
    }
}

/// Server-originated frames.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerMessage {
    /// Session `id` claimed `name`.
    PeerJoined {
        /// Joining session.
        id: SessionId,
        /// Claimed name.
        name: String,
    },
    /// Session `id` left the peer stream or disconnected.
    PeerLeft {
        /// Departing session.
        id: SessionId,
    },
    /// First frame on every connection.
    #[serde(rename_all = "camelCase")]
    ConnectionSuccess {
        /// Sessions that have joined the peer stream.
        peer_count: usize,
    },
    /// Rejection of something the client sent.
    #[serde(rename_all = "camelCase")]
    Error {
        /// Human-readable reason.
        error_message: String,
    },
}

impl ServerMessage {
    /// The `type` this message is sent with.
    pub const fn message_type(&self) -> MessageType {
        match self {
            Self::PeerJoined { .. } => MessageType::PeerJoined,
            Self::PeerLeft { .. } => MessageType::PeerLeft,
            Self::ConnectionSuccess { .. } => MessageType::ConnectionSuccess,
            Self::Error { .. } => MessageType::Error,
        }
    }

    /// Build an `error` frame from a relay error.
    pub fn error(err: &RelayError) -> Self {
        Self::Error {
            error_message: err.to_string(),
        }
    }
}
