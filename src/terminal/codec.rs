// ABOUTME: Frame encoding for the execute socket
// Terminal bytes travel as base64 text inside frames; closes are sorted into normal or abnormal

use super::error::BridgeError;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tokio_tungstenite::tungstenite::error::ProtocolError;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{self, Message};

/// Wraps raw terminal bytes into an outbound binary frame.
pub fn encode_frame(bytes: &[u8]) -> Message {
    Message::Binary(STANDARD.encode(bytes).into_bytes())
}

/// What an inbound frame means for the local side.
#[derive(Debug, PartialEq, Eq)]
pub enum Inbound {
    /// Decoded terminal output.
    Output(Vec<u8>),
    /// Control traffic with nothing to write.
    Ignore,
    /// The remote finished the session cleanly.
    Closed,
}

/// Decodes one received frame.
pub fn decode_frame(message: Message) -> Result<Inbound, BridgeError> {
    match message {
        Message::Text(text) => Ok(Inbound::Output(decode_payload(text.as_bytes())?)),
        Message::Binary(data) => Ok(Inbound::Output(decode_payload(&data)?)),
        Message::Close(frame) => classify_close(frame.as_ref()).map(|()| Inbound::Closed),
        Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => Ok(Inbound::Ignore),
    }
}

fn decode_payload(payload: &[u8]) -> Result<Vec<u8>, BridgeError> {
    Ok(STANDARD.decode(payload.trim_ascii())?)
}

/// A close without a status or with `1000 Normal` ends the session cleanly.
pub fn classify_close(frame: Option<&CloseFrame<'_>>) -> Result<(), BridgeError> {
    match frame {
        None => Ok(()),
        Some(frame) if frame.code == CloseCode::Normal => Ok(()),
        Some(frame) => Err(BridgeError::RemoteClosed {
            code: frame.code.into(),
            reason: frame.reason.to_string(),
        }),
    }
}

/// Whether a transport error only reports that the socket is already shut.
pub fn is_normal_close(err: &tungstenite::Error) -> bool {
    matches!(
        err,
        tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed
    )
}

/// Whether the peer dropped the connection instead of answering a close.
pub fn is_unacknowledged_close(err: &tungstenite::Error) -> bool {
    matches!(
        err,
        tungstenite::Error::Protocol(ProtocolError::ResetWithoutClosingHandshake)
    )
}
