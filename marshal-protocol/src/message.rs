//! Network message models.
//!
//! Every message starts with a [`MessageHeader`] whose signature selects the
//! payload that follows:
//!
//! ```text
//! +---------------------------+-------------------------------------------+
//! | MessageHeader (12 bytes)  | payload (managed message)                 |
//! | signature u32 | version f64 | CMDM -> CommandStructure                 |
//! |               |             | PACK -> PackageHeader                    |
//! +---------------------------+-------------------------------------------+
//! ```

use crate::error::ProtocolError;
use crate::package::PackageHeader;
use bytes::{Bytes, BytesMut};
use marshal_buffer::{composite, Codec};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::io::{AsyncRead, AsyncWrite};

/// Signature of a command message ("CMDM").
pub const COMMAND_SIGNATURE: u32 = 0x434D_444D;

/// Signature of a package transfer message ("PACK").
pub const PACKAGE_SIGNATURE: u32 = 0x5041_434B;

/// Version written into outgoing message headers.
pub const MESSAGE_VERSION: f64 = 1.0;

/// Payload selector carried in the message header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Command,
    Package,
}

impl MessageKind {
    pub fn from_signature(signature: u32) -> Option<Self> {
        match signature {
            COMMAND_SIGNATURE => Some(MessageKind::Command),
            PACKAGE_SIGNATURE => Some(MessageKind::Package),
            _ => None,
        }
    }

    pub fn signature(self) -> u32 {
        match self {
            MessageKind::Command => COMMAND_SIGNATURE,
            MessageKind::Package => PACKAGE_SIGNATURE,
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageKind::Command => f.write_str("command"),
            MessageKind::Package => f.write_str("package"),
        }
    }
}

/// Leading header of every network message.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MessageHeader {
    pub signature: u32,
    pub version: f64,
}

composite!(MessageHeader {
    signature: u32,
    version: f64,
});

impl MessageHeader {
    pub fn new(kind: MessageKind) -> Self {
        Self {
            signature: kind.signature(),
            version: MESSAGE_VERSION,
        }
    }

    pub fn kind(&self) -> Result<MessageKind, ProtocolError> {
        MessageKind::from_signature(self.signature)
            .ok_or(ProtocolError::UnknownSignature(self.signature))
    }
}

/// A remote command addressed to a region of the fleet manager.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandStructure {
    pub region: String,
    pub subcommand: String,
    pub arguments: String,
}

composite!(CommandStructure {
    region: String,
    subcommand: String,
    arguments: String,
});

impl CommandStructure {
    pub fn new(
        region: impl Into<String>,
        subcommand: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self {
            region: region.into(),
            subcommand: subcommand.into(),
            arguments: arguments.into(),
        }
    }

    /// Whitespace-separated arguments.
    pub fn argument_list(&self) -> Vec<&str> {
        self.arguments.split_whitespace().collect()
    }
}

impl fmt::Display for CommandStructure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.region, self.subcommand)?;
        if !self.arguments.is_empty() {
            write!(f, " {}", self.arguments)?;
        }
        Ok(())
    }
}

/// A decoded network message.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "payload", rename_all = "lowercase")]
pub enum Message {
    Command(CommandStructure),
    Package(PackageHeader),
}

impl Message {
    pub fn kind(&self) -> MessageKind {
        match self {
            Message::Command(_) => MessageKind::Command,
            Message::Package(_) => MessageKind::Package,
        }
    }
}

/// Encodes a full command message: header then command.
pub fn encode_command(codec: &Codec<'_>, command: &CommandStructure) -> Result<Bytes, ProtocolError> {
    encode_message(codec, MessageKind::Command, |c| c.encode_managed(command))
}

/// Encodes a full package transfer message: header then package header.
pub fn encode_package(codec: &Codec<'_>, header: &PackageHeader) -> Result<Bytes, ProtocolError> {
    encode_message(codec, MessageKind::Package, |c| c.encode_managed(header))
}

fn encode_message<F>(codec: &Codec<'_>, kind: MessageKind, payload: F) -> Result<Bytes, ProtocolError>
where
    F: FnOnce(&Codec<'_>) -> Result<Bytes, marshal_buffer::BufferError>,
{
    let header = codec.encode_managed(&MessageHeader::new(kind))?;
    let payload = payload(codec)?;

    let mut buf = BytesMut::with_capacity(header.len() + payload.len());
    buf.extend_from_slice(&header);
    buf.extend_from_slice(&payload);
    Ok(buf.freeze())
}

/// Decodes one message from the front of `bytes`, returning it and the number
/// of bytes consumed.
pub fn decode_message(codec: &Codec<'_>, bytes: &[u8]) -> Result<(Message, usize), ProtocolError> {
    let (header, offset) = codec.decode_managed::<MessageHeader>(bytes)?;
    let rest = &bytes[offset..];

    let (message, consumed) = match header.kind()? {
        MessageKind::Command => {
            let (command, n) = codec.decode_managed::<CommandStructure>(rest)?;
            (Message::Command(command), n)
        }
        MessageKind::Package => {
            let (package, n) = codec.decode_managed::<PackageHeader>(rest)?;
            (Message::Package(package), n)
        }
    };
    Ok((message, offset + consumed))
}

/// Writes a command message to `stream`.
pub async fn write_command<S>(
    codec: &Codec<'_>,
    stream: &mut S,
    command: &CommandStructure,
) -> Result<(), ProtocolError>
where
    S: AsyncWrite + Unpin,
{
    codec
        .write_managed(stream, &MessageHeader::new(MessageKind::Command))
        .await?;
    codec.write_managed(stream, command).await?;
    tracing::debug!(region = %command.region, subcommand = %command.subcommand, "sent command");
    Ok(())
}

/// Writes a package transfer message to `stream`.
pub async fn write_package<S>(
    codec: &Codec<'_>,
    stream: &mut S,
    header: &PackageHeader,
) -> Result<(), ProtocolError>
where
    S: AsyncWrite + Unpin,
{
    codec
        .write_managed(stream, &MessageHeader::new(MessageKind::Package))
        .await?;
    codec.write_managed(stream, header).await?;
    Ok(())
}

/// Reads the message header from `stream`, then the payload it announces.
pub async fn read_message<S>(codec: &Codec<'_>, stream: &mut S) -> Result<Message, ProtocolError>
where
    S: AsyncRead + Unpin,
{
    let header: MessageHeader = codec.read_managed(stream).await?;
    let kind = header.kind()?;
    tracing::trace!(%kind, version = header.version, "received message header");

    match kind {
        MessageKind::Command => Ok(Message::Command(codec.read_managed(stream).await?)),
        MessageKind::Package => Ok(Message::Package(codec.read_managed(stream).await?)),
    }
}
