// SMPP v3.4 Codec - framing and field-level encoding shared by every PDU.
//
// Frames are split off the byte stream as `RawPdu` values whose body is only
// decoded when someone asks for a concrete type. This keeps unknown command ids
// and vendor status codes on the wire path instead of tearing the session down.

use crate::datatypes::{
    BindTransceiver, BindTransceiverResponse, CommandId, CommandStatus, DeliverSm,
    DeliverSmResponse, EnquireLink, EnquireLinkResponse, GenericNack, SubmitSm, SubmitSmResponse,
    Unbind, UnbindResponse,
};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::io::Cursor;
use thiserror::Error;

/// Maximum allowed PDU size to prevent memory exhaustion attacks
pub const MAX_PDU_SIZE: u32 = 65536; // 64KB

/// SMPP v3.4 PDU Header (16 bytes, common to all PDUs)
///
/// The id and status are kept raw; `command()` and `status()` give the typed
/// view and fail for values outside the tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PduHeader {
    pub command_length: u32,
    pub command_id: u32,
    pub command_status: u32,
    pub sequence_number: u32,
}

impl PduHeader {
    pub const SIZE: usize = 16;

    /// Decode PDU header from buffer, validating the declared length
    pub fn decode(buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        if buf.remaining() < Self::SIZE {
            return Err(CodecError::Incomplete);
        }

        let header = PduHeader {
            command_length: buf.get_u32(),
            command_id: buf.get_u32(),
            command_status: buf.get_u32(),
            sequence_number: buf.get_u32(),
        };
        check_length(header.command_length)?;

        Ok(header)
    }

    /// Encode PDU header to buffer
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u32(self.command_length);
        buf.put_u32(self.command_id);
        buf.put_u32(self.command_status);
        buf.put_u32(self.sequence_number);
    }

    /// Header for an outbound PDU; the length is patched in by `Encodable::to_bytes`
    pub fn outbound(command_id: CommandId, command_status: CommandStatus, sequence_number: u32) -> Self {
        PduHeader {
            command_length: 0,
            command_id: command_id as u32,
            command_status: command_status as u32,
            sequence_number,
        }
    }

    pub fn command(&self) -> Result<CommandId, CodecError> {
        CommandId::try_from(self.command_id)
            .map_err(|_| CodecError::InvalidCommandId(self.command_id))
    }

    pub fn status(&self) -> Result<CommandStatus, CodecError> {
        CommandStatus::try_from(self.command_status)
            .map_err(|_| CodecError::InvalidCommandStatus(self.command_status))
    }
}

fn check_length(command_length: u32) -> Result<(), CodecError> {
    if command_length < PduHeader::SIZE as u32 || command_length > MAX_PDU_SIZE {
        return Err(CodecError::InvalidPduLength {
            length: command_length,
            min: PduHeader::SIZE as u32,
            max: MAX_PDU_SIZE,
        });
    }
    Ok(())
}

/// Trait for types that can be encoded to bytes
pub trait Encodable {
    /// Encode this PDU, header included, to the buffer
    fn encode(&self, buf: &mut BytesMut) -> Result<(), CodecError>;

    /// Encode into a fresh buffer and fix up the command_length field
    fn to_bytes(&self) -> Result<Bytes, CodecError> {
        let mut buf = BytesMut::with_capacity(64);
        self.encode(&mut buf)?;

        if buf.len() >= 4 {
            let length = buf.len() as u32;
            buf[0..4].copy_from_slice(&length.to_be_bytes());
        }

        Ok(buf.freeze())
    }
}

/// Trait for types that can be decoded from bytes
pub trait Decodable: Sized {
    /// Decode this PDU from the buffer after header
    fn decode(header: &PduHeader, buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError>;

    /// Return the expected command_id for this PDU type
    fn command_id() -> CommandId;

    /// Validate the header is appropriate for this PDU type
    fn validate_header(header: &PduHeader) -> Result<(), CodecError> {
        if header.command_id != Self::command_id() as u32 {
            return Err(CodecError::UnexpectedCommandId {
                expected: Self::command_id(),
                actual: header.command_id,
            });
        }
        Ok(())
    }
}

/// Codec errors with detailed context for debugging
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Incomplete PDU: need more data")]
    Incomplete,

    #[error("Invalid command_id: {0:#x}")]
    InvalidCommandId(u32),

    #[error("Invalid command_status: {0:#x}")]
    InvalidCommandStatus(u32),

    #[error("Invalid PDU length: {length}, must be {min}-{max}")]
    InvalidPduLength { length: u32, min: u32, max: u32 },

    #[error("Unexpected command_id: expected {expected:?}, got {actual:#x}")]
    UnexpectedCommandId { expected: CommandId, actual: u32 },

    #[error("Field '{field}' validation failed: {reason}")]
    FieldValidation { field: &'static str, reason: String },

    #[error("UTF-8 decoding error in field '{field}': {source}")]
    Utf8Error {
        field: &'static str,
        #[source]
        source: std::string::FromUtf8Error,
    },
}

/// Decode a variable-length C-Octet string of at most `max_len` octets,
/// terminator included.
pub fn decode_cstring(
    buf: &mut Cursor<&[u8]>,
    max_len: usize,
    field_name: &'static str,
) -> Result<String, CodecError> {
    let chunk = buf.chunk();
    let window = &chunk[..chunk.len().min(max_len)];

    let end = window
        .iter()
        .position(|&b| b == 0)
        .ok_or_else(|| CodecError::FieldValidation {
            field: field_name,
            reason: format!("missing NUL terminator within {max_len} octets"),
        })?;

    let value = window[..end].to_vec();
    buf.advance(end + 1);

    String::from_utf8(value).map_err(|e| CodecError::Utf8Error {
        field: field_name,
        source: e,
    })
}

/// Decode a single byte
pub fn decode_u8(buf: &mut Cursor<&[u8]>, field_name: &'static str) -> Result<u8, CodecError> {
    if buf.remaining() < 1 {
        return Err(CodecError::FieldValidation {
            field: field_name,
            reason: "body ended early".to_string(),
        });
    }
    Ok(buf.get_u8())
}

/// Encode a C-Octet string; `max_len` counts the NUL terminator.
pub fn encode_cstring(
    buf: &mut BytesMut,
    value: &str,
    max_len: usize,
    field_name: &'static str,
) -> Result<(), CodecError> {
    if value.len() >= max_len {
        return Err(CodecError::FieldValidation {
            field: field_name,
            reason: format!("{} octets exceeds maximum of {}", value.len(), max_len - 1),
        });
    }
    buf.put_slice(value.as_bytes());
    buf.put_u8(0);
    Ok(())
}

/// A length-delimited PDU split off the stream, body not yet decoded.
#[derive(Debug, Clone, PartialEq)]
pub struct RawPdu {
    pub header: PduHeader,
    pub body: Bytes,
}

impl RawPdu {
    /// Check whether a complete PDU is buffered. Returns its total length.
    pub fn check(buf: &mut Cursor<&[u8]>) -> Result<usize, CodecError> {
        if buf.remaining() < PduHeader::SIZE {
            return Err(CodecError::Incomplete);
        }

        // Peek at command_length without advancing cursor
        let pos = buf.position();
        let command_length = buf.get_u32();
        buf.set_position(pos);

        check_length(command_length)?;

        if buf.remaining() < command_length as usize {
            return Err(CodecError::Incomplete);
        }

        Ok(command_length as usize)
    }

    /// Split one PDU off the buffer. Call `check` first.
    pub fn parse(buf: &mut Cursor<&[u8]>) -> Result<RawPdu, CodecError> {
        let header = PduHeader::decode(buf)?;
        let body_len = header.command_length as usize - PduHeader::SIZE;
        if buf.remaining() < body_len {
            return Err(CodecError::Incomplete);
        }
        let body = buf.copy_to_bytes(body_len);
        Ok(RawPdu { header, body })
    }

    /// Decode the body as a concrete PDU type
    pub fn decode<T: Decodable>(&self) -> Result<T, CodecError> {
        let mut cursor = Cursor::new(self.body.as_ref());
        let pdu = T::decode(&self.header, &mut cursor)?;

        if cursor.has_remaining() {
            return Err(CodecError::FieldValidation {
                field: "body",
                reason: format!("{} trailing octets", cursor.remaining()),
            });
        }
        Ok(pdu)
    }

    pub fn is_response(&self) -> bool {
        crate::datatypes::is_response_id(self.header.command_id)
    }
}

/// The typed PDUs a load-test session sends or receives
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    // Bind PDUs
    BindTransceiver(BindTransceiver),
    BindTransceiverResp(BindTransceiverResponse),

    // Message PDUs
    SubmitSm(Box<SubmitSm>),
    SubmitSmResp(SubmitSmResponse),
    DeliverSm(Box<DeliverSm>),
    DeliverSmResp(DeliverSmResponse),

    // Session management PDUs
    Unbind(Unbind),
    UnbindResp(UnbindResponse),
    EnquireLink(EnquireLink),
    EnquireLinkResp(EnquireLinkResponse),

    // Special PDUs
    GenericNack(GenericNack),

    // Anything else is carried opaquely
    Unknown(RawPdu),
}

impl Frame {
    /// Decode a raw PDU into its typed frame
    pub fn decode(pdu: &RawPdu) -> Result<Frame, CodecError> {
        let command = match pdu.header.command() {
            Ok(command) => command,
            Err(_) => return Ok(Frame::Unknown(pdu.clone())),
        };

        let frame = match command {
            CommandId::BindTransceiver => Frame::BindTransceiver(pdu.decode()?),
            CommandId::BindTransceiverResp => Frame::BindTransceiverResp(pdu.decode()?),
            CommandId::SubmitSm => Frame::SubmitSm(Box::new(pdu.decode()?)),
            CommandId::SubmitSmResp => Frame::SubmitSmResp(pdu.decode()?),
            CommandId::DeliverSm => Frame::DeliverSm(Box::new(pdu.decode()?)),
            CommandId::DeliverSmResp => Frame::DeliverSmResp(pdu.decode()?),
            CommandId::Unbind => Frame::Unbind(pdu.decode()?),
            CommandId::UnbindResp => Frame::UnbindResp(pdu.decode()?),
            CommandId::EnquireLink => Frame::EnquireLink(pdu.decode()?),
            CommandId::EnquireLinkResp => Frame::EnquireLinkResp(pdu.decode()?),
            CommandId::GenericNack => Frame::GenericNack(pdu.decode()?),
            _ => Frame::Unknown(pdu.clone()),
        };
        Ok(frame)
    }

    /// Get the raw command_id for this frame
    pub fn command_id(&self) -> u32 {
        let id = match self {
            Frame::BindTransceiver(_) => CommandId::BindTransceiver,
            Frame::BindTransceiverResp(_) => CommandId::BindTransceiverResp,
            Frame::SubmitSm(_) => CommandId::SubmitSm,
            Frame::SubmitSmResp(_) => CommandId::SubmitSmResp,
            Frame::DeliverSm(_) => CommandId::DeliverSm,
            Frame::DeliverSmResp(_) => CommandId::DeliverSmResp,
            Frame::Unbind(_) => CommandId::Unbind,
            Frame::UnbindResp(_) => CommandId::UnbindResp,
            Frame::EnquireLink(_) => CommandId::EnquireLink,
            Frame::EnquireLinkResp(_) => CommandId::EnquireLinkResp,
            Frame::GenericNack(_) => CommandId::GenericNack,
            Frame::Unknown(pdu) => return pdu.header.command_id,
        };
        id as u32
    }

    /// Get the sequence number for this frame
    pub fn sequence_number(&self) -> u32 {
        match self {
            Frame::BindTransceiver(pdu) => pdu.sequence_number,
            Frame::BindTransceiverResp(pdu) => pdu.sequence_number,
            Frame::SubmitSm(pdu) => pdu.sequence_number,
            Frame::SubmitSmResp(pdu) => pdu.sequence_number,
            Frame::DeliverSm(pdu) => pdu.sequence_number,
            Frame::DeliverSmResp(pdu) => pdu.sequence_number,
            Frame::Unbind(pdu) => pdu.sequence_number,
            Frame::UnbindResp(pdu) => pdu.sequence_number,
            Frame::EnquireLink(pdu) => pdu.sequence_number,
            Frame::EnquireLinkResp(pdu) => pdu.sequence_number,
            Frame::GenericNack(pdu) => pdu.sequence_number,
            Frame::Unknown(pdu) => pdu.header.sequence_number,
        }
    }

    /// Get the command_status carried by this frame
    pub fn command_status(&self) -> Result<CommandStatus, CodecError> {
        let status = match self {
            Frame::BindTransceiver(pdu) => pdu.command_status,
            Frame::BindTransceiverResp(pdu) => pdu.command_status,
            Frame::SubmitSm(pdu) => pdu.command_status,
            Frame::SubmitSmResp(pdu) => pdu.command_status,
            Frame::DeliverSm(pdu) => pdu.command_status,
            Frame::DeliverSmResp(pdu) => pdu.command_status,
            Frame::Unbind(pdu) => pdu.command_status,
            Frame::UnbindResp(pdu) => pdu.command_status,
            Frame::EnquireLink(pdu) => pdu.command_status,
            Frame::EnquireLinkResp(pdu) => pdu.command_status,
            Frame::GenericNack(pdu) => pdu.command_status,
            Frame::Unknown(pdu) => return pdu.header.status(),
        };
        Ok(status)
    }

    /// Stamp the sequence number and command_status used on the wire
    pub fn with_header(mut self, sequence_number: u32, status: CommandStatus) -> Frame {
        macro_rules! stamp {
            ($pdu:expr) => {{
                $pdu.sequence_number = sequence_number;
                $pdu.command_status = status;
            }};
        }

        match &mut self {
            Frame::BindTransceiver(pdu) => stamp!(pdu),
            Frame::BindTransceiverResp(pdu) => stamp!(pdu),
            Frame::SubmitSm(pdu) => stamp!(pdu),
            Frame::SubmitSmResp(pdu) => stamp!(pdu),
            Frame::DeliverSm(pdu) => stamp!(pdu),
            Frame::DeliverSmResp(pdu) => stamp!(pdu),
            Frame::Unbind(pdu) => stamp!(pdu),
            Frame::UnbindResp(pdu) => stamp!(pdu),
            Frame::EnquireLink(pdu) => stamp!(pdu),
            Frame::EnquireLinkResp(pdu) => stamp!(pdu),
            Frame::GenericNack(pdu) => stamp!(pdu),
            Frame::Unknown(pdu) => {
                pdu.header.sequence_number = sequence_number;
                pdu.header.command_status = status as u32;
            }
        }
        self
    }

    /// Check if this frame is a response PDU
    pub fn is_response(&self) -> bool {
        crate::datatypes::is_response_id(self.command_id())
    }

    /// Serialize the frame for the wire
    pub fn to_bytes(&self) -> Result<Bytes, CodecError> {
        match self {
            Frame::BindTransceiver(pdu) => pdu.to_bytes(),
            Frame::BindTransceiverResp(pdu) => pdu.to_bytes(),
            Frame::SubmitSm(pdu) => pdu.to_bytes(),
            Frame::SubmitSmResp(pdu) => pdu.to_bytes(),
            Frame::DeliverSm(pdu) => pdu.to_bytes(),
            Frame::DeliverSmResp(pdu) => pdu.to_bytes(),
            Frame::Unbind(pdu) => pdu.to_bytes(),
            Frame::UnbindResp(pdu) => pdu.to_bytes(),
            Frame::EnquireLink(pdu) => pdu.to_bytes(),
            Frame::EnquireLinkResp(pdu) => pdu.to_bytes(),
            Frame::GenericNack(pdu) => pdu.to_bytes(),
            Frame::Unknown(pdu) => {
                let mut buf = BytesMut::with_capacity(PduHeader::SIZE + pdu.body.len());
                let header = PduHeader {
                    command_length: (PduHeader::SIZE + pdu.body.len()) as u32,
                    ..pdu.header
                };
                header.encode(&mut buf);
                buf.put_slice(&pdu.body);
                Ok(buf.freeze())
            }
        }
    }
}
