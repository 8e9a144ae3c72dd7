use crate::codec::{
    decode_cstring, decode_u8, encode_cstring, CodecError, Decodable, Encodable, PduHeader,
};
use crate::datatypes::{CommandId, CommandStatus, NumericPlanIndicator, TypeOfNumber};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::io::Cursor;

// SMPP v3.4 field limits, NUL terminator included for C-Octet strings
pub(crate) const SERVICE_TYPE_LEN: usize = 6;
pub(crate) const ADDR_LEN: usize = 21;
pub(crate) const TIME_LEN: usize = 17;
pub(crate) const MESSAGE_ID_LEN: usize = 65;
pub(crate) const MAX_SHORT_MESSAGE_LENGTH: usize = 254;

/// This operation is used by an ESME to submit a short message to the SMSC for
/// onward transmission to a specified short message entity (SME).
///
/// Only the mandatory parameters are modelled; a load test sends plain text.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct SubmitSm {
    pub command_status: CommandStatus,
    pub sequence_number: u32,

    /// 4.4.1 service_type: SMS application service associated with the message.
    pub service_type: String,
    pub source_addr_ton: TypeOfNumber,
    pub source_addr_npi: NumericPlanIndicator,
    /// Address of the SME which originated this message.
    pub source_addr: String,
    pub dest_addr_ton: TypeOfNumber,
    pub dest_addr_npi: NumericPlanIndicator,
    /// Destination address of this short message.
    pub destination_addr: String,
    pub esm_class: u8,
    pub protocol_id: u8,
    pub priority_flag: u8,
    pub schedule_delivery_time: String,
    pub validity_period: String,
    pub registered_delivery: u8,
    pub replace_if_present_flag: u8,
    pub data_coding: u8,
    pub sm_default_msg_id: u8,
    /// Up to 254 octets of user data; sm_length is derived from it on encode.
    pub short_message: Bytes,
}

impl SubmitSm {
    /// A submit_sm carrying only addresses and text, everything else NULL
    pub fn new(source_addr: &str, destination_addr: &str, text: &str) -> Self {
        Self {
            source_addr: source_addr.to_string(),
            destination_addr: destination_addr.to_string(),
            short_message: Bytes::copy_from_slice(text.as_bytes()),
            ..Default::default()
        }
    }
}

/// submit_sm_resp: carries the SMSC message id when the submission was accepted.
#[derive(Clone, Debug, PartialEq)]
pub struct SubmitSmResponse {
    pub command_status: CommandStatus,
    pub sequence_number: u32,
    pub message_id: String,
}

impl Encodable for SubmitSm {
    fn encode(&self, buf: &mut BytesMut) -> Result<(), CodecError> {
        if self.short_message.len() > MAX_SHORT_MESSAGE_LENGTH {
            return Err(CodecError::FieldValidation {
                field: "short_message",
                reason: format!(
                    "{} octets exceeds maximum of {MAX_SHORT_MESSAGE_LENGTH}",
                    self.short_message.len()
                ),
            });
        }

        PduHeader::outbound(CommandId::SubmitSm, self.command_status, self.sequence_number)
            .encode(buf);

        encode_cstring(buf, &self.service_type, SERVICE_TYPE_LEN, "service_type")?;
        buf.put_u8(self.source_addr_ton as u8);
        buf.put_u8(self.source_addr_npi as u8);
        encode_cstring(buf, &self.source_addr, ADDR_LEN, "source_addr")?;
        buf.put_u8(self.dest_addr_ton as u8);
        buf.put_u8(self.dest_addr_npi as u8);
        encode_cstring(buf, &self.destination_addr, ADDR_LEN, "destination_addr")?;
        buf.put_u8(self.esm_class);
        buf.put_u8(self.protocol_id);
        buf.put_u8(self.priority_flag);
        encode_cstring(buf, &self.schedule_delivery_time, TIME_LEN, "schedule_delivery_time")?;
        encode_cstring(buf, &self.validity_period, TIME_LEN, "validity_period")?;
        buf.put_u8(self.registered_delivery);
        buf.put_u8(self.replace_if_present_flag);
        buf.put_u8(self.data_coding);
        buf.put_u8(self.sm_default_msg_id);
        buf.put_u8(self.short_message.len() as u8);
        buf.put_slice(&self.short_message);

        Ok(())
    }
}

impl Decodable for SubmitSm {
    fn decode(header: &PduHeader, buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        Self::validate_header(header)?;

        let service_type = decode_cstring(buf, SERVICE_TYPE_LEN, "service_type")?;
        let source_addr_ton = decode_ton(buf, "source_addr_ton")?;
        let source_addr_npi = decode_npi(buf, "source_addr_npi")?;
        let source_addr = decode_cstring(buf, ADDR_LEN, "source_addr")?;
        let dest_addr_ton = decode_ton(buf, "dest_addr_ton")?;
        let dest_addr_npi = decode_npi(buf, "dest_addr_npi")?;
        let destination_addr = decode_cstring(buf, ADDR_LEN, "destination_addr")?;
        let esm_class = decode_u8(buf, "esm_class")?;
        let protocol_id = decode_u8(buf, "protocol_id")?;
        let priority_flag = decode_u8(buf, "priority_flag")?;
        let schedule_delivery_time = decode_cstring(buf, TIME_LEN, "schedule_delivery_time")?;
        let validity_period = decode_cstring(buf, TIME_LEN, "validity_period")?;
        let registered_delivery = decode_u8(buf, "registered_delivery")?;
        let replace_if_present_flag = decode_u8(buf, "replace_if_present_flag")?;
        let data_coding = decode_u8(buf, "data_coding")?;
        let sm_default_msg_id = decode_u8(buf, "sm_default_msg_id")?;
        let short_message = decode_short_message(buf)?;

        Ok(SubmitSm {
            command_status: header.status()?,
            sequence_number: header.sequence_number,
            service_type,
            source_addr_ton,
            source_addr_npi,
            source_addr,
            dest_addr_ton,
            dest_addr_npi,
            destination_addr,
            esm_class,
            protocol_id,
            priority_flag,
            schedule_delivery_time,
            validity_period,
            registered_delivery,
            replace_if_present_flag,
            data_coding,
            sm_default_msg_id,
            short_message,
        })
    }

    fn command_id() -> CommandId {
        CommandId::SubmitSm
    }
}

impl Encodable for SubmitSmResponse {
    fn encode(&self, buf: &mut BytesMut) -> Result<(), CodecError> {
        PduHeader::outbound(
            CommandId::SubmitSmResp,
            self.command_status,
            self.sequence_number,
        )
        .encode(buf);

        encode_cstring(buf, &self.message_id, MESSAGE_ID_LEN, "message_id")
    }
}

impl Decodable for SubmitSmResponse {
    fn decode(header: &PduHeader, buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        Self::validate_header(header)?;

        // The body is omitted when command_status is non-zero
        let message_id = if buf.has_remaining() {
            decode_cstring(buf, MESSAGE_ID_LEN, "message_id")?
        } else {
            String::new()
        };

        Ok(SubmitSmResponse {
            command_status: header.status()?,
            sequence_number: header.sequence_number,
            message_id,
        })
    }

    fn command_id() -> CommandId {
        CommandId::SubmitSmResp
    }
}

fn decode_ton(
    buf: &mut Cursor<&[u8]>,
    field: &'static str,
) -> Result<TypeOfNumber, CodecError> {
    TypeOfNumber::try_from(decode_u8(buf, field)?).map_err(|_| CodecError::FieldValidation {
        field,
        reason: "Invalid TypeOfNumber value".to_string(),
    })
}

fn decode_npi(
    buf: &mut Cursor<&[u8]>,
    field: &'static str,
) -> Result<NumericPlanIndicator, CodecError> {
    NumericPlanIndicator::try_from(decode_u8(buf, field)?).map_err(|_| {
        CodecError::FieldValidation {
            field,
            reason: "Invalid NumericPlanIndicator value".to_string(),
        }
    })
}

/// sm_length followed by that many octets of user data
pub(crate) fn decode_short_message(buf: &mut Cursor<&[u8]>) -> Result<Bytes, CodecError> {
    let sm_length = decode_u8(buf, "sm_length")? as usize;
    if buf.remaining() < sm_length {
        return Err(CodecError::FieldValidation {
            field: "short_message",
            reason: format!(
                "sm_length is {sm_length} but only {} octets remain",
                buf.remaining()
            ),
        });
    }
    Ok(buf.copy_to_bytes(sm_length))
}
