use crate::codec::{
    decode_cstring, decode_u8, encode_cstring, CodecError, Decodable, Encodable, PduHeader,
};
use crate::datatypes::submit_sm::{
    decode_short_message, ADDR_LEN, MAX_SHORT_MESSAGE_LENGTH, MESSAGE_ID_LEN, SERVICE_TYPE_LEN,
    TIME_LEN,
};
use crate::datatypes::{CommandId, CommandStatus};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::io::Cursor;

/// esm_class message type bits (xx0001xx) marking an SMSC delivery receipt
const ESM_CLASS_DELIVERY_RECEIPT: u8 = 0x04;
const ESM_CLASS_MESSAGE_TYPE_MASK: u8 = 0x3C;

/// Inbound addresses only need a terminator
const INBOUND_ADDR_LEN: usize = usize::MAX;

/// deliver_sm is issued by the SMSC to send a message to an ESME. Delivery
/// receipts arrive the same way.
///
/// Optional parameters are not interpreted; they are kept verbatim so the PDU
/// can be echoed or logged. Decoding is lenient about what the SMSC sends:
/// TON/NPI stay raw octets and addresses are not held to the 20-octet limit,
/// so an odd but well-framed delivery still gets acknowledged.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct DeliverSm {
    pub command_status: CommandStatus,
    pub sequence_number: u32,

    pub service_type: String,
    /// Raw `TypeOfNumber` octet; reserved values pass through
    pub source_addr_ton: u8,
    /// Raw `NumericPlanIndicator` octet
    pub source_addr_npi: u8,
    pub source_addr: String,
    pub dest_addr_ton: u8,
    pub dest_addr_npi: u8,
    pub destination_addr: String,
    pub esm_class: u8,
    pub protocol_id: u8,
    pub priority_flag: u8,
    /// Always NULL in deliver_sm
    pub schedule_delivery_time: String,
    /// Always NULL in deliver_sm
    pub validity_period: String,
    pub registered_delivery: u8,
    pub replace_if_present_flag: u8,
    pub data_coding: u8,
    pub sm_default_msg_id: u8,
    pub short_message: Bytes,

    /// Raw TLV block following the mandatory parameters
    pub optional_parameters: Bytes,
}

impl DeliverSm {
    pub fn new(source_addr: &str, destination_addr: &str, text: &str) -> Self {
        Self {
            source_addr: source_addr.to_string(),
            destination_addr: destination_addr.to_string(),
            short_message: Bytes::copy_from_slice(text.as_bytes()),
            ..Default::default()
        }
    }

    /// True when esm_class marks this as an SMSC delivery receipt
    pub fn is_delivery_receipt(&self) -> bool {
        self.esm_class & ESM_CLASS_MESSAGE_TYPE_MASK == ESM_CLASS_DELIVERY_RECEIPT
    }

    /// Build the matching deliver_sm_resp carrying `message_id`
    pub fn response(&self, message_id: impl Into<String>) -> DeliverSmResponse {
        DeliverSmResponse {
            command_status: CommandStatus::Ok,
            sequence_number: self.sequence_number,
            message_id: message_id.into(),
        }
    }
}

/// deliver_sm_resp. SMPP v3.4 leaves message_id unused, but SMSCs accept
/// a value and load-test peers use it to correlate.
#[derive(Clone, Debug, PartialEq)]
pub struct DeliverSmResponse {
    pub command_status: CommandStatus,
    pub sequence_number: u32,
    pub message_id: String,
}

impl Encodable for DeliverSm {
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

        PduHeader::outbound(CommandId::DeliverSm, self.command_status, self.sequence_number)
            .encode(buf);

        encode_cstring(buf, &self.service_type, SERVICE_TYPE_LEN, "service_type")?;
        buf.put_u8(self.source_addr_ton);
        buf.put_u8(self.source_addr_npi);
        encode_cstring(buf, &self.source_addr, ADDR_LEN, "source_addr")?;
        buf.put_u8(self.dest_addr_ton);
        buf.put_u8(self.dest_addr_npi);
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
        buf.put_slice(&self.optional_parameters);

        Ok(())
    }
}

impl Decodable for DeliverSm {
    fn decode(header: &PduHeader, buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        Self::validate_header(header)?;

        let service_type = decode_cstring(buf, SERVICE_TYPE_LEN, "service_type")?;
        let source_addr_ton = decode_u8(buf, "source_addr_ton")?;
        let source_addr_npi = decode_u8(buf, "source_addr_npi")?;
        let source_addr = decode_cstring(buf, INBOUND_ADDR_LEN, "source_addr")?;
        let dest_addr_ton = decode_u8(buf, "dest_addr_ton")?;
        let dest_addr_npi = decode_u8(buf, "dest_addr_npi")?;
        let destination_addr = decode_cstring(buf, INBOUND_ADDR_LEN, "destination_addr")?;
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
        let optional_parameters = buf.copy_to_bytes(buf.remaining());

        Ok(DeliverSm {
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
            optional_parameters,
        })
    }

    fn command_id() -> CommandId {
        CommandId::DeliverSm
    }
}

impl Encodable for DeliverSmResponse {
    fn encode(&self, buf: &mut BytesMut) -> Result<(), CodecError> {
        PduHeader::outbound(
            CommandId::DeliverSmResp,
            self.command_status,
            self.sequence_number,
        )
        .encode(buf);

        encode_cstring(buf, &self.message_id, MESSAGE_ID_LEN, "message_id")
    }
}

impl Decodable for DeliverSmResponse {
    fn decode(header: &PduHeader, buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        Self::validate_header(header)?;

        let message_id = if buf.has_remaining() {
            decode_cstring(buf, MESSAGE_ID_LEN, "message_id")?
        } else {
            String::new()
        };

        Ok(DeliverSmResponse {
            command_status: header.status()?,
            sequence_number: header.sequence_number,
            message_id,
        })
    }

    fn command_id() -> CommandId {
        CommandId::DeliverSmResp
    }
}
