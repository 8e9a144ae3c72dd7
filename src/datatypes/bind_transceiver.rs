use crate::codec::{
    decode_cstring, decode_u8, encode_cstring, CodecError, Decodable, Encodable, PduHeader,
};
use crate::datatypes::{
    CommandId, CommandStatus, InterfaceVersion, NumericPlanIndicator, TypeOfNumber,
};
use bytes::{Buf, BufMut, BytesMut};
use std::io::Cursor;

// C-Octet string maxima, NUL terminator included
const SYSTEM_ID_LEN: usize = 16;
const PASSWORD_LEN: usize = 9;
const SYSTEM_TYPE_LEN: usize = 13;
const ADDRESS_RANGE_LEN: usize = 41;

/// sc_interface_version TLV tag
const SC_INTERFACE_VERSION_TAG: u16 = 0x0210;

/// BindTransceiver is used to bind a transceiver ESME to the SMSC.
/// A transceiver ESME can both send and receive messages through a single connection.
#[derive(Clone, Debug, PartialEq)]
pub struct BindTransceiver {
    pub command_status: CommandStatus,
    pub sequence_number: u32,

    /// 5.2.1 system_id: identification of the ESME requesting to bind.
    pub system_id: String,

    /// 5.2.2 password: used by the SMSC to authenticate the ESME.
    pub password: String,

    /// 5.2.3 system_type: categorizes the type of ESME that is binding.
    pub system_type: String,

    /// 5.2.4 interface_version: version of SMPP supported by the ESME.
    pub interface_version: InterfaceVersion,

    /// 5.2.5 addr_ton: Type of Number of the ESME address(es) served.
    pub addr_ton: TypeOfNumber,

    /// 5.2.6 addr_npi: Numbering Plan Indicator of the ESME address(es) served.
    pub addr_npi: NumericPlanIndicator,

    /// 5.2.7 address_range: range of SME addresses serviced by the ESME.
    pub address_range: String,
}

impl BindTransceiver {
    /// A v3.4 bind with no address range, as a load-test client uses it
    pub fn new(
        sequence_number: u32,
        system_id: impl Into<String>,
        password: impl Into<String>,
        system_type: impl Into<String>,
    ) -> Self {
        Self {
            command_status: CommandStatus::Ok,
            sequence_number,
            system_id: system_id.into(),
            password: password.into(),
            system_type: system_type.into(),
            interface_version: InterfaceVersion::SmppV34,
            addr_ton: TypeOfNumber::Unknown,
            addr_npi: NumericPlanIndicator::Unknown,
            address_range: String::new(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct BindTransceiverResponse {
    pub command_status: CommandStatus,
    pub sequence_number: u32,

    /// SMSC identifier; may be absent when the bind was rejected
    pub system_id: String,

    /// sc_interface_version TLV, if the SMSC sent one
    pub sc_interface_version: Option<u8>,
}

impl Encodable for BindTransceiver {
    fn encode(&self, buf: &mut BytesMut) -> Result<(), CodecError> {
        PduHeader::outbound(
            CommandId::BindTransceiver,
            self.command_status,
            self.sequence_number,
        )
        .encode(buf);

        encode_cstring(buf, &self.system_id, SYSTEM_ID_LEN, "system_id")?;
        encode_cstring(buf, &self.password, PASSWORD_LEN, "password")?;
        encode_cstring(buf, &self.system_type, SYSTEM_TYPE_LEN, "system_type")?;
        buf.put_u8(self.interface_version as u8);
        buf.put_u8(self.addr_ton as u8);
        buf.put_u8(self.addr_npi as u8);
        encode_cstring(buf, &self.address_range, ADDRESS_RANGE_LEN, "address_range")?;

        Ok(())
    }
}

impl Decodable for BindTransceiver {
    fn decode(header: &PduHeader, buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        Self::validate_header(header)?;

        let system_id = decode_cstring(buf, SYSTEM_ID_LEN, "system_id")?;
        let password = decode_cstring(buf, PASSWORD_LEN, "password")?;
        let system_type = decode_cstring(buf, SYSTEM_TYPE_LEN, "system_type")?;

        let interface_version = InterfaceVersion::try_from(decode_u8(buf, "interface_version")?)
            .map_err(|_| CodecError::FieldValidation {
                field: "interface_version",
                reason: "Invalid InterfaceVersion value".to_string(),
            })?;
        let addr_ton = TypeOfNumber::try_from(decode_u8(buf, "addr_ton")?).map_err(|_| {
            CodecError::FieldValidation {
                field: "addr_ton",
                reason: "Invalid TypeOfNumber value".to_string(),
            }
        })?;
        let addr_npi = NumericPlanIndicator::try_from(decode_u8(buf, "addr_npi")?).map_err(|_| {
            CodecError::FieldValidation {
                field: "addr_npi",
                reason: "Invalid NumericPlanIndicator value".to_string(),
            }
        })?;
        let address_range = decode_cstring(buf, ADDRESS_RANGE_LEN, "address_range")?;

        Ok(BindTransceiver {
            command_status: header.status()?,
            sequence_number: header.sequence_number,
            system_id,
            password,
            system_type,
            interface_version,
            addr_ton,
            addr_npi,
            address_range,
        })
    }

    fn command_id() -> CommandId {
        CommandId::BindTransceiver
    }
}

impl Encodable for BindTransceiverResponse {
    fn encode(&self, buf: &mut BytesMut) -> Result<(), CodecError> {
        PduHeader::outbound(
            CommandId::BindTransceiverResp,
            self.command_status,
            self.sequence_number,
        )
        .encode(buf);

        encode_cstring(buf, &self.system_id, SYSTEM_ID_LEN, "system_id")?;
        if let Some(version) = self.sc_interface_version {
            buf.put_u16(SC_INTERFACE_VERSION_TAG);
            buf.put_u16(1);
            buf.put_u8(version);
        }

        Ok(())
    }
}

impl Decodable for BindTransceiverResponse {
    fn decode(header: &PduHeader, buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        Self::validate_header(header)?;

        // Rejected binds frequently arrive header-only
        let system_id = if buf.has_remaining() {
            decode_cstring(buf, SYSTEM_ID_LEN, "system_id")?
        } else {
            String::new()
        };

        let mut sc_interface_version = None;
        while buf.remaining() >= 4 {
            let tag = buf.get_u16();
            let length = buf.get_u16() as usize;
            if buf.remaining() < length {
                return Err(CodecError::FieldValidation {
                    field: "tlv",
                    reason: format!("TLV {tag:#06x} declares {length} octets"),
                });
            }
            if tag == SC_INTERFACE_VERSION_TAG && length == 1 {
                sc_interface_version = Some(buf.get_u8());
            } else {
                buf.advance(length);
            }
        }

        Ok(BindTransceiverResponse {
            command_status: header.status()?,
            sequence_number: header.sequence_number,
            system_id,
            sc_interface_version,
        })
    }

    fn command_id() -> CommandId {
        CommandId::BindTransceiverResp
    }
}
