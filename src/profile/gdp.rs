//! Generic Device Profile (`spec.md` §4.5): Generic-Response, Get/Push
//! Attributes, Heartbeat, and the GDP-scope attributes.

use crate::status::Status;
use heapless::Vec;

/// Generic-Response result codes (`spec.md` §4.5, §4.9).
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum GenericResponse {
    Success = 0x00,
    UnsupportedRequest = 0x01,
    InvalidParameter = 0x02,
    ConfigurationFailure = 0x03,
    MissingFragment = 0x41,
}

impl GenericResponse {
    pub fn is_success(self) -> bool {
        matches!(self, GenericResponse::Success)
    }
}

/// GDP-scope attribute ids (`spec.md` §4.5).
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum GdpAttributeId {
    KeyExchangeTransferCount = 0x80,
    PowerStatus = 0x81,
}

impl GdpAttributeId {
    pub fn from_u8(v: u8) -> Option<Self> {
        Some(match v {
            0x80 => GdpAttributeId::KeyExchangeTransferCount,
            0x81 => GdpAttributeId::PowerStatus,
            _ => return None,
        })
    }
}

/// `aplPowerStatus` (`spec.md` §4.5): low nibble is the power-meter reading
/// 0-15, bit 4 is the charging flag, bit 7 is impending-doom.
///
/// Grounded on the original `gdp.h` `POWER_STATUS_SET_POWER_METER`/
/// `_CHARGING_BIT`/`_IMPENDING_DOOM_BIT` macros, ported to typed accessors.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PowerStatus(pub u8);

impl PowerStatus {
    const METER_MASK: u8 = 0x0F;
    const CHARGING_BIT: u8 = 1 << 4;
    const IMPENDING_DOOM_BIT: u8 = 1 << 7;

    pub fn new(meter: u8, charging: bool, impending_doom: bool) -> Self {
        let mut v = meter & Self::METER_MASK;
        if charging {
            v |= Self::CHARGING_BIT;
        }
        if impending_doom {
            v |= Self::IMPENDING_DOOM_BIT;
        }
        Self(v)
    }

    pub fn power_meter(&self) -> u8 {
        self.0 & Self::METER_MASK
    }

    pub fn is_charging(&self) -> bool {
        self.0 & Self::CHARGING_BIT != 0
    }

    pub fn is_impending_doom(&self) -> bool {
        self.0 & Self::IMPENDING_DOOM_BIT != 0
    }
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GdpError {
    UnsupportedAttribute,
    InvalidParameter,
    BufferTooSmall,
}

impl From<GdpError> for GenericResponse {
    fn from(e: GdpError) -> Self {
        match e {
            GdpError::UnsupportedAttribute => GenericResponse::UnsupportedRequest,
            GdpError::InvalidParameter => GenericResponse::InvalidParameter,
            GdpError::BufferTooSmall => GenericResponse::InvalidParameter,
        }
    }
}

pub const MAX_GET_ATTR_RESPONSE_LEN: usize = 64;

/// One `(id, status, len, value)` record in a Get-Attributes-Response frame
/// (`spec.md` §4.5).
pub struct AttrRecord<'a> {
    pub id: u8,
    pub status: Status,
    pub value: &'a [u8],
}

/// Pack a Get-Attributes-Response frame body for the requested ids, each
/// resolved via `lookup` (`spec.md` §4.5: id byte, status byte, length byte,
/// little-endian value bytes, all in one frame).
pub fn encode_get_attr_response(
    ids: &[u8],
    mut lookup: impl FnMut(u8) -> Result<Vec<u8, 4>, GdpError>,
) -> Vec<u8, MAX_GET_ATTR_RESPONSE_LEN> {
    let mut out = Vec::new();
    for &id in ids {
        match lookup(id) {
            Ok(value) => {
                let _ = out.push(id);
                let _ = out.push(Status::Success as u8);
                let _ = out.push(value.len() as u8);
                let _ = out.extend_from_slice(&value);
            }
            Err(e) => {
                let status = match e {
                    GdpError::UnsupportedAttribute => Status::UnsupportedAttribute,
                    _ => Status::InvalidParameter,
                };
                let _ = out.push(id);
                let _ = out.push(status as u8);
                let _ = out.push(0);
            }
        }
    }
    out
}

/// Decode a Get-Attributes-Response frame body back into records, for the
/// requester side.
pub fn decode_get_attr_response(buf: &[u8]) -> heapless::Vec<(u8, Status, usize), 8> {
    let mut out = heapless::Vec::new();
    let mut i = 0;
    while i + 3 <= buf.len() {
        let id = buf[i];
        let status = Status::from_u8(buf[i + 1]).unwrap_or(Status::InvalidParameter);
        let len = buf[i + 2] as usize;
        i += 3;
        if i + len > buf.len() {
            break;
        }
        let _ = out.push((id, status, len));
        i += len;
    }
    out
}

/// Validate a `KeyExchangeTransferCount` push/get value (`spec.md` §4.2,
/// `aplcMinKeyExchangeTransferCount = 3`).
pub fn validate_key_exchange_transfer_count(value: u8) -> Result<(), GdpError> {
    if value < crate::security::MIN_KEY_EXCHANGE_TRANSFER_COUNT {
        return Err(GdpError::InvalidParameter);
    }
    Ok(())
}
