//! The surrogate marshalling layer (`spec.md` §4.3): the byte-stream
//! encoding of NLME/NLDE and RTI primitives across the application
//! processor / network processor boundary.
//!
//! Every message leads with a subsystem id and a command id, mirroring the
//! two-byte command header `codyps_lorawan::mac_frame` uses for its MAC
//! commands; the payload itself is a pointer-free fixed layout, encoded with
//! the same manual `to_le_bytes`/`copy_from_slice` style as
//! `crate::pairing::encode_entry`. Synchronous requests get an immediate
//! response frame; asynchronous confirms/indications are queued separately
//! and drained by the caller, matching the original RemoTI NPI transport's
//! split between synchronous and asynchronous request types.

use crate::frame::TxOptions;
use crate::rcn::primitives::{DataIndication, DataRequest, MAX_NSDU_LEN};
use crate::status::Status;
use heapless::Vec;

/// Fixed header size of a marshalled NLDE-DATA request/indication payload:
/// `pairing_ref`(1) + `profile_id`(1) + `vendor_id`(2) + one more byte
/// (`tx_options` on request, `link_quality` on indication).
const DATA_HEADER_LEN: usize = 5;

/// Subsystem ids (`spec.md` §4.3): which co-layer a frame's command id is
/// scoped to.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Subsystem {
    Rti = 0x01,
    Nwk = 0x02,
    Gdp = 0x03,
    Zid = 0x04,
}

impl Subsystem {
    pub fn from_u8(v: u8) -> Option<Self> {
        Some(match v {
            0x01 => Subsystem::Rti,
            0x02 => Subsystem::Nwk,
            0x03 => Subsystem::Gdp,
            0x04 => Subsystem::Zid,
            _ => return None,
        })
    }
}

/// Whether a command expects an immediate synchronous response, or
/// completes later via a queued asynchronous confirm/indication
/// (`spec.md` §4.3).
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    SyncRequest,
    AsyncConfirm,
    AsyncIndication,
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarshalError {
    /// Frame shorter than the 2-byte header, or shorter than its declared
    /// payload length.
    Truncated,
    UnknownSubsystem(u8),
    PayloadTooLarge { have: usize, max: usize },
}

/// Large enough for the worst-case marshalled primitive: NLDE-DATA.request's
/// fixed header (`pairing_ref` + `profile_id` + `vendor_id` + `tx_options` =
/// 5 bytes) plus a full `MAX_NSDU_LEN`-byte NSDU
/// (`crate::rcn::primitives::MAX_NSDU_LEN` = 95).
pub const MAX_PAYLOAD_LEN: usize = 100;
pub const HEADER_LEN: usize = 3;

/// One marshalled frame: `[subsystem][command_id][payload_len][payload...]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub subsystem: Subsystem,
    pub command_id: u8,
    pub payload: Vec<u8, MAX_PAYLOAD_LEN>,
}

impl Frame {
    pub fn new(subsystem: Subsystem, command_id: u8, payload: &[u8]) -> Result<Self, MarshalError> {
        let mut v = Vec::new();
        v.extend_from_slice(payload)
            .map_err(|_| MarshalError::PayloadTooLarge {
                have: payload.len(),
                max: MAX_PAYLOAD_LEN,
            })?;
        Ok(Self {
            subsystem,
            command_id,
            payload: v,
        })
    }

    /// Encode into `buf`, returning the number of bytes written.
    pub fn encode(&self, buf: &mut [u8]) -> Result<usize, MarshalError> {
        let total = HEADER_LEN + self.payload.len();
        if buf.len() < total {
            return Err(MarshalError::Truncated);
        }
        buf[0] = self.subsystem as u8;
        buf[1] = self.command_id;
        buf[2] = self.payload.len() as u8;
        buf[HEADER_LEN..total].copy_from_slice(&self.payload);
        Ok(total)
    }

    pub fn decode(buf: &[u8]) -> Result<Self, MarshalError> {
        if buf.len() < HEADER_LEN {
            return Err(MarshalError::Truncated);
        }
        let subsystem = Subsystem::from_u8(buf[0]).ok_or(MarshalError::UnknownSubsystem(buf[0]))?;
        let command_id = buf[1];
        let len = buf[2] as usize;
        let payload = buf
            .get(HEADER_LEN..HEADER_LEN + len)
            .ok_or(MarshalError::Truncated)?;
        Self::new(subsystem, command_id, payload)
    }
}

/// Encode a bare `Status` as a one-byte confirm payload — the common case
/// for `*.confirm` frames that carry nothing but a result code
/// (`spec.md` §4.2/§4.3).
pub fn encode_status_only(subsystem: Subsystem, command_id: u8, status: Status) -> Frame {
    Frame::new(subsystem, command_id, &[status.into()]).expect("one byte fits")
}

pub fn decode_status_only(frame: &Frame) -> Result<Status, MarshalError> {
    let byte = *frame.payload.first().ok_or(MarshalError::Truncated)?;
    Status::from_u8(byte).ok_or(MarshalError::Truncated)
}

/// Marshal an `NLDE-DATA.request` (`spec.md` §4.2, §4.3): header is
/// `[pairing_ref][profile_id][vendor_id_lo][vendor_id_hi][tx_options]`
/// followed by the raw NSDU.
pub fn encode_data_request(req: &DataRequest) -> Result<Frame, MarshalError> {
    let vendor_id = req.vendor_id.to_le_bytes();
    let header = [
        req.pairing_ref,
        req.profile_id,
        vendor_id[0],
        vendor_id[1],
        req.tx_options.into_bytes()[0],
    ];
    let too_large = || MarshalError::PayloadTooLarge {
        have: DATA_HEADER_LEN + req.nsdu.len(),
        max: MAX_PAYLOAD_LEN,
    };
    let mut payload: Vec<u8, MAX_PAYLOAD_LEN> = Vec::new();
    payload.extend_from_slice(&header).map_err(|_| too_large())?;
    payload.extend_from_slice(&req.nsdu).map_err(|_| too_large())?;
    Ok(Frame {
        subsystem: Subsystem::Nwk,
        command_id: nwk_cmd::DATA,
        payload,
    })
}

pub fn decode_data_request(frame: &Frame) -> Result<DataRequest, MarshalError> {
    let buf = frame.payload.as_slice();
    if buf.len() < DATA_HEADER_LEN {
        return Err(MarshalError::Truncated);
    }
    let mut nsdu = Vec::new();
    nsdu.extend_from_slice(&buf[DATA_HEADER_LEN..])
        .map_err(|_| MarshalError::PayloadTooLarge {
            have: buf.len() - DATA_HEADER_LEN,
            max: MAX_NSDU_LEN,
        })?;
    Ok(DataRequest {
        pairing_ref: buf[0],
        profile_id: buf[1],
        vendor_id: u16::from_le_bytes([buf[2], buf[3]]),
        tx_options: TxOptions::from_bytes([buf[4]]),
        nsdu,
    })
}

/// Marshal an `NLDE-DATA.indication` (`spec.md` §4.2, §4.3): same header
/// shape as the request, with `link_quality` in place of `tx_options`.
pub fn encode_data_indication(ind: &DataIndication) -> Result<Frame, MarshalError> {
    let vendor_id = ind.vendor_id.to_le_bytes();
    let header = [
        ind.pairing_ref,
        ind.profile_id,
        vendor_id[0],
        vendor_id[1],
        ind.link_quality,
    ];
    let too_large = || MarshalError::PayloadTooLarge {
        have: DATA_HEADER_LEN + ind.nsdu.len(),
        max: MAX_PAYLOAD_LEN,
    };
    let mut payload: Vec<u8, MAX_PAYLOAD_LEN> = Vec::new();
    payload.extend_from_slice(&header).map_err(|_| too_large())?;
    payload.extend_from_slice(&ind.nsdu).map_err(|_| too_large())?;
    Ok(Frame {
        subsystem: Subsystem::Nwk,
        command_id: nwk_cmd::DATA_IND,
        payload,
    })
}

pub fn decode_data_indication(frame: &Frame) -> Result<DataIndication, MarshalError> {
    let buf = frame.payload.as_slice();
    if buf.len() < DATA_HEADER_LEN {
        return Err(MarshalError::Truncated);
    }
    let mut nsdu = Vec::new();
    nsdu.extend_from_slice(&buf[DATA_HEADER_LEN..])
        .map_err(|_| MarshalError::PayloadTooLarge {
            have: buf.len() - DATA_HEADER_LEN,
            max: MAX_NSDU_LEN,
        })?;
    Ok(DataIndication {
        pairing_ref: buf[0],
        profile_id: buf[1],
        vendor_id: u16::from_le_bytes([buf[2], buf[3]]),
        link_quality: buf[4],
        nsdu,
    })
}

/// Command ids within [`Subsystem::Nwk`] (`spec.md` §4.2).
pub mod nwk_cmd {
    pub const RESET: u8 = 0x01;
    pub const START: u8 = 0x02;
    pub const DISCOVERY: u8 = 0x03;
    pub const DISCOVERED: u8 = 0x04;
    pub const PAIR: u8 = 0x05;
    pub const PAIR_IND: u8 = 0x06;
    pub const AUTO_DISCOVERY: u8 = 0x07;
    pub const UNPAIR: u8 = 0x08;
    pub const UNPAIR_IND: u8 = 0x09;
    pub const GET: u8 = 0x0A;
    pub const SET: u8 = 0x0B;
    pub const DATA: u8 = 0x0C;
    pub const DATA_IND: u8 = 0x0D;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_roundtrips_through_encoding() {
        let f = Frame::new(Subsystem::Nwk, nwk_cmd::PAIR, &[1, 2, 3]).unwrap();
        let mut buf = [0u8; 16];
        let n = f.encode(&mut buf).unwrap();
        let decoded = Frame::decode(&buf[..n]).unwrap();
        assert_eq!(decoded, f);
    }

    #[test]
    fn decode_rejects_truncated_header() {
        assert_eq!(Frame::decode(&[0x02, 0x05]), Err(MarshalError::Truncated));
    }

    #[test]
    fn decode_rejects_unknown_subsystem() {
        assert_eq!(
            Frame::decode(&[0xFF, 0x00, 0x00]),
            Err(MarshalError::UnknownSubsystem(0xFF))
        );
    }

    #[test]
    fn status_only_roundtrips() {
        let f = encode_status_only(Subsystem::Nwk, nwk_cmd::UNPAIR, Status::NoPairing);
        assert_eq!(decode_status_only(&f).unwrap(), Status::NoPairing);
    }

    #[test]
    fn data_request_roundtrips_through_marshalling() {
        let mut nsdu = Vec::new();
        nsdu.extend_from_slice(&[0xAA, 0xBB, 0xCC]).unwrap();
        let req = DataRequest {
            pairing_ref: 2,
            profile_id: 0x04,
            vendor_id: 0x1014,
            tx_options: TxOptions::new().with_acknowledged(true),
            nsdu,
        };
        let frame = encode_data_request(&req).unwrap();
        assert_eq!(frame.subsystem, Subsystem::Nwk);
        assert_eq!(frame.command_id, nwk_cmd::DATA);
        let decoded = decode_data_request(&frame).unwrap();
        assert_eq!(decoded, req);
    }

    #[test]
    fn data_request_with_max_nsdu_fits_the_payload_budget() {
        let nsdu: Vec<u8, MAX_NSDU_LEN> = Vec::from_slice(&[0x5A; MAX_NSDU_LEN]).unwrap();
        let req = DataRequest {
            pairing_ref: 0,
            profile_id: 1,
            vendor_id: 0,
            tx_options: TxOptions::new(),
            nsdu,
        };
        let frame = encode_data_request(&req).unwrap();
        let decoded = decode_data_request(&frame).unwrap();
        assert_eq!(decoded.nsdu.len(), MAX_NSDU_LEN);
    }

    #[test]
    fn data_indication_roundtrips_through_marshalling() {
        let mut nsdu = Vec::new();
        nsdu.extend_from_slice(&[1, 2, 3, 4]).unwrap();
        let ind = DataIndication {
            pairing_ref: 1,
            profile_id: 0x04,
            vendor_id: 0x1014,
            link_quality: 230,
            nsdu,
        };
        let frame = encode_data_indication(&ind).unwrap();
        assert_eq!(frame.command_id, nwk_cmd::DATA_IND);
        let decoded = decode_data_indication(&frame).unwrap();
        assert_eq!(decoded, ind);
    }
}
