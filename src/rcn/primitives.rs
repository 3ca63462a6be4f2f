//! NLME/NLDE request-confirm-indication-response primitive types
//! (`spec.md` §4.2), grounded on the `codyps-lorawan` MAC-command struct
//! style in `mac.rs` — plain structs passed between the network layer and
//! its caller rather than a marshalled byte stream (that boundary is
//! `crate::marshal`).

use crate::frame::TxOptions;
use crate::nib::NibAttributeId;
use crate::pairing::RecipientCapabilities;
use crate::status::Status;
use heapless::Vec;

/// `NLME-RESET.request` / `.confirm` (`spec.md` §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResetRequest {
    pub set_default_nib: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResetConfirm {
    pub status: Status,
}

/// `NLME-START.request` / `.confirm` (`spec.md` §4.2): claim a PAN id and
/// short address on one of `frame::CHANNELS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartRequest;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartConfirm {
    pub status: Status,
}

/// `NLME-DISCOVERY.request` (`spec.md` §4.2): a single active scan across
/// `frame::CHANNELS`, filtered by `search_device_type` and optional
/// `discovery_profile_id_list`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscoveryRequest {
    pub dst_pan_id: u16,
    pub dst_nwk_address: u16,
    pub search_device_type: u8,
    pub discovery_duration: core::time::Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscoveryConfirm {
    pub status: Status,
    pub num_nodes: u8,
}

/// `NLME-DISCOVERED.indication` (`spec.md` §4.2): one accepted response,
/// surfaced per-event as produced by `crate::rcn::discovery::DiscoveryFilter`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscoveredIndication {
    pub src_ieee_address: [u8; 8],
    pub src_pan_id: u16,
    pub channel: u8,
    pub device_type: u8,
    pub link_quality: u8,
}

/// `NLME-PAIR.request` (`spec.md` §4.2): complete the pairing handshake
/// (provisional ref already allocated by the caller via discovery) and
/// install a `PairingEntry`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairRequest {
    pub dst_ieee_address: [u8; 8],
    pub dst_pan_id: u16,
    pub org_vendor_id: u16,
    pub key_exchange_transfer_count: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairConfirm {
    pub status: Status,
    pub pairing_ref: u8,
    pub recipient_capabilities: RecipientCapabilities,
}

/// `NLME-PAIR.indication` (`spec.md` §4.2): a pair request received by a
/// target; the application decides whether to accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairIndication {
    pub src_ieee_address: [u8; 8],
    pub src_pan_id: u16,
    pub org_vendor_id: u16,
    pub key_exchange_transfer_count: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairResponse {
    pub accept: bool,
    pub provisional_pairing_ref: u8,
}

/// `NLME-AUTO-DISCOVERY.request/.confirm` (`spec.md` §4.2): put the target
/// in a mode where it responds to discovery requests addressed to its
/// `node_capabilities`/`user_string`, used for the non-push-button pairing
/// flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutoDiscoveryRequest {
    pub duration: core::time::Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutoDiscoveryConfirm {
    pub status: Status,
}

/// `NLME-UNPAIR.request/.confirm` and `.indication` (`spec.md` §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnpairRequest {
    pub pairing_ref: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnpairConfirm {
    pub status: Status,
    pub pairing_ref: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnpairIndication {
    pub pairing_ref: u8,
}

/// `NLME-GET.request/.confirm` and `NLME-SET.request/.confirm`
/// (`spec.md` §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GetRequest {
    pub attribute: NibAttributeId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GetConfirm {
    pub status: Status,
    pub attribute: NibAttributeId,
    pub value: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetRequest {
    pub attribute: NibAttributeId,
    pub value: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetConfirm {
    pub status: Status,
    pub attribute: NibAttributeId,
}

/// Max NLDE-DATA application payload (NSDU) in bytes. RF4CE bounds the NSDU
/// to what fits in one unfragmented MAC frame after the NWK/MAC headers and
/// CCM* MIC are accounted for; 95 bytes is that remaining budget.
pub const MAX_NSDU_LEN: usize = 95;

/// `NLDE-DATA.request` (`spec.md` §4.2).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataRequest {
    pub pairing_ref: u8,
    pub profile_id: u8,
    pub vendor_id: u16,
    pub tx_options: TxOptions,
    pub nsdu: Vec<u8, MAX_NSDU_LEN>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataConfirm {
    pub status: Status,
    pub pairing_ref: u8,
}

/// `NLDE-DATA.indication` (`spec.md` §4.2).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataIndication {
    pub pairing_ref: u8,
    pub profile_id: u8,
    pub vendor_id: u16,
    pub link_quality: u8,
    pub nsdu: Vec<u8, MAX_NSDU_LEN>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_request_carries_profile_and_nsdu() {
        let mut nsdu = Vec::new();
        nsdu.extend_from_slice(&[0x01, 0x02, 0x03]).unwrap();
        let req = DataRequest {
            pairing_ref: 0,
            profile_id: 0x01,
            vendor_id: 0x1014,
            tx_options: TxOptions::new(),
            nsdu,
        };
        assert_eq!(req.nsdu.as_slice(), &[0x01, 0x02, 0x03]);
    }

    #[test]
    fn pair_response_rejection_carries_no_valid_ref() {
        let resp = PairResponse {
            accept: false,
            provisional_pairing_ref: crate::pairing::INVALID_PAIRING_REF,
        };
        assert!(!resp.accept);
    }
}
