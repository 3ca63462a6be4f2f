//! RF4CE over-the-air frame constants and the NLDE-DATA tx-options bitfield
//! (`spec.md` §6), plus the shared GDP/ZID frame-control byte
//! (`spec.md` §6 "ZID / GDP frame layout").

use modular_bitfield::prelude::*;

pub const PROTOCOL_IDENTIFIER: u8 = 0xCE;
pub const PROTOCOL_VERSION: u8 = 0x01;

pub const CHANNELS: [u8; 3] = [15, 20, 25];

pub fn channel_mask() -> u32 {
    CHANNELS.iter().fold(0u32, |mask, &ch| mask | (1 << ch))
}

/// `NLDE-DATA` tx-options bits (`spec.md` §4.2).
#[bitfield]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxOptions {
    pub broadcast: bool,
    pub ieee_address: bool,
    pub acknowledged: bool,
    pub security: bool,
    pub single_channel: bool,
    pub channel_designator: bool,
    pub vendor_specific: bool,
    #[skip]
    __: B1,
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxOptionsError {
    /// Broadcast is never allowed in combination with single-channel
    /// transmission (`spec.md` §4.2, §4.6, §5).
    BroadcastWithSingleChannel,
    /// `security` was requested but no link key is installed for the
    /// target pairing.
    NoSecurityKey,
}

impl TxOptions {
    pub fn validate(&self) -> Result<(), TxOptionsError> {
        if self.broadcast() && self.single_channel() {
            return Err(TxOptionsError::BroadcastWithSingleChannel);
        }
        Ok(())
    }
}

/// Which of the three RF4CE communication pipes a ZID transmission uses
/// (original `ZID_COMM_PIPE_*`, `spec.md` §4.6/§4.7).
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CommPipe {
    Control = 0x0,
    InterruptIn = 0x1,
    InterruptOut = 0x2,
}

/// Shared GDP/ZID frame-control byte: `[D P 0 0 CMD4]` (`spec.md` §6).
#[bitfield]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameControl {
    pub cmd: B6,
    pub is_gdp_command: bool,
    pub data_pending: bool,
}

impl FrameControl {
    pub fn new_gdp(cmd: u8) -> Self {
        FrameControl::new().with_cmd(cmd).with_is_gdp_command(true)
    }

    pub fn new_zid(cmd: u8) -> Self {
        FrameControl::new()
            .with_cmd(cmd)
            .with_is_gdp_command(false)
    }
}

pub mod gdp_cmd {
    pub const GENERIC_RSP: u8 = 0x40 & 0x3F;
    pub const CFG_COMPLETE: u8 = 0x41 & 0x3F;
    pub const HEARTBEAT: u8 = 0x42 & 0x3F;
    pub const GET_ATTR: u8 = 0x43 & 0x3F;
    pub const GET_ATTR_RSP: u8 = 0x44 & 0x3F;
    pub const PUSH_ATTR: u8 = 0x45 & 0x3F;
}

pub mod zid_cmd {
    pub const GET_REPORT: u8 = 0x01;
    pub const REPORT_DATA: u8 = 0x02;
    pub const SET_REPORT: u8 = 0x03;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_mask_ors_all_three_channels() {
        let m = channel_mask();
        assert_eq!(m, (1 << 15) | (1 << 20) | (1 << 25));
    }

    #[test]
    fn broadcast_with_single_channel_rejected() {
        let opts = TxOptions::new().with_broadcast(true).with_single_channel(true);
        assert_eq!(
            opts.validate(),
            Err(TxOptionsError::BroadcastWithSingleChannel)
        );
    }

    #[test]
    fn single_channel_alone_is_valid() {
        let opts = TxOptions::new().with_single_channel(true);
        assert_eq!(opts.validate(), Ok(()));
    }

    #[test]
    fn frame_control_gdp_roundtrip() {
        let fc = FrameControl::new_gdp(gdp_cmd::GET_ATTR);
        assert!(fc.is_gdp_command());
        assert_eq!(fc.cmd(), gdp_cmd::GET_ATTR);
    }
}
