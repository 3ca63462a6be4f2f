//! Primitive status codes shared by every NLME/NLDE confirm and by the
//! marshalled surrogate interface.
//!
//! Numeric values are contractual (`spec.md` §6): they are serialized onto
//! the wire by the marshalling layer and must not be renumbered.

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Status {
    Success = 0x00,
    InvalidIndex = 0xF9,
    InvalidParameter = 0xE8,
    UnsupportedAttribute = 0xF4,
    NoOrgCapacity = 0xB0,
    NoRecCapacity = 0xB1,
    NoPairing = 0xB2,
    NoResponse = 0xB3,
    NotPermitted = 0xB4,
    DuplicatePairing = 0xB5,
    FrameCounterExpired = 0xB6,
    DiscoveryError = 0xB7,
    DiscoveryTimeout = 0xB8,
    SecurityTimeout = 0xB9,
    SecurityFailure = 0xBA,
    NoSecurityKey = 0xBD,
    OutOfMemory = 0xBE,
    Communication = 0xBF,
}

impl Status {
    pub const fn is_success(self) -> bool {
        matches!(self, Status::Success)
    }

    pub fn from_u8(v: u8) -> Option<Self> {
        use Status::*;
        Some(match v {
            0x00 => Success,
            0xF9 => InvalidIndex,
            0xE8 => InvalidParameter,
            0xF4 => UnsupportedAttribute,
            0xB0 => NoOrgCapacity,
            0xB1 => NoRecCapacity,
            0xB2 => NoPairing,
            0xB3 => NoResponse,
            0xB4 => NotPermitted,
            0xB5 => DuplicatePairing,
            0xB6 => FrameCounterExpired,
            0xB7 => DiscoveryError,
            0xB8 => DiscoveryTimeout,
            0xB9 => SecurityTimeout,
            0xBA => SecurityFailure,
            0xBD => NoSecurityKey,
            0xBE => OutOfMemory,
            0xBF => Communication,
            _ => return None,
        })
    }
}

impl From<Status> for u8 {
    fn from(s: Status) -> Self {
        s as u8
    }
}

/// RTI-layer error kinds layered on top of [`Status`] (`spec.md` §7).
///
/// `FailedToConfigure` carries the profile nibble of the profile that was
/// mid-configuration when the failure occurred (`spec.md` §4.4).
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RtiError {
    FailedToDiscover,
    FailedToPair,
    AllowPairingTimeout,
    FailedToConfigure { profile_nibble: u8 },
    Status(Status),
}

impl From<Status> for RtiError {
    fn from(s: Status) -> Self {
        RtiError::Status(s)
    }
}
