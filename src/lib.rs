//! RF4CE network layer (NLDE/NLME), the RemoTI (RTI) state machine, and the
//! GDP/ZID profile co-layers it configures over a pairing.
//!
//! Supports `no_std`.
#![no_std]

pub mod frame;
pub mod marshal;
pub mod nib;
pub mod nv;
pub mod pairing;
pub mod profile;
pub mod rcn;
pub mod rti;
pub mod scheduler;
pub mod security;
pub mod status;

pub use nv::{NvError, NvItemId, NvStore};
pub use pairing::{PairingEntry, PairingTable};
pub use rcn::Network;
pub use rti::{Rti, RtiState};
pub use status::{RtiError, Status};
