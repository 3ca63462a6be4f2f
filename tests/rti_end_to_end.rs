//! End-to-end scenarios from `spec.md` §8, driving the RTI state machine
//! together with the network layer and profile co-layers the way an
//! application would.

use core::time::Duration;
use rf4ce_core::nv::{MemoryNvStore, StartupControl};
use rf4ce_core::pairing::{ProfileDiscs, DEFAULT_PAIRING_TABLE_SIZE, PROFILE_BIT_ZID};
use rf4ce_core::rcn::discovery::{DiscoveredEvent, DiscoveryOutcome};
use rf4ce_core::rcn::primitives::UnpairRequest;
use rf4ce_core::rcn::Network;
use rf4ce_core::rti::{Rti, RtiState, ALLOW_PAIR_MAX_WAIT};
use rf4ce_core::status::{RtiError, Status};

fn discovered_event(ieee: u8, device_type: u8) -> DiscoveredEvent {
    DiscoveredEvent {
        channel: 15,
        pan_id: 0x1234,
        peer_ieee_address: [ieee; 8],
        peer_device_type: device_type,
        request_lqi: 200,
    }
}

#[test]
fn cold_boot_clear_state_start() {
    let mut nv: MemoryNvStore<16> = MemoryNvStore::new();
    let mut rti = Rti::new();
    let mut net: Network<DEFAULT_PAIRING_TABLE_SIZE> = Network::new();

    let startup = rti.init(&mut nv).unwrap();
    assert_eq!(startup, StartupControl::RestoreState);

    net.reset(rf4ce_core::rcn::primitives::ResetRequest {
        set_default_nib: true,
    });
    let confirm = net.start(rf4ce_core::rcn::primitives::StartRequest);
    assert_eq!(confirm.status, Status::Success);
    rti.on_start_confirm(confirm.status);

    assert_eq!(rti.state, RtiState::Ready);
    assert!(net.nib.started);
    assert_eq!(net.num_pairings(), 0);
}

#[test]
fn controller_pair_with_non_zid_target_completes_configuration_immediately() {
    let mut nv: MemoryNvStore<16> = MemoryNvStore::new();
    let mut rti = Rti::new();
    let mut net: Network<DEFAULT_PAIRING_TABLE_SIZE> = Network::new();
    net.start(rf4ce_core::rcn::primitives::StartRequest);
    rti.on_start_confirm(Status::Success);

    rti.begin_discovery().unwrap();
    let mut filter = net.begin_discovery();
    // exactly one responder, device type "TV" (arbitrary non-ZID type id).
    let outcome = net.offer_discovery_response(&mut filter, discovered_event(7, 0x30));
    assert_eq!(outcome, DiscoveryOutcome::Accepted);
    rti.on_discovery_outcome(filter.num_nodes() as u8);
    assert_eq!(rti.state, RtiState::Discovered);

    rti.begin_pair().unwrap();
    let pairing_ref = net.begin_pair(3).unwrap();
    net.offer_key_seed(0, [1; 16]).unwrap();
    net.offer_key_seed(1, [2; 16]).unwrap();
    net.offer_key_seed(2, [3; 16]).unwrap();
    let confirm = net.finish_pair(&mut nv).unwrap();
    assert_eq!(confirm.status, Status::Success);
    assert_eq!(confirm.pairing_ref, pairing_ref);

    // no ZID bit set: configuration completes vacuously, straight to READY.
    rti.on_pair_confirm(confirm.status, pairing_ref, ProfileDiscs::default())
        .unwrap();
    assert_eq!(rti.state, RtiState::Ready);
}

#[test]
fn controller_pair_with_zid_target_walks_configuration_then_returns_ready() {
    let mut nv: MemoryNvStore<16> = MemoryNvStore::new();
    let mut rti = Rti::new();
    let mut net: Network<DEFAULT_PAIRING_TABLE_SIZE> = Network::new();
    net.start(rf4ce_core::rcn::primitives::StartRequest);
    rti.on_start_confirm(Status::Success);

    rti.begin_discovery().unwrap();
    let mut filter = net.begin_discovery();
    net.offer_discovery_response(&mut filter, discovered_event(7, 0x01));
    rti.on_discovery_outcome(filter.num_nodes() as u8);

    rti.begin_pair().unwrap();
    let pairing_ref = net.begin_pair(3).unwrap();
    net.offer_key_seed(0, [1; 16]).unwrap();
    net.offer_key_seed(1, [2; 16]).unwrap();
    net.offer_key_seed(2, [3; 16]).unwrap();
    let confirm = net.finish_pair(&mut nv).unwrap();

    let mut discs = ProfileDiscs::default();
    discs.set(PROFILE_BIT_ZID);
    rti.on_pair_confirm(confirm.status, pairing_ref, discs)
        .unwrap();
    assert_eq!(
        rti.state,
        RtiState::Configuration {
            profile_bit: PROFILE_BIT_ZID,
            pairing_ref
        }
    );

    // Class-Device configuration walk runs alongside (exercised in full in
    // profile::zid::class_device's own tests); once it signals
    // GDP_EVT_CONFIGURE_NEXT past the last profile bit, RTI returns to
    // READY.
    rti.on_configure_next(discs).unwrap();
    assert_eq!(rti.state, RtiState::Ready);
}

#[test]
fn allow_pair_timeout_without_indication() {
    let mut rti = Rti::new();
    let t0 = Duration::from_millis(0);
    rti.on_auto_discovery_confirm_success(t0);
    assert!(rti.allow_pair_flag);

    let still_waiting = t0 + ALLOW_PAIR_MAX_WAIT - Duration::from_millis(1);
    assert!(rti.poll_allow_pair_timeout(still_waiting).is_none());

    let expired = t0 + ALLOW_PAIR_MAX_WAIT;
    assert_eq!(
        rti.poll_allow_pair_timeout(expired),
        Some(RtiError::AllowPairingTimeout)
    );
    assert!(!rti.allow_pair_flag);
}

#[test]
fn two_distinct_discovery_responders_prevents_pairing() {
    // spec.md §8 property 6 / "discovery push-button policy".
    let mut rti = Rti::new();
    let mut net: Network<DEFAULT_PAIRING_TABLE_SIZE> = Network::new();
    rti.on_start_confirm(Status::Success);
    rti.begin_discovery().unwrap();
    let mut filter = net.begin_discovery();

    assert_eq!(
        net.offer_discovery_response(&mut filter, discovered_event(1, 0x01)),
        DiscoveryOutcome::Accepted
    );
    assert_eq!(
        net.offer_discovery_response(&mut filter, discovered_event(2, 0x01)),
        DiscoveryOutcome::MultipleRespondersError
    );

    rti.on_discovery_outcome(2);
    assert_eq!(rti.state, RtiState::DiscoveryError);
    // pairing must not be reachable from DISCOVERY_ERROR
    assert!(rti.begin_pair().is_err());
}

#[test]
fn unpair_on_configuration_failure_clears_pairing_table_entry() {
    let mut nv: MemoryNvStore<16> = MemoryNvStore::new();
    let mut rti = Rti::new();
    let mut net: Network<DEFAULT_PAIRING_TABLE_SIZE> = Network::new();

    let mut filter = net.begin_discovery();
    net.offer_discovery_response(&mut filter, discovered_event(7, 0x01));
    let pairing_ref = net.begin_pair(3).unwrap();
    net.offer_key_seed(0, [1; 16]).unwrap();
    net.offer_key_seed(1, [2; 16]).unwrap();
    net.offer_key_seed(2, [3; 16]).unwrap();
    net.finish_pair(&mut nv).unwrap();
    assert_eq!(net.num_pairings(), 1);

    let mut discs = ProfileDiscs::default();
    discs.set(PROFILE_BIT_ZID);
    rti.state = RtiState::Configuration {
        profile_bit: PROFILE_BIT_ZID,
        pairing_ref,
    };
    let err = rti.on_configure_failure();
    assert_eq!(
        err,
        RtiError::FailedToConfigure {
            profile_nibble: PROFILE_BIT_ZID & 0x0F
        }
    );
    assert_eq!(rti.state, RtiState::Ready);

    let confirm = net.unpair(&mut nv, UnpairRequest { pairing_ref });
    assert_eq!(confirm.status, Status::Success);
    assert_eq!(net.num_pairings(), 0);
}
