//! The network layer entry point (`spec.md` §3, §4.2): owns the NIB, the
//! pairing table, the discovery cache/filter, and frequency agility, and
//! answers the NLME/NLDE primitive API.

use crate::frame::{CHANNELS, PROTOCOL_IDENTIFIER};
use crate::nib::Nib;
use crate::nv::NvStore;
use crate::pairing::{PairingTable, DEFAULT_PAIRING_TABLE_SIZE};
use crate::rcn::discovery::{DiscoveredEvent, DiscoveryCache, DiscoveryFilter, DiscoveryOutcome};
use crate::rcn::freq_agility::FreqAgility;
use crate::rcn::pair::ProvisionalPairing;
use crate::rcn::primitives::*;
use crate::status::Status;

/// Top-level RCN/NWK state (`spec.md` §3). Generic over the pairing-table
/// capacity so embedders can size it to their NV budget, mirroring the
/// teacher's `EndDevice<C>` being generic over its `Clock`.
pub struct Network<const N: usize = DEFAULT_PAIRING_TABLE_SIZE> {
    pub nib: Nib,
    pub pairing_table: PairingTable<N>,
    discovery_cache: DiscoveryCache,
    freq_agility: FreqAgility,
    provisional: Option<ProvisionalPairing>,
}

impl<const N: usize> Default for Network<N> {
    fn default() -> Self {
        Self {
            nib: Nib::default(),
            pairing_table: PairingTable::new(),
            discovery_cache: DiscoveryCache::default(),
            freq_agility: FreqAgility::new(),
            provisional: None,
        }
    }
}

impl<const N: usize> Network<N> {
    pub fn new() -> Self {
        Self::default()
    }

    /// `NLME-RESET.request` (`spec.md` §4.2).
    pub fn reset(&mut self, req: ResetRequest) -> ResetConfirm {
        self.nib.reset(req.set_default_nib);
        self.discovery_cache = DiscoveryCache::default();
        self.provisional = None;
        ResetConfirm {
            status: Status::Success,
        }
    }

    /// `NLME-START.request` (`spec.md` §4.2): claims a PAN id and short
    /// address. The actual MAC-level PAN formation/scan is an external
    /// collaborator; here we only record that startup completed.
    pub fn start(&mut self, _req: StartRequest) -> StartConfirm {
        self.nib.started = true;
        StartConfirm {
            status: Status::Success,
        }
    }

    /// Begin accepting `NLME-DISCOVERY` responses for one discovery window,
    /// filtered per the push-button-pair policy (`spec.md` §4.4, §8
    /// property 6).
    pub fn begin_discovery(&mut self) -> DiscoveryFilter<3> {
        DiscoveryFilter::new(self.nib.discovery_lqi_threshold)
    }

    /// Accept one filtered discovery response into the single-entry cache,
    /// used once the caller's `DiscoveryFilter` has accepted exactly one
    /// responder (`spec.md` §3).
    pub fn cache_discovered(&mut self, event: DiscoveredEvent) {
        self.discovery_cache.0 = Some(event);
    }

    pub fn discovered(&self) -> Option<DiscoveredEvent> {
        self.discovery_cache.0
    }

    /// Allocate a provisional pairing and begin the key-exchange handshake
    /// (`spec.md` §4.2, §4.4), grounded on the cached discovery result.
    pub fn begin_pair(&mut self, transfer_count: u8) -> Result<u8, Status> {
        let discovered = self.discovery_cache.0.ok_or(Status::NoPairing)?;
        let pairing_ref = self
            .pairing_table
            .allocate()
            .map_err(Status::from)?;

        let mut entry = crate::pairing::PairingEntry::empty(pairing_ref);
        entry.peer_ieee_address = discovered.peer_ieee_address;
        entry.peer_pan_id = discovered.pan_id;
        entry.logical_channel = discovered.channel;
        let _ = entry.device_types.push(discovered.peer_device_type);

        self.provisional = Some(ProvisionalPairing::new(pairing_ref, entry, transfer_count));
        Ok(pairing_ref)
    }

    /// Feed one key-exchange seed into the in-flight provisional pairing.
    pub fn offer_key_seed(&mut self, index: u8, seed: [u8; 16]) -> Result<bool, Status> {
        let prov = self.provisional.as_mut().ok_or(Status::NoPairing)?;
        prov.offer_seed(index, seed).map_err(Status::from)
    }

    /// Finish the in-flight pairing once all key-exchange seeds have
    /// arrived, installing the final entry into the pairing table.
    pub fn finish_pair(&mut self, nv: &mut impl NvStore) -> Result<PairConfirm, Status> {
        let prov = self.provisional.take().ok_or(Status::NoPairing)?;
        let pairing_ref = prov.pairing_ref;
        prov.finish(nv, &mut self.pairing_table)
            .map_err(Status::from)?;
        self.discovery_cache = DiscoveryCache::default();
        Ok(PairConfirm {
            status: Status::Success,
            pairing_ref,
            recipient_capabilities: self
                .pairing_table
                .lookup(pairing_ref)
                .map(|e| e.recipient_capabilities)
                .unwrap_or_else(|_| crate::pairing::RecipientCapabilities::new()),
        })
    }

    /// `NLME-UNPAIR.request` (`spec.md` §4.2).
    pub fn unpair(&mut self, nv: &mut impl NvStore, req: UnpairRequest) -> UnpairConfirm {
        match self.pairing_table.clear(nv, req.pairing_ref) {
            Ok(()) => UnpairConfirm {
                status: Status::Success,
                pairing_ref: req.pairing_ref,
            },
            Err(e) => UnpairConfirm {
                status: e.into(),
                pairing_ref: req.pairing_ref,
            },
        }
    }

    /// `NLDE-DATA.request` (`spec.md` §4.2): validate tx-options, require an
    /// installed link key when `security` is requested, and advance the
    /// pairing's frame counter on send.
    pub fn data_request(
        &mut self,
        nv: &mut impl NvStore,
        req: DataRequest,
    ) -> DataConfirm {
        let fail = |status: Status| DataConfirm {
            status,
            pairing_ref: req.pairing_ref,
        };

        if req.tx_options.validate().is_err() {
            return fail(Status::InvalidParameter);
        }

        let entry = match self.pairing_table.lookup(req.pairing_ref) {
            Ok(e) => e,
            Err(e) => return fail(e.into()),
        };
        if req.tx_options.security() && entry.link_key == [0u8; 16] {
            return fail(Status::NoSecurityKey);
        }

        let next_counter = entry.frame_counter.wrapping_add(1);
        match self
            .pairing_table
            .advance_frame_counter(nv, req.pairing_ref, next_counter)
        {
            Ok(()) => DataConfirm {
                status: Status::Success,
                pairing_ref: req.pairing_ref,
            },
            Err(e) => fail(e.into()),
        }
    }

    /// `NLDE-DATA.indication` (`spec.md` §4.2): confirm the pairing is still
    /// on record before the caller routes the NSDU up to a profile co-layer;
    /// an indication against an unknown pairing is dropped at the network
    /// layer (`spec.md` §7: state violations without a courtesy reply are
    /// silently dropped).
    pub fn accept_data_indication(&self, ind: &DataIndication) -> Result<(), Status> {
        self.pairing_table
            .lookup(ind.pairing_ref)
            .map(|_| ())
            .map_err(Status::from)
    }

    pub fn num_pairings(&self) -> usize {
        self.pairing_table.iter_active().count()
    }

    pub fn freq_agility(&mut self) -> &mut FreqAgility {
        &mut self.freq_agility
    }

    pub fn protocol_identifier(&self) -> u8 {
        PROTOCOL_IDENTIFIER
    }

    pub fn channels(&self) -> [u8; 3] {
        CHANNELS
    }

    /// Feed one discovery response through the push-button-pair filter,
    /// caching it on acceptance (`spec.md` §4.4, §8 property 6).
    pub fn offer_discovery_response(
        &mut self,
        filter: &mut DiscoveryFilter<3>,
        event: DiscoveredEvent,
    ) -> DiscoveryOutcome {
        let outcome = filter.offer(event);
        if outcome == DiscoveryOutcome::Accepted {
            self.cache_discovered(event);
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nv::MemoryNvStore;

    fn event(ieee: u8) -> DiscoveredEvent {
        DiscoveredEvent {
            channel: 15,
            pan_id: 0x1234,
            peer_ieee_address: [ieee; 8],
            peer_device_type: 1,
            request_lqi: 200,
        }
    }

    #[test]
    fn full_pairing_flow_installs_entry() {
        let mut nv: MemoryNvStore<16> = MemoryNvStore::new();
        let mut net: Network<DEFAULT_PAIRING_TABLE_SIZE> = Network::new();

        let mut filter = net.begin_discovery();
        let outcome = net.offer_discovery_response(&mut filter, event(9));
        assert_eq!(outcome, DiscoveryOutcome::Accepted);
        assert!(net.discovered().is_some());

        let pairing_ref = net.begin_pair(3).unwrap();
        assert!(!net.offer_key_seed(0, [1; 16]).unwrap());
        assert!(!net.offer_key_seed(1, [2; 16]).unwrap());
        assert!(net.offer_key_seed(2, [3; 16]).unwrap());

        let confirm = net.finish_pair(&mut nv).unwrap();
        assert_eq!(confirm.status, Status::Success);
        assert_eq!(confirm.pairing_ref, pairing_ref);
        assert_eq!(net.num_pairings(), 1);
        // discovery cache clears once the pairing is committed
        assert!(net.discovered().is_none());
    }

    #[test]
    fn pair_without_discovery_fails() {
        let mut net: Network<DEFAULT_PAIRING_TABLE_SIZE> = Network::new();
        assert_eq!(net.begin_pair(3), Err(Status::NoPairing));
    }

    #[test]
    fn data_request_advances_frame_counter() {
        let mut nv: MemoryNvStore<16> = MemoryNvStore::new();
        let mut net: Network<DEFAULT_PAIRING_TABLE_SIZE> = Network::new();
        let mut filter = net.begin_discovery();
        net.offer_discovery_response(&mut filter, event(9));
        let pairing_ref = net.begin_pair(3).unwrap();
        net.offer_key_seed(0, [1; 16]).unwrap();
        net.offer_key_seed(1, [2; 16]).unwrap();
        net.offer_key_seed(2, [3; 16]).unwrap();
        net.finish_pair(&mut nv).unwrap();
        let before = net.pairing_table.lookup(pairing_ref).unwrap().frame_counter;

        let mut nsdu = heapless::Vec::new();
        nsdu.extend_from_slice(&[1, 2, 3]).unwrap();
        let confirm = net.data_request(
            &mut nv,
            DataRequest {
                pairing_ref,
                profile_id: 1,
                vendor_id: 0x1014,
                tx_options: crate::frame::TxOptions::new(),
                nsdu,
            },
        );
        assert_eq!(confirm.status, Status::Success);
        assert_eq!(
            net.pairing_table.lookup(pairing_ref).unwrap().frame_counter,
            before + 1
        );
    }

    #[test]
    fn data_request_with_security_but_no_link_key_fails() {
        let mut nv: MemoryNvStore<16> = MemoryNvStore::new();
        let mut net: Network<DEFAULT_PAIRING_TABLE_SIZE> = Network::new();
        let mut filter = net.begin_discovery();
        net.offer_discovery_response(&mut filter, event(9));
        let pairing_ref = net.begin_pair(3).unwrap();
        net.offer_key_seed(0, [1; 16]).unwrap();
        net.offer_key_seed(1, [2; 16]).unwrap();
        net.offer_key_seed(2, [3; 16]).unwrap();
        net.finish_pair(&mut nv).unwrap();

        let confirm = net.data_request(
            &mut nv,
            DataRequest {
                pairing_ref,
                profile_id: 1,
                vendor_id: 0x1014,
                tx_options: crate::frame::TxOptions::new().with_security(true),
                nsdu: heapless::Vec::new(),
            },
        );
        assert_eq!(confirm.status, Status::NoSecurityKey);
    }

    #[test]
    fn data_request_unknown_pairing_is_no_pairing() {
        let mut nv: MemoryNvStore<16> = MemoryNvStore::new();
        let mut net: Network<DEFAULT_PAIRING_TABLE_SIZE> = Network::new();
        let confirm = net.data_request(
            &mut nv,
            DataRequest {
                pairing_ref: 0,
                profile_id: 1,
                vendor_id: 0,
                tx_options: crate::frame::TxOptions::new(),
                nsdu: heapless::Vec::new(),
            },
        );
        assert_eq!(confirm.status, Status::NoPairing);
    }

    #[test]
    fn data_indication_against_unknown_pairing_is_rejected() {
        let net: Network<DEFAULT_PAIRING_TABLE_SIZE> = Network::new();
        let ind = DataIndication {
            pairing_ref: 0,
            profile_id: 1,
            vendor_id: 0,
            link_quality: 200,
            nsdu: heapless::Vec::new(),
        };
        assert_eq!(net.accept_data_indication(&ind), Err(Status::NoPairing));
    }

    #[test]
    fn unpair_removes_entry() {
        let mut nv: MemoryNvStore<16> = MemoryNvStore::new();
        let mut net: Network<DEFAULT_PAIRING_TABLE_SIZE> = Network::new();
        let mut filter = net.begin_discovery();
        net.offer_discovery_response(&mut filter, event(9));
        let pairing_ref = net.begin_pair(3).unwrap();
        net.offer_key_seed(0, [1; 16]).unwrap();
        net.offer_key_seed(1, [2; 16]).unwrap();
        net.offer_key_seed(2, [3; 16]).unwrap();
        net.finish_pair(&mut nv).unwrap();

        let confirm = net.unpair(&mut nv, UnpairRequest { pairing_ref });
        assert_eq!(confirm.status, Status::Success);
        assert_eq!(net.num_pairings(), 0);
    }
}
