//! Pools of request targets and the uniform random selection over them.
//!
//! A [`TargetSelector`] is built once at startup and then shared read-only between all virtual
//! users. Every virtual user brings its own RNG, so selection never needs to lock.

use std::sync::Arc;

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Accounts with a moderate transfer history, between roughly 600 and 3700 transfers each.
pub const STANDARD_ADDRESSES: &[&str] = &[
    "138Mnv2ciUAXXGdLFgU6ebAibm6SKdMHCk1y6kwMmc4R18rQ",
    "15guxdSyuh6HThsxTX8LhAF3mF7minL4VWBuEqQsgNkSP8ci",
    "163YfVTEqSGcYtiNjKsPWExYAFC7cthPnGrcREMmVYmJh4GS",
    "13NfRmMpbnhvpp2ZvQ4goxBoKoKd7452i9WNtQsn9oihyG8E",
    "13x3ujrh3wbHCdgJ9tuykAfsMzvzonuBgFNWD9T2C61oeHdF",
    "15jZjjX8euzphAMYkkab9yA6FTZoFyozwWBoHMSDQ5CdiTFY",
    "15i5cwqFws9EhB4tAWy3A1P4YFdri4znFjNcmV3AQUz2V2fp",
    "14priV85dNut4Vfk6h59LV3DUMcGk8VrRQCinFQXXSEAGNNk",
    "12BFQrjL4DRsgMBNajEiwtAeKnnneXr8wUKi31DVjSXnQm56",
    "1uZARZUtfF746wVLUiYrjPMxSfQqoGAQ9eFb1E4VAx5sXFT",
];

/// Accounts with a heavy transfer history, between roughly 18k and 34k transfers each.
///
/// `1UbTddpy3RggGy3nk1vAc3msmSBasbhiYRQZnAdvNdUSXJn` is listed twice, which doubles its
/// selection weight. This is most likely a data-entry mistake, but the list is kept as-is so
/// that hard-mode runs stay comparable with earlier ones.
pub const HIGH_VOLUME_ADDRESSES: &[&str] = &[
    "144HGaYrSdK3543bi26vT6Rd8Bg7pLPMipJNr2WLc3NuHgD2",
    "157PD8GV7pJNMwN2zCEuchRyPCMeRoVtwzNdry4XjedkB2KR",
    "129fZmvLJcVXJa36p9jmvJWgEFpfvgJXNVDB91fB6FcbTEwb",
    "133SDz9BYXmVzbo7DXtXzhbUDsHLf2pY76U29m93Htm2mE8x",
    "148fP7zCq1JErXCy92PkNam4KZNcroG9zbbiPwMB1qehgeT4",
    "12k6zoi7L6Jd2oCVek7Zktj8CHY2yoY6nxZThDZK7mdWP6Sr",
    "1UbTddpy3RggGy3nk1vAc3msmSBasbhiYRQZnAdvNdUSXJn",
    "1BAitQj5xequxDyKaB1tqQ3D1k3vdSUM3geGfbSDnv87pX1",
    "1UbTddpy3RggGy3nk1vAc3msmSBasbhiYRQZnAdvNdUSXJn",
    "12yc5VAj5X6rwAWB688EtAzNTncx8Ce4nP79jW1rdJkaeNEJ",
];

/// Errors raised when building target pools from configuration.
///
/// These are startup errors: a scenario cannot be constructed from an invalid pool.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PoolError {
    /// One of the address pools has no entries.
    #[error("the {0} address pool is empty")]
    EmptyAddressPool(&'static str),

    /// None of the configured endpoints is enabled.
    #[error("no endpoint is enabled")]
    NoEnabledEndpoint,
}

/// An explorer API endpoint that can be targeted by the scenario.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub struct Endpoint {
    /// The URL path, appended to the configured host.
    pub path: String,

    /// Name of the list inside the response's `data` object that must be non-empty.
    pub field: String,

    /// Whether this endpoint takes part in the selection.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl Endpoint {
    /// Creates an enabled endpoint.
    pub fn new(path: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            field: field.into(),
            enabled: true,
        }
    }

    fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// The endpoints known to the scenario.
///
/// Only the transfer list is enabled. The others accept the same `row`/`page`/`address`
/// payload and can be switched on through configuration.
pub fn default_endpoints() -> Vec<Endpoint> {
    vec![
        Endpoint::new("/api/scan/transfers", "transfers"),
        Endpoint::new("/api/scan/account/reward_slash", "list").disabled(),
        Endpoint::new("/api/wallet/bond_list", "list").disabled(),
        Endpoint::new("/api/open/account/extrinsics", "extrinsics").disabled(),
    ]
}

/// An immutable, non-empty list of account addresses.
#[derive(Clone, Debug)]
pub struct AddressPool(Arc<[String]>);

impl AddressPool {
    /// Creates a pool, rejecting empty lists.
    ///
    /// `name` is only used to identify the pool in the error.
    pub fn new(name: &'static str, addresses: Vec<String>) -> Result<Self, PoolError> {
        if addresses.is_empty() {
            return Err(PoolError::EmptyAddressPool(name));
        }
        Ok(Self(addresses.into()))
    }

    fn from_static(addresses: &[&str]) -> Self {
        Self(addresses.iter().map(|a| a.to_string()).collect())
    }

    /// All addresses in the pool, in their configured order.
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    /// Number of entries, duplicates included.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always `false`; the constructor rejects empty pools.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn choose<R: Rng + ?Sized>(&self, rng: &mut R) -> &str {
        &self.0[rng.random_range(0..self.0.len())]
    }
}

/// Draws addresses and endpoints uniformly from their pools.
#[derive(Clone, Debug)]
pub struct TargetSelector {
    standard: AddressPool,
    high_volume: AddressPool,
    endpoints: Arc<[Endpoint]>,
}

impl TargetSelector {
    /// Builds a selector from configured pools.
    ///
    /// Disabled endpoints are dropped here. Fails if either address pool is empty or if no
    /// endpoint remains enabled.
    pub fn new(
        standard: Vec<String>,
        high_volume: Vec<String>,
        endpoints: Vec<Endpoint>,
    ) -> Result<Self, PoolError> {
        let endpoints: Arc<[Endpoint]> = endpoints.into_iter().filter(|e| e.enabled).collect();
        if endpoints.is_empty() {
            return Err(PoolError::NoEnabledEndpoint);
        }

        Ok(Self {
            standard: AddressPool::new("standard", standard)?,
            high_volume: AddressPool::new("high-volume", high_volume)?,
            endpoints,
        })
    }

    /// Returns a random address, from the high-volume pool in hard mode.
    pub fn select_address<R: Rng + ?Sized>(&self, rng: &mut R, hard_mode: bool) -> &str {
        self.pool(hard_mode).choose(rng)
    }

    /// Returns a random enabled endpoint.
    pub fn select_endpoint<R: Rng + ?Sized>(&self, rng: &mut R) -> &Endpoint {
        &self.endpoints[rng.random_range(0..self.endpoints.len())]
    }

    /// The address pool used for the given mode.
    pub fn pool(&self, hard_mode: bool) -> &AddressPool {
        if hard_mode {
            &self.high_volume
        } else {
            &self.standard
        }
    }

    /// The enabled endpoints.
    pub fn endpoints(&self) -> &[Endpoint] {
        &self.endpoints
    }
}

impl Default for TargetSelector {
    fn default() -> Self {
        Self {
            standard: AddressPool::from_static(STANDARD_ADDRESSES),
            high_volume: AddressPool::from_static(HIGH_VOLUME_ADDRESSES),
            endpoints: default_endpoints().into_iter().filter(|e| e.enabled).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    use super::*;

    fn strings(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn standard_selection_stays_in_standard_pool() {
        let selector = TargetSelector::default();
        let mut rng = SmallRng::seed_from_u64(7);

        let mut seen = HashSet::new();
        for _ in 0..1000 {
            let address = selector.select_address(&mut rng, false);
            assert!(STANDARD_ADDRESSES.contains(&address), "{address}");
            seen.insert(address.to_owned());
        }

        // 1000 uniform draws over 10 entries hit every entry.
        assert_eq!(seen.len(), 10);
    }

    #[test]
    fn hard_mode_selects_from_high_volume_pool() {
        let selector = TargetSelector::default();
        let mut rng = SmallRng::seed_from_u64(7);

        for _ in 0..1000 {
            let address = selector.select_address(&mut rng, true);
            assert!(HIGH_VOLUME_ADDRESSES.contains(&address), "{address}");
            assert!(!STANDARD_ADDRESSES.contains(&address));
        }
    }

    #[test]
    fn default_pools_keep_literal_lists() {
        let selector = TargetSelector::default();
        assert_eq!(selector.pool(false).len(), 10);
        assert_eq!(selector.pool(true).len(), 10);

        let unique: HashSet<_> = selector.pool(true).as_slice().iter().collect();
        assert_eq!(unique.len(), 9);
    }

    #[test]
    fn only_enabled_endpoint_is_selected() {
        let selector = TargetSelector::default();
        let mut rng = SmallRng::seed_from_u64(1);

        for _ in 0..100 {
            let endpoint = selector.select_endpoint(&mut rng);
            assert_eq!(endpoint.path, "/api/scan/transfers");
            assert_eq!(endpoint.field, "transfers");
        }
    }

    #[test]
    fn enabling_endpoints_extends_selection() {
        let endpoints = default_endpoints()
            .into_iter()
            .map(|mut e| {
                e.enabled = true;
                e
            })
            .collect();
        let selector = TargetSelector::new(
            strings(STANDARD_ADDRESSES),
            strings(HIGH_VOLUME_ADDRESSES),
            endpoints,
        )
        .unwrap();
        let mut rng = SmallRng::seed_from_u64(3);

        let paths: HashSet<_> = (0..500)
            .map(|_| selector.select_endpoint(&mut rng).path.clone())
            .collect();
        assert_eq!(paths.len(), 4);
    }

    #[test]
    fn same_seed_same_selection() {
        let selector = TargetSelector::default();
        let mut a = SmallRng::seed_from_u64(42);
        let mut b = SmallRng::seed_from_u64(42);

        for _ in 0..50 {
            assert_eq!(
                selector.select_address(&mut a, false),
                selector.select_address(&mut b, false)
            );
        }
    }

    #[test]
    fn empty_pools_are_rejected() {
        let err = TargetSelector::new(
            Vec::new(),
            strings(HIGH_VOLUME_ADDRESSES),
            default_endpoints(),
        )
        .unwrap_err();
        assert_eq!(err, PoolError::EmptyAddressPool("standard"));

        let err = TargetSelector::new(
            strings(STANDARD_ADDRESSES),
            Vec::new(),
            default_endpoints(),
        )
        .unwrap_err();
        assert_eq!(err, PoolError::EmptyAddressPool("high-volume"));

        let disabled = default_endpoints()
            .into_iter()
            .map(|e| e.disabled())
            .collect();
        let err = TargetSelector::new(
            strings(STANDARD_ADDRESSES),
            strings(HIGH_VOLUME_ADDRESSES),
            disabled,
        )
        .unwrap_err();
        assert_eq!(err, PoolError::NoEnabledEndpoint);
    }
}
