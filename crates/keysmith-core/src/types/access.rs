//! Declarative access-control types.
//!
//! An [`AccessPolicy`] pairs a [`Protection`] tier (when the item is readable
//! and whether it may leave the device) with a [`CapabilitySet`] of presence
//! proofs the backend must collect before releasing the item. These types are
//! pure data; the keychain crate lowers them into a backend policy handle.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// When an item's secret is readable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Availability {
    /// Only while the device is unlocked.
    #[default]
    WhenUnlocked,
    /// After the first unlock following a restart.
    AfterFirstUnlock,
    /// Regardless of lock state.
    Always,
    /// Only while unlocked and only when a device passcode is set.
    WhenPasscodeSet,
}

/// Whether an item may migrate off the device that created it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Migration {
    /// Item may be synchronized or restored onto other devices.
    #[default]
    Synchronizable,
    /// Item never leaves this device.
    ThisDeviceOnly,
}

/// An accessibility tier: exactly one availability crossed with one migration mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Protection {
    #[serde(default)]
    pub availability: Availability,
    #[serde(default)]
    pub migration: Migration,
}

impl Protection {
    /// Create a tier from its two components.
    pub const fn new(availability: Availability, migration: Migration) -> Self {
        Self {
            availability,
            migration,
        }
    }

    /// A tier that keeps the item on this device.
    pub const fn this_device_only(availability: Availability) -> Self {
        Self::new(availability, Migration::ThisDeviceOnly)
    }

    /// A tier that lets the item migrate between devices.
    pub const fn synchronizable(availability: Availability) -> Self {
        Self::new(availability, Migration::Synchronizable)
    }

    /// The backend's protection-class constant for this tier.
    ///
    /// Returns `None` for combinations the backend has no class for
    /// (a passcode-gated item can never migrate).
    pub fn class_constant(&self) -> Option<&'static str> {
        use Availability::*;
        use Migration::*;

        match (self.availability, self.migration) {
            (WhenUnlocked, Synchronizable) => Some("ak"),
            (WhenUnlocked, ThisDeviceOnly) => Some("aku"),
            (AfterFirstUnlock, Synchronizable) => Some("ck"),
            (AfterFirstUnlock, ThisDeviceOnly) => Some("cku"),
            (Always, Synchronizable) => Some("dk"),
            (Always, ThisDeviceOnly) => Some("dku"),
            (WhenPasscodeSet, ThisDeviceOnly) => Some("akpu"),
            (WhenPasscodeSet, Synchronizable) => None,
        }
    }
}

impl fmt::Display for Protection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let availability = match self.availability {
            Availability::WhenUnlocked => "when-unlocked",
            Availability::AfterFirstUnlock => "after-first-unlock",
            Availability::Always => "always",
            Availability::WhenPasscodeSet => "when-passcode-set",
        };
        let migration = match self.migration {
            Migration::Synchronizable => "synchronizable",
            Migration::ThisDeviceOnly => "this-device-only",
        };
        write!(f, "{availability}/{migration}")
    }
}

/// A presence proof the backend must obtain before using an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Capability {
    /// Any of biometry, passcode or watch.
    UserPresence,
    /// Any enrolled biometric, surviving enrollment changes.
    BiometryAny,
    /// Biometrics enrolled at the time the item was written.
    BiometryCurrentSet,
    /// The device passcode.
    DevicePasscode,
    /// A paired watch.
    Watch,
    /// Required to use a private key for signing or key agreement.
    PrivateKeyUsage,
    /// An application-supplied password.
    ApplicationPassword,
}

/// How multiple capabilities combine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Combinator {
    /// Every capability must be satisfied.
    #[default]
    And,
    /// Any one capability suffices.
    Or,
}

/// The set of presence proofs gating an item. Empty means no gating beyond
/// the protection tier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CapabilitySet {
    #[serde(default)]
    require: BTreeSet<Capability>,
    #[serde(default)]
    combinator: Combinator,
}

impl CapabilitySet {
    /// No capabilities required.
    pub fn none() -> Self {
        Self::default()
    }

    /// Every listed capability is required.
    pub fn all_of(capabilities: impl IntoIterator<Item = Capability>) -> Self {
        Self {
            require: capabilities.into_iter().collect(),
            combinator: Combinator::And,
        }
    }

    /// Any one of the listed capabilities is enough.
    pub fn any_of(capabilities: impl IntoIterator<Item = Capability>) -> Self {
        Self {
            require: capabilities.into_iter().collect(),
            combinator: Combinator::Or,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.require.is_empty()
    }

    pub fn contains(&self, capability: Capability) -> bool {
        self.require.contains(&capability)
    }

    pub fn combinator(&self) -> Combinator {
        self.combinator
    }

    pub fn iter(&self) -> impl Iterator<Item = Capability> + '_ {
        self.require.iter().copied()
    }
}

/// A declarative access-control specification.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccessPolicy {
    #[serde(default)]
    pub protection: Protection,
    #[serde(default)]
    pub capabilities: CapabilitySet,
}

impl AccessPolicy {
    pub fn new(protection: Protection, capabilities: CapabilitySet) -> Self {
        Self {
            protection,
            capabilities,
        }
    }

    /// A policy gated only by its protection tier.
    pub fn with_protection(protection: Protection) -> Self {
        Self::new(protection, CapabilitySet::none())
    }

    /// Describe every combination a backend is expected to refuse.
    ///
    /// An empty list does not guarantee the backend will accept the policy.
    pub fn conflicts(&self) -> Vec<String> {
        let mut problems = Vec::new();

        if self.protection.class_constant().is_none() {
            problems.push(format!(
                "protection tier {} has no backend protection class",
                self.protection
            ));
        }

        if self.capabilities.contains(Capability::BiometryAny)
            && self.capabilities.contains(Capability::BiometryCurrentSet)
        {
            problems.push(
                "biometry-any and biometry-current-set cannot be combined".to_string(),
            );
        }

        if !self.capabilities.is_empty() && self.protection.availability == Availability::Always {
            problems.push(format!(
                "protection tier {} cannot require presence capabilities",
                self.protection
            ));
        }

        problems
    }
}
