//! Resolution of configured device names into device kinds.

use ninabridge_core::{BridgeConfig, DeviceConfig, Result};

use crate::mdl::DeviceKind;

/// A device kind together with its polling settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfiguredDevice {
    pub kind: DeviceKind,
    pub config: DeviceConfig,
}

/// Every known device kind with its effective configuration.
#[derive(Debug, Clone)]
pub struct DeviceRegistry {
    devices: Vec<ConfiguredDevice>,
}

impl DeviceRegistry {
    /// Resolve the `devices` table of a configuration. Kinds missing from the
    /// table get the default settings; a name that is not a known kind is a
    /// configuration error.
    pub fn from_config(config: &BridgeConfig) -> Result<Self> {
        for name in config.devices.keys() {
            name.parse::<DeviceKind>()?;
        }

        let devices = DeviceKind::ALL
            .into_iter()
            .map(|kind| ConfiguredDevice {
                kind,
                config: config.device(kind.as_str()),
            })
            .collect();
        Ok(Self { devices })
    }

    pub fn all(&self) -> &[ConfiguredDevice] {
        &self.devices
    }

    pub fn enabled(&self) -> impl Iterator<Item = &ConfiguredDevice> {
        self.devices.iter().filter(|d| d.config.enabled)
    }

    pub fn get(&self, kind: DeviceKind) -> Option<&ConfiguredDevice> {
        self.devices.iter().find(|d| d.kind == kind)
    }
}
