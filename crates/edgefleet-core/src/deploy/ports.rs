//! Deterministic node-port allocation from device identity.

use std::ops::RangeInclusive;

use crate::types::DeviceId;

pub const DEFAULT_PORT_BASE: u16 = 30000;
pub const DEFAULT_PORT_WIDTH: u16 = 2768;

/// Maps a device id onto `base..base + width`.
///
/// Ids that differ by a multiple of `width` share a port. That collision is
/// accepted: the mapping must stay a pure function of the id so redeploys
/// land on the same port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortAllocator {
    base: u16,
    width: u16,
}

impl Default for PortAllocator {
    fn default() -> Self {
        Self {
            base: DEFAULT_PORT_BASE,
            width: DEFAULT_PORT_WIDTH,
        }
    }
}

impl PortAllocator {
    pub fn new(base: u16, width: u16) -> anyhow::Result<Self> {
        if width == 0 {
            anyhow::bail!("Port range width must be greater than zero");
        }
        if u32::from(base) + u32::from(width) - 1 > u32::from(u16::MAX) {
            anyhow::bail!(
                "Port range {}+{} exceeds the maximum port {}",
                base,
                width,
                u16::MAX
            );
        }
        Ok(Self { base, width })
    }

    pub fn allocate_port(&self, device: DeviceId) -> u16 {
        let offset = device.rem_euclid(i64::from(self.width));
        // offset < width, and base + width - 1 fits in u16
        self.base + offset as u16
    }

    pub fn range(&self) -> RangeInclusive<u16> {
        self.base..=self.base + (self.width - 1)
    }

    pub fn base(&self) -> u16 {
        self.base
    }

    pub fn width(&self) -> u16 {
        self.width
    }
}
