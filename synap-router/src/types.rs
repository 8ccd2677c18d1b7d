use crate::error::{Result, RouterError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

/// Total number of hash slots (Redis-compatible)
pub const TOTAL_SLOTS: u16 = 16384;

/// Slot range (inclusive start, inclusive end)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotRange {
    pub start: u16,
    pub end: u16,
}

impl SlotRange {
    pub fn new(start: u16, end: u16) -> Self {
        assert!(start <= end && end < TOTAL_SLOTS);
        Self { start, end }
    }

    /// Checked constructor for ranges read from configuration
    pub fn try_new(start: u16, end: u16) -> Result<Self> {
        if end >= TOTAL_SLOTS {
            return Err(RouterError::InvalidSlot(end));
        }
        if start > end {
            return Err(RouterError::Config(format!(
                "Invalid slot range: {}-{}",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    pub fn contains(&self, slot: u16) -> bool {
        slot >= self.start && slot <= self.end
    }

    pub fn count(&self) -> u16 {
        self.end - self.start + 1
    }

    pub fn iter(&self) -> RangeInclusive<u16> {
        self.start..=self.end
    }
}

/// Network identity of a cluster node
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeAddress {
    pub host: String,
    pub port: u16,
}

impl NodeAddress {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for NodeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl FromStr for NodeAddress {
    type Err = RouterError;

    /// Accepts `host:port`, `host:port@cport` and `host:port@cport,hostname`.
    /// IPv6 hosts keep their colons; the port is taken after the last one.
    fn from_str(s: &str) -> Result<Self> {
        let addr = s.split([',', '@']).next().unwrap_or_default();
        let (host, port) = addr
            .rsplit_once(':')
            .ok_or_else(|| RouterError::InvalidAddress(s.to_string()))?;
        if host.is_empty() {
            return Err(RouterError::InvalidAddress(s.to_string()));
        }
        let port = port
            .parse::<u16>()
            .map_err(|_| RouterError::InvalidAddress(s.to_string()))?;
        Ok(Self::new(host, port))
    }
}
