//! Cluster redirect replies
//!
//! A node that does not own a slot answers with `-MOVED <slot> <host:port>` (the slot
//! has a new owner) or `-ASK <slot> <host:port>` (one-shot redirect while the slot is
//! being migrated). The caller detects these in node replies and hands them to
//! [`RoutingDispatcher::apply_redirect`](crate::RoutingDispatcher::apply_redirect).

use crate::error::{Result, RouterError};
use crate::hash_slot::HashSlot;
use crate::types::NodeAddress;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectKind {
    /// Slot ownership moved permanently
    Moved,
    /// Slot is migrating; retry once on the target with ASKING
    Ask,
}

/// Parsed MOVED/ASK reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    pub kind: RedirectKind,
    pub slot: HashSlot,
    pub address: NodeAddress,
}

impl Redirect {
    /// Parse an error reply; a leading `-` is accepted
    pub fn parse(reply: &str) -> Result<Self> {
        let invalid = || RouterError::InvalidRedirect(reply.to_string());
        let text = reply.trim().trim_start_matches('-');

        let mut parts = text.split_whitespace();
        let kind = match parts.next() {
            Some("MOVED") => RedirectKind::Moved,
            Some("ASK") => RedirectKind::Ask,
            _ => return Err(invalid()),
        };
        let slot = parts
            .next()
            .and_then(|s| s.parse::<u16>().ok())
            .ok_or_else(invalid)?;
        let slot = HashSlot::try_from(slot)?;
        let address = parts.next().ok_or_else(invalid)?.parse::<NodeAddress>()?;
        if parts.next().is_some() {
            return Err(invalid());
        }

        Ok(Self {
            kind,
            slot,
            address,
        })
    }

    /// Quick check for redirect replies without full parsing
    pub fn is_redirect(reply: &str) -> bool {
        let text = reply.trim_start().trim_start_matches('-');
        text.starts_with("MOVED ") || text.starts_with("ASK ")
    }
}

impl FromStr for Redirect {
    type Err = RouterError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
