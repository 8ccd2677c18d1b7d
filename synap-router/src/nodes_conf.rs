//! Node configuration parser
//!
//! Reads the Redis `nodes.conf` / `CLUSTER NODES` line format:
//!
//! ```text
//! <id> <ip:port@cport[,hostname]> <flags> <master> <ping-sent> <pong-recv> <config-epoch> <link-state> <slot> <slot> ...
//! ```
//!
//! and expands the slot ranges of every serving master into a full slot layout.

use crate::error::{Result, RouterError};
use crate::types::{NodeAddress, SlotRange, TOTAL_SLOTS};
use std::collections::HashMap;
use tracing::debug;

/// Minimum field count of a node line (everything before the slot list)
const NODE_LINE_FIELDS: usize = 8;

/// One master parsed from a node line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeEntry {
    pub id: String,
    pub address: NodeAddress,
    pub slots: Vec<SlotRange>,
}

/// Parser for node configuration lines
pub struct NodeConfParser;

impl NodeConfParser {
    /// Parse every line, keeping serving masters only
    pub fn parse<I, S>(lines: I) -> Result<Vec<NodeEntry>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut entries = Vec::new();
        for line in lines {
            if let Some(entry) = Self::parse_line(line.as_ref())? {
                entries.push(entry);
            }
        }
        Ok(entries)
    }

    /// Parse a single line; `None` for comments, `vars` and non-serving nodes
    pub fn parse_line(line: &str) -> Result<Option<NodeEntry>> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(None);
        }

        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts[0] == "vars" {
            return Ok(None);
        }
        if parts.len() < NODE_LINE_FIELDS {
            return Err(RouterError::Config(format!("Invalid node line: {}", line)));
        }

        let flags: Vec<&str> = parts[2].split(',').collect();
        if !flags.contains(&"master") {
            return Ok(None);
        }
        if flags
            .iter()
            .any(|f| matches!(*f, "fail" | "noaddr" | "handshake"))
        {
            debug!("Skipping unavailable master {} ({})", parts[0], parts[2]);
            return Ok(None);
        }

        let address: NodeAddress = parts[1].parse()?;

        let mut slots = Vec::new();
        for token in &parts[NODE_LINE_FIELDS..] {
            // `[slot->-id]` / `[slot-<-id]`: migration in progress, owner unchanged
            if token.starts_with('[') {
                continue;
            }
            slots.push(Self::parse_slot_token(token)?);
        }

        Ok(Some(NodeEntry {
            id: parts[0].to_string(),
            address,
            slots,
        }))
    }

    fn parse_slot_token(token: &str) -> Result<SlotRange> {
        let invalid = || RouterError::Config(format!("Invalid slot token: {}", token));
        match token.split_once('-') {
            Some((start, end)) => {
                let start = start.parse::<u16>().map_err(|_| invalid())?;
                let end = end.parse::<u16>().map_err(|_| invalid())?;
                SlotRange::try_new(start, end)
            }
            None => {
                let slot = token.parse::<u16>().map_err(|_| invalid())?;
                SlotRange::try_new(slot, slot)
            }
        }
    }
}

/// Slot ownership expanded from parsed node entries
#[derive(Debug, Clone)]
pub struct SlotLayout {
    /// Distinct node addresses, in order of first appearance
    pub addresses: Vec<NodeAddress>,

    /// Owner of each slot as an index into `addresses`
    pub owners: Vec<usize>,
}

impl SlotLayout {
    /// Expand ranges and check that every slot is owned exactly once
    pub fn from_entries(entries: &[NodeEntry]) -> Result<Self> {
        let mut addresses: Vec<NodeAddress> = Vec::new();
        let mut index_of: HashMap<&NodeAddress, usize> = HashMap::new();
        let mut owners: Vec<Option<usize>> = vec![None; TOTAL_SLOTS as usize];
        let mut assigned = 0usize;

        for entry in entries.iter().filter(|e| !e.slots.is_empty()) {
            let idx = *index_of.entry(&entry.address).or_insert_with(|| {
                addresses.push(entry.address.clone());
                addresses.len() - 1
            });

            for range in &entry.slots {
                for slot in range.iter() {
                    let owner = &mut owners[slot as usize];
                    if let Some(prev) = *owner {
                        if prev != idx {
                            return Err(RouterError::Config(format!(
                                "Slot {} claimed by both {} and {}",
                                slot, addresses[prev], entry.address
                            )));
                        }
                        continue;
                    }
                    *owner = Some(idx);
                    assigned += 1;
                }
            }
        }

        if assigned != TOTAL_SLOTS as usize {
            return Err(RouterError::SlotCoverage { found: assigned });
        }

        Ok(Self {
            addresses,
            owners: owners.into_iter().flatten().collect(),
        })
    }

    /// Number of slots owned by the node at `addresses[idx]`
    pub fn slot_count(&self, idx: usize) -> usize {
        self.owners.iter().filter(|&&o| o == idx).count()
    }
}
