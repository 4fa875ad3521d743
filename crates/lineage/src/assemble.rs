//! Chain assembly.
//!
//! Each record's chain is found by walking parent links up to a root. Walks
//! are iterative and capped at the size of the working set: a correct chain
//! can never be longer than the number of records, so hitting the cap means
//! the links loop.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::config::ChainPolicy;
use crate::issue::LineageIssue;
use crate::resolve::{ParentLink, Variant};

/// A record with its parent already resolved, as fed to the assembler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRecord {
    pub request_id: String,
    /// What the presentation layer shows for this record.
    pub display: String,
    pub parent: Option<ParentLink>,
}

/// One element of a chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainLink {
    pub request_id: String,
    pub display: String,
    /// Which output of the previous link this record was made from. `None`
    /// on the root.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_variant: Option<Variant>,
}

/// A root-to-leaf derivation path. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Chain {
    links: Vec<ChainLink>,
}

impl Chain {
    pub fn links(&self) -> &[ChainLink] {
        &self.links
    }

    pub fn root(&self) -> &ChainLink {
        &self.links[0]
    }

    pub fn leaf(&self) -> &ChainLink {
        &self.links[self.links.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    pub fn request_ids(&self) -> Vec<&str> {
        self.links.iter().map(|l| l.request_id.as_str()).collect()
    }
}

/// Chains plus the integrity problems met while building them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Assembly {
    pub chains: Vec<Chain>,
    pub issues: Vec<LineageIssue>,
}

/// Build every chain for `records`.
///
/// Records are walked in input order and the resulting chains are returned
/// most recently discovered first. A repeated request id is walked once.
/// A parent id missing from `records` ends the walk as if the record were a
/// root. Under [`ChainPolicy::Maximal`], chains that are a prefix of another
/// returned chain are dropped.
pub fn assemble(records: &[ResolvedRecord], policy: ChainPolicy) -> Assembly {
    let mut index: HashMap<&str, &ResolvedRecord> = HashMap::with_capacity(records.len());
    let mut order: Vec<&ResolvedRecord> = Vec::with_capacity(records.len());
    for record in records {
        if !index.contains_key(record.request_id.as_str()) {
            index.insert(record.request_id.as_str(), record);
            order.push(record);
        }
    }
    let bound = index.len();

    let mut assembly = Assembly::default();
    for record in order {
        match walk(record, &index, bound) {
            Some(chain) => assembly.chains.push(chain),
            None => {
                let issue = LineageIssue::CycleDetected {
                    leaf: record.request_id.clone(),
                    bound,
                };
                issue.log();
                assembly.issues.push(issue);
            }
        }
    }
    assembly.chains.reverse();

    if policy == ChainPolicy::Maximal {
        retain_maximal(&mut assembly.chains);
    }
    assembly
}

/// Walk from `leaf` to its root. `None` if the walk exceeds `bound` links.
fn walk<'a>(
    leaf: &'a ResolvedRecord,
    index: &HashMap<&str, &'a ResolvedRecord>,
    bound: usize,
) -> Option<Chain> {
    let mut links = Vec::new();
    let mut current = leaf;
    loop {
        if links.len() == bound {
            return None;
        }
        let parent = current.parent.as_ref().and_then(|link| {
            index
                .get(link.parent_request_id.as_str())
                .map(|record| (link.variant, *record))
        });
        links.push(ChainLink {
            request_id: current.request_id.clone(),
            display: current.display.clone(),
            from_variant: parent.map(|(variant, _)| variant),
        });
        match parent {
            Some((_, record)) => current = record,
            None => break,
        }
    }
    links.reverse();
    Some(Chain { links })
}

/// Drop every chain whose leaf is an interior link of another chain.
///
/// A record's chain is exactly the path from its root to it, so its chain is
/// a prefix of another chain precisely when it appears before that chain's
/// leaf.
fn retain_maximal(chains: &mut Vec<Chain>) {
    let interior: HashSet<String> = chains
        .iter()
        .flat_map(|chain| {
            chain.links[..chain.links.len() - 1]
                .iter()
                .map(|link| link.request_id.clone())
        })
        .collect();
    chains.retain(|chain| !interior.contains(&chain.leaf().request_id));
}
