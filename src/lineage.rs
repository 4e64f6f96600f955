//! Mutation-lineage resolution over delta-encoded genome records.
//!
//! Every mutation row points at a predecessor mutation; the chain bottoms
//! out at ID 0, the reference sequence. Resolution walks predecessor
//! pointers, applies each delta, and memoizes the materialized sequence on
//! the node so every chain is computed once. A missing predecessor or a
//! cycle is a data-integrity error that abandons that branch; the rest of
//! the run continues.
//!
//! As a side effect of first resolution each node appends a sequence record
//! (header + sequence) for the downstream alignment export, and crossings of
//! the pathogen-lineage boundary are collected as transition edges.

use std::collections::BTreeMap;

use indexmap::IndexMap;
use rustc_hash::FxHashSet as HashSet;

use crate::error::EpinetError;
use crate::log::{error, warn};

/// Mutation record identifier; 0 is the reference sequence root.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MutationId(pub i64);

impl std::fmt::Display for MutationId {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Root sentinel: a predecessor of 0 means "derived from the reference".
pub const REFERENCE: MutationId = MutationId(0);

/// One nucleotide substitution at an absolute genome position.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Substitution {
    pub from: u8,
    pub to: u8,
}

/// Delta between a mutation and its predecessor: position → substitution.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MutationDelta(BTreeMap<usize, Substitution>);

impl MutationDelta {
    /// Parses the JSON encoding used by the mutation table, e.g.
    /// `{"2": "A-C"}`.
    ///
    /// # Errors
    /// Returns an `EpinetError` for malformed JSON, positions, or
    /// substitution pairs.
    pub fn parse(json: &str) -> Result<MutationDelta, EpinetError> {
        let raw: BTreeMap<String, String> = serde_json::from_str(json)?;
        let mut delta = BTreeMap::new();
        for (position, change) in raw {
            let position: usize = position.parse().map_err(|_| {
                EpinetError::EpinetError(format!("Invalid delta position: {position}"))
            })?;
            let (from, to) = change.split_once('-').ok_or_else(|| {
                EpinetError::EpinetError(format!("Invalid substitution: {change}"))
            })?;
            let (&[from], &[to]) = (from.as_bytes(), to.as_bytes()) else {
                return Err(EpinetError::EpinetError(format!(
                    "Invalid substitution: {change}"
                )));
            };
            delta.insert(position, Substitution { from, to });
        }
        Ok(MutationDelta(delta))
    }

    /// Applies the substitutions in place.
    ///
    /// # Errors
    /// Returns a `DataIntegrity` error for a position beyond the end of the
    /// sequence. A mismatched "from" nucleotide only warns; the recorded
    /// target still wins.
    pub fn apply(&self, sequence: &mut Vec<u8>) -> Result<(), EpinetError> {
        for (&position, substitution) in &self.0 {
            let Some(site) = sequence.get_mut(position) else {
                return Err(EpinetError::DataIntegrity(format!(
                    "Delta position {position} is beyond the sequence length {}",
                    sequence.len()
                )));
            };
            if *site != substitution.from {
                warn!(
                    "Delta at position {} expected {} but found {}",
                    position, substitution.from as char, *site as char
                );
            }
            *site = substitution.to;
        }
        Ok(())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// One row of the mutation table, with its delta parsed.
#[derive(Clone, Debug)]
pub struct Mutation {
    pub id: MutationId,
    pub prev: MutationId,
    pub delta: MutationDelta,
}

/// Sequence record emitted when a node is first resolved, later written as
/// a FASTA header/sequence line pair.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SequenceRecord {
    pub header: String,
    pub sequence: String,
}

/// Directed edge between two mutation nodes in different derived lineages,
/// in lineage-graph vertex indices.
pub type TransitionEdge = (usize, usize);

/// Node arena plus memoized resolution state for one run.
pub struct LineageResolver {
    nodes: IndexMap<MutationId, Mutation>,
    cache: IndexMap<MutationId, String>,
    reference: Vec<u8>,
    /// Mutation IDs greater than this belong to derived lineages.
    pathogen_id: i64,
    records: Vec<SequenceRecord>,
    transitions: Vec<TransitionEdge>,
    transitions_seen: HashSet<(MutationId, MutationId)>,
    /// Number of delta applications performed; cache hits do not count.
    resolutions: u64,
}

impl LineageResolver {
    /// Builds the arena. `mutations` is expected in ascending-ID order (the
    /// loader sorts); a repeated ID is warning-logged and dropped.
    #[must_use]
    pub fn new(reference: &str, pathogen_id: i64, mutations: Vec<Mutation>) -> LineageResolver {
        let mut nodes = IndexMap::with_capacity(mutations.len());
        for mutation in mutations {
            if nodes.contains_key(&mutation.id) {
                warn!("Duplicate mutation ID {}", mutation.id);
                continue;
            }
            nodes.insert(mutation.id, mutation);
        }
        LineageResolver {
            nodes,
            cache: IndexMap::default(),
            reference: reference.as_bytes().to_vec(),
            pathogen_id,
            records: Vec::new(),
            transitions: Vec::new(),
            transitions_seen: HashSet::default(),
            resolutions: 0,
        }
    }

    /// Materializes the full sequence at `id`, memoized. Each caller
    /// receives an independently owned copy; mutation records never alias
    /// the reference.
    ///
    /// # Errors
    /// Returns a `DataIntegrity` error if the predecessor chain is broken
    /// or cyclic; the rest of the arena stays resolvable.
    pub fn resolve_sequence(&mut self, id: MutationId) -> Result<String, EpinetError> {
        let mut visiting = HashSet::default();
        self.resolve_inner(id, &mut visiting)
    }

    fn resolve_inner(
        &mut self,
        id: MutationId,
        visiting: &mut HashSet<MutationId>,
    ) -> Result<String, EpinetError> {
        if id == REFERENCE {
            return Ok(String::from_utf8_lossy(&self.reference).into_owned());
        }
        if let Some(sequence) = self.cache.get(&id) {
            return Ok(sequence.clone());
        }
        if !visiting.insert(id) {
            return Err(EpinetError::DataIntegrity(format!(
                "Mutation chain cycle through {id}"
            )));
        }
        let Some(node) = self.nodes.get(&id) else {
            return Err(EpinetError::DataIntegrity(format!(
                "Missing mutation record {id}"
            )));
        };
        let prev = node.prev;
        let delta = node.delta.clone();

        let resolved = self.resolve_inner(prev, visiting)?;
        let mut sequence = resolved.into_bytes();
        delta.apply(&mut sequence)?;
        self.resolutions += 1;

        let sequence = String::from_utf8_lossy(&sequence).into_owned();
        self.cache.insert(id, sequence.clone());
        self.record_transition(prev, id);
        let header = self.record_header(prev, id);
        self.records.push(SequenceRecord {
            header,
            sequence: sequence.clone(),
        });
        visiting.remove(&id);
        Ok(sequence)
    }

    /// Resolves every node in arena (ascending ID) order. Broken branches
    /// are logged and abandoned; the others still resolve.
    pub fn resolve_all(&mut self) {
        let ids: Vec<MutationId> = self.nodes.keys().copied().collect();
        for id in ids {
            if let Err(e) = self.resolve_sequence(id) {
                error!("Cannot resolve sequence for mutation {}: {}", id, e);
            }
        }
    }

    // A predecessor beyond the pathogen boundary means this node extends a
    // derived lineage; the crossing becomes a transition edge, once.
    fn record_transition(&mut self, prev: MutationId, id: MutationId) {
        if prev.0 <= self.pathogen_id || id.0 <= self.pathogen_id {
            return;
        }
        if !self.transitions_seen.insert((prev, id)) {
            warn!("Duplicate lineage transition {} -> {}", prev, id);
            return;
        }
        self.transitions.push((
            (prev.0 - self.pathogen_id - 1) as usize,
            (id.0 - self.pathogen_id - 1) as usize,
        ));
    }

    // Headers name the predecessor lineage (the pathogen itself for roots)
    // and the node: `>seq<base>-<id>`.
    fn record_header(&self, prev: MutationId, id: MutationId) -> String {
        let base = if prev == REFERENCE {
            self.pathogen_id
        } else {
            prev.0
        };
        format!(">seq{base}-{id}")
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Mutation IDs in arena order; the lineage graph's vertex labels.
    #[must_use]
    pub fn node_labels(&self) -> Vec<String> {
        self.nodes.keys().map(MutationId::to_string).collect()
    }

    /// Sequence records in resolution order, one per resolved node.
    #[must_use]
    pub fn records(&self) -> &[SequenceRecord] {
        &self.records
    }

    /// The paired header/sequence lines of the alignment export.
    #[must_use]
    pub fn fasta_lines(&self) -> Vec<String> {
        let mut lines = Vec::with_capacity(self.records.len() * 2);
        for record in &self.records {
            lines.push(record.header.clone());
            lines.push(record.sequence.clone());
        }
        lines
    }

    #[must_use]
    pub fn transitions(&self) -> &[TransitionEdge] {
        &self.transitions
    }

    #[must_use]
    pub fn resolution_count(&self) -> u64 {
        self.resolutions
    }
}
