// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Grouping uncached on-chain calls into one multicall request.
//!
//! A batch groups calls by registrar (the contract they target) so a single
//! round-trip can serve every registrar, and records per caller which calls
//! it asked for so results can be routed back.
//!
//! The flattened call order sent to the network is always the concatenation
//! of each registrar's calls in registrar order. The reconciler relies on this
//! to slice the flat result array back into per-registrar chunks.

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::calls::{CallKey, CallerId, OnChainCall};

/// Uncached on-chain calls grouped by registrar.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OnChainBatch {
    registrars: Vec<Address>,
    calls_by_registrar: HashMap<Address, Vec<CallKey>>,
    definitions: HashMap<CallKey, OnChainCall>,
}

impl OnChainBatch {
    /// Creates an empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a call, keeping first-seen registrar and call order.
    ///
    /// Returns `false` if the call was already part of the batch.
    pub fn push(&mut self, call: OnChainCall) -> bool {
        let key = call.key();
        if self.definitions.contains_key(&key) {
            return false;
        }

        let registrar = call.registrar();
        let calls = self.calls_by_registrar.entry(registrar).or_default();
        if calls.is_empty() {
            self.registrars.push(registrar);
        }
        calls.push(key.clone());
        self.definitions.insert(key, call);
        true
    }

    /// Appends every call of `other` that is not already present.
    pub fn merge(&mut self, other: OnChainBatch) {
        for call in other.deserialized_calls() {
            self.push(call);
        }
    }

    /// Registrars in first-seen order.
    pub fn registrars(&self) -> &[Address] {
        &self.registrars
    }

    /// Call keys of one registrar, in insertion order.
    pub fn calls_for(&self, registrar: &Address) -> Option<&[CallKey]> {
        self.calls_by_registrar.get(registrar).map(Vec::as_slice)
    }

    /// Mapping from registrar to its ordered call keys.
    pub fn calls_by_registrar(&self) -> &HashMap<Address, Vec<CallKey>> {
        &self.calls_by_registrar
    }

    /// The calls flattened in dispatch order: each registrar's calls, in
    /// registrar order.
    pub fn deserialized_calls(&self) -> Vec<OnChainCall> {
        self.ordered_keys()
            .filter_map(|key| self.definitions.get(key).cloned())
            .collect()
    }

    /// Call keys flattened in dispatch order.
    pub fn ordered_keys(&self) -> impl Iterator<Item = &CallKey> {
        self.registrars
            .iter()
            .filter_map(|registrar| self.calls_by_registrar.get(registrar))
            .flatten()
    }

    /// Whether a call is part of the batch.
    pub fn contains(&self, key: &CallKey) -> bool {
        self.definitions.contains_key(key)
    }

    /// Total number of calls.
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    /// Whether the batch has no calls.
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

/// Builds a batch from a set of on-chain calls.
///
/// Duplicate calls (same key) are kept once, at their first position.
pub fn create_on_chain_batch<I>(calls: I) -> OnChainBatch
where
    I: IntoIterator<Item = OnChainCall>,
{
    let mut batch = OnChainBatch::new();
    for call in calls {
        batch.push(call);
    }
    batch
}

/// The calls one caller asked for.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallerCalls {
    /// Serialized on-chain calls
    pub on_chain: Vec<CallKey>,
    /// Serialized off-chain calls
    pub off_chain: Vec<CallKey>,
}

impl CallerCalls {
    /// Adds the calls of `other` not yet listed.
    pub fn merge(&mut self, other: CallerCalls) {
        extend_unique(&mut self.on_chain, other.on_chain);
        extend_unique(&mut self.off_chain, other.off_chain);
    }
}

/// Callers and the calls they requested, ordered by caller id.
pub type Callers = BTreeMap<CallerId, CallerCalls>;

/// A batch together with the callers waiting on it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchConfig {
    /// Who asked for what
    pub callers: Callers,
    /// The calls to send
    pub batch: OnChainBatch,
}

impl BatchConfig {
    /// Creates a config for a single caller.
    pub fn for_caller(caller: CallerId, calls: CallerCalls, batch: OnChainBatch) -> Self {
        let mut callers = Callers::new();
        callers.insert(caller, calls);
        Self { callers, batch }
    }

    /// Folds another config into this one.
    ///
    /// Calls requested by several callers in the same window end up in the
    /// batch once.
    pub fn merge(&mut self, other: BatchConfig) {
        for (caller, calls) in other.callers {
            self.callers.entry(caller).or_default().merge(calls);
        }
        self.batch.merge(other.batch);
    }

    /// Whether there is nothing to send and nobody waiting.
    pub fn is_empty(&self) -> bool {
        self.callers.is_empty() && self.batch.is_empty()
    }
}

/// Ordered, deduplicated list of off-chain calls awaiting the next flush.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OffChainBatch {
    keys: Vec<CallKey>,
}

impl OffChainBatch {
    /// Adds calls not yet pending.
    pub fn extend<I>(&mut self, keys: I)
    where
        I: IntoIterator<Item = CallKey>,
    {
        extend_unique(&mut self.keys, keys);
    }

    /// Pending keys in registration order.
    pub fn keys(&self) -> &[CallKey] {
        &self.keys
    }

    /// Number of pending calls.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl IntoIterator for OffChainBatch {
    type Item = CallKey;
    type IntoIter = std::vec::IntoIter<CallKey>;

    fn into_iter(self) -> Self::IntoIter {
        self.keys.into_iter()
    }
}

fn extend_unique<I>(target: &mut Vec<CallKey>, keys: I)
where
    I: IntoIterator<Item = CallKey>,
{
    for key in keys {
        if !target.contains(&key) {
            target.push(key);
        }
    }
}
