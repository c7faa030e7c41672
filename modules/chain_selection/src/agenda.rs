//! Agenda voting state.
//!
//! Each deployment moves through BIP9-style threshold states, evaluated
//! once per rule change window from the vote bits of the blocks in that
//! window. States are memoised by the hash of the last block of each
//! window, which fixes the ancestry and so never goes stale on reorg.

use std::collections::HashMap;
use std::sync::Mutex;

use strata_common::params::TREASURY_AGENDA;
use strata_common::{BlockHash, ChainParams, Deployment};
use tracing::debug;

use crate::block_index::BlockIndex;
use crate::index_node::NodeId;
use crate::rule_error::{ChainError, InternalError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThresholdState {
    Defined,
    Started,
    LockedIn,
    Active,
    Failed,
}

/// Agenda activation flags in force for one candidate block.
///
/// Resolved once from the candidate's parent before contextual checks, so
/// every check sees the same answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgendaContext {
    treasury_active: bool,
}

impl AgendaContext {
    pub(crate) fn new(treasury_active: bool) -> Self {
        Self { treasury_active }
    }

    pub fn is_treasury_active(&self) -> bool {
        self.treasury_active
    }
}

pub struct AgendaResolver {
    deployments: Vec<Deployment>,
    interval: u64,
    threshold: u64,
    /// Deployment name -> window end hash -> state after that window
    cache: Mutex<HashMap<String, HashMap<BlockHash, ThresholdState>>>,
}

impl AgendaResolver {
    pub fn new(params: &ChainParams) -> Self {
        Self {
            deployments: params.deployments.clone(),
            interval: u64::from(params.rule_change_interval.max(1)),
            threshold: params.rule_change_threshold(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Whether deployment `name` applies to a child of `parent_hash`.
    pub fn is_agenda_active(
        &self,
        index: &BlockIndex,
        parent_hash: &BlockHash,
        name: &str,
    ) -> Result<bool, ChainError> {
        let parent = index.lookup(parent_hash).ok_or_else(|| {
            ChainError::assert(format!("agenda lookup for unknown block {parent_hash}"))
        })?;
        let Some(deployment) = self.deployments.iter().find(|d| d.name == name) else {
            return Ok(false);
        };
        Ok(self.deployment_state(index, Some(parent), deployment)? == ThresholdState::Active)
    }

    pub fn is_treasury_agenda_active(
        &self,
        index: &BlockIndex,
        parent_hash: &BlockHash,
    ) -> Result<bool, ChainError> {
        self.is_agenda_active(index, parent_hash, TREASURY_AGENDA)
    }

    /// Resolve every agenda flag a child of `parent_hash` is checked against.
    pub fn agenda_context(
        &self,
        index: &BlockIndex,
        parent_hash: &BlockHash,
    ) -> Result<AgendaContext, ChainError> {
        Ok(AgendaContext::new(
            self.is_treasury_agenda_active(index, parent_hash)?,
        ))
    }

    /// State of `deployment` for the block after `prev`.
    pub fn deployment_state(
        &self,
        index: &BlockIndex,
        prev: Option<NodeId>,
        deployment: &Deployment,
    ) -> Result<ThresholdState, ChainError> {
        if deployment.always_active {
            return Ok(ThresholdState::Active);
        }

        // Last block of the window before the one the child is in
        let Some(prev) = prev else {
            return Ok(ThresholdState::Defined);
        };
        let prev_height = index.node(prev).height;
        if prev_height + 1 < self.interval {
            return Ok(ThresholdState::Defined);
        }
        let mut window_end = index.ancestor(prev, prev_height - (prev_height + 1) % self.interval);

        let mut caches = self.cache.lock().map_err(|_| InternalError::LockPoisoned("agenda cache"))?;
        let cache = caches.entry(deployment.name.clone()).or_default();

        // Walk back to the newest window with a known state
        let mut state = ThresholdState::Defined;
        let mut uncached = Vec::new();
        while let Some(id) = window_end {
            let node = index.node(id);
            if let Some(known) = cache.get(&node.hash) {
                state = *known;
                break;
            }
            if index.median_time_past(id) < deployment.start_time {
                cache.insert(node.hash, ThresholdState::Defined);
                break;
            }
            uncached.push(id);
            window_end = if node.height >= self.interval {
                index.ancestor(id, node.height - self.interval)
            } else {
                None
            };
        }

        // Then forward, oldest window first
        for id in uncached.into_iter().rev() {
            let median_time = index.median_time_past(id);
            state = match state {
                ThresholdState::Defined if median_time >= deployment.expire_time => {
                    ThresholdState::Failed
                }
                ThresholdState::Defined if median_time >= deployment.start_time => {
                    ThresholdState::Started
                }
                ThresholdState::Started if median_time >= deployment.expire_time => {
                    ThresholdState::Failed
                }
                ThresholdState::Started => {
                    let yes = self.count_yes_votes(index, id, deployment);
                    if yes >= self.threshold {
                        debug!(
                            "Agenda {} locked in at height {} with {yes} yes votes",
                            deployment.name,
                            index.node(id).height
                        );
                        ThresholdState::LockedIn
                    } else {
                        ThresholdState::Started
                    }
                }
                ThresholdState::LockedIn => ThresholdState::Active,
                other => other,
            };
            cache.insert(index.node(id).hash, state);
        }

        Ok(state)
    }

    /// Yes votes in the window ending at `window_end`.
    fn count_yes_votes(&self, index: &BlockIndex, window_end: NodeId, deployment: &Deployment) -> u64 {
        let mut count = 0;
        let mut current = Some(window_end);
        for _ in 0..self.interval {
            let Some(id) = current else { break };
            let node = index.node(id);
            if node.vote_bits & deployment.mask == deployment.yes_choice {
                count += 1;
            }
            current = node.parent;
        }
        count
    }
}
