//! Seam for transaction script verification.

use anyhow::Result;
use strata_common::Block;

use crate::agenda::AgendaContext;

/// Verifies the scripts of every transaction in a block.
///
/// Called outside the chain state lock, only for blocks not added with
/// fast add. Any error rejects the block.
pub trait BlockScriptValidator: Send + Sync {
    fn validate_scripts(&self, block: &Block, agenda: &AgendaContext) -> Result<()>;
}

/// Validator which accepts every script, for nodes that verify scripts
/// elsewhere.
#[derive(Debug, Default, Clone, Copy)]
pub struct AcceptAllScripts;

impl BlockScriptValidator for AcceptAllScripts {
    fn validate_scripts(&self, _block: &Block, _agenda: &AgendaContext) -> Result<()> {
        Ok(())
    }
}
