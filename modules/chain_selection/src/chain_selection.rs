//! Strata chain selection module for Caryatid
//! Validates offered blocks and keeps the best chain by cumulative work

pub mod acceptor;
pub mod agenda;
pub mod block_index;
pub mod chain;
pub mod chain_observer;
pub mod index_node;
pub mod index_store;
pub mod pow;
pub mod rule_error;
pub mod sanity;
pub mod script_validator;

pub use agenda::{AgendaContext, ThresholdState};
pub use chain::{BestState, BlockChain, BlockEntry};
pub use chain_observer::{ChainObserver, ReorgEvent};
pub use index_node::{BlockStatus, ChainMembership};
pub use index_store::{InMemoryIndexStore, IndexEntry, IndexStore, IndexUpdate, StoredIndex};
pub use rule_error::{ChainError, ErrorKind, InternalError, RuleError};
pub use script_validator::{AcceptAllScripts, BlockScriptValidator};

use anyhow::Result;
use caryatid_sdk::{module, Context};
use config::Config;
use std::sync::Arc;
use strata_common::{
    configuration::CONFIG_KEY_NO_POW_CHECK,
    messages::{
        BlockAcceptedMessage, BlockRejectedMessage, ChainReorganizedMessage, Message,
    },
    BehaviorFlags, BlockHash, ChainParams, SystemTimeSource,
};
use tracing::{error, info, info_span, warn, Instrument};

const DEFAULT_SUBSCRIBE_BLOCKS_TOPIC: &str = "strata.block.available";
const DEFAULT_PUBLISH_ACCEPTED_TOPIC: &str = "strata.block.accepted";
const DEFAULT_PUBLISH_REJECTED_TOPIC: &str = "strata.block.rejected";
const DEFAULT_PUBLISH_REORG_TOPIC: &str = "strata.chain.reorganized";

/// Shared event queue between the observer and the main loop.
type EventQueue = Arc<std::sync::Mutex<Vec<Message>>>;

/// Observer that queues chain events for later async publishing.
struct QueueObserver {
    events: EventQueue,
}

impl QueueObserver {
    fn push(&self, message: Message) {
        match self.events.lock() {
            Ok(mut events) => events.push(message),
            Err(_) => error!("Chain event queue poisoned, dropping event"),
        }
    }
}

impl ChainObserver for QueueObserver {
    fn block_accepted(&self, hash: BlockHash, height: u64, fork_length: i64, best_chain: bool) {
        self.push(Message::BlockAccepted(BlockAcceptedMessage {
            hash,
            height,
            fork_length,
            best_chain,
        }));
    }

    fn block_connected(&self, _hash: BlockHash, _height: u64) {}

    fn block_disconnected(&self, _hash: BlockHash, _height: u64) {}

    fn reorganized(&self, event: &ReorgEvent) {
        self.push(Message::ChainReorganized(ChainReorganizedMessage {
            old_tip: event.old_tip,
            new_tip: event.new_tip,
            fork_height: event.fork_height,
            detached: event.detached.clone(),
            attached: event.attached.clone(),
        }));
    }
}

/// Chain selection module
/// Parameterised by the outer message enum used on the bus
#[module(
    message_type(Message),
    name = "chain-selection",
    description = "Block acceptance and best chain selection"
)]
pub struct ChainSelection;

impl ChainSelection {
    /// Main init function
    pub async fn init(&self, context: Arc<Context<Message>>, config: Arc<Config>) -> Result<()> {
        // Get configuration
        let subscribe_blocks_topic = config
            .get_string("subscribe-blocks-topic")
            .unwrap_or(DEFAULT_SUBSCRIBE_BLOCKS_TOPIC.to_string());
        info!("Creating blocks subscriber on '{subscribe_blocks_topic}'");

        let publish_accepted_topic = config
            .get_string("publish-accepted-topic")
            .unwrap_or(DEFAULT_PUBLISH_ACCEPTED_TOPIC.to_string());
        info!("Publishing accepted blocks on '{publish_accepted_topic}'");

        let publish_rejected_topic = config
            .get_string("publish-rejected-topic")
            .unwrap_or(DEFAULT_PUBLISH_REJECTED_TOPIC.to_string());
        info!("Publishing rejected blocks on '{publish_rejected_topic}'");

        let publish_reorg_topic = config
            .get_string("publish-reorg-topic")
            .unwrap_or(DEFAULT_PUBLISH_REORG_TOPIC.to_string());
        info!("Publishing reorganizations on '{publish_reorg_topic}'");

        let params = ChainParams::from_config(&config);
        let mut base_flags = BehaviorFlags::NONE;
        if config.get_bool(CONFIG_KEY_NO_POW_CHECK).unwrap_or(false) {
            warn!("Proof of work checks are disabled");
            base_flags |= BehaviorFlags::NO_POW_CHECK;
        }
        info!("Network {}", params.network);

        let chain = Arc::new(BlockChain::new(
            params,
            Arc::new(SystemTimeSource::new()),
            Arc::new(InMemoryIndexStore::new()),
        )?);
        let best = chain.best_snapshot()?;
        info!("Best chain tip {} at height {}", best.hash, best.height);

        let event_queue: EventQueue = Arc::new(std::sync::Mutex::new(Vec::new()));
        chain.add_observer(Arc::new(QueueObserver {
            events: event_queue.clone(),
        }))?;

        let mut block_subscription = context.subscribe(&subscribe_blocks_topic).await?;

        context.clone().run(async move {
            loop {
                let Ok((_, message)) = block_subscription.read().await else {
                    error!("Block message read failed");
                    return;
                };

                let Message::BlockAvailable(available) = message.as_ref() else {
                    warn!("Ignoring unexpected message on blocks topic: {message:?}");
                    continue;
                };

                let hash = available.block.hash();
                let span = info_span!("chain_selection", height = available.block.height());

                async {
                    let mut flags = base_flags;
                    if available.fast_add {
                        flags |= BehaviorFlags::FAST_ADD;
                    }

                    // Validation is CPU bound, keep it off the async workers
                    let processing_chain = chain.clone();
                    let block = available.block.clone();
                    let result = tokio::task::spawn_blocking(move || {
                        processing_chain.process_block(&block, flags)
                    })
                    .await;

                    let rejection = match result {
                        Ok(Ok(fork_length)) => {
                            info!("Accepted block {hash} with fork length {fork_length}");
                            None
                        }
                        Ok(Err(e)) if e.is_rule_error() => {
                            warn!("Rejected block {hash}: {e}");
                            Some(BlockRejectedMessage {
                                hash,
                                rule: e.rule_kind().map(|k| k.to_string()),
                                reason: e.to_string(),
                            })
                        }
                        Ok(Err(e)) => {
                            error!("Internal failure processing block {hash}: {e}");
                            Some(BlockRejectedMessage {
                                hash,
                                rule: None,
                                reason: e.to_string(),
                            })
                        }
                        Err(e) => {
                            error!("Block processing task failed for {hash}: {e}");
                            return;
                        }
                    };

                    let events = match event_queue.lock() {
                        Ok(mut events) => std::mem::take(&mut *events),
                        Err(_) => {
                            error!("Chain event queue poisoned");
                            Vec::new()
                        }
                    };

                    for event in events {
                        let topic = match &event {
                            Message::ChainReorganized(_) => &publish_reorg_topic,
                            _ => &publish_accepted_topic,
                        };
                        context
                            .message_bus
                            .publish(topic, Arc::new(event))
                            .await
                            .unwrap_or_else(|e| error!("Failed to publish: {e}"));
                    }

                    if let Some(rejected) = rejection {
                        context
                            .message_bus
                            .publish(&publish_rejected_topic, Arc::new(rejected.into()))
                            .await
                            .unwrap_or_else(|e| error!("Failed to publish: {e}"));
                    }
                }
                .instrument(span)
                .await;
            }
        });

        Ok(())
    }
}
