//! Routes parsed operations to the allocator/aggregator and maps outcomes to
//! replies.
//!
//! Every command gets a fresh [`CommandId`] and runs inside its span. User
//! input problems become usage hints; store failures are logged and answered
//! with a generic apology.

use tracing::{error, info, warn, Instrument};

use milkbot_core::CommandId;
use milkbot_infra::{Aggregator, Allocator, InventoryError};
use milkbot_infra::store::{InventoryStore, StoreError};

use crate::command::{parse, InboundCommand, Operation};
use crate::render;
use crate::reply::Reply;

/// How many names each leaderboard shows.
pub const LEADERBOARD_LIMIT: usize = 5;

#[derive(Debug, Clone)]
pub struct CommandDispatcher<S> {
    allocator: Allocator<S>,
    aggregator: Aggregator<S>,
}

impl<S> CommandDispatcher<S>
where
    S: InventoryStore + Clone,
{
    pub fn new(store: S) -> Self {
        Self {
            allocator: Allocator::new(store.clone()),
            aggregator: Aggregator::new(store),
        }
    }

    pub async fn handle(&self, command: InboundCommand) -> Reply {
        let command_id = CommandId::new();
        let operation = match parse(&command) {
            Ok(op) => op,
            Err(e) => {
                let span = milkbot_observability::command_span(command_id, "rejected");
                span.in_scope(|| info!(error = %e, "command rejected"));
                return render::parse_error(&e);
            }
        };

        let span = milkbot_observability::command_span(command_id, operation.name());
        self.execute(operation, &command.requester_display_name)
            .instrument(span)
            .await
    }

    async fn execute(&self, operation: Operation, requester: &str) -> Reply {
        match operation {
            Operation::Greet => render::greeting(),
            Operation::ShowHelp => render::help(),
            Operation::PurchaseBatch {
                amount,
                expiration_date,
            } => match self.allocator.purchase(requester, amount, expiration_date).await {
                Ok(p) => render::purchased(&p),
                Err(e) => inventory_failure(e),
            },
            Operation::ConsumeOne => match self.allocator.consume_one(requester).await {
                Ok(c) => render::consumed(&c),
                Err(InventoryError::EmptyInventory) => render::nothing_to_drink(),
                Err(e) => inventory_failure(e),
            },
            Operation::ChooseBatchToEmpty => match self.allocator.store().list_available().await {
                Ok(available) => render::choose_batch(&available),
                Err(e) => store_failure(e),
            },
            Operation::EmptySelected(batch_id) => {
                match self.allocator.empty_selected(batch_id).await {
                    Ok(emptied) => render::emptied(&emptied),
                    Err(e) => inventory_failure(e),
                }
            }
            Operation::EmptyOldest => match self.allocator.empty_oldest().await {
                Ok(emptied) => render::emptied(&emptied),
                Err(InventoryError::EmptyInventory) => render::nothing_to_empty(),
                Err(e) => inventory_failure(e),
            },
            Operation::ShowStatus => match self.allocator.store().list_available().await {
                Ok(available) => render::status(&available),
                Err(e) => store_failure(e),
            },
            Operation::ShowLeaderboard => match self.aggregator.leaderboard(LEADERBOARD_LIMIT).await
            {
                Ok(board) => render::leaderboard(&board),
                Err(e) => store_failure(e),
            },
        }
    }
}

fn inventory_failure(err: InventoryError) -> Reply {
    match err {
        InventoryError::Validation(reason) => {
            warn!(%reason, "invalid command input");
            render::invalid_input(&reason)
        }
        InventoryError::EmptyInventory => render::nothing_to_empty(),
        InventoryError::BatchNotFound(id) => render::batch_not_found(id),
        InventoryError::Persistence(e) => store_failure(e),
    }
}

fn store_failure(err: StoreError) -> Reply {
    error!(error = %err, "inventory store failed");
    render::apology()
}
