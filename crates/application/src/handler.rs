//! Runs a command inside one store transaction.

use std::time::Instant;

use futures_util::future::BoxFuture;
use store::{Store, UnitOfWork};

use crate::error::{ApplicationError, Result};

/// Wraps every state change in a unit of work.
///
/// The work closure receives the open transaction. On `Ok` the transaction
/// is committed; on `Err` it is rolled back and nothing it staged becomes
/// visible.
pub struct CommandHandler<S: Store> {
    store: S,
}

impl<S: Store> CommandHandler<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    #[tracing::instrument(skip(self, work))]
    pub async fn execute<T, F>(&self, command: &'static str, work: F) -> Result<T>
    where
        T: Send,
        F: for<'u> FnOnce(&'u mut S::UnitOfWork) -> BoxFuture<'u, Result<T>> + Send,
    {
        let started = Instant::now();
        let mut uow = self.store.begin().await?;

        let outcome = work(&mut uow).await;
        metrics::histogram!("inventory_command_duration_seconds", "command" => command)
            .record(started.elapsed().as_secs_f64());

        match outcome {
            Ok(value) => {
                uow.commit().await?;
                metrics::counter!("inventory_commands_committed", "command" => command)
                    .increment(1);
                tracing::debug!(command, "command committed");
                Ok(value)
            }
            Err(error) => {
                if let Err(rollback) = uow.rollback().await {
                    tracing::error!(command, error = %rollback, "rollback failed");
                }
                metrics::counter!("inventory_commands_rolled_back", "command" => command)
                    .increment(1);
                log_rejection(command, &error);
                Err(error)
            }
        }
    }
}

fn log_rejection(command: &'static str, error: &ApplicationError) {
    match error {
        ApplicationError::Rejected(failure) => {
            tracing::info!(command, code = %failure.code, "command rejected");
        }
        ApplicationError::Store(e) => {
            tracing::warn!(command, error = %e, "command failed");
        }
    }
}
