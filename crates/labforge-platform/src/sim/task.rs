//! Tasks issued by the simulated platform

use super::inventory::Inventory;
use crate::error::PlatformError;
use crate::task::{PlatformTask, TaskOutput, TaskState};
use parking_lot::Mutex;
use std::sync::Arc;

type Apply = Box<dyn FnOnce(&mut Inventory) -> Result<TaskOutput, PlatformError> + Send>;

/// A task that reports `queued` and `running` for a configured number of
/// polls, then applies its change to the inventory exactly once
pub(crate) struct SimTask {
    name: &'static str,
    entity: String,
    queued: u32,
    running: u32,
    inventory: Arc<Mutex<Inventory>>,
    apply: Option<Apply>,
    outcome: Option<TaskState>,
}

impl SimTask {
    pub(crate) fn new(
        name: &'static str,
        entity: impl Into<String>,
        inventory: Arc<Mutex<Inventory>>,
        delays: (u32, u32),
        apply: impl FnOnce(&mut Inventory) -> Result<TaskOutput, PlatformError> + Send + 'static,
    ) -> Self {
        Self {
            name,
            entity: entity.into(),
            queued: delays.0,
            running: delays.1,
            inventory,
            apply: Some(Box::new(apply)),
            outcome: None,
        }
    }
}

#[async_trait::async_trait]
impl PlatformTask for SimTask {
    fn name(&self) -> &str {
        self.name
    }

    fn entity(&self) -> &str {
        &self.entity
    }

    async fn state(&mut self) -> TaskState {
        if let Some(done) = &self.outcome {
            return done.clone();
        }
        if self.queued > 0 {
            self.queued -= 1;
            return TaskState::Queued;
        }
        if self.running > 0 {
            self.running -= 1;
            return TaskState::Running;
        }
        let state = match self.apply.take() {
            Some(apply) => {
                let mut inventory = self.inventory.lock();
                match apply(&mut *inventory) {
                    Ok(output) => TaskState::Success(output),
                    Err(fault) => TaskState::Error(fault),
                }
            }
            None => TaskState::Error(PlatformError::TaskFailed {
                task: self.name.to_string(),
                entity: self.entity.clone(),
                message: "task was cancelled".to_string(),
            }),
        };
        self.outcome = Some(state.clone());
        state
    }

    async fn cancel(&mut self) {
        if self.apply.take().is_some() {
            tracing::debug!(task = self.name, entity = %self.entity, "simulated task cancelled");
        }
    }
}
