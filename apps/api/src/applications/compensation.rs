use tracing::{error, info};

use crate::storage::ResumeStore;

/// Undo action for a side effect that lives outside the database transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Compensation {
    DeleteResume(String),
}

/// Undo actions recorded as pipeline steps succeed.
///
/// On a fatal error the log is unwound newest-first. Failures while unwinding
/// are logged and do not stop the remaining steps.
#[derive(Debug, Default)]
pub struct CompensationLog {
    steps: Vec<Compensation>,
}

impl CompensationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, step: Compensation) {
        self.steps.push(step);
    }

    pub async fn unwind(self, store: &dyn ResumeStore) {
        for step in self.steps.into_iter().rev() {
            match step {
                Compensation::DeleteResume(location) => match store.delete(&location).await {
                    Ok(()) => info!(%location, "Compensation: deleted orphaned resume"),
                    Err(e) => error!(%location, "Compensation: failed to delete resume: {e}"),
                },
            }
        }
    }
}
