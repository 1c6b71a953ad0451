//! Application submission pipeline.
//!
//! `Stored → Extracted → Recorded → (Reviewed | ReviewFailed) → Finalized → Committed`
//!
//! The resume file is written before the database transaction opens, so every
//! fatal step after `Stored` rolls the transaction back and unwinds the
//! compensation log. A failed AI review is never fatal: the application is
//! recorded with the configured failure summary and no score.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::applications::compensation::{Compensation, CompensationLog};
use crate::errors::PipelineError;
use crate::llm_client::{is_meaningful_question, Review, ReviewClient};
use crate::models::job::JobApplication;
use crate::repository::{NewApplication, NewMessage, Repository, UnitOfWork};
use crate::storage::{ResumeStore, TextExtractor};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Stored,
    Extracted,
    Recorded,
    Reviewed,
    ReviewFailed,
    Finalized,
    Committed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Stored => "stored",
            Stage::Extracted => "extracted",
            Stage::Recorded => "recorded",
            Stage::Reviewed => "reviewed",
            Stage::ReviewFailed => "review_failed",
            Stage::Finalized => "finalized",
            Stage::Committed => "committed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmittedApplication {
    pub application: JobApplication,
    pub resume_location: String,
}

pub struct ApplicationReviewer {
    store: Arc<dyn ResumeStore>,
    extractor: Arc<dyn TextExtractor>,
    reviewer: Arc<dyn ReviewClient>,
    repo: Arc<dyn Repository>,
    /// Summary recorded when the AI review could not be completed.
    failure_summary: String,
}

impl ApplicationReviewer {
    pub fn new(
        store: Arc<dyn ResumeStore>,
        extractor: Arc<dyn TextExtractor>,
        reviewer: Arc<dyn ReviewClient>,
        repo: Arc<dyn Repository>,
        failure_summary: impl Into<String>,
    ) -> Self {
        Self {
            store,
            extractor,
            reviewer,
            repo,
            failure_summary: failure_summary.into(),
        }
    }

    /// Stores, reads, records and reviews one resume submission.
    pub async fn submit_application(
        &self,
        job_id: Uuid,
        applicant_id: Uuid,
        resume: &[u8],
    ) -> Result<SubmittedApplication, PipelineError> {
        let mut compensation = CompensationLog::new();

        let location = self.store.store(resume).await?;
        compensation.push(Compensation::DeleteResume(location.clone()));
        info!(%job_id, %applicant_id, %location, stage = %Stage::Stored, "Resume stored");

        let resume_text = match self.extractor.extract(&location).await {
            Ok(text) => text,
            Err(e) => {
                warn!(%job_id, %applicant_id, %location, "Resume extraction failed: {e}");
                return Err(self.abort(compensation, e.into()).await);
            }
        };
        info!(%job_id, %applicant_id, chars = resume_text.len(), stage = %Stage::Extracted, "Resume text extracted");

        let mut uow = match self.repo.begin().await {
            Ok(uow) => uow,
            Err(e) => return Err(self.abort(compensation, e.into()).await),
        };

        let application = match self
            .record(uow.as_mut(), job_id, applicant_id, &location, &resume_text)
            .await
        {
            Ok(application) => application,
            Err(e) => {
                if let Err(rollback_err) = uow.rollback().await {
                    error!(%job_id, %applicant_id, "Rollback failed: {rollback_err}");
                }
                return Err(self.abort(compensation, e).await);
            }
        };

        if let Err(e) = uow.commit().await {
            return Err(self.abort(compensation, e.into()).await);
        }
        info!(%job_id, %applicant_id, application_id = %application.id, stage = %Stage::Committed, "Application submitted");

        Ok(SubmittedApplication {
            application,
            resume_location: location,
        })
    }

    /// Transactional part of the pipeline. Any error leaves the unit of work
    /// for the caller to roll back.
    async fn record(
        &self,
        uow: &mut dyn UnitOfWork,
        job_id: Uuid,
        applicant_id: Uuid,
        location: &str,
        resume_text: &str,
    ) -> Result<JobApplication, PipelineError> {
        let application = uow
            .insert_application(&NewApplication {
                job_id,
                applicant_id,
                resume_location: location.to_string(),
            })
            .await?;
        info!(%job_id, %applicant_id, application_id = %application.id, stage = %Stage::Recorded, "Application recorded");

        let post = uow
            .find_job_post(job_id)
            .await?
            .ok_or_else(|| PipelineError::NotFound(format!("Job post {job_id} not found")))?;

        let review = match self.reviewer.review(&post.description, resume_text).await {
            Ok(review) => {
                info!(%job_id, %applicant_id, score = ?review.score, stage = %Stage::Reviewed, "AI review completed");
                review
            }
            Err(e) => {
                warn!(%job_id, %applicant_id, stage = %Stage::ReviewFailed, "AI review failed, recording placeholder: {e}");
                Review::failed(&self.failure_summary)
            }
        };

        let application = uow.attach_review(application.id, &review).await?;

        if let Some(questions) = review
            .questions
            .as_deref()
            .filter(|q| is_meaningful_question(q))
        {
            uow.insert_message(&NewMessage::new(post.user_id, applicant_id, questions))
                .await?;
            info!(%job_id, %applicant_id, "Follow-up questions sent to applicant");
        }
        info!(%job_id, %applicant_id, stage = %Stage::Finalized, "Review attached");

        Ok(application)
    }

    async fn abort(&self, compensation: CompensationLog, err: PipelineError) -> PipelineError {
        compensation.unwind(self.store.as_ref()).await;
        err
    }
}
