//! Database seam for the review and messaging pipelines.
//!
//! Pipelines never touch `PgPool` directly: they open a `UnitOfWork` for
//! their writes and use the `Repository` read helpers for everything outside
//! the transaction. `PgRepository` is the production implementation; tests
//! swap in an in-memory double.

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::llm_client::Review;
use crate::models::job::{JobApplication, JobPost};
use crate::models::message::Message;

/// A freshly submitted application, before any AI analysis.
#[derive(Debug, Clone)]
pub struct NewApplication {
    pub job_id: Uuid,
    pub applicant_id: Uuid,
    pub resume_location: String,
}

#[derive(Debug, Clone)]
pub struct NewMessage {
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub text: String,
}

impl NewMessage {
    pub fn new(sender_id: Uuid, receiver_id: Uuid, text: impl Into<String>) -> Self {
        Self {
            sender_id,
            receiver_id,
            text: text.into(),
        }
    }
}

/// Writes grouped under one database transaction.
///
/// Dropping a unit of work without committing discards every write.
#[async_trait]
pub trait UnitOfWork: Send {
    async fn insert_application(
        &mut self,
        new: &NewApplication,
    ) -> Result<JobApplication, sqlx::Error>;

    async fn find_job_post(&mut self, job_id: Uuid) -> Result<Option<JobPost>, sqlx::Error>;

    async fn attach_review(
        &mut self,
        application_id: Uuid,
        review: &Review,
    ) -> Result<JobApplication, sqlx::Error>;

    async fn insert_message(&mut self, message: &NewMessage) -> Result<Message, sqlx::Error>;

    async fn commit(self: Box<Self>) -> Result<(), sqlx::Error>;

    async fn rollback(self: Box<Self>) -> Result<(), sqlx::Error>;
}

#[async_trait]
pub trait Repository: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, sqlx::Error>;

    /// Messages exchanged between a company and an applicant of `job_id`,
    /// oldest first. Empty when the applicant never applied to the job.
    async fn conversation(
        &self,
        company_id: Uuid,
        applicant_id: Uuid,
        job_id: Uuid,
    ) -> Result<Vec<Message>, sqlx::Error>;

    /// The applicant's live application to `job_id` together with its job post.
    async fn find_application_with_post(
        &self,
        job_id: Uuid,
        applicant_id: Uuid,
    ) -> Result<Option<(JobApplication, JobPost)>, sqlx::Error>;

    /// Most recent message sent from `sender_id` to `receiver_id`.
    async fn latest_message(
        &self,
        sender_id: Uuid,
        receiver_id: Uuid,
    ) -> Result<Option<Message>, sqlx::Error>;

    async fn user_exists(&self, user_id: Uuid) -> Result<bool, sqlx::Error>;
}

// ────────────────────────────────────────────────────────────────────────────
// PostgreSQL implementation
// ────────────────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct PgRepository {
    pool: PgPool,
}

impl PgRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

pub struct PgUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn insert_application(
        &mut self,
        new: &NewApplication,
    ) -> Result<JobApplication, sqlx::Error> {
        sqlx::query_as::<_, JobApplication>(
            r#"
            INSERT INTO job_applications (id, job_id, user_id, resume_file, status)
            VALUES ($1, $2, $3, $4, 'pending')
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(new.job_id)
        .bind(new.applicant_id)
        .bind(&new.resume_location)
        .fetch_one(&mut *self.tx)
        .await
    }

    async fn find_job_post(&mut self, job_id: Uuid) -> Result<Option<JobPost>, sqlx::Error> {
        sqlx::query_as::<_, JobPost>(
            "SELECT * FROM job_posts WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(job_id)
        .fetch_optional(&mut *self.tx)
        .await
    }

    async fn attach_review(
        &mut self,
        application_id: Uuid,
        review: &Review,
    ) -> Result<JobApplication, sqlx::Error> {
        sqlx::query_as::<_, JobApplication>(
            r#"
            UPDATE job_applications
            SET ai_summary = $1, ai_score = $2, ai_questions = $3, updated_at = now()
            WHERE id = $4
            RETURNING *
            "#,
        )
        .bind(&review.summary)
        .bind(review.score)
        .bind(review.questions.as_deref())
        .bind(application_id)
        .fetch_one(&mut *self.tx)
        .await
    }

    async fn insert_message(&mut self, message: &NewMessage) -> Result<Message, sqlx::Error> {
        sqlx::query_as::<_, Message>(
            r#"
            INSERT INTO messages (id, sender_id, receiver_id, message_text)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(message.sender_id)
        .bind(message.receiver_id)
        .bind(&message.text)
        .fetch_one(&mut *self.tx)
        .await
    }

    async fn commit(self: Box<Self>) -> Result<(), sqlx::Error> {
        self.tx.commit().await
    }

    async fn rollback(self: Box<Self>) -> Result<(), sqlx::Error> {
        self.tx.rollback().await
    }
}

#[async_trait]
impl Repository for PgRepository {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, sqlx::Error> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgUnitOfWork { tx }))
    }

    async fn conversation(
        &self,
        company_id: Uuid,
        applicant_id: Uuid,
        job_id: Uuid,
    ) -> Result<Vec<Message>, sqlx::Error> {
        sqlx::query_as::<_, Message>(
            r#"
            SELECT m.*
            FROM messages m
            WHERE m.deleted_at IS NULL
              AND ((m.sender_id = $1 AND m.receiver_id = $2)
                OR (m.sender_id = $2 AND m.receiver_id = $1))
              AND EXISTS (
                  SELECT 1 FROM job_applications a
                  WHERE a.job_id = $3 AND a.user_id = $2 AND a.deleted_at IS NULL
              )
            ORDER BY m.created_at ASC
            "#,
        )
        .bind(company_id)
        .bind(applicant_id)
        .bind(job_id)
        .fetch_all(&self.pool)
        .await
    }

    async fn find_application_with_post(
        &self,
        job_id: Uuid,
        applicant_id: Uuid,
    ) -> Result<Option<(JobApplication, JobPost)>, sqlx::Error> {
        let application: Option<JobApplication> = sqlx::query_as(
            r#"
            SELECT * FROM job_applications
            WHERE job_id = $1 AND user_id = $2 AND deleted_at IS NULL
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(job_id)
        .bind(applicant_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(application) = application else {
            return Ok(None);
        };

        let post: Option<JobPost> =
            sqlx::query_as("SELECT * FROM job_posts WHERE id = $1 AND deleted_at IS NULL")
                .bind(job_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(post.map(|post| (application, post)))
    }

    async fn latest_message(
        &self,
        sender_id: Uuid,
        receiver_id: Uuid,
    ) -> Result<Option<Message>, sqlx::Error> {
        sqlx::query_as::<_, Message>(
            r#"
            SELECT * FROM messages
            WHERE sender_id = $1 AND receiver_id = $2 AND deleted_at IS NULL
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(sender_id)
        .bind(receiver_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn user_exists(&self, user_id: Uuid) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
    }
}
