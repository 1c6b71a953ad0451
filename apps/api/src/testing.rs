//! In-memory doubles for the pipeline seams.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use uuid::Uuid;

use crate::llm_client::{parse_review, LlmError, Review, ReviewClient};
use crate::models::job::{JobApplication, JobPost};
use crate::models::message::Message;
use crate::repository::{NewApplication, NewMessage, Repository, UnitOfWork};
use crate::storage::{
    new_resume_name, ExtractionError, ResumeStore, StorageError, TextExtractor, RESUME_NAMESPACE,
};

fn injected(location: &str) -> StorageError {
    StorageError::Write {
        location: location.to_string(),
        source: std::io::Error::other("injected failure"),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Resume store
// ────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryResumeStore {
    files: Mutex<HashMap<String, Vec<u8>>>,
    deleted: Mutex<Vec<String>>,
    fail_store: bool,
}

impl MemoryResumeStore {
    pub fn failing() -> Self {
        Self {
            fail_store: true,
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.files.lock().unwrap().is_empty()
    }

    pub fn contains(&self, location: &str) -> bool {
        self.files.lock().unwrap().contains_key(location)
    }

    /// Locations removed so far, in deletion order.
    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }
}

#[async_trait]
impl ResumeStore for MemoryResumeStore {
    async fn store(&self, content: &[u8]) -> Result<String, StorageError> {
        let location = format!("{RESUME_NAMESPACE}/{}", new_resume_name());
        if self.fail_store {
            return Err(injected(&location));
        }
        self.files
            .lock()
            .unwrap()
            .insert(location.clone(), content.to_vec());
        Ok(location)
    }

    async fn load(&self, location: &str) -> Result<Vec<u8>, StorageError> {
        self.files
            .lock()
            .unwrap()
            .get(location)
            .cloned()
            .ok_or_else(|| StorageError::Read {
                location: location.to_string(),
                source: std::io::ErrorKind::NotFound.into(),
            })
    }

    async fn delete(&self, location: &str) -> Result<(), StorageError> {
        if !location.starts_with(&format!("{RESUME_NAMESPACE}/")) {
            return Err(StorageError::InvalidLocation(location.to_string()));
        }
        self.files.lock().unwrap().remove(location);
        self.deleted.lock().unwrap().push(location.to_string());
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Text extractor
// ────────────────────────────────────────────────────────────────────────────

pub struct FakeExtractor {
    text: Option<String>,
}

impl FakeExtractor {
    pub fn returning(text: &str) -> Self {
        Self {
            text: Some(text.to_string()),
        }
    }

    pub fn failing() -> Self {
        Self { text: None }
    }
}

#[async_trait]
impl TextExtractor for FakeExtractor {
    async fn extract(&self, _location: &str) -> Result<String, ExtractionError> {
        self.text.clone().ok_or(ExtractionError::NoText)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Review client
// ────────────────────────────────────────────────────────────────────────────

/// Arguments of one `review_with_history` call.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryCall {
    pub job_description: String,
    pub history: String,
    pub prior_question: String,
}

pub struct FakeReviewClient {
    reply: Option<String>,
    history_calls: Mutex<Vec<HistoryCall>>,
}

impl FakeReviewClient {
    /// Answers every call with `reply`, parsed the way the real client parses it.
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: Some(reply.to_string()),
            history_calls: Mutex::new(Vec::new()),
        }
    }

    /// Fails every call as if the endpoint were unreachable.
    pub fn failing() -> Self {
        Self {
            reply: None,
            history_calls: Mutex::new(Vec::new()),
        }
    }

    pub fn history_calls(&self) -> Vec<HistoryCall> {
        self.history_calls.lock().unwrap().clone()
    }

    fn raw(&self) -> Result<String, LlmError> {
        self.reply.clone().ok_or(LlmError::Api {
            status: 503,
            message: "service unavailable".to_string(),
        })
    }
}

#[async_trait]
impl ReviewClient for FakeReviewClient {
    async fn review(&self, _job_description: &str, _resume_text: &str) -> Result<Review, LlmError> {
        Ok(parse_review(&self.raw()?))
    }

    async fn review_with_history(
        &self,
        job_description: &str,
        _resume_text: &str,
        history: &str,
        prior_question: &str,
    ) -> Result<Review, LlmError> {
        self.history_calls.lock().unwrap().push(HistoryCall {
            job_description: job_description.to_string(),
            history: history.to_string(),
            prior_question: prior_question.to_string(),
        });
        Ok(parse_review(&self.raw()?))
    }

    async fn converse(&self, _message: &str) -> Result<String, LlmError> {
        self.raw()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Repository
// ────────────────────────────────────────────────────────────────────────────

/// Which repository operation should fail with a database error.
#[derive(Debug, Clone, Copy, Default)]
pub struct Failures {
    pub begin: bool,
    pub insert_application: bool,
    pub attach_review: bool,
    pub insert_message: bool,
    pub commit: bool,
    pub conversation: bool,
}

#[derive(Debug, Clone, Default)]
struct Tables {
    users: HashSet<Uuid>,
    job_posts: HashMap<Uuid, JobPost>,
    applications: Vec<JobApplication>,
    messages: Vec<Message>,
    /// Ticks once per write so timestamps are strictly increasing.
    clock: i64,
}

impl Tables {
    fn tick(&mut self) -> DateTime<Utc> {
        self.clock += 1;
        Utc.timestamp_opt(1_700_000_000, 0).unwrap() + Duration::seconds(self.clock)
    }
}

/// Repository whose units of work stage writes on a copy of the tables and
/// publish them on commit.
#[derive(Clone, Default)]
pub struct MemoryRepository {
    tables: Arc<Mutex<Tables>>,
    failures: Failures,
}

impl MemoryRepository {
    pub fn with_failures(failures: Failures) -> Self {
        Self {
            failures,
            ..Self::default()
        }
    }

    pub fn seed_user(&self, user_id: Uuid) {
        self.tables.lock().unwrap().users.insert(user_id);
    }

    /// Also registers `owner_id` as a user.
    pub fn seed_job_post(&self, owner_id: Uuid, description: &str) -> JobPost {
        let mut tables = self.tables.lock().unwrap();
        tables.users.insert(owner_id);
        let now = tables.tick();
        let post = JobPost {
            id: Uuid::new_v4(),
            user_id: owner_id,
            title: "Backend Engineer".to_string(),
            description: description.to_string(),
            location: "Remote".to_string(),
            salary_range: "100k-120k".to_string(),
            quantity: 1,
            job_position: "Engineer".to_string(),
            is_open: true,
            created_at: now,
            updated_at: now,
        };
        tables.job_posts.insert(post.id, post.clone());
        post
    }

    pub fn seed_application(
        &self,
        job_id: Uuid,
        applicant_id: Uuid,
        resume_location: &str,
        questions: Option<&str>,
    ) -> JobApplication {
        let mut tables = self.tables.lock().unwrap();
        tables.users.insert(applicant_id);
        let now = tables.tick();
        let application = JobApplication {
            id: Uuid::new_v4(),
            job_id,
            user_id: applicant_id,
            resume_file: resume_location.to_string(),
            status: "pending".to_string(),
            ai_summary: "seeded".to_string(),
            ai_score: None,
            ai_questions: questions.map(str::to_string),
            created_at: now,
            updated_at: now,
        };
        tables.applications.push(application.clone());
        application
    }

    pub fn seed_message(&self, sender_id: Uuid, receiver_id: Uuid, text: &str) -> Message {
        let mut tables = self.tables.lock().unwrap();
        let message = Message {
            id: Uuid::new_v4(),
            sender_id,
            receiver_id,
            message_text: text.to_string(),
            created_at: tables.tick(),
        };
        tables.messages.push(message.clone());
        message
    }

    pub fn applications(&self) -> Vec<JobApplication> {
        self.tables.lock().unwrap().applications.clone()
    }

    pub fn messages(&self) -> Vec<Message> {
        self.tables.lock().unwrap().messages.clone()
    }
}

pub struct MemoryUnitOfWork {
    committed: Arc<Mutex<Tables>>,
    staged: Tables,
    failures: Failures,
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    async fn insert_application(
        &mut self,
        new: &NewApplication,
    ) -> Result<JobApplication, sqlx::Error> {
        if self.failures.insert_application {
            return Err(sqlx::Error::PoolClosed);
        }
        let now = self.staged.tick();
        let application = JobApplication {
            id: Uuid::new_v4(),
            job_id: new.job_id,
            user_id: new.applicant_id,
            resume_file: new.resume_location.clone(),
            status: "pending".to_string(),
            ai_summary: String::new(),
            ai_score: None,
            ai_questions: None,
            created_at: now,
            updated_at: now,
        };
        self.staged.applications.push(application.clone());
        Ok(application)
    }

    async fn find_job_post(&mut self, job_id: Uuid) -> Result<Option<JobPost>, sqlx::Error> {
        Ok(self.staged.job_posts.get(&job_id).cloned())
    }

    async fn attach_review(
        &mut self,
        application_id: Uuid,
        review: &Review,
    ) -> Result<JobApplication, sqlx::Error> {
        if self.failures.attach_review {
            return Err(sqlx::Error::PoolClosed);
        }
        let now = self.staged.tick();
        let application = self
            .staged
            .applications
            .iter_mut()
            .find(|a| a.id == application_id)
            .ok_or(sqlx::Error::RowNotFound)?;
        application.ai_summary = review.summary.clone();
        application.ai_score = review.score;
        application.ai_questions = review.questions.clone();
        application.updated_at = now;
        Ok(application.clone())
    }

    async fn insert_message(&mut self, message: &NewMessage) -> Result<Message, sqlx::Error> {
        if self.failures.insert_message {
            return Err(sqlx::Error::PoolClosed);
        }
        let message = Message {
            id: Uuid::new_v4(),
            sender_id: message.sender_id,
            receiver_id: message.receiver_id,
            message_text: message.text.clone(),
            created_at: self.staged.tick(),
        };
        self.staged.messages.push(message.clone());
        Ok(message)
    }

    async fn commit(self: Box<Self>) -> Result<(), sqlx::Error> {
        if self.failures.commit {
            return Err(sqlx::Error::PoolClosed);
        }
        *self.committed.lock().unwrap() = self.staged;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), sqlx::Error> {
        Ok(())
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, sqlx::Error> {
        if self.failures.begin {
            return Err(sqlx::Error::PoolClosed);
        }
        let staged = self.tables.lock().unwrap().clone();
        Ok(Box::new(MemoryUnitOfWork {
            committed: Arc::clone(&self.tables),
            staged,
            failures: self.failures,
        }))
    }

    async fn conversation(
        &self,
        company_id: Uuid,
        applicant_id: Uuid,
        job_id: Uuid,
    ) -> Result<Vec<Message>, sqlx::Error> {
        if self.failures.conversation {
            return Err(sqlx::Error::PoolClosed);
        }
        let tables = self.tables.lock().unwrap();
        let applied = tables
            .applications
            .iter()
            .any(|a| a.job_id == job_id && a.user_id == applicant_id);
        if !applied {
            return Ok(Vec::new());
        }
        let mut messages: Vec<Message> = tables
            .messages
            .iter()
            .filter(|m| {
                (m.sender_id == company_id && m.receiver_id == applicant_id)
                    || (m.sender_id == applicant_id && m.receiver_id == company_id)
            })
            .cloned()
            .collect();
        messages.sort_by_key(|m| m.created_at);
        Ok(messages)
    }

    async fn find_application_with_post(
        &self,
        job_id: Uuid,
        applicant_id: Uuid,
    ) -> Result<Option<(JobApplication, JobPost)>, sqlx::Error> {
        let tables = self.tables.lock().unwrap();
        let application = tables
            .applications
            .iter()
            .rev()
            .find(|a| a.job_id == job_id && a.user_id == applicant_id)
            .cloned();
        let post = tables.job_posts.get(&job_id).cloned();
        Ok(application.zip(post))
    }

    async fn latest_message(
        &self,
        sender_id: Uuid,
        receiver_id: Uuid,
    ) -> Result<Option<Message>, sqlx::Error> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .messages
            .iter()
            .filter(|m| m.sender_id == sender_id && m.receiver_id == receiver_id)
            .max_by_key(|m| m.created_at)
            .cloned())
    }

    async fn user_exists(&self, user_id: Uuid) -> Result<bool, sqlx::Error> {
        Ok(self.tables.lock().unwrap().users.contains(&user_id))
    }
}
