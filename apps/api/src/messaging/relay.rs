//! Threads new messages through the review client and persists every side of
//! the exchange in one transaction.

use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::errors::PipelineError;
use crate::llm_client::{is_meaningful_question, ReviewClient};
use crate::messaging::transcript::build_transcript;
use crate::models::job::{JobApplication, JobPost};
use crate::models::message::Message;
use crate::repository::{NewMessage, Repository, UnitOfWork};
use crate::storage::TextExtractor;

pub const RELAY_FALLBACK_REPLY: &str = "AI processing failed. Your message has been saved.";
pub const INTERACT_FALLBACK_REPLY: &str = "AI response failed.";

/// Messages written by one `interact` call.
#[derive(Debug, Clone, Serialize)]
pub struct Exchange {
    pub user_message: Message,
    pub ai_message: Message,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question_message: Option<Message>,
}

pub struct MessageRelay {
    extractor: Arc<dyn TextExtractor>,
    reviewer: Arc<dyn ReviewClient>,
    repo: Arc<dyn Repository>,
}

impl MessageRelay {
    pub fn new(
        extractor: Arc<dyn TextExtractor>,
        reviewer: Arc<dyn ReviewClient>,
        repo: Arc<dyn Repository>,
    ) -> Self {
        Self {
            extractor,
            reviewer,
            repo,
        }
    }

    /// Sends a company's reply to an applicant and returns the AI's follow-up
    /// (or the fallback text when the AI call failed).
    pub async fn respond_to_applicant(
        &self,
        company_id: Uuid,
        applicant_id: Uuid,
        job_id: Uuid,
        response_text: &str,
    ) -> Result<String, PipelineError> {
        let history = match self
            .repo
            .conversation(company_id, applicant_id, job_id)
            .await
        {
            Ok(messages) => messages,
            Err(e) => {
                warn!(%company_id, %applicant_id, %job_id, "Conversation history unavailable, continuing without it: {e}");
                Vec::new()
            }
        };
        let transcript = build_transcript(&history, company_id);

        let (application, post) = self.application_for(job_id, applicant_id).await?;
        let resume_text = self.extractor.extract(&application.resume_file).await?;

        let prior_question = application.ai_questions.clone().unwrap_or_default();
        let latest = format!("Company: {response_text}");
        let conversation = if transcript.is_empty() {
            latest
        } else {
            format!("{transcript}\n{latest}")
        };

        let ai_reply = match self
            .reviewer
            .review_with_history(&post.description, &resume_text, &conversation, &prior_question)
            .await
        {
            Ok(review) => Some(review.summary),
            Err(e) => {
                warn!(%company_id, %applicant_id, %job_id, "AI follow-up failed, replying with fallback: {e}");
                None
            }
        };

        let mut writes = vec![NewMessage::new(company_id, applicant_id, response_text)];
        if let Some(reply) = &ai_reply {
            writes.push(NewMessage::new(company_id, applicant_id, reply.as_str()));
        }
        self.persist(&writes).await?;

        info!(%company_id, %applicant_id, %job_id, messages = writes.len(), "Company response relayed");
        Ok(ai_reply.unwrap_or_else(|| RELAY_FALLBACK_REPLY.to_string()))
    }

    /// Posts a user's message and the AI's answer. With a `job_id` the answer
    /// is a review of the sender's application to that job; without one it is
    /// free conversation.
    pub async fn interact(
        &self,
        sender_id: Uuid,
        receiver_id: Uuid,
        message_text: &str,
        job_id: Option<Uuid>,
    ) -> Result<Exchange, PipelineError> {
        if !self.repo.user_exists(receiver_id).await? {
            return Err(PipelineError::NotFound(format!("User {receiver_id} not found")));
        }

        let (reply, questions) = match job_id {
            Some(job_id) => {
                let (application, post) = self.application_for(job_id, sender_id).await?;
                let resume_text = self.extractor.extract(&application.resume_file).await?;

                let prior_question = match self.repo.latest_message(receiver_id, sender_id).await {
                    Ok(message) => message.map(|m| m.message_text).unwrap_or_default(),
                    Err(e) => {
                        warn!(%sender_id, %receiver_id, "Previous question unavailable: {e}");
                        String::new()
                    }
                };

                match self
                    .reviewer
                    .review_with_history(
                        &post.description,
                        &resume_text,
                        &format!("User: {message_text}"),
                        &prior_question,
                    )
                    .await
                {
                    Ok(review) => (review.summary, review.questions),
                    Err(e) => {
                        warn!(%sender_id, %job_id, "AI review failed, replying with fallback: {e}");
                        (INTERACT_FALLBACK_REPLY.to_string(), None)
                    }
                }
            }
            None => match self.reviewer.converse(message_text).await {
                Ok(reply) => (reply, None),
                Err(e) => {
                    warn!(%sender_id, "AI conversation failed, replying with fallback: {e}");
                    (INTERACT_FALLBACK_REPLY.to_string(), None)
                }
            },
        };

        let mut writes = vec![
            NewMessage::new(sender_id, receiver_id, message_text),
            NewMessage::new(receiver_id, sender_id, reply),
        ];
        if let Some(questions) = questions.filter(|q| is_meaningful_question(q)) {
            writes.push(NewMessage::new(receiver_id, sender_id, questions));
        }

        let mut saved = self.persist(&writes).await?.into_iter();
        let (Some(user_message), Some(ai_message)) = (saved.next(), saved.next()) else {
            return Err(PipelineError::Persistence(sqlx::Error::RowNotFound));
        };

        info!(%sender_id, %receiver_id, job_id = ?job_id, "Interaction recorded");
        Ok(Exchange {
            user_message,
            ai_message,
            question_message: saved.next(),
        })
    }

    async fn application_for(
        &self,
        job_id: Uuid,
        applicant_id: Uuid,
    ) -> Result<(JobApplication, JobPost), PipelineError> {
        self.repo
            .find_application_with_post(job_id, applicant_id)
            .await?
            .ok_or_else(|| {
                PipelineError::NotFound(format!(
                    "No application from user {applicant_id} for job {job_id}"
                ))
            })
    }

    /// Inserts `writes` in order inside one transaction.
    async fn persist(&self, writes: &[NewMessage]) -> Result<Vec<Message>, PipelineError> {
        let mut uow = self.repo.begin().await?;
        match insert_all(uow.as_mut(), writes).await {
            Ok(saved) => {
                uow.commit().await?;
                Ok(saved)
            }
            Err(e) => {
                if let Err(rollback_err) = uow.rollback().await {
                    error!("Rollback failed: {rollback_err}");
                }
                Err(e.into())
            }
        }
    }
}

async fn insert_all(
    uow: &mut dyn UnitOfWork,
    writes: &[NewMessage],
) -> Result<Vec<Message>, sqlx::Error> {
    let mut saved = Vec::with_capacity(writes.len());
    for write in writes {
        saved.push(uow.insert_message(write).await?);
    }
    Ok(saved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeExtractor, FakeReviewClient, Failures, MemoryRepository};

    struct Harness {
        repo: MemoryRepository,
        client: Arc<FakeReviewClient>,
        relay: MessageRelay,
    }

    fn harness(extractor: FakeExtractor, client: FakeReviewClient, repo: MemoryRepository) -> Harness {
        let client = Arc::new(client);
        let relay = MessageRelay::new(Arc::new(extractor), client.clone(), Arc::new(repo.clone()));
        Harness {
            repo,
            client,
            relay,
        }
    }

    struct Parties {
        company: Uuid,
        applicant: Uuid,
        job: Uuid,
    }

    fn seed(repo: &MemoryRepository, questions: Option<&str>) -> Parties {
        let company = Uuid::new_v4();
        let applicant = Uuid::new_v4();
        let post = repo.seed_job_post(company, "Rust engineer");
        repo.seed_application(post.id, applicant, "resumes/cv.pdf", questions);
        Parties {
            company,
            applicant,
            job: post.id,
        }
    }

    #[tokio::test]
    async fn test_first_response_persists_both_messages() {
        let h = harness(
            FakeExtractor::returning("resume"),
            FakeReviewClient::replying("Summary: Thanks, noted.\nSCORE: 0.7\nQUESTIONS: None"),
            MemoryRepository::default(),
        );
        let p = seed(&h.repo, None);

        let reply = h
            .relay
            .respond_to_applicant(p.company, p.applicant, p.job, "Hello!")
            .await
            .unwrap();

        assert_eq!(reply, "Thanks, noted.");
        let calls = h.client.history_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].history, "Company: Hello!");
        assert_eq!(calls[0].prior_question, "");
        assert_eq!(calls[0].job_description, "Rust engineer");

        let messages = h.repo.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].message_text, "Hello!");
        assert_eq!(messages[1].message_text, "Thanks, noted.");
        assert!(messages
            .iter()
            .all(|m| m.sender_id == p.company && m.receiver_id == p.applicant));
    }

    #[tokio::test]
    async fn test_history_and_prior_questions_reach_the_client() {
        let h = harness(
            FakeExtractor::returning("resume"),
            FakeReviewClient::replying("Summary: Good answer."),
            MemoryRepository::default(),
        );
        let p = seed(&h.repo, Some("Kafka experience?"));
        h.repo.seed_message(p.company, p.applicant, "Kafka experience?");
        h.repo.seed_message(p.applicant, p.company, "Three years.");

        h.relay
            .respond_to_applicant(p.company, p.applicant, p.job, "Great.")
            .await
            .unwrap();

        let call = &h.client.history_calls()[0];
        assert_eq!(
            call.history,
            "Company: Kafka experience?\nApplicant: Three years.\nCompany: Great."
        );
        assert_eq!(call.prior_question, "Kafka experience?");
    }

    #[tokio::test]
    async fn test_ai_failure_saves_only_company_message() {
        let h = harness(
            FakeExtractor::returning("resume"),
            FakeReviewClient::failing(),
            MemoryRepository::default(),
        );
        let p = seed(&h.repo, None);

        let reply = h
            .relay
            .respond_to_applicant(p.company, p.applicant, p.job, "Hello!")
            .await
            .unwrap();

        assert_eq!(reply, RELAY_FALLBACK_REPLY);
        let messages = h.repo.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].message_text, "Hello!");
    }

    #[tokio::test]
    async fn test_history_failure_is_treated_as_empty() {
        let h = harness(
            FakeExtractor::returning("resume"),
            FakeReviewClient::replying("Summary: ok"),
            MemoryRepository::with_failures(Failures {
                conversation: true,
                ..Failures::default()
            }),
        );
        let p = seed(&h.repo, None);
        h.repo.seed_message(p.company, p.applicant, "earlier");

        h.relay
            .respond_to_applicant(p.company, p.applicant, p.job, "Hi")
            .await
            .unwrap();

        assert_eq!(h.client.history_calls()[0].history, "Company: Hi");
    }

    #[tokio::test]
    async fn test_respond_without_application_is_not_found() {
        let h = harness(
            FakeExtractor::returning("resume"),
            FakeReviewClient::replying("Summary: ok"),
            MemoryRepository::default(),
        );

        let err = h
            .relay
            .respond_to_applicant(Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), "Hi")
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::NotFound(_)));
        assert!(h.repo.messages().is_empty());
    }

    #[tokio::test]
    async fn test_respond_extraction_failure_writes_nothing() {
        let h = harness(
            FakeExtractor::failing(),
            FakeReviewClient::replying("Summary: ok"),
            MemoryRepository::default(),
        );
        let p = seed(&h.repo, None);

        let err = h
            .relay
            .respond_to_applicant(p.company, p.applicant, p.job, "Hi")
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::Extraction(_)));
        assert!(h.repo.messages().is_empty());
    }

    #[tokio::test]
    async fn test_message_insert_failure_rolls_back() {
        let h = harness(
            FakeExtractor::returning("resume"),
            FakeReviewClient::replying("Summary: ok"),
            MemoryRepository::with_failures(Failures {
                insert_message: true,
                ..Failures::default()
            }),
        );
        let p = seed(&h.repo, None);

        let err = h
            .relay
            .respond_to_applicant(p.company, p.applicant, p.job, "Hi")
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::Persistence(_)));
        assert!(h.repo.messages().is_empty());
    }

    #[tokio::test]
    async fn test_job_scoped_interaction_records_question() {
        let h = harness(
            FakeExtractor::returning("resume"),
            FakeReviewClient::replying("Summary: Noted.\nSCORE: 0.6\nQUESTIONS: Which databases?"),
            MemoryRepository::default(),
        );
        let p = seed(&h.repo, None);
        h.repo.seed_message(p.company, p.applicant, "Tell me about your Rust work.");

        let exchange = h
            .relay
            .interact(p.applicant, p.company, "I built a database.", Some(p.job))
            .await
            .unwrap();

        let call = &h.client.history_calls()[0];
        assert_eq!(call.history, "User: I built a database.");
        assert_eq!(call.prior_question, "Tell me about your Rust work.");

        assert_eq!(exchange.user_message.sender_id, p.applicant);
        assert_eq!(exchange.ai_message.sender_id, p.company);
        assert_eq!(exchange.ai_message.message_text, "Noted.");
        let question = exchange.question_message.unwrap();
        assert_eq!(question.message_text, "Which databases?");
        assert_eq!(question.receiver_id, p.applicant);
        assert_eq!(h.repo.messages().len(), 4);
    }

    #[tokio::test]
    async fn test_unscoped_interaction_converses() {
        let h = harness(
            FakeExtractor::failing(),
            FakeReviewClient::replying("Hi there!"),
            MemoryRepository::default(),
        );
        let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());
        h.repo.seed_user(bob);

        let exchange = h.relay.interact(alice, bob, "Hello", None).await.unwrap();

        assert_eq!(exchange.user_message.message_text, "Hello");
        assert_eq!(exchange.ai_message.message_text, "Hi there!");
        assert_eq!(exchange.ai_message.receiver_id, alice);
        assert!(exchange.question_message.is_none());
        assert!(h.client.history_calls().is_empty());
    }

    #[tokio::test]
    async fn test_interaction_ai_failure_uses_fallback() {
        let h = harness(
            FakeExtractor::returning("resume"),
            FakeReviewClient::failing(),
            MemoryRepository::default(),
        );
        let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());
        h.repo.seed_user(bob);

        let exchange = h.relay.interact(alice, bob, "Hello", None).await.unwrap();

        assert_eq!(exchange.ai_message.message_text, INTERACT_FALLBACK_REPLY);
        assert_eq!(h.repo.messages().len(), 2);
    }

    #[tokio::test]
    async fn test_job_scoped_interaction_without_application_is_not_found() {
        let h = harness(
            FakeExtractor::returning("resume"),
            FakeReviewClient::replying("Summary: ok"),
            MemoryRepository::default(),
        );
        let company = Uuid::new_v4();
        h.repo.seed_user(company);

        let err = h
            .relay
            .interact(Uuid::new_v4(), company, "Hello", Some(Uuid::new_v4()))
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_interaction_with_unknown_receiver_is_not_found() {
        let h = harness(
            FakeExtractor::returning("resume"),
            FakeReviewClient::replying("Hi there!"),
            MemoryRepository::default(),
        );

        let err = h
            .relay
            .interact(Uuid::new_v4(), Uuid::new_v4(), "Hello", None)
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::NotFound(_)));
        assert!(h.repo.messages().is_empty());
    }
}
