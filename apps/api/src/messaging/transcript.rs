use crate::models::message::Message;
use uuid::Uuid;

/// Renders a company/applicant exchange as role-labelled lines, oldest first.
///
/// Messages are re-sorted by creation time (stable, so equal timestamps keep
/// their given order) whatever order the caller supplies.
pub fn build_transcript(messages: &[Message], company_id: Uuid) -> String {
    let mut ordered: Vec<&Message> = messages.iter().collect();
    ordered.sort_by_key(|m| m.created_at);

    ordered
        .into_iter()
        .map(|m| {
            let role = if m.sender_id == company_id {
                "Company"
            } else {
                "Applicant"
            };
            format!("{role}: {}", m.message_text)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn message(sender: Uuid, receiver: Uuid, text: &str, offset_secs: i64) -> Message {
        Message {
            id: Uuid::new_v4(),
            sender_id: sender,
            receiver_id: receiver,
            message_text: text.to_string(),
            created_at: Utc::now() + Duration::seconds(offset_secs),
        }
    }

    #[test]
    fn test_empty_history_is_empty_transcript() {
        assert_eq!(build_transcript(&[], Uuid::new_v4()), "");
    }

    #[test]
    fn test_transcript_is_chronological_regardless_of_input_order() {
        let company = Uuid::new_v4();
        let applicant = Uuid::new_v4();
        let messages = vec![
            message(company, applicant, "third", 30),
            message(applicant, company, "second", 20),
            message(company, applicant, "first", 10),
        ];

        assert_eq!(
            build_transcript(&messages, company),
            "Company: first\nApplicant: second\nCompany: third"
        );
    }

    #[test]
    fn test_equal_timestamps_keep_input_order() {
        let company = Uuid::new_v4();
        let applicant = Uuid::new_v4();
        let at = Utc::now();
        let mut a = message(applicant, company, "a", 0);
        let mut b = message(company, applicant, "b", 0);
        a.created_at = at;
        b.created_at = at;

        assert_eq!(
            build_transcript(&[a, b], company),
            "Applicant: a\nCompany: b"
        );
    }
}
