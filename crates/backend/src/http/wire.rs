//! JSON shapes exchanged with the practice API and their mapping to domain types.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use practice_core::model::{
    AccessStatus, Difficulty, Pagination, Question, QuestionDetail, QuestionId, Subject,
    SubjectId, SubjectTopics, SubmissionPayload, SubmitResponse, TestConfig, TestResult, TestSession,
    TestSessionId, Topic, TopicId, TopicPage, TopicScope, UserRole,
};
use serde::{Deserialize, Serialize};

use crate::client::ApiError;

fn decode<E: core::fmt::Display>(e: E) -> ApiError {
    ApiError::Decode(e.to_string())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SubjectDto {
    #[serde(alias = "_id")]
    id: u64,
    name: String,
    #[serde(default)]
    topic_count: u32,
    #[serde(default)]
    question_count: u32,
}

impl From<SubjectDto> for Subject {
    fn from(dto: SubjectDto) -> Self {
        Subject {
            id: SubjectId::new(dto.id),
            name: dto.name,
            topic_count: dto.topic_count,
            question_count: dto.question_count,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct SubjectsResponse {
    pub subjects: Vec<SubjectDto>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TopicDto {
    #[serde(alias = "_id")]
    id: u64,
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PaginationDto {
    #[serde(default)]
    total_topics: u32,
    #[serde(default = "first_page")]
    page: u32,
    #[serde(default)]
    page_size: u32,
}

fn first_page() -> u32 {
    1
}

#[derive(Debug, Deserialize)]
struct TopicPageDto {
    #[serde(default)]
    topics: Vec<TopicDto>,
    pagination: Option<PaginationDto>,
}

/// `{"topics": {"<subjectId>": {"topics": [...], "pagination": {...}}}}`
#[derive(Debug, Deserialize)]
pub(crate) struct TopicsResponse {
    topics: BTreeMap<String, TopicPageDto>,
}

impl TopicsResponse {
    pub(crate) fn into_pages(
        self,
        requested_page_size: u32,
    ) -> Result<BTreeMap<SubjectId, TopicPage>, ApiError> {
        let mut pages = BTreeMap::new();
        for (key, dto) in self.topics {
            let subject_id: SubjectId = key.parse().map_err(decode)?;
            let pagination = dto.pagination.map_or(
                Pagination {
                    total_topics: u32::try_from(dto.topics.len()).unwrap_or(u32::MAX),
                    page: 1,
                    page_size: requested_page_size,
                },
                |p| Pagination {
                    total_topics: p.total_topics,
                    page: p.page,
                    page_size: if p.page_size == 0 {
                        requested_page_size
                    } else {
                        p.page_size
                    },
                },
            );
            let topics = dto
                .topics
                .into_iter()
                .map(|t| Topic {
                    id: TopicId::new(t.id),
                    subject_id,
                    name: t.name,
                })
                .collect();
            pages.insert(
                subject_id,
                TopicPage {
                    subject_id,
                    topics,
                    pagination,
                },
            );
        }
        Ok(pages)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StartTestRequest {
    subject_ids: Vec<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    topic_ids: Option<Vec<u64>>,
    /// Keyed by subject id; `null` means every topic of that subject.
    #[serde(skip_serializing_if = "Option::is_none")]
    topics_by_subject: Option<BTreeMap<String, Option<Vec<u64>>>>,
    random_topics: bool,
    difficulty: Difficulty,
    total_questions: u32,
    duration_minutes: u32,
}

impl From<&TestConfig> for StartTestRequest {
    fn from(config: &TestConfig) -> Self {
        let (random_topics, topic_ids, topics_by_subject) = match config.topics() {
            TopicScope::Random => (true, None, None),
            TopicScope::PerSubject(by_subject) => {
                let chosen = config.topics().chosen_topic_ids();
                let by_subject: BTreeMap<String, Option<Vec<u64>>> = by_subject
                    .iter()
                    .map(|(subject_id, topics)| {
                        let ids: Option<Vec<u64>> = match topics {
                            SubjectTopics::All => None,
                            SubjectTopics::Chosen(ids) => {
                                Some(ids.iter().map(TopicId::value).collect())
                            }
                        };
                        (subject_id.to_string(), ids)
                    })
                    .collect();
                (
                    false,
                    (!chosen.is_empty()).then(|| chosen.iter().map(TopicId::value).collect::<Vec<_>>()),
                    Some(by_subject),
                )
            }
        };
        Self {
            subject_ids: config.subject_ids().iter().map(SubjectId::value).collect(),
            topic_ids,
            topics_by_subject,
            random_topics,
            difficulty: config.difficulty(),
            total_questions: config.total_questions(),
            duration_minutes: config.duration_minutes(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuestionDto {
    #[serde(alias = "_id")]
    id: u64,
    #[serde(alias = "question")]
    text: String,
    options: Vec<String>,
    #[serde(default)]
    subject: String,
    #[serde(default)]
    topic: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TestSessionDto {
    #[serde(alias = "id")]
    test_id: u64,
    questions: Vec<QuestionDto>,
    #[serde(alias = "duration")]
    duration_minutes: u32,
    #[serde(default)]
    free_question_limit: u32,
}

impl TestSessionDto {
    pub(crate) fn into_session(self) -> Result<TestSession, ApiError> {
        let questions = self
            .questions
            .into_iter()
            .map(|q| Question {
                id: QuestionId::new(q.id),
                text: q.text,
                options: q.options,
                subject: q.subject,
                topic: q.topic,
            })
            .collect::<Vec<_>>();
        if questions.is_empty() {
            return Err(ApiError::NoQuestionsAvailable);
        }
        TestSession::new(
            TestSessionId::new(self.test_id),
            questions,
            self.duration_minutes,
            self.free_question_limit,
        )
        .map_err(decode)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AccessStatusDto {
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    has_paid: bool,
    #[serde(default)]
    payment_expiry: Option<DateTime<Utc>>,
    #[serde(default)]
    free_question_limit: u32,
}

impl From<AccessStatusDto> for AccessStatus {
    fn from(dto: AccessStatusDto) -> Self {
        let role = match dto.role.as_deref().map(str::to_ascii_lowercase).as_deref() {
            Some("admin") => UserRole::Admin,
            _ => UserRole::Student,
        };
        AccessStatus {
            role,
            has_paid: dto.has_paid,
            payment_expiry: dto.payment_expiry,
            free_question_limit: dto.free_question_limit,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AnswerDto {
    question_id: u64,
    user_answer: Option<usize>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SubmitRequest {
    answers: Vec<AnswerDto>,
    time_spent: u64,
}

impl From<&SubmissionPayload> for SubmitRequest {
    fn from(payload: &SubmissionPayload) -> Self {
        Self {
            answers: payload
                .answers
                .iter()
                .map(|entry| AnswerDto {
                    question_id: entry.question_id.value(),
                    user_answer: entry.user_answer,
                })
                .collect(),
            time_spent: payload.time_spent_seconds,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TestResultDto {
    #[serde(alias = "id")]
    test_id: u64,
    score: f64,
    correct_answers: u32,
    total_questions: u32,
    #[serde(alias = "timeSpent")]
    time_spent_seconds: u64,
    #[serde(default)]
    subject_scores: BTreeMap<String, f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuestionDetailDto {
    #[serde(alias = "_id", alias = "id")]
    question_id: u64,
    correct_answer: usize,
    #[serde(default)]
    user_answer: Option<usize>,
    is_correct: bool,
    #[serde(default)]
    explanation: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SubmitResponseDto {
    test_result: TestResultDto,
    #[serde(default)]
    questions: Vec<QuestionDetailDto>,
}

impl From<SubmitResponseDto> for SubmitResponse {
    fn from(dto: SubmitResponseDto) -> Self {
        let result = dto.test_result;
        SubmitResponse {
            test_result: TestResult {
                test_id: TestSessionId::new(result.test_id),
                score: result.score,
                correct_answers: result.correct_answers,
                total_questions: result.total_questions,
                time_spent_seconds: result.time_spent_seconds,
                subject_scores: result.subject_scores,
            },
            questions: dto
                .questions
                .into_iter()
                .map(|q| QuestionDetail {
                    question_id: QuestionId::new(q.question_id),
                    correct_answer: q.correct_answer,
                    user_answer: q.user_answer,
                    is_correct: q.is_correct,
                    explanation: q.explanation,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(alias = "error")]
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use practice_core::model::AnswerEntry;
    use std::collections::BTreeSet;

    #[test]
    fn decodes_topics_keyed_by_subject() {
        let json = r#"{
            "topics": {
                "3": {"topics": [{"id": 31, "name": "Optics"}], "pagination": {"totalTopics": 12, "page": 1, "pageSize": 10}},
                "4": {"topics": []}
            }
        }"#;
        let response: TopicsResponse = serde_json::from_str(json).unwrap();
        let pages = response.into_pages(10).unwrap();

        let optics = &pages[&SubjectId::new(3)];
        assert_eq!(optics.topics[0].subject_id, SubjectId::new(3));
        assert_eq!(optics.pagination.total_topics, 12);
        assert!(pages[&SubjectId::new(4)].is_empty());
        assert_eq!(pages[&SubjectId::new(4)].pagination.page_size, 10);
    }

    #[test]
    fn rejects_non_numeric_subject_keys() {
        let response: TopicsResponse =
            serde_json::from_str(r#"{"topics": {"abc": {"topics": []}}}"#).unwrap();
        assert!(matches!(response.into_pages(10), Err(ApiError::Decode(_))));
    }

    #[test]
    fn start_request_omits_topics_in_random_mode() {
        let config = TestConfig::new(
            BTreeSet::from([SubjectId::new(1)]),
            TopicScope::Random,
            Difficulty::Easy,
            20,
            30,
        )
        .unwrap();
        let value = serde_json::to_value(StartTestRequest::from(&config)).unwrap();
        assert_eq!(value["randomTopics"], true);
        assert_eq!(value["difficulty"], "easy");
        assert!(value.get("topicIds").is_none());
        assert!(value.get("topicsBySubject").is_none());
    }

    #[test]
    fn start_request_leaves_unpicked_subjects_unrestricted() {
        let config = TestConfig::new(
            BTreeSet::from([SubjectId::new(1), SubjectId::new(2)]),
            TopicScope::PerSubject(BTreeMap::from([(
                SubjectId::new(2),
                SubjectTopics::Chosen(BTreeSet::from([TopicId::new(22)])),
            )])),
            Difficulty::Medium,
            20,
            30,
        )
        .unwrap();
        let value = serde_json::to_value(StartTestRequest::from(&config)).unwrap();
        assert_eq!(value["randomTopics"], false);
        assert_eq!(value["topicIds"], serde_json::json!([22]));
        assert_eq!(
            value["topicsBySubject"],
            serde_json::json!({"1": null, "2": [22]})
        );
    }

    #[test]
    fn submit_request_keeps_null_answers() {
        let payload = SubmissionPayload {
            session_id: TestSessionId::new(1),
            answers: vec![
                AnswerEntry {
                    question_id: QuestionId::new(10),
                    user_answer: Some(2),
                },
                AnswerEntry {
                    question_id: QuestionId::new(11),
                    user_answer: None,
                },
            ],
            time_spent_seconds: 75,
        };
        let value = serde_json::to_value(SubmitRequest::from(&payload)).unwrap();
        assert_eq!(value["answers"][1]["userAnswer"], serde_json::Value::Null);
        assert_eq!(value["timeSpent"], 75);
    }

    #[test]
    fn empty_session_maps_to_no_questions() {
        let dto: TestSessionDto =
            serde_json::from_str(r#"{"testId": 9, "questions": [], "durationMinutes": 30}"#).unwrap();
        assert_eq!(dto.into_session().unwrap_err(), ApiError::NoQuestionsAvailable);
    }

    #[test]
    fn access_status_defaults_to_student() {
        let dto: AccessStatusDto =
            serde_json::from_str(r#"{"hasPaid": false, "freeQuestionLimit": 5}"#).unwrap();
        let status = AccessStatus::from(dto);
        assert_eq!(status.role, UserRole::Student);
        assert_eq!(status.free_question_limit, 5);
    }
}
