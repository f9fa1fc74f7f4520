use std::collections::BTreeSet;
use std::sync::Arc;

use backend::{ApiError, InMemoryBackend, PracticeBackend, TopicReadiness};
use practice_core::model::{
    AccessStatus, AnswerEntry, Difficulty, Subject, SubjectId, SubmissionPayload, TestConfig,
    Topic, TopicId, TopicScope,
};

fn subject(id: u64, name: &str) -> Subject {
    Subject {
        id: SubjectId::new(id),
        name: name.into(),
        topic_count: 0,
        question_count: 0,
    }
}

fn topics(subject: u64, count: u64) -> Vec<Topic> {
    (1..=count)
        .map(|i| Topic {
            id: TopicId::new(subject * 100 + i),
            subject_id: SubjectId::new(subject),
            name: format!("Topic {i}"),
        })
        .collect()
}

fn config(subjects: &[u64], total_questions: u32) -> TestConfig {
    TestConfig::new(
        subjects.iter().copied().map(SubjectId::new).collect(),
        TopicScope::Random,
        Difficulty::Medium,
        total_questions,
        30,
    )
    .unwrap()
}

#[tokio::test]
async fn full_attempt_through_trait_object() {
    let backend: Arc<dyn PracticeBackend> = Arc::new(
        InMemoryBackend::new()
            .with_subject(subject(1, "Physics"), topics(1, 4))
            .with_subject(subject(2, "Biology"), topics(2, 4)),
    );

    let subjects = backend.list_subjects().await.unwrap();
    assert_eq!(subjects.len(), 2);

    let session = backend.start_test(&config(&[1, 2], 6)).await.unwrap();
    assert_eq!(session.len(), 6);
    let names: BTreeSet<_> = session.questions().iter().map(|q| q.subject.clone()).collect();
    assert_eq!(names, BTreeSet::from(["Biology".to_string(), "Physics".to_string()]));

    let payload = SubmissionPayload {
        session_id: session.id(),
        answers: session
            .questions()
            .iter()
            .map(|q| AnswerEntry {
                question_id: q.id,
                user_answer: None,
            })
            .collect(),
        time_spent_seconds: 12,
    };
    let response = backend.submit_test(&payload).await.unwrap();
    assert_eq!(response.test_result.correct_answers, 0);
    assert_eq!(response.test_result.total_questions, 6);
    assert_eq!(response.questions.len(), 6);
    assert!(response.questions.iter().all(|q| q.user_answer.is_none()));
}

#[tokio::test]
async fn pending_subject_appears_after_scripted_rounds() {
    let backend = InMemoryBackend::new().with_pending_subject(
        subject(7, "Geology"),
        topics(7, 3),
        TopicReadiness::AfterFetches(1),
    );
    let ids = BTreeSet::from([SubjectId::new(7)]);

    let first = backend.get_topics(&ids, 1, 10).await.unwrap();
    assert!(first[&SubjectId::new(7)].is_empty());

    let second = backend.get_topics(&ids, 1, 10).await.unwrap();
    assert_eq!(second[&SubjectId::new(7)].len(), 3);
    assert_eq!(backend.topic_calls(), 2);
}

#[tokio::test]
async fn injected_failures_are_consumed_once() {
    let backend = InMemoryBackend::new().with_subject(subject(1, "Physics"), topics(1, 2));
    backend.fail_next_start(ApiError::Network("connection reset".into()));

    let err = backend.start_test(&config(&[1], 3)).await.unwrap_err();
    assert!(err.is_transient());
    assert!(backend.start_test(&config(&[1], 3)).await.is_ok());
    assert_eq!(backend.start_calls(), 2);
}

#[tokio::test]
async fn access_status_can_be_scripted() {
    let backend = InMemoryBackend::new().with_free_question_limit(3);
    assert_eq!(
        backend.get_access_status().await.unwrap(),
        AccessStatus::free(3)
    );

    backend.set_access_status(AccessStatus::admin());
    assert!(backend.get_access_status().await.unwrap().is_admin());

    backend.fail_access_status(ApiError::Unavailable);
    assert_eq!(
        backend.get_access_status().await.unwrap_err(),
        ApiError::Unavailable
    );
}
