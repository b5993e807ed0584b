use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use medquiz_core::model::{QuestionSet, QuizMode, UserId};
use medquiz_core::time::fixed_clock;
use services::ai::{GenerationRequest, ModelTransport};
use services::{
    AiConfig, AppServices, CurrentQuestion, QuizPhase, QuizSettings, RecordOutcome,
    TransportError,
};

/// Scripted transport that records each request's model and whether it was
/// schema-constrained.
struct RecordingTransport {
    replies: Mutex<Vec<Result<String, TransportError>>>,
    requests: Mutex<Vec<(String, bool)>>,
}

impl RecordingTransport {
    fn new(mut replies: Vec<Result<String, TransportError>>) -> Arc<Self> {
        replies.reverse();
        Arc::new(Self {
            replies: Mutex::new(replies),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn requests(&self) -> Vec<(String, bool)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelTransport for RecordingTransport {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, TransportError> {
        self.requests
            .lock()
            .unwrap()
            .push((request.model.clone(), request.response_schema.is_some()));
        self.replies
            .lock()
            .unwrap()
            .pop()
            .unwrap_or(Err(TransportError::EmptyResponse))
    }
}

const CORRECT: [usize; 5] = [1, 3, 0, 2, 1];

fn cardiology_payload() -> String {
    let items: Vec<String> = CORRECT
        .iter()
        .enumerate()
        .map(|(i, correct)| {
            format!(
                r#"{{"id": "q{n}", "question": "Cardiology question {n}?", "options": ["A{n}", "B{n}", "C{n}", "D{n}"], "correctAnswer": {correct}, "explanation": "Because {n}.", "difficulty": "Intermediate", "points": 15}}"#,
                n = i + 1
            )
        })
        .collect();
    format!(
        "Here are your questions:\n```json\n{{\"questions\": [{}]}}\n```",
        items.join(",\n")
    )
}

fn config() -> AiConfig {
    let mut config = AiConfig::with_api_key("test-key");
    config.cache_bust = false;
    config
}

#[tokio::test]
async fn cardiology_multiple_choice_end_to_end() {
    let transport = RecordingTransport::new(vec![
        Ok(cardiology_payload()),
        Ok(r##"{"feedback": "# Overall Performance Summary\nWell done.\n# Strengths\nValves.\n# Areas for Improvement\nNone.\n# Your Personalized Study Plan\n- ECGs"}"##.into()),
    ]);
    let app = AppServices::in_memory(transport.clone(), config(), fixed_clock());
    let mut quiz = app.new_controller();

    quiz.select_topic("Cardiology").unwrap();
    let settings = QuizSettings {
        mode: QuizMode::MultipleChoice,
        question_count: 5,
        ..app.default_settings()
    };
    assert_eq!(quiz.start(settings).await.unwrap(), QuizPhase::Active);

    let Some(QuestionSet::MultipleChoice(questions)) = quiz.questions() else {
        panic!("expected multiple-choice questions");
    };
    let ids: Vec<_> = questions.iter().map(|q| q.id().as_str().to_string()).collect();
    assert_eq!(ids, ["q1", "q2", "q3", "q4", "q5"]);
    assert!(questions.iter().all(|q| q.options().len() == 4 && q.correct_index() < 4));

    // Right on the first three, wrong on the fourth, right on the last.
    let picks = [CORRECT[0], CORRECT[1], CORRECT[2], (CORRECT[3] + 1) % 4, CORRECT[4]];
    for (i, pick) in picks.into_iter().enumerate() {
        let Some(CurrentQuestion::MultipleChoice(q)) = quiz.current_question() else {
            panic!("expected a multiple-choice question");
        };
        assert_eq!(q.id().as_str(), format!("q{}", i + 1));
        let step = quiz.choose_option(pick).unwrap();
        assert_eq!(step.finished, i == 4);
    }

    assert_eq!(quiz.phase(), QuizPhase::Finished);
    let result = quiz.result().unwrap().clone();
    assert_eq!(result.total_questions(), 5);
    assert_eq!(result.correct_answers(), 4);
    assert_eq!(result.score(), 60);
    assert_eq!(result.total_points(), 75);
    assert_eq!(result.percentage(), 80);

    let report = quiz.finish_feedback().await.unwrap();
    assert!(report.missing_sections().is_empty());

    // One plain generation call, then one schema-constrained feedback call.
    assert_eq!(
        transport.requests(),
        [
            ("gemini-1.5-flash".to_string(), false),
            ("gemini-1.5-flash".to_string(), true)
        ]
    );

    let recorder = app.recorder();
    let user = UserId::new("student-1");
    let outcome = recorder.record(&user, &result, "General").await;
    let RecordOutcome::Recorded { profile, .. } = outcome else {
        panic!("expected result to be recorded");
    };
    assert_eq!(profile.quiz_count, 1);
    assert_eq!(profile.total_score, 60);

    let board = recorder.leaderboard(10).await.unwrap();
    assert_eq!(board[0].user_id, user);
}

#[tokio::test]
async fn permission_error_reaches_error_phase_after_one_request() {
    let denied = || TransportError::Rejected {
        status: 403,
        api_status: Some("PERMISSION_DENIED".into()),
        message: "API key not valid".into(),
    };
    let transport = RecordingTransport::new(vec![Err(denied()), Err(denied()), Err(denied())]);
    let app = AppServices::in_memory(transport.clone(), config(), fixed_clock());
    let mut quiz = app.new_controller();

    quiz.select_topic("Cardiology").unwrap();
    let phase = quiz.start(app.default_settings()).await.unwrap();

    assert_eq!(phase, QuizPhase::Error);
    assert_eq!(transport.requests().len(), 1);
}

#[tokio::test]
async fn transient_errors_fall_back_to_later_models() {
    let transport = RecordingTransport::new(vec![
        Err(TransportError::Timeout),
        Err(TransportError::EmptyResponse),
        Ok(cardiology_payload()),
    ]);
    let app = AppServices::in_memory(transport.clone(), config(), fixed_clock());
    let mut quiz = app.new_controller();

    quiz.select_topic("Cardiology").unwrap();
    let phase = quiz
        .start(QuizSettings {
            question_count: 5,
            ..app.default_settings()
        })
        .await
        .unwrap();

    assert_eq!(phase, QuizPhase::Active);
    let models: Vec<_> = transport.requests().into_iter().map(|(m, _)| m).collect();
    assert_eq!(models, ["gemini-1.5-flash", "gemini-1.5-pro", "gemini-1.0-pro"]);
    assert_eq!(quiz.progress().unwrap().total, 5);
}
