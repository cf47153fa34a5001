use chrono::{DateTime, Utc};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum EvaluationStatus {
    Pending,
    Completed,
}

impl Default for EvaluationStatus {
    fn default() -> Self {
        EvaluationStatus::Pending
    }
}

impl EvaluationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            EvaluationStatus::Pending => "pending",
            EvaluationStatus::Completed => "completed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Answer {
    #[serde(with = "bson::serde_helpers::uuid_1_as_binary")]
    pub question_id: Uuid,
    #[serde(default)]
    pub selected_value: Option<String>,
    #[serde(default)]
    pub is_correct: bool,
}

impl Answer {
    pub fn new(question_id: Uuid, is_correct: bool) -> Answer {
        Answer {
            question_id,
            selected_value: None,
            is_correct,
        }
    }
}

/// One student's answer set for one task attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    #[serde(
        default = "Uuid::new_v4",
        rename = "_id",
        with = "bson::serde_helpers::uuid_1_as_binary"
    )]
    pub id: Uuid,
    #[serde(with = "bson::serde_helpers::uuid_1_as_binary")]
    pub student_id: Uuid,
    #[serde(with = "bson::serde_helpers::uuid_1_as_binary")]
    pub task_id: Uuid,
    #[serde(with = "bson::serde_helpers::uuid_1_as_binary")]
    pub class_id: Uuid,
    #[serde(default, deserialize_with = "super::lenient::whole_number")]
    pub term: u32,
    #[serde(default, deserialize_with = "super::lenient::whole_number")]
    pub week: u32,
    #[serde(default)]
    pub answers: Vec<Answer>,
    /// Evaluated score, possibly with partial credit.
    #[serde(default, deserialize_with = "super::lenient::optional_number")]
    pub score: Option<f64>,
    #[serde(default)]
    pub evaluation_status: EvaluationStatus,
    #[serde(
        default = "Utc::now",
        with = "bson::serde_helpers::chrono_datetime_as_bson_datetime"
    )]
    pub created_at: DateTime<Utc>,
}

impl Submission {
    pub fn new(student_id: Uuid, task_id: Uuid, class_id: Uuid) -> Submission {
        Submission {
            id: Uuid::new_v4(),
            student_id,
            task_id,
            class_id,
            term: 0,
            week: 0,
            answers: vec![],
            score: None,
            evaluation_status: EvaluationStatus::Pending,
            created_at: Utc::now(),
        }
    }

    pub fn correct_count(&self) -> u32 {
        self.answers.iter().filter(|it| it.is_correct).count() as u32
    }

    /// Score this submission contributes to every aggregate: the stored
    /// score when evaluation set one, otherwise the number of correct answers.
    pub fn effective_score(&self) -> f64 {
        self.score
            .unwrap_or_else(|| f64::from(self.correct_count()))
    }

    pub fn is_pending(&self) -> bool {
        self.evaluation_status == EvaluationStatus::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_answers(correct: &[bool]) -> Submission {
        let mut submission = Submission::new(Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        submission.answers = correct
            .iter()
            .map(|it| Answer::new(Uuid::new_v4(), *it))
            .collect();
        submission
    }

    #[test]
    fn effective_score_counts_correct_answers() {
        let submission = with_answers(&[true, false, true, true]);
        assert_eq!(submission.effective_score(), 3.0);
    }

    #[test]
    fn stored_score_takes_precedence() {
        let mut submission = with_answers(&[true, false, true, true]);
        submission.score = Some(1.5);
        assert_eq!(submission.effective_score(), 1.5);
    }

    #[test]
    fn empty_submission_scores_zero() {
        assert_eq!(with_answers(&[]).effective_score(), 0.0);
    }

    #[test]
    fn bson_round_trip_keeps_status_and_ids() {
        let mut submission = with_answers(&[true]);
        submission.evaluation_status = EvaluationStatus::Completed;

        let document = bson::to_document(&submission).expect("serializable submission");
        assert_eq!(
            document.get_str("evaluationStatus").expect("status field"),
            "completed"
        );

        let decoded: Submission = bson::from_document(document).expect("deserializable");
        assert_eq!(decoded.id, submission.id);
        assert_eq!(decoded.student_id, submission.student_id);
        assert_eq!(decoded.evaluation_status, EvaluationStatus::Completed);
    }

    fn stored(fields: bson::Document) -> bson::Document {
        let submission = Submission::new(Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let mut document = bson::to_document(&submission).expect("serializable submission");
        for (key, value) in fields {
            document.insert(key, value);
        }
        document
    }

    #[test]
    fn double_and_fractional_scores_decode() {
        let whole: Submission =
            bson::from_document(stored(bson::doc! { "score": 4.0 })).expect("deserializable");
        assert_eq!(whole.score, Some(4.0));

        let partial: Submission =
            bson::from_document(stored(bson::doc! { "score": 2.5 })).expect("deserializable");
        assert_eq!(partial.effective_score(), 2.5);

        let integer: Submission =
            bson::from_document(stored(bson::doc! { "score": 3_i32 })).expect("deserializable");
        assert_eq!(integer.score, Some(3.0));
    }

    #[test]
    fn null_score_falls_back_to_answers() {
        let decoded: Submission =
            bson::from_document(stored(bson::doc! { "score": bson::Bson::Null }))
                .expect("deserializable");
        assert_eq!(decoded.score, None);
    }

    #[test]
    fn malformed_numbers_read_as_zero() {
        let decoded: Submission = bson::from_document(stored(bson::doc! {
            "score": "n/a",
            "term": -1_i32,
            "week": 7.0,
        }))
        .expect("deserializable");

        assert_eq!(decoded.score, Some(0.0));
        assert_eq!(decoded.term, 0);
        assert_eq!(decoded.week, 7);
    }

    #[test]
    fn missing_numbers_use_defaults() {
        let mut document = stored(bson::doc! {});
        document.remove("term");
        document.remove("week");
        document.remove("score");

        let decoded: Submission = bson::from_document(document).expect("deserializable");
        assert_eq!((decoded.term, decoded.week, decoded.score), (0, 0, None));
    }
}
