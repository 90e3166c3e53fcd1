use serde::de::Error as _;
use serde::{Deserialize, Serialize};
use time::{
    format_description::well_known::Rfc3339, macros::format_description, OffsetDateTime,
    PrimitiveDateTime,
};
use validator::Validate;

use crate::core::time::format_primitive;
use crate::db::models::{Exam, ExamRecord};
use crate::db::types::{ExamStatus, RecordStatus};
use crate::repositories::exams::ExamQuestionRow;

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct ExamCreate {
    #[validate(length(min = 1, max = 200, message = "title must be 1-200 characters"))]
    pub(crate) title: String,
    #[serde(default)]
    pub(crate) description: Option<String>,
    #[serde(alias = "courseId")]
    pub(crate) course_id: String,
    #[serde(alias = "startTime", deserialize_with = "deserialize_offset_datetime_flexible")]
    pub(crate) start_time: OffsetDateTime,
    #[serde(alias = "endTime", deserialize_with = "deserialize_offset_datetime_flexible")]
    pub(crate) end_time: OffsetDateTime,
    #[serde(alias = "durationMinutes")]
    #[validate(range(min = 1, message = "duration_minutes must be positive"))]
    pub(crate) duration_minutes: i32,
    #[serde(default = "default_total_score")]
    #[serde(alias = "totalScore")]
    #[validate(range(exclusive_min = 0.0, message = "total_score must be positive"))]
    pub(crate) total_score: f64,
    #[serde(default = "default_pass_score")]
    #[serde(alias = "passScore")]
    #[validate(range(min = 0.0, message = "pass_score must be non-negative"))]
    pub(crate) pass_score: f64,
    #[serde(default = "default_exam_status")]
    pub(crate) status: ExamStatus,
    #[serde(default = "default_settings")]
    pub(crate) settings: serde_json::Value,
    #[serde(default)]
    #[serde(alias = "questionIds")]
    pub(crate) question_ids: Vec<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct ExamUpdate {
    #[serde(default)]
    #[validate(length(min = 1, max = 200, message = "title must be 1-200 characters"))]
    pub(crate) title: Option<String>,
    #[serde(default)]
    pub(crate) description: Option<String>,
    #[serde(default)]
    #[serde(alias = "startTime", deserialize_with = "deserialize_option_offset_datetime_flexible")]
    pub(crate) start_time: Option<OffsetDateTime>,
    #[serde(default)]
    #[serde(alias = "endTime", deserialize_with = "deserialize_option_offset_datetime_flexible")]
    pub(crate) end_time: Option<OffsetDateTime>,
    #[serde(default)]
    #[serde(alias = "durationMinutes")]
    #[validate(range(min = 1, message = "duration_minutes must be positive"))]
    pub(crate) duration_minutes: Option<i32>,
    #[serde(default)]
    #[serde(alias = "totalScore")]
    #[validate(range(exclusive_min = 0.0, message = "total_score must be positive"))]
    pub(crate) total_score: Option<f64>,
    #[serde(default)]
    #[serde(alias = "passScore")]
    #[validate(range(min = 0.0, message = "pass_score must be non-negative"))]
    pub(crate) pass_score: Option<f64>,
    #[serde(default)]
    pub(crate) status: Option<ExamStatus>,
    #[serde(default)]
    pub(crate) settings: Option<serde_json::Value>,
    #[serde(default)]
    #[serde(alias = "questionIds")]
    pub(crate) question_ids: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ExamResponse {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) description: Option<String>,
    pub(crate) course_id: String,
    pub(crate) creator_id: String,
    pub(crate) start_time: String,
    pub(crate) end_time: String,
    pub(crate) duration_minutes: i32,
    pub(crate) total_score: f64,
    pub(crate) pass_score: f64,
    pub(crate) status: ExamStatus,
    pub(crate) settings: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) question_count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) participant_count: Option<i64>,
    pub(crate) created_at: String,
    pub(crate) updated_at: String,
}

impl ExamResponse {
    pub(crate) fn from_db(exam: Exam) -> Self {
        Self {
            id: exam.id,
            title: exam.title,
            description: exam.description,
            course_id: exam.course_id,
            creator_id: exam.creator_id,
            start_time: format_primitive(exam.start_time),
            end_time: format_primitive(exam.end_time),
            duration_minutes: exam.duration_minutes,
            total_score: exam.total_score,
            pass_score: exam.pass_score,
            status: exam.status,
            settings: exam.settings.0,
            question_count: None,
            participant_count: None,
            created_at: format_primitive(exam.created_at),
            updated_at: format_primitive(exam.updated_at),
        }
    }

    pub(crate) fn with_counts(exam: Exam, question_count: i64, participant_count: i64) -> Self {
        Self {
            question_count: Some(question_count),
            participant_count: Some(participant_count),
            ..Self::from_db(exam)
        }
    }
}

/// A question as seen by a student taking the exam. The answer key and
/// explanation are stripped.
#[derive(Debug, Serialize)]
pub(crate) struct ExamPaperQuestion {
    pub(crate) question_id: String,
    pub(crate) title: String,
    pub(crate) content: String,
    pub(crate) question_type: crate::db::types::QuestionType,
    pub(crate) options: Vec<String>,
    pub(crate) score: f64,
    pub(crate) order_num: i32,
}

impl ExamPaperQuestion {
    pub(crate) fn from_row(row: ExamQuestionRow) -> Self {
        Self {
            question_id: row.question_id,
            title: row.title,
            content: row.content,
            question_type: row.question_type,
            options: row.options.0,
            score: row.score,
            order_num: row.order_num,
        }
    }
}

/// A question as seen by the exam's owner, answer key included.
#[derive(Debug, Serialize)]
pub(crate) struct ExamQuestionDetail {
    pub(crate) question_id: String,
    pub(crate) title: String,
    pub(crate) content: String,
    pub(crate) question_type: crate::db::types::QuestionType,
    pub(crate) options: Vec<String>,
    pub(crate) correct_answer: serde_json::Value,
    pub(crate) explanation: Option<String>,
    pub(crate) difficulty: i32,
    pub(crate) category: String,
    pub(crate) score: f64,
    pub(crate) order_num: i32,
}

impl ExamQuestionDetail {
    pub(crate) fn from_row(row: ExamQuestionRow) -> Self {
        Self {
            question_id: row.question_id,
            title: row.title,
            content: row.content,
            question_type: row.question_type,
            options: row.options.0,
            correct_answer: row.correct_answer.0,
            explanation: row.explanation,
            difficulty: row.difficulty,
            category: row.category,
            score: row.score,
            order_num: row.order_num,
        }
    }
}

/// Record joined with the owning student, for the grader's record listing.
#[derive(Debug, Serialize)]
pub(crate) struct RecordWithStudentResponse {
    pub(crate) id: String,
    pub(crate) exam_id: String,
    pub(crate) student_id: String,
    pub(crate) username: String,
    pub(crate) real_name: String,
    pub(crate) status: RecordStatus,
    pub(crate) start_time: Option<String>,
    pub(crate) submit_time: Option<String>,
    pub(crate) score: Option<f64>,
    pub(crate) comment: Option<String>,
}

impl RecordWithStudentResponse {
    pub(crate) fn from_row(row: crate::repositories::exam_records::RecordWithStudentRow) -> Self {
        Self {
            id: row.id,
            exam_id: row.exam_id,
            student_id: row.student_id,
            username: row.username,
            real_name: row.real_name,
            status: row.status,
            start_time: row.start_time.map(format_primitive),
            submit_time: row.submit_time.map(format_primitive),
            score: row.score,
            comment: row.comment,
        }
    }
}

/// Returned when a student starts (or resumes) an exam. `server_time` lets
/// the client reconcile its countdown with the server clock.
#[derive(Debug, Serialize)]
pub(crate) struct StartExamResponse {
    pub(crate) record: ExamRecordResponse,
    pub(crate) questions: Vec<ExamPaperQuestion>,
    pub(crate) start_time: String,
    pub(crate) end_time: String,
    pub(crate) duration_minutes: i32,
    pub(crate) server_time: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct SubmitResultResponse {
    pub(crate) score: f64,
    pub(crate) total_score: f64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AnswerPayload {
    #[serde(alias = "questionId")]
    pub(crate) question_id: String,
    pub(crate) answer: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SubmitRequest {
    pub(crate) answers: Vec<AnswerPayload>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ExamRecordResponse {
    pub(crate) id: String,
    pub(crate) exam_id: String,
    pub(crate) student_id: String,
    pub(crate) status: RecordStatus,
    pub(crate) start_time: Option<String>,
    pub(crate) submit_time: Option<String>,
    pub(crate) score: Option<f64>,
    pub(crate) comment: Option<String>,
}

impl ExamRecordResponse {
    pub(crate) fn from_db(record: ExamRecord) -> Self {
        Self {
            id: record.id,
            exam_id: record.exam_id,
            student_id: record.student_id,
            status: record.status,
            start_time: record.start_time.map(format_primitive),
            submit_time: record.submit_time.map(format_primitive),
            score: record.score,
            comment: record.comment,
        }
    }
}

fn parse_offset_datetime_flexible(raw: &str) -> Option<OffsetDateTime> {
    if let Ok(value) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Some(value);
    }

    // datetime-local inputs often arrive without a timezone.
    if let Ok(value) =
        PrimitiveDateTime::parse(raw, &format_description!("[year]-[month]-[day]T[hour]:[minute]"))
    {
        return Some(value.assume_utc());
    }
    if let Ok(value) = PrimitiveDateTime::parse(
        raw,
        &format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
    ) {
        return Some(value.assume_utc());
    }

    None
}

fn deserialize_offset_datetime_flexible<'de, D>(deserializer: D) -> Result<OffsetDateTime, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_offset_datetime_flexible(&raw)
        .ok_or_else(|| D::Error::custom(format!("invalid datetime: {raw}")))
}

fn deserialize_option_offset_datetime_flexible<'de, D>(
    deserializer: D,
) -> Result<Option<OffsetDateTime>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    match raw {
        Some(value) => parse_offset_datetime_flexible(&value)
            .ok_or_else(|| D::Error::custom(format!("invalid datetime: {value}")))
            .map(Some),
        None => Ok(None),
    }
}

fn default_total_score() -> f64 {
    100.0
}

fn default_pass_score() -> f64 {
    60.0
}

fn default_exam_status() -> ExamStatus {
    ExamStatus::Draft
}

fn default_settings() -> serde_json::Value {
    serde_json::json!({})
}
