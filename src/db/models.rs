use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use time::PrimitiveDateTime;

use crate::db::types::{
    CourseStatus, ExamStatus, QuestionType, RecordStatus, UserRole, UserStatus,
};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct User {
    pub(crate) id: String,
    pub(crate) username: String,
    pub(crate) email: String,
    pub(crate) hashed_password: String,
    pub(crate) real_name: String,
    pub(crate) role: UserRole,
    pub(crate) status: UserStatus,
    pub(crate) phone: Option<String>,
    pub(crate) avatar: Option<String>,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Course {
    pub(crate) id: String,
    pub(crate) name: String,
    pub(crate) description: String,
    pub(crate) teacher_id: String,
    pub(crate) cover_image: Option<String>,
    pub(crate) credit_hours: i32,
    pub(crate) status: CourseStatus,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Question {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) content: String,
    pub(crate) question_type: QuestionType,
    pub(crate) options: Json<Vec<String>>,
    pub(crate) correct_answer: Json<serde_json::Value>,
    pub(crate) explanation: Option<String>,
    pub(crate) difficulty: i32,
    pub(crate) category: String,
    pub(crate) tags: Json<Vec<String>>,
    pub(crate) creator_id: String,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Exam {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) description: Option<String>,
    pub(crate) course_id: String,
    pub(crate) creator_id: String,
    pub(crate) start_time: PrimitiveDateTime,
    pub(crate) end_time: PrimitiveDateTime,
    pub(crate) duration_minutes: i32,
    pub(crate) total_score: f64,
    pub(crate) pass_score: f64,
    pub(crate) status: ExamStatus,
    pub(crate) settings: Json<serde_json::Value>,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

/// One (question, score, order) attachment owned by an exam.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct ExamQuestion {
    pub(crate) id: String,
    pub(crate) exam_id: String,
    pub(crate) question_id: String,
    pub(crate) score: f64,
    pub(crate) order_num: i32,
}

/// A single submitted answer, stored inside `exam_records.answers`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct AnswerEntry {
    pub(crate) question_id: String,
    pub(crate) answer: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct ExamRecord {
    pub(crate) id: String,
    pub(crate) exam_id: String,
    pub(crate) student_id: String,
    pub(crate) start_time: Option<PrimitiveDateTime>,
    pub(crate) submit_time: Option<PrimitiveDateTime>,
    pub(crate) score: Option<f64>,
    pub(crate) status: RecordStatus,
    pub(crate) answers: Json<Vec<AnswerEntry>>,
    pub(crate) comment: Option<String>,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}
