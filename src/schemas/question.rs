use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::core::time::format_primitive;
use crate::db::models::Question;
use crate::db::types::QuestionType;

#[derive(Debug, Serialize, Deserialize, Validate)]
pub(crate) struct QuestionCreate {
    #[validate(length(min = 1, max = 200, message = "title must be 1-200 characters"))]
    pub(crate) title: String,
    #[validate(length(min = 1, message = "content must not be empty"))]
    pub(crate) content: String,
    #[serde(alias = "type", alias = "questionType")]
    pub(crate) question_type: QuestionType,
    #[serde(default)]
    pub(crate) options: Vec<String>,
    #[serde(alias = "correctAnswer")]
    pub(crate) correct_answer: serde_json::Value,
    #[serde(default)]
    pub(crate) explanation: Option<String>,
    #[serde(default = "default_difficulty")]
    #[validate(range(min = 1, max = 3, message = "difficulty must be between 1 and 3"))]
    pub(crate) difficulty: i32,
    #[serde(default = "default_category")]
    pub(crate) category: String,
    #[serde(default)]
    pub(crate) tags: Vec<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct QuestionUpdate {
    #[serde(default)]
    #[validate(length(min = 1, max = 200, message = "title must be 1-200 characters"))]
    pub(crate) title: Option<String>,
    #[serde(default)]
    pub(crate) content: Option<String>,
    #[serde(default)]
    #[serde(alias = "type", alias = "questionType")]
    pub(crate) question_type: Option<QuestionType>,
    #[serde(default)]
    pub(crate) options: Option<Vec<String>>,
    #[serde(default)]
    #[serde(alias = "correctAnswer")]
    pub(crate) correct_answer: Option<serde_json::Value>,
    #[serde(default)]
    pub(crate) explanation: Option<String>,
    #[serde(default)]
    #[validate(range(min = 1, max = 3, message = "difficulty must be between 1 and 3"))]
    pub(crate) difficulty: Option<i32>,
    #[serde(default)]
    pub(crate) category: Option<String>,
    #[serde(default)]
    pub(crate) tags: Option<Vec<String>>,
}

/// Full question view, including the answer key. Only teachers and admins can
/// reach the endpoints that serialize this.
#[derive(Debug, Serialize)]
pub(crate) struct QuestionResponse {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) content: String,
    pub(crate) question_type: QuestionType,
    pub(crate) options: Vec<String>,
    pub(crate) correct_answer: serde_json::Value,
    pub(crate) explanation: Option<String>,
    pub(crate) difficulty: i32,
    pub(crate) category: String,
    pub(crate) tags: Vec<String>,
    pub(crate) creator_id: String,
    pub(crate) created_at: String,
    pub(crate) updated_at: String,
}

impl QuestionResponse {
    pub(crate) fn from_db(question: Question) -> Self {
        Self {
            id: question.id,
            title: question.title,
            content: question.content,
            question_type: question.question_type,
            options: question.options.0,
            correct_answer: question.correct_answer.0,
            explanation: question.explanation,
            difficulty: question.difficulty,
            category: question.category,
            tags: question.tags.0,
            creator_id: question.creator_id,
            created_at: format_primitive(question.created_at),
            updated_at: format_primitive(question.updated_at),
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct QuestionImport {
    #[validate(length(min = 1, message = "questions must not be empty"))]
    #[validate(nested)]
    pub(crate) questions: Vec<QuestionCreate>,
}

/// Per-item outcome of a bulk import. Position refers to the input array.
#[derive(Debug, Serialize)]
pub(crate) struct ImportOutcome {
    pub(crate) index: usize,
    pub(crate) imported: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) reason: Option<String>,
}

fn default_difficulty() -> i32 {
    1
}

fn default_category() -> String {
    "general".to_string()
}
