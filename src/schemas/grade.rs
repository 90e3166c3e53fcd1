use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::core::time::format_primitive;
use crate::db::types::RecordStatus;
use crate::repositories::exam_records::{GradeRow, GradeStatsRow};
use crate::services::grading::round2;

#[derive(Debug, Serialize)]
pub(crate) struct GradeResponse {
    pub(crate) id: String,
    pub(crate) exam_id: String,
    pub(crate) exam_title: String,
    pub(crate) course_id: String,
    pub(crate) student_id: String,
    pub(crate) username: String,
    pub(crate) real_name: String,
    pub(crate) status: RecordStatus,
    pub(crate) submit_time: Option<String>,
    pub(crate) score: Option<f64>,
    pub(crate) total_score: f64,
    pub(crate) pass_score: f64,
    pub(crate) passed: Option<bool>,
    pub(crate) comment: Option<String>,
}

impl GradeResponse {
    pub(crate) fn from_row(row: GradeRow) -> Self {
        let passed = row.score.map(|score| score >= row.pass_score);
        Self {
            id: row.id,
            exam_id: row.exam_id,
            exam_title: row.exam_title,
            course_id: row.course_id,
            student_id: row.student_id,
            username: row.username,
            real_name: row.real_name,
            status: row.status,
            submit_time: row.submit_time.map(format_primitive),
            score: row.score,
            total_score: row.total_score,
            pass_score: row.pass_score,
            passed,
            comment: row.comment,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct GradeUpdate {
    #[validate(range(min = 0.0, message = "score must be non-negative"))]
    pub(crate) score: f64,
    #[serde(default)]
    pub(crate) comment: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct GradeStatsResponse {
    pub(crate) total: i64,
    pub(crate) submitted: i64,
    pub(crate) graded: i64,
    pub(crate) average_score: Option<f64>,
    pub(crate) highest_score: Option<f64>,
    pub(crate) lowest_score: Option<f64>,
    pub(crate) passed: i64,
    pub(crate) pass_rate: Option<f64>,
}

impl GradeStatsResponse {
    pub(crate) fn from_row(row: GradeStatsRow) -> Self {
        let pass_rate = if row.submitted > 0 {
            Some(round2(row.passed as f64 / row.submitted as f64 * 100.0))
        } else {
            None
        };
        Self {
            total: row.total,
            submitted: row.submitted,
            graded: row.graded,
            average_score: row.average_score.map(round2),
            highest_score: row.highest_score,
            lowest_score: row.lowest_score,
            passed: row.passed,
            pass_rate,
        }
    }
}
