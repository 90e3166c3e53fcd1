use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::core::time::format_primitive;
use crate::db::models::Course;
use crate::db::types::CourseStatus;
use crate::repositories::enrollments::EnrolledStudentRow;

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct CourseCreate {
    #[validate(length(min = 1, max = 100, message = "name must be 1-100 characters"))]
    pub(crate) name: String,
    #[serde(default)]
    pub(crate) description: String,
    /// Admins may create a course on behalf of a teacher; teachers always own
    /// what they create.
    #[serde(default)]
    #[serde(alias = "teacherId")]
    pub(crate) teacher_id: Option<String>,
    #[serde(default)]
    #[serde(alias = "coverImage")]
    pub(crate) cover_image: Option<String>,
    #[serde(default)]
    #[serde(alias = "creditHours")]
    #[validate(range(min = 0, message = "credit_hours must be non-negative"))]
    pub(crate) credit_hours: i32,
    #[serde(default = "default_status")]
    pub(crate) status: CourseStatus,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct CourseUpdate {
    #[serde(default)]
    #[validate(length(min = 1, max = 100, message = "name must be 1-100 characters"))]
    pub(crate) name: Option<String>,
    #[serde(default)]
    pub(crate) description: Option<String>,
    #[serde(default)]
    #[serde(alias = "coverImage")]
    pub(crate) cover_image: Option<String>,
    #[serde(default)]
    #[serde(alias = "creditHours")]
    #[validate(range(min = 0, message = "credit_hours must be non-negative"))]
    pub(crate) credit_hours: Option<i32>,
    #[serde(default)]
    pub(crate) status: Option<CourseStatus>,
}

#[derive(Debug, Serialize)]
pub(crate) struct CourseResponse {
    pub(crate) id: String,
    pub(crate) name: String,
    pub(crate) description: String,
    pub(crate) teacher_id: String,
    pub(crate) cover_image: Option<String>,
    pub(crate) credit_hours: i32,
    pub(crate) status: CourseStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) student_count: Option<i64>,
    pub(crate) created_at: String,
    pub(crate) updated_at: String,
}

impl CourseResponse {
    pub(crate) fn from_db(course: Course) -> Self {
        Self {
            id: course.id,
            name: course.name,
            description: course.description,
            teacher_id: course.teacher_id,
            cover_image: course.cover_image,
            credit_hours: course.credit_hours,
            status: course.status,
            student_count: None,
            created_at: format_primitive(course.created_at),
            updated_at: format_primitive(course.updated_at),
        }
    }

    pub(crate) fn with_student_count(course: Course, student_count: i64) -> Self {
        Self { student_count: Some(student_count), ..Self::from_db(course) }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct EnrolledStudentResponse {
    pub(crate) id: String,
    pub(crate) username: String,
    pub(crate) email: String,
    pub(crate) real_name: String,
    pub(crate) enrolled_at: String,
}

impl EnrolledStudentResponse {
    pub(crate) fn from_row(row: EnrolledStudentRow) -> Self {
        Self {
            id: row.id,
            username: row.username,
            email: row.email,
            real_name: row.real_name,
            enrolled_at: format_primitive(row.enrolled_at),
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct StudentBulkAdd {
    #[serde(alias = "studentIds")]
    #[validate(length(min = 1, message = "student_ids must not be empty"))]
    pub(crate) student_ids: Vec<String>,
}

/// Per-student outcome of a bulk enrollment. Failures are reported alongside
/// successes instead of aborting the whole batch.
#[derive(Debug, Serialize)]
pub(crate) struct BulkAddOutcome {
    pub(crate) student_id: String,
    pub(crate) added: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) reason: Option<String>,
}

fn default_status() -> CourseStatus {
    CourseStatus::Active
}
