use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder};
use time::PrimitiveDateTime;

use crate::db::models::{AnswerEntry, ExamRecord};
use crate::db::types::RecordStatus;
use crate::repositories::{sort_column, SortDir};

const COLUMNS: &str = "\
    id, exam_id, student_id, status, start_time, submit_time, score, answers, \
    comment, created_at, updated_at";

const GRADE_SORTABLE: &[&str] = &["created_at", "submit_time", "score"];

/// Record joined with the student who owns it.
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct RecordWithStudentRow {
    pub(crate) id: String,
    pub(crate) exam_id: String,
    pub(crate) student_id: String,
    pub(crate) username: String,
    pub(crate) real_name: String,
    pub(crate) status: RecordStatus,
    pub(crate) start_time: Option<PrimitiveDateTime>,
    pub(crate) submit_time: Option<PrimitiveDateTime>,
    pub(crate) score: Option<f64>,
    pub(crate) comment: Option<String>,
}

/// Record joined with student and exam context for grade listings.
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct GradeRow {
    pub(crate) id: String,
    pub(crate) exam_id: String,
    pub(crate) exam_title: String,
    pub(crate) course_id: String,
    pub(crate) student_id: String,
    pub(crate) username: String,
    pub(crate) real_name: String,
    pub(crate) status: RecordStatus,
    pub(crate) submit_time: Option<PrimitiveDateTime>,
    pub(crate) score: Option<f64>,
    pub(crate) total_score: f64,
    pub(crate) pass_score: f64,
    pub(crate) comment: Option<String>,
}

#[derive(Debug, Default)]
pub(crate) struct GradeFilter {
    pub(crate) course_id: Option<String>,
    pub(crate) exam_id: Option<String>,
    pub(crate) student_id: Option<String>,
    /// Scopes teachers to grades of exams they created.
    pub(crate) creator_id: Option<String>,
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct GradeStatsRow {
    pub(crate) total: i64,
    pub(crate) submitted: i64,
    pub(crate) graded: i64,
    pub(crate) average_score: Option<f64>,
    pub(crate) highest_score: Option<f64>,
    pub(crate) lowest_score: Option<f64>,
    pub(crate) passed: i64,
}

pub(crate) async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<ExamRecord>, sqlx::Error> {
    sqlx::query_as::<_, ExamRecord>(&format!("SELECT {COLUMNS} FROM exam_records WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub(crate) async fn find_for_student(
    pool: &PgPool,
    exam_id: &str,
    student_id: &str,
) -> Result<Option<ExamRecord>, sqlx::Error> {
    sqlx::query_as::<_, ExamRecord>(&format!(
        "SELECT {COLUMNS} FROM exam_records WHERE exam_id = $1 AND student_id = $2"
    ))
    .bind(exam_id)
    .bind(student_id)
    .fetch_optional(pool)
    .await
}

/// Opens a record for the student, or re-opens the existing one. The original
/// start time is preserved across repeated calls so re-entering an exam does
/// not reset the clock.
pub(crate) async fn start(
    pool: &PgPool,
    id: &str,
    exam_id: &str,
    student_id: &str,
    now: PrimitiveDateTime,
) -> Result<ExamRecord, sqlx::Error> {
    sqlx::query_as::<_, ExamRecord>(&format!(
        "INSERT INTO exam_records (
            id, exam_id, student_id, status, start_time, answers, created_at, updated_at
         ) VALUES ($1, $2, $3, 'in_progress', $4, '[]'::jsonb, $4, $4)
         ON CONFLICT (exam_id, student_id) DO UPDATE SET
            start_time = COALESCE(exam_records.start_time, EXCLUDED.start_time),
            status = 'in_progress',
            updated_at = EXCLUDED.updated_at
         WHERE exam_records.status IN ('not_started', 'in_progress')
         RETURNING {COLUMNS}",
    ))
    .bind(id)
    .bind(exam_id)
    .bind(student_id)
    .bind(now)
    .fetch_one(pool)
    .await
}

/// Stores the answers and auto-graded score, gated on the record still being
/// open. Returns the number of rows updated; zero means the record was already
/// submitted (or never started) and the caller must reject the attempt.
pub(crate) async fn submit(
    pool: &PgPool,
    exam_id: &str,
    student_id: &str,
    answers: &[AnswerEntry],
    score: f64,
    now: PrimitiveDateTime,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE exam_records SET
            answers = $1,
            score = $2,
            status = 'submitted',
            submit_time = $3,
            updated_at = $3
         WHERE exam_id = $4 AND student_id = $5 AND status = 'in_progress'",
    )
    .bind(Json(answers))
    .bind(score)
    .bind(now)
    .bind(exam_id)
    .bind(student_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

pub(crate) async fn list_by_exam(
    pool: &PgPool,
    exam_id: &str,
    skip: i64,
    limit: i64,
) -> Result<Vec<RecordWithStudentRow>, sqlx::Error> {
    sqlx::query_as::<_, RecordWithStudentRow>(
        "SELECT r.id, r.exam_id, r.student_id, u.username, u.real_name, r.status,
                r.start_time, r.submit_time, r.score, r.comment
         FROM exam_records r
         JOIN users u ON u.id = r.student_id
         WHERE r.exam_id = $1
         ORDER BY r.created_at DESC
         OFFSET $2 LIMIT $3",
    )
    .bind(exam_id)
    .bind(skip.max(0))
    .bind(limit.clamp(1, 100))
    .fetch_all(pool)
    .await
}

pub(crate) async fn count_by_exam(pool: &PgPool, exam_id: &str) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM exam_records WHERE exam_id = $1")
        .bind(exam_id)
        .fetch_one(pool)
        .await
}

const GRADE_SELECT: &str = "\
    SELECT r.id, r.exam_id, e.title AS exam_title, e.course_id, r.student_id,
           u.username, u.real_name, r.status, r.submit_time, r.score,
           e.total_score, e.pass_score, r.comment
    FROM exam_records r
    JOIN exams e ON e.id = r.exam_id
    JOIN users u ON u.id = r.student_id";

fn push_grade_filters(builder: &mut QueryBuilder<'_, Postgres>, filter: &GradeFilter) {
    let mut prefix = " WHERE ";

    if let Some(course_id) = &filter.course_id {
        builder.push(prefix).push("e.course_id = ").push_bind(course_id.clone());
        prefix = " AND ";
    }
    if let Some(exam_id) = &filter.exam_id {
        builder.push(prefix).push("r.exam_id = ").push_bind(exam_id.clone());
        prefix = " AND ";
    }
    if let Some(student_id) = &filter.student_id {
        builder.push(prefix).push("r.student_id = ").push_bind(student_id.clone());
        prefix = " AND ";
    }
    if let Some(creator_id) = &filter.creator_id {
        builder.push(prefix).push("e.creator_id = ").push_bind(creator_id.clone());
    }
}

pub(crate) async fn list_grades(
    pool: &PgPool,
    filter: &GradeFilter,
    skip: i64,
    limit: i64,
    sort: Option<&str>,
    dir: SortDir,
) -> Result<Vec<GradeRow>, sqlx::Error> {
    let mut builder = QueryBuilder::<Postgres>::new(GRADE_SELECT);
    push_grade_filters(&mut builder, filter);

    builder.push(format!(
        " ORDER BY r.{} {}",
        sort_column(sort, GRADE_SORTABLE, "created_at"),
        dir.as_sql()
    ));
    builder.push(" OFFSET ").push_bind(skip.max(0));
    builder.push(" LIMIT ").push_bind(limit.clamp(1, 100));

    builder.build_query_as::<GradeRow>().fetch_all(pool).await
}

pub(crate) async fn count_grades(
    pool: &PgPool,
    filter: &GradeFilter,
) -> Result<i64, sqlx::Error> {
    let mut builder = QueryBuilder::<Postgres>::new(
        "SELECT COUNT(*) FROM exam_records r JOIN exams e ON e.id = r.exam_id",
    );
    push_grade_filters(&mut builder, filter);
    builder.build_query_scalar::<i64>().fetch_one(pool).await
}

/// Unpaginated export, newest first.
pub(crate) async fn list_all_grades(
    pool: &PgPool,
    filter: &GradeFilter,
) -> Result<Vec<GradeRow>, sqlx::Error> {
    let mut builder = QueryBuilder::<Postgres>::new(GRADE_SELECT);
    push_grade_filters(&mut builder, filter);
    builder.push(" ORDER BY r.created_at DESC");
    builder.build_query_as::<GradeRow>().fetch_all(pool).await
}

pub(crate) async fn update_grade(
    pool: &PgPool,
    id: &str,
    score: f64,
    comment: Option<&str>,
    now: PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE exam_records SET
            score = $1,
            comment = COALESCE($2, comment),
            status = 'graded',
            updated_at = $3
         WHERE id = $4",
    )
    .bind(score)
    .bind(comment)
    .bind(now)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

pub(crate) async fn grade_stats(
    pool: &PgPool,
    filter: &GradeFilter,
) -> Result<GradeStatsRow, sqlx::Error> {
    let mut builder = QueryBuilder::<Postgres>::new(
        "SELECT COUNT(*) AS total,
                COUNT(*) FILTER (WHERE r.status IN ('submitted', 'graded')) AS submitted,
                COUNT(*) FILTER (WHERE r.status = 'graded') AS graded,
                AVG(r.score) AS average_score,
                MAX(r.score) AS highest_score,
                MIN(r.score) AS lowest_score,
                COUNT(*) FILTER (WHERE r.score >= e.pass_score) AS passed
         FROM exam_records r
         JOIN exams e ON e.id = r.exam_id",
    );
    push_grade_filters(&mut builder, filter);
    builder.build_query_as::<GradeStatsRow>().fetch_one(pool).await
}
