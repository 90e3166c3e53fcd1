use sqlx::types::Json;
use sqlx::{PgExecutor, PgPool, Postgres, QueryBuilder};
use time::PrimitiveDateTime;

use crate::db::models::Exam;
use crate::db::types::{ExamStatus, QuestionType};
use crate::repositories::{sort_column, SortDir};

const COLUMNS: &str = "\
    id, title, description, course_id, creator_id, start_time, end_time, \
    duration_minutes, total_score, pass_score, status, settings, created_at, updated_at";

const SORTABLE: &[&str] = &["created_at", "updated_at", "start_time", "end_time", "title"];

/// Question joined with its per-exam score and position. `correct_answer` is
/// only exposed to the grader; student-facing responses are built without it.
#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct ExamQuestionRow {
    pub(crate) question_id: String,
    pub(crate) title: String,
    pub(crate) content: String,
    pub(crate) question_type: QuestionType,
    pub(crate) options: Json<Vec<String>>,
    pub(crate) correct_answer: Json<serde_json::Value>,
    pub(crate) explanation: Option<String>,
    pub(crate) difficulty: i32,
    pub(crate) category: String,
    pub(crate) score: f64,
    pub(crate) order_num: i32,
}

#[derive(Debug, Default)]
pub(crate) struct ExamFilter {
    pub(crate) course_id: Option<String>,
    pub(crate) creator_id: Option<String>,
    pub(crate) status: Option<ExamStatus>,
    /// Hides unpublished exams from students.
    pub(crate) exclude_draft: bool,
    pub(crate) search: Option<String>,
}

pub(crate) async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<Exam>, sqlx::Error> {
    sqlx::query_as::<_, Exam>(&format!("SELECT {COLUMNS} FROM exams WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, filter: &ExamFilter) {
    let mut prefix = " WHERE ";

    if let Some(course_id) = &filter.course_id {
        builder.push(prefix).push("course_id = ").push_bind(course_id.clone());
        prefix = " AND ";
    }
    if let Some(creator_id) = &filter.creator_id {
        builder.push(prefix).push("creator_id = ").push_bind(creator_id.clone());
        prefix = " AND ";
    }
    if let Some(status) = filter.status {
        builder.push(prefix).push("status = ").push_bind(status);
        prefix = " AND ";
    }
    if filter.exclude_draft {
        builder.push(prefix).push("status <> 'draft'");
        prefix = " AND ";
    }
    if let Some(search) = &filter.search {
        let pattern = format!("%{search}%");
        builder
            .push(prefix)
            .push("(title ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR description ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

pub(crate) async fn list(
    pool: &PgPool,
    filter: &ExamFilter,
    skip: i64,
    limit: i64,
    sort: Option<&str>,
    dir: SortDir,
) -> Result<Vec<Exam>, sqlx::Error> {
    let mut builder = QueryBuilder::<Postgres>::new(format!("SELECT {COLUMNS} FROM exams"));
    push_filters(&mut builder, filter);

    builder.push(format!(
        " ORDER BY {} {}",
        sort_column(sort, SORTABLE, "created_at"),
        dir.as_sql()
    ));
    builder.push(" OFFSET ").push_bind(skip.max(0));
    builder.push(" LIMIT ").push_bind(limit.clamp(1, 100));

    builder.build_query_as::<Exam>().fetch_all(pool).await
}

pub(crate) async fn count(pool: &PgPool, filter: &ExamFilter) -> Result<i64, sqlx::Error> {
    let mut builder = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM exams");
    push_filters(&mut builder, filter);
    builder.build_query_scalar::<i64>().fetch_one(pool).await
}

pub(crate) struct CreateExam<'a> {
    pub(crate) id: &'a str,
    pub(crate) title: &'a str,
    pub(crate) description: Option<&'a str>,
    pub(crate) course_id: &'a str,
    pub(crate) creator_id: &'a str,
    pub(crate) start_time: PrimitiveDateTime,
    pub(crate) end_time: PrimitiveDateTime,
    pub(crate) duration_minutes: i32,
    pub(crate) total_score: f64,
    pub(crate) pass_score: f64,
    pub(crate) status: ExamStatus,
    pub(crate) settings: serde_json::Value,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

pub(crate) async fn create(
    executor: impl PgExecutor<'_>,
    params: CreateExam<'_>,
) -> Result<Exam, sqlx::Error> {
    sqlx::query_as::<_, Exam>(&format!(
        "INSERT INTO exams (
            id, title, description, course_id, creator_id, start_time, end_time,
            duration_minutes, total_score, pass_score, status, settings, created_at, updated_at
         ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14)
         RETURNING {COLUMNS}",
    ))
    .bind(params.id)
    .bind(params.title)
    .bind(params.description)
    .bind(params.course_id)
    .bind(params.creator_id)
    .bind(params.start_time)
    .bind(params.end_time)
    .bind(params.duration_minutes)
    .bind(params.total_score)
    .bind(params.pass_score)
    .bind(params.status)
    .bind(Json(params.settings))
    .bind(params.created_at)
    .bind(params.updated_at)
    .fetch_one(executor)
    .await
}

pub(crate) struct UpdateExam {
    pub(crate) title: Option<String>,
    pub(crate) description: Option<String>,
    pub(crate) start_time: Option<PrimitiveDateTime>,
    pub(crate) end_time: Option<PrimitiveDateTime>,
    pub(crate) duration_minutes: Option<i32>,
    pub(crate) total_score: Option<f64>,
    pub(crate) pass_score: Option<f64>,
    pub(crate) status: Option<ExamStatus>,
    pub(crate) settings: Option<serde_json::Value>,
    pub(crate) updated_at: PrimitiveDateTime,
}

pub(crate) async fn update(
    executor: impl PgExecutor<'_>,
    id: &str,
    params: UpdateExam,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE exams SET
            title = COALESCE($1, title),
            description = COALESCE($2, description),
            start_time = COALESCE($3, start_time),
            end_time = COALESCE($4, end_time),
            duration_minutes = COALESCE($5, duration_minutes),
            total_score = COALESCE($6, total_score),
            pass_score = COALESCE($7, pass_score),
            status = COALESCE($8, status),
            settings = COALESCE($9, settings),
            updated_at = $10
         WHERE id = $11",
    )
    .bind(params.title)
    .bind(params.description)
    .bind(params.start_time)
    .bind(params.end_time)
    .bind(params.duration_minutes)
    .bind(params.total_score)
    .bind(params.pass_score)
    .bind(params.status)
    .bind(params.settings.map(Json))
    .bind(params.updated_at)
    .bind(id)
    .execute(executor)
    .await?;
    Ok(())
}

pub(crate) async fn delete_by_id(pool: &PgPool, id: &str) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM exams WHERE id = $1").bind(id).execute(pool).await?;
    Ok(())
}

pub(crate) async fn insert_question(
    executor: impl PgExecutor<'_>,
    id: &str,
    exam_id: &str,
    question_id: &str,
    score: f64,
    order_num: i32,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO exam_questions (id, exam_id, question_id, score, order_num)
         VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(id)
    .bind(exam_id)
    .bind(question_id)
    .bind(score)
    .bind(order_num)
    .execute(executor)
    .await?;
    Ok(())
}

pub(crate) async fn clear_questions(
    executor: impl PgExecutor<'_>,
    exam_id: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM exam_questions WHERE exam_id = $1")
        .bind(exam_id)
        .execute(executor)
        .await?;
    Ok(())
}

pub(crate) async fn list_questions(
    pool: &PgPool,
    exam_id: &str,
) -> Result<Vec<ExamQuestionRow>, sqlx::Error> {
    sqlx::query_as::<_, ExamQuestionRow>(
        "SELECT q.id AS question_id, q.title, q.content, q.question_type, q.options,
                q.correct_answer, q.explanation, q.difficulty, q.category,
                eq.score, eq.order_num
         FROM exam_questions eq
         JOIN questions q ON q.id = eq.question_id
         WHERE eq.exam_id = $1
         ORDER BY eq.order_num ASC",
    )
    .bind(exam_id)
    .fetch_all(pool)
    .await
}

pub(crate) async fn count_questions(pool: &PgPool, exam_id: &str) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM exam_questions WHERE exam_id = $1")
        .bind(exam_id)
        .fetch_one(pool)
        .await
}

pub(crate) async fn count_participants(pool: &PgPool, exam_id: &str) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(DISTINCT student_id) FROM exam_records WHERE exam_id = $1")
        .bind(exam_id)
        .fetch_one(pool)
        .await
}
