use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::db::models::Question;
use crate::db::types::QuestionType;
use crate::repositories::{sort_column, SortDir};

const COLUMNS: &str = "\
    id, title, content, question_type, options, correct_answer, explanation, \
    difficulty, category, tags, creator_id, created_at, updated_at";

const SORTABLE: &[&str] = &["created_at", "updated_at", "title", "difficulty", "category"];

#[derive(Debug, Default)]
pub(crate) struct QuestionFilter {
    pub(crate) question_type: Option<QuestionType>,
    pub(crate) category: Option<String>,
    pub(crate) difficulty: Option<i32>,
    pub(crate) creator_id: Option<String>,
    pub(crate) search: Option<String>,
}

pub(crate) async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<Question>, sqlx::Error> {
    sqlx::query_as::<_, Question>(&format!("SELECT {COLUMNS} FROM questions WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, filter: &QuestionFilter) {
    let mut prefix = " WHERE ";

    if let Some(question_type) = filter.question_type {
        builder.push(prefix).push("question_type = ").push_bind(question_type);
        prefix = " AND ";
    }
    if let Some(category) = &filter.category {
        builder.push(prefix).push("category = ").push_bind(category.clone());
        prefix = " AND ";
    }
    if let Some(difficulty) = filter.difficulty {
        builder.push(prefix).push("difficulty = ").push_bind(difficulty);
        prefix = " AND ";
    }
    if let Some(creator_id) = &filter.creator_id {
        builder.push(prefix).push("creator_id = ").push_bind(creator_id.clone());
        prefix = " AND ";
    }
    if let Some(search) = &filter.search {
        let pattern = format!("%{search}%");
        builder
            .push(prefix)
            .push("(title ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR content ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

pub(crate) async fn list(
    pool: &PgPool,
    filter: &QuestionFilter,
    skip: i64,
    limit: i64,
    sort: Option<&str>,
    dir: SortDir,
) -> Result<Vec<Question>, sqlx::Error> {
    let mut builder = QueryBuilder::<Postgres>::new(format!("SELECT {COLUMNS} FROM questions"));
    push_filters(&mut builder, filter);

    builder.push(format!(
        " ORDER BY {} {}",
        sort_column(sort, SORTABLE, "created_at"),
        dir.as_sql()
    ));
    builder.push(" OFFSET ").push_bind(skip.max(0));
    builder.push(" LIMIT ").push_bind(limit.clamp(1, 100));

    builder.build_query_as::<Question>().fetch_all(pool).await
}

pub(crate) async fn count(pool: &PgPool, filter: &QuestionFilter) -> Result<i64, sqlx::Error> {
    let mut builder = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM questions");
    push_filters(&mut builder, filter);
    builder.build_query_scalar::<i64>().fetch_one(pool).await
}

/// Unpaginated export, newest first.
pub(crate) async fn list_all(
    pool: &PgPool,
    filter: &QuestionFilter,
) -> Result<Vec<Question>, sqlx::Error> {
    let mut builder = QueryBuilder::<Postgres>::new(format!("SELECT {COLUMNS} FROM questions"));
    push_filters(&mut builder, filter);
    builder.push(" ORDER BY created_at DESC");
    builder.build_query_as::<Question>().fetch_all(pool).await
}

pub(crate) async fn list_categories(pool: &PgPool) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar("SELECT DISTINCT category FROM questions ORDER BY category ASC")
        .fetch_all(pool)
        .await
}

/// Number of exam attachments referencing this question. A question with a
/// non-zero count must not be deleted.
pub(crate) async fn exam_reference_count(pool: &PgPool, id: &str) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM exam_questions WHERE question_id = $1")
        .bind(id)
        .fetch_one(pool)
        .await
}

pub(crate) struct CreateQuestion<'a> {
    pub(crate) id: &'a str,
    pub(crate) title: &'a str,
    pub(crate) content: &'a str,
    pub(crate) question_type: QuestionType,
    pub(crate) options: Vec<String>,
    pub(crate) correct_answer: serde_json::Value,
    pub(crate) explanation: Option<&'a str>,
    pub(crate) difficulty: i32,
    pub(crate) category: &'a str,
    pub(crate) tags: Vec<String>,
    pub(crate) creator_id: &'a str,
    pub(crate) created_at: time::PrimitiveDateTime,
    pub(crate) updated_at: time::PrimitiveDateTime,
}

pub(crate) async fn create(
    pool: &PgPool,
    params: CreateQuestion<'_>,
) -> Result<Question, sqlx::Error> {
    sqlx::query_as::<_, Question>(&format!(
        "INSERT INTO questions (
            id, title, content, question_type, options, correct_answer, explanation,
            difficulty, category, tags, creator_id, created_at, updated_at
         ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13)
         RETURNING {COLUMNS}",
    ))
    .bind(params.id)
    .bind(params.title)
    .bind(params.content)
    .bind(params.question_type)
    .bind(Json(params.options))
    .bind(Json(params.correct_answer))
    .bind(params.explanation)
    .bind(params.difficulty)
    .bind(params.category)
    .bind(Json(params.tags))
    .bind(params.creator_id)
    .bind(params.created_at)
    .bind(params.updated_at)
    .fetch_one(pool)
    .await
}

pub(crate) struct UpdateQuestion {
    pub(crate) title: Option<String>,
    pub(crate) content: Option<String>,
    pub(crate) question_type: Option<QuestionType>,
    pub(crate) options: Option<Vec<String>>,
    pub(crate) correct_answer: Option<serde_json::Value>,
    pub(crate) explanation: Option<String>,
    pub(crate) difficulty: Option<i32>,
    pub(crate) category: Option<String>,
    pub(crate) tags: Option<Vec<String>>,
    pub(crate) updated_at: time::PrimitiveDateTime,
}

pub(crate) async fn update(
    pool: &PgPool,
    id: &str,
    params: UpdateQuestion,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE questions SET
            title = COALESCE($1, title),
            content = COALESCE($2, content),
            question_type = COALESCE($3, question_type),
            options = COALESCE($4, options),
            correct_answer = COALESCE($5, correct_answer),
            explanation = COALESCE($6, explanation),
            difficulty = COALESCE($7, difficulty),
            category = COALESCE($8, category),
            tags = COALESCE($9, tags),
            updated_at = $10
         WHERE id = $11",
    )
    .bind(params.title)
    .bind(params.content)
    .bind(params.question_type)
    .bind(params.options.map(Json))
    .bind(params.correct_answer.map(Json))
    .bind(params.explanation)
    .bind(params.difficulty)
    .bind(params.category)
    .bind(params.tags.map(Json))
    .bind(params.updated_at)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

pub(crate) async fn delete_by_id(pool: &PgPool, id: &str) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM questions WHERE id = $1").bind(id).execute(pool).await?;
    Ok(())
}
