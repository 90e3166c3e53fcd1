use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::db::models::Course;
use crate::db::types::CourseStatus;
use crate::repositories::{sort_column, SortDir};

const COLUMNS: &str = "\
    id, name, description, teacher_id, cover_image, credit_hours, status, \
    created_at, updated_at";

const SORTABLE: &[&str] = &["created_at", "updated_at", "name", "credit_hours"];

#[derive(Debug, Default)]
pub(crate) struct CourseFilter {
    pub(crate) teacher_id: Option<String>,
    pub(crate) status: Option<CourseStatus>,
    pub(crate) search: Option<String>,
}

pub(crate) async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<Course>, sqlx::Error> {
    sqlx::query_as::<_, Course>(&format!("SELECT {COLUMNS} FROM courses WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, filter: &CourseFilter) {
    let mut prefix = " WHERE ";

    if let Some(teacher_id) = &filter.teacher_id {
        builder.push(prefix).push("teacher_id = ").push_bind(teacher_id.clone());
        prefix = " AND ";
    }
    if let Some(status) = filter.status {
        builder.push(prefix).push("status = ").push_bind(status);
        prefix = " AND ";
    }
    if let Some(search) = &filter.search {
        let pattern = format!("%{search}%");
        builder
            .push(prefix)
            .push("(name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR description ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

pub(crate) async fn list(
    pool: &PgPool,
    filter: &CourseFilter,
    skip: i64,
    limit: i64,
    sort: Option<&str>,
    dir: SortDir,
) -> Result<Vec<Course>, sqlx::Error> {
    let mut builder = QueryBuilder::<Postgres>::new(format!("SELECT {COLUMNS} FROM courses"));
    push_filters(&mut builder, filter);

    builder.push(format!(
        " ORDER BY {} {}",
        sort_column(sort, SORTABLE, "created_at"),
        dir.as_sql()
    ));
    builder.push(" OFFSET ").push_bind(skip.max(0));
    builder.push(" LIMIT ").push_bind(limit.clamp(1, 100));

    builder.build_query_as::<Course>().fetch_all(pool).await
}

pub(crate) async fn count(pool: &PgPool, filter: &CourseFilter) -> Result<i64, sqlx::Error> {
    let mut builder = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM courses");
    push_filters(&mut builder, filter);
    builder.build_query_scalar::<i64>().fetch_one(pool).await
}

pub(crate) struct CreateCourse<'a> {
    pub(crate) id: &'a str,
    pub(crate) name: &'a str,
    pub(crate) description: &'a str,
    pub(crate) teacher_id: &'a str,
    pub(crate) cover_image: Option<&'a str>,
    pub(crate) credit_hours: i32,
    pub(crate) status: CourseStatus,
    pub(crate) created_at: time::PrimitiveDateTime,
    pub(crate) updated_at: time::PrimitiveDateTime,
}

pub(crate) async fn create(pool: &PgPool, params: CreateCourse<'_>) -> Result<Course, sqlx::Error> {
    sqlx::query_as::<_, Course>(&format!(
        "INSERT INTO courses (
            id, name, description, teacher_id, cover_image, credit_hours, status,
            created_at, updated_at
         ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9)
         RETURNING {COLUMNS}",
    ))
    .bind(params.id)
    .bind(params.name)
    .bind(params.description)
    .bind(params.teacher_id)
    .bind(params.cover_image)
    .bind(params.credit_hours)
    .bind(params.status)
    .bind(params.created_at)
    .bind(params.updated_at)
    .fetch_one(pool)
    .await
}

pub(crate) struct UpdateCourse {
    pub(crate) name: Option<String>,
    pub(crate) description: Option<String>,
    pub(crate) cover_image: Option<String>,
    pub(crate) credit_hours: Option<i32>,
    pub(crate) status: Option<CourseStatus>,
    pub(crate) updated_at: time::PrimitiveDateTime,
}

pub(crate) async fn update(
    pool: &PgPool,
    id: &str,
    params: UpdateCourse,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE courses SET
            name = COALESCE($1, name),
            description = COALESCE($2, description),
            cover_image = COALESCE($3, cover_image),
            credit_hours = COALESCE($4, credit_hours),
            status = COALESCE($5, status),
            updated_at = $6
         WHERE id = $7",
    )
    .bind(params.name)
    .bind(params.description)
    .bind(params.cover_image)
    .bind(params.credit_hours)
    .bind(params.status)
    .bind(params.updated_at)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

pub(crate) async fn delete_by_id(pool: &PgPool, id: &str) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM courses WHERE id = $1").bind(id).execute(pool).await?;
    Ok(())
}

pub(crate) async fn fetch_one_by_id(pool: &PgPool, id: &str) -> Result<Course, sqlx::Error> {
    sqlx::query_as::<_, Course>(&format!("SELECT {COLUMNS} FROM courses WHERE id = $1"))
        .bind(id)
        .fetch_one(pool)
        .await
}
