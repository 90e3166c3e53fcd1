use sqlx::{PgPool, Postgres, QueryBuilder};
use time::PrimitiveDateTime;

use crate::db::types::{UserRole, UserStatus};
use crate::repositories::{sort_column, SortDir};

const SORTABLE: &[&str] = &["created_at", "username", "real_name"];

/// A student row joined with their enrollment timestamp.
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct EnrolledStudentRow {
    pub(crate) id: String,
    pub(crate) username: String,
    pub(crate) email: String,
    pub(crate) real_name: String,
    pub(crate) role: UserRole,
    pub(crate) status: UserStatus,
    pub(crate) enrolled_at: PrimitiveDateTime,
}

pub(crate) async fn is_enrolled(
    pool: &PgPool,
    course_id: &str,
    student_id: &str,
) -> Result<bool, sqlx::Error> {
    let found: Option<i32> = sqlx::query_scalar(
        "SELECT 1 FROM course_students WHERE course_id = $1 AND student_id = $2",
    )
    .bind(course_id)
    .bind(student_id)
    .fetch_optional(pool)
    .await?;
    Ok(found.is_some())
}

pub(crate) async fn add(
    pool: &PgPool,
    id: &str,
    course_id: &str,
    student_id: &str,
    created_at: PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO course_students (id, course_id, student_id, created_at)
         VALUES ($1, $2, $3, $4)",
    )
    .bind(id)
    .bind(course_id)
    .bind(student_id)
    .bind(created_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub(crate) async fn remove(
    pool: &PgPool,
    course_id: &str,
    student_id: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM course_students WHERE course_id = $1 AND student_id = $2")
        .bind(course_id)
        .bind(student_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub(crate) async fn list_students(
    pool: &PgPool,
    course_id: &str,
    skip: i64,
    limit: i64,
    sort: Option<&str>,
    dir: SortDir,
) -> Result<Vec<EnrolledStudentRow>, sqlx::Error> {
    let mut builder = QueryBuilder::<Postgres>::new(
        "SELECT u.id, u.username, u.email, u.real_name, u.role, u.status,
                cs.created_at AS enrolled_at
         FROM course_students cs
         JOIN users u ON u.id = cs.student_id
         WHERE cs.course_id = ",
    );
    builder.push_bind(course_id);

    let column = match sort_column(sort, SORTABLE, "created_at") {
        "username" => "u.username",
        "real_name" => "u.real_name",
        _ => "cs.created_at",
    };
    builder.push(format!(" ORDER BY {} {}", column, dir.as_sql()));
    builder.push(" OFFSET ").push_bind(skip.max(0));
    builder.push(" LIMIT ").push_bind(limit.clamp(1, 100));

    builder.build_query_as::<EnrolledStudentRow>().fetch_all(pool).await
}

pub(crate) async fn count_students(pool: &PgPool, course_id: &str) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM course_students WHERE course_id = $1")
        .bind(course_id)
        .fetch_one(pool)
        .await
}
