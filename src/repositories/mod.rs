pub(crate) mod courses;
pub(crate) mod enrollments;
pub(crate) mod exam_records;
pub(crate) mod exams;
pub(crate) mod questions;
pub(crate) mod users;

/// Sort direction for list queries. Only these two tokens ever reach SQL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum SortDir {
    Asc,
    #[default]
    Desc,
}

impl SortDir {
    pub(crate) fn as_sql(self) -> &'static str {
        match self {
            SortDir::Asc => "ASC",
            SortDir::Desc => "DESC",
        }
    }

    pub(crate) fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some(value) if value.eq_ignore_ascii_case("asc") => SortDir::Asc,
            _ => SortDir::Desc,
        }
    }
}

/// Resolve a caller-supplied sort field against an allow-list of known
/// columns. Anything not on the list falls back to the default column, so
/// user input is never interpolated into query text.
pub(crate) fn sort_column<'a>(
    requested: Option<&str>,
    allowed: &[&'a str],
    default: &'a str,
) -> &'a str {
    match requested {
        Some(field) => allowed.iter().find(|column| **column == field).copied().unwrap_or(default),
        None => default,
    }
}
