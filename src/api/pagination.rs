use serde::Deserialize;

pub(crate) const fn default_page() -> i64 {
    1
}

pub(crate) const fn default_limit() -> i64 {
    10
}

/// Common list-endpoint query parameters. Resource-specific filters live in
/// their own query structs and are extracted alongside this one.
#[derive(Debug, Deserialize)]
pub(crate) struct PageQuery {
    #[serde(default = "default_page")]
    pub(crate) page: i64,
    #[serde(default = "default_limit")]
    pub(crate) limit: i64,
    #[serde(default)]
    #[serde(alias = "sortBy")]
    pub(crate) sort_by: Option<String>,
    #[serde(default)]
    pub(crate) order: Option<String>,
}

impl PageQuery {
    pub(crate) fn page(&self) -> i64 {
        self.page.max(1)
    }

    pub(crate) fn limit(&self) -> i64 {
        self.limit.clamp(1, 100)
    }

    pub(crate) fn skip(&self) -> i64 {
        (self.page() - 1) * self.limit()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skip_is_derived_from_page_and_limit() {
        let query = PageQuery { page: 3, limit: 10, sort_by: None, order: None };
        assert_eq!(query.skip(), 20);
    }

    #[test]
    fn out_of_range_values_are_clamped() {
        let query = PageQuery { page: 0, limit: 1000, sort_by: None, order: None };
        assert_eq!(query.page(), 1);
        assert_eq!(query.limit(), 100);
        assert_eq!(query.skip(), 0);
    }
}
