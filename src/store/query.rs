use serde_json::Value;

/// Equality filters, ordering and paging over a collection.
#[derive(Debug, Clone, Default)]
pub struct Query {
    filters: Vec<(String, Value)>,
    order_by: Vec<(String, bool)>,
    limit: usize,
    offset: usize,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keeps records whose top-level `key` equals `value`.
    pub fn with_filter(
        mut self,
        key: &str,
        value: impl Into<Value>,
    ) -> Self {
        self.filters.push((key.to_string(), value.into()));
        self
    }

    /// Orders by `key`, descending when `rev` is set.
    pub fn with_order(
        mut self,
        key: &str,
        rev: bool,
    ) -> Self {
        self.order_by.push((key.to_string(), rev));
        self
    }

    /// Caps the page size. 0 means unbounded.
    pub fn with_limit(
        mut self,
        limit: usize,
    ) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_offset(
        mut self,
        offset: usize,
    ) -> Self {
        self.offset = offset;
        self
    }

    pub fn filters(&self) -> &[(String, Value)] {
        &self.filters
    }

    pub fn order_by(&self) -> &[(String, bool)] {
        &self.order_by
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn offset(&self) -> usize {
        self.offset
    }
}
