use crate::core::Value;

/// A piece of SQL text with the values bound to its `?` markers, in order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Fragment {
    pub sql: String,
    pub params: Vec<Value>,
}

impl Fragment {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    pub fn with_params<I, V>(sql: impl Into<String>, params: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self {
            sql: sql.into(),
            params: params.into_iter().map(Into::into).collect(),
        }
    }

    pub fn bind(mut self, value: impl Into<Value>) -> Self {
        self.params.push(value.into());
        self
    }
}

impl From<&str> for Fragment {
    fn from(sql: &str) -> Self {
        Self::new(sql)
    }
}

impl From<String> for Fragment {
    fn from(sql: String) -> Self {
        Self::new(sql)
    }
}

/// Structured description of a SELECT, rendered by the query builder.
///
/// Nothing outside the builder turns these parts into a statement; planners
/// and callers only add to the lists.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryComponents {
    /// Raw statement used verbatim; every other part is ignored.
    pub full: Option<Fragment>,
    pub columns: Vec<String>,
    pub tables: Vec<String>,
    /// Appended verbatim after the tables.
    pub joins: Vec<Fragment>,
    /// Appended after the joins; replaces conditions, grouping, order and limit.
    pub custom: Option<Fragment>,
    /// AND-joined.
    pub conditions: Vec<Fragment>,
    pub groups: Vec<String>,
    pub having: Option<Fragment>,
    pub order: Vec<String>,
    pub limit: Option<u64>,
    /// Only rendered together with a limit.
    pub offset: Option<u64>,
    pub distinct: bool,
}

impl QueryComponents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn full(sql: impl Into<Fragment>) -> Self {
        Self {
            full: Some(sql.into()),
            ..Self::default()
        }
    }

    pub fn column(mut self, column: impl Into<String>) -> Self {
        self.columns.push(column.into());
        self
    }

    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.tables.push(table.into());
        self
    }

    pub fn join(mut self, join: impl Into<Fragment>) -> Self {
        self.joins.push(join.into());
        self
    }

    pub fn custom(mut self, custom: impl Into<Fragment>) -> Self {
        self.custom = Some(custom.into());
        self
    }

    pub fn condition(mut self, condition: impl Into<Fragment>) -> Self {
        self.conditions.push(condition.into());
        self
    }

    pub fn group(mut self, column: impl Into<String>) -> Self {
        self.groups.push(column.into());
        self
    }

    pub fn having(mut self, condition: impl Into<Fragment>) -> Self {
        self.having = Some(condition.into());
        self
    }

    pub fn order(mut self, order: impl Into<String>) -> Self {
        self.order.push(order.into());
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    /// Fold `other` into `self`: lists are appended, set scalars override.
    pub fn merge(&mut self, other: QueryComponents) {
        if other.full.is_some() {
            self.full = other.full;
        }
        self.columns.extend(other.columns);
        self.tables.extend(other.tables);
        self.joins.extend(other.joins);
        if other.custom.is_some() {
            self.custom = other.custom;
        }
        self.conditions.extend(other.conditions);
        self.groups.extend(other.groups);
        if other.having.is_some() {
            self.having = other.having;
        }
        self.order.extend(other.order);
        if other.limit.is_some() {
            self.limit = other.limit;
        }
        if other.offset.is_some() {
            self.offset = other.offset;
        }
        self.distinct |= other.distinct;
    }
}
