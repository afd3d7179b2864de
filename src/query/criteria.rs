use lazy_static::lazy_static;
use regex::Regex;

use super::components::{Fragment, QueryComponents};
use crate::connection::Dialect;
use crate::core::{DbError, Result, Value};
use crate::schema::{FieldKind, SchemaDescriptor};

lazy_static! {
    static ref LIMIT: Regex = Regex::new(r"(?i)\bLIMIT\s+(\d+)(\s+OFFSET\s+\d+)?").unwrap();
}

/// One filter on the root entity of a find.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq(String, Value),
    NotEq(String, Value),
    IsNull(String),
    NotNull(String),
    Like(String, String),
    In(String, Vec<Value>),
    /// Hand-written condition with its own `?` markers.
    Raw(Fragment),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Order {
    Asc(String),
    Desc(String),
    Raw(String),
}

/// Filter, sort and limit of a find, expressed against field names.
///
/// Field names are checked against the entity's descriptor and rendered
/// against an alias, so the same criteria serve a joined SELECT and an
/// unaliased DELETE.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Criteria {
    pub filters: Vec<Filter>,
    pub order: Vec<Order>,
    pub limit: Option<u64>,
    /// Appended after the joins, replacing every other clause.
    pub custom: Option<Fragment>,
}

impl Criteria {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Eq(field.to_string(), value.into()));
        self
    }

    pub fn not_eq(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::NotEq(field.to_string(), value.into()));
        self
    }

    pub fn is_null(mut self, field: &str) -> Self {
        self.filters.push(Filter::IsNull(field.to_string()));
        self
    }

    pub fn not_null(mut self, field: &str) -> Self {
        self.filters.push(Filter::NotNull(field.to_string()));
        self
    }

    pub fn like(mut self, field: &str, pattern: &str) -> Self {
        self.filters.push(Filter::Like(field.to_string(), pattern.to_string()));
        self
    }

    pub fn in_list<I, V>(mut self, field: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.filters.push(Filter::In(
            field.to_string(),
            values.into_iter().map(Into::into).collect(),
        ));
        self
    }

    pub fn raw(mut self, condition: impl Into<Fragment>) -> Self {
        self.filters.push(Filter::Raw(condition.into()));
        self
    }

    pub fn order_asc(mut self, field: &str) -> Self {
        self.order.push(Order::Asc(field.to_string()));
        self
    }

    pub fn order_desc(mut self, field: &str) -> Self {
        self.order.push(Order::Desc(field.to_string()));
        self
    }

    pub fn order_raw(mut self, order: &str) -> Self {
        self.order.push(Order::Raw(order.to_string()));
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn custom(mut self, custom: impl Into<Fragment>) -> Self {
        self.custom = Some(custom.into());
        self
    }

    /// Render the filters as AND-able conditions.
    ///
    /// With an alias, columns are written `"alias"."field"`; without one
    /// they are bare quoted names.
    pub fn conditions(
        &self,
        descriptor: &SchemaDescriptor,
        dialect: Dialect,
        alias: Option<&str>,
    ) -> Result<Vec<Fragment>> {
        self.filters
            .iter()
            .map(|filter| {
                let column = |field: &str| -> Result<String> {
                    descriptor.require_field(field)?;
                    Ok(match alias {
                        Some(alias) => dialect.column_ref(alias, field),
                        None => dialect.quote_ident(field),
                    })
                };

                Ok(match filter {
                    Filter::Eq(field, Value::Null) | Filter::IsNull(field) => {
                        Fragment::new(format!("{} IS NULL", column(field)?))
                    }
                    Filter::NotEq(field, Value::Null) | Filter::NotNull(field) => {
                        Fragment::new(format!("{} IS NOT NULL", column(field)?))
                    }
                    Filter::Eq(field, value) => Fragment::with_params(
                        format!("{} = ?", column(field)?),
                        [storage_value(descriptor, field, value, dialect)],
                    ),
                    Filter::NotEq(field, value) => Fragment::with_params(
                        format!("{} != ?", column(field)?),
                        [storage_value(descriptor, field, value, dialect)],
                    ),
                    Filter::Like(field, pattern) => Fragment::with_params(
                        format!("{} LIKE ?", column(field)?),
                        [pattern.as_str()],
                    ),
                    Filter::In(field, values) if values.is_empty() => {
                        column(field)?;
                        Fragment::new("1 = 0")
                    }
                    Filter::In(field, values) => {
                        let markers = vec!["?"; values.len()].join(", ");
                        Fragment::with_params(
                            format!("{} IN ({})", column(field)?, markers),
                            values
                                .iter()
                                .map(|v| storage_value(descriptor, field, v, dialect))
                                .collect::<Vec<_>>(),
                        )
                    }
                    Filter::Raw(fragment) => fragment.clone(),
                })
            })
            .collect()
    }

    pub fn order_by(
        &self,
        descriptor: &SchemaDescriptor,
        dialect: Dialect,
        alias: &str,
    ) -> Result<Vec<String>> {
        self.order
            .iter()
            .map(|order| match order {
                Order::Asc(field) => {
                    descriptor.require_field(field)?;
                    Ok(format!("{} ASC", dialect.column_ref(alias, field)))
                }
                Order::Desc(field) => {
                    descriptor.require_field(field)?;
                    Ok(format!("{} DESC", dialect.column_ref(alias, field)))
                }
                Order::Raw(order) => Ok(order.clone()),
            })
            .collect()
    }

    /// Add filters, order, limit and custom fragment to a planned SELECT.
    pub fn apply(
        &self,
        components: &mut QueryComponents,
        descriptor: &SchemaDescriptor,
        dialect: Dialect,
        alias: &str,
    ) -> Result<()> {
        components
            .conditions
            .extend(self.conditions(descriptor, dialect, Some(alias))?);
        components
            .order
            .extend(self.order_by(descriptor, dialect, alias)?);
        if self.limit.is_some() {
            components.limit = self.limit;
        }
        if self.custom.is_some() {
            components.custom = self.custom.clone();
        }
        Ok(())
    }
}

/// Encode a filter value the way the field is stored.
fn storage_value(descriptor: &SchemaDescriptor, field: &str, value: &Value, dialect: Dialect) -> Value {
    let kind = descriptor.field(field).map(|f| f.kind);
    match (kind, value) {
        (Some(FieldKind::Boolean), _) | (_, Value::Boolean(_)) => dialect.bool_value(value.as_bool()),
        (_, Value::Timestamp(ts)) => Value::Text(ts.format(crate::core::DATETIME_FORMAT).to_string()),
        _ => value.clone(),
    }
}

impl From<Fragment> for Criteria {
    fn from(condition: Fragment) -> Self {
        Criteria::new().raw(condition)
    }
}

/// Read the row limit out of a `LIMIT n` clause inside a custom fragment.
pub fn limit_in_custom(custom: &Fragment) -> Option<u64> {
    LIMIT
        .captures(&custom.sql)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// The fragment with any `LIMIT n [OFFSET m]` clause removed.
pub(crate) fn without_limit(custom: &Fragment) -> Fragment {
    Fragment {
        sql: LIMIT.replace_all(&custom.sql, "").trim_end().to_string(),
        params: custom.params.clone(),
    }
}

/// The fragment limited to one page.
pub(crate) fn paged_custom(custom: &Fragment, limit: u64, offset: u64) -> Fragment {
    let mut paged = without_limit(custom);
    paged.sql.push_str(&format!(" LIMIT {} OFFSET {}", limit, offset));
    paged
}

pub(crate) fn require_limit(limit: Option<u64>, custom: Option<&Fragment>) -> Result<u64> {
    limit
        .or_else(|| custom.and_then(limit_in_custom))
        .ok_or_else(|| DbError::QueryBuild("Paging requires a limit".into()))
}
