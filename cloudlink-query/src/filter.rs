//! Boolean filter expressions over entity properties.
//!
//! Leaves compare one property against one value (or, for `IN`, a list of
//! candidates); composites join a non-empty list of sub-filters with `AND` or
//! `OR`. The wire form ([`FilterDto`]) keeps the property name as the first
//! element of the value list, the layout the store expects.

use crate::error::{QueryError, QueryResult};
use cloudlink_model::{Entity, Value};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Filter operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FilterOp {
    Eq,
    Lt,
    Le,
    Gt,
    Ge,
    Ne,
    In,
    And,
    Or,
}

impl FilterOp {
    /// Wire name of the operator.
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOp::Eq => "EQ",
            FilterOp::Lt => "LT",
            FilterOp::Le => "LE",
            FilterOp::Gt => "GT",
            FilterOp::Ge => "GE",
            FilterOp::Ne => "NE",
            FilterOp::In => "IN",
            FilterOp::And => "AND",
            FilterOp::Or => "OR",
        }
    }

    /// Binary comparison operators (`EQ`, `LT`, `LE`, `GT`, `GE`, `NE`).
    pub fn is_comparison(&self) -> bool {
        !matches!(self, FilterOp::In | FilterOp::And | FilterOp::Or)
    }

    /// `AND` and `OR`.
    pub fn is_logical(&self) -> bool {
        matches!(self, FilterOp::And | FilterOp::Or)
    }

    fn symbol(&self) -> &'static str {
        match self {
            FilterOp::Eq => "==",
            FilterOp::Lt => "<",
            FilterOp::Le => "<=",
            FilterOp::Gt => ">",
            FilterOp::Ge => ">=",
            FilterOp::Ne => "!=",
            other => other.as_str(),
        }
    }
}

impl fmt::Display for FilterOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FilterOp {
    type Err = QueryError;

    fn from_str(s: &str) -> QueryResult<Self> {
        match s {
            "EQ" => Ok(FilterOp::Eq),
            "LT" => Ok(FilterOp::Lt),
            "LE" => Ok(FilterOp::Le),
            "GT" => Ok(FilterOp::Gt),
            "GE" => Ok(FilterOp::Ge),
            "NE" => Ok(FilterOp::Ne),
            "IN" => Ok(FilterOp::In),
            "AND" => Ok(FilterOp::And),
            "OR" => Ok(FilterOp::Or),
            other => Err(QueryError::InvalidArgument(format!(
                "unknown filter operator: {other}"
            ))),
        }
    }
}

/// An immutable filter expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// `property <op> value` for a comparison operator.
    Compare {
        op: FilterOp,
        property: String,
        value: Value,
    },
    /// `property IN (values...)`.
    In { property: String, values: Vec<Value> },
    /// `AND`/`OR` over sub-filters.
    Composite { op: FilterOp, subfilters: Vec<Filter> },
}

impl Filter {
    fn leaf(op: FilterOp, property: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Compare {
            op,
            property: property.into(),
            value: value.into(),
        }
    }

    pub fn eq(property: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::leaf(FilterOp::Eq, property, value)
    }

    pub fn lt(property: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::leaf(FilterOp::Lt, property, value)
    }

    pub fn le(property: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::leaf(FilterOp::Le, property, value)
    }

    pub fn gt(property: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::leaf(FilterOp::Gt, property, value)
    }

    pub fn ge(property: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::leaf(FilterOp::Ge, property, value)
    }

    pub fn ne(property: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::leaf(FilterOp::Ne, property, value)
    }

    /// Builds a comparison leaf from a runtime operator.
    pub fn compare(
        op: FilterOp,
        property: impl Into<String>,
        value: impl Into<Value>,
    ) -> QueryResult<Self> {
        if !op.is_comparison() {
            return Err(QueryError::InvalidArgument(format!(
                "{op} is not a comparison operator"
            )));
        }
        Ok(Self::leaf(op, property, value))
    }

    /// `property IN (values...)`. Candidate order is preserved.
    pub fn is_in<V: Into<Value>>(
        property: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        Filter::In {
            property: property.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Conjunction of `filters`. Fails on an empty list.
    pub fn and(filters: impl IntoIterator<Item = Filter>) -> QueryResult<Self> {
        Self::composite(FilterOp::And, filters)
    }

    /// Disjunction of `filters`. Fails on an empty list.
    pub fn or(filters: impl IntoIterator<Item = Filter>) -> QueryResult<Self> {
        Self::composite(FilterOp::Or, filters)
    }

    fn composite(op: FilterOp, filters: impl IntoIterator<Item = Filter>) -> QueryResult<Self> {
        let subfilters: Vec<Filter> = filters.into_iter().collect();
        if subfilters.is_empty() {
            return Err(QueryError::InvalidArgument(format!(
                "{op} requires at least one sub-filter"
            )));
        }
        Ok(Filter::Composite { op, subfilters })
    }

    /// Checks the whole tree: operators in the right position, non-empty
    /// property names, non-empty `IN` lists and composites.
    pub fn validate(&self) -> QueryResult<()> {
        match self {
            Filter::Compare { op, property, .. } => {
                if !op.is_comparison() {
                    return Err(QueryError::InvalidArgument(format!(
                        "{op} cannot be used as a comparison"
                    )));
                }
                validate_property(property)
            }
            Filter::In { property, values } => {
                validate_property(property)?;
                if values.is_empty() {
                    return Err(QueryError::InvalidArgument(format!(
                        "IN on {property} requires at least one value"
                    )));
                }
                Ok(())
            }
            Filter::Composite { op, subfilters } => {
                if !op.is_logical() {
                    return Err(QueryError::InvalidArgument(format!(
                        "{op} cannot join sub-filters"
                    )));
                }
                if subfilters.is_empty() {
                    return Err(QueryError::InvalidArgument(format!(
                        "{op} requires at least one sub-filter"
                    )));
                }
                subfilters.iter().try_for_each(Filter::validate)
            }
        }
    }

    /// Evaluates the filter against an entity.
    ///
    /// A missing property matches only `NE`. Ordered comparisons between
    /// values of different families never match.
    pub fn matches(&self, entity: &Entity) -> bool {
        match self {
            Filter::Compare { op, property, value } => match entity.property(property) {
                None => *op == FilterOp::Ne,
                Some(actual) => {
                    let ord = actual.partial_cmp(value);
                    match op {
                        FilterOp::Eq => ord == Some(Ordering::Equal),
                        FilterOp::Ne => ord != Some(Ordering::Equal),
                        FilterOp::Lt => ord == Some(Ordering::Less),
                        FilterOp::Le => matches!(ord, Some(Ordering::Less | Ordering::Equal)),
                        FilterOp::Gt => ord == Some(Ordering::Greater),
                        FilterOp::Ge => {
                            matches!(ord, Some(Ordering::Greater | Ordering::Equal))
                        }
                        _ => false,
                    }
                }
            },
            Filter::In { property, values } => entity.property(property).is_some_and(|actual| {
                values
                    .iter()
                    .any(|v| actual.partial_cmp(v) == Some(Ordering::Equal))
            }),
            Filter::Composite { op, subfilters } => match op {
                FilterOp::And => subfilters.iter().all(|f| f.matches(entity)),
                FilterOp::Or => subfilters.iter().any(|f| f.matches(entity)),
                _ => false,
            },
        }
    }

    /// Wire representation.
    pub fn to_dto(&self) -> FilterDto {
        match self {
            Filter::Compare { op, property, value } => FilterDto {
                operator: *op,
                values: Some(vec![
                    FilterValue::Property(property.clone()),
                    FilterValue::Value(value.clone()),
                ]),
                subfilters: None,
            },
            Filter::In { property, values } => {
                let mut wire = Vec::with_capacity(values.len() + 1);
                wire.push(FilterValue::Property(property.clone()));
                wire.extend(values.iter().cloned().map(FilterValue::Value));
                FilterDto {
                    operator: FilterOp::In,
                    values: Some(wire),
                    subfilters: None,
                }
            }
            Filter::Composite { op, subfilters } => FilterDto {
                operator: *op,
                values: None,
                subfilters: Some(subfilters.iter().map(Filter::to_dto).collect()),
            },
        }
    }
}

fn validate_property(property: &str) -> QueryResult<()> {
    if property.is_empty() {
        return Err(QueryError::InvalidArgument(
            "filter property name must not be empty".to_string(),
        ));
    }
    Ok(())
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::Compare { op, property, value } => {
                write!(f, "{property} {} {value}", op.symbol())
            }
            Filter::In { property, values } => {
                write!(f, "{property} IN [")?;
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{v}")?;
                }
                f.write_str("]")
            }
            Filter::Composite { op, subfilters } => {
                f.write_str("(")?;
                for (i, sub) in subfilters.iter().enumerate() {
                    if i > 0 {
                        write!(f, " {op} ")?;
                    }
                    write!(f, "{sub}")?;
                }
                f.write_str(")")
            }
        }
    }
}

/// One element of a leaf's wire value list: the property name comes first,
/// followed by tagged values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    Property(String),
    Value(Value),
}

/// Wire form of a [`Filter`]:
/// `{operator, values: [property, value, ...]}` for leaves and
/// `{operator, subfilters: [...]}` for composites.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterDto {
    pub operator: FilterOp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<FilterValue>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subfilters: Option<Vec<FilterDto>>,
}

impl From<&Filter> for FilterDto {
    fn from(filter: &Filter) -> Self {
        filter.to_dto()
    }
}

impl TryFrom<FilterDto> for Filter {
    type Error = QueryError;

    fn try_from(dto: FilterDto) -> QueryResult<Self> {
        let filter = if dto.operator.is_logical() {
            let subfilters = dto
                .subfilters
                .unwrap_or_default()
                .into_iter()
                .map(Filter::try_from)
                .collect::<QueryResult<Vec<_>>>()?;
            Filter::composite(dto.operator, subfilters)?
        } else {
            let mut values = dto.values.unwrap_or_default().into_iter();
            let property = match values.next() {
                Some(FilterValue::Property(p)) => p,
                _ => {
                    return Err(QueryError::InvalidArgument(format!(
                        "{} filter must start with a property name",
                        dto.operator
                    )));
                }
            };
            let operands = values
                .map(|v| match v {
                    FilterValue::Value(v) => v,
                    // A bare string after the property name is a plain string operand.
                    FilterValue::Property(s) => Value::String(s),
                })
                .collect::<Vec<_>>();

            if dto.operator == FilterOp::In {
                Filter::In {
                    property,
                    values: operands,
                }
            } else {
                let [value]: [Value; 1] = operands.try_into().map_err(|_| {
                    QueryError::InvalidArgument(format!(
                        "{} filter on {property} takes exactly one value",
                        dto.operator
                    ))
                })?;
                Filter::Compare {
                    op: dto.operator,
                    property,
                    value,
                }
            }
        };
        filter.validate()?;
        Ok(filter)
    }
}
