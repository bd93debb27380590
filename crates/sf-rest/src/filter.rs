//! WHERE / HAVING expression trees and SOQL literal rendering.

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use std::fmt;

use sf_toolkit_client::security::soql;

use crate::error::{Error, Result};
use crate::query_builder::QueryBuilder;

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    Like,
    In,
    NotIn,
    /// Multi-select picklist contains any of the values.
    Includes,
    /// Multi-select picklist contains none of the values.
    Excludes,
}

impl Operator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Ne => "!=",
            Operator::Gt => ">",
            Operator::Gte => ">=",
            Operator::Lt => "<",
            Operator::Lte => "<=",
            Operator::Like => "LIKE",
            Operator::In => "IN",
            Operator::NotIn => "NOT IN",
            Operator::Includes => "INCLUDES",
            Operator::Excludes => "EXCLUDES",
        }
    }

    /// Operator named by a keyword-filter suffix such as `gte` or `not_in`.
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        Some(match keyword {
            "eq" => Operator::Eq,
            "ne" => Operator::Ne,
            "gt" => Operator::Gt,
            "gte" => Operator::Gte,
            "lt" => Operator::Lt,
            "lte" => Operator::Lte,
            "like" => Operator::Like,
            "in" => Operator::In,
            "not_in" => Operator::NotIn,
            "includes" => Operator::Includes,
            "excludes" => Operator::Excludes,
            _ => return None,
        })
    }

    fn takes_set(&self) -> bool {
        matches!(
            self,
            Operator::In | Operator::NotIn | Operator::Includes | Operator::Excludes
        )
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Suffixes Salesforce uses in API names (`Amount__c`, `Parent__r`,
/// `Event__e`, ...). After a `__` they belong to the field, not an operator.
const NAME_SUFFIXES: &[&str] = &[
    "c", "r", "s", "x", "e", "b", "mdt", "kav", "pc", "chn", "share", "history", "feed",
];

/// Split a keyword-filter key into field name and operator.
///
/// The key is split at its last `__`. `Amount__c__gte` is `Amount__c >=`,
/// `Name__c` is `Name__c =`, and `Name__between` is an error.
pub fn parse_keyword(key: &str) -> Result<(&str, Operator)> {
    let Some((head, suffix)) = key.rsplit_once("__") else {
        return Ok((key, Operator::Eq));
    };
    if let Some(operator) = Operator::from_keyword(suffix) {
        return Ok((head, operator));
    }
    if NAME_SUFFIXES.contains(&suffix) {
        return Ok((key, Operator::Eq));
    }
    Err(Error::validation(format!(
        "unknown filter operator '{suffix}' in '{key}'"
    )))
}

/// A field path, or an aggregate call on one: `Owner.Name`, `COUNT(Id)`, `COUNT()`.
pub(crate) fn is_field_expression(expr: &str) -> bool {
    if soql::is_safe_field_path(expr) {
        return true;
    }
    let Some((function, rest)) = expr.split_once('(') else {
        return false;
    };
    let Some(argument) = rest.strip_suffix(')') else {
        return false;
    };
    soql::is_safe_field_name(function) && (argument.is_empty() || soql::is_safe_field_path(argument))
}

/// A value on the right-hand side of a comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum SoqlValue {
    Null,
    Bool(bool),
    Int(i64),
    Number(f64),
    Text(String),
    Date(NaiveDate),
    DateTime(DateTime<FixedOffset>),
    /// A date literal such as `TODAY` or `LAST_N_DAYS:30`, emitted verbatim.
    DateLiteral(String),
    List(Vec<SoqlValue>),
    /// Matches anywhere in a `LIKE` comparison; `%` and `_` are taken literally.
    Substring(String),
    /// Semi-join: `Id IN (SELECT AccountId FROM Contact)`.
    Subquery(Box<QueryBuilder>),
}

impl SoqlValue {
    /// Render as a SOQL literal.
    pub fn render(&self) -> Result<String> {
        Ok(match self {
            SoqlValue::Null => "NULL".to_string(),
            SoqlValue::Bool(true) => "TRUE".to_string(),
            SoqlValue::Bool(false) => "FALSE".to_string(),
            SoqlValue::Int(n) => n.to_string(),
            SoqlValue::Number(n) if n.is_finite() => n.to_string(),
            SoqlValue::Number(n) => {
                return Err(Error::validation(format!("{n} is not a SOQL number")))
            }
            SoqlValue::Text(text) => format!("'{}'", soql::escape_string(text)),
            SoqlValue::Date(date) => date.format("%Y-%m-%d").to_string(),
            SoqlValue::DateTime(dt) => dt
                .with_timezone(&Utc)
                .format("%Y-%m-%dT%H:%M:%SZ")
                .to_string(),
            SoqlValue::DateLiteral(literal) => {
                let valid = !literal.is_empty()
                    && literal
                        .chars()
                        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_' || c == ':');
                if !valid {
                    return Err(Error::validation(format!(
                        "invalid date literal '{literal}'"
                    )));
                }
                literal.clone()
            }
            SoqlValue::List(items) => {
                if items.is_empty() {
                    return Err(Error::validation("empty value list"));
                }
                let rendered = items
                    .iter()
                    .map(SoqlValue::render)
                    .collect::<Result<Vec<_>>>()?;
                format!("({})", rendered.join(", "))
            }
            SoqlValue::Substring(text) => format!("'%{}%'", soql::escape_like(text)),
            SoqlValue::Subquery(query) => format!("({})", query.build()?),
        })
    }
}

impl From<&str> for SoqlValue {
    fn from(value: &str) -> Self {
        SoqlValue::Text(value.to_string())
    }
}

impl From<String> for SoqlValue {
    fn from(value: String) -> Self {
        SoqlValue::Text(value)
    }
}

impl From<bool> for SoqlValue {
    fn from(value: bool) -> Self {
        SoqlValue::Bool(value)
    }
}

impl From<i32> for SoqlValue {
    fn from(value: i32) -> Self {
        SoqlValue::Int(value.into())
    }
}

impl From<i64> for SoqlValue {
    fn from(value: i64) -> Self {
        SoqlValue::Int(value)
    }
}

impl From<f64> for SoqlValue {
    fn from(value: f64) -> Self {
        SoqlValue::Number(value)
    }
}

impl From<NaiveDate> for SoqlValue {
    fn from(value: NaiveDate) -> Self {
        SoqlValue::Date(value)
    }
}

impl From<DateTime<FixedOffset>> for SoqlValue {
    fn from(value: DateTime<FixedOffset>) -> Self {
        SoqlValue::DateTime(value)
    }
}

impl From<DateTime<Utc>> for SoqlValue {
    fn from(value: DateTime<Utc>) -> Self {
        SoqlValue::DateTime(value.fixed_offset())
    }
}

impl From<QueryBuilder> for SoqlValue {
    fn from(value: QueryBuilder) -> Self {
        SoqlValue::Subquery(Box::new(value))
    }
}

impl<T: Into<SoqlValue>> From<Vec<T>> for SoqlValue {
    fn from(values: Vec<T>) -> Self {
        SoqlValue::List(values.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<SoqlValue>> From<Option<T>> for SoqlValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(SoqlValue::Null, Into::into)
    }
}

/// A boolean condition tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Comparison {
        field: String,
        operator: Operator,
        value: SoqlValue,
    },
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
    /// Pre-rendered SOQL, inserted as-is. Values in it must already be escaped.
    Raw(String),
}

impl Filter {
    pub fn compare(field: impl Into<String>, operator: Operator, value: impl Into<SoqlValue>) -> Self {
        Filter::Comparison {
            field: field.into(),
            operator,
            value: value.into(),
        }
    }

    pub fn eq(field: impl Into<String>, value: impl Into<SoqlValue>) -> Self {
        Self::compare(field, Operator::Eq, value)
    }

    pub fn ne(field: impl Into<String>, value: impl Into<SoqlValue>) -> Self {
        Self::compare(field, Operator::Ne, value)
    }

    pub fn gt(field: impl Into<String>, value: impl Into<SoqlValue>) -> Self {
        Self::compare(field, Operator::Gt, value)
    }

    pub fn gte(field: impl Into<String>, value: impl Into<SoqlValue>) -> Self {
        Self::compare(field, Operator::Gte, value)
    }

    pub fn lt(field: impl Into<String>, value: impl Into<SoqlValue>) -> Self {
        Self::compare(field, Operator::Lt, value)
    }

    pub fn lte(field: impl Into<String>, value: impl Into<SoqlValue>) -> Self {
        Self::compare(field, Operator::Lte, value)
    }

    pub fn is_in(field: impl Into<String>, values: impl Into<SoqlValue>) -> Self {
        Self::compare(field, Operator::In, values)
    }

    pub fn not_in(field: impl Into<String>, values: impl Into<SoqlValue>) -> Self {
        Self::compare(field, Operator::NotIn, values)
    }

    /// `field LIKE '%value%'` with the wildcards in `value` escaped.
    pub fn contains(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::compare(field, Operator::Like, SoqlValue::Substring(value.into()))
    }

    pub fn and(self, other: Filter) -> Self {
        match self {
            Filter::And(mut filters) => {
                filters.push(other);
                Filter::And(filters)
            }
            first => Filter::And(vec![first, other]),
        }
    }

    pub fn or(self, other: Filter) -> Self {
        match self {
            Filter::Or(mut filters) => {
                filters.push(other);
                Filter::Or(filters)
            }
            first => Filter::Or(vec![first, other]),
        }
    }

    pub fn negate(self) -> Self {
        Filter::Not(Box::new(self))
    }

    /// Build a conjunction from `field__operator` keyword pairs.
    ///
    /// ```rust
    /// use sf_toolkit_rest::Filter;
    ///
    /// let filter = Filter::from_keywords([
    ///     ("Industry", "Technology".into()),
    ///     ("NumberOfEmployees__gte", 50.into()),
    /// ])?;
    /// assert_eq!(filter.render()?, "Industry = 'Technology' AND NumberOfEmployees >= 50");
    /// # Ok::<(), sf_toolkit_rest::Error>(())
    /// ```
    pub fn from_keywords<'a, I>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a str, SoqlValue)>,
    {
        let mut filters = pairs
            .into_iter()
            .map(|(key, value)| {
                let (field, operator) = parse_keyword(key)?;
                Ok(Filter::compare(field, operator, value))
            })
            .collect::<Result<Vec<_>>>()?;

        match filters.len() {
            0 => Err(Error::validation("no keyword filters given")),
            1 => Ok(filters.remove(0)),
            _ => Ok(Filter::And(filters)),
        }
    }

    /// Render the tree. Nested boolean groups are parenthesized.
    pub fn render(&self) -> Result<String> {
        match self {
            Filter::Comparison {
                field,
                operator,
                value,
            } => {
                if !is_field_expression(field) {
                    return Err(Error::validation(format!("invalid field name '{field}'")));
                }
                match (operator.takes_set(), value) {
                    (true, SoqlValue::List(_)) => {}
                    (true, SoqlValue::Subquery(_))
                        if matches!(operator, Operator::In | Operator::NotIn) => {}
                    (true, _) => {
                        return Err(Error::validation(format!(
                            "{operator} on '{field}' needs a list of values"
                        )))
                    }
                    (false, SoqlValue::List(_) | SoqlValue::Subquery(_)) => {
                        return Err(Error::validation(format!(
                            "{operator} on '{field}' needs a single value"
                        )))
                    }
                    (false, SoqlValue::Substring(_)) if *operator != Operator::Like => {
                        return Err(Error::validation(format!(
                            "substring match on '{field}' needs LIKE"
                        )))
                    }
                    (false, _) => {}
                }
                Ok(format!("{field} {operator} {}", value.render()?))
            }
            Filter::And(filters) => Self::join(filters, " AND "),
            Filter::Or(filters) => Self::join(filters, " OR "),
            Filter::Not(inner) => Ok(format!("NOT ({})", inner.render()?)),
            Filter::Raw(raw) => Ok(raw.clone()),
        }
    }

    fn join(filters: &[Filter], separator: &str) -> Result<String> {
        if filters.is_empty() {
            return Err(Error::validation("empty boolean group"));
        }
        let parts = filters
            .iter()
            .map(|filter| match filter {
                Filter::And(_) | Filter::Or(_) | Filter::Raw(_) if filters.len() > 1 => {
                    Ok(format!("({})", filter.render()?))
                }
                _ => filter.render(),
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(parts.join(separator))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_value_rendering() {
        assert_eq!(SoqlValue::Null.render().unwrap(), "NULL");
        assert_eq!(SoqlValue::from(true).render().unwrap(), "TRUE");
        assert_eq!(SoqlValue::from(42).render().unwrap(), "42");
        assert_eq!(SoqlValue::from(2.5).render().unwrap(), "2.5");
        assert_eq!(
            SoqlValue::from("it's \"x\"\n").render().unwrap(),
            "'it\\'s \\\"x\\\"\\n'"
        );
        assert_eq!(
            SoqlValue::from(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap())
                .render()
                .unwrap(),
            "2024-02-29"
        );
        assert_eq!(
            SoqlValue::from(vec!["a", "b"]).render().unwrap(),
            "('a', 'b')"
        );
        assert!(SoqlValue::Number(f64::NAN).render().is_err());
        assert!(SoqlValue::List(vec![]).render().is_err());
    }

    #[test]
    fn test_datetime_rendered_in_utc() {
        let offset = FixedOffset::east_opt(2 * 3600).unwrap();
        let local = offset.with_ymd_and_hms(2024, 6, 1, 10, 30, 15).unwrap();
        assert_eq!(
            SoqlValue::from(local).render().unwrap(),
            "2024-06-01T08:30:15Z"
        );
    }

    #[test]
    fn test_date_literals_are_checked() {
        assert_eq!(
            SoqlValue::DateLiteral("LAST_N_DAYS:30".into()).render().unwrap(),
            "LAST_N_DAYS:30"
        );
        assert!(SoqlValue::DateLiteral("TODAY OR Id != null".into())
            .render()
            .is_err());
    }

    #[test]
    fn test_keyword_parsing() {
        assert_eq!(parse_keyword("Name").unwrap(), ("Name", Operator::Eq));
        assert_eq!(parse_keyword("Amount__gt").unwrap(), ("Amount", Operator::Gt));
        assert_eq!(
            parse_keyword("Amount__c__lte").unwrap(),
            ("Amount__c", Operator::Lte)
        );
        assert_eq!(parse_keyword("Region__c").unwrap(), ("Region__c", Operator::Eq));
        assert_eq!(
            parse_keyword("Status__not_in").unwrap(),
            ("Status", Operator::NotIn)
        );
        assert_eq!(
            parse_keyword("Article__kav").unwrap(),
            ("Article__kav", Operator::Eq)
        );

        let err = parse_keyword("Name__between").unwrap_err();
        assert!(err.to_string().contains("between"));
    }

    #[test]
    fn test_nested_groups_are_parenthesized() {
        let filter = Filter::eq("Industry", "Technology").and(
            Filter::gt("AnnualRevenue", 1_000_000).or(Filter::eq("Rating", "Hot")),
        );
        assert_eq!(
            filter.render().unwrap(),
            "Industry = 'Technology' AND (AnnualRevenue > 1000000 OR Rating = 'Hot')"
        );

        let negated = Filter::is_in("Type", vec!["Partner", "Customer"]).negate();
        assert_eq!(
            negated.render().unwrap(),
            "NOT (Type IN ('Partner', 'Customer'))"
        );
    }

    #[test]
    fn test_contains_escapes_wildcards() {
        let filter = Filter::contains("Name", "50%_off");
        assert_eq!(filter.render().unwrap(), "Name LIKE '%50\\%\\_off%'");
    }

    #[test]
    fn test_operator_value_shape_checked() {
        assert!(Filter::eq("Name", vec!["a"]).render().is_err());
        assert!(Filter::is_in("Name", "a").render().is_err());
        assert!(Filter::eq("Name'; DELETE", "a").render().is_err());
        assert!(Filter::And(vec![]).render().is_err());
        assert_eq!(
            Filter::compare("Colors__c", Operator::Includes, vec!["Red", "Blue"])
                .render()
                .unwrap(),
            "Colors__c INCLUDES ('Red', 'Blue')"
        );
    }

    #[test]
    fn test_from_keywords() {
        let single = Filter::from_keywords([("Name", SoqlValue::from("Acme"))]).unwrap();
        assert_eq!(single, Filter::eq("Name", "Acme"));
        assert!(Filter::from_keywords(std::iter::empty()).is_err());
        assert!(Filter::from_keywords([("Name__nope", SoqlValue::Null)]).is_err());
    }
}
