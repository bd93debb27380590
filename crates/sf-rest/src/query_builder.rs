//! Safe query builder with automatic SOQL injection prevention.
//!
//! Values are always rendered through [`SoqlValue`], so user input is quoted
//! and escaped; field and object names are checked against the SOQL
//! identifier rules and rejected, never silently dropped.
//!
//! # Example
//!
//! ```rust
//! use sf_toolkit_rest::QueryBuilder;
//!
//! let soql = QueryBuilder::new("Account")?
//!     .select(["Id", "Name", "Industry"])?
//!     .where_eq("Industry", "Technology")?
//!     .limit(5)
//!     .build()?;
//!
//! assert_eq!(
//!     soql,
//!     "SELECT Id, Name, Industry FROM Account WHERE Industry = 'Technology' LIMIT 5"
//! );
//! # Ok::<(), sf_toolkit_rest::Error>(())
//! ```

use std::sync::Arc;

use sf_toolkit_client::security::soql;
use sf_toolkit_records::SObjectSchema;

use crate::error::{Error, Result};
use crate::filter::{is_field_expression, Filter, Operator, SoqlValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrderDirection {
    #[default]
    Asc,
    Desc,
}

impl OrderDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderDirection::Asc => "ASC",
            OrderDirection::Desc => "DESC",
        }
    }
}

/// A SOQL query under construction.
///
/// Rendering ([`build`](Self::build) and friends) borrows the builder and
/// produces the same text every time.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryBuilder {
    sobject: String,
    fields: Vec<String>,
    subqueries: Vec<QueryBuilder>,
    filter: Option<Filter>,
    group_by: Vec<String>,
    having: Option<Filter>,
    order_by: Vec<(String, OrderDirection)>,
    limit: Option<u64>,
    offset: Option<u64>,
    tooling: bool,
    schema: Option<Arc<SObjectSchema>>,
}

impl QueryBuilder {
    /// Create a new query builder for the given SObject.
    pub fn new(sobject: impl AsRef<str>) -> Result<Self> {
        let sobject = sobject.as_ref();
        if !soql::is_safe_sobject_name(sobject) {
            return Err(Error::validation(format!("invalid SObject name '{sobject}'")));
        }

        Ok(Self {
            sobject: sobject.to_string(),
            fields: Vec::new(),
            subqueries: Vec::new(),
            filter: None,
            group_by: Vec::new(),
            having: None,
            order_by: Vec::new(),
            limit: None,
            offset: None,
            tooling: false,
            schema: None,
        })
    }

    /// A query over a registered schema. Without an explicit `select`, every
    /// field of the schema is selected, and rows decode into typed records.
    pub fn for_schema(schema: Arc<SObjectSchema>) -> Result<Self> {
        let mut builder = Self::new(schema.name())?;
        builder.tooling = schema.is_tooling();
        builder.schema = Some(schema);
        Ok(builder)
    }

    pub fn sobject(&self) -> &str {
        &self.sobject
    }

    pub fn schema(&self) -> Option<&Arc<SObjectSchema>> {
        self.schema.as_ref()
    }

    pub fn is_tooling(&self) -> bool {
        self.tooling
    }

    /// Add fields to the SELECT list.
    ///
    /// Accepts dotted relationship paths (`Owner.Name`) and aggregate calls
    /// (`COUNT(Id)`, `MAX(Amount) maxAmount`).
    pub fn select<I, S>(mut self, fields: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for field in fields {
            let field = field.as_ref();
            if !is_select_expression(field) {
                return Err(Error::validation(format!("invalid field name '{field}'")));
            }
            self.fields.push(field.to_string());
        }
        Ok(self)
    }

    /// Add a child-relationship subquery, e.g. `(SELECT Id FROM Contacts)`.
    pub fn select_subquery(mut self, subquery: QueryBuilder) -> Self {
        self.subqueries.push(subquery);
        self
    }

    /// AND a filter tree into the WHERE clause.
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = Some(match self.filter.take() {
            Some(existing) => existing.and(filter),
            None => filter,
        });
        self
    }

    fn where_compare(self, field: &str, operator: Operator, value: SoqlValue) -> Result<Self> {
        check_field(field)?;
        Ok(self.filter(Filter::compare(field, operator, value)))
    }

    /// Add a WHERE condition with equality check. The value is escaped.
    pub fn where_eq(self, field: &str, value: impl Into<SoqlValue>) -> Result<Self> {
        self.where_compare(field, Operator::Eq, value.into())
    }

    pub fn where_ne(self, field: &str, value: impl Into<SoqlValue>) -> Result<Self> {
        self.where_compare(field, Operator::Ne, value.into())
    }

    pub fn where_in<I, V>(self, field: &str, values: I) -> Result<Self>
    where
        I: IntoIterator<Item = V>,
        V: Into<SoqlValue>,
    {
        let values = SoqlValue::List(values.into_iter().map(Into::into).collect());
        self.where_compare(field, Operator::In, values)
    }

    /// `field LIKE 'pattern'`. `%` and `_` in the pattern act as wildcards;
    /// quotes and backslashes are escaped.
    pub fn where_like(self, field: &str, pattern: &str) -> Result<Self> {
        self.where_compare(field, Operator::Like, SoqlValue::from(pattern))
    }

    /// `field LIKE '%value%'`, with wildcards in `value` escaped.
    pub fn where_contains(self, field: &str, value: &str) -> Result<Self> {
        self.where_compare(field, Operator::Like, SoqlValue::Substring(value.to_string()))
    }

    /// Add a raw WHERE condition.
    ///
    /// **WARNING**: This does NOT escape user input! Only use with trusted input.
    pub fn where_raw(self, condition: impl Into<String>) -> Self {
        self.filter(Filter::Raw(condition.into()))
    }

    /// Keyword-style filters: `("Amount__gte", 100.into())`.
    pub fn where_fields<'a, I>(self, pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a str, SoqlValue)>,
    {
        Ok(self.filter(Filter::from_keywords(pairs)?))
    }

    pub fn group_by<I, S>(mut self, fields: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for field in fields {
            let field = field.as_ref();
            check_field(field)?;
            self.group_by.push(field.to_string());
        }
        Ok(self)
    }

    /// HAVING clause; only valid together with `group_by`.
    pub fn having(mut self, filter: Filter) -> Self {
        self.having = Some(match self.having.take() {
            Some(existing) => existing.and(filter),
            None => filter,
        });
        self
    }

    pub fn order_by(mut self, field: &str, direction: OrderDirection) -> Result<Self> {
        check_field(field)?;
        self.order_by.push((field.to_string(), direction));
        Ok(self)
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Route the query to the Tooling API.
    pub fn tooling(mut self, tooling: bool) -> Self {
        self.tooling = tooling;
        self
    }

    /// Render the SOQL query string.
    pub fn build(&self) -> Result<String> {
        let mut select: Vec<String> = if self.fields.is_empty() {
            self.schema
                .as_ref()
                .map(|schema| schema.field_names().map(str::to_string).collect())
                .unwrap_or_default()
        } else {
            self.fields.clone()
        };
        for subquery in &self.subqueries {
            select.push(format!("({})", subquery.build()?));
        }
        if select.is_empty() {
            return Err(Error::validation(format!(
                "no fields selected for query on {}",
                self.sobject
            )));
        }

        let mut query = format!("SELECT {} FROM {}", select.join(", "), self.sobject);
        self.push_where(&mut query)?;

        if !self.group_by.is_empty() {
            query.push_str(&format!(" GROUP BY {}", self.group_by.join(", ")));
        }
        if let Some(having) = &self.having {
            if self.group_by.is_empty() {
                return Err(Error::validation("HAVING requires GROUP BY"));
            }
            query.push_str(&format!(" HAVING {}", having.render()?));
        }

        if !self.order_by.is_empty() {
            let order: Vec<String> = self
                .order_by
                .iter()
                .map(|(field, direction)| format!("{field} {}", direction.as_str()))
                .collect();
            query.push_str(&format!(" ORDER BY {}", order.join(", ")));
        }
        if let Some(limit) = self.limit {
            query.push_str(&format!(" LIMIT {limit}"));
        }
        if let Some(offset) = self.offset {
            query.push_str(&format!(" OFFSET {offset}"));
        }

        Ok(query)
    }

    /// Render `SELECT COUNT() FROM ...` with the WHERE clause and LIMIT.
    /// The field list, grouping and ordering are ignored.
    pub fn build_count(&self) -> Result<String> {
        let mut query = format!("SELECT COUNT() FROM {}", self.sobject);
        self.push_where(&mut query)?;
        if let Some(limit) = self.limit {
            query.push_str(&format!(" LIMIT {limit}"));
        }
        Ok(query)
    }

    /// Render for a Bulk API 2.0 query job.
    ///
    /// Bulk queries reject ORDER BY, OFFSET, GROUP BY and child subqueries;
    /// they are refused here before any request is made.
    pub fn build_for_bulk(&self) -> Result<String> {
        if !self.order_by.is_empty() {
            return Err(Error::validation("ORDER BY is not supported by bulk queries"));
        }
        if self.offset.is_some() {
            return Err(Error::validation("OFFSET is not supported by bulk queries"));
        }
        if !self.group_by.is_empty() {
            return Err(Error::validation("GROUP BY is not supported by bulk queries"));
        }
        if !self.subqueries.is_empty() {
            return Err(Error::validation(
                "relationship subqueries are not supported by bulk queries",
            ));
        }
        self.build()
    }

    fn push_where(&self, query: &mut String) -> Result<()> {
        if let Some(filter) = &self.filter {
            query.push_str(" WHERE ");
            query.push_str(&filter.render()?);
        }
        Ok(())
    }
}

fn check_field(field: &str) -> Result<()> {
    if soql::is_safe_field_path(field) {
        Ok(())
    } else {
        Err(Error::validation(format!("invalid field name '{field}'")))
    }
}

/// A field expression with an optional alias: `MAX(Amount) maxAmount`.
fn is_select_expression(expr: &str) -> bool {
    match expr.split_once(' ') {
        Some((call, alias)) => {
            call.contains('(') && is_field_expression(call) && soql::is_safe_field_name(alias)
        }
        None => is_field_expression(expr),
    }
}
