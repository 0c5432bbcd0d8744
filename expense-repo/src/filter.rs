//! Parameterized WHERE clause assembly for the list queries.
//!
//! A [`WhereClause`] is an ordered list of predicates, each a fragment of SQL
//! with exactly one bound parameter. Predicates are joined with `AND` in the
//! order they were added, so the same criteria always compile to the same SQL.

use crate::document_repo::DocumentFilter;
use crate::payment_repo::PaymentFilter;
use chrono::NaiveDate;
use sqlx::{QueryBuilder, Sqlite};

pub const DEFAULT_LIMIT: i64 = 10;

#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Text(String),
    Date(NaiveDate),
    Bool(bool),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub prefix: &'static str,
    pub value: FilterValue,
    pub suffix: &'static str,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WhereClause {
    predicates: Vec<Predicate>,
}

impl WhereClause {
    pub fn new() -> Self {
        WhereClause::default()
    }

    pub fn with(mut self, prefix: &'static str, value: FilterValue, suffix: &'static str) -> Self {
        self.predicates.push(Predicate {
            prefix,
            value,
            suffix,
        });
        self
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    pub fn push_to(&self, query_builder: &mut QueryBuilder<'_, Sqlite>) {
        for (i, predicate) in self.predicates.iter().enumerate() {
            query_builder.push(if i == 0 { " WHERE " } else { " AND " });
            query_builder.push(predicate.prefix);
            match &predicate.value {
                FilterValue::Text(text) => query_builder.push_bind(text.clone()),
                FilterValue::Date(date) => query_builder.push_bind(*date),
                FilterValue::Bool(flag) => query_builder.push_bind(*flag),
            };
            query_builder.push(predicate.suffix);
        }
    }
}

impl From<&PaymentFilter> for WhereClause {
    fn from(filter: &PaymentFilter) -> Self {
        let mut clause = WhereClause::new();
        if let Some(tag) = &filter.tag {
            clause = clause.with(
                "EXISTS (SELECT 1 FROM payment_tags f WHERE f.payment_id = p.id AND f.tag_id = ",
                FilterValue::Text(tag.clone()),
                ")",
            );
        }
        if let Some(start_date) = filter.start_date {
            clause = clause.with("p.date_paid >= ", FilterValue::Date(start_date), "");
        }
        if let Some(end_date) = filter.end_date {
            clause = clause.with("p.date_paid <= ", FilterValue::Date(end_date), "");
        }
        if let Some(fully_paid) = filter.fully_paid {
            clause = clause.with("p.fully_paid = ", FilterValue::Bool(fully_paid), "");
        }
        clause
    }
}

impl From<&DocumentFilter> for WhereClause {
    fn from(filter: &DocumentFilter) -> Self {
        let mut clause = WhereClause::new();
        if let Some(tag) = &filter.tag {
            clause = clause.with(
                "EXISTS (SELECT 1 FROM document_tags f WHERE f.document_id = d.id AND f.tag_id = ",
                FilterValue::Text(tag.clone()),
                ")",
            );
        }
        clause
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageOptions {
    pub offset: i64,
    pub limit: i64,
}

impl PageOptions {
    /// Page numbers start at 1. A page whose offset does not fit in an `i64`
    /// falls back to the first page.
    pub fn from_page(page: i64, limit: i64) -> PageOptions {
        let limit = if limit > 0 { limit } else { DEFAULT_LIMIT };
        let offset = (page.max(1) - 1).checked_mul(limit).unwrap_or(0);
        PageOptions { offset, limit }
    }

    pub fn from_offset(offset: i64, limit: i64) -> PageOptions {
        PageOptions {
            offset: offset.max(0),
            limit: if limit > 0 { limit } else { DEFAULT_LIMIT },
        }
    }

    pub fn push_to(&self, query_builder: &mut QueryBuilder<'_, Sqlite>) {
        query_builder
            .push(" LIMIT ")
            .push_bind(self.limit)
            .push(" OFFSET ")
            .push_bind(self.offset);
    }
}

impl Default for PageOptions {
    fn default() -> Self {
        PageOptions::from_offset(0, DEFAULT_LIMIT)
    }
}
