//! Lenient parsing of list query parameters. Malformed paging values fall
//! back to their defaults instead of failing the request.

use crate::error::HandlerError;
use chrono::NaiveDate;
use expense_repo::filter::{PageOptions, DEFAULT_LIMIT};

fn parse_or(value: Option<&str>, default: i64) -> i64 {
    value
        .and_then(|v| v.trim().parse::<i64>().ok())
        .unwrap_or(default)
}

/// Page numbers start at 1. Returns the page and limit actually applied.
pub fn page(page: Option<&str>, limit: Option<&str>) -> (i64, i64, PageOptions) {
    let page_options = PageOptions::from_page(parse_or(page, 1), parse_or(limit, DEFAULT_LIMIT));
    let page = page_options.offset / page_options.limit + 1;
    (page, page_options.limit, page_options)
}

pub fn offset(offset: Option<&str>, limit: Option<&str>) -> PageOptions {
    PageOptions::from_offset(parse_or(offset, 0), parse_or(limit, DEFAULT_LIMIT))
}

/// Empty values count as absent.
pub fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

pub fn date(name: &str, value: Option<&str>) -> Result<Option<NaiveDate>, HandlerError> {
    value
        .map(|v| {
            NaiveDate::parse_from_str(v, "%Y-%m-%d").map_err(|_| {
                HandlerError::bad_request(format!("{} must be a date in YYYY-MM-DD format", name))
            })
        })
        .transpose()
}

/// `true` and `1` select paid entries; any other value selects unpaid ones.
pub fn flag(value: Option<&str>) -> Option<bool> {
    value.map(|v| v.eq_ignore_ascii_case("true") || v == "1")
}
