//! List query parameters and in-memory evaluation
//!
//! Both `_sort` and `sort` style parameter names are accepted; the
//! underscore form wins when both are given, except for `q` which
//! takes precedence over `_q`.

use crate::document::{compare_values, Document};
use regex::{Regex, RegexBuilder};

/// Fields searched by the free-text filter
pub const TEXT_FIELDS: &[&str] = &["name", "title", "description"];

/// Raw query string parameters as they arrive over HTTP
#[derive(Debug, Default)]
pub struct ListParams {
    pub q: Option<String>,
    pub q_alias: Option<String>,
    pub sort: Option<String>,
    pub sort_alias: Option<String>,
    pub order: Option<String>,
    pub order_alias: Option<String>,
    pub limit: Option<String>,
    pub limit_alias: Option<String>,
    pub page: Option<String>,
    pub page_alias: Option<String>,
}

/// Build from decoded query pairs. The first value of a repeated key is
/// kept; unknown keys are ignored.
impl FromIterator<(String, String)> for ListParams {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(pairs: I) -> Self {
        let mut params = ListParams::default();
        for (key, value) in pairs {
            let slot = match key.as_str() {
                "q" => &mut params.q,
                "_q" => &mut params.q_alias,
                "sort" => &mut params.sort,
                "_sort" => &mut params.sort_alias,
                "order" => &mut params.order,
                "_order" => &mut params.order_alias,
                "limit" => &mut params.limit,
                "_limit" => &mut params.limit_alias,
                "page" => &mut params.page,
                "_page" => &mut params.page_alias,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value);
            }
        }
        params
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    /// Anything other than `desc` sorts ascending
    pub fn parse(s: &str) -> Self {
        if s == "desc" { SortOrder::Desc } else { SortOrder::Asc }
    }

    pub fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// A parsed List request
#[derive(Debug, Clone, Default)]
pub struct ListQuery {
    pub text: Option<String>,
    pub sort: Option<String>,
    pub order: SortOrder,
    /// 0 disables pagination
    pub limit: usize,
    /// 1-based; 0 is treated as the first page
    pub page: usize,
}

impl ListQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_sort(mut self, field: impl Into<String>, order: SortOrder) -> Self {
        self.sort = Some(field.into());
        self.order = order;
        self
    }

    pub fn with_page(mut self, limit: usize, page: usize) -> Self {
        self.limit = limit;
        self.page = page;
        self
    }

    pub fn is_paginated(&self) -> bool {
        self.limit > 0
    }

    /// Number of documents skipped before the requested page
    pub fn offset(&self) -> usize {
        self.page.max(1).saturating_sub(1).saturating_mul(self.limit)
    }

    pub fn text_filter(&self) -> Option<TextFilter> {
        self.text.as_deref().map(TextFilter::new)
    }
}

impl From<ListParams> for ListQuery {
    fn from(p: ListParams) -> Self {
        let pick = |first: Option<String>, second: Option<String>| {
            first.or(second).filter(|s| !s.is_empty())
        };
        Self {
            text: pick(p.q, p.q_alias),
            sort: pick(p.sort_alias, p.sort),
            order: pick(p.order_alias, p.order)
                .map(|o| SortOrder::parse(&o))
                .unwrap_or_default(),
            limit: parse_count(pick(p.limit_alias, p.limit)),
            page: parse_count(pick(p.page_alias, p.page)),
        }
    }
}

fn parse_count(raw: Option<String>) -> usize {
    raw.and_then(|s| s.trim().parse::<i64>().ok())
        .filter(|n| *n > 0)
        .map(|n| n as usize)
        .unwrap_or(0)
}

/// Case-insensitive pattern over the text fields.
///
/// The text is used as a regular expression when it compiles and is
/// matched literally otherwise.
#[derive(Debug, Clone)]
pub struct TextFilter {
    // None when even the escaped text exceeds the regex size limit
    regex: Option<Regex>,
}

impl TextFilter {
    pub fn new(text: &str) -> Self {
        let regex = build_pattern(text)
            .or_else(|_| build_pattern(&regex::escape(text)))
            .ok();
        Self { regex }
    }

    /// The compiled pattern, matched case-insensitively
    pub fn pattern(&self) -> Option<&Regex> {
        self.regex.as_ref()
    }

    pub fn matches(&self, doc: &Document) -> bool {
        let Some(regex) = &self.regex else {
            return false;
        };
        TEXT_FIELDS.iter().any(|field| match doc.get(*field) {
            Some(serde_json::Value::String(s)) => regex.is_match(s),
            Some(serde_json::Value::Number(n)) => regex.is_match(&n.to_string()),
            _ => false,
        })
    }
}

fn build_pattern(text: &str) -> Result<Regex, regex::Error> {
    RegexBuilder::new(text).case_insensitive(true).build()
}

/// One page of List results
#[derive(Debug, Clone, Default)]
pub struct ListPage {
    pub items: Vec<Document>,
    /// Pre-pagination count, only reported when a limit was applied
    pub total: Option<usize>,
}

/// Filter, sort and paginate documents held in memory
pub fn apply(docs: Vec<Document>, query: &ListQuery) -> ListPage {
    let mut items: Vec<Document> = match query.text_filter() {
        Some(filter) => docs.into_iter().filter(|d| filter.matches(d)).collect(),
        None => docs,
    };

    if let Some(field) = &query.sort {
        items.sort_by(|a, b| {
            let ord = compare_values(a.get(field), b.get(field));
            match query.order {
                SortOrder::Asc => ord,
                SortOrder::Desc => ord.reverse(),
            }
        });
    }

    if !query.is_paginated() {
        return ListPage { items, total: None };
    }

    let total = items.len();
    let items = items
        .into_iter()
        .skip(query.offset())
        .take(query.limit)
        .collect();
    ListPage { items, total: Some(total) }
}
