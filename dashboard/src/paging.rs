//! Offset/limit handling, query string pass-through and pager windows.

use serde::Serialize;
use url::form_urlencoded;

pub const DEFAULT_PAGE_SIZE: u64 = 15;
const PAGER_WIDTH: u64 = 6;

/// Multi-valued query parameters that keep the order keys were first seen in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    entries: Vec<(String, Vec<String>)>,
}

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse(raw: &str) -> Self {
        let mut params = QueryParams::new();
        for (key, value) in form_urlencoded::parse(raw.as_bytes()) {
            params.add(&key, &value);
        }
        params
    }

    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        K: AsRef<str>,
        V: AsRef<str>,
        I: IntoIterator<Item = (K, V)>,
    {
        let mut params = QueryParams::new();
        for (key, value) in pairs {
            params.add(key.as_ref(), value.as_ref());
        }
        params
    }

    pub fn add(&mut self, key: &str, value: &str) {
        match self.entries.iter_mut().find(|(k, _)| k == key) {
            Some((_, values)) => values.push(value.to_string()),
            None => self.entries.push((key.to_string(), vec![value.to_string()])),
        }
    }

    /// Replaces every value of `key`, keeping the key's position if present.
    pub fn set(&mut self, key: &str, value: &str) {
        match self.entries.iter_mut().find(|(k, _)| k == key) {
            Some((_, values)) => *values = vec![value.to_string()],
            None => self.entries.push((key.to_string(), vec![value.to_string()])),
        }
    }

    pub fn set_all(&mut self, key: &str, values: Vec<String>) {
        match self.entries.iter_mut().find(|(k, _)| k == key) {
            Some((_, existing)) => *existing = values,
            None => self.entries.push((key.to_string(), values)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.get_all(key).first().map(String::as_str)
    }

    pub fn get_all(&self, key: &str) -> &[String] {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    pub fn remove(&mut self, key: &str) {
        self.entries.retain(|(k, _)| k != key);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Adds every key of `other`, replacing keys that already exist here.
    pub fn merge(&mut self, other: &QueryParams) {
        for (key, values) in &other.entries {
            self.set_all(key, values.clone());
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .flat_map(|(k, values)| values.iter().map(move |v| (k.as_str(), v.as_str())))
    }

    pub fn encode(&self) -> String {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        for (key, value) in self.iter() {
            serializer.append_pair(key, value);
        }
        serializer.finish()
    }
}

/// Removes `exclude` keys, blank values, duplicate values within a key and keys left empty.
pub fn sanitize_params(params: &mut QueryParams, exclude: &[&str]) {
    for key in exclude {
        params.remove(key);
    }

    for (_, values) in params.entries.iter_mut() {
        let mut kept: Vec<String> = Vec::with_capacity(values.len());
        for value in values.drain(..) {
            if !value.is_empty() && !kept.contains(&value) {
                kept.push(value);
            }
        }
        *values = kept;
    }

    params.entries.retain(|(_, values)| !values.is_empty());
}

fn parse_positive(value: Option<&str>) -> Option<u64> {
    value
        .and_then(|v| v.trim().parse::<u64>().ok())
        .filter(|v| *v > 0)
}

/// Offset and page size for a list request. Never fails; bad input falls back to defaults.
pub fn offset_and_limit(params: &QueryParams) -> (u64, u64) {
    let limit = parse_positive(params.get("limit")).unwrap_or(DEFAULT_PAGE_SIZE);

    let offset = match params.get("offset").and_then(|v| v.trim().parse::<u64>().ok()) {
        Some(offset) => offset,
        None => {
            let page = parse_positive(params.get("page")).unwrap_or(1);
            (page - 1).saturating_mul(limit)
        }
    };

    (offset, limit)
}

/// One-based page index, from `page` or derived from the offset.
pub fn page_index(params: &QueryParams, offset: u64, limit: u64) -> u64 {
    parse_positive(params.get("page")).unwrap_or_else(|| offset / limit.max(1) + 1)
}

/// Index of the last page. Zero when there is nothing to show.
pub fn page_last(total_records: u64, limit: u64) -> u64 {
    total_records.div_ceil(limit.max(1))
}

/// Page numbers for a pager: the first page, a window around `current`, and the last page.
pub fn pager_indexes(current: u64, last: u64) -> Vec<u64> {
    if last <= 1 {
        return vec![1];
    }

    let current = current.clamp(1, last);
    let mut start = current.saturating_sub(PAGER_WIDTH / 2);
    start = start.min(last.saturating_sub(PAGER_WIDTH)).max(1);

    let mut result = vec![1];
    if start != 1 {
        start += 1;
        result.push(start);
    }

    let mut page = start + 1;
    while (result.len() as u64) < PAGER_WIDTH && page < last {
        result.push(page);
        page += 1;
    }

    if result.last().copied().unwrap_or(0) < last {
        result.push(last);
    }

    result
}

/// Paging state handed to templates to rebuild pager links.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Paging {
    pub page_index: u64,
    pub page_last: u64,
    pub page_size: u64,
    pub offset: u64,
    pub count: usize,
    pub total: u64,
    pub pages: Vec<u64>,
    /// Sanitised query without pagination keys, already encoded.
    pub query: String,
    pub target_url: String,
    pub target_id: String,
}

impl Paging {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        page_index: u64,
        page_size: u64,
        offset: u64,
        count: usize,
        total: u64,
        query: &QueryParams,
        target_url: &str,
        target_id: &str,
    ) -> Self {
        let page_last = page_last(total, page_size);
        Paging {
            page_index,
            page_last,
            page_size,
            offset,
            count,
            total,
            pages: pager_indexes(page_index, page_last),
            query: query.encode(),
            target_url: target_url.to_string(),
            target_id: target_id.to_string(),
        }
    }

    /// Link to `page` keeping the current filters.
    pub fn href(&self, page: u64) -> String {
        let mut link = format!("{}?page={}&limit={}", self.target_url, page, self.page_size);
        if !self.query.is_empty() {
            link.push('&');
            link.push_str(&self.query);
        }
        link
    }
}
