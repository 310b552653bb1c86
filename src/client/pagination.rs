//! Pagination cursors derived from response data.
//!
//! A pageable operation declares input-token names, output-token path
//! expressions, and optionally a "more results" path and a result key.
//! The cursor evaluates those expressions against decoded response data
//! and merges extracted tokens into a copy of the prior parameters for
//! the following call. A response with no extractable output token is a
//! terminal page, never an error — even if the service claims more data
//! exists.

use serde_json::Value;

use crate::error::SdkError;
use crate::schema::Paginator;

use super::Client;

/// Evaluates a path expression against decoded response data.
///
/// Supported grammar: dot-separated member names, numeric indexing with
/// `[n]` (negative indexes count from the end), and `||` alternatives
/// tried left to right.
#[must_use]
pub fn evaluate_path(data: &Value, expression: &str) -> Option<Value> {
    expression
        .split("||")
        .map(str::trim)
        .find_map(|alternative| evaluate_single(data, alternative))
}

fn evaluate_single(data: &Value, expression: &str) -> Option<Value> {
    let mut current = data.clone();
    for segment in expression.split('.') {
        let (name, indexes) = parse_segment(segment)?;
        if !name.is_empty() {
            current = current.get(name)?.clone();
        }
        for index in indexes {
            let array = current.as_array()?;
            let position = if index < 0 {
                let back = usize::try_from(index.unsigned_abs()).ok()?;
                array.len().checked_sub(back)?
            } else {
                usize::try_from(index).ok()?
            };
            current = array.get(position)?.clone();
        }
    }
    if current.is_null() {
        None
    } else {
        Some(current)
    }
}

fn parse_segment(segment: &str) -> Option<(&str, Vec<i64>)> {
    let Some(bracket) = segment.find('[') else {
        return Some((segment, Vec::new()));
    };
    let name = &segment[..bracket];
    let mut indexes = Vec::new();
    let mut rest = &segment[bracket..];
    while let Some(stripped) = rest.strip_prefix('[') {
        let end = stripped.find(']')?;
        indexes.push(stripped[..end].parse().ok()?);
        rest = &stripped[end + 1..];
    }
    if rest.is_empty() {
        Some((name, indexes))
    } else {
        None
    }
}

/// Returns true if the response data yields a next page.
#[must_use]
pub fn has_next_page(paginator: &Paginator, data: &Value) -> bool {
    // An unextractable output token always ends pagination.
    let tokens = output_tokens(paginator, data);
    if tokens.iter().all(Option::is_none) {
        return false;
    }
    if let Some(more_results) = &paginator.more_results {
        if let Some(more) = evaluate_path(data, more_results) {
            return more.as_bool().unwrap_or(true);
        }
    }
    true
}

/// Derives the parameters of the following call, or `None` on a terminal
/// page.
#[must_use]
pub fn next_page_params(paginator: &Paginator, data: &Value, prior: &Value) -> Option<Value> {
    if !has_next_page(paginator, data) {
        return None;
    }
    let mut params = match prior {
        Value::Object(map) => map.clone(),
        _ => serde_json::Map::new(),
    };
    for (input_token, token) in paginator
        .input_tokens
        .iter()
        .zip(output_tokens(paginator, data))
    {
        if let Some(token) = token {
            params.insert(input_token.clone(), token);
        }
    }
    Some(Value::Object(params))
}

fn output_tokens(paginator: &Paginator, data: &Value) -> Vec<Option<Value>> {
    paginator
        .output_tokens
        .iter()
        .map(|expression| evaluate_path(data, expression))
        .collect()
}

/// Sequential page iterator for one pageable operation.
///
/// Created by [`Client::pager`]; each call to [`next_page`](Self::next_page)
/// issues one request with the accumulated cursor parameters.
#[derive(Debug)]
pub struct Pager {
    client: Client,
    operation: String,
    paginator: Paginator,
    params: Value,
    finished: bool,
}

impl Pager {
    pub(super) fn new(
        client: Client,
        operation: impl Into<String>,
        paginator: Paginator,
        params: Value,
    ) -> Self {
        Self {
            client,
            operation: operation.into(),
            paginator,
            params,
            finished: false,
        }
    }

    /// Fetches the next page, or returns `None` after the terminal page.
    ///
    /// A failed request ends pagination; the error is yielded once.
    pub async fn next_page(&mut self) -> Option<Result<Value, SdkError>> {
        if self.finished {
            return None;
        }

        let request = match self.client.invoke(&self.operation, self.params.clone()) {
            Ok(request) => request,
            Err(error) => {
                self.finished = true;
                return Some(Err(error));
            }
        };
        match request.send().await {
            Ok(data) => {
                match next_page_params(&self.paginator, &data, &self.params) {
                    Some(next_params) => self.params = next_params,
                    None => self.finished = true,
                }
                Some(Ok(data))
            }
            Err(error) => {
                self.finished = true;
                Some(Err(error))
            }
        }
    }

    /// Collects the declared result-key items from every remaining page,
    /// in order.
    ///
    /// # Errors
    ///
    /// Returns the first request error encountered.
    pub async fn items(&mut self) -> Result<Vec<Value>, SdkError> {
        let mut collected = Vec::new();
        while let Some(page) = self.next_page().await {
            let data = page?;
            if let Some(result_key) = &self.paginator.result_key {
                if let Some(Value::Array(items)) = evaluate_path(&data, result_key) {
                    collected.extend(items);
                }
            } else {
                collected.push(data);
            }
        }
        Ok(collected)
    }
}
