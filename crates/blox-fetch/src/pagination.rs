//! Cursor pagination
//!
//! List endpoints return one page at a time together with an opaque cursor
//! for the next page; an absent cursor means the list is exhausted. The
//! aggregator drives `Fetcher::execute` across cursors until it has
//! `max_results` items or upstream runs out.

use std::collections::HashSet;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::descriptor::RequestDescriptor;
use crate::error::{ErrorRecord, Result};
use crate::executor::Fetcher;

pub const CURSOR_PARAM: &str = "cursor";
pub const LIMIT_PARAM: &str = "limit";

/// One page as produced by an extractor.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<String>,
}

/// The uniform `{ "data": [...], "nextPageCursor": "..." | null }` list body.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Envelope<T> {
    data: Vec<T>,
    #[serde(default)]
    next_page_cursor: Option<String>,
}

/// Default extractor for enveloped list endpoints.
pub fn envelope_page<T: DeserializeOwned>(value: &Value) -> Result<Page<T>> {
    let envelope = Envelope::<T>::deserialize(value)
        .map_err(|e| ErrorRecord::invalid_response(format!("unexpected list envelope: {e}")))?;
    Ok(Page {
        items: envelope.data,
        next_cursor: envelope.next_page_cursor,
    })
}

impl Fetcher {
    /// Collect up to `max_results` items from a cursor-paged endpoint.
    ///
    /// The first call carries no cursor. Each later call is `descriptor` with
    /// the previous page's cursor injected. A `limit` of the configured page
    /// size is added unless the descriptor already sets one. An empty cursor
    /// ends the list, and so does any cursor already sent during this walk.
    #[instrument(
        skip_all,
        fields(service = descriptor.service(), path = descriptor.path(), max_results = max_results)
    )]
    pub async fn fetch_list<T, F>(
        &self,
        descriptor: &RequestDescriptor,
        extract: F,
        max_results: usize,
    ) -> Result<Vec<T>>
    where
        F: Fn(&Value) -> Result<Page<T>>,
    {
        let mut items = Vec::new();
        if max_results == 0 {
            return Ok(items);
        }

        let base = if descriptor.param(LIMIT_PARAM).is_some() {
            descriptor.clone()
        } else {
            descriptor.with_param(LIMIT_PARAM, self.config().page_size)
        };

        let mut cursor: Option<String> = None;
        let mut sent: HashSet<String> = HashSet::new();
        let mut pages = 0usize;
        loop {
            let request = match &cursor {
                Some(cursor) => base.with_param(CURSOR_PARAM, cursor),
                None => base.clone(),
            };
            let value = self.execute(&request).await?;
            let page = extract(&value)?;
            pages += 1;

            let remaining = max_results - items.len();
            items.extend(page.items.into_iter().take(remaining));
            if items.len() >= max_results {
                break;
            }

            match page.next_cursor.filter(|next| !next.is_empty()) {
                None => break,
                Some(next) if sent.contains(&next) => {
                    warn!(cursor = %next, "upstream repeated a cursor, stopping");
                    break;
                }
                Some(next) => {
                    sent.insert(next.clone());
                    cursor = Some(next);
                }
            }
        }

        debug!(pages, items = items.len(), "list fetched");
        Ok(items)
    }

    /// `fetch_list` with the standard envelope extractor.
    pub async fn fetch_envelope_list<T: DeserializeOwned>(
        &self,
        descriptor: &RequestDescriptor,
        max_results: usize,
    ) -> Result<Vec<T>> {
        self.fetch_list(descriptor, envelope_page::<T>, max_results)
            .await
    }
}
