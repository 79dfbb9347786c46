//! Lazy, single-pass page sequence over a search.

use futures_util::future::try_join_all;
use futures_util::Stream;
use std::collections::BTreeMap;

use super::Client;
use crate::error::Result;
use crate::models::{Category, Page, SearchQuery, INITIAL_CURSOR};
use crate::transport::RequestKind;

enum State {
    Start,
    /// Categories with more results, and the cursor that fetches their next page
    Active(BTreeMap<Category, String>),
    Done,
}

/// Pages of a search, fetched one step at a time.
///
/// The first step requests every selected category at once. Later steps
/// request each category that still has results with its own cursor, and
/// merge the answers into one [`Page`]. The sequence ends after the step in
/// which every category's cursor is absent or unchanged.
///
/// An error ends the sequence: it is yielded once and the next call returns
/// `None`. Dropping a step's future part way also ends the sequence.
pub struct Pages {
    client: Client,
    query: SearchQuery,
    state: State,
    fetched: usize,
}

impl Pages {
    pub(crate) fn new(client: Client, query: SearchQuery) -> Self {
        Self {
            client,
            query,
            state: State::Start,
            fetched: 0,
        }
    }

    /// Pages yielded so far
    pub fn fetched(&self) -> usize {
        self.fetched
    }

    pub fn is_done(&self) -> bool {
        matches!(self.state, State::Done)
    }

    /// Fetch the next page
    pub async fn next(&mut self) -> Option<Result<Page>> {
        let sent = match std::mem::replace(&mut self.state, State::Done) {
            State::Done => return None,
            State::Start => self
                .query
                .selected_categories()
                .iter()
                .map(|c| (*c, INITIAL_CURSOR.to_string()))
                .collect::<BTreeMap<_, _>>(),
            State::Active(cursors) => cursors,
        };

        let result = if self.fetched == 0 {
            self.fetch_all(&sent).await
        } else {
            self.fetch_each(&sent).await
        };

        match result {
            Ok(page) => {
                let active = remaining(&page, &sent);
                tracing::debug!(
                    page = self.fetched + 1,
                    records = page.len(),
                    active = active.len(),
                    "Fetched page"
                );
                if !active.is_empty() {
                    self.state = State::Active(active);
                }
                self.fetched += 1;
                Some(Ok(page))
            }
            Err(e) => Some(Err(e)),
        }
    }

    async fn fetch_all(&self, sent: &BTreeMap<Category, String>) -> Result<Page> {
        let categories: Vec<Category> = sent.keys().copied().collect();
        let request = self.query.request(
            RequestKind::Search,
            &categories,
            INITIAL_CURSOR,
            self.query.size(),
        );
        let body = self.client.dispatch(request).await?;
        Page::from_response(&body)
    }

    async fn fetch_each(&self, sent: &BTreeMap<Category, String>) -> Result<Page> {
        let fetches = sent.iter().map(|(category, cursor)| {
            let request = self.query.request(
                RequestKind::Search,
                &[*category],
                cursor,
                self.query.size(),
            );
            async move {
                let body = self.client.dispatch(request).await?;
                Page::from_response(&body)
            }
        });
        let pages = try_join_all(fetches).await?;
        Ok(Page::merge(pages))
    }

    /// Adapt into a [`Stream`] of pages
    pub fn into_stream(mut self) -> impl Stream<Item = Result<Page>> {
        async_stream::stream! {
            while let Some(page) = self.next().await {
                yield page;
            }
        }
    }

    /// Fetch every remaining page, stopping at the first error
    pub async fn try_collect(mut self) -> Result<Vec<Page>> {
        let mut pages = Vec::new();
        while let Some(page) = self.next().await {
            pages.push(page?);
        }
        Ok(pages)
    }
}

impl std::fmt::Debug for Pages {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pages")
            .field("query", &self.query)
            .field("fetched", &self.fetched)
            .field("done", &self.is_done())
            .finish()
    }
}

/// Categories in `page` that still have results after the cursors in `sent`
fn remaining(page: &Page, sent: &BTreeMap<Category, String>) -> BTreeMap<Category, String> {
    sent.iter()
        .filter_map(|(category, cursor)| {
            let group = page.category(*category)?;
            if group.is_exhausted(cursor) {
                return None;
            }
            group.next_cursor().map(|next| (*category, next.to_string()))
        })
        .collect()
}
