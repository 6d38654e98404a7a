//! Pagination loops over the comment hierarchy
//!
//! Two nested loops drive acquisition. The outer loop walks the signed main
//! listing with an opaque forward-only cursor until the platform reports
//! end-of-stream. The inner loop runs once per top-level comment: a cheap
//! probe (`ps=1, pn=1`) learns the thread's reply count, then the pages are
//! fetched sequentially. Both loops share one hard page ceiling that turns a
//! non-advancing cursor into a typed failure instead of an endless crawl,
//! and both take a pacing pause before every network call.

use crate::client::{MainPageQuery, RawReply, ReplyApi, ReplyPageQuery};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::pacer::Pacer;
use crate::types::{Comment, Event, PageCursor, ReplyId};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Result of the outer pagination loop
#[derive(Debug)]
pub(crate) struct MainListing {
    /// Top-level comments in platform order, subtrees not yet built
    pub comments: Vec<Comment>,
    /// Latest non-zero total-count hint from the cursor
    pub cursor_all_count: u64,
}

/// Drive the outer loop: collect every page of the main comment listing
///
/// Fatal on any error: the outer listing is structurally required for a
/// valid export.
pub(crate) async fn collect_main_pages(
    api: &dyn ReplyApi,
    pacer: &Pacer,
    cancel: &CancellationToken,
    events: &broadcast::Sender<Event>,
    config: &Config,
    oid: u64,
    mixin_key: &str,
) -> Result<MainListing> {
    let mut cursor = PageCursor::start();
    let mut comments: Vec<Comment> = Vec::new();
    let mut cursor_all_count = 0_u64;
    let mut page = 0_u32;

    while !cursor.is_end {
        page += 1;
        if page > config.pacing.max_pages {
            return Err(Error::PaginationOverrun {
                context: "main comments".to_string(),
                limit: config.pacing.max_pages,
            });
        }
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        pacer.pace().await;

        let query = MainPageQuery {
            oid,
            comment_type: config.comment_type,
            sort_mode: config.sort_mode,
            offset: cursor.offset.clone(),
            mixin_key: mixin_key.to_string(),
        };
        let data = api.main_page(&query).await?;

        if data.cursor.all_count > 0 {
            cursor_all_count = data.cursor.all_count;
        }
        let got = data.replies.len();
        comments.extend(data.replies.into_iter().map(RawReply::into_comment));

        // The cursor only ever advances; the ceiling above catches a
        // platform that echoes the same offset forever.
        cursor.offset = data.cursor.pagination_reply.next_offset;
        cursor.is_end = data.cursor.is_end;

        debug!(page, got, main_total = comments.len(), is_end = cursor.is_end, "main page landed");
        events
            .send(Event::MainPage {
                page,
                got,
                main_total: comments.len(),
                is_end: cursor.is_end,
            })
            .ok();
    }

    Ok(MainListing {
        comments,
        cursor_all_count,
    })
}

/// Drive the inner loop: probe one thread, then fetch its reply pages
///
/// Returns the thread's shaped reply fragments in increasing page order.
/// Probe replies are discarded; pages always restart from page 1. The caller
/// decides how to treat failures: [`Error::Cancelled`] and
/// [`Error::PaginationOverrun`] abort the export, anything else skips just
/// this thread.
pub(crate) async fn collect_thread_replies(
    api: &dyn ReplyApi,
    pacer: &Pacer,
    cancel: &CancellationToken,
    events: &broadcast::Sender<Event>,
    config: &Config,
    oid: u64,
    root: ReplyId,
    sub_total_before: usize,
) -> Result<Vec<Comment>> {
    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }
    pacer.pace().await;

    let probe = ReplyPageQuery {
        oid,
        comment_type: config.comment_type,
        root,
        page_size: 1,
        page: 1,
    };
    let count = api.reply_page(&probe).await?.page.count;
    if count == 0 {
        debug!(%root, "thread has no replies");
        return Ok(Vec::new());
    }

    let page_size = config.pacing.sub_page_size;
    let pages = count.div_ceil(u64::from(page_size));
    if pages > u64::from(config.pacing.max_pages) {
        return Err(Error::PaginationOverrun {
            context: format!("thread {root}"),
            limit: config.pacing.max_pages,
        });
    }
    let pages = pages as u32;

    let mut fragments: Vec<Comment> = Vec::with_capacity(count as usize);
    for page in 1..=pages {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        pacer.pace().await;

        let query = ReplyPageQuery {
            oid,
            comment_type: config.comment_type,
            root,
            page_size,
            page,
        };
        let data = api.reply_page(&query).await?;
        let got = data.replies.len();
        fragments.extend(data.replies.into_iter().map(RawReply::into_comment));

        debug!(%root, page, pages, got, "reply page landed");
        events
            .send(Event::SubPage {
                root,
                page,
                pages,
                got,
                sub_total: sub_total_before + fragments.len(),
            })
            .ok();
    }

    Ok(fragments)
}
