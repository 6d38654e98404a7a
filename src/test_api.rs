//! Synthetic [`ReplyApi`] implementation shared by pagination and exporter tests

use crate::client::{
    MainPageData, MainPageQuery, RawReply, ReplyApi, ReplyPageData, ReplyPageInfo, ReplyPageQuery,
};
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

/// Scriptable in-memory API double
///
/// `main_pages` are served in order; once exhausted, the last page repeats
/// (which is how a non-advancing upstream cursor presents). Thread replies
/// are sliced into pages from the flat `threads` lists; `counts` overrides
/// the probe count for a root without materializing replies.
pub(crate) struct MockApi {
    pub oid: u64,
    pub img_key: String,
    pub sub_key: String,
    pub fail_resolve: bool,
    pub main_pages: Vec<MainPageData>,
    pub threads: HashMap<u64, Vec<RawReply>>,
    pub counts: HashMap<u64, u64>,
    pub failing_probes: HashSet<u64>,
    pub calls: Mutex<Vec<String>>,
}

impl Default for MockApi {
    fn default() -> Self {
        Self {
            oid: 170001,
            img_key: "7cd084941338484aae1ad9425b84077c".to_string(),
            sub_key: "4932caff0ff746eab6f01bf08b70ac45".to_string(),
            fail_resolve: false,
            main_pages: Vec::new(),
            threads: HashMap::new(),
            counts: HashMap::new(),
            failing_probes: HashSet::new(),
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl MockApi {
    pub fn record(&self, call: impl Into<String>) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call.into());
        }
    }

    pub fn call_log(&self) -> Vec<String> {
        self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
    }

    pub fn calls_matching(&self, prefix: &str) -> usize {
        self.call_log()
            .iter()
            .filter(|call| call.starts_with(prefix))
            .count()
    }
}

/// Build a raw reply fragment for test scripts
pub(crate) fn raw_reply(rpid: u64, parent: u64, root: u64, ctime: i64) -> RawReply {
    RawReply {
        rpid,
        parent,
        root,
        ctime,
        ..Default::default()
    }
}

#[async_trait]
impl ReplyApi for MockApi {
    async fn wbi_keys(&self) -> Result<(String, String)> {
        self.record("nav");
        Ok((self.img_key.clone(), self.sub_key.clone()))
    }

    async fn resolve_oid(&self, bvid: &str) -> Result<u64> {
        self.record(format!("view {bvid}"));
        if self.fail_resolve {
            return Err(Error::Upstream {
                endpoint: "view".to_string(),
                code: -404,
                message: "not found".to_string(),
            });
        }
        Ok(self.oid)
    }

    async fn main_page(&self, _query: &MainPageQuery) -> Result<MainPageData> {
        let served = self.calls_matching("main");
        self.record(format!("main page={}", served + 1));
        let index = served.min(self.main_pages.len().saturating_sub(1));
        self.main_pages
            .get(index)
            .cloned()
            .ok_or_else(|| Error::MalformedResponse {
                endpoint: "main".to_string(),
                reason: "mock has no main pages scripted".to_string(),
            })
    }

    async fn reply_page(&self, query: &ReplyPageQuery) -> Result<ReplyPageData> {
        let root = query.root.get();
        if query.page_size == 1 && query.page == 1 {
            self.record(format!("probe {root}"));
            if self.failing_probes.contains(&root) {
                return Err(Error::Upstream {
                    endpoint: "reply".to_string(),
                    code: -500,
                    message: "probe failed".to_string(),
                });
            }
        } else {
            self.record(format!("reply {root} pn={}", query.page));
        }

        let replies = self.threads.get(&root).cloned().unwrap_or_default();
        let count = self
            .counts
            .get(&root)
            .copied()
            .unwrap_or(replies.len() as u64);
        let start = ((query.page - 1) * query.page_size) as usize;
        let page: Vec<RawReply> = replies
            .into_iter()
            .skip(start)
            .take(query.page_size as usize)
            .collect();
        Ok(ReplyPageData {
            page: ReplyPageInfo { count },
            replies: page,
        })
    }
}
