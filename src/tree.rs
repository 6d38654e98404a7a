//! Reply-tree reconstruction
//!
//! The reply-page endpoint returns one thread's replies as flat pages that
//! interleave depths arbitrarily. This module rebuilds the nested structure
//! for one top-level comment from those flat fragments and imposes a stable,
//! deterministic ordering.

use crate::types::{Comment, ReplyId};
use std::collections::HashMap;

/// Rebuild the nested reply tree for one top-level comment
///
/// Attachment rules, per fragment:
/// - `parent` equals the thread root ⇒ direct child of the root
/// - `parent` is another fragment in this batch ⇒ nested under that fragment
/// - `parent` is absent from the batch ⇒ attached directly under the root
///
/// The last rule is a deliberate fallback for pagination gaps and deleted
/// parents: an orphaned reply is kept rather than dropped. After attachment,
/// children at every depth are sorted by `ctime` ascending; ties preserve
/// input order.
pub fn build_thread(root: ReplyId, fragments: Vec<Comment>) -> Vec<Comment> {
    let mut order: Vec<ReplyId> = Vec::with_capacity(fragments.len());
    let mut nodes: HashMap<ReplyId, Comment> = HashMap::with_capacity(fragments.len());
    for fragment in fragments {
        if !nodes.contains_key(&fragment.rpid) {
            order.push(fragment.rpid);
        }
        // Pages of a live thread can repeat a reply; the last copy wins
        nodes.insert(fragment.rpid, fragment);
    }

    let mut direct: Vec<ReplyId> = Vec::new();
    let mut children_of: HashMap<ReplyId, Vec<ReplyId>> = HashMap::new();
    for &id in &order {
        let Some(parent) = nodes.get(&id).map(|node| node.parent) else {
            continue;
        };
        if parent == root || !nodes.contains_key(&parent) {
            direct.push(id);
        } else {
            children_of.entry(parent).or_default().push(id);
        }
    }

    let mut roots: Vec<Comment> = direct
        .into_iter()
        .filter_map(|id| assemble(id, &mut nodes, &children_of))
        .collect();
    sort_by_ctime(&mut roots);
    roots
}

/// Take a node out of the arena and attach its children recursively
fn assemble(
    id: ReplyId,
    nodes: &mut HashMap<ReplyId, Comment>,
    children_of: &HashMap<ReplyId, Vec<ReplyId>>,
) -> Option<Comment> {
    let mut node = nodes.remove(&id)?;
    if let Some(child_ids) = children_of.get(&id) {
        for &child_id in child_ids {
            if let Some(child) = assemble(child_id, nodes, children_of) {
                node.children.push(child);
            }
        }
    }
    Some(node)
}

/// Sort children by creation time ascending, recursively, at every depth
///
/// `sort_by_key` is stable, so replies with equal `ctime` keep their input
/// order.
fn sort_by_ctime(nodes: &mut Vec<Comment>) {
    nodes.sort_by_key(|node| node.ctime);
    for node in nodes {
        sort_by_ctime(&mut node.children);
    }
}
