//! Structural repair and invariant diagnostics.
//!
//! [`validate_and_fix`] normalizes a tree in one depth-first pass:
//!
//! - duplicate persist keys are dropped, keeping the first occurrence in
//!   depth-first order across the whole tree;
//! - active keys are pointed at an existing item;
//! - split ratios and floating bounds are clamped;
//! - splits with an empty ToolWindow or auto-hide leaf collapse to their
//!   other child when pruning is enabled (Document groups never collapse);
//! - parent links are rebuilt and unreachable records are dropped.
//!
//! [`invariant_report`] inspects a tree without changing it.

use serde::{Deserialize, Serialize};

use rustc_hash::FxHashSet;

use crate::node::{ContentKind, DockNode, MAX_SPLIT_RATIO, MIN_SPLIT_RATIO, NodeId, PersistKey};
use crate::tree::DockTree;

/// Repaired copy of `tree`.
#[must_use]
pub fn validate_and_fix(tree: &DockTree, prune_empty_tool_leaves: bool) -> DockTree {
    let mut working = tree.clone();
    working.relink();

    let removed_keys = dedupe_and_fix_active(&mut working);

    let root = working.root().clone();
    let new_root = collapse(&mut working, &root, prune_empty_tool_leaves);
    if new_root != root {
        working.set_root(new_root);
    }
    let dropped = working.relink();

    tracing::debug!(
        target: "dockwork.layout",
        removed_keys,
        dropped_nodes = dropped,
        nodes = working.len(),
        "layout validated"
    );
    working
}

/// Recompute parent links from the root and drop unreachable records.
pub fn rebuild_parents(tree: &mut DockTree) {
    tree.relink();
}

fn dedupe_and_fix_active(tree: &mut DockTree) -> usize {
    let hosts: Vec<NodeId> = tree
        .walk()
        .filter(|record| matches!(record.node(), DockNode::Group(_) | DockNode::AutoHide(_)))
        .map(|record| record.id().clone())
        .collect();

    let mut seen: FxHashSet<PersistKey> = FxHashSet::default();
    let mut removed = 0;
    for host in hosts {
        if let Some(group) = tree.group_mut(host.as_str()) {
            let items = group.items_mut();
            let before = items.len();
            items.retain(|item| seen.insert(item.persist_key.clone()));
            removed += before - items.len();
            let fixed = repair_active(
                group.active_key(),
                group.items().iter().map(|item| &item.persist_key),
            );
            if let Some(active) = fixed {
                group.set_active_key(active);
            }
        } else if let Some(strip) = tree.auto_hide_mut(host.as_str()) {
            let items = strip.items_mut();
            let before = items.len();
            items.retain(|item| seen.insert(item.persist_key.clone()));
            removed += before - items.len();
            let fixed = repair_active(
                strip.active_key(),
                strip.items().iter().map(|item| &item.persist_key),
            );
            if let Some(active) = fixed {
                strip.set_active_key(active);
            }
        }
    }
    removed
}

/// Replacement active key, or `None` when the current one is fine.
fn repair_active<'a>(
    active: Option<&PersistKey>,
    mut keys: impl Iterator<Item = &'a PersistKey> + Clone,
) -> Option<Option<PersistKey>> {
    match active {
        Some(active) if keys.clone().any(|key| key == active) => None,
        Some(_) => Some(keys.next().cloned()),
        None => keys.next().map(|first| Some(first.clone())),
    }
}

/// Post-order collapse. Returns the id that should fill `id`'s slot.
fn collapse(tree: &mut DockTree, id: &NodeId, prune: bool) -> NodeId {
    let children = match tree.node(id.as_str()).map(|record| record.node()) {
        Some(DockNode::Split(split)) => (split.first().clone(), Some(split.second().clone())),
        Some(DockNode::Floating(floating)) => (floating.root().clone(), None),
        _ => return id.clone(),
    };

    match children {
        (first, Some(second)) => {
            let first = collapse(tree, &first, prune);
            let second = collapse(tree, &second, prune);
            let first_empty = is_empty_leaf(tree, &first, prune);
            let second_empty = is_empty_leaf(tree, &second, prune);
            if let Some(split) = tree.split_mut(id.as_str()) {
                let ratio = split.ratio();
                split.set_ratio(ratio);
                split.first = first.clone();
                split.second = second.clone();
            }
            match (first_empty, second_empty) {
                (true, false) => second,
                (false, true) | (true, true) => first,
                (false, false) => id.clone(),
            }
        }
        (root, None) => {
            let root = collapse(tree, &root, prune);
            if let Some(floating) = tree.floating_mut(id.as_str()) {
                let bounds = floating.bounds();
                floating.set_bounds(bounds);
                floating.root = root;
            }
            id.clone()
        }
    }
}

fn is_empty_leaf(tree: &DockTree, id: &NodeId, prune: bool) -> bool {
    if !prune {
        return false;
    }
    match tree.node(id.as_str()).map(|record| record.node()) {
        Some(DockNode::Group(group)) => {
            group.content_kind() == ContentKind::ToolWindow && group.is_empty()
        }
        Some(DockNode::AutoHide(strip)) => strip.is_empty(),
        _ => false,
    }
}

// =========================================================================
// Invariant diagnostics
// =========================================================================

/// Severity for one invariant finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DockInvariantSeverity {
    Error,
    Warning,
}

/// Stable code for invariant findings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DockInvariantCode {
    DuplicatePersistKey,
    DanglingActiveKey,
    MissingActiveKey,
    RatioOutOfRange,
    ParentMismatch,
    MissingChild,
    UnreachableNode,
    InvalidBounds,
    NoDocumentGroup,
    EmptyToolLeaf,
}

/// One finding. `repairable` means [`validate_and_fix`] resolves it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DockInvariantIssue {
    pub code: DockInvariantCode,
    pub severity: DockInvariantSeverity,
    pub repairable: bool,
    pub node_id: Option<NodeId>,
    pub related_node: Option<NodeId>,
    pub message: String,
}

/// Structured invariant report over a dock tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DockInvariantReport {
    pub tree_hash: u64,
    pub issues: Vec<DockInvariantIssue>,
}

impl DockInvariantReport {
    /// True if any error-level finding exists.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.issues
            .iter()
            .any(|issue| issue.severity == DockInvariantSeverity::Error)
    }

    /// True if any error-level finding cannot be repaired.
    #[must_use]
    pub fn has_unrepairable_errors(&self) -> bool {
        self.issues
            .iter()
            .any(|issue| issue.severity == DockInvariantSeverity::Error && !issue.repairable)
    }

    #[must_use]
    pub fn codes(&self) -> Vec<DockInvariantCode> {
        self.issues.iter().map(|issue| issue.code).collect()
    }
}

/// Inspect `tree` and report every invariant violation.
#[must_use]
pub fn invariant_report(tree: &DockTree) -> DockInvariantReport {
    let mut issues = Vec::new();

    if let Some(parent) = tree.parent_of(tree.root().as_str()) {
        push_issue(
            &mut issues,
            DockInvariantCode::ParentMismatch,
            DockInvariantSeverity::Error,
            Some(tree.root().clone()),
            Some(parent.clone()),
            "root node has a parent link",
        );
    }

    let mut reachable: FxHashSet<&NodeId> = FxHashSet::default();
    let mut seen_keys: FxHashSet<&PersistKey> = FxHashSet::default();
    let mut document_groups = 0usize;

    for record in tree.walk() {
        let id = record.id();
        reachable.insert(id);

        for child in record.node().child_ids() {
            match tree.node(child.as_str()) {
                None => push_issue(
                    &mut issues,
                    DockInvariantCode::MissingChild,
                    DockInvariantSeverity::Error,
                    Some(id.clone()),
                    Some(child.clone()),
                    format!("child {child} of {id} is missing"),
                ),
                Some(child_record) if child_record.parent() != Some(id) => push_issue(
                    &mut issues,
                    DockInvariantCode::ParentMismatch,
                    DockInvariantSeverity::Error,
                    Some(child.clone()),
                    Some(id.clone()),
                    format!("child {child} does not link back to {id}"),
                ),
                Some(_) => {}
            }
        }

        match record.node() {
            DockNode::Group(group) => {
                if group.content_kind() == ContentKind::Document {
                    document_groups += 1;
                }
                let keys: Vec<&PersistKey> =
                    group.items().iter().map(|item| &item.persist_key).collect();
                check_items(&mut issues, id, &keys, group.active_key(), &mut seen_keys);
                if group.content_kind() == ContentKind::ToolWindow
                    && group.is_empty()
                    && record.parent().is_some()
                {
                    push_issue(
                        &mut issues,
                        DockInvariantCode::EmptyToolLeaf,
                        DockInvariantSeverity::Warning,
                        Some(id.clone()),
                        None,
                        format!("tool window group {id} is empty"),
                    );
                }
            }
            DockNode::AutoHide(strip) => {
                let keys: Vec<&PersistKey> =
                    strip.items().iter().map(|item| &item.persist_key).collect();
                check_items(&mut issues, id, &keys, strip.active_key(), &mut seen_keys);
                if strip.is_empty() && record.parent().is_some() {
                    push_issue(
                        &mut issues,
                        DockInvariantCode::EmptyToolLeaf,
                        DockInvariantSeverity::Warning,
                        Some(id.clone()),
                        None,
                        format!("auto-hide strip {id} is empty"),
                    );
                }
            }
            DockNode::Split(split) => {
                let ratio = split.ratio();
                if !(MIN_SPLIT_RATIO..=MAX_SPLIT_RATIO).contains(&ratio) {
                    push_issue(
                        &mut issues,
                        DockInvariantCode::RatioOutOfRange,
                        DockInvariantSeverity::Error,
                        Some(id.clone()),
                        None,
                        format!("split {id} ratio {ratio} outside bounds"),
                    );
                }
            }
            DockNode::Floating(floating) => {
                let bounds = floating.bounds();
                if !(bounds.width >= 1.0 && bounds.height >= 1.0) {
                    push_issue(
                        &mut issues,
                        DockInvariantCode::InvalidBounds,
                        DockInvariantSeverity::Error,
                        Some(id.clone()),
                        None,
                        format!("floating node {id} has degenerate bounds"),
                    );
                }
            }
        }
    }

    if document_groups == 0 {
        push_issue(
            &mut issues,
            DockInvariantCode::NoDocumentGroup,
            DockInvariantSeverity::Error,
            None,
            None,
            "layout has no document group",
        );
    }

    for record in tree.nodes() {
        if !reachable.contains(record.id()) {
            push_issue(
                &mut issues,
                DockInvariantCode::UnreachableNode,
                DockInvariantSeverity::Error,
                Some(record.id().clone()),
                None,
                format!("node {} is not reachable from the root", record.id()),
            );
        }
    }

    DockInvariantReport {
        tree_hash: tree.state_hash(),
        issues,
    }
}

fn check_items<'a>(
    issues: &mut Vec<DockInvariantIssue>,
    id: &NodeId,
    keys: &[&'a PersistKey],
    active: Option<&PersistKey>,
    seen: &mut FxHashSet<&'a PersistKey>,
) {
    for key in keys {
        if !seen.insert(*key) {
            push_issue(
                issues,
                DockInvariantCode::DuplicatePersistKey,
                DockInvariantSeverity::Error,
                Some(id.clone()),
                None,
                format!("persist key {key} appears more than once"),
            );
        }
    }
    match active {
        Some(active) if !keys.contains(&active) => push_issue(
            issues,
            DockInvariantCode::DanglingActiveKey,
            DockInvariantSeverity::Error,
            Some(id.clone()),
            None,
            format!("active key {active} of {id} names no item"),
        ),
        None if !keys.is_empty() => push_issue(
            issues,
            DockInvariantCode::MissingActiveKey,
            DockInvariantSeverity::Error,
            Some(id.clone()),
            None,
            format!("{id} has items but no active key"),
        ),
        _ => {}
    }
}

fn push_issue(
    issues: &mut Vec<DockInvariantIssue>,
    code: DockInvariantCode,
    severity: DockInvariantSeverity,
    node_id: Option<NodeId>,
    related_node: Option<NodeId>,
    message: impl Into<String>,
) {
    issues.push(DockInvariantIssue {
        code,
        severity,
        repairable: !matches!(code, DockInvariantCode::NoDocumentGroup),
        node_id,
        related_node,
        message: message.into(),
    });
}
