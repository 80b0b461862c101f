//! Topic pattern matcher
//!
//! Patterns are stored in a segment trie keyed by topic level. Each node holds
//! literal children, an optional single-level wildcard child, the listeners
//! subscribed through a trailing multi-level wildcard at this depth, and the
//! listeners whose pattern ends exactly here.
//!
//! Matching a topic walks the trie once per topic level, so its cost depends
//! on the topic depth and the number of wildcard branches taken, not on how
//! many subscriptions exist.
//!
//! ```text
//! patterns: a/b, a/+, a/#, #          topic: a/b
//!
//!   root ── deep: [#]
//!    └─ "a" ── deep: [a/#]
//!        ├─ "b"  listeners: [a/b]
//!        └─ (+)  listeners: [a/+]
//!
//!   match(a/b) = {#, a/#, a/b, a/+}
//! ```

use crate::emitter::config::EmitterConfig;
use crate::emitter::error::{EmitterError, EmitterResult};
use crate::emitter::listener::{Listener, ListenerId};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Segment<'a> {
    Literal(&'a str),
    One,
    Deep,
}

#[derive(Debug, Default)]
struct TrieNode {
    children: HashMap<String, TrieNode>,
    one: Option<Box<TrieNode>>,
    deep: Vec<Listener>,
    listeners: Vec<Listener>,
}

impl TrieNode {
    fn is_empty(&self) -> bool {
        self.children.is_empty()
            && self.one.is_none()
            && self.deep.is_empty()
            && self.listeners.is_empty()
    }

    fn count(&self) -> usize {
        self.deep.len()
            + self.listeners.len()
            + self.one.as_deref().map_or(0, TrieNode::count)
            + self.children.values().map(TrieNode::count).sum::<usize>()
    }
}

/// Segment trie mapping topics to the listeners whose patterns they satisfy
#[derive(Debug)]
pub struct TopicMatcher {
    root: TrieNode,
    separator: char,
    wildcard_one: String,
    wildcard_some: String,
    match_empty_levels: bool,
}

impl TopicMatcher {
    pub fn new(config: &EmitterConfig) -> Self {
        Self {
            root: TrieNode::default(),
            separator: config.separator,
            wildcard_one: config.wildcard_one.clone(),
            wildcard_some: config.wildcard_some.clone(),
            match_empty_levels: config.match_empty_levels,
        }
    }

    fn parse<'a>(&self, pattern: &'a str) -> EmitterResult<Vec<Segment<'a>>> {
        if pattern.is_empty() {
            return Err(EmitterError::precondition("pattern must not be empty"));
        }

        let raw: Vec<&str> = pattern.split(self.separator).collect();
        let last = raw.len() - 1;

        raw.into_iter()
            .enumerate()
            .map(|(index, segment)| {
                if segment == self.wildcard_some {
                    if index != last {
                        return Err(EmitterError::precondition(format!(
                            "multi-level wildcard '{}' must be the last level of '{}'",
                            self.wildcard_some, pattern
                        )));
                    }
                    Ok(Segment::Deep)
                } else if segment == self.wildcard_one {
                    Ok(Segment::One)
                } else {
                    Ok(Segment::Literal(segment))
                }
            })
            .collect()
    }

    /// Subscribe `listener` to `pattern`
    ///
    /// Returns `false` when the pair was already registered; the trie is left
    /// unchanged in that case.
    pub fn add(&mut self, pattern: &str, listener: &Listener) -> EmitterResult<bool> {
        let segments = self.parse(pattern)?;
        let (deep, path) = match segments.split_last() {
            Some((Segment::Deep, path)) => (true, path),
            _ => (false, segments.as_slice()),
        };

        let mut node = &mut self.root;
        for segment in path {
            node = match segment {
                Segment::Literal(level) => {
                    node.children.entry((*level).to_string()).or_default()
                }
                // parse only accepts the multi-level wildcard last
                Segment::One | Segment::Deep => &mut **node.one.get_or_insert_with(Box::default),
            };
        }

        let listeners = if deep {
            &mut node.deep
        } else {
            &mut node.listeners
        };

        if listeners.iter().any(|existing| existing.id() == listener.id()) {
            return Ok(false);
        }
        listeners.push(listener.clone());
        Ok(true)
    }

    /// Remove `listener` from `pattern`, or every listener when `None`
    ///
    /// Returns how many subscriptions were removed; unknown pairs remove none.
    pub fn remove(&mut self, pattern: &str, listener: Option<&Listener>) -> EmitterResult<usize> {
        let segments = self.parse(pattern)?;
        Ok(remove_path(
            &mut self.root,
            &segments,
            listener.map(Listener::id),
        ))
    }

    /// Every listener whose pattern matches `topic`, each at most once
    pub fn matches(&self, topic: &str) -> Vec<Listener> {
        let levels: Vec<&str> = topic.split(self.separator).collect();
        let mut seen = HashSet::new();
        let mut matched = Vec::new();
        self.collect(&self.root, &levels, &mut seen, &mut matched);
        matched
    }

    fn collect(
        &self,
        node: &TrieNode,
        levels: &[&str],
        seen: &mut HashSet<ListenerId>,
        matched: &mut Vec<Listener>,
    ) {
        match levels.split_first() {
            None => extend_unique(&node.listeners, seen, matched),
            Some((level, rest)) => {
                if let Some(child) = node.children.get(*level) {
                    self.collect(child, rest, seen, matched);
                }
                if let Some(child) = node.one.as_deref() {
                    if self.match_empty_levels || !level.is_empty() {
                        self.collect(child, rest, seen, matched);
                    }
                }
            }
        }

        // zero or more remaining levels
        extend_unique(&node.deep, seen, matched);
    }

    /// Total number of (pattern, listener) subscriptions
    pub fn len(&self) -> usize {
        self.root.count()
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }
}

fn extend_unique(
    listeners: &[Listener],
    seen: &mut HashSet<ListenerId>,
    matched: &mut Vec<Listener>,
) {
    for listener in listeners {
        if seen.insert(listener.id()) {
            matched.push(listener.clone());
        }
    }
}

fn remove_path(
    node: &mut TrieNode,
    segments: &[Segment<'_>],
    target: Option<ListenerId>,
) -> usize {
    match segments.split_first() {
        None => drain(&mut node.listeners, target),
        Some((Segment::Deep, _)) => drain(&mut node.deep, target),
        Some((Segment::One, rest)) => {
            let Some(child) = node.one.as_deref_mut() else {
                return 0;
            };
            let removed = remove_path(child, rest, target);
            if child.is_empty() {
                node.one = None;
            }
            removed
        }
        Some((Segment::Literal(level), rest)) => {
            let Some(child) = node.children.get_mut(*level) else {
                return 0;
            };
            let removed = remove_path(child, rest, target);
            if child.is_empty() {
                node.children.remove(*level);
            }
            removed
        }
    }
}

fn drain(listeners: &mut Vec<Listener>, target: Option<ListenerId>) -> usize {
    let before = listeners.len();
    match target {
        Some(id) => listeners.retain(|listener| listener.id() != id),
        None => listeners.clear(),
    }
    before - listeners.len()
}
