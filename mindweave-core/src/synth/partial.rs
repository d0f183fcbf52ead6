//! Best-effort parsing of an unfinished JSON prefix into a partial revision.
//!
//! The prefix is cut back to the latest point where the open containers can
//! be closed to form valid JSON. Only the most recent cut points are tried.

use serde::Serialize;

const MAX_ATTEMPTS: usize = 8;

/// One intermediate view of the object being streamed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartialRevision {
    pub value: serde_json::Value,
    pub nodes: usize,
    pub edges: usize,
}

impl PartialRevision {
    fn from_value(value: serde_json::Value) -> Self {
        let count = |key: &str| value.get(key).and_then(|v| v.as_array()).map_or(0, Vec::len);
        let nodes = count("nodes");
        let edges = count("edges");
        Self {
            value,
            nodes,
            edges,
        }
    }
}

/// Accumulates streamed text and yields a revision whenever the visible
/// node or edge count changes.
#[derive(Debug, Default)]
pub struct RevisionTracker {
    text: String,
    last: Option<(usize, usize)>,
}

impl RevisionTracker {
    pub fn push(&mut self, delta: &str) -> Option<PartialRevision> {
        self.text.push_str(delta);
        let revision = parse_partial(&self.text)?;
        let counts = (revision.nodes, revision.edges);
        if self.last == Some(counts) {
            return None;
        }
        self.last = Some(counts);
        Some(revision)
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn into_text(self) -> String {
        self.text
    }
}

#[derive(Clone)]
struct Cut {
    at: usize,
    stack: Vec<u8>,
}

/// Close an unfinished JSON prefix and parse it, if possible.
pub fn parse_partial(prefix: &str) -> Option<PartialRevision> {
    let start = prefix.find(['{', '['])?;
    let text = &prefix[start..];

    let mut stack: Vec<u8> = Vec::new();
    let mut cuts: Vec<Cut> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for (i, b) in text.bytes().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
                cuts.push(Cut {
                    at: i + 1,
                    stack: stack.clone(),
                });
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' | b'[' => {
                stack.push(if b == b'{' { b'}' } else { b']' });
                cuts.push(Cut {
                    at: i + 1,
                    stack: stack.clone(),
                });
            }
            b'}' | b']' => {
                stack.pop();
                cuts.push(Cut {
                    at: i + 1,
                    stack: stack.clone(),
                });
                if stack.is_empty() {
                    return finish(&text[..=i], &[]);
                }
            }
            b',' => cuts.push(Cut {
                at: i,
                stack: stack.clone(),
            }),
            _ => {}
        }
    }

    // An open string can be closed in place.
    if in_string && !escaped {
        let mut closed = text.to_string();
        closed.push('"');
        if let Some(rev) = finish(&closed, &stack) {
            return Some(rev);
        }
    }
    if !in_string {
        if let Some(rev) = finish(text, &stack) {
            return Some(rev);
        }
    }

    cuts.iter()
        .rev()
        .take(MAX_ATTEMPTS)
        .find_map(|cut| finish(&text[..cut.at], &cut.stack))
}

fn finish(body: &str, stack: &[u8]) -> Option<PartialRevision> {
    let mut candidate = String::with_capacity(body.len() + stack.len());
    candidate.push_str(body.trim_end().trim_end_matches(','));
    for &closer in stack.iter().rev() {
        candidate.push(char::from(closer));
    }
    serde_json::from_str(&candidate)
        .ok()
        .map(PartialRevision::from_value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closes_open_string_and_containers() {
        let rev = parse_partial(r#"{"nodes":[{"id":"node-1","label":"Sun"#).unwrap();
        assert_eq!(rev.nodes, 1);
        assert_eq!(rev.value["nodes"][0]["label"], "Sun");
    }

    #[test]
    fn drops_dangling_key() {
        let rev = parse_partial(r#"{"nodes":[{"id":"a"},{"id":"b","lab"#).unwrap();
        assert_eq!(rev.nodes, 2);
        let rev = parse_partial(r#"{"nodes":[{"id":"a"}],"edges":"#).unwrap();
        assert_eq!(rev.nodes, 1);
        assert_eq!(rev.edges, 0);
    }

    #[test]
    fn complete_object_parses_as_is() {
        let rev = parse_partial(r#"{"nodes":[],"edges":[{"source":"a","target":"b"}]} trailing"#)
            .unwrap();
        assert_eq!(rev.edges, 1);
    }

    #[test]
    fn nothing_structured_yet() {
        assert!(parse_partial("").is_none());
        assert!(parse_partial("Sure, here is").is_none());
    }

    #[test]
    fn tracker_reports_only_count_changes() {
        let mut tracker = RevisionTracker::default();
        assert!(tracker.push(r#"{"nodes":[{"id":"a","#).is_some());
        assert!(tracker.push(r#""label":"A"}"#).is_none());
        let rev = tracker.push(r#",{"id":"b"}"#).unwrap();
        assert_eq!(rev.nodes, 2);
        assert!(tracker.text().starts_with("{\"nodes\""));
    }
}
