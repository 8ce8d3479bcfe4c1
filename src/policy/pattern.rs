//! Path patterns for access rules.
//!
//! A pattern is a literal prefix, optionally containing `[param]` segments
//! that match exactly one non-empty path segment. Matching is
//! prefix-equivalent: the pattern must cover the leading segments of the
//! request path, and the path may continue past it only on a `/` boundary.

/// One compiled pattern segment.
#[derive(Clone, Debug, Eq, PartialEq)]
enum Segment {
    Literal(String),
    /// `[id]`-style placeholder; matches any non-empty segment.
    Dynamic,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PathPattern {
    raw: &'static str,
    segments: Vec<Segment>,
}

impl PathPattern {
    /// Compile a declared pattern.
    ///
    /// Trailing slashes are ignored; `"/"` compiles to an empty segment list
    /// and matches every path.
    #[must_use]
    pub fn compile(raw: &'static str) -> Self {
        let segments = raw
            .split('/')
            .filter(|part| !part.is_empty())
            .map(|part| {
                if part.starts_with('[') && part.ends_with(']') && part.len() > 2 {
                    Segment::Dynamic
                } else {
                    Segment::Literal(part.to_string())
                }
            })
            .collect();
        Self { raw, segments }
    }

    #[must_use]
    pub fn raw(&self) -> &'static str {
        self.raw
    }

    /// Prefix-equivalent match against a request path.
    ///
    /// Empty path segments never satisfy a dynamic segment, so `/game//play`
    /// does not match `/game/[id]/play`.
    #[must_use]
    pub fn matches(&self, path: &str) -> bool {
        let path = path.split('?').next().unwrap_or(path);
        let mut parts = path.strip_prefix('/').unwrap_or(path).split('/');

        for segment in &self.segments {
            let Some(part) = parts.next() else {
                return false;
            };
            match segment {
                Segment::Literal(expected) => {
                    if part != expected {
                        return false;
                    }
                }
                Segment::Dynamic => {
                    if part.is_empty() {
                        return false;
                    }
                }
            }
        }
        // Anything after the covered prefix is fine; split('/') already
        // guarantees the boundary is a slash (or the end of the path).
        true
    }
}

#[cfg(test)]
mod tests {
    use super::PathPattern;

    #[test]
    fn literal_prefix_matches_descendants() {
        let pattern = PathPattern::compile("/admin");
        assert!(pattern.matches("/admin"));
        assert!(pattern.matches("/admin/users"));
        assert!(pattern.matches("/admin/users/42"));
        assert!(!pattern.matches("/administrator"));
        assert!(!pattern.matches("/api/admin"));
    }

    #[test]
    fn dynamic_segment_matches_single_component() {
        let pattern = PathPattern::compile("/game/[id]/play");
        assert!(pattern.matches("/game/abc123/play"));
        assert!(pattern.matches("/game/abc123/play/fullscreen"));
        assert!(!pattern.matches("/game/abc123/edit"));
        assert!(!pattern.matches("/game//play"));
        assert!(!pattern.matches("/game/abc123"));
    }

    #[test]
    fn dynamic_segment_rejects_slash_spanning() {
        let pattern = PathPattern::compile("/game/[id]/manage");
        assert!(!pattern.matches("/game/a/b/manage"));
    }

    #[test]
    fn query_string_is_ignored() {
        let pattern = PathPattern::compile("/dashboard");
        assert!(pattern.matches("/dashboard?tab=sales"));
    }

    #[test]
    fn root_pattern_matches_everything() {
        let pattern = PathPattern::compile("/");
        assert!(pattern.matches("/"));
        assert!(pattern.matches("/anything/else"));
    }
}
