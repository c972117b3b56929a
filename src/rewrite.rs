//! Prefix-strip rewrite rule
//!
//! Paths starting with the configured prefix (`/api/` by default) lose the
//! prefix's leading segment, keeping the slash that followed it. When that
//! leaves only the root, the request is sent to the fallback path instead.

use tracing::debug;

use crate::config::RewriteConfig;
use crate::event::EdgeRequest;

/// Result of running the rule against one path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RewriteOutcome {
    /// Path did not start with the prefix
    Unchanged,
    /// Prefix segment removed
    Stripped(String),
    /// Prefix removed and nothing but the root remained
    Fallback(String),
}

impl RewriteOutcome {
    pub fn path(&self) -> Option<&str> {
        match self {
            RewriteOutcome::Unchanged => None,
            RewriteOutcome::Stripped(path) | RewriteOutcome::Fallback(path) => Some(path),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RewriteOutcome::Unchanged => "unchanged",
            RewriteOutcome::Stripped(_) => "stripped",
            RewriteOutcome::Fallback(_) => "fallback",
        }
    }
}

#[derive(Debug, Clone)]
pub struct PrefixRewriter {
    enabled: bool,
    prefix: String,
    fallback_path: String,
}

impl PrefixRewriter {
    pub fn new(config: &RewriteConfig) -> Self {
        Self {
            enabled: config.enabled,
            prefix: config.prefix.clone(),
            fallback_path: config.fallback_path.clone(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn fallback_path(&self) -> &str {
        &self.fallback_path
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn rewrite(&self, path: &str) -> RewriteOutcome {
        if !self.enabled || !path.starts_with(&self.prefix) {
            return RewriteOutcome::Unchanged;
        }

        // Keep the prefix's trailing slash as the start of the new path
        let head = self.prefix.strip_suffix('/').unwrap_or(&self.prefix);
        let stripped = &path[head.len()..];

        let outcome = if stripped.is_empty() || stripped == "/" {
            RewriteOutcome::Fallback(self.fallback_path.clone())
        } else {
            RewriteOutcome::Stripped(stripped.to_string())
        };

        debug!(
            from = %path,
            to = ?outcome.path(),
            outcome = outcome.as_str(),
            "Path rewritten"
        );

        outcome
    }

    /// Rewrite an event request's `uri` in place, leaving every other field untouched
    pub fn apply(&self, request: &mut EdgeRequest) -> RewriteOutcome {
        let outcome = self.rewrite(&request.uri);
        if let Some(path) = outcome.path() {
            request.uri = path.to_string();
        }
        outcome
    }
}

impl Default for PrefixRewriter {
    fn default() -> Self {
        Self::new(&RewriteConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_api_segment() {
        let rewriter = PrefixRewriter::default();

        assert_eq!(
            rewriter.rewrite("/api/users"),
            RewriteOutcome::Stripped("/users".to_string())
        );
        assert_eq!(
            rewriter.rewrite("/api/v1/orders/42"),
            RewriteOutcome::Stripped("/v1/orders/42".to_string())
        );
    }

    #[test]
    fn test_bare_root_goes_to_health() {
        let rewriter = PrefixRewriter::default();

        let outcome = rewriter.rewrite("/api/");
        assert_eq!(outcome, RewriteOutcome::Fallback("/health".to_string()));
        assert_eq!(outcome.path(), Some("/health"));
        assert_eq!(outcome.as_str(), "fallback");
    }

    #[test]
    fn test_non_matching_paths_unchanged() {
        let rewriter = PrefixRewriter::default();

        for path in ["/", "", "/api", "/apix/users", "/API/users", "/static/api/x"] {
            assert_eq!(
                rewriter.rewrite(path),
                RewriteOutcome::Unchanged,
                "path {:?}",
                path
            );
        }
    }

    #[test]
    fn test_single_pass_only() {
        let rewriter = PrefixRewriter::default();

        assert_eq!(
            rewriter.rewrite("/api/api/x"),
            RewriteOutcome::Stripped("/api/x".to_string())
        );
        assert_eq!(
            rewriter.rewrite("/api//x"),
            RewriteOutcome::Stripped("//x".to_string())
        );
        // Only a single slash triggers the fallback
        assert_eq!(
            rewriter.rewrite("/api//"),
            RewriteOutcome::Stripped("//".to_string())
        );
    }

    #[test]
    fn test_custom_prefix_and_fallback() {
        let rewriter = PrefixRewriter::new(&RewriteConfig {
            enabled: true,
            prefix: "/service/v2/".to_string(),
            fallback_path: "/status".to_string(),
        });

        assert_eq!(
            rewriter.rewrite("/service/v2/items"),
            RewriteOutcome::Stripped("/items".to_string())
        );
        assert_eq!(
            rewriter.rewrite("/service/v2/"),
            RewriteOutcome::Fallback("/status".to_string())
        );
        assert_eq!(rewriter.rewrite("/api/items"), RewriteOutcome::Unchanged);
    }

    #[test]
    fn test_disabled_passes_through() {
        let rewriter = PrefixRewriter::new(&RewriteConfig {
            enabled: false,
            ..Default::default()
        });

        assert_eq!(rewriter.rewrite("/api/users"), RewriteOutcome::Unchanged);
        assert_eq!(rewriter.rewrite("/api/"), RewriteOutcome::Unchanged);
    }

    #[test]
    fn test_multibyte_paths() {
        let rewriter = PrefixRewriter::default();

        assert_eq!(
            rewriter.rewrite("/api/データ"),
            RewriteOutcome::Stripped("/データ".to_string())
        );
    }
}
