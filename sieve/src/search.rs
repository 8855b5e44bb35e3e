//! Directory traversal driver.

use std::fs;
use std::path::PathBuf;

use walkdir::WalkDir;

use crate::context::ContextBuilder;
use crate::eval::Evaluator;
use crate::query::Expr;
use crate::Result;

/// Traversal options.
#[derive(Debug, Clone, Default)]
pub struct Search {
    pub follow_links: bool,
    /// Deepest level visited; the root itself is depth 0.
    pub max_depth: Option<usize>,
    /// Matches dropped from the front of the result.
    pub skip: usize,
    pub limit: Option<usize>,
}

impl Search {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn follow_links(mut self, follow: bool) -> Self {
        self.follow_links = follow;
        self
    }

    pub fn max_depth(mut self, depth: Option<usize>) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn skip(mut self, skip: usize) -> Self {
        self.skip = skip;
        self
    }

    pub fn limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    /// Walk every root and return the paths `expr` accepts.
    ///
    /// Nothing is returned unless the whole walk succeeds: the first
    /// evaluation error aborts the search. Entries that cannot be read
    /// during traversal are logged and skipped.
    pub fn run(&self, roots: &[PathBuf], expr: &Expr, evaluator: &Evaluator<'_>) -> Result<Vec<PathBuf>> {
        let mut builder = ContextBuilder::new();
        let mut matches = Vec::new();
        let mut visited = 0usize;

        for root in roots {
            // a missing root is an error, not a skipped entry
            fs::symlink_metadata(root)?;

            let mut walker = WalkDir::new(root)
                .follow_links(self.follow_links)
                .sort_by_file_name();
            if let Some(depth) = self.max_depth {
                walker = walker.max_depth(depth);
            }

            for entry in walker {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) => {
                        tracing::warn!(error = %e, "skipping unreadable entry");
                        continue;
                    }
                };
                let metadata = match entry.metadata() {
                    Ok(metadata) => metadata,
                    Err(e) => {
                        tracing::warn!(path = %entry.path().display(), error = %e, "skipping entry without metadata");
                        continue;
                    }
                };

                let ctx = builder.build(entry.path(), &metadata)?;
                visited += 1;
                let matched = evaluator.evaluate(expr, &ctx)?;
                tracing::trace!(path = %ctx.path.display(), matched, "evaluated");
                if matched {
                    matches.push(ctx.path);
                }
            }
        }

        tracing::debug!(visited, matched = matches.len(), "search finished");

        let limit = self.limit.unwrap_or(usize::MAX);
        Ok(matches.into_iter().skip(self.skip).take(limit).collect())
    }
}
