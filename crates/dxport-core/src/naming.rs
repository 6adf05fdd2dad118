//! Output file naming
//!
//! Names are derived from the part's job/mark metadata when it agrees with the
//! part's own file name, otherwise from the file name itself:
//!
//! - single-body part: `{base}.{ext}`
//! - unnamed body in a multi-body part: `{file_stem}_{n}.{ext}`, `n` counting
//!   unnamed bodies of the part from 1
//! - named body in a multi-body part: `{base}-{body}.{ext}`
//!
//! A name already issued for the part (compared case-insensitively, after
//! sanitizing) is never issued again; the body gets the unnamed form instead.

use std::collections::HashSet;

use crate::error::NamingError;
use crate::metadata::PartMetadata;

/// Replace characters that cannot appear in a file name component
pub fn sanitize_component(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}

/// Per-part naming state
#[derive(Debug, Clone)]
pub struct NamingPolicy {
    /// Base for named outputs: `{job}_{mark}` or the file stem
    base: String,
    file_stem: String,
    extension: String,
    body_count: usize,
    /// Next number for an unnamed body
    unnamed_counter: u32,
    fallback: bool,
    /// Lowercased stems issued so far
    issued: HashSet<String>,
}

impl NamingPolicy {
    /// Set up naming for a part with `body_count` bodies
    pub fn new(
        metadata: &PartMetadata,
        file_stem: impl Into<String>,
        extension: impl Into<String>,
        body_count: usize,
    ) -> Self {
        let file_stem = file_stem.into();

        let (base, fallback) = match metadata.canonical_base() {
            Some(canonical) if file_stem.starts_with(&canonical) => (canonical, false),
            Some(canonical) => {
                tracing::warn!(
                    "Metadata base '{}' does not match part file '{}'; naming from file",
                    canonical,
                    file_stem
                );
                (file_stem.clone(), true)
            }
            None => {
                tracing::warn!("Job/mark metadata is blank; naming from file '{}'", file_stem);
                (file_stem.clone(), true)
            }
        };

        Self {
            base,
            file_stem,
            extension: extension.into(),
            body_count,
            unnamed_counter: 1,
            fallback,
            issued: HashSet::new(),
        }
    }

    /// Base used for named outputs
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Whether the metadata was rejected in favor of the file stem
    pub fn uses_fallback(&self) -> bool {
        self.fallback
    }

    /// Output file name for the next body.
    ///
    /// Unnamed bodies advance the per-part counter, so bodies must be named
    /// in model order for the result to be reproducible.
    pub fn name_for(&mut self, body_name: &str) -> Result<String, NamingError> {
        let stem = match self.body_count {
            0 => return Err(NamingError::NoBodies),
            1 => self.base.clone(),
            _ if body_name.trim().is_empty() => self.next_unnamed(),
            _ => format!("{}-{}", self.base, sanitize_component(body_name)),
        };

        let stem = if self.issued.insert(stem.to_lowercase()) {
            stem
        } else {
            let unique = self.next_unnamed();
            tracing::warn!(
                "Output name '{}' already used in this part; body '{}' written as '{}'",
                stem,
                body_name,
                unique
            );
            self.issued.insert(unique.to_lowercase());
            unique
        };

        Ok(format!("{}.{}", stem, self.extension))
    }

    /// Next `{file_stem}_{n}` not issued yet
    fn next_unnamed(&mut self) -> String {
        loop {
            let stem = format!("{}_{}", self.file_stem, self.unnamed_counter);
            self.unnamed_counter += 1;
            if !self.issued.contains(&stem.to_lowercase()) {
                return stem;
            }
        }
    }
}
