//! Front-end configuration.

use std::path::PathBuf;

use crate::types::MAX_ITERATIONS;

/// Independent switches controlling the lexing and preprocessing entry points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    /// Run the preprocessor after scanning.
    pub run_preprocessor: bool,
    /// Drop comment tokens from the final token stream.
    pub strip_comments: bool,
    /// Keep newline tokens in the final token stream.
    pub preserve_newlines: bool,
    /// Prepend `#tryinclude <sourcemod>` before preprocessing.
    pub auto_include: bool,
    /// Extra include roots, searched after the including file's directory.
    /// Relative entries are resolved against the including file's directory.
    pub include_dirs: Vec<PathBuf>,
    /// Detailed syntax errors reported before the parser switches to a
    /// single summary diagnostic.
    pub max_errors: usize,
    /// Loop iterations a single function evaluation may take.
    pub max_iterations: usize,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            run_preprocessor: true,
            strip_comments: true,
            preserve_newlines: false,
            auto_include: false,
            include_dirs: vec![PathBuf::from("include")],
            max_errors: 5,
            max_iterations: MAX_ITERATIONS,
        }
    }
}

impl Options {
    /// Options for scanning only: no preprocessing, trivia kept.
    pub fn raw() -> Self {
        Self {
            run_preprocessor: false,
            strip_comments: false,
            preserve_newlines: true,
            ..Self::default()
        }
    }

    pub fn with_preprocessor(mut self, on: bool) -> Self {
        self.run_preprocessor = on;
        self
    }

    pub fn with_strip_comments(mut self, on: bool) -> Self {
        self.strip_comments = on;
        self
    }

    pub fn with_preserve_newlines(mut self, on: bool) -> Self {
        self.preserve_newlines = on;
        self
    }

    pub fn with_auto_include(mut self, on: bool) -> Self {
        self.auto_include = on;
        self
    }

    pub fn with_include_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.include_dirs.push(dir.into());
        self
    }

    pub fn with_max_errors(mut self, max: usize) -> Self {
        self.max_errors = max;
        self
    }

    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }
}
