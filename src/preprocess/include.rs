//! `#include` / `#tryinclude` target parsing and path resolution.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::PreprocessError;
use crate::lexer::{Op, Token, TokenKind};

/// Include nesting limit.
pub const MAX_INCLUDE_DEPTH: usize = 50;

/// The target of an include directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IncludeTarget {
    /// `#include "path"`
    Quoted(String),
    /// `#include <path>`
    System(String),
}

impl IncludeTarget {
    pub fn name(&self) -> &str {
        match self {
            IncludeTarget::Quoted(name) | IncludeTarget::System(name) => name,
        }
    }

    /// Reads the target from the rest of the directive line.
    pub fn parse(directive: &Token, line: &[Token]) -> Result<Self, PreprocessError> {
        let significant: Vec<&Token> = line.iter().filter(|t| !t.kind.is_trivia()).collect();
        let bad = || PreprocessError::BadInclude {
            span: directive.span,
            path: Arc::clone(&directive.path),
        };

        match significant.first() {
            Some(tok) if tok.kind == TokenKind::StringLit => {
                let name = tok.lexeme.trim_matches('"').to_string();
                if name.is_empty() || significant.len() > 1 {
                    return Err(bad());
                }
                Ok(IncludeTarget::Quoted(name))
            }
            Some(tok) if tok.is_op(Op::Lt) => {
                // Rebuild the path from every raw lexeme between `<` and `>`
                let start = line
                    .iter()
                    .position(|t| t.is_op(Op::Lt))
                    .ok_or_else(bad)?;
                let end = line
                    .iter()
                    .rposition(|t| t.is_op(Op::Gt))
                    .filter(|&end| end > start + 1)
                    .ok_or_else(bad)?;
                if line[end + 1..].iter().any(|t| !t.kind.is_trivia()) {
                    return Err(bad());
                }
                let name: String = line[start + 1..end].iter().map(|t| t.lexeme.as_str()).collect();
                Ok(IncludeTarget::System(name.trim().to_string()))
            }
            _ => Err(bad()),
        }
    }
}

/// Candidate files for `target`, in search order: the including file's
/// directory first, then every configured include directory. Relative include
/// directories are taken relative to the including file's directory. The
/// `<path>` form also tries `path.inc` at each location.
pub fn candidates(target: &IncludeTarget, including_file: &Path, include_dirs: &[PathBuf]) -> Vec<PathBuf> {
    let base = including_file
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();

    let mut roots = vec![base.clone()];
    for dir in include_dirs {
        if dir.is_absolute() {
            roots.push(dir.clone());
        } else {
            roots.push(base.join(dir));
        }
    }

    let name = target.name();
    let mut out = Vec::new();
    for root in roots {
        out.push(root.join(name));
        if matches!(target, IncludeTarget::System(_)) && !name.ends_with(".inc") {
            out.push(root.join(format!("{name}.inc")));
        }
    }
    out
}

/// First candidate that exists as a file.
pub fn resolve(target: &IncludeTarget, including_file: &Path, include_dirs: &[PathBuf]) -> Option<PathBuf> {
    candidates(target, including_file, include_dirs)
        .into_iter()
        .find(|p| p.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;

    fn target(src: &str) -> Result<IncludeTarget, PreprocessError> {
        let tokens = tokenize(src, "dir/main.sp").unwrap();
        IncludeTarget::parse(&tokens[0], &tokens[1..tokens.len() - 1])
    }

    #[test]
    fn test_parse_forms() {
        assert_eq!(target("#include \"util.inc\"").unwrap(), IncludeTarget::Quoted("util.inc".into()));
        assert_eq!(target("#include <sdktools/trace>").unwrap(), IncludeTarget::System("sdktools/trace".into()));
        assert!(target("#include").is_err());
        assert!(target("#include <>").is_err());
    }

    #[test]
    fn test_search_order() {
        let found = candidates(
            &IncludeTarget::System("sourcemod".into()),
            Path::new("scripts/main.sp"),
            &[PathBuf::from("include")],
        );
        assert_eq!(
            found,
            vec![
                PathBuf::from("scripts/sourcemod"),
                PathBuf::from("scripts/sourcemod.inc"),
                PathBuf::from("scripts/include/sourcemod"),
                PathBuf::from("scripts/include/sourcemod.inc"),
            ]
        );
    }
}
