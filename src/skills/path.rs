//! Path jail for skill filesystem access.
//!
//! Every path a skill touches is built by [`resolve_under`], which joins
//! symbol components beneath a single root and rejects any component that
//! could traverse out of it. The same resolver serves both production
//! storage and sandbox jails, so escape behavior cannot differ between the
//! two.

use crate::facts::from_symbol;
use std::fmt;
use std::path::{Component, Path, PathBuf};

/// Error returned when a requested path would leave its root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathEscape {
    /// The offending component as requested
    pub component: String,
}

impl fmt::Display for PathEscape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "path component '{}' would escape the storage root; \
             only plain relative names are permitted",
            self.component
        )
    }
}

impl std::error::Error for PathEscape {}

/// Resolves symbol components strictly under `root`.
///
/// Components are `_dot_`-unescaped, then validated: absolute components,
/// `.` / `..`, and anything containing a path separator are rejected, so no
/// traversal sequence can reach outside `root` regardless of how it is
/// spelled.
///
/// # Errors
///
/// Returns [`PathEscape`] naming the first offending component.
pub fn resolve_under(root: &Path, parts: &[&str]) -> Result<PathBuf, PathEscape> {
    let mut resolved = root.to_path_buf();

    for part in parts {
        let name = from_symbol(part);

        if name.is_empty() {
            return Err(PathEscape {
                component: (*part).to_string(),
            });
        }

        let as_path = Path::new(&name);
        let mut components = as_path.components();
        let safe = matches!(
            (components.next(), components.next()),
            (Some(Component::Normal(_)), None)
        );
        // ".." unescapes to itself; "a/b" has two components; "/a" is rooted.
        if !safe || name == "." || name == ".." {
            return Err(PathEscape {
                component: (*part).to_string(),
            });
        }

        resolved.push(name);
    }

    Ok(resolved)
}
