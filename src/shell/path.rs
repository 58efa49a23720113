//! Path resolution for `cd`
//!
//! - ~/Documents      (Home directory)
//! - ../sibling       (relative to the shell's working directory)
//! - /abs/./path/..   (`.` and `..` folded lexically)

use std::path::{Component, Path, PathBuf};

/// Expand a leading `~` to the home directory. Other `~` forms are left alone.
pub fn expand_home(path: &str) -> PathBuf {
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    } else if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

/// Join `path` onto `base` (unless absolute) and fold `.` / `..`.
///
/// `visit` sees every directory a `..` steps out of, before it is dropped
/// from the result, so callers can reject `missing/..` or `file/..`.
pub fn resolve<E>(base: &Path, path: &str, mut visit: impl FnMut(&Path) -> Result<(), E>) -> Result<PathBuf, E> {
    let expanded = expand_home(path);
    let joined = if expanded.is_absolute() {
        expanded
    } else {
        base.join(expanded)
    };

    let mut result = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                visit(&result)?;
                result.pop();
            }
            other => result.push(other.as_os_str()),
        }
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_home_directory() {
        let home = dirs::home_dir().unwrap();
        assert_eq!(expand_home("~"), home);
        assert_eq!(expand_home("~/Documents"), home.join("Documents"));
        assert_eq!(expand_home("~other/x"), PathBuf::from("~other/x"));
    }

    fn lexical(base: &Path, path: &str) -> PathBuf {
        resolve(base, path, |_| Ok::<(), ()>(())).unwrap()
    }

    #[cfg(unix)]
    #[test]
    fn test_relative_against_base() {
        let base = Path::new("/srv/app");
        assert_eq!(lexical(base, "logs"), PathBuf::from("/srv/app/logs"));
        assert_eq!(lexical(base, "./logs/../data"), PathBuf::from("/srv/app/data"));
        assert_eq!(lexical(base, ".."), PathBuf::from("/srv"));
    }

    #[cfg(unix)]
    #[test]
    fn test_absolute_ignores_base() {
        let base = Path::new("/srv/app");
        assert_eq!(lexical(base, "/tmp"), PathBuf::from("/tmp"));
        assert_eq!(lexical(base, "/../.."), PathBuf::from("/"));
    }

    #[cfg(unix)]
    #[test]
    fn test_visit_sees_each_parent_step() {
        let mut seen = Vec::new();
        let resolved = resolve(Path::new("/srv"), "a/../b/c/..", |dir| {
            seen.push(dir.to_path_buf());
            Ok::<(), ()>(())
        })
        .unwrap();
        assert_eq!(resolved, PathBuf::from("/srv/b"));
        assert_eq!(seen, vec![PathBuf::from("/srv/a"), PathBuf::from("/srv/b/c")]);
    }

    #[cfg(unix)]
    #[test]
    fn test_visit_error_stops_resolution() {
        let result = resolve(Path::new("/srv"), "missing/..", |dir| Err(dir.to_path_buf()));
        assert_eq!(result, Err(PathBuf::from("/srv/missing")));
    }
}
