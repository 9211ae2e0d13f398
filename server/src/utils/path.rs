//! Path helpers for config and fixture locations

use std::path::PathBuf;

/// Expand `~` and resolve relative paths against the current directory.
///
/// ```text
/// expand_path("~/filters.json") // -> /home/user/filters.json
/// expand_path("fixtures/demo")  // -> /current/dir/fixtures/demo
/// expand_path("/etc/filters")   // -> /etc/filters
/// ```
pub fn expand_path(path: &str) -> PathBuf {
    let path = path.trim();

    let expanded = match path.strip_prefix('~') {
        Some("") => dirs::home_dir().unwrap_or_else(|| PathBuf::from(path)),
        Some(rest) if rest.starts_with('/') || rest.starts_with('\\') => match dirs::home_dir() {
            Some(home) => home.join(&rest[1..]),
            None => PathBuf::from(path),
        },
        _ => PathBuf::from(path),
    };

    if expanded.is_relative() {
        std::env::current_dir()
            .map(|cwd| cwd.join(&expanded))
            .unwrap_or(expanded)
    } else {
        expanded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(unix)]
    fn absolute_paths_pass_through() {
        assert_eq!(expand_path("/etc/filters.json"), PathBuf::from("/etc/filters.json"));
    }

    #[test]
    fn relative_paths_join_cwd() {
        let cwd = std::env::current_dir().unwrap();
        assert_eq!(expand_path("fixtures/demo.json"), cwd.join("fixtures/demo.json"));
        assert_eq!(expand_path("  demo.json "), cwd.join("demo.json"));
    }

    #[test]
    fn tilde_expands_to_home() {
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_path("~"), home);
            assert_eq!(expand_path("~/demo.json"), home.join("demo.json"));
        }
    }

    #[test]
    fn tilde_inside_name_is_literal() {
        let cwd = std::env::current_dir().unwrap();
        assert_eq!(expand_path("~demo"), cwd.join("~demo"));
    }
}
