use std::path::PathBuf;

use dirs_next::home_dir;

/// Expand a leading `~` to the user's home directory.
///
/// Used for `OTTO_CONSOLE_CONFIG`, which users commonly set to `~/...`.
pub fn expand_tilde(path: &str) -> PathBuf {
    let trimmed = path.trim();
    let home = || home_dir().unwrap_or_else(|| PathBuf::from("~"));
    if trimmed == "~" {
        return home();
    }
    // Windows-style separators are accepted too.
    match trimmed.strip_prefix("~/").or_else(|| trimmed.strip_prefix("~\\")) {
        Some(rest) => home().join(rest),
        None => PathBuf::from(trimmed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_paths_are_untouched() {
        assert_eq!(expand_tilde(" /etc/otto/console.json "), PathBuf::from("/etc/otto/console.json"));
        assert_eq!(expand_tilde("relative/~file"), PathBuf::from("relative/~file"));
    }

    #[test]
    fn home_prefix_is_expanded() {
        let Some(home) = home_dir() else { return };
        assert_eq!(expand_tilde("~"), home);
        assert_eq!(expand_tilde("~/otto/console.json"), home.join("otto/console.json"));
    }
}
