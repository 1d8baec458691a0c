use std::path::{Path, PathBuf};

use dirs_next::home_dir;

/// Resolve a user-supplied path, replacing a leading `~` segment with the
/// home directory. Input is trimmed; a missing home directory leaves `~` as is.
pub fn expand_tilde(path: &str) -> PathBuf {
    let trimmed = path.trim();
    let Some(after_tilde) = trimmed.strip_prefix('~') else {
        return PathBuf::from(trimmed);
    };
    let remainder = match after_tilde.chars().next() {
        None => "",
        Some('/') | Some('\\') => &after_tilde[1..],
        // `~user` forms are not expanded
        Some(_) => return PathBuf::from(trimmed),
    };
    let home = home_dir().unwrap_or_else(|| Path::new("~").to_path_buf());
    if remainder.is_empty() { home } else { home.join(remainder) }
}
