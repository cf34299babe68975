//! Path helpers shared by every component.
//!
//! Paths are plain strings here, not `std::path::Path`: the mock filesystem must produce the same
//! keys for a given dialect regardless of the host it runs on.

/// Path dialect selected at construction time.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum Dialect {
    #[default]
    Posix,
    Windows,
}

impl Dialect {
    pub fn separator(self) -> char {
        match self {
            Dialect::Posix => '/',
            Dialect::Windows => '\\',
        }
    }

    pub fn separator_str(self) -> &'static str {
        match self {
            Dialect::Posix => "/",
            Dialect::Windows => "\\",
        }
    }

    /// Root used when the options don't name one.
    pub fn default_root(self) -> &'static str {
        match self {
            Dialect::Posix => "/",
            Dialect::Windows => "c:",
        }
    }
}

fn is_sep(c: char) -> bool {
    c == '/' || c == '\\'
}

/// Result of splitting a windows path into `device`, root marker and tail.
struct WindowsParts<'a> {
    device: &'a str,
    has_root: bool,
    tail: &'a str,
}

impl WindowsParts<'_> {
    fn is_unc(&self) -> bool {
        !self.device.is_empty() && self.device.as_bytes().get(1) != Some(&b':')
    }
}

/// Splits `c:\foo` / `\\server\share\foo` / `\foo` / `foo`.
fn split_device(path: &str) -> WindowsParts<'_> {
    let bytes = path.as_bytes();
    let mut device_len = 0;

    if bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' {
        device_len = 2;
    } else if bytes.len() >= 2 && is_sep(bytes[0] as char) && is_sep(bytes[1] as char) {
        // two separators, server, separators, share
        let mut i = 2;
        let server_start = i;
        while i < bytes.len() && !is_sep(bytes[i] as char) {
            i += 1;
        }
        if i > server_start {
            let seps_start = i;
            while i < bytes.len() && is_sep(bytes[i] as char) {
                i += 1;
            }
            let share_start = i;
            while i < bytes.len() && !is_sep(bytes[i] as char) {
                i += 1;
            }
            if i > seps_start && i > share_start {
                device_len = i;
            }
        }
    }

    let rest = &path[device_len..];
    let has_root = rest.starts_with(is_sep);
    let tail = if has_root { &rest[1..] } else { rest };

    WindowsParts {
        device: &path[..device_len],
        has_root,
        tail,
    }
}

/// Reduces `.` and `..` segments left to right.
/// With `allow_above_root` an unmatched `..` is kept as a leading segment, otherwise it is dropped.
fn reduce_segments<'a, I>(segments: I, allow_above_root: bool) -> Vec<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut result: Vec<&str> = Vec::new();
    for segment in segments {
        match segment {
            "" | "." => {}
            ".." => match result.last() {
                Some(&last) if last != ".." => {
                    result.pop();
                }
                _ if allow_above_root => result.push(".."),
                _ => {}
            },
            _ => result.push(segment),
        }
    }
    result
}

/// Returns the canonical form of `path` for the given dialect.
pub fn normalize(dialect: Dialect, path: &str) -> String {
    match dialect {
        Dialect::Posix => normalize_posix(path),
        Dialect::Windows => normalize_windows(path),
    }
}

pub fn normalize_posix(path: &str) -> String {
    let is_absolute = is_absolute_posix(path);
    let joined = reduce_segments(path.split('/'), !is_absolute).join("/");

    if is_absolute {
        format!("/{joined}")
    } else if joined.is_empty() {
        ".".to_string()
    } else {
        joined
    }
}

pub fn normalize_windows(path: &str) -> String {
    if is_bare_drive(path) {
        return path.to_ascii_lowercase();
    }

    let parts = split_device(path);
    let is_absolute = parts.has_root || parts.is_unc();

    let mut device = parts.device.to_string();
    if parts.is_unc() {
        device = normalize_unc_root(&device);
    } else if !device.is_empty() {
        device.make_ascii_lowercase();
    }

    let mut tail = reduce_segments(parts.tail.split(is_sep), !is_absolute).join("\\");
    if tail.is_empty() && !is_absolute {
        tail.push('.');
    }

    let root = if is_absolute { "\\" } else { "" };
    format!("{device}{root}{tail}")
}

fn is_bare_drive(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() == 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

/// Normalizes a drive given as the root or in the `drives` option: `c:.` collapses to `c:`.
pub fn normalize_drive(path: &str) -> String {
    let mut drive = normalize_windows(path);
    if drive.len() == 3 && drive.ends_with('.') {
        drive.truncate(2);
    }
    drive
}

/// `//server/share` → `\\server\share`.
pub fn normalize_unc_root(device: &str) -> String {
    let trimmed = device.trim_start_matches(is_sep);
    let mut result = String::from("\\\\");
    let mut last_was_sep = false;
    for c in trimmed.chars() {
        if is_sep(c) {
            if !last_was_sep {
                result.push('\\');
            }
            last_was_sep = true;
        } else {
            result.push(c);
            last_was_sep = false;
        }
    }
    result
}

/// Joins `segments` with the dialect separator and normalizes the result.
pub fn join_paths(dialect: Dialect, segments: &[&str]) -> String {
    match dialect {
        Dialect::Posix => {
            let joined = segments
                .iter()
                .filter(|s| !s.is_empty())
                .copied()
                .collect::<Vec<_>>()
                .join("/");
            normalize_posix(&joined)
        }
        Dialect::Windows => {
            let mut joined = segments.join("\\");
            let first_is_unc = segments.first().is_some_and(|first| {
                let mut chars = first.chars();
                matches!(
                    (chars.next(), chars.next(), chars.next()),
                    (Some(a), Some(b), Some(c)) if is_sep(a) && is_sep(b) && !is_sep(c)
                )
            });
            if !first_is_unc {
                let leading = joined.chars().take_while(|&c| is_sep(c)).count();
                if leading >= 2 {
                    joined.replace_range(..leading, "\\");
                }
            }
            normalize_windows(&joined)
        }
    }
}

pub fn is_absolute(dialect: Dialect, path: &str) -> bool {
    match dialect {
        Dialect::Posix => is_absolute_posix(path),
        Dialect::Windows => is_absolute_windows(path),
    }
}

pub fn is_absolute_posix(path: &str) -> bool {
    path.starts_with('/')
}

pub fn is_absolute_windows(path: &str) -> bool {
    let parts = split_device(path);
    parts.has_root || parts.is_unc()
}

/// True if a windows path starts with a drive or UNC device, absolute or not (`c:`, `c:foo`).
pub fn has_device(path: &str) -> bool {
    !split_device(path).device.is_empty()
}

/// Converts a normalized path into a namespace key: device roots lose their trailing separator
/// so that `c:\` and `c:` address the same entry.
pub fn to_key(dialect: Dialect, normalized: String) -> String {
    if dialect == Dialect::Windows && normalized.len() > 2 && normalized.ends_with('\\') {
        let parts = split_device(&normalized);
        if !parts.device.is_empty() && parts.tail.is_empty() {
            let device_len = parts.device.len();
            let mut key = normalized;
            key.truncate(device_len);
            return key;
        }
    }
    normalized
}

/// Returns true if `key` is a root of the namespace: `/`, a drive or a UNC share.
pub fn is_virtual_root(dialect: Dialect, key: &str) -> bool {
    match dialect {
        Dialect::Posix => key == "/",
        Dialect::Windows => {
            let parts = split_device(key);
            !parts.device.is_empty() && !parts.has_root && parts.tail.is_empty()
        }
    }
}

/// Parent of a canonical key, `None` for roots and single relative segments.
pub fn parent(dialect: Dialect, key: &str) -> Option<String> {
    if is_virtual_root(dialect, key) {
        return None;
    }
    let sep = dialect.separator();
    let position = key.rfind(sep)?;
    match dialect {
        Dialect::Posix if position == 0 => Some("/".to_string()),
        Dialect::Windows => {
            let parts = split_device(key);
            if parts.has_root && position == parts.device.len() {
                if parts.device.is_empty() {
                    return None;
                }
                return Some(parts.device.to_string());
            }
            Some(key[..position].to_string())
        }
        _ => Some(key[..position].to_string()),
    }
}

/// Prefix every strict descendant of `key` starts with.
pub fn descendant_prefix(dialect: Dialect, key: &str) -> String {
    let sep = dialect.separator();
    if key.ends_with(sep) {
        key.to_string()
    } else {
        format!("{key}{sep}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod posix {
        use super::*;

        #[test]
        fn test_normalize_dot_segments() {
            assert_eq!(
                normalize_posix("/var/../var/www/../../././var/www/index.php"),
                "/var/www/index.php"
            );
            assert_eq!(normalize_posix("/a/b/./c"), "/a/b/c");
            assert_eq!(normalize_posix("/a//b///c"), "/a/b/c");
        }

        #[test]
        fn test_normalize_trailing_slash() {
            assert_eq!(normalize_posix("/var/www/"), "/var/www");
            assert_eq!(normalize_posix("/"), "/");
        }

        #[test]
        fn test_normalize_cannot_escape_root() {
            assert_eq!(normalize_posix("/../../etc"), "/etc");
            assert_eq!(normalize_posix("/.."), "/");
        }

        #[test]
        fn test_normalize_relative() {
            assert_eq!(normalize_posix("../a/../../b"), "../../b");
            assert_eq!(normalize_posix("a/.."), ".");
            assert_eq!(normalize_posix(""), ".");
            assert_eq!(normalize_posix("./a/./b"), "a/b");
        }

        #[test]
        fn test_normalize_is_idempotent() {
            for path in ["/var/www/index.php", "/", "../x", "a/b", "."] {
                assert_eq!(normalize_posix(path), path);
            }
        }

        #[test]
        fn test_join_paths() {
            assert_eq!(
                join_paths(Dialect::Posix, &["var", "www", "index.php"]),
                "var/www/index.php"
            );
            assert_eq!(join_paths(Dialect::Posix, &["/", "var", "", "www"]), "/var/www");
            assert_eq!(join_paths(Dialect::Posix, &["/var", "../etc"]), "/etc");
            assert_eq!(join_paths(Dialect::Posix, &[]), ".");
        }

        #[test]
        fn test_is_absolute() {
            assert!(is_absolute(Dialect::Posix, "/var"));
            assert!(!is_absolute(Dialect::Posix, "../var"));
        }

        #[test]
        fn test_parent() {
            assert_eq!(parent(Dialect::Posix, "/var/www"), Some("/var".to_string()));
            assert_eq!(parent(Dialect::Posix, "/var"), Some("/".to_string()));
            assert_eq!(parent(Dialect::Posix, "/"), None);
        }
    }

    mod windows {
        use super::*;

        #[test]
        fn test_normalize_dot_segments() {
            assert_eq!(
                normalize_windows("c:/xampp/../xampp/htdocs/../../././xampp/htdocs/index.php"),
                "c:\\xampp\\htdocs\\index.php"
            );
        }

        #[test]
        fn test_normalize_drive() {
            assert_eq!(normalize_windows("c:"), "c:");
            assert_eq!(normalize_windows("C:"), "c:");
            assert_eq!(normalize_windows("C:\\Users"), "c:\\Users");
            assert_eq!(normalize_drive("c:."), "c:");
            assert_eq!(normalize_drive("D:"), "d:");
        }

        #[test]
        fn test_normalize_trailing_separator() {
            assert_eq!(normalize_windows("c:\\xampp\\htdocs\\"), "c:\\xampp\\htdocs");
        }

        #[test]
        fn test_normalize_unc() {
            assert_eq!(
                normalize_windows("//server/share/a/../b"),
                "\\\\server\\share\\b"
            );
            assert_eq!(normalize_unc_root("c:/"), "\\\\c:\\");
            assert_eq!(normalize_unc_root("//server//share"), "\\\\server\\share");
        }

        #[test]
        fn test_normalize_is_idempotent() {
            for path in ["c:\\xampp\\htdocs", "c:", "\\\\server\\share\\b", "..\\x"] {
                assert_eq!(normalize_windows(path), path);
            }
        }

        #[test]
        fn test_join_paths() {
            assert_eq!(
                join_paths(Dialect::Windows, &["c:", "xampp", "htdocs", "index.php"]),
                "c:\\xampp\\htdocs\\index.php"
            );
            assert_eq!(
                join_paths(Dialect::Windows, &["\\\\server\\share", "dir"]),
                "\\\\server\\share\\dir"
            );
            assert_eq!(join_paths(Dialect::Windows, &["\\\\", "dir"]), "\\dir");
        }

        #[test]
        fn test_is_absolute() {
            assert!(is_absolute(Dialect::Windows, "c:\\xampp"));
            assert!(is_absolute(Dialect::Windows, "\\\\xampp"));
            assert!(is_absolute(Dialect::Windows, "\\\\server\\share"));
            assert!(!is_absolute(Dialect::Windows, "..\\xampp"));
            assert!(!is_absolute(Dialect::Windows, "c:xampp"));
            assert!(has_device("c:xampp"));
            assert!(has_device("\\\\srv\\share"));
            assert!(!has_device("\\xampp"));
        }

        #[test]
        fn test_keys_and_parents() {
            assert_eq!(to_key(Dialect::Windows, normalize_windows("c:\\")), "c:");
            assert_eq!(
                to_key(Dialect::Windows, normalize_windows("//srv/share/")),
                "\\\\srv\\share"
            );
            assert_eq!(parent(Dialect::Windows, "c:\\Users"), Some("c:".to_string()));
            assert_eq!(
                parent(Dialect::Windows, "c:\\Users\\john"),
                Some("c:\\Users".to_string())
            );
            assert_eq!(parent(Dialect::Windows, "c:"), None);
            assert_eq!(
                parent(Dialect::Windows, "\\\\srv\\share\\x"),
                Some("\\\\srv\\share".to_string())
            );
            assert!(is_virtual_root(Dialect::Windows, "\\\\srv\\share"));
            assert_eq!(descendant_prefix(Dialect::Windows, "c:"), "c:\\");
            assert_eq!(descendant_prefix(Dialect::Posix, "/"), "/");
        }
    }
}
