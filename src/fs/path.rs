//! Path helpers. Remote paths always use POSIX rules; local paths use the
//! host's own rules through `std::path`.

/// POSIX path rules, independent of the host OS
pub mod posix {
    /// Collapse `.`, `..` and repeated separators.
    pub fn normalize(path: &str) -> String {
        let absolute = path.starts_with('/');
        let mut parts: Vec<&str> = Vec::new();

        for segment in path.split('/') {
            match segment {
                "" | "." => {}
                ".." => {
                    if matches!(parts.last(), Some(last) if *last != "..") {
                        parts.pop();
                    } else if !absolute {
                        parts.push("..");
                    }
                }
                other => parts.push(other),
            }
        }

        let joined = parts.join("/");
        match (absolute, joined.is_empty()) {
            (true, _) => format!("/{}", joined),
            (false, true) => ".".to_string(),
            (false, false) => joined,
        }
    }

    pub fn join(segments: &[&str]) -> String {
        let joined = segments
            .iter()
            .filter(|s| !s.is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join("/");
        if joined.is_empty() {
            return ".".to_string();
        }
        normalize(&joined)
    }

    pub fn dirname(path: &str) -> String {
        if path.is_empty() {
            return ".".to_string();
        }
        let trimmed = path.trim_end_matches('/');
        if trimmed.is_empty() {
            return "/".to_string();
        }
        match trimmed.rfind('/') {
            None => ".".to_string(),
            Some(idx) => {
                let parent = trimmed[..idx].trim_end_matches('/');
                if parent.is_empty() {
                    "/".to_string()
                } else {
                    parent.to_string()
                }
            }
        }
    }

    pub fn basename(path: &str) -> String {
        let trimmed = path.trim_end_matches('/');
        match trimmed.rfind('/') {
            Some(idx) => trimmed[idx + 1..].to_string(),
            None => trimmed.to_string(),
        }
    }
}

/// Host path rules
pub mod native {
    use std::path::{Path, PathBuf};

    pub fn join(segments: &[&str]) -> String {
        let mut path = PathBuf::new();
        for (i, segment) in segments.iter().enumerate() {
            if segment.is_empty() {
                continue;
            }
            // Later segments never replace the accumulated path
            let segment = if i == 0 {
                *segment
            } else {
                segment.trim_start_matches(std::path::is_separator)
            };
            path.push(segment);
        }
        if path.as_os_str().is_empty() {
            return ".".to_string();
        }
        path.to_string_lossy().into_owned()
    }

    pub fn dirname(path: &str) -> String {
        match Path::new(path).parent() {
            Some(parent) if parent.as_os_str().is_empty() => ".".to_string(),
            Some(parent) => parent.to_string_lossy().into_owned(),
            // Roots are their own parent
            None if path.is_empty() => ".".to_string(),
            None => path.to_string(),
        }
    }

    pub fn basename(path: &str) -> String {
        Path::new(path)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}
