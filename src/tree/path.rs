//! URL path joining.
//!
//! # Design Decisions
//! - Empty segments are dropped before and after trimming slashes
//! - Output always has exactly one leading slash and no trailing slash
//! - Joining nothing yields the root path

/// Join path segments into a single absolute path.
///
/// Leading and trailing slashes of every segment are stripped, empty
/// segments are discarded and the survivors are joined with one `/`.
pub fn join_paths<I, S>(segments: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let parts: Vec<String> = segments
        .into_iter()
        .filter_map(|segment| {
            let trimmed = segment.as_ref().trim_matches('/');
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        })
        .collect();

    format!("/{}", parts.join("/"))
}

/// Join a base path and a child path.
pub fn join(base: &str, path: &str) -> String {
    join_paths([base, path])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_strips_slashes() {
        assert_eq!(join("/api/", "/users/"), "/api/users");
        assert_eq!(join("api", "users"), "/api/users");
        assert_eq!(join("//api//", "///users"), "/api/users");
    }

    #[test]
    fn test_join_empty_is_root() {
        assert_eq!(join_paths(Vec::<&str>::new()), "/");
        assert_eq!(join("", ""), "/");
        assert_eq!(join_paths(["/", "//", ""]), "/");
    }

    #[test]
    fn test_join_skips_blank_segments() {
        assert_eq!(join_paths(["", "/a", "/", "b/", ""]), "/a/b");
    }

    #[test]
    fn test_join_never_double_slash() {
        let inputs: [&[&str]; 5] = [
            &["/", "/x/"],
            &["///a///", "///b///", "///c///"],
            &["a/b/", "/c"],
            &["", "", "/"],
            &["users/:id/", "/posts/*"],
        ];
        for segments in inputs {
            let joined = join_paths(segments.iter());
            assert!(joined.starts_with('/'), "{joined}");
            assert!(!joined.starts_with("//"), "{joined}");
            assert!(!joined.contains("//"), "{joined}");
        }
    }

    #[test]
    fn test_join_preserves_inner_separators() {
        assert_eq!(join("/api", "users/:id/posts"), "/api/users/:id/posts");
    }
}
