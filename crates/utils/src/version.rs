use std::sync::LazyLock;

/// Defines the application version, e.g. `v21.4.1-3f2a9c1-dirty`.
pub static VERSION: LazyLock<String> = LazyLock::new(|| {
    format_version(
        env!("IMAGE_VERSION"),
        option_env!("VERGEN_GIT_SHA"),
        option_env!("VERGEN_GIT_DIRTY"),
    )
});

fn format_version(image_version: &str, sha: Option<&str>, dirty: Option<&str>) -> String {
    let sha = sha.map(|s| s.get(..7).unwrap_or(s)).unwrap_or("unknown");
    let dirty = if dirty == Some("true") { "-dirty" } else { "" };
    format!("{image_version}-{sha}{dirty}")
}

#[cfg(test)]
mod tests {
    use similar_asserts::assert_eq;

    use super::*;

    #[test]
    fn short_sha_and_dirty_marker() {
        assert_eq!(
            format_version("v1", Some("3f2a9c1d8e"), Some("true")),
            "v1-3f2a9c1-dirty"
        );
    }

    #[test]
    fn missing_git_metadata() {
        assert_eq!(format_version("latest", None, None), "latest-unknown");
    }
}
