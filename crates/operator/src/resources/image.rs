use std::fmt;

use error_stack::Report;

use super::ResourceError;

/// Container image split into repository and tag.
///
/// Joining `image` and `version` with a colon is only unambiguous when the repository
/// carries no tag or digest of its own, so both halves are validated up front. A
/// registry port (`registry:5000/redpanda`) is accepted because it precedes the last
/// path separator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReference {
    repository: String,
    tag: String,
}

impl ImageReference {
    /// Validate `image` and `version` and combine them.
    ///
    /// # Errors
    ///
    /// - [`ResourceError::InvalidImage`] if the repository is empty or already tagged,
    ///   or if the version is empty or not a plain tag
    pub fn parse(image: &str, version: &str) -> Result<Self, Report<ResourceError>> {
        if image.is_empty() || image.chars().any(char::is_whitespace) {
            return Err(invalid(format!("repository {image:?} is empty or has whitespace")));
        }

        let last_segment = image.rsplit('/').next().unwrap_or(image);
        if last_segment.is_empty() {
            return Err(invalid(format!("repository {image:?} ends with '/'")));
        }
        if last_segment.contains([':', '@']) {
            return Err(invalid(format!(
                "repository {image:?} already carries a tag or digest"
            )));
        }

        if version.is_empty()
            || version.contains([':', '@', '/'])
            || version.chars().any(char::is_whitespace)
        {
            return Err(invalid(format!("version {version:?} is not a valid tag")));
        }

        Ok(Self {
            repository: image.to_string(),
            tag: version.to_string(),
        })
    }

    pub fn repository(&self) -> &str {
        &self.repository
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.repository, self.tag)
    }
}

fn invalid(message: String) -> Report<ResourceError> {
    Report::new(ResourceError::InvalidImage { message })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_repository_and_tag() {
        let image = ImageReference::parse("vectorized/redpanda", "v21.4.1").unwrap();
        assert_eq!(image.to_string(), "vectorized/redpanda:v21.4.1");
        assert_eq!(image.repository(), "vectorized/redpanda");
        assert_eq!(image.tag(), "v21.4.1");
    }

    #[test]
    fn registry_port_is_allowed() {
        let image = ImageReference::parse("localhost:5000/redpanda", "dev").unwrap();
        assert_eq!(image.to_string(), "localhost:5000/redpanda:dev");
    }

    #[test]
    fn rejects_already_tagged_repository() {
        let err = ImageReference::parse("vectorized/redpanda:latest", "v1").unwrap_err();
        assert!(matches!(
            err.current_context(),
            ResourceError::InvalidImage { .. }
        ));

        assert!(ImageReference::parse("redpanda@sha256:abc", "v1").is_err());
    }

    #[test]
    fn rejects_malformed_version() {
        for version in ["", "v1:2", "a/b", "v 1", "sha256@x"] {
            assert!(
                ImageReference::parse("redpanda", version).is_err(),
                "{version:?} should be rejected"
            );
        }
    }

    #[test]
    fn rejects_empty_repository() {
        assert!(ImageReference::parse("", "v1").is_err());
        assert!(ImageReference::parse("registry/", "v1").is_err());
    }
}
