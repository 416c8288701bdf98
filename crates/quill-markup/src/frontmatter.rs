//! YAML front matter.

use std::fmt;

use serde::Deserialize;

/// Post metadata from the `---` block at the top of a source file.
#[derive(Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FrontMatter {
    pub title: Option<String>,
    pub description: Option<String>,
    pub tags: Vec<String>,
    /// Build-time only: encrypts the whole post when set.
    pub password: Option<String>,
}

impl FrontMatter {
    /// Parse a front matter body. Empty input yields the default.
    ///
    /// # Errors
    ///
    /// Returns the YAML error for malformed input.
    pub fn parse(yaml: &str) -> Result<Self, serde_yaml::Error> {
        let trimmed = yaml.trim();
        if trimmed.is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(trimmed)
    }

    /// The post password, if set and non-empty.
    #[must_use]
    pub fn password(&self) -> Option<&str> {
        self.password.as_deref().filter(|p| !p.is_empty())
    }
}

impl fmt::Debug for FrontMatter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrontMatter")
            .field("title", &self.title)
            .field("description", &self.description)
            .field("tags", &self.tags)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Split `source` into its front matter body (if any) and the markdown.
///
/// Front matter starts with a `---` line at the very top and runs to the next
/// `---` or `...` line. Without a closing line the whole input is markdown.
#[must_use]
pub fn split_front_matter(source: &str) -> (Option<&str>, &str) {
    let source = source.strip_prefix('\u{feff}').unwrap_or(source);
    let Some(first_end) = source.find('\n') else {
        return (None, source);
    };
    if source[..first_end].trim_end() != "---" {
        return (None, source);
    }

    let body_start = first_end + 1;
    let mut offset = body_start;
    for line in source[body_start..].split_inclusive('\n') {
        let content = line.trim_end();
        if content == "---" || content == "..." {
            return (Some(&source[body_start..offset]), &source[offset + line.len()..]);
        }
        offset += line.len();
    }
    (None, source)
}
