//! Provider identifiers — the registry's cache key.

use std::fmt;
use std::str::FromStr;

use url::Url;

use crate::error::RegistryError;

/// Stable, opaque locator naming a provider's source.
///
/// Any URL works (`https://host/path`, `git+ssh://…`, `file:///…`); built-in
/// modules use the `builtin:<name>` form. The trimmed input is kept verbatim
/// so equal strings hit the same cache entry.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProviderIdentifier(String);

impl ProviderIdentifier {
    /// Validate `raw`. Runs before any network or construction work.
    pub fn parse(raw: &str) -> Result<Self, RegistryError> {
        let invalid = |reason: String| RegistryError::InvalidIdentifier {
            identifier: raw.to_string(),
            reason,
        };

        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(invalid("identifier is empty".into()));
        }
        if trimmed.chars().any(char::is_whitespace) {
            return Err(invalid("identifier contains whitespace".into()));
        }

        let url = Url::parse(trimmed).map_err(|e| invalid(format!("not a URL: {e}")))?;
        match url.scheme() {
            "http" | "https" if url.host_str().map_or(true, str::is_empty) => {
                return Err(invalid("missing host".into()));
            }
            _ if url.cannot_be_a_base() && url.path().is_empty() => {
                return Err(invalid("missing module name".into()));
            }
            _ => {}
        }

        Ok(ProviderIdentifier(trimmed.to_string()))
    }

    /// Identifier for a built-in module, e.g. `builtin:openrouter`.
    pub fn builtin(name: &str) -> Self {
        ProviderIdentifier(format!("builtin:{name}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Module name if this is a `builtin:` identifier.
    pub fn builtin_name(&self) -> Option<&str> {
        self.0.strip_prefix("builtin:")
    }
}

impl fmt::Display for ProviderIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ProviderIdentifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for ProviderIdentifier {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProviderIdentifier::parse(s)
    }
}
