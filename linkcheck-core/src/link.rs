use std::path::PathBuf;

/// Where a link was discovered in the source tree, for error reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    pub file: PathBuf,
    pub line: u32,
}

/// An immutable link discovered in a rendered site, optionally carrying a
/// fragment identifier and the source location it came from.
///
/// Two links are equal when their resolved URI and fragment match;
/// `original_uri` and source metadata are carried for reporting only.
#[derive(Debug, Clone)]
pub struct Link {
    original_uri: String,
    resolved_uri: String,
    /// The fragment, including the leading `#`, if present.
    fragment: Option<String>,
    source: Option<SourceLocation>,
}

impl Link {
    /// Build a link from a (original, resolved) pair as produced by a
    /// `ResourceResolver`. The fragment is split out of `resolved_uri` if
    /// present.
    pub fn discovered(original_uri: impl Into<String>, resolved_uri: impl Into<String>) -> Self {
        let (resolved_uri, fragment) = split_fragment(resolved_uri.into());
        Self {
            original_uri: original_uri.into(),
            resolved_uri,
            fragment,
            source: None,
        }
    }

    /// Build a link where only the resolved URI is known (original and
    /// resolved coincide).
    pub fn resolved(resolved_uri: impl Into<String>) -> Self {
        let (resolved_uri, fragment) = split_fragment(resolved_uri.into());
        let original_uri = resolved_uri.clone();
        Self {
            original_uri,
            resolved_uri,
            fragment,
            source: None,
        }
    }

    pub fn with_source(mut self, file: impl Into<PathBuf>, line: u32) -> Self {
        self.source = Some(SourceLocation {
            file: file.into(),
            line,
        });
        self
    }

    /// Replace the resolved URI (and its fragment), keeping `original_uri`
    /// and source metadata. Used by `LinkMapper` rewrites.
    pub fn with_resolved_uri(mut self, resolved_uri: impl Into<String>) -> Self {
        let (resolved_uri, fragment) = split_fragment(resolved_uri.into());
        self.resolved_uri = resolved_uri;
        self.fragment = fragment;
        self
    }

    pub fn original_uri(&self) -> &str {
        &self.original_uri
    }

    pub fn resolved_uri(&self) -> &str {
        &self.resolved_uri
    }

    pub fn fragment(&self) -> Option<&str> {
        self.fragment.as_deref()
    }

    pub fn source(&self) -> Option<&SourceLocation> {
        self.source.as_ref()
    }
}

fn split_fragment(uri: String) -> (String, Option<String>) {
    match uri.find('#') {
        Some(idx) => {
            let fragment = uri[idx..].to_string();
            let base = uri[..idx].to_string();
            (base, Some(fragment))
        }
        None => (uri, None),
    }
}
