//! Canonical remote paths.
//!
//! Every path the client sends to the storage API goes through
//! [`NavigationPath`]: raw input is percent-decoded exactly once, split on
//! `/` or `\`, and empty segments are dropped. The empty path is the root.

use std::fmt;

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// characters left alone by javascript's `encodeURIComponent`
const COMPONENT_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// a normalized, root-relative path on the remote storage
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct NavigationPath {
    segments: Vec<String>,
}

/// anything that can be turned into a [`NavigationPath`]
///
/// strings are decoded and normalized; paths that are already normalized
/// pass through untouched.
pub trait IntoNavigationPath {
    fn into_navigation_path(self) -> NavigationPath;
}

impl IntoNavigationPath for NavigationPath {
    fn into_navigation_path(self) -> NavigationPath {
        self
    }
}

impl IntoNavigationPath for &NavigationPath {
    fn into_navigation_path(self) -> NavigationPath {
        self.clone()
    }
}

impl IntoNavigationPath for &str {
    fn into_navigation_path(self) -> NavigationPath {
        NavigationPath::parse(self)
    }
}

impl IntoNavigationPath for String {
    fn into_navigation_path(self) -> NavigationPath {
        NavigationPath::parse(&self)
    }
}

impl IntoNavigationPath for &String {
    fn into_navigation_path(self) -> NavigationPath {
        NavigationPath::parse(self)
    }
}

/// normalize a raw path (or pass a normalized one through)
pub fn normalize(raw: impl IntoNavigationPath) -> NavigationPath {
    raw.into_navigation_path()
}

/// join several parts into one normalized path
pub fn join<I>(parts: I) -> NavigationPath
where
    I: IntoIterator,
    I::Item: IntoNavigationPath,
{
    let segments = parts
        .into_iter()
        .flat_map(|part| part.into_navigation_path().segments)
        .collect();
    NavigationPath { segments }
}

fn encode_component(input: &str) -> String {
    utf8_percent_encode(input, COMPONENT_ENCODE_SET).to_string()
}

impl NavigationPath {
    /// the root path
    pub fn root() -> Self {
        Self::default()
    }

    fn parse(raw: &str) -> Self {
        let decoded = percent_decode_str(raw).decode_utf8_lossy();
        let segments = decoded
            .split(['/', '\\'])
            .filter(|segment| !segment.is_empty())
            .map(str::to_string)
            .collect();
        Self { segments }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// last segment, `None` at the root
    pub fn file_name(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// append a child (itself normalized) to this path
    pub fn join(&self, child: impl IntoNavigationPath) -> Self {
        join([self.clone(), child.into_navigation_path()])
    }

    /// drop the last segment. the root is its own parent.
    pub fn parent(&self) -> Self {
        let mut segments = self.segments.clone();
        segments.pop();
        Self { segments }
    }

    /// append `name` as one literal segment, without decoding it.
    /// `None` when it is empty or contains a separator.
    pub fn child(&self, name: &str) -> Option<Self> {
        if name.is_empty() || name.contains(['/', '\\']) {
            return None;
        }
        let mut segments = self.segments.clone();
        segments.push(name.to_string());
        Some(Self { segments })
    }

    /// replace the last segment with a literal name, e.g. for renaming an
    /// entry in place
    pub fn with_file_name(&self, name: &str) -> Option<Self> {
        self.parent().child(name)
    }

    /// segments joined with `/`, no leading slash
    pub fn to_display_string(&self) -> String {
        self.segments.join("/")
    }

    /// display form with a single level of percent encoding, for `?path=`
    pub fn to_query_string(&self) -> String {
        encode_component(&self.to_display_string())
    }

    /// display form encoded twice; the download endpoint unescapes once more
    /// after the http layer has decoded the request path
    pub fn to_download_segment(&self) -> String {
        encode_component(&encode_component(&self.to_display_string()))
    }

    /// one entry per segment: the segment name and the path up to it
    pub fn breadcrumbs(&self) -> Vec<(String, NavigationPath)> {
        self.segments
            .iter()
            .enumerate()
            .map(|(i, segment)| {
                let path = NavigationPath {
                    segments: self.segments[..=i].to_vec(),
                };
                (segment.clone(), path)
            })
            .collect()
    }
}

impl fmt::Display for NavigationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.to_display_string())
    }
}
