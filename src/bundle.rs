use crate::Conversion;
use crate::archive::{Archive, ArchiveFile, ArchiveTimestamp, build_archive};
use crate::error::VdkitError;

const MAX_NAME_LEN: usize = 80;

/// Android resource name for an input file name: lowercase `[a-z0-9_]`, no
/// extension, no leading `ic_`, at most 80 characters, `icon` when nothing is
/// left.
pub fn sanitize_resource_name(input: &str) -> String {
    let lower = input.to_lowercase();
    let stem = match lower.rfind('.') {
        Some(dot) if dot + 1 < lower.len() => &lower[..dot],
        _ => lower.as_str(),
    };

    let mut out = String::with_capacity(stem.len());
    let mut in_gap = false;
    for ch in stem.chars() {
        if ch.is_ascii_lowercase() || ch.is_ascii_digit() {
            out.push(ch);
            in_gap = false;
        } else if !in_gap {
            out.push('_');
            in_gap = true;
        }
    }

    let trimmed = out.trim_matches('_');
    let name = match trimmed.strip_prefix("ic_") {
        Some(rest) => rest.trim_start_matches('_'),
        None => trimmed,
    };
    let name: String = name.chars().take(MAX_NAME_LEN).collect();
    if name.is_empty() { "icon".to_string() } else { name }
}

pub fn resource_path(input: &str) -> String {
    format!("drawable/ic_{}.xml", sanitize_resource_name(input))
}

/// Collects converted drawables into one archive under `drawable/`.
///
/// Two inputs that sanitize to the same resource name make [`build`](Self::build)
/// fail with [`VdkitError::DuplicateEntry`].
#[derive(Debug, Clone, Default)]
pub struct BundleBuilder {
    files: Vec<ArchiveFile>,
    timestamp: Option<ArchiveTimestamp>,
}

impl BundleBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fixed modification time for every entry; without it the build time is used.
    pub fn timestamp(mut self, timestamp: ArchiveTimestamp) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn add(&mut self, name: &str, conversion: &Conversion) -> &mut Self {
        self.add_xml(name, &conversion.xml)
    }

    pub fn add_xml(&mut self, name: &str, xml: &str) -> &mut Self {
        let mut file = ArchiveFile::new(resource_path(name), xml);
        file.timestamp = self.timestamp;
        self.files.push(file);
        self
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.iter().map(|f| f.path.as_str())
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn build(&self) -> Result<Archive, VdkitError> {
        build_archive(&self.files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_names() {
        assert_eq!(sanitize_resource_name("Home Icon.svg"), "home_icon");
        assert_eq!(sanitize_resource_name("ic_arrow-back.SVG"), "arrow_back");
        assert_eq!(sanitize_resource_name("__ic__star.svg"), "star");
        assert_eq!(sanitize_resource_name("icon.svg"), "icon");
        assert_eq!(sanitize_resource_name("archive.tar.gz"), "archive_tar");
        assert_eq!(sanitize_resource_name("ic_.svg"), "ic");
        assert_eq!(sanitize_resource_name("***.svg"), "icon");
        assert_eq!(sanitize_resource_name(""), "icon");
        assert_eq!(sanitize_resource_name(&"a".repeat(200)).len(), 80);
        assert_eq!(resource_path("Logo.svg"), "drawable/ic_logo.xml");
    }

    #[test]
    fn bundle_rejects_colliding_names() {
        let ts = ArchiveTimestamp::new(2024, 1, 1, 0, 0, 0);
        let mut bundle = BundleBuilder::new().timestamp(ts);
        bundle.add_xml("a.svg", "<vector/>").add_xml("b.svg", "<vector/>");
        let archive = bundle.build().unwrap();
        let paths: Vec<&str> = archive.entries.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["drawable/ic_a.xml", "drawable/ic_b.xml"]);
        assert!(archive.entries.iter().all(|e| e.timestamp == ts));

        bundle.add_xml("A.SVG", "<vector/>");
        assert!(matches!(bundle.build(), Err(VdkitError::DuplicateEntry(_))));
    }
}
