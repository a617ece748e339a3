//! Format descriptor table: which container formats accept metadata rewrites.
//!
//! Each [`ContainerFormat`] owns one static [`FormatDescriptor`].  A
//! descriptor decides whether it *matches* a given source (extension or
//! directory check) and carries the `update_enabled` flag.  Nothing here
//! touches the container payload; the answer is a pure function of the
//! table and the source.

use std::fmt;

use crate::source::{ContainerFormat, Source};

/// Static description of one container format.
#[derive(Clone, Copy)]
pub struct FormatDescriptor {
    pub format:         ContainerFormat,
    /// Lower-case extensions accepted by `matches`.  Empty for folders.
    pub extensions:     &'static [&'static str],
    /// Whether embedded metadata may be rewritten.
    pub update_enabled: bool,
    /// Predicate deciding whether this descriptor supports a source.
    pub matcher:        fn(&FormatDescriptor, &Source) -> bool,
}

impl FormatDescriptor {
    /// True when this descriptor supports `source`.
    pub fn matches(&self, source: &Source) -> bool {
        (self.matcher)(self, source)
    }
}

impl fmt::Debug for FormatDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormatDescriptor")
            .field("format", &self.format)
            .field("extensions", &self.extensions)
            .field("update_enabled", &self.update_enabled)
            .finish_non_exhaustive()
    }
}

/// Matches when the source extension is listed in `extensions`.
pub fn match_extension(desc: &FormatDescriptor, source: &Source) -> bool {
    source
        .extension()
        .is_some_and(|ext| desc.extensions.contains(&ext.as_str()))
}

/// Matches directories and extension-less paths.
pub fn match_directory(_: &FormatDescriptor, source: &Source) -> bool {
    source.path().is_dir() || source.extension().is_none()
}

/// Built-in descriptor table.
pub static DESCRIPTORS: &[FormatDescriptor] = &[
    FormatDescriptor {
        format:         ContainerFormat::Cbx,
        extensions:     &["cbx"],
        update_enabled: true,
        matcher:        match_extension,
    },
    FormatDescriptor {
        format:         ContainerFormat::Folder,
        extensions:     &[],
        update_enabled: false,
        matcher:        match_directory,
    },
];

/// Answers capability questions from a descriptor table.
#[derive(Debug, Clone, Copy)]
pub struct CapabilityResolver {
    table: &'static [FormatDescriptor],
}

impl Default for CapabilityResolver {
    fn default() -> Self {
        Self { table: DESCRIPTORS }
    }
}

impl CapabilityResolver {
    /// Use a custom table (tests, embedders with their own formats).
    pub fn with_table(table: &'static [FormatDescriptor]) -> Self {
        Self { table }
    }

    /// Descriptors declared for `format`.
    pub fn describe(&self, format: ContainerFormat) -> impl Iterator<Item = &'static FormatDescriptor> {
        self.table.iter().filter(move |d| d.format == format)
    }

    /// The first descriptor for the source's declared format that supports it.
    pub fn descriptor_for(&self, source: &Source) -> Option<&'static FormatDescriptor> {
        self.describe(source.format()).find(|d| d.matches(source))
    }

    /// `false` when no descriptor matches.
    pub fn update_enabled(&self, source: &Source) -> bool {
        self.descriptor_for(source).is_some_and(|d| d.update_enabled)
    }
}
