//! Container member classification.
//!
//! Archives created on some systems carry resource-fork directories and
//! Finder caches next to the real pages.  Those are never pages, whatever
//! their extension.

/// Image extensions shown as pages (compared case-insensitively).
pub const SUPPORTED_IMAGE_EXTENSIONS: [&str; 11] = [
    "jpg", "jpeg", "jif", "jiff", "gif", "png", "tif", "tiff", "bmp", "djvu", "webp",
];

/// Case-sensitive substrings marking junk entries.
pub const IGNORED_MARKERS: [&str; 4] = [".DS_Store/", "__MACOSX/", ".DS_Store\\", "__MACOSX\\"];

/// Characters that cannot appear in a file name on any supported platform.
const INVALID_FILE_NAME_CHARS: [char; 9] = ['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// True when `entry_name` is a displayable page.
pub fn is_supported_image(entry_name: &str) -> bool {
    if should_ignore(entry_name) {
        return false;
    }
    let name = sanitize_file_name(entry_name);
    match extension(&name) {
        Some(ext) => SUPPORTED_IMAGE_EXTENSIONS
            .iter()
            .any(|s| s.eq_ignore_ascii_case(ext)),
        None => false,
    }
}

/// True for entries inside known junk directories.
pub fn should_ignore(entry_name: &str) -> bool {
    IGNORED_MARKERS.iter().any(|m| entry_name.contains(m))
}

/// Replace characters that are illegal in file names with `_`.
pub fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_control() || INVALID_FILE_NAME_CHARS.contains(&c) { '_' } else { c })
        .collect()
}

/// Text after the last `.`, if non-empty.
fn extension(name: &str) -> Option<&str> {
    let (_, ext) = name.rsplit_once('.')?;
    (!ext.is_empty()).then_some(ext)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn common_pages_are_supported() {
        assert!(is_supported_image("page01.PNG"));
        assert!(is_supported_image("cover.jpeg"));
        assert!(is_supported_image("scan.djvu"));
        assert!(is_supported_image("sub/dir/p002.webp"));
        assert!(is_supported_image("p003.TiFf"));
    }

    #[test]
    fn non_images_are_rejected() {
        assert!(!is_supported_image("notes.txt"));
        assert!(!is_supported_image("README"));
        assert!(!is_supported_image("trailing."));
        assert!(!is_supported_image("ComicInfo.json"));
    }

    #[test]
    fn junk_directories_are_rejected() {
        assert!(!is_supported_image("__MACOSX/._page01.jpg"));
        assert!(!is_supported_image("book\\__MACOSX\\page01.jpg"));
        assert!(!is_supported_image("x/.DS_Store/thumb.png"));
    }

    #[test]
    fn markers_are_case_sensitive() {
        assert!(is_supported_image("__macosx/page.jpg"));
    }

    #[test]
    fn sanitize_replaces_illegal_characters() {
        assert_eq!(sanitize_file_name("a/b\\c:d?.png"), "a_b_c_d_.png");
        assert_eq!(sanitize_file_name("tab\there"), "tab_here");
    }

    #[test]
    fn extension_comes_after_the_last_separator_free_dot() {
        // "v1.5/page" sanitizes to "v1.5_page": the extension is "5_page".
        assert!(!is_supported_image("v1.5/page"));
        assert!(is_supported_image("v1.5/page.gif"));
    }

    proptest! {
        #[test]
        fn junk_marker_wins_over_extension(
            prefix in "[a-z0-9/]{0,12}",
            marker in prop::sample::select(IGNORED_MARKERS.to_vec()),
            ext in prop::sample::select(SUPPORTED_IMAGE_EXTENSIONS.to_vec()),
        ) {
            let name = format!("{prefix}{marker}page.{ext}");
            prop_assert!(!is_supported_image(&name));
        }

        #[test]
        fn supported_extensions_match_in_any_case(
            stem in "[A-Za-z0-9 _-]{1,16}",
            ext in prop::sample::select(SUPPORTED_IMAGE_EXTENSIONS.to_vec()),
            upper in any::<bool>(),
        ) {
            let ext = if upper { ext.to_uppercase() } else { ext.to_string() };
            let name = format!("{stem}.{ext}");
            prop_assert!(is_supported_image(&name));
        }
    }
}
