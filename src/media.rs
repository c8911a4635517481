//! Media type detection for playlist content, distinguishing video
//! from still-image files by extension.

use std::fmt;
use std::path::Path;

/// How long (in seconds) a still image is displayed before the playlist
/// advances to the next item.
pub const DEFAULT_IMAGE_DURATION_SECS: u64 = 10;

const VIDEO_EXTENSIONS: &[&str] = &[
    "mp4", "mkv", "avi", "mov", "webm", "ts", "m4v", "hevc", "flv", "wmv",
];

const IMAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "bmp", "gif", "webp", "tiff", "svg",
];

/// The kind of media a file holds, judged by its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Video,
    Image,
    Unsupported,
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaKind::Video => write!(f, "video"),
            MediaKind::Image => write!(f, "image"),
            MediaKind::Unsupported => write!(f, "unsupported"),
        }
    }
}

/// Classify a file by its extension. Matching is case-insensitive and
/// looks at nothing but the extension.
pub fn classify(path: impl AsRef<Path>) -> MediaKind {
    let ext = match path.as_ref().extension().and_then(|e| e.to_str()) {
        Some(ext) => ext.to_lowercase(),
        None => return MediaKind::Unsupported,
    };

    if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
        MediaKind::Video
    } else if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
        MediaKind::Image
    } else {
        MediaKind::Unsupported
    }
}

/// Returns true if the file has a recognized media extension.
pub fn is_supported(path: impl AsRef<Path>) -> bool {
    classify(path) != MediaKind::Unsupported
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_videos_and_images() {
        assert_eq!(classify("clip.mp4"), MediaKind::Video);
        assert_eq!(classify("clip.hevc"), MediaKind::Video);
        assert_eq!(classify("banner.png"), MediaKind::Image);
        assert_eq!(classify("banner.webp"), MediaKind::Image);
        assert_eq!(classify("notes.txt"), MediaKind::Unsupported);
        assert_eq!(classify("noextension"), MediaKind::Unsupported);
    }

    #[test]
    fn extension_matching_is_case_insensitive() {
        assert_eq!(classify("CLIP.MP4"), MediaKind::Video);
        assert_eq!(classify("photo.JpG"), MediaKind::Image);
        assert_eq!(classify("movie.Mkv"), MediaKind::Video);
    }

    #[test]
    fn only_the_extension_matters() {
        assert_eq!(classify("/some/dir.mp4/file.txt"), MediaKind::Unsupported);
        assert_eq!(classify("mp4"), MediaKind::Unsupported);
        assert_eq!(classify("video.mp4.bak"), MediaKind::Unsupported);
        assert_eq!(classify("/a/b/c/video.mp4"), MediaKind::Video);
    }

    #[test]
    fn is_supported_tracks_classify() {
        assert!(is_supported("a.mov"));
        assert!(is_supported("a.gif"));
        assert!(!is_supported("a.pdf"));
    }
}
