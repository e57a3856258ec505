//! Media-index notification after mutations of whitelisted extensions.

use std::path::Path;

/// Extensions the media indexer cares about.
const MEDIA_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "webp", "heic", "bmp", "mp4", "mkv", "mov", "webm", "3gp", "mp3",
    "flac", "ogg", "opus", "m4a", "wav",
];

/// Whether a name falls under the media-extension whitelist.
pub fn is_media_name(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            let lower = e.to_ascii_lowercase();
            MEDIA_EXTENSIONS.contains(&lower.as_str())
        })
        .unwrap_or(false)
}

/// External collaborator invoked after successful mutations of media files.
/// Calls are best-effort and must never block completion.
pub trait MediaNotifier: Send + Sync {
    fn notify(&self, location: &str);
}

/// Default notifier that drops every notification.
#[derive(Debug, Default)]
pub struct NoopMediaNotifier;

impl MediaNotifier for NoopMediaNotifier {
    fn notify(&self, _location: &str) {}
}
