//! Native file pickers.

use clap::ValueEnum;
use std::path::PathBuf;

/// What kind of file to ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PickKind {
    Image,
    Video,
}

impl PickKind {
    fn filter(self) -> (&'static str, &'static [&'static str]) {
        match self {
            PickKind::Image => (
                "Image files",
                &["jpg", "jpeg", "png", "tga", "bmp", "gif", "tif", "tiff", "webp"],
            ),
            PickKind::Video => ("Video files", &["avi", "mp4", "mkv", "mov", "webm"]),
        }
    }
}

/// Ask the user for a file. `None` if the dialog was cancelled.
#[cfg(feature = "dialogs")]
pub fn pick_file(kind: PickKind) -> Option<PathBuf> {
    let (name, extensions) = kind.filter();
    rfd::FileDialog::new()
        .set_title(match kind {
            PickKind::Image => "Open image",
            PickKind::Video => "Open video",
        })
        .add_filter(name, extensions)
        .pick_file()
}

#[cfg(not(feature = "dialogs"))]
pub fn pick_file(kind: PickKind) -> Option<PathBuf> {
    let (name, _) = kind.filter();
    tracing::warn!(
        "Cannot ask for {}: file dialogs are not compiled in (enable the `dialogs` feature)",
        name.to_lowercase()
    );
    None
}
