//! EXIF orientation tags.
//!
//! | Tag | Meaning | Class |
//! |---|---|---|
//! | 1 | normal | horizontal |
//! | 2 | mirrored horizontally | horizontal |
//! | 3 | rotated 180° | horizontal |
//! | 4 | mirrored vertically | horizontal |
//! | 5 | mirrored horizontally, rotated 270° CW | vertical |
//! | 6 | rotated 90° CW | vertical |
//! | 7 | mirrored horizontally, rotated 90° CW | vertical |
//! | 8 | rotated 270° CW | vertical |
//!
//! Vertical tags swap width and height once applied. Anything outside 1–8
//! is treated as tag 1. Decoders report the tag as
//! [`image::metadata::Orientation`], which converts losslessly.

use image::DynamicImage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Orientation {
    #[default]
    Normal,
    MirrorHorizontal,
    Rotate180,
    MirrorVertical,
    MirrorHorizontalRotate270,
    Rotate90,
    MirrorHorizontalRotate90,
    Rotate270,
}

impl Orientation {
    /// Map a raw EXIF value to an orientation, defaulting to [`Orientation::Normal`].
    pub fn from_tag(tag: u16) -> Self {
        match tag {
            2 => Self::MirrorHorizontal,
            3 => Self::Rotate180,
            4 => Self::MirrorVertical,
            5 => Self::MirrorHorizontalRotate270,
            6 => Self::Rotate90,
            7 => Self::MirrorHorizontalRotate90,
            8 => Self::Rotate270,
            _ => Self::Normal,
        }
    }

    pub fn tag(self) -> u16 {
        match self {
            Self::Normal => 1,
            Self::MirrorHorizontal => 2,
            Self::Rotate180 => 3,
            Self::MirrorVertical => 4,
            Self::MirrorHorizontalRotate270 => 5,
            Self::Rotate90 => 6,
            Self::MirrorHorizontalRotate90 => 7,
            Self::Rotate270 => 8,
        }
    }

    /// True for the 90°/270° tags, which swap the displayed dimensions.
    pub fn is_vertical(self) -> bool {
        self.tag() >= 5
    }

    /// Rotate/mirror `img` so it displays upright.
    pub fn apply(self, img: DynamicImage) -> DynamicImage {
        match self {
            Self::Normal => img,
            Self::MirrorHorizontal => img.fliph(),
            Self::Rotate180 => img.rotate180(),
            Self::MirrorVertical => img.flipv(),
            Self::MirrorHorizontalRotate270 => img.rotate90().fliph(),
            Self::Rotate90 => img.rotate90(),
            Self::MirrorHorizontalRotate90 => img.rotate270().fliph(),
            Self::Rotate270 => img.rotate270(),
        }
    }
}

impl From<image::metadata::Orientation> for Orientation {
    fn from(orientation: image::metadata::Orientation) -> Self {
        Self::from_tag(orientation.to_exif().into())
    }
}
