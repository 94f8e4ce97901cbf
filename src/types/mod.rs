//! Public types exposed by the `oats-core` crate.

pub mod attr;
pub mod item;

pub use attr::{attr_mask, attrs_mask, EVERYTHING};
pub use item::{
    Features, Item, ItemKind, ItemMetadata, VideoKind, FEAT_EXTENDED, FEAT_FILE, FEAT_IMAGE,
    FEAT_MOBILE, FEAT_SESSION_ID, FEAT_TIMESTAMP, FEAT_VIDEO_KIND, FEAT_VOID,
};
