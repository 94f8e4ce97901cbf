//! Feature-attribute names accepted by trim, filter, and count.
//!
//! Each name maps to one bit of the item feature bitfield; a list of names
//! forms a conjunctive mask. `everything` is a trim-only token matching every
//! item and is represented by the full mask.

use crate::error::{OatsError, Result};
use crate::types::item::{
    FEAT_FILE, FEAT_IMAGE, FEAT_MOBILE, FEAT_SESSION_ID, FEAT_TIMESTAMP, FEAT_VIDEO_KIND,
    FEAT_VOID,
};

/// Mask value standing for the `everything` token: matches any item.
pub const EVERYTHING: u8 = 0xFF;

/// Resolve one attribute name to its feature bit.
///
/// `allow_everything` admits the `everything` token (trim only); count and
/// filter reject it like any other unknown name.
pub fn attr_mask(name: &str, allow_everything: bool) -> Result<u8> {
    match name {
        "has_timestamp" => Ok(FEAT_TIMESTAMP),
        "has_session_id" => Ok(FEAT_SESSION_ID),
        "is_image" => Ok(FEAT_IMAGE),
        "is_mobile" => Ok(FEAT_MOBILE),
        "is_void" => Ok(FEAT_VOID),
        "is_file" => Ok(FEAT_FILE),
        "has_video_kind" => Ok(FEAT_VIDEO_KIND),
        "everything" if allow_everything => Ok(EVERYTHING),
        _ => Err(OatsError::UnknownAttribute { name: name.into() }),
    }
}

/// Fold a list of attribute names into one conjunctive mask.
pub fn attrs_mask<S: AsRef<str>>(names: &[S], allow_everything: bool) -> Result<u8> {
    let mut mask = 0u8;
    for name in names {
        mask |= attr_mask(name.as_ref(), allow_everything)?;
    }
    Ok(mask)
}

/// Whether `bits` satisfies every bit of `mask`. The [`EVERYTHING`] mask
/// matches unconditionally.
#[must_use]
pub fn matches(bits: u8, mask: u8) -> bool {
    if mask == EVERYTHING {
        return true;
    }
    bits & mask == mask
}
