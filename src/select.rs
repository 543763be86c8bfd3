//! Format selection: one video variant plus, when needed, one audio variant.

use crate::error::{Error, Result};
use crate::variant::{EncodedVariant, MediaKind};

/// Outcome of format selection.
///
/// `audio` is only present when the chosen video variant has no audio track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionResult {
    /// Chosen video variant.
    pub video: EncodedVariant,
    /// Chosen audio variant, absent when `video` is self-contained.
    pub audio: Option<EncodedVariant>,
}

impl SelectionResult {
    /// Sum of the declared byte lengths of the chosen variants.
    #[must_use]
    pub fn total_length(&self) -> u64 {
        self.video.content_length + self.audio.as_ref().map_or(0, |a| a.content_length)
    }
}

/// Picks the best video variant not exceeding `max_resolution`, and the
/// highest-bitrate audio variant if that video carries no audio.
///
/// Ties keep the first variant seen.
///
/// # Errors
///
/// Returns [`Error::FormatSelection`] if no video variant fits under the
/// ceiling, or if an audio variant is required and none exists.
pub fn select(variants: &[EncodedVariant], max_resolution: u32) -> Result<SelectionResult> {
    log::info!("Available formats:");
    for variant in variants {
        log::info!("  {variant}");
    }

    let video = select_video(variants, max_resolution)?;
    let audio = if video.has_audio() {
        None
    } else {
        Some(select_audio(variants)?)
    };

    log::info!("Selected video format: {video}");
    if let Some(audio) = &audio {
        log::info!("Selected audio format: {audio}");
    }

    Ok(SelectionResult {
        video: video.clone(),
        audio: audio.cloned(),
    })
}

fn select_video(variants: &[EncodedVariant], max_resolution: u32) -> Result<&EncodedVariant> {
    let mut best: Option<(&EncodedVariant, u32)> = None;
    for variant in variants.iter().filter(|v| v.kind() == MediaKind::Video) {
        let quality = variant.quality();
        if quality > max_resolution {
            continue;
        }
        if best.is_none_or(|(_, q)| quality > q) {
            best = Some((variant, quality));
        }
    }
    best.map(|(v, _)| v)
        .ok_or(Error::FormatSelection { kind: "video" })
}

fn select_audio(variants: &[EncodedVariant]) -> Result<&EncodedVariant> {
    let mut best: Option<&EncodedVariant> = None;
    for variant in variants.iter().filter(|v| v.kind() == MediaKind::Audio) {
        if best.is_none_or(|b| variant.bitrate > b.bitrate) {
            best = Some(variant);
        }
    }
    best.ok_or(Error::FormatSelection { kind: "audio" })
}
