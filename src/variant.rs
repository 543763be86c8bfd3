//! Encoded variant descriptors as supplied by a catalog.

use std::fmt;

/// Media kind of a variant, inferred from its MIME type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MediaKind {
    /// `video/*`
    Video,
    /// `audio/*`
    Audio,
    /// Anything else.
    #[default]
    Other,
}

impl MediaKind {
    /// Classifies a MIME-like string such as `video/mp4; codecs="avc1.640028"`.
    #[must_use]
    pub fn from_mime(mime: &str) -> Self {
        if mime.starts_with("video/") {
            Self::Video
        } else if mime.starts_with("audio/") {
            Self::Audio
        } else {
            Self::Other
        }
    }
}

/// One downloadable rendition of a media resource.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncodedVariant {
    /// Catalog-specific identifier of the rendition.
    pub itag: u32,
    /// MIME type including the codec parameter.
    pub mime_type: String,
    /// Quality label such as `1080p` or `720p60`, if any.
    pub quality_label: Option<String>,
    /// Bitrate in bits per second.
    pub bitrate: u64,
    /// Declared byte length, `0` when unknown.
    pub content_length: u64,
    /// Number of audio channels, `0` for video-only streams.
    pub audio_channels: u32,
    /// Direct stream location.
    pub url: String,
}

impl EncodedVariant {
    /// Returns the media kind inferred from the MIME type.
    #[must_use]
    pub fn kind(&self) -> MediaKind {
        MediaKind::from_mime(&self.mime_type)
    }

    /// Returns the parsed quality height, `0` when missing or unparseable.
    ///
    /// Only `<height>p` labels parse; `1080p60` or `hd` give `0`.
    #[must_use]
    pub fn quality(&self) -> u32 {
        self.quality_label.as_deref().map_or(0, parse_quality)
    }

    /// Returns `true` if the variant carries an audio track.
    #[must_use]
    pub const fn has_audio(&self) -> bool {
        self.audio_channels > 0
    }

    /// Returns the codec identifiers listed in the MIME type.
    #[must_use]
    pub fn codecs(&self) -> Vec<&str> {
        let Some((_, params)) = self.mime_type.split_once("codecs=") else {
            return Vec::new();
        };
        params
            .trim_matches(|c| c == '"' || c == '\'')
            .split(',')
            .map(|c| c.trim().trim_matches('"'))
            .filter(|c| !c.is_empty())
            .collect()
    }
}

impl fmt::Display for EncodedVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "itag {}, quality {}, {}, bitrate {}, channels {}",
            self.itag,
            self.quality_label.as_deref().unwrap_or("-"),
            self.mime_type,
            self.bitrate,
            self.audio_channels
        )
    }
}

fn parse_quality(label: &str) -> u32 {
    label
        .strip_suffix('p')
        .and_then(|digits| digits.parse().ok())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn variant(mime: &str, label: Option<&str>) -> EncodedVariant {
        EncodedVariant {
            mime_type: mime.to_string(),
            quality_label: label.map(str::to_string),
            ..EncodedVariant::default()
        }
    }

    #[test]
    fn kind_from_mime() {
        assert_eq!(MediaKind::from_mime("video/mp4; codecs=\"avc1\""), MediaKind::Video);
        assert_eq!(MediaKind::from_mime("audio/webm; codecs=\"opus\""), MediaKind::Audio);
        assert_eq!(MediaKind::from_mime("text/vtt"), MediaKind::Other);
        assert_eq!(MediaKind::from_mime(""), MediaKind::Other);
    }

    #[test]
    fn quality_parsing() {
        assert_eq!(variant("video/mp4", Some("1080p")).quality(), 1080);
        assert_eq!(variant("video/mp4", Some("720p60")).quality(), 0);
        assert_eq!(variant("video/mp4", Some("720")).quality(), 0);
        assert_eq!(variant("video/mp4", Some("p")).quality(), 0);
        assert_eq!(variant("video/mp4", Some("hd")).quality(), 0);
        assert_eq!(variant("video/mp4", Some("")).quality(), 0);
        assert_eq!(variant("video/mp4", None).quality(), 0);
    }

    #[test]
    fn codecs_from_mime() {
        let v = variant("video/mp4; codecs=\"avc1.640028, mp4a.40.2\"", None);
        assert_eq!(v.codecs(), vec!["avc1.640028", "mp4a.40.2"]);
        assert!(variant("video/mp4", None).codecs().is_empty());
    }

    #[test]
    fn has_audio_follows_channel_count() {
        let mut v = variant("video/mp4", Some("360p"));
        assert!(!v.has_audio());
        v.audio_channels = 2;
        assert!(v.has_audio());
    }
}
