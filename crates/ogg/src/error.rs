//! Error taxonomy for Ogg/Opus demuxing.

// ---------------------------------------------------------------------------
// OggError: wire-format errors
// ---------------------------------------------------------------------------

/// Container format errors detected while parsing pages and Opus headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OggError {
    /// A capture pattern or header signature did not match.
    BadMagic,
    /// The file ended before a complete record could be read.
    Eof,
    /// A page declared zero lacing segments.
    NoSegments,
    /// A header page is shorter than the fixed header it must carry.
    LenShort,
}

impl OggError {
    /// Numeric code reported in diagnostic logs. `0` is success, `-1` unknown.
    #[must_use]
    pub const fn code(self) -> i8 {
        match self {
            Self::Eof => -2,
            Self::BadMagic => -3,
            Self::NoSegments => -4,
            Self::LenShort => -5,
        }
    }
}

impl core::fmt::Display for OggError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            Self::BadMagic => "bad magic",
            Self::Eof => "unexpected end of file",
            Self::NoSegments => "page has no segments",
            Self::LenShort => "header page too short",
        })
    }
}

// ---------------------------------------------------------------------------
// DemuxError: wire-format error or storage error
// ---------------------------------------------------------------------------

/// Error from demux operations that touch a [`platform::File`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DemuxError<E: core::fmt::Debug> {
    /// I/O error from the underlying file.
    Storage(E),
    /// Container format error.
    Format(OggError),
}

impl<E: core::fmt::Debug> DemuxError<E> {
    /// The format error, if this is one.
    pub fn format(&self) -> Option<OggError> {
        match self {
            Self::Format(e) => Some(*e),
            Self::Storage(_) => None,
        }
    }

    /// `true` when the file ran out of bytes.
    pub fn is_eof(&self) -> bool {
        self.format() == Some(OggError::Eof)
    }
}

impl<E: core::fmt::Debug> From<OggError> for DemuxError<E> {
    fn from(e: OggError) -> Self {
        Self::Format(e)
    }
}
