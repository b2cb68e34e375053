use thiserror::Error;

#[derive(Debug, Error)]
pub enum VdkitError {
    /// The tree root is not a recognised container; nothing was produced.
    #[error("structural error: {0}")]
    Structural(String),
    /// A value does not fit the archive's 32-bit (or 16-bit) fields.
    #[error("{what} of {size} exceeds the archive format limit")]
    SizeOverflow { what: String, size: u64 },
    #[error("duplicate archive entry: {0}")]
    DuplicateEntry(String),
    #[error("svg parse error: {0}")]
    Xml(String),
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl VdkitError {
    pub(crate) fn size_overflow(what: impl Into<String>, size: u64) -> Self {
        VdkitError::SizeOverflow {
            what: what.into(),
            size,
        }
    }

    /// True for the error kinds the conversion core itself raises.
    pub fn is_fatal_core_error(&self) -> bool {
        matches!(
            self,
            VdkitError::Structural(_) | VdkitError::SizeOverflow { .. } | VdkitError::DuplicateEntry(_)
        )
    }
}

impl From<roxmltree::Error> for VdkitError {
    fn from(value: roxmltree::Error) -> Self {
        VdkitError::Xml(value.to_string())
    }
}
