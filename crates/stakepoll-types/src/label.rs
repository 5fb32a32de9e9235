use crate::error::TypesError;
use std::fmt;
use std::str::FromStr;

/// Fixed-size text handle used for poll titles, descriptions and option labels.
///
/// Holds up to 32 bytes of UTF-8, zero padded on the right.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Label([u8; 32]);

impl Label {
    pub const MAX_LEN: usize = 32;
    pub const EMPTY: Self = Self([0u8; 32]);

    pub fn new(text: &str) -> Result<Self, TypesError> {
        let raw = text.as_bytes();
        if raw.len() > Self::MAX_LEN {
            return Err(TypesError::LabelTooLong {
                max: Self::MAX_LEN,
                actual: raw.len(),
            });
        }
        let mut bytes = [0u8; 32];
        bytes[..raw.len()].copy_from_slice(raw);
        Ok(Self(bytes))
    }

    /// Rebuild from the raw padded form. Fails on invalid UTF-8.
    pub fn from_bytes(bytes: [u8; 32]) -> Result<Self, TypesError> {
        let label = Self(bytes);
        std::str::from_utf8(label.trimmed()).map_err(|_| TypesError::InvalidLabelEncoding)?;
        Ok(label)
    }

    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn as_str(&self) -> &str {
        // Construction guarantees valid UTF-8 in the trimmed prefix.
        std::str::from_utf8(self.trimmed()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.0[0] == 0
    }

    fn trimmed(&self) -> &[u8] {
        let end = self.0.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
        &self.0[..end]
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Label({:?})", self.as_str())
    }
}

impl FromStr for Label {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}
