use crate::error::TypesError;
use bech32::primitives::decode::CheckedHrpstring;
use bech32::{Bech32m, Hrp};
use std::fmt;
use std::str::FromStr;

/// Human-readable part of a member's Bech32m form.
const MEMBER_HRP: &str = "stake";

/// Member identity as seen by the ledger and the polls.
///
/// Members are authenticated before they reach the engine, so an address is
/// only ever compared, hashed and printed. The canonical text form is
/// Bech32m (`stake1...`); `0x` hex is accepted on input for scripts.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Address([u8; 20]);

impl Address {
    pub const fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Stable identity for a named member: the first 20 bytes of
    /// `blake3(seed)`.
    pub fn derive(seed: &[u8]) -> Self {
        let digest = blake3::hash(seed);
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&digest.as_bytes()[..20]);
        Self(bytes)
    }

    /// Lowercase hex, no prefix.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    fn hrp() -> Hrp {
        Hrp::parse_unchecked(MEMBER_HRP)
    }

    fn parse_bech32m(text: &str) -> Result<Self, TypesError> {
        let checked = CheckedHrpstring::new::<Bech32m>(text)
            .map_err(|e| TypesError::Bech32Error(e.to_string()))?;
        if checked.hrp() != Self::hrp() {
            return Err(TypesError::InvalidAddressFormat(format!(
                "prefix '{}' is not '{}'",
                checked.hrp(),
                MEMBER_HRP
            )));
        }
        let payload: Vec<u8> = checked.byte_iter().collect();
        Self::try_from(payload.as_slice())
    }

    fn parse_hex(digits: &str) -> Result<Self, TypesError> {
        Self::try_from(hex::decode(digits)?.as_slice())
    }
}

impl TryFrom<&[u8]> for Address {
    type Error = TypesError;

    fn try_from(raw: &[u8]) -> Result<Self, Self::Error> {
        <[u8; 20]>::try_from(raw)
            .map(Self)
            .map_err(|_| TypesError::InvalidAddressLength(raw.len()))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = bech32::encode::<Bech32m>(Self::hrp(), &self.0).map_err(|_| fmt::Error)?;
        f.write_str(&text)
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Address").field(&format_args!("{}", self)).finish()
    }
}

impl fmt::LowerHex for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            f.write_str("0x")?;
        }
        f.write_str(&self.to_hex())
    }
}

impl FromStr for Address {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.get(..2) {
            Some("0x") | Some("0X") => Self::parse_hex(&s[2..]),
            _ if s
                .get(..MEMBER_HRP.len())
                .is_some_and(|prefix| prefix.eq_ignore_ascii_case(MEMBER_HRP)) =>
            {
                Self::parse_bech32m(s)
            }
            _ => Err(TypesError::InvalidAddressFormat(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_members_are_distinct() {
        let alice = Address::derive(b"alice");
        assert_eq!(alice, Address::derive(b"alice"));
        assert_ne!(alice, Address::derive(b"bob"));
        assert_ne!(alice, Address::default());
    }

    #[test]
    fn test_text_forms_parse_back() {
        let member = Address::derive(b"carol");
        let bech = member.to_string();
        assert!(bech.starts_with("stake1"));
        assert_eq!(bech.parse::<Address>().unwrap(), member);
        assert_eq!(format!("{:#x}", member).parse::<Address>().unwrap(), member);
        assert_eq!(format!("{:x}", member), member.to_hex());
    }

    #[test]
    fn test_debug_shows_bech32m() {
        let member = Address::from_bytes([7u8; 20]);
        assert_eq!(format!("{:?}", member), format!("Address({})", member));
    }

    #[test]
    fn test_wrong_payload_length() {
        assert_eq!(
            Address::try_from([1u8; 19].as_slice()),
            Err(TypesError::InvalidAddressLength(19))
        );
        assert_eq!("0x1234".parse::<Address>(), Err(TypesError::InvalidAddressLength(2)));
    }

    #[test]
    fn test_foreign_or_malformed_text() {
        assert!(matches!(
            Address::from_str("alice"),
            Err(TypesError::InvalidAddressFormat(_))
        ));
        assert!(matches!(Address::from_str("0xzz"), Err(TypesError::InvalidHex(_))));

        // Flip one character of a valid encoding; the checksum catches it.
        let mut text = Address::derive(b"dave").to_string();
        let last = text.pop().unwrap();
        text.push(if last == 'q' { 'p' } else { 'q' });
        assert!(matches!(Address::from_str(&text), Err(TypesError::Bech32Error(_))));
    }
}
