//! Serde implementations for stakepoll-types.
//!
//! Every type serializes as its display string so JSON scripts and TOML
//! configuration stay human editable.

use crate::*;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::str::FromStr;

macro_rules! string_serde {
    ($ty:ty) => {
        impl Serialize for $ty {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: Serializer,
            {
                self.to_string().serialize(serializer)
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: Deserializer<'de>,
            {
                let s = String::deserialize(deserializer)?;
                <$ty>::from_str(&s).map_err(serde::de::Error::custom)
            }
        }
    };
}

string_serde!(Address);
string_serde!(ContentHash);
string_serde!(Label);
