//! Author/committer/tagger identity lines, as embedded in commit and tag object bodies:
//! `<role> <name> <<email>> <timestamp> <timezone>`.

use std::fmt::Display;
use std::str::FromStr;

use bstr::ByteSlice;
use serde::{Deserialize, Serialize};

use crate::errors::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignatureType {
    Author,
    Committer,
    Tagger,
}

impl Display for SignatureType {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            SignatureType::Author => write!(f, "author"),
            SignatureType::Committer => write!(f, "committer"),
            SignatureType::Tagger => write!(f, "tagger"),
        }
    }
}

impl FromStr for SignatureType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "author" => Ok(SignatureType::Author),
            "committer" => Ok(SignatureType::Committer),
            "tagger" => Ok(SignatureType::Tagger),
            other => Err(CoreError::UnknownEntryType(other.to_string())),
        }
    }
}

/// An identity line, carrying who made a change and when.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    pub signature_type: SignatureType,
    pub name: String,
    pub email: String,
    pub timestamp: u64,
    pub timezone: String,
}

impl Display for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "{} <{}> {} {}",
            self.name, self.email, self.timestamp, self.timezone
        )
    }
}

impl Signature {
    pub fn new(signature_type: SignatureType, name: String, email: String) -> Signature {
        Signature {
            signature_type,
            name,
            email,
            timestamp: chrono::Utc::now().timestamp() as u64,
            timezone: "+0000".to_string(),
        }
    }

    /// Parse a `"<role> <name> <<email>> <timestamp> <timezone>"` line.
    pub fn from_data(data: Vec<u8>) -> Result<Signature, CoreError> {
        let text = data
            .to_str()
            .map_err(|e| CoreError::CorruptObject("signature".to_string(), e.to_string()))?;

        let email_begin = text
            .find('<')
            .ok_or_else(|| CoreError::CorruptObject("signature".to_string(), "missing '<'".to_string()))?;
        let email_end = text
            .find('>')
            .ok_or_else(|| CoreError::CorruptObject("signature".to_string(), "missing '>'".to_string()))?;

        let signature_type = SignatureType::from_str(
            text[..text.find(' ').unwrap_or(text.len())].trim(),
        )?;
        let name = text[signature_type.to_string().len() + 1..email_begin]
            .trim()
            .to_string();
        let email = text[email_begin + 1..email_end].to_string();

        let rest = text[email_end + 1..].trim();
        let mut parts = rest.splitn(2, ' ');
        let timestamp: u64 = parts
            .next()
            .unwrap_or_default()
            .parse()
            .map_err(|_| CoreError::CorruptObject("signature".to_string(), "bad timestamp".to_string()))?;
        let timezone = parts.next().unwrap_or("+0000").to_string();

        Ok(Signature {
            signature_type,
            name,
            email,
            timestamp,
            timezone,
        })
    }

    /// Serialize back to the `"<role> <name> <<email>> <timestamp> <timezone>"` line.
    pub fn to_data(&self) -> Result<Vec<u8>, CoreError> {
        Ok(format!(
            "{} {} <{}> {} {}",
            self.signature_type, self.name, self.email, self.timestamp, self.timezone
        )
        .into_bytes())
    }
}
