use core::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::Error;

/// Constant token separating the prefix from the sequence number.
pub const ITEM_NUMBER_TOKEN: &str = "EMZ";

/// Minimum width of the zero-padded sequence number.
pub const SEQUENCE_WIDTH: usize = 3;

/// Formats `{brand_code}-{model_code}-EMZ-{sequence}` with the sequence padded
/// to at least [`SEQUENCE_WIDTH`] digits. Never truncates.
///
/// ```
/// assert_eq!(emz_sku::format_item_number("LV", "SPD", 7), "LV-SPD-EMZ-007");
/// assert_eq!(emz_sku::format_item_number("BR-GEN", "GEN", 1250), "BR-GEN-GEN-EMZ-1250");
/// ```
pub fn format_item_number(brand_code: &str, model_code: &str, sequence: u64) -> String {
    format!("{brand_code}-{model_code}-{ITEM_NUMBER_TOKEN}-{sequence:0SEQUENCE_WIDTH$}")
}

/// The composite counter key `{brand_code}-{model_code}`.
///
/// Parsing splits at the last `-`, so the `BR-GEN` brand sentinel survives a
/// round trip.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Prefix {
    brand_code: String,
    model_code: String,
}

impl Prefix {
    pub fn new(brand_code: impl Into<String>, model_code: impl Into<String>) -> Self {
        Self {
            brand_code: brand_code.into(),
            model_code: model_code.into(),
        }
    }

    pub fn brand_code(&self) -> &str {
        &self.brand_code
    }

    pub fn model_code(&self) -> &str {
        &self.model_code
    }
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.brand_code, self.model_code)
    }
}

impl FromStr for Prefix {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::validation(format!("`{s}` is not a `BRAND-MODEL` prefix"));
        let (brand, model) = s.rsplit_once('-').ok_or_else(invalid)?;
        let is_code = |code: &str| {
            !code.is_empty()
                && code
                    .bytes()
                    .all(|b| b == b'-' || b.is_ascii_uppercase() || b.is_ascii_digit())
        };
        if !is_code(brand) || !is_code(model) || brand.starts_with('-') || brand.ends_with('-') {
            return Err(invalid());
        }
        Ok(Self::new(brand, model))
    }
}

impl TryFrom<String> for Prefix {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Prefix> for String {
    fn from(prefix: Prefix) -> Self {
        prefix.to_string()
    }
}

/// A formatted SKU such as `LV-SPD-EMZ-007`.
///
/// Only canonical forms parse: a legacy value like `LV-SPD-EMZ-7` would print
/// back differently, and an assigned item number must never change.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ItemNumber {
    prefix: Prefix,
    sequence: u64,
}

impl ItemNumber {
    pub const fn new(prefix: Prefix, sequence: u64) -> Self {
        Self { prefix, sequence }
    }

    pub fn prefix(&self) -> &Prefix {
        &self.prefix
    }

    pub fn brand_code(&self) -> &str {
        self.prefix.brand_code()
    }

    pub fn model_code(&self) -> &str {
        self.prefix.model_code()
    }

    pub const fn sequence(&self) -> u64 {
        self.sequence
    }
}

impl fmt::Display for ItemNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_item_number(
            self.brand_code(),
            self.model_code(),
            self.sequence,
        ))
    }
}

impl FromStr for ItemNumber {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid =
            |why: &str| Error::validation(format!("`{s}` is not a valid item number: {why}"));

        let (rest, digits) = s.rsplit_once('-').ok_or_else(|| invalid("missing sequence"))?;
        let (prefix, token) = rest
            .rsplit_once('-')
            .ok_or_else(|| invalid("missing `EMZ` token"))?;
        if token != ITEM_NUMBER_TOKEN {
            return Err(invalid("missing `EMZ` token"));
        }

        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid("sequence is not a number"));
        }
        let sequence: u64 = digits
            .parse()
            .map_err(|_| invalid("sequence is out of range"))?;
        if sequence == 0 {
            return Err(invalid("sequence starts at 1"));
        }
        if format!("{sequence:0SEQUENCE_WIDTH$}") != digits {
            return Err(invalid("sequence is not canonically padded"));
        }

        Ok(Self::new(prefix.parse()?, sequence))
    }
}

impl TryFrom<String> for ItemNumber {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ItemNumber> for String {
    fn from(number: ItemNumber) -> Self {
        number.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pads_to_three_digits_minimum() {
        assert_eq!(format_item_number("LV", "SPD", 7), "LV-SPD-EMZ-007");
        assert_eq!(format_item_number("LV", "SPD", 42), "LV-SPD-EMZ-042");
        assert_eq!(format_item_number("LV", "SPD", 999), "LV-SPD-EMZ-999");
    }

    #[test]
    fn never_truncates_wide_sequences() {
        assert_eq!(
            format_item_number("BR-GEN", "GEN", 1250),
            "BR-GEN-GEN-EMZ-1250"
        );
        assert_eq!(
            ItemNumber::new(Prefix::new("CH", "FLP"), 123_456).to_string(),
            "CH-FLP-EMZ-123456"
        );
    }

    #[test]
    fn parses_sentinel_brand() {
        let number: ItemNumber = "BR-GEN-GEN-EMZ-1250".parse().unwrap();
        assert_eq!(number.brand_code(), "BR-GEN");
        assert_eq!(number.model_code(), "GEN");
        assert_eq!(number.sequence(), 1250);
        assert_eq!(number.prefix().to_string(), "BR-GEN-GEN");
    }

    #[test]
    fn rejects_non_canonical_numbers() {
        for bad in [
            "",
            "LV-SPD-007",
            "LV-SPD-XYZ-007",
            "LV-SPD-EMZ-",
            "LV-SPD-EMZ-7",
            "LV-SPD-EMZ-0007",
            "LV-SPD-EMZ-000",
            "LV-SPD-EMZ--01",
            "-SPD-EMZ-001",
            "lv-spd-EMZ-001",
            "LV-SPD-EMZ-99999999999999999999999",
        ] {
            assert!(bad.parse::<ItemNumber>().is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn parses_prefixes() {
        let prefix: Prefix = "LV-SPD".parse().unwrap();
        assert_eq!(prefix, Prefix::new("LV", "SPD"));
        let prefix: Prefix = "BR-GEN-GEN".parse().unwrap();
        assert_eq!(prefix, Prefix::new("BR-GEN", "GEN"));

        for bad in ["", "LV", "LV-", "-SPD", "lv-spd", "LV SPD", "LV--SPD"] {
            assert!(bad.parse::<Prefix>().is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn serializes_as_string() {
        let number = ItemNumber::new(Prefix::new("LV", "SPD"), 7);
        let json = serde_json::to_string(&number).unwrap();
        assert_eq!(json, "\"LV-SPD-EMZ-007\"");
        let back: ItemNumber = serde_json::from_str(&json).unwrap();
        assert_eq!(back, number);
        assert!(serde_json::from_str::<ItemNumber>("\"LV-SPD-EMZ-7\"").is_err());
    }
}
