pub const KB: u64 = 1024;
pub const MB: u64 = 1024 * KB;
pub const GB: u64 = 1024 * MB;
pub const TB: u64 = 1024 * GB;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseByteSizeError {
    #[error("byte size is empty")]
    Empty,
    #[error("invalid byte size number `{0}`")]
    InvalidNumber(String),
    #[error("unknown byte size suffix `{0}` (expected B, KB, MB, GB or TB)")]
    UnknownSuffix(String),
    #[error("byte size `{0}` does not fit in 64 bits")]
    Overflow(String),
}

/// Parse a byte count such as `1048576`, `512KiB`, `200 MB` or `1.5GiB`.
///
/// Suffixes are case-insensitive and always binary (`1KB == 1KiB == 1024`).
pub fn parse_byte_size(input: &str) -> Result<u64, ParseByteSizeError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(ParseByteSizeError::Empty);
    }

    let split = input
        .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '_'))
        .unwrap_or(input.len());
    let (number, suffix) = input.split_at(split);
    let number = number.replace('_', "");
    if number.is_empty() {
        return Err(ParseByteSizeError::InvalidNumber(input.to_owned()));
    }

    let multiplier = match suffix.trim().to_ascii_lowercase().as_str() {
        "" | "b" => 1,
        "k" | "kb" | "kib" => KB,
        "m" | "mb" | "mib" => MB,
        "g" | "gb" | "gib" => GB,
        "t" | "tb" | "tib" => TB,
        other => return Err(ParseByteSizeError::UnknownSuffix(other.to_owned())),
    };

    if let Ok(whole) = number.parse::<u64>() {
        return whole
            .checked_mul(multiplier)
            .ok_or_else(|| ParseByteSizeError::Overflow(input.to_owned()));
    }

    let fractional: f64 = number
        .parse()
        .map_err(|_| ParseByteSizeError::InvalidNumber(input.to_owned()))?;
    let bytes = (fractional * multiplier as f64).round();
    if !bytes.is_finite() || bytes >= u64::MAX as f64 {
        return Err(ParseByteSizeError::Overflow(input.to_owned()));
    }
    Ok(bytes as u64)
}
