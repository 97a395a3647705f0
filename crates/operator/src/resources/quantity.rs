//! Canonical rendering of binary-suffixed resource quantities.

const BINARY_SUFFIXES: [(&str, u32); 6] = [
    ("Ki", 10),
    ("Mi", 20),
    ("Gi", 30),
    ("Ti", 40),
    ("Pi", 50),
    ("Ei", 60),
];

/// Rewrite a binary-suffixed quantity with the largest suffix that represents it
/// exactly, e.g. `2048Mi` as `2Gi` and `1.5Gi` as `1536Mi`.
///
/// Quantities without a binary suffix are returned unchanged.
pub(crate) fn canonical_binary(quantity: &str) -> String {
    canonicalize(quantity.trim()).unwrap_or_else(|| quantity.to_string())
}

fn canonicalize(quantity: &str) -> Option<String> {
    let (number, shift) = BINARY_SUFFIXES
        .iter()
        .find_map(|(suffix, shift)| quantity.strip_suffix(suffix).map(|n| (n, *shift)))?;
    let bytes = to_bytes(number, shift)?;
    if bytes == 0 {
        return Some("0".to_string());
    }
    BINARY_SUFFIXES
        .iter()
        .rev()
        .find_map(|(suffix, shift)| {
            let unit = 1u128 << shift;
            (bytes % unit == 0).then(|| format!("{}{suffix}", bytes / unit))
        })
        .or_else(|| Some(bytes.to_string()))
}

/// `number * 2^shift`, if that is a whole number of bytes.
fn to_bytes(number: &str, shift: u32) -> Option<u128> {
    let (whole, fraction) = number.split_once('.').unwrap_or((number, ""));
    let digits = format!("{whole}{fraction}");
    if digits.is_empty() || digits.len() > 30 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let scale = 10u128.pow(u32::try_from(fraction.len()).ok()?);
    let scaled = digits.parse::<u128>().ok()?.checked_mul(1u128 << shift)?;
    (scaled % scale == 0).then(|| scaled / scale)
}
