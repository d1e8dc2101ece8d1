//! Kubernetes quantity parsing
//!
//! Converts quantity strings (`"250m"`, `"1.5Gi"`, `"1e3"`) into the
//! normalized units used by the engine. Arithmetic is done on exact integers
//! and fractional results round up, matching how the API server reports
//! `MilliValue()` and `Value()`.

/// Bytes per MiB
pub const MEBIBYTE: u64 = 1024 * 1024;

/// Parse a CPU quantity into millicores
pub fn parse_cpu_millis(quantity: &str) -> Option<u64> {
    scaled(quantity, 3)
}

/// Parse a memory quantity into bytes
pub fn parse_memory_bytes(quantity: &str) -> Option<u64> {
    scaled(quantity, 0)
}

/// Parse a memory quantity into whole MiB (truncating)
pub fn parse_memory_mib(quantity: &str) -> Option<u64> {
    parse_memory_bytes(quantity).map(bytes_to_mib)
}

pub fn bytes_to_mib(bytes: u64) -> u64 {
    bytes / MEBIBYTE
}

struct Parsed {
    /// Digits of the number with the decimal point removed
    mantissa: u128,
    /// Count of digits after the decimal point
    fraction_digits: i32,
    binary_power: u32,
    decimal_exponent: i32,
}

fn parse(quantity: &str) -> Option<Parsed> {
    let quantity = quantity.trim();
    let quantity = quantity.strip_prefix('+').unwrap_or(quantity);

    let number_len = quantity
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(quantity.len());
    let (number, suffix) = quantity.split_at(number_len);

    let (whole, fraction) = number.split_once('.').unwrap_or((number, ""));
    if whole.is_empty() && fraction.is_empty() {
        return None;
    }
    if fraction.contains('.') {
        return None;
    }

    let mut mantissa: u128 = 0;
    for digit in whole.chars().chain(fraction.chars()) {
        mantissa = mantissa
            .checked_mul(10)?
            .checked_add(digit.to_digit(10)? as u128)?;
    }

    let (binary_power, decimal_exponent) = match suffix {
        "" => (0, 0),
        "n" => (0, -9),
        "u" => (0, -6),
        "m" => (0, -3),
        "k" | "K" => (0, 3),
        "M" => (0, 6),
        "G" => (0, 9),
        "T" => (0, 12),
        "P" => (0, 15),
        "E" => (0, 18),
        "Ki" => (1, 0),
        "Mi" => (2, 0),
        "Gi" => (3, 0),
        "Ti" => (4, 0),
        "Pi" => (5, 0),
        "Ei" => (6, 0),
        other => {
            let exponent = other
                .strip_prefix('e')
                .or_else(|| other.strip_prefix('E'))?;
            (0, exponent.parse::<i32>().ok()?)
        }
    };

    Some(Parsed {
        mantissa,
        fraction_digits: i32::try_from(fraction.len()).ok()?,
        binary_power,
        decimal_exponent,
    })
}

/// Value of `quantity * 10^extra_exponent`, rounded up
fn scaled(quantity: &str, extra_exponent: i32) -> Option<u64> {
    let parsed = parse(quantity)?;

    let numerator = parsed
        .mantissa
        .checked_mul(1024u128.checked_pow(parsed.binary_power)?)?;
    let exponent = parsed
        .decimal_exponent
        .checked_add(extra_exponent)?
        .checked_sub(parsed.fraction_digits)?;

    let value = if exponent >= 0 {
        numerator.checked_mul(10u128.checked_pow(exponent as u32)?)?
    } else {
        match 10u128.checked_pow(exponent.unsigned_abs()) {
            Some(divisor) => numerator.div_ceil(divisor),
            None if numerator == 0 => 0,
            None => 1,
        }
    };

    u64::try_from(value).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cpu_millis() {
        assert_eq!(parse_cpu_millis("100m"), Some(100));
        assert_eq!(parse_cpu_millis("1"), Some(1000));
        assert_eq!(parse_cpu_millis("0.5"), Some(500));
        assert_eq!(parse_cpu_millis("2.5"), Some(2500));
        assert_eq!(parse_cpu_millis(".25"), Some(250));
        assert_eq!(parse_cpu_millis("500000000n"), Some(500));
        assert_eq!(parse_cpu_millis("500000u"), Some(500));
        assert_eq!(parse_cpu_millis("1e3"), Some(1_000_000));
        assert_eq!(parse_cpu_millis("+2"), Some(2000));
    }

    #[test]
    fn test_cpu_rounds_up_like_milli_value() {
        // 1n of a core is a tiny fraction of a millicore
        assert_eq!(parse_cpu_millis("1n"), Some(1));
        assert_eq!(parse_cpu_millis("1500001n"), Some(2));
        assert_eq!(parse_cpu_millis("0n"), Some(0));
    }

    #[test]
    fn test_parse_memory_bytes() {
        assert_eq!(parse_memory_bytes("128Mi"), Some(128 * MEBIBYTE));
        assert_eq!(parse_memory_bytes("1Gi"), Some(1024 * MEBIBYTE));
        assert_eq!(parse_memory_bytes("256Ki"), Some(256 * 1024));
        assert_eq!(parse_memory_bytes("500M"), Some(500_000_000));
        assert_eq!(parse_memory_bytes("1G"), Some(1_000_000_000));
        assert_eq!(parse_memory_bytes("1000000"), Some(1_000_000));
        assert_eq!(parse_memory_bytes("1.5Gi"), Some(1536 * MEBIBYTE));
        assert_eq!(parse_memory_bytes("128974848e0"), Some(128_974_848));
    }

    #[test]
    fn test_parse_memory_mib_truncates() {
        assert_eq!(parse_memory_mib("256Mi"), Some(256));
        assert_eq!(parse_memory_mib("500M"), Some(476));
        assert_eq!(parse_memory_mib("1023Ki"), Some(0));
    }

    #[test]
    fn test_invalid_quantities() {
        assert_eq!(parse_cpu_millis(""), None);
        assert_eq!(parse_cpu_millis("abc"), None);
        assert_eq!(parse_cpu_millis("-1"), None);
        assert_eq!(parse_cpu_millis("1.2.3"), None);
        assert_eq!(parse_memory_bytes("12Zi"), None);
        assert_eq!(parse_memory_bytes("."), None);
    }

    #[test]
    fn test_overflow_is_rejected() {
        assert_eq!(parse_memory_bytes("99999999999999999999Ei"), None);
        assert_eq!(parse_cpu_millis("1e40"), None);
        assert_eq!(parse_cpu_millis("1e2147483647"), None);
        assert_eq!(parse_memory_bytes("1.5e-2147483648"), None);
    }
}
