//! Resource quantity parsing ("500m", "2Gi", "1e3").

use crate::error::GenerateError;

const BINARY_SUFFIXES: [(&str, f64); 6] = [
    ("Ki", 1024.0),
    ("Mi", 1_048_576.0),
    ("Gi", 1_073_741_824.0),
    ("Ti", 1_099_511_627_776.0),
    ("Pi", 1_125_899_906_842_624.0),
    ("Ei", 1_152_921_504_606_846_976.0),
];

/// Suffix and power of ten.
const DECIMAL_SUFFIXES: [(char, i32); 9] = [
    ('n', -9),
    ('u', -6),
    ('m', -3),
    ('k', 3),
    ('M', 6),
    ('G', 9),
    ('T', 12),
    ('P', 15),
    ('E', 18),
];

/// Parse a quantity into base units (cores, bytes, counts).
pub fn parse_quantity(field: &str, raw: &str) -> Result<f64, GenerateError> {
    let input = raw.trim();
    let invalid = || GenerateError::invalid(field, format!("invalid quantity '{}'", raw));

    if input.is_empty() {
        return Err(invalid());
    }

    let (number, scale) = split_suffix(input);
    let value: f64 = number.parse().map_err(|_| invalid())?;
    if !value.is_finite() {
        return Err(invalid());
    }
    Ok(match scale {
        Scale::Binary(multiplier) => value * multiplier,
        // Dividing keeps "500m" and "3500m" exact.
        Scale::Decimal(exp) if exp < 0 => value / 10f64.powi(-exp),
        Scale::Decimal(exp) => value * 10f64.powi(exp),
    })
}

enum Scale {
    Binary(f64),
    Decimal(i32),
}

fn split_suffix(input: &str) -> (&str, Scale) {
    for (suffix, multiplier) in BINARY_SUFFIXES {
        if let Some(number) = input.strip_suffix(suffix) {
            return (number, Scale::Binary(multiplier));
        }
    }

    if let Some(last) = input.chars().last() {
        // "1E" is exa, "1e3" is an exponent and falls through to the float parser.
        for (suffix, exp) in DECIMAL_SUFFIXES {
            if last == suffix {
                return (&input[..input.len() - 1], Scale::Decimal(exp));
            }
        }
    }

    (input, Scale::Decimal(0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn q(raw: &str) -> f64 {
        parse_quantity("test", raw).unwrap()
    }

    #[test]
    fn test_plain_numbers() {
        assert_eq!(q("4"), 4.0);
        assert_eq!(q("128974848"), 128_974_848.0);
        assert_eq!(q("0.5"), 0.5);
        assert_eq!(q("1e3"), 1000.0);
    }

    #[test]
    fn test_decimal_suffixes() {
        assert_eq!(q("500m"), 0.5);
        assert_eq!(q("2k"), 2000.0);
        assert_eq!(q("1G"), 1e9);
        assert_eq!(q("3E"), 3e18);
    }

    #[test]
    fn test_binary_suffixes() {
        assert_eq!(q("1Ki"), 1024.0);
        assert_eq!(q("2Gi"), 2.0 * 1_073_741_824.0);
        assert_eq!(q("16310096Ki"), 16_310_096.0 * 1024.0);
    }

    #[test]
    fn test_invalid_quantities() {
        assert!(parse_quantity("cpu", "").is_err());
        assert!(parse_quantity("cpu", "lots").is_err());
        assert!(parse_quantity("cpu", "Gi").is_err());
        assert!(matches!(
            parse_quantity("cpu", "12x"),
            Err(GenerateError::InvalidField { field, .. }) if field == "cpu"
        ));
    }
}
