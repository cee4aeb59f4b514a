//! Axis label formatting

/// Magnitudes inside this band render in decimal notation
const DECIMAL_MIN: f64 = 1e-3;
const DECIMAL_MAX: f64 = 1e6;

/// Format an axis value for display.
///
/// Magnitudes in [1e-3, 1e6] use decimal notation with at most three
/// fractional digits; everything else uses `1eN` style scientific notation.
pub fn format_axis_label(value: f64) -> String {
    if value == 0.0 {
        return "0".to_string();
    }
    if !value.is_finite() {
        return value.to_string();
    }

    let magnitude = value.abs();
    if (DECIMAL_MIN..=DECIMAL_MAX).contains(&magnitude) {
        return trim_fraction(format!("{:.3}", value));
    }

    let mut exponent = magnitude.log10().floor() as i32;
    let mut mantissa = value / 10f64.powi(exponent);
    // Rounding can push the mantissa to 10 (9.96e7 -> "10.0e7")
    if (mantissa.abs() * 10.0).round() >= 100.0 {
        exponent += 1;
        mantissa /= 10.0;
    }
    let mantissa = trim_fraction(format!("{:.1}", mantissa));
    format!("{}e{}", mantissa, exponent)
}

fn trim_fraction(text: String) -> String {
    if !text.contains('.') {
        return text;
    }
    let trimmed = text.trim_end_matches('0').trim_end_matches('.');
    if trimmed == "-0" {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decimal_band() {
        assert_eq!(format_axis_label(1.0), "1");
        assert_eq!(format_axis_label(0.001), "0.001");
        assert_eq!(format_axis_label(2.5), "2.5");
        assert_eq!(format_axis_label(1_000_000.0), "1000000");
        assert_eq!(format_axis_label(-12.125), "-12.125");
    }

    #[test]
    fn test_scientific_outside_band() {
        assert_eq!(format_axis_label(1e-4), "1e-4");
        assert_eq!(format_axis_label(1e7), "1e7");
        assert_eq!(format_axis_label(2.5e9), "2.5e9");
        assert_eq!(format_axis_label(-1e-6), "-1e-6");
    }

    #[test]
    fn test_mantissa_rollover() {
        assert_eq!(format_axis_label(9.99e7), "1e8");
    }

    #[test]
    fn test_zero() {
        assert_eq!(format_axis_label(0.0), "0");
    }
}
