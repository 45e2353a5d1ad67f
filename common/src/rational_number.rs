use anyhow::{anyhow, bail, Result};
use num_rational::Ratio;

pub type RationalNumber = num_rational::Ratio<u64>;

/// Parses a plain decimal such as `0.0577` without going through floating point
pub fn rational_number_from_decimal(text: &str) -> Result<RationalNumber> {
    let (whole, fraction) = text.trim().split_once('.').unwrap_or((text.trim(), ""));
    if whole.is_empty() && fraction.is_empty() {
        bail!("Cannot convert empty string to Rational");
    }
    if fraction.len() > 19 {
        bail!("Too many decimal places in {text}");
    }
    let digits = format!("{whole}{fraction}");
    let numer: u64 = digits.parse().map_err(|_| anyhow!("Cannot convert {text} to Rational"))?;
    let denom = 10u64.pow(fraction.len() as u32);
    Ok(RationalNumber::new(numer, denom))
}

/// Exact product of an integer quantity and a price, widened so it cannot overflow
pub fn scale(quantity: u64, price: &RationalNumber) -> Ratio<u128> {
    Ratio::new(
        quantity as u128 * *price.numer() as u128,
        *price.denom() as u128,
    )
}

/// Smallest integer not below the ratio
pub fn ceil_to_u64(value: &Ratio<u128>) -> Result<u64> {
    let ceiled = value.ceil().to_integer();
    u64::try_from(ceiled).map_err(|_| anyhow!("{ceiled} does not fit in u64"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("0.0577" => RationalNumber::new(577, 10000) ; "price memory")]
    #[test_case("0.0000721" => RationalNumber::new(721, 10_000_000) ; "price steps")]
    #[test_case("0.5" => RationalNumber::new(1, 2) ; "half")]
    #[test_case("3" => RationalNumber::new(3, 1) ; "integer")]
    fn test_fractions(text: &str) -> RationalNumber {
        rational_number_from_decimal(text).unwrap()
    }

    #[test]
    fn rejects_garbage() {
        assert!(rational_number_from_decimal("abc").is_err());
        assert!(rational_number_from_decimal("").is_err());
    }

    #[test]
    fn scaled_prices_round_up() -> Result<(), anyhow::Error> {
        let price = RationalNumber::new(577, 10000);
        assert_eq!(ceil_to_u64(&scale(10_000, &price))?, 577);
        assert_eq!(ceil_to_u64(&scale(1, &price))?, 1);
        assert_eq!(ceil_to_u64(&scale(0, &price))?, 0);
        Ok(())
    }
}
