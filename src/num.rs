use alloy::primitives::U256;
use fastnum::{
    UD256, bint,
    decimal::{Context, RoundingMode, UnsignedDecimal},
};

/// Decimals of native currency and of the traded token.
pub const ETHER_DECIMALS: u8 = 18;

/// Decimal places prices are rounded to.
pub const PRICE_DECIMALS: i16 = 5;

/// Fixed-point to decimal converter.
#[derive(Clone, Copy, Debug, Default)]
pub struct Converter {
    decimals: i32,
}

impl Converter {
    pub const fn new(decimals: u8) -> Self {
        Self {
            decimals: decimals as i32,
        }
    }

    /// Converter for 18-decimal amounts (wei <-> ether).
    pub const fn wei() -> Self {
        Self::new(ETHER_DECIMALS)
    }

    pub fn from_unsigned(&self, value: U256) -> UD256 {
        let unscaled = bint::UInt::<4>::from_le_slice(value.as_le_slice())
            .expect("Converter: U256 -> UInt::<4>");
        UnsignedDecimal::<4>::from_parts(
            unscaled,
            -self.decimals,
            Context::default().with_rounding_mode(RoundingMode::Floor),
        )
    }

    pub fn to_unsigned(&self, value: UD256) -> U256 {
        let rescaled = value.rescale(self.decimals as i16);
        U256::from_le_slice(rescaled.digits().to_radix_le(256).as_slice())
    }
}

/// Ratio of two fixed-point amounts rounded to [`PRICE_DECIMALS`],
/// zero when the denominator is zero.
pub fn price(numerator: U256, denominator: U256) -> UD256 {
    if denominator.is_zero() {
        return UD256::ZERO;
    }
    let conv = Converter::wei();
    (conv.from_unsigned(numerator) / conv.from_unsigned(denominator)).rescale(PRICE_DECIMALS)
}

#[cfg(test)]
mod tests {
    use fastnum::udec256;

    use super::*;

    #[test]
    fn test_numeric_converter_from_unsigned() {
        assert_eq!(
            Converter::new(0).from_unsigned(U256::from(1234567890)),
            udec256!(1234567890)
        );
        assert_eq!(
            Converter::new(6).from_unsigned(U256::from(1234567890)),
            udec256!(1234.56789)
        );
        assert_eq!(
            Converter::wei().from_unsigned(U256::from(1_500_000_000_000_000_000u128)),
            udec256!(1.5)
        );
    }

    #[test]
    fn test_numeric_converter_to_unsigned() {
        assert_eq!(
            Converter::new(0).to_unsigned(udec256!(1234567890)),
            U256::from(1234567890)
        );
        assert_eq!(
            Converter::new(6).to_unsigned(udec256!(1234.56789)),
            U256::from(1234567890)
        );
        assert_eq!(
            Converter::wei().to_unsigned(udec256!(0.25)),
            U256::from(250_000_000_000_000_000u128)
        );
    }

    #[test]
    fn test_price() {
        let wei = Converter::wei();
        assert_eq!(
            price(wei.to_unsigned(udec256!(1)), wei.to_unsigned(udec256!(100))),
            udec256!(0.01)
        );
        assert_eq!(
            price(wei.to_unsigned(udec256!(1)), wei.to_unsigned(udec256!(3))),
            udec256!(0.33333)
        );
        assert_eq!(price(U256::from(1), U256::ZERO), UD256::ZERO);
    }
}
