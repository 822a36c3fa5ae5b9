//! IEEE-754 rounding modes carried by float arithmetic terms.

/// Rounding mode attached to every floating-point arithmetic `Expr`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoundingMode {
    /// Round to nearest, ties to even.
    RNE,
    /// Round to nearest, ties away from zero.
    RNA,
    /// Round up (toward +infinity).
    RU,
    /// Round down (toward -infinity).
    RD,
    /// Round toward zero.
    RZ,
}

impl Default for RoundingMode {
    fn default() -> Self {
        RoundingMode::RNE
    }
}
