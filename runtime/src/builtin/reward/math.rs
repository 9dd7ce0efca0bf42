// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::str::FromStr;

use fvm_shared::bigint::{BigInt, ParseBigIntError};

/// Fractional bits of the fixed-point numbers used by reward and smoothing math.
pub const PRECISION: u64 = 128;

/// Parses decimal polynomial coefficients, highest order first.
pub fn poly_parse(coefs: &[&str]) -> Result<Vec<BigInt>, ParseBigIntError> {
    coefs.iter().map(|c| BigInt::from_str(c)).collect()
}

/// Evaluates a Q.128 polynomial at Q.128 `x` with Horner's method.
/// Coefficients are highest order first; the result is Q.128.
pub fn poly_val(poly: &[BigInt], x: &BigInt) -> BigInt {
    let mut res = BigInt::default();

    for coef in poly {
        res = ((res * x) >> PRECISION) + coef;
    }
    res
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn horner_matches_expansion() {
        let one = BigInt::from(1) << PRECISION;
        // 2x^2 - 3x + 5 at x = 4
        let poly = vec![&one * 2, &one * -3, &one * 5];
        let x = &one * 4;
        assert_eq!(BigInt::from(25), poly_val(&poly, &x) >> PRECISION);
    }

    #[test]
    fn parse_rejects_garbage() {
        assert_eq!(vec![BigInt::from(-7), BigInt::from(12)], poly_parse(&["-7", "12"]).unwrap());
        assert!(poly_parse(&["1", "x"]).is_err());
    }
}
