//! Reed-Solomon encoding and decoding over GF(256).
//!
//! Encoding is systematic division by the generator polynomial. Decoding
//! follows the Euclidean-algorithm variant: syndromes, extended Euclid
//! stopped once the remainder's degree drops below half the ECC length,
//! sigma/omega normalization, Chien search for error locations, and the
//! Forney formula for magnitudes.

use crate::error::{QrError, QrResult};
use crate::gf256;
use crate::polynomial::Polynomial;

/// Builds the generator polynomial `product_{i=0}^{degree-1} (x - alpha^i)`.
fn generator_polynomial(degree: usize) -> Polynomial {
    let mut g = Polynomial::new(vec![1]);
    for i in 0..degree {
        let term = Polynomial::new(vec![1, gf256::exp(i as i32)]);
        g = g.mul(&term);
    }
    g
}

/// Appends `ecc_len` error correction codewords to `data`, returning them
/// (the caller interleaves data and ecc codewords per block).
pub fn encode(data: &[u8], ecc_len: usize) -> Vec<u8> {
    let generator = generator_polynomial(ecc_len);
    let message = Polynomial::new({
        let mut coeffs = data.to_vec();
        coeffs.extend(std::iter::repeat(0).take(ecc_len));
        coeffs
    });
    let (_, remainder) = message.div(&generator);

    // remainder has degree < ecc_len; right-pad into a fixed-width ecc block.
    let mut ecc = vec![0u8; ecc_len];
    let remainder_coeffs = remainder.coefficients();
    let start = ecc_len - remainder_coeffs.len();
    ecc[start..].copy_from_slice(remainder_coeffs);
    ecc
}

/// Computes the `2t` syndromes for a received word. All zero means no errors.
fn syndromes(received: &[u8], num_ecc: usize) -> Vec<u8> {
    (0..num_ecc)
        .map(|i| {
            let received_poly = Polynomial::new(received.to_vec());
            received_poly.eval(gf256::exp(i as i32))
        })
        .collect()
}

/// Extended Euclidean algorithm run on `x^(num_ecc)` and the syndrome
/// polynomial, stopped once `deg(remainder) < num_ecc / 2`. Returns
/// `(sigma, omega)` before sigma(0)-normalization.
fn extended_euclid(syndromes: &[u8], num_ecc: usize) -> (Polynomial, Polynomial) {
    // Syndrome polynomial with low-degree-first convention flipped into our
    // high-degree-first Polynomial: S(x) = s0 + s1*x + ... s_{num_ecc-1}*x^{num_ecc-1}
    let mut syndrome_coeffs = syndromes.to_vec();
    syndrome_coeffs.reverse();
    let s = Polynomial::new(syndrome_coeffs);

    let mut r_prev = Polynomial::monomial(num_ecc, 1);
    let mut r_curr = s;
    let mut t_prev = Polynomial::zero();
    let mut t_curr = Polynomial::new(vec![1]);

    let threshold = num_ecc / 2;

    while r_curr.degree() >= threshold && !r_curr.is_zero() {
        let (q, r_next) = r_prev.div(&r_curr);
        let t_next = t_prev.add(&q.mul(&t_curr));
        r_prev = r_curr;
        r_curr = r_next;
        t_prev = t_curr;
        t_curr = t_next;
    }

    (t_curr, r_curr)
}

/// Corrects up to `num_ecc / 2` errors in `received` (data+ecc codewords,
/// high-degree-first matching wire order). Returns the corrected codewords.
pub fn decode(received: &[u8], num_ecc: usize) -> QrResult<Vec<u8>> {
    let synd = syndromes(received, num_ecc);
    if synd.iter().all(|&s| s == 0) {
        return Ok(received.to_vec());
    }

    let (sigma_raw, omega_raw) = extended_euclid(&synd, num_ecc);

    let sigma_zero = sigma_raw.coeff(0);
    if sigma_zero == 0 {
        return Err(QrError::UncorrectableError);
    }
    let inv_sigma_zero = gf256::inv(sigma_zero);
    let sigma = sigma_raw.mul_scalar(inv_sigma_zero);
    let omega = omega_raw.mul_scalar(inv_sigma_zero);

    let n = received.len();
    let mut error_positions = Vec::new();
    let mut error_locators = Vec::new();
    for i in 0..n {
        let x_inv = gf256::exp(-(i as i32));
        if sigma.eval(x_inv) == 0 {
            let position = n as i32 - 1 - i as i32;
            if position < 0 {
                return Err(QrError::UncorrectableError);
            }
            error_positions.push(position as usize);
            error_locators.push(gf256::exp(i as i32));
        }
    }

    if error_positions.len() != sigma.degree() {
        return Err(QrError::UncorrectableError);
    }
    if error_positions.is_empty() {
        return Err(QrError::UncorrectableError);
    }

    let mut corrected = received.to_vec();
    let sigma_derivative = formal_derivative(&sigma);
    for (&position, &x_i) in error_positions.iter().zip(error_locators.iter()) {
        let x_i_inv = gf256::inv(x_i);
        let numerator = omega.eval(x_i_inv);
        let denominator = sigma_derivative.eval(x_i_inv);
        if denominator == 0 {
            return Err(QrError::UncorrectableError);
        }
        let magnitude = gf256::mul(x_i, gf256::div(numerator, denominator));
        corrected[position] = gf256::add(corrected[position], magnitude);
    }

    let check = syndromes(&corrected, num_ecc);
    if !check.iter().all(|&s| s == 0) {
        return Err(QrError::UncorrectableError);
    }

    Ok(corrected)
}

/// Formal derivative over GF(2)-characteristic field: odd-degree terms
/// survive, even-degree terms vanish.
fn formal_derivative(p: &Polynomial) -> Polynomial {
    let degree = p.degree();
    let mut coeffs = Vec::new();
    for d in (1..=degree).rev() {
        if d % 2 == 1 {
            coeffs.push(p.coeff(d));
        }
    }
    if coeffs.is_empty() {
        Polynomial::zero()
    } else {
        Polynomial::new(coeffs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_then_decode_with_no_errors_returns_input() {
        let data = vec![0x10, 0x20, 0x30, 0x40];
        let ecc = encode(&data, 10);
        let mut codeword = data.clone();
        codeword.extend(ecc);
        let corrected = decode(&codeword, 10).unwrap();
        assert_eq!(corrected, codeword);
    }

    #[test]
    fn decode_corrects_a_single_byte_error() {
        let data = vec![0x10, 0x20, 0x30, 0x40, 0x50, 0x60];
        let ecc = encode(&data, 10);
        let mut codeword = data.clone();
        codeword.extend(ecc);
        let mut corrupted = codeword.clone();
        corrupted[3] ^= 0xFF;
        let corrected = decode(&corrupted, 10).unwrap();
        assert_eq!(corrected, codeword);
    }

    #[test]
    fn decode_fails_when_errors_exceed_capacity() {
        let data = vec![0x01, 0x02, 0x03];
        let ecc = encode(&data, 4); // t = 2
        let mut codeword = data.clone();
        codeword.extend(ecc);
        for i in 0..codeword.len() {
            codeword[i] ^= 0xAA;
        }
        assert!(decode(&codeword, 4).is_err());
    }
}
