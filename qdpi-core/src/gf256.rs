//! GF(2^8) arithmetic over the primitive polynomial 0x11D
//!
//! Log/antilog tables are generated at compile time. Polynomials passed to the
//! helpers here are stored lowest degree first unless stated otherwise.

use crate::constants::PRIMITIVE_POLY;

const fn build_tables() -> ([u8; 512], [u8; 256]) {
    let mut exp = [0u8; 512];
    let mut log = [0u8; 256];
    let mut x: u16 = 1;
    let mut i = 0;
    while i < 255 {
        exp[i] = x as u8;
        log[x as usize] = i as u8;
        x <<= 1;
        if x & 0x100 != 0 {
            x ^= PRIMITIVE_POLY;
        }
        i += 1;
    }
    // Doubled so products of two logs never need a modulo
    while i < 512 {
        exp[i] = exp[i - 255];
        i += 1;
    }
    (exp, log)
}

const TABLES: ([u8; 512], [u8; 256]) = build_tables();

static EXP: [u8; 512] = TABLES.0;
static LOG: [u8; 256] = TABLES.1;

/// α^power, with `power` reduced modulo 255
#[inline]
pub fn alpha_pow(power: usize) -> u8 {
    EXP[power % 255]
}

/// Discrete log of a non-zero element
#[inline]
pub fn log(a: u8) -> usize {
    debug_assert!(a != 0, "log of zero");
    LOG[a as usize] as usize
}

/// Field multiplication
#[inline]
pub fn mul(a: u8, b: u8) -> u8 {
    if a == 0 || b == 0 {
        0
    } else {
        EXP[LOG[a as usize] as usize + LOG[b as usize] as usize]
    }
}

/// Multiplicative inverse of a non-zero element
#[inline]
pub fn inv(a: u8) -> u8 {
    debug_assert!(a != 0, "inverse of zero");
    EXP[255 - LOG[a as usize] as usize]
}

/// Field division; `b` must be non-zero
#[inline]
pub fn div(a: u8, b: u8) -> u8 {
    debug_assert!(b != 0, "division by zero");
    if a == 0 {
        0
    } else {
        EXP[LOG[a as usize] as usize + 255 - LOG[b as usize] as usize]
    }
}

/// `a` raised to an integer power
#[inline]
pub fn pow(a: u8, n: usize) -> u8 {
    if n == 0 {
        1
    } else if a == 0 {
        0
    } else {
        EXP[(LOG[a as usize] as usize * n) % 255]
    }
}

/// Evaluate a lowest-degree-first polynomial at `x`
pub fn poly_eval(poly: &[u8], x: u8) -> u8 {
    poly.iter().rev().fold(0u8, |acc, &c| mul(acc, x) ^ c)
}

/// Multiply two lowest-degree-first polynomials
pub fn poly_mul(p: &[u8], q: &[u8]) -> Vec<u8> {
    if p.is_empty() || q.is_empty() {
        return Vec::new();
    }
    let mut out = vec![0u8; p.len() + q.len() - 1];
    for (i, &a) in p.iter().enumerate() {
        if a == 0 {
            continue;
        }
        for (j, &b) in q.iter().enumerate() {
            out[i + j] ^= mul(a, b);
        }
    }
    out
}

/// Formal derivative of a lowest-degree-first polynomial.
///
/// In characteristic 2 only odd-degree terms survive.
pub fn poly_derivative(poly: &[u8]) -> Vec<u8> {
    poly.iter()
        .enumerate()
        .skip(1)
        .map(|(i, &c)| if i % 2 == 1 { c } else { 0 })
        .collect()
}
