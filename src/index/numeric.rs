//! Sortable fixed-width numeric terms.
//!
//! Numbers are indexed as 16 lowercase hex digits of a `u64` whose unsigned
//! order equals the numeric order of the source value. Since every term has
//! the same width, byte-wise string order over the dictionary is numeric
//! order, and a range query is a contiguous slice of a field's terms.
//!
//! Integers flip the sign bit. Doubles flip the sign bit of non-negative
//! values and every bit of negative values (so -0.0 sorts just below 0.0).

const SIGN_BIT: u64 = 1 << 63;

/// Encode an integer.
pub fn encode_i64(value: i64) -> String {
    format!("{:016x}", (value as u64) ^ SIGN_BIT)
}

/// Encode a double.
pub fn encode_f64(value: f64) -> String {
    let bits = value.to_bits();
    let sortable = if bits & SIGN_BIT != 0 {
        !bits
    } else {
        bits | SIGN_BIT
    };
    format!("{sortable:016x}")
}
