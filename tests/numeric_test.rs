//! Order preservation of numeric terms.

use pilum::util::numeric::{
    self, DEFAULT_PRECISION_STEP, NumericTerm, decode, decode_shift, encode_to_vec, numeric_terms,
};
use pilum::util::varint;
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Sorting the encodings must sort the values.
fn assert_sorted_by_encoding<T: NumericTerm>(mut values: Vec<T>) {
    values.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let mut encoded: Vec<Vec<u8>> = values.iter().map(|&v| encode_to_vec(v, 0)).collect();
    let expected = encoded.clone();
    encoded.sort();
    assert_eq!(encoded, expected);

    for (value, bytes) in values.iter().zip(&expected) {
        let decoded: T = decode(bytes).unwrap();
        assert_eq!(decoded.to_sortable(), value.to_sortable());
    }
}

#[test]
fn test_random_samples_sort_like_values() {
    let mut rng = StdRng::seed_from_u64(0x5EED);

    assert_sorted_by_encoding((0..10_000).map(|_| rng.random::<i32>()).collect());
    assert_sorted_by_encoding((0..10_000).map(|_| rng.random::<u32>()).collect());
    assert_sorted_by_encoding((0..10_000).map(|_| rng.random::<i64>()).collect());
    assert_sorted_by_encoding((0..10_000).map(|_| rng.random::<u64>()).collect());

    let mut floats: Vec<f64> = (0..10_000)
        .map(|_| (rng.random::<f64>() - 0.5) * 1e12)
        .collect();
    floats.extend([f64::MIN, f64::MAX, f64::INFINITY, f64::NEG_INFINITY, 0.0, -1.5]);
    assert_sorted_by_encoding(floats);

    let mut floats: Vec<f32> = (0..10_000)
        .map(|_| (rng.random::<f32>() - 0.5) * 1e6)
        .collect();
    floats.extend([f32::MIN, f32::MAX, f32::INFINITY, f32::NEG_INFINITY]);
    assert_sorted_by_encoding(floats);
}

#[test]
fn test_sentinels_bracket_every_value() {
    let table = numeric::sentinels();
    let ninf = table.f64.ninf.as_ref().unwrap();
    let inf = table.f64.inf.as_ref().unwrap();
    assert!(ninf < &table.f64.min);
    assert!(table.f64.max < *inf);

    for value in [-1e300, -1.0, 0.0, 1.0, 1e300] {
        let bytes = encode_to_vec(value, 0);
        assert!(table.f64.min <= bytes && bytes <= table.f64.max);
    }
    assert!(table.i32.min < table.i32.max);
    assert!(table.u64.inf.is_none());
}

#[test]
fn test_precision_step_terms() {
    let terms: Vec<Vec<u8>> =
        numeric_terms(0x1234_5678_9ABC_DEF0u64, DEFAULT_PRECISION_STEP).collect();
    assert_eq!(terms.len(), 4);
    for (i, term) in terms.iter().enumerate() {
        let shift = i as u32 * DEFAULT_PRECISION_STEP;
        assert_eq!(decode_shift::<u64>(term).unwrap(), shift);
        assert_eq!(
            decode::<u64>(term).unwrap(),
            (0x1234_5678_9ABC_DEF0u64 >> shift) << shift
        );
    }
}

proptest! {
    #[test]
    fn prop_i64_order(a in any::<i64>(), b in any::<i64>()) {
        prop_assert_eq!(a.cmp(&b), encode_to_vec(a, 0).cmp(&encode_to_vec(b, 0)));
    }

    #[test]
    fn prop_i32_order(a in any::<i32>(), b in any::<i32>()) {
        prop_assert_eq!(a.cmp(&b), encode_to_vec(a, 0).cmp(&encode_to_vec(b, 0)));
    }

    #[test]
    fn prop_f64_order(a in any::<f64>(), b in any::<f64>()) {
        prop_assume!(!a.is_nan() && !b.is_nan());
        prop_assume!(!(a == 0.0 && b == 0.0));
        let ordering = a.partial_cmp(&b).unwrap();
        prop_assert_eq!(ordering, encode_to_vec(a, 0).cmp(&encode_to_vec(b, 0)));
    }

    #[test]
    fn prop_shift_truncates_u64(value in any::<u64>(), shift in 0u32..=70) {
        let decoded: u64 = decode(&encode_to_vec(value, shift)).unwrap();
        let expected = if shift >= 64 { 0 } else { (value >> shift) << shift };
        prop_assert_eq!(decoded, expected);
    }

    #[test]
    fn prop_shift_truncates_u32(value in any::<u32>(), shift in 0u32..=40) {
        let decoded: u32 = decode(&encode_to_vec(value, shift)).unwrap();
        let expected = if shift >= 32 { 0 } else { (value >> shift) << shift };
        prop_assert_eq!(decoded, expected);
    }

    #[test]
    fn prop_shift_keeps_order(a in any::<i64>(), b in any::<i64>(), shift in 0u32..64) {
        prop_assume!(a <= b);
        prop_assert!(encode_to_vec(a, shift) <= encode_to_vec(b, shift));
    }

    #[test]
    fn prop_varint_round_trip(value in any::<u64>()) {
        let bytes = varint::encode_u64(value);
        prop_assert_eq!(bytes.len(), varint::size_u64(value));
        prop_assert_eq!(varint::decode_u64(&bytes).unwrap(), (value, bytes.len()));
    }

    #[test]
    fn prop_zigzag_round_trip(value in any::<i64>()) {
        prop_assert_eq!(varint::zigzag_decode_64(varint::zigzag_encode_64(value)), value);
    }
}
