//! Embedding math for appearance re-identification.

use chrono::NaiveDate;
use sha2::{Digest, Sha256};

/// Length of a visitor key: a SHA-256 digest truncated to 32 hex chars.
pub(crate) const KEY_LEN: usize = 32;

/// L2-normalize a vector. A zero-norm vector is returned unchanged.
pub(crate) fn normalize(v: &[f32]) -> Vec<f32> {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        v.iter().map(|x| x / norm).collect()
    } else {
        v.to_vec()
    }
}

/// Cosine similarity between two vectors. Zero-norm input yields 0.
pub(crate) fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a > 0.0 && norm_b > 0.0 {
        dot / (norm_a * norm_b)
    } else {
        0.0
    }
}

/// Fold a new sample into a running-average embedding:
/// `normalize(old * count + sample)`.
pub(crate) fn merge_average(old: &[f32], count: u32, sample: &[f32]) -> Vec<f32> {
    let merged: Vec<f32> = old
        .iter()
        .zip(sample)
        .map(|(o, s)| o * count as f32 + s)
        .collect();
    normalize(&merged)
}

/// Derive a visitor key from an embedding.
///
/// The embedding is normalized and quantized to 8 bits per component before
/// hashing, so small amounts of noise map to the same key. The date salts
/// the digest: an identical appearance on a different day mints a different
/// key, keeping visitor keys scoped to one appearance-day.
pub(crate) fn digest(v: &[f32], date: NaiveDate) -> String {
    let normalized = normalize(v);
    let mut quantized: Vec<u8> = normalized
        .iter()
        .map(|x| (x * 127.0 + 128.0).clamp(0.0, 255.0) as u8)
        .collect();
    quantized.extend_from_slice(date.to_string().as_bytes());
    truncated_hex(&Sha256::digest(&quantized))
}

/// Fallback visitor key when no embedding is available: deterministic per
/// (camera, track, date), unique only within that track's lifetime.
pub(crate) fn fallback_digest(camera_id: i64, track_id: u64, date: NaiveDate) -> String {
    let raw = format!("{camera_id}_{track_id}_{date}");
    truncated_hex(&Sha256::digest(raw.as_bytes()))
}

fn truncated_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(KEY_LEN);
    for b in bytes.iter().take(KEY_LEN / 2) {
        out.push_str(&format!("{b:02x}"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_unit_length() {
        let v = normalize(&[3.0, 4.0]);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_normalize_zero_vector_unchanged() {
        assert_eq!(normalize(&[0.0, 0.0]), vec![0.0, 0.0]);
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_digest_stable_under_quantization_noise() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let a = digest(&[0.5, 0.5, 0.5, 0.5], date);
        let b = digest(&[0.5001, 0.5, 0.5, 0.4999], date);
        assert_eq!(a.len(), KEY_LEN);
        assert_eq!(a, b);
    }

    #[test]
    fn test_digest_differs_for_distinct_embeddings() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        assert_ne!(digest(&[1.0, 0.0], date), digest(&[0.0, 1.0], date));
    }

    #[test]
    fn test_digest_differs_across_days() {
        let emb = [1.0, 0.0, 0.0, 0.0];
        let d1 = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let d2 = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        assert_ne!(digest(&emb, d1), digest(&emb, d2));
    }

    #[test]
    fn test_fallback_digest_deterministic() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let a = fallback_digest(1, 7, date);
        let b = fallback_digest(1, 7, date);
        assert_eq!(a, b);
        assert_eq!(a.len(), KEY_LEN);
        assert_ne!(a, fallback_digest(1, 8, date));
        assert_ne!(a, fallback_digest(2, 7, date));
    }
}
