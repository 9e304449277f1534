//! Coefficient-based risk factor ranking.
//!
//! This is a structural explanation: it ranks the model's positive
//! coefficients and ignores the applicant's own feature values, so every
//! applicant scored by the same bundle gets the same factors.

use crate::models::loader::ModelBundle;
use std::cmp::Ordering;

/// Default number of factors reported per prediction
pub const DEFAULT_TOP_FACTORS: usize = 3;

/// Top `top_n` structural risk drivers, humanized.
///
/// Only strictly positive coefficients qualify. Ranking is by coefficient
/// descending; equal coefficients keep schema order. Returns fewer than
/// `top_n` labels when fewer positive coefficients exist.
pub fn top_risk_factors(
    coefficients: &[f64],
    feature_names: &[String],
    top_n: usize,
) -> Vec<String> {
    let mut positive: Vec<usize> = coefficients
        .iter()
        .enumerate()
        .filter(|(_, &c)| c > 0.0)
        .map(|(i, _)| i)
        .filter(|&i| i < feature_names.len())
        .collect();

    // sort_by is stable, so ties stay in schema order
    positive.sort_by(|&a, &b| {
        coefficients[b]
            .partial_cmp(&coefficients[a])
            .unwrap_or(Ordering::Equal)
    });

    positive
        .into_iter()
        .take(top_n)
        .map(|i| humanize(&feature_names[i]))
        .collect()
}

impl ModelBundle {
    /// Top structural risk drivers of this bundle
    pub fn top_risk_factors(&self, top_n: usize) -> Vec<String> {
        top_risk_factors(self.coefficients(), self.feature_names(), top_n)
    }
}

/// `home_ownership_OWN` -> `Home Ownership Own`
///
/// Underscores become spaces, each word is title-cased (a letter following
/// a non-letter starts a word), and runs of whitespace collapse to one space.
pub fn humanize(raw: &str) -> String {
    let spaced = raw.replace('_', " ");

    let mut titled = String::with_capacity(spaced.len());
    let mut in_word = false;
    for ch in spaced.chars() {
        if ch.is_alphabetic() {
            if in_word {
                titled.extend(ch.to_lowercase());
            } else {
                titled.extend(ch.to_uppercase());
            }
            in_word = true;
        } else {
            titled.push(ch);
            in_word = false;
        }
    }

    titled.split_whitespace().collect::<Vec<_>>().join(" ")
}
