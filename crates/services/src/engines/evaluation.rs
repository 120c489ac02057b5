//! Translation quality scoring.
//!
//! Sentence-level BLEU with add-one smoothing for n > 1, the usual
//! geometric mean of 1..4-gram precisions times a brevity penalty.

const MAX_NGRAM: usize = 4;

/// BLEU score of `hypothesis` against a single `reference`, in [0, 1].
pub fn sentence_bleu(hypothesis: &str, reference: &str) -> f64 {
    let hyp: Vec<&str> = hypothesis.split_whitespace().collect();
    let reference: Vec<&str> = reference.split_whitespace().collect();

    if hyp.is_empty() || reference.is_empty() {
        return 0.0;
    }

    let mut log_precision_sum = 0.0;
    for n in 1..=MAX_NGRAM {
        let p = modified_precision(&hyp, &reference, n);
        if p == 0.0 {
            return 0.0;
        }
        log_precision_sum += p.ln();
    }
    let geometric_mean = (log_precision_sum / MAX_NGRAM as f64).exp();

    let brevity_penalty = if hyp.len() >= reference.len() {
        1.0
    } else {
        (1.0 - reference.len() as f64 / hyp.len() as f64).exp()
    };

    brevity_penalty * geometric_mean
}

fn modified_precision(hyp: &[&str], reference: &[&str], n: usize) -> f64 {
    let hyp_grams = ngram_counts(hyp, n);
    if hyp_grams.is_empty() {
        return 0.0;
    }
    let ref_grams = ngram_counts(reference, n);

    let mut matched = 0usize;
    let mut total = 0usize;
    for (gram, count) in &hyp_grams {
        total += count;
        if let Some(ref_count) = ref_grams.get(gram) {
            matched += count.min(ref_count);
        }
    }

    // Add-one smoothing above unigrams so a single missing 4-gram does
    // not zero the whole sentence score.
    if n > 1 {
        (matched + 1) as f64 / (total + 1) as f64
    } else {
        matched as f64 / total as f64
    }
}

fn ngram_counts<'a>(tokens: &[&'a str], n: usize) -> std::collections::HashMap<Vec<&'a str>, usize> {
    let mut counts = std::collections::HashMap::new();
    if tokens.len() < n {
        return counts;
    }
    for gram in tokens.windows(n) {
        *counts.entry(gram.to_vec()).or_insert(0) += 1;
    }
    counts
}
