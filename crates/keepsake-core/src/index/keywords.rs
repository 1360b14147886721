//! Keyword extraction and IDF-weighted overlap scoring.
//!
//! `TermExtractor` is the seam behind which the regex heuristics live, so
//! a stronger NLP approach can be substituted without touching callers.

use regex::Regex;
use std::collections::{BTreeSet, HashMap};

use keepsake_types::memory::Memory;

/// Common English words excluded from keywords and entity candidates.
const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "because", "been", "but", "by", "can", "could",
    "did", "do", "does", "for", "from", "had", "has", "have", "he", "her", "his", "how", "i",
    "if", "in", "into", "is", "it", "its", "just", "like", "me", "my", "no", "not", "of", "on",
    "or", "our", "she", "so", "some", "that", "the", "their", "them", "then", "there", "these",
    "they", "this", "to", "up", "use", "user", "was", "we", "were", "what", "when", "where",
    "which", "who", "will", "with", "would", "you", "your",
];

/// Short technical terms kept even below the 3-character minimum, and
/// matched case-insensitively as entities.
const DOMAIN_TERMS: &[&str] = &[
    "ai", "api", "aws", "c", "ci", "css", "db", "gcp", "git", "go", "ios", "js", "ml", "npm",
    "os", "qa", "r", "sql", "ts", "ui", "ux", "vm", "vr",
];

fn is_stop_word(token: &str) -> bool {
    STOP_WORDS.contains(&token)
}

/// Whether a lower-cased token is in the curated domain-term allowlist.
pub fn is_domain_term(token: &str) -> bool {
    DOMAIN_TERMS.contains(&token)
}

/// Token-set Jaccard similarity: |A∩B| / |A∪B|.
pub fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.union(b).count();
    intersection as f64 / union as f64
}

/// Strategy seam for keyword and surface-entity extraction from raw text.
pub trait TermExtractor: Send + Sync {
    /// Deduplicated, lower-cased keyword set for a piece of text.
    fn keywords(&self, text: &str) -> BTreeSet<String>;

    /// Named-entity candidates found in the text (original casing).
    fn entities(&self, text: &str) -> Vec<String>;
}

/// Default extractor: word tokenization, stop-word filtering, and a small
/// battery of capitalization patterns for entity candidates.
pub struct HeuristicTermExtractor {
    word: Regex,
    capitalized_run: Regex,
    camel_case: Regex,
    acronym: Regex,
}

impl HeuristicTermExtractor {
    pub fn new() -> Self {
        Self {
            word: Regex::new(r"[A-Za-z0-9_]+").expect("word pattern"),
            capitalized_run: Regex::new(r"\b[A-Z][a-z]+(?: [A-Z][a-z]+)+\b")
                .expect("capitalized-run pattern"),
            camel_case: Regex::new(r"\b(?:[a-z]+(?:[A-Z][a-z0-9]*)+|(?:[A-Z][a-z0-9]+){2,})\b")
                .expect("camel-case pattern"),
            acronym: Regex::new(r"\b[A-Z]{2,}\b").expect("acronym pattern"),
        }
    }
}

impl Default for HeuristicTermExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl TermExtractor for HeuristicTermExtractor {
    fn keywords(&self, text: &str) -> BTreeSet<String> {
        self.word
            .find_iter(text)
            .map(|m| m.as_str().to_lowercase())
            .filter(|token| !is_stop_word(token))
            .filter(|token| token.len() >= 3 || is_domain_term(token))
            .collect()
    }

    fn entities(&self, text: &str) -> Vec<String> {
        let mut seen = BTreeSet::new();
        let mut entities = Vec::new();
        let mut push = |candidate: &str| {
            let key = candidate.to_lowercase();
            if seen.insert(key) {
                entities.push(candidate.to_string());
            }
        };

        // Allowlisted domain terms, case-insensitive.
        for token in self.word.find_iter(text) {
            if is_domain_term(&token.as_str().to_lowercase()) {
                push(token.as_str());
            }
        }

        // Capitalized multi-word runs; leading stop words ("The Big Meeting")
        // are stripped, and the remainder must still be multi-word.
        for run in self.capitalized_run.find_iter(text) {
            let tokens: Vec<&str> = run.as_str().split_whitespace().collect();
            let start = tokens
                .iter()
                .position(|t| !is_stop_word(&t.to_lowercase()))
                .unwrap_or(tokens.len());
            if tokens.len() - start >= 2 {
                push(&tokens[start..].join(" "));
            }
        }

        // CamelCase tokens.
        for token in self.camel_case.find_iter(text) {
            push(token.as_str());
        }

        // All-uppercase acronyms.
        for token in self.acronym.find_iter(text) {
            push(token.as_str());
        }

        entities
    }
}

/// Term-frequency index over the memory corpus.
///
/// Maps each keyword to the number of memories containing it (scanning
/// content plus context), giving the IDF-style weights for overlap scoring.
#[derive(Debug, Clone, Default)]
pub struct KeywordIndex {
    total_memories: usize,
    frequencies: HashMap<String, usize>,
}

/// Weight for query keywords absent from the corpus: novel terms are
/// informative, so they outweigh common indexed ones.
const NOVELTY_WEIGHT: f64 = 2.0;

impl KeywordIndex {
    /// Build the index from the full corpus.
    pub fn build(memories: &[Memory], extractor: &dyn TermExtractor) -> Self {
        let mut frequencies: HashMap<String, usize> = HashMap::new();
        for memory in memories {
            for keyword in extractor.keywords(&memory.indexed_text()) {
                *frequencies.entry(keyword).or_insert(0) += 1;
            }
        }
        Self {
            total_memories: memories.len(),
            frequencies,
        }
    }

    pub fn total_memories(&self) -> usize {
        self.total_memories
    }

    /// IDF-like weight for one query keyword: `ln(total/freq) + 1` when
    /// indexed, otherwise the fixed novelty weight.
    pub fn weight(&self, keyword: &str) -> f64 {
        match self.frequencies.get(keyword) {
            Some(&freq) if freq > 0 && self.total_memories > 0 => {
                (self.total_memories as f64 / freq as f64).ln() + 1.0
            }
            _ => NOVELTY_WEIGHT,
        }
    }

    /// Weighted keyword overlap between a query and one memory, normalized
    /// to [0,1]: Σ(weight over matched keywords) / Σ(weight over all query
    /// keywords).
    pub fn weighted_score(
        &self,
        query_keywords: &BTreeSet<String>,
        memory_keywords: &BTreeSet<String>,
    ) -> f64 {
        if query_keywords.is_empty() {
            return 0.0;
        }
        let mut matched = 0.0;
        let mut possible = 0.0;
        for keyword in query_keywords {
            let weight = self.weight(keyword);
            possible += weight;
            if memory_keywords.contains(keyword) {
                matched += weight;
            }
        }
        if possible == 0.0 { 0.0 } else { matched / possible }
    }
}
