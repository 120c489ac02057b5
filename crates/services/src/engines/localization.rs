use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::RwLock;
use regex::{NoExpand, Regex};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{StageError, is_supported_language};

/// ASCII digit -> Devanagari numeral (U+0966..U+096F).
const DEVANAGARI_DIGITS: [char; 10] = ['०', '१', '२', '३', '४', '५', '६', '७', '८', '९'];

/// Domain vocabulary: an ordered list of source terms, each mapped to
/// its localized form per language. A `Vec` rather than a map so the
/// substitution pass always runs in file order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DomainVocabulary {
    #[serde(default)]
    pub terms: Vec<VocabTerm>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VocabTerm {
    pub source: String,
    pub localized: HashMap<String, String>,
}

impl DomainVocabulary {
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

/// Static cultural adaptation rules, loaded at engine construction.
#[derive(Debug, Clone)]
pub struct CulturalRuleSet {
    /// Per-language honorific substitutions, applied whole-word.
    pub honorifics: HashMap<String, Vec<(String, String)>>,
    /// Cultural phrases, applied case-insensitively without word
    /// boundaries since they may span multiple words.
    pub phrases: Vec<(String, HashMap<String, String>)>,
    /// Languages whose digits are rendered in Devanagari numerals.
    pub numeral_scripts: Vec<String>,
}

impl CulturalRuleSet {
    pub fn builtin() -> Self {
        let mut honorifics = HashMap::new();
        honorifics.insert(
            "hi".to_string(),
            vec![
                ("Dr.".to_string(), "डॉ.".to_string()),
                ("Mr.".to_string(), "श्री".to_string()),
                ("Mrs.".to_string(), "श्रीमती".to_string()),
                ("Ms.".to_string(), "सुश्री".to_string()),
            ],
        );
        honorifics.insert(
            "mr".to_string(),
            vec![
                ("Dr.".to_string(), "डॉ.".to_string()),
                ("Mr.".to_string(), "श्री.".to_string()),
                ("Mrs.".to_string(), "सौ.".to_string()),
            ],
        );

        let phrases = vec![
            phrase("hello", &[("hi", "नमस्ते"), ("ta", "வணக்கம்"), ("bn", "নমস্কার")]),
            phrase(
                "thank you",
                &[("hi", "धन्यवाद"), ("ta", "நன்றி"), ("bn", "ধন্যবাদ")],
            ),
            phrase("please", &[("hi", "कृपया")]),
        ];

        // Devanagari-script languages.
        let numeral_scripts = ["hi", "mr", "ne", "sa", "brx", "doi", "kok", "mai", "sat"]
            .map(String::from)
            .to_vec();

        Self {
            honorifics,
            phrases,
            numeral_scripts,
        }
    }
}

fn phrase(source: &str, localized: &[(&str, &str)]) -> (String, HashMap<String, String>) {
    (
        source.to_string(),
        localized
            .iter()
            .map(|(lang, text)| (lang.to_string(), text.to_string()))
            .collect(),
    )
}

/// Result of a localization run, with one audit entry per substitution
/// actually applied.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Localized {
    pub text: String,
    pub changes: Vec<String>,
}

/// Rule-based text localization: domain vocabulary, then cultural
/// honorifics and phrases, then regional numeral formatting. Pure and
/// stateless per call once the vocabulary table is loaded.
pub struct LocalizationEngine {
    vocab_dir: PathBuf,
    rules: CulturalRuleSet,
    vocab_cache: RwLock<HashMap<String, Arc<DomainVocabulary>>>,
}

impl LocalizationEngine {
    pub fn new(vocab_dir: impl Into<PathBuf>, rules: CulturalRuleSet) -> Self {
        info!("Localization engine initialized");
        Self {
            vocab_dir: vocab_dir.into(),
            rules,
            vocab_cache: RwLock::new(HashMap::new()),
        }
    }

    /// Loads and caches the vocabulary for `domain`. A missing file is
    /// not an error: the domain pass becomes a no-op.
    pub fn load_domain_vocabulary(&self, domain: &str) -> Arc<DomainVocabulary> {
        if let Some(vocab) = self.vocab_cache.read().get(domain) {
            return vocab.clone();
        }

        let path = self.vocab_dir.join(format!("{domain}.json"));
        let vocab = match std::fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<DomainVocabulary>(&raw) {
                Ok(vocab) => {
                    info!(domain, terms = vocab.terms.len(), "Loaded domain vocabulary");
                    Arc::new(vocab)
                }
                Err(e) => {
                    warn!(domain, error = %e, "Malformed domain vocabulary, treating as empty");
                    return Arc::new(DomainVocabulary::default());
                }
            },
            Err(_) => {
                warn!(domain, path = %path.display(), "Domain vocabulary not found");
                return Arc::new(DomainVocabulary::default());
            }
        };

        self.vocab_cache
            .write()
            .insert(domain.to_string(), vocab.clone());
        vocab
    }

    /// Writes the vocabulary file and refreshes the cache. This is the
    /// only way a loaded table changes.
    pub fn create_domain_vocabulary(
        &self,
        domain: &str,
        vocab: DomainVocabulary,
    ) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.vocab_dir)?;
        let path = self.vocab_dir.join(format!("{domain}.json"));
        let raw = serde_json::to_string_pretty(&vocab)?;
        std::fs::write(&path, raw)?;

        self.vocab_cache
            .write()
            .insert(domain.to_string(), Arc::new(vocab));
        info!(domain, "Created domain vocabulary");
        Ok(())
    }

    /// Drops the cached table so the next load re-reads the file.
    pub fn reload_domain_vocabulary(&self, domain: &str) -> Arc<DomainVocabulary> {
        self.vocab_cache.write().remove(domain);
        self.load_domain_vocabulary(domain)
    }

    /// Applies the three transformation passes in order, recording an
    /// audit entry for every substitution. Fails before any pass when
    /// `language` is not in the supported table.
    pub fn localize(
        &self,
        text: &str,
        language: &str,
        domain: Option<&str>,
    ) -> Result<Localized, StageError> {
        if !is_supported_language(language) {
            return Err(StageError::UnsupportedLanguage(language.to_string()));
        }

        let mut out = text.to_string();
        let mut changes = Vec::new();

        // Pass 1: domain vocabulary, in table insertion order.
        if let Some(domain) = domain {
            let vocab = self.load_domain_vocabulary(domain);
            for term in &vocab.terms {
                if let Some(localized) = term.localized.get(language) {
                    let count = replace_word(&mut out, &term.source, localized);
                    if count > 0 {
                        changes.push(format!(
                            "vocabulary: '{}' -> '{}' ({count}x)",
                            term.source, localized
                        ));
                    }
                }
            }
        }

        // Pass 2: honorifics (whole-word), then cultural phrases.
        if let Some(honorifics) = self.rules.honorifics.get(language) {
            for (source, localized) in honorifics {
                let count = replace_word(&mut out, source, localized);
                if count > 0 {
                    changes.push(format!("honorific: '{source}' -> '{localized}' ({count}x)"));
                }
            }
        }
        for (source, by_language) in &self.rules.phrases {
            if let Some(localized) = by_language.get(language) {
                let count = replace_phrase(&mut out, source, localized);
                if count > 0 {
                    changes.push(format!("phrase: '{source}' -> '{localized}' ({count}x)"));
                }
            }
        }

        // Pass 3: regional numeral formatting.
        if self.rules.numeral_scripts.iter().any(|l| l == language) {
            let count = devanagari_digits(&mut out);
            if count > 0 {
                changes.push(format!("numerals: {count} digit(s) to Devanagari"));
            }
        }

        debug!(language, ?domain, changes = changes.len(), "Localization applied");
        Ok(Localized { text: out, changes })
    }
}

/// Case-insensitive whole-word substitution. Boundaries are only
/// asserted next to word characters, so terms like `Dr.` still match.
fn replace_word(text: &mut String, term: &str, replacement: &str) -> usize {
    if term.is_empty() {
        return 0;
    }
    let mut pattern = String::from("(?i)");
    if term
        .chars()
        .next()
        .is_some_and(|c| c.is_alphanumeric() || c == '_')
    {
        pattern.push_str(r"\b");
    }
    pattern.push_str(&regex::escape(term));
    if term
        .chars()
        .next_back()
        .is_some_and(|c| c.is_alphanumeric() || c == '_')
    {
        pattern.push_str(r"\b");
    }
    apply_regex(text, &pattern, replacement)
}

/// Case-insensitive substitution without word boundaries; phrases may
/// span multiple words.
fn replace_phrase(text: &mut String, phrase: &str, replacement: &str) -> usize {
    if phrase.is_empty() {
        return 0;
    }
    let pattern = format!("(?i){}", regex::escape(phrase));
    apply_regex(text, &pattern, replacement)
}

fn apply_regex(text: &mut String, pattern: &str, replacement: &str) -> usize {
    let re = Regex::new(pattern).expect("escaped term is a valid pattern");
    let count = re.find_iter(text).count();
    if count > 0 {
        *text = re.replace_all(text, NoExpand(replacement)).into_owned();
    }
    count
}

fn devanagari_digits(text: &mut String) -> usize {
    let mut count = 0;
    *text = text
        .chars()
        .map(|c| match c.to_digit(10) {
            Some(d) if c.is_ascii_digit() => {
                count += 1;
                DEVANAGARI_DIGITS[d as usize]
            }
            _ => c,
        })
        .collect();
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn engine_with_healthcare_vocab() -> (TempDir, LocalizationEngine) {
        let dir = TempDir::new().unwrap();
        let engine = LocalizationEngine::new(dir.path(), CulturalRuleSet::builtin());
        engine
            .create_domain_vocabulary(
                "healthcare",
                DomainVocabulary {
                    terms: vec![
                        term("doctor", &[("hi", "डॉक्टर")]),
                        term("medicine", &[("hi", "दवा")]),
                        term("cement", &[("hi", "सीमेंट")]),
                    ],
                },
            )
            .unwrap();
        (dir, engine)
    }

    fn term(source: &str, localized: &[(&str, &str)]) -> VocabTerm {
        VocabTerm {
            source: source.to_string(),
            localized: localized
                .iter()
                .map(|(l, t)| (l.to_string(), t.to_string()))
                .collect(),
        }
    }

    #[test]
    fn healthcare_terms_are_substituted_with_audit_trail() {
        let (_dir, engine) = engine_with_healthcare_vocab();

        let result = engine
            .localize("The doctor needs medicine", "hi", Some("healthcare"))
            .unwrap();

        assert!(result.text.contains("डॉक्टर"));
        assert!(result.text.contains("दवा"));
        assert_eq!(result.changes.len(), 2);
    }

    #[test]
    fn substitution_is_whole_word_only() {
        let (_dir, engine) = engine_with_healthcare_vocab();

        let result = engine
            .localize("cementation", "hi", Some("healthcare"))
            .unwrap();
        assert_eq!(result.text, "cementation");

        let result = engine.localize("cement mixer", "hi", Some("healthcare")).unwrap();
        assert!(result.text.starts_with("सीमेंट"));
    }

    #[test]
    fn substitution_is_case_insensitive() {
        let (_dir, engine) = engine_with_healthcare_vocab();

        let result = engine
            .localize("Doctor visits DOCTOR", "hi", Some("healthcare"))
            .unwrap();
        assert_eq!(result.text, "डॉक्टर visits डॉक्टर");
        assert_eq!(result.changes.len(), 1);
        assert!(result.changes[0].contains("2x"));
    }

    #[test]
    fn localize_is_idempotent_with_empty_second_audit() {
        let (_dir, engine) = engine_with_healthcare_vocab();

        let first = engine
            .localize(
                "hello Dr. Rao, the doctor needs 2 medicine doses",
                "hi",
                Some("healthcare"),
            )
            .unwrap();
        let second = engine
            .localize(&first.text, "hi", Some("healthcare"))
            .unwrap();

        assert_eq!(second.text, first.text);
        assert!(second.changes.is_empty());
    }

    #[test]
    fn unsupported_language_fails_before_any_pass() {
        let (_dir, engine) = engine_with_healthcare_vocab();

        let err = engine
            .localize("The doctor needs medicine", "xx", Some("healthcare"))
            .unwrap_err();
        assert!(matches!(err, StageError::UnsupportedLanguage(lang) if lang == "xx"));
    }

    #[test]
    fn missing_domain_is_a_noop_not_an_error() {
        let (_dir, engine) = engine_with_healthcare_vocab();

        let result = engine
            .localize("The doctor waits", "ta", Some("no-such-domain"))
            .unwrap();
        assert_eq!(result.text, "The doctor waits");
        assert!(result.changes.is_empty());
    }

    #[test]
    fn honorifics_apply_despite_trailing_punctuation() {
        let (_dir, engine) = engine_with_healthcare_vocab();

        let result = engine.localize("Dr. Sharma is here", "hi", None).unwrap();
        assert!(result.text.starts_with("डॉ."));
        assert_eq!(result.changes.len(), 1);
    }

    #[test]
    fn cultural_phrases_replace_without_word_bounds() {
        let (_dir, engine) = engine_with_healthcare_vocab();

        let result = engine.localize("Hello, thank you!", "ta", None).unwrap();
        assert_eq!(result.text, "வணக்கம், நன்றி!");
        assert_eq!(result.changes.len(), 2);
    }

    #[test]
    fn devanagari_numerals_for_script_languages_only() {
        let (_dir, engine) = engine_with_healthcare_vocab();

        let hi = engine.localize("Take 2 doses in 10 days", "hi", None).unwrap();
        assert!(hi.text.contains('२'));
        assert!(hi.text.contains("१०"));
        assert!(hi.changes.iter().any(|c| c.contains("3 digit(s)")));

        let ta = engine.localize("Take 2 doses", "ta", None).unwrap();
        assert!(ta.text.contains('2'));
    }

    #[test]
    fn created_vocabulary_is_visible_without_restart() {
        let dir = TempDir::new().unwrap();
        let engine = LocalizationEngine::new(dir.path(), CulturalRuleSet::builtin());

        assert!(engine.load_domain_vocabulary("construction").is_empty());

        engine
            .create_domain_vocabulary(
                "construction",
                DomainVocabulary {
                    terms: vec![term("cement", &[("hi", "सीमेंट")])],
                },
            )
            .unwrap();

        let result = engine
            .localize("cement bags", "hi", Some("construction"))
            .unwrap();
        assert!(result.text.starts_with("सीमेंट"));
    }
}
