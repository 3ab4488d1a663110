use lazy_static::lazy_static;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use unicode_normalization::UnicodeNormalization;

lazy_static! {
    static ref SEPARATORS: Regex = Regex::new(r"[^\p{L}\p{N}]+").expect("valid regex");
    static ref SEPARATORS_KEEP_APOSTROPHE: Regex = Regex::new(r"[^\p{L}\p{N}']+").expect("valid regex");
    /// Conservative English function words. Only consulted when stopword removal is on.
    pub static ref DEFAULT_STOPWORDS: HashSet<String> = {
        let words: &[&str] = &[
            "a","an","and","are","as","at","be","but","by","for","from","has","he","in",
            "is","it","its","of","on","or","that","the","to","was","were","will","with",
        ];
        words.iter().map(|w| w.to_string()).collect()
    };
}

/// Knobs for [`normalize_text`] and [`tokenize`].
///
/// The defaults are the ones used by the index builder and by query lookups, so
/// changing them on one side only breaks matching.
#[derive(Debug, Clone)]
pub struct TokenizeOptions {
    pub lowercase: bool,
    /// Strip combining marks after NFKD decomposition ("café" -> "cafe").
    pub ascii_fold: bool,
    pub remove_stopwords: bool,
    /// Replaces [`DEFAULT_STOPWORDS`] when set.
    pub stopwords: Option<HashSet<String>>,
    /// Measured in chars.
    pub min_token_length: usize,
    /// Keep apostrophes that sit between two letters or digits ("don't").
    pub preserve_apostrophes: bool,
}

impl Default for TokenizeOptions {
    fn default() -> Self {
        Self {
            lowercase: true,
            ascii_fold: false,
            remove_stopwords: false,
            stopwords: None,
            min_token_length: 1,
            preserve_apostrophes: false,
        }
    }
}

impl TokenizeOptions {
    pub fn with_stopwords<I, S>(mut self, words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.remove_stopwords = true;
        self.stopwords = Some(words.into_iter().map(Into::into).collect());
        self
    }

    fn active_stopwords(&self) -> Option<&HashSet<String>> {
        if !self.remove_stopwords {
            return None;
        }
        Some(self.stopwords.as_ref().unwrap_or(&*DEFAULT_STOPWORDS))
    }
}

fn is_combining_mark(c: char) -> bool {
    ('\u{0300}'..='\u{036f}').contains(&c)
}

fn is_smart_apostrophe(c: char) -> bool {
    matches!(c, '\u{2019}' | '\u{2018}' | '\u{02bc}')
}

/// Normalize text into a single-space separated string of token candidates.
///
/// `None` normalizes to the empty string.
pub fn normalize_text<'a>(text: impl Into<Option<&'a str>>, options: &TokenizeOptions) -> String {
    let text = match text.into() {
        Some(t) => t,
        None => return String::new(),
    };

    let mut s: String = text.nfc().collect();
    if options.ascii_fold {
        s = s.nfkd().filter(|c| !is_combining_mark(*c)).collect();
    }
    if options.lowercase {
        s = s.to_lowercase();
    }
    s = s
        .chars()
        .map(|c| if is_smart_apostrophe(c) { '\'' } else { c })
        .collect();

    let separators: &Regex = if options.preserve_apostrophes {
        &*SEPARATORS_KEEP_APOSTROPHE
    } else {
        &*SEPARATORS
    };
    let spaced = separators.replace_all(&s, " ");

    // Apostrophes at either end of a word are quote marks, not part of it.
    let mut out = String::with_capacity(spaced.len());
    for word in spaced.split_whitespace() {
        let word = if options.preserve_apostrophes { word.trim_matches('\'') } else { word };
        if word.is_empty() {
            continue;
        }
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(word);
    }
    out
}

/// Tokenize text into normalized terms, in order, duplicates kept.
pub fn tokenize<'a>(text: impl Into<Option<&'a str>>, options: &TokenizeOptions) -> Vec<String> {
    let normalized = normalize_text(text, options);
    let stopwords = options.active_stopwords();
    normalized
        .split(' ')
        .filter(|t| !t.is_empty())
        .filter(|t| t.chars().count() >= options.min_token_length)
        .filter(|t| stopwords.map_or(true, |sw| !sw.contains(*t)))
        .map(str::to_string)
        .collect()
}

/// Count occurrences of each term.
pub fn term_frequencies<I, S>(tokens: I) -> HashMap<String, u32>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut tf: HashMap<String, u32> = HashMap::new();
    for token in tokens {
        *tf.entry(token.into()).or_insert(0) += 1;
    }
    tf
}
