use std::collections::HashMap;

use crate::chunk::Granularity;

/// Cuts text into units
pub type SplitFn = fn(&str) -> Vec<&str>;

/// How one granularity/locale pair splits and re-joins text
#[derive(Clone, Copy)]
pub struct UnitRule {
    pub split: SplitFn,
    /// Placed between units when a window is joined back into text
    pub separator: &'static str,
    /// Appended to a window that stops before the last unit
    pub terminator: &'static str,
}

impl std::fmt::Debug for UnitRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnitRule")
            .field("separator", &self.separator)
            .field("terminator", &self.terminator)
            .finish_non_exhaustive()
    }
}

pub const WORD_RULE: UnitRule = UnitRule {
    split: split_words,
    separator: " ",
    terminator: "",
};

pub const LATIN_SENTENCE_RULE: UnitRule = UnitRule {
    split: split_latin_sentences,
    separator: ". ",
    terminator: ".",
};

pub const CJK_SENTENCE_RULE: UnitRule = UnitRule {
    split: split_cjk_sentences,
    separator: "\u{3002}",
    terminator: "\u{3002}",
};

pub const PARAGRAPH_RULE: UnitRule = UnitRule {
    split: split_paragraphs,
    separator: "\n\n",
    terminator: "",
};

fn split_words(text: &str) -> Vec<&str> {
    text.split_whitespace().collect()
}

fn split_latin_sentences(text: &str) -> Vec<&str> {
    text.split(". ").collect()
}

fn split_cjk_sentences(text: &str) -> Vec<&str> {
    text.split('\u{3002}').collect()
}

fn split_paragraphs(text: &str) -> Vec<&str> {
    text.split("\n\n").collect()
}

#[derive(Debug, Clone)]
struct LocaleRules {
    fallback: UnitRule,
    locales: HashMap<String, UnitRule>,
}

/// Lookup table from (granularity, locale) to a [`UnitRule`].
///
/// Every granularity has a fallback rule used for locales that were never
/// registered.
#[derive(Debug, Clone)]
pub struct UnitRules {
    rules: HashMap<Granularity, LocaleRules>,
}

impl UnitRules {
    /// Table with the word, paragraph, English and Chinese sentence rules.
    pub fn builtin() -> Self {
        let mut rules = HashMap::new();
        for (granularity, fallback) in [
            (Granularity::Word, WORD_RULE),
            (Granularity::Sentence, LATIN_SENTENCE_RULE),
            (Granularity::Paragraph, PARAGRAPH_RULE),
        ] {
            rules.insert(
                granularity,
                LocaleRules {
                    fallback,
                    locales: HashMap::new(),
                },
            );
        }

        let mut table = Self { rules };
        table.register(Granularity::Sentence, "en", LATIN_SENTENCE_RULE);
        table.register(Granularity::Sentence, "ch", CJK_SENTENCE_RULE);
        table
    }

    /// Add or replace the rule for one locale.
    pub fn register(&mut self, granularity: Granularity, locale: &str, rule: UnitRule) {
        self.rules
            .entry(granularity)
            .or_insert_with(|| LocaleRules {
                fallback: rule,
                locales: HashMap::new(),
            })
            .locales
            .insert(locale.to_ascii_lowercase(), rule);
    }

    /// Replace the rule used for unregistered locales.
    pub fn set_fallback(&mut self, granularity: Granularity, rule: UnitRule) {
        self.rules
            .entry(granularity)
            .and_modify(|r| r.fallback = rule)
            .or_insert_with(|| LocaleRules {
                fallback: rule,
                locales: HashMap::new(),
            });
    }

    /// Resolve the rule for a locale, falling back per granularity.
    pub fn resolve(&self, granularity: Granularity, locale: &str) -> UnitRule {
        let Some(entry) = self.rules.get(&granularity) else {
            // only reachable if a table was built without this granularity
            return match granularity {
                Granularity::Word => WORD_RULE,
                Granularity::Sentence => LATIN_SENTENCE_RULE,
                Granularity::Paragraph => PARAGRAPH_RULE,
            };
        };
        entry
            .locales
            .get(&locale.to_ascii_lowercase())
            .copied()
            .unwrap_or(entry.fallback)
    }
}

impl Default for UnitRules {
    fn default() -> Self {
        Self::builtin()
    }
}
