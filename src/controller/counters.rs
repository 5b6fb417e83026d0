use std::fmt;

use serde::Serialize;

use crate::schemas::essay::WidgetConfig;

/// Advisory limits; `0` disables a limit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TextLimits {
    pub min_words: u32,
    pub max_words: u32,
    pub max_chars: u32,
}

impl From<&WidgetConfig> for TextLimits {
    fn from(config: &WidgetConfig) -> Self {
        Self {
            min_words: config.min_words,
            max_words: config.max_words,
            max_chars: config.max_chars,
        }
    }
}

/// Live counters shown next to the editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TextStats {
    pub words: usize,
    pub chars: usize,
    pub below_min: bool,
    pub words_exceeded: bool,
    pub chars_exceeded: bool,
}

/// A non-blocking warning attached to a submission that goes ahead anyway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Advisory {
    BelowMinWords { words: usize, min: u32 },
    AboveMaxWords { words: usize, max: u32 },
    AboveMaxChars { chars: usize, max: u32 },
}

impl fmt::Display for Advisory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Advisory::BelowMinWords { words, min } => {
                write!(f, "Your essay has {words} words; at least {min} are recommended.")
            }
            Advisory::AboveMaxWords { words, max } => {
                write!(f, "Your essay has {words} words; the limit is {max}.")
            }
            Advisory::AboveMaxChars { chars, max } => {
                write!(f, "Your essay has {chars} characters; the limit is {max}.")
            }
        }
    }
}

/// Words are runs of non-whitespace after trimming.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

pub fn char_count(text: &str) -> usize {
    text.chars().count()
}

pub fn measure(text: &str, limits: TextLimits) -> TextStats {
    let words = word_count(text);
    let chars = char_count(text);

    TextStats {
        words,
        chars,
        below_min: limits.min_words > 0 && words < limits.min_words as usize,
        words_exceeded: limits.max_words > 0 && words > limits.max_words as usize,
        chars_exceeded: limits.max_chars > 0 && chars > limits.max_chars as usize,
    }
}

impl TextStats {
    pub fn advisories(&self, limits: TextLimits) -> Vec<Advisory> {
        let mut advisories = Vec::new();
        if self.below_min {
            advisories.push(Advisory::BelowMinWords { words: self.words, min: limits.min_words });
        }
        if self.words_exceeded {
            advisories.push(Advisory::AboveMaxWords { words: self.words, max: limits.max_words });
        }
        if self.chars_exceeded {
            advisories.push(Advisory::AboveMaxChars { chars: self.chars, max: limits.max_chars });
        }
        advisories
    }
}
