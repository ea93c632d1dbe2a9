//! Tokenization for mixed ASCII / Japanese content
//!
//! This module provides:
//! - `tokenize`: tokens with `(line, col, pos)` offsets over normalized text
//! - code-exact tokens for punctuated ASCII runs (`foo.bar`, `1.2.3`)
//! - CJK character bigrams so substring queries work without segmentation
//!
//! A phrase is a sequence of tokens adjacent in `pos` (distance <= 1).
//! Tokens for the same logical word across casing or width variants compare
//! equal because tokenization runs on normalized text only.

// ============================================================================
// Token
// ============================================================================

/// One normalized token with its position offsets
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// Normalized token text
    pub text: String,
    /// 1-based source line
    pub line: u32,
    /// 1-based character column of the token start
    pub col: u32,
    /// Token ordinal; adjacent tokens differ by 1
    pub pos: u32,
}

// ============================================================================
// Character classes
// ============================================================================

/// Punctuation allowed inside a code-exact token
const CODE_PUNCT: [char; 6] = ['.', '_', '-', '/', ':', '+'];

fn is_code_punct(c: char) -> bool {
    CODE_PUNCT.contains(&c)
}

fn is_ascii_word(c: char) -> bool {
    c.is_ascii_alphanumeric()
}

/// True for characters that join into CJK bigram runs
pub fn is_cjk(c: char) -> bool {
    matches!(c,
        '\u{3005}' | '\u{3006}'                     // 々 〆
        | '\u{3040}'..='\u{309F}'                   // hiragana
        | '\u{30A0}'..='\u{30FF}'                   // katakana (incl. ー)
        | '\u{31F0}'..='\u{31FF}'                   // katakana extensions
        | '\u{3400}'..='\u{4DBF}'                   // CJK ext A
        | '\u{4E00}'..='\u{9FFF}'                   // CJK unified
        | '\u{F900}'..='\u{FAFF}'                   // CJK compat
    )
}

/// True for an ASCII token containing inner punctuation
///
/// Such tokens are matched only verbatim.
pub fn is_code_token(s: &str) -> bool {
    s.is_ascii() && s.chars().any(is_code_punct) && s.chars().any(|c| c.is_ascii_alphanumeric())
}

// ============================================================================
// tokenize
// ============================================================================

/// Tokenize normalized text
///
/// ASCII word and digit runs become single tokens; a punctuated run also
/// yields the verbatim code-exact token at the position of its first
/// sub-token. CJK runs become character bigrams (a lone CJK character
/// yields itself).
pub fn tokenize(text: &str) -> Vec<Token> {
    let mut tokens: Vec<Token> = Vec::new();
    let chars: Vec<char> = text.chars().collect();
    let mut line = 1u32;
    let mut col = 1u32;
    let mut pos = 0u32;
    let mut i = 0usize;

    while i < chars.len() {
        let c = chars[i];
        if c == '\n' {
            line += 1;
            col = 1;
            i += 1;
            continue;
        }
        if is_ascii_word(c) {
            let start_col = col;
            let start = i;
            while i < chars.len() && (is_ascii_word(chars[i]) || is_code_punct(chars[i])) {
                i += 1;
                col += 1;
            }
            // Trim trailing punctuation (sentence periods, list dashes).
            let mut end = i;
            while end > start && is_code_punct(chars[end - 1]) {
                end -= 1;
            }
            let chunk: String = chars[start..end].iter().collect();
            pos = emit_ascii_chunk(&mut tokens, &chunk, line, start_col, pos);
            continue;
        }
        if is_cjk(c) {
            let start_col = col;
            let start = i;
            while i < chars.len() && is_cjk(chars[i]) {
                i += 1;
                col += 1;
            }
            let run = &chars[start..i];
            if run.len() == 1 {
                tokens.push(Token {
                    text: run[0].to_string(),
                    line,
                    col: start_col,
                    pos,
                });
                pos += 1;
            } else {
                for (offset, pair) in run.windows(2).enumerate() {
                    tokens.push(Token {
                        text: pair.iter().collect(),
                        line,
                        col: start_col + offset as u32,
                        pos,
                    });
                    pos += 1;
                }
            }
            continue;
        }
        i += 1;
        col += 1;
    }
    tokens
}

fn emit_ascii_chunk(tokens: &mut Vec<Token>, chunk: &str, line: u32, col: u32, mut pos: u32) -> u32 {
    let sub_tokens: Vec<&str> = chunk
        .split(|c: char| is_code_punct(c))
        .filter(|part| !part.is_empty())
        .collect();
    if sub_tokens.is_empty() {
        return pos;
    }
    if is_code_token(chunk) {
        tokens.push(Token {
            text: chunk.to_string(),
            line,
            col,
            pos,
        });
    }
    let mut sub_col = col;
    for sub in sub_tokens {
        tokens.push(Token {
            text: sub.to_string(),
            line,
            col: sub_col,
            pos,
        });
        pos += 1;
        sub_col += sub.chars().count() as u32 + 1;
    }
    pos
}

// ============================================================================
// Helpers
// ============================================================================

/// Token texts in emission order
pub fn token_texts(tokens: &[Token]) -> Vec<String> {
    tokens.iter().map(|t| t.text.clone()).collect()
}

/// Order-preserving unique token texts
pub fn unique_terms(tokens: &[Token]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    tokens
        .iter()
        .filter(|t| seen.insert(t.text.clone()))
        .map(|t| t.text.clone())
        .collect()
}

// ============================================================================
// Tests
// ============================================================================
