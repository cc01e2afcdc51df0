//! Tokenizer for BPL assembly text.
//!
//! Source is line oriented: every significant line is `keyword[:operand]`.
//! Type descriptors inside an operand get a second, character level pass.

use crate::error::AsmError;

/// One significant line of assembly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Line<'a> {
    /// 1-based source line.
    pub number: usize,
    /// Opcode mnemonic or structural keyword.
    pub keyword: &'a str,
    /// Everything after the first `:`, trimmed. `None` when absent or empty.
    pub operand: Option<&'a str>,
}

/// Tokenize a single line of assembly text.
///
/// Returns `None` for blank lines and comment-only lines. Comments start
/// with `;` and extend to end of line.
pub(crate) fn tokenize_line(line: &str, line_num: usize) -> Result<Option<Line<'_>>, AsmError> {
    let line = match line.find(';') {
        Some(pos) => &line[..pos],
        None => line,
    };
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let (keyword, operand) = match line.split_once(':') {
        Some((keyword, operand)) => (keyword.trim_end(), Some(operand.trim())),
        None => (line, None),
    };
    if let Some(extra) = keyword.split_whitespace().nth(1) {
        return Err(AsmError::UnexpectedToken {
            line: line_num,
            token: extra.to_string(),
        });
    }

    Ok(Some(Line {
        number: line_num,
        keyword,
        operand: operand.filter(|o| !o.is_empty()),
    }))
}

/// Tokenize a whole source text, skipping insignificant lines.
pub(crate) fn tokenize(text: &str) -> Result<Vec<Line<'_>>, AsmError> {
    let mut lines = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        if let Some(line) = tokenize_line(line, idx + 1)? {
            lines.push(line);
        }
    }
    Ok(lines)
}

/// A token of the type descriptor syntax.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum TypeToken {
    /// Type keyword, composite name or field name.
    Ident(String),
    /// Array length.
    Number(usize),
    /// One of `< > { } ( ) ,`.
    Punct(&'static str),
    /// `->`
    Arrow,
}

impl std::fmt::Display for TypeToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TypeToken::Ident(s) => f.write_str(s),
            TypeToken::Number(n) => write!(f, "{n}"),
            TypeToken::Punct(p) => f.write_str(p),
            TypeToken::Arrow => f.write_str("->"),
        }
    }
}

/// Tokenize a type descriptor such as `Pair{int64 a, array<char, 4> b}`.
pub(crate) fn tokenize_type(text: &str, line: usize) -> Result<Vec<TypeToken>, AsmError> {
    let bytes = text.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        if b.is_ascii_whitespace() {
            i += 1;
        } else if b.is_ascii_alphabetic() || b == b'_' {
            let start = i;
            while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                i += 1;
            }
            tokens.push(TypeToken::Ident(text[start..i].to_string()));
        } else if b.is_ascii_digit() {
            let start = i;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
            let word = &text[start..i];
            let n = word.parse().map_err(|_| AsmError::InvalidNumber {
                line,
                token: word.to_string(),
            })?;
            tokens.push(TypeToken::Number(n));
        } else if text[i..].starts_with("->") {
            tokens.push(TypeToken::Arrow);
            i += 2;
        } else if let Some(punct) = punct(b) {
            tokens.push(TypeToken::Punct(punct));
            i += 1;
        } else {
            let token = text[i..].chars().next().map(String::from).unwrap_or_default();
            return Err(AsmError::UnexpectedToken { line, token });
        }
    }

    Ok(tokens)
}

fn punct(b: u8) -> Option<&'static str> {
    Some(match b {
        b'<' => "<",
        b'>' => ">",
        b'{' => "{",
        b'}' => "}",
        b'(' => "(",
        b')' => ")",
        b',' => ",",
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ident(s: &str) -> TypeToken {
        TypeToken::Ident(s.to_string())
    }

    #[test]
    fn empty_line() {
        assert_eq!(tokenize_line("", 1).unwrap(), None);
    }

    #[test]
    fn whitespace_only() {
        assert_eq!(tokenize_line("   \t  ", 1).unwrap(), None);
    }

    #[test]
    fn comment_only() {
        assert_eq!(tokenize_line("; this is a comment", 1).unwrap(), None);
    }

    #[test]
    fn simple_opcode() {
        let line = tokenize_line("add", 4).unwrap().unwrap();
        assert_eq!(line.number, 4);
        assert_eq!(line.keyword, "add");
        assert_eq!(line.operand, None);
    }

    #[test]
    fn opcode_with_comment_and_indent() {
        let line = tokenize_line("    add ; add two values", 1).unwrap().unwrap();
        assert_eq!(line.keyword, "add");
        assert_eq!(line.operand, None);
    }

    #[test]
    fn operand_split_at_first_colon() {
        let line = tokenize_line("literal:char::", 1).unwrap().unwrap();
        assert_eq!(line.keyword, "literal");
        assert_eq!(line.operand, Some("char::"));
    }

    #[test]
    fn empty_operand_is_none() {
        let line = tokenize_line("getRef:", 1).unwrap().unwrap();
        assert_eq!(line.operand, None);
    }

    #[test]
    fn extra_word_rejected() {
        let err = tokenize_line("add 5", 3).unwrap_err();
        assert_eq!(
            err,
            AsmError::UnexpectedToken {
                line: 3,
                token: "5".to_string()
            }
        );
    }

    #[test]
    fn tokenize_skips_blank_lines() {
        let lines = tokenize("add\n\n; note\nsub\n").unwrap();
        let numbers: Vec<_> = lines.iter().map(|l| l.number).collect();
        assert_eq!(numbers, vec![1, 4]);
    }

    #[test]
    fn type_tokens() {
        assert_eq!(
            tokenize_type("fn(array<int64, 3> a) -> ptr<bool>", 1).unwrap(),
            vec![
                ident("fn"),
                TypeToken::Punct("("),
                ident("array"),
                TypeToken::Punct("<"),
                ident("int64"),
                TypeToken::Punct(","),
                TypeToken::Number(3),
                TypeToken::Punct(">"),
                ident("a"),
                TypeToken::Punct(")"),
                TypeToken::Arrow,
                ident("ptr"),
                TypeToken::Punct("<"),
                ident("bool"),
                TypeToken::Punct(">"),
            ]
        );
    }

    #[test]
    fn type_rejects_stray_character() {
        let err = tokenize_type("int64 $", 2).unwrap_err();
        assert_eq!(
            err,
            AsmError::UnexpectedToken {
                line: 2,
                token: "$".to_string()
            }
        );
    }
}
