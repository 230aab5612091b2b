//! Line classification and tokenisation: turns a raw source line into a
//! `Statement` the two-pass driver in `mod.rs` can act on, without yet
//! knowing anything about operand or mnemonic semantics.

use crate::error::AssembleError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    Label(String),
    Directive { name: String, operands: Vec<String> },
    Instruction {
        mnemonic: String,
        suffix: Option<String>,
        operands: Vec<String>,
    },
}

fn strip_comment(line: &str) -> &str {
    match line.find("//") {
        Some(at) => &line[..at],
        None => line,
    }
}

fn is_label_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '.'
}

/// Classify one line of source. Returns `Ok(None)` for a blank (or
/// comment-only) line.
pub fn classify(line: &str, line_no: usize) -> Result<Option<Statement>, AssembleError> {
    let text = strip_comment(line).trim();
    if text.is_empty() {
        return Ok(None);
    }

    if let Some(colon) = text.find(':') {
        let name = &text[..colon];
        let rest = text[colon + 1..].trim();
        if name.is_empty()
            || !is_label_start(name.chars().next().unwrap())
            || name.chars().any(char::is_whitespace)
            || !rest.is_empty()
        {
            return Err(AssembleError::MalformedLabel {
                line: line_no,
                label: name.to_string(),
            });
        }
        return Ok(Some(Statement::Label(name.to_string())));
    }

    if let Some(rest) = text.strip_prefix('.') {
        let (name, operand_text) = split_mnemonic(rest);
        let operands = split_operands(operand_text);
        return Ok(Some(Statement::Directive {
            name: name.to_string(),
            operands,
        }));
    }

    let (head, operand_text) = split_mnemonic(text);
    let (mnemonic, suffix) = match head.split_once('.') {
        Some((m, s)) => (m.to_string(), Some(s.to_string())),
        None => (head.to_string(), None),
    };
    let operands = split_operands(operand_text);
    Ok(Some(Statement::Instruction {
        mnemonic,
        suffix,
        operands,
    }))
}

/// Split a line's text on the first run of whitespace into the leading
/// token and the remainder (which may itself contain embedded spaces,
/// e.g. a shifted register operand).
fn split_mnemonic(text: &str) -> (&str, &str) {
    match text.find(char::is_whitespace) {
        Some(at) => (&text[..at], text[at..].trim_start()),
        None => (text, ""),
    }
}

/// Split on top-level commas, so a bracketed load/store operand like
/// `[x1, #16]` survives as one token even though it contains a comma.
fn split_operands(text: &str) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }
    let mut operands = Vec::new();
    let mut depth = 0i32;
    let mut start = 0usize;
    for (i, c) in text.char_indices() {
        match c {
            '[' => depth += 1,
            ']' => depth -= 1,
            ',' if depth == 0 => {
                operands.push(text[start..i].trim().to_string());
                start = i + 1;
            }
            _ => {}
        }
    }
    operands.push(text[start..].trim().to_string());
    operands
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_and_comment_only_lines_are_skipped() {
        assert_eq!(classify("", 1).unwrap(), None);
        assert_eq!(classify("   // just a comment", 1).unwrap(), None);
    }

    #[test]
    fn label_definition() {
        assert_eq!(
            classify("loop:", 1).unwrap(),
            Some(Statement::Label("loop".to_string()))
        );
        assert_eq!(
            classify("_start:  // entry", 1).unwrap(),
            Some(Statement::Label("_start".to_string()))
        );
    }

    #[test]
    fn malformed_label_rejected() {
        assert!(classify("1bad:", 1).is_err());
    }

    #[test]
    fn directive_line() {
        assert_eq!(
            classify(".int 42", 1).unwrap(),
            Some(Statement::Directive {
                name: "int".to_string(),
                operands: vec!["42".to_string()],
            })
        );
    }

    #[test]
    fn instruction_with_conditional_suffix_and_operands() {
        assert_eq!(
            classify("b.eq loop", 1).unwrap(),
            Some(Statement::Instruction {
                mnemonic: "b".to_string(),
                suffix: Some("eq".to_string()),
                operands: vec!["loop".to_string()],
            })
        );
    }

    #[test]
    fn bracketed_addressing_mode_survives_as_one_operand() {
        let stmt = classify("ldr x0, [x1, #16]", 1).unwrap().unwrap();
        match stmt {
            Statement::Instruction { operands, .. } => {
                assert_eq!(operands, vec!["x0", "[x1, #16]"]);
            }
            other => panic!("unexpected: {other:?}"),
        }
        let stmt = classify("str x0, [x1], #16", 1).unwrap().unwrap();
        match stmt {
            Statement::Instruction { operands, .. } => {
                assert_eq!(operands, vec!["x0", "[x1]", "#16"]);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn operands_with_embedded_shift_are_not_split_on_internal_whitespace() {
        let stmt = classify("add x0, x1, x2, lsl #4", 1).unwrap().unwrap();
        match stmt {
            Statement::Instruction { operands, .. } => {
                assert_eq!(operands, vec!["x0", "x1", "x2", "lsl #4"]);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }
}
