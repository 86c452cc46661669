// Streaming tokenizer: each call consumes one token from the source and
// applies it to the current thread straight away.
use crate::builtins::{self, NativeOp};
use crate::compat::{String, Vec};
use crate::atom::Kind;
use crate::engine;
use crate::error::RuntimeError;
use crate::interpreter::Interpreter;
use crate::scan;
use num_traits::Num;

// RUST CONCEPT: Source position for rich error messages
#[derive(Debug, Clone, PartialEq)]
pub struct SourcePos {
    pub line: usize,
    pub column: usize,
    pub offset: usize, // Byte offset from start of input
}

impl SourcePos {
    pub fn new(line: usize, column: usize, offset: usize) -> Self {
        Self {
            line,
            column,
            offset,
        }
    }
}

// Cursor over program text. Columns count characters, not bytes.
pub struct Source<'a> {
    bytes: &'a [u8],
    offset: usize,
    line: usize,
    column: usize,
}

impl<'a> Source<'a> {
    pub fn new(text: &'a str) -> Self {
        Source {
            bytes: text.as_bytes(),
            offset: 0,
            line: 1,
            column: 1,
        }
    }

    pub fn pos(&self) -> SourcePos {
        SourcePos::new(self.line, self.column, self.offset)
    }

    pub fn is_done(&self) -> bool {
        self.offset >= self.bytes.len()
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.offset).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.offset += 1;
        if b == b'\n' {
            self.line += 1;
            self.column = 1;
        } else if b & 0xC0 != 0x80 {
            self.column += 1;
        }
        Some(b)
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(|b| b.is_ascii_whitespace()) {
            self.bump();
        }
    }

    // Bytes up to the next boundary character
    fn word(&mut self) -> &'a [u8] {
        let start = self.offset;
        while self.peek().is_some_and(|b| !is_boundary(b)) {
            self.bump();
        }
        &self.bytes[start..self.offset]
    }
}

fn is_boundary(b: u8) -> bool {
    b.is_ascii_whitespace() || matches!(b, b'.' | b'"' | b'(')
}

/// Consume one token and apply it. Returns `Ok(false)` once the source is
/// exhausted.
pub fn consume_one(interp: &mut Interpreter, src: &mut Source<'_>) -> Result<bool, RuntimeError> {
    src.skip_whitespace();
    let Some(first) = src.peek() else {
        return Ok(false);
    };
    let pos = src.pos();
    match first {
        b'(' => skip_comment(src, &pos)?,
        b'"' => {
            let text = read_string(src, &pos)?;
            let atom = interp.heap.new_buffer(&text)?;
            interp.push(atom);
        }
        b'.' => {
            let mut dots = 0;
            while src.peek() == Some(b'.') {
                src.bump();
                dots += 1;
            }
            if dots == 1 {
                engine::dot(interp).map_err(|e| e.at(&pos))?;
            } else {
                let atom = interp.heap.new_dot(dots)?;
                interp.push(atom);
            }
        }
        b':' => {
            src.bump();
            let name = src.word();
            let atom = if name.is_empty() {
                interp.heap.new_native(NativeOp::Resolve)?
            } else {
                interp.heap.new_buffer(name)?
            };
            interp.push(atom);
        }
        _ => {
            let word = src.word();
            apply_word(interp, word, &pos)?;
        }
    }
    Ok(true)
}

fn apply_word(interp: &mut Interpreter, word: &[u8], pos: &SourcePos) -> Result<(), RuntimeError> {
    let text = String::from_utf8_lossy(word);
    if text == "@" {
        let atom = interp.heap.new_list(Kind::List)?;
        interp.push(atom);
        return Ok(());
    }
    if looks_numeric(&text) {
        let value = parse_integer(&text).ok_or_else(|| RuntimeError::Syntax {
            pos: pos.clone(),
            message: crate::compat::format!("malformed number '{}'", text),
        })?;
        let atom = interp.heap.new_integer(value)?;
        interp.push(atom);
        return Ok(());
    }
    if let Some(op) = builtins::lookup(&text) {
        let atom = interp.heap.new_native(op)?;
        interp.push(atom);
        return Ok(());
    }
    let value = scan::resolve(interp, word).map_err(|e| e.at(pos))?;
    interp.push(value);
    Ok(())
}

fn looks_numeric(text: &str) -> bool {
    let body = text.strip_prefix('-').unwrap_or(text);
    body.as_bytes().first().is_some_and(u8::is_ascii_digit)
}

/// Integer literal: optional `-`, optional `0x`/`0b` prefix, `_` separators.
pub fn parse_integer(text: &str) -> Option<i64> {
    let (negative, body) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let (radix, digits) = if let Some(hex) = body.strip_prefix("0x").or_else(|| body.strip_prefix("0X")) {
        (16, hex)
    } else if let Some(bin) = body.strip_prefix("0b").or_else(|| body.strip_prefix("0B")) {
        (2, bin)
    } else {
        (10, body)
    };
    let cleaned: String = digits.chars().filter(|&c| c != '_').collect();
    if cleaned.is_empty() || cleaned.starts_with('+') {
        return None;
    }
    let magnitude = <u64 as Num>::from_str_radix(&cleaned, radix).ok()?;
    if negative {
        if magnitude == 1 << 63 {
            Some(i64::MIN)
        } else {
            i64::try_from(magnitude).ok()?.checked_neg()
        }
    } else {
        i64::try_from(magnitude).ok()
    }
}

fn read_string(src: &mut Source<'_>, start: &SourcePos) -> Result<Vec<u8>, RuntimeError> {
    src.bump(); // opening quote
    let mut out = Vec::new();
    loop {
        match src.bump() {
            None => {
                return Err(RuntimeError::Syntax {
                    pos: start.clone(),
                    message: "unterminated string".into(),
                });
            }
            Some(b'"') => return Ok(out),
            Some(b'\\') => match src.bump() {
                Some(b'n') => out.push(b'\n'),
                Some(b't') => out.push(b'\t'),
                Some(b'e') => out.push(0x1B),
                Some(b'\\') => out.push(b'\\'),
                Some(b'"') => out.push(b'"'),
                Some(other) => {
                    out.push(b'\\');
                    out.push(other);
                }
                None => {
                    return Err(RuntimeError::Syntax {
                        pos: start.clone(),
                        message: "unterminated string".into(),
                    });
                }
            },
            Some(b) => out.push(b),
        }
    }
}

// Comments nest: ( outer ( inner ) still outer )
fn skip_comment(src: &mut Source<'_>, start: &SourcePos) -> Result<(), RuntimeError> {
    let mut depth = 0usize;
    loop {
        match src.bump() {
            Some(b'(') => depth += 1,
            Some(b')') => {
                depth -= 1;
                if depth == 0 {
                    return Ok(());
                }
            }
            Some(_) => {}
            None => {
                return Err(RuntimeError::Syntax {
                    pos: start.clone(),
                    message: "unterminated comment".into(),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_integer_forms() {
        assert_eq!(parse_integer("42"), Some(42));
        assert_eq!(parse_integer("-17"), Some(-17));
        assert_eq!(parse_integer("0x1F"), Some(31));
        assert_eq!(parse_integer("0b1010"), Some(10));
        assert_eq!(parse_integer("1_000_000"), Some(1_000_000));
        assert_eq!(parse_integer("-9223372036854775808"), Some(i64::MIN));
        assert_eq!(parse_integer("9223372036854775808"), None);
        assert_eq!(parse_integer("12abc"), None);
        assert_eq!(parse_integer("0x"), None);
    }

    #[test]
    fn test_positions_track_lines_and_columns() {
        let mut src = Source::new("ab\ncd");
        assert_eq!(src.word(), b"ab");
        assert_eq!(src.pos(), SourcePos::new(1, 3, 2));
        src.skip_whitespace();
        assert_eq!(src.pos(), SourcePos::new(2, 1, 3));
    }

    #[test]
    fn test_word_stops_at_boundaries() {
        let mut src = Source::new("abc.def");
        assert_eq!(src.word(), b"abc");
        assert_eq!(src.peek(), Some(b'.'));
        let mut src = Source::new("x\"y\"");
        assert_eq!(src.word(), b"x");
        let mut src = Source::new("name(comment)");
        assert_eq!(src.word(), b"name");
    }

    #[test]
    fn test_string_escapes() {
        let mut src = Source::new(r#""a\tb\n\e\\\"" rest"#);
        let start = src.pos();
        let text = read_string(&mut src, &start).unwrap();
        assert_eq!(text, b"a\tb\n\x1B\\\"");
    }

    #[test]
    fn test_unterminated_string_is_syntax_error() {
        let mut src = Source::new("\"never closed");
        let start = src.pos();
        assert!(matches!(
            read_string(&mut src, &start),
            Err(RuntimeError::Syntax { .. })
        ));
    }

    #[test]
    fn test_nested_comments() {
        let mut src = Source::new("( a ( b ) c ) 5");
        let start = src.pos();
        skip_comment(&mut src, &start).unwrap();
        src.skip_whitespace();
        assert_eq!(src.word(), b"5");

        let mut src = Source::new("( a ( b )");
        let start = src.pos();
        assert!(skip_comment(&mut src, &start).is_err());
    }
}
