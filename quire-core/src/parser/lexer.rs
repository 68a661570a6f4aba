//! PDF Lexer
//!
//! Tokenizes PDF syntax according to ISO 32000-1 Section 7.2. The lexer works
//! over an in-memory byte slice so the reader can jump to arbitrary object
//! offsets and backtrack when a declared stream length turns out to be wrong.

use super::{ParseError, ParseResult};

/// PDF Token types
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Boolean: true or false
    Boolean(bool),

    /// Integer number
    Integer(i64),

    /// Real number
    Real(f64),

    /// String (literal or hexadecimal)
    String(Vec<u8>),

    /// Name object (e.g., /Type)
    Name(String),

    /// Left square bracket [
    ArrayStart,

    /// Right square bracket ]
    ArrayEnd,

    /// Dictionary start <<
    DictStart,

    /// Dictionary end >>
    DictEnd,

    /// Stream keyword
    Stream,

    /// Endstream keyword
    EndStream,

    /// Obj keyword
    Obj,

    /// Endobj keyword
    EndObj,

    /// The `R` of an indirect reference
    Ref,

    /// Xref keyword
    XRef,

    /// Trailer keyword
    Trailer,

    /// StartXRef keyword
    StartXRef,

    /// Null object
    Null,

    /// Any other bare word (xref entry flags, operators)
    Keyword(String),

    /// Comment (usually ignored)
    Comment(String),

    /// End of file
    Eof,
}

/// Returns true for the PDF whitespace characters (Table 1 of ISO 32000-1)
pub fn is_whitespace(ch: u8) -> bool {
    matches!(ch, b' ' | b'\t' | b'\r' | b'\n' | b'\x0C' | b'\0')
}

/// Returns true for the PDF delimiter characters
pub fn is_delimiter(ch: u8) -> bool {
    matches!(
        ch,
        b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%'
    )
}

/// PDF Lexer for tokenizing PDF content
pub struct Lexer<'a> {
    data: &'a [u8],
    position: usize,
    token_buffer: Vec<Token>,
}

impl<'a> Lexer<'a> {
    /// Create a new lexer positioned at the start of `data`
    pub fn new(data: &'a [u8]) -> Self {
        Self::at(data, 0)
    }

    /// Create a new lexer positioned at `position`
    pub fn at(data: &'a [u8], position: usize) -> Self {
        Self {
            data,
            position: position.min(data.len()),
            token_buffer: Vec::new(),
        }
    }

    /// Get the next token
    pub fn next_token(&mut self) -> ParseResult<Token> {
        // Check if we have a pushed-back token
        if let Some(token) = self.token_buffer.pop() {
            return Ok(token);
        }

        self.skip_whitespace();

        let ch = match self.peek_char() {
            Some(ch) => ch,
            None => return Ok(Token::Eof),
        };

        match ch {
            b'%' => Ok(self.read_comment()),
            b'/' => self.read_name(),
            b'(' => self.read_literal_string(),
            b'<' => self.read_angle_bracket(),
            b'>' => {
                self.consume_char();
                if self.peek_char() == Some(b'>') {
                    self.consume_char();
                    Ok(Token::DictEnd)
                } else {
                    Err(self.syntax_error("Expected '>' after '>'"))
                }
            }
            b'[' => {
                self.consume_char();
                Ok(Token::ArrayStart)
            }
            b']' => {
                self.consume_char();
                Ok(Token::ArrayEnd)
            }
            b'+' | b'-' | b'0'..=b'9' | b'.' => self.read_number(),
            b')' | b'{' | b'}' => Err(self.syntax_error(&format!(
                "Unexpected character: {}",
                ch as char
            ))),
            _ => Ok(self.read_keyword()),
        }
    }

    /// Peek at the next character without consuming it
    fn peek_char(&self) -> Option<u8> {
        self.data.get(self.position).copied()
    }

    /// Consume the next character
    fn consume_char(&mut self) -> Option<u8> {
        let ch = self.peek_char();
        if ch.is_some() {
            self.position += 1;
        }
        ch
    }

    fn syntax_error(&self, message: &str) -> ParseError {
        ParseError::SyntaxError {
            position: self.position,
            message: message.to_string(),
        }
    }

    /// Skip whitespace and return the number of bytes skipped
    pub fn skip_whitespace(&mut self) -> usize {
        let start = self.position;
        while let Some(ch) = self.peek_char() {
            if is_whitespace(ch) {
                self.position += 1;
            } else {
                break;
            }
        }
        self.position - start
    }

    /// Read a comment (from % to end of line)
    fn read_comment(&mut self) -> Token {
        self.consume_char(); // consume '%'
        let start = self.position;

        while let Some(ch) = self.peek_char() {
            if ch == b'\n' || ch == b'\r' {
                break;
            }
            self.position += 1;
        }

        Token::Comment(String::from_utf8_lossy(&self.data[start..self.position]).into_owned())
    }

    /// Read a name object (e.g., /Type)
    fn read_name(&mut self) -> ParseResult<Token> {
        self.consume_char(); // consume '/'
        let mut name = String::new();

        while let Some(ch) = self.peek_char() {
            if is_whitespace(ch) || is_delimiter(ch) {
                break;
            }
            self.consume_char();

            // Handle hex codes in names (e.g., /A#20B means /A B)
            if ch == b'#' {
                let high = self.consume_char().and_then(hex_digit_value);
                let low = self.consume_char().and_then(hex_digit_value);
                match (high, low) {
                    (Some(high), Some(low)) => name.push(((high << 4) | low) as char),
                    _ => return Err(self.syntax_error("Invalid hex code in name")),
                }
            } else {
                name.push(ch as char);
            }
        }

        Ok(Token::Name(name))
    }

    /// Read a literal string (parentheses)
    fn read_literal_string(&mut self) -> ParseResult<Token> {
        self.consume_char(); // consume '('
        let mut string = Vec::new();
        let mut paren_depth = 1;

        while paren_depth > 0 {
            let ch = self
                .consume_char()
                .ok_or_else(|| self.syntax_error("Unterminated string"))?;

            match ch {
                b'\\' => {
                    let escaped = self
                        .consume_char()
                        .ok_or_else(|| self.syntax_error("Unterminated string"))?;
                    match escaped {
                        b'n' => string.push(b'\n'),
                        b'r' => string.push(b'\r'),
                        b't' => string.push(b'\t'),
                        b'b' => string.push(b'\x08'),
                        b'f' => string.push(b'\x0C'),
                        b'(' | b')' | b'\\' => string.push(escaped),
                        b'0'..=b'7' => {
                            // Octal escape sequence, at most three digits
                            let mut value = u32::from(escaped - b'0');
                            for _ in 0..2 {
                                match self.peek_char() {
                                    Some(next @ b'0'..=b'7') => {
                                        self.consume_char();
                                        value = value * 8 + u32::from(next - b'0');
                                    }
                                    _ => break,
                                }
                            }
                            string.push((value & 0xFF) as u8);
                        }
                        // Line continuation
                        b'\r' => {
                            if self.peek_char() == Some(b'\n') {
                                self.consume_char();
                            }
                        }
                        b'\n' => {}
                        _ => string.push(escaped), // Unknown escape, use literal
                    }
                }
                b'(' => {
                    string.push(ch);
                    paren_depth += 1;
                }
                b')' => {
                    paren_depth -= 1;
                    if paren_depth > 0 {
                        string.push(ch);
                    }
                }
                _ => string.push(ch),
            }
        }

        Ok(Token::String(string))
    }

    /// Read angle bracket tokens (hex strings or dict markers)
    fn read_angle_bracket(&mut self) -> ParseResult<Token> {
        self.consume_char(); // consume '<'

        if self.peek_char() == Some(b'<') {
            self.consume_char();
            return Ok(Token::DictStart);
        }

        let mut digits = Vec::new();
        loop {
            let ch = self
                .consume_char()
                .ok_or_else(|| self.syntax_error("Unterminated hex string"))?;
            if ch == b'>' {
                break;
            }
            if let Some(value) = hex_digit_value(ch) {
                digits.push(value);
            } else if !is_whitespace(ch) {
                return Err(self.syntax_error("Invalid character in hex string"));
            }
        }

        // Pad with 0 if odd number of digits
        if digits.len() % 2 != 0 {
            digits.push(0);
        }

        let bytes = digits
            .chunks(2)
            .map(|pair| (pair[0] << 4) | pair[1])
            .collect();

        Ok(Token::String(bytes))
    }

    /// Read a number (integer or real)
    fn read_number(&mut self) -> ParseResult<Token> {
        let start = self.position;
        let mut has_dot = false;
        let mut has_digit = false;

        // Handle sign; producers occasionally emit doubled signs such as "--5"
        while let Some(ch @ (b'+' | b'-')) = self.peek_char() {
            if self.position > start && ch == b'+' {
                break;
            }
            self.consume_char();
        }

        while let Some(ch) = self.peek_char() {
            match ch {
                b'0'..=b'9' => {
                    has_digit = true;
                    self.consume_char();
                }
                b'.' if !has_dot => {
                    has_dot = true;
                    self.consume_char();
                }
                _ => break,
            }
        }

        if !has_digit {
            return Err(ParseError::SyntaxError {
                position: start,
                message: "Expected digit in number".to_string(),
            });
        }

        let raw = String::from_utf8_lossy(&self.data[start..self.position]);
        let negative = raw.matches('-').count() % 2 == 1;
        let digits = raw.trim_start_matches(['+', '-']);

        if has_dot {
            let value = digits
                .parse::<f64>()
                .map_err(|_| ParseError::SyntaxError {
                    position: start,
                    message: format!("Invalid real number: '{raw}'"),
                })?;
            return Ok(Token::Real(if negative { -value } else { value }));
        }

        match digits.parse::<i64>() {
            Ok(value) => Ok(Token::Integer(if negative { -value } else { value })),
            // Integers beyond i64 degrade to reals rather than failing
            Err(_) => {
                let value = digits.parse::<f64>().map_err(|_| ParseError::SyntaxError {
                    position: start,
                    message: format!("Invalid integer: '{raw}'"),
                })?;
                Ok(Token::Real(if negative { -value } else { value }))
            }
        }
    }

    /// Read a keyword
    fn read_keyword(&mut self) -> Token {
        let word = self.read_word();
        match word.as_str() {
            "true" => Token::Boolean(true),
            "false" => Token::Boolean(false),
            "null" => Token::Null,
            "stream" => Token::Stream,
            "endstream" => Token::EndStream,
            "obj" => Token::Obj,
            "endobj" => Token::EndObj,
            "R" => Token::Ref,
            "xref" => Token::XRef,
            "trailer" => Token::Trailer,
            "startxref" => Token::StartXRef,
            _ => Token::Keyword(word),
        }
    }

    /// Read a word (sequence of non-delimiter characters)
    fn read_word(&mut self) -> String {
        let start = self.position;
        while let Some(ch) = self.peek_char() {
            if is_whitespace(ch) || is_delimiter(ch) {
                break;
            }
            self.position += 1;
        }
        // Always advance so a stray byte cannot stall the lexer
        if self.position == start {
            self.position += 1;
        }
        String::from_utf8_lossy(&self.data[start..self.position]).into_owned()
    }

    /// Consume the end-of-line marker that follows the `stream` keyword.
    ///
    /// Accepts CRLF, LF, or a bare CR; spaces before the marker are skipped.
    pub fn skip_stream_eol(&mut self) {
        while self.peek_char() == Some(b' ') {
            self.consume_char();
        }
        match self.peek_char() {
            Some(b'\r') => {
                self.consume_char();
                if self.peek_char() == Some(b'\n') {
                    self.consume_char();
                }
            }
            Some(b'\n') => {
                self.consume_char();
            }
            _ => {}
        }
    }

    /// Read exactly n bytes
    pub fn read_bytes(&mut self, n: usize) -> ParseResult<&'a [u8]> {
        let end = self
            .position
            .checked_add(n)
            .filter(|end| *end <= self.data.len())
            .ok_or_else(|| self.syntax_error(&format!("Cannot read {n} bytes past end of data")))?;
        let bytes = &self.data[self.position..end];
        self.position = end;
        Ok(bytes)
    }

    /// Find the absolute offset of the next occurrence of `sequence`
    pub fn find_sequence(&self, sequence: &[u8]) -> Option<usize> {
        find_bytes(&self.data[self.position..], sequence).map(|offset| self.position + offset)
    }

    /// Check whether the unread input starts with `sequence`
    pub fn starts_with(&self, sequence: &[u8]) -> bool {
        self.data[self.position..].starts_with(sequence)
    }

    /// Get current position
    pub fn position(&self) -> usize {
        self.position
    }

    /// Jump to an absolute position, discarding pushed-back tokens
    pub fn set_position(&mut self, position: usize) {
        self.position = position.min(self.data.len());
        self.token_buffer.clear();
    }

    /// The full input this lexer reads from
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Push back a token to be returned by the next call to next_token
    pub fn push_token(&mut self, token: Token) {
        self.token_buffer.push(token);
    }

    /// Get the next token that is not a comment
    pub fn next_significant_token(&mut self) -> ParseResult<Token> {
        loop {
            match self.next_token()? {
                Token::Comment(_) => continue,
                token => return Ok(token),
            }
        }
    }

    /// Expect a specific keyword token
    pub fn expect_keyword(&mut self, keyword: &str) -> ParseResult<()> {
        let token = self.next_significant_token()?;
        let matched = match (keyword, &token) {
            ("endstream", Token::EndStream)
            | ("stream", Token::Stream)
            | ("endobj", Token::EndObj)
            | ("obj", Token::Obj)
            | ("xref", Token::XRef)
            | ("trailer", Token::Trailer)
            | ("startxref", Token::StartXRef) => true,
            (expected, Token::Keyword(word)) => expected == word,
            _ => false,
        };

        if matched {
            Ok(())
        } else {
            Err(ParseError::UnexpectedToken {
                expected: format!("keyword '{keyword}'"),
                found: format!("{token:?}"),
            })
        }
    }
}

/// Get value of hex digit
pub(crate) fn hex_digit_value(ch: u8) -> Option<u8> {
    match ch {
        b'0'..=b'9' => Some(ch - b'0'),
        b'A'..=b'F' => Some(ch - b'A' + 10),
        b'a'..=b'f' => Some(ch - b'a' + 10),
        _ => None,
    }
}

/// Find the first occurrence of `needle` in `haystack`
pub(crate) fn find_bytes(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Find the last occurrence of `needle` in `haystack`
pub(crate) fn rfind_bytes(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .rposition(|window| window == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(input: &[u8]) -> Vec<Token> {
        let mut lexer = Lexer::new(input);
        let mut tokens = Vec::new();
        loop {
            let token = lexer.next_token().unwrap();
            if token == Token::Eof {
                break;
            }
            tokens.push(token);
        }
        tokens
    }

    #[test]
    fn test_basic_tokens() {
        assert_eq!(
            tokens(b"true false null 123 -456 3.14 /Name (Hello)"),
            vec![
                Token::Boolean(true),
                Token::Boolean(false),
                Token::Null,
                Token::Integer(123),
                Token::Integer(-456),
                Token::Real(3.14),
                Token::Name("Name".to_string()),
                Token::String(b"Hello".to_vec()),
            ]
        );
    }

    #[test]
    fn test_lexer_empty_input() {
        let mut lexer = Lexer::new(b"");
        assert_eq!(lexer.next_token().unwrap(), Token::Eof);

        let mut lexer = Lexer::new(b"   \n\t  ");
        assert_eq!(lexer.next_token().unwrap(), Token::Eof);
    }

    #[test]
    fn test_lexer_real_edge_cases() {
        assert_eq!(tokens(b".5"), vec![Token::Real(0.5)]);
        assert_eq!(tokens(b"-.25"), vec![Token::Real(-0.25)]);
        assert_eq!(tokens(b"4."), vec![Token::Real(4.0)]);
        assert_eq!(tokens(b"+17"), vec![Token::Integer(17)]);
        assert_eq!(tokens(b"--5"), vec![Token::Integer(5)]);
    }

    #[test]
    fn test_lexer_large_integer_degrades_to_real() {
        let toks = tokens(b"99999999999999999999");
        assert!(matches!(toks[0], Token::Real(v) if v > 9.0e18));
    }

    #[test]
    fn test_lexer_string_literal_escapes() {
        assert_eq!(
            tokens(b"(a\\nb\\(c\\)\\\\d\\101)"),
            vec![Token::String(b"a\nb(c)\\dA".to_vec())]
        );
    }

    #[test]
    fn test_lexer_string_literal_nested_parens() {
        assert_eq!(
            tokens(b"(outer (inner) done)"),
            vec![Token::String(b"outer (inner) done".to_vec())]
        );
    }

    #[test]
    fn test_lexer_string_line_continuation() {
        assert_eq!(
            tokens(b"(split \\\nline)"),
            vec![Token::String(b"split line".to_vec())]
        );
    }

    #[test]
    fn test_lexer_hexadecimal_strings() {
        assert_eq!(
            tokens(b"<48656C6C6F>"),
            vec![Token::String(b"Hello".to_vec())]
        );
        assert_eq!(tokens(b"<4 8 6>"), vec![Token::String(vec![0x48, 0x60])]);
        assert_eq!(tokens(b"<>"), vec![Token::String(Vec::new())]);
    }

    #[test]
    fn test_lexer_error_handling_invalid_hex() {
        let mut lexer = Lexer::new(b"<48ZZ>");
        assert!(lexer.next_token().is_err());

        let mut lexer = Lexer::new(b"<4865");
        assert!(lexer.next_token().is_err());
    }

    #[test]
    fn test_lexer_names_with_special_chars() {
        assert_eq!(
            tokens(b"/A#20B /Type/Page"),
            vec![
                Token::Name("A B".to_string()),
                Token::Name("Type".to_string()),
                Token::Name("Page".to_string()),
            ]
        );
        assert_eq!(tokens(b"/"), vec![Token::Name(String::new())]);
    }

    #[test]
    fn test_lexer_high_byte_names_map_to_latin1() {
        assert_eq!(
            tokens(b"/Caf\xE9 /Caf#E9"),
            vec![
                Token::Name("Caf\u{e9}".to_string()),
                Token::Name("Caf\u{e9}".to_string()),
            ]
        );
    }

    #[test]
    fn test_lexer_keywords() {
        assert_eq!(
            tokens(b"obj endobj stream endstream R xref trailer startxref n f"),
            vec![
                Token::Obj,
                Token::EndObj,
                Token::Stream,
                Token::EndStream,
                Token::Ref,
                Token::XRef,
                Token::Trailer,
                Token::StartXRef,
                Token::Keyword("n".to_string()),
                Token::Keyword("f".to_string()),
            ]
        );
    }

    #[test]
    fn test_lexer_nested_dictionaries() {
        assert_eq!(
            tokens(b"<</A<</B 1>>>>"),
            vec![
                Token::DictStart,
                Token::Name("A".to_string()),
                Token::DictStart,
                Token::Name("B".to_string()),
                Token::Integer(1),
                Token::DictEnd,
                Token::DictEnd,
            ]
        );
    }

    #[test]
    fn test_lexer_comments() {
        let toks = tokens(b"%PDF-1.7\n1 % trailing\n2");
        assert_eq!(
            toks,
            vec![
                Token::Comment("PDF-1.7".to_string()),
                Token::Integer(1),
                Token::Comment(" trailing".to_string()),
                Token::Integer(2),
            ]
        );
    }

    #[test]
    fn test_lexer_push_token() {
        let mut lexer = Lexer::new(b"1 2");
        let first = lexer.next_token().unwrap();
        let second = lexer.next_token().unwrap();
        lexer.push_token(second.clone());
        lexer.push_token(first.clone());
        assert_eq!(lexer.next_token().unwrap(), first);
        assert_eq!(lexer.next_token().unwrap(), second);
        assert_eq!(lexer.next_token().unwrap(), Token::Eof);
    }

    #[test]
    fn test_lexer_read_bytes_and_position() {
        let mut lexer = Lexer::new(b"stream\r\nABCDE\nendstream");
        assert_eq!(lexer.next_token().unwrap(), Token::Stream);
        lexer.skip_stream_eol();
        assert_eq!(lexer.position(), 8);
        assert_eq!(lexer.read_bytes(5).unwrap(), b"ABCDE");
        assert!(lexer.read_bytes(100).is_err());
        assert_eq!(lexer.find_sequence(b"endstream"), Some(14));
    }

    #[test]
    fn test_lexer_expect_keyword() {
        let mut lexer = Lexer::new(b"endobj trailer");
        assert!(lexer.expect_keyword("endobj").is_ok());
        assert!(lexer.expect_keyword("xref").is_err());
    }

    #[test]
    fn test_find_bytes_helpers() {
        assert_eq!(find_bytes(b"abcabc", b"bc"), Some(1));
        assert_eq!(rfind_bytes(b"abcabc", b"bc"), Some(4));
        assert_eq!(find_bytes(b"abc", b"zz"), None);
        assert_eq!(find_bytes(b"a", b"abc"), None);
    }
}
