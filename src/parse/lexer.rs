//! Hand-written lexer (C1), grounded in
//! `examples/original_source/src/parse/lexer.cpp` and
//! `include/parse/lexer.h`.

use crate::error::{EngineError, EngineResult};
use crate::parse::token::{lookup_keyword, Token};

pub struct Lexer {
    buf: Vec<char>,
    pos: usize,
    peek_start_pos: usize,
    peek_start_last_char: Option<char>,
    last_char: Option<char>,
    brace_open: bool,
    bracket_open: bool,

    last_word: String,
    last_string: String,
    last_strnum: String,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        let buf: Vec<char> = input.chars().collect();
        let mut lexer = Self {
            buf,
            pos: 0,
            peek_start_pos: 0,
            peek_start_last_char: None,
            last_char: None,
            brace_open: false,
            bracket_open: false,
            last_word: String::new(),
            last_string: String::new(),
            last_strnum: String::new(),
        };
        lexer.last_char = lexer.read_char();
        lexer
    }

    pub fn last_word(&self) -> &str {
        &self.last_word
    }

    pub fn last_string(&self) -> &str {
        &self.last_string
    }

    pub fn last_strnum(&self) -> &str {
        &self.last_strnum
    }

    fn read_char(&mut self) -> Option<char> {
        let c = self.buf.get(self.pos).copied();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    /// Looks at the character after `last_char` without consuming it or
    /// disturbing lexer state, for the one-character lookahead that
    /// disambiguates `.123` and `name:`/`metric:name` from a standalone
    /// colon token.
    fn peek_char(&self) -> Option<char> {
        self.buf.get(self.pos).copied()
    }

    /// Saves full lexer state so a complete `get_token` call can be
    /// rewound, used by the parser for multi-token lookahead.
    pub fn peek_begin(&mut self) {
        self.peek_start_pos = self.pos;
        self.peek_start_last_char = self.last_char;
    }

    pub fn peek_token(&mut self) -> EngineResult<Token> {
        self.get_token()
    }

    pub fn peek_end(&mut self) {
        self.pos = self.peek_start_pos;
        self.last_char = self.peek_start_last_char;
    }

    pub fn get_token(&mut self) -> EngineResult<Token> {
        self.last_word.clear();

        while matches!(self.last_char, Some('\n' | '\r' | ' ' | '\t' | '\0')) {
            self.last_char = self.read_char();
        }

        let Some(c) = self.last_char else {
            return Ok(Token::Eos);
        };

        match c {
            '#' => {
                while !matches!(self.last_char, None | Some('\n' | '\r')) {
                    self.last_char = self.read_char();
                }
                self.get_token()
            }
            ',' => self.single(Token::Comma),
            '*' => self.single(Token::Mul),
            '/' => self.single(Token::Div),
            '+' => self.single(Token::Add),
            '-' => self.single(Token::Sub),
            '%' => self.single(Token::Mod),
            '^' => self.single(Token::Pow),
            '=' => {
                self.last_char = self.read_char();
                match self.last_char {
                    Some('=') => {
                        self.last_char = self.read_char();
                        Ok(Token::Eql)
                    }
                    Some('~') => {
                        self.last_char = self.read_char();
                        Ok(Token::EqlRegex)
                    }
                    _ => Ok(Token::Assign),
                }
            }
            '!' => {
                self.last_char = self.read_char();
                match self.last_char {
                    Some('=') => {
                        self.last_char = self.read_char();
                        Ok(Token::Neq)
                    }
                    Some('~') => {
                        self.last_char = self.read_char();
                        Ok(Token::NeqRegex)
                    }
                    _ => Err(EngineError::LexError("unexpected character after '!'".into())),
                }
            }
            '>' => {
                self.last_char = self.read_char();
                if self.last_char == Some('=') {
                    self.last_char = self.read_char();
                    Ok(Token::Gte)
                } else {
                    Ok(Token::Gtr)
                }
            }
            '<' => {
                self.last_char = self.read_char();
                if self.last_char == Some('=') {
                    self.last_char = self.read_char();
                    Ok(Token::Lte)
                } else {
                    Ok(Token::Lss)
                }
            }
            '~' => Err(EngineError::LexError("unexpected character: ~".into())),
            '"' | '\'' => self.lex_string(c),
            '`' => self.lex_raw_string(),
            '(' => self.single(Token::LeftParen),
            ')' => self.single(Token::RightParen),
            '[' => {
                self.bracket_open = true;
                self.single(Token::LeftBracket)
            }
            ']' => {
                self.bracket_open = false;
                self.single(Token::RightBracket)
            }
            '{' => {
                self.brace_open = true;
                self.single(Token::LeftBrace)
            }
            '}' => {
                self.brace_open = false;
                self.single(Token::RightBrace)
            }
            c if c.is_ascii_digit() => self.lex_number(),
            '.' => {
                if self.peek_char().is_some_and(|n| n.is_ascii_digit()) {
                    self.lex_number()
                } else {
                    Err(EngineError::LexError("unexpected character: .".into()))
                }
            }
            c if c.is_alphabetic() || c == '_' || c == ':' => {
                let next = self.peek_char();

                let colon_ends_identifier =
                    c == ':' && !(next.is_some_and(|n| n.is_alphanumeric() || n == '_') || next == Some(':'));
                if self.bracket_open || colon_ends_identifier {
                    self.last_char = self.read_char();
                    return Ok(Token::Colon);
                }
                self.lex_identifier(self.brace_open)
            }
            other => Err(EngineError::LexError(format!("unexpected character: {other}"))),
        }
    }

    fn single(&mut self, tok: Token) -> EngineResult<Token> {
        self.last_char = self.read_char();
        Ok(tok)
    }

    fn lex_string(&mut self, quote: char) -> EngineResult<Token> {
        self.last_string.clear();
        self.last_char = self.read_char();
        while !matches!(self.last_char, None | Some('\n' | '\r')) && self.last_char != Some(quote) {
            let ch = self.lex_char_lit()?;
            self.last_string.push(ch);
        }
        if self.last_char == Some(quote) {
            self.last_char = self.read_char();
            Ok(Token::String)
        } else {
            self.last_char = self.read_char();
            Err(EngineError::LexError("unclosed string literal".into()))
        }
    }

    fn lex_raw_string(&mut self) -> EngineResult<Token> {
        self.last_string.clear();
        self.last_char = self.read_char();
        while !matches!(self.last_char, None) && self.last_char != Some('`') {
            self.last_string.push(self.last_char.unwrap());
            self.last_char = self.read_char();
        }
        if self.last_char == Some('`') {
            self.last_char = self.read_char();
            Ok(Token::String)
        } else {
            self.last_char = self.read_char();
            Err(EngineError::LexError("unclosed raw string literal".into()))
        }
    }

    fn lex_char_lit(&mut self) -> EngineResult<char> {
        if self.last_char == Some('\\') {
            self.last_char = self.read_char();
            let escaped = match self.last_char {
                Some('b') => Some('\u{8}'),
                Some('t') => Some('\t'),
                Some('n') => Some('\n'),
                Some('r') => Some('\r'),
                Some('\'') => Some('\''),
                Some('"') => Some('"'),
                Some('\\') => Some('\\'),
                _ => None,
            };
            if let Some(c) = escaped {
                self.last_char = self.read_char();
                return Ok(c);
            }
        }
        let tmp = self.last_char.ok_or_else(|| EngineError::LexError("unterminated escape".into()))?;
        self.last_char = self.read_char();
        Ok(tmp)
    }

    fn lex_number(&mut self) -> EngineResult<Token> {
        self.last_strnum.clear();
        while self.last_char.is_some_and(|c| c.is_ascii_digit()) {
            self.last_strnum.push(self.last_char.unwrap());
            self.last_char = self.read_char();
        }

        if self.last_char == Some('.') {
            self.last_strnum.push('.');
            self.last_char = self.read_char();
            self.scan_fraction_and_suffix()
        } else if matches!(self.last_char, Some('e' | 'E')) {
            self.scan_fraction_and_suffix()
        } else if matches!(self.last_char, Some('s' | 'm' | 'h' | 'd' | 'w' | 'y')) {
            self.scan_fraction_and_suffix()
        } else {
            Ok(Token::Number)
        }
    }

    fn scan_fraction_and_suffix(&mut self) -> EngineResult<Token> {
        while self.last_char.is_some_and(|c| c.is_ascii_digit()) {
            self.last_strnum.push(self.last_char.unwrap());
            self.last_char = self.read_char();
        }
        if matches!(self.last_char, Some('e' | 'E')) {
            self.last_strnum.push(self.last_char.unwrap());
            self.last_char = self.read_char();
            if matches!(self.last_char, Some('+' | '-')) {
                self.last_strnum.push(self.last_char.unwrap());
                self.last_char = self.read_char();
            }
            if self.last_char.is_some_and(|c| c.is_ascii_digit()) {
                while self.last_char.is_some_and(|c| c.is_ascii_digit()) {
                    self.last_strnum.push(self.last_char.unwrap());
                    self.last_char = self.read_char();
                }
            } else {
                return Err(EngineError::LexError("malformed floating point literal".into()));
            }
        }

        if matches!(self.last_char, Some('s' | 'm' | 'h' | 'd' | 'w' | 'y')) {
            self.last_strnum.push(self.last_char.unwrap());
            self.last_char = self.read_char();
            Ok(Token::Duration)
        } else {
            Ok(Token::Number)
        }
    }

    fn lex_identifier(&mut self, force_identifier: bool) -> EngineResult<Token> {
        let mut has_colon = false;
        self.last_word.clear();
        loop {
            let c = self.last_char.expect("caller only enters on Some");
            if c == ':' {
                has_colon = true;
            }
            self.last_word.push(c);
            self.last_char = self.read_char();
            match self.last_char {
                None => break,
                Some(n) if n.is_alphanumeric() || n == '_' || n == ':' => continue,
                _ => break,
            }
        }

        if has_colon {
            return Ok(Token::MetricIdent);
        }
        if force_identifier {
            return Ok(Token::Ident);
        }
        Ok(lookup_keyword(&self.last_word).unwrap_or(Token::Ident))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(input: &str) -> Vec<Token> {
        let mut lexer = Lexer::new(input);
        let mut out = Vec::new();
        loop {
            let tok = lexer.get_token().unwrap();
            if tok == Token::Eos {
                break;
            }
            out.push(tok);
        }
        out
    }

    #[test]
    fn lexes_a_vector_selector() {
        let toks = tokens(r#"http_requests_total{job="api"}"#);
        assert_eq!(
            toks,
            vec![
                Token::Ident,
                Token::LeftBrace,
                Token::Ident,
                Token::Eql,
                Token::String,
                Token::RightBrace,
            ]
        );
    }

    #[test]
    fn lexes_duration_suffix() {
        let mut lexer = Lexer::new("5m");
        assert_eq!(lexer.get_token().unwrap(), Token::Duration);
        assert_eq!(lexer.last_strnum(), "5m");
    }

    #[test]
    fn lexes_regex_operators() {
        assert_eq!(tokens(r#"job=~"a.*""#), vec![Token::Ident, Token::EqlRegex, Token::String]);
    }

    #[test]
    fn colon_inside_brackets_is_its_own_token() {
        let toks = tokens("[5m:1m]");
        assert_eq!(
            toks,
            vec![Token::LeftBracket, Token::Duration, Token::Colon, Token::Duration, Token::RightBracket]
        );
    }

    #[test]
    fn metric_identifier_with_embedded_colon() {
        let toks = tokens("node:cpu:rate5m");
        assert_eq!(toks, vec![Token::MetricIdent]);
    }

    #[test]
    fn unterminated_string_is_a_lex_error() {
        let mut lexer = Lexer::new("\"abc");
        assert!(lexer.get_token().is_err());
    }

    #[test]
    fn comment_is_skipped() {
        let toks = tokens("up # this is ignored\n");
        assert_eq!(toks, vec![Token::Ident]);
    }

    #[test]
    fn raw_string_ignores_escapes() {
        let mut lexer = Lexer::new(r#"`a\nb`"#);
        assert_eq!(lexer.get_token().unwrap(), Token::String);
        assert_eq!(lexer.last_string(), r"a\nb");
    }
}
