use utils::DiagnosticEmitter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Identifier(pub usize);

#[derive(Clone, Debug, Copy, Eq, PartialEq, Hash)]
pub struct Location(pub u32);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenValue {
    Id(Identifier),
    Integer(i64),
    StrLiteral(String),

    // Keywords
    Class,
    Constructor,
    If,
    Else,
    While,
    For,
    Return,
    Throw,
    Break,
    Continue,
    New,
    This,
    Null,
    True,
    False,

    // Builtin types
    Int,
    Bool,
    Str,
    Void,
    List,

    // Operators
    Define,
    Equal,
    NotEqual,
    LessThan,
    GreaterThan,
    LessThanOrEq,
    GreaterThanOrEq,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Not,
    And,
    Or,
    Question,

    // Separators
    LeftParen,
    RightParen,
    LeftBrace,
    RightBrace,
    LeftBracket,
    RightBracket,
    Semicolon,
    Colon,
    Comma,
    Dot,

    EndOfFile,
}

use TokenValue::*;

fn from_char(c: char) -> Option<TokenValue> {
    match c {
        '(' => Some(LeftParen),
        ')' => Some(RightParen),
        '{' => Some(LeftBrace),
        '}' => Some(RightBrace),
        '[' => Some(LeftBracket),
        ']' => Some(RightBracket),
        ';' => Some(Semicolon),
        ':' => Some(Colon),
        ',' => Some(Comma),
        '.' => Some(Dot),
        '+' => Some(Plus),
        '*' => Some(Star),
        '%' => Some(Percent),
        '?' => Some(Question),
        _ => None,
    }
}

fn keyword(ident: &str) -> Option<TokenValue> {
    match ident {
        "class" => Some(Class),
        "constructor" => Some(Constructor),
        "if" => Some(If),
        "else" => Some(Else),
        "while" => Some(While),
        "for" => Some(For),
        "return" => Some(Return),
        "throw" => Some(Throw),
        "break" => Some(Break),
        "continue" => Some(Continue),
        "new" => Some(New),
        "this" => Some(This),
        "null" => Some(Null),
        "true" => Some(True),
        "false" => Some(False),
        "int" => Some(Int),
        "bool" => Some(Bool),
        "str" => Some(Str),
        "void" => Some(Void),
        "list" => Some(List),
        _ => None,
    }
}

impl core::fmt::Display for TokenValue {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        match self {
            Id(i) => write!(f, "id_{}", i.0),
            Integer(i) => write!(f, "{i}"),
            StrLiteral(s) => write!(f, "{s:?}"),

            Class => write!(f, "class"),
            Constructor => write!(f, "constructor"),
            If => write!(f, "if"),
            Else => write!(f, "else"),
            While => write!(f, "while"),
            For => write!(f, "for"),
            Return => write!(f, "return"),
            Throw => write!(f, "throw"),
            Break => write!(f, "break"),
            Continue => write!(f, "continue"),
            New => write!(f, "new"),
            This => write!(f, "this"),
            Null => write!(f, "null"),
            True => write!(f, "true"),
            False => write!(f, "false"),

            Int => write!(f, "int"),
            Bool => write!(f, "bool"),
            Str => write!(f, "str"),
            Void => write!(f, "void"),
            List => write!(f, "list"),

            Define => write!(f, "="),
            Equal => write!(f, "=="),
            NotEqual => write!(f, "!="),
            LessThan => write!(f, "<"),
            GreaterThan => write!(f, ">"),
            LessThanOrEq => write!(f, "<="),
            GreaterThanOrEq => write!(f, ">="),
            Plus => write!(f, "+"),
            Minus => write!(f, "-"),
            Star => write!(f, "*"),
            Slash => write!(f, "/"),
            Percent => write!(f, "%"),
            Not => write!(f, "!"),
            And => write!(f, "&&"),
            Or => write!(f, "||"),
            Question => write!(f, "?"),

            LeftParen => write!(f, "("),
            RightParen => write!(f, ")"),
            LeftBrace => write!(f, "{{"),
            RightBrace => write!(f, "}}"),
            LeftBracket => write!(f, "["),
            RightBracket => write!(f, "]"),
            Semicolon => write!(f, ";"),
            Colon => write!(f, ":"),
            Comma => write!(f, ","),
            Dot => write!(f, "."),

            EndOfFile => write!(f, "END_OF_FILE"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub value: TokenValue,

    pub line_num: Location,
}

impl core::fmt::Display for Token {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(f, "{}", self.value)
    }
}

#[derive(Debug, Clone, Default)]
pub struct IdentifierTable(pub Vec<String>);

impl IdentifierTable {
    pub fn lookup(&self, ident: &str) -> Option<Identifier> {
        // TODO: more efficient lookup.
        self.0.iter().position(|str| str == ident).map(Identifier)
    }

    fn get_identifier(&mut self, ident: &str) -> Identifier {
        if let Some(id) = self.lookup(ident) {
            id
        } else {
            self.0.push(ident.to_owned());
            Identifier(self.0.len() - 1)
        }
    }

    pub fn get_name(&self, id: Identifier) -> &str {
        &self.0[id.0]
    }
}

pub struct Lexer<'src> {
    source: &'src str,
    start: usize,
    current: usize,
    line_num: u32,
    has_error: bool,
    diagnostic_emitter: &'src mut DiagnosticEmitter,
    identifiers: IdentifierTable,
}

#[derive(Debug, Clone, Default)]
pub struct LexResult {
    pub tokens: Vec<Token>,
    pub identifiers: IdentifierTable,
}

impl<'src> Lexer<'src> {
    pub fn new(source: &'src str, diagnostic_emitter: &'src mut DiagnosticEmitter) -> Self {
        Lexer {
            source,
            start: 0,
            current: 0,
            line_num: 1,
            has_error: false,
            diagnostic_emitter,
            identifiers: IdentifierTable::default(),
        }
    }

    pub fn lex_all(mut self) -> LexResult {
        if !self.source.is_ascii() {
            self.diagnostic_emitter
                .error(self.line_num, "Only ASCII input is supported.");
            return LexResult::default();
        }

        let mut tokens = Vec::new();
        while !self.is_at_end() {
            if let Some(tok) = self.lex() {
                tokens.push(tok);
            } else if self.has_error {
                return LexResult::default();
            }
        }

        tokens.push(Token {
            value: EndOfFile,
            line_num: Location(self.line_num),
        });

        LexResult {
            tokens,
            identifiers: self.identifiers,
        }
    }

    fn token(&self, value: TokenValue) -> Option<Token> {
        Some(Token {
            value,
            line_num: Location(self.line_num),
        })
    }

    fn lex(&mut self) -> Option<Token> {
        loop {
            if self.is_at_end() {
                return None;
            }

            self.start = self.current;
            match self.advance() {
                // Unambiguous single character tokens.
                c @ ('(' | ')' | '{' | '}' | '[' | ']' | ';' | ':' | ',' | '.' | '+' | '*'
                | '%' | '?') => return self.token(from_char(c).unwrap()),

                // Whitespace
                '\n' => {
                    self.line_num += 1;
                    continue;
                }
                ' ' | '\t' | '\r' => continue,

                // One or two character operators.
                '=' => {
                    let value = if self.match_char('=') { Equal } else { Define };
                    return self.token(value);
                }
                '!' => {
                    let value = if self.match_char('=') { NotEqual } else { Not };
                    return self.token(value);
                }
                '<' => {
                    let value = if self.match_char('=') {
                        LessThanOrEq
                    } else {
                        LessThan
                    };
                    return self.token(value);
                }
                '>' => {
                    let value = if self.match_char('=') {
                        GreaterThanOrEq
                    } else {
                        GreaterThan
                    };
                    return self.token(value);
                }
                '&' => {
                    if self.match_char('&') {
                        return self.token(And);
                    }
                    self.diagnostic_emitter
                        .error(self.line_num, "Expected '&' after '&'.");
                    self.has_error = true;
                    return None;
                }
                '|' => {
                    if self.match_char('|') {
                        return self.token(Or);
                    }
                    self.diagnostic_emitter
                        .error(self.line_num, "Expected '|' after '|'.");
                    self.has_error = true;
                    return None;
                }

                // Comments
                '/' => {
                    if self.match_char('/') {
                        while self.advance() != '\n' && !self.is_at_end() {}
                        self.line_num += 1;
                        continue;
                    }
                    if self.match_char('*') {
                        loop {
                            while !self.is_at_end() {
                                let c = self.advance();
                                if c == '\n' {
                                    self.line_num += 1;
                                }
                                if c == '*' {
                                    break;
                                }
                            }

                            if self.is_at_end() {
                                self.diagnostic_emitter
                                    .error(self.line_num, "Multiline comment not closed.");
                                self.has_error = true;
                                return None;
                            }

                            if self.advance() == '/' {
                                break;
                            }
                        }
                        continue;
                    }
                    return self.token(Slash);
                }

                // Negative numbers
                '-' => {
                    if self.peek().is_ascii_digit() {
                        return self.lex_number();
                    }
                    return self.token(Minus);
                }

                // String literals
                '"' => return self.lex_string(),

                c => {
                    if c.is_ascii_digit() {
                        return self.lex_number();
                    }
                    if c.is_ascii_alphabetic() || c == '_' {
                        let ident = self.lex_identifier();
                        let line_num = self.line_num;
                        let value = keyword(ident)
                            .unwrap_or_else(|| Id(self.identifiers.get_identifier(ident)));
                        return Some(Token {
                            value,
                            line_num: Location(line_num),
                        });
                    }
                    self.diagnostic_emitter.error(
                        self.line_num,
                        &format!(
                            "Unexpected token: '{}'.",
                            &self.source[self.start..self.current]
                        ),
                    );
                    self.has_error = true;
                    return None;
                }
            }
        }
    }

    fn lex_number(&mut self) -> Option<Token> {
        while self.peek().is_ascii_digit() {
            self.advance();
        }

        let value: i64 = self.source[self.start..self.current].parse().ok()?;

        self.token(Integer(value))
    }

    fn lex_string(&mut self) -> Option<Token> {
        while self.peek() != '"' {
            if self.is_at_end() || self.peek() == '\n' {
                self.diagnostic_emitter
                    .error(self.line_num, "String literal not closed.");
                self.has_error = true;
                return None;
            }
            self.advance();
        }
        self.advance();

        let value = self.source[self.start + 1..self.current - 1].to_owned();
        self.token(StrLiteral(value))
    }

    fn lex_identifier(&mut self) -> &'src str {
        while self.peek().is_ascii_alphanumeric() || self.peek() == '_' {
            self.advance();
        }

        &self.source[self.start..self.current]
    }

    fn is_at_end(&self) -> bool {
        self.current >= self.source.len()
    }

    fn peek(&self) -> char {
        self.source.as_bytes().get(self.current).map_or('\0', |&b| b as char)
    }

    fn advance(&mut self) -> char {
        let prev = self.peek();
        self.current += 1;
        prev
    }

    fn match_char(&mut self, expected: char) -> bool {
        if self.peek() == expected {
            self.current += 1;
            true
        } else {
            false
        }
    }
}
