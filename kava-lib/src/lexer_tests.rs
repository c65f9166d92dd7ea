use super::lexer::*;
use utils::DiagnosticEmitter;

#[derive(Debug)]
struct LexTestResult {
    output: std::string::String,
    result: LexResult,
}

fn lex_string(source: &str) -> LexTestResult {
    let mut diag = DiagnosticEmitter::log_to_buffer();
    let lexer = Lexer::new(source, &mut diag);
    let tokens = lexer.lex_all();
    LexTestResult {
        output: diag.out_buffer().unwrap() + &diag.err_buffer().unwrap(),
        result: tokens,
    }
}

fn to_token_values(tokens: Vec<Token>) -> Vec<TokenValue> {
    tokens.into_iter().map(|tok| tok.value).collect()
}

use TokenValue::*;

#[test]
fn test_empty_input() {
    let LexTestResult { output, result } = lex_string("");
    let expected = vec![EndOfFile];

    assert_eq!(to_token_values(result.tokens), expected);
    assert_eq!(output, "");

    let LexTestResult { output, result } = lex_string("  \n\t\n");
    let expected = vec![EndOfFile];

    assert_eq!(to_token_values(result.tokens), expected);
    assert_eq!(output, "");
}

#[test]
fn test_all_tokens() {
    let LexTestResult { output, result } = lex_string(
        r#"ident 50 -50 "text" class constructor if else while for return throw
           break continue new this null true false int bool str void list
           = == != < > <= >= + - * / % ! && || ? ( ) { } [ ] ; : , ."#,
    );
    let expected = vec![
        Id(Identifier(0)),
        Integer(50),
        Integer(-50),
        StrLiteral("text".to_owned()),
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
        Int,
        Bool,
        Str,
        Void,
        List,
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
    ];

    assert_eq!(to_token_values(result.tokens), expected);
    assert_eq!(result.identifiers.0, vec!["ident"]);
    assert_eq!(output, "");
}

#[test]
fn test_identifiers_deduplicated() {
    let LexTestResult { output, result } = lex_string("first second first _third");
    let expected = vec![
        Id(Identifier(0)),
        Id(Identifier(1)),
        Id(Identifier(0)),
        Id(Identifier(2)),
        EndOfFile,
    ];

    assert_eq!(to_token_values(result.tokens), expected);
    assert_eq!(result.identifiers.0, vec!["first", "second", "_third"]);
    assert_eq!(output, "");
}

#[test]
fn test_comments() {
    let LexTestResult { output, result } = lex_string(
        "// a line comment\nident /* a multi\nline comment */ other",
    );
    let expected = vec![Id(Identifier(0)), Id(Identifier(1)), EndOfFile];

    assert_eq!(to_token_values(result.tokens), expected);
    assert_eq!(result.identifiers.0, vec!["ident", "other"]);
    assert_eq!(output, "");
}

#[test]
fn test_negative_numbers() {
    let LexTestResult { output, result } = lex_string("5-3 - 2 -7");
    let expected = vec![
        Integer(5),
        Integer(-3),
        Minus,
        Integer(2),
        Integer(-7),
        EndOfFile,
    ];

    assert_eq!(to_token_values(result.tokens), expected);
    assert_eq!(output, "");
}

#[test]
fn test_strings() {
    let LexTestResult { output, result } = lex_string(r#""hello" """#);
    let expected = vec![
        StrLiteral("hello".to_owned()),
        StrLiteral("".to_owned()),
        EndOfFile,
    ];

    assert_eq!(to_token_values(result.tokens), expected);
    assert_eq!(output, "");
}

#[test]
fn test_line_numbers() {
    let LexTestResult { output, result } = lex_string("class\nA\n{\n}");
    let lines: Vec<u32> = result.tokens.iter().map(|tok| tok.line_num.0).collect();

    assert_eq!(lines, vec![1, 2, 3, 4, 4]);
    assert_eq!(output, "");
}

#[test]
fn test_errors() {
    let LexTestResult { output, result } = lex_string("#");
    assert!(result.tokens.is_empty());
    assert_eq!(output, "[line 1] Error : Unexpected token: '#'.\n");

    let LexTestResult { output, result } = lex_string("&");
    assert!(result.tokens.is_empty());
    assert_eq!(output, "[line 1] Error : Expected '&' after '&'.\n");

    let LexTestResult { output, result } = lex_string("|");
    assert!(result.tokens.is_empty());
    assert_eq!(output, "[line 1] Error : Expected '|' after '|'.\n");

    let LexTestResult { output, result } = lex_string("/* not closed");
    assert!(result.tokens.is_empty());
    assert_eq!(output, "[line 1] Error : Multiline comment not closed.\n");

    let LexTestResult { output, result } = lex_string("\"not closed");
    assert!(result.tokens.is_empty());
    assert_eq!(output, "[line 1] Error : String literal not closed.\n");

    let LexTestResult { output, result } = lex_string("némo");
    assert!(result.tokens.is_empty());
    assert_eq!(output, "[line 1] Error : Only ASCII input is supported.\n");
}
