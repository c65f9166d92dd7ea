use utils::DiagnosticEmitter;

use crate::analysis::{AnalysisOptions, AnalysisResult, analyze};
use crate::lexer::Lexer;
use crate::parser::Parser;
use crate::sema::Unit;

pub fn captured_output(diag: &DiagnosticEmitter) -> String {
    diag.out_buffer().unwrap() + &diag.err_buffer().unwrap()
}

pub fn parse_string(source: &str) -> Result<Unit, String> {
    let mut diag = DiagnosticEmitter::log_to_buffer();
    let lexer = Lexer::new(source, &mut diag);
    let tokens = lexer.lex_all();
    if tokens.tokens.is_empty() {
        return Err(captured_output(&diag));
    }
    let parser = Parser::new(tokens, &mut diag);
    let Some(unit) = parser.parse()
    else {
        return Err(captured_output(&diag));
    };
    Ok(unit)
}

pub fn analyze_string(source: &str) -> (Unit, AnalysisResult) {
    analyze_with(source, &AnalysisOptions::default())
}

pub fn analyze_with(source: &str, options: &AnalysisOptions) -> (Unit, AnalysisResult) {
    let unit = parse_string(source).expect("test program must parse");
    let result = analyze(&unit, options);
    (unit, result)
}
