use kava_lib::{
    analysis::{AnalysisOptions, analyze},
    lexer::Lexer,
    parser::Parser,
    render::render_facts,
};
use clap::Parser as CommandLineParser;
use utils::DiagnosticEmitter;

#[derive(Debug, CommandLineParser, Default)]
#[command(name = "kava", version, about = "Analyze Kava programs.")]
pub struct Opt {
    /// Dump the parsed program model.
    #[arg(long)]
    pub dump_model: bool,

    /// Print the derived facts for every class, field, method, and parameter.
    #[arg(long)]
    pub summary: bool,

    /// Ceiling on the number of fixpoint iterations.
    #[arg(long, value_name = "N")]
    pub max_iterations: Option<usize>,

    /// File containing the program written in the language.
    pub filename: String,
}

pub fn process_source(src: &str, diag: &mut DiagnosticEmitter, opts: &Opt) -> Option<()> {
    let lexer = Lexer::new(src, diag);
    let tokens = lexer.lex_all();
    if tokens.tokens.is_empty() {
        return None;
    }
    let parser = Parser::new(tokens, diag);
    let unit = parser.parse()?;

    if opts.dump_model {
        diag.out(&unit.print());
    }

    let options = AnalysisOptions {
        max_iterations: opts
            .max_iterations
            .unwrap_or(AnalysisOptions::default().max_iterations),
    };
    let result = analyze(&unit, &options);
    diag.out(&result.diagnostics.render());

    if opts.summary {
        diag.out(&render_facts(&unit, &result));
    }

    if result.diagnostics.has_errors() {
        return None;
    }

    Some(())
}

#[cfg(test)]
mod driver_tests;
