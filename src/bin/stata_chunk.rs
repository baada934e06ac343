//! Reads source from stdin and prints its completeness and assembled chunk.
//!
//! Usage: `stata-chunk [--delimit] [--cache DIR] < code.do`

use std::io::Read;
use std::process::ExitCode;

use stata_engine::cache::CachePaths;
use stata_engine::chunk::{
    AssemblerSettings, SessionContext, SourceAnalysis, assemble, check_complete,
};
use stata_engine::lexer::DelimiterMode;
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let mut mode = DelimiterMode::Newline;
    let mut cache = String::from("/tmp/stata_kernel_cache");
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--delimit" => mode = DelimiterMode::SEMICOLON,
            "--cache" => match args.next() {
                Some(dir) => cache = dir,
                None => {
                    error!("--cache needs a directory");
                    return ExitCode::from(2);
                }
            },
            other => {
                error!(argument = other, "unknown argument");
                return ExitCode::from(2);
            }
        }
    }

    let mut code = String::new();
    if let Err(err) = std::io::stdin().read_to_string(&mut code) {
        error!(%err, "failed to read stdin");
        return ExitCode::FAILURE;
    }

    let verdict = check_complete(&code, mode);
    println!("complete: {}", verdict.is_complete());
    if let Some(reason) = verdict.incomplete {
        println!("reason: {reason:?}");
        return ExitCode::SUCCESS;
    }
    println!("next delimiter: {:?}", verdict.next_mode);

    let analysis = SourceAnalysis::new(&code, mode);
    let settings = AssemblerSettings::new(CachePaths::new(cache));
    let mut context = SessionContext {
        delimiter_mode: mode,
        plot_counter: 0,
    };
    let chunk = assemble(&analysis, &settings, &mut context);
    debug!(plots = chunk.plots_injected, "assembled");

    println!("indirect: {}", chunk.requires_indirection);
    println!("fingerprint: {}", chunk.fingerprint);
    println!("--- body");
    for line in &chunk.body {
        println!("{line}");
    }
    println!("--- submission");
    println!("{}", chunk.submission);
    ExitCode::SUCCESS
}
