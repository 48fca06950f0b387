//! The command-line driver: reads a program from a file or stdin, runs it
//! through the front end, and reports the program's type or the first
//! diagnostic.
use clap::{App, Arg};
use io::Read;
use log::debug;
use std::fs;
use std::io;

use super::CompilerError;
use crate::semantic::Analyzer;
use crate::syntax::Parser;

#[derive(Debug)]
pub struct CompilerOptions {
    filepath: Option<String>,
}

#[derive(Debug, Default)]
pub struct Command {}

impl Command {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn run(
        &self,
        args: impl ExactSizeIterator<Item = String>,
    ) -> Result<String, CompilerError> {
        let options = parse_options(args);

        let src = if let Some(ref filepath) = options.filepath {
            debug!("reading {}", filepath);
            read_from_file(filepath)?
        } else {
            debug!("reading stdin");
            read_from_stdin()?
        };

        compile(&src)
    }
}

fn compile(src: &str) -> Result<String, CompilerError> {
    let expr = Parser::parse_string(src)?;
    debug!("parsed");

    let ty = Analyzer::with_prelude().analyze(&expr)?;
    debug!("analyzed: {}", ty);

    Ok(format!("{}\n", ty))
}

fn parse_options(args: impl ExactSizeIterator<Item = String>) -> CompilerOptions {
    let matches = App::new("tiger")
        .about("Type checks a Tiger program")
        .arg(
            Arg::with_name("INPUT")
                .help("Sets the input file to use; stdin if omitted")
                .required(false)
                .index(1),
        )
        .get_matches_from(args);

    CompilerOptions {
        filepath: matches.value_of("INPUT").map(str::to_string),
    }
}

fn read_from_stdin() -> Result<String, io::Error> {
    let mut content = String::new();

    io::stdin().read_to_string(&mut content)?;

    Ok(content)
}

fn read_from_file(filename: &str) -> io::Result<String> {
    fs::read_to_string(filename)
}
