use std::env;
use std::process;
use tiger::compiler;
use tiger::symbol;

fn main() {
    env_logger::init();

    let command = compiler::Command::new();
    let status = match command.run(env::args()) {
        Ok(output) => {
            print!("{}", output);
            0
        }
        Err(err) => {
            eprintln!("{}", err);
            1
        }
    };

    symbol::release_all();
    process::exit(status);
}
