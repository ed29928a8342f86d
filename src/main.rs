use std::fs;
use std::process;

use clap::{Parser as ClapParser, Subcommand};
use colored::Colorize;

use matiria::bytecode::disassemble;
use matiria::runtime::{natives, Engine};
use matiria::source::compile;
use matiria::value::{Object, Value};

#[derive(ClapParser)]
#[command(name = "matiria", about = "The Matiria compiler and virtual machine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile and execute a Matiria source file
    Run { file: String },
    /// Parse and type-check without executing
    Check { file: String },
    /// Disassemble every compiled chunk
    Dump { file: String },
}

fn main() {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Run { file } => cmd_run(file),
        Commands::Check { file } => cmd_check(file),
        Commands::Dump { file } => cmd_dump(file),
    }
}

fn read_file(path: &str) -> String {
    match fs::read_to_string(path) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("{}", format!("Cannot open file '{path}': {e}").red());
            process::exit(1);
        }
    }
}

fn cmd_run(file: &str) {
    let source = read_file(file);

    let mut package = match compile(&source) {
        Ok(package) => package,
        Err(e) => {
            eprintln!("{}", e.to_string().red());
            process::exit(e.exit_code());
        }
    };

    natives::register_defaults(&mut package);

    let mut engine = Engine::new();
    if let Err(e) = engine.execute(&package) {
        eprintln!("{}", e.to_string().red());
        process::exit(3);
    }
}

fn cmd_check(file: &str) {
    let source = read_file(file);

    match compile(&source) {
        Ok(_) => {
            println!("{} {}", "✓".green(), file);
        }
        Err(e) => {
            eprintln!("{}", e.to_string().red());
            process::exit(e.exit_code());
        }
    }
}

fn cmd_dump(file: &str) {
    let source = read_file(file);

    let package = match compile(&source) {
        Ok(package) => package,
        Err(e) => {
            eprintln!("{}", e.to_string().red());
            process::exit(e.exit_code());
        }
    };

    for global in &package.globals {
        if let Value::Obj(object) = global {
            if let Object::Function(function) = object.as_ref() {
                print!("{}", disassemble(&function.chunk, &function.name));
                println!();
            }
        }
    }
}
