//! the main compiler binary. takes a source file, an optional emission
//! stage, and optimization flags.
//!
//! run with `--help` for more info.

use cflat::{back, front, middle};

use clap::{Parser, ValueEnum};

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
struct Args {
    /// the input file
    file: String,
    /// what to emit
    #[arg(value_enum, short, long, default_value_t = Emit::Asm)]
    emit: Emit,
    /// turn on optimizations (reserved; no optimization passes run yet)
    #[arg(short = 'O', default_value_t = false)]
    optimize: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, ValueEnum)]
enum Emit {
    /// the list of tokens
    Tokens,
    /// the resolved ast
    Ast,
    /// three-address code
    Tac,
    /// the basic-block cfg, with liveness annotations
    Cfg,
    /// the resulting assembly code
    Asm,
}

fn main() {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let _ = args.optimize;

    let input = match std::fs::read_to_string(&args.file) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("{}: {e}", args.file);
            std::process::exit(1);
        }
    };

    let code = run(&args, &input);
    std::process::exit(code);
}

fn parse_and_resolve(input: &str) -> Result<front::Program, cflat::Error> {
    let ast = front::parse(input)?;
    let program = front::resolve(ast)?;
    Ok(program)
}

fn run(args: &Args, input: &str) -> i32 {
    use Emit::*;

    match args.emit {
        Tokens => {
            let mut lexer = front::lex::Lexer::new(input);
            match lexer.tokenize() {
                Ok(tokens) => {
                    for token in tokens {
                        println!("{token}");
                    }
                    0
                }
                Err(e) => report(e),
            }
        }
        Ast => match parse_and_resolve(input) {
            Ok(program) => {
                println!("{program:#?}");
                0
            }
            Err(e) => report(e),
        },
        Tac => match parse_and_resolve(input) {
            Ok(program) => {
                let tac = middle::build(&program);
                for f in &tac.functions {
                    println!("{}:", f.name);
                    for instr in &f.instrs {
                        println!("  {instr}");
                    }
                }
                0
            }
            Err(e) => report(e),
        },
        Cfg => match parse_and_resolve(input) {
            Ok(program) => {
                let tac = middle::build(&program);
                for f in &tac.functions {
                    let cfg = middle::cfg::build(f);
                    println!("{}:", f.name);
                    for block in cfg.iter() {
                        println!("  block {} ({:?})", block.id, block.kind);
                        for loc in &block.locs {
                            println!("    {} # live_in={:?} live_out={:?}", loc.instr, loc.live_in, loc.live_out);
                        }
                    }
                }
                0
            }
            Err(e) => report(e),
        },
        Asm => match parse_and_resolve(input) {
            Ok(program) => {
                let tac = middle::build(&program);
                println!("{}", back::assemble(&tac));
                0
            }
            Err(e) => report(e),
        },
    }
}

fn report(e: impl std::fmt::Display) -> i32 {
    eprintln!("error: {e}");
    1
}
