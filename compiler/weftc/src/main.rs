//! The Weft driver CLI.
//!
//! There is no surface parser in this workspace (parsing text into
//! [`weft_ir::Stmt`] is out of scope here), so this binary can't yet take
//! a `.weft` file on the command line. It exposes the host properties
//! (spec §4.7's hybrid/trace-inliner/max-inline-passes knobs) and a
//! `demo` command that runs the canonical REPL session from spec §6
//! through the full pipeline, to prove the driver end to end.

use clap::{Parser, Subcommand};
use weftc::Session;

mod tracing_setup;

#[derive(Parser)]
#[command(name = "weftc", version, about = "The Weft interpreter driver")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the spec §6 REPL example through the pipeline and print its wire output.
    Demo,
    /// Print the host version.
    Version,
}

fn main() {
    tracing_setup::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Demo => demo(),
        Commands::Version => println!("weftc {}", env!("CARGO_PKG_VERSION")),
    }
}

fn demo() {
    use weft_ir::{Decl, Expr, ExprKind, Literal, Pattern, PatternKind, Pos, Stmt};

    let mut session = Session::new();
    let x = session.eval_mut().interner.intern("x");
    let plus = session.eval_mut().interner.intern("+");
    let it = session.eval_mut().interner.intern("it");

    let ident = |name| Expr { kind: ExprKind::Ident(name), pos: Pos::DUMMY };
    let int_lit = |n| Expr { kind: ExprKind::Literal(Literal::Int(n)), pos: Pos::DUMMY };
    let var_pat = |name| Pattern { kind: PatternKind::Var(name), pos: Pos::DUMMY };

    let stmts = [
        Stmt::Decl(Decl::Value { pat: var_pat(x), rhs: int_lit(5), pos: Pos::DUMMY }),
        Stmt::Expr(ident(x)),
        Stmt::Expr(Expr { kind: ExprKind::Infix(plus, Box::new(ident(it)), Box::new(int_lit(1))), pos: Pos::DUMMY }),
    ];

    for stmt in &stmts {
        match session.run_stmt(stmt) {
            Ok(outcome) => {
                for line in &outcome.lines {
                    print!("{line}");
                }
                for warning in &outcome.warnings {
                    eprintln!("{}", warning.display(&session.eval().interner));
                }
            }
            Err(err) => {
                eprintln!("{}", err.into_diagnostic().display(&session.eval().interner));
                std::process::exit(2);
            }
        }
    }
}
