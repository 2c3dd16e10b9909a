//! `parajit`: a demonstration CLI that exercises the compiler core from
//! the outside the way a real dispatch wrapper would -- specialize and
//! optimize one of the built-in example programs, then run it through
//! the reference backend/runtime in `parajit-runtime`.
//!
//! A `clap`-derived `Cli`/`Commands` pair, a `tracing-subscriber::fmt`
//! subscriber installed in `main`, and a `run_*` function per subcommand
//! returning a process exit code rather than panicking.

mod error;
mod examples;

use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use serde_json::json;

use error::CliError;
use parajit_ir::Function;

/// Just-in-time array-parallel compiler core -- demonstration CLI.
#[derive(Parser)]
#[command(name = "parajit", about = "parajit compiler core demo CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the built-in example programs this binary can run.
    List,
    /// Specialize, optimize, and execute one example program.
    Run {
        #[arg(value_enum)]
        example: Example,

        /// Integer argument for the scalar examples that take one
        /// (`inline-chain`, `const-fold`).
        #[arg(long)]
        x: Option<i64>,

        /// Boolean argument for `branch-const`.
        #[arg(long)]
        cond: Option<bool>,

        /// Comma-separated input array for the adverb examples
        /// (`map-double`, `reduce-sum`).
        #[arg(long, value_delimiter = ',', default_value = "1,2,3,4,5,6")]
        input: Vec<i64>,

        /// Number of reference-runtime worker threads to dispatch the
        /// adverb examples across.
        #[arg(long, default_value_t = 4)]
        workers: usize,

        /// Print the optimized typed IR as JSON before the result.
        #[arg(long)]
        print_ir: bool,
    },
}

/// One built-in example per end-to-end optimization scenario, plus the
/// two adverb demos grounded in `adverb.rs`'s own unit tests.
#[derive(Clone, Copy, ValueEnum)]
enum Example {
    InlineChain,
    ConstFold,
    BranchConst,
    AlwaysTrueBranch,
    AlwaysFalseBranch,
    VolatileLoop,
    MapDouble,
    ReduceSum,
}

impl Example {
    fn describe(self) -> &'static str {
        match self {
            Example::InlineChain => "A(x)=x+1, B(x)=A(x), C(x)=B(x) -- optimize(C) collapses the call chain",
            Example::ConstFold => "f(x): y=4*1; z=y+1; a=z/5; b=x*a; return b -- folds to return x",
            Example::BranchConst => "g(b): if b then x=1 else x=1; return x -- phi-collapses to return 1",
            Example::AlwaysTrueBranch => "h(): x=1+1; if x==2 then return 0+0 else return 1*1+0 -- collapses to return 0",
            Example::AlwaysFalseBranch => "x=1+2; if x==2 then return 0 else return 1 -- collapses to return 1",
            Example::VolatileLoop => "a loop rebuilding an array on its back edge is not hoisted by CSE",
            Example::MapDouble => "map(double, input) synthesized into a parallel work function and dispatched",
            Example::ReduceSum => "reduce(identity, add, input, init=0) dispatched and combined across workers",
        }
    }
}

fn main() {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let exit_code = match cli.command {
        Commands::List => run_list(),
        Commands::Run {
            example,
            x,
            cond,
            input,
            workers,
            print_ir,
        } => run_example(example, x, cond, input, workers, print_ir),
    };
    process::exit(exit_code);
}

fn run_list() -> i32 {
    for example in [
        Example::InlineChain,
        Example::ConstFold,
        Example::BranchConst,
        Example::AlwaysTrueBranch,
        Example::AlwaysFalseBranch,
        Example::VolatileLoop,
        Example::MapDouble,
        Example::ReduceSum,
    ] {
        println!("{:<20} -- {}", example.to_possible_value().unwrap().get_name(), example.describe());
    }
    0
}

fn run_example(example: Example, x: Option<i64>, cond: Option<bool>, input: Vec<i64>, workers: usize, print_ir: bool) -> i32 {
    let outcome = match example {
        Example::InlineChain => examples::inline_chain(x.unwrap_or(1)).map(|r| (r.optimized, r.result)),
        Example::ConstFold => examples::const_fold(x.unwrap_or(1)).map(|r| (r.optimized, r.result)),
        Example::BranchConst => examples::branch_const(cond.unwrap_or(true)).map(|r| (r.optimized, r.result)),
        Example::AlwaysTrueBranch => examples::always_true_branch().map(|r| (r.optimized, r.result)),
        Example::AlwaysFalseBranch => examples::always_false_branch().map(|r| (r.optimized, r.result)),
        Example::VolatileLoop => examples::volatile_loop().map(|r| (r.optimized, r.result)),
        Example::MapDouble => examples::map_double(input, workers).map(|r| (r.work_function, r.result)),
        Example::ReduceSum => examples::reduce_sum(input, workers).map(|r| (r.work_function, r.result)),
    };

    match outcome {
        Ok((function, result)) => {
            if print_ir {
                print_ir_json(&function);
            }
            println!("{:?}", result);
            0
        }
        Err(err) => {
            eprintln!("Error: {err}");
            exit_code_for(&err)
        }
    }
}

fn print_ir_json(function: &Function) {
    let rendered = serde_json::to_value(function).unwrap_or_else(|e| json!({"error": e.to_string()}));
    match serde_json::to_string_pretty(&rendered) {
        Ok(text) => println!("{text}"),
        Err(e) => eprintln!("warning: failed to render IR as JSON: {e}"),
    }
}

/// Exit code: 0 success, 1 compiler-core error (inference/pipeline), 2
/// runtime/dispatch error, 3 bad CLI input -- a distinct code per failure
/// boundary.
fn exit_code_for(err: &CliError) -> i32 {
    match err {
        CliError::Compiler(_) => 1,
        CliError::Runtime(_) => 2,
        CliError::InvalidInput(_) => 3,
    }
}
