use std::{
    error::Error,
    fs,
    io::{self, Read, Write},
    path::PathBuf,
    process::{Command, ExitCode},
};

use clap::Parser;
use tern::{compile, Stage};

/// Compiler for the tern language.
#[derive(Parser)]
#[command(name = "ternc", version)]
struct Args {
    /// Print the token stream and stop.
    #[arg(long, group = "mode")]
    tokens: bool,

    /// Print the parse tree and stop.
    #[arg(long, group = "mode")]
    ast: bool,

    /// Print the normalized tree and stop.
    #[arg(long, group = "mode")]
    anf: bool,

    /// Print the generated C source and stop.
    #[arg(long, group = "mode")]
    csource: bool,

    /// Compile to an object file via the system C compiler.
    #[arg(long, group = "mode")]
    object: bool,

    /// Directory holding the runtime header, forwarded to the C compiler.
    #[arg(short = 'I', long, value_name = "DIR")]
    include: Option<PathBuf>,

    /// Echo external commands as they run.
    #[arg(short, long)]
    verbose: bool,

    /// Source file; stdin when absent.
    file: Option<PathBuf>,
}

impl Args {
    fn stage(&self) -> Stage {
        if self.tokens {
            Stage::Tokens
        } else if self.ast {
            Stage::Ast
        } else if self.anf {
            Stage::Anf
        } else {
            Stage::CSource
        }
    }
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("ternc: {error}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<(), Box<dyn Error>> {
    let source = match &args.file {
        Some(path) => fs::read_to_string(path)?,
        None => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };

    let output = compile(&source, args.stage())?;
    if args.object {
        build_object(args, &output)
    } else {
        io::stdout().write_all(output.as_bytes())?;
        Ok(())
    }
}

/// Writes the generated C next to the input and hands it to `cc`.
fn build_object(args: &Args, csource: &str) -> Result<(), Box<dyn Error>> {
    let path = args
        .file
        .as_ref()
        .ok_or("--object requires a source file argument")?;
    let c_path = path.with_extension("c");
    let o_path = path.with_extension("o");
    fs::write(&c_path, csource)?;

    let mut cmd = Command::new("cc");
    cmd.arg("-c").arg("-o").arg(&o_path);
    if let Some(dir) = &args.include {
        cmd.arg("-I").arg(dir);
    }
    cmd.arg(&c_path);
    if args.verbose {
        let rendered: Vec<_> = std::iter::once(cmd.get_program())
            .chain(cmd.get_args())
            .map(|s| s.to_string_lossy().into_owned())
            .collect();
        println!("{}", rendered.join(" "));
    }
    let status = cmd.status()?;
    if !status.success() {
        return Err(format!("cc exited with {status}").into());
    }
    Ok(())
}
