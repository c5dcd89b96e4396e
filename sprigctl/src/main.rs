use anyhow::{Context, Result};
use clap::{arg, command, ArgMatches};
use lilt::{Lilt, Val};
use sprig::interrupt::{self, Interrupter};
use sprig::{report, BufLines, CancellationBridge, Config, Globals, LineReader, Output, Session};
use std::io::{self, IsTerminal};
use std::process::ExitCode;
use tokio::runtime::Runtime;
use tracing::debug;
use tracing_subscriber::EnvFilter;

mod editor;

/// The clap CLI interface
fn cli() -> clap::Command {
    command!()
        .arg(arg!([FILE] "Execute FILE instead of starting the REPL"))
        .arg(arg!(command: -c --command <COMMAND> "If present, COMMAND is evaluated and program exits"))
        .arg(arg!(--showenv "Print the final global environment to stderr"))
        .arg(arg!(--prompt <PROMPT> "Primary prompt"))
        .arg(arg!(--continuation <PROMPT> "Prompt while a block is being typed"))
}

/// Prompts given on the command line, over `Config::default()`
fn config(args: &ArgMatches) -> Config {
    let mut config = Config::default();
    if let Some(prompt) = args.get_one::<String>("prompt") {
        config.prompt = prompt.clone();
    }
    if let Some(continuation) = args.get_one::<String>("continuation") {
        config.continuation = continuation.clone();
    }
    config
}

/// Forward Control-C to the interrupt channel for as long as the runtime lives
fn forward_interrupts(rt: &Runtime, interrupter: Interrupter) {
    rt.spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            debug!("SIGINT");
            interrupter.interrupt();
        }
    });
}

/// Print bindings not starting with `_`, sorted by name
fn show_env(globals: &Globals<Val>) {
    for (name, value) in globals.iter().filter(|(name, _)| !name.starts_with('_')) {
        eprintln!("{name} = {value}");
    }
}

/// Execute a file as a top-level program with its own loader
fn run_file(engine: &Lilt, bridge: &CancellationBridge, file: &str, showenv: bool) -> ExitCode {
    let eval = bridge.begin();
    let result = sprig::exec_file(engine, file, eval.token());
    eval.finish();
    match result {
        Ok(globals) => {
            if showenv {
                show_env(&globals);
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            report::print_error(&mut io::stderr(), Some(&e));
            ExitCode::FAILURE
        }
    }
}

/// Run an interactive REPL
fn run_repl(session: &mut Session<Lilt>) -> Result<()> {
    let mut lines: Box<dyn LineReader> = if io::stdin().is_terminal() {
        println!("Welcome to Lilt (sprig {})", env!("CARGO_PKG_VERSION"));
        Box::new(editor::ReplEditor::new().context("Failed to start line editor")?)
    } else {
        Box::new(BufLines::new(io::stdin().lock(), false))
    };
    session.run(lines.as_mut())?;
    Ok(())
}

fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();
    let args = cli().get_matches();

    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .build()
        .context("Failed to start runtime")?;
    let (interrupter, interrupts) = interrupt::channel();
    forward_interrupts(&rt, interrupter);
    let bridge = CancellationBridge::new(interrupts, rt.handle().clone());
    let engine = Lilt::new();
    let showenv = args.get_flag("showenv");

    if let Some(file) = args.get_one::<String>("FILE") {
        return Ok(run_file(&engine, &bridge, file, showenv));
    }

    let mut session = Session::new(engine, bridge)
        .with_config(config(&args))
        .with_output(Output::stdio());

    match args.get_one::<String>("command") {
        Some(cmd) => {
            if let Err(e) = session.eval_str(cmd) {
                report::print_error(&mut io::stderr(), Some(&e));
                return Ok(ExitCode::FAILURE);
            }
        }
        None => run_repl(&mut session)?,
    }

    if showenv {
        show_env(session.globals());
    }
    Ok(ExitCode::SUCCESS)
}
