use clap::Parser;
use std::io::{self, IsTerminal};
use std::process::ExitCode;
use tracing::{error, Level};
use tracing_subscriber::EnvFilter;
use usercopy::cli::Cli;
use usercopy::copy_user::summary;
use usercopy::executor::ssh::SshExecutor;

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(&cli) {
        Ok(code) => code,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<ExitCode> {
    let config = cli.config()?;
    let mut resolver = cli.conflict_policy();
    let mut executor = SshExecutor::new(&config);

    // One thread: targets are processed strictly one after another, and ssh may need the terminal
    // for a password at any point.
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let summary = runtime.block_on(usercopy::copy_user(
        &config,
        &mut executor,
        resolver.as_mut(),
    ))?;

    summary::write_summary(io::stdout().lock(), &summary)?;

    if cli.strict && summary.any_failed() {
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

fn init_logging(verbose: bool) {
    let level = match verbose {
        true => Level::DEBUG,
        false => Level::INFO,
    };
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .with_target(false)
        .without_time()
        .init();
}
