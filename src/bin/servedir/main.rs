use clap::Parser as _;
use proc_exit::prelude::*;

mod args;
mod error;
mod serve;

fn main() {
    human_panic::setup_panic!();
    let result = run();
    proc_exit::exit(result);
}

fn run() -> proc_exit::ExitResult {
    let args = args::Args::parse();

    args.color.write_global();
    init_logging(args.verbose.log_level_filter());

    serve::run(&args).with_code(proc_exit::Code::FAILURE)?;

    Ok(())
}

fn init_logging(level: log::LevelFilter) {
    if level == log::LevelFilter::Off {
        return;
    }

    let mut builder = env_logger::Builder::new();
    builder.filter_level(level);
    builder.format(|f, record| {
        use std::io::Write as _;

        let level = format!("[{}]", record.level()).to_lowercase();
        writeln!(f, "{level:8} {}", record.args())
    });
    builder.init();
}
