use colored::Colorize;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use xsd_osi::cli::CommandLineInterface;

fn main() {
    let command_line_interface = CommandLineInterface::load();

    // RUST_LOG wins over -v/--trace
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(command_line_interface.log_filter())))
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .init();

    if let Err(error) = command_line_interface.run() {
        let kind = error
            .chain()
            .find_map(|cause| cause.downcast_ref::<xsd_osi::Error>())
            .map_or("Error", xsd_osi::Error::kind);
        eprintln!("{} {error:#}", format!("{kind}:").red().bold());
        std::process::exit(1);
    }
}
