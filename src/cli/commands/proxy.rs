use clap::{Arg, Command};

pub fn with_args(command: Command) -> Command {
    command.arg(
        Arg::new("upstream-api-url")
            .long("upstream-api-url")
            .help("Base URL of the vendor synthesis API proxied under /api")
            .env("VOICEFORGE_UPSTREAM_API_URL")
            .default_value("http://localhost:8000"),
    )
}
