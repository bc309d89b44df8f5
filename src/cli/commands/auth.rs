use clap::{Arg, ArgAction, Command};

pub fn with_args(command: Command) -> Command {
    let command = with_session_args(command);
    let command = with_google_args(command);
    with_role_args(command)
}

fn with_session_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("session-secret")
                .long("session-secret")
                .help("Secret keying the stored session token hashes")
                .env("VOICEFORGE_SESSION_SECRET")
                .default_value("dev-session-secret"),
        )
        .arg(
            Arg::new("session-ttl-seconds")
                .long("session-ttl-seconds")
                .help("Session inactivity window in seconds")
                .env("VOICEFORGE_SESSION_TTL_SECONDS")
                .default_value("604800")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new("session-store")
                .long("session-store")
                .help("Session store backend: memory (lost on restart) or postgres")
                .env("VOICEFORGE_SESSION_STORE")
                .default_value("memory"),
        )
        .arg(
            Arg::new("session-sweep-seconds")
                .long("session-sweep-seconds")
                .help("Period between sweeps of expired sessions")
                .env("VOICEFORGE_SESSION_SWEEP_SECONDS")
                .default_value("3600")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("production")
                .long("production")
                .help("Production mode: session cookies carry the Secure attribute")
                .env("VOICEFORGE_PRODUCTION")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("frontend-base-url")
                .long("frontend-base-url")
                .help("Frontend base URL used for the CORS origin")
                .env("VOICEFORGE_FRONTEND_BASE_URL")
                .default_value("http://localhost:5000"),
        )
}

fn with_google_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("google-client-id")
                .long("google-client-id")
                .help("Google OAuth client id; Google sign-in is disabled when unset")
                .env("VOICEFORGE_GOOGLE_CLIENT_ID"),
        )
        .arg(
            Arg::new("google-client-secret")
                .long("google-client-secret")
                .help("Google OAuth client secret")
                .env("VOICEFORGE_GOOGLE_CLIENT_SECRET"),
        )
        .arg(
            Arg::new("google-redirect-uri")
                .long("google-redirect-uri")
                .help("Redirect URI registered with the OAuth client")
                .env("VOICEFORGE_GOOGLE_REDIRECT_URI")
                .default_value("http://localhost:5000/auth/google/callback"),
        )
}

fn with_role_args(command: Command) -> Command {
    command.arg(
        Arg::new("admin-emails")
            .long("admin-emails")
            .help("Comma-separated emails granted the admin role on login")
            .env("VOICEFORGE_ADMIN_EMAILS")
            .default_value(""),
    )
}
