use super::Parser;
use clap::Subcommand;

#[derive(Parser, Debug)]
#[command(name = "backoffice", about = "Authenticated client for the back-office API")]
pub struct Cli {
    #[arg(long)]
    pub settings: Option<String>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Log in and store the session's tokens.
    Login {
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
    },
    /// Revoke the refresh token and forget the session.
    Logout,
    /// Report whether a session is stored.
    Status,
    /// Send one request with the stored session, e.g. `request get orders`.
    Request {
        method: String,
        path: String,
        /// JSON request body.
        #[arg(long)]
        json: Option<String>,
        /// Log in first (needed with the in-memory credential store).
        #[arg(long, requires = "password")]
        username: Option<String>,
        #[arg(long, requires = "username")]
        password: Option<String>,
    },
}

/// Options of the sandbox backend binary.
#[derive(Parser, Debug)]
#[command(name = "backoffice-sandbox", about = "Local stand-in for the back-office API")]
pub struct SandboxCli {
    #[arg(long)]
    pub settings: Option<String>,
}
