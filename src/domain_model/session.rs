use std::fmt;

/// Session lifecycle notifications published to the application shell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    LoggedIn,
    Refreshed,
    LoggedOut,
    /// Credentials were cleared after an unrecoverable refresh failure; the
    /// shell should send the user back to the login view.
    Expired,
}

impl fmt::Display for SessionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionEvent::LoggedIn => "logged_in",
            SessionEvent::Refreshed => "refreshed",
            SessionEvent::LoggedOut => "logged_out",
            SessionEvent::Expired => "expired",
        };
        f.write_str(name)
    }
}
