use crate::config::Config;
use crate::console::When;

pub enum DaemonEvent {
    /// The user reported that an event happened.
    EventRecorded { kind: String, when: When },
    /// The user asked for the current status on the console.
    StatusRequested,
    /// The config file changed on disk and was successfully re-parsed.
    ConfigReloaded(Config),
    /// Ctrl+C or `quit`; the daemon should stop its tasks and exit.
    Shutdown,
}
