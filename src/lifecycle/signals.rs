//! OS signal handling.
//!
//! SIGINT and SIGTERM both mean "shut down gracefully".

use std::io;

/// Resolves on the first SIGINT or SIGTERM.
pub async fn wait_for_termination() -> io::Result<&'static str> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut terminate = signal(SignalKind::terminate())?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => result.map(|_| "SIGINT"),
            _ = terminate.recv() => Ok("SIGTERM"),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await.map(|_| "ctrl-c")
    }
}
