//! Server management - spawning and health checking the game's web server

use std::process::{Child, Command, Stdio};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::{E2eError, E2eResult};
use crate::wait::Poll;

/// Handle to a running server process
pub struct ServerHandle {
    child: Child,
    pub health_url: String,
}

impl ServerHandle {
    /// Spawn the server command and wait until it answers HTTP requests
    pub async fn spawn(config: ServerConfig) -> E2eResult<Self> {
        info!("Spawning web server: {}", config.command);

        // `exec` so the signal in `stop` reaches the server itself, not sh
        let child = Command::new("sh")
            .arg("-c")
            .arg(format!("exec {}", config.command))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                E2eError::ServerStartup(format!("Failed to spawn '{}': {}", config.command, e))
            })?;

        let mut handle = ServerHandle {
            child,
            health_url: config.health_url.clone(),
        };

        handle.wait_for_healthy(config.health_poll).await?;

        info!("Server is healthy at {}", handle.health_url);
        Ok(handle)
    }

    /// Wait for the server to answer with a success status. A server
    /// process that has already exited fails at once.
    async fn wait_for_healthy(&mut self, poll: Poll) -> E2eResult<()> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(2))
            .build()?;
        let child = &mut self.child;
        let health_url = self.health_url.as_str();

        let mut attempts = 0;
        let healthy = poll
            .until(|| {
                attempts += 1;
                let attempt = attempts;
                let exited = child.try_wait();
                let request = client.get(health_url).send();
                async move {
                    if let Some(status) = exited? {
                        return Err(E2eError::ServerStartup(format!(
                            "server exited with {} before answering",
                            status
                        )));
                    }
                    match request.await {
                        Ok(resp) if resp.status().is_success() => return Ok(true),
                        Ok(resp) => warn!("Health check returned {}", resp.status()),
                        Err(e) if e.is_connect() => {
                            if attempt == 1 {
                                info!("Waiting for server to start...");
                            }
                        }
                        Err(e) => warn!("Health check error: {}", e),
                    }
                    Ok::<_, E2eError>(false)
                }
            })
            .await?;

        if healthy {
            Ok(())
        } else {
            Err(E2eError::ServerHealthCheck(attempts))
        }
    }

    /// Stop the server
    pub fn stop(&mut self) -> E2eResult<()> {
        if let Ok(Some(status)) = self.child.try_wait() {
            debug!("Server already exited with {}", status);
            return Ok(());
        }

        info!("Stopping server (pid: {})", self.child.id());

        // Try graceful shutdown first
        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            let pid = Pid::from_raw(self.child.id() as i32);
            if kill(pid, Signal::SIGTERM).is_ok() {
                std::thread::sleep(Duration::from_millis(500));
            }
        }

        // Force kill if still running
        let _ = self.child.kill();
        self.child.wait()?;

        Ok(())
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

/// Configuration for spawning a server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Shell command line that starts the server
    pub command: String,

    /// URL polled until it answers with a success status
    pub health_url: String,

    /// Health check attempts and spacing
    pub health_poll: Poll,
}

impl ServerConfig {
    pub fn new(command: impl Into<String>, health_url: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            health_url: health_url.into(),
            health_poll: Poll::new(Duration::from_millis(300), 15),
        }
    }
}
