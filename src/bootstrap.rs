use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::{error, info, warn};

use crate::app::{App, Server};
use crate::config::Settings;
use crate::error::BootstrapError;
use crate::instrumentation::Instrumentation;
use crate::shutdown::{wait_for_signal, Shutdown};

pub fn readiness_line(host: &str, port: u16) -> String {
    format!("Listening: http://{host}:{port}")
}

pub struct Bootstrapper {
    settings: Arc<Settings>,
    shutdown: Shutdown,
}

impl Bootstrapper {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings: Arc::new(settings),
            shutdown: Shutdown::new(),
        }
    }

    pub fn settings(&self) -> &Arc<Settings> {
        &self.settings
    }

    /// `on_ready` is called once after a successful bind, never on a bind failure.
    pub async fn start<F>(&self, instrumentation: &Instrumentation, on_ready: F) -> Result<RunningWorker, BootstrapError>
    where
        F: FnOnce(&str),
    {
        let app = App::build(instrumentation, &self.settings);
        let host = self.settings.hostname.as_str();

        let server = app
            .listen(host, self.settings.worker_port, self.shutdown.subscribe(), |addr| {
                on_ready(&readiness_line(host, advertised_port(self.settings.worker_port, addr)))
            })
            .await?;

        Ok(RunningWorker {
            server,
            shutdown: self.shutdown.clone(),
            grace: self.settings.shutdown_timeout,
        })
    }
}

// Port 0 asks the OS for a free port; report the one actually bound.
fn advertised_port(configured: u16, bound: SocketAddr) -> u16 {
    if configured == 0 {
        bound.port()
    } else {
        configured
    }
}

pub struct RunningWorker {
    server: Server,
    shutdown: Shutdown,
    grace: Duration,
}

impl RunningWorker {
    pub fn local_addr(&self) -> SocketAddr {
        self.server.local_addr()
    }

    pub async fn closed(&mut self) -> Result<(), BootstrapError> {
        (&mut self.server.task).await??;
        Ok(())
    }

    pub async fn shutdown(self) -> Result<(), BootstrapError> {
        self.shutdown.trigger();
        let abort = self.server.task.abort_handle();
        match tokio::time::timeout(self.grace, self.server.task).await {
            Ok(joined) => {
                joined??;
                Ok(())
            }
            Err(_) => {
                abort.abort();
                warn!(grace_secs = self.grace.as_secs(), "Graceful shutdown timed out; aborting server");
                Err(BootstrapError::ShutdownTimeout(self.grace))
            }
        }
    }
}

pub async fn run(instrumentation: &Instrumentation, settings: Settings) -> Result<()> {
    let bootstrapper = Bootstrapper::new(settings);
    let mut worker = bootstrapper
        .start(instrumentation, |line| info!("{line}"))
        .await?;

    let unexpected_exit = tokio::select! {
        _ = wait_for_signal() => None,
        result = worker.closed() => Some(result),
    };

    match unexpected_exit {
        None => {
            info!("Shutdown signal received");
            worker.shutdown().await?;
            info!(worker_id = %bootstrapper.settings().worker_id, "Worker shutdown complete");
            Ok(())
        }
        Some(result) => {
            if let Err(err) = &result {
                error!(error = %err, "Server stopped unexpectedly");
            }
            result?;
            Err(anyhow::anyhow!("server stopped without a shutdown signal"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn readiness_line_is_a_url() {
        assert_eq!(readiness_line("127.0.0.1", 3030), "Listening: http://127.0.0.1:3030");
        assert_eq!(readiness_line("0.0.0.0", 8080), "Listening: http://0.0.0.0:8080");
    }

    #[test]
    fn configured_port_is_advertised() {
        let bound: SocketAddr = "127.0.0.1:41234".parse().unwrap();
        assert_eq!(advertised_port(3030, bound), 3030);
        assert_eq!(advertised_port(0, bound), 41234);
    }

    #[tokio::test]
    async fn closed_reports_an_aborted_server() {
        let instrumentation =
            crate::instrumentation::init(&crate::instrumentation::InstrumentationSettings::default());
        let settings = Settings::from_vars(vec![
            ("HOSTNAME".to_string(), "127.0.0.1".to_string()),
            ("WORKER_PORT".to_string(), "0".to_string()),
        ])
        .unwrap();
        let bootstrapper = Bootstrapper::new(settings);
        let mut worker = bootstrapper.start(&instrumentation, |_| {}).await.unwrap();

        worker.server.task.abort();

        let result = tokio::time::timeout(Duration::from_secs(5), worker.closed())
            .await
            .expect("closed() should resolve once the server task ends");
        assert!(matches!(result, Err(BootstrapError::Task(_))));
    }

    #[tokio::test]
    async fn closed_stays_pending_while_serving() {
        let instrumentation =
            crate::instrumentation::init(&crate::instrumentation::InstrumentationSettings::default());
        let settings = Settings::from_vars(vec![
            ("HOSTNAME".to_string(), "127.0.0.1".to_string()),
            ("WORKER_PORT".to_string(), "0".to_string()),
        ])
        .unwrap();
        let bootstrapper = Bootstrapper::new(settings);
        let mut worker = bootstrapper.start(&instrumentation, |_| {}).await.unwrap();

        let pending = tokio::time::timeout(Duration::from_millis(100), worker.closed()).await;
        assert!(pending.is_err());

        worker.shutdown().await.unwrap();
    }
}
