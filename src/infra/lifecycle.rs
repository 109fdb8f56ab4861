//! Running the HTTP server until it is told to stop.
//!
//! A [`Supervisor`] owns a bound listener. [`Supervisor::run`] accepts
//! connections on a spawned task and waits for whichever comes first: that
//! task ending on its own, which is always an error, or the shutdown future
//! completing. After shutdown is requested no new connections are accepted,
//! open connections are asked to finish their current request and close, and
//! whatever is still open when the shutdown timeout elapses is aborted.
//!
//! `run` consumes the supervisor, so the `Running -> Draining -> Stopped`
//! sequence happens at most once.

use axum::Router;
use hyper_util::{
    rt::{TokioExecutor, TokioIo},
    server::conn::auto,
    service::TowerToHyperService,
};
use std::{future::Future, io, net::SocketAddr, time::Duration};
use tokio::{
    net::{TcpListener, TcpStream},
    sync::watch,
    task::{JoinError, JoinSet},
    time::Instant,
};

/// How shutdown finished.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Shutdown {
    /// Every in-flight request finished before the deadline.
    Graceful,
    /// The deadline elapsed and the remaining connections were closed.
    Forced,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum LifecycleState {
    Running,
    Draining,
    Stopped,
}

/// A fatal server error.
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    /// The listener could not be bound.
    #[error("binding {address}: {source}")]
    Bind {
        /// The address we tried to bind.
        address: String,
        /// Why binding failed.
        #[source]
        source: io::Error,
    },
    /// Accepting connections failed.
    #[error("listening and serving: {0}")]
    Serve(#[source] io::Error),
    /// The server stopped without being asked to.
    #[error("listening and serving: server stopped unexpectedly")]
    ListenerStopped,
    /// The accept task panicked.
    #[error("listening and serving: {0}")]
    Task(#[source] JoinError),
    /// A connection could not be closed even by force.
    #[error("could not stop server gracefully: {0}")]
    ForceClose(#[source] JoinError),
}

/// Supervises one HTTP server from startup to shutdown.
#[derive(Debug)]
pub struct Supervisor {
    listener: TcpListener,
    shutdown_timeout: Duration,
}

impl Supervisor {
    /// Binds `address` for a server that will be given `shutdown_timeout` to drain.
    pub async fn bind(address: &str, shutdown_timeout: Duration) -> Result<Self, LifecycleError> {
        let listener = TcpListener::bind(address)
            .await
            .map_err(|source| LifecycleError::Bind {
                address: address.to_string(),
                source,
            })?;
        Ok(Self::from_listener(listener, shutdown_timeout))
    }

    /// Supervises an already bound listener.
    pub fn from_listener(listener: TcpListener, shutdown_timeout: Duration) -> Self {
        Self {
            listener,
            shutdown_timeout,
        }
    }

    /// The address the listener is bound to.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Serves `app` until `shutdown` completes, then drains within the shutdown timeout.
    pub async fn run<F>(self, app: Router, shutdown: F) -> Result<Shutdown, LifecycleError>
    where
        F: Future<Output = ()> + Send,
    {
        let Self {
            listener,
            shutdown_timeout,
        } = self;
        match listener.local_addr() {
            Ok(addr) => tracing::info!("API listening on {}", addr),
            Err(e) => tracing::warn!("API listening on unknown address: {}", e),
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        let mut server = tokio::spawn(accept_connections(listener, app, stop_rx));
        enter(LifecycleState::Running);

        tokio::select! {
            res = &mut server => {
                return Err(match res {
                    Ok(Ok(_)) => LifecycleError::ListenerStopped,
                    Ok(Err(e)) => LifecycleError::Serve(e),
                    Err(e) => LifecycleError::Task(e),
                });
            }
            () = shutdown => {}
        }

        tracing::info!("Start shutdown");
        enter(LifecycleState::Draining);
        stop_tx.send_replace(true);
        let deadline = Instant::now() + shutdown_timeout;

        let outcome = match tokio::time::timeout_at(deadline, &mut server).await {
            Ok(Ok(Ok(mut connections))) => {
                if tokio::time::timeout_at(deadline, drain(&mut connections))
                    .await
                    .is_ok()
                {
                    Shutdown::Graceful
                } else {
                    tracing::warn!(
                        "Graceful shutdown did not complete in {:?}, forcing close",
                        shutdown_timeout
                    );
                    force_close(connections).await?;
                    Shutdown::Forced
                }
            }
            Ok(Ok(Err(e))) => return Err(LifecycleError::Serve(e)),
            Ok(Err(e)) => return Err(LifecycleError::Task(e)),
            Err(_) => {
                tracing::warn!(
                    "Accept loop did not stop in {:?}, forcing close",
                    shutdown_timeout
                );
                // The connection set lives in the accept task, dropping it aborts them all.
                server.abort();
                match server.await {
                    Ok(Ok(connections)) => force_close(connections).await?,
                    Ok(Err(e)) => return Err(LifecycleError::Serve(e)),
                    Err(e) if e.is_cancelled() => {}
                    Err(e) => return Err(LifecycleError::ForceClose(e)),
                }
                Shutdown::Forced
            }
        };

        enter(LifecycleState::Stopped);
        Ok(outcome)
    }
}

fn enter(state: LifecycleState) {
    tracing::debug!(state = ?state, "lifecycle state transition");
}

/// Accepts connections until stopped, then hands back the ones still open.
async fn accept_connections(
    listener: TcpListener,
    app: Router,
    mut stop: watch::Receiver<bool>,
) -> io::Result<JoinSet<()>> {
    let connection_stop = stop.clone();
    let mut connections = JoinSet::new();
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, remote_addr) = match accepted {
                    Ok(accepted) => accepted,
                    Err(e) if is_connection_error(&e) => continue,
                    Err(e) => return Err(e),
                };
                connections.spawn(serve_connection(
                    stream,
                    remote_addr,
                    app.clone(),
                    connection_stop.clone(),
                ));
            }
            Some(_) = connections.join_next(), if !connections.is_empty() => {}
            () = stopped(&mut stop) => break,
        }
    }
    Ok(connections)
}

/// Serves one connection, closing it after the current request once stopped.
async fn serve_connection(
    stream: TcpStream,
    remote_addr: SocketAddr,
    app: Router,
    mut stop: watch::Receiver<bool>,
) {
    let builder = auto::Builder::new(TokioExecutor::new());
    let conn =
        builder.serve_connection_with_upgrades(TokioIo::new(stream), TowerToHyperService::new(app));
    tokio::pin!(conn);

    let mut closing = false;
    loop {
        tokio::select! {
            result = conn.as_mut() => {
                if let Err(e) = result {
                    tracing::debug!("connection from {} failed: {}", remote_addr, e);
                }
                break;
            }
            () = stopped(&mut stop), if !closing => {
                closing = true;
                conn.as_mut().graceful_shutdown();
            }
        }
    }
}

async fn stopped(stop: &mut watch::Receiver<bool>) {
    let _ = stop.wait_for(|stopped| *stopped).await;
}

/// Waits for every connection to close on its own.
async fn drain(connections: &mut JoinSet<()>) {
    while let Some(res) = connections.join_next().await {
        if let Err(e) = res {
            tracing::error!("connection task failed: {}", e);
        }
    }
}

/// Aborts every connection and waits until they are gone.
async fn force_close(mut connections: JoinSet<()>) -> Result<(), LifecycleError> {
    connections.abort_all();
    while let Some(res) = connections.join_next().await {
        match res {
            Err(e) if !e.is_cancelled() => return Err(LifecycleError::ForceClose(e)),
            _ => {}
        }
    }
    Ok(())
}

fn is_connection_error(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
    )
}

/// Registers SIGINT and SIGTERM handlers right away.
///
/// The returned future completes when either signal arrives.
pub fn shutdown_signal() -> impl Future<Output = ()> + Send + 'static {
    #[cfg(unix)]
    let (interrupt, terminate) = {
        use tokio::signal::unix::SignalKind;
        (
            listen(SignalKind::interrupt()),
            listen(SignalKind::terminate()),
        )
    };

    async move {
        #[cfg(unix)]
        tokio::select! {
            () = interrupt => {},
            () = terminate => {},
        }

        #[cfg(not(unix))]
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to fetch ctrl_c: {}", e);
            std::future::pending::<()>().await
        }

        tracing::info!("Termination signal received");
    }
}

#[cfg(unix)]
fn listen(kind: tokio::signal::unix::SignalKind) -> impl Future<Output = ()> + Send + 'static {
    let registered = tokio::signal::unix::signal(kind);
    async move {
        match registered {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for {:?}: {}", kind, e);
                std::future::pending::<()>().await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::get;
    use std::time::Instant;

    #[tokio::test]
    async fn bind_failure_is_reported() {
        let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let address = taken.local_addr().unwrap().to_string();
        let err = Supervisor::bind(&address, Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, LifecycleError::Bind { .. }));
    }

    #[tokio::test]
    async fn immediate_shutdown_is_graceful() {
        let supervisor = Supervisor::bind("127.0.0.1:0", Duration::from_secs(5))
            .await
            .unwrap();
        let app = Router::new().route("/", get(|| async { "ok" }));
        let start = Instant::now();
        let outcome = supervisor.run(app, async {}).await.unwrap();
        assert_eq!(Shutdown::Graceful, outcome);
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn stops_accepting_after_shutdown() {
        let supervisor = Supervisor::bind("127.0.0.1:0", Duration::from_secs(5))
            .await
            .unwrap();
        let addr = supervisor.local_addr().unwrap();
        let app = Router::new().route("/", get(|| async { "ok" }));
        supervisor.run(app, async {}).await.unwrap();
        assert!(tokio::net::TcpStream::connect(addr).await.is_err());
    }

    #[tokio::test]
    async fn idle_connection_does_not_hold_up_shutdown() {
        let supervisor = Supervisor::bind("127.0.0.1:0", Duration::from_secs(5))
            .await
            .unwrap();
        let addr = supervisor.local_addr().unwrap();
        let app = Router::new().route("/", get(|| async { "ok" }));
        let (stop, stop_rx) = tokio::sync::oneshot::channel::<()>();
        let handle = tokio::spawn(supervisor.run(app, async move {
            let _ = stop_rx.await;
        }));

        // An open keep-alive connection with no request on it.
        let _idle = TcpStream::connect(addr).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let start = Instant::now();
        stop.send(()).unwrap();
        let outcome = handle.await.unwrap().unwrap();
        assert_eq!(Shutdown::Graceful, outcome);
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn sigterm_completes_shutdown_signal() {
        use nix::sys::signal::{raise, Signal};

        let signal = shutdown_signal();
        raise(Signal::SIGTERM).unwrap();
        tokio::time::timeout(Duration::from_secs(2), signal)
            .await
            .expect("SIGTERM did not complete the shutdown signal");
    }
}
