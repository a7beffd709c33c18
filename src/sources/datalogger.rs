//! TCP server for Solarman dataloggers

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::instrument::WithSubscriber;
use tracing::{Dispatch, Instrument, debug, info, info_span, warn};

use crate::codec::SolarmanDecoder;
use crate::config::DataloggerConfig;
use crate::hub::Hub;
use crate::session::{Activity, SolarmanSession};
use crate::source::MeasurementSource;
use crate::transport::TcpTransport;
use crate::types::DescriptorTable;
use crate::{Result, SensorError};

const MAX_ACCEPT_BACKOFF: Duration = Duration::from_secs(5);

/// Accepts datalogger connections and decodes their frames into one hub.
///
/// Every accepted connection runs its own session; all sessions publish
/// into the same cache, so one server serves one inverter.
#[derive(Debug)]
pub struct DataloggerServer {
    config: DataloggerConfig,
    decoder: SolarmanDecoder,
    hub: Arc<Hub>,
    activity: Arc<Activity>,
    dispatch: Option<Dispatch>,
}

impl DataloggerServer {
    /// Build a server from its configuration.
    pub fn new(config: DataloggerConfig) -> Result<Self> {
        let table = Arc::new(config.table()?);
        Self::with_table(config, table)
    }

    /// Build a server that decodes with `table` instead of the configured fields.
    pub fn with_table(config: DataloggerConfig, table: Arc<DescriptorTable>) -> Result<Self> {
        let decoder = SolarmanDecoder::new(Arc::clone(&table))?;
        Ok(Self {
            config,
            decoder,
            hub: Arc::new(Hub::new(table)),
            activity: Arc::new(Activity::new()),
            dispatch: None,
        })
    }

    /// Route this server's logs to `dispatch` instead of the global default.
    pub fn with_dispatch(mut self, dispatch: Dispatch) -> Self {
        self.dispatch = Some(dispatch);
        self
    }

    /// Shared handle to the hub, for consumers that outlive `&self`.
    pub fn shared_hub(&self) -> Arc<Hub> {
        Arc::clone(&self.hub)
    }

    /// Whether a datalogger is currently connected.
    pub fn client_connected(&self) -> bool {
        self.activity.is_connected()
    }

    /// When the last complete frame arrived.
    pub fn last_seen(&self) -> Option<SystemTime> {
        self.activity.last_seen()
    }

    /// Bind the configured listen address.
    pub async fn bind(&self) -> Result<TcpListener> {
        let listen = self.config.listen;
        TcpListener::bind(listen).await.map_err(|e| {
            SensorError::connection_failed_with_source(
                format!("unable to listen on {listen}"),
                Box::new(e),
            )
        })
    }

    /// Bind and serve until `cancel` fires.
    pub async fn run(&self, cancel: CancellationToken) -> Result<()> {
        let listener = self.bind().await?;
        self.serve(listener, cancel).await
    }

    /// Serve connections from an already bound listener until `cancel` fires.
    ///
    /// Open sessions are cancelled and awaited before this returns.
    pub async fn serve(&self, listener: TcpListener, cancel: CancellationToken) -> Result<()> {
        let local = listener.local_addr()?;
        let accept_loop = self
            .accept_loop(listener, cancel)
            .instrument(info_span!("datalogger_server", %local));

        match self.dispatch.clone() {
            Some(dispatch) => accept_loop.with_subscriber(dispatch).await,
            None => accept_loop.await,
        }
    }

    async fn accept_loop(&self, listener: TcpListener, cancel: CancellationToken) -> Result<()> {
        let mut sessions = JoinSet::new();
        let mut failures = 0u32;

        info!("Listening for dataloggers");

        loop {
            let accepted = tokio::select! {
                _ = cancel.cancelled() => break,
                accepted = listener.accept() => accepted,
                Some(finished) = sessions.join_next(), if !sessions.is_empty() => {
                    if let Err(e) = finished {
                        warn!(error = %e, "Datalogger session task failed");
                    }
                    continue;
                }
            };

            match accepted {
                Ok((stream, peer)) => {
                    failures = 0;
                    if let Err(e) = stream.set_nodelay(true) {
                        debug!(%peer, error = %e, "Unable to disable Nagle");
                    }
                    self.spawn_session(&mut sessions, stream, peer, cancel.child_token());
                }
                Err(e) => {
                    failures += 1;
                    let backoff = Duration::from_millis(50 * 2u64.pow(failures.min(7)))
                        .min(MAX_ACCEPT_BACKOFF);
                    warn!(error = %e, ?backoff, "Accept failed");
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(backoff) => {}
                    }
                }
            }
        }

        info!(open_sessions = sessions.len(), "Datalogger server stopping");
        while let Some(finished) = sessions.join_next().await {
            if let Err(e) = finished {
                warn!(error = %e, "Datalogger session task failed");
            }
        }
        Ok(())
    }

    fn spawn_session(
        &self,
        sessions: &mut JoinSet<()>,
        stream: tokio::net::TcpStream,
        peer: SocketAddr,
        cancel: CancellationToken,
    ) {
        let session = SolarmanSession::new(
            TcpTransport::new(stream),
            self.decoder.clone(),
            Arc::clone(&self.hub),
        )
        .with_activity(Arc::clone(&self.activity));

        let task = async move {
            session.run(cancel).await;
        }
        .instrument(info_span!("datalogger_session", %peer));

        match self.dispatch.clone() {
            Some(dispatch) => sessions.spawn(task.with_subscriber(dispatch)),
            None => sessions.spawn(task),
        };
    }
}

impl MeasurementSource for DataloggerServer {
    fn hub(&self) -> &Hub {
        &self.hub
    }
}
