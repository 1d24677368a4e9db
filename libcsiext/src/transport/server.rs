//! QUIC endpoint that answers negotiation requests for a running plugin.
//!
//! Every bi-directional stream carries exactly one JSON-encoded
//! [`CsiMessage`] request, answered by one response before the stream is
//! finished.  A request that does not decode is answered with
//! [`CsiError::InvalidArgument`] rather than a reset stream.

use std::net::SocketAddr;
use std::sync::Arc;

use quinn::crypto::rustls::QuicServerConfig;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::error::CsiError;
use crate::identity::CsiIdentity;
use crate::message::CsiMessage;
use crate::replication::CsiReplication;

/// Upper bound on a single request or response payload.
pub(crate) const MAX_MESSAGE_BYTES: usize = 16 * 1024 * 1024;

/// Accepts QUIC connections and answers [`CsiMessage`] requests from a
/// [`CsiIdentity`] + [`CsiReplication`] implementation.
pub struct CsiServer<T> {
    endpoint: quinn::Endpoint,
    handler: Arc<T>,
}

impl<T> CsiServer<T>
where
    T: CsiIdentity + CsiReplication + 'static,
{
    /// Bind the endpoint to `addr`; see [`super::tls::server_config`].
    pub fn new(
        addr: SocketAddr,
        tls_config: rustls::ServerConfig,
        handler: Arc<T>,
    ) -> Result<Self, CsiError> {
        let crypto = QuicServerConfig::try_from(tls_config)
            .map_err(|e| CsiError::Configuration(format!("TLS config unusable for QUIC: {e}")))?;
        let endpoint = quinn::Endpoint::server(
            quinn::ServerConfig::with_crypto(Arc::new(crypto)),
            addr,
        )
        .map_err(CsiError::transport)?;
        Ok(Self { endpoint, handler })
    }

    /// Address the endpoint is bound to; resolves a requested port of 0.
    pub fn local_addr(&self) -> Result<SocketAddr, CsiError> {
        self.endpoint.local_addr().map_err(CsiError::transport)
    }

    /// Answer requests until `shutdown` fires, then close the endpoint.
    ///
    /// Connections and the streams within them are served on their own
    /// tasks, so a slow probe never holds up another caller.
    pub async fn serve(&self, shutdown: CancellationToken) -> Result<(), CsiError> {
        info!(addr = %self.local_addr()?, "negotiation endpoint listening");
        loop {
            let incoming = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                incoming = self.endpoint.accept() => match incoming {
                    Some(incoming) => incoming,
                    None => break,
                },
            };
            let handler = Arc::clone(&self.handler);
            tokio::spawn(async move {
                let conn = match incoming.await {
                    Ok(conn) => conn,
                    Err(e) => {
                        warn!(error = %e, "handshake failed");
                        return;
                    }
                };
                let remote = conn.remote_address();
                debug!(%remote, "connection accepted");
                if let Err(e) = serve_connection(conn, handler).await {
                    warn!(%remote, error = %e, "connection ended with error");
                }
            });
        }

        self.endpoint
            .close(quinn::VarInt::from_u32(0), b"server shutdown");
        info!("negotiation endpoint stopped");
        Ok(())
    }
}

async fn serve_connection<T>(conn: quinn::Connection, handler: Arc<T>) -> Result<(), CsiError>
where
    T: CsiIdentity + CsiReplication + 'static,
{
    loop {
        let (send, recv) = match conn.accept_bi().await {
            Ok(stream) => stream,
            Err(quinn::ConnectionError::ApplicationClosed(_))
            | Err(quinn::ConnectionError::LocallyClosed) => return Ok(()),
            Err(e) => return Err(CsiError::transport(e)),
        };
        let handler = Arc::clone(&handler);
        tokio::spawn(async move {
            if let Err(e) = answer(send, recv, handler.as_ref()).await {
                error!(error = %e, "failed to answer request");
            }
        });
    }
}

#[instrument(skip_all)]
async fn answer<T>(
    mut send: quinn::SendStream,
    mut recv: quinn::RecvStream,
    handler: &T,
) -> Result<(), CsiError>
where
    T: CsiIdentity + CsiReplication,
{
    let buf = recv
        .read_to_end(MAX_MESSAGE_BYTES)
        .await
        .map_err(CsiError::transport)?;

    let response = match serde_json::from_slice::<CsiMessage>(&buf) {
        Ok(request) => {
            debug!(%request, "request received");
            dispatch(handler, request).await
        }
        Err(e) => {
            warn!(error = %e, "undecodable request");
            CsiMessage::Error(CsiError::InvalidArgument(format!("malformed request: {e}")))
        }
    };

    let payload = serde_json::to_vec(&response).map_err(CsiError::internal)?;
    send.write_all(&payload)
        .await
        .map_err(CsiError::transport)?;
    send.finish().map_err(CsiError::transport)?;
    Ok(())
}

/// Map a [`CsiMessage`] request to the correct trait method call and wrap
/// the result in a response [`CsiMessage`].
pub async fn dispatch<T>(handler: &T, request: CsiMessage) -> CsiMessage
where
    T: CsiIdentity + CsiReplication,
{
    match request {
        CsiMessage::Probe => match handler.probe().await {
            Ok(report) => CsiMessage::ProbeResult(report),
            Err(e) => CsiMessage::Error(e),
        },
        CsiMessage::GetPluginInfo => match handler.get_plugin_info().await {
            Ok(info) => CsiMessage::PluginInfoResponse(info),
            Err(e) => CsiMessage::Error(e),
        },
        CsiMessage::GetPluginCapabilities => match handler.get_plugin_capabilities().await {
            Ok(caps) => CsiMessage::PluginCapabilitiesResponse(caps),
            Err(e) => CsiMessage::Error(e),
        },
        CsiMessage::GetReplicationCapabilities => {
            match handler.get_replication_capabilities().await {
                Ok(caps) => CsiMessage::ReplicationCapabilitiesResponse(caps),
                Err(e) => CsiMessage::Error(e),
            }
        }

        // --- Response variants should never arrive as requests --------------
        other => {
            warn!(msg = %other, "unexpected message variant received as request");
            CsiMessage::Error(CsiError::InvalidArgument(format!(
                "unexpected message: {other}"
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::replication::{ReplicationCapabilities, ReplicationRpc};
    use crate::types::{
        ClusterId, PluginCapability, PluginInfo, ProbeResult, ReadinessReport, ServiceType,
    };

    struct Stub;

    #[async_trait]
    impl CsiIdentity for Stub {
        async fn get_plugin_info(&self) -> Result<PluginInfo, CsiError> {
            Ok(PluginInfo::from_build())
        }

        async fn probe(&self) -> Result<ReadinessReport, CsiError> {
            Ok(ReadinessReport::from_results([ProbeResult::failed(
                ClusterId::from("east"),
                "down",
            )]))
        }

        async fn get_plugin_capabilities(&self) -> Result<Vec<PluginCapability>, CsiError> {
            Ok(vec![PluginCapability::Service(ServiceType::ControllerService)])
        }
    }

    #[async_trait]
    impl CsiReplication for Stub {
        async fn get_replication_capabilities(&self) -> Result<ReplicationCapabilities, CsiError> {
            Err(CsiError::Cancelled("stub".into()))
        }
    }

    #[tokio::test]
    async fn dispatch_identity_requests() {
        let resp = dispatch(&Stub, CsiMessage::GetPluginInfo).await;
        assert!(matches!(resp, CsiMessage::PluginInfoResponse(info) if info == PluginInfo::from_build()));

        let resp = dispatch(&Stub, CsiMessage::GetPluginCapabilities).await;
        assert!(matches!(resp, CsiMessage::PluginCapabilitiesResponse(caps) if caps.len() == 1));

        let resp = dispatch(&Stub, CsiMessage::Probe).await;
        assert!(matches!(resp, CsiMessage::ProbeResult(report) if !report.ready));
    }

    #[tokio::test]
    async fn dispatch_propagates_errors() {
        let resp = dispatch(&Stub, CsiMessage::GetReplicationCapabilities).await;
        assert!(matches!(resp, CsiMessage::Error(CsiError::Cancelled(_))));
    }

    #[tokio::test]
    async fn dispatch_rejects_response_variants() {
        let resp = dispatch(
            &Stub,
            CsiMessage::ReplicationCapabilitiesResponse(ReplicationCapabilities {
                capabilities: vec![ReplicationRpc::CreateRemoteVolume],
                actions: Vec::new(),
            }),
        )
        .await;
        assert!(matches!(resp, CsiMessage::Error(CsiError::InvalidArgument(_))));
    }
}
