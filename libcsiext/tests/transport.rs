use std::io::Write;
use std::sync::Arc;

use libcsiext::transport::client::CsiClient;
use libcsiext::transport::server::CsiServer;
use libcsiext::transport::tls;
use libcsiext::{
    ActionType, IdentityService, PluginCapability, PluginConfig, PluginInfo, ReplicationRpc,
    TcpHealthCheck, config,
};
use tempfile::NamedTempFile;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

/// PEM certificate and key files for a self-signed `localhost` identity.
fn self_signed() -> (NamedTempFile, NamedTempFile) {
    let rcgen::CertifiedKey { cert, key_pair } =
        rcgen::generate_simple_self_signed(vec!["localhost".to_owned()]).unwrap();
    let mut cert_file = NamedTempFile::new().unwrap();
    cert_file.write_all(cert.pem().as_bytes()).unwrap();
    let mut key_file = NamedTempFile::new().unwrap();
    key_file.write_all(key_pair.serialize_pem().as_bytes()).unwrap();
    (cert_file, key_file)
}

fn controller_service(cluster_endpoint: &str) -> (IdentityService, NamedTempFile) {
    let mut file = NamedTempFile::new().unwrap();
    write!(
        file,
        "clusters:\n  - name: primary\n    endpoint: \"{cluster_endpoint}\"\n    is_default: true\n"
    )
    .unwrap();
    let path = file.path().to_str().unwrap().to_owned();
    let cfg = PluginConfig::from_lookup(|k| match k {
        config::ENV_MODE => Some("controller".to_owned()),
        config::ENV_PROBE_TIMEOUT_SECS => Some("2".to_owned()),
        config::ENV_CLUSTER_CONFIG => Some(path.clone()),
        _ => None,
    })
    .unwrap();
    (
        IdentityService::from_config(&cfg, Arc::new(TcpHealthCheck)),
        file,
    )
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn negotiation_round_trip_over_quic() {
    let backend = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let (service, _cluster_file) = controller_service(&backend.local_addr().unwrap().to_string());

    let (cert_file, key_file) = self_signed();
    let certs = tls::load_certs(cert_file.path()).unwrap();
    let key = tls::load_key(key_file.path()).unwrap();

    let server = Arc::new(
        CsiServer::new(
            "127.0.0.1:0".parse().unwrap(),
            tls::server_config(certs.clone(), key).unwrap(),
            Arc::new(service),
        )
        .unwrap(),
    );
    let addr = server.local_addr().unwrap();
    let shutdown = CancellationToken::new();
    let serving = {
        let server = Arc::clone(&server);
        let shutdown = shutdown.clone();
        tokio::spawn(async move { server.serve(shutdown).await })
    };

    let client = CsiClient::connect(addr, "localhost", tls::client_config(certs).unwrap())
        .await
        .unwrap();

    let info = client.get_plugin_info().await.unwrap();
    assert_eq!(info, PluginInfo::from_build());

    let caps = client.get_plugin_capabilities().await.unwrap();
    assert_eq!(caps.len(), 3);
    assert!(caps.iter().any(|c| matches!(c, PluginCapability::Service(_))));

    let report = client.probe().await.unwrap();
    assert!(report.ready, "{report:?}");

    let replication = client.get_replication_capabilities().await.unwrap();
    assert_eq!(replication.capabilities, ReplicationRpc::ALL.to_vec());
    assert_eq!(replication.actions, ActionType::ALL.to_vec());

    client.close().await;
    shutdown.cancel();
    serving.await.unwrap().unwrap();
}

#[tokio::test]
async fn client_rejects_untrusted_server() {
    let (service, _cluster_file) = controller_service("127.0.0.1:1");
    let (cert_file, key_file) = self_signed();
    let server = CsiServer::new(
        "127.0.0.1:0".parse().unwrap(),
        tls::server_config(
            tls::load_certs(cert_file.path()).unwrap(),
            tls::load_key(key_file.path()).unwrap(),
        )
        .unwrap(),
        Arc::new(service),
    )
    .unwrap();
    let addr = server.local_addr().unwrap();
    let shutdown = CancellationToken::new();
    let serving = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move { server.serve(shutdown).await })
    };

    let (other_cert, _other_key) = self_signed();
    let roots = tls::load_certs(other_cert.path()).unwrap();
    let result = CsiClient::connect(addr, "localhost", tls::client_config(roots).unwrap()).await;
    assert!(result.is_err());

    shutdown.cancel();
    serving.await.unwrap().unwrap();
}
