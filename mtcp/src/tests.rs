use crate::{Client, Listener};
use brant_bpa::{
    async_trait, config::Config, node::Node, services, store::BundleDescriptor,
};
use brant_bpv7::{
    builder::Builder, creation_timestamp::CreationTimestamp, eid::EndpointId,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn test_node(node_id: &str) -> Arc<Node> {
    Node::new(Config {
        node_id: node_id.parse().unwrap(),
        cron: brant_bpa::config::CronConfig {
            dispatch: 100,
            gc: 1_000,
            id_clean: 60_000,
        },
        ..Default::default()
    })
}

fn free_address() -> String {
    let socket = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let address = socket.local_addr().unwrap().to_string();
    drop(socket);
    address
}

async fn wait_for<F, Fut>(what: &str, mut condition: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..100 {
        if condition().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("timed out waiting for {what}");
}

struct CapturingService {
    endpoint: EndpointId,
    delivered: Mutex<Vec<BundleDescriptor>>,
}

impl CapturingService {
    fn new(endpoint: &str) -> Arc<Self> {
        Arc::new(Self {
            endpoint: endpoint.parse().unwrap(),
            delivered: Mutex::new(Vec::new()),
        })
    }

    fn delivered(&self) -> Vec<BundleDescriptor> {
        self.delivered.lock().unwrap().clone()
    }
}

#[async_trait]
impl services::Service for CapturingService {
    fn name(&self) -> String {
        "capture".to_string()
    }

    fn endpoints(&self) -> Vec<EndpointId> {
        vec![self.endpoint.clone()]
    }

    async fn deliver(&self, descriptor: &BundleDescriptor) -> services::Result<()> {
        self.delivered.lock().unwrap().push(descriptor.clone());
        Ok(())
    }
}

#[tokio::test]
async fn bundle_crosses_two_nodes() {
    let node_a = test_node("dtn://a/");
    let node_b = test_node("dtn://b/");

    let address = free_address();
    node_b
        .register_listener(Listener::new(&address, "dtn://b/".parse().unwrap()))
        .await
        .unwrap();

    node_a.register_cla(
        Client::new(&address, "dtn://b/".parse().unwrap(), node_a.cla_manager()).handle(),
    );

    let bundle = Builder::new(
        "dtn://a/".parse().unwrap(),
        "dtn://b/x".parse().unwrap(),
    )
    .lifetime(10 * 60 * 1_000)
    .payload(b"hi".to_vec())
    .build(CreationTimestamp::now());
    let id = bundle.id();

    node_a.send(bundle).await;

    wait_for("bundle to arrive at B", || {
        let node_b = node_b.clone();
        let id = id.clone();
        async move { node_b.store().load(&id).await.unwrap().is_some() }
    })
    .await;

    let at_b = node_b.store().load(&id).await.unwrap().unwrap();
    assert_eq!(at_b.destination, "dtn://b/x".parse().unwrap());

    let at_a = node_a.store().load(&id).await.unwrap().unwrap();
    assert!(at_a
        .already_sent_to
        .contains(&"dtn://b/".parse().unwrap()));

    node_a.shutdown().await;
    node_b.shutdown().await;
}

#[tokio::test]
async fn large_payload_fragments_over_small_mtu() {
    let node_a = test_node("dtn://a/");
    let node_b = test_node("dtn://b/");

    let service = CapturingService::new("dtn://b/sink");
    node_b.register_service(service.clone()).unwrap();

    let address = free_address();
    node_b
        .register_listener(Listener::new(&address, "dtn://b/".parse().unwrap()))
        .await
        .unwrap();

    node_a.register_cla(
        Client::with_max_bundle_size(
            &address,
            "dtn://b/".parse().unwrap(),
            300,
            node_a.cla_manager(),
        )
        .handle(),
    );

    let payload: Vec<u8> = (0..=255u8).cycle().take(1024).collect();
    let bundle = Builder::new(
        "dtn://a/".parse().unwrap(),
        "dtn://b/sink".parse().unwrap(),
    )
    .lifetime(10 * 60 * 1_000)
    .payload(payload.clone())
    .build(CreationTimestamp::now());
    let id = bundle.id();

    node_a.send(bundle).await;

    wait_for("reassembled bundle delivery at B", || {
        let service = service.clone();
        async move { !service.delivered().is_empty() }
    })
    .await;

    let delivered = service.delivered();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].id, id);

    let body = node_b.store().load_body(&delivered[0]).await.unwrap();
    assert_eq!(body.payload().unwrap(), payload);
    assert!(!body.is_fragment());

    node_a.shutdown().await;
    node_b.shutdown().await;
}

#[tokio::test]
async fn malformed_frames_close_the_connection() {
    let node_b = test_node("dtn://b/");
    let address = free_address();
    node_b
        .register_listener(Listener::new(&address, "dtn://b/".parse().unwrap()))
        .await
        .unwrap();

    // Keep-alives are fine, garbage is not
    use tokio::io::AsyncWriteExt;
    let mut stream = tokio::net::TcpStream::connect(&address).await.unwrap();
    stream.write_all(&[0x40]).await.unwrap();
    stream.write_all(&[0xFF]).await.unwrap();

    // The listener side closes on the malformed frame
    let mut buffer = [0u8; 1];
    use tokio::io::AsyncReadExt;
    let read = tokio::time::timeout(Duration::from_secs(5), stream.read(&mut buffer)).await;
    assert!(matches!(read, Ok(Ok(0)) | Ok(Err(_))));

    node_b.shutdown().await;
}
