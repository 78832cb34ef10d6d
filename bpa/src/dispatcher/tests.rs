use super::*;
use crate::{
    cla::dummy::DummyCla,
    routing::AlgorithmKind,
    services::{Registry, Service},
    storage::{bundle_mem, metadata_mem},
    store::BundleDescriptor,
};
use brant_bpv7::{
    block::BlockData, builder::Builder, creation_timestamp::CreationTimestamp,
};
use std::sync::Mutex;

struct Fixture {
    manager: Arc<cla::Manager>,
    dispatcher: Arc<Dispatcher>,
    store: Arc<Store>,
    services: Arc<Registry>,
}

fn fixture(node_id: &str) -> Fixture {
    let store = Arc::new(Store::new(
        node_id.parse().unwrap(),
        Arc::new(metadata_mem::Storage::new()),
        Arc::new(bundle_mem::Storage::new()),
    ));
    let manager = Arc::new(cla::Manager::new());
    let routing = routing::new(AlgorithmKind::Epidemic, manager.clone());
    let services = Arc::new(Registry::new());
    let dispatcher = Dispatcher::new(
        node_id.parse().unwrap(),
        store.clone(),
        routing,
        services.clone(),
    );
    manager.set_events(dispatcher.clone());
    Fixture {
        manager,
        dispatcher,
        store,
        services,
    }
}

fn bundle(source: &str, destination: &str) -> Bundle {
    Builder::new(source.parse().unwrap(), destination.parse().unwrap())
        .lifetime(600_000)
        .payload(b"hi".to_vec())
        .build(CreationTimestamp::now())
}

async fn settle() {
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
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
}

#[async_trait]
impl Service for CapturingService {
    fn name(&self) -> String {
        "capture".to_string()
    }

    fn endpoints(&self) -> Vec<EndpointId> {
        vec![self.endpoint.clone()]
    }

    async fn deliver(&self, descriptor: &BundleDescriptor) -> services::Result<()> {
        self.delivered
            .lock()
            .expect("delivered lock poisoned")
            .push(descriptor.clone());
        Ok(())
    }
}

#[tokio::test]
async fn received_bundles_are_stored_dispatchable() {
    let f = fixture("dtn://node/");
    let b = bundle("dtn://src/app", "dtn://dst/app");

    f.dispatcher.receive(b.clone()).await;

    let descriptor = f.store.load(&b.id()).await.unwrap().unwrap();
    assert!(descriptor.dispatch());
    assert!(descriptor.retain());
    assert_eq!(
        descriptor.already_sent_to,
        vec!["dtn://node/".parse().unwrap()]
    );
}

#[tokio::test]
async fn forwarding_reaches_selected_peer() {
    let f = fixture("dtn://node/");
    let cla = DummyCla::new("dummy://b", "dtn://b/");
    f.manager.register(cla.handle());
    settle().await;

    let b = bundle("dtn://src/app", "dtn://dst/app");
    f.dispatcher.receive(b.clone()).await;
    f.dispatcher.dispatch_pending().await;

    // The successful peer is recorded, and the bundle is no longer
    // pending in any way
    let descriptor = f.store.load(&b.id()).await.unwrap().unwrap();
    assert!(descriptor
        .already_sent_to
        .contains(&"dtn://b/".parse().unwrap()));
    assert!(!descriptor.has_constraint(Constraint::ForwardPending));
    assert!(!descriptor.dispatch());

    // The transmitted copy carries our node ID in its Previous Node
    // block; the stored body is unchanged
    let sent = cla.sent_bundles();
    assert_eq!(sent.len(), 1);
    assert_eq!(
        sent[0].previous_node().unwrap(),
        &"dtn://node/".parse::<EndpointId>().unwrap()
    );
    assert_eq!(sent[0].payload().unwrap(), b"hi");
    assert!(f
        .store
        .load_body(&descriptor)
        .await
        .unwrap()
        .previous_node()
        .is_none());
}

#[tokio::test]
async fn forwarding_replaces_previous_node_block() {
    let f = fixture("dtn://node/");
    let cla = DummyCla::new("dummy://b", "dtn://b/");
    f.manager.register(cla.handle());
    settle().await;

    let b = Builder::new(
        "dtn://src/app".parse().unwrap(),
        "dtn://dst/app".parse().unwrap(),
    )
    .lifetime(600_000)
    .payload(b"hi".to_vec())
    .add_extension(
        Default::default(),
        BlockData::PreviousNode("dtn://upstream/".parse().unwrap()),
    )
    .build(CreationTimestamp::now());

    f.dispatcher.receive(b.clone()).await;
    f.dispatcher.dispatch_pending().await;

    let sent = cla.sent_bundles();
    assert_eq!(sent.len(), 1);
    assert_eq!(
        sent[0].previous_node().unwrap(),
        &"dtn://node/".parse::<EndpointId>().unwrap()
    );

    // The upstream sender was recorded from the Previous Node hint
    let descriptor = f.store.load(&b.id()).await.unwrap().unwrap();
    assert!(descriptor
        .already_sent_to
        .contains(&"dtn://upstream/".parse().unwrap()));
}

#[tokio::test]
async fn contraindicated_bundle_waits_for_peer() {
    let f = fixture("dtn://node/");
    let b = bundle("dtn://src/app", "dtn://dst/app");

    f.dispatcher.receive(b.clone()).await;
    f.dispatcher.dispatch_pending().await;

    // No peers: back to exactly {DispatchPending}
    let descriptor = f.store.load(&b.id()).await.unwrap().unwrap();
    assert_eq!(descriptor.constraints, vec![Constraint::DispatchPending]);

    // A peer appears; the next dispatch round forwards the bundle
    let cla = DummyCla::new("dummy://c", "dtn://c/");
    f.manager.register(cla.handle());
    settle().await;
    f.dispatcher.dispatch_pending().await;

    let descriptor = f.store.load(&b.id()).await.unwrap().unwrap();
    assert!(descriptor
        .already_sent_to
        .contains(&"dtn://c/".parse().unwrap()));
    assert!(!descriptor.has_constraint(Constraint::ForwardPending));
    assert_eq!(cla.sent_bundles().len(), 1);
}

#[tokio::test]
async fn peers_already_holding_the_bundle_are_skipped() {
    let f = fixture("dtn://node/");
    let cla_b = DummyCla::new("dummy://b", "dtn://b/");
    let cla_c = DummyCla::new("dummy://c", "dtn://c/");
    f.manager.register(cla_b.handle());
    f.manager.register(cla_c.handle());
    settle().await;

    // The bundle arrived from b, per its Previous Node block
    let b = Builder::new(
        "dtn://src/app".parse().unwrap(),
        "dtn://dst/app".parse().unwrap(),
    )
    .lifetime(600_000)
    .payload(b"hi".to_vec())
    .add_extension(
        Default::default(),
        BlockData::PreviousNode("dtn://b/".parse().unwrap()),
    )
    .build(CreationTimestamp::now());

    f.dispatcher.receive(b.clone()).await;
    f.dispatcher.dispatch_pending().await;

    assert!(cla_b.sent_bundles().is_empty());
    assert_eq!(cla_c.sent_bundles().len(), 1);

    // A second round sends nothing new anywhere
    f.dispatcher.dispatch_pending().await;
    assert!(cla_b.sent_bundles().is_empty());
    assert_eq!(cla_c.sent_bundles().len(), 1);
}

#[tokio::test]
async fn oversized_bundles_fragment_for_the_sender() {
    let f = fixture("dtn://node/");
    let cla = DummyCla::with_max_bundle_size("dummy://b", "dtn://b/", 300);
    f.manager.register(cla.handle());
    settle().await;

    let b = Builder::new(
        "dtn://src/app".parse().unwrap(),
        "dtn://dst/app".parse().unwrap(),
    )
    .lifetime(600_000)
    .payload(vec![0x42; 1024])
    .build(CreationTimestamp::now());

    f.dispatcher.receive(b.clone()).await;
    f.dispatcher.dispatch_pending().await;

    let sent = cla.sent_bundles();
    assert!(sent.len() >= 4);
    for fragment in &sent {
        assert!(fragment.is_fragment());
        assert!(fragment.to_cbor().len() <= 300);
    }
    let reassembled = brant_bpv7::fragmentation::reassemble(sent).unwrap();
    assert_eq!(reassembled.payload().unwrap(), vec![0x42; 1024]);
}

#[tokio::test]
async fn local_bundles_are_delivered() {
    let f = fixture("dtn://node/");
    let service = CapturingService::new("dtn://node/app");
    f.services.register(service.clone()).unwrap();

    let b = bundle("dtn://src/app", "dtn://node/app");
    f.dispatcher.receive(b.clone()).await;

    let delivered = service.delivered.lock().unwrap();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].id, b.id());
}

#[tokio::test]
async fn fragments_for_us_are_reassembled_and_delivered() {
    let f = fixture("dtn://node/");
    let service = CapturingService::new("dtn://node/app");
    f.services.register(service.clone()).unwrap();

    let original = Builder::new(
        "dtn://src/app".parse().unwrap(),
        "dtn://node/app".parse().unwrap(),
    )
    .lifetime(600_000)
    .payload((0..=255u8).cycle().take(1024).collect())
    .build(CreationTimestamp::now());

    let fragments = original.fragment(300).unwrap();
    assert!(fragments.len() > 1);

    for fragment in &fragments {
        f.dispatcher.receive(fragment.clone()).await;
    }

    // The reassembled bundle was delivered once all parts arrived
    let delivered = service.delivered.lock().unwrap();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].id, original.id());

    // The delivered descriptor resolves to the full payload
    drop(delivered);
    let descriptor = f.store.load(&original.id()).await.unwrap().unwrap();
    let body = f.store.load_body(&descriptor).await.unwrap();
    assert_eq!(body.payload().unwrap(), original.payload().unwrap());

    // Fragment descriptors are released for garbage collection
    for fragment in &fragments {
        let d = f.store.load(&fragment.id()).await.unwrap().unwrap();
        assert!(!d.has_constraint(Constraint::ReassemblyPending));
    }
}

#[tokio::test]
async fn duplicate_reception_is_idempotent() {
    let f = fixture("dtn://node/");
    let b = Builder::new(
        "dtn://src/app".parse().unwrap(),
        "dtn://dst/app".parse().unwrap(),
    )
    .lifetime(600_000)
    .payload(b"hi".to_vec())
    .add_extension(
        Default::default(),
        BlockData::PreviousNode("dtn://upstream/".parse().unwrap()),
    )
    .build(CreationTimestamp::now());

    f.dispatcher.receive(b.clone()).await;
    f.dispatcher.receive(b.clone()).await;

    let descriptor = f.store.load(&b.id()).await.unwrap().unwrap();
    let upstream: EndpointId = "dtn://upstream/".parse().unwrap();
    assert_eq!(
        descriptor
            .already_sent_to
            .iter()
            .filter(|e| **e == upstream)
            .count(),
        1
    );
    assert_eq!(f.store.get_dispatchable().await.unwrap().len(), 1);
}
