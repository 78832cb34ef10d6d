/*!
The node context object.

Everything with process-wide lifetime lives here, constructed in
dependency order: storage backends and store first, then the CLA
manager, routing, the services registry, and finally the dispatcher
driving them. Subsystems receive handles at construction, so
initialisation order is a property of the code rather than a runtime
check, and teardown happens in reverse.
*/

use crate::{
    cla, config::Config, debug, dispatcher::Dispatcher, id_keeper::IdKeeper, info, routing,
    services,
    storage::{bundle_mem, metadata_mem},
    store::Store,
    warn, Arc,
};
use brant_bpv7::{bundle::Bundle, eid::EndpointId};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio_util::sync::CancellationToken;

pub struct Node {
    node_id: EndpointId,
    store: Arc<Store>,
    id_keeper: Arc<IdKeeper>,
    manager: Arc<cla::Manager>,
    services: Arc<services::Registry>,
    dispatcher: Arc<Dispatcher>,
    cancel: CancellationToken,
    tasks: tokio::sync::Mutex<Vec<tokio::task::JoinHandle<()>>>,
    shutdown: AtomicBool,
}

impl Node {
    /// Construct the node and start its periodic drivers.
    ///
    /// Without injected storage backends the node runs from memory; a
    /// durable deployment injects them via
    /// [`Config::metadata_storage`] and [`Config::bundle_storage`].
    pub fn new(mut config: Config) -> Arc<Self> {
        let metadata = config.metadata_storage.take().unwrap_or_else(|| {
            warn!("no metadata storage configured, bundles will not survive restarts");
            Arc::new(metadata_mem::Storage::new())
        });
        let bundles = config
            .bundle_storage
            .take()
            .unwrap_or_else(|| Arc::new(bundle_mem::Storage::new()));

        let node_id = config.node_id.clone();
        let store = Arc::new(Store::new(node_id.clone(), metadata, bundles));
        let id_keeper = Arc::new(IdKeeper::new());
        let manager = Arc::new(cla::Manager::new());
        let routing = routing::new(config.routing.algorithm, manager.clone());
        let services = Arc::new(services::Registry::new());
        let dispatcher = Dispatcher::new(
            node_id.clone(),
            store.clone(),
            routing,
            services.clone(),
        );
        manager.set_events(dispatcher.clone());

        let cancel = CancellationToken::new();
        let mut tasks = dispatcher.start(
            std::time::Duration::from_millis(config.cron.dispatch),
            std::time::Duration::from_millis(config.cron.gc),
            cancel.clone(),
        );
        tasks.push(Self::start_id_clean(
            id_keeper.clone(),
            std::time::Duration::from_millis(config.cron.id_clean),
            cancel.clone(),
        ));

        info!("node {node_id} is up");

        Arc::new(Self {
            node_id,
            store,
            id_keeper,
            manager,
            services,
            dispatcher,
            cancel,
            tasks: tokio::sync::Mutex::new(tasks),
            shutdown: AtomicBool::new(false),
        })
    }

    fn start_id_clean(
        id_keeper: Arc<IdKeeper>,
        period: std::time::Duration,
        cancel: CancellationToken,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(period);
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tick.tick() => {}
                }
                id_keeper.clean();
            }
            debug!("id keeper cleaning task stopped");
        })
    }

    pub fn node_id(&self) -> &EndpointId {
        &self.node_id
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    pub fn cla_manager(&self) -> &Arc<cla::Manager> {
        &self.manager
    }

    /// Register a CLA instance; see [`cla::Manager::register`].
    pub fn register_cla(&self, handle: cla::RegisterHandle) {
        self.manager.register(handle);
    }

    /// Open a listener; see [`cla::Manager::register_listener`].
    pub async fn register_listener(&self, listener: Arc<dyn cla::Listener>) -> cla::Result<()> {
        self.manager.register_listener(listener).await
    }

    pub fn register_service(&self, service: Arc<dyn services::Service>) -> services::Result<()> {
        self.services.register(service)
    }

    pub fn unregister_service(&self, name: &str) -> services::Result<()> {
        self.services.unregister(name)
    }

    /// Send a locally-created bundle: assign its sequence number and
    /// run it through the reception path, which stores it and schedules
    /// forwarding.
    pub async fn send(&self, mut bundle: Bundle) {
        self.id_keeper.update(&mut bundle);
        debug!("sending local bundle {}", bundle.id());
        self.dispatcher.receive(bundle).await;
    }

    /// Run one dispatch round immediately, ahead of the periodic tick.
    pub async fn dispatch_now(&self) {
        self.dispatcher.dispatch_pending().await;
    }

    /// Orderly teardown: stop the periodic drivers, close listeners and
    /// CLAs, drop services, and close the store. Idempotent.
    pub async fn shutdown(&self) {
        if self.shutdown.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("node {} shutting down", self.node_id);

        self.cancel.cancel();
        for task in self.tasks.lock().await.drain(..) {
            if let Err(e) = task.await {
                warn!("task failed during shutdown: {e}");
            }
        }

        self.manager.shutdown().await;
        self.services.shutdown();
        self.store.close().await;
    }
}
