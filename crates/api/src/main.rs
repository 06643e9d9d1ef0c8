//! Service entry point: wires all four participants onto one bus.

use std::sync::Arc;

use bus::{
    ConsumerWorker, EventHandler, EventPublisher, InMemoryBus, MessageBus, RetryPolicy,
};
use events::topics;
use saga::{
    EmailNotifier, InMemoryOrderStore, InMemoryPaymentStore, InMemoryRiskStore,
    InMemorySentLedger, NotificationService, OrderService, PaymentService, RiskService,
    SimulatedGateway,
};
use tokio::signal;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use api::config::Config;
use api::routes::orders::AppState;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

/// Spawns `workers` consumer workers per topic for one participant.
async fn spawn_participant<B, H>(
    bus: &B,
    group: &str,
    subscribed: &[&str],
    handler: Arc<H>,
    policy: RetryPolicy,
    shutdown: &watch::Receiver<bool>,
    workers: usize,
    tasks: &mut Vec<JoinHandle<()>>,
) where
    B: MessageBus + Clone + 'static,
    H: EventHandler + 'static,
{
    for topic in subscribed {
        for _ in 0..workers {
            let worker = ConsumerWorker::new(
                bus.clone(),
                group,
                *topic,
                handler.clone(),
                policy,
                shutdown.clone(),
            )
            .await
            .expect("failed to subscribe consumer worker");
            tasks.push(tokio::spawn(worker.run()));
        }
    }
}

#[tokio::main]
async fn main() {
    // 1. Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    tracing::info!(bus = %config.bus_bootstrap, "starting payment saga services");

    // 2. The bus and the per-participant wiring. The in-memory bus
    //    provides the broker contract in-process; stores are in-memory
    //    unless an operator build selects the Postgres implementations.
    let bus = InMemoryBus::new();
    let consumer_policy = RetryPolicy {
        max_retries: config.saga_max_retries,
        ..RetryPolicy::consumer()
    };

    let order_service = Arc::new(OrderService::new(
        InMemoryOrderStore::new(),
        EventPublisher::new(bus.clone()),
    ));
    let risk_service = Arc::new(RiskService::new(
        InMemoryRiskStore::new(),
        EventPublisher::new(bus.clone()),
    ));
    let payment_service = Arc::new(PaymentService::new(
        InMemoryPaymentStore::new(),
        SimulatedGateway::new(),
        EventPublisher::new(bus.clone()),
    ));
    let notification_service = Arc::new(NotificationService::new(
        EmailNotifier,
        InMemorySentLedger::new(),
    ));

    // 3. Consumer workers, one group per participant
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut tasks = Vec::new();

    spawn_participant(
        &bus,
        &config.order_group,
        &[topics::RISK_EVENTS, topics::PAYMENT_EVENTS],
        order_service.clone(),
        consumer_policy,
        &shutdown_rx,
        config.consumer_workers,
        &mut tasks,
    )
    .await;
    spawn_participant(
        &bus,
        &config.risk_group,
        &[topics::PAYMENT_SAGA, topics::SAGA_COMPENSATION],
        risk_service,
        consumer_policy,
        &shutdown_rx,
        config.consumer_workers,
        &mut tasks,
    )
    .await;
    spawn_participant(
        &bus,
        &config.payment_group,
        &[topics::RISK_EVENTS, topics::SAGA_COMPENSATION],
        payment_service,
        consumer_policy,
        &shutdown_rx,
        config.consumer_workers,
        &mut tasks,
    )
    .await;
    spawn_participant(
        &bus,
        &config.notification_group,
        &[topics::PAYMENT_EVENTS, topics::SAGA_COMPENSATION],
        notification_service,
        consumer_policy,
        &shutdown_rx,
        config.consumer_workers,
        &mut tasks,
    )
    .await;

    // 4. REST surface
    let state = Arc::new(AppState { order_service });
    let app = api::create_app(state);

    let addr = config.addr();
    tracing::info!(%addr, "starting API server");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    // 5. Drain consumers: stop polling, finish in-flight handlers, exit.
    shutdown_tx.send(true).expect("shutdown channel closed");
    for task in tasks {
        if let Err(err) = task.await {
            tracing::error!(%err, "consumer worker panicked");
        }
    }

    tracing::info!("all participants shut down gracefully");
}
