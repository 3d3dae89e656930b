use clap::Parser;
use ims_presence::sim::{RecordingPublication, SimPlatform, ThrottlingSubscriber};
use ims_presence::registration::PresenceSubscriber;
use ims_presence::{
    utils, BindingState, ManagerConfig, MmTelCapabilities, RcsService, RegError,
    RegistrationManager, SubscriptionId, TransportType,
};
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

/// IMS presence binding simulator
///
/// Runs the registration manager against an in-memory platform and prints
/// every call the presence publication collaborator receives.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Active subscriptions, comma separated; ":o" marks an opportunistic one (e.g. 1,2:o)
    #[arg(short, long, env = "IMS_SUBSCRIPTIONS", default_value = "1")]
    subscriptions: String,

    /// Default voice subscription id (-1 for none)
    #[arg(short, long, env = "IMS_DEFAULT_VOICE", default_value_t = -1, allow_negative_numbers = true)]
    default_voice: i32,

    /// Number of transient IMS failures before registration succeeds
    #[arg(short, long, default_value_t = 0)]
    transient_failures: u32,

    /// Retry delay in milliseconds
    #[arg(short, long, env = "IMS_RETRY_DELAY_MS", default_value_t = 5000)]
    retry_delay_ms: u64,

    /// Switch the default voice subscription to this id once bound
    #[arg(long)]
    switch_to: Option<i32>,

    /// Toggle mobile data off during the run
    #[arg(long)]
    mobile_data_off: bool,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    utils::initialize_logging(args.log_level.as_str());

    let subscriptions = utils::parse_subscriptions(&args.subscriptions)?;
    let default_voice = SubscriptionId::new(args.default_voice);
    let retry_delay = Duration::from_millis(args.retry_delay_ms);

    let platform = Arc::new(SimPlatform::new());
    platform.set_subscriptions(subscriptions.clone(), default_voice);
    for _ in 0..args.transient_failures {
        platform.fail_next_registration(RegError::ServiceUnavailable("IMS service restarting".into()));
    }

    let publication = Arc::new(RecordingPublication::new());
    let config = ManagerConfig::new().with_retry_delay(retry_delay);
    let manager = RegistrationManager::start(config, platform.collaborators(publication.clone()))?;
    let subscriber: Arc<dyn PresenceSubscriber> = Arc::new(ThrottlingSubscriber::new());
    let service = RcsService::new(manager, Some(subscriber));
    let manager = service.manager();

    manager.flush().await?;

    // 等待重试完成
    let mut state = manager.watch_state();
    let budget = retry_delay * (args.transient_failures + 1);
    let timed_out = tokio::time::timeout(
        budget,
        state.wait_for(|s| !matches!(s.binding, BindingState::RetryPending(_))),
    )
    .await
    .is_err();
    if timed_out {
        warn!("registration still pending after {}ms", budget.as_millis());
    }

    match manager.binding_state() {
        BindingState::Bound(sub) => {
            info!("bound to sub {}", sub);
            platform.emit_registered(sub, TransportType::Wwan);
            platform.emit_capabilities(
                sub,
                MmTelCapabilities::default()
                    .with(MmTelCapabilities::VOICE)
                    .with(MmTelCapabilities::VIDEO),
            );
        }
        other => info!("not bound: {:?}", other),
    }
    manager.flush().await?;

    if let Some(switch_to) = args.switch_to {
        let target = SubscriptionId::new(switch_to);
        let mut next = subscriptions.clone();
        if !next.iter().any(|s| s.id == target) {
            next.push(ims_presence::SubscriptionInfo::new(target, false));
        }
        info!("switching default voice to sub {}", target);
        platform.set_subscriptions(next, target);
        manager.subscriptions_changed();
        manager.flush().await?;
    }

    if args.mobile_data_off {
        platform.set_mobile_data(false);
        manager.mobile_data_changed(false).await?;
    }

    info!(
        "service available: {}, publish state: {:?}",
        service.is_rcs_service_available(),
        service.publish_state()
    );

    service.shutdown().await?;

    println!("Publication events:");
    for event in publication.events() {
        println!("  {:?}", event);
    }
    println!("Platform calls:");
    for call in platform.calls() {
        println!("  {:?}", call);
    }

    Ok(())
}
