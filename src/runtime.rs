//! Runtime services and shared state for herald-bot.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing::{Instrument, debug, error, info, info_span, instrument, warn};

use crate::{
    base::{
        config::Config,
        error::BotError,
        event::RawEvent,
        types::Void,
    },
    behaviour::{activity::ActivityTracker, dice::DiceRoller, ping::PingResponder},
    interaction::{dispatcher::Dispatcher, normalizer::Normalizer},
    service::{platform::PlatformClient, resolver::Resolver},
};

/// Runtime service context that can be shared across the application.
///
/// This struct holds the configuration, the platform client and the event
/// pipeline built on top of it. It is designed to be trivially cloneable,
/// allowing it to be passed around without the need for `Arc` or `Mutex`.
#[derive(Clone)]
pub struct Runtime {
    /// The configuration for the application.
    pub config: Config,
    /// The platform client instance.
    pub platform: PlatformClient,
    /// The caching entity resolver.
    pub resolver: Resolver,
    /// Resolves raw events before dispatch.
    pub normalizer: Normalizer,
    /// The listener registry.
    pub dispatcher: Arc<Dispatcher>,
    /// Per-event tasks, drained on shutdown.
    tasks: TaskTracker,
}

impl Runtime {
    /// Create a new runtime instance backed by Discord.
    #[instrument(skip_all)]
    pub fn new(config: Config) -> Self {
        let platform = PlatformClient::discord(&config);

        Self::with_platform(config, platform)
    }

    /// Create a new runtime instance on top of the given platform client.
    pub fn with_platform(config: Config, platform: PlatformClient) -> Self {
        let resolver = Resolver::new(platform.clone(), config.cache_ttl());
        let normalizer = Normalizer::new(Arc::new(resolver.clone()));
        let dispatcher = Arc::new(Dispatcher::new(Arc::new(platform.clone()), config.failure_emoji.clone()));

        Self {
            config,
            platform,
            resolver,
            normalizer,
            dispatcher,
            tasks: TaskTracker::new(),
        }
    }

    /// Register the stock behaviours.
    pub fn register_default_listeners(&self) -> Void {
        let responder = Arc::new(self.platform.clone());
        let reader = Arc::new(self.resolver.clone());

        self.dispatcher.add_listener("dice", Arc::new(DiceRoller::new(responder.clone())))?;
        self.dispatcher.add_listener("ping", Arc::new(PingResponder::new(responder.clone())))?;
        self.dispatcher.add_listener("activity", Arc::new(ActivityTracker::new(reader, responder, &self.config)))?;

        Ok(())
    }

    /// Run the gateway and handle its events until `shutdown` fires.
    pub async fn start(&self, shutdown: CancellationToken) -> Void {
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();

        let platform = self.platform.clone();
        let gateway_shutdown = shutdown.clone();
        let gateway = tokio::spawn(async move { platform.start(events_tx, gateway_shutdown).await });

        info!("Listening for events ...");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Shutdown requested, no longer accepting events.");
                    break;
                }
                event = events_rx.recv() => match event {
                    Some(event) => self.handle_event(event),
                    None => {
                        warn!("Gateway closed its event stream.");
                        break;
                    }
                },
            }
        }

        // Stop taking new work, but let in-flight events finish or time out.
        self.tasks.close();
        info!("Waiting for {} in-flight event(s) ...", self.tasks.len());
        self.tasks.wait().await;

        gateway.await??;

        Ok(())
    }

    /// Process one raw event in its own tracked task.
    ///
    /// In-flight events are not cancelled on shutdown; `start` waits for them to
    /// run to completion or time out.
    pub fn handle_event(&self, event: RawEvent) {
        let runtime = self.clone();
        let span = info_span!("event", kind = event.kind());

        self.tasks.spawn(
            async move {
                if let Err(err) = runtime.run_event(event).await {
                    error!("Failed to process event: {:#}", err);
                }
            }
            .instrument(span),
        );
    }

    /// Process one raw event, abandoning it once the configured timeout elapses.
    pub async fn run_event(&self, event: RawEvent) -> Void {
        let timeout = self.config.event_timeout();

        match tokio::time::timeout(timeout, self.process_event(event)).await {
            Ok(result) => result,
            Err(_) => Err(BotError::EventTimeout(timeout).into()),
        }
    }

    /// Route one raw event through the pipeline.
    pub async fn process_event(&self, event: RawEvent) -> Void {
        match event {
            RawEvent::MessageCreated(raw) => {
                if raw.from_self {
                    debug!("Ignoring own message {}.", raw.message_id);
                    return Ok(());
                }

                let message = self.normalizer.message_created(&raw).await;
                self.dispatcher.message_created(&message).await;
            }
            RawEvent::VoiceStateUpdated(raw) => {
                let update = self.normalizer.voice_state_updated(&raw).await;
                self.dispatcher.voice_state_updated(&update).await;
            }
            RawEvent::MemberUpdated(update) => {
                self.resolver.member_updated(&update);
            }
            RawEvent::ChannelUpdated(update) => {
                self.resolver.channel_updated(&update);
            }
        }

        Ok(())
    }
}
