use bus_tracker::backend::Backend;
use bus_tracker::backend::http::HttpBackend;
use bus_tracker::backend::wire::{ActionStatus, PaymentDetails};
use bus_tracker::backend::{
    GENERATE_TICKET, PROCESS_PAYMENT, SEND_NOTIFICATION, error::BackendError, require_success,
};
use bus_tracker::cli::{Cli, Command, TrackArgs};
use bus_tracker::config::ApplicationConfig;
use bus_tracker::logging::setup_logging;
use bus_tracker::notifications::NotificationHandler;
use bus_tracker::notifications::device::{DeviceIdStore, register_push_device};
use bus_tracker::notifications::metrics::metrics_channel;
use bus_tracker::notifications::sink::{LogSink, NoopSink, NotificationSink};
use bus_tracker::realtime::channels::{ROUTE_DEVIATION, SERVICE_ALERT, STATUS_EVENTS};
use bus_tracker::realtime::event_bus::EventBus;
use bus_tracker::realtime::feed::RealtimeFeed;
use bus_tracker::realtime::{ListenerTask, RealtimeChannel};
use bus_tracker::status_events::{LoggingHost, StatusEventHandler};
use bus_tracker::surface::scene::SceneSurface;
use bus_tracker::surface::terminal::TerminalRenderer;
use bus_tracker::thread_manager::ThreadManager;
use bus_tracker::tracker::{Collaborators, TrackerSession, TrackerTask};
use clap::Parser;
use log::info;

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    setup_logging(cli.logging_level);

    let application_config = match ApplicationConfig::construct_from_path(&cli.config_file) {
        Ok(config) => config,
        Err(e) => {
            log::error!("{e}");
            return std::process::ExitCode::FAILURE;
        }
    };
    info!("Main: Application started.");

    let backend: std::sync::Arc<dyn Backend> =
        match HttpBackend::new(&application_config.backend) {
            Ok(backend) => std::sync::Arc::new(backend),
            Err(e) => {
                log::error!("Error constructing backend client: {e}");
                return std::process::ExitCode::FAILURE;
            }
        };

    let outcome = match cli.command {
        Command::Track(args) => track(&application_config, backend, &args),
        Command::RegisterDevice {
            subscription,
            user_agent,
        } => register_device(&application_config, backend.as_ref(), &subscription, &user_agent),
        Command::GenerateTicket { booking_id } => report_action(
            GENERATE_TICKET,
            backend.generate_ticket(&booking_id),
        ),
        Command::SendNotification { booking_id, kind } => report_action(
            SEND_NOTIFICATION,
            backend.send_notification(&booking_id, kind.into()),
        ),
        Command::ProcessPayment {
            booking_id,
            payment_type,
            amount,
        } => report_action(
            PROCESS_PAYMENT,
            backend.process_payment(
                &booking_id,
                &PaymentDetails {
                    payment_type,
                    amount,
                },
            ),
        ),
    };

    match outcome {
        Ok(()) => {
            info!("Main: Program finished.");
            std::process::ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("{e}");
            std::process::ExitCode::FAILURE
        }
    }
}

fn notification_sink(config: &ApplicationConfig) -> Box<dyn NotificationSink> {
    if config.notifications.enabled {
        Box::new(LogSink)
    } else {
        Box::new(NoopSink)
    }
}

fn track(
    config: &ApplicationConfig,
    backend: std::sync::Arc<dyn Backend>,
    args: &TrackArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let bus = EventBus::new();
    let realtime: std::sync::Arc<dyn RealtimeChannel> = std::sync::Arc::new(bus.clone());
    let mut thread_manager = ThreadManager::new();

    let feed = match (&args.read_event_stream, &config.realtime) {
        (Some(path), _) => Some(RealtimeFeed::from_file(path, bus.clone())?),
        (None, Some(realtime_config)) => Some(RealtimeFeed::connect(realtime_config, bus.clone())?),
        (None, None) => {
            log::warn!("No realtime source configured, only the initial route will be shown.");
            None
        }
    };

    let surface = SceneSurface::new();
    let scene_viewer = surface.viewer();
    let mut session = TrackerSession::create(
        args.vehicle_id.clone(),
        Box::new(surface),
        Collaborators {
            backend: backend.clone(),
            realtime: realtime.clone(),
        },
        config.tracker.settings(),
    );
    if args.follow {
        session.start_following();
    }

    let (metrics_queue, metrics_reporter) = metrics_channel(backend);
    let notification_listener = ListenerTask::new(
        "notifications",
        NotificationHandler::new(
            notification_sink(config),
            metrics_queue,
            &config.notifications.scope,
        ),
        realtime.clone(),
        &[SERVICE_ALERT, ROUTE_DEVIATION],
    );
    let status_listener = ListenerTask::new(
        "status-events",
        StatusEventHandler::new(LoggingHost::new(args.view.clone())),
        realtime,
        &STATUS_EVENTS,
    );

    let tracker_task_id = thread_manager.add_task(
        TrackerTask::new(session, config.tracker.poll_interval()),
        std::time::Duration::ZERO,
    );
    thread_manager.add_task(notification_listener, std::time::Duration::ZERO);
    thread_manager.add_task(status_listener, std::time::Duration::ZERO);
    thread_manager.add_task(metrics_reporter, std::time::Duration::ZERO);
    thread_manager.add_task(
        TerminalRenderer::new(scene_viewer.clone()),
        std::time::Duration::from_secs(1),
    );
    if let Some(feed) = feed {
        thread_manager.add_task(feed, std::time::Duration::ZERO);
    }

    if args.gui {
        run_gui(scene_viewer);
        thread_manager.stop_all_tasks();
    } else if let Some(duration) = args.duration {
        std::thread::sleep(std::time::Duration::from_secs(duration));
        thread_manager.stop_all_tasks();
    }

    thread_manager.wait_on_task_finish(tracker_task_id);
    thread_manager.stop_all_tasks();
    thread_manager.wait_on_all_tasks();
    Ok(())
}

#[cfg(feature = "gui")]
fn run_gui(scene_viewer: bus_tracker::surface::scene::SceneViewer) {
    if let Err(e) = bus_tracker::gui::run(scene_viewer) {
        log::error!("Map window failed: {e}");
    }
}

#[cfg(not(feature = "gui"))]
fn run_gui(_scene_viewer: bus_tracker::surface::scene::SceneViewer) {
    log::warn!("Built without the gui feature, --gui is ignored.");
}

fn register_device(
    config: &ApplicationConfig,
    backend: &dyn Backend,
    subscription: &str,
    user_agent: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let subscription: serde_json::Value = serde_json::from_str(subscription)?;
    let sink = notification_sink(config);
    let store = DeviceIdStore::new(&config.notifications.device_id_file);
    match register_push_device(
        backend,
        sink.as_ref(),
        &store,
        &subscription,
        user_agent,
        config.notifications.app_version.as_deref(),
    )? {
        Some(registration) => info!("Device {} registered.", registration.device_id),
        None => info!("Notifications are disabled, device not registered."),
    }
    Ok(())
}

fn report_action(
    method: &str,
    result: Result<ActionStatus, BackendError>,
) -> Result<(), Box<dyn std::error::Error>> {
    let status = require_success(method, result?)?;
    info!(
        "{method}: {}",
        status.message.as_deref().unwrap_or("success")
    );
    for (key, value) in &status.details {
        info!("  {key}: {value}");
    }
    Ok(())
}
