use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::backend::wire::PassengerNotification;
use crate::status_events::HostView;
use crate::types::VehicleId;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[arg(short, long, default_value_t = log::LevelFilter::Info)]
    pub logging_level: log::LevelFilter,

    #[arg(long)]
    pub config_file: std::path::PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Track one vehicle live.
    Track(TrackArgs),
    /// Register this device for push notifications.
    RegisterDevice {
        /// Push subscription as JSON.
        #[arg(long)]
        subscription: String,
        #[arg(long, default_value = "")]
        user_agent: String,
    },
    GenerateTicket {
        booking_id: String,
    },
    SendNotification {
        booking_id: String,
        #[arg(long, value_enum, default_value_t = NotificationKind::BookingConfirmation)]
        kind: NotificationKind,
    },
    ProcessPayment {
        booking_id: String,
        #[arg(long)]
        payment_type: String,
        #[arg(long)]
        amount: f64,
    },
}

#[derive(Args, Debug, Clone)]
pub struct TrackArgs {
    pub vehicle_id: VehicleId,

    /// Stop after this many seconds.
    #[arg(long)]
    pub duration: Option<u64>,

    #[arg(long, default_value_t = false)]
    pub gui: bool,

    #[arg(long, default_value_t = false)]
    pub follow: bool,

    /// Replay realtime events from a recorded file instead of the relay.
    #[arg(long)]
    pub read_event_stream: Option<std::path::PathBuf>,

    /// What the host is showing, for status events: none, bookings,
    /// trip:<name>, bus:<name> or sms:<name>.
    #[arg(long, default_value = "none")]
    pub view: HostView,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    BookingConfirmation,
    TripReminder,
}

impl From<NotificationKind> for PassengerNotification {
    fn from(kind: NotificationKind) -> Self {
        match kind {
            NotificationKind::BookingConfirmation => PassengerNotification::BookingConfirmation,
            NotificationKind::TripReminder => PassengerNotification::TripReminder,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Cli, Command, NotificationKind};
    use crate::status_events::HostView;
    use clap::Parser;

    #[test]
    fn when_track_is_parsed_then_vehicle_and_flags_are_read() {
        let cli = Cli::try_parse_from([
            "bus-tracker",
            "--config-file",
            "config.toml",
            "track",
            "BUS-7",
            "--follow",
            "--view",
            "bus:BUS-7",
        ])
        .unwrap();

        let Command::Track(args) = cli.command else {
            panic!("expected track");
        };
        assert_eq!(args.vehicle_id.as_str(), "BUS-7");
        assert!(args.follow);
        assert_eq!(args.view, HostView::Bus(String::from("BUS-7")));
        assert_eq!(cli.logging_level, log::LevelFilter::Info);
    }

    #[test]
    fn when_vehicle_id_is_blank_then_parsing_fails() {
        let result = Cli::try_parse_from(["bus-tracker", "--config-file", "c.toml", "track", " "]);
        assert!(result.is_err());
    }

    #[test]
    fn when_send_notification_kind_is_given_then_it_is_parsed() {
        let cli = Cli::try_parse_from([
            "bus-tracker",
            "--config-file",
            "c.toml",
            "send-notification",
            "BK-0042",
            "--kind",
            "trip-reminder",
        ])
        .unwrap();

        assert!(matches!(
            cli.command,
            Command::SendNotification {
                kind: NotificationKind::TripReminder,
                ..
            }
        ));
    }
}
