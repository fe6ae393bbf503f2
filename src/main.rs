use std::path::PathBuf;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use serde::Serialize;
use sqlx::postgres::PgPoolOptions;

mod admin;
mod config;
mod db;
mod error;
mod geo;
mod logging;
mod models;
mod report;
mod store;
mod summary;
mod tracker;

use config::Config;
use db::PgStore;
use models::{AttendanceSummary, AuthorizedZone, Coordinate, LocationStatus, Role, UserUpdate};
use store::AttendanceStore;
use summary::Period;
use tracker::CheckInOutcome;

#[derive(Parser)]
#[command(name = "geofence-attendance")]
#[command(about = "Location-gated attendance tracker", long_about = None)]
struct Cli {
    /// UTC offset that defines calendar days, e.g. +05:30 (default: $ATTENDANCE_UTC_OFFSET or +00:00)
    #[arg(long, global = true, allow_hyphen_values = true)]
    utc_offset: Option<String>,
    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load demo users and a few attendance records
    Seed,
    /// Import attendance events from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Check a subject in from their current position
    CheckIn {
        #[arg(long)]
        subject: String,
        /// Omit both --lat and --lon when no location is available
        #[arg(long, requires = "lon", allow_negative_numbers = true)]
        lat: Option<f64>,
        #[arg(long, requires = "lat", allow_negative_numbers = true)]
        lon: Option<f64>,
    },
    /// Record attendance on someone's behalf
    Mark {
        #[arg(long)]
        subject: String,
        #[arg(long)]
        by: String,
        #[arg(long)]
        reason: Option<String>,
    },
    /// Show or change the authorized zone
    Zone {
        #[command(subcommand)]
        action: ZoneCommand,
    },
    /// Manage users
    User {
        #[command(subcommand)]
        action: UserCommand,
    },
    /// Week, month and quarter to date attendance for a subject
    Summary {
        #[arg(long)]
        subject: String,
        #[arg(long)]
        json: bool,
    },
    /// List records grouped by day, for one subject or everyone
    Records {
        #[arg(long)]
        subject: Option<String>,
        #[arg(long, default_value_t = 30)]
        since_days: i64,
    },
    /// Generate a markdown report for a subject
    Report {
        #[arg(long)]
        subject: String,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
    /// Distance from a position to the authorized zone
    Distance {
        #[arg(long, allow_negative_numbers = true)]
        lat: f64,
        #[arg(long, allow_negative_numbers = true)]
        lon: f64,
    },
}

#[derive(Subcommand)]
enum ZoneCommand {
    Show,
    Set {
        #[arg(long, allow_negative_numbers = true)]
        lat: f64,
        #[arg(long, allow_negative_numbers = true)]
        lon: f64,
        #[arg(long)]
        radius: f64,
        #[arg(long, default_value = "Office Location")]
        label: String,
    },
}

#[derive(Subcommand)]
enum UserCommand {
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long, default_value = "employee")]
        role: Role,
    },
    List {
        /// Case-insensitive match on name or email
        #[arg(long)]
        search: Option<String>,
    },
    Update {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        role: Option<Role>,
    },
    Delete {
        id: String,
    },
}

#[derive(Serialize)]
struct PeriodSummary {
    period: &'static str,
    #[serde(flatten)]
    summary: AttendanceSummary,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose);

    let config = Config::from_env();
    let calendar = config.calendar(cli.utc_offset.as_deref())?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(config.database_url()?)
        .await
        .context("failed to connect to Postgres")?;
    let store = PgStore::new(pool.clone());
    let now = Utc::now();

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&store, now).await?;
            println!("Seed data inserted.");
        }
        Commands::Import { csv } => {
            let inserted = db::import_csv(&store, &csv).await?;
            println!("Inserted {inserted} attendance events from {}.", csv.display());
        }
        Commands::CheckIn { subject, lat, lon } => {
            let current = match (lat, lon) {
                (Some(lat), Some(lon)) => Some(Coordinate::new(lat, lon)?),
                _ => None,
            };
            match tracker::check_in(&store, &subject, current, now, &calendar).await? {
                CheckInOutcome::NoLocation => {
                    println!("No location available; attendance not marked.");
                }
                CheckInOutcome::OutsideZone { distance_meters } => {
                    println!(
                        "Outside the authorized zone ({} away); attendance not marked.",
                        geo::format_distance(distance_meters)
                    );
                }
                CheckInOutcome::AlreadyMarked(event) => {
                    let record = summary::format_record(&event, &calendar);
                    println!("Already marked today at {} ({}).", record.time, record.kind);
                }
                CheckInOutcome::Marked(event) => {
                    let record = summary::format_record(&event, &calendar);
                    println!("Attendance marked at {} from {}.", record.time, record.location);
                }
            }
        }
        Commands::Mark {
            subject,
            by,
            reason,
        } => {
            let event = tracker::mark_manual(&store, &subject, &by, reason, now).await?;
            println!("Manual attendance recorded for {subject} ({}).", event.id);
        }
        Commands::Zone { action } => match action {
            ZoneCommand::Show => {
                let zone = store.current_zone().await?;
                println!(
                    "{}: {} radius {}",
                    zone.label,
                    zone.center,
                    geo::format_distance(zone.radius_meters)
                );
            }
            ZoneCommand::Set {
                lat,
                lon,
                radius,
                label,
            } => {
                let zone = AuthorizedZone::new(Coordinate::new(lat, lon)?, radius, label)?;
                let zone = admin::set_zone(&store, zone).await?;
                println!("Authorized zone set to {} at {}.", zone.label, zone.center);
            }
        },
        Commands::User { action } => match action {
            UserCommand::Add { name, email, role } => {
                let user = admin::create_user(&store, &name, &email, role, now).await?;
                println!("Created {} ({}).", user.name, user.id);
            }
            UserCommand::List { search } => {
                let users = store.list_users().await?;
                let matches = admin::filter_users(&users, search.as_deref().unwrap_or(""));
                if matches.is_empty() {
                    println!("No users found.");
                }
                for user in matches {
                    println!(
                        "- {} <{}> [{}] id {}",
                        user.name,
                        user.email,
                        user.role.as_str(),
                        user.id
                    );
                }
            }
            UserCommand::Update {
                id,
                name,
                email,
                role,
            } => {
                let user = admin::update_user(&store, &id, UserUpdate { name, email, role }).await?;
                println!("Updated {} ({}).", user.name, user.id);
            }
            UserCommand::Delete { id } => {
                admin::delete_user(&store, &id).await?;
                println!("Deleted {id}.");
            }
        },
        Commands::Summary { subject, json } => {
            let summaries = tracker::period_summaries(&store, &subject, now, &calendar).await?;
            if json {
                let rows: Vec<PeriodSummary> = summaries
                    .into_iter()
                    .map(|(period, summary)| PeriodSummary {
                        period: period.label(),
                        summary,
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&rows)?);
            } else {
                for (period, summary) in summaries {
                    println!(
                        "{}: {}/{} days present, {} absent ({:.1}%)",
                        period.label(),
                        summary.days_present,
                        summary.total_working_days,
                        summary.days_absent,
                        summary.attendance_percentage
                    );
                }
            }
        }
        Commands::Records {
            subject,
            since_days,
        } => {
            let events = tracker::recent_records(
                &store,
                subject.as_deref(),
                since_days,
                now,
                &calendar,
            )
            .await?;
            if events.is_empty() {
                println!("No records found for this window.");
                return Ok(());
            }
            for (date, day_events) in summary::group_by_date(&events, &calendar).iter().rev() {
                println!("{date}");
                for event in day_events {
                    let record = summary::format_record(event, &calendar);
                    println!(
                        "  {} {:<12} {:<9} {} ({})",
                        record.time, event.subject_id, record.kind, record.location, record.reason
                    );
                }
            }
        }
        Commands::Report { subject, out } => {
            let label = store
                .get_user(&subject)
                .await?
                .map(|user| user.name)
                .unwrap_or_else(|| subject.clone());
            let zone = store.current_zone().await?;
            let summaries = tracker::period_summaries(&store, &subject, now, &calendar).await?;
            let (quarter_start, _) = Period::QuarterToDate.window(now, &calendar);
            let events = store
                .events_for_subject(&subject, quarter_start, now)
                .await?;
            let report = report::build_report(&label, &zone, now, &calendar, &summaries, &events);
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
        Commands::Distance { lat, lon } => {
            let zone = store.current_zone().await?;
            let status = geo::location_status(Some(Coordinate::new(lat, lon)?), &zone)?;
            if let LocationStatus::Located { evaluation, .. } = status {
                println!(
                    "{} from {} ({}).",
                    geo::format_distance(evaluation.distance_meters),
                    zone.label,
                    if evaluation.is_inside { "inside" } else { "outside" }
                );
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn check_in_accepts_negative_coordinates_and_requires_both() {
        let cli = Cli::try_parse_from([
            "geofence-attendance",
            "check-in",
            "--subject",
            "u1",
            "--lat",
            "-33.86",
            "--lon",
            "151.2",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Commands::CheckIn { lat: Some(lat), lon: Some(_), .. } if lat < 0.0
        ));

        assert!(Cli::try_parse_from([
            "geofence-attendance",
            "check-in",
            "--subject",
            "u1",
            "--lat",
            "1.0",
        ])
        .is_err());
    }

    #[test]
    fn utc_offset_is_global() {
        let cli = Cli::try_parse_from([
            "geofence-attendance",
            "summary",
            "--subject",
            "u1",
            "--utc-offset",
            "-05:00",
        ])
        .unwrap();
        assert_eq!(cli.utc_offset.as_deref(), Some("-05:00"));
    }
}
