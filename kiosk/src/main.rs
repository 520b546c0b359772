//! Check-in kiosk demo.
//!
//! Seeds a program catalog into the in-memory store, drives a few
//! registrants through submission and waitlist resolution, and logs the
//! resulting enrollment snapshot.

use std::sync::Arc;

use checkin_kiosk::{
    AttendeeKey, Capacity, CheckinService, Config, GradeTier, InMemoryRegistrationStore,
    Participation, PriorityClass, Program, ProgramId,
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "checkin_kiosk=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting check-in kiosk demo");

    let config = Config::from_env();
    info!(
        max_preferences = config.max_preferences,
        retry_limit = config.assign_retry_limit,
        "Configuration loaded"
    );

    let store = Arc::new(InMemoryRegistrationStore::new());
    let service = CheckinService::new(store, &config);

    // Seed the program catalog
    let robotics = Program::new(
        ProgramId::new(),
        "Robotics Lab".to_string(),
        Capacity::new(1),
        1,
    );
    let chemistry = Program::new(
        ProgramId::new(),
        "Chemistry Demo".to_string(),
        Capacity::new(2),
        2,
    );
    let robotics_id = robotics.id;
    let chemistry_id = chemistry.id;
    service.upsert_program(robotics).await?;
    service.upsert_program(chemistry).await?;

    // Walk-up registrants with ranked preferences
    let first = service
        .submit_registration(
            AttendeeKey::new("Yamada Taro", "やまだ たろう"),
            vec![robotics_id, chemistry_id],
            Participation::Programs,
            PriorityClass::Reserved,
        )
        .await?;
    info!(?first, "first registrant");

    let second = service
        .submit_registration(
            AttendeeKey::new("Sato Ren", "さとう れん"),
            vec![robotics_id, chemistry_id],
            Participation::Programs,
            PriorityClass::WalkIn {
                grade: GradeTier::Grade3,
            },
        )
        .await?;
    info!(?second, "second registrant gets the fallback choice");

    let third = service
        .submit_registration(
            AttendeeKey::new("Suzuki Hana", "すずき はな"),
            vec![robotics_id],
            Participation::Programs,
            PriorityClass::WalkIn {
                grade: GradeTier::Grade1,
            },
        )
        .await?;
    info!(?third, "third registrant waits for the full program");

    let briefing = service
        .submit_registration(
            AttendeeKey::new("Tanaka Yu", "たなか ゆう"),
            vec![],
            Participation::BriefingOnly,
            PriorityClass::Reserved,
        )
        .await?;
    info!(?briefing, "briefing-only visitor checked straight through");

    // The first registrant leaves; their seat frees up for the waitlist
    service
        .cancel_registration(first.registration_id())
        .await?;
    info!("first registrant cancelled");

    let report = service.resolve_waitlist(service.default_policy()).await?;
    info!(
        assigned = report.assigned_count,
        still_waiting = report.still_waiting_count,
        "waitlist resolved"
    );

    let snapshot = service.status_snapshot().await?;
    info!(
        snapshot = %serde_json::to_string_pretty(&snapshot)?,
        "final enrollment"
    );

    Ok(())
}
