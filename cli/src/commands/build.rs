use agic_core::builder::{BuildContext, Clock, FixedClock, SystemClock};
use agic_core::config::read_configuration;
use agic_core::events::{Event, RecordedEvents};
use agic_core::kubernetes::SnapshotDocument;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::fs::File;
use std::path::Path;
use tabled::{Table, Tabled};
use tracing::{debug, warn};

use crate::cli::Cli;
use crate::commands::print_output;
use crate::table_theme::TableTheme;

#[derive(Tabled)]
struct EventRow {
    #[tabled(rename = "Type")]
    event_type: String,
    #[tabled(rename = "Reason")]
    reason: String,
    #[tabled(rename = "Object")]
    object: String,
    #[tabled(rename = "Message")]
    message: String,
}

impl From<&Event> for EventRow {
    fn from(event: &Event) -> Self {
        Self {
            event_type: event.event_type().to_string(),
            reason: event.reason().to_string(),
            object: event.object().to_string(),
            message: event.message().clone(),
        }
    }
}

fn events_table(events: &[Event]) -> Table {
    TableTheme::apply_messages(Table::new(events.iter().map(EventRow::from)))
}

pub fn handle_build_command(
    config: &Path,
    snapshot: &Path,
    now: Option<DateTime<Utc>>,
    quiet: bool,
    cli: &Cli,
) -> Result<()> {
    let configuration = read_configuration(
        File::open(config).with_context(|| format!("Unable to open {}", config.display()))?,
    )
    .with_context(|| format!("Unable to load configuration from {}", config.display()))?;

    let document = SnapshotDocument::from_reader(
        File::open(snapshot).with_context(|| format!("Unable to open {}", snapshot.display()))?,
    )?;
    let (snapshot, existing) = document.into_parts(configuration.ingress_class())?;
    debug!("Loaded snapshot, compiling gateway {}", configuration.gateway_name());

    let clock: Box<dyn Clock> = match now {
        Some(now) => Box::new(FixedClock::new(now)),
        None => Box::new(SystemClock),
    };
    let recorder = RecordedEvents::new();
    let context = BuildContext::builder()
        .configuration(&configuration)
        .snapshot(&snapshot)
        .existing(&existing)
        .clock(clock.as_ref())
        .recorder(&recorder)
        .build();

    let result = agic_core::build(&context);

    let events = recorder.into_events();
    if !quiet && !events.is_empty() {
        eprintln!("{}", events_table(&events));
    }

    let gateway = result.context("Unable to build the gateway configuration")?;
    if !events.is_empty() {
        warn!("Build finished with {} events", events.len());
    }
    print_output(&gateway, cli.output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use agic_core::events::{EventReason, EventType};
    use agic_core::kubernetes::ObjectKey;
    use assertables::{assert_err, assert_ok};
    use clap::Parser;
    use std::path::PathBuf;
    use tempfile::TempDir;

    const CONFIGURATION: &str = r"
subscriptionId: 00000000-0000-0000-0000-000000000000
resourceGroup: rg-ingress
gatewayName: appgw
";

    const SNAPSHOT: &str = r"
ingresses:
  - metadata:
      name: web
      namespace: default
      annotations:
        kubernetes.io/ingress.class: azure/application-gateway
    spec:
      defaultBackend:
        service:
          name: web
          port:
            number: 80
";

    fn write_inputs(dir: &TempDir) -> (PathBuf, PathBuf) {
        let config = dir.path().join("config.yaml");
        let snapshot = dir.path().join("snapshot.yaml");
        std::fs::write(&config, CONFIGURATION).unwrap();
        std::fs::write(&snapshot, SNAPSHOT).unwrap();
        (config, snapshot)
    }

    fn cli() -> Cli {
        Cli::try_parse_from(["agicctl", "build", "-c", "unused", "-s", "unused"]).unwrap()
    }

    #[test]
    fn test_build_from_files() {
        let dir = TempDir::new().unwrap();
        let (config, snapshot) = write_inputs(&dir);

        assert_ok!(handle_build_command(
            &config,
            &snapshot,
            Some(Utc::now()),
            true,
            &cli()
        ));
    }

    #[test]
    fn test_build_reports_missing_configuration() {
        let dir = TempDir::new().unwrap();
        let (_, snapshot) = write_inputs(&dir);
        let missing = dir.path().join("missing.yaml");

        let error = assert_err!(handle_build_command(&missing, &snapshot, None, true, &cli()));
        assert!(error.to_string().contains("missing.yaml"));
    }

    #[test]
    fn test_events_table_has_uppercase_headers() {
        let events = vec![Event::builder()
            .object(ObjectKey::new("ns", "web"))
            .reason(EventReason::ServiceNotFound)
            .message("Service ns/missing not found")
            .build()];

        let rendered = events_table(&events).to_string();

        assert!(rendered.contains("REASON"));
        assert!(rendered.contains("ServiceNotFound"));
        assert!(rendered.contains("ns/web"));
        assert!(rendered.contains(&EventType::Warning.to_string()));
    }
}
