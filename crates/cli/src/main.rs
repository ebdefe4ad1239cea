use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use leito_core::{
    risk::ordered_by_name, BedService, CareLevel, ConfigValues, CoreConfig, FileStore,
};
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "leito")]
#[command(about = "Hospital bed management CLI")]
struct Cli {
    /// Directory holding the collection files (defaults to LEITO_DATA_DIR)
    #[arg(long, global = true)]
    data_dir: Option<String>,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Commands {
    /// List cohort restrictions of free beds
    Restrictions,
    /// List beds compatible with a patient
    Compatible {
        /// Patient id
        patient_id: String,
        /// Care level: ward/enfermaria or icu/uti
        #[arg(long, default_value = "ward")]
        care_level: String,
        /// Reference date for age computation (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        date: Option<String>,
        /// Also list rejected beds with the rule they failed
        #[arg(long)]
        explain: bool,
    },
    /// List contamination risks
    Risks,
    /// Show occupancy indicators
    Occupancy,
    /// Conclude a patient's active regulation
    Conclude {
        /// Patient id
        patient_id: String,
        /// Name of the user concluding the regulation
        #[arg(long = "by")]
        concluded_by: String,
        /// Extra bed ids to release (repeatable)
        #[arg(long = "release")]
        release: Vec<String>,
    },
    /// List concluded regulations, most recent first
    History,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let Some(command) = cli.command else {
        println!("No command given. Use --help to see available commands.");
        return Ok(());
    };

    let mut values = ConfigValues::from_lookup(|key| std::env::var(key).ok());
    if cli.data_dir.is_some() {
        values.data_dir = cli.data_dir;
    }
    let cfg = Arc::new(CoreConfig::from_env_values(values)?);
    let store = Arc::new(FileStore::open(cfg.data_dir())?);
    let service = BedService::new(cfg, store);

    match command {
        Commands::Restrictions => {
            let mut restrictions: Vec<_> = service.restrictions()?.into_iter().collect();
            restrictions.sort_by(|a, b| a.0.cmp(&b.0));
            if restrictions.is_empty() {
                println!("No restricted beds.");
            }
            for (bed_id, restriction) in restrictions {
                let tags: Vec<&str> = restriction
                    .isolation_tags
                    .iter()
                    .map(String::as_str)
                    .collect();
                println!(
                    "Bed: {}, Sex: {}, Isolation: [{}]",
                    bed_id,
                    restriction.sex.as_str(),
                    tags.join(", ")
                );
            }
        }
        Commands::Compatible {
            patient_id,
            care_level,
            date,
            explain,
        } => {
            let care_level: CareLevel = care_level.parse()?;
            let today = parse_date(date.as_deref())?;
            let assessments = if explain {
                service.assess_beds(&patient_id, care_level, today)?
            } else {
                service.compatible_beds(&patient_id, care_level, today)?
            };
            if assessments.is_empty() {
                println!("No compatible beds for patient {}.", patient_id);
            }
            for assessment in assessments {
                let verdict = match &assessment.rejection {
                    None => "compatible".to_string(),
                    Some(rejection) => format!("rejected: {}", rejection),
                };
                println!(
                    "Bed: {} ({}), Status: {}, Sector: {}, {}",
                    assessment.bed.id,
                    assessment.bed.code,
                    assessment.bed.status.to_wire(),
                    assessment.bed.sector_id.as_deref().unwrap_or("-"),
                    verdict
                );
            }
        }
        Commands::Risks => {
            let (snapshot, reports) = service.risks()?;
            let ordered = ordered_by_name(&reports, &snapshot.patients);
            if ordered.is_empty() {
                println!("No contamination risks.");
            }
            for (patient, report) in ordered {
                println!("Patient: {} ({})", patient.display_name(), patient.id);
                for detail in &report.details {
                    match &detail.companion_name {
                        Some(companion) => println!(
                            "  {:?} at {} with {}",
                            detail.reason, detail.location, companion
                        ),
                        None => println!("  {:?} at {}", detail.reason, detail.location),
                    }
                }
            }
        }
        Commands::Occupancy => {
            let summary = service.occupancy()?;
            for sector in &summary.sectors {
                println!(
                    "Sector: {}, Beds: {}, Occupied: {}, Rate: {:.1}%, Isolated: {}, Incoming: {}",
                    sector.sector_name,
                    sector.total_beds,
                    sector.occupied_beds,
                    sector.occupancy_rate * 100.0,
                    sector.isolated_patients,
                    sector.incoming_regulations
                );
            }
            println!(
                "Total: {} beds, {} occupied ({:.1}%), {} isolated, {} active regulations",
                summary.total_beds,
                summary.occupied_beds,
                summary.occupancy_rate * 100.0,
                summary.isolated_patients,
                summary.active_regulations
            );
        }
        Commands::Conclude {
            patient_id,
            concluded_by,
            release,
        } => {
            let outcome =
                service.conclude_regulation(&patient_id, release, &concluded_by, Utc::now())?;
            for line in &outcome.audit_lines {
                println!("{}", line);
            }
            println!("Beds updated: {}", outcome.touched_bed_ids.join(", "));
        }
        Commands::History => {
            let history = service.regulation_history()?;
            if history.is_empty() {
                println!("No concluded regulations.");
            }
            for record in history {
                let minutes = record
                    .tempo_regulacao_minutos
                    .map_or_else(|| "-".to_string(), |m| m.to_string());
                println!(
                    "Patient: {}, From: {}, To: {}, Minutes: {}, By: {}",
                    record.paciente_nome.as_deref().unwrap_or("-"),
                    record.leito_origem_id.as_deref().unwrap_or("-"),
                    record.leito_destino_final_id.as_deref().unwrap_or("-"),
                    minutes,
                    record.user_name_conclusao.as_deref().unwrap_or("-")
                );
            }
        }
    }

    Ok(())
}

fn parse_date(date: Option<&str>) -> Result<NaiveDate, chrono::ParseError> {
    match date {
        Some(date) => NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d"),
        None => Ok(Utc::now().date_naive()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_compatible_with_flags() {
        let cli = Cli::try_parse_from([
            "leito",
            "--data-dir",
            "/tmp/data",
            "compatible",
            "p1",
            "--care-level",
            "uti",
            "--explain",
        ])
        .expect("parse");
        assert_eq!(cli.data_dir.as_deref(), Some("/tmp/data"));
        assert_eq!(
            cli.command,
            Some(Commands::Compatible {
                patient_id: "p1".into(),
                care_level: "uti".into(),
                date: None,
                explain: true,
            })
        );
    }

    #[test]
    fn conclude_requires_user_and_collects_releases() {
        assert!(Cli::try_parse_from(["leito", "conclude", "p1"]).is_err());

        let cli = Cli::try_parse_from([
            "leito", "conclude", "p1", "--by", "Enf. Ana", "--release", "C", "--release", "D",
        ])
        .expect("parse");
        assert_eq!(
            cli.command,
            Some(Commands::Conclude {
                patient_id: "p1".into(),
                concluded_by: "Enf. Ana".into(),
                release: vec!["C".into(), "D".into()],
            })
        );
    }

    #[test]
    fn history_takes_no_arguments() {
        let cli = Cli::try_parse_from(["leito", "history"]).expect("parse");
        assert_eq!(cli.command, Some(Commands::History));
        assert!(Cli::try_parse_from(["leito", "history", "p1"]).is_err());
    }

    #[test]
    fn date_defaults_to_today_and_rejects_garbage() {
        assert_eq!(parse_date(None).expect("today"), Utc::now().date_naive());
        assert_eq!(
            parse_date(Some("2024-05-01")).expect("date"),
            NaiveDate::from_ymd_opt(2024, 5, 1).expect("valid date")
        );
        assert!(parse_date(Some("01/05/2024")).is_err());
    }
}
