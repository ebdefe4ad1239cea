//! Constants used throughout the core crate.
//!
//! File names of the data directory and the defaults of [`crate::CoreConfig`].

/// Environment keys read by the binaries and handed to [`crate::config::ConfigValues`].
pub const ENV_DATA_DIR: &str = "LEITO_DATA_DIR";
pub const ENV_OPEN_SECTOR_LABELS: &str = "LEITO_OPEN_SECTOR_LABELS";
pub const ENV_PROTECTED_MIN_AGE: &str = "LEITO_PROTECTED_MIN_AGE";
pub const ENV_PROTECTED_MAX_AGE: &str = "LEITO_PROTECTED_MAX_AGE";
pub const ENV_ROOM_PREFIX_LEN: &str = "LEITO_ROOM_PREFIX_LEN";

/// Default directory for the document collections when none is configured.
pub const DEFAULT_DATA_DIR: &str = "leito_data";

pub const PATIENTS_FILENAME: &str = "pacientes.json";
pub const BEDS_FILENAME: &str = "leitos.json";
pub const SECTORS_FILENAME: &str = "setores.json";
pub const ROOMS_FILENAME: &str = "quartos.json";
pub const INFECTIONS_FILENAME: &str = "infeccoes.json";
pub const REGULATION_HISTORY_FILENAME: &str = "historico_regulacoes.json";
/// Append-only, one JSON document per line.
pub const AUDIT_FILENAME: &str = "auditoria.jsonl";

/// Number of leading bed-code characters shared by beds of the same ward room.
pub const DEFAULT_ROOM_PREFIX_LEN: usize = 3;

/// Youngest age accepted in a protected-care-pathway bed.
pub const PROTECTED_PATHWAY_MIN_AGE: u32 = 18;

/// Oldest age accepted in a protected-care-pathway bed.
pub const PROTECTED_PATHWAY_MAX_AGE: u32 = 60;

/// Origin sector excluded from protected-care-pathway beds (compared folded).
pub const SURGICAL_RECOVERY_ORIGIN: &str = "cc - recuperacao";

/// Sector type labels treated as open emergency sectors (compared folded).
pub const DEFAULT_OPEN_SECTOR_LABELS: &[&str] =
    &["ps", "pronto socorro", "pronto-socorro", "emergencia"];

/// Isolation statuses counted as active (compared folded).
pub const ACTIVE_ISOLATION_STATUSES: &[&str] = &["confirmado", "suspeito"];

/// Audit page label for regulation events.
pub const AUDIT_PAGE_REGULATION: &str = "Regulação de Leitos";

/// Status written to the regulation history on conclusion.
pub const REGULATION_STATUS_CONCLUDED: &str = "Concluída";

/// Descriptor used in audit text when neither sector nor bed is known.
pub const UNKNOWN_LOCATION: &str = "não informado";
