//! Field mapping and normalization from legacy dump rows to entity drafts.
//!
//! Each destination entity has a pure `*_from_row` function returning
//! `None` when the row lacks a usable natural key; such rows are counted
//! as skipped by the orchestrator, never failed. The readings measurement
//! mapping is an explicit rule table ([`READING_FIELDS`]) so coercion
//! rules can be tested without running an import.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use meter_sync_sqldump_source::ProjectedRow;

/// Legacy "no value" placeholder used where the source schema forbade NULL.
pub const SENTINEL_DATETIME: &str = "0000-00-00 00:00:00";
pub const SENTINEL_DATE: &str = "0000-00-00";

/// Placeholder credential written for migrated users. The destination
/// application forces a reset on first login.
pub const PLACEHOLDER_PASSWORD: &str = "!legacy-import-reset-required";

/// Extensions that mark a meter "model" value as a configuration-file
/// reference rather than a brand name.
const CONFIG_FILE_EXTENSIONS: &[&str] = &["cfg", "ini", "xml", "json"];

// ---------------------------------------------------------------------------
// Shared coercions
// ---------------------------------------------------------------------------

/// Parse a legacy timestamp, treating the zero-date sentinels as "no
/// value" rather than as an error. Accepts `YYYY-MM-DD HH:MM:SS` and the
/// date-only form; legacy timestamps are taken as UTC.
pub fn parse_datetime(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() || raw == SENTINEL_DATETIME || raw == SENTINEL_DATE {
        return None;
    }
    if let Ok(ndt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Some(DateTime::<Utc>::from_naive_utc_and_offset(ndt, Utc));
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        let ndt = date.and_hms_opt(0, 0, 0)?;
        return Some(DateTime::<Utc>::from_naive_utc_and_offset(ndt, Utc));
    }
    None
}

/// Boolean-ish legacy fields: `1`/`0` and `YES`/`NO` in any case.
pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim() {
        "1" => Some(true),
        "0" => Some(false),
        other if other.eq_ignore_ascii_case("yes") => Some(true),
        other if other.eq_ignore_ascii_case("no") => Some(false),
        _ => None,
    }
}

/// Timestamp column access with sentinel handling.
fn datetime_of(row: &ProjectedRow, column: &str) -> Option<DateTime<Utc>> {
    row.str_of(column).and_then(parse_datetime)
}

/// Loose syntactic email check: enough to decide whether the legacy value
/// can be kept as a natural key or must be synthesized.
pub fn is_valid_email(raw: &str) -> bool {
    let raw = raw.trim();
    if raw.contains(char::is_whitespace) {
        return false;
    }
    match raw.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.')
        }
        None => false,
    }
}

/// Synthesize a deterministic address for users whose legacy email is
/// unusable. `.invalid` is reserved and cannot collide with real mail.
pub fn synthesize_email(username: &str) -> String {
    let local: String = username
        .trim()
        .to_ascii_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("{local}@legacy.invalid")
}

/// Detect a configuration-file reference in a meter model value: a dotted
/// filename ending in one of the known configuration extensions.
pub fn config_filename(raw: &str) -> Option<&str> {
    let raw = raw.trim();
    let (stem, ext) = raw.rsplit_once('.')?;
    if stem.is_empty() {
        return None;
    }
    CONFIG_FILE_EXTENSIONS
        .iter()
        .any(|known| ext.eq_ignore_ascii_case(known))
        .then_some(raw)
}

// ---------------------------------------------------------------------------
// Master-data drafts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct OrganizationDraft {
    pub code: String,
    pub name: String,
}

/// Derive an organization from a legacy site row. The site code is the
/// natural key; a site with neither code nor name is unusable.
pub fn organization_from_row(row: &ProjectedRow) -> Option<OrganizationDraft> {
    let code = row
        .non_empty_str("code")
        .or_else(|| row.non_empty_str("name"))?
        .to_string();
    let name = row
        .non_empty_str("name")
        .unwrap_or(code.as_str())
        .to_string();
    Some(OrganizationDraft { code, name })
}

#[derive(Debug, Clone, PartialEq)]
pub struct UserDraft {
    pub email: String,
    pub name: String,
    pub is_admin: bool,
}

/// Derive a user from a legacy user row. The email is the natural key:
/// the literal legacy value when syntactically valid, else synthesized
/// from the username.
pub fn user_from_row(row: &ProjectedRow) -> Option<UserDraft> {
    let name = row.non_empty_str("name")?.to_string();
    let email = match row.non_empty_str("email") {
        Some(raw) if is_valid_email(raw) => raw.to_string(),
        _ => synthesize_email(&name),
    };
    let is_admin = row
        .str_of("admin")
        .and_then(parse_bool)
        .unwrap_or(false);
    Some(UserDraft {
        email,
        name,
        is_admin,
    })
}

#[derive(Debug, Clone, PartialEq)]
pub struct GatewayDraft {
    pub serial: String,
    pub mac_address: String,
    pub ip_address: String,
    pub site_code: Option<String>,
    pub firmware: Option<String>,
}

/// Derive a gateway from a legacy RTU row. Serial, hardware address and
/// network address are all required; rows missing any are skipped.
pub fn gateway_from_row(row: &ProjectedRow) -> Option<GatewayDraft> {
    let serial = row.non_empty_str("serial")?.to_string();
    let mac_address = row.non_empty_str("mac")?.to_string();
    let ip_address = row.non_empty_str("ip")?.to_string();
    Some(GatewayDraft {
        serial,
        mac_address,
        ip_address,
        site_code: row.non_empty_str("site").map(str::to_string),
        firmware: row.non_empty_str("firmware").map(str::to_string),
    })
}

#[derive(Debug, Clone, PartialEq)]
pub struct MeterDraft {
    pub legacy_id: Option<i64>,
    pub name: String,
    pub gateway_serial: Option<String>,
    pub site_code: Option<String>,
    /// Literal brand/model text, absent when the legacy column carried a
    /// configuration-file reference instead.
    pub model: Option<String>,
    pub config_file: Option<String>,
    pub multiplier: f64,
}

/// Derive a meter from a legacy meter row. Only the name is mandatory at
/// this stage; gateway resolution happens in the orchestrator, which
/// skips meters whose gateway cannot be found.
pub fn meter_from_row(row: &ProjectedRow) -> Option<MeterDraft> {
    let name = row.non_empty_str("name")?.to_string();

    let (model, config_file) = match row.non_empty_str("model") {
        Some(raw) => match config_filename(raw) {
            Some(file) => (None, Some(file.to_string())),
            None => (Some(raw.to_string()), None),
        },
        None => (None, None),
    };

    // Legacy multipliers are stored as free text; empty and zero both
    // mean "unscaled".
    let multiplier = match row.float_of("multiplier") {
        Some(m) if m != 0.0 => m,
        _ => 1.0,
    };

    Some(MeterDraft {
        legacy_id: row.int_of("id"),
        name,
        gateway_serial: row.non_empty_str("rtu").map(str::to_string),
        site_code: row.non_empty_str("site").map(str::to_string),
        model,
        config_file,
        multiplier,
    })
}

// ---------------------------------------------------------------------------
// Readings
// ---------------------------------------------------------------------------

/// How a legacy reading column is coerced into its destination field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coerce {
    /// Required measurement: unparseable or absent values become `0.0`,
    /// matching legacy permissiveness - a garbage cell never fails a row.
    Required,
    /// Optional measurement: unparseable or absent values become NULL.
    Optional,
    /// Demand-peak style timestamp: sentinel zero dates become NULL.
    Timestamp,
    /// Device metadata carried verbatim.
    Text,
}

/// One mapping rule: legacy column → destination column + coercion.
#[derive(Debug, Clone, Copy)]
pub struct FieldRule {
    pub source: &'static str,
    pub column: &'static str,
    pub coerce: Coerce,
}

const fn rule(source: &'static str, column: &'static str, coerce: Coerce) -> FieldRule {
    FieldRule {
        source,
        column,
        coerce,
    }
}

/// The full measurement mapping for a telemetry reading. The destination
/// readings table derives its measurement columns from this table, so
/// the mapping and the schema cannot drift apart.
pub const READING_FIELDS: &[FieldRule] = &[
    // Per-phase voltages
    rule("v1", "voltage_a", Coerce::Required),
    rule("v2", "voltage_b", Coerce::Required),
    rule("v3", "voltage_c", Coerce::Required),
    rule("v12", "voltage_ab", Coerce::Optional),
    rule("v23", "voltage_bc", Coerce::Optional),
    rule("v31", "voltage_ca", Coerce::Optional),
    // Per-phase currents
    rule("i1", "current_a", Coerce::Required),
    rule("i2", "current_b", Coerce::Required),
    rule("i3", "current_c", Coerce::Required),
    rule("i4", "current_n", Coerce::Optional),
    // Power block
    rule("kw", "active_power", Coerce::Required),
    rule("kvar", "reactive_power", Coerce::Required),
    rule("kva", "apparent_power", Coerce::Required),
    rule("pf", "power_factor", Coerce::Required),
    rule("freq", "frequency", Coerce::Optional),
    // Energy counters
    rule("kwh_del", "energy_delivered", Coerce::Required),
    rule("kwh_rec", "energy_received", Coerce::Required),
    rule("kvarh_del", "reactive_energy_delivered", Coerce::Optional),
    rule("kvarh_rec", "reactive_energy_received", Coerce::Optional),
    // Demand peaks and their timestamps
    rule("kw_max", "demand_peak", Coerce::Optional),
    rule("kw_max_time", "demand_peak_at", Coerce::Timestamp),
    rule("kvar_max", "reactive_demand_peak", Coerce::Optional),
    rule("kvar_max_time", "reactive_demand_peak_at", Coerce::Timestamp),
    rule("kva_max", "apparent_demand_peak", Coerce::Optional),
    rule("kva_max_time", "apparent_demand_peak_at", Coerce::Timestamp),
    // Phase angles
    rule("angle1", "phase_angle_a", Coerce::Optional),
    rule("angle2", "phase_angle_b", Coerce::Optional),
    rule("angle3", "phase_angle_c", Coerce::Optional),
    // Harmonic distortion
    rule("v1_thd", "voltage_thd_a", Coerce::Optional),
    rule("v2_thd", "voltage_thd_b", Coerce::Optional),
    rule("v3_thd", "voltage_thd_c", Coerce::Optional),
    // Device metadata
    rule("device_serial", "device_serial", Coerce::Text),
    rule("firmware", "device_firmware", Coerce::Text),
];

/// A coerced measurement value, variant chosen by the rule's coercion.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Num(f64),
    OptNum(Option<f64>),
    OptTime(Option<DateTime<Utc>>),
    OptText(Option<String>),
}

/// Apply one rule to a projected row.
pub fn apply_rule(rule: &FieldRule, row: &ProjectedRow) -> FieldValue {
    match rule.coerce {
        Coerce::Required => FieldValue::Num(row.float_of(rule.source).unwrap_or(0.0)),
        Coerce::Optional => FieldValue::OptNum(row.float_of(rule.source)),
        Coerce::Timestamp => FieldValue::OptTime(datetime_of(row, rule.source)),
        Coerce::Text => {
            FieldValue::OptText(row.non_empty_str(rule.source).map(str::to_string))
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReadingDraft {
    /// Legacy numeric meter id, when the dump carries one.
    pub legacy_meter_id: Option<i64>,
    /// Legacy meter name, the fallback resolution key.
    pub meter_name: Option<String>,
    pub recorded_at: DateTime<Utc>,
    /// One value per [`READING_FIELDS`] entry, in table order.
    pub values: Vec<FieldValue>,
}

/// Derive a reading from a legacy telemetry row. Rows whose timestamp is
/// absent or the zero-date sentinel are skipped (`None`).
pub fn reading_from_row(row: &ProjectedRow) -> Option<ReadingDraft> {
    let recorded_at = datetime_of(row, "log_time")?;
    let values = READING_FIELDS
        .iter()
        .map(|rule| apply_rule(rule, row))
        .collect();
    Some(ReadingDraft {
        legacy_meter_id: row.int_of("meter_id"),
        meter_name: row.non_empty_str("meter").map(str::to_string),
        recorded_at,
        values,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use meter_sync_sqldump_source::{lex_row, ProjectedRow};

    fn row(columns: &[&str], values: &str) -> ProjectedRow {
        let columns: Vec<String> = columns.iter().map(|s| s.to_string()).collect();
        ProjectedRow::project(&columns, &lex_row(values))
    }

    #[test]
    fn test_sentinel_dates_normalize_to_none() {
        assert_eq!(parse_datetime("0000-00-00 00:00:00"), None);
        assert_eq!(parse_datetime("0000-00-00"), None);
        assert_eq!(parse_datetime(""), None);
        assert!(parse_datetime("2014-06-01 12:30:00").is_some());
        assert!(parse_datetime("2014-06-01").is_some());
    }

    #[test]
    fn test_parse_bool_variants() {
        assert_eq!(parse_bool("1"), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("YES"), Some(true));
        assert_eq!(parse_bool("no"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
        assert_eq!(parse_bool(""), None);
    }

    #[test]
    fn test_email_validation_and_synthesis() {
        assert!(is_valid_email("bob@example.com"));
        assert!(!is_valid_email("bob"));
        assert!(!is_valid_email("bob@nodot"));
        assert!(!is_valid_email("bo b@example.com"));
        assert_eq!(synthesize_email("Bob Smith"), "bob_smith@legacy.invalid");
    }

    #[test]
    fn test_config_filename_detection() {
        assert_eq!(config_filename("meter_v2.cfg"), Some("meter_v2.cfg"));
        assert_eq!(config_filename("profile.XML"), Some("profile.XML"));
        assert_eq!(config_filename("ION7330"), None);
        assert_eq!(config_filename("7.5"), None);
        assert_eq!(config_filename(".cfg"), None);
    }

    #[test]
    fn test_organization_requires_code_or_name() {
        let r = row(&["id", "code", "name"], "1, 'SITE-01', 'Plant One'");
        let draft = organization_from_row(&r).unwrap();
        assert_eq!(draft.code, "SITE-01");
        assert_eq!(draft.name, "Plant One");

        let nameless = row(&["id", "code", "name"], "2, NULL, NULL");
        assert!(organization_from_row(&nameless).is_none());

        let code_only = row(&["id", "code", "name"], "3, 'SITE-02', NULL");
        assert_eq!(organization_from_row(&code_only).unwrap().name, "SITE-02");
    }

    #[test]
    fn test_user_email_fallback() {
        let valid = row(&["name", "email", "admin"], "'bob', 'bob@acme.com', '1'");
        let draft = user_from_row(&valid).unwrap();
        assert_eq!(draft.email, "bob@acme.com");
        assert!(draft.is_admin);

        let invalid = row(&["name", "email", "admin"], "'bob', 'not-an-email', NULL");
        let draft = user_from_row(&invalid).unwrap();
        assert_eq!(draft.email, "bob@legacy.invalid");
        assert!(!draft.is_admin);

        let anonymous = row(&["name", "email"], "NULL, 'x@y.com'");
        assert!(user_from_row(&anonymous).is_none());
    }

    #[test]
    fn test_gateway_requires_all_three_addresses() {
        let full = row(
            &["serial", "mac", "ip", "site"],
            "'GW-1', 'AA:BB', '1.2.3.4', 'SITE-01'",
        );
        let draft = gateway_from_row(&full).unwrap();
        assert_eq!(draft.serial, "GW-1");
        assert_eq!(draft.site_code.as_deref(), Some("SITE-01"));

        let no_mac = row(&["serial", "mac", "ip"], "'GW-1', NULL, '1.2.3.4'");
        assert!(gateway_from_row(&no_mac).is_none());
    }

    #[test]
    fn test_meter_multiplier_defaults() {
        let zero = row(&["name", "multiplier"], "'M-1', 0");
        assert_eq!(meter_from_row(&zero).unwrap().multiplier, 1.0);

        let empty = row(&["name", "multiplier"], "'M-1', ''");
        assert_eq!(meter_from_row(&empty).unwrap().multiplier, 1.0);

        let scaled = row(&["name", "multiplier"], "'M-1', 2.5");
        assert_eq!(meter_from_row(&scaled).unwrap().multiplier, 2.5);
    }

    #[test]
    fn test_meter_model_vs_config_file() {
        let brand = row(&["name", "model"], "'M-1', 'ION7330'");
        let draft = meter_from_row(&brand).unwrap();
        assert_eq!(draft.model.as_deref(), Some("ION7330"));
        assert_eq!(draft.config_file, None);

        let config = row(&["name", "model"], "'M-1', 'meter_v2.cfg'");
        let draft = meter_from_row(&config).unwrap();
        assert_eq!(draft.model, None);
        assert_eq!(draft.config_file.as_deref(), Some("meter_v2.cfg"));
    }

    #[test]
    fn test_reading_sentinel_timestamp_skips_row() {
        let r = row(
            &["meter_id", "log_time", "kw"],
            "10, '0000-00-00 00:00:00', 5.5",
        );
        assert!(reading_from_row(&r).is_none());
    }

    #[test]
    fn test_reading_coercions() {
        let r = row(
            &["meter_id", "log_time", "kw", "freq", "kw_max_time"],
            "10, '2014-06-01 12:00:00', 'garbage', 'garbage', '0000-00-00 00:00:00'",
        );
        let draft = reading_from_row(&r).unwrap();
        assert_eq!(draft.legacy_meter_id, Some(10));
        assert_eq!(draft.values.len(), READING_FIELDS.len());

        let by_column = |col: &str| {
            READING_FIELDS
                .iter()
                .position(|rule| rule.column == col)
                .map(|i| draft.values[i].clone())
                .unwrap()
        };
        // Required garbage degrades to 0.0, optional garbage to NULL, and
        // a sentinel demand time to NULL - none of them fail the row.
        assert_eq!(by_column("active_power"), FieldValue::Num(0.0));
        assert_eq!(by_column("frequency"), FieldValue::OptNum(None));
        assert_eq!(by_column("demand_peak_at"), FieldValue::OptTime(None));
    }

    #[test]
    fn test_reading_field_table_is_consistent() {
        let mut seen_sources = std::collections::HashSet::new();
        let mut seen_columns = std::collections::HashSet::new();
        for rule in READING_FIELDS {
            assert!(seen_sources.insert(rule.source), "dup source {}", rule.source);
            assert!(seen_columns.insert(rule.column), "dup column {}", rule.column);
        }
        assert!(READING_FIELDS.len() >= 30);
    }
}
