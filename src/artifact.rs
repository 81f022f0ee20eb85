use std::path::PathBuf;
use std::sync::OnceLock;

use chrono::NaiveDateTime;
use regex::Regex;

pub const ARTIFACT_SUFFIX: &str = ".sql.gz";
const NAME_DELIMITER: &str = "_backup_";
const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

fn name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(?P<db>.+)_backup_(?P<ts>\d{8}_\d{6})\.sql(?:\.gz)?$")
            .expect("artifact name pattern should be a valid regex")
    })
}

/// Checks that a database name can be embedded in artifact names.
///
/// Path separators would let the name escape the backup directory and
/// the `_backup_` delimiter would make timestamps unrecoverable from
/// listings. Returns the rejection reason.
pub fn validate_database_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("database name must not be empty".to_string());
    }
    if name.contains('/') || name.contains('\\') {
        return Err(format!("database name {name:?} contains a path separator"));
    }
    if name.contains(NAME_DELIMITER) {
        return Err(format!(
            "database name {name:?} contains the reserved sequence {NAME_DELIMITER:?}"
        ));
    }
    Ok(())
}

/// Derives the artifact file name for a backup of `database` taken at
/// `created_at`: `<database>_backup_<YYYYMMDD>_<HHMMSS>.sql.gz`.
///
/// The timestamp is fixed-width and zero-padded, so names sort
/// lexicographically by creation time. Injective per database at second
/// resolution; the database name is validated at configuration load.
pub fn artifact_name(database: &str, created_at: NaiveDateTime) -> String {
    format!(
        "{database}{NAME_DELIMITER}{}{ARTIFACT_SUFFIX}",
        created_at.format(TIMESTAMP_FORMAT)
    )
}

/// Name of the uncompressed dump the artifact starts life as.
pub fn dump_name(database: &str, created_at: NaiveDateTime) -> String {
    format!(
        "{database}{NAME_DELIMITER}{}.sql",
        created_at.format(TIMESTAMP_FORMAT)
    )
}

/// Recovers the database name and creation time embedded in an artifact
/// name. Also accepts the uncompressed `.sql` form so dumps left behind
/// by an interrupted run still age out through retention.
pub fn parse_artifact_name(name: &str) -> Option<(String, NaiveDateTime)> {
    let captures = name_pattern().captures(name)?;
    let database = captures.name("db")?.as_str().to_string();
    let created_at =
        NaiveDateTime::parse_from_str(captures.name("ts")?.as_str(), TIMESTAMP_FORMAT).ok()?;
    Some((database, created_at))
}

/// Where an artifact's bytes live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactLocation {
    Local(PathBuf),
    Remote { object_id: String },
}

/// One concrete backup file, local or remote.
///
/// `created_at` is always the timestamp parsed from the name, never
/// filesystem or store metadata: copies and restores change mtime, the
/// name does not.
#[derive(Debug, Clone)]
pub struct ArtifactRecord {
    pub name: String,
    pub location: ArtifactLocation,
    pub size: u64,
    pub created_at: NaiveDateTime,
}

impl ArtifactRecord {
    pub fn local(path: PathBuf, size: u64, created_at: NaiveDateTime) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            name,
            location: ArtifactLocation::Local(path),
            size,
            created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, mi, s)
            .unwrap()
    }

    #[test]
    fn name_embeds_timestamp_to_the_second() {
        let stamp = ts(2024, 1, 15, 14, 30, 22);
        assert_eq!(
            artifact_name("shop", stamp),
            "shop_backup_20240115_143022.sql.gz"
        );
    }

    #[test]
    fn name_round_trips_through_parse() {
        let stamp = ts(2023, 12, 31, 23, 59, 59);
        let name = artifact_name("inventory", stamp);
        let (database, parsed) = parse_artifact_name(&name).unwrap();
        assert_eq!(database, "inventory");
        assert_eq!(parsed, stamp);
    }

    #[test]
    fn parse_accepts_uncompressed_dumps() {
        let (database, parsed) = parse_artifact_name("shop_backup_20240115_143022.sql").unwrap();
        assert_eq!(database, "shop");
        assert_eq!(parsed, ts(2024, 1, 15, 14, 30, 22));
    }

    #[test]
    fn parse_rejects_foreign_files() {
        assert!(parse_artifact_name("notes.txt").is_none());
        assert!(parse_artifact_name("shop_backup_2024_143022.sql.gz").is_none());
        assert!(parse_artifact_name("shop_backup_20240115_143022.sql.gz.tmp").is_none());
    }

    #[test]
    fn parse_rejects_impossible_dates() {
        assert!(parse_artifact_name("shop_backup_20241315_143022.sql.gz").is_none());
        assert!(parse_artifact_name("shop_backup_20240115_256161.sql.gz").is_none());
    }

    #[test]
    fn names_sort_by_creation_time() {
        let older = artifact_name("shop", ts(2024, 1, 9, 9, 0, 0));
        let newer = artifact_name("shop", ts(2024, 1, 10, 8, 59, 59));
        assert!(older < newer);
    }

    #[test]
    fn dump_name_matches_artifact_name_without_gz() {
        let stamp = ts(2024, 1, 15, 14, 30, 22);
        assert_eq!(
            format!("{}.gz", dump_name("shop", stamp)),
            artifact_name("shop", stamp)
        );
    }

    #[test]
    fn ambiguous_database_names_are_rejected() {
        assert!(validate_database_name("prod/shop").is_err());
        assert!(validate_database_name(r"prod\shop").is_err());
        assert!(validate_database_name("shop_backup_old").is_err());
        assert!(validate_database_name("").is_err());
        assert!(validate_database_name("shop").is_ok());
        assert!(validate_database_name("shop-v2").is_ok());
    }
}
