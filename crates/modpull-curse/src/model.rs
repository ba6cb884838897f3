//! Catalog records and latest-file selection

use std::path::{Path, PathBuf};

use chrono::{DateTime, FixedOffset, NaiveDateTime};
use modpull_core::ItemError;
use modpull_core::storage::PARTIAL_SUFFIX;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Name of the per-item metadata record
pub const ITEM_INFO_FILE: &str = "mod-info.json";

/// One catalog entry (a mod), as returned by the detail lookup.
///
/// Fields the downloader does not use are kept in `extra` so the persisted
/// record matches what the catalog sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub slug: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl CatalogItem {
    /// Directory name under the output root: `<id>-<slug>`, or `<id>` when
    /// the slug is missing or not a plain path component
    pub fn dir_name(&self) -> String {
        if is_plain_component(&self.slug) {
            format!("{}-{}", self.id, self.slug)
        } else {
            self.id.to_string()
        }
    }

    pub fn dir(&self, root: &Path) -> PathBuf {
        root.join(self.dir_name())
    }
}

impl std::fmt::Display for CatalogItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}

/// A downloadable file of a catalog item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    pub id: u64,
    pub file_name: String,
    pub download_url: String,
    pub file_date: FileDate,
    /// Game versions this file works with
    #[serde(rename = "gameVersion", default)]
    pub applicable_versions: Vec<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl FileRecord {
    pub fn supports(&self, version: &str) -> bool {
        self.applicable_versions.iter().any(|v| v == version)
    }

    /// File name usable as a single path component.
    ///
    /// Names that would collide with in-progress companions are refused too.
    pub fn local_name(&self) -> Result<&str, ItemError> {
        if is_plain_component(&self.file_name) && !self.file_name.ends_with(PARTIAL_SUFFIX) {
            Ok(&self.file_name)
        } else {
            Err(ItemError::InvalidFileName(self.file_name.clone()))
        }
    }

    /// Downloaded file location: `<item dir>/<file id>/<file name>`
    pub fn target_path(&self, item_dir: &Path) -> Result<PathBuf, ItemError> {
        Ok(item_dir.join(self.id.to_string()).join(self.local_name()?))
    }
}

/// Sidecar record next to a downloaded file (`mod-1.0.jar` → `mod-1.0.json`)
pub fn sidecar_path(target: &Path) -> PathBuf {
    let sidecar = target.with_extension("json");
    if sidecar == target {
        target.with_extension("meta.json")
    } else {
        sidecar
    }
}

/// Latest file supporting `version`.
///
/// Later dates win with a strict comparison, so among equal dates the first
/// record in catalog order is kept.
pub fn select_latest<'a>(files: &'a [FileRecord], version: &str) -> Option<&'a FileRecord> {
    let mut latest: Option<&FileRecord> = None;
    for file in files.iter().filter(|f| f.supports(version)) {
        if latest.is_none_or(|l| file.file_date.instant() > l.file_date.instant()) {
            latest = Some(file);
        }
    }
    latest
}

fn is_plain_component(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0'])
}

/// Upload date of a file.
///
/// Compared as an instant but written back exactly as the catalog sent it.
#[derive(Debug, Clone, PartialEq)]
pub struct FileDate {
    raw: String,
    instant: DateTime<FixedOffset>,
}

impl FileDate {
    /// RFC 3339, or a bare `YYYY-MM-DDTHH:MM:SS[.fff]` taken as UTC
    pub fn parse(raw: &str) -> Option<Self> {
        let instant = DateTime::parse_from_rfc3339(raw).ok().or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|naive| naive.and_utc().fixed_offset())
        })?;
        Some(Self {
            raw: raw.to_string(),
            instant,
        })
    }

    pub fn instant(&self) -> DateTime<FixedOffset> {
        self.instant
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl Serialize for FileDate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

impl<'de> Deserialize<'de> for FileDate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        FileDate::parse(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid file date: {raw:?}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(id: u64, date: &str, versions: &[&str]) -> FileRecord {
        FileRecord {
            id,
            file_name: format!("mod-{id}.jar"),
            download_url: format!("https://cdn.example/{id}"),
            file_date: FileDate::parse(date).unwrap(),
            applicable_versions: versions.iter().map(|v| v.to_string()).collect(),
            extra: serde_json::Map::new(),
        }
    }

    #[test]
    fn latest_matching_date_first_among_ties() {
        let files = vec![
            file(1, "2020-01-01T00:00:00Z", &["1.12.2"]),
            file(2, "2021-06-01T00:00:00Z", &["1.16.5"]),
            file(3, "2021-06-01T00:00:00Z", &["1.12.2"]),
            file(4, "2021-06-01T00:00:00Z", &["1.12.2", "1.12.1"]),
        ];
        assert_eq!(select_latest(&files, "1.12.2").unwrap().id, 3);
    }

    #[test]
    fn ignores_newer_files_for_other_versions() {
        let files = vec![
            file(1, "2020-01-01T00:00:00Z", &["1.12.2"]),
            file(2, "2023-01-01T00:00:00Z", &["1.20.1"]),
        ];
        assert_eq!(select_latest(&files, "1.12.2").unwrap().id, 1);
    }

    #[test]
    fn no_match_selects_nothing() {
        let files = vec![file(1, "2020-01-01T00:00:00Z", &["1.7.10"])];
        assert!(select_latest(&files, "1.12.2").is_none());
        assert!(select_latest(&[], "1.12.2").is_none());
    }

    #[test]
    fn dates_compare_as_instants() {
        let files = vec![
            file(1, "2021-06-01T12:00:00+02:00", &["1.12.2"]),
            file(2, "2021-06-01T11:00:00Z", &["1.12.2"]),
        ];
        // 12:00+02:00 is 10:00Z
        assert_eq!(select_latest(&files, "1.12.2").unwrap().id, 2);
    }

    #[test]
    fn parses_dates_without_offset() {
        let date = FileDate::parse("2019-08-22T18:53:23.233").unwrap();
        let zoned = FileDate::parse("2019-08-22T18:53:23.233Z").unwrap();
        assert_eq!(date.instant(), zoned.instant());
        assert!(FileDate::parse("yesterday").is_none());
    }

    #[test]
    fn file_record_from_catalog_json() {
        let json = r#"{
            "id": 2724420,
            "displayName": "JEI 1.12.2",
            "fileName": "jei_1.12.2-4.15.0.jar",
            "fileDate": "2019-05-18T23:36:06.203Z",
            "downloadUrl": "https://edge.forgecdn.net/files/2724/420/jei_1.12.2-4.15.0.jar",
            "gameVersion": ["1.12.2"],
            "fileLength": 651000
        }"#;
        let record: FileRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.id, 2724420);
        assert!(record.supports("1.12.2"));
        assert_eq!(record.extra["fileLength"], 651000);

        // unknown fields survive the sidecar round trip
        let sidecar = serde_json::to_value(&record).unwrap();
        assert_eq!(sidecar["displayName"], "JEI 1.12.2");
        assert_eq!(sidecar["gameVersion"][0], "1.12.2");
    }

    #[test]
    fn file_date_written_back_verbatim() {
        let json = r#"{
            "id": 2758183,
            "fileName": "Botania r1.10-363.jar",
            "downloadUrl": "https://edge.forgecdn.net/files/2758/183/Botania.jar",
            "fileDate": "2019-08-22T18:53:23.233",
            "gameVersion": ["1.12.2"]
        }"#;
        let record: FileRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.file_date.as_str(), "2019-08-22T18:53:23.233");

        let sidecar = serde_json::to_value(&record).unwrap();
        assert_eq!(sidecar["fileDate"], "2019-08-22T18:53:23.233");
    }

    #[test]
    fn bad_file_date_rejected() {
        let json = r#"{"id":1,"fileName":"a.jar","downloadUrl":"u","fileDate":"soon"}"#;
        assert!(serde_json::from_str::<FileRecord>(json).is_err());
    }

    #[test]
    fn item_dir_name() {
        let item: CatalogItem =
            serde_json::from_str(r#"{"id":238222,"name":"JEI","slug":"jei","downloadCount":5}"#)
                .unwrap();
        assert_eq!(item.dir_name(), "238222-jei");
        assert_eq!(item.extra["downloadCount"], 5);
        assert_eq!(item.to_string(), "JEI (238222)");

        let odd = CatalogItem {
            slug: "../escape".to_string(),
            ..item
        };
        assert_eq!(odd.dir_name(), "238222");
    }

    #[test]
    fn unsafe_file_names_rejected() {
        let mut record = file(7, "2020-01-01T00:00:00Z", &[]);
        for bad in ["", "..", "../x.jar", "a/b.jar", "a\\b.jar", "x.jar.modpull-partial"] {
            record.file_name = bad.to_string();
            assert!(record.local_name().is_err(), "{bad:?} accepted");
        }
        record.file_name = "ok-1.0.jar".to_string();
        assert_eq!(
            record.target_path(Path::new("/out/1-x")).unwrap(),
            PathBuf::from("/out/1-x/7/ok-1.0.jar")
        );
    }

    #[test]
    fn sidecar_replaces_extension() {
        assert_eq!(
            sidecar_path(Path::new("/o/7/mod-1.0.jar")),
            PathBuf::from("/o/7/mod-1.0.json")
        );
        assert_eq!(
            sidecar_path(Path::new("/o/7/pack.json")),
            PathBuf::from("/o/7/pack.meta.json")
        );
    }
}
