//! Packed chart archives
//!
//! A chart archive is a `.tgz` whose entries live under a single top-level
//! directory named after the chart:
//! - `<chart>/Chart.yaml`
//! - `<chart>/values.yaml` (optional)
//! - `<chart>/templates/*` and any other chart files

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use semver::Version;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::{Read, Write};
use tar::{Archive, Builder, Header};

use crate::error::{CoreError, Result};

/// Chart metadata from `Chart.yaml`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartMetadata {
    /// Chart API version (`v1` or `v2`)
    #[serde(default)]
    pub api_version: Option<String>,

    pub name: String,

    #[serde(with = "version_serde")]
    pub version: Version,

    #[serde(default)]
    pub app_version: Option<String>,

    #[serde(default)]
    pub description: Option<String>,
}

/// A chart loaded into memory
#[derive(Debug, Clone)]
pub struct Chart {
    pub metadata: ChartMetadata,

    /// Default values from `values.yaml`
    pub values: serde_json::Value,

    /// Every other file, keyed by path relative to the chart root
    pub files: BTreeMap<String, Vec<u8>>,

    /// The archive as it was received
    archive: Vec<u8>,
}

impl Chart {
    /// Decode a packed chart archive
    pub fn from_archive(data: Vec<u8>) -> Result<Self> {
        let mut files = read_archive_files(&data)?;

        let chart_yaml = files.remove("Chart.yaml").ok_or_else(|| CoreError::Archive {
            message: "Chart.yaml not found in archive".to_string(),
        })?;
        let metadata: ChartMetadata =
            serde_yaml::from_slice(&chart_yaml).map_err(|e| CoreError::InvalidChart {
                message: e.to_string(),
            })?;

        let values = match files.remove("values.yaml") {
            Some(raw) => parse_values(&raw)?,
            None => serde_json::Value::Object(serde_json::Map::new()),
        };

        Ok(Self {
            metadata,
            values,
            files,
            archive: data,
        })
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn version(&self) -> &Version {
        &self.metadata.version
    }

    /// Raw `.tgz` bytes, for backends that consume packaged charts
    pub fn archive(&self) -> &[u8] {
        &self.archive
    }

    /// Template file paths, sorted
    pub fn templates(&self) -> impl Iterator<Item = &str> {
        self.files
            .keys()
            .map(String::as_str)
            .filter(|p| p.starts_with("templates/"))
    }
}

fn parse_values(raw: &[u8]) -> Result<serde_json::Value> {
    if raw.iter().all(u8::is_ascii_whitespace) {
        return Ok(serde_json::Value::Object(serde_json::Map::new()));
    }
    let values: serde_json::Value = serde_yaml::from_slice(raw)?;
    Ok(match values {
        serde_json::Value::Null => serde_json::Value::Object(serde_json::Map::new()),
        other => other,
    })
}

/// Read all regular files, stripping the top-level chart directory
fn read_archive_files(data: &[u8]) -> Result<BTreeMap<String, Vec<u8>>> {
    let decoder = GzDecoder::new(data);
    let mut archive = Archive::new(decoder);
    let mut contents = BTreeMap::new();
    let mut root: Option<String> = None;

    for entry in archive.entries()? {
        let mut entry = entry?;
        if !entry.header().entry_type().is_file() {
            continue;
        }

        let path = entry.path()?.to_string_lossy().replace('\\', "/");
        let (top, rest) = path.split_once('/').ok_or_else(|| CoreError::Archive {
            message: format!("file '{}' is outside the chart directory", path),
        })?;

        match &root {
            Some(expected) if expected != top => {
                return Err(CoreError::Archive {
                    message: format!(
                        "archive has more than one top-level directory ('{}' and '{}')",
                        expected, top
                    ),
                });
            }
            Some(_) => {}
            None => root = Some(top.to_string()),
        }

        let mut data = Vec::new();
        entry.read_to_end(&mut data)?;
        contents.insert(rest.to_string(), data);
    }

    if contents.is_empty() {
        return Err(CoreError::Archive {
            message: "archive is empty".to_string(),
        });
    }

    Ok(contents)
}

/// Pack files into a chart archive under `<root>/`
pub fn create_archive(root: &str, files: &[(&str, &str)]) -> Result<Vec<u8>> {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = Builder::new(encoder);

    for (path, content) in files {
        add_bytes_to_archive(&mut builder, &format!("{}/{}", root, path), content.as_bytes())?;
    }

    let encoder = builder.into_inner()?;
    Ok(encoder.finish()?)
}

/// Add bytes to a tar archive with a given path
fn add_bytes_to_archive<W: Write>(
    builder: &mut Builder<W>,
    archive_path: &str,
    content: &[u8],
) -> Result<()> {
    let mut header = Header::new_gnu();
    header.set_size(content.len() as u64);
    header.set_mode(0o644);
    header.set_mtime(0); // Reproducible builds: use epoch time
    header.set_cksum();

    builder.append_data(&mut header, archive_path, content)?;

    Ok(())
}

mod version_serde {
    use semver::Version;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(version: &Version, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&version.to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Version, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Version::parse(&s).map_err(serde::de::Error::custom)
    }
}
