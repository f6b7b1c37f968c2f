use std::collections::BTreeMap;

pub const PKGVER_KEY: &str = "pkgver";
pub const BUILD_DATE_KEY: &str = "build-date";

#[derive(Debug, thiserror::Error)]
pub enum NormalizeError {
    #[error("{package}: value of {key} is not valid utf-8: {source}")]
    Decode {
        package: String,
        key: String,
        source: std::string::FromUtf8Error,
    },
    #[error("{package}: missing required field {field}")]
    MissingField { package: String, field: String },
    #[error("{package}: field {field} is not text")]
    FieldType { package: String, field: String },
}

/// A value as found in a repository index.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Text(String),
    Bytes(Vec<u8>),
    Other(serde_json::Value),
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        RawValue::Text(value.to_string())
    }
}

impl From<String> for RawValue {
    fn from(value: String) -> Self {
        RawValue::Text(value)
    }
}

impl From<Vec<u8>> for RawValue {
    fn from(value: Vec<u8>) -> Self {
        RawValue::Bytes(value)
    }
}

impl From<serde_json::Value> for RawValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::String(text) => RawValue::Text(text),
            other => RawValue::Other(other),
        }
    }
}

pub type RawAttributes = BTreeMap<String, RawValue>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageRecord {
    pub name: String,
    pub version: String,
    pub arch: String,
    pub restricted: bool,
    pub build_date: String,
    pub repo_metadata: String,
    pub extra_metadata: String,
    pub dependents_count: Option<i64>,
    pub upstream_version: String,
    pub repo: String,
}

impl PackageRecord {
    pub fn repo_metadata_value(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::from_str(&self.repo_metadata)
    }

    pub fn is_dailyable(&self) -> bool {
        crate::daily::dailyable(&self.name, &self.repo)
    }
}

/// Final `/`-separated segment of a repository identifier.
pub fn arch_of_repo(repo: &str) -> &str {
    repo.rsplit('/').next().unwrap_or(repo)
}

pub fn normalize(
    name: &str,
    attributes: &RawAttributes,
    repo: &str,
) -> Result<PackageRecord, NormalizeError> {
    let mut decoded = serde_json::Map::new();
    for (key, value) in attributes {
        let value = match value {
            RawValue::Text(text) => serde_json::Value::String(text.clone()),
            RawValue::Bytes(bytes) => {
                let text =
                    String::from_utf8(bytes.clone()).map_err(|source| NormalizeError::Decode {
                        package: name.to_string(),
                        key: key.clone(),
                        source,
                    })?;
                serde_json::Value::String(text)
            }
            RawValue::Other(other) => other.clone(),
        };
        decoded.insert(key.clone(), value);
    }

    let version = required_text(name, &decoded, PKGVER_KEY)?;
    let build_date = required_text(name, &decoded, BUILD_DATE_KEY)?;
    // serde_json keeps object keys sorted, nested ones included.
    let repo_metadata = serde_json::Value::Object(decoded).to_string();

    Ok(PackageRecord {
        name: name.to_string(),
        version,
        arch: arch_of_repo(repo).to_string(),
        restricted: false,
        build_date,
        repo_metadata,
        extra_metadata: "{}".to_string(),
        dependents_count: None,
        upstream_version: String::new(),
        repo: repo.to_string(),
    })
}

fn required_text(
    package: &str,
    decoded: &serde_json::Map<String, serde_json::Value>,
    field: &str,
) -> Result<String, NormalizeError> {
    match decoded.get(field) {
        Some(serde_json::Value::String(text)) => Ok(text.clone()),
        Some(_) => Err(NormalizeError::FieldType {
            package: package.to_string(),
            field: field.to_string(),
        }),
        None => Err(NormalizeError::MissingField {
            package: package.to_string(),
            field: field.to_string(),
        }),
    }
}
