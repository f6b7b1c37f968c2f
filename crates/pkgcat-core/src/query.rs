use crate::record::PackageRecord;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum QueryError {
    #[error("unknown package field: {0}")]
    UnknownField(String),
    #[error("field {field} expects {expected} value")]
    FieldType { field: Field, expected: &'static str },
    #[error("update has no assignments")]
    NoAssignments,
}

/// Columns of the `packages` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    Name,
    Version,
    Arch,
    Restricted,
    BuildDate,
    RepoMetadata,
    ExtraMetadata,
    DependentsCount,
    UpstreamVersion,
    Repo,
}

impl Field {
    pub const ALL: [Field; 10] = [
        Field::Name,
        Field::Version,
        Field::Arch,
        Field::Restricted,
        Field::BuildDate,
        Field::RepoMetadata,
        Field::ExtraMetadata,
        Field::DependentsCount,
        Field::UpstreamVersion,
        Field::Repo,
    ];

    pub fn column(self) -> &'static str {
        match self {
            Field::Name => "pkgname",
            Field::Version => "pkgver",
            Field::Arch => "arch",
            Field::Restricted => "restricted",
            Field::BuildDate => "builddate",
            Field::RepoMetadata => "repodata",
            Field::ExtraMetadata => "templatedata",
            Field::DependentsCount => "depends_count",
            Field::UpstreamVersion => "upstreamver",
            Field::Repo => "repo",
        }
    }

    fn kind(self) -> ValueKind {
        match self {
            Field::Restricted => ValueKind::Bool,
            Field::DependentsCount => ValueKind::Integer,
            _ => ValueKind::Text,
        }
    }

    pub fn value_of(self, record: &PackageRecord) -> FieldValue {
        match self {
            Field::Name => FieldValue::Text(record.name.clone()),
            Field::Version => FieldValue::Text(record.version.clone()),
            Field::Arch => FieldValue::Text(record.arch.clone()),
            Field::Restricted => FieldValue::Bool(record.restricted),
            Field::BuildDate => FieldValue::Text(record.build_date.clone()),
            Field::RepoMetadata => FieldValue::Text(record.repo_metadata.clone()),
            Field::ExtraMetadata => FieldValue::Text(record.extra_metadata.clone()),
            Field::DependentsCount => FieldValue::Integer(record.dependents_count),
            Field::UpstreamVersion => FieldValue::Text(record.upstream_version.clone()),
            Field::Repo => FieldValue::Text(record.repo.clone()),
        }
    }

    /// Stores `value` into `record`. The value kind was checked on construction
    /// of the assignment, so a mismatch leaves the record untouched.
    pub fn assign(self, record: &mut PackageRecord, value: &FieldValue) {
        match (self, value) {
            (Field::Name, FieldValue::Text(text)) => record.name = text.clone(),
            (Field::Version, FieldValue::Text(text)) => record.version = text.clone(),
            (Field::Arch, FieldValue::Text(text)) => record.arch = text.clone(),
            (Field::Restricted, FieldValue::Bool(flag)) => record.restricted = *flag,
            (Field::BuildDate, FieldValue::Text(text)) => record.build_date = text.clone(),
            (Field::RepoMetadata, FieldValue::Text(text)) => record.repo_metadata = text.clone(),
            (Field::ExtraMetadata, FieldValue::Text(text)) => {
                record.extra_metadata = text.clone()
            }
            (Field::DependentsCount, FieldValue::Integer(count)) => {
                record.dependents_count = *count
            }
            (Field::UpstreamVersion, FieldValue::Text(text)) => {
                record.upstream_version = text.clone()
            }
            (Field::Repo, FieldValue::Text(text)) => record.repo = text.clone(),
            _ => {}
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

impl FromStr for Field {
    type Err = QueryError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        Field::ALL
            .into_iter()
            .find(|field| field.column() == name)
            .ok_or_else(|| QueryError::UnknownField(name.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ValueKind {
    Text,
    Bool,
    Integer,
}

impl ValueKind {
    fn describe(self) -> &'static str {
        match self {
            ValueKind::Text => "a text",
            ValueKind::Bool => "a boolean",
            ValueKind::Integer => "an integer",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    Bool(bool),
    Integer(Option<i64>),
}

impl FieldValue {
    fn kind(&self) -> ValueKind {
        match self {
            FieldValue::Text(_) => ValueKind::Text,
            FieldValue::Bool(_) => ValueKind::Bool,
            FieldValue::Integer(_) => ValueKind::Integer,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(Some(value))
    }
}

impl From<Option<i64>> for FieldValue {
    fn from(value: Option<i64>) -> Self {
        FieldValue::Integer(value)
    }
}

fn checked(field: Field, value: FieldValue) -> Result<(Field, FieldValue), QueryError> {
    if field.kind() != value.kind() {
        return Err(QueryError::FieldType {
            field,
            expected: field.kind().describe(),
        });
    }
    Ok((field, value))
}

/// Conjunction of exact-equality constraints, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    constraints: Vec<(Field, FieldValue)>,
}

impl Filter {
    pub fn new() -> Self {
        Filter::default()
    }

    pub fn by_name(name: &str) -> Self {
        Filter {
            constraints: vec![(Field::Name, FieldValue::from(name))],
        }
    }

    pub fn with(mut self, field: Field, value: impl Into<FieldValue>) -> Result<Self, QueryError> {
        self.constraints.push(checked(field, value.into())?);
        Ok(self)
    }

    /// Same as [`Filter::with`] with the field given by column name.
    pub fn with_named(self, name: &str, value: impl Into<FieldValue>) -> Result<Self, QueryError> {
        let field = name.parse()?;
        self.with(field, value)
    }

    pub fn constraints(&self) -> &[(Field, FieldValue)] {
        &self.constraints
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    /// A null `depends_count` constraint only matches null, like `IS` in SQL.
    pub fn matches(&self, record: &PackageRecord) -> bool {
        self.constraints
            .iter()
            .all(|(field, value)| field.value_of(record) == *value)
    }
}

/// New values for an update, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Assignments {
    values: Vec<(Field, FieldValue)>,
}

impl Assignments {
    pub fn new() -> Self {
        Assignments::default()
    }

    pub fn set(mut self, field: Field, value: impl Into<FieldValue>) -> Result<Self, QueryError> {
        self.values.push(checked(field, value.into())?);
        Ok(self)
    }

    pub fn set_named(self, name: &str, value: impl Into<FieldValue>) -> Result<Self, QueryError> {
        let field = name.parse()?;
        self.set(field, value)
    }

    pub fn values(&self) -> &[(Field, FieldValue)] {
        &self.values
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn ensure_not_empty(&self) -> Result<(), QueryError> {
        if self.values.is_empty() {
            return Err(QueryError::NoAssignments);
        }
        Ok(())
    }

    pub fn apply(&self, record: &mut PackageRecord) {
        for (field, value) in &self.values {
            field.assign(record, value);
        }
    }
}
