use serde::{Deserialize, Serialize};
use std::fmt;

/// Environment as reported by the platform; roles are derived per run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentSummary {
    pub name: String,
    pub cname: String,
}

impl EnvironmentSummary {
    pub fn new(name: impl Into<String>, cname: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cname: cname.into(),
        }
    }
}

/// Location of an uploaded bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectRef {
    pub bucket: String,
    pub key: String,
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s3://{}/{}", self.bucket, self.key)
    }
}

/// Metadata returned by an existence check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectInfo {
    pub content_length: Option<i64>,
    pub e_tag: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationVersionRequest {
    pub application_name: String,
    pub version_label: String,
    pub description: String,
    pub source_bundle: ObjectRef,
}

/// A single `Namespace/OptionName=Value` environment setting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionSetting {
    pub namespace: String,
    pub option_name: String,
    pub value: String,
}

impl OptionSetting {
    pub fn new(
        namespace: impl Into<String>,
        option_name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            option_name: option_name.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapacityBounds {
    pub desired: i32,
    pub min: i32,
    pub max: i32,
}

impl fmt::Display for CapacityBounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "desired={} min={} max={}",
            self.desired, self.min, self.max
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScalingGroup {
    pub name: String,
    pub capacity: CapacityBounds,
    pub instance_ids: Vec<String>,
}

/// Which of the two named environments serves traffic right now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentRoles {
    pub primary: String,
    pub secondary: String,
}
