use crate::cloud::CloudError;
use crate::config::ConfigError;
use std::fmt;

/// Extra detail attached to an error: which step failed and on what.
#[derive(Debug, Clone)]
pub struct ErrorContext {
    pub operation: String,
    pub resource_name: Option<String>,
    pub resource_type: Option<String>,
    pub additional_info: Vec<String>,
}

impl ErrorContext {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            resource_name: None,
            resource_type: None,
            additional_info: Vec::new(),
        }
    }

    pub fn with_resource(
        mut self,
        name: impl Into<String>,
        resource_type: impl Into<String>,
    ) -> Self {
        self.resource_name = Some(name.into());
        self.resource_type = Some(resource_type.into());
        self
    }

    pub fn with_info(mut self, info: impl Into<String>) -> Self {
        self.additional_info.push(info.into());
        self
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Operation: {}", self.operation)?;
        if let Some(ref name) = self.resource_name {
            write!(f, ", Resource: {}", name)?;
        }
        if let Some(ref resource_type) = self.resource_type {
            write!(f, " ({})", resource_type)?;
        }
        if !self.additional_info.is_empty() {
            write!(f, ", Info: {}", self.additional_info.join(", "))?;
        }
        Ok(())
    }
}

/// Every way an ebi command can fail.
///
/// All of them are fatal to the running command. `Subprocess` carries the
/// external tool's exit code so the CLI can hand it back verbatim.
#[derive(Debug, thiserror::Error)]
pub enum EbiError {
    #[error("Not found: {message}")]
    NotFound {
        message: String,
        context: Option<ErrorContext>,
    },

    #[error("Platform call failed: {message}")]
    Transport {
        #[source]
        source: Option<CloudError>,
        message: String,
        context: Option<ErrorContext>,
    },

    #[error("Validation error: {message}")]
    Validation {
        message: String,
        context: Option<ErrorContext>,
    },

    #[error("External command exited with code {code}: {message}")]
    Subprocess {
        code: i32,
        message: String,
        context: Option<ErrorContext>,
    },

    #[error("Timed out: {message}")]
    Timeout {
        message: String,
        context: Option<ErrorContext>,
    },

    #[error("IO error: {message}")]
    Io {
        #[source]
        source: std::io::Error,
        message: String,
        context: Option<ErrorContext>,
    },

    #[error("Configuration error: {message}")]
    Config {
        #[source]
        source: Option<ConfigError>,
        message: String,
        context: Option<ErrorContext>,
    },

    #[error("Serialization error: {message}")]
    Serialization {
        message: String,
        context: Option<ErrorContext>,
    },

    #[error("Project is not initialized: {message}")]
    NotInitialized {
        message: String,
        context: Option<ErrorContext>,
    },
}

impl EbiError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
            context: None,
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            source: None,
            message: message.into(),
            context: None,
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            context: None,
        }
    }

    pub fn subprocess(code: i32, message: impl Into<String>) -> Self {
        Self::Subprocess {
            code,
            message: message.into(),
            context: None,
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Timeout {
            message: message.into(),
            context: None,
        }
    }

    pub fn io(source: std::io::Error, message: impl Into<String>) -> Self {
        Self::Io {
            source,
            message: message.into(),
            context: None,
        }
    }

    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
            context: None,
        }
    }

    pub fn not_initialized(message: impl Into<String>) -> Self {
        Self::NotInitialized {
            message: message.into(),
            context: None,
        }
    }

    pub fn with_context(mut self, context: ErrorContext) -> Self {
        match &mut self {
            EbiError::NotFound { context: ctx, .. }
            | EbiError::Transport { context: ctx, .. }
            | EbiError::Validation { context: ctx, .. }
            | EbiError::Subprocess { context: ctx, .. }
            | EbiError::Timeout { context: ctx, .. }
            | EbiError::Io { context: ctx, .. }
            | EbiError::Config { context: ctx, .. }
            | EbiError::Serialization { context: ctx, .. }
            | EbiError::NotInitialized { context: ctx, .. } => *ctx = Some(context),
        }
        self
    }

    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            EbiError::NotFound { context, .. }
            | EbiError::Transport { context, .. }
            | EbiError::Validation { context, .. }
            | EbiError::Subprocess { context, .. }
            | EbiError::Timeout { context, .. }
            | EbiError::Io { context, .. }
            | EbiError::Config { context, .. }
            | EbiError::Serialization { context, .. }
            | EbiError::NotInitialized { context, .. } => context.as_ref(),
        }
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            EbiError::Subprocess { code, .. } if *code != 0 => *code,
            _ => 1,
        }
    }

    pub fn category(&self) -> &'static str {
        match self {
            EbiError::NotFound { .. } => "not_found",
            EbiError::Transport { .. } => "transport",
            EbiError::Validation { .. } => "validation",
            EbiError::Subprocess { .. } => "subprocess",
            EbiError::Timeout { .. } => "timeout",
            EbiError::Io { .. } => "io",
            EbiError::Config { .. } => "configuration",
            EbiError::Serialization { .. } => "serialization",
            EbiError::NotInitialized { .. } => "not_initialized",
        }
    }

    pub fn remediation_steps(&self) -> Vec<String> {
        match self {
            EbiError::NotFound { .. } => vec![
                "Check the application, environment and CNAME names".to_string(),
                "Verify the profile and region point at the right account".to_string(),
            ],
            EbiError::Transport {
                source: Some(cloud_error),
                ..
            } => cloud_error.remediation_steps(),
            EbiError::Transport { .. } => vec![
                "Check your AWS credentials and permissions".to_string(),
                "Verify your AWS region configuration".to_string(),
            ],
            EbiError::Validation { .. } => vec![
                "Review the command arguments".to_string(),
                "Make sure the two environment names differ".to_string(),
            ],
            EbiError::Subprocess { .. } => vec![
                "Read the eb output above for the cause".to_string(),
                "Inspect the target environment with 'eb status' and 'eb events'".to_string(),
            ],
            EbiError::Timeout { .. } => vec![
                "Check instance health in the EC2 console".to_string(),
                "Raise capacity.timeout_seconds in .elasticbeanstalk/ebi.toml".to_string(),
            ],
            EbiError::Io { .. } => vec![
                "Check that Dockerrun.aws.json and .ebextensions/ exist".to_string(),
                "Check file and directory permissions".to_string(),
            ],
            EbiError::Config { .. } => vec![
                "Check .elasticbeanstalk/ebi.toml".to_string(),
                "Remove unknown keys and fix invalid values".to_string(),
            ],
            EbiError::Serialization { .. } => vec![
                "Check the YAML syntax of the saved configuration".to_string(),
            ],
            EbiError::NotInitialized { .. } => vec![
                "Run 'eb init' in the project directory".to_string(),
            ],
        }
    }

    /// Multi-line report with context, category and remediation steps.
    pub fn error_report(&self) -> String {
        let mut report = format!("Error: {}\n", self);

        if let Some(context) = self.context() {
            report.push_str(&format!("Context: {}\n", context));
        }

        report.push_str(&format!("Category: {}\n", self.category()));
        report.push_str(&format!("Exit code: {}\n", self.exit_code()));

        let steps = self.remediation_steps();
        if !steps.is_empty() {
            report.push_str("\nRemediation Steps:\n");
            for (i, step) in steps.iter().enumerate() {
                report.push_str(&format!("  {}. {}\n", i + 1, step));
            }
        }

        report
    }
}

impl From<std::io::Error> for EbiError {
    fn from(err: std::io::Error) -> Self {
        EbiError::Io {
            source: err,
            message: "IO operation failed".to_string(),
            context: None,
        }
    }
}

impl From<CloudError> for EbiError {
    fn from(err: CloudError) -> Self {
        match err {
            CloudError::ResourceNotFound(message) => EbiError::NotFound {
                message,
                context: None,
            },
            other => EbiError::Transport {
                message: other.to_string(),
                source: Some(other),
                context: None,
            },
        }
    }
}

impl From<ConfigError> for EbiError {
    fn from(err: ConfigError) -> Self {
        EbiError::Config {
            message: err.to_string(),
            source: Some(err),
            context: None,
        }
    }
}

impl From<serde_yaml::Error> for EbiError {
    fn from(err: serde_yaml::Error) -> Self {
        EbiError::serialization(err.to_string())
    }
}

impl From<zip::result::ZipError> for EbiError {
    fn from(err: zip::result::ZipError) -> Self {
        match err {
            zip::result::ZipError::Io(source) => EbiError::io(source, "Archive write failed"),
            other => EbiError::serialization(format!("Archive write failed: {}", other)),
        }
    }
}

pub type EbiResult<T> = Result<T, EbiError>;
