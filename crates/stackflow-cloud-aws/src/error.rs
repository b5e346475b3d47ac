//! AWS provider error types

use aws_sdk_ec2::error::DisplayErrorContext;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AwsError {
    #[error("EC2 API call {operation} failed: {message}")]
    Sdk {
        operation: &'static str,
        message: String,
    },

    #[error("EC2 response for {operation} is missing {field}")]
    MissingField {
        operation: &'static str,
        field: &'static str,
    },

    #[error("Unsupported resource for this operation: {0}")]
    Unsupported(String),

    #[error("Cloud error: {0}")]
    Cloud(#[from] stackflow_cloud::CloudError),
}

impl AwsError {
    /// Wrap an SDK error, keeping the full source chain in the message
    pub fn sdk<E: std::error::Error>(operation: &'static str, err: E) -> Self {
        AwsError::Sdk {
            operation,
            message: DisplayErrorContext(err).to_string(),
        }
    }

    pub fn missing(operation: &'static str, field: &'static str) -> Self {
        AwsError::MissingField { operation, field }
    }
}

impl From<AwsError> for stackflow_cloud::CloudError {
    fn from(err: AwsError) -> Self {
        match err {
            AwsError::Cloud(inner) => inner,
            other => stackflow_cloud::CloudError::ApiError(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, AwsError>;

#[cfg(test)]
mod tests {
    use super::*;
    use stackflow_cloud::CloudError;

    #[test]
    fn test_missing_field_becomes_api_error() {
        let err: CloudError = AwsError::missing("CreateVpc", "VpcId").into();
        match err {
            CloudError::ApiError(message) => {
                assert_eq!(message, "EC2 response for CreateVpc is missing VpcId")
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_cloud_error_is_unwrapped() {
        let err: CloudError =
            AwsError::Cloud(CloudError::ResourceNotFound("app-vpc".to_string())).into();
        assert!(matches!(err, CloudError::ResourceNotFound(name) if name == "app-vpc"));
    }
}
