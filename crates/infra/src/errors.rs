//! Conversions from external infrastructure errors into domain errors.

use reqwest::Error as HttpError;
use voxcal_domain::VoxCalError;

/// Error newtype that keeps conversions on the infrastructure side and can
/// be converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub VoxCalError);

impl From<InfraError> for VoxCalError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<VoxCalError> for InfraError {
    fn from(value: VoxCalError) -> Self {
        InfraError(value)
    }
}

impl From<HttpError> for InfraError {
    fn from(err: HttpError) -> Self {
        let message = err.to_string();
        if err.is_timeout() {
            return InfraError(VoxCalError::Network(format!("request timed out: {message}")));
        }
        if err.is_connect() || err.is_request() {
            return InfraError(VoxCalError::Network(format!("http transport error: {message}")));
        }
        if err.is_decode() {
            return InfraError(VoxCalError::InvalidInput(format!(
                "failed to decode response body: {message}"
            )));
        }
        InfraError(VoxCalError::Internal(format!("http error: {message}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn connect_errors_map_to_network() {
        // Port 1 refuses connections on any sane test machine.
        let err = reqwest::Client::new()
            .get("http://127.0.0.1:1/")
            .send()
            .await
            .expect_err("connection should fail");

        let infra: InfraError = err.into();
        assert!(matches!(infra.0, VoxCalError::Network(_)));
    }
}
