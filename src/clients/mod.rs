pub mod ocr_api_client;

pub use ocr_api_client::{HealthStatus, OcrApiClient};
