pub mod envelope;
pub mod gateway;
pub mod integration;
pub mod mapper;
pub mod template;

pub use envelope::{BackendPayload, BackendResponse, ClientResponse, RequestEnvelope};
pub use gateway::{ContentDecision, GatewayService, Route};
pub use integration::{Integration, IntegrationStyle};
pub use mapper::{MappingError, map_request, map_response, passthrough_request};
pub use template::{JsonPath, MappingTemplate, TemplateError};
