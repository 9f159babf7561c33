//! Hand-written message types for the test service, so the workspace does not
//! need protoc at build time.

#[derive(Clone, PartialEq, prost::Message)]
pub struct EchoRequest {
    #[prost(string, tag = "1")]
    pub message: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct EchoResponse {
    #[prost(string, tag = "1")]
    pub message: String,
    /// Reflected from the `x-request-id` request header, empty when absent.
    #[prost(string, tag = "2")]
    pub request_id: String,
}
