use std::time::Duration;

use tokio::runtime::Runtime;
use tonic::client::Grpc;
use tonic::codegen::http::uri::PathAndQuery;
use tonic::transport::{Channel, Endpoint};
use tonic_prost::ProstCodec;
use tracing::info;

use super::objects::UnrealMessageProto;
use super::transport::{Transport, TransportError};

const EXCHANGE_PATH: &str = "/communicator_objects.UnrealToExternalProto/Exchange";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Unary gRPC client for the trainer's exchange service.
///
/// Owns its runtime so the step loop can stay synchronous.
pub struct GrpcTransport {
    runtime: Runtime,
    client: Grpc<Channel>,
}

impl GrpcTransport {
    pub fn connect(host: &str, port: u16) -> Result<Self, TransportError> {
        let runtime = Runtime::new()?;
        let uri = format!("http://{}:{}", host, port);
        let endpoint = Endpoint::from_shared(uri.clone())
            .map_err(|error| TransportError::Connect(format!("{}: {}", uri, error)))?
            .connect_timeout(CONNECT_TIMEOUT);
        let channel = runtime
            .block_on(endpoint.connect())
            .map_err(|error| TransportError::Connect(format!("{}: {}", uri, error)))?;
        info!("Connected to trainer at {}", uri);

        Ok(GrpcTransport {
            runtime,
            client: Grpc::new(channel),
        })
    }
}

impl Transport for GrpcTransport {
    fn exchange(&mut self, message: UnrealMessageProto) -> Result<UnrealMessageProto, TransportError> {
        let client = &mut self.client;
        self.runtime.block_on(async move {
            client.ready().await.map_err(|error| {
                tonic::Status::unknown(format!("Service was not ready: {}", error))
            })?;
            let codec: ProstCodec<UnrealMessageProto, UnrealMessageProto> = ProstCodec::default();
            let path = PathAndQuery::from_static(EXCHANGE_PATH);
            let response = client.unary(tonic::Request::new(message), path, codec).await?;
            Ok(response.into_inner())
        })
    }
}
