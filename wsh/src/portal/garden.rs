//! Garden service client.
//!
//! Container calls and `Run` are unary. A started process is then bound to
//! the session through two streams: `Attach` delivers its output and
//! `SendInput` carries the terminal's keystrokes, ending with a close message.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tonic::Streaming;
use tonic::transport::Channel;
use wsh_shared::{
    AttachRequest, CreateRequest, GardenClient, ListRequest, LookupRequest, ProcessInput,
    ProcessOutput, RunRequest, SetWindowSizeRequest, Transport, TtySize, TtySpec, WaitRequest,
    WshError, WshResult, process_output,
};

use crate::portal::connection::Connection;
use crate::service::{
    ContainerRef, ContainerService, ContainerSpec, ProcessExit, ProcessHandle, ProcessIo,
    ProcessSpec, Properties,
};
use crate::terminal::WindowSize;

/// [`ContainerService`] backed by a garden server.
#[derive(Clone)]
pub struct GardenService {
    connection: Connection,
}

impl GardenService {
    /// Create a service client (connects lazily on first use).
    pub fn new(transport: Transport) -> Self {
        Self {
            connection: Connection::new(transport),
        }
    }

    async fn client(&self) -> WshResult<GardenClient<Channel>> {
        let channel = self.connection.channel().await?;
        Ok(GardenClient::new(channel))
    }
}

#[async_trait]
impl ContainerService for GardenService {
    async fn create(&self, spec: ContainerSpec) -> WshResult<ContainerRef> {
        let request = CreateRequest {
            rootfs: spec.rootfs,
            properties: spec.properties.into_iter().collect(),
        };

        tracing::debug!(rootfs = %request.rootfs, "Sending Create request");
        let response = self.client().await?.create(request).await?.into_inner();
        Ok(ContainerRef::new(response.handle))
    }

    async fn lookup(&self, handle: &str) -> WshResult<ContainerRef> {
        let request = LookupRequest {
            handle: handle.to_string(),
        };

        tracing::debug!(handle, "Sending Lookup request");
        let response = self
            .client()
            .await?
            .lookup(request)
            .await
            .map_err(|status| match status.code() {
                tonic::Code::NotFound => WshError::NotFound(handle.to_string()),
                _ => WshError::Rpc(status),
            })?
            .into_inner();
        Ok(ContainerRef::new(response.handle))
    }

    async fn list(&self, properties: &Properties) -> WshResult<Vec<ContainerRef>> {
        let request = ListRequest {
            properties: properties.clone().into_iter().collect(),
        };

        tracing::debug!(filter_count = request.properties.len(), "Sending List request");
        let response = self.client().await?.list(request).await?.into_inner();
        Ok(response.handles.into_iter().map(ContainerRef::new).collect())
    }

    /// Start the process and bind its streams.
    ///
    /// The output stream is opened before returning, so a process whose
    /// output cannot be attached is reported as a failed start.
    async fn run(
        &self,
        container: &ContainerRef,
        spec: ProcessSpec,
        io: ProcessIo,
    ) -> WshResult<Arc<dyn ProcessHandle>> {
        let mut client = self.client().await?;
        let handle = container.handle().to_string();

        let request = RunRequest {
            handle: handle.clone(),
            spec: Some(wire_spec(&spec)),
        };

        tracing::debug!(handle = %handle, ?spec, "Sending Run request");
        let process_id = client.run(request).await?.into_inner().process_id;

        let output = client
            .attach(AttachRequest {
                handle: handle.clone(),
                process_id,
            })
            .await?
            .into_inner();
        tracing::debug!(process_id, "Attached to process output");
        tokio::spawn(forward_output(output, io.stdout, io.stderr));

        let input = input_messages(handle.clone(), process_id, io.stdin);
        let mut input_client = client.clone();
        tokio::spawn(async move {
            if let Err(e) = input_client.send_input(input).await {
                tracing::warn!(process_id, error = %e, "Input stream to process failed");
            }
        });

        Ok(Arc::new(GardenProcess {
            client,
            handle,
            process_id,
        }))
    }
}

/// A process running in a garden container.
pub struct GardenProcess {
    client: GardenClient<Channel>,
    handle: String,
    process_id: u32,
}

#[async_trait]
impl ProcessHandle for GardenProcess {
    fn id(&self) -> u32 {
        self.process_id
    }

    async fn set_window_size(&self, size: WindowSize) -> WshResult<()> {
        let request = SetWindowSizeRequest {
            handle: self.handle.clone(),
            process_id: self.process_id,
            rows: u32::from(size.rows),
            cols: u32::from(size.cols),
        };

        self.client.clone().set_window_size(request).await?;
        Ok(())
    }

    async fn wait(&self) -> WshResult<ProcessExit> {
        let request = WaitRequest {
            handle: self.handle.clone(),
            process_id: self.process_id,
        };

        let response = self.client.clone().wait(request).await?.into_inner();
        Ok(ProcessExit {
            exit_status: response.exit_status,
        })
    }
}

fn wire_spec(spec: &ProcessSpec) -> wsh_shared::ProcessSpec {
    wsh_shared::ProcessSpec {
        path: spec.path.clone(),
        args: spec.args.clone(),
        env: spec.env_pairs(),
        privileged: spec.privileged,
        tty: spec.tty.then(|| TtySpec {
            size: spec.window_size.map(|size| TtySize {
                rows: u32::from(size.rows),
                cols: u32::from(size.cols),
            }),
        }),
    }
}

/// Stdin chunks as `SendInput` messages, closed off once the session stops
/// feeding input.
fn input_messages(
    handle: String,
    process_id: u32,
    stdin: mpsc::Receiver<Vec<u8>>,
) -> impl Stream<Item = ProcessInput> + Send + 'static {
    let close = ProcessInput {
        handle: handle.clone(),
        process_id,
        data: Vec::new(),
        close: true,
    };

    ReceiverStream::new(stdin)
        .map(move |data| ProcessInput {
            handle: handle.clone(),
            process_id,
            data,
            close: false,
        })
        .chain(stream::once(async move { close }))
}

/// Copy the attach stream into the session's output channels. Returning
/// drops the senders, which tells the session the output is complete.
async fn forward_output(
    mut output: Streaming<ProcessOutput>,
    stdout: mpsc::UnboundedSender<Vec<u8>>,
    stderr: mpsc::UnboundedSender<Vec<u8>>,
) {
    loop {
        match output.message().await {
            Ok(Some(message)) => {
                if !route_output(message, &stdout, &stderr) {
                    tracing::debug!("Session stopped reading output");
                    return;
                }
            }
            Ok(None) => return,
            Err(status) => {
                tracing::warn!(error = %status, "Process output stream broke off");
                return;
            }
        }
    }
}

/// Returns false once the receiving side is gone.
fn route_output(
    output: ProcessOutput,
    stdout: &mpsc::UnboundedSender<Vec<u8>>,
    stderr: &mpsc::UnboundedSender<Vec<u8>>,
) -> bool {
    match output.event {
        Some(process_output::Event::Stdout(data)) => {
            tracing::trace!(len = data.len(), "stdout");
            stdout.send(data).is_ok()
        }
        Some(process_output::Event::Stderr(data)) => {
            tracing::trace!(len = data.len(), "stderr");
            stderr.send(data).is_ok()
        }
        None => true,
    }
}
