//! GardenService against an in-process garden server on a Unix socket.

use std::pin::Pin;
use std::sync::{Arc, Mutex};

use futures::Stream;
use tokio::net::UnixListener;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnixListenerStream;
use tonic::transport::Server;
use tonic::{Request, Response, Status, Streaming};
use wsh::{
    ContainerRef, ContainerService, ContainerSpec, ProcessIo, ProcessSpec, Properties, Transport,
    WindowSize,
};
use wsh_shared::{
    AttachRequest, CreateRequest, CreateResponse, Garden, GardenServer, ListRequest, ListResponse,
    LookupRequest, LookupResponse, ProcessInput, ProcessOutput, RunRequest, RunResponse,
    SendInputResponse, SetWindowSizeRequest, SetWindowSizeResponse, TtySize, TtySpec, WaitRequest,
    WaitResponse, process_output,
};

mod common;

const PROCESS_ID: u32 = 7;

#[derive(Default)]
struct Recorded {
    creates: Vec<CreateRequest>,
    lists: Vec<ListRequest>,
    runs: Vec<RunRequest>,
    input: Vec<u8>,
    closed: bool,
    sizes: Vec<(u32, u32)>,
}

/// Knows containers "a" and "web-1". Processes print to both streams and
/// exit with status 3.
#[derive(Clone, Default)]
struct RecordingGarden {
    recorded: Arc<Mutex<Recorded>>,
}

impl RecordingGarden {
    fn recorded(&self) -> std::sync::MutexGuard<'_, Recorded> {
        self.recorded.lock().unwrap()
    }
}

#[tonic::async_trait]
impl Garden for RecordingGarden {
    async fn create(
        &self,
        request: Request<CreateRequest>,
    ) -> Result<Response<CreateResponse>, Status> {
        self.recorded().creates.push(request.into_inner());
        Ok(Response::new(CreateResponse {
            handle: "created-1".into(),
        }))
    }

    async fn lookup(
        &self,
        request: Request<LookupRequest>,
    ) -> Result<Response<LookupResponse>, Status> {
        let handle = request.into_inner().handle;
        match handle.as_str() {
            "a" | "web-1" => Ok(Response::new(LookupResponse { handle })),
            _ => Err(Status::not_found(format!("unknown handle: {}", handle))),
        }
    }

    async fn list(&self, request: Request<ListRequest>) -> Result<Response<ListResponse>, Status> {
        self.recorded().lists.push(request.into_inner());
        Ok(Response::new(ListResponse {
            handles: vec!["a".into(), "web-1".into()],
        }))
    }

    async fn run(&self, request: Request<RunRequest>) -> Result<Response<RunResponse>, Status> {
        self.recorded().runs.push(request.into_inner());
        Ok(Response::new(RunResponse {
            process_id: PROCESS_ID,
        }))
    }

    type AttachStream = Pin<Box<dyn Stream<Item = Result<ProcessOutput, Status>> + Send + 'static>>;

    async fn attach(
        &self,
        request: Request<AttachRequest>,
    ) -> Result<Response<Self::AttachStream>, Status> {
        let request = request.into_inner();
        if request.handle == "detached" {
            return Err(Status::unavailable("output not attachable"));
        }
        if request.process_id != PROCESS_ID {
            return Err(Status::not_found("no such process"));
        }

        let output = vec![
            Ok(ProcessOutput {
                event: Some(process_output::Event::Stdout(b"hello\r\n".to_vec())),
            }),
            Ok(ProcessOutput {
                event: Some(process_output::Event::Stderr(b"warning\r\n".to_vec())),
            }),
        ];
        Ok(Response::new(
            Box::pin(tokio_stream::iter(output)) as Self::AttachStream
        ))
    }

    async fn send_input(
        &self,
        request: Request<Streaming<ProcessInput>>,
    ) -> Result<Response<SendInputResponse>, Status> {
        let mut stream = request.into_inner();
        while let Some(message) = stream.message().await? {
            let mut recorded = self.recorded();
            recorded.input.extend_from_slice(&message.data);
            if message.close {
                recorded.closed = true;
            }
        }
        Ok(Response::new(SendInputResponse {}))
    }

    async fn set_window_size(
        &self,
        request: Request<SetWindowSizeRequest>,
    ) -> Result<Response<SetWindowSizeResponse>, Status> {
        let request = request.into_inner();
        self.recorded().sizes.push((request.rows, request.cols));
        Ok(Response::new(SetWindowSizeResponse {}))
    }

    async fn wait(&self, _request: Request<WaitRequest>) -> Result<Response<WaitResponse>, Status> {
        Ok(Response::new(WaitResponse { exit_status: 3 }))
    }
}

struct TestServer {
    garden: RecordingGarden,
    service: wsh::GardenService,
    _dir: tempfile::TempDir,
}

async fn serve() -> TestServer {
    let dir = tempfile::tempdir().unwrap();
    let socket_path = dir.path().join("garden.sock");
    let listener = UnixListener::bind(&socket_path).unwrap();
    let garden = RecordingGarden::default();

    let server = Server::builder()
        .add_service(GardenServer::new(garden.clone()))
        .serve_with_incoming(UnixListenerStream::new(listener));
    tokio::spawn(server);

    TestServer {
        garden,
        service: wsh::GardenService::new(Transport::unix(socket_path)),
        _dir: dir,
    }
}

struct Channels {
    stdin: mpsc::Sender<Vec<u8>>,
    stdout: mpsc::UnboundedReceiver<Vec<u8>>,
    stderr: mpsc::UnboundedReceiver<Vec<u8>>,
}

fn process_io() -> (ProcessIo, Channels) {
    let (stdin_tx, stdin_rx) = mpsc::channel(8);
    let (stdout_tx, stdout_rx) = mpsc::unbounded_channel();
    let (stderr_tx, stderr_rx) = mpsc::unbounded_channel();
    (
        ProcessIo {
            stdin: stdin_rx,
            stdout: stdout_tx,
            stderr: stderr_tx,
        },
        Channels {
            stdin: stdin_tx,
            stdout: stdout_rx,
            stderr: stderr_rx,
        },
    )
}

#[tokio::test]
async fn container_calls_round_trip() {
    let server = serve().await;

    let mut spec = ContainerSpec::new("docker:///ubuntu#14.04");
    spec.properties.insert("owner".into(), "ci".into());
    let created = server.service.create(spec).await.unwrap();
    assert_eq!(created, ContainerRef::new("created-1"));

    let found = server.service.lookup("web-1").await.unwrap();
    assert_eq!(found, ContainerRef::new("web-1"));

    let mut filter = Properties::new();
    filter.insert("owner".into(), "ci".into());
    let listed = server.service.list(&filter).await.unwrap();
    assert_eq!(listed, vec![ContainerRef::new("a"), ContainerRef::new("web-1")]);

    let recorded = server.garden.recorded();
    assert_eq!(recorded.creates[0].rootfs, "docker:///ubuntu#14.04");
    assert_eq!(recorded.creates[0].properties["owner"], "ci");
    assert_eq!(recorded.lists[0].properties["owner"], "ci");
}

#[tokio::test]
async fn unknown_handle_is_not_found() {
    let server = serve().await;

    let err = server.service.lookup("missing").await.unwrap_err();
    assert!(err.is_not_found(), "{err}");
}

#[tokio::test]
async fn run_binds_process_streams() {
    let server = serve().await;
    let (io, mut channels) = process_io();
    let spec = ProcessSpec::new("bash")
        .arg("-l")
        .env("TERM", "xterm")
        .privileged(true)
        .tty(true)
        .window_size(WindowSize::new(24, 80));

    let process = server
        .service
        .run(&ContainerRef::new("web-1"), spec, io)
        .await
        .unwrap();
    assert_eq!(process.id(), PROCESS_ID);

    let run = server.garden.recorded().runs[0].clone();
    assert_eq!(run.handle, "web-1");
    let wire = run.spec.unwrap();
    assert_eq!(wire.path, "bash");
    assert_eq!(wire.args, vec!["-l"]);
    assert_eq!(wire.env, vec!["TERM=xterm"]);
    assert!(wire.privileged);
    assert_eq!(
        wire.tty,
        Some(TtySpec {
            size: Some(TtySize { rows: 24, cols: 80 })
        })
    );

    assert_eq!(channels.stdout.recv().await.unwrap(), b"hello\r\n");
    assert_eq!(channels.stderr.recv().await.unwrap(), b"warning\r\n");
    // The attach stream ended, so the output senders are gone.
    assert!(channels.stdout.recv().await.is_none());

    channels.stdin.send(b"exit\r".to_vec()).await.unwrap();
    drop(channels.stdin);
    common::wait_until(|| server.garden.recorded().closed).await;
    assert_eq!(server.garden.recorded().input, b"exit\r");

    process.set_window_size(WindowSize::new(50, 132)).await.unwrap();
    assert_eq!(server.garden.recorded().sizes, vec![(50, 132)]);

    assert_eq!(process.wait().await.unwrap().exit_status, 3);
}

#[tokio::test]
async fn unknown_size_is_left_unset_on_the_wire() {
    let server = serve().await;
    let (io, _channels) = process_io();

    server
        .service
        .run(&ContainerRef::new("a"), ProcessSpec::new("bash").tty(true), io)
        .await
        .unwrap();

    let wire = server.garden.recorded().runs[0].spec.clone().unwrap();
    assert_eq!(wire.tty, Some(TtySpec { size: None }));
}

#[tokio::test]
async fn attach_failure_fails_the_start() {
    let server = serve().await;
    let (io, _channels) = process_io();

    let result = server
        .service
        .run(&ContainerRef::new("detached"), ProcessSpec::new("bash"), io)
        .await;

    assert!(result.is_err());
    assert_eq!(server.garden.recorded().runs.len(), 1);
}
