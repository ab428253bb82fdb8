use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::watch;
use wsh::service::{
    ContainerRef, ContainerService, ContainerSpec, ProcessExit, ProcessHandle, ProcessIo,
    ProcessSpec, Properties,
};
use wsh::terminal::WindowSize;
use wsh_shared::{WshError, WshResult};

/// Remote operations that can be made to fail.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Op {
    Create,
    Lookup,
    List,
    Run,
}

/// A recorded remote call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Call {
    Create(ContainerSpec),
    Lookup(String),
    List(Properties),
    Run {
        container: ContainerRef,
        spec: ProcessSpec,
    },
}

/// In-memory orchestration service.
pub struct FakeService {
    containers: Mutex<Vec<ContainerRef>>,
    calls: Mutex<Vec<Call>>,
    failing: Mutex<HashSet<Op>>,
    hanging: Mutex<HashSet<Op>>,
    process: Arc<FakeProcess>,
}

impl FakeService {
    /// Service with these containers listed in creation order. Processes
    /// started on it exit with status 0 right away.
    pub fn with_containers<I, S>(handles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            containers: Mutex::new(handles.into_iter().map(ContainerRef::new).collect()),
            calls: Mutex::new(Vec::new()),
            failing: Mutex::new(HashSet::new()),
            hanging: Mutex::new(HashSet::new()),
            process: Arc::new(FakeProcess::exiting(0)),
        }
    }

    /// Use `process` for the next `run`.
    pub fn with_process(mut self, process: Arc<FakeProcess>) -> Self {
        self.process = process;
        self
    }

    /// Make `op` fail from now on.
    pub fn fail(self, op: Op) -> Self {
        self.failing.lock().insert(op);
        self
    }

    /// Make `op` never answer, like a server that accepted the call and
    /// went quiet.
    pub fn hang(self, op: Op) -> Self {
        self.hanging.lock().insert(op);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    /// Whether any call reached the service.
    pub fn was_called(&self) -> bool {
        !self.calls.lock().is_empty()
    }

    pub fn process(&self) -> Arc<FakeProcess> {
        self.process.clone()
    }

    fn record(&self, call: Call) {
        self.calls.lock().push(call);
    }

    async fn check(&self, op: Op) -> WshResult<()> {
        let hangs = self.hanging.lock().contains(&op);
        if hangs {
            std::future::pending::<()>().await;
        }
        if self.failing.lock().contains(&op) {
            return Err(WshError::Internal(format!("{:?} injected failure", op)));
        }
        Ok(())
    }
}

#[async_trait]
impl ContainerService for FakeService {
    async fn create(&self, spec: ContainerSpec) -> WshResult<ContainerRef> {
        self.record(Call::Create(spec));
        self.check(Op::Create).await?;

        let mut containers = self.containers.lock();
        let container = ContainerRef::new(format!("created-{}", containers.len() + 1));
        containers.push(container.clone());
        Ok(container)
    }

    async fn lookup(&self, handle: &str) -> WshResult<ContainerRef> {
        self.record(Call::Lookup(handle.to_string()));
        self.check(Op::Lookup).await?;

        self.containers
            .lock()
            .iter()
            .find(|c| c.handle() == handle)
            .cloned()
            .ok_or_else(|| WshError::NotFound(handle.to_string()))
    }

    async fn list(&self, properties: &Properties) -> WshResult<Vec<ContainerRef>> {
        self.record(Call::List(properties.clone()));
        self.check(Op::List).await?;
        Ok(self.containers.lock().clone())
    }

    async fn run(
        &self,
        container: &ContainerRef,
        spec: ProcessSpec,
        io: ProcessIo,
    ) -> WshResult<Arc<dyn ProcessHandle>> {
        self.record(Call::Run {
            container: container.clone(),
            spec,
        });
        self.check(Op::Run).await?;

        self.process.attach(io);
        Ok(self.process.clone())
    }
}

/// Remote process double.
///
/// Either exits as soon as it is waited on, or blocks until [`FakeProcess::finish`].
pub struct FakeProcess {
    auto_exit: Option<i32>,
    fail_wait: bool,
    exit_tx: watch::Sender<Option<ProcessExit>>,
    io: Mutex<Option<ProcessIo>>,
    output: Mutex<Vec<u8>>,
    sizes: Mutex<Vec<WindowSize>>,
    fail_resize: AtomicBool,
}

impl FakeProcess {
    /// Exits with `status` when waited on.
    pub fn exiting(status: i32) -> Self {
        Self::build(Some(status))
    }

    /// Runs until [`FakeProcess::finish`] is called.
    pub fn running() -> Self {
        Self::build(None)
    }

    /// Waiting on it fails, as when the wait call itself breaks.
    pub fn failing_wait() -> Self {
        Self {
            fail_wait: true,
            ..Self::build(None)
        }
    }

    fn build(auto_exit: Option<i32>) -> Self {
        let (exit_tx, _) = watch::channel(None);
        Self {
            auto_exit,
            fail_wait: false,
            exit_tx,
            io: Mutex::new(None),
            output: Mutex::new(Vec::new()),
            sizes: Mutex::new(Vec::new()),
            fail_resize: AtomicBool::new(false),
        }
    }

    /// Bytes the process writes to stdout right before it exits.
    pub fn with_output(self, output: &[u8]) -> Self {
        *self.output.lock() = output.to_vec();
        self
    }

    /// Make every `set_window_size` fail.
    pub fn fail_resize(&self, fail: bool) {
        self.fail_resize.store(fail, Ordering::SeqCst);
    }

    /// Terminate with `status`.
    pub fn finish(&self, status: i32) {
        self.close_io();
        self.exit_tx.send_replace(Some(ProcessExit {
            exit_status: status,
        }));
    }

    /// Window sizes received, in order.
    pub fn sizes(&self) -> Vec<WindowSize> {
        self.sizes.lock().clone()
    }

    /// Whether stdio was handed over by `run`.
    pub fn is_attached(&self) -> bool {
        self.io.lock().is_some()
    }

    /// Drain whatever stdin data has arrived so far.
    pub fn received_input(&self) -> Vec<u8> {
        let mut received = Vec::new();
        if let Some(io) = self.io.lock().as_mut() {
            while let Ok(chunk) = io.stdin.try_recv() {
                received.extend_from_slice(&chunk);
            }
        }
        received
    }

    fn attach(&self, io: ProcessIo) {
        *self.io.lock() = Some(io);
    }

    fn close_io(&self) {
        if let Some(io) = self.io.lock().take() {
            let output = self.output.lock().clone();
            if !output.is_empty() {
                let _ = io.stdout.send(output);
            }
        }
    }
}

#[async_trait]
impl ProcessHandle for FakeProcess {
    fn id(&self) -> u32 {
        1
    }

    async fn set_window_size(&self, size: WindowSize) -> WshResult<()> {
        if self.fail_resize.load(Ordering::SeqCst) {
            return Err(WshError::Internal("resize rejected".to_string()));
        }
        self.sizes.lock().push(size);
        Ok(())
    }

    async fn wait(&self) -> WshResult<ProcessExit> {
        if self.fail_wait {
            self.close_io();
            return Err(WshError::Internal("wait rejected".to_string()));
        }
        if let Some(status) = self.auto_exit {
            self.finish(status);
        }

        let mut exit_rx = self.exit_tx.subscribe();
        let exit = *exit_rx
            .wait_for(|exit| exit.is_some())
            .await
            .map_err(|_| WshError::Internal("process handle dropped".to_string()))?;
        exit.ok_or_else(|| WshError::Internal("missing exit status".to_string()))
    }
}
