//! Child-process IPC: spawn a command with selectively piped streams, feed
//! its stdin from a thread-safe queue, and deliver stdout/stderr chunks to
//! callbacks running on IO threads.
//!
//! Topology: one writer thread drains the stdin queue, one reader thread per
//! captured output stream (so stderr can never starve stdout), and a
//! supervisor thread that reaps the child and runs the exit callback once
//! the streams are done. When the output streams hit EOF the supervisor
//! closes the stdin queue itself, so a child that dies on its own is reaped
//! and reported even though nobody called [`Ipc::stop_listening`]. Teardown
//! kills the child outright rather than waiting for a graceful exit.
//!
//! Ordering contract: bytes enqueued with [`Ipc::write_to_stdin`] reach the
//! child in enqueue order, and everything enqueued before
//! [`Ipc::stop_listening`] is delivered before the pipe closes.

use std::io::{Read, Write};
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, unbounded};
use tracing::{debug, trace, warn};

const READ_BUF_SIZE: usize = 4096;

pub type OutputCallback = Box<dyn FnMut(&[u8]) + Send>;
pub type ExitCallback = Box<dyn FnOnce(Option<i32>) + Send>;

/// Options for [`Ipc::spawn`]. Pipes are created only for the streams that
/// have callbacks; stdin only when `sending_inputs` is set.
pub struct IpcOptions {
    /// Executable name, resolved through `PATH`.
    pub file: String,
    /// Arguments after the conventional argv\[0\].
    pub argv: Vec<String>,
    /// Maximum stdout silence before the child is killed. `None` disables
    /// the watchdog.
    pub timeout: Option<Duration>,
    pub sending_inputs: bool,
    pub on_stdout: Option<OutputCallback>,
    pub on_stderr: Option<OutputCallback>,
    /// Receives the exit code, or `None` when the child died to a signal
    /// (including our own teardown kill).
    pub on_exit: Option<ExitCallback>,
}

impl IpcOptions {
    pub fn new(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            argv: Vec::new(),
            timeout: None,
            sending_inputs: false,
            on_stdout: None,
            on_stderr: None,
            on_exit: None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum IpcError {
    #[error("failed to spawn {file:?}: {source}")]
    Spawn {
        file: String,
        #[source]
        source: std::io::Error,
    },
}

enum StdinMsg {
    Data(Vec<u8>),
    Eof,
}

/// Cloneable handle onto a child's stdin queue. Holds no reference back to
/// the [`Ipc`], so callbacks may capture it freely; writes after the child
/// is gone are dropped.
#[derive(Clone)]
pub struct IpcStdin {
    tx: Sender<StdinMsg>,
}

impl IpcStdin {
    pub fn write(&self, data: impl Into<Vec<u8>>) {
        let _ = self.tx.send(StdinMsg::Data(data.into()));
    }
}

/// A live child process. Dropping it kills the child and joins every IO
/// thread; the exit callback still runs exactly once.
pub struct Ipc {
    stdin_tx: Option<Sender<StdinMsg>>,
    stop: Arc<AtomicBool>,
    child: Arc<Mutex<Child>>,
    supervisor: Option<JoinHandle<()>>,
}

impl Ipc {
    pub fn spawn(mut options: IpcOptions) -> Result<Self, IpcError> {
        let mut command = Command::new(&options.file);
        command
            .args(&options.argv)
            .stdin(if options.sending_inputs {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(if options.on_stdout.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stderr(if options.on_stderr.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            });

        let mut child = command.spawn().map_err(|source| IpcError::Spawn {
            file: options.file.clone(),
            source,
        })?;
        debug!(target: "ipc", file = %options.file, pid = child.id(), "spawned child");

        let stop = Arc::new(AtomicBool::new(false));
        let last_read = Arc::new(Mutex::new(Instant::now()));
        let mut readers: Vec<JoinHandle<()>> = Vec::new();

        if let Some(mut cb) = options.on_stdout.take() {
            let pipe = child.stdout.take().expect("stdout was piped");
            let seen = last_read.clone();
            readers.push(spawn_named("ipc-stdout", move || {
                read_loop(pipe, &mut cb, Some(seen));
            }));
        }

        if let Some(mut cb) = options.on_stderr.take() {
            let pipe = child.stderr.take().expect("stderr was piped");
            readers.push(spawn_named("ipc-stderr", move || {
                read_loop(pipe, &mut cb, None);
            }));
        }

        // The stdin writer blocks on its queue, not on the child, so it is
        // kept out of `readers`: the supervisor joins it only after it has
        // been unblocked with an Eof.
        let (stdin_tx, writer) = if options.sending_inputs {
            let mut pipe = child.stdin.take().expect("stdin was piped");
            let (tx, rx): (Sender<StdinMsg>, Receiver<StdinMsg>) = unbounded();
            let handle = spawn_named("ipc-stdin", move || {
                while let Ok(msg) = rx.recv() {
                    match msg {
                        StdinMsg::Data(data) => {
                            if let Err(err) = pipe.write_all(&data) {
                                trace!(target: "ipc", %err, "stdin write failed");
                                return;
                            }
                            let _ = pipe.flush();
                        }
                        StdinMsg::Eof => return, // dropping the pipe closes it
                    }
                }
            });
            (Some(tx), Some(handle))
        } else {
            (None, None)
        };

        let child = Arc::new(Mutex::new(child));

        // Joined after the stop flag is raised, not with the stream workers:
        // the watchdog only wakes on its tick and the stop flag.
        let mut watchdog: Option<JoinHandle<()>> = None;
        if let Some(timeout) = options.timeout {
            let stop = stop.clone();
            let child = child.clone();
            let last_read = last_read.clone();
            watchdog = Some(spawn_named("ipc-watchdog", move || {
                let tick = timeout.min(Duration::from_millis(100));
                loop {
                    std::thread::sleep(tick);
                    if stop.load(Ordering::Acquire) {
                        return;
                    }
                    let elapsed = last_read.lock().map(|t| t.elapsed()).unwrap_or(timeout);
                    if elapsed >= timeout {
                        warn!(target: "ipc", ?timeout, "stdout silent past timeout, killing child");
                        kill_child(&child);
                        return;
                    }
                }
            }));
        }

        let supervisor = {
            let stop = stop.clone();
            let child = child.clone();
            let on_exit = options.on_exit.take();
            let had_readers = !readers.is_empty();
            let writer_tx = stdin_tx.clone();
            spawn_named("ipc-supervisor", move || {
                for reader in readers {
                    let _ = reader.join();
                }
                // The output streams are closed, so the child is gone (or
                // was never read). A child that crashed on its own never
                // gets a user-sent Eof; close the stdin queue here so the
                // writer unblocks and the exit callback still fires. A
                // writer-only child keeps its stdin open until the caller
                // stops it.
                if had_readers && let Some(tx) = &writer_tx {
                    let _ = tx.send(StdinMsg::Eof);
                }
                if let Some(writer) = writer {
                    let _ = writer.join();
                }
                stop.store(true, Ordering::Release);
                if let Some(watchdog) = watchdog {
                    let _ = watchdog.join();
                }
                kill_child(&child);
                let status = child.lock().ok().and_then(|mut c| c.wait().ok());
                let code = status.and_then(|s| s.code());
                debug!(target: "ipc", ?code, "child reaped");
                if let Some(cb) = on_exit {
                    cb(code);
                }
            })
        };

        Ok(Self {
            stdin_tx,
            stop,
            child,
            supervisor: Some(supervisor),
        })
    }

    /// A cloneable stdin handle, if the child was spawned with
    /// `sending_inputs`.
    pub fn stdin_handle(&self) -> Option<IpcStdin> {
        self.stdin_tx.as_ref().map(|tx| IpcStdin { tx: tx.clone() })
    }

    /// Queue bytes for the child's stdin. The IO thread delivers them in
    /// enqueue order. A warning is logged when the child was spawned without
    /// `sending_inputs`.
    pub fn write_to_stdin(&self, data: impl Into<Vec<u8>>) {
        match &self.stdin_tx {
            Some(tx) => {
                let _ = tx.send(StdinMsg::Data(data.into()));
            }
            None => warn!(target: "ipc", "write_to_stdin on a child without a stdin pipe"),
        }
    }

    /// Stop accepting input: everything already queued is flushed, then the
    /// stdin pipe closes and the child sees EOF.
    pub fn stop_listening(&mut self) {
        if let Some(tx) = self.stdin_tx.take() {
            let _ = tx.send(StdinMsg::Eof);
        }
    }
}

impl Drop for Ipc {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(tx) = self.stdin_tx.take() {
            let _ = tx.send(StdinMsg::Eof);
        }
        // Killing the child closes its pipe ends, which unblocks the reader
        // threads; the supervisor then reaps and reports.
        kill_child(&self.child);
        if let Some(handle) = self.supervisor.take() {
            let _ = handle.join();
        }
    }
}

fn spawn_named(name: &str, f: impl FnOnce() + Send + 'static) -> JoinHandle<()> {
    std::thread::Builder::new()
        .name(name.to_string())
        .spawn(f)
        .expect("thread spawn")
}

fn read_loop(mut pipe: impl Read, cb: &mut OutputCallback, seen: Option<Arc<Mutex<Instant>>>) {
    let mut buf = [0u8; READ_BUF_SIZE];
    loop {
        match pipe.read(&mut buf) {
            Ok(0) => return,
            Ok(n) => {
                if let Some(seen) = &seen {
                    if let Ok(mut t) = seen.lock() {
                        *t = Instant::now();
                    }
                }
                cb(&buf[..n]);
            }
            Err(err) => {
                trace!(target: "ipc", %err, "pipe read failed");
                return;
            }
        }
    }
}

fn kill_child(child: &Arc<Mutex<Child>>) {
    if let Ok(mut child) = child.lock() {
        // Already-dead children report an error here; that is fine.
        let _ = child.kill();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    fn collect_stdout() -> (OutputCallback, mpsc::Receiver<Vec<u8>>) {
        let (tx, rx) = mpsc::channel();
        let cb: OutputCallback = Box::new(move |chunk: &[u8]| {
            let _ = tx.send(chunk.to_vec());
        });
        (cb, rx)
    }

    #[test]
    #[cfg(unix)]
    fn echo_stdout_reaches_callback() {
        let (cb, rx) = collect_stdout();
        let (exit_tx, exit_rx) = mpsc::channel();
        let mut options = IpcOptions::new("printf");
        options.argv = vec!["hello".to_string()];
        options.on_stdout = Some(cb);
        options.on_exit = Some(Box::new(move |code| {
            let _ = exit_tx.send(code);
        }));
        let _ipc = Ipc::spawn(options).unwrap();

        let chunk = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(chunk, b"hello".to_vec());
        let code = exit_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(code, Some(0));
    }

    #[test]
    #[cfg(unix)]
    fn stdin_preserves_enqueue_order() {
        let (cb, rx) = collect_stdout();
        let mut options = IpcOptions::new("cat");
        options.sending_inputs = true;
        options.on_stdout = Some(cb);
        let mut ipc = Ipc::spawn(options).unwrap();

        for i in 0..50u32 {
            ipc.write_to_stdin(format!("line-{i}\n"));
        }
        ipc.stop_listening();

        let mut collected = Vec::new();
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            match rx.recv_timeout(Duration::from_millis(200)) {
                Ok(chunk) => collected.extend_from_slice(&chunk),
                Err(_) if collected.ends_with(b"line-49\n") => break,
                Err(_) => continue,
            }
        }
        let text = String::from_utf8(collected).unwrap();
        let expected: String = (0..50).map(|i| format!("line-{i}\n")).collect();
        assert_eq!(text, expected);
    }

    #[test]
    #[cfg(unix)]
    fn self_exiting_child_with_open_stdin_is_reaped() {
        // The child dies on its own while its stdin pipe is still open and
        // no Eof was ever queued; the exit callback must fire anyway.
        let (cb, _rx) = collect_stdout();
        let (exit_tx, exit_rx) = mpsc::channel();
        let mut options = IpcOptions::new("sh");
        options.argv = vec!["-c".to_string(), "exit 7".to_string()];
        options.sending_inputs = true;
        options.on_stdout = Some(cb);
        options.on_exit = Some(Box::new(move |code| {
            let _ = exit_tx.send(code);
        }));
        let _ipc = Ipc::spawn(options).unwrap();

        let code = exit_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(code, Some(7));
    }

    #[test]
    #[cfg(unix)]
    fn drop_kills_lingering_child() {
        let (cb, _rx) = collect_stdout();
        let (exit_tx, exit_rx) = mpsc::channel();
        let mut options = IpcOptions::new("sleep");
        options.argv = vec!["30".to_string()];
        options.on_stdout = Some(cb);
        options.on_exit = Some(Box::new(move |code| {
            let _ = exit_tx.send(code);
        }));
        let ipc = Ipc::spawn(options).unwrap();
        drop(ipc);
        // Killed by signal: no exit code.
        let code = exit_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(code, None);
    }

    #[test]
    #[cfg(unix)]
    fn watchdog_kills_silent_child() {
        let (cb, _rx) = collect_stdout();
        let (exit_tx, exit_rx) = mpsc::channel();
        let mut options = IpcOptions::new("sleep");
        options.argv = vec!["30".to_string()];
        options.timeout = Some(Duration::from_millis(150));
        options.on_stdout = Some(cb);
        options.on_exit = Some(Box::new(move |code| {
            let _ = exit_tx.send(code);
        }));
        let _ipc = Ipc::spawn(options).unwrap();
        let code = exit_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(code, None);
    }

    #[test]
    fn spawn_failure_is_reported() {
        let options = IpcOptions::new("definitely-not-a-real-binary-xyz");
        match Ipc::spawn(options) {
            Err(IpcError::Spawn { file, .. }) => {
                assert_eq!(file, "definitely-not-a-real-binary-xyz");
            }
            Ok(_) => panic!("expected spawn failure"),
        }
    }
}
