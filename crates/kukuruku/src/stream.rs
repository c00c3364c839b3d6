//! Byte pumping between the local terminal and an exec session.

use kukuruku_k8s_backend::exec::{BoxedReader, BoxedWriter};
use kukuruku_k8s_backend::{ExecSession, RemoteExit, TerminalSize};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use crate::constants::{DETACH_KEY, INTERRUPT_BYTE, STREAM_BUFFER_SIZE, STREAM_DRAIN_TIMEOUT};

/// Local end of an exec session.
pub struct LocalIo {
    /// Raw bytes typed by the user; closing the channel means local EOF.
    pub input: mpsc::Receiver<Vec<u8>>,
    pub output: BoxedWriter,
    pub errors: BoxedWriter,
    pub resizes: mpsc::Receiver<TerminalSize>,
    pub interrupts: mpsc::Receiver<()>,
}

/// Finds the detach key in a chunk of local input.
#[derive(Debug, Clone, Copy)]
pub struct DetachScanner {
    key: u8,
}

impl Default for DetachScanner {
    fn default() -> Self {
        Self { key: DETACH_KEY }
    }
}

impl DetachScanner {
    pub fn new(key: u8) -> Self {
        Self { key }
    }

    /// Position of the detach key in `chunk`, if any.
    pub fn scan(&self, chunk: &[u8]) -> Option<usize> {
        chunk.iter().position(|&b| b == self.key)
    }
}

async fn read_some(reader: &mut Option<BoxedReader>, buf: &mut [u8]) -> std::io::Result<usize> {
    match reader {
        Some(reader) => reader.read(buf).await,
        None => std::future::pending().await,
    }
}

async fn forward(writer: &mut BoxedWriter, bytes: &[u8]) {
    if let Err(e) = writer.write_all(bytes).await {
        tracing::debug!("local write failed: {}", e);
        return;
    }
    let _ = writer.flush().await;
}

/// Copy whatever is left in `reader` to `writer` until EOF.
async fn drain(reader: Option<BoxedReader>, writer: &mut BoxedWriter, buf: &mut [u8]) {
    let Some(mut reader) = reader else {
        return;
    };
    loop {
        match reader.read(buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => forward(writer, &buf[..n]).await,
        }
    }
}

/// Writes queued local input to remote stdin, so a slow remote reader never holds up
/// output. Closing the queue closes remote stdin.
fn spawn_stdin_writer(
    mut remote: BoxedWriter,
) -> (mpsc::UnboundedSender<Vec<u8>>, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::unbounded_channel::<Vec<u8>>();
    let writer = tokio::spawn(async move {
        while let Some(bytes) = rx.recv().await {
            if remote.write_all(&bytes).await.is_err() || remote.flush().await.is_err() {
                tracing::debug!("remote stdin closed");
                return;
            }
        }
        let _ = remote.shutdown().await;
    });
    (tx, writer)
}

/// Pump bytes until the session closes, then release every handle.
///
/// Ends on remote exit or EOF, on the detach key, or on an interrupt when the remote side
/// has no tty to deliver it to. Output the remote side produced before it exited is still
/// delivered. In every case the remote side is told to stop (if it has not already) and
/// its completion is awaited before returning.
pub async fn pump(session: ExecSession, mut local: LocalIo) -> RemoteExit {
    let ExecSession {
        tty,
        stdin,
        mut stdout,
        mut stderr,
        resize,
        mut abort,
        mut done,
        ..
    } = session;

    let (mut stdin, writer) = match stdin.map(spawn_stdin_writer) {
        Some((tx, writer)) => (Some(tx), Some(writer)),
        None => (None, None),
    };

    let scanner = DetachScanner::default();
    let mut out_buf = vec![0u8; STREAM_BUFFER_SIZE];
    let mut err_buf = vec![0u8; STREAM_BUFFER_SIZE];
    let mut input_open = true;
    let mut local_exit: Option<RemoteExit> = None;

    let remote_exit = loop {
        tokio::select! {
            exit = &mut done => break Some(exit),

            chunk = local.input.recv(), if input_open => match chunk {
                Some(chunk) => {
                    let (bytes, detach) = match scanner.scan(&chunk) {
                        Some(pos) => (&chunk[..pos], true),
                        None => (&chunk[..], false),
                    };
                    if !bytes.is_empty() {
                        if let Some(remote) = &stdin {
                            if remote.send(bytes.to_vec()).is_err() {
                                stdin = None;
                            }
                        }
                    }
                    if detach {
                        tracing::info!("detached from exec session");
                        local_exit = Some(RemoteExit::Detached);
                        break None;
                    }
                }
                None => {
                    // local EOF: close remote stdin, keep reading output
                    input_open = false;
                    stdin = None;
                }
            },

            read = read_some(&mut stdout, &mut out_buf) => match read {
                Ok(0) | Err(_) => {
                    tracing::debug!("remote stdout closed");
                    stdout = None;
                    if stderr.is_none() {
                        break None;
                    }
                }
                Ok(n) => forward(&mut local.output, &out_buf[..n]).await,
            },

            read = read_some(&mut stderr, &mut err_buf) => match read {
                Ok(0) | Err(_) => {
                    stderr = None;
                    if stdout.is_none() {
                        break None;
                    }
                }
                Ok(n) => forward(&mut local.errors, &err_buf[..n]).await,
            },

            Some(size) = local.resizes.recv() => {
                if let Some(resize) = &resize {
                    let _ = resize.send(size).await;
                }
            }

            Some(()) = local.interrupts.recv() => {
                match &stdin {
                    Some(remote) if tty && remote.send(vec![INTERRUPT_BYTE]).is_ok() => {
                        tracing::debug!("forwarding interrupt to remote tty");
                    }
                    _ => {
                        tracing::info!("interrupt without remote tty; closing connection");
                        local_exit = Some(RemoteExit::Aborted);
                        break None;
                    }
                }
            }
        }
    };

    // let queued input reach the remote side, but never wait on a stalled reader for long
    drop(stdin);
    if let Some(mut writer) = writer {
        if timeout(STREAM_DRAIN_TIMEOUT, &mut writer).await.is_err() {
            tracing::debug!("remote stdin still blocked; dropping queued input");
            writer.abort();
        }
    }
    drop(resize);

    let remote_exit = match remote_exit {
        Some(exit) => {
            // the exit status can overtake output still buffered on the way in
            let drained = timeout(STREAM_DRAIN_TIMEOUT, async {
                tokio::join!(
                    drain(stdout.take(), &mut local.output, &mut out_buf),
                    drain(stderr.take(), &mut local.errors, &mut err_buf),
                )
            })
            .await;
            if drained.is_err() {
                tracing::debug!("remote output did not reach EOF after exit");
            }
            exit
        }
        None => {
            if local_exit.is_some() {
                if let Some(abort) = abort.take() {
                    let _ = abort.send(());
                }
            }
            done.await
        }
    };
    drop(stdout);
    drop(stderr);
    drop(abort);

    let _ = local.output.flush().await;
    let _ = local.errors.flush().await;

    local_exit.unwrap_or(remote_exit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use tokio::io::{AsyncReadExt, DuplexStream, duplex};
    use std::time::Duration;
    use tokio::sync::oneshot;

    struct Remote {
        /// what the session wrote to remote stdin
        stdin: DuplexStream,
        /// feed remote stdout
        stdout: DuplexStream,
        resizes: mpsc::Receiver<TerminalSize>,
        finish: oneshot::Sender<RemoteExit>,
        aborted: oneshot::Receiver<()>,
    }

    struct Local {
        input: mpsc::Sender<Vec<u8>>,
        output: DuplexStream,
        resizes: mpsc::Sender<TerminalSize>,
        interrupts: mpsc::Sender<()>,
    }

    fn session(tty: bool) -> (ExecSession, Remote, LocalIo, Local) {
        let (stdin_local, stdin_remote) = duplex(1024);
        let (stdout_remote, stdout_local) = duplex(1024);
        let (resize_tx, resize_rx) = mpsc::channel(4);
        let (finish_tx, finish_rx) = oneshot::channel::<RemoteExit>();
        let (abort_tx, abort_rx) = oneshot::channel::<()>();
        let (aborted_tx, aborted_rx) = oneshot::channel::<()>();

        let done = async move {
            tokio::select! {
                Ok(()) = abort_rx => {
                    let _ = aborted_tx.send(());
                    RemoteExit::Aborted
                }
                exit = finish_rx => exit.unwrap_or(RemoteExit::Completed { code: None }),
            }
        }
        .boxed();

        let exec = ExecSession {
            pod: "web-0".to_string(),
            container: "web".to_string(),
            tty,
            stdin: Some(Box::new(stdin_local)),
            stdout: Some(Box::new(stdout_local)),
            stderr: None,
            resize: Some(resize_tx),
            abort: Some(abort_tx),
            done,
        };

        let (input_tx, input_rx) = mpsc::channel(4);
        let (output_local, output_test) = duplex(1024);
        let (local_resize_tx, local_resize_rx) = mpsc::channel(4);
        let (interrupt_tx, interrupt_rx) = mpsc::channel(4);

        let local_io = LocalIo {
            input: input_rx,
            output: Box::new(output_local),
            errors: Box::new(tokio::io::sink()),
            resizes: local_resize_rx,
            interrupts: interrupt_rx,
        };

        (
            exec,
            Remote {
                stdin: stdin_remote,
                stdout: stdout_remote,
                resizes: resize_rx,
                finish: finish_tx,
                aborted: aborted_rx,
            },
            local_io,
            Local {
                input: input_tx,
                output: output_test,
                resizes: local_resize_tx,
                interrupts: interrupt_tx,
            },
        )
    }

    #[test]
    fn scanner_finds_detach_key() {
        let scanner = DetachScanner::default();
        assert_eq!(scanner.scan(b"ls\r"), None);
        assert_eq!(scanner.scan(&[b'l', DETACH_KEY, b's']), Some(1));
    }

    #[tokio::test]
    async fn remote_output_reaches_local_and_exit_closes() {
        let (exec, mut remote, local_io, mut local) = session(true);
        let pump = tokio::spawn(pump(exec, local_io));

        local.input.send(b"echo hi\r".to_vec()).await.unwrap();
        let mut typed = [0u8; 8];
        remote.stdin.read_exact(&mut typed).await.unwrap();
        assert_eq!(&typed, b"echo hi\r");

        remote.stdout.write_all(b"hi\r\n").await.unwrap();
        let mut shown = [0u8; 4];
        local.output.read_exact(&mut shown).await.unwrap();
        assert_eq!(&shown, b"hi\r\n");

        remote
            .finish
            .send(RemoteExit::Completed { code: Some(0) })
            .unwrap();
        assert_eq!(pump.await.unwrap(), RemoteExit::Completed { code: Some(0) });
    }

    #[tokio::test]
    async fn remote_eof_closes_session() {
        let (exec, remote, local_io, _local) = session(true);
        let pump = tokio::spawn(pump(exec, local_io));

        let Remote { stdout, finish, .. } = remote;
        drop(stdout);
        finish.send(RemoteExit::Completed { code: Some(3) }).unwrap();

        assert_eq!(pump.await.unwrap(), RemoteExit::Completed { code: Some(3) });
    }

    #[tokio::test]
    async fn detach_key_aborts_remote_and_releases_streams() {
        let (exec, mut remote, local_io, local) = session(true);
        let pump = tokio::spawn(pump(exec, local_io));

        local.input.send(vec![b'x', DETACH_KEY, b'y']).await.unwrap();

        assert_eq!(pump.await.unwrap(), RemoteExit::Detached);
        assert!(remote.aborted.await.is_ok());

        // bytes before the key were forwarded, then remote stdin was closed
        let mut rest = Vec::new();
        remote.stdin.read_to_end(&mut rest).await.unwrap();
        assert_eq!(rest, b"x");
    }

    #[tokio::test]
    async fn output_written_before_exit_is_delivered() {
        let (exec, remote, local_io, mut local) = session(false);
        let Remote {
            mut stdout, finish, ..
        } = remote;

        // the exit status is ready before pump reads any output
        stdout.write_all(b"last line\n").await.unwrap();
        drop(stdout);
        finish.send(RemoteExit::Completed { code: Some(0) }).unwrap();

        assert_eq!(
            pump(exec, local_io).await,
            RemoteExit::Completed { code: Some(0) }
        );
        let mut shown = [0u8; 10];
        local.output.read_exact(&mut shown).await.unwrap();
        assert_eq!(&shown, b"last line\n");
    }

    #[tokio::test]
    async fn stalled_remote_stdin_does_not_block_output() {
        let (exec, mut remote, local_io, mut local) = session(false);
        let pump = tokio::spawn(pump(exec, local_io));

        // far more than the remote stdin pipe holds; nobody reads it
        local.input.send(vec![b'a'; 64 * 1024]).await.unwrap();

        remote.stdout.write_all(b"still here").await.unwrap();
        let mut shown = [0u8; 10];
        timeout(Duration::from_secs(5), local.output.read_exact(&mut shown))
            .await
            .expect("output stalled behind remote stdin")
            .unwrap();
        assert_eq!(&shown, b"still here");

        remote.finish.send(RemoteExit::Completed { code: Some(0) }).unwrap();
        drop(remote.stdout);
        assert_eq!(pump.await.unwrap(), RemoteExit::Completed { code: Some(0) });
    }

    #[tokio::test]
    async fn resize_events_are_forwarded() {
        let (exec, mut remote, local_io, local) = session(true);
        let pump = tokio::spawn(pump(exec, local_io));

        local.resizes.send(TerminalSize::new(120, 40)).await.unwrap();
        assert_eq!(remote.resizes.recv().await, Some(TerminalSize::new(120, 40)));

        remote.finish.send(RemoteExit::Completed { code: None }).unwrap();
        pump.await.unwrap();
    }

    #[tokio::test]
    async fn interrupt_is_sent_to_remote_tty() {
        let (exec, mut remote, local_io, local) = session(true);
        let pump = tokio::spawn(pump(exec, local_io));

        local.interrupts.send(()).await.unwrap();
        let mut byte = [0u8; 1];
        remote.stdin.read_exact(&mut byte).await.unwrap();
        assert_eq!(byte[0], INTERRUPT_BYTE);

        remote.finish.send(RemoteExit::Completed { code: Some(130) }).unwrap();
        assert_eq!(pump.await.unwrap(), RemoteExit::Completed { code: Some(130) });
    }

    #[tokio::test]
    async fn interrupt_without_tty_closes_connection() {
        let (exec, remote, local_io, local) = session(false);
        let pump = tokio::spawn(pump(exec, local_io));

        local.interrupts.send(()).await.unwrap();

        assert_eq!(pump.await.unwrap(), RemoteExit::Aborted);
        assert!(remote.aborted.await.is_ok());
    }
}
