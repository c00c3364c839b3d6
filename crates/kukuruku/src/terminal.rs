use std::io::{IsTerminal, Read};
use std::thread;

use kukuruku_k8s_backend::TerminalSize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::KukurukuError;
use crate::stream::LocalIo;

/// Source of the local side of an exec session.
pub trait LocalTerminal {
    /// Prepare the terminal and hand out its streams. `tty` asks for raw mode.
    fn open(&mut self, tty: bool) -> Result<LocalIo, KukurukuError>;

    /// Restore the terminal and stop watching signals. Safe to call more than once.
    fn close(&mut self);
}

/// The process's own stdin/stdout/stderr.
#[derive(Default)]
pub struct StdTerminal {
    raw_mode: bool,
    watchers: Vec<JoinHandle<()>>,
}

impl StdTerminal {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LocalTerminal for StdTerminal {
    fn open(&mut self, tty: bool) -> Result<LocalIo, KukurukuError> {
        let interactive = tty && std::io::stdin().is_terminal();

        let (input_tx, input_rx) = mpsc::channel(64);
        // a blocking read on a dedicated thread; it never holds up runtime shutdown
        thread::Builder::new()
            .name("kukuruku-stdin".to_string())
            .spawn(move || read_stdin(input_tx))?;

        let (resize_tx, resize_rx) = mpsc::channel(8);
        if interactive {
            if let Ok((cols, rows)) = crossterm::terminal::size() {
                let _ = resize_tx.try_send(TerminalSize::new(cols, rows));
            }
            self.watchers.push(tokio::spawn(watch_resize(resize_tx)));
        }

        let (interrupt_tx, interrupt_rx) = mpsc::channel(8);
        self.watchers.push(tokio::spawn(watch_interrupts(interrupt_tx)));

        if interactive {
            crossterm::terminal::enable_raw_mode()?;
            self.raw_mode = true;
            tracing::debug!("terminal switched to raw mode");
        }

        Ok(LocalIo {
            input: input_rx,
            output: Box::new(tokio::io::stdout()),
            errors: Box::new(tokio::io::stderr()),
            resizes: resize_rx,
            interrupts: interrupt_rx,
        })
    }

    fn close(&mut self) {
        for watcher in self.watchers.drain(..) {
            watcher.abort();
        }
        if self.raw_mode {
            if let Err(e) = crossterm::terminal::disable_raw_mode() {
                tracing::error!("failed to restore terminal mode: {}", e);
            }
            self.raw_mode = false;
        }
    }
}

impl Drop for StdTerminal {
    fn drop(&mut self) {
        self.close();
    }
}

fn read_stdin(tx: mpsc::Sender<Vec<u8>>) {
    let mut stdin = std::io::stdin().lock();
    let mut buf = [0u8; 1024];
    loop {
        match stdin.read(&mut buf) {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                if tx.blocking_send(buf[..n].to_vec()).is_err() {
                    break;
                }
            }
        }
    }
}

#[cfg(unix)]
async fn watch_resize(tx: mpsc::Sender<TerminalSize>) {
    use tokio::signal::unix::{SignalKind, signal};

    let Ok(mut winch) = signal(SignalKind::window_change()) else {
        return;
    };
    while winch.recv().await.is_some() {
        if let Ok((cols, rows)) = crossterm::terminal::size() {
            if tx.send(TerminalSize::new(cols, rows)).await.is_err() {
                break;
            }
        }
    }
}

#[cfg(not(unix))]
async fn watch_resize(_tx: mpsc::Sender<TerminalSize>) {}

#[cfg(unix)]
async fn watch_interrupts(tx: mpsc::Sender<()>) {
    use tokio::signal::unix::{SignalKind, signal};

    let (Ok(mut interrupt), Ok(mut terminate)) = (
        signal(SignalKind::interrupt()),
        signal(SignalKind::terminate()),
    ) else {
        return;
    };
    loop {
        tokio::select! {
            Some(()) = interrupt.recv() => {}
            Some(()) = terminate.recv() => {}
            else => break,
        }
        if tx.send(()).await.is_err() {
            break;
        }
    }
}

#[cfg(not(unix))]
async fn watch_interrupts(tx: mpsc::Sender<()>) {
    while tokio::signal::ctrl_c().await.is_ok() {
        if tx.send(()).await.is_err() {
            break;
        }
    }
}
