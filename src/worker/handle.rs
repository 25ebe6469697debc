//! Owning handle to a running worker thread.

use std::thread::{self, JoinHandle};

use super::cancel::CancelToken;
use super::state::{StateCell, WorkerKind, WorkerState};
use super::WorkerError;

/// Join handle + cancel token + observable state of one worker.
///
/// Dropping the handle cancels the worker but does not wait for it; call
/// [`stop`](Self::stop) to cancel and join.
pub struct WorkerHandle<T> {
    kind: WorkerKind,
    join: Option<JoinHandle<T>>,
    token: CancelToken,
    state: StateCell,
}

impl<T: Send + 'static> WorkerHandle<T> {
    /// Spawn `body` on a named thread.  The body receives clones of the
    /// token and state cell.
    pub(crate) fn spawn<F>(kind: WorkerKind, body: F) -> Result<Self, WorkerError>
    where
        F: FnOnce(CancelToken, StateCell) -> T + Send + 'static,
    {
        let token = CancelToken::new();
        let state = StateCell::new();
        let (thread_token, thread_state) = (token.clone(), state.clone());
        let join = thread::Builder::new()
            .name(kind.thread_name().to_string())
            .spawn(move || body(thread_token, thread_state))
            .map_err(WorkerError::Spawn)?;
        Ok(Self {
            kind,
            join: Some(join),
            token,
            state,
        })
    }
}

impl<T> WorkerHandle<T> {
    pub fn kind(&self) -> WorkerKind {
        self.kind
    }

    pub fn state(&self) -> WorkerState {
        self.state.get()
    }

    /// Ask the worker to stop without waiting.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// `true` once the thread has returned.
    pub fn is_finished(&self) -> bool {
        self.join.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Wait for the thread to return.
    pub fn join(mut self) -> Result<T, WorkerError> {
        let Some(join) = self.join.take() else {
            return Err(WorkerError::Panicked(self.kind.thread_name()));
        };
        join.join()
            .map_err(|_| WorkerError::Panicked(self.kind.thread_name()))
    }

    /// Cancel, then join.
    pub fn stop(self) -> Result<T, WorkerError> {
        self.cancel();
        self.join()
    }
}

impl<T> Drop for WorkerHandle<T> {
    fn drop(&mut self) {
        if self.join.is_some() {
            self.token.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn stop_cancels_and_returns_the_result() {
        let handle = WorkerHandle::spawn(WorkerKind::Capture, |token, state| {
            state.set(WorkerState::Running);
            let mut spins = 0_u32;
            while !token.is_cancelled() {
                spins += 1;
                std::thread::sleep(Duration::from_millis(1));
            }
            state.set(WorkerState::Terminated);
            spins
        })
        .unwrap();
        let spins = handle.stop().unwrap();
        assert!(spins < 10_000);
    }

    #[test]
    fn panicking_worker_is_reported() {
        let handle = WorkerHandle::<()>::spawn(WorkerKind::Playback, |_, _| panic!("boom")).unwrap();
        assert!(matches!(
            handle.join(),
            Err(WorkerError::Panicked("playback-worker"))
        ));
    }

    #[test]
    fn dropping_the_handle_cancels() {
        let (tx, rx) = std::sync::mpsc::channel();
        let handle = WorkerHandle::spawn(WorkerKind::Capture, move |token, _| {
            while !token.is_cancelled() {
                std::thread::sleep(Duration::from_millis(1));
            }
            let _ = tx.send(());
        })
        .unwrap();
        drop(handle);
        assert!(rx.recv_timeout(Duration::from_secs(5)).is_ok());
    }
}
