use super::http::{ClientError, PortalClient};
use super::ui::{PortalUi, UiError};
use crate::structs::{Network, SaveResult};
use tokio::task::JoinHandle;

/// An in-flight portal request.
///
/// Awaiting it through [`Session`] completes it; [`RequestTask::cancel`] or
/// dropping it aborts the underlying HTTP request.
#[derive(Debug)]
pub struct RequestTask<T> {
    handle: JoinHandle<Result<T, ClientError>>,
}

pub type ScanTask = RequestTask<Vec<Network>>;
pub type SaveTask = RequestTask<SaveResult>;

impl<T: Send + 'static> RequestTask<T> {
    fn spawn<F>(fut: F) -> Self
    where
        F: Future<Output = Result<T, ClientError>> + Send + 'static,
    {
        Self {
            handle: tokio::spawn(fut),
        }
    }
}

impl<T> RequestTask<T> {
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub fn cancel(self) {
        self.handle.abort();
    }

    /// `None` when the task was aborted before it produced a result.
    async fn join(mut self) -> Option<Result<T, ClientError>> {
        match (&mut self.handle).await {
            Ok(result) => Some(result),
            Err(e) if e.is_cancelled() => None,
            Err(e) => Some(Err(ClientError::Task(e.to_string()))),
        }
    }
}

impl<T> Drop for RequestTask<T> {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// One user's pass through the provisioning page: a UI state plus the
/// client that talks to the portal.
#[derive(Debug)]
pub struct Session {
    client: PortalClient,
    ui: PortalUi,
}

impl Session {
    pub fn new(client: PortalClient) -> Self {
        Self {
            client,
            ui: PortalUi::new(),
        }
    }

    pub fn ui(&self) -> &PortalUi {
        &self.ui
    }

    pub fn ui_mut(&mut self) -> &mut PortalUi {
        &mut self.ui
    }

    /// Marks the scan control busy and starts `GET /scan` in the background.
    pub fn start_scan(&mut self) -> Result<ScanTask, UiError> {
        self.ui.begin_scan()?;
        let client = self.client.clone();
        Ok(RequestTask::spawn(async move { client.scan().await }))
    }

    pub async fn complete_scan(&mut self, task: ScanTask) {
        match task.join().await {
            Some(outcome) => self.ui.finish_scan(outcome),
            None => self.ui.cancel_scan(),
        }
    }

    pub fn cancel_scan(&mut self, task: ScanTask) {
        task.cancel();
        self.ui.cancel_scan();
        tracing::debug!("Scan cancelled");
    }

    /// Start and complete a scan.
    pub async fn scan(&mut self) -> Result<(), UiError> {
        let task = self.start_scan()?;
        self.complete_scan(task).await;
        Ok(())
    }

    /// Validates the form and starts `POST /save`. With an empty SSID no
    /// request is sent.
    pub fn start_save(&mut self) -> Result<SaveTask, UiError> {
        let credentials = self.ui.begin_save()?;
        tracing::info!(ssid = %credentials.ssid, "Submitting credentials");
        let client = self.client.clone();
        Ok(RequestTask::spawn(async move { client.save(&credentials).await }))
    }

    pub async fn complete_save(&mut self, task: SaveTask) {
        match task.join().await {
            Some(outcome) => self.ui.finish_save(outcome),
            None => self.ui.cancel_save(),
        }
    }

    pub fn cancel_save(&mut self, task: SaveTask) {
        task.cancel();
        self.ui.cancel_save();
    }

    /// Start and complete a save.
    pub async fn submit(&mut self) -> Result<(), UiError> {
        let task = self.start_save()?;
        self.complete_save(task).await;
        Ok(())
    }
}
