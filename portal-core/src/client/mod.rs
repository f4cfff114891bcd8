//! Client side of the provisioning exchange.
//!
//! - [`PortalClient`] talks to `/scan` and `/save` over HTTP.
//! - [`PortalUi`] is the explicit state of the provisioning page: scan
//!   control, network list, form fields and banners.
//! - [`Session`] drives requests as async tasks and feeds their outcome
//!   back into the UI state.

mod http;
mod session;
mod ui;

pub use http::{ClientError, PortalClient, DEFAULT_TIMEOUT};
pub use session::{RequestTask, SaveTask, ScanTask, Session};
pub use ui::{
    Banner, GENERIC_ERROR, ListView, NetworkRow, PageView, PortalUi, ScanState, UiError,
    NOT_FOUND_LABEL,
};
