//! # SDC Client
//!
//! [`reaper_core::CloudClient`] over the SmartDataCenter CloudAPI, with
//! HTTP signature authentication and client-side dry-run suppression.

mod client;
mod notify;
mod signer;

pub use client::SdcClient;
pub use notify::{DeletionRequest, LogNotifier, Notifier};
pub use signer::{authorization_header, date_header, OpenSslSigner, RequestSigner};

pub use reaper_core::{ReaperConfig, ReaperError, Result};
