//! Google Sheets backed record store.
//!
//! Two sheets hold the data: `Users Info` (one row per phone) and
//! `SOS Alert` (append-only). Both are created when missing, and their header
//! rows are healed on first use by appending any missing column. Each sheet
//! has its own async lock, held across the read-modify-write of a request, so
//! two upserts for the same phone can never both append.

mod auth;
mod client;
mod layout;

use crate::config::SheetsConfig;
use crate::ports::RecordStore;
use crate::store::StoreError;
use crate::types::records::{AlertLevel, SosEvent, UpsertOutcome, UserRecord, UserUpsert};

use auth::{ServiceAccount, TokenSource};
use client::SheetsApi;
use layout::{
    COL_ACCURACY, COL_ALERTS, COL_AREA, COL_CITY, COL_EMAIL, COL_FULL_ADDRESS, COL_PHONE,
    COL_SOS_COORDINATES, COL_STATUS, COL_TIMESTAMP, SOS_HEADERS, SOS_SHEET, SheetLayout,
    USERS_HEADERS, USERS_SHEET, heal_headers,
};

use futures::future::{BoxFuture, FutureExt};
use thiserror::Error;
use tokio::sync::{Mutex, OnceCell};
use tracing::{info, warn};

use std::path::PathBuf;

pub const DEFAULT_API_BASE: &str = "https://sheets.googleapis.com";
pub const DEFAULT_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

#[derive(Debug, Error)]
pub enum SheetsError {
    #[error(
        "no Google Sheets credentials found; set GOOGLE_SERVICE_ACCOUNT_EMAIL and GOOGLE_PRIVATE_KEY or GOOGLE_CREDENTIALS_FILE"
    )]
    MissingCredentials,
    #[error("failed to read credentials file {}: {source}", .path.display())]
    CredentialsFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid service account credentials: {0}")]
    InvalidCredentials(String),
    #[error("failed to sign service account assertion: {0}")]
    Signing(String),
    #[error("invalid Sheets API URL: {0}")]
    InvalidUrl(String),
    #[error("Sheets request failed: {0}")]
    Http(#[from] reqwest::Error),
}

pub struct SheetsStore {
    config: SheetsConfig,
    http: reqwest::Client,
    api: OnceCell<SheetsApi>,
    users: Mutex<Option<SheetLayout>>,
    sos: Mutex<Option<SheetLayout>>,
}

impl SheetsStore {
    pub fn new(config: SheetsConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
            api: OnceCell::new(),
            users: Mutex::new(None),
            sos: Mutex::new(None),
        }
    }

    /// Connects, creates missing sheets and heals their headers. Returns the
    /// document title.
    pub async fn init(&self) -> Result<String, SheetsError> {
        let api = self.api().await?;
        let info = api.document_info().await?;
        info!(title = %info.title, sheets = info.sheet_titles.len(), "loaded spreadsheet");

        let users = prepare_sheet(api, USERS_SHEET, &USERS_HEADERS, &info.sheet_titles).await?;
        *self.users.lock().await = Some(users);
        let sos = prepare_sheet(api, SOS_SHEET, &SOS_HEADERS, &info.sheet_titles).await?;
        *self.sos.lock().await = Some(sos);
        Ok(info.title)
    }

    async fn api(&self) -> Result<&SheetsApi, SheetsError> {
        self.api
            .get_or_try_init(|| async {
                let account = ServiceAccount::resolve(&self.config.credentials).await?;
                let tokens =
                    TokenSource::new(self.http.clone(), account, self.config.token_url.clone())?;
                SheetsApi::new(
                    self.http.clone(),
                    tokens,
                    &self.config.api_base,
                    self.config.sheet_id.clone(),
                )
            })
            .await
    }

    async fn upsert(&self, user: UserUpsert) -> Result<UpsertOutcome, SheetsError> {
        let api = self.api().await?;
        let mut slot = self.users.lock().await;
        let layout = ensure_layout(api, &mut slot, USERS_SHEET, &USERS_HEADERS).await?;
        let result: Result<UpsertOutcome, SheetsError> = async {
            let rows = api.read_rows(&layout.title).await?;
            let values = [
                (COL_EMAIL, user.email.as_str()),
                (COL_CITY, user.city.as_str()),
                (COL_AREA, user.locality.as_str()),
                (COL_FULL_ADDRESS, user.full_address.as_str()),
                (COL_TIMESTAMP, user.timestamp.as_str()),
            ];
            match find_row(&layout, &rows, &user.phone) {
                Some(index) => {
                    let mut row = rows[index].clone();
                    layout.fill(&mut row, &values);
                    api.write_row(&layout.title, index + 1, &row).await?;
                    Ok(UpsertOutcome::Updated)
                }
                None => {
                    let mut row = layout.new_row(&values);
                    layout.fill(
                        &mut row,
                        &[
                            (COL_PHONE, user.phone.as_str()),
                            (COL_ALERTS, AlertLevel::Green.as_str()),
                        ],
                    );
                    api.append_row(&layout.title, &row).await?;
                    Ok(UpsertOutcome::Created)
                }
            }
        }
        .await;
        forget_layout_on_error(&mut slot, result)
    }

    async fn find(&self, phone: &str) -> Result<Option<UserRecord>, SheetsError> {
        let api = self.api().await?;
        let mut slot = self.users.lock().await;
        let layout = ensure_layout(api, &mut slot, USERS_SHEET, &USERS_HEADERS).await?;
        let result = api.read_rows(&layout.title).await.map(|rows| {
            find_row(&layout, &rows, phone).map(|index| user_from_row(&layout, &rows[index]))
        });
        forget_layout_on_error(&mut slot, result)
    }

    async fn set_alert(&self, phone: &str, level: AlertLevel) -> Result<bool, SheetsError> {
        let api = self.api().await?;
        let mut slot = self.users.lock().await;
        let layout = ensure_layout(api, &mut slot, USERS_SHEET, &USERS_HEADERS).await?;
        let result: Result<bool, SheetsError> = async {
            let rows = api.read_rows(&layout.title).await?;
            let Some(index) = find_row(&layout, &rows, phone) else {
                return Ok(false);
            };
            let mut row = rows[index].clone();
            layout.fill(&mut row, &[(COL_ALERTS, level.as_str())]);
            api.write_row(&layout.title, index + 1, &row).await?;
            Ok(true)
        }
        .await;
        forget_layout_on_error(&mut slot, result)
    }

    async fn append(&self, event: SosEvent) -> Result<(), SheetsError> {
        let api = self.api().await?;
        let mut slot = self.sos.lock().await;
        let layout = ensure_layout(api, &mut slot, SOS_SHEET, &SOS_HEADERS).await?;
        let coordinates = event.coordinates.to_string();
        let row = layout.new_row(&[
            (COL_PHONE, event.phone.as_str()),
            (COL_SOS_COORDINATES, coordinates.as_str()),
            (COL_TIMESTAMP, event.timestamp.as_str()),
            (COL_ACCURACY, event.accuracy.as_str()),
            (COL_STATUS, event.status.as_str()),
        ]);
        let result = api.append_row(&layout.title, &row).await;
        forget_layout_on_error(&mut slot, result)
    }
}

impl RecordStore for SheetsStore {
    fn backend(&self) -> &'static str {
        "sheets"
    }

    fn upsert_user(&self, user: UserUpsert) -> BoxFuture<'_, Result<UpsertOutcome, StoreError>> {
        async move { Ok(self.upsert(user).await?) }.boxed()
    }

    fn find_user<'a>(
        &'a self,
        phone: &'a str,
    ) -> BoxFuture<'a, Result<Option<UserRecord>, StoreError>> {
        async move { Ok(self.find(phone).await?) }.boxed()
    }

    fn set_alert_status<'a>(
        &'a self,
        phone: &'a str,
        level: AlertLevel,
    ) -> BoxFuture<'a, Result<bool, StoreError>> {
        async move { Ok(self.set_alert(phone, level).await?) }.boxed()
    }

    fn append_sos(&self, event: SosEvent) -> BoxFuture<'_, Result<(), StoreError>> {
        async move { Ok(self.append(event).await?) }.boxed()
    }
}

async fn ensure_layout(
    api: &SheetsApi,
    slot: &mut Option<SheetLayout>,
    title: &str,
    required: &[&str],
) -> Result<SheetLayout, SheetsError> {
    if let Some(layout) = slot.as_ref() {
        return Ok(layout.clone());
    }
    let titles = api.document_info().await?.sheet_titles;
    let layout = prepare_sheet(api, title, required, &titles).await?;
    *slot = Some(layout.clone());
    Ok(layout)
}

async fn prepare_sheet(
    api: &SheetsApi,
    title: &str,
    required: &[&str],
    existing_titles: &[String],
) -> Result<SheetLayout, SheetsError> {
    if !existing_titles.iter().any(|existing| existing == title) {
        info!(sheet = title, "sheet not found, creating");
        api.add_sheet(title).await?;
    }

    let current = api
        .read_rows(title)
        .await?
        .into_iter()
        .next()
        .unwrap_or_default();
    let headers = match heal_headers(&current, required) {
        Some(healed) => {
            info!(sheet = title, current = ?current, healed = ?healed, "adding missing headers");
            api.write_row(title, 1, &healed).await?;
            healed
        }
        None => current,
    };
    Ok(SheetLayout {
        title: title.to_string(),
        headers,
    })
}

/// A failed request may mean the sheet was renamed or its headers edited;
/// the layout is resolved again on the next call.
fn forget_layout_on_error<T>(
    slot: &mut Option<SheetLayout>,
    result: Result<T, SheetsError>,
) -> Result<T, SheetsError> {
    if result.is_err() {
        *slot = None;
    }
    result
}

fn find_row(layout: &SheetLayout, rows: &[Vec<String>], phone: &str) -> Option<usize> {
    rows.iter()
        .enumerate()
        .skip(1)
        .find(|(_, row)| layout.cell(row, COL_PHONE).map(str::trim) == Some(phone))
        .map(|(index, _)| index)
}

fn user_from_row(layout: &SheetLayout, row: &[String]) -> UserRecord {
    let text = |name: &str| layout.cell(row, name).unwrap_or_default().to_string();
    let alerts = layout.cell(row, COL_ALERTS).unwrap_or_default().trim();
    let alert_status = match alerts.parse::<AlertLevel>() {
        Ok(level) => level,
        Err(_) => {
            if !alerts.is_empty() {
                warn!(value = alerts, "unrecognized alert value in sheet, treating as green");
            }
            AlertLevel::Green
        }
    };
    UserRecord {
        phone: text(COL_PHONE).trim().to_string(),
        email: text(COL_EMAIL),
        city: text(COL_CITY),
        locality: text(COL_AREA),
        full_address: text(COL_FULL_ADDRESS),
        alert_status,
        timestamp: text(COL_TIMESTAMP),
    }
}
