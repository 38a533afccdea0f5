use crate::store::sheets::SheetsError;
use crate::store::sheets::auth::TokenSource;

use reqwest::Url;
use serde::Deserialize;
use serde_json::{Value as JsonValue, json};

/// Thin wrapper over the Sheets v4 REST endpoints the store needs.
pub(crate) struct SheetsApi {
    http: reqwest::Client,
    tokens: TokenSource,
    base: Url,
    spreadsheet_id: String,
}

#[derive(Debug, Default, Deserialize)]
struct SpreadsheetMeta {
    #[serde(default)]
    properties: SheetProperties,
    #[serde(default)]
    sheets: Vec<SheetEntry>,
}

#[derive(Debug, Default, Deserialize)]
struct SheetEntry {
    #[serde(default)]
    properties: SheetProperties,
}

#[derive(Debug, Default, Deserialize)]
struct SheetProperties {
    #[serde(default)]
    title: String,
}

#[derive(Debug, Default, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<JsonValue>>,
}

pub(crate) struct DocumentInfo {
    pub(crate) title: String,
    pub(crate) sheet_titles: Vec<String>,
}

impl SheetsApi {
    pub(crate) fn new(
        http: reqwest::Client,
        tokens: TokenSource,
        api_base: &str,
        spreadsheet_id: String,
    ) -> Result<Self, SheetsError> {
        let base = Url::parse(api_base).map_err(|err| SheetsError::InvalidUrl(err.to_string()))?;
        if base.cannot_be_a_base() {
            return Err(SheetsError::InvalidUrl(api_base.to_string()));
        }
        Ok(Self {
            http,
            tokens,
            base,
            spreadsheet_id,
        })
    }

    pub(crate) async fn document_info(&self) -> Result<DocumentInfo, SheetsError> {
        let mut url = self.url(&[&self.spreadsheet_id]);
        url.query_pairs_mut()
            .append_pair("fields", "properties.title,sheets.properties.title");
        let meta: SpreadsheetMeta = self
            .http
            .get(url)
            .bearer_auth(self.tokens.access_token().await?)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(DocumentInfo {
            title: meta.properties.title,
            sheet_titles: meta
                .sheets
                .into_iter()
                .map(|sheet| sheet.properties.title)
                .collect(),
        })
    }

    pub(crate) async fn add_sheet(&self, title: &str) -> Result<(), SheetsError> {
        let url = self.url(&[&format!("{}:batchUpdate", self.spreadsheet_id)]);
        let body = json!({
            "requests": [{ "addSheet": { "properties": { "title": title } } }]
        });
        self.http
            .post(url)
            .bearer_auth(self.tokens.access_token().await?)
            .json(&body)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    /// Every populated row of the sheet, header row first.
    pub(crate) async fn read_rows(&self, title: &str) -> Result<Vec<Vec<String>>, SheetsError> {
        let url = self.url(&[&self.spreadsheet_id, "values", &quoted(title)]);
        let range: ValueRange = self
            .http
            .get(url)
            .bearer_auth(self.tokens.access_token().await?)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(range
            .values
            .into_iter()
            .map(|row| row.into_iter().map(cell_text).collect())
            .collect())
    }

    /// Overwrites the row at the one-based `row_number`.
    pub(crate) async fn write_row(
        &self,
        title: &str,
        row_number: usize,
        values: &[String],
    ) -> Result<(), SheetsError> {
        let range = format!("{}!A{row_number}", quoted(title));
        let mut url = self.url(&[&self.spreadsheet_id, "values", &range]);
        url.query_pairs_mut().append_pair("valueInputOption", "RAW");
        self.http
            .put(url)
            .bearer_auth(self.tokens.access_token().await?)
            .json(&json!({ "range": range, "values": [values] }))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    pub(crate) async fn append_row(&self, title: &str, values: &[String]) -> Result<(), SheetsError> {
        let range = format!("{}!A1", quoted(title));
        let mut url = self.url(&[&self.spreadsheet_id, "values", &format!("{range}:append")]);
        url.query_pairs_mut()
            .append_pair("valueInputOption", "RAW")
            .append_pair("insertDataOption", "INSERT_ROWS");
        self.http
            .post(url)
            .bearer_auth(self.tokens.access_token().await?)
            .json(&json!({ "values": [values] }))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(["v4", "spreadsheets"]).extend(segments);
        }
        url
    }
}

fn quoted(title: &str) -> String {
    format!("'{}'", title.replace('\'', "''"))
}

fn cell_text(value: JsonValue) -> String {
    match value {
        JsonValue::String(text) => text,
        JsonValue::Null => String::new(),
        other => other.to_string(),
    }
}
