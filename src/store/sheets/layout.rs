//! Column layout of the two sheets. Columns are found by header name, so rows
//! written by hand with extra or reordered columns keep working.

pub(crate) const USERS_SHEET: &str = "Users Info";
pub(crate) const SOS_SHEET: &str = "SOS Alert";

pub(crate) const COL_PHONE: &str = "Phone No.";
pub(crate) const COL_AREA: &str = "Area";
pub(crate) const COL_CITY: &str = "City";
pub(crate) const COL_ALERTS: &str = "Alerts";
pub(crate) const COL_EMAIL: &str = "Email";
pub(crate) const COL_FULL_ADDRESS: &str = "Full Address";
pub(crate) const COL_TIMESTAMP: &str = "Timestamp";
pub(crate) const COL_SOS_COORDINATES: &str = "SOS Coordinates";
pub(crate) const COL_ACCURACY: &str = "Accuracy";
pub(crate) const COL_STATUS: &str = "Status";

pub(crate) const USERS_HEADERS: [&str; 7] = [
    COL_PHONE,
    COL_AREA,
    COL_CITY,
    COL_ALERTS,
    COL_EMAIL,
    COL_FULL_ADDRESS,
    COL_TIMESTAMP,
];

pub(crate) const SOS_HEADERS: [&str; 5] = [
    COL_PHONE,
    COL_SOS_COORDINATES,
    COL_TIMESTAMP,
    COL_ACCURACY,
    COL_STATUS,
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SheetLayout {
    pub(crate) title: String,
    pub(crate) headers: Vec<String>,
}

impl SheetLayout {
    pub(crate) fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|header| header.trim() == name)
    }

    pub(crate) fn cell<'r>(&self, row: &'r [String], name: &str) -> Option<&'r str> {
        let index = self.column(name)?;
        row.get(index).map(String::as_str)
    }

    /// A full-width row with `values` placed under their headers and every
    /// other cell left empty.
    pub(crate) fn new_row(&self, values: &[(&str, &str)]) -> Vec<String> {
        let mut row = vec![String::new(); self.headers.len()];
        self.fill(&mut row, values);
        row
    }

    /// Overwrites `values` in an existing row, keeping all other cells.
    pub(crate) fn fill(&self, row: &mut Vec<String>, values: &[(&str, &str)]) {
        if row.len() < self.headers.len() {
            row.resize(self.headers.len(), String::new());
        }
        for (name, value) in values {
            if let Some(index) = self.column(name) {
                row[index] = (*value).to_string();
            }
        }
    }
}

/// Returns the header row to write when `required` columns are missing from
/// `current`. Existing headers keep their positions; missing ones are
/// appended in `required` order.
pub(crate) fn heal_headers(current: &[String], required: &[&str]) -> Option<Vec<String>> {
    let missing: Vec<&str> = required
        .iter()
        .copied()
        .filter(|name| !current.iter().any(|header| header.trim() == *name))
        .collect();
    if missing.is_empty() {
        return None;
    }

    let mut healed: Vec<String> = current.to_vec();
    while healed.last().is_some_and(|header| header.trim().is_empty()) {
        healed.pop();
    }
    healed.extend(missing.into_iter().map(str::to_string));
    Some(healed)
}

#[cfg(test)]
#[allow(non_snake_case)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn heal_headers__should_use_required_for_empty_sheet() {
        let healed = heal_headers(&[], &USERS_HEADERS).expect("healed");

        assert_eq!(healed, strings(&USERS_HEADERS));
    }

    #[test]
    fn heal_headers__should_return_none_when_complete() {
        // Given
        let current = strings(&[
            "Timestamp",
            "Phone No.",
            "Area",
            "City",
            "Alerts",
            "Email",
            "Full Address",
            "Notes",
        ]);

        // Then
        assert!(heal_headers(&current, &USERS_HEADERS).is_none());
    }

    #[test]
    fn heal_headers__should_append_missing_without_moving_existing() {
        // Given
        let current = strings(&["Phone No.", "Notes", "City", ""]);

        // When
        let healed = heal_headers(&current, &USERS_HEADERS).expect("healed");

        // Then
        assert_eq!(
            healed,
            strings(&[
                "Phone No.",
                "Notes",
                "City",
                "Area",
                "Alerts",
                "Email",
                "Full Address",
                "Timestamp"
            ])
        );
    }

    #[test]
    fn layout__should_place_values_by_header_name() {
        // Given
        let layout = SheetLayout {
            title: USERS_SHEET.to_string(),
            headers: strings(&["Email", "Notes", "Phone No."]),
        };

        // When
        let row = layout.new_row(&[(COL_PHONE, "9999999999"), (COL_EMAIL, "a@example.com")]);

        // Then
        assert_eq!(row, strings(&["a@example.com", "", "9999999999"]));
        assert_eq!(layout.cell(&row, COL_PHONE), Some("9999999999"));
        assert_eq!(layout.cell(&row, COL_CITY), None);
    }

    #[test]
    fn layout__should_keep_unrelated_cells_on_fill() {
        // Given
        let layout = SheetLayout {
            title: USERS_SHEET.to_string(),
            headers: strings(&["Phone No.", "Notes", "Email"]),
        };
        let mut row = strings(&["1", "keep me"]);

        // When
        layout.fill(&mut row, &[(COL_EMAIL, "b@example.com")]);

        // Then
        assert_eq!(row, strings(&["1", "keep me", "b@example.com"]));
    }
}
