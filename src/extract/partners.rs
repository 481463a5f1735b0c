use std::collections::HashMap;
use std::path::Path;

use anyhow::Context as _;
use calamine::{Data, Reader as _, Xlsx, open_workbook};

use crate::error::ExtractError;
use crate::formats::RawPartner;

pub const REQUIRED_COLUMNS: [&str; 10] = [
    "nom_librairie",
    "adresse",
    "code_postal",
    "ville",
    "contact_nom",
    "contact_email",
    "contact_telephone",
    "ca_annuel",
    "date_partenariat",
    "specialite",
];

/// Reads the first worksheet of the partner workbook. Rows keep their PII.
pub fn read_partners_xlsx(path: &Path) -> anyhow::Result<Vec<RawPartner>> {
    if !path.is_file() {
        return Err(ExtractError::NotFound(path.to_path_buf()).into());
    }

    tracing::info!(path = %path.display(), "reading partners workbook");
    let mut workbook: Xlsx<_> =
        open_workbook(path).with_context(|| format!("open workbook: {}", path.display()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| ExtractError::NoWorksheet(path.to_path_buf()))?
        .with_context(|| format!("read first worksheet: {}", path.display()))?;

    let partners = partners_from_rows(range.rows())?;
    tracing::info!(rows = partners.len(), "partners rows ready");
    Ok(partners)
}

pub fn partners_from_rows<'a>(
    mut rows: impl Iterator<Item = &'a [Data]>,
) -> Result<Vec<RawPartner>, ExtractError> {
    let header: HashMap<String, usize> = rows
        .next()
        .unwrap_or_default()
        .iter()
        .enumerate()
        .filter_map(|(idx, cell)| cell_text(cell).map(|name| (name.trim().to_owned(), idx)))
        .collect();

    let missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|column| !header.contains_key(**column))
        .map(|column| (*column).to_owned())
        .collect();
    if !missing.is_empty() {
        return Err(ExtractError::MissingColumns(missing));
    }
    tracing::info!(columns = header.len(), "partners columns ok");

    let column = |row: &'a [Data], name: &str| header.get(name).and_then(|idx| row.get(*idx));

    let mut partners = Vec::new();
    for row in rows {
        if row.iter().all(is_blank) {
            continue;
        }
        let text = |name: &str| column(row, name).and_then(cell_text);
        partners.push(RawPartner {
            nom_librairie: text("nom_librairie"),
            adresse: text("adresse"),
            code_postal: text("code_postal"),
            ville: text("ville"),
            contact_nom: text("contact_nom"),
            contact_email: text("contact_email"),
            contact_telephone: text("contact_telephone"),
            ca_annuel: column(row, "ca_annuel").and_then(cell_number),
            date_partenariat: text("date_partenariat"),
            specialite: text("specialite"),
        });
    }
    Ok(partners)
}

fn is_blank(cell: &Data) -> bool {
    match cell {
        Data::Empty => true,
        Data::String(text) => text.trim().is_empty(),
        _ => false,
    }
}

/// Cell as text. Whole numbers drop their fractional part so postal codes and
/// phone numbers stored as numbers read naturally; dates become ISO strings.
fn cell_text(cell: &Data) -> Option<String> {
    match cell {
        Data::Empty | Data::Error(_) => None,
        Data::String(text) => Some(text.clone()),
        Data::Int(value) => Some(value.to_string()),
        Data::Float(value) if value.fract() == 0.0 && value.abs() < 1e15 => {
            Some(format!("{}", *value as i64))
        }
        Data::Float(value) => Some(value.to_string()),
        Data::Bool(value) => Some(value.to_string()),
        Data::DateTime(value) => value.as_datetime().map(|at| {
            if at.time() == chrono::NaiveTime::MIN {
                at.date().format("%Y-%m-%d").to_string()
            } else {
                at.format("%Y-%m-%dT%H:%M:%S").to_string()
            }
        }),
        Data::DateTimeIso(text) | Data::DurationIso(text) => Some(text.clone()),
    }
}

fn cell_number(cell: &Data) -> Option<f64> {
    match cell {
        Data::Int(value) => Some(*value as f64),
        Data::Float(value) => Some(*value),
        Data::String(text) => {
            let normalized: String = text
                .chars()
                .filter(|c| !c.is_whitespace())
                .map(|c| if c == ',' { '.' } else { c })
                .collect();
            normalized.parse().ok()
        }
        _ => None,
    }
}
