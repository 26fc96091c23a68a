use std::path::Path;

use serde_json::Value;

use crate::error::FormatError;
use crate::models::{DiseaseField, NormalizedRecord};

const DISEASE_HEADER_HINTS: [&str; 3] = ["disease", "condition", "illness"];
const JSON_ID_KEYS: [&str; 1] = ["id"];
const JSON_NAME_KEYS: [&str; 2] = ["name", "memberName"];
const JSON_DISEASE_KEYS: [&str; 4] = ["disease", "diseases", "condition", "medicalCondition"];
const JSON_EMAIL_KEYS: [&str; 2] = ["email", "emailAddress"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum FileFormat {
    Csv,
    Json,
}

impl FileFormat {
    pub fn from_path(path: &Path) -> Result<Self, FormatError> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        match extension.as_str() {
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            _ => Err(FormatError::UnsupportedFormat(path.display().to_string())),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ParsedFile {
    pub records: Vec<NormalizedRecord>,
    /// Data rows dropped because they had fewer fields than the header.
    pub skipped_rows: usize,
}

pub fn parse(text: &str, format: FileFormat) -> Result<ParsedFile, FormatError> {
    let parsed = match format {
        FileFormat::Csv => parse_csv(text)?,
        FileFormat::Json => parse_json(text)?,
    };

    tracing::debug!(
        records = parsed.records.len(),
        skipped_rows = parsed.skipped_rows,
        "normalized member file"
    );
    Ok(parsed)
}

fn parse_csv(text: &str) -> Result<ParsedFile, FormatError> {
    let lines: Vec<&str> = text.lines().filter(|line| !line.trim().is_empty()).collect();
    if lines.len() < 2 {
        return Err(FormatError::NoData);
    }

    let headers: Vec<String> = split_line(lines[0])?
        .iter()
        .map(|h| h.to_lowercase())
        .collect();

    let name_index = headers.iter().position(|h| h.contains("name"));
    let email_index = headers.iter().position(|h| h.contains("email"));
    let disease_index = headers
        .iter()
        .position(|h| DISEASE_HEADER_HINTS.iter().any(|hint| h.contains(hint)))
        .ok_or(FormatError::MissingDiseaseColumn)?;

    let mut parsed = ParsedFile::default();

    for (offset, line) in lines[1..].iter().enumerate() {
        let row = split_line(line)?;
        let row_index = offset + 1;

        if row.len() < headers.len() {
            parsed.skipped_rows += 1;
            tracing::debug!(row = row_index, fields = row.len(), "skipping short CSV row");
            continue;
        }

        let field = |index: usize| row.get(index).cloned().unwrap_or_default();

        parsed.records.push(NormalizedRecord {
            id: row_index.to_string(),
            name: name_index
                .map(field)
                .unwrap_or_else(|| format!("Member {row_index}")),
            email: email_index
                .map(field)
                .unwrap_or_else(|| format!("member{row_index}@email.com")),
            disease: DiseaseField::Text(field(disease_index)),
        });
    }

    Ok(parsed)
}

/// Splits one CSV line into trimmed cells. Balanced double quotes are
/// unquoted and may hold commas; a line with an unmatched quote is split on
/// every comma and the stray quotes are dropped, so no field spans lines.
fn split_line(line: &str) -> Result<Vec<String>, FormatError> {
    let balanced = line.matches('"').count() % 2 == 0;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .quoting(balanced)
        .trim(csv::Trim::All)
        .from_reader(line.as_bytes());

    let record = reader.records().next().transpose()?.unwrap_or_default();
    Ok(record
        .iter()
        .map(|cell| {
            if balanced {
                cell.to_string()
            } else {
                cell.trim_matches('"').trim().to_string()
            }
        })
        .collect())
}

fn parse_json(text: &str) -> Result<ParsedFile, FormatError> {
    let document: Value = serde_json::from_str(text)?;
    let members = member_array(&document).ok_or(FormatError::UnrecognizedStructure)?;

    let records = members
        .iter()
        .enumerate()
        .map(|(index, item)| normalize_member(index + 1, item))
        .collect();

    Ok(ParsedFile {
        records,
        skipped_rows: 0,
    })
}

fn member_array(document: &Value) -> Option<&Vec<Value>> {
    match document {
        Value::Array(items) => Some(items),
        Value::Object(map) => ["members", "data"]
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_array)),
        _ => None,
    }
}

fn normalize_member(position: usize, item: &Value) -> NormalizedRecord {
    let disease = match first_present(item, &JSON_DISEASE_KEYS) {
        Some(Value::String(text)) => DiseaseField::Text(text.clone()),
        Some(Value::Array(values)) => DiseaseField::List(
            values
                .iter()
                .filter_map(|value| value.as_str().map(str::to_string))
                .collect(),
        ),
        _ => DiseaseField::Text("Unknown".to_string()),
    };

    NormalizedRecord {
        id: first_present(item, &JSON_ID_KEYS)
            .map(text_of)
            .unwrap_or_else(|| position.to_string()),
        name: first_present(item, &JSON_NAME_KEYS)
            .map(text_of)
            .unwrap_or_else(|| format!("Member {position}")),
        email: first_present(item, &JSON_EMAIL_KEYS)
            .map(text_of)
            .unwrap_or_else(|| format!("member{position}@email.com")),
        disease,
    }
}

/// First value under `keys` that counts as present. Null, `false`, zero and
/// empty strings fall through to the next key.
fn first_present<'a>(item: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| item.get(*key))
        .find(|value| is_present(value))
}

fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn text_of(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
