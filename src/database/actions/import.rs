use std::path::Path;

use serde::Deserialize;
use sqlx::{Pool, Postgres, QueryBuilder};

use crate::database::error::{QueryError, TypeError};
use crate::error::Error;

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct IngredientImport {
    pub name: String,
    pub measurement_unit: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportFormat {
    Csv,
    Json,
}

impl ImportFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()?.to_lowercase().as_str() {
            "csv" => Some(Self::Csv),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Parses `name,measurement_unit` rows. The first row is a header and
/// is skipped; whitespace around fields is trimmed; blank rows are
/// ignored.
pub fn parse_ingredients_csv(data: &[u8]) -> Result<Vec<IngredientImport>, Error> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(data);

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record
            .map_err(|e| TypeError::new(&format!("Invalid CSV row: {e}")).into())?;

        if record.iter().all(|field| field.is_empty()) {
            continue;
        }

        let name = record.get(0).unwrap_or("").to_string();
        let measurement_unit = record.get(1).unwrap_or("").to_string();

        if name.is_empty() || measurement_unit.is_empty() {
            return Err(TypeError::new("CSV row is missing a name or unit").into());
        }

        rows.push(IngredientImport {
            name,
            measurement_unit,
        });
    }

    Ok(rows)
}

/// Parses a `[{"name": …, "measurement_unit": …}]` document.
pub fn parse_ingredients_json(data: &[u8]) -> Result<Vec<IngredientImport>, Error> {
    let rows: Vec<IngredientImport> = serde_json::from_slice(data)
        .map_err(|e| TypeError::new(&format!("Invalid JSON document: {e}")).into())?;

    for row in &rows {
        if row.name.is_empty() || row.measurement_unit.is_empty() {
            return Err(TypeError::new("JSON entry is missing a name or unit").into());
        }
    }

    Ok(rows)
}

/// Bulk-inserts catalog rows inside one transaction, skipping
/// duplicates on the (name, measurement_unit) key. Returns the number
/// of newly inserted rows.
pub async fn import_ingredients(
    pool: &Pool<Postgres>,
    rows: &[IngredientImport],
) -> Result<u64, Error> {
    if rows.is_empty() {
        return Ok(0);
    }

    let mut tx = pool
        .begin()
        .await
        .map_err(|e| QueryError::from(e).into())?;

    let mut inserted = 0;
    for chunk in rows.chunks(65535 / 2) {
        let mut query_builder: QueryBuilder<Postgres> =
            QueryBuilder::new("INSERT INTO ingredients (name, measurement_unit) ");

        query_builder.push_values(chunk, |mut b, row| {
            b.push_bind(&row.name).push_bind(&row.measurement_unit);
        });
        query_builder.push(" ON CONFLICT DO NOTHING");

        let result = query_builder
            .build()
            .execute(&mut *tx)
            .await
            .map_err(|e| QueryError::from(e).into())?;

        inserted += result.rows_affected();
    }

    tx.commit()
        .await
        .map_err(|e| QueryError::from(e).into())?;

    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_skips_header_and_blank_rows() {
        let data = b"name,measurement_unit\nflour,g\n,\nmilk , ml \n";
        let rows = parse_ingredients_csv(data).unwrap();

        assert_eq!(
            rows,
            vec![
                IngredientImport {
                    name: String::from("flour"),
                    measurement_unit: String::from("g"),
                },
                IngredientImport {
                    name: String::from("milk"),
                    measurement_unit: String::from("ml"),
                },
            ]
        );
    }

    #[test]
    fn csv_with_missing_unit_is_rejected() {
        let data = b"name,measurement_unit\nflour,\n";
        assert!(parse_ingredients_csv(data).is_err());
    }

    #[test]
    fn json_parses_catalog_entries() {
        let data = br#"[{"name": "flour", "measurement_unit": "g"}]"#;
        let rows = parse_ingredients_json(data).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "flour");
    }

    #[test]
    fn malformed_json_is_rejected() {
        assert!(parse_ingredients_json(b"{\"name\": \"flour\"}").is_err());
        assert!(parse_ingredients_json(b"not json").is_err());
        assert!(parse_ingredients_json(br#"[{"name": "", "measurement_unit": "g"}]"#).is_err());
    }

    #[test]
    fn format_detection_follows_extension() {
        assert_eq!(
            ImportFormat::from_path(Path::new("data/ingredients.csv")),
            Some(ImportFormat::Csv)
        );
        assert_eq!(
            ImportFormat::from_path(Path::new("data/INGREDIENTS.JSON")),
            Some(ImportFormat::Json)
        );
        assert_eq!(ImportFormat::from_path(Path::new("data/ingredients.xml")), None);
        assert_eq!(ImportFormat::from_path(Path::new("ingredients")), None);
    }
}
