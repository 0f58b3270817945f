use sqlx::{Pool, Postgres};

use crate::constants::SEED_TAGS;
use crate::database::error::QueryError;
use crate::database::schema::{Id, Tag};
use crate::error::{Error, HttpError};

pub async fn list_tags(pool: &Pool<Postgres>) -> Result<Vec<Tag>, Error> {
    let list: Vec<Tag> = sqlx::query_as("SELECT * FROM tags ORDER BY id")
        .fetch_all(pool)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    Ok(list)
}

pub async fn get_tag(pool: &Pool<Postgres>, id: Id) -> Result<Option<Tag>, Error> {
    let tag: Option<Tag> = sqlx::query_as("SELECT * FROM tags WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    Ok(tag)
}

/// Resolves the tag rows for a set of ids. Missing ids surface as a 400;
/// recipe payloads must only reference existing tags.
pub async fn resolve_tags(pool: &Pool<Postgres>, ids: &[Id]) -> Result<Vec<Tag>, Error> {
    let list: Vec<Tag> = sqlx::query_as("SELECT * FROM tags WHERE id = ANY($1)")
        .bind(ids)
        .fetch_all(pool)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    if list.len() != ids.len() {
        return Err(HttpError::InvalidRequest.new("Unknown tag id in list"));
    }

    Ok(list)
}

pub fn validate_color(color: &str) -> Result<(), Error> {
    let valid = color.len() == 7
        && color.starts_with('#')
        && color[1..].chars().all(|c| c.is_ascii_hexdigit());

    if !valid {
        return Err(HttpError::InvalidRequest.new("Color must be a #RRGGBB value"));
    }

    Ok(())
}

/// Inserts the static tag set, skipping rows that already exist.
/// Returns the number of newly created tags.
pub async fn seed_tags(pool: &Pool<Postgres>) -> Result<u64, Error> {
    let mut created = 0;

    for (name, color, slug) in SEED_TAGS {
        validate_color(color)?;

        let result = sqlx::query(
            "INSERT INTO tags (name, color, slug) VALUES ($1, $2, $3) ON CONFLICT DO NOTHING",
        )
        .bind(name)
        .bind(color)
        .bind(slug)
        .execute(pool)
        .await
        .map_err(|e| QueryError::from(e).into())?;

        created += result.rows_affected();
    }

    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_colors_are_well_formed() {
        for (_, color, _) in SEED_TAGS {
            assert!(validate_color(color).is_ok(), "bad seed color {color}");
        }
    }

    #[test]
    fn color_validation_rejects_malformed_values() {
        assert!(validate_color("#EE204D").is_ok());
        assert!(validate_color("EE204D").is_err());
        assert!(validate_color("#EE204").is_err());
        assert!(validate_color("#GG204D").is_err());
        assert!(validate_color("red").is_err());
    }
}
