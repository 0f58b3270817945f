use std::collections::HashSet;

use sqlx::{Pool, Postgres};

use crate::database::error::QueryError;
use crate::database::schema::{Id, ShoppingListItem};
use crate::error::{Error, HttpError};

use super::recipes::get_recipe;

pub async fn checklist_recipe_ids(
    pool: &Pool<Postgres>,
    user_id: Id,
    recipe_ids: &[Id],
) -> Result<HashSet<Id>, Error> {
    let rows: Vec<(Id,)> = sqlx::query_as(
        "SELECT recipe_id FROM checklist WHERE user_id = $1 AND recipe_id = ANY($2)",
    )
    .bind(user_id)
    .bind(recipe_ids)
    .fetch_all(pool)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    Ok(rows.into_iter().map(|r| r.0).collect())
}

pub async fn add_to_checklist(
    pool: &Pool<Postgres>,
    user_id: Id,
    recipe_id: Id,
) -> Result<(), Error> {
    if get_recipe(pool, recipe_id).await?.is_none() {
        return Err(HttpError::InvalidRequest.new("No recipe exists with specified id"));
    }

    let result = sqlx::query(
        "INSERT INTO checklist (user_id, recipe_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
    )
    .bind(user_id)
    .bind(recipe_id)
    .execute(pool)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    if result.rows_affected() == 0 {
        return Err(HttpError::InvalidRequest.new("Recipe is already in the shopping cart"));
    }

    Ok(())
}

pub async fn remove_from_checklist(
    pool: &Pool<Postgres>,
    user_id: Id,
    recipe_id: Id,
) -> Result<(), Error> {
    let result = sqlx::query("DELETE FROM checklist WHERE user_id = $1 AND recipe_id = $2")
        .bind(user_id)
        .bind(recipe_id)
        .execute(pool)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    if result.rows_affected() == 0 {
        return Err(HttpError::InvalidRequest.new("Recipe is not in the shopping cart"));
    }

    Ok(())
}

/// Aggregates amounts by (ingredient, unit) across every recipe in the
/// user's checklist, ordered by ingredient name.
pub async fn shopping_list(
    pool: &Pool<Postgres>,
    user_id: Id,
) -> Result<Vec<ShoppingListItem>, Error> {
    let rows: Vec<ShoppingListItem> = sqlx::query_as(
        "
        SELECT i.name AS name,
               i.measurement_unit AS measurement_unit,
               SUM(ri.amount)::BIGINT AS total_amount
        FROM checklist c
        INNER JOIN recipe_ingredients ri ON ri.recipe_id = c.recipe_id
        INNER JOIN ingredients i ON i.id = ri.ingredient_id
        WHERE c.user_id = $1
        GROUP BY i.name, i.measurement_unit
        ORDER BY i.name
    ",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    Ok(rows)
}

pub fn render_shopping_list_txt(items: &[ShoppingListItem]) -> String {
    let mut data = String::new();

    for item in items {
        data.push_str(&format!(
            "{}, {}, {}\n",
            item.name, item.total_amount, item.measurement_unit
        ));
    }

    data
}

pub fn render_shopping_list_csv(items: &[ShoppingListItem]) -> Result<String, Error> {
    let mut writer = csv::Writer::from_writer(vec![]);

    writer
        .write_record(["name", "amount", "measurement_unit"])
        .map_err(|e| HttpError::InternalServerError.new(&format!("{e}")))?;

    for item in items {
        writer
            .write_record([
                item.name.as_str(),
                &item.total_amount.to_string(),
                item.measurement_unit.as_str(),
            ])
            .map_err(|e| HttpError::InternalServerError.new(&format!("{e}")))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| HttpError::InternalServerError.new(&format!("{e}")))?;

    String::from_utf8(bytes)
        .map_err(|e| HttpError::InternalServerError.new(&format!("{e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items() -> Vec<ShoppingListItem> {
        vec![
            ShoppingListItem {
                name: String::from("flour"),
                measurement_unit: String::from("g"),
                total_amount: 500,
            },
            ShoppingListItem {
                name: String::from("milk"),
                measurement_unit: String::from("ml"),
                total_amount: 250,
            },
        ]
    }

    #[test]
    fn txt_lists_one_ingredient_per_line() {
        let data = render_shopping_list_txt(&items());
        assert_eq!(data, "flour, 500, g\nmilk, 250, ml\n");
    }

    #[test]
    fn txt_of_empty_checklist_is_empty() {
        assert_eq!(render_shopping_list_txt(&[]), "");
    }

    #[test]
    fn csv_has_header_and_rows() {
        let data = render_shopping_list_csv(&items()).unwrap();
        let mut lines = data.lines();
        assert_eq!(lines.next(), Some("name,amount,measurement_unit"));
        assert_eq!(lines.next(), Some("flour,500,g"));
        assert_eq!(lines.next(), Some("milk,250,ml"));
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn csv_quotes_names_with_commas() {
        let items = vec![ShoppingListItem {
            name: String::from("salt, coarse"),
            measurement_unit: String::from("g"),
            total_amount: 10,
        }];
        let data = render_shopping_list_csv(&items).unwrap();
        assert!(data.contains("\"salt, coarse\",10,g"));
    }
}
