use std::collections::{HashMap, HashSet};

use sqlx::{Pool, Postgres, QueryBuilder, Transaction};

use crate::authentication::{jwt::SessionData, permissions::ActionType};
use crate::constants::{
    MAX_COOKING_TIME, MAX_INGREDIENT_AMOUNT, MAX_NAME_LENGTH, MAX_PAGE_LIMIT, MIN_COOKING_TIME,
    MIN_INGREDIENT_AMOUNT, RECIPE_COUNT_PER_PAGE,
};
use crate::database::error::QueryError;
use crate::database::pagination::{clamp_limit, PageContext};
use crate::database::schema::{
    Id, Profile, Recipe, RecipeCard, RecipeFull, RecipeInput, RecipePart, RecipeRow, RecipeTagRow,
    Tag, User,
};
use crate::error::{Error, HttpError};

use super::checklist::checklist_recipe_ids;
use super::favorites::favorite_recipe_ids;
use super::follows::subscribed_author_ids;
use super::ingredients::assert_ingredients_exist;
use super::tags::resolve_tags;

/// Query-parameter driven WHERE conditions for the recipe listing.
/// The two flag filters are only ever set for authenticated viewers.
#[derive(Debug, Default, Clone)]
pub struct RecipeFilters {
    pub author: Option<Id>,
    pub tags: Vec<String>,
    pub favorited_by: Option<Id>,
    pub in_checklist_of: Option<Id>,
}

pub async fn fetch_recipes(
    pool: &Pool<Postgres>,
    filters: RecipeFilters,
    viewer: Option<Id>,
    offset: i64,
    limit: Option<i64>,
) -> Result<PageContext<RecipeFull>, Error> {
    let limit = clamp_limit(limit, RECIPE_COUNT_PER_PAGE, MAX_PAGE_LIMIT);

    let mut query_builder: QueryBuilder<Postgres> =
        QueryBuilder::new("SELECT r.*, COUNT(*) OVER() AS count FROM recipes r WHERE TRUE");

    if let Some(author) = filters.author {
        query_builder.push(" AND r.author_id = ").push_bind(author);
    }

    if !filters.tags.is_empty() {
        query_builder
            .push(
                " AND r.id IN (SELECT rt.recipe_id FROM recipe_tags rt \
                 INNER JOIN tags t ON t.id = rt.tag_id WHERE t.slug = ANY(",
            )
            .push_bind(filters.tags)
            .push("))");
    }

    if let Some(user_id) = filters.favorited_by {
        query_builder
            .push(" AND r.id IN (SELECT recipe_id FROM favorites WHERE user_id = ")
            .push_bind(user_id)
            .push(")");
    }

    if let Some(user_id) = filters.in_checklist_of {
        query_builder
            .push(" AND r.id IN (SELECT recipe_id FROM checklist WHERE user_id = ")
            .push_bind(user_id)
            .push(")");
    }

    query_builder
        .push(" ORDER BY r.pub_date DESC, r.id DESC LIMIT ")
        .push_bind(limit)
        .push(" OFFSET ")
        .push_bind(offset);

    let rows: Vec<RecipeRow> = query_builder
        .build_query_as()
        .fetch_all(pool)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    let total_count = rows.first().map(|r| r.count).unwrap_or(0);
    let recipes: Vec<Recipe> = rows.into_iter().map(Recipe::from).collect();

    let full = hydrate_recipes(pool, recipes, viewer).await?;

    Ok(PageContext::from_rows(full, total_count, limit, offset))
}

pub async fn get_recipe(pool: &Pool<Postgres>, id: Id) -> Result<Option<Recipe>, Error> {
    let row: Option<Recipe> = sqlx::query_as("SELECT * FROM recipes WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    Ok(row)
}

/// Resolves a recipe for mutation: the author may edit their own,
/// admins may edit any.
pub async fn get_recipe_mut(
    pool: &Pool<Postgres>,
    id: Id,
    session: &SessionData,
) -> Result<Recipe, Error> {
    let recipe = get_recipe(pool, id).await?;
    session.authenticate(ActionType::ManageOwnRecipes)?;

    match recipe {
        Some(recipe) => match session.authenticate(ActionType::ManageAllRecipes) {
            Ok(_) => Ok(recipe),
            Err(_) => {
                if recipe.author_id != session.user_id {
                    Err(HttpError::Unauthorized.default())
                } else {
                    Ok(recipe)
                }
            }
        },
        None => Err(HttpError::NotFound.new("No recipe exists with specified id")),
    }
}

pub async fn get_recipe_full(
    pool: &Pool<Postgres>,
    id: Id,
    viewer: Option<Id>,
) -> Result<Option<RecipeFull>, Error> {
    let recipe = match get_recipe(pool, id).await? {
        Some(recipe) => recipe,
        None => return Ok(None),
    };

    let mut full = hydrate_recipes(pool, vec![recipe], viewer).await?;
    Ok(full.pop())
}

/// Write-side payload checks that need no database access.
pub fn validate_recipe_input(input: &RecipeInput) -> Result<(), Error> {
    if input.name.trim().is_empty() || input.name.len() > MAX_NAME_LENGTH {
        return Err(HttpError::InvalidRequest.new("Recipe name length is out of range"));
    }

    if input.text.trim().is_empty() {
        return Err(HttpError::InvalidRequest.new("Recipe text must not be empty"));
    }

    if !(MIN_COOKING_TIME..=MAX_COOKING_TIME).contains(&input.cooking_time) {
        return Err(HttpError::InvalidRequest.new("Cooking time is out of range"));
    }

    if input.tags.is_empty() {
        return Err(HttpError::InvalidRequest.new("Tag list must not be empty"));
    }

    let unique_tags: HashSet<Id> = input.tags.iter().copied().collect();
    if unique_tags.len() != input.tags.len() {
        return Err(HttpError::InvalidRequest.new("Tags must be unique"));
    }

    if input.ingredients.is_empty() {
        return Err(HttpError::InvalidRequest.new("Ingredient list must not be empty"));
    }

    let unique_ingredients: HashSet<Id> = input.ingredients.iter().map(|i| i.id).collect();
    if unique_ingredients.len() != input.ingredients.len() {
        return Err(HttpError::InvalidRequest.new("Ingredients must be unique"));
    }

    for part in &input.ingredients {
        if !(MIN_INGREDIENT_AMOUNT..=MAX_INGREDIENT_AMOUNT).contains(&part.amount) {
            return Err(HttpError::InvalidRequest.new("Ingredient amount is out of range"));
        }
    }

    Ok(())
}

pub async fn create_recipe(
    pool: &Pool<Postgres>,
    author_id: Id,
    input: &RecipeInput,
    image: &str,
) -> Result<Id, Error> {
    validate_recipe_input(input)?;
    resolve_tags(pool, &input.tags).await?;
    let ingredient_ids: Vec<Id> = input.ingredients.iter().map(|i| i.id).collect();
    assert_ingredients_exist(pool, &ingredient_ids).await?;

    let mut tx = pool
        .begin()
        .await
        .map_err(|e| QueryError::from(e).into())?;

    let row: (Id,) = sqlx::query_as(
        "
        INSERT INTO recipes (author_id, name, image, text, cooking_time)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id
    ",
    )
    .bind(author_id)
    .bind(&input.name)
    .bind(image)
    .bind(&input.text)
    .bind(input.cooking_time)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    let recipe_id = row.0;

    insert_recipe_parts(&mut tx, recipe_id, input).await?;
    insert_recipe_tags(&mut tx, recipe_id, &input.tags).await?;

    tx.commit()
        .await
        .map_err(|e| QueryError::from(e).into())?;

    Ok(recipe_id)
}

/// Full association replacement: the ingredient and tag sets are
/// cleared and recreated from the payload, never merged.
pub async fn update_recipe(
    pool: &Pool<Postgres>,
    recipe_id: Id,
    input: &RecipeInput,
    image: Option<&str>,
) -> Result<(), Error> {
    validate_recipe_input(input)?;
    resolve_tags(pool, &input.tags).await?;
    let ingredient_ids: Vec<Id> = input.ingredients.iter().map(|i| i.id).collect();
    assert_ingredients_exist(pool, &ingredient_ids).await?;

    let mut tx = pool
        .begin()
        .await
        .map_err(|e| QueryError::from(e).into())?;

    sqlx::query(
        "
        UPDATE recipes
        SET name = $1, text = $2, cooking_time = $3, image = COALESCE($4, image)
        WHERE id = $5
    ",
    )
    .bind(&input.name)
    .bind(&input.text)
    .bind(input.cooking_time)
    .bind(image)
    .bind(recipe_id)
    .execute(&mut *tx)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    sqlx::query("DELETE FROM recipe_ingredients WHERE recipe_id = $1")
        .bind(recipe_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    sqlx::query("DELETE FROM recipe_tags WHERE recipe_id = $1")
        .bind(recipe_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    insert_recipe_parts(&mut tx, recipe_id, input).await?;
    insert_recipe_tags(&mut tx, recipe_id, &input.tags).await?;

    tx.commit()
        .await
        .map_err(|e| QueryError::from(e).into())?;

    Ok(())
}

pub async fn delete_recipe(pool: &Pool<Postgres>, recipe_id: Id) -> Result<(), Error> {
    sqlx::query("DELETE FROM recipes WHERE id = $1")
        .bind(recipe_id)
        .execute(pool)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    Ok(())
}

async fn insert_recipe_parts(
    tx: &mut Transaction<'_, Postgres>,
    recipe_id: Id,
    input: &RecipeInput,
) -> Result<(), Error> {
    let mut query_builder: QueryBuilder<Postgres> =
        QueryBuilder::new("INSERT INTO recipe_ingredients (recipe_id, ingredient_id, amount) ");

    query_builder.push_values(input.ingredients.iter().take(65535 / 3), |mut b, part| {
        b.push_bind(recipe_id).push_bind(part.id).push_bind(part.amount);
    });

    query_builder
        .build()
        .execute(&mut **tx)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    Ok(())
}

async fn insert_recipe_tags(
    tx: &mut Transaction<'_, Postgres>,
    recipe_id: Id,
    tags: &[Id],
) -> Result<(), Error> {
    let mut query_builder: QueryBuilder<Postgres> =
        QueryBuilder::new("INSERT INTO recipe_tags (recipe_id, tag_id) ");

    query_builder.push_values(tags.iter().take(65535 / 2), |mut b, tag_id| {
        b.push_bind(recipe_id).push_bind(*tag_id);
    });

    query_builder
        .build()
        .execute(&mut **tx)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    Ok(())
}

/// Expands bare recipe rows into their API shape: tags, ingredient
/// lines, author profile and the per-viewer flags, all resolved in
/// batch queries.
pub async fn hydrate_recipes(
    pool: &Pool<Postgres>,
    recipes: Vec<Recipe>,
    viewer: Option<Id>,
) -> Result<Vec<RecipeFull>, Error> {
    if recipes.is_empty() {
        return Ok(vec![]);
    }

    let recipe_ids: Vec<Id> = recipes.iter().map(|r| r.id).collect();
    let author_ids: Vec<Id> = recipes
        .iter()
        .map(|r| r.author_id)
        .collect::<HashSet<Id>>()
        .into_iter()
        .collect();

    let parts: Vec<RecipePart> = sqlx::query_as(
        "
        SELECT ri.recipe_id AS recipe_id, ri.ingredient_id AS ingredient_id,
               i.name AS name, i.measurement_unit AS measurement_unit, ri.amount AS amount
        FROM recipe_ingredients ri
        INNER JOIN ingredients i ON i.id = ri.ingredient_id
        WHERE ri.recipe_id = ANY($1)
    ",
    )
    .bind(&recipe_ids)
    .fetch_all(pool)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    let mut parts_by_recipe: HashMap<Id, Vec<RecipePart>> = HashMap::new();
    parts
        .into_iter()
        .for_each(|part| match parts_by_recipe.get_mut(&part.recipe_id) {
            Some(v) => v.push(part),
            None => {
                parts_by_recipe.insert(part.recipe_id, vec![part]);
            }
        });

    let tag_rows: Vec<RecipeTagRow> = sqlx::query_as(
        "
        SELECT rt.recipe_id AS recipe_id, t.id AS id, t.name AS name,
               t.color AS color, t.slug AS slug
        FROM recipe_tags rt
        INNER JOIN tags t ON t.id = rt.tag_id
        WHERE rt.recipe_id = ANY($1)
        ORDER BY t.id
    ",
    )
    .bind(&recipe_ids)
    .fetch_all(pool)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    let mut tags_by_recipe: HashMap<Id, Vec<Tag>> = HashMap::new();
    tag_rows
        .into_iter()
        .for_each(|row| match tags_by_recipe.get_mut(&row.recipe_id) {
            Some(v) => v.push(row.into()),
            None => {
                let recipe_id = row.recipe_id;
                tags_by_recipe.insert(recipe_id, vec![row.into()]);
            }
        });

    let authors: Vec<User> = sqlx::query_as("SELECT * FROM users WHERE id = ANY($1)")
        .bind(&author_ids)
        .fetch_all(pool)
        .await
        .map_err(|e| QueryError::from(e).into())?;
    let authors: HashMap<Id, User> = authors.into_iter().map(|u| (u.id, u)).collect();

    let (favorited, in_checklist, subscribed) = match viewer {
        Some(viewer) => (
            favorite_recipe_ids(pool, viewer, &recipe_ids).await?,
            checklist_recipe_ids(pool, viewer, &recipe_ids).await?,
            subscribed_author_ids(pool, viewer, &author_ids).await?,
        ),
        None => Default::default(),
    };

    recipes
        .into_iter()
        .map(|recipe| {
            let author = authors.get(&recipe.author_id).ok_or_else(|| {
                HttpError::InternalServerError.new("Recipe author row is missing")
            })?;

            Ok(RecipeFull {
                id: recipe.id,
                tags: tags_by_recipe.remove(&recipe.id).unwrap_or_default(),
                author: Profile::from_user(author, subscribed.contains(&recipe.author_id)),
                ingredients: parts_by_recipe
                    .remove(&recipe.id)
                    .unwrap_or_default()
                    .into_iter()
                    .map(Into::into)
                    .collect(),
                is_favorited: favorited.contains(&recipe.id),
                is_in_shopping_cart: in_checklist.contains(&recipe.id),
                name: recipe.name,
                image: recipe.image,
                text: recipe.text,
                cooking_time: recipe.cooking_time,
            })
        })
        .collect()
}

pub async fn recipe_card(pool: &Pool<Postgres>, recipe_id: Id) -> Result<RecipeCard, Error> {
    let card: Option<RecipeCard> =
        sqlx::query_as("SELECT id, name, image, cooking_time FROM recipes WHERE id = $1")
            .bind(recipe_id)
            .fetch_optional(pool)
            .await
            .map_err(|e| QueryError::from(e).into())?;

    match card {
        Some(card) => Ok(card),
        None => Err(HttpError::NotFound.new("No recipe exists with specified id")),
    }
}

pub async fn author_recipe_cards(
    pool: &Pool<Postgres>,
    author_id: Id,
    limit: Option<i64>,
) -> Result<Vec<RecipeCard>, Error> {
    let cards: Vec<RecipeCard> = sqlx::query_as(
        "
        SELECT id, name, image, cooking_time FROM recipes
        WHERE author_id = $1
        ORDER BY pub_date DESC, id DESC
        LIMIT $2
    ",
    )
    .bind(author_id)
    .bind(limit)
    .fetch_all(pool)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    Ok(cards)
}

pub async fn count_author_recipes(pool: &Pool<Postgres>, author_id: Id) -> Result<i64, Error> {
    let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM recipes WHERE author_id = $1")
        .bind(author_id)
        .fetch_one(pool)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    Ok(row.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::schema::RecipeIngredientInput;

    fn input() -> RecipeInput {
        RecipeInput {
            name: String::from("Borscht"),
            text: String::from("Simmer everything."),
            cooking_time: 90,
            image: Some(String::from("data:image/png;base64,aGk=")),
            tags: vec![1, 2],
            ingredients: vec![
                RecipeIngredientInput { id: 1, amount: 200 },
                RecipeIngredientInput { id: 2, amount: 50 },
            ],
        }
    }

    #[test]
    fn valid_input_passes() {
        assert!(validate_recipe_input(&input()).is_ok());
    }

    #[test]
    fn empty_tag_list_is_rejected() {
        let mut input = input();
        input.tags.clear();
        assert!(validate_recipe_input(&input).is_err());
    }

    #[test]
    fn duplicate_tags_are_rejected() {
        let mut input = input();
        input.tags = vec![1, 1];
        assert!(validate_recipe_input(&input).is_err());
    }

    #[test]
    fn empty_ingredient_list_is_rejected() {
        let mut input = input();
        input.ingredients.clear();
        assert!(validate_recipe_input(&input).is_err());
    }

    #[test]
    fn duplicate_ingredients_are_rejected() {
        let mut input = input();
        input.ingredients = vec![
            RecipeIngredientInput { id: 3, amount: 10 },
            RecipeIngredientInput { id: 3, amount: 20 },
        ];
        assert!(validate_recipe_input(&input).is_err());
    }

    #[test]
    fn bounds_are_inclusive() {
        let mut input = input();
        input.cooking_time = 1;
        input.ingredients[0].amount = 32000;
        assert!(validate_recipe_input(&input).is_ok());

        input.cooking_time = 0;
        assert!(validate_recipe_input(&input).is_err());

        input.cooking_time = 32001;
        assert!(validate_recipe_input(&input).is_err());
    }

    #[test]
    fn out_of_range_amount_is_rejected() {
        let mut input = input();
        input.ingredients[0].amount = 0;
        assert!(validate_recipe_input(&input).is_err());

        input.ingredients[0].amount = 32001;
        assert!(validate_recipe_input(&input).is_err());
    }

    #[test]
    fn blank_name_and_text_are_rejected() {
        let mut bad_name = input();
        bad_name.name = String::from("   ");
        assert!(validate_recipe_input(&bad_name).is_err());

        let mut bad_text = input();
        bad_text.text = String::new();
        assert!(validate_recipe_input(&bad_text).is_err());
    }
}
