pub const RECIPE_COUNT_PER_PAGE: i64 = 10;
pub const USER_COUNT_PER_PAGE: i64 = 10;
pub const SUBSCRIPTION_COUNT_PER_PAGE: i64 = 10;
pub const MAX_PAGE_LIMIT: i64 = 100;

pub const MIN_COOKING_TIME: i32 = 1;
pub const MAX_COOKING_TIME: i32 = 32000;
pub const MIN_INGREDIENT_AMOUNT: i32 = 1;
pub const MAX_INGREDIENT_AMOUNT: i32 = 32000;

pub const MAX_NAME_LENGTH: usize = 200;
pub const MAX_USERNAME_LENGTH: usize = 150;
pub const MAX_EMAIL_LENGTH: usize = 254;
pub const MIN_PASSWORD_LENGTH: usize = 8;

pub const SESSION_LIFETIME_HOURS: i64 = 24;

/* (name, color, slug) rows inserted by the seed-tags command */
pub const SEED_TAGS: &[(&str, &str, &str)] = &[
    ("Breakfast", "#EE204D", "breakfast"),
    ("Lunch", "#008000", "lunch"),
    ("Dinner", "#78DBE2", "dinner"),
];

pub const SHOPPING_LIST_FILENAME: &str = "ingredients";
