use std::{collections::HashMap, str::FromStr};

use serde_json::Value;

use super::error::TypeError;
use crate::error::Error;

pub type FormData = HashMap<String, Value>;

/// Loosely-typed JSON body, for the small auth payloads that are not
/// worth a dedicated struct.
pub struct Form {
    inner: HashMap<String, Value>,
}

impl Form {
    pub fn from_data(data: FormData) -> Self {
        Self { inner: data }
    }

    pub fn get_value<T>(&self, key: &str) -> Result<T, Error>
    where
        T: TryFrom<Value>,
    {
        match self.inner.get(key) {
            Some(value) => value
                .to_owned()
                .try_into()
                .map_err(|_e| TypeError::new(&format!("Invalid value for field '{key}'")).into()),
            None => Err(TypeError::new(&format!("Missing field '{key}'")).into()),
        }
    }

    pub fn get_number<T>(&self, key: &str) -> Result<T, Error>
    where
        T: FromStr,
    {
        match self.inner.get(key) {
            Some(value) => match value.as_str() {
                Some(v) => v
                    .parse()
                    .map_err(|_e| TypeError::new(&format!("Invalid number in field '{key}'")).into()),
                None => Err(TypeError::new(&format!("Field '{key}' is not a string")).into()),
            },
            None => Err(TypeError::new(&format!("Missing field '{key}'")).into()),
        }
    }

    pub fn get_str(&self, key: &str) -> Result<String, TypeError> {
        match self.inner.get(key) {
            Some(value) => match value.as_str() {
                Some(v) => Ok(v.to_string()),
                None => Err(TypeError::new(&format!("Field '{key}' is not a string"))),
            },
            None => Err(TypeError::new(&format!("Missing field '{key}'"))),
        }
    }

    pub fn get_opt_str(&self, key: &str) -> Option<String> {
        self.inner
            .get(key)
            .and_then(|value| value.as_str())
            .map(|v| v.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn form(value: Value) -> Form {
        let data: FormData = serde_json::from_value(value).unwrap();
        Form::from_data(data)
    }

    #[test]
    fn reads_string_fields() {
        let form = form(json!({"email": "cook@example.com", "password": "hunter22"}));
        assert_eq!(form.get_str("email").unwrap(), "cook@example.com");
        assert!(form.get_str("username").is_err());
    }

    #[test]
    fn rejects_non_string_values() {
        let form = form(json!({"email": 42}));
        assert!(form.get_str("email").is_err());
    }

    #[test]
    fn parses_stringified_numbers() {
        let numeric = form(json!({"recipes_limit": "3"}));
        assert_eq!(numeric.get_number::<i64>("recipes_limit").unwrap(), 3);

        let non_numeric = form(json!({"recipes_limit": "three"}));
        assert!(non_numeric.get_number::<i64>("recipes_limit").is_err());
    }

    #[test]
    fn optional_getter_never_errors() {
        let form = form(json!({"current_password": "old"}));
        assert_eq!(form.get_opt_str("current_password").as_deref(), Some("old"));
        assert_eq!(form.get_opt_str("new_password"), None);
    }
}
