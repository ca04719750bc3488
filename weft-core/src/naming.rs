use heck::ToSnakeCase;

/// Converts a declared Rust name (`UserProfile`, `createdAt`, `user_id`) to the
/// snake_case form used for tables and columns.
pub fn to_snake_case(name: &str) -> String {
    name.strip_prefix("r#").unwrap_or(name).to_snake_case()
}

/// Default table name for a row type: the snake_case of its type name.
pub fn table_name_for(type_name: &str) -> String {
    to_snake_case(type_name)
}
