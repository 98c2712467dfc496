//! Bundled demo schema: an application with a primary and a secondary
//! database connection.

use std::sync::Arc;

use option_schema_core::{
    ArgumentsEquals, ArgumentsSpace, Constraint, EnumType, EnvironmentFile, EnvironmentVariables,
    OptionDecl, Schema, Value, ValueType, WitherDecl,
};

/// Connection options of one database.
pub fn jdbc_options() -> Arc<Schema> {
    let jdbc_type = EnumType::new(
        "JdbcType",
        ["MYSQL", "POSTGRESQL", "ORACLE", "SQLSERVER", "SQLITE"],
    );
    Schema::builder("JdbcOptions")
        .option(
            OptionDecl::new("host", ValueType::String)
                .description("Database host name")
                .constraint(Constraint::not_null()),
        )
        .option(
            OptionDecl::new("port", ValueType::Int)
                .description("Database port")
                .default_value(3306)
                .constraint(Constraint::max(65535))
                .constraint(Constraint::positive()),
        )
        .option(
            OptionDecl::new("type", ValueType::Enum(jdbc_type))
                .description("Database vendor")
                .constraint(Constraint::not_null()),
        )
        .option(OptionDecl::new("username", ValueType::String).constraint(Constraint::not_null()))
        .option(OptionDecl::new("password", ValueType::String).constraint(Constraint::not_null()))
        .option(OptionDecl::new("database", ValueType::String).constraint(Constraint::not_null()))
        .option(
            OptionDecl::new("url", ValueType::String)
                .description("Connection URL, derived from the other options unless set")
                .default_with(|view| {
                    let vendor: String = view.require("type")?;
                    let host: String = view.require("host")?;
                    let port: i32 = view.require("port")?;
                    let database: String = view.require("database")?;
                    Ok(Value::from(format!(
                        "jdbc:{}://{host}:{port}/{database}",
                        vendor.to_lowercase()
                    )))
                }),
        )
        .wither(WitherDecl::new("port", ValueType::Int, "JdbcOptions"))
        .build()
}

/// The application schema. Arguments are read in `--name value` form when
/// `space_args` is set, else in `--name=value` form.
pub fn my_options(space_args: bool) -> Arc<Schema> {
    let jdbc = jdbc_options();
    let builder = Schema::builder("MyOptions")
        .option(
            OptionDecl::new("primarydb", ValueType::nested(&jdbc))
                .description("Primary database"),
        )
        .option(
            OptionDecl::new("secondarydb", ValueType::nested(&jdbc))
                .description("Secondary database"),
        )
        .extension(Arc::new(EnvironmentFile::new()))
        .extension(Arc::new(EnvironmentVariables));
    if space_args {
        builder.extension(Arc::new(ArgumentsSpace)).build()
    } else {
        builder.extension(Arc::new(ArgumentsEquals)).build()
    }
}
