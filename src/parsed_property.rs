use std::path::PathBuf;

/// A configuration value together with the layer that supplied it
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedProperty<T> {
    /// From a command line flag (value, flag as typed)
    Cli(T, String),
    /// From a `RESOLVERS_*` variable (value, raw variable text)
    Env(T, String),
    /// From the config file (value, file path, raw toml text)
    File(T, PathBuf, String),
    /// Built-in default
    Default(T),
}

impl<T> ParsedProperty<T> {
    pub fn value(&self) -> &T {
        match self {
            ParsedProperty::Cli(value, _)
            | ParsedProperty::Env(value, _)
            | ParsedProperty::File(value, _, _)
            | ParsedProperty::Default(value) => value,
        }
    }

    pub fn into_value(self) -> T {
        match self {
            ParsedProperty::Cli(value, _)
            | ParsedProperty::Env(value, _)
            | ParsedProperty::File(value, _, _)
            | ParsedProperty::Default(value) => value,
        }
    }

    /// Where the value came from, phrased for error messages
    pub fn origin(&self) -> String {
        match self {
            ParsedProperty::Cli(_, flag) => format!("command line `{flag}`"),
            ParsedProperty::Env(_, raw) => format!("environment value `{raw}`"),
            ParsedProperty::File(_, path, raw) => format!("{} (`{raw}`)", path.display()),
            ParsedProperty::Default(_) => "built-in default".to_string(),
        }
    }
}
