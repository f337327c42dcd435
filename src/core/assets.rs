//! Embedded templates.
//!
//! The default configuration is baked into the binary so `reality init` and
//! config-less runs work without any external files.

use rust_embed::RustEmbed;

#[derive(RustEmbed)]
#[folder = "templates/"]
#[include = "*.toml"]
struct Templates;

pub const CONFIG_TEMPLATE: &str = "reality.toml";

pub fn get_template(name: &str) -> Option<String> {
    Templates::get(name).map(|file| String::from_utf8_lossy(file.data.as_ref()).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_template_is_embedded() {
        let body = get_template(CONFIG_TEMPLATE).expect("template");
        assert!(body.contains("[trust]"));
        assert!(get_template("missing.toml").is_none());
    }
}
