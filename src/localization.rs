use anyhow::{anyhow, Result};
use lazy_static::lazy_static;
use fluent_bundle::concurrent::FluentBundle;
use fluent_bundle::{FluentArgs, FluentResource, FluentValue};
use std::collections::HashMap;
use unic_langid::LanguageIdentifier;

const DEFAULT_LANGUAGE: &str = "en";

/// Embedded Fluent resources, one per supported language
const RESOURCES: &[(&str, &str)] = &[
    ("en", include_str!("../locales/en/main.ftl")),
    ("ru", include_str!("../locales/ru/main.ftl")),
];

/// Localization manager for the shop bot
pub struct LocalizationManager {
    bundles: HashMap<String, FluentBundle<FluentResource>>,
}

impl LocalizationManager {
    /// Create a new localization manager with every embedded language
    pub fn new() -> Result<Self> {
        let mut bundles = HashMap::new();

        for (language, source) in RESOURCES {
            let locale: LanguageIdentifier = language.parse()?;
            let bundle = Self::create_bundle(locale, source)?;
            bundles.insert(language.to_string(), bundle);
        }

        Ok(Self { bundles })
    }

    /// Create a fluent bundle for a specific locale
    fn create_bundle(
        locale: LanguageIdentifier,
        source: &str,
    ) -> Result<FluentBundle<FluentResource>> {
        let mut bundle = FluentBundle::new_concurrent(vec![locale.clone()]);
        bundle.set_use_isolating(false);

        let resource = FluentResource::try_new(source.to_string())
            .map_err(|(_, errors)| anyhow!("invalid resource for {locale}: {errors:?}"))?;
        bundle
            .add_resource(resource)
            .map_err(|errors| anyhow!("duplicate messages for {locale}: {errors:?}"))?;

        Ok(bundle)
    }

    /// Map a Telegram language code such as `ru-RU` onto a supported language
    pub fn resolve_language<'a>(&self, language_code: Option<&'a str>) -> &'a str {
        match language_code {
            Some(code) => {
                let primary = code.split(['-', '_']).next().unwrap_or(code);
                if self.bundles.contains_key(primary) {
                    primary
                } else {
                    DEFAULT_LANGUAGE
                }
            }
            None => DEFAULT_LANGUAGE,
        }
    }

    /// Get a localized message in a given language, falling back to English
    pub fn get_message_in_language(
        &self,
        key: &str,
        language: &str,
        args: Option<&HashMap<&str, &str>>,
    ) -> String {
        let bundle = match self
            .bundles
            .get(self.resolve_language(Some(language)))
            .or_else(|| self.bundles.get(DEFAULT_LANGUAGE))
        {
            Some(bundle) => bundle,
            None => return format!("Missing translation: {}", key),
        };

        let msg = match bundle.get_message(key) {
            Some(msg) => msg,
            None => return format!("Missing translation: {}", key),
        };

        let pattern = match msg.value() {
            Some(pattern) => pattern,
            None => return format!("Missing value for key: {}", key),
        };

        let mut errors = vec![];
        let fluent_args = args.map(|args| {
            args.iter()
                .map(|(k, v)| (*k, FluentValue::from(*v)))
                .collect::<FluentArgs>()
        });

        bundle
            .format_pattern(pattern, fluent_args.as_ref(), &mut errors)
            .into_owned()
    }

    /// Get a localized message in English
    pub fn get_message(&self, key: &str, args: Option<&HashMap<&str, &str>>) -> String {
        self.get_message_in_language(key, DEFAULT_LANGUAGE, args)
    }
}

lazy_static! {
    static ref LOCALIZATION_MANAGER: Option<LocalizationManager> = LocalizationManager::new().ok();
}

/// Initialize the global localization manager
pub fn init_localization() -> Result<()> {
    (*LOCALIZATION_MANAGER)
        .as_ref()
        .map(|_| ())
        .ok_or_else(|| anyhow!("Localization resources failed to load"))
}

/// Localized message for the user's language
pub fn t_lang(key: &str, language_code: Option<&str>) -> String {
    t_args_lang(key, &[], language_code)
}

/// Localized message with arguments for the user's language
pub fn t_args_lang(key: &str, args: &[(&str, &str)], language_code: Option<&str>) -> String {
    match &*LOCALIZATION_MANAGER {
        Some(manager) => {
            let args_map: HashMap<&str, &str> = args.iter().cloned().collect();
            let args = (!args_map.is_empty()).then_some(&args_map);
            manager.get_message_in_language(key, language_code.unwrap_or(DEFAULT_LANGUAGE), args)
        }
        None => format!("Missing translation: {}", key),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_resources_load() {
        assert!(init_localization().is_ok());
        assert_eq!(t_lang("btn-back", Some("ru-RU")), "⬅️ Назад");
        assert_eq!(t_lang("btn-back", None), "⬅️ Back");
    }

    #[test]
    fn test_language_resolution() {
        let manager = LocalizationManager::new().unwrap();
        assert_eq!(manager.resolve_language(Some("ru-RU")), "ru");
        assert_eq!(manager.resolve_language(Some("de")), "en");
        assert_eq!(manager.resolve_language(None), "en");
    }
}
