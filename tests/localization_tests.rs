//! # Localization Tests
//!
//! Message retrieval, argument substitution and language fallback for the
//! bundled Spanish and English catalogues.

use std::collections::HashMap;
use time_cop::localization::LocalizationManager;

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_localization() -> LocalizationManager {
        LocalizationManager::new().expect("Failed to create localization manager")
    }

    /// Message identifiers in a Fluent source, in file order
    fn message_ids(source: &str) -> Vec<String> {
        source
            .lines()
            .filter(|line| !line.starts_with('#') && !line.starts_with(' '))
            .filter_map(|line| line.split_once(" = ").map(|(id, _)| id.trim().to_string()))
            .collect()
    }

    #[test]
    fn test_get_message_existing_key() {
        let manager = setup_localization();

        let message = manager.get_message_in_language("cancelled", "es", None);
        assert_eq!(message, "❌ Operación cancelada.");
    }

    #[test]
    fn test_get_message_nonexistent_key() {
        let manager = setup_localization();

        let message = manager.get_message_in_language("nonexistent-key", "es", None);
        assert!(message.starts_with("Missing translation:"));
    }

    #[test]
    fn test_get_message_unsupported_language() {
        let manager = setup_localization();

        // Falls back to Spanish
        let message = manager.get_message_in_language("cancelled", "pt", None);
        assert_eq!(message, "❌ Operación cancelada.");
    }

    #[test]
    fn test_get_message_with_args() {
        let manager = setup_localization();

        let mut args = HashMap::new();
        args.insert("hours", "7.5");

        let message = manager.get_message_in_language("total-hours", "es", Some(&args));
        assert_eq!(message, "⏰ Total: 7.5 horas");

        let message = manager.get_message_in_language("total-hours", "en", Some(&args));
        assert_eq!(message, "⏰ Total: 7.5 hours");
    }

    #[test]
    fn test_get_message_missing_args() {
        let manager = setup_localization();

        let message = manager.get_message_in_language("records-empty", "es", None);
        assert!(message.starts_with("📭 No hay registros para el"));
    }

    #[test]
    fn test_english_localization() {
        let manager = setup_localization();

        let english = manager.get_message_in_language("cancelled", "en", None);
        let spanish = manager.get_message_in_language("cancelled", "es", None);
        assert_ne!(english, spanish);
        assert!(english.contains("cancelled"));
    }

    #[test]
    fn test_catalogues_define_the_same_keys() {
        let es = message_ids(include_str!("../locales/es/main.ftl"));
        let en = message_ids(include_str!("../locales/en/main.ftl"));

        assert!(!es.is_empty());
        assert_eq!(es, en);
    }

    #[test]
    fn test_language_detection() {
        setup_localization();
        use time_cop::localization::detect_language;

        assert_eq!(detect_language(Some("es")), "es");
        assert_eq!(detect_language(Some("es-CO")), "es");
        assert_eq!(detect_language(Some("en")), "en");
        assert_eq!(detect_language(Some("en-US")), "en");
        assert_eq!(detect_language(None), "es");
        assert_eq!(detect_language(Some("fr")), "es");
    }

    #[test]
    fn test_convenience_functions() {
        time_cop::localization::init_localization().expect("Failed to initialize localization");

        let message = time_cop::localization::t_lang("nothing-to-cancel", Some("es"));
        assert!(message.contains("No hay ninguna operación en curso"));

        let args = vec![("name", "Ana")];
        let greeting = time_cop::localization::t_args_lang("welcome-greeting", &args, Some("en"));
        assert_eq!(greeting, "👋 Hi, Ana! I'm Time Cop 🕐");
    }
}
