//! # Localization Tests
//!
//! Message retrieval, argument formatting and language fallback for the
//! embedded English and Russian resources.

use shopbot::localization::LocalizationManager;
use std::collections::HashMap;

/// Keys the bot looks up at runtime
const USED_KEYS: &[&str] = &[
    "welcome",
    "welcome-hint",
    "btn-begin",
    "btn-dashboard",
    "btn-back",
    "btn-cancel",
    "btn-pickup",
    "btn-delivery",
    "btn-apply-discount",
    "btn-skip-discount",
    "btn-retry",
    "choose-fulfillment",
    "choose-location",
    "ask-address",
    "choose-product-type",
    "choose-collection",
    "choose-item",
    "summary-location",
    "summary-address",
    "summary-collection",
    "summary-item",
    "summary-price",
    "label-out-of-stock",
    "dashboard-title",
    "dashboard-code",
    "dashboard-referrals",
    "dashboard-discount",
    "dashboard-unavailable",
    "discount-prompt",
    "discount-total",
    "order-confirmed",
    "order-total",
    "order-discount-applied",
    "order-pickup-hint",
    "order-delivery-hint",
    "order-new-hint",
    "order-retry-prompt",
    "follow-up-message",
    "order-cancelled-by-operator",
    "warn-item-unavailable",
    "warn-collection-empty",
    "warn-not-found",
    "warn-invalid-action",
    "warn-address-empty",
    "warn-address-too-long",
    "warn-order-save-failed",
    "warn-notify-failed",
    "warn-stock-unknown",
    "warn-service-unavailable",
    "info-cancelled",
    "help-text",
    "operator-order-title",
    "operator-date",
    "operator-customer",
    "operator-username",
    "operator-no-username",
    "operator-order",
    "operator-line",
    "operator-pickup",
    "operator-delivery",
    "operator-discount",
    "operator-total",
    "btn-op-fulfil",
    "btn-op-cancel",
    "operator-status-fulfilled",
    "operator-status-cancelled",
    "operator-status-handled",
    "operator-only",
    "stock-title",
    "stock-location",
    "stock-line",
    "stock-empty",
    "supply-recorded",
    "supply-invalid",
];

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_localization() -> LocalizationManager {
        LocalizationManager::new().expect("Failed to create localization manager")
    }

    #[test]
    fn test_every_used_key_is_translated() {
        let manager = setup_localization();

        for language in ["en", "ru"] {
            for key in USED_KEYS {
                let message = manager.get_message_in_language(key, language, None);
                assert!(
                    !message.starts_with("Missing"),
                    "{key} missing in {language}"
                );
            }
        }
    }

    #[test]
    fn test_get_message_nonexistent_key() {
        let manager = setup_localization();

        let message = manager.get_message_in_language("nonexistent-key", "en", None);
        assert!(message.starts_with("Missing translation:"));
    }

    #[test]
    fn test_unsupported_language_falls_back_to_english() {
        let manager = setup_localization();

        let message = manager.get_message_in_language("btn-back", "de", None);
        assert_eq!(message, manager.get_message("btn-back", None));
    }

    #[test]
    fn test_get_message_with_args() {
        let manager = setup_localization();

        let mut args = HashMap::new();
        args.insert("number", "0F8E2C1A");
        let message = manager.get_message_in_language("order-confirmed", "en", Some(&args));
        assert!(message.contains("0F8E2C1A"));
        assert!(!message.contains('\u{2068}'));
    }

    #[test]
    fn test_russian_differs_from_english() {
        let manager = setup_localization();

        let russian = manager.get_message_in_language("choose-item", "ru", None);
        let english = manager.get_message_in_language("choose-item", "en", None);
        assert_ne!(russian, english);
    }

    #[test]
    fn test_convenience_functions() {
        shopbot::localization::init_localization().expect("Failed to initialize localization");

        let message = shopbot::localization::t_lang("btn-begin", Some("en-GB"));
        assert!(!message.is_empty());

        let args = vec![("shop", "Cloud Shop"), ("name", "Alex")];
        let message = shopbot::localization::t_args_lang("welcome", &args, Some("ru-RU"));
        assert!(message.contains("Cloud Shop"));
        assert!(message.contains("Alex"));
    }
}
