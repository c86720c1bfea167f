//! Inbound events of the ordering conversation.
//!
//! Button presses arrive as opaque tokens; [`Selection::parse`] is the only
//! place that turns a token back into a typed choice.

use crate::dialogue::FulfillmentKind;

/// Telegram rejects callback data longer than this many bytes
pub const MAX_TOKEN_LEN: usize = 64;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// Start over, optionally carrying the referrer's code from a deep link
    Start { referral: Option<String> },
    Cancel,
    Dashboard,
    Help,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Selection {
    BeginShopping,
    OpenDashboard,
    Fulfillment(FulfillmentKind),
    Location(String),
    ProductType(String),
    Collection(String),
    Item(String),
    ApplyDiscount,
    SkipDiscount,
    Retry,
    Back,
    Cancel,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    Command(Command),
    Text(String),
    Selected(Selection),
}

impl Selection {
    pub fn token(&self) -> String {
        match self {
            Selection::BeginShopping => "begin".to_string(),
            Selection::OpenDashboard => "dashboard".to_string(),
            Selection::Fulfillment(FulfillmentKind::Pickup) => "fulfil:pickup".to_string(),
            Selection::Fulfillment(FulfillmentKind::Delivery) => "fulfil:delivery".to_string(),
            Selection::Location(id) => format!("loc:{id}"),
            Selection::ProductType(name) => format!("type:{name}"),
            Selection::Collection(id) => format!("col:{id}"),
            Selection::Item(id) => format!("item:{id}"),
            Selection::ApplyDiscount => "discount:apply".to_string(),
            Selection::SkipDiscount => "discount:skip".to_string(),
            Selection::Retry => "retry".to_string(),
            Selection::Back => "back".to_string(),
            Selection::Cancel => "cancel".to_string(),
        }
    }

    pub fn parse(token: &str) -> Option<Self> {
        let selection = match token {
            "begin" => Selection::BeginShopping,
            "dashboard" => Selection::OpenDashboard,
            "fulfil:pickup" => Selection::Fulfillment(FulfillmentKind::Pickup),
            "fulfil:delivery" => Selection::Fulfillment(FulfillmentKind::Delivery),
            "discount:apply" => Selection::ApplyDiscount,
            "discount:skip" => Selection::SkipDiscount,
            "retry" => Selection::Retry,
            "back" => Selection::Back,
            "cancel" => Selection::Cancel,
            _ => {
                let (prefix, value) = token.split_once(':')?;
                if value.is_empty() {
                    return None;
                }
                let value = value.to_string();
                match prefix {
                    "loc" => Selection::Location(value),
                    "type" => Selection::ProductType(value),
                    "col" => Selection::Collection(value),
                    "item" => Selection::Item(value),
                    _ => return None,
                }
            }
        };
        Some(selection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokens_parse_back() {
        let selections = [
            Selection::BeginShopping,
            Selection::Fulfillment(FulfillmentKind::Delivery),
            Selection::ProductType("Disposable: 5000".into()),
            Selection::Item("42".into()),
            Selection::ApplyDiscount,
            Selection::Back,
        ];
        for selection in selections {
            assert_eq!(Selection::parse(&selection.token()), Some(selection));
        }
    }

    #[test]
    fn test_unknown_tokens_are_rejected() {
        assert_eq!(Selection::parse(""), None);
        assert_eq!(Selection::parse("aroma_5"), None);
        assert_eq!(Selection::parse("item:"), None);
        assert_eq!(Selection::parse("fulfil:drone"), None);
    }
}
