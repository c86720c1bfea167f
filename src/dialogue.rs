//! Ordering dialogue: the steps of the wizard and the per-user session.
//!
//! Each selection is owned by the step that collects it. Going back to a step
//! discards what that step and every later step collected, and nothing
//! earlier, so the previous screen can always be rendered again from what
//! remains.

use serde::{Deserialize, Serialize};
use teloxide::dispatching::dialogue::{Dialogue, InMemStorage};

use crate::inventory::Sourcing;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FulfillmentKind {
    Pickup,
    Delivery,
}

/// Sub-states of a completed selection that is not yet an order
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Checkout {
    AwaitingDiscountChoice,
    /// Persisting the order failed; the customer may retry
    PendingRetry { apply_discount: bool },
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Step {
    #[default]
    Greeting,
    ViewingDashboard,
    ChoosingFulfillment,
    ChoosingLocation,
    AwaitingAddress,
    ChoosingProductType,
    ChoosingCollection,
    ChoosingItem,
    Completed(Checkout),
}

impl Step {
    /// Position in the forward sequence
    fn depth(&self) -> u8 {
        match self {
            Step::Greeting | Step::ViewingDashboard => 0,
            Step::ChoosingFulfillment => 1,
            Step::ChoosingLocation | Step::AwaitingAddress => 2,
            Step::ChoosingProductType => 3,
            Step::ChoosingCollection => 4,
            Step::ChoosingItem => 5,
            Step::Completed(_) => 6,
        }
    }

    /// The single step "back" leads to from here
    pub fn previous(&self, fulfillment: Option<FulfillmentKind>) -> Step {
        match self {
            Step::Greeting | Step::ViewingDashboard | Step::ChoosingFulfillment => Step::Greeting,
            Step::ChoosingLocation | Step::AwaitingAddress => Step::ChoosingFulfillment,
            Step::ChoosingProductType => match fulfillment {
                Some(FulfillmentKind::Pickup) => Step::ChoosingLocation,
                Some(FulfillmentKind::Delivery) => Step::AwaitingAddress,
                None => Step::Greeting,
            },
            Step::ChoosingCollection => Step::ChoosingProductType,
            Step::ChoosingItem => Step::ChoosingCollection,
            Step::Completed(_) => Step::ChoosingItem,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Step::Greeting => "Greeting",
            Step::ViewingDashboard => "ViewingDashboard",
            Step::ChoosingFulfillment => "ChoosingFulfillment",
            Step::ChoosingLocation => "ChoosingLocation",
            Step::AwaitingAddress => "AwaitingAddress",
            Step::ChoosingProductType => "ChoosingProductType",
            Step::ChoosingCollection => "ChoosingCollection",
            Step::ChoosingItem => "ChoosingItem",
            Step::Completed(_) => "Completed",
        }
    }
}

/// Per-user conversation state and accumulated selections
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub step: Step,
    pub fulfillment: Option<FulfillmentKind>,
    pub location_id: Option<String>,
    pub address: Option<String>,
    pub product_type: Option<String>,
    pub collection_id: Option<String>,
    pub item_id: Option<String>,
}

/// Type alias for the ordering dialogue
pub type ShopDialogue = Dialogue<Session, InMemStorage<Session>>;

impl Session {
    pub fn at(step: Step) -> Self {
        Self {
            step,
            ..Self::default()
        }
    }

    pub fn is_fresh(&self) -> bool {
        *self == Self::default()
    }

    /// Sourcing implied by the fulfillment selections, if complete
    pub fn sourcing(&self) -> Option<Sourcing<'_>> {
        match self.fulfillment? {
            FulfillmentKind::Pickup => self.location_id.as_deref().map(Sourcing::Pickup),
            FulfillmentKind::Delivery => self.address.as_ref().map(|_| Sourcing::Delivery),
        }
    }

    /// Whether every selection needed to render `step` is present
    pub fn has_context_for(&self, step: Step) -> bool {
        let depth = step.depth();
        match step {
            Step::ChoosingLocation if self.fulfillment != Some(FulfillmentKind::Pickup) => {
                return false
            }
            Step::AwaitingAddress if self.fulfillment != Some(FulfillmentKind::Delivery) => {
                return false
            }
            _ => {}
        }
        (depth < 2 || self.fulfillment.is_some())
            && (depth < 3 || self.sourcing().is_some())
            && (depth < 4 || self.product_type.is_some())
            && (depth < 5 || self.collection_id.is_some())
            && (depth < 6 || self.item_id.is_some())
    }

    /// Discard selections collected at `step` or later, then move to it
    pub fn rewind_to(&mut self, step: Step) {
        let depth = step.depth();
        if depth <= 1 {
            self.fulfillment = None;
        }
        if depth <= 2 {
            self.location_id = None;
            self.address = None;
        }
        if depth <= 3 {
            self.product_type = None;
        }
        if depth <= 4 {
            self.collection_id = None;
        }
        if depth <= 5 {
            self.item_id = None;
        }
        self.step = step;
    }

    /// Go one step back, falling back to a fresh greeting when the remaining
    /// selections cannot render the target step
    pub fn back(mut self) -> Self {
        let target = self.step.previous(self.fulfillment);
        self.rewind_to(target);
        if self.has_context_for(target) {
            self
        } else {
            Self::default()
        }
    }
}

/// Validates a free-text delivery address
pub fn validate_address(address: &str) -> Result<String, &'static str> {
    let trimmed = address.trim();

    if trimmed.is_empty() {
        return Err("warn-address-empty");
    }

    if trimmed.chars().count() > 255 {
        return Err("warn-address-too-long");
    }

    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pickup_at_item() -> Session {
        Session {
            step: Step::ChoosingItem,
            fulfillment: Some(FulfillmentKind::Pickup),
            location_id: Some("central".into()),
            address: None,
            product_type: Some("Liquid".into()),
            collection_id: Some("classic".into()),
            item_id: None,
        }
    }

    #[test]
    fn test_address_validation() {
        assert_eq!(validate_address("  Main St 5 ").unwrap(), "Main St 5");
        assert_eq!(validate_address("   "), Err("warn-address-empty"));
        assert_eq!(validate_address(&"a".repeat(256)), Err("warn-address-too-long"));
    }

    #[test]
    fn test_previous_step_table() {
        let pickup = Some(FulfillmentKind::Pickup);
        let delivery = Some(FulfillmentKind::Delivery);
        assert_eq!(Step::ChoosingFulfillment.previous(None), Step::Greeting);
        assert_eq!(Step::ViewingDashboard.previous(None), Step::Greeting);
        assert_eq!(Step::ChoosingLocation.previous(pickup), Step::ChoosingFulfillment);
        assert_eq!(Step::AwaitingAddress.previous(delivery), Step::ChoosingFulfillment);
        assert_eq!(Step::ChoosingProductType.previous(pickup), Step::ChoosingLocation);
        assert_eq!(Step::ChoosingProductType.previous(delivery), Step::AwaitingAddress);
        assert_eq!(Step::ChoosingProductType.previous(None), Step::Greeting);
        assert_eq!(
            Step::Completed(Checkout::AwaitingDiscountChoice).previous(pickup),
            Step::ChoosingItem
        );
    }

    #[test]
    fn test_back_twice_from_item() {
        let session = pickup_at_item().back();
        assert_eq!(session.step, Step::ChoosingCollection);
        assert_eq!(session.collection_id, None);
        assert_eq!(session.product_type.as_deref(), Some("Liquid"));

        let session = session.back();
        assert_eq!(session.step, Step::ChoosingProductType);
        assert_eq!(session.location_id.as_deref(), Some("central"));
        assert_eq!(session.product_type, None);
    }

    #[test]
    fn test_back_with_missing_context_falls_back_to_greeting() {
        let broken = Session {
            step: Step::ChoosingItem,
            collection_id: Some("classic".into()),
            ..Session::default()
        };
        assert_eq!(broken.back(), Session::default());
    }

    #[test]
    fn test_back_from_greeting_stays() {
        assert_eq!(Session::default().back(), Session::default());
    }

    #[test]
    fn test_context_requirements() {
        let session = pickup_at_item();
        assert!(session.has_context_for(Step::ChoosingItem));
        assert!(!session.has_context_for(Step::Completed(Checkout::AwaitingDiscountChoice)));
        assert!(!session.has_context_for(Step::AwaitingAddress));
        assert_eq!(session.sourcing(), Some(Sourcing::Pickup("central")));
    }
}
