use anyhow::Result;

use shopbot::dialogue::{validate_address, Checkout, FulfillmentKind, Session, Step};

fn delivery_at_item() -> Session {
    Session {
        step: Step::ChoosingItem,
        fulfillment: Some(FulfillmentKind::Delivery),
        location_id: None,
        address: Some("Main St 5".to_string()),
        product_type: Some("Liquid".to_string()),
        collection_id: Some("classic".to_string()),
        item_id: None,
    }
}

/// Integration test for delivery address validation
#[tokio::test]
async fn test_address_validation() -> Result<()> {
    assert_eq!(validate_address("  Main St 5, flat 2 ").unwrap(), "Main St 5, flat 2");
    assert!(validate_address("Улица Ленина 1").is_ok());

    assert_eq!(validate_address(""), Err("warn-address-empty"));
    assert_eq!(validate_address("   \n"), Err("warn-address-empty"));
    assert_eq!(
        validate_address(&"a".repeat(256)),
        Err("warn-address-too-long")
    );
    assert!(validate_address(&"ж".repeat(255)).is_ok());

    Ok(())
}

/// Sessions survive a serde_json round trip, including checkout sub-states
#[tokio::test]
async fn test_session_serialization() -> Result<()> {
    let mut session = delivery_at_item();
    session.item_id = Some("mint".to_string());
    session.step = Step::Completed(Checkout::PendingRetry {
        apply_discount: true,
    });

    let json = serde_json::to_string(&session)?;
    let restored: Session = serde_json::from_str(&json)?;
    assert_eq!(restored, session);

    Ok(())
}

/// Back from the product type step of a delivery leads to the address prompt
#[tokio::test]
async fn test_back_through_delivery_branch() -> Result<()> {
    let session = delivery_at_item().back();
    assert_eq!(session.step, Step::ChoosingCollection);
    assert_eq!(session.collection_id, None);

    let session = session.back();
    assert_eq!(session.step, Step::ChoosingProductType);
    assert_eq!(session.product_type, None);
    assert_eq!(session.address.as_deref(), Some("Main St 5"));

    let session = session.back();
    assert_eq!(session.step, Step::AwaitingAddress);
    assert_eq!(session.address, None);
    assert_eq!(session.fulfillment, Some(FulfillmentKind::Delivery));

    let session = session.back();
    assert_eq!(session.step, Step::ChoosingFulfillment);
    assert_eq!(session.fulfillment, None);

    let session = session.back();
    assert!(session.is_fresh());

    Ok(())
}

/// A session missing earlier selections falls back to the greeting
#[tokio::test]
async fn test_back_without_context_resets() -> Result<()> {
    let session = Session {
        step: Step::ChoosingItem,
        collection_id: Some("classic".to_string()),
        ..Session::default()
    };

    let session = session.back();
    assert_eq!(session, Session::default());

    Ok(())
}

#[tokio::test]
async fn test_context_requirements() -> Result<()> {
    let session = delivery_at_item();
    assert!(session.has_context_for(Step::ChoosingItem));
    assert!(!session.has_context_for(Step::ChoosingLocation));
    assert!(!session.has_context_for(Step::Completed(Checkout::AwaitingDiscountChoice)));
    assert!(session.sourcing().is_some());

    let pickup_without_location = Session {
        fulfillment: Some(FulfillmentKind::Pickup),
        ..Session::at(Step::ChoosingProductType)
    };
    assert!(pickup_without_location.sourcing().is_none());
    assert!(!pickup_without_location.has_context_for(Step::ChoosingProductType));

    Ok(())
}
