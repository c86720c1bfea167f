//! # Conversation Engine Module
//!
//! Single entry point of the ordering core: given the customer, an inbound
//! event and the current session, produce the next session and the screen to
//! show. The engine never fails; every error becomes a warning next to a
//! renderable screen.

use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::dialogue::{validate_address, Checkout, FulfillmentKind, Session, Step};
use crate::errors::ShopError;
use crate::events::{Command, Event, Selection};
use crate::finalizer::{OrderFinalizer, Receipt};
use crate::inventory::Inventory;
use crate::localization::t_lang;
use crate::menu::{render, render_confirmation, MenuContext, Rendered};
use crate::order::{CustomerRef, Order};
use crate::referral::ReferralLedger;
use crate::shop_config::ShopConfig;

/// Short message shown above the screen
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub key: &'static str,
    pub text: String,
}

impl Notice {
    fn new(key: &'static str, language_code: Option<&str>) -> Self {
        Self {
            key,
            text: t_lang(key, language_code),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Output {
    pub notice: Option<Notice>,
    pub screen: Rendered,
}

/// Result of handling one event
#[derive(Debug)]
pub struct Turn {
    pub session: Session,
    pub output: Output,
    /// Order placed during this turn, if any
    pub order: Option<Order>,
}

/// What a transition decided before anything is rendered
enum Outcome {
    Show {
        session: Session,
        notice: Option<&'static str>,
    },
    Placed(Receipt),
}

impl Outcome {
    fn show(session: Session) -> Self {
        Outcome::Show {
            session,
            notice: None,
        }
    }

    fn warn(session: Session, key: &'static str) -> Self {
        Outcome::Show {
            session,
            notice: Some(key),
        }
    }
}

#[derive(Clone)]
pub struct ConversationEngine {
    config: Arc<ShopConfig>,
    finalizer: OrderFinalizer,
}

impl ConversationEngine {
    pub fn new(config: Arc<ShopConfig>, finalizer: OrderFinalizer) -> Self {
        Self { config, finalizer }
    }

    pub fn config(&self) -> &Arc<ShopConfig> {
        &self.config
    }

    pub fn finalizer(&self) -> &OrderFinalizer {
        &self.finalizer
    }

    fn ledger(&self) -> &ReferralLedger {
        self.finalizer.ledger()
    }

    /// Apply one event to a session
    pub async fn handle(
        &self,
        customer: &CustomerRef,
        language_code: Option<&str>,
        event: Event,
        session: Session,
    ) -> Turn {
        debug!(
            user_id = customer.user_id,
            step = session.step.name(),
            event = ?event,
            "Handling event"
        );

        match self.transition(customer, language_code, event, session).await {
            Outcome::Show { session, notice } => {
                self.present(customer, language_code, session, notice).await
            }
            Outcome::Placed(receipt) => {
                let notice = (!receipt.notified).then(|| Notice::new("warn-notify-failed", language_code));
                Turn {
                    session: Session::default(),
                    output: Output {
                        notice,
                        screen: render_confirmation(&receipt.order, &self.config, language_code),
                    },
                    order: Some(receipt.order),
                }
            }
        }
    }

    async fn transition(
        &self,
        customer: &CustomerRef,
        language_code: Option<&str>,
        event: Event,
        session: Session,
    ) -> Outcome {
        let user_id = customer.user_id;

        match event {
            Event::Command(Command::Start { referral }) => {
                match self.ledger().register(user_id, referral.as_deref()).await {
                    Ok(_) => Outcome::show(Session::default()),
                    Err(e) => {
                        error!(user_id, error = %e, "Failed to register referral account");
                        Outcome::warn(Session::default(), "warn-service-unavailable")
                    }
                }
            }
            Event::Command(Command::Cancel) | Event::Selected(Selection::Cancel) => {
                info!(user_id, step = session.step.name(), "Session cancelled");
                Outcome::warn(Session::default(), "info-cancelled")
            }
            Event::Command(Command::Dashboard) => match session.step {
                Step::Greeting | Step::ViewingDashboard => {
                    Outcome::show(Session::at(Step::ViewingDashboard))
                }
                // An order in progress is kept; the dashboard hangs off the greeting
                _ => Outcome::warn(session, "warn-invalid-action"),
            },
            Event::Command(Command::Help) => Outcome::warn(session, "help-text"),
            Event::Selected(Selection::Back) => Outcome::show(session.back()),
            Event::Text(text) => self.on_text(session, &text),
            Event::Selected(selection) => {
                self.on_selection(customer, language_code, session, selection)
                    .await
            }
        }
    }

    fn on_text(&self, mut session: Session, text: &str) -> Outcome {
        if session.step != Step::AwaitingAddress {
            return Outcome::warn(session, "warn-invalid-action");
        }
        match validate_address(text) {
            Ok(address) => {
                session.address = Some(address);
                session.step = Step::ChoosingProductType;
                Outcome::show(session)
            }
            Err(key) => Outcome::warn(session, key),
        }
    }

    async fn on_selection(
        &self,
        customer: &CustomerRef,
        language_code: Option<&str>,
        mut session: Session,
        selection: Selection,
    ) -> Outcome {
        let catalog = &self.config.catalog;

        match (session.step, selection) {
            (Step::Greeting, Selection::BeginShopping) => {
                Outcome::show(Session::at(Step::ChoosingFulfillment))
            }
            (Step::Greeting, Selection::OpenDashboard) => {
                Outcome::show(Session::at(Step::ViewingDashboard))
            }
            (Step::ChoosingFulfillment, Selection::Fulfillment(kind)) => {
                session.fulfillment = Some(kind);
                session.step = match kind {
                    FulfillmentKind::Pickup => Step::ChoosingLocation,
                    FulfillmentKind::Delivery => Step::AwaitingAddress,
                };
                Outcome::show(session)
            }
            (Step::ChoosingLocation, Selection::Location(location_id)) => {
                if catalog.location(&location_id).is_none() {
                    warn!(location_id = %location_id, "Unknown location selected");
                    return Outcome::warn(session, "warn-not-found");
                }
                session.location_id = Some(location_id);
                session.step = Step::ChoosingProductType;
                Outcome::show(session)
            }
            (Step::ChoosingProductType, Selection::ProductType(product_type)) => {
                if !catalog.has_product_type(&product_type) {
                    warn!(product_type = %product_type, "Unknown product type selected");
                    return Outcome::warn(session, "warn-not-found");
                }
                session.product_type = Some(product_type);
                session.step = Step::ChoosingCollection;
                Outcome::show(session)
            }
            (Step::ChoosingCollection, Selection::Collection(collection_id)) => {
                let product_type = session.product_type.as_deref();
                let Some(collection) = catalog
                    .collection(&collection_id)
                    .filter(|c| Some(c.product_type.as_str()) == product_type)
                else {
                    warn!(collection_id = %collection_id, "Unknown collection selected");
                    return Outcome::warn(session, "warn-not-found");
                };
                if collection.items.is_empty() {
                    let e = ShopError::EmptyCollection(collection_id);
                    debug!(user_id = customer.user_id, error = %e, "Collection selection rejected");
                    return Outcome::warn(session, e.warning_key());
                }
                session.collection_id = Some(collection_id);
                session.step = Step::ChoosingItem;
                Outcome::show(session)
            }
            (Step::ChoosingItem, Selection::Item(item_id)) => {
                self.on_item(customer, language_code, session, item_id)
                    .await
            }
            (Step::Completed(Checkout::AwaitingDiscountChoice), Selection::ApplyDiscount) => {
                self.finalize(customer, language_code, session, true).await
            }
            (Step::Completed(Checkout::AwaitingDiscountChoice), Selection::SkipDiscount) => {
                self.finalize(customer, language_code, session, false).await
            }
            (Step::Completed(Checkout::PendingRetry { apply_discount }), Selection::Retry) => {
                self.finalize(customer, language_code, session, apply_discount)
                    .await
            }
            (step, selection) => {
                debug!(
                    user_id = customer.user_id,
                    step = step.name(),
                    selection = ?selection,
                    "Selection not valid for current step"
                );
                Outcome::warn(session, "warn-invalid-action")
            }
        }
    }

    /// The guarded transition: an unavailable item leaves the session as it was
    async fn on_item(
        &self,
        customer: &CustomerRef,
        language_code: Option<&str>,
        session: Session,
        item_id: String,
    ) -> Outcome {
        let catalog = &self.config.catalog;
        let collection_id = session.collection_id.as_deref().unwrap_or_default();
        if catalog.find_item(collection_id, &item_id).is_none() {
            warn!(collection_id, item_id = %item_id, "Unknown item selected");
            return Outcome::warn(session, "warn-not-found");
        }

        if let Err(e) = self
            .finalizer
            .ensure_available(catalog, &session, &item_id)
            .await
        {
            warn!(user_id = customer.user_id, item_id = %item_id, error = %e, "Item selection rejected");
            return Outcome::warn(session, e.warning_key());
        }

        let mut selected = session;
        selected.item_id = Some(item_id);

        let discount = match self.ledger().get_discount(customer.user_id).await {
            Ok(discount) => discount,
            Err(e) => {
                warn!(user_id = customer.user_id, error = %e, "Failed to read discount");
                0
            }
        };

        if discount > 0 {
            selected.step = Step::Completed(Checkout::AwaitingDiscountChoice);
            Outcome::show(selected)
        } else {
            self.finalize(customer, language_code, selected, false).await
        }
    }

    async fn finalize(
        &self,
        customer: &CustomerRef,
        language_code: Option<&str>,
        mut session: Session,
        apply_discount: bool,
    ) -> Outcome {
        match self
            .finalizer
            .finalize(&self.config, &session, customer, apply_discount, language_code)
            .await
        {
            Ok(receipt) => Outcome::Placed(receipt),
            Err(ShopError::OutOfStock(item_id)) => {
                warn!(user_id = customer.user_id, item_id = %item_id, "Item sold out before finalizing");
                session.rewind_to(Step::ChoosingItem);
                Outcome::warn(session, "warn-item-unavailable")
            }
            Err(ShopError::Store(e)) => {
                error!(user_id = customer.user_id, error = %e, "Order could not be saved");
                session.step = Step::Completed(Checkout::PendingRetry { apply_discount });
                Outcome::warn(session, "warn-order-save-failed")
            }
            Err(e) => {
                warn!(user_id = customer.user_id, error = %e, "Finalization rejected");
                Outcome::warn(Session::default(), e.warning_key())
            }
        }
    }

    /// Render the session's step, falling back to the greeting when it cannot
    async fn present(
        &self,
        customer: &CustomerRef,
        language_code: Option<&str>,
        session: Session,
        notice: Option<&'static str>,
    ) -> Turn {
        let user_id = customer.user_id;
        let mut notice = notice;

        let inventory = match session.step {
            Step::ChoosingCollection | Step::ChoosingItem => {
                match self.finalizer.current_inventory(&self.config.catalog).await {
                    Ok(inventory) => inventory,
                    Err(e) => {
                        error!(user_id, error = %e, "Failed to compute inventory");
                        notice = notice.or(Some("warn-stock-unknown"));
                        Inventory::default()
                    }
                }
            }
            _ => Inventory::default(),
        };

        let account = match session.step {
            Step::ViewingDashboard => self.ledger().account(user_id).await.unwrap_or_else(|e| {
                error!(user_id, error = %e, "Failed to load referral account");
                None
            }),
            _ => None,
        };

        let discount_percent = match session.step {
            Step::Completed(Checkout::AwaitingDiscountChoice) => {
                self.ledger().get_discount(user_id).await.unwrap_or_else(|e| {
                    error!(user_id, error = %e, "Failed to read discount");
                    0
                })
            }
            _ => 0,
        };

        let ctx = MenuContext {
            config: &self.config,
            inventory: &inventory,
            customer_name: &customer.full_name,
            account: account.as_ref(),
            discount_percent,
            language_code,
        };

        let (session, screen) = match render(&session, &ctx) {
            Ok(screen) => (session, screen),
            Err(e) => {
                warn!(user_id, step = session.step.name(), error = %e, "Cannot render step, restarting");
                notice = notice.or(Some(e.warning_key()));
                let fresh = Session::default();
                let screen = render(&fresh, &ctx).unwrap_or_default();
                (fresh, screen)
            }
        };

        Turn {
            session,
            output: Output {
                notice: notice.map(|key| Notice::new(key, language_code)),
                screen,
            },
            order: None,
        }
    }
}
