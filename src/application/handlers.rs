use super::engine::DialogEngine;
use super::menu::{CART_OPTIONS, CONVERSION_OPTIONS, Menu};
use crate::domain::cart::Cart;
use crate::domain::catalog::Product;
use crate::domain::gateway::Reply;
use crate::domain::ledger::{LedgerError, Shortfall, Source};
use crate::domain::money::{Amount, Balance};
use crate::domain::session::{ConversionContext, DialogState, Fulfilment, Purpose, Scratch, Session};
use crate::error::{Result, UssdError};
use rust_decimal::Decimal;
use std::collections::BTreeMap;

/// What the cart owes per source against what the caller holds.
#[derive(Debug, Clone, PartialEq)]
pub struct Assessment {
    pub totals: BTreeMap<Source, Decimal>,
    pub balances: BTreeMap<Source, Balance>,
    pub shortfalls: Vec<Shortfall>,
    /// Amount of the conversion source that covers the target shortfall,
    /// set only when the caller holds it and it lies within the bounds.
    pub top_up: Option<Decimal>,
}

impl Assessment {
    pub fn grand_total(&self) -> Decimal {
        self.totals.values().copied().sum()
    }

    pub fn shortfall_on(&self, source: Source) -> Option<&Shortfall> {
        self.shortfalls.iter().find(|shortfall| shortfall.source == source)
    }
}

/// Parses a 1-based option in `[min, max]`. Anything else is invalid input.
fn option_in(input: &str, min: usize, max: usize) -> Option<usize> {
    input
        .parse::<usize>()
        .ok()
        .filter(|choice| (min..=max).contains(choice))
}

fn missing(session: &Session, what: &str) -> UssdError {
    UssdError::DialogError(format!("{} reached without {what}", session.state))
}

/// One handler per dialog state. A handler that rejects its input returns
/// before touching the session.
impl DialogEngine {
    fn menu(&self) -> Menu<'_> {
        Menu::new(&self.policy)
    }

    fn caller(&self, session: &Session) -> Result<String> {
        match (&session.caller, session.authenticated) {
            (Some(caller), true) => Ok(caller.clone()),
            _ => Err(missing(session, "an authenticated caller")),
        }
    }

    fn selected_product(&self, session: &Session) -> Result<&Product> {
        session
            .selected_product
            .and_then(|id| self.catalog.product(id))
            .ok_or_else(|| missing(session, "a selected product"))
    }

    async fn balances(&self, caller: &str, sources: &[Source]) -> Result<Vec<(Source, Balance)>> {
        let mut balances = Vec::with_capacity(sources.len());
        for source in sources {
            balances.push((*source, self.ledger.balance(caller, *source).await?));
        }
        Ok(balances)
    }

    async fn assess(&self, caller: &str, cart: &Cart) -> Result<Assessment> {
        let totals = cart.totals_by_source();
        let mut balances = BTreeMap::new();
        let mut shortfalls = Vec::new();
        for (source, due) in &totals {
            let balance = self.ledger.balance(caller, *source).await?;
            if balance.value() < *due {
                shortfalls.push(Shortfall {
                    source: *source,
                    required: *due,
                    available: balance.value(),
                });
            }
            balances.insert(*source, balance);
        }
        let conversion = &self.policy.conversion;
        let top_up = match shortfalls.iter().find(|shortfall| shortfall.source == conversion.to) {
            Some(shortfall) => {
                let required = conversion.required_for(shortfall.missing());
                let available = self.ledger.balance(caller, conversion.from).await?;
                (required <= conversion.max && available.value() >= required).then_some(required)
            }
            None => None,
        };
        Ok(Assessment {
            totals,
            balances,
            shortfalls,
            top_up,
        })
    }

    fn shop_from_start(&self, session: &mut Session, heading: &str) -> Reply {
        session.state = DialogState::SelectStore;
        session.selected_store = None;
        session.selected_department = None;
        session.selected_product = None;
        Reply::con(format!(
            "{heading}\n\nChoose a store:\n\n{}",
            self.menu().stores(self.catalog.stores())
        ))
    }

    pub(super) async fn on_welcome(&self, session: &mut Session, input: &str) -> Result<Reply> {
        let menu = self.menu();
        if input.is_empty() {
            return Ok(Reply::con(menu.welcome()));
        }
        let Some(choice) = option_in(input, 1, 4) else {
            return Ok(Reply::con(format!(
                "Invalid choice. Please select:\n\n{}",
                menu.welcome_options()
            )));
        };
        match choice {
            1 => {
                session.state = DialogState::CredentialId;
                session.scratch = Scratch::Empty;
                Ok(Reply::con(format!(
                    "{} SHOPPING - LOGIN\nEnter your ID number:",
                    self.policy.brand
                )))
            }
            2 => {
                session.state = DialogState::BalanceId;
                session.scratch = Scratch::Credential(Purpose::Balance);
                Ok(Reply::con("BALANCE CHECK\nEnter your ID number:"))
            }
            3 => {
                session.state = DialogState::BalanceId;
                session.scratch = Scratch::Credential(Purpose::Convert);
                Ok(Reply::con(format!(
                    "{} TOP UP\nEnter your ID number:",
                    self.policy.conversion.to.label().to_uppercase()
                )))
            }
            _ => Ok(Reply::end(menu.goodbye())),
        }
    }

    /// Shared by the shopping and balance flows; the password state that
    /// follows depends on which one asked.
    pub(super) async fn on_credential_id(&self, session: &mut Session, input: &str) -> Result<Reply> {
        if input.chars().count() < self.policy.min_id_length {
            return Ok(Reply::con(format!(
                "Invalid ID format.\nEnter your ID number (min {} digits):",
                self.policy.min_id_length
            )));
        }
        session.caller = Some(input.to_string());
        session.authenticated = false;
        session.state = match session.state {
            DialogState::BalanceId => DialogState::BalancePassword,
            _ => DialogState::CredentialPassword,
        };
        Ok(Reply::con("Enter your password:"))
    }

    /// Checks the password against the caller id entered in the previous
    /// step. On failure the id is forgotten and the flow asks for it again.
    fn authenticate(&self, session: &mut Session, input: &str, retry: DialogState) -> Result<Option<String>> {
        let caller = session
            .caller
            .clone()
            .ok_or_else(|| missing(session, "a caller id"))?;
        if self.directory.authenticate(&caller, input) {
            session.authenticated = true;
            return Ok(Some(caller));
        }
        tracing::info!(session_id = %session.id, "Authentication failed");
        session.clear_caller();
        session.state = retry;
        Ok(None)
    }

    pub(super) async fn on_credential_password(&self, session: &mut Session, input: &str) -> Result<Reply> {
        if input.is_empty() {
            return Ok(Reply::con("Password is required.\nEnter your password:"));
        }
        let Some(caller) = self.authenticate(session, input, DialogState::CredentialId)? else {
            return Ok(Reply::con("Invalid credentials.\nEnter your ID number:"));
        };

        let balances = self.balances(&caller, &self.policy.payment_sources).await?;
        let heading = format!("Login successful!\n{}", self.menu().balances(&balances));
        Ok(self.shop_from_start(session, &heading))
    }

    pub(super) async fn on_balance_password(&self, session: &mut Session, input: &str) -> Result<Reply> {
        if input.is_empty() {
            return Ok(Reply::con("Password is required.\nEnter your password:"));
        }
        let purpose = match session.scratch {
            Scratch::Credential(purpose) => purpose,
            _ => Purpose::Balance,
        };
        let Some(caller) = self.authenticate(session, input, DialogState::BalanceId)? else {
            return Ok(Reply::con("Invalid credentials.\nEnter your ID number:"));
        };

        match purpose {
            Purpose::Balance => {
                let balances = self.balances(&caller, &self.policy.visible_sources()).await?;
                Ok(Reply::end(self.menu().balance_report(&balances)))
            }
            Purpose::Convert => {
                let conversion = &self.policy.conversion;
                let from = self.ledger.balance(&caller, conversion.from).await?;
                let to = self.ledger.balance(&caller, conversion.to).await?;
                session.state = DialogState::ConversionAmount;
                session.scratch = Scratch::Conversion(ConversionContext::default());
                Ok(Reply::con(self.menu().conversion_intro(from, to)))
            }
        }
    }

    pub(super) async fn on_select_store(&self, session: &mut Session, input: &str) -> Result<Reply> {
        let menu = self.menu();
        let stores = self.catalog.stores();
        let Some(choice) = option_in(input, 1, stores.len()) else {
            return Ok(Reply::con(format!(
                "Invalid store selection.\nChoose a store:\n\n{}",
                menu.stores(stores)
            )));
        };
        let store = &stores[choice - 1];
        let departments = self.catalog.departments(store.id);
        session.selected_store = Some(store.id);
        session.selected_department = None;
        session.selected_product = None;
        session.state = DialogState::SelectDepartment;
        Ok(Reply::con(format!(
            "{}\nChoose department:\n\n{}",
            store.name,
            menu.departments(&departments)
        )))
    }

    pub(super) async fn on_select_department(&self, session: &mut Session, input: &str) -> Result<Reply> {
        let menu = self.menu();
        let store_id = session
            .selected_store
            .ok_or_else(|| missing(session, "a selected store"))?;
        let departments = self.catalog.departments(store_id);
        let Some(choice) = option_in(input, 1, departments.len()) else {
            return Ok(Reply::con(format!(
                "Invalid department.\nChoose department:\n\n{}",
                menu.departments(&departments)
            )));
        };
        let department = departments[choice - 1];
        let products = self.catalog.products(department.id);
        session.selected_department = Some(department.id);
        session.selected_product = None;
        session.state = DialogState::SelectProduct;
        Ok(Reply::con(format!(
            "{}\nChoose product:\n\n{}",
            department.name,
            menu.products(&products)
        )))
    }

    pub(super) async fn on_select_product(&self, session: &mut Session, input: &str) -> Result<Reply> {
        let menu = self.menu();
        let department_id = session
            .selected_department
            .ok_or_else(|| missing(session, "a selected department"))?;
        let products = self.catalog.products(department_id);
        let Some(choice) = option_in(input, 1, products.len()) else {
            return Ok(Reply::con(format!(
                "Invalid product.\nChoose product:\n\n{}",
                menu.products(&products)
            )));
        };
        let product = products[choice - 1];
        session.selected_product = Some(product.id);
        session.state = DialogState::EnterQuantity;
        Ok(Reply::con(menu.quantity_prompt(product)))
    }

    pub(super) async fn on_enter_quantity(&self, session: &mut Session, input: &str) -> Result<Reply> {
        let menu = self.menu();
        let product = self.selected_product(session)?;
        let bounds = self.policy.quantity;
        let Some(quantity) = input
            .parse::<u32>()
            .ok()
            .filter(|quantity| (bounds.min..=bounds.max).contains(quantity))
        else {
            return Ok(Reply::con(format!(
                "Invalid quantity.\nEnter {}-{} for:\n{}",
                bounds.min, bounds.max, product.name
            )));
        };

        if self.policy.multi_source() {
            let caller = self.caller(session)?;
            let balances = self.balances(&caller, &self.policy.payment_sources).await?;
            session.scratch = Scratch::PendingQuantity(quantity);
            session.state = DialogState::SelectPaymentSource;
            return Ok(Reply::con(format!(
                "PAYMENT SOURCE\n{quantity}x {}\n\nPay with:\n\n{}",
                product.name,
                menu.payment_sources(&balances)
            )));
        }

        let source = self
            .policy
            .payment_sources
            .first()
            .copied()
            .ok_or_else(|| UssdError::ConfigError("no payment source configured".to_string()))?;
        self.add_to_cart(session, product, quantity, source)
    }

    pub(super) async fn on_select_payment_source(&self, session: &mut Session, input: &str) -> Result<Reply> {
        let Scratch::PendingQuantity(quantity) = session.scratch else {
            return Err(missing(session, "a pending quantity"));
        };
        let product = self.selected_product(session)?;
        let sources = &self.policy.payment_sources;
        let Some(choice) = option_in(input, 1, sources.len()) else {
            let caller = self.caller(session)?;
            let balances = self.balances(&caller, sources).await?;
            return Ok(Reply::con(format!(
                "Invalid payment option.\nPay with:\n\n{}",
                self.menu().payment_sources(&balances)
            )));
        };
        self.add_to_cart(session, product, quantity, sources[choice - 1])
    }

    fn add_to_cart(&self, session: &mut Session, product: &Product, quantity: u32, source: Source) -> Result<Reply> {
        session.cart.add(product, quantity, source)?;
        session.scratch = Scratch::Empty;
        session.state = DialogState::CartMenu;
        tracing::debug!(session_id = %session.id, product = product.id, quantity, %source, "Added to cart");
        Ok(Reply::con(format!(
            "ITEM ADDED TO CART!\n\n{}\n\n{CART_OPTIONS}",
            self.menu().cart(&session.cart)
        )))
    }

    pub(super) async fn on_cart_menu(&self, session: &mut Session, input: &str) -> Result<Reply> {
        let menu = self.menu();
        let Some(choice) = option_in(input, 1, 3) else {
            return Ok(Reply::con(format!(
                "Invalid option.\n\n{}\n\n{CART_OPTIONS}",
                menu.cart(&session.cart)
            )));
        };
        match choice {
            1 => {
                let caller = self.caller(session)?;
                let balances = self.balances(&caller, &self.policy.payment_sources).await?;
                let heading = format!("Continue Shopping\n{}", menu.balances(&balances));
                Ok(self.shop_from_start(session, &heading))
            }
            2 if session.cart.is_empty() => Ok(Reply::con(format!(
                "Your cart is empty!\n\n{CART_OPTIONS}"
            ))),
            2 => {
                session.state = DialogState::RemoveItem;
                Ok(Reply::con(format!(
                    "REMOVE ITEM\n\n{}\n\nEnter item number to remove (1-{}):",
                    menu.cart(&session.cart),
                    session.cart.len()
                )))
            }
            _ => self.checkout(session).await,
        }
    }

    /// Opens the checkout review, or sends an empty cart back to shopping.
    async fn checkout(&self, session: &mut Session) -> Result<Reply> {
        if session.cart.is_empty() {
            return Ok(self.shop_from_start(session, "Cart is empty!\nLet's start shopping:"));
        }
        let caller = self.caller(session)?;
        let sources: Vec<Source> = session.cart.totals_by_source().into_keys().collect();
        let balances = self.balances(&caller, &sources).await?;
        session.state = DialogState::CheckoutConfirm;
        Ok(Reply::con(self.menu().checkout_review(&session.cart, &balances)))
    }

    pub(super) async fn on_remove_item(&self, session: &mut Session, input: &str) -> Result<Reply> {
        let menu = self.menu();
        if session.cart.is_empty() {
            session.state = DialogState::CartMenu;
            return Ok(Reply::con(format!("Your cart is empty!\n\n{CART_OPTIONS}")));
        }
        let Some(position) = option_in(input, 1, session.cart.len()) else {
            return Ok(Reply::con(format!(
                "Invalid item number.\n\n{}\n\nEnter valid number (1-{}):",
                menu.cart(&session.cart),
                session.cart.len()
            )));
        };
        if !session.cart.remove(position) {
            return Err(missing(session, "a removable cart line"));
        }
        session.state = DialogState::CartMenu;
        Ok(Reply::con(format!(
            "ITEM REMOVED SUCCESSFULLY!\n\n{}\n\n{CART_OPTIONS}",
            menu.cart(&session.cart)
        )))
    }

    pub(super) async fn on_checkout_confirm(&self, session: &mut Session, input: &str) -> Result<Reply> {
        let menu = self.menu();
        match option_in(input, 1, 2) {
            Some(1) => {
                if session.cart.is_empty() {
                    return Ok(self.shop_from_start(session, "Cart is empty!\nLet's start shopping:"));
                }
                let caller = self.caller(session)?;
                session.state = DialogState::DeliveryOrPickup;
                Ok(Reply::con(menu.delivery_options(
                    self.directory.delivery_address(&caller),
                    self.directory.pickup_point(&caller),
                )))
            }
            Some(_) => {
                session.state = DialogState::CartMenu;
                Ok(Reply::con(format!(
                    "Back to Cart Options\n\n{}\n\n{CART_OPTIONS}",
                    menu.cart(&session.cart)
                )))
            }
            None => {
                let caller = self.caller(session)?;
                let sources: Vec<Source> = session.cart.totals_by_source().into_keys().collect();
                let balances = self.balances(&caller, &sources).await?;
                Ok(Reply::con(format!(
                    "Invalid choice.\n\n{}",
                    menu.checkout_review(&session.cart, &balances)
                )))
            }
        }
    }

    pub(super) async fn on_delivery_or_pickup(&self, session: &mut Session, input: &str) -> Result<Reply> {
        let menu = self.menu();
        let caller = self.caller(session)?;
        let fulfilment = match option_in(input, 1, 2) {
            Some(1) => Fulfilment::Delivery {
                address: self.directory.delivery_address(&caller).to_string(),
            },
            Some(_) => Fulfilment::Pickup {
                point: self.directory.pickup_point(&caller).to_string(),
            },
            None => {
                return Ok(Reply::con(format!(
                    "Invalid selection.\n\n{}",
                    menu.delivery_options(
                        self.directory.delivery_address(&caller),
                        self.directory.pickup_point(&caller),
                    )
                )));
            }
        };
        self.resume_checkout(session, &caller, fulfilment, None).await
    }

    /// Lands on final confirmation with a fresh look at the balances.
    async fn resume_checkout(
        &self,
        session: &mut Session,
        caller: &str,
        fulfilment: Fulfilment,
        notice: Option<String>,
    ) -> Result<Reply> {
        let assessment = self.assess(caller, &session.cart).await?;
        let body = self.menu().final_confirmation(&fulfilment, &assessment);
        session.scratch = Scratch::Fulfilment(fulfilment);
        session.state = DialogState::FinalConfirm;
        Ok(Reply::con(match notice {
            Some(notice) => format!("{notice}\n\n{body}"),
            None => body,
        }))
    }

    pub(super) async fn on_final_confirm(&self, session: &mut Session, input: &str) -> Result<Reply> {
        let menu = self.menu();
        let Scratch::Fulfilment(fulfilment) = &session.scratch else {
            return Err(missing(session, "a fulfilment choice"));
        };
        let fulfilment = fulfilment.clone();
        let caller = self.caller(session)?;
        let assessment = self.assess(&caller, &session.cart).await?;

        match option_in(input, 1, 2) {
            None => Ok(Reply::con(format!(
                "Invalid choice.\n\n{}",
                menu.final_confirmation(&fulfilment, &assessment)
            ))),
            Some(2) => {
                session.scratch = Scratch::Empty;
                session.state = DialogState::CartMenu;
                Ok(Reply::con(format!(
                    "Order cancelled.\n\n{}\n\n{CART_OPTIONS}",
                    menu.cart(&session.cart)
                )))
            }
            Some(_) => {
                if session.cart.is_empty() {
                    return Err(missing(session, "a non-empty cart"));
                }
                let conversion = &self.policy.conversion;
                if let (Some(shortfall), Some(required)) =
                    (assessment.shortfall_on(conversion.to), assessment.top_up)
                {
                    let available = self.ledger.balance(&caller, conversion.from).await?;
                    let body = menu.conversion_detour(shortfall.missing(), required, available);
                    session.scratch = Scratch::Conversion(ConversionContext {
                        amount: None,
                        return_to_checkout: Some(fulfilment),
                        required_amount: Some(required),
                    });
                    session.state = DialogState::ConversionAmount;
                    return Ok(Reply::con(body));
                }
                if !assessment.shortfalls.is_empty() {
                    session.scratch = Scratch::Empty;
                    session.state = DialogState::CartMenu;
                    return Ok(Reply::con(format!(
                        "{}\n\n{}\n\n{CART_OPTIONS}",
                        menu.insufficient(&assessment.shortfalls),
                        menu.cart(&session.cart)
                    )));
                }
                self.commit(session, &caller, &fulfilment).await
            }
        }
    }

    /// Debits the exact per-source cart totals and closes the order.
    async fn commit(&self, session: &Session, caller: &str, fulfilment: &Fulfilment) -> Result<Reply> {
        let totals = session.cart.totals_by_source();
        match self.ledger.debit_all(caller, &totals).await {
            Ok(balances) => {
                let order = format!("ORD{:06}", self.clock.now().timestamp_millis().rem_euclid(1_000_000));
                let total = session.cart.grand_total();
                tracing::info!(session_id = %session.id, %order, %total, "Order placed");
                Ok(Reply::end(self.menu().order_success(&order, total, &balances, fulfilment)))
            }
            Err(UssdError::LedgerError(LedgerError::Shortfall(shortfalls))) => {
                tracing::warn!(session_id = %session.id, sources = shortfalls.len(), "Payment failed at commit");
                Ok(Reply::end(self.menu().payment_failed(&shortfalls)))
            }
            Err(e) => Err(e),
        }
    }

    pub(super) async fn on_conversion_amount(&self, session: &mut Session, input: &str) -> Result<Reply> {
        let menu = self.menu();
        let Scratch::Conversion(context) = &session.scratch else {
            return Err(missing(session, "a conversion context"));
        };
        let mut context = context.clone();
        let caller = self.caller(session)?;
        let conversion = &self.policy.conversion;
        if input == "0" {
            return self.cancel_conversion(session, &caller, context).await;
        }
        let available = self.ledger.balance(&caller, conversion.from).await?;

        let amount = match Amount::parse(input) {
            Some(amount) if conversion.check_bounds(amount.value()).is_ok() => amount,
            _ => return Ok(Reply::con(menu.invalid_amount(available))),
        };
        if amount.value() > available.value() {
            return Ok(Reply::con(menu.amount_exceeds_balance(available)));
        }

        context.amount = Some(amount.value());
        session.scratch = Scratch::Conversion(context);
        session.state = DialogState::ConversionConfirm;
        Ok(Reply::con(menu.conversion_preview(amount.value())))
    }

    /// A detour goes back to the order; a standalone top up ends.
    async fn cancel_conversion(
        &self,
        session: &mut Session,
        caller: &str,
        context: ConversionContext,
    ) -> Result<Reply> {
        match context.return_to_checkout {
            Some(fulfilment) => {
                self.resume_checkout(session, caller, fulfilment, Some("Conversion cancelled.".to_string()))
                    .await
            }
            None => Ok(Reply::end(self.menu().conversion_cancelled())),
        }
    }

    pub(super) async fn on_conversion_confirm(&self, session: &mut Session, input: &str) -> Result<Reply> {
        let menu = self.menu();
        let Scratch::Conversion(context) = &session.scratch else {
            return Err(missing(session, "a conversion context"));
        };
        let context = context.clone();
        let caller = self.caller(session)?;

        match option_in(input, 1, 2) {
            None => Ok(Reply::con(format!("Invalid choice.\n\n{CONVERSION_OPTIONS}"))),
            Some(2) => self.cancel_conversion(session, &caller, context).await,
            Some(_) => {
                let amount = context
                    .amount
                    .ok_or_else(|| missing(session, "a conversion amount"))?;
                let amount = Amount::new(amount)?;
                let conversion = &self.policy.conversion;
                let result = self
                    .ledger
                    .convert(&caller, conversion.from, conversion.to, amount, conversion)
                    .await;
                match result {
                    Ok(done) => {
                        tracing::info!(
                            session_id = %session.id,
                            debited = %done.debited,
                            converted = %done.converted,
                            "Conversion completed"
                        );
                        match context.return_to_checkout {
                            Some(fulfilment) => {
                                let notice = menu.conversion_done(&done);
                                self.resume_checkout(session, &caller, fulfilment, Some(notice)).await
                            }
                            None => Ok(Reply::end(menu.conversion_receipt(&done))),
                        }
                    }
                    Err(UssdError::LedgerError(
                        e @ (LedgerError::OutOfBounds { .. } | LedgerError::InsufficientFunds { .. }),
                    )) => {
                        tracing::warn!(session_id = %session.id, error = %e, "Conversion rejected");
                        Ok(Reply::end(menu.conversion_failed(&e)))
                    }
                    Err(e) => Err(e),
                }
            }
        }
    }
}
