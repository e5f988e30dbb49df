//! Gateway operations.
//!
//! Thin request builders over [`MondidoClient::execute`]: each operation
//! validates its required inputs, assembles an [`OutgoingRequest`], signs it
//! where the gateway expects a hash, and hands it to the pipeline.

use rust_decimal::Decimal;
use tracing::instrument;

use crate::{
    client::MondidoClient,
    error::{GatewayError, Result},
    request::{ENCRYPTED_FIELD, FieldValue, OutgoingRequest},
    response::NormalizedResult,
    signing::{SignableTransaction, check_amount, format_amount},
    transport::{HttpMethod, Transport},
};

/// Fields encrypted when a public key is configured.
pub const ENCRYPTED_CARD_FIELDS: &str = "card_number,card_cvv";

/// Card brand, as reported in `card_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardBrand {
    /// Visa
    Visa,
    /// MasterCard
    Master,
    /// Discover
    Discover,
    /// American Express
    AmericanExpress,
    /// Diners Club
    DinersClub,
    /// JCB
    Jcb,
    /// UK Maestro, formerly Switch
    Switch,
    /// Solo
    Solo,
    /// International Maestro
    Maestro,
    /// Laser
    Laser,
    /// Card previously stored at the gateway.
    StoredCard,
}

impl CardBrand {
    /// Gateway identifier.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Visa => "visa",
            Self::Master => "master",
            Self::Discover => "discover",
            Self::AmericanExpress => "american_express",
            Self::DinersClub => "diners_club",
            Self::Jcb => "jcb",
            Self::Switch => "switch",
            Self::Solo => "solo",
            Self::Maestro => "maestro",
            Self::Laser => "laser",
            Self::StoredCard => "stored_card",
        }
    }

    /// Detects the brand from a card number's issuer prefix.
    ///
    /// Returns `None` for numbers that are not 12 to 19 digits or whose
    /// prefix matches no supported brand.
    ///
    /// # Examples
    ///
    /// ```
    /// use mondido_gateway::operations::CardBrand;
    ///
    /// assert_eq!(CardBrand::detect("4111111111111111"), Some(CardBrand::Visa));
    /// assert_eq!(CardBrand::detect("378282246310005"), Some(CardBrand::AmericanExpress));
    /// assert_eq!(CardBrand::detect("1234"), None);
    /// ```
    #[must_use]
    pub fn detect(number: &str) -> Option<Self> {
        let digits: String = number.chars().filter(|c| !c.is_whitespace() && *c != '-').collect();
        if !(12..=19).contains(&digits.len()) || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }

        let prefix = |len: usize| digits.get(..len).and_then(|p| p.parse::<u32>().ok()).unwrap_or(0);
        let len = digits.len();

        let brand = match (prefix(2), prefix(3), prefix(4), prefix(6)) {
            (_, _, 6759, _) => Self::Switch,
            (_, _, 6767, _) => Self::Solo,
            (_, _, 6304 | 6706 | 6709, _) => Self::Laser,
            (_, _, 6771, p6) if p6 != 677_189 => Self::Laser,
            (_, _, 6011, _) | (65, _, _, _) | (_, 644..=649, _, _) if len >= 16 => Self::Discover,
            (62, _, _, _) if (16..=19).contains(&len) => Self::Discover,
            (_, _, 3528..=3589, _) if len == 16 => Self::Jcb,
            (34 | 37, _, _, _) if len == 15 => Self::AmericanExpress,
            (_, 300..=305, _, _) | (36 | 38, _, _, _) if len == 14 => Self::DinersClub,
            (p2, _, _, _) if p2 / 10 == 4 && matches!(len, 13 | 16 | 19) => Self::Visa,
            (51..=55, _, _, _) if len == 16 => Self::Master,
            (_, _, _, 222_100..=272_099) if len == 16 => Self::Master,
            (_, _, _, 677_189) if len == 16 => Self::Master,
            (50 | 56..=58, _, _, _) => Self::Maestro,
            (p2, _, _, _) if p2 / 10 == 6 => Self::Maestro,
            _ => return None,
        };
        Some(brand)
    }
}

/// Raw card data.
#[derive(Clone, PartialEq, Eq)]
pub struct CreditCard {
    number: String,
    month: u8,
    year: u16,
    holder: Option<String>,
    cvv: Option<String>,
}

impl std::fmt::Debug for CreditCard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let last4 = self.number.get(self.number.len().saturating_sub(4)..).unwrap_or_default();
        f.debug_struct("CreditCard")
            .field("number", &format!("...{last4}"))
            .field("month", &self.month)
            .field("year", &self.year)
            .field("has_cvv", &self.cvv.is_some())
            .finish_non_exhaustive()
    }
}

impl CreditCard {
    /// Creates a card from its number and expiry.
    #[must_use]
    pub fn new(number: impl Into<String>, month: u8, year: u16) -> Self {
        Self { number: number.into(), month, year, holder: None, cvv: None }
    }

    /// Sets the card holder name.
    #[must_use]
    pub fn with_holder(mut self, holder: impl Into<String>) -> Self {
        self.holder = Some(holder.into());
        self
    }

    /// Sets the card verification value.
    #[must_use]
    pub fn with_cvv(mut self, cvv: impl Into<String>) -> Self {
        self.cvv = Some(cvv.into());
        self
    }
}

/// Card stored at the gateway, referenced by its card hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredCard {
    card_hash: String,
    month: u8,
    year: u16,
    holder: Option<String>,
}

impl StoredCard {
    /// Creates a stored card reference.
    #[must_use]
    pub fn new(card_hash: impl Into<String>, month: u8, year: u16) -> Self {
        Self { card_hash: card_hash.into(), month, year, holder: None }
    }

    /// Sets the card holder name.
    #[must_use]
    pub fn with_holder(mut self, holder: impl Into<String>) -> Self {
        self.holder = Some(holder.into());
        self
    }
}

/// Anything a payment can be charged to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentInstrument {
    /// Raw card data.
    Card(CreditCard),
    /// Gateway-stored card.
    StoredCard(StoredCard),
}

impl PaymentInstrument {
    /// Brand reported in `card_type`; `None` if a raw card number is unrecognized.
    #[must_use]
    pub fn brand(&self) -> Option<CardBrand> {
        match self {
            Self::Card(card) => CardBrand::detect(&card.number),
            Self::StoredCard(_) => Some(CardBrand::StoredCard),
        }
    }

    /// Expiry as `MMYY`.
    #[must_use]
    pub fn expiry(&self) -> String {
        let (month, year) = match self {
            Self::Card(card) => (card.month, card.year),
            Self::StoredCard(card) => (card.month, card.year),
        };
        format!("{month:02}{:02}", year % 100)
    }

    fn number(&self) -> &str {
        match self {
            Self::Card(card) => &card.number,
            Self::StoredCard(card) => &card.card_hash,
        }
    }

    fn holder(&self) -> Option<&str> {
        match self {
            Self::Card(card) => card.holder.as_deref(),
            Self::StoredCard(card) => card.holder.as_deref(),
        }
    }

    fn cvv(&self) -> Option<&str> {
        match self {
            Self::Card(card) => card.cvv.as_deref(),
            Self::StoredCard(_) => None,
        }
    }
}

/// Options for [`purchase`](MondidoClient::purchase) and
/// [`authorize`](MondidoClient::authorize).
#[derive(Debug, Clone, Default)]
pub struct TransactionOptions {
    /// Merchant order id, sent as `payment_ref`. Required.
    pub order_id: Option<String>,
    /// Merchant customer reference; part of the hash.
    pub customer_ref: Option<String>,
    /// Schemaless merchant metadata.
    pub metadata: Vec<(String, String)>,
    /// Subscription plan id.
    pub plan_id: Option<String>,
    /// Per-transaction webhook definition.
    pub webhook: Vec<(String, String)>,
}

impl TransactionOptions {
    /// Options for the given order.
    #[must_use]
    pub fn new(order_id: impl Into<String>) -> Self {
        Self { order_id: Some(order_id.into()), ..Self::default() }
    }

    /// Sets the customer reference.
    #[must_use]
    pub fn with_customer_ref(mut self, customer_ref: impl Into<String>) -> Self {
        self.customer_ref = Some(customer_ref.into());
        self
    }

    /// Adds a metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.push((key.into(), value.into()));
        self
    }

    /// Sets the subscription plan.
    #[must_use]
    pub fn with_plan_id(mut self, plan_id: impl Into<String>) -> Self {
        self.plan_id = Some(plan_id.into());
        self
    }

    /// Adds a webhook attribute.
    #[must_use]
    pub fn with_webhook(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.webhook.push((key.into(), value.into()));
        self
    }
}

fn required<'a>(name: &str, value: Option<&'a str>) -> Result<&'a str> {
    value.filter(|v| !v.trim().is_empty()).ok_or_else(|| GatewayError::MissingField(name.to_owned()))
}

impl<T: Transport> MondidoClient<T> {
    /// Authorizes and captures a payment in one step.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::MissingField`] without sending anything if
    /// `order_id` is missing, [`GatewayError::InvalidAmount`] if `amount` has
    /// more than two fraction digits, plus the errors of [`execute`](Self::execute).
    #[instrument(skip(self, instrument, options), fields(order_id = ?options.order_id))]
    pub async fn purchase(
        &self,
        amount: Decimal,
        currency: &str,
        instrument: &PaymentInstrument,
        options: &TransactionOptions,
    ) -> Result<NormalizedResult> {
        let request = self.transaction_request(amount, currency, instrument, options, true)?;
        self.execute("purchase", HttpMethod::Post, "transactions", Some(request)).await
    }

    /// Reserves a payment for later processing.
    ///
    /// # Errors
    ///
    /// Same as [`purchase`](Self::purchase).
    #[instrument(skip(self, instrument, options), fields(order_id = ?options.order_id))]
    pub async fn authorize(
        &self,
        amount: Decimal,
        currency: &str,
        instrument: &PaymentInstrument,
        options: &TransactionOptions,
    ) -> Result<NormalizedResult> {
        let request = self.transaction_request(amount, currency, instrument, options, false)?;
        self.execute("authorize", HttpMethod::Post, "transactions", Some(request)).await
    }

    /// Refunds part or all of a transaction.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::MissingField`] if `transaction_id` or `reason` is
    /// blank, or [`GatewayError::InvalidAmount`] if `amount` needs rounding.
    #[instrument(skip(self, reason))]
    pub async fn refund(
        &self,
        transaction_id: &str,
        amount: Decimal,
        reason: &str,
    ) -> Result<NormalizedResult> {
        let transaction_id = required("transaction_id", Some(transaction_id))?;
        let reason = required("reason", Some(reason))?;
        let amount = check_amount(amount)?;

        let mut request = OutgoingRequest::new();
        request.insert("transaction_id", transaction_id);
        request.insert("amount", format_amount(amount));
        request.insert("reason", reason);

        self.execute("refund", HttpMethod::Post, "refunds", Some(request)).await
    }

    /// Stores a card at the gateway for a customer.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::MissingField`] if `customer_id` is blank.
    #[instrument(skip(self, instrument))]
    pub async fn store(
        &self,
        instrument: &PaymentInstrument,
        customer_id: &str,
        customer_ref: Option<&str>,
    ) -> Result<NormalizedResult> {
        let customer_id = required("customer_id", Some(customer_id))?;

        let mut request = OutgoingRequest::new();
        request.insert("currency", <MondidoClient>::DEFAULT_CURRENCY);
        request.insert("customer_ref", customer_ref.unwrap_or_default());
        request.insert("customer_id", customer_id);
        request.insert("test", self.is_test());
        self.add_instrument(&mut request, instrument);

        self.execute("store", HttpMethod::Post, "stored_cards", Some(request)).await
    }

    /// Deletes a stored card.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::MissingField`] if `id` is blank.
    #[instrument(skip(self))]
    pub async fn unstore(&self, id: &str) -> Result<NormalizedResult> {
        let id = required("id", Some(id))?;
        let path = format!("stored_cards/{}", urlencoding::encode(id));
        self.execute("unstore", HttpMethod::Delete, &path, None).await
    }

    fn transaction_request(
        &self,
        amount: Decimal,
        currency: &str,
        instrument: &PaymentInstrument,
        options: &TransactionOptions,
        process: bool,
    ) -> Result<OutgoingRequest> {
        let order_id = required("order_id", options.order_id.as_deref())?;
        let currency = required("currency", Some(currency))?.to_lowercase();
        let amount = check_amount(amount)?;
        // a blank ref is never sent, so it must not be hashed either
        let customer_ref =
            options.customer_ref.as_deref().filter(|r| !r.trim().is_empty()).unwrap_or_default();

        let hash = self.signer().sign(&SignableTransaction {
            merchant_id: self.credentials().merchant_id().to_owned(),
            payment_ref: order_id.to_owned(),
            customer_ref: customer_ref.to_owned(),
            amount,
            currency: currency.clone(),
            test: self.is_test(),
        });

        let mut request = OutgoingRequest::new();
        request.insert("amount", format_amount(amount));
        request.insert("payment_ref", order_id);
        request.insert("currency", currency);
        request.insert("hash", hash);
        request.insert("test", self.is_test());
        // sent explicitly: the gateway processes by default
        request.insert("process", if process { "true" } else { "false" });

        if !options.metadata.is_empty() {
            request.insert("metadata", FieldValue::Map(options.metadata.clone()));
        }
        if let Some(plan_id) = &options.plan_id {
            request.insert("plan_id", plan_id.as_str());
        }
        request.insert("customer_ref", customer_ref);
        if !options.webhook.is_empty() {
            request.insert("webhook", FieldValue::Map(options.webhook.clone()));
        }

        self.add_instrument(&mut request, instrument);
        Ok(request)
    }

    fn add_instrument(&self, request: &mut OutgoingRequest, instrument: &PaymentInstrument) {
        if let Some(holder) = instrument.holder() {
            request.insert("card_holder", holder);
        }
        if let Some(cvv) = instrument.cvv() {
            request.insert("card_cvv", cvv);
        }
        request.insert("card_expiry", instrument.expiry());
        request.insert("card_number", instrument.number());
        request.insert("card_type", instrument.brand().map(CardBrand::as_str).unwrap_or_default());

        if self.encrypts_fields() {
            request.insert(ENCRYPTED_FIELD, ENCRYPTED_CARD_FIELDS);
        }
    }
}
