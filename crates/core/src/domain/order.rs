use std::collections::BTreeSet;
use std::fmt;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

/// Shortest identifier that is worth sending to the order store.
pub const MIN_LOOKUP_LENGTH: usize = 5;

/// External-facing order identifier: two uppercase letters followed by digits.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OrderNumber(String);

impl OrderNumber {
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let normalized = raw.trim().to_ascii_uppercase();
        let bytes = normalized.as_bytes();
        let well_formed = bytes.len() > 2
            && bytes[..2].iter().all(u8::is_ascii_uppercase)
            && bytes[2..].iter().all(u8::is_ascii_digit);

        if well_formed {
            Ok(Self(normalized))
        } else {
            Err(DomainError::InvalidOrderNumber(raw.trim().to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_lookup_eligible(&self) -> bool {
        self.0.len() >= MIN_LOOKUP_LENGTH
    }
}

impl fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for OrderNumber {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<OrderNumber> for String {
    fn from(value: OrderNumber) -> Self {
        value.0
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    PendingAuthorization,
    Processing,
    Shipped,
    Cancelled,
    Other(String),
}

impl OrderStatus {
    /// Maps the free-text status stored upstream onto the known lifecycle states.
    pub fn from_source(raw: &str) -> Self {
        let normalized = raw
            .trim()
            .to_lowercase()
            .replace(['-', '_'], " ")
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");

        match normalized.as_str() {
            "pending authorization" | "pending" => Self::PendingAuthorization,
            "authorized/under processing" | "authorized" | "under processing" | "processing" => {
                Self::Processing
            }
            "shipped" | "dispatched" => Self::Shipped,
            "cancelled" | "canceled" => Self::Cancelled,
            _ => Self::Other(raw.trim().to_string()),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    pub fn label(&self) -> &str {
        match self {
            Self::PendingAuthorization => "pending authorization",
            Self::Processing => "processing",
            Self::Shipped => "shipped",
            Self::Cancelled => "cancelled",
            Self::Other(raw) if raw.is_empty() => "unknown",
            Self::Other(raw) => raw,
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    pub product_name: String,
    pub isbn: Option<String>,
    pub tracking_number: Option<String>,
}

impl Book {
    pub fn new(product_name: impl Into<String>) -> Self {
        Self { product_name: product_name.into(), isbn: None, tracking_number: None }
    }

    pub fn with_isbn(mut self, isbn: impl Into<String>) -> Self {
        self.isbn = Some(isbn.into());
        self
    }

    pub fn with_tracking_number(mut self, tracking_number: impl Into<String>) -> Self {
        self.tracking_number = Some(tracking_number.into());
        self
    }

    fn identity_key(&self) -> String {
        match self.isbn.as_deref().map(str::trim).filter(|isbn| !isbn.is_empty()) {
            Some(isbn) => format!("isbn:{isbn}"),
            None => format!("name:{}", self.product_name.trim().to_lowercase()),
        }
    }
}

/// Drops repeated books, keyed by ISBN when present and by product name otherwise.
/// The first occurrence wins, so line-item order is preserved.
pub fn dedupe_books<I>(books: I) -> Vec<Book>
where
    I: IntoIterator<Item = Book>,
{
    let mut seen = BTreeSet::new();
    books.into_iter().filter(|book| seen.insert(book.identity_key())).collect()
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip: Option<String>,
    pub country: Option<String>,
    pub mobile: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub order_number: OrderNumber,
    pub purchase_date: Option<NaiveDate>,
    pub promise_date: Option<NaiveDate>,
    pub status: OrderStatus,
    pub payment_status: Option<String>,
    pub amount: Option<Decimal>,
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub shipping: ShippingAddress,
    pub tracking_number: Option<String>,
    /// Reason as stored upstream. Read it through [`OrderRecord::cancellation_reason`].
    pub recorded_cancellation_reason: Option<String>,
    pub books: Vec<Book>,
}

impl OrderRecord {
    pub fn new(order_number: OrderNumber, status: OrderStatus) -> Self {
        Self {
            order_number,
            purchase_date: None,
            promise_date: None,
            status,
            payment_status: None,
            amount: None,
            customer_name: None,
            customer_email: None,
            shipping: ShippingAddress::default(),
            tracking_number: None,
            recorded_cancellation_reason: None,
            books: Vec::new(),
        }
    }

    /// Cancellation reason, only ever present for cancelled orders.
    pub fn cancellation_reason(&self) -> Option<&str> {
        if !self.status.is_cancelled() {
            return None;
        }
        self.recorded_cancellation_reason.as_deref().map(str::trim).filter(|r| !r.is_empty())
    }

    pub fn book_count(&self) -> usize {
        self.books.len()
    }

    pub fn book(&self, index: usize) -> Option<&Book> {
        self.books.get(index)
    }

    /// Index of the single book whose full title appears in `text`.
    /// Titles shorter than four characters are ignored to avoid accidental hits.
    pub fn find_book_mentioned_in(&self, text: &str) -> Option<usize> {
        let haystack = text.to_lowercase();
        let mut matches = self.books.iter().enumerate().filter(|(_, book)| {
            let title = book.product_name.trim().to_lowercase();
            title.chars().count() >= 4 && haystack.contains(&title)
        });

        match (matches.next(), matches.next()) {
            (Some((index, _)), None) => Some(index),
            _ => None,
        }
    }

    pub fn with_books<I>(mut self, books: I) -> Self
    where
        I: IntoIterator<Item = Book>,
    {
        self.books = dedupe_books(books);
        self
    }
}
