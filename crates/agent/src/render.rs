use serde::Serialize;
use shelfdesk_core::domain::conversation::Language;
use shelfdesk_core::domain::order::{Book, OrderRecord};
use tera::{Context, Tera};
use thiserror::Error;

const ORDER_SUMMARY: &str = "order_summary.txt";
const BOOK_DETAIL: &str = "book_detail.txt";
const SELECTED_BOOKS: &str = "selected_books.txt";

const DATE_FORMAT: &str = "%d %b %Y";
const NOT_APPLICABLE: &str = "N/A";

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("template error: {0}")]
    Template(#[from] tera::Error),
    #[error("book index {0} is not part of the order")]
    MissingBook(usize),
}

/// Deterministic order and book replies. Pure function of the record and language.
#[derive(Clone, Debug)]
pub struct ReplyRenderer {
    tera: Tera,
}

impl ReplyRenderer {
    pub fn new() -> Result<Self, RenderError> {
        let mut tera = Tera::default();
        tera.add_raw_templates(vec![
            (ORDER_SUMMARY, include_str!("../templates/order_summary.txt")),
            (BOOK_DETAIL, include_str!("../templates/book_detail.txt")),
            (SELECTED_BOOKS, include_str!("../templates/selected_books.txt")),
        ])?;
        Ok(Self { tera })
    }

    pub fn order_summary(
        &self,
        order: &OrderRecord,
        language: Language,
    ) -> Result<String, RenderError> {
        let labels = Labels::for_language(language);
        let books = order
            .books
            .iter()
            .enumerate()
            .map(|(index, book)| BookView::new(index, book, order, &labels))
            .collect::<Vec<_>>();

        let mut context = Context::new();
        context.insert("labels", &labels);
        context.insert("order", &OrderView::new(order, &labels));
        context.insert("has_books", &!books.is_empty());
        context.insert("books", &books);
        self.render(ORDER_SUMMARY, &context)
    }

    pub fn book_detail(
        &self,
        order: &OrderRecord,
        index: usize,
        language: Language,
    ) -> Result<String, RenderError> {
        let labels = Labels::for_language(language);
        let book = order.book(index).ok_or(RenderError::MissingBook(index))?;

        let mut context = Context::new();
        context.insert("labels", &labels);
        context.insert("order", &OrderView::new(order, &labels));
        context.insert("book", &BookView::new(index, book, order, &labels));
        self.render(BOOK_DETAIL, &context)
    }

    /// One numbered block per selected book, keeping the order's own numbering.
    pub fn selected_books(
        &self,
        order: &OrderRecord,
        indices: &[usize],
        language: Language,
    ) -> Result<String, RenderError> {
        let labels = Labels::for_language(language);
        let books = indices
            .iter()
            .map(|&index| {
                order
                    .book(index)
                    .map(|book| BookView::new(index, book, order, &labels))
                    .ok_or(RenderError::MissingBook(index))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut context = Context::new();
        context.insert("labels", &labels);
        context.insert("order", &OrderView::new(order, &labels));
        context.insert("books", &books);
        self.render(SELECTED_BOOKS, &context)
    }

    fn render(&self, template: &str, context: &Context) -> Result<String, RenderError> {
        let rendered = self.tera.render(template, context)?;
        Ok(rendered.trim_end().to_string())
    }
}

#[derive(Serialize)]
struct Labels {
    order_summary: &'static str,
    customer: &'static str,
    purchased: &'static str,
    expected_delivery: &'static str,
    status: &'static str,
    payment: &'static str,
    amount: &'static str,
    tracking: &'static str,
    cancellation_reason: &'static str,
    shipping_details: &'static str,
    mobile: &'static str,
    products: &'static str,
    no_products: &'static str,
    item_details: &'static str,
    selected_books: &'static str,
    product: &'static str,
    order_status: &'static str,
    payment_status: &'static str,
    #[serde(skip)]
    not_available: &'static str,
    #[serde(skip)]
    not_yet_available: &'static str,
}

impl Labels {
    fn for_language(language: Language) -> Self {
        match language {
            Language::Primary => Self {
                order_summary: "Order Summary",
                customer: "Customer",
                purchased: "Purchased",
                expected_delivery: "Expected Delivery",
                status: "Status",
                payment: "Payment",
                amount: "Amount",
                tracking: "Tracking",
                cancellation_reason: "Cancellation Reason",
                shipping_details: "Shipping Details",
                mobile: "Mobile",
                products: "Products",
                no_products: "No products listed for this order.",
                item_details: "Details for Item in Order",
                selected_books: "Selected Books in Order",
                product: "Product",
                order_status: "Order Status",
                payment_status: "Payment Status",
                not_available: "Not available",
                not_yet_available: "Not yet available",
            },
            Language::Secondary => Self {
                order_summary: "Order Ki Jaankari",
                customer: "Grahak",
                purchased: "Kharidi Ki Tareekh",
                expected_delivery: "Delivery Ki Ummeed",
                status: "Status",
                payment: "Payment",
                amount: "Rakam",
                tracking: "Tracking",
                cancellation_reason: "Cancel Hone Ki Wajah",
                shipping_details: "Shipping Details",
                mobile: "Mobile",
                products: "Books",
                no_products: "Is order mein koi book listed nahi hai.",
                item_details: "Order Ki Book Details",
                selected_books: "Order Ki Chuni Gayi Books",
                product: "Book",
                order_status: "Order Status",
                payment_status: "Payment Status",
                not_available: "Uplabdh nahi",
                not_yet_available: "Abhi uplabdh nahi",
            },
        }
    }
}

#[derive(Serialize)]
struct OrderView {
    order_number: String,
    customer: String,
    purchased: String,
    expected_delivery: String,
    status: String,
    payment: String,
    amount: String,
    tracking: String,
    has_cancellation_reason: bool,
    cancellation_reason: String,
    address: String,
    locality: String,
    country: String,
    mobile: String,
}

impl OrderView {
    fn new(order: &OrderRecord, labels: &Labels) -> Self {
        let shipping = &order.shipping;
        let locality = [
            shipping.city.as_deref(),
            shipping.state.as_deref(),
            shipping.zip.as_deref(),
        ]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(", ");
        let cancellation_reason = order.cancellation_reason().map(str::to_string);

        Self {
            order_number: order.order_number.to_string(),
            customer: or_na(order.customer_name.as_deref()),
            purchased: format_date(order.purchase_date),
            expected_delivery: format_date(order.promise_date),
            status: order.status.label().to_string(),
            payment: or_na(order.payment_status.as_deref()),
            amount: order
                .amount
                .map(|amount| format!("{amount:.2}"))
                .unwrap_or_else(|| NOT_APPLICABLE.to_string()),
            tracking: order
                .tracking_number
                .clone()
                .unwrap_or_else(|| labels.not_yet_available.to_string()),
            has_cancellation_reason: cancellation_reason.is_some(),
            cancellation_reason: cancellation_reason.unwrap_or_default(),
            address: or_na(shipping.address.as_deref()),
            locality: if locality.is_empty() { NOT_APPLICABLE.to_string() } else { locality },
            country: or_na(shipping.country.as_deref()),
            mobile: or_na(shipping.mobile.as_deref()),
        }
    }
}

#[derive(Serialize)]
struct BookView {
    position: usize,
    product_name: String,
    isbn: String,
    tracking: String,
}

impl BookView {
    fn new(index: usize, book: &Book, order: &OrderRecord, labels: &Labels) -> Self {
        let tracking = book
            .tracking_number
            .as_deref()
            .or(order.tracking_number.as_deref())
            .unwrap_or(labels.not_available);

        Self {
            position: index + 1,
            product_name: book.product_name.clone(),
            isbn: or_na(book.isbn.as_deref()),
            tracking: tracking.to_string(),
        }
    }
}

fn or_na(value: Option<&str>) -> String {
    value.unwrap_or(NOT_APPLICABLE).to_string()
}

fn format_date(date: Option<chrono::NaiveDate>) -> String {
    date.map(|date| date.format(DATE_FORMAT).to_string())
        .unwrap_or_else(|| NOT_APPLICABLE.to_string())
}
