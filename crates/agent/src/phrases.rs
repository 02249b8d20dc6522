//! Fixed replies in both supported languages.

use shelfdesk_core::domain::conversation::Language;
use shelfdesk_core::domain::order::OrderNumber;

pub const EMPTY_MESSAGE: &str = "Please enter a message.";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Phrasebook {
    store_name: String,
}

impl Phrasebook {
    pub fn new(store_name: impl Into<String>) -> Self {
        Self { store_name: store_name.into() }
    }

    pub fn greeting(&self) -> String {
        format!(
            "Hello! Welcome to {} support. How can I assist you with your order today?",
            self.store_name
        )
    }

    pub fn idle_farewell(&self) -> String {
        "I didn't receive any response. Have a great day! Thank you for contacting support."
            .to_string()
    }

    pub fn farewell(&self, language: Language) -> String {
        match language {
            Language::Primary => {
                format!("Thank you for using {} support. Have a good day!", self.store_name)
            }
            Language::Secondary => format!(
                "{} support use karne ke liye dhanyavaad. Aapka din shubh ho!",
                self.store_name
            ),
        }
    }

    pub fn order_not_found(&self, order_number: &str, language: Language) -> String {
        match language {
            Language::Primary => format!(
                "I couldn't find any order with ID {order_number}. Please check the order number and try again."
            ),
            Language::Secondary => format!(
                "Mujhe order ID {order_number} ka koi order nahi mila. Kripya order number check karke dobara try karein."
            ),
        }
    }

    pub fn cancelled_with_reason(
        &self,
        order_number: &OrderNumber,
        reason: &str,
        language: Language,
    ) -> String {
        match language {
            Language::Primary => {
                format!("Your order {order_number} was cancelled due to: {reason}.")
            }
            Language::Secondary => {
                format!("Aapka order {order_number} is wajah se cancel hua tha: {reason}.")
            }
        }
    }

    pub fn cancelled_without_reason(&self, order_number: &OrderNumber, language: Language) -> String {
        match language {
            Language::Primary => format!(
                "Your order {order_number} was cancelled, but no specific reason was recorded in our system."
            ),
            Language::Secondary => format!(
                "Aapka order {order_number} cancel hua tha, lekin hamare system mein koi specific reason record nahi hai."
            ),
        }
    }

    pub fn not_cancelled(&self, order_number: &OrderNumber, status: &str, language: Language) -> String {
        match language {
            Language::Primary => format!(
                "Your order {order_number} is not cancelled. Its current status is: {status}."
            ),
            Language::Secondary => format!(
                "Aapka order {order_number} cancel nahi hua hai. Iska current status hai: {status}."
            ),
        }
    }

    pub fn order_without_books(&self, order_number: &OrderNumber, language: Language) -> String {
        match language {
            Language::Primary => format!(
                "I found order {order_number}, but it has no books listed. Please contact our support team so an agent can look into it."
            ),
            Language::Secondary => format!(
                "Order {order_number} mila, lekin usmein koi book listed nahi hai. Kripya hamari support team se contact karein taaki ek agent ise check kar sake."
            ),
        }
    }

    pub fn invalid_selection(&self, book_count: usize, language: Language) -> String {
        match language {
            Language::Primary => {
                format!("Please select a valid book number between 1 and {book_count}.")
            }
            Language::Secondary => {
                format!("Kripya 1 se {book_count} ke beech ka sahi book number chunein.")
            }
        }
    }

    pub fn single_book_follow_up(&self, language: Language) -> String {
        match language {
            Language::Primary => {
                "Is there anything else you'd like to know about this order?".to_string()
            }
            Language::Secondary => {
                "Kya aap is order ke baare mein kuch aur jaanna chahenge?".to_string()
            }
        }
    }

    pub fn book_selection_follow_up(&self, language: Language) -> String {
        match language {
            Language::Primary => "Which specific book would you like more details about? You can specify by number (like '1') or multiple books (like '1,2,3').".to_string(),
            Language::Secondary => "Aap kis book ke baare mein details chahte hain? Aap number (jaise '1') ya kai books (jaise '1,2,3') bata sakte hain.".to_string(),
        }
    }

    pub fn service_unavailable(&self, language: Language) -> String {
        match language {
            Language::Primary => {
                "I'm having trouble connecting right now. Please try again.".to_string()
            }
            Language::Secondary => {
                "Abhi connect karne mein dikkat ho rahi hai. Kripya thodi der baad dobara try karein."
                    .to_string()
            }
        }
    }
}
