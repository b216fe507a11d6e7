use funpay_types::MessageKind;
use regex::Regex;

use crate::record::ParseError;

const PATTERNS: [(MessageKind, &str); 15] = [
    (
        MessageKind::Discord,
        r"(You can switch to|Вы можете перейти в) Discord\. (However, note that friending someone is considered a violation rules|Внимание: общение за пределами сервера FunPay считается нарушением правил)\.",
    ),
    (
        MessageKind::DearVendors,
        r"(Уважаемые продавцы|Dear vendors), (не доверяйте сообщениям в чате|do not rely on chat messages)!",
    ),
    (
        MessageKind::OrderPurchased,
        r"(Покупатель|The buyer) [a-zA-Z0-9]+ (оплатил заказ|has paid for order) #[A-Z0-9]{8}\.",
    ),
    (
        MessageKind::OrderConfirmed,
        r"(Покупатель|The buyer) [a-zA-Z0-9]+ (подтвердил успешное выполнение заказа|has confirmed that order) #[A-Z0-9]{8} (и отправил деньги продавцу|has been fulfilled successfully and that the seller) [a-zA-Z0-9]+( has been paid)?\.",
    ),
    (
        MessageKind::NewFeedback,
        r"(Покупатель|The buyer) [a-zA-Z0-9]+ (написал отзыв к заказу|has given feedback to the order) #[A-Z0-9]{8}\.",
    ),
    (
        MessageKind::FeedbackChanged,
        r"(Покупатель|The buyer) [a-zA-Z0-9]+ (изменил отзыв к заказу|has edited their feedback to the order) #[A-Z0-9]{8}\.",
    ),
    (
        MessageKind::FeedbackDeleted,
        r"(Покупатель|The buyer) [a-zA-Z0-9]+ (удалил отзыв к заказу|has deleted their feedback to the order) #[A-Z0-9]{8}\.",
    ),
    (
        MessageKind::NewFeedbackAnswer,
        r"(Продавец|The seller) [a-zA-Z0-9]+ (ответил на отзыв к заказу|has replied to their feedback to the order) #[A-Z0-9]{8}\.",
    ),
    (
        MessageKind::FeedbackAnswerChanged,
        r"(Продавец|The seller) [a-zA-Z0-9]+ (изменил ответ на отзыв к заказу|has edited a reply to their feedback to the order) #[A-Z0-9]{8}\.",
    ),
    (
        MessageKind::FeedbackAnswerDeleted,
        r"(Продавец|The seller) [a-zA-Z0-9]+ (удалил ответ на отзыв к заказу|has deleted a reply to their feedback to the order) #[A-Z0-9]{8}\.",
    ),
    (
        MessageKind::OrderReopened,
        r"(Заказ|Order) #[A-Z0-9]{8} (открыт повторно|has been reopened)\.",
    ),
    (
        MessageKind::Refund,
        r"(Продавец|The seller) [a-zA-Z0-9]+ (вернул деньги покупателю|has refunded the buyer) [a-zA-Z0-9]+ (по заказу|on order) #[A-Z0-9]{8}\.",
    ),
    (
        MessageKind::PartialRefund,
        r"(Часть средств по заказу|A part of the funds pertaining to the order) #[A-Z0-9]{8} (возвращена покупателю|has been refunded)\.",
    ),
    (
        MessageKind::OrderConfirmedByAdmin,
        r"(Администратор|The administrator) [a-zA-Z0-9]+ (подтвердил успешное выполнение заказа|has confirmed that order) #[A-Z0-9]{8} (и отправил деньги продавцу|has been fulfilled successfully and that the seller) [a-zA-Z0-9]+( has been paid)?\.",
    ),
    (
        MessageKind::RefundByAdmin,
        r"(Администратор|The administrator) [a-zA-Z0-9]+ (вернул деньги покупателю|has refunded the buyer) [a-zA-Z0-9]+ (по заказу|on order) #[A-Z0-9]{8}\.",
    ),
];

#[derive(Debug, Clone)]
/// Phrase-based system message classifier. Heuristic; false positives are possible.
pub struct MessageClassifier {
    patterns: Vec<(MessageKind, Regex)>,
}

impl MessageClassifier {
    pub fn new() -> Result<Self, ParseError> {
        let patterns = PATTERNS
            .iter()
            .map(|(kind, pattern)| {
                Regex::new(pattern)
                    .map(|regex| (*kind, regex))
                    .map_err(|error| ParseError::Pattern(error.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    pub fn classify(&self, text: &str) -> MessageKind {
        self.patterns
            .iter()
            .find(|(_, regex)| regex.is_match(text))
            .map(|(kind, _)| *kind)
            .unwrap_or(MessageKind::NonSystem)
    }
}
